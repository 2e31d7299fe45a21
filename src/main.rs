//! 报价服务端
//!
//! 提供 GET /cotacao：获取上游报价、保存到数据库并以 JSON 返回

use actix_web::{middleware::Logger, web, App, HttpServer};
use env_logger::Env;

use quotation_relay::config::AppConfig;
use quotation_relay::handlers;
use quotation_relay::services::server_coordinator;
use quotation_relay::services::storage::{open_store, QuotationStore};

/// 应用程序入口
///
/// 启动 HTTP 服务器，默认监听 0.0.0.0:8080
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // 初始化日志系统，默认日志级别为 info
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::load();
    if let Err(e) = config.validate() {
        log::error!("{}", e);
        std::process::exit(1);
    }

    let store = match open_store(&config.storage).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("初始化存储失败: {}", e);
            std::process::exit(1);
        }
    };

    let coordinator = match server_coordinator(&config, store.clone()) {
        Ok(coordinator) => web::Data::new(coordinator),
        Err(e) => {
            log::error!("初始化流水线失败: {}", e);
            std::process::exit(1);
        }
    };
    let store_data: web::Data<dyn QuotationStore> = web::Data::from(store.clone());

    log::info!("启动报价服务: {}", config.bind_addr());

    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())  // 添加请求日志中间件
            .app_data(coordinator.clone())
            .app_data(store_data.clone())
            .configure(handlers::config)  // 配置路由
    });
    if config.server.workers > 0 {
        server = server.workers(config.server.workers);
    }

    let result = match server.bind(config.bind_addr()) {
        Ok(server) => server.run().await,
        Err(e) => {
            log::error!("监听 {} 失败: {}", config.bind_addr(), e);
            Err(e)
        }
    };

    store.close().await;
    result
}
