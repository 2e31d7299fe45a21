//! 报价客户端
//!
//! 从本地报价服务获取买入价，并以 `Dólar: {bid}` 追加写入输出文件

use env_logger::Env;

use quotation_relay::config::AppConfig;
use quotation_relay::context::RequestContext;
use quotation_relay::services::client_coordinator;

#[tokio::main]
async fn main() {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let config = AppConfig::load();
    if let Err(e) = config.validate() {
        log::error!("{}", e);
        std::process::exit(1);
    }

    let coordinator = match client_coordinator(&config) {
        Ok(coordinator) => coordinator,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    // Ctrl+C 取消正在进行的阶段
    let (ctx, cancel) = RequestContext::with_cancel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("收到 Ctrl+C，取消请求");
            cancel.cancel();
        }
    });

    let (stage, result) = coordinator.run_traced(&ctx).await;
    match result {
        Ok(_) => {
            log::debug!("客户端完成: {}", stage.respond(true));
            log::info!("well done!");
        }
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    }
}
