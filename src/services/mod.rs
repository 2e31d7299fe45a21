//! 业务逻辑服务模块
//!
//! 获取、持久化、输出三个阶段及串联它们的协调器

pub mod fetcher;    // 报价获取
pub mod persister;  // 报价持久化
pub mod pipeline;   // 流水线协调器
pub mod responder;  // 报价输出
pub mod storage;    // 报价存储

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{BidQuotation, Quotation};
use fetcher::{http_client, HttpFetcher, ResponseShape};
use persister::Persister;
use pipeline::{Coordinator, StageTimeouts};
use responder::QuotationFileWriter;
use storage::QuotationStore;

/// 服务端流水线：上游 API → 存储
pub fn server_coordinator(config: &AppConfig, store: Arc<dyn QuotationStore>) -> Result<Coordinator<Quotation>> {
    let client = http_client(config.upstream.connect_timeout())?;
    let fetcher = HttpFetcher::<Quotation>::new(
        client,
        &config.upstream.url,
        ResponseShape::Keyed(config.upstream.pair_key.clone()),
    )?;

    Ok(Coordinator::new(
        Arc::new(fetcher),
        Arc::new(Persister::new(store)),
        StageTimeouts {
            fetch: config.upstream.timeout(),
            deliver: Some(config.storage.save_timeout()),
        },
    ))
}

/// 客户端流水线：本地服务 → 输出文件
pub fn client_coordinator(config: &AppConfig) -> Result<Coordinator<BidQuotation>> {
    let client = http_client(config.client.connect_timeout())?;
    let fetcher = HttpFetcher::<BidQuotation>::new(client, &config.client.url, ResponseShape::Bare)?;

    Ok(Coordinator::new(
        Arc::new(fetcher),
        Arc::new(QuotationFileWriter::new(&config.client.output_path)),
        StageTimeouts {
            fetch: config.client.timeout(),
            deliver: None,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::storage::InMemoryQuotationStore;
    use std::time::Duration;

    #[test]
    fn test_server_coordinator_uses_configured_timeouts() {
        let config = AppConfig::default();
        let coordinator = server_coordinator(&config, Arc::new(InMemoryQuotationStore::new())).unwrap();

        let timeouts = coordinator.timeouts();
        assert_eq!(timeouts.fetch, Duration::from_millis(200));
        assert_eq!(timeouts.deliver, Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_client_coordinator_has_no_write_deadline() {
        let coordinator = client_coordinator(&AppConfig::default()).unwrap();

        let timeouts = coordinator.timeouts();
        assert_eq!(timeouts.fetch, Duration::from_millis(300));
        assert_eq!(timeouts.deliver, None);
    }

    #[test]
    fn test_bad_url_fails_construction() {
        let mut config = AppConfig::default();
        config.upstream.url = "::".to_string();
        let result = server_coordinator(&config, Arc::new(InMemoryQuotationStore::new()));
        assert!(result.is_err());
    }
}
