//! 报价持久化阶段（仅服务端）

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::models::Quotation;
use crate::services::pipeline::QuotationSink;
use crate::services::storage::QuotationStore;

/// 把报价写入存储，返回带标识的报价
pub struct Persister {
    store: Arc<dyn QuotationStore>,
}

impl Persister {
    pub fn new(store: Arc<dyn QuotationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl QuotationSink<Quotation> for Persister {
    fn stage(&self) -> &'static str {
        "persist"
    }

    async fn accept(&self, ctx: &RequestContext, quotation: Quotation) -> Result<Quotation> {
        let id = self.store.insert(ctx, &quotation).await?;
        log::debug!("报价已保存, id={}", id);
        Ok(quotation.with_id(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StorageBackend, StorageConfig};
    use crate::error::QuotationError;
    use crate::services::storage::{InMemoryQuotationStore, SqliteQuotationStore, StorageError};
    use std::time::Duration;

    struct SlowStore;

    #[async_trait]
    impl QuotationStore for SlowStore {
        async fn insert(&self, ctx: &RequestContext, _quotation: &Quotation) -> Result<i64> {
            ctx.run("persist", async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok(1)
            })
            .await
        }

        async fn count(&self) -> std::result::Result<i64, StorageError> {
            Ok(0)
        }
    }

    fn quotation() -> Quotation {
        serde_json::from_str(
            r#"{"code":"USD","codein":"BRL","name":"Dólar Americano/Real Brasileiro","high":"5.45",
            "low":"5.40","varBid":"0.01","pctChange":"0.2","bid":"5.43","ask":"5.44",
            "timestamp":"1700000000","create_date":"2023-11-14 19:13:20"}"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_persist_assigns_id() {
        let store = Arc::new(InMemoryQuotationStore::new());
        let persister = Persister::new(store.clone());
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(1));

        let saved = persister.accept(&ctx, quotation()).await.unwrap();

        assert_eq!(saved.id, Some(1));
        assert_eq!(saved.bid, quotation().bid);
        assert_eq!(store.records().len(), 1);
    }

    #[tokio::test]
    async fn test_persist_deadline_exceeded() {
        let persister = Persister::new(Arc::new(SlowStore));
        let ctx = RequestContext::background().with_timeout(Duration::from_millis(10));

        let err = persister.accept(&ctx, quotation()).await.unwrap_err();
        assert!(matches!(err, QuotationError::DeadlineExceeded("persist")));
    }

    #[tokio::test]
    async fn test_failed_persist_never_leaves_a_row() {
        let path = std::env::temp_dir().join(format!("cotacao-{}.db", uuid::Uuid::new_v4()));
        let store = Arc::new(
            SqliteQuotationStore::connect(&StorageConfig {
                backend: StorageBackend::Sqlite,
                url: format!("sqlite://{}", path.display()),
                max_connections: 5,
                save_timeout_ms: 10,
            })
            .await
            .unwrap(),
        );
        let persister = Persister::new(store.clone());

        // 截止时间在 200µs 到 3ms 之间，让一部分保存恰好卡在提交前后
        let mut saved = 0;
        let mut failed = 0;
        for i in 0..300u64 {
            let ctx = RequestContext::background().with_timeout(Duration::from_micros(200 + (i * 97) % 2800));
            match persister.accept(&ctx, quotation()).await {
                Ok(q) => {
                    assert!(q.id.is_some());
                    saved += 1;
                }
                Err(_) => failed += 1,
            }
        }

        assert_eq!(saved + failed, 300);
        assert_eq!(store.count().await.unwrap(), saved);

        store.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
