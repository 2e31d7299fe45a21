//! 报价存储
//!
//! `QuotationStore` 只暴露“插入并返回分配的标识”这一能力；
//! 默认实现基于 SQLite，另有内存实现用于测试与 `memory` 后端。

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::error::ErrorKind;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Connection;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};
use crate::context::RequestContext;
use crate::error::{QuotationError, Result};
use crate::models::Quotation;

const STAGE: &str = "persist";

/// 存储层错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to connect to storage: {0}")]
    Connection(sqlx::Error),

    #[error("failed to create schema: {0}")]
    Schema(sqlx::Error),

    #[error("query failed: {0}")]
    Query(sqlx::Error),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => StorageError::ConstraintViolation(db_err.message().to_string()),
                _ => StorageError::Query(err),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => StorageError::Connection(err),
            _ => StorageError::Query(err),
        }
    }
}

/// 报价写入能力
#[async_trait]
pub trait QuotationStore: Send + Sync {
    /// 插入一条报价，返回存储分配的标识
    ///
    /// 返回 `Ok` 当且仅当记录已提交；超时或取消时不留下任何记录
    async fn insert(&self, ctx: &RequestContext, quotation: &Quotation) -> Result<i64>;

    /// 已存储的报价数量
    async fn count(&self) -> Result<i64, StorageError>;

    /// 释放底层资源
    async fn close(&self) {}
}

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS quotations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    code        TEXT    NOT NULL,
    codein      TEXT    NOT NULL,
    name        TEXT    NOT NULL,
    high        TEXT    NOT NULL,
    low         TEXT    NOT NULL,
    var_bid     TEXT    NOT NULL,
    pct_change  TEXT    NOT NULL,
    bid         TEXT    NOT NULL,
    ask         TEXT    NOT NULL,
    timestamp   INTEGER NOT NULL,
    create_date TEXT    NOT NULL
)
"#;

/// SQLite 报价存储
#[derive(Clone)]
pub struct SqliteQuotationStore {
    pool: SqlitePool,
}

impl SqliteQuotationStore {
    /// 连接数据库并确保表结构存在
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(StorageError::Connection)?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect_with(options)
            .await
            .map_err(StorageError::Connection)?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(StorageError::Schema)?;
        Ok(())
    }
}

#[async_trait]
impl QuotationStore for SqliteQuotationStore {
    async fn insert(&self, ctx: &RequestContext, q: &Quotation) -> Result<i64> {
        let mut conn = ctx
            .run(STAGE, async {
                self.pool
                    .acquire()
                    .await
                    .map_err(|e| QuotationError::from(StorageError::Connection(e)))
            })
            .await?;
        let mut tx = conn.begin().await.map_err(StorageError::Connection)?;

        // 取连接与 INSERT 参与超时竞争，被丢弃的事务在释放时回滚
        let result = ctx
            .run(STAGE, async {
                sqlx::query(
                    r#"
                    INSERT INTO quotations
                        (code, codein, name, high, low, var_bid, pct_change, bid, ask, timestamp, create_date)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&q.code)
                .bind(&q.codein)
                .bind(&q.name)
                .bind(q.high.to_string())
                .bind(q.low.to_string())
                .bind(q.var_bid.to_string())
                .bind(q.pct_change.to_string())
                .bind(q.bid.to_string())
                .bind(q.ask.to_string())
                .bind(q.timestamp)
                .bind(&q.create_date)
                .execute(&mut *tx)
                .await
                .map_err(|e| QuotationError::from(StorageError::from(e)))
            })
            .await?;

        if ctx.is_done() {
            tx.rollback().await.map_err(StorageError::from)?;
            return Err(QuotationError::DeadlineExceeded(STAGE));
        }

        // 提交不可中断：提交成功即报告成功
        tx.commit().await.map_err(StorageError::from)?;
        Ok(result.last_insert_rowid())
    }

    async fn count(&self) -> Result<i64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM quotations")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// 内存报价存储
#[derive(Default)]
pub struct InMemoryQuotationStore {
    records: Mutex<Vec<Quotation>>,
}

impl InMemoryQuotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已存储记录的快照
    pub fn records(&self) -> Vec<Quotation> {
        self.records.lock().clone()
    }
}

#[async_trait]
impl QuotationStore for InMemoryQuotationStore {
    async fn insert(&self, ctx: &RequestContext, quotation: &Quotation) -> Result<i64> {
        if ctx.is_done() {
            return Err(QuotationError::DeadlineExceeded(STAGE));
        }
        let mut records = self.records.lock();
        let id = records.len() as i64 + 1;
        records.push(quotation.clone().with_id(id));
        Ok(id)
    }

    async fn count(&self) -> Result<i64, StorageError> {
        Ok(self.records.lock().len() as i64)
    }
}

/// 按配置打开存储
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn QuotationStore>, StorageError> {
    match config.backend {
        StorageBackend::Sqlite => {
            log::info!("使用 SQLite 存储: {}", config.url);
            Ok(Arc::new(SqliteQuotationStore::connect(config).await?))
        }
        StorageBackend::Memory => {
            log::info!("使用内存存储");
            Ok(Arc::new(InMemoryQuotationStore::new()))
        }
    }
}
