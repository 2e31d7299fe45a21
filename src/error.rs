//! 错误类型
//!
//! 流水线任一阶段的失败都会以 `QuotationError` 终止整个调用

use thiserror::Error;

use crate::services::storage::StorageError;

/// 报价流水线的统一错误类型
#[derive(Error, Debug)]
pub enum QuotationError {
    /// 请求无法构造（地址非法等）
    #[error("request construction failed: {0}")]
    RequestConstruction(String),

    /// 网络/传输层失败
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// 上游返回非 2xx，附带响应体
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    /// JSON 解析失败或字段不合法
    #[error("decode error: {0}")]
    Decode(String),

    /// 上游响应中缺少期望的货币对
    #[error("{0}")]
    NotFound(String),

    /// 阶段截止时间已过或上级上下文被取消
    #[error("context deadline exceeded during {0}")]
    DeadlineExceeded(&'static str),

    /// 持久化失败
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 写入输出文件或响应体失败
    #[error("output write failed: {0}")]
    OutputWrite(String),

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for QuotationError {
    fn from(err: serde_json::Error) -> Self {
        QuotationError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for QuotationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            QuotationError::DeadlineExceeded("fetch")
        } else if err.is_builder() {
            QuotationError::RequestConstruction(err.to_string())
        } else {
            QuotationError::Transport(err)
        }
    }
}

impl QuotationError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, QuotationError::DeadlineExceeded(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, QuotationError::NotFound(_))
    }
}

/// 默认错误类型为 `QuotationError` 的 Result
pub type Result<T, E = QuotationError> = std::result::Result<T, E>;
