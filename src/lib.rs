//! 美元报价中继
//!
//! 从上游经济数据 API 获取 USD-BRL 报价，服务端持久化后以 JSON 返回，
//! 客户端把买入价追加写入文本文件。每个阶段都有独立的截止时间。

pub mod config;   // 配置
pub mod context;  // 请求上下文
pub mod error;    // 错误类型
pub mod handlers; // HTTP 请求处理器
pub mod models;   // 数据模型定义
pub mod services; // 业务逻辑服务

pub use error::{QuotationError, Result};
