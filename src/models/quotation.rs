//! 报价数据模型
//!
//! 与上游 API 的字段保持一致：十进制字段和时间戳在 JSON 中均为字符串

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 可以提供买入价的报价记录
pub trait Priced {
    fn bid(&self) -> Decimal;
}

/// 完整报价（服务端视图）
///
/// 构造后不再修改；持久化通过 `with_id` 返回带标识的新值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    /// 存储分配的标识，持久化前为空
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// 货币代码
    pub code: String,
    /// 对手货币代码
    pub codein: String,
    /// 显示名称
    pub name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    /// 涨跌额
    #[serde(rename = "varBid", with = "rust_decimal::serde::str")]
    pub var_bid: Decimal,
    /// 涨跌幅（百分比）
    #[serde(rename = "pctChange", with = "rust_decimal::serde::str")]
    pub pct_change: Decimal,
    /// 买入价
    #[serde(with = "rust_decimal::serde::str")]
    pub bid: Decimal,
    /// 卖出价
    #[serde(with = "rust_decimal::serde::str")]
    pub ask: Decimal,
    /// Unix 时间戳
    #[serde(with = "timestamp_str")]
    pub timestamp: i64,
    pub create_date: String,
}

impl Quotation {
    /// 返回带存储标识的副本
    pub fn with_id(self, id: i64) -> Self {
        Self { id: Some(id), ..self }
    }
}

impl Priced for Quotation {
    fn bid(&self) -> Decimal {
        self.bid
    }
}

/// 客户端视图，只关心买入价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidQuotation {
    #[serde(with = "rust_decimal::serde::str")]
    pub bid: Decimal,
}

impl Priced for BidQuotation {
    fn bid(&self) -> Decimal {
        self.bid
    }
}

mod timestamp_str {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.trim().parse().map_err(de::Error::custom)
    }
}
