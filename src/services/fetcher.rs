//! 报价获取
//!
//! 对上游发起一次受截止时间约束的 GET 请求，并把 JSON 响应解析为报价记录。
//! 响应可以直接是报价对象，也可以是以货币对为键的映射。

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::context::RequestContext;
use crate::error::{QuotationError, Result};
use crate::models::Priced;

/// 报价来源
#[async_trait]
pub trait QuotationSource<T>: Send + Sync {
    /// 在 `ctx` 的约束下获取一条报价
    async fn fetch(&self, ctx: &RequestContext) -> Result<T>;
}

/// 上游响应的形状
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// 响应体即报价对象
    Bare,
    /// 响应体为 { "<key>": 报价对象 }
    Keyed(String),
}

/// 基于 HTTP 的报价来源
pub struct HttpFetcher<T> {
    client: Client,
    url: Url,
    shape: ResponseShape,
    _record: PhantomData<fn() -> T>,
}

/// 创建共享的 HTTP 客户端
pub fn http_client(connect_timeout: Duration) -> Result<Client> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| QuotationError::RequestConstruction(e.to_string()))
}

impl<T> HttpFetcher<T> {
    pub fn new(client: Client, url: &str, shape: ResponseShape) -> Result<Self> {
        let url = Url::parse(url)
            .map_err(|e| QuotationError::RequestConstruction(format!("{}: {}", url, e)))?;
        Ok(Self {
            client,
            url,
            shape,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned + Priced> HttpFetcher<T> {
    /// 发送请求并读取完整响应体
    async fn load(&self) -> Result<Vec<u8>> {
        let request = self
            .client
            .get(self.url.clone())
            .header("Accept", "application/json")
            .build()
            .map_err(|e| QuotationError::RequestConstruction(e.to_string()))?;

        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(QuotationError::UpstreamStatus {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }

        Ok(body.to_vec())
    }

    /// 按响应形状解析报价
    fn decode(&self, body: &[u8]) -> Result<T> {
        let record: T = match &self.shape {
            ResponseShape::Bare => serde_json::from_slice(body)?,
            ResponseShape::Keyed(key) => {
                let mut values: serde_json::Map<String, Value> = serde_json::from_slice(body)?;
                let value = values
                    .remove(key)
                    .ok_or_else(|| QuotationError::NotFound(format!("not found {}", key)))?;
                serde_json::from_value(value)?
            }
        };

        if record.bid() <= Decimal::ZERO {
            return Err(QuotationError::Decode(format!("bid must be positive, got {}", record.bid())));
        }

        Ok(record)
    }
}

#[async_trait]
impl<T> QuotationSource<T> for HttpFetcher<T>
where
    T: DeserializeOwned + Priced + Send + 'static,
{
    async fn fetch(&self, ctx: &RequestContext) -> Result<T> {
        log::debug!("请求报价: {}", self.url);
        let body = ctx.run("fetch", self.load()).await?;
        self.decode(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BidQuotation, Quotation};
    use std::str::FromStr;

    fn fetcher<T>(shape: ResponseShape) -> HttpFetcher<T> {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpFetcher::new(client, "http://127.0.0.1:1/cotacao", shape).unwrap()
    }

    const KEYED: &str = r#"{"USDBRL":{"code":"USD","codein":"BRL","name":"Dólar Americano/Real Brasileiro",
        "high":"5.45","low":"5.40","varBid":"0.01","pctChange":"0.2","bid":"5.43","ask":"5.44",
        "timestamp":"1700000000","create_date":"2023-11-14 19:13:20"}}"#;

    #[test]
    fn test_decode_keyed_payload() {
        let f = fetcher::<Quotation>(ResponseShape::Keyed("USDBRL".to_string()));
        let q = f.decode(KEYED.as_bytes()).unwrap();
        assert_eq!(q.bid, Decimal::from_str("5.43").unwrap());
        assert_eq!(q.codein, "BRL");
    }

    #[test]
    fn test_decode_keyed_payload_missing_key() {
        let f = fetcher::<Quotation>(ResponseShape::Keyed("EURBRL".to_string()));
        let err = f.decode(KEYED.as_bytes()).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found EURBRL");
    }

    #[test]
    fn test_decode_keyed_ignores_unrelated_entries() {
        let f = fetcher::<BidQuotation>(ResponseShape::Keyed("USDBRL".to_string()));
        let body = r#"{"EURBRL": "garbage", "USDBRL": {"bid": "5.43"}}"#;
        let q = f.decode(body.as_bytes()).unwrap();
        assert_eq!(q.bid, Decimal::from_str("5.43").unwrap());
    }

    #[test]
    fn test_decode_bare_payload() {
        let f = fetcher::<BidQuotation>(ResponseShape::Bare);
        let q = f.decode(br#"{"id": 3, "bid": "5.43", "ask": "5.44"}"#).unwrap();
        assert_eq!(q.bid, Decimal::from_str("5.43").unwrap());
    }

    #[test]
    fn test_decode_rejects_malformed_and_non_positive() {
        let f = fetcher::<BidQuotation>(ResponseShape::Bare);
        assert!(matches!(f.decode(b"{not json"), Err(QuotationError::Decode(_))));
        assert!(matches!(f.decode(br#"{"bid": "0"}"#), Err(QuotationError::Decode(_))));
        assert!(matches!(f.decode(br#"{"bid": "-1.5"}"#), Err(QuotationError::Decode(_))));
    }

    #[test]
    fn test_invalid_url_is_request_construction_error() {
        let result = HttpFetcher::<BidQuotation>::new(Client::new(), "://nope", ResponseShape::Bare);
        assert!(matches!(result, Err(QuotationError::RequestConstruction(_))));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        // 端口 1 上没有服务
        let f = fetcher::<BidQuotation>(ResponseShape::Bare);
        let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
        let err = f.fetch(&ctx).await.unwrap_err();
        assert!(matches!(err, QuotationError::Transport(_)), "unexpected error: {:?}", err);
    }
}
