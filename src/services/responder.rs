//! 报价输出
//!
//! 服务端：把流水线结果转换为 HTTP 响应；
//! 客户端：把买入价渲染为 `Dólar: {bid}\n` 并追加到输出文件。

use std::path::{Path, PathBuf};

use actix_web::http::header::ContentType;
use actix_web::HttpResponse;
use async_trait::async_trait;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::context::RequestContext;
use crate::error::{QuotationError, Result};
use crate::models::{BidQuotation, Quotation};
use crate::services::pipeline::QuotationSink;

/// 成功返回 200 + JSON，失败返回 500 + 错误文本
pub fn quotation_response(result: Result<Quotation>) -> HttpResponse {
    match result.and_then(|q| encode(&q)) {
        Ok(body) => HttpResponse::Ok().content_type(ContentType::json()).body(body),
        Err(e) => error_response(&e),
    }
}

pub fn error_response(err: &QuotationError) -> HttpResponse {
    HttpResponse::InternalServerError()
        .content_type(ContentType::plaintext())
        .body(err.to_string())
}

fn encode(quotation: &Quotation) -> Result<Vec<u8>> {
    serde_json::to_vec(quotation).map_err(|e| QuotationError::OutputWrite(e.to_string()))
}

/// 渲染输出行
pub fn render_line(quotation: &BidQuotation) -> String {
    format!("Dólar: {}\n", quotation.bid.normalize())
}

/// 追加写入输出文件
pub struct QuotationFileWriter {
    path: PathBuf,
}

impl QuotationFileWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn append(&self, line: &str) -> Result<()> {
        let mut options = OpenOptions::new();
        options.append(true).create(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.path).await.map_err(|e| write_error(&self.path, e))?;
        file.write_all(line.as_bytes()).await.map_err(|e| write_error(&self.path, e))?;
        file.flush().await.map_err(|e| write_error(&self.path, e))?;
        Ok(())
    }
}

fn write_error(path: &Path, err: std::io::Error) -> QuotationError {
    QuotationError::OutputWrite(format!("{}: {}", path.display(), err))
}

#[async_trait]
impl QuotationSink<BidQuotation> for QuotationFileWriter {
    fn stage(&self) -> &'static str {
        "write"
    }

    async fn accept(&self, ctx: &RequestContext, quotation: BidQuotation) -> Result<BidQuotation> {
        // 先渲染再打开文件，失败时不产生任何输出
        let line = render_line(&quotation);
        ctx.run(self.stage(), self.append(&line)).await?;
        log::debug!("已写入 {}: {}", self.path.display(), line.trim_end());
        Ok(quotation)
    }
}
