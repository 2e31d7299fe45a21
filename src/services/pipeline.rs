//! 流水线协调器
//!
//! 按顺序执行 获取 → 交付（持久化或写文件），任一阶段失败立即终止。
//! 每个阶段从调用方上下文派生独立的截止时间。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::Result;
use crate::services::fetcher::QuotationSource;

/// 获取之后的交付阶段
#[async_trait]
pub trait QuotationSink<T>: Send + Sync {
    /// 阶段名称，用于日志与超时错误
    fn stage(&self) -> &'static str;

    /// 接收报价，返回交付后的报价
    async fn accept(&self, ctx: &RequestContext, quotation: T) -> Result<T>;
}

/// 各阶段超时
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    pub fetch: Duration,
    /// 为空时只受调用方上下文约束
    pub deliver: Option<Duration>,
}

/// 流水线状态
///
/// `Start → Fetched → Delivered → Responded`，任一步失败即为 `Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Fetched,
    /// 已持久化（服务端）或已写入文件（客户端）
    Delivered,
    /// 结果已交给调用方
    Responded,
    Failed,
}

impl Stage {
    /// 结果交给调用方之后的状态
    pub fn respond(self, succeeded: bool) -> Stage {
        match self {
            Stage::Delivered if succeeded => Stage::Responded,
            _ => Stage::Failed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Fetched => "fetched",
            Stage::Delivered => "delivered",
            Stage::Responded => "responded",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 报价流水线协调器
pub struct Coordinator<T> {
    source: Arc<dyn QuotationSource<T>>,
    sink: Arc<dyn QuotationSink<T>>,
    timeouts: StageTimeouts,
}

impl<T: Send + 'static> Coordinator<T> {
    pub fn new(
        source: Arc<dyn QuotationSource<T>>,
        sink: Arc<dyn QuotationSink<T>>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self { source, sink, timeouts }
    }

    pub fn timeouts(&self) -> StageTimeouts {
        self.timeouts
    }

    /// 在 `ctx` 下执行一次完整流水线
    pub async fn run(&self, ctx: &RequestContext) -> Result<T> {
        self.run_traced(ctx).await.1
    }

    /// 执行流水线，同时返回最终状态
    pub async fn run_traced(&self, ctx: &RequestContext) -> (Stage, Result<T>) {
        let mut stage = Stage::Start;
        let result = self.advance(ctx, &mut stage).await;

        match &result {
            Ok(_) => {
                log::debug!("流水线完成: {}", stage);
                (stage, result)
            }
            Err(e) => {
                log::warn!("流水线在 {} 之后失败: {}", stage, e);
                (Stage::Failed, result)
            }
        }
    }

    async fn advance(&self, ctx: &RequestContext, stage: &mut Stage) -> Result<T> {
        let fetch_ctx = ctx.with_timeout(self.timeouts.fetch);
        let quotation = self.source.fetch(&fetch_ctx).await?;
        *stage = Stage::Fetched;

        let deliver_ctx = match self.timeouts.deliver {
            Some(timeout) => ctx.with_timeout(timeout),
            None => ctx.clone(),
        };
        log::debug!("进入 {} 阶段", self.sink.stage());
        let delivered = self.sink.accept(&deliver_ctx, quotation).await?;
        *stage = Stage::Delivered;

        Ok(delivered)
    }
}
