//! 请求上下文
//!
//! 一次调用共享一个根上下文，每个阶段从中派生带截止时间的子上下文。
//! 根上下文被取消时，正在进行的阶段立即以 `DeadlineExceeded` 结束。

use std::future::{pending, Future};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::error::{QuotationError, Result};

/// 可取消、可带截止时间的上下文
#[derive(Debug, Clone)]
pub struct RequestContext {
    deadline: Option<Instant>,
    cancelled: Option<watch::Receiver<bool>>,
}

/// 根上下文的取消句柄
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// 取消所有由该句柄派生的上下文
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl RequestContext {
    /// 永不取消、无截止时间的根上下文
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancelled: None,
        }
    }

    /// 创建可被外部取消的根上下文
    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        let ctx = Self {
            deadline: None,
            cancelled: Some(rx),
        };
        (ctx, CancelHandle { tx })
    }

    /// 派生子上下文，截止时间取父上下文与 now + timeout 中较早者
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(parent) if parent < candidate => parent,
            _ => candidate,
        };
        Self {
            deadline: Some(deadline),
            cancelled: self.cancelled.clone(),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// 已被取消或截止时间已过
    pub fn is_done(&self) -> bool {
        self.is_cancelled() || self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// 在上下文约束下执行 `fut`
    ///
    /// 截止时间到达或上下文被取消时丢弃 `fut`，释放其持有的连接或事务
    pub async fn run<T, F>(&self, stage: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if self.is_cancelled() {
            return Err(QuotationError::DeadlineExceeded(stage));
        }

        let expired = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = wait_cancelled(self.cancelled.clone()) => Err(QuotationError::DeadlineExceeded(stage)),
            _ = expired => Err(QuotationError::DeadlineExceeded(stage)),
            result = fut => result,
        }
    }
}

async fn wait_cancelled(rx: Option<watch::Receiver<bool>>) {
    let Some(mut rx) = rx else {
        return pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // 发送端被丢弃且未取消：永不取消
        if rx.changed().await.is_err() {
            return pending().await;
        }
    }
}
