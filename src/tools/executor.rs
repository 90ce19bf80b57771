//! 能力调用执行器
//!
//! 对每次工具 / 包内工具调用施加超时与有界尝试次数，等待期间响应取消令牌；
//! 每次调用输出结构化审计日志（JSON）。

use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// 单次能力调用失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvokeError {
    #[error("{0}")]
    Failed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,
}

/// 能力执行器：超时 + 尝试次数（默认 1，即不自动重放有副作用的工具）
#[derive(Debug, Clone, Copy)]
pub struct CapabilityExecutor {
    timeout: Duration,
    max_attempts: u32,
}

impl Default for CapabilityExecutor {
    fn default() -> Self {
        Self::new(30, 1)
    }
}

impl CapabilityExecutor {
    pub fn new(timeout_secs: u64, max_attempts: u32) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
            max_attempts: max_attempts.max(1),
        }
    }

    /// 执行一次能力调用；`call` 每次尝试都会以同一份参数重新调用
    pub async fn invoke<F, Fut>(
        &self,
        name: &str,
        args: Map<String, Value>,
        cancel: &CancellationToken,
        call: F,
    ) -> Result<String, InvokeError>
    where
        F: Fn(Map<String, Value>) -> Fut,
        Fut: Future<Output = Result<String, String>>,
    {
        let args_preview = args_preview(&args);
        let mut last = InvokeError::Failed("not invoked".to_string());

        for attempt in 1..=self.max_attempts {
            let start = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(InvokeError::Cancelled),
                r = tokio::time::timeout(self.timeout, call(args.clone())) => r,
            };

            let (ok, outcome): (bool, &str) = match &result {
                Ok(Ok(_)) => (true, "ok"),
                Ok(Err(_)) => (false, "error"),
                Err(_) => (false, "timeout"),
            };
            let audit = serde_json::json!({
                "event": "capability_audit",
                "capability": name,
                "attempt": attempt,
                "ok": ok,
                "outcome": outcome,
                "duration_ms": start.elapsed().as_millis() as u64,
                "args_preview": args_preview,
            });
            tracing::info!(audit = %audit, "capability");

            match result {
                Ok(Ok(content)) => return Ok(content),
                Ok(Err(e)) => last = InvokeError::Failed(e),
                Err(_) => last = InvokeError::Timeout(self.timeout),
            }
        }
        Err(last)
    }
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
