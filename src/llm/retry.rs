//! 生成调用的超时 + 有界重试
//!
//! 每次尝试都有独立超时；失败后按 backoff 等待（默认 0，即立即重试），尝试次数用尽返回 GenerationExhausted。
//! 等待期间与取消令牌竞争，取消立即返回 Cancelled。

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::llm::{GenerationError, Generator};

/// 有界重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(60),
            backoff: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            backoff: Duration::ZERO,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }
}

/// 带超时与重试地调用 generator
pub async fn generate_with_retry(
    generator: &dyn Generator,
    prompt: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<String, AgentError> {
    let attempts = policy.max_attempts.max(1);
    let mut last_error = GenerationError::EmptyResponse;

    for attempt in 1..=attempts {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            r = tokio::time::timeout(policy.timeout, generator.generate(prompt)) => r,
        };

        match result {
            Ok(Ok(text)) if !text.trim().is_empty() => return Ok(text),
            Ok(Ok(_)) => last_error = GenerationError::EmptyResponse,
            Ok(Err(e)) => last_error = e,
            Err(_) => last_error = GenerationError::Timeout(policy.timeout),
        }

        tracing::warn!(
            generator = generator.name(),
            attempt,
            max_attempts = attempts,
            error = %last_error,
            "Generation failed"
        );

        if attempt < attempts && !policy.backoff.is_zero() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                _ = tokio::time::sleep(policy.backoff) => {}
            }
        }
    }

    tracing::error!(generator = generator.name(), attempts, "Maximum generation retries reached");
    Err(AgentError::GenerationExhausted {
        attempts,
        last_error: last_error.to_string(),
    })
}
