//! 生成后端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock / 测试脚本）实现 Generator：输入完整 prompt，输出原始文本。

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// 单次生成调用的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Empty response")]
    EmptyResponse,
}

/// 文本生成后端
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str {
        "generator"
    }

    /// 累计 token 用量 (prompt, completion, total)；后端不统计时为 None
    fn token_usage(&self) -> Option<(u64, u64, u64)> {
        None
    }
}
