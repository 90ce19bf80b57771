//! Agent 错误类型
//!
//! AgentError 只承载「致命 / 面向调用方」的错误；可恢复错误（解析失败、能力不存在、参数不匹配、
//! 能力执行失败）不走 Err，而是作为 Observation 写回下一轮 Prompt，见 `react::dispatcher`。

use thiserror::Error;

/// 运行时致命错误：注册冲突、生成重试耗尽、取消、Agent 编排配置错误等
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Duplicate capability name: {0}")]
    DuplicateName(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Generation exhausted after {attempts} attempts: {last_error}")]
    GenerationExhausted { attempts: u32, last_error: String },

    #[error("Cancelled")]
    Cancelled,

    /// Agent schema 校验失败（head / single agent 不存在等）
    #[error("Invalid agent schema: {0}")]
    InvalidSchema(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}
