//! agentexec - Agent 执行运行时
//!
//! 把生成后端产出的自由文本解析为结构化动作，路由到工具 / 工具包 / 子 Agent 执行，
//! 结果写回有界的步骤与对话历史，驱动下一轮生成。
//!
//! 模块划分：
//! - **agents**: Agent 定义、注册表与单 / 多 Agent 编排 schema
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、注册表集合、执行器与构建器
//! - **llm**: Generator 抽象、超时重试与实现（OpenAI 兼容 / Mock / 脚本）
//! - **memory**: 有界对话历史
//! - **observability**: 日志初始化
//! - **react**: 解析、归类、调度、会话状态、主循环与层级委派
//! - **tools**: 工具 / 工具包注册表、参数校验、调用执行器与演示能力

pub mod agents;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

pub use crate::agents::{AgentSchema, AgentSpec};
pub use crate::core::{AgentError, AgentExecutor, ExecutorBuilder, Registries};
pub use crate::react::FinalResponse;
