//! 核心层：错误类型、能力注册表集合、执行器与构建器

pub mod builder;
pub mod error;
pub mod orchestrator;
pub mod registries;

pub use builder::ExecutorBuilder;
pub use error::AgentError;
pub use orchestrator::{create_generator_from_config, AgentExecutor};
pub use registries::Registries;
