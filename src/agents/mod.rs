//! Agent 层：Agent 定义与注册表、单 / 多 Agent 编排 schema

pub mod registry;
pub mod schema;

pub use registry::{AgentRegistry, AgentSpec};
pub use schema::AgentSchema;
