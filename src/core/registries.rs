//! 三个能力注册表的只读集合
//!
//! 启动时构建一次，之后以 `Arc<Registries>` 在所有会话间共享读取；没有全局单例。

use crate::agents::{AgentRegistry, AgentSpec};
use crate::core::AgentError;
use crate::tools::{Package, PackageRegistry, Tool, ToolRegistry};

#[derive(Default)]
pub struct Registries {
    pub tools: ToolRegistry,
    pub packages: PackageRegistry,
    pub agents: AgentRegistry,
}

impl Registries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Result<Self, AgentError> {
        self.tools.register(tool)?;
        Ok(self)
    }

    pub fn with_package(mut self, package: impl Package + 'static) -> Result<Self, AgentError> {
        self.packages.register(package)?;
        Ok(self)
    }

    pub fn with_agent(mut self, spec: AgentSpec) -> Result<Self, AgentError> {
        self.agents.register(spec)?;
        Ok(self)
    }
}
