//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / arguments / execute），由 ToolRegistry 按名注册与查找。
//! 注册时生成不可变的 CapabilityDescriptor；名称重复返回 DuplicateName。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::AgentError;
use crate::tools::{ArgumentSchema, CapabilityDescriptor, CapabilityKind};

/// 工具 trait：名称、描述（供模型理解）、参数声明、异步执行（args 已按声明类型转换）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（对应 JSON 中的 "action" 字段）
    fn name(&self) -> &str;

    /// 工具描述
    fn description(&self) -> &str;

    /// 参数声明；默认无参数
    fn arguments(&self) -> ArgumentSchema {
        ArgumentSchema::new()
    }

    /// 执行工具，返回值会被字符串化写入 Observation
    async fn execute(&self, args: Map<String, Value>) -> Result<String, String>;
}

struct RegisteredTool {
    descriptor: CapabilityDescriptor,
    tool: Arc<dyn Tool>,
}

/// 工具注册表：启动时填充，之后只读，可跨会话共享
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), AgentError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateName(name));
        }
        let descriptor = CapabilityDescriptor::new(
            name.clone(),
            CapabilityKind::Tool,
            tool.description(),
            tool.arguments(),
        );
        self.tools.insert(name, RegisteredTool { descriptor, tool });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&CapabilityDescriptor, AgentError> {
        self.tools
            .get(name)
            .map(|t| &t.descriptor)
            .ok_or_else(|| AgentError::CapabilityNotFound(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.tool.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn list_names(&self) -> BTreeSet<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 按名称排序的描述符 JSON，用于 prompt 中的可用工具段落
    pub fn to_description_json(&self) -> Vec<Value> {
        let mut names: Vec<&String> = self.tools.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let d = &self.tools[name].descriptor;
                serde_json::json!({
                    "name": d.name,
                    "description": d.description,
                    "arguments": d.arguments,
                })
            })
            .collect()
    }
}
