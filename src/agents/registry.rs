//! Agent 注册表
//!
//! AgentSpec 描述一个可运行的 Agent（prompt 前缀/后缀、迭代预算、可委派的子 Agent）。
//! 注册后不可变；查找为精确、大小写敏感匹配。

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;
use crate::tools::{ArgumentSchema, CapabilityDescriptor, CapabilityKind};

const DEFAULT_PREFIX: &str = "You are a helpful agent. Solve the user's request step by step, \
using the available actions when they help.";
const DEFAULT_SUFFIX: &str = "Respond with exactly one fenced ```json block containing \
{\"action\": ..., \"action_input\": ...}. Use \"Final Answer\" as the action once you have the answer.";

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

/// Agent 定义（也可直接从配置 `[[agents]]` 反序列化）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// 覆盖会话默认迭代预算
    #[serde(default)]
    pub max_iterations: Option<usize>,
    /// 可委派的子 Agent；为空时可委派给除自身外的所有已注册 Agent
    #[serde(default)]
    pub sub_agents: Vec<String>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            prefix: default_prefix(),
            suffix: default_suffix(),
            max_iterations: None,
            sub_agents: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_sub_agents<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_agents = names.into_iter().map(Into::into).collect();
        self
    }
}

struct RegisteredAgent {
    descriptor: CapabilityDescriptor,
    spec: AgentSpec,
}

#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, RegisteredAgent>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: AgentSpec) -> Result<(), AgentError> {
        if self.agents.contains_key(&spec.name) {
            return Err(AgentError::DuplicateName(spec.name));
        }
        // 委派入参不做键校验，action_input 原样作为子会话输入
        let descriptor = CapabilityDescriptor::new(
            spec.name.clone(),
            CapabilityKind::Agent,
            spec.description.clone(),
            ArgumentSchema::new(),
        );
        self.agents
            .insert(spec.name.clone(), RegisteredAgent { descriptor, spec });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&CapabilityDescriptor, AgentError> {
        self.agents
            .get(name)
            .map(|a| &a.descriptor)
            .ok_or_else(|| AgentError::CapabilityNotFound(name.to_string()))
    }

    pub fn spec(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.get(name).map(|a| &a.spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn list_names(&self) -> BTreeSet<String> {
        self.agents.keys().cloned().collect()
    }

    /// 某个 Agent 可委派的名单：显式声明的 sub_agents，否则为其它所有已注册 Agent
    pub fn roster_for(&self, spec: &AgentSpec) -> BTreeSet<String> {
        if spec.sub_agents.is_empty() {
            self.agents
                .keys()
                .filter(|n| **n != spec.name)
                .cloned()
                .collect()
        } else {
            spec.sub_agents.iter().cloned().collect()
        }
    }

    /// prompt 用的 Agent 描述（仅名单内、且已注册的 Agent）
    pub fn to_description_json(&self, roster: &BTreeSet<String>) -> Vec<Value> {
        roster
            .iter()
            .map(|name| match self.agents.get(name) {
                Some(a) => serde_json::json!({
                    "action": name,
                    "description": a.spec.description,
                }),
                None => serde_json::json!({ "action": name }),
            })
            .collect()
    }
}
