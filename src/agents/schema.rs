//! Agent 编排 schema：单 Agent / 多 Agent（head + sub_agents）
//!
//! 运行前校验：single / head Agent 必须存在，否则返回 InvalidSchema；
//! 未注册的子 Agent 只记 warn，仍留在名单中（委派时折叠为 CapabilityNotFound）。

use serde::{Deserialize, Serialize};

use crate::agents::AgentRegistry;
use crate::core::AgentError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AgentSchema {
    Single { agent: String },
    Multi { head: String, sub_agents: Vec<String> },
}

impl AgentSchema {
    pub fn single(agent: impl Into<String>) -> Self {
        Self::Single {
            agent: agent.into(),
        }
    }

    pub fn multi<I, S>(head: impl Into<String>, sub_agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Multi {
            head: head.into(),
            sub_agents: sub_agents.into_iter().map(Into::into).collect(),
        }
    }

    /// 驱动顶层会话的 Agent 名
    pub fn entry_agent(&self) -> &str {
        match self {
            Self::Single { agent } => agent,
            Self::Multi { head, .. } => head,
        }
    }

    pub fn validate(&self, agents: &AgentRegistry) -> Result<(), AgentError> {
        match self {
            Self::Single { agent } => {
                if !agents.contains(agent) {
                    return Err(AgentError::InvalidSchema(format!(
                        "single agent '{agent}' is not registered"
                    )));
                }
            }
            Self::Multi { head, sub_agents } => {
                if !agents.contains(head) {
                    return Err(AgentError::InvalidSchema(format!(
                        "head agent '{head}' is not registered"
                    )));
                }
                for sub in sub_agents.iter().filter(|s| !agents.contains(s)) {
                    tracing::warn!(head = %head, sub_agent = %sub, "Sub-agent is not registered");
                }
            }
        }
        Ok(())
    }
}
