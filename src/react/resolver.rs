//! 动作解析：把 ParsedPayload 归类为封闭的 Action 变体
//!
//! 优先级固定（先命中者胜）：解析失败 → Final Answer → Agent → `包#工具` → 工具 → 未找到。
//! Agent 先于工具检查，同名时一律视为 AgentCall。

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::react::parser::{ParseFailure, ParsedPayload};
use crate::tools::{PackageRegistry, ToolRegistry, PACKAGE_SEPARATOR};

/// 结束动作名
pub const FINAL_ANSWER: &str = "Final Answer";

/// 无法解析为可执行动作的原因
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "name", rename_all = "snake_case")]
pub enum UnresolvedReason {
    ParseFailed,
    NameNotFound(String),
    /// 不允许委派：单 Agent 模式、名单外或深度已达上限
    DelegationRejected(String),
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParseFailed => f.write_str("parse failed"),
            Self::NameNotFound(_) => f.write_str("name not found"),
            Self::DelegationRejected(_) => f.write_str("delegation rejected"),
        }
    }
}

/// 每轮新建、不可变的动作
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FinalAnswer(Value),
    AgentCall { agent: String, input: Value },
    PackageCall { package: String, tool: String, input: Value },
    ToolCall { tool: String, input: Value },
    Unresolved(UnresolvedReason),
}

/// Step 中记录的动作种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Final,
    Agent,
    Package,
    Tool,
    Unresolved,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::FinalAnswer(_) => ActionKind::Final,
            Self::AgentCall { .. } => ActionKind::Agent,
            Self::PackageCall { .. } => ActionKind::Package,
            Self::ToolCall { .. } => ActionKind::Tool,
            Self::Unresolved(_) => ActionKind::Unresolved,
        }
    }

    /// 动作名（包内工具为完整地址）
    pub fn name(&self) -> String {
        match self {
            Self::FinalAnswer(_) => FINAL_ANSWER.to_string(),
            Self::AgentCall { agent, .. } => agent.clone(),
            Self::PackageCall { package, tool, .. } => format!("{package}{PACKAGE_SEPARATOR}{tool}"),
            Self::ToolCall { tool, .. } => tool.clone(),
            Self::Unresolved(UnresolvedReason::ParseFailed) => "parse".to_string(),
            Self::Unresolved(UnresolvedReason::NameNotFound(n))
            | Self::Unresolved(UnresolvedReason::DelegationRejected(n)) => n.clone(),
        }
    }

    pub fn input(&self) -> Value {
        match self {
            Self::FinalAnswer(input)
            | Self::AgentCall { input, .. }
            | Self::PackageCall { input, .. }
            | Self::ToolCall { input, .. } => input.clone(),
            Self::Unresolved(_) => Value::Null,
        }
    }
}

/// 解析作用域：工具表、包表，以及全部 Agent 名字（是否允许委派由会话控制器判断）
pub struct ResolveScope<'a> {
    pub tools: &'a ToolRegistry,
    pub packages: &'a PackageRegistry,
    pub agents: &'a BTreeSet<String>,
}

/// 归类解析结果
pub fn resolve(parsed: &Result<ParsedPayload, ParseFailure>, scope: &ResolveScope<'_>) -> Action {
    let payload = match parsed {
        Ok(p) => p,
        Err(_) => return Action::Unresolved(UnresolvedReason::ParseFailed),
    };
    let name = payload.action.as_str();
    let input = payload.action_input.clone();

    if name == FINAL_ANSWER {
        return Action::FinalAnswer(input);
    }
    if scope.agents.contains(name) {
        return Action::AgentCall {
            agent: name.to_string(),
            input,
        };
    }
    if let Some((package, tool)) = name.split_once(PACKAGE_SEPARATOR) {
        if scope.packages.contains(package) {
            return Action::PackageCall {
                package: package.to_string(),
                tool: tool.to_string(),
                input,
            };
        }
    }
    if scope.tools.contains(name) {
        return Action::ToolCall {
            tool: name.to_string(),
            input,
        };
    }
    Action::Unresolved(UnresolvedReason::NameNotFound(name.to_string()))
}
