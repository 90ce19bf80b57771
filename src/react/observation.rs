//! Observation：执行一个 Action 的结果（成功值或结构化错误），写回下一轮 prompt

use serde::Serialize;
use serde_json::Value;

/// 解析失败时写回的固定诊断
pub const PARSE_DIAGNOSTIC: &str =
    "Problem occurred in parsing - reconsider the action and answer with exactly one fenced ```json block";
/// 名称既不是 Agent、包也不是工具时写回的固定诊断
pub const NAME_DIAGNOSTIC: &str =
    "Problem occurred in calling name, you have missed a named agent, package or tool - reconsider the action";
/// 委派深度已满时写回的固定诊断
pub const DELEGATION_DIAGNOSTIC: &str =
    "Delegation to another agent is not available here - use the available tools or give a Final Answer";

/// 可恢复错误种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservationKind {
    ParseError,
    CapabilityNotFound,
    ArgumentMismatch,
    CapabilityExecutionError,
    DelegationRejected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Observation {
    Success { value: Value },
    Error { kind: ObservationKind, message: String },
}

impl Observation {
    pub fn success(value: impl Into<Value>) -> Self {
        Self::Success {
            value: value.into(),
        }
    }

    pub fn error(kind: ObservationKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn error_kind(&self) -> Option<ObservationKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            Self::Success { .. } => None,
        }
    }

    /// 作为会话输出的值：成功取 value，错误取 message
    pub fn value(&self) -> Value {
        match self {
            Self::Success { value } => value.clone(),
            Self::Error { message, .. } => Value::String(message.clone()),
        }
    }

    /// 渲染为 prompt 文本：字符串原样输出，其余按 JSON
    pub fn render(&self) -> String {
        match self {
            Self::Success { value: Value::String(s) } => s.clone(),
            Self::Success { value } => value.to_string(),
            Self::Error { kind, message } => {
                let kind = serde_json::to_value(kind)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                format!("Error ({kind}): {message}")
            }
        }
    }
}
