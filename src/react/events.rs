//! 会话过程事件：供前端流式展示生成、动作、观察、委派与结束

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::react::observation::Observation;
use crate::react::resolver::ActionKind;
use crate::react::session::Termination;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// 会话开始
    Started {
        session_id: Uuid,
        agent: String,
        depth: usize,
    },
    /// 正在请求生成（第几步）
    Thinking {
        session_id: Uuid,
        iteration: usize,
        max_iterations: usize,
    },
    /// 动作已解析
    ActionResolved {
        session_id: Uuid,
        kind: ActionKind,
        action: String,
        input: Value,
    },
    /// 开始委派子 Agent
    Delegating {
        session_id: Uuid,
        agent: String,
    },
    /// 观察结果（render 后的预览）
    Observation {
        session_id: Uuid,
        action: String,
        observation: Observation,
        preview: String,
    },
    /// 会话结束
    Finished {
        session_id: Uuid,
        termination: Termination,
        iterations: usize,
    },
    /// 致命错误
    Error { session_id: Uuid, text: String },
}
