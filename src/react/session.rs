//! 会话状态：迭代计数、步骤轨迹、有界对话历史、继续/停止闸门
//!
//! 不变量：iteration == steps.len()；闸门只会从 running 变为 stopped 一次（执行 Final Answer 或预算耗尽）；
//! 停止后不再追加任何步骤；历史长度不超过 memory_limit。

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::memory::{ConversationHistory, HistoryRecord};
use crate::react::observation::Observation;
use crate::react::resolver::{Action, ActionKind};

/// 会话参数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub max_iterations: usize,
    pub memory_limit: usize,
    pub instruct_continuity: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            memory_limit: 5,
            instruct_continuity: true,
        }
    }
}

/// 收敛提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "hint", content = "remaining", rename_all = "snake_case")]
pub enum ContinuationHint {
    Remaining(usize),
    ConvergeNow,
    ConvergeThisStep,
    Stopping,
}

impl ContinuationHint {
    /// mid = floor(0.7 × max)
    pub fn compute(iteration: usize, max_iterations: usize) -> Self {
        let mid = max_iterations * 7 / 10;
        if iteration >= max_iterations {
            Self::Stopping
        } else if iteration < mid {
            Self::Remaining(mid - iteration)
        } else if iteration == mid {
            Self::ConvergeNow
        } else {
            Self::ConvergeThisStep
        }
    }
}

impl fmt::Display for ContinuationHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remaining(n) => write!(f, "{n} iterations remain before you must start converging"),
            Self::ConvergeNow => f.write_str("you should converge now"),
            Self::ConvergeThisStep => f.write_str("you must converge this step"),
            Self::Stopping => f.write_str("stopping"),
        }
    }
}

/// 一步的完整记录，追加后不再修改
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Step {
    pub iteration: usize,
    pub kind: ActionKind,
    pub action: String,
    pub input: Value,
    pub observation: Observation,
    /// 距会话开始的秒数（0.1 s 精度）
    pub elapsed: f64,
    /// 本步之后给出的提示
    pub hint: Option<ContinuationHint>,
}

/// 终止原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    FinalAnswer,
    IterationBudgetExceeded,
}

/// 终止后的最终响应
#[derive(Debug, Clone, Serialize)]
pub struct FinalResponse {
    pub session_id: Uuid,
    pub agent: String,
    pub user_input: String,
    pub final_output: Value,
    pub elapsed: f64,
    pub termination: Termination,
    pub iterations: usize,
    pub history: Vec<HistoryRecord>,
    pub steps: Vec<Step>,
}

#[derive(Debug)]
pub struct Session {
    id: Uuid,
    agent: String,
    user_input: String,
    settings: SessionSettings,
    iteration: usize,
    steps: Vec<Step>,
    history: ConversationHistory,
    termination: Option<Termination>,
    hint: Option<ContinuationHint>,
    started: Instant,
}

impl Session {
    pub fn new(agent: impl Into<String>, user_input: impl Into<String>, settings: SessionSettings) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            agent: agent.into(),
            user_input: user_input.into(),
            settings,
            iteration: 0,
            steps: Vec::new(),
            history: ConversationHistory::new(settings.memory_limit),
            termination: None,
            hint: None,
            started: Instant::now(),
        };
        session.refresh_hint();
        if settings.max_iterations == 0 {
            session.termination = Some(Termination::IterationBudgetExceeded);
        }
        session
    }

    /// 带入之前的对话记录（按最新在前），超出 memory_limit 的部分丢弃
    pub fn with_history(mut self, records: Vec<HistoryRecord>) -> Self {
        self.history = ConversationHistory::with_records(self.settings.memory_limit, records);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn user_input(&self) -> &str {
        &self.user_input
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn hint(&self) -> Option<ContinuationHint> {
        self.hint
    }

    /// 闸门：true 表示还可以继续执行
    pub fn is_running(&self) -> bool {
        self.termination.is_none()
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    /// 距开始的秒数，截断到 0.1 s
    pub fn elapsed(&self) -> f64 {
        (self.started.elapsed().as_secs_f64() * 10.0).floor() / 10.0
    }

    /// 追加一步并推进计数 / 历史 / 提示 / 闸门；会话已停止时忽略并返回 None
    pub fn record_step(&mut self, action: &Action, observation: Observation, finished: bool) -> Option<&Step> {
        if !self.is_running() {
            tracing::warn!(session_id = %self.id, "Step recorded after termination ignored");
            return None;
        }

        let index = self.iteration;
        self.iteration += 1;
        self.history.record(&self.user_input, observation.value());
        self.refresh_hint();

        if finished {
            self.termination = Some(Termination::FinalAnswer);
        } else if self.iteration >= self.settings.max_iterations {
            self.termination = Some(Termination::IterationBudgetExceeded);
        }

        self.steps.push(Step {
            iteration: index,
            kind: action.kind(),
            action: action.name(),
            input: action.input(),
            observation,
            elapsed: self.elapsed(),
            hint: self.hint,
        });
        self.steps.last()
    }

    fn refresh_hint(&mut self) {
        self.hint = self
            .settings
            .instruct_continuity
            .then(|| ContinuationHint::compute(self.iteration, self.settings.max_iterations));
    }

    /// 终止后的最终响应；仍在运行时返回 None
    pub fn final_response(&self) -> Option<FinalResponse> {
        let termination = self.termination?;
        let final_output = self
            .steps
            .last()
            .map(|s| s.observation.value())
            .unwrap_or(Value::Null);
        Some(FinalResponse {
            session_id: self.id,
            agent: self.agent.clone(),
            user_input: self.user_input.clone(),
            final_output,
            elapsed: self.elapsed(),
            termination,
            iterations: self.iteration,
            history: self.history.to_vec(),
            steps: self.steps.clone(),
        })
    }
}
