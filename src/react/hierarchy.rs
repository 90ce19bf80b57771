//! 层级控制器：head Agent 把整段子任务委派给子 Agent
//!
//! 每次委派新建独立的子会话（自己的迭代预算与对话历史，不与 head 共享），同步跑到终止，
//! 其 final_output 折叠为 head 会话的一条 Step。子 Agent 不存在时返回 CapabilityNotFound，head 继续。
//! 深度上限由 SessionController 统一检查。

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::AgentError;
use crate::memory::HistoryRecord;
use crate::react::loop_::{Delegator, SessionController};
use crate::react::observation::{Observation, ObservationKind};
use crate::react::session::{FinalResponse, Session, SessionSettings};

pub struct HierarchicalController {
    controller: Arc<SessionController>,
    settings: SessionSettings,
}

impl HierarchicalController {
    pub fn new(controller: Arc<SessionController>, settings: SessionSettings) -> Self {
        Self {
            controller,
            settings,
        }
    }

    /// Agent 自带 max_iterations 时覆盖默认预算
    fn settings_for(&self, max_iterations: Option<usize>) -> SessionSettings {
        SessionSettings {
            max_iterations: max_iterations.unwrap_or(self.settings.max_iterations),
            ..self.settings
        }
    }

    /// 运行 head 会话；sub_agents 为空时按 head 的声明（或全部其它 Agent）确定委派名单
    pub async fn run_head(
        &self,
        head: &str,
        sub_agents: &[String],
        user_input: &str,
        history: Vec<HistoryRecord>,
        cancel: &CancellationToken,
    ) -> Result<FinalResponse, AgentError> {
        let agents = &self.controller.registries().agents;
        let spec = agents
            .spec(head)
            .ok_or_else(|| AgentError::InvalidSchema(format!("head agent `{head}` is not registered")))?;
        let roster: BTreeSet<String> = if sub_agents.is_empty() {
            agents.roster_for(spec)
        } else {
            sub_agents.iter().cloned().collect()
        };

        let session = Session::new(head, user_input, self.settings_for(spec.max_iterations)).with_history(history);
        let ctx = self.controller.context(spec, roster, 0, Some(self));
        self.controller.run(&ctx, session, cancel).await
    }
}

#[async_trait]
impl Delegator for HierarchicalController {
    async fn delegate(
        &self,
        agent: &str,
        input: Value,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<Observation, AgentError> {
        let agents = &self.controller.registries().agents;
        let spec = match agents.spec(agent) {
            Some(spec) => spec,
            None => {
                tracing::warn!(agent, "Delegation target not registered");
                return Ok(Observation::error(
                    ObservationKind::CapabilityNotFound,
                    AgentError::CapabilityNotFound(agent.to_string()).to_string(),
                ));
            }
        };

        let user_input = match input {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        };
        tracing::info!(agent, depth, "Delegating to sub-agent");

        let session = Session::new(agent, user_input, self.settings_for(spec.max_iterations));
        let ctx = self
            .controller
            .context(spec, agents.roster_for(spec), depth, Some(self));
        let response = self.controller.run(&ctx, session, cancel).await?;
        Ok(Observation::success(response.final_output))
    }
}
