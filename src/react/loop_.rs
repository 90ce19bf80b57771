//! 会话主循环
//!
//! 每一步：拼 prompt → 生成（超时 + 有界重试）→ 解析 → 归类 → 调度 → 追加 Step；直到闸门关闭。
//! AgentCall 通过 Delegator 交给层级控制器；委派深度达到上限时记为 Unresolved(DelegationRejected)。
//! 可选 event_tx：向前端推送 Started / Thinking / ActionResolved / Delegating / Observation / Finished。

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::agents::AgentSpec;
use crate::core::{AgentError, Registries};
use crate::llm::{generate_with_retry, Generator, RetryPolicy};
use crate::react::dispatcher::{unresolved_observation, Dispatch, Dispatcher};
use crate::react::events::SessionEvent;
use crate::react::observation::Observation;
use crate::react::parser::parse_output;
use crate::react::prompt::{build_prompt, capability_catalog};
use crate::react::resolver::{resolve, Action, ResolveScope, UnresolvedReason};
use crate::react::session::{FinalResponse, Session};

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

/// 委派接口：把一个 AgentCall 跑成完整子会话，结果折叠为一条 Observation
#[async_trait]
pub trait Delegator: Send + Sync {
    /// depth 为子会话所在层级（head 为 0）
    async fn delegate(
        &self,
        agent: &str,
        input: Value,
        depth: usize,
        cancel: &CancellationToken,
    ) -> Result<Observation, AgentError>;
}

/// 单个会话运行时的 Agent 上下文
pub struct AgentContext<'a> {
    pub spec: &'a AgentSpec,
    /// 解析器识别为 AgentCall 的名字：全部已注册 Agent 加上声明但未注册的子 Agent
    pub agents: BTreeSet<String>,
    /// 可委派的 Agent 名单；名单外的 AgentCall 记为 DelegationRejected
    pub roster: BTreeSet<String>,
    pub depth: usize,
    pub delegator: Option<&'a dyn Delegator>,
    catalog: Value,
}

/// 会话控制器：持有生成器、调度器与策略，本身无可变状态，可在并发会话间共享
pub struct SessionController {
    generator: Arc<dyn Generator>,
    dispatcher: Dispatcher,
    retry: RetryPolicy,
    max_depth: usize,
    event_tx: Option<UnboundedSender<SessionEvent>>,
}

impl SessionController {
    pub fn new(generator: Arc<dyn Generator>, dispatcher: Dispatcher) -> Self {
        Self {
            generator,
            dispatcher,
            retry: RetryPolicy::default(),
            max_depth: 1,
            event_tx: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// 委派深度上限（0 表示禁止任何委派）
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn registries(&self) -> &Registries {
        self.dispatcher.registries()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// 构建上下文；没有 delegator 时名单强制为空（单 Agent 模式不委派）
    pub fn context<'a>(
        &self,
        spec: &'a AgentSpec,
        roster: BTreeSet<String>,
        depth: usize,
        delegator: Option<&'a dyn Delegator>,
    ) -> AgentContext<'a> {
        let mut agents = self.registries().agents.list_names();
        agents.extend(roster.iter().cloned());
        let roster = if delegator.is_some() { roster } else { BTreeSet::new() };
        let catalog = capability_catalog(self.registries(), &roster);
        AgentContext {
            spec,
            agents,
            roster,
            depth,
            delegator,
            catalog,
        }
    }

    fn may_delegate(&self, ctx: &AgentContext<'_>, agent: &str) -> bool {
        ctx.delegator.is_some() && ctx.depth < self.max_depth && ctx.roster.contains(agent)
    }

    fn send_event(&self, ev: SessionEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 运行会话直至终止；生成重试耗尽或取消时返回 Err，不追加该步
    pub async fn run(
        &self,
        ctx: &AgentContext<'_>,
        mut session: Session,
        cancel: &CancellationToken,
    ) -> Result<FinalResponse, AgentError> {
        tracing::info!(
            session_id = %session.id(),
            agent = ctx.spec.name.as_str(),
            depth = ctx.depth,
            max_iterations = session.settings().max_iterations,
            "Session started"
        );
        self.send_event(SessionEvent::Started {
            session_id: session.id(),
            agent: ctx.spec.name.clone(),
            depth: ctx.depth,
        });

        loop {
            if let Some(response) = session.final_response() {
                let (prompt_tokens, completion_tokens, total_tokens) =
                    self.generator.token_usage().unwrap_or_default();
                tracing::info!(
                    session_id = %response.session_id,
                    agent = response.agent.as_str(),
                    iterations = response.iterations,
                    termination = ?response.termination,
                    elapsed = response.elapsed,
                    prompt_tokens,
                    completion_tokens,
                    total_tokens,
                    "Session finished"
                );
                self.send_event(SessionEvent::Finished {
                    session_id: response.session_id,
                    termination: response.termination,
                    iterations: response.iterations,
                });
                return Ok(response);
            }
            if let Err(e) = self.step(ctx, &mut session, cancel).await {
                tracing::error!(session_id = %session.id(), error = %e, "Session aborted");
                self.send_event(SessionEvent::Error {
                    session_id: session.id(),
                    text: e.to_string(),
                });
                return Err(e);
            }
        }
    }

    /// 执行一步；会话已停止时什么也不做
    pub async fn step(
        &self,
        ctx: &AgentContext<'_>,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        if !session.is_running() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        self.send_event(SessionEvent::Thinking {
            session_id: session.id(),
            iteration: session.iteration(),
            max_iterations: session.settings().max_iterations,
        });
        let prompt = build_prompt(ctx.spec, &ctx.catalog, session);
        let text = generate_with_retry(self.generator.as_ref(), &prompt, &self.retry, cancel).await?;

        let parsed = parse_output(&text);
        if let Err(failure) = &parsed {
            tracing::debug!(session_id = %session.id(), ?failure, "Generated text did not parse");
        }
        let scope = ResolveScope {
            tools: &self.registries().tools,
            packages: &self.registries().packages,
            agents: &ctx.agents,
        };
        let action = match resolve(&parsed, &scope) {
            Action::AgentCall { agent, .. } if !self.may_delegate(ctx, &agent) => {
                tracing::warn!(
                    session_id = %session.id(),
                    agent = agent.as_str(),
                    depth = ctx.depth,
                    max_depth = self.max_depth,
                    in_roster = ctx.roster.contains(&agent),
                    "Delegation rejected"
                );
                Action::Unresolved(UnresolvedReason::DelegationRejected(agent))
            }
            other => other,
        };
        self.send_event(SessionEvent::ActionResolved {
            session_id: session.id(),
            kind: action.kind(),
            action: action.name(),
            input: action.input(),
        });

        let (observation, finished) = match self.dispatcher.dispatch(&action, cancel).await? {
            Dispatch::Observed(o) => (o, false),
            Dispatch::Finished(o) => (o, true),
            Dispatch::Delegate { agent, input } => match ctx.delegator {
                Some(delegator) => {
                    self.send_event(SessionEvent::Delegating {
                        session_id: session.id(),
                        agent: agent.clone(),
                    });
                    (delegator.delegate(&agent, input, ctx.depth + 1, cancel).await?, false)
                }
                None => (
                    unresolved_observation(&UnresolvedReason::DelegationRejected(agent)),
                    false,
                ),
            },
        };

        tracing::debug!(
            session_id = %session.id(),
            iteration = session.iteration(),
            action = action.name().as_str(),
            ok = observation.is_success(),
            "Step completed"
        );
        let rendered = observation.render();
        let preview: String = rendered.chars().take(OBSERVATION_PREVIEW_CHARS).collect();
        self.send_event(SessionEvent::Observation {
            session_id: session.id(),
            action: action.name(),
            observation: observation.clone(),
            preview,
        });
        session.record_step(&action, observation, finished);
        Ok(())
    }
}
