//! Agent 执行器：对外的入口
//!
//! 负责：校验 Agent 编排 schema、按 single / multi 建立顶层会话、驱动会话控制器或层级控制器，
//! 返回最终响应。执行器本身不可变，可用 `Arc` 在并发请求间共享。

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agents::AgentSchema;
use crate::config::AppConfig;
use crate::core::{AgentError, Registries};
use crate::llm::{Generator, MockGenerator, OpenAiGenerator, DEEPSEEK_BASE_URL};
use crate::memory::HistoryRecord;
use crate::react::{FinalResponse, HierarchicalController, Session, SessionController, SessionSettings};

/// 根据配置与环境变量选择生成后端（DeepSeek / OpenAI 兼容 / Mock）
pub fn create_generator_from_config(cfg: &AppConfig) -> Arc<dyn Generator> {
    let provider = cfg.llm.provider.to_lowercase();
    let deepseek_key = std::env::var("DEEPSEEK_API_KEY").ok();
    let openai_key = std::env::var("OPENAI_API_KEY").ok();

    if provider == "deepseek" {
        if let Some(key) = deepseek_key.or(openai_key) {
            let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
            tracing::info!(model = cfg.llm.model.as_str(), "Using DeepSeek generator");
            return Arc::new(OpenAiGenerator::new(Some(base), &cfg.llm.model, Some(&key)));
        }
    } else if let Some(key) = openai_key {
        tracing::info!(model = cfg.llm.model.as_str(), "Using OpenAI-compatible generator");
        return Arc::new(OpenAiGenerator::new(
            cfg.llm.base_url.as_deref(),
            &cfg.llm.model,
            Some(&key),
        ));
    }
    tracing::warn!(provider = provider.as_str(), "No API key set, using Mock generator");
    Arc::new(MockGenerator)
}

pub struct AgentExecutor {
    controller: Arc<SessionController>,
    hierarchy: HierarchicalController,
    settings: SessionSettings,
}

impl AgentExecutor {
    pub fn new(controller: Arc<SessionController>, settings: SessionSettings) -> Self {
        let hierarchy = HierarchicalController::new(controller.clone(), settings);
        Self {
            controller,
            hierarchy,
            settings,
        }
    }

    pub fn registries(&self) -> &Registries {
        self.controller.registries()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub async fn execute(&self, schema: &AgentSchema, user_input: &str) -> Result<FinalResponse, AgentError> {
        self.execute_with_cancel(schema, user_input, Vec::new(), &CancellationToken::new())
            .await
    }

    /// 带之前的对话记录与取消令牌执行一次请求
    pub async fn execute_with_cancel(
        &self,
        schema: &AgentSchema,
        user_input: &str,
        history: Vec<HistoryRecord>,
        cancel: &CancellationToken,
    ) -> Result<FinalResponse, AgentError> {
        schema.validate(&self.registries().agents)?;

        match schema {
            AgentSchema::Single { agent } => {
                let spec = self.registries().agents.spec(agent).ok_or_else(|| {
                    AgentError::InvalidSchema(format!("single agent '{agent}' is not registered"))
                })?;
                let settings = SessionSettings {
                    max_iterations: spec.max_iterations.unwrap_or(self.settings.max_iterations),
                    ..self.settings
                };
                let session = Session::new(agent.as_str(), user_input, settings).with_history(history);
                let ctx = self.controller.context(spec, BTreeSet::new(), 0, None);
                self.controller.run(&ctx, session, cancel).await
            }
            AgentSchema::Multi { head, sub_agents } => {
                self.hierarchy
                    .run_head(head, sub_agents, user_input, history, cancel)
                    .await
            }
        }
    }
}
