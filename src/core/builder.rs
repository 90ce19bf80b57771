//! 执行器构建器：统一的初始化逻辑
//!
//! 从 AppConfig 得到会话参数、重试策略、能力执行器与委派深度；注册演示能力与配置中的 Agent。
//! 嵌入方也可以直接 `ExecutorBuilder::new(registries)` 手动组装。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use crate::agents::AgentSpec;
use crate::config::AppConfig;
use crate::core::{create_generator_from_config, AgentError, AgentExecutor, Registries};
use crate::llm::{Generator, MockGenerator, RetryPolicy};
use crate::react::{Dispatcher, SessionController, SessionEvent, SessionSettings};
use crate::tools::{AdditionTool, CapabilityExecutor, SubtractionTool, SysTools};

pub struct ExecutorBuilder {
    registries: Registries,
    generator: Option<Arc<dyn Generator>>,
    retry: RetryPolicy,
    capability_executor: CapabilityExecutor,
    settings: SessionSettings,
    max_depth: usize,
    event_tx: Option<UnboundedSender<SessionEvent>>,
}

impl ExecutorBuilder {
    pub fn new(registries: Registries) -> Self {
        Self {
            registries,
            generator: None,
            retry: RetryPolicy::default(),
            capability_executor: CapabilityExecutor::default(),
            settings: SessionSettings::default(),
            max_depth: 1,
            event_tx: None,
        }
    }

    /// 按配置组装：演示工具 + Systools 包 + `[[agents]]`；
    /// single 模式下入口 Agent 未在配置中声明时，以默认 prompt 注册它
    pub fn from_config(cfg: &AppConfig) -> Result<Self, AgentError> {
        cfg.validate()?;

        let root = cfg
            .app
            .sandbox_root
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        let mut registries = Registries::new()
            .with_tool(AdditionTool)?
            .with_tool(SubtractionTool)?
            .with_package(SysTools::new(root))?;
        for spec in &cfg.agents {
            registries.agents.register(spec.clone())?;
        }
        let entry = cfg.schema()?.entry_agent().to_string();
        if !registries.agents.contains(&entry) && cfg.executor.mode.eq_ignore_ascii_case("single") {
            registries.agents.register(
                AgentSpec::new(entry).with_description("General assistant using the registered tools"),
            )?;
        }

        Ok(Self::new(registries)
            .with_generator(create_generator_from_config(cfg))
            .with_retry(cfg.retry_policy())
            .with_capability_executor(cfg.capability_executor())
            .with_settings(cfg.session_settings())
            .with_max_depth(cfg.delegation.max_depth))
    }

    pub fn registries_mut(&mut self) -> &mut Registries {
        &mut self.registries
    }

    pub fn with_generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_capability_executor(mut self, executor: CapabilityExecutor) -> Self {
        self.capability_executor = executor;
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<SessionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 未设置 generator 时使用 MockGenerator
    pub fn build(self) -> AgentExecutor {
        let generator = self.generator.unwrap_or_else(|| Arc::new(MockGenerator));
        let dispatcher = Dispatcher::new(Arc::new(self.registries), self.capability_executor);
        let mut controller = SessionController::new(generator, dispatcher)
            .with_retry(self.retry)
            .with_max_depth(self.max_depth);
        if let Some(tx) = self.event_tx {
            controller = controller.with_event_tx(tx);
        }
        AgentExecutor::new(Arc::new(controller), self.settings)
    }
}
