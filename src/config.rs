//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `AGENTEXEC__*` 覆盖（双下划线表示嵌套，如 `AGENTEXEC__SESSION__MAX_ITERATIONS=8`）。

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::agents::{AgentSchema, AgentSpec};
use crate::core::AgentError;
use crate::llm::RetryPolicy;
use crate::react::SessionSettings;
use crate::tools::CapabilityExecutor;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub generation: GenerationSection,
    pub session: SessionSection,
    pub tools: ToolsSection,
    pub delegation: DelegationSection,
    pub executor: ExecutorSection,
    /// 额外注册的 Agent（`[[agents]]`）
    pub agents: Vec<AgentSpec>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// Systools 包的沙箱根目录，未设置时为当前目录
    pub sandbox_root: Option<PathBuf>,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：openai / deepseek；实际选择还取决于对应的 API Key 是否存在
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    /// 单次生成请求超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

/// [generation] 段：生成重试
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationSection {
    #[serde(default = "default_generation_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for GenerationSection {
    fn default() -> Self {
        Self {
            max_attempts: default_generation_attempts(),
            backoff_ms: 0,
        }
    }
}

fn default_generation_attempts() -> u32 {
    3
}

/// [session] 段
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_memory_limit")]
    pub memory_limit: usize,
    #[serde(default = "default_true")]
    pub instruct_continuity: bool,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            memory_limit: default_memory_limit(),
            instruct_continuity: true,
        }
    }
}

fn default_max_iterations() -> usize {
    5
}

fn default_memory_limit() -> usize {
    5
}

fn default_true() -> bool {
    true
}

/// [tools] 段：单次能力调用超时与尝试次数
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_tool_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_tool_attempts")]
    pub max_attempts: u32,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_tool_timeout_secs(),
            max_attempts: default_tool_attempts(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_tool_attempts() -> u32 {
    1
}

/// [delegation] 段
#[derive(Debug, Clone, Deserialize)]
pub struct DelegationSection {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for DelegationSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    1
}

/// [executor] 段：single 用 `agent`，multi 用 `head_agent` + `sub_agents`
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default = "default_agent")]
    pub agent: String,
    pub head_agent: Option<String>,
    #[serde(default)]
    pub sub_agents: Vec<String>,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            agent: default_agent(),
            head_agent: None,
            sub_agents: Vec::new(),
        }
    }
}

fn default_mode() -> String {
    "single".to_string()
}

fn default_agent() -> String {
    "assistant".to_string()
}

impl AppConfig {
    /// 拒绝会让运行时无法工作的取值
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.session.max_iterations == 0 {
            return Err(AgentError::ConfigError(
                "session.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.generation.max_attempts == 0 {
            return Err(AgentError::ConfigError(
                "generation.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.tools.max_attempts == 0 {
            return Err(AgentError::ConfigError(
                "tools.max_attempts must be at least 1".to_string(),
            ));
        }
        if let Some(agent) = self.agents.iter().find(|a| a.max_iterations == Some(0)) {
            return Err(AgentError::ConfigError(format!(
                "agent `{}` has max_iterations = 0",
                agent.name
            )));
        }
        self.schema().map(|_| ())
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            max_iterations: self.session.max_iterations,
            memory_limit: self.session.memory_limit,
            instruct_continuity: self.session.instruct_continuity,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.generation.max_attempts,
            Duration::from_secs(self.llm.timeouts.request),
        )
        .with_backoff(Duration::from_millis(self.generation.backoff_ms))
    }

    pub fn capability_executor(&self) -> CapabilityExecutor {
        CapabilityExecutor::new(self.tools.timeout_secs, self.tools.max_attempts)
    }

    /// [executor] 段对应的 Agent 编排
    pub fn schema(&self) -> Result<AgentSchema, AgentError> {
        match self.executor.mode.to_lowercase().as_str() {
            "single" => Ok(AgentSchema::single(self.executor.agent.clone())),
            "multi" => {
                let head = self.executor.head_agent.clone().ok_or_else(|| {
                    AgentError::ConfigError("executor.head_agent is required in multi mode".to_string())
                })?;
                Ok(AgentSchema::multi(head, self.executor.sub_agents.clone()))
            }
            other => Err(AgentError::ConfigError(format!(
                "unknown executor.mode `{other}` (expected single or multi)"
            ))),
        }
    }
}

/// 从 config 目录加载配置，环境变量 AGENTEXEC__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path，则追加该文件（可覆盖前面的键；文件不存在时报错）
/// 3. 最后叠加环境变量 AGENTEXEC__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("AGENTEXEC")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
