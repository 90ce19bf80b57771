//! 生成层：Generator 抽象、超时重试包装与实现（OpenAI 兼容 / Mock / 脚本）

pub mod mock;
pub mod openai;
pub mod retry;
pub mod traits;

pub use mock::{MockGenerator, ScriptedGenerator};
pub use openai::{OpenAiGenerator, TokenUsage, DEEPSEEK_BASE_URL};
pub use retry::{generate_with_retry, RetryPolicy};
pub use traits::{GenerationError, Generator};
