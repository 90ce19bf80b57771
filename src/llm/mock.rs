//! Mock 生成器（无需 API）
//!
//! - MockGenerator：取 prompt 中的用户输入，直接回显为 Final Answer，便于本地跑通完整循环。
//! - ScriptedGenerator：按脚本顺序返回文本 / 错误 / 延迟文本，并记录收到的 prompt，供测试断言。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::llm::{GenerationError, Generator};
use crate::react::prompt::USER_INPUT_MARKER;

/// Mock：回显用户输入为 Final Answer
#[derive(Debug, Default)]
pub struct MockGenerator;

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let user = prompt
            .lines()
            .rev()
            .find_map(|l| l.strip_prefix(USER_INPUT_MARKER))
            .map(str::trim)
            .unwrap_or("(no input)");
        let payload = serde_json::json!({
            "action": "Final Answer",
            "action_input": format!("Echo from Mock: {user}"),
        });
        Ok(format!("```json\n{payload}\n```"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[derive(Debug)]
struct ScriptEntry {
    delay: Option<Duration>,
    result: Result<String, GenerationError>,
}

/// 脚本化生成器：每次调用弹出一条；脚本耗尽后返回 fallback（未设置则报错）
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<ScriptEntry>>,
    prompts: Mutex<Vec<String>>,
    fallback: Option<String>,
    calls: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 从一组文本构建
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts.into_iter().fold(Self::new(), |g, t| g.then_text(t))
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(None, Ok(text.into()))
    }

    pub fn then_err(self, err: GenerationError) -> Self {
        self.push(None, Err(err))
    }

    pub fn then_delayed_text(self, delay: Duration, text: impl Into<String>) -> Self {
        self.push(Some(delay), Ok(text.into()))
    }

    /// 脚本耗尽后一直返回该文本
    pub fn with_fallback(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    fn push(self, delay: Option<Duration>, result: Result<String, GenerationError>) -> Self {
        lock(&self.script).push_back(ScriptEntry { delay, result });
        self
    }

    /// 已被调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 收到的全部 prompt
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.prompts).push(prompt.to_string());
        let entry = lock(&self.script).pop_front();
        match entry {
            Some(ScriptEntry { delay, result }) => {
                if let Some(d) = delay {
                    tokio::time::sleep(d).await;
                }
                result
            }
            None => self
                .fallback
                .clone()
                .ok_or_else(|| GenerationError::Request("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
