//! 输出解析：从生成文本中提取 ```json {...}``` 块
//!
//! 只看第一个包含 JSON 对象的围栏块，后面的块一律忽略。严格解码失败时做一次修复
//! （把模型转义产生的 `{{` / `}}` 折叠成单个花括号）后重试。解析失败是一个值，不会 panic。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 解析出的动作载荷
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPayload {
    pub action: String,
    #[serde(default)]
    pub action_input: Value,
}

impl ParsedPayload {
    pub fn new(action: impl Into<String>, action_input: Value) -> Self {
        Self {
            action: action.into(),
            action_input,
        }
    }

    /// 渲染为模型应输出的围栏块格式
    pub fn render(&self) -> String {
        let body = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        format!("```json\n{body}\n```")
    }
}

/// 解析失败的原因（仅用于日志，对 Resolver 而言都是同一个 parse failed）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    #[error("no fenced JSON block found")]
    NoFencedBlock,

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("JSON object has no string `action` field")]
    MissingAction,
}

fn fenced_json_block() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(\{.*?\})\s*```").expect("fenced block regex is valid")
    })
}

/// 解析生成文本
pub fn parse_output(text: &str) -> Result<ParsedPayload, ParseFailure> {
    let block = fenced_json_block()
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .ok_or(ParseFailure::NoFencedBlock)?;

    let value: Value = match serde_json::from_str(block) {
        Ok(v) => v,
        Err(strict_err) => {
            let repaired = block.replace("{{", "{").replace("}}", "}");
            serde_json::from_str(&repaired)
                .map_err(|_| ParseFailure::InvalidJson(strict_err.to_string()))?
        }
    };

    let Value::Object(mut map) = value else {
        return Err(ParseFailure::MissingAction);
    };
    let action = match map.remove("action") {
        Some(Value::String(a)) => a,
        _ => return Err(ParseFailure::MissingAction),
    };
    let action_input = map.remove("action_input").unwrap_or(Value::Null);
    Ok(ParsedPayload {
        action,
        action_input,
    })
}
