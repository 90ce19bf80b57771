//! 动作 JSON Schema 生成（schemars）
//!
//! 将「合法动作」的 JSON 结构注入 prompt，减少模型输出格式错误。

use schemars::{schema_for, JsonSchema};

/// 动作格式：与 parser 解析的 `{"action": "...", "action_input": ...}` 一致（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ActionFormat {
    /// 动作名：工具名、`包名#工具名`、Agent 名，或 "Final Answer"
    pub action: String,
    /// 动作参数：工具为参数对象，Final Answer 为最终答案
    pub action_input: serde_json::Value,
}

/// 返回动作格式的 JSON Schema 字符串，可拼入 prompt
pub fn action_schema_json() -> String {
    let schema = schema_for!(ActionFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
