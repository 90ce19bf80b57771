//! Prompt 拼装
//!
//! 顺序：prefix → 能力说明（可委派 Agent / 工具包 / 工具，JSON）与动作 schema → suffix →
//! 之前的对话 → 本会话已执行的步骤 → 用户输入 → 收敛提示。

use std::collections::BTreeSet;

use serde_json::Value;

use crate::agents::AgentSpec;
use crate::core::Registries;
use crate::react::parser::ParsedPayload;
use crate::react::session::Session;
use crate::tools::action_schema_json;

/// 用户输入行的前缀（MockGenerator 依此回显）
pub const USER_INPUT_MARKER: &str = "User input:";

/// 能力目录：本会话可用的 Agent（按委派名单）、工具包、工具
pub fn capability_catalog(registries: &Registries, roster: &BTreeSet<String>) -> Value {
    serde_json::json!({
        "agents": registries.agents.to_description_json(roster),
        "packages": registries.packages.to_description_json(),
        "tools": registries.tools.to_description_json(),
    })
}

pub fn build_prompt(spec: &AgentSpec, catalog: &Value, session: &Session) -> String {
    let mut out = String::new();
    out.push_str(spec.prefix.trim());
    out.push_str("\n\n## Available actions\n");
    out.push_str(&serde_json::to_string_pretty(catalog).unwrap_or_default());
    out.push_str("\n\n## Action format (JSON Schema)\n");
    out.push_str(&action_schema_json());
    out.push_str("\n\n");
    out.push_str(spec.suffix.trim());
    out.push('\n');

    let history = session.history().to_prompt_section();
    if !history.is_empty() {
        out.push('\n');
        out.push_str(&history);
    }

    if !session.steps().is_empty() {
        out.push_str("\n## Steps so far\n");
        for step in session.steps() {
            let payload = ParsedPayload::new(step.action.clone(), step.input.clone());
            out.push_str(&format!("Step {}:\n{}\n", step.iteration, payload.render()));
            out.push_str(&format!("Observation: {}\n", step.observation.render()));
        }
    }

    out.push('\n');
    out.push_str(USER_INPUT_MARKER);
    out.push(' ');
    out.push_str(session.user_input());
    out.push('\n');
    if let Some(hint) = session.hint() {
        out.push_str(&format!("Note: {hint}\n"));
    }
    out
}
