//! 调度器：校验参数并调用能力，产出 Observation
//!
//! 可恢复错误（能力不存在、参数不匹配、能力执行失败、解析失败）全部转为 Observation，不会中止会话；
//! 只有取消以 `Err(AgentError::Cancelled)` 返回。AgentCall 不在这里执行，交给层级控制器。

use std::sync::Arc;

use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, Registries};
use crate::react::observation::{
    Observation, ObservationKind, DELEGATION_DIAGNOSTIC, NAME_DIAGNOSTIC, PARSE_DIAGNOSTIC,
};
use crate::react::resolver::{Action, UnresolvedReason};
use crate::tools::{qualified_name, ArgumentSchema, CapabilityExecutor, InvokeError, PACKAGE_SEPARATOR};

/// 名称未找到时最多附带的包内工具建议数
const MAX_SUGGESTIONS: usize = 3;

/// 调度结果
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// 普通一步：记录 Observation，会话继续
    Observed(Observation),
    /// Final Answer：记录后关闭会话
    Finished(Observation),
    /// 需要委派给子 Agent
    Delegate { agent: String, input: Value },
}

pub struct Dispatcher {
    registries: Arc<Registries>,
    executor: CapabilityExecutor,
}

impl Dispatcher {
    pub fn new(registries: Arc<Registries>, executor: CapabilityExecutor) -> Self {
        Self {
            registries,
            executor,
        }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub async fn dispatch(
        &self,
        action: &Action,
        cancel: &CancellationToken,
    ) -> Result<Dispatch, AgentError> {
        match action {
            Action::FinalAnswer(payload) => Ok(Dispatch::Finished(Observation::success(payload.clone()))),
            Action::AgentCall { agent, input } => Ok(Dispatch::Delegate {
                agent: agent.clone(),
                input: input.clone(),
            }),
            Action::ToolCall { tool, input } => self
                .call_tool(tool, input, cancel)
                .await
                .map(Dispatch::Observed),
            Action::PackageCall {
                package,
                tool,
                input,
            } => self
                .call_package(package, tool, input, cancel)
                .await
                .map(Dispatch::Observed),
            Action::Unresolved(UnresolvedReason::NameNotFound(name)) => {
                let message = self.with_suggestions(NAME_DIAGNOSTIC, name);
                Ok(Dispatch::Observed(Observation::error(ObservationKind::CapabilityNotFound, message)))
            }
            Action::Unresolved(reason) => Ok(Dispatch::Observed(unresolved_observation(reason))),
        }
    }

    /// 按短名在工具包中搜索相近的工具，附在诊断后面
    fn with_suggestions(&self, message: &str, name: &str) -> String {
        let short = name
            .split_once(PACKAGE_SEPARATOR)
            .map_or(name, |(_, tool)| tool);
        if short.is_empty() {
            return message.to_string();
        }
        let hits: Vec<String> = self
            .registries
            .packages
            .search(short)
            .into_iter()
            .take(MAX_SUGGESTIONS)
            .map(|(package, tool, _)| qualified_name(&package, &tool))
            .collect();
        if hits.is_empty() {
            message.to_string()
        } else {
            format!("{message} (did you mean: {})", hits.join(", "))
        }
    }

    async fn call_tool(
        &self,
        name: &str,
        input: &Value,
        cancel: &CancellationToken,
    ) -> Result<Observation, AgentError> {
        let descriptor = match self.registries.tools.lookup(name) {
            Ok(d) => d,
            Err(e) => return Ok(Observation::error(ObservationKind::CapabilityNotFound, e.to_string())),
        };
        let args = match prepare_arguments(name, &descriptor.arguments, input) {
            Ok(args) => args,
            Err(obs) => return Ok(obs),
        };
        let Some(tool) = self.registries.tools.get(name) else {
            return Ok(Observation::error(
                ObservationKind::CapabilityNotFound,
                format!("Capability not found: {name}"),
            ));
        };
        let tool = &*tool;
        let result = self
            .executor
            .invoke(name, args, cancel, move |a| tool.execute(a))
            .await;
        finish_invocation(name, result)
    }

    async fn call_package(
        &self,
        package: &str,
        tool: &str,
        input: &Value,
        cancel: &CancellationToken,
    ) -> Result<Observation, AgentError> {
        let address = qualified_name(package, tool);
        let descriptor = match self.registries.packages.lookup(package, tool) {
            Ok(d) => d,
            Err(e) => {
                return Ok(Observation::error(
                    ObservationKind::CapabilityNotFound,
                    self.with_suggestions(&e.to_string(), tool),
                ))
            }
        };
        let args = match prepare_arguments(&address, &descriptor.arguments, input) {
            Ok(args) => args,
            Err(obs) => return Ok(obs),
        };
        let Some(pkg) = self.registries.packages.get(package) else {
            return Ok(Observation::error(
                ObservationKind::CapabilityNotFound,
                format!("Capability not found: {address}"),
            ));
        };
        let pkg = &*pkg;
        let result = self
            .executor
            .invoke(&address, args, cancel, move |a| pkg.call(tool, a))
            .await;
        finish_invocation(&address, result)
    }
}

/// 解析失败 / 名称未找到 / 委派被拒 的固定诊断
pub fn unresolved_observation(reason: &UnresolvedReason) -> Observation {
    match reason {
        UnresolvedReason::ParseFailed => Observation::error(ObservationKind::ParseError, PARSE_DIAGNOSTIC),
        UnresolvedReason::NameNotFound(_) => {
            Observation::error(ObservationKind::CapabilityNotFound, NAME_DIAGNOSTIC)
        }
        UnresolvedReason::DelegationRejected(_) => {
            Observation::error(ObservationKind::DelegationRejected, DELEGATION_DIAGNOSTIC)
        }
    }
}

/// action_input → 参数表：null 视为无参数，其余非对象一律不匹配；随后做键集合校验与类型转换
fn prepare_arguments(
    name: &str,
    schema: &ArgumentSchema,
    input: &Value,
) -> Result<Map<String, Value>, Observation> {
    let provided = match input {
        Value::Null => Map::new(),
        Value::Object(map) => map.clone(),
        other => {
            return Err(mismatch(
                name,
                format!("action_input must be a JSON object, got {other}"),
            ))
        }
    };

    if !schema.matches_keys(provided.keys().map(String::as_str)) {
        let expected: Vec<&str> = schema.names().into_iter().collect();
        let mut got: Vec<&str> = provided.keys().map(String::as_str).collect();
        got.sort_unstable();
        return Err(mismatch(
            name,
            format!("expected arguments [{}], got [{}]", expected.join(", "), got.join(", ")),
        ));
    }

    schema.coerce(&provided).map_err(|e| mismatch(name, e))
}

fn mismatch(name: &str, detail: String) -> Observation {
    tracing::warn!(capability = name, %detail, "Argument mismatch");
    Observation::error(
        ObservationKind::ArgumentMismatch,
        format!("Arguments do not match `{name}`: {detail}"),
    )
}

fn finish_invocation(name: &str, result: Result<String, InvokeError>) -> Result<Observation, AgentError> {
    match result {
        Ok(content) => Ok(Observation::success(content)),
        Err(InvokeError::Cancelled) => Err(AgentError::Cancelled),
        Err(e) => {
            tracing::warn!(capability = name, error = %e, "Capability execution failed");
            Ok(Observation::error(
                ObservationKind::CapabilityExecutionError,
                format!("`{name}` failed: {e}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use crate::tools::builtin::{AdditionTool, SysTools};
    use crate::tools::{ParamType, Tool};

    /// 计数工具：记录被调用次数
    struct CountingTool {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "count"
        }

        fn description(&self) -> &str {
            "counts invocations"
        }

        fn arguments(&self) -> ArgumentSchema {
            ArgumentSchema::new()
                .param("a", ParamType::Integer, "first")
                .param("b", ParamType::Integer, "second")
        }

        async fn execute(&self, _args: Map<String, Value>) -> Result<String, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("counted".to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "explode"
        }

        fn description(&self) -> &str {
            "always fails"
        }

        async fn execute(&self, _args: Map<String, Value>) -> Result<String, String> {
            Err("kaboom".to_string())
        }
    }

    fn dispatcher(calls: Arc<AtomicUsize>) -> Dispatcher {
        let registries = Registries::new()
            .with_tool(AdditionTool)
            .unwrap()
            .with_tool(CountingTool { calls })
            .unwrap()
            .with_tool(FailingTool)
            .unwrap()
            .with_package(SysTools::default())
            .unwrap();
        Dispatcher::new(Arc::new(registries), CapabilityExecutor::default())
    }

    async fn observe(d: &Dispatcher, action: Action) -> Observation {
        match d.dispatch(&action, &CancellationToken::new()).await.unwrap() {
            Dispatch::Observed(o) => o,
            other => panic!("Expected Observed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tool_call_success() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let obs = observe(
            &d,
            Action::ToolCall {
                tool: "simple_addition".into(),
                input: json!({"a": 1, "b": 2}),
            },
        )
        .await;
        assert_eq!(obs, Observation::success("3"));
    }

    #[tokio::test]
    async fn test_argument_strictness_no_side_effect() {
        let calls = Arc::new(AtomicUsize::new(0));
        let d = dispatcher(calls.clone());
        for input in [json!({"a": 1}), json!({"a": 1, "b": 2, "c": 3}), json!([1, 2])] {
            let obs = observe(
                &d,
                Action::ToolCall {
                    tool: "count".into(),
                    input,
                },
            )
            .await;
            assert_eq!(obs.error_kind(), Some(ObservationKind::ArgumentMismatch));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let obs = observe(
            &d,
            Action::ToolCall {
                tool: "count".into(),
                input: json!({"a": "1", "b": 2}),
            },
        )
        .await;
        assert!(obs.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_coercion_failure_is_mismatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let d = dispatcher(calls.clone());
        let obs = observe(
            &d,
            Action::ToolCall {
                tool: "count".into(),
                input: json!({"a": "one", "b": 2}),
            },
        )
        .await;
        assert_eq!(obs.error_kind(), Some(ObservationKind::ArgumentMismatch));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_execution_error_is_observation() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let obs = observe(
            &d,
            Action::ToolCall {
                tool: "explode".into(),
                input: Value::Null,
            },
        )
        .await;
        assert_eq!(obs.error_kind(), Some(ObservationKind::CapabilityExecutionError));
        assert!(obs.render().contains("explode"));
        assert!(obs.render().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_package_call_and_missing_package_tool() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let obs = observe(
            &d,
            Action::PackageCall {
                package: SysTools::NAME.into(),
                tool: "current_dir".into(),
                input: json!({}),
            },
        )
        .await;
        assert!(obs.is_success());

        let obs = observe(
            &d,
            Action::PackageCall {
                package: SysTools::NAME.into(),
                tool: "nope".into(),
                input: json!({}),
            },
        )
        .await;
        assert_eq!(obs.error_kind(), Some(ObservationKind::CapabilityNotFound));
    }

    #[tokio::test]
    async fn test_final_and_delegate() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let cancel = CancellationToken::new();
        let fin = d
            .dispatch(&Action::FinalAnswer(json!("done")), &cancel)
            .await
            .unwrap();
        assert_eq!(fin, Dispatch::Finished(Observation::success("done")));

        let del = d
            .dispatch(
                &Action::AgentCall {
                    agent: "researcher".into(),
                    input: json!("look it up"),
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(matches!(del, Dispatch::Delegate { agent, .. } if agent == "researcher"));
    }

    #[tokio::test]
    async fn test_unresolved_diagnostics() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let parse = observe(&d, Action::Unresolved(UnresolvedReason::ParseFailed)).await;
        assert_eq!(parse.error_kind(), Some(ObservationKind::ParseError));
        assert!(parse.render().contains(PARSE_DIAGNOSTIC));

        let missing = observe(
            &d,
            Action::Unresolved(UnresolvedReason::NameNotFound("ghost".into())),
        )
        .await;
        assert_eq!(missing.error_kind(), Some(ObservationKind::CapabilityNotFound));
        assert!(missing.render().contains(NAME_DIAGNOSTIC));
        assert!(!missing.render().contains("did you mean"));
    }

    #[tokio::test]
    async fn test_unknown_package_tool_suggests_known_ones() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let wrong_package = observe(
            &d,
            Action::Unresolved(UnresolvedReason::NameNotFound("Sys#current_dir".into())),
        )
        .await;
        assert_eq!(wrong_package.error_kind(), Some(ObservationKind::CapabilityNotFound));
        let text = wrong_package.render();
        assert!(text.contains(NAME_DIAGNOSTIC));
        assert!(text.contains("did you mean: Systools#current_dir"));

        let wrong_tool = observe(
            &d,
            Action::PackageCall {
                package: "Systools".into(),
                tool: "dir".into(),
                input: Value::Null,
            },
        )
        .await;
        assert_eq!(wrong_tool.error_kind(), Some(ObservationKind::CapabilityNotFound));
        let text = wrong_tool.render();
        assert!(text.contains("Systools#dir"));
        assert!(text.contains("Systools#current_dir"));
        assert!(text.contains("Systools#list_dir"));
    }

    #[tokio::test]
    async fn test_cancelled_invocation_is_fatal() {
        let d = dispatcher(Arc::new(AtomicUsize::new(0)));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = d
            .dispatch(
                &Action::ToolCall {
                    tool: "simple_addition".into(),
                    input: json!({"a": 1, "b": 2}),
                },
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
    }
}
