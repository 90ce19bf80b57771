//! 端到端场景测试：通过公开 API 驱动完整的解析 → 归类 → 调度 → 记录循环

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use agentexec::agents::{AgentSchema, AgentSpec};
use agentexec::core::{AgentError, ExecutorBuilder, Registries};
use agentexec::llm::{GenerationError, MockGenerator, ScriptedGenerator};
use agentexec::react::{
    ActionKind, ContinuationHint, Dispatcher, Observation, ObservationKind, Session,
    SessionController, SessionSettings, Termination,
};
use agentexec::tools::{
    AdditionTool, ArgumentSchema, CapabilityExecutor, Package, PackageToolSpec, ParamType, Tool,
};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;

fn fenced(action: &str, input: Value) -> String {
    format!(
        "```json\n{}\n```",
        json!({ "action": action, "action_input": input })
    )
}

/// 桌面窗口工具包（无参数工具）
struct GuiTools {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Package for GuiTools {
    fn name(&self) -> &str {
        "Guitools"
    }

    fn description(&self) -> &str {
        "Desktop window helpers"
    }

    fn tools(&self) -> Vec<PackageToolSpec> {
        vec![PackageToolSpec::new("list_desktop_windows", "List open windows")]
    }

    async fn call(&self, tool: &str, _args: Map<String, Value>) -> Result<String, String> {
        match tool {
            "list_desktop_windows" => {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok("terminal, editor".to_string())
            }
            other => Err(format!("unknown tool {other}")),
        }
    }
}

/// 计数工具：用来确认参数不匹配时没有副作用
struct CountingTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for CountingTool {
    fn name(&self) -> &str {
        "record_note"
    }

    fn description(&self) -> &str {
        "Stores a note"
    }

    fn arguments(&self) -> ArgumentSchema {
        ArgumentSchema::new().param("text", ParamType::String, "note body")
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("stored {}", args["text"]))
    }
}

/// 永远不返回的工具（用于取消测试）
struct HangingTool;

#[async_trait]
impl Tool for HangingTool {
    fn name(&self) -> &str {
        "hang"
    }

    fn description(&self) -> &str {
        "Never finishes"
    }

    async fn execute(&self, _args: Map<String, Value>) -> Result<String, String> {
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

fn controller(registries: Registries, gen: ScriptedGenerator) -> SessionController {
    let dispatcher = Dispatcher::new(Arc::new(registries), CapabilityExecutor::default());
    SessionController::new(Arc::new(gen), dispatcher)
}

#[tokio::test]
async fn scenario_a_tool_call_appends_one_step() {
    let registries = Registries::new().with_tool(AdditionTool).unwrap();
    let ctl = controller(
        registries,
        ScriptedGenerator::from_texts([fenced("simple_addition", json!({"a": 1, "b": 2}))]),
    );
    let spec = AgentSpec::new("solo");
    let ctx = ctl.context(&spec, BTreeSet::new(), 0, None);
    let mut session = Session::new("solo", "add 1 and 2", SessionSettings::default());

    ctl.step(&ctx, &mut session, &CancellationToken::new()).await.unwrap();

    assert_eq!(session.steps().len(), 1);
    let step = &session.steps()[0];
    assert_eq!(step.kind, ActionKind::Tool);
    assert_eq!(step.action, "simple_addition");
    assert_eq!(step.observation, Observation::success("3"));
    assert!(session.is_running());
}

#[tokio::test]
async fn scenario_b_missing_fenced_block_is_recoverable() {
    let ctl = controller(
        Registries::new(),
        ScriptedGenerator::from_texts(["The answer is obviously 3."]),
    );
    let spec = AgentSpec::new("solo");
    let ctx = ctl.context(&spec, BTreeSet::new(), 0, None);
    let mut session = Session::new("solo", "add", SessionSettings::default());

    ctl.step(&ctx, &mut session, &CancellationToken::new()).await.unwrap();

    assert_eq!(session.iteration(), 1);
    assert!(session.is_running());
    let step = &session.steps()[0];
    assert_eq!(step.kind, ActionKind::Unresolved);
    assert_eq!(step.observation.error_kind(), Some(ObservationKind::ParseError));
    assert!(step
        .observation
        .render()
        .contains("Problem occurred in parsing - reconsider the action"));
}

#[tokio::test]
async fn scenario_c_budget_forces_termination() {
    let registries = Registries::new().with_tool(AdditionTool).unwrap();
    let ctl = controller(
        registries,
        ScriptedGenerator::new().with_fallback(fenced("simple_addition", json!({"a": 2, "b": 2}))),
    );
    let spec = AgentSpec::new("solo");
    let ctx = ctl.context(&spec, BTreeSet::new(), 0, None);
    let settings = SessionSettings {
        max_iterations: 5,
        memory_limit: 5,
        instruct_continuity: true,
    };
    let mut session = Session::new("solo", "keep adding", settings);
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        ctl.step(&ctx, &mut session, &cancel).await.unwrap();
    }
    assert_eq!(session.iteration(), 3);
    assert_eq!(session.hint(), Some(ContinuationHint::ConvergeNow));
    assert_eq!(session.hint().unwrap().to_string(), "you should converge now");

    ctl.step(&ctx, &mut session, &cancel).await.unwrap();
    assert_eq!(session.hint(), Some(ContinuationHint::ConvergeThisStep));
    ctl.step(&ctx, &mut session, &cancel).await.unwrap();

    assert!(!session.is_running());
    assert_eq!(session.hint(), Some(ContinuationHint::Stopping));
    let resp = session.final_response().unwrap();
    assert_eq!(resp.termination, Termination::IterationBudgetExceeded);
    assert_eq!(resp.final_output, json!("4"));
    assert_eq!(resp.iterations, 5);
    assert_eq!(resp.history.len(), 5);
}

#[tokio::test]
async fn scenario_d_package_tool_without_arguments() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registries = Registries::new()
        .with_package(GuiTools {
            calls: calls.clone(),
        })
        .unwrap();
    let ctl = controller(
        registries,
        ScriptedGenerator::from_texts([fenced("Guitools#list_desktop_windows", json!({}))]),
    );
    let spec = AgentSpec::new("solo");
    let ctx = ctl.context(&spec, BTreeSet::new(), 0, None);
    let mut session = Session::new("solo", "what is open?", SessionSettings::default());

    ctl.step(&ctx, &mut session, &CancellationToken::new()).await.unwrap();

    let step = &session.steps()[0];
    assert_eq!(step.kind, ActionKind::Package);
    assert_eq!(step.action, "Guitools#list_desktop_windows");
    assert_eq!(step.observation, Observation::success("terminal, editor"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn scenario_e_unknown_sub_agent_is_recoverable() {
    let registries = Registries::new()
        .with_agent(AgentSpec::new("head"))
        .unwrap();
    let gen = ScriptedGenerator::from_texts([
        fenced("researcher", json!("find the capital of France")),
        fenced("Final Answer", json!("Paris, from memory")),
    ]);
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(gen))
        .build();

    let resp = exec
        .execute(&AgentSchema::multi("head", ["researcher"]), "capital of France?")
        .await
        .unwrap();

    assert_eq!(resp.steps.len(), 2);
    assert_eq!(resp.steps[0].kind, ActionKind::Agent);
    assert_eq!(
        resp.steps[0].observation.error_kind(),
        Some(ObservationKind::CapabilityNotFound)
    );
    assert_eq!(resp.termination, Termination::FinalAnswer);
    assert_eq!(resp.final_output, json!("Paris, from memory"));
}

#[tokio::test]
async fn agent_name_wins_over_tool_name() {
    struct Shadow;

    #[async_trait]
    impl Tool for Shadow {
        fn name(&self) -> &str {
            "researcher"
        }

        fn description(&self) -> &str {
            "tool sharing an agent's name"
        }

        async fn execute(&self, _args: Map<String, Value>) -> Result<String, String> {
            Ok("tool ran".to_string())
        }
    }

    let registries = Registries::new()
        .with_tool(Shadow)
        .unwrap()
        .with_agent(AgentSpec::new("head"))
        .unwrap()
        .with_agent(AgentSpec::new("researcher"))
        .unwrap();
    let gen = ScriptedGenerator::from_texts([
        fenced("researcher", Value::Null),
        fenced("Final Answer", json!("agent ran")),
        fenced("Final Answer", json!("done")),
    ]);
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(gen))
        .build();

    let resp = exec
        .execute(&AgentSchema::multi("head", Vec::<String>::new()), "go")
        .await
        .unwrap();
    assert_eq!(resp.steps[0].kind, ActionKind::Agent);
    assert_eq!(resp.steps[0].observation, Observation::success("agent ran"));
}

/// 与 Agent 同名的工具，记录调用次数
struct WriterTool {
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Tool for WriterTool {
    fn name(&self) -> &str {
        "writer"
    }

    fn description(&self) -> &str {
        "tool sharing an agent's name"
    }

    async fn execute(&self, _args: Map<String, Value>) -> Result<String, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok("tool ran".to_string())
    }
}

fn writer_registries(calls: &Arc<AtomicUsize>) -> Registries {
    Registries::new()
        .with_tool(WriterTool { calls: calls.clone() })
        .unwrap()
        .with_agent(AgentSpec::new("solo"))
        .unwrap()
        .with_agent(AgentSpec::new("head").with_sub_agents(["helper"]))
        .unwrap()
        .with_agent(AgentSpec::new("helper"))
        .unwrap()
        .with_agent(AgentSpec::new("writer"))
        .unwrap()
}

#[tokio::test]
async fn agent_name_wins_over_tool_in_single_mode() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gen = ScriptedGenerator::from_texts([
        fenced("writer", Value::Null),
        fenced("Final Answer", json!("done")),
    ]);
    let exec = ExecutorBuilder::new(writer_registries(&calls))
        .with_generator(Arc::new(gen))
        .build();

    let resp = exec.execute(&AgentSchema::single("solo"), "go").await.unwrap();
    assert_eq!(resp.steps[0].kind, ActionKind::Unresolved);
    assert_eq!(
        resp.steps[0].observation.error_kind(),
        Some(ObservationKind::DelegationRejected)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn agent_outside_declared_roster_is_rejected_not_run_as_tool() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gen = ScriptedGenerator::from_texts([
        fenced("writer", Value::Null),
        fenced("Final Answer", json!("done")),
    ]);
    let exec = ExecutorBuilder::new(writer_registries(&calls))
        .with_generator(Arc::new(gen))
        .build();

    let resp = exec
        .execute(&AgentSchema::multi("head", Vec::<String>::new()), "go")
        .await
        .unwrap();
    assert_eq!(resp.steps[0].action, "writer");
    assert_eq!(resp.steps[0].kind, ActionKind::Unresolved);
    assert_eq!(
        resp.steps[0].observation.error_kind(),
        Some(ObservationKind::DelegationRejected)
    );
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(resp.final_output, json!("done"));
}

#[tokio::test]
async fn argument_mismatch_has_no_side_effect() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registries = Registries::new()
        .with_tool(CountingTool {
            calls: calls.clone(),
        })
        .unwrap()
        .with_agent(AgentSpec::new("solo"))
        .unwrap();
    let gen = ScriptedGenerator::from_texts([
        fenced("record_note", json!({})),
        fenced("record_note", json!({"text": "hi", "extra": 1})),
        fenced("record_note", json!({"text": 42})),
        fenced("Final Answer", json!("ok")),
    ]);
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(gen))
        .build();

    let resp = exec.execute(&AgentSchema::single("solo"), "note").await.unwrap();

    assert_eq!(
        resp.steps[0].observation.error_kind(),
        Some(ObservationKind::ArgumentMismatch)
    );
    assert_eq!(
        resp.steps[1].observation.error_kind(),
        Some(ObservationKind::ArgumentMismatch)
    );
    assert_eq!(resp.steps[2].observation, Observation::success("stored \"42\""));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generation_exhaustion_is_fatal() {
    let registries = Registries::new().with_agent(AgentSpec::new("solo")).unwrap();
    let gen = ScriptedGenerator::new()
        .then_err(GenerationError::Request("503".into()))
        .then_err(GenerationError::Request("503".into()))
        .then_err(GenerationError::Request("503".into()));
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(gen))
        .build();

    let err = exec
        .execute(&AgentSchema::single("solo"), "hello")
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::GenerationExhausted { attempts: 3, .. }));
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_capability_invocation() {
    let registries = Registries::new()
        .with_tool(HangingTool)
        .unwrap()
        .with_agent(AgentSpec::new("solo"))
        .unwrap();
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(
            ScriptedGenerator::new().with_fallback(fenced("hang", json!({}))),
        ))
        .with_capability_executor(CapabilityExecutor::new(3600, 1))
        .build();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    let err = exec
        .execute_with_cancel(&AgentSchema::single("solo"), "wait", Vec::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::Cancelled));
}

#[tokio::test]
async fn delegation_rejected_at_depth_cap() {
    let registries = Registries::new()
        .with_agent(AgentSpec::new("head").with_sub_agents(["helper"]))
        .unwrap()
        .with_agent(AgentSpec::new("helper"))
        .unwrap();
    let gen = ScriptedGenerator::from_texts([
        fenced("helper", json!("do it")),
        fenced("Final Answer", json!("did it myself")),
    ]);
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(gen))
        .with_max_depth(0)
        .build();

    let resp = exec
        .execute(&AgentSchema::multi("head", Vec::<String>::new()), "task")
        .await
        .unwrap();
    assert_eq!(resp.steps[0].kind, ActionKind::Unresolved);
    assert_eq!(
        resp.steps[0].observation.error_kind(),
        Some(ObservationKind::DelegationRejected)
    );
    assert_eq!(resp.final_output, json!("did it myself"));
}

#[tokio::test]
async fn history_is_carried_across_requests_and_bounded() {
    let registries = Registries::new().with_agent(AgentSpec::new("solo")).unwrap();
    let exec = ExecutorBuilder::new(registries)
        .with_generator(Arc::new(MockGenerator))
        .with_settings(SessionSettings {
            max_iterations: 3,
            memory_limit: 2,
            instruct_continuity: false,
        })
        .build();

    let mut history = Vec::new();
    for input in ["one", "two", "three"] {
        let resp = exec
            .execute_with_cancel(
                &AgentSchema::single("solo"),
                input,
                history,
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        history = resp.history;
    }
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].user, "three");
    assert_eq!(history[0].called, 2);
    assert_eq!(history[0].agent, json!("Echo from Mock: three"));
}

#[tokio::test]
async fn concurrent_sessions_share_registries() {
    let registries = Registries::new().with_agent(AgentSpec::new("solo")).unwrap();
    let exec = Arc::new(
        ExecutorBuilder::new(registries)
            .with_generator(Arc::new(MockGenerator))
            .build(),
    );

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let exec = exec.clone();
            tokio::spawn(async move {
                exec.execute(&AgentSchema::single("solo"), &format!("request {i}"))
                    .await
            })
        })
        .collect();

    let mut ids = BTreeSet::new();
    for (i, handle) in handles.into_iter().enumerate() {
        let resp = handle.await.unwrap().unwrap();
        assert_eq!(resp.final_output, json!(format!("Echo from Mock: request {i}")));
        assert_eq!(resp.iterations, 1);
        ids.insert(resp.session_id);
    }
    assert_eq!(ids.len(), 8);
}

#[tokio::test]
async fn invalid_schema_is_rejected_before_running() {
    let registries = Registries::new().with_agent(AgentSpec::new("solo")).unwrap();
    let gen = Arc::new(ScriptedGenerator::new());
    let exec = ExecutorBuilder::new(registries)
        .with_generator(gen.clone())
        .build();

    let err = exec
        .execute(&AgentSchema::single("ghost"), "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AgentError::InvalidSchema(_)));
    assert_eq!(gen.calls(), 0);
}
