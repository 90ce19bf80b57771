//! 执行层：输出解析、动作归类、调度、会话状态、主循环与层级委派

pub mod dispatcher;
pub mod events;
pub mod hierarchy;
pub mod loop_;
pub mod observation;
pub mod parser;
pub mod prompt;
pub mod resolver;
pub mod session;

pub use dispatcher::{Dispatch, Dispatcher};
pub use events::SessionEvent;
pub use hierarchy::HierarchicalController;
pub use loop_::{AgentContext, Delegator, SessionController};
pub use observation::{Observation, ObservationKind};
pub use parser::{parse_output, ParseFailure, ParsedPayload};
pub use prompt::{build_prompt, capability_catalog, USER_INPUT_MARKER};
pub use resolver::{resolve, Action, ActionKind, ResolveScope, UnresolvedReason, FINAL_ANSWER};
pub use session::{ContinuationHint, FinalResponse, Session, SessionSettings, Step, Termination};
