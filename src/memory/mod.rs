//! 记忆层：跨请求的有界对话历史

pub mod conversation;

pub use conversation::{ConversationHistory, HistoryRecord};
