//! 对话历史：有界环形缓冲
//!
//! 每完成一步就在最前面插入一条记录 {called, user, agent, time}，随后截断到 memory_limit，
//! 最旧的记录最先被淘汰。记录可序列化，调用方可保存后在下一次请求时传回。

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 单条历史记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// 调用计数：在上一条（最新）记录基础上 +1，空历史从 0 开始
    pub called: u64,
    pub user: String,
    /// 该步 Agent 的输出
    pub agent: Value,
    pub time: DateTime<Local>,
}

/// 最新在前的有界历史
#[derive(Clone, Debug)]
pub struct ConversationHistory {
    records: VecDeque<HistoryRecord>,
    limit: usize,
}

impl ConversationHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::new(),
            limit,
        }
    }

    /// 用调用方传入的既有历史（最新在前）初始化，超出部分立即截断
    pub fn with_records(limit: usize, records: Vec<HistoryRecord>) -> Self {
        let mut history = Self {
            records: records.into(),
            limit,
        };
        history.records.truncate(limit);
        history
    }

    /// 插入一条新记录并截断
    pub fn record(&mut self, user: &str, agent: Value) {
        let called = self.records.front().map(|r| r.called + 1).unwrap_or(0);
        self.records.push_front(HistoryRecord {
            called,
            user: user.to_string(),
            agent,
            time: Local::now(),
        });
        self.records.truncate(self.limit);
    }

    pub fn latest(&self) -> Option<&HistoryRecord> {
        self.records.front()
    }

    pub fn records(&self) -> impl Iterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn to_vec(&self) -> Vec<HistoryRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// prompt 片段：按时间顺序（最旧在前）列出
    pub fn to_prompt_section(&self) -> String {
        if self.records.is_empty() {
            return String::new();
        }
        let mut s = String::from("## Previous conversation\n");
        for r in self.records.iter().rev() {
            let agent = match &r.agent {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            s.push_str(&format!("- [{}] user: {} | agent: {}\n", r.called, r.user, agent));
        }
        s
    }
}
