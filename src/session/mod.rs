//! Session module - Thread and conversation state types
//!
//! This module provides the data model shared by the agent and the thread
//! service:
//! - [`Message`], [`Role`] and [`ToolCall`] for conversation content
//! - [`ConversationLog`], the ordered message log with timestamps
//! - [`ThreadInfo`] and [`ThreadMessage`] describing threads to consumers
//!
//! # Example
//!
//! ```
//! use threadloom::session::{ConversationLog, Message};
//!
//! let mut log = ConversationLog::new("You are helpful");
//! log.push(Message::user("Hello!"));
//! log.push(Message::assistant("Hi there!"));
//!
//! assert_eq!(log.non_system_len(), 2);
//! assert_eq!(log.messages().len(), log.timestamps().len());
//! ```

mod log;
pub mod types;

pub use log::ConversationLog;
pub use types::{Message, Role, ToolCall};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Title given to threads before one is generated.
pub const DEFAULT_THREAD_TITLE: &str = "New chat";

/// Descriptive metadata of one thread. Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadInfo {
    pub id: String,
    pub title: String,
    pub model: String,
    pub work_dir: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl ThreadInfo {
    /// New info with the default title and both timestamps set to now.
    pub fn new(id: &str, model: &str, work_dir: &str) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: id.to_string(),
            title: DEFAULT_THREAD_TITLE.to_string(),
            model: model.to_string(),
            work_dir: work_dir.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now().timestamp_millis();
    }
}

/// A non-system message as shown to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_info_defaults() {
        let info = ThreadInfo::new("t1", "deepseek-chat", "/work");
        assert_eq!(info.title, DEFAULT_THREAD_TITLE);
        assert_eq!(info.created_at, info.updated_at);
    }

    #[test]
    fn test_thread_info_touch() {
        let mut info = ThreadInfo::new("t1", "m", "/w");
        info.updated_at = 0;
        info.touch();
        assert!(info.updated_at > 0);
    }

    #[test]
    fn test_thread_info_json_shape() {
        let info = ThreadInfo::new("t1", "m", "/w");
        let value = serde_json::to_value(&info).unwrap();
        assert_eq!(value["id"], "t1");
        assert_eq!(value["work_dir"], "/w");
        assert!(value["created_at"].is_i64());
    }
}
