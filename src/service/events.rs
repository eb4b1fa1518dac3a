//! Thread events emitted when registry state changes.

use serde::{Deserialize, Serialize};

use crate::session::ThreadInfo;

/// Events broadcast by the [`ThreadService`](super::ThreadService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThreadEvent {
    /// A new thread was registered
    Created { thread: ThreadInfo },

    /// A thread was removed from storage and the registry
    Deleted { thread_id: String },

    /// Messages from non-system index `from_index` onward were dropped
    /// ahead of an edit or regenerate
    MessagesTruncated { thread_id: String, from_index: usize },

    /// Thread title changed
    TitleUpdated { thread_id: String, title: String },
}

impl ThreadEvent {
    pub fn thread_id(&self) -> &str {
        match self {
            ThreadEvent::Created { thread } => &thread.id,
            ThreadEvent::Deleted { thread_id }
            | ThreadEvent::MessagesTruncated { thread_id, .. }
            | ThreadEvent::TitleUpdated { thread_id, .. } => thread_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_accessor() {
        let created = ThreadEvent::Created {
            thread: ThreadInfo::new("t1", "m", "/w"),
        };
        assert_eq!(created.thread_id(), "t1");

        let truncated = ThreadEvent::MessagesTruncated {
            thread_id: "t2".into(),
            from_index: 3,
        };
        assert_eq!(truncated.thread_id(), "t2");
        let value = serde_json::to_value(&truncated).unwrap();
        assert_eq!(value["type"], "messages_truncated");
        assert_eq!(value["from_index"], 3);
    }
}
