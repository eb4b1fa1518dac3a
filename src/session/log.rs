//! Ordered conversation log with per-message timestamps.

use chrono::Utc;

use crate::error::{LoomError, Result};

use super::types::{Message, Role};

/// Ordered message log of one thread.
///
/// Invariants: `messages.len() == timestamps.len()`, and element 0 is the
/// system message, which truncation never removes.
#[derive(Debug, Clone)]
pub struct ConversationLog {
    messages: Vec<Message>,
    timestamps: Vec<i64>,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl ConversationLog {
    /// Create a log holding only the system message.
    pub fn new(system_prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
            timestamps: vec![now_millis()],
        }
    }

    /// Rebuild a log from persisted parts, checking the invariants.
    pub fn from_parts(messages: Vec<Message>, timestamps: Vec<i64>) -> Result<Self> {
        if messages.len() != timestamps.len() {
            return Err(LoomError::Validation(format!(
                "thread messages and timestamps mismatch: {} vs {}",
                messages.len(),
                timestamps.len()
            )));
        }
        match messages.first() {
            Some(first) if first.role == Role::System => {}
            _ => {
                return Err(LoomError::Validation(
                    "conversation log must start with a system message".into(),
                ))
            }
        }
        Ok(Self {
            messages,
            timestamps,
        })
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.timestamps.push(now_millis());
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system message is never removed.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether anything beyond the system message has been recorded.
    pub fn has_history(&self) -> bool {
        self.messages.len() > 1
    }

    /// Replace the system prompt and refresh its timestamp.
    pub fn set_system_prompt(&mut self, content: &str) {
        self.messages[0].content = content.to_string();
        self.timestamps[0] = now_millis();
    }

    /// Number of non-system messages.
    pub fn non_system_len(&self) -> usize {
        self.messages
            .iter()
            .filter(|m| m.role != Role::System)
            .count()
    }

    /// Map a non-system index to a position in the full log.
    fn position_of(&self, index: usize) -> Option<usize> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != Role::System)
            .nth(index)
            .map(|(pos, _)| pos)
    }

    /// Non-system message at `index`.
    pub fn non_system(&self, index: usize) -> Option<&Message> {
        self.position_of(index).map(|pos| &self.messages[pos])
    }

    /// Drop every message after the one at non-system `index`; the indexed
    /// message itself is kept.
    pub fn truncate_since(&mut self, index: usize) -> Result<()> {
        let pos = self
            .position_of(index)
            .ok_or(LoomError::InvalidMessageIndex(index))?;
        self.messages.truncate(pos + 1);
        self.timestamps.truncate(pos + 1);
        Ok(())
    }

    /// Drop the message at non-system `index` and everything after it.
    pub fn truncate_from(&mut self, index: usize) -> Result<()> {
        let pos = self
            .position_of(index)
            .ok_or(LoomError::InvalidMessageIndex(index))?;
        self.messages.truncate(pos);
        self.timestamps.truncate(pos);
        Ok(())
    }

    /// Non-system index of the most recent user message.
    pub fn last_user_index(&self) -> Option<usize> {
        let non_system: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .collect();
        non_system.iter().rposition(|m| m.role == Role::User)
    }

    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == Role::User)
    }
}
