use serde::{Deserialize, Serialize};

/// Lifecycle event pushed to the consumer of a stream request.
///
/// A stream carries zero or more non-terminal events followed by at most
/// one terminal event (`FinalResponse` or `Error`); closing the channel
/// signals completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    StartThinking,
    Thought {
        content: String,
    },
    ExecutingToolStart {
        id: u64,
        name: String,
        args: String,
    },
    ExecutingToolFinish {
        id: u64,
        name: String,
        args: String,
        content: String,
    },
    FinalResponse {
        content: String,
    },
    Error {
        message: String,
    },
}

impl AgentMessage {
    pub fn error(message: impl Into<String>) -> Self {
        AgentMessage::Error {
            message: message.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AgentMessage::FinalResponse { .. } | AgentMessage::Error { .. }
        )
    }

    pub fn is_final_response(&self) -> bool {
        matches!(self, AgentMessage::FinalResponse { .. })
    }
}
