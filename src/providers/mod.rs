//! Providers module - Model provider abstraction
//!
//! A provider is a stateless request/response capability: it receives the
//! full message log plus tool schemas and returns one assistant message,
//! optional tool calls and token usage.
//!
//! Rate limiting is reported as [`LoomError::RateLimited`], a distinct
//! error variant the agent loop retries; every other error is fatal to the
//! turn.
//!
//! [`LoomError::RateLimited`]: crate::error::LoomError::RateLimited

pub mod openai;
pub mod registry;

pub use openai::OpenAiProvider;
pub use registry::{ModelInfo, ModelRegistry};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::session::{Message, ToolCall};

/// Token usage reported by a provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl Usage {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Schema of a tool as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// One assistant turn returned by a provider.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl LLMResponse {
    pub fn text(content: &str) -> Self {
        Self {
            content: content.to_string(),
            ..Self::default()
        }
    }

    pub fn with_tool_calls(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.to_string(),
            tool_calls,
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A chat model backend.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Generate the next assistant message for `messages`.
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_total() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_response_builders() {
        let plain = LLMResponse::text("hello");
        assert!(!plain.has_tool_calls());
        assert!(plain.usage.is_none());

        let tools = LLMResponse::with_tool_calls("", vec![ToolCall::new("1", "bash", "{}")])
            .with_usage(Usage::new(1, 1));
        assert!(tools.has_tool_calls());
        assert_eq!(tools.usage.unwrap().total_tokens, 2);
    }
}
