//! OpenAI-compatible chat completions provider.
//!
//! Every built-in model is served through this client; only the base URL
//! and credential differ between vendors.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{LoomError, Result};
use crate::session::{Message, ToolCall};

use super::{LLMProvider, LLMResponse, ToolDefinition, Usage};

pub struct OpenAiProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(name: &str, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

fn format_tool_calls(tool_calls: &[ToolCall]) -> Vec<Value> {
    tool_calls
        .iter()
        .map(|tc| {
            json!({
                "id": tc.id,
                "type": "function",
                "function": {
                    "name": tc.name,
                    "arguments": tc.arguments
                }
            })
        })
        .collect()
}

fn format_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|msg| {
            let mut val = json!({
                "role": msg.role.as_str(),
                "content": msg.content,
            });
            if let Some(id) = &msg.tool_call_id {
                val["tool_call_id"] = json!(id);
            }
            if let Some(calls) = msg.tool_calls.as_ref().filter(|c| !c.is_empty()) {
                val["tool_calls"] = Value::Array(format_tool_calls(calls));
            }
            val
        })
        .collect()
}

fn format_tools(tools: &[ToolDefinition]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters
                }
            })
        })
        .collect()
}

fn build_request_body(model: &str, messages: &[Message], tools: &[ToolDefinition]) -> Value {
    let mut body = json!({
        "model": model,
        "messages": format_messages(messages),
    });
    if !tools.is_empty() {
        body["tools"] = Value::Array(format_tools(tools));
        body["tool_choice"] = json!("auto");
    }
    body
}

/// Arguments stay as the raw JSON string the model produced; the tool
/// decides how to parse them.
fn parse_tool_calls(value: &Value) -> Vec<ToolCall> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|tc| {
                    let id = tc["id"].as_str()?;
                    let name = tc["function"]["name"].as_str()?;
                    let arguments = tc["function"]["arguments"].as_str().unwrap_or("{}");
                    Some(ToolCall::new(id, name, arguments))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_usage(value: &Value) -> Option<Usage> {
    let usage = value.as_object()?;
    let prompt = usage
        .get("prompt_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let completion = usage
        .get("completion_tokens")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Some(Usage::new(prompt, completion))
}

fn parse_response(body: &str) -> Result<LLMResponse> {
    let parsed: Value = serde_json::from_str(body)
        .map_err(|e| LoomError::Provider(format!("failed to parse response: {}", e)))?;
    let message = &parsed["choices"][0]["message"];
    if message.is_null() {
        return Err(LoomError::Provider("response contained no choices".into()));
    }
    Ok(LLMResponse {
        content: message["content"].as_str().unwrap_or_default().to_string(),
        tool_calls: parse_tool_calls(&message["tool_calls"]),
        usage: parse_usage(&parsed["usage"]),
    })
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            LoomError::Provider(format!("no API key configured for {}", self.name))
        })?;

        debug!(
            provider = %self.name,
            model = %model,
            messages = messages.len(),
            tools = tools.len(),
            "Sending chat completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&build_request_body(model, messages, tools))
            .send()
            .await
            .map_err(|e| LoomError::Provider(format!("failed to send request: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LoomError::Provider(format!("failed to read response: {}", e)))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(provider = %self.name, model = %model, "Rate limited by provider");
            return Err(LoomError::RateLimited(text));
        }
        if !status.is_success() {
            return Err(LoomError::Provider(format!(
                "{} returned {}: {}",
                self.name, status, text
            )));
        }

        parse_response(&text)
    }
}
