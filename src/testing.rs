//! Scripted fakes shared by unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::agent::{AgentDeps, AgentMessage};
use crate::error::{LoomError, Result};
use crate::providers::{LLMProvider, LLMResponse, ModelInfo, ModelRegistry, ToolDefinition};
use crate::session::{Message, ToolCall};
use crate::tools::{Tool, ToolContext, ToolRegistry};
use crate::workspace::Workspaces;

pub(crate) const TEST_MODEL: &str = "test-model";

/// One scripted provider reply.
pub(crate) enum Step {
    Respond(LLMResponse),
    Fail(LoomError),
    /// Never resolves; only cancellation ends the call.
    Hang,
    /// Panics inside the provider call.
    Panic,
}

impl Step {
    pub(crate) fn text(content: &str) -> Self {
        Step::Respond(LLMResponse::text(content))
    }

    pub(crate) fn tools(calls: Vec<ToolCall>) -> Self {
        Step::Respond(LLMResponse::with_tool_calls("", calls))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ProviderCall {
    pub at: Instant,
    pub messages: Vec<Message>,
}

/// Provider replaying a fixed script; fails once the script runs out.
pub(crate) struct ScriptedProvider {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl ScriptedProvider {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(
        &self,
        _model: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.calls.lock().unwrap().push(ProviderCall {
            at: Instant::now(),
            messages: messages.to_vec(),
        });
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(response)) => Ok(response),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Hang) => std::future::pending::<Result<LLMResponse>>().await,
            Some(Step::Panic) => panic!("scripted provider panic"),
            None => Err(LoomError::Provider("script exhausted".into())),
        }
    }
}

/// Sleeps for `ms` then echoes `tag`.
pub(crate) struct SleepTool;

#[async_trait]
impl Tool for SleepTool {
    fn name(&self) -> &str {
        "sleep"
    }

    fn description(&self) -> &str {
        "Sleep then echo the tag"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "ms": {"type": "integer"},
                "tag": {"type": "string"}
            }
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<String> {
        let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
        let tag = args.get("tag").and_then(Value::as_str).unwrap_or("");
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(format!("{} done", tag))
    }
}

/// Always fails.
pub(crate) struct BrokenTool;

#[async_trait]
impl Tool for BrokenTool {
    fn name(&self) -> &str {
        "broken"
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
        Err(LoomError::Tool("boom".into()))
    }
}

/// Panics when executed.
pub(crate) struct PanicTool;

#[async_trait]
impl Tool for PanicTool {
    fn name(&self) -> &str {
        "panic"
    }

    fn description(&self) -> &str {
        "Panics"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object"})
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<String> {
        panic!("tool blew up")
    }
}

pub(crate) fn sleep_call(id: &str, tag: &str, ms: u64) -> ToolCall {
    ToolCall::new(id, "sleep", &json!({"ms": ms, "tag": tag}).to_string())
}

pub(crate) fn models_with(provider: Arc<ScriptedProvider>) -> ModelRegistry {
    let mut models = ModelRegistry::new(TEST_MODEL);
    models.register(ModelInfo::new(TEST_MODEL, "Test", "Scripted", "8k"), provider);
    models
}

pub(crate) fn test_deps(provider: Arc<ScriptedProvider>, work_dirs: &[&Path]) -> AgentDeps {
    let mut tools = ToolRegistry::new();
    tools.register(SleepTool);
    tools.register(BrokenTool);
    tools.register(PanicTool);
    let workspaces = Workspaces::new(work_dirs.iter().map(|p| p.to_path_buf()).collect(), None);
    AgentDeps {
        models: Arc::new(models_with(provider)),
        tools: Arc::new(tools),
        workspaces: Arc::new(workspaces),
    }
}

/// Drain a stream until the sender side closes.
pub(crate) async fn collect(mut rx: mpsc::Receiver<AgentMessage>) -> Vec<AgentMessage> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
