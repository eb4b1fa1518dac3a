//! Tools module - Capabilities the model can invoke
//!
//! A [`Tool`] receives parsed JSON arguments and a [`ToolContext`] carrying
//! the thread's working directory and the turn's cancellation token.
//! [`ToolRegistry`] is built once at startup and shared by every agent; the
//! tool set is fixed for an agent's lifetime.

pub mod shell;

pub use shell::ShellTool;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::error::{LoomError, Result};
use crate::providers::ToolDefinition;

/// Execution context handed to every tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Working directory of the owning thread.
    pub work_dir: Option<PathBuf>,
    /// Cancelled when the turn is cancelled; long-running tools must honor it.
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<String>;
}

/// Name-keyed set of tools.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ShellTool::new());
        registry
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Schemas of every registered tool, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Look up `name` and run it with the raw JSON `arguments`.
    pub async fn execute(&self, name: &str, arguments: &str, ctx: &ToolContext) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| LoomError::Tool(format!("agent tool not found: {}", name)))?;

        let args: Value = if arguments.trim().is_empty() {
            json!({})
        } else {
            serde_json::from_str(arguments)
                .map_err(|e| LoomError::Tool(format!("invalid arguments: {}", e)))?
        };

        tool.execute(args, ctx).await
    }
}

/// Content recorded in the log when a tool call fails.
pub fn failure_content(name: &str, err: &LoomError) -> String {
    format!("Tool {} call failed: {}", name, err)
}
