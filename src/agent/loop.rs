//! Agent reAct loop
//!
//! One [`Agent`] owns one conversation log. [`Agent::stream_request`] runs
//! a single turn as a spawned task: reason with the model, act by running
//! the requested tools in parallel, observe their results, and repeat until
//! the model answers without tools or the iteration budget runs out.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::error::{LoomError, Result};
use crate::providers::{ModelRegistry, ToolDefinition};
use crate::session::{ConversationLog, Message, ToolCall};
use crate::tools::{failure_content, ToolContext, ToolRegistry};
use crate::workspace::Workspaces;

use super::config::{validate_model_id, validate_work_dir, AgentConfig};
use super::context::ContextBuilder;
use super::events::AgentMessage;
use super::stats::AgentStats;

/// Final answer used when the model ends a turn with empty content.
pub const FALLBACK_RESPONSE: &str = "Sorry, I couldn't generate a meaningful response.";

const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(3);
const EVENT_BUFFER: usize = 64;

/// Collaborators shared by every agent.
#[derive(Clone)]
pub struct AgentDeps {
    pub models: Arc<ModelRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub workspaces: Arc<Workspaces>,
}

pub fn generate_agent_id() -> String {
    format!("agent-{}", Uuid::new_v4())
}

struct AgentState {
    config: AgentConfig,
    log: ConversationLog,
    stats: AgentStats,
    /// Monotonic time of the last provider call in this process.
    last_request: Option<Instant>,
    /// Token of the in-flight stream, if any.
    active: Option<CancellationToken>,
}

struct ToolOutcome {
    id: u64,
    call: ToolCall,
    content: String,
}

/// Clears the single-flight gate when a turn ends, including by panic.
struct ActiveGate<'a>(&'a Agent);

impl Drop for ActiveGate<'_> {
    fn drop(&mut self) {
        self.0.state().active = None;
    }
}

/// A single-thread reasoning/acting agent.
///
/// At most one stream request runs at a time; a second request, or any
/// truncation, while one is active fails with [`LoomError::AgentBusy`].
pub struct Agent {
    id: String,
    deps: AgentDeps,
    context_builder: ContextBuilder,
    /// Enumerated once; the tool set is fixed for the agent's lifetime.
    tool_definitions: Vec<ToolDefinition>,
    next_tool_id: AtomicU64,
    state: Mutex<AgentState>,
}

async fn emit(tx: &mpsc::Sender<AgentMessage>, event: AgentMessage) {
    if tx.send(event).await.is_err() {
        debug!("Event receiver dropped");
    }
}

impl Agent {
    /// Create an agent whose log holds only the system prompt.
    pub fn new(config: AgentConfig, deps: AgentDeps) -> Result<Self> {
        Self::with_context_builder(config, deps, ContextBuilder::new())
    }

    pub fn with_context_builder(
        config: AgentConfig,
        deps: AgentDeps,
        context_builder: ContextBuilder,
    ) -> Result<Self> {
        let config = config.normalize(&deps.models, &deps.workspaces)?;
        let log = ConversationLog::new(&context_builder.build_system_prompt(&config.work_dir));
        Ok(Self::assemble(
            generate_agent_id(),
            config,
            log,
            AgentStats::default(),
            deps,
            context_builder,
        ))
    }

    /// Rebuild an agent from a persisted log and stats.
    pub fn restore(
        id: &str,
        config: AgentConfig,
        log: ConversationLog,
        stats: AgentStats,
        deps: AgentDeps,
    ) -> Result<Self> {
        if id.trim().is_empty() {
            return Err(LoomError::Validation("agent id is required".into()));
        }
        let config = config.normalize(&deps.models, &deps.workspaces)?;
        Ok(Self::assemble(
            id.to_string(),
            config,
            log,
            stats,
            deps,
            ContextBuilder::new(),
        ))
    }

    fn assemble(
        id: String,
        config: AgentConfig,
        log: ConversationLog,
        stats: AgentStats,
        deps: AgentDeps,
        context_builder: ContextBuilder,
    ) -> Self {
        let tool_definitions = deps.tools.definitions();
        let next_tool_id = AtomicU64::new(stats.next_tool_id);
        Self {
            id,
            deps,
            context_builder,
            tool_definitions,
            next_tool_id,
            state: Mutex::new(AgentState {
                config,
                log,
                stats,
                last_request: None,
                active: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_idle(&self, state: &AgentState) -> Result<()> {
        if state.active.is_some() {
            return Err(LoomError::AgentBusy(self.id.clone()));
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> AgentConfig {
        self.state().config.clone()
    }

    pub fn stats(&self) -> AgentStats {
        let mut stats = self.state().stats.clone();
        stats.next_tool_id = self.next_tool_id.load(Ordering::SeqCst);
        stats
    }

    /// Snapshot of the full log, system message included.
    pub fn conversation(&self) -> ConversationLog {
        self.state().log.clone()
    }

    pub fn messages_with_timestamps(&self) -> (Vec<Message>, Vec<i64>) {
        let state = self.state();
        (state.log.messages().to_vec(), state.log.timestamps().to_vec())
    }

    pub fn is_streaming(&self) -> bool {
        self.state().active.is_some()
    }

    pub fn update_model_id(&self, model_id: &str) -> Result<()> {
        let model_id = validate_model_id(model_id, &self.deps.models)?;
        self.state().config.model_id = model_id;
        Ok(())
    }

    /// Move the agent to another workspace. Only allowed before the first
    /// message; the system prompt is rebuilt for the new directory.
    pub fn update_work_dir(&self, work_dir: &str) -> Result<()> {
        let work_dir = work_dir.trim();
        if work_dir.is_empty() {
            return Err(LoomError::Validation("agent work dir is required".into()));
        }
        let mut state = self.state();
        if state.config.work_dir == work_dir {
            return Ok(());
        }
        if state.log.has_history() {
            return Err(LoomError::Validation("agent messages are not empty".into()));
        }
        let work_dir = validate_work_dir(work_dir, &self.deps.workspaces)?;
        let prompt = self.context_builder.build_system_prompt(&work_dir);
        state.log.set_system_prompt(&prompt);
        state.config.work_dir = work_dir;
        Ok(())
    }

    /// Keep messages up to and including non-system `index`.
    pub fn truncate_messages_since(&self, index: usize) -> Result<()> {
        let mut state = self.state();
        self.ensure_idle(&state)?;
        state.log.truncate_since(index)
    }

    /// Drop the message at non-system `index` and everything after it.
    pub fn truncate_messages_from(&self, index: usize) -> Result<()> {
        let mut state = self.state();
        self.ensure_idle(&state)?;
        state.log.truncate_from(index)
    }

    /// Start a turn for `input`. The returned channel yields lifecycle
    /// events and closes when the turn ends. Cancelling `parent` (or
    /// calling [`Agent::cancel_stream_request`]) stops the turn at its next
    /// suspension point.
    pub fn stream_request(
        self: &Arc<Self>,
        input: &str,
        parent: &CancellationToken,
    ) -> Result<mpsc::Receiver<AgentMessage>> {
        let token = parent.child_token();
        {
            let mut state = self.state();
            self.ensure_idle(&state)?;
            state.active = Some(token.clone());
        }

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let agent = Arc::clone(self);
        let input = input.to_string();
        let span = info_span!("agent_turn", agent_id = %self.id);

        tokio::spawn(
            async move {
                {
                    let _gate = ActiveGate(&agent);
                    agent.react_loop(&input, &token, &tx).await;
                }
                drop(tx);
            }
            .instrument(span),
        );

        Ok(rx)
    }

    /// Cancel the in-flight stream; no-op when idle.
    pub fn cancel_stream_request(&self) {
        if let Some(token) = &self.state().active {
            info!(agent_id = %self.id, "Cancelling stream request");
            token.cancel();
        }
    }

    async fn react_loop(
        &self,
        input: &str,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<AgentMessage>,
    ) {
        if input.trim().is_empty() {
            emit(tx, AgentMessage::error("user input is empty")).await;
            return;
        }

        let max_iterations = {
            let mut state = self.state();
            state.log.push(Message::user(input));
            state.config.max_iterations
        };

        let mut iteration = 0;
        while iteration < max_iterations {
            if cancel.is_cancelled() {
                info!(iteration, "Turn cancelled");
                emit(tx, AgentMessage::error(LoomError::Cancelled.to_string())).await;
                return;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => continue,
                _ = self.wait_for_next_turn() => {}
            }

            emit(tx, AgentMessage::StartThinking).await;

            let (model_id, messages) = {
                let state = self.state();
                (state.config.model_id.clone(), state.log.messages().to_vec())
            };
            let Some(provider) = self.deps.models.get(&model_id) else {
                let err = LoomError::Provider(format!("model not found: {}", model_id));
                emit(tx, AgentMessage::error(format!("agent generation failed: {}", err))).await;
                return;
            };

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(iteration, "Turn cancelled during provider call");
                    emit(tx, AgentMessage::error(LoomError::Cancelled.to_string())).await;
                    return;
                }
                res = provider.chat(&model_id, &messages, &self.tool_definitions) => res,
            };

            let response = match result {
                Ok(response) => response,
                Err(e) if e.is_rate_limit() => {
                    warn!(iteration, model = %model_id, "Rate limited, retrying after backoff");
                    iteration += 1;
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {}
                        _ = tokio::time::sleep(RATE_LIMIT_BACKOFF) => {}
                    }
                    continue;
                }
                Err(e) => {
                    error!(iteration, model = %model_id, error = %e, "Provider call failed");
                    emit(tx, AgentMessage::error(format!("agent generation failed: {}", e))).await;
                    return;
                }
            };

            debug!(
                iteration,
                latency_ms = started.elapsed().as_millis() as u64,
                tool_calls = response.tool_calls.len(),
                "Provider responded"
            );

            if !response.content.is_empty() {
                emit(
                    tx,
                    AgentMessage::Thought {
                        content: response.content.clone(),
                    },
                )
                .await;
            }

            {
                let mut state = self.state();
                if let Some(usage) = &response.usage {
                    state.stats.add_usage(usage);
                }
                state.log.push(Message::assistant_with_tools(
                    &response.content,
                    response.tool_calls.clone(),
                ));
            }

            if !response.has_tool_calls() {
                let content = if response.content.is_empty() {
                    FALLBACK_RESPONSE.to_string()
                } else {
                    response.content
                };
                info!(iterations = iteration + 1, "Turn finished");
                emit(tx, AgentMessage::FinalResponse { content }).await;
                return;
            }

            self.execute_tool_calls(&response.tool_calls, cancel, tx)
                .await;
            iteration += 1;
        }

        warn!(max_iterations, "Iteration budget exhausted");
        emit(
            tx,
            AgentMessage::error(format!(
                "Sorry, I've reached the maximum iterations {} and still couldn't produce a final answer",
                max_iterations
            )),
        )
        .await;
    }

    /// Sleep until `request_interval` has passed since the previous
    /// provider call, then record this call.
    async fn wait_for_next_turn(&self) {
        let (interval, last) = {
            let state = self.state();
            (state.config.request_interval, state.last_request)
        };
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < interval {
                tokio::time::sleep(interval - elapsed).await;
            }
        }
        let mut state = self.state();
        state.last_request = Some(Instant::now());
        state.stats.last_request_time = Some(Utc::now());
    }

    /// Run every call in parallel and append the results to the log in the
    /// order the model requested them.
    async fn execute_tool_calls(
        &self,
        calls: &[ToolCall],
        cancel: &CancellationToken,
        tx: &mpsc::Sender<AgentMessage>,
    ) {
        let work_dir = self.state().config.work_dir.clone();
        let ctx = ToolContext::new()
            .with_work_dir(work_dir)
            .with_cancel(cancel.clone());

        let (result_tx, mut result_rx) = mpsc::channel::<ToolOutcome>(calls.len());
        let mut handles = Vec::with_capacity(calls.len());
        for call in calls {
            let id = self.next_tool_id.fetch_add(1, Ordering::SeqCst) + 1;
            emit(
                tx,
                AgentMessage::ExecutingToolStart {
                    id,
                    name: call.name.clone(),
                    args: call.arguments.clone(),
                },
            )
            .await;

            let tools = Arc::clone(&self.deps.tools);
            let ctx = ctx.clone();
            let task_call = call.clone();
            let result_tx = result_tx.clone();
            let handle = tokio::spawn(
                async move {
                    let call = task_call;
                    let started = Instant::now();
                    let content = match tools.execute(&call.name, &call.arguments, &ctx).await {
                        Ok(output) => {
                            debug!(
                                tool = %call.name,
                                latency_ms = started.elapsed().as_millis() as u64,
                                "Tool executed successfully"
                            );
                            output
                        }
                        Err(e) => {
                            warn!(tool = %call.name, error = %e, "Tool execution failed");
                            failure_content(&call.name, &e)
                        }
                    };
                    let _ = result_tx.send(ToolOutcome { id, call, content }).await;
                }
                .in_current_span(),
            );
            handles.push((id, call, handle));
        }
        drop(result_tx);

        let mut results: HashMap<String, String> = HashMap::with_capacity(calls.len());
        while let Some(outcome) = result_rx.recv().await {
            emit(
                tx,
                AgentMessage::ExecutingToolFinish {
                    id: outcome.id,
                    name: outcome.call.name.clone(),
                    args: outcome.call.arguments.clone(),
                    content: outcome.content.clone(),
                },
            )
            .await;
            results.insert(outcome.call.id, outcome.content);
        }

        // The channel is closed, so every task has ended. A task that
        // panicked never sent its outcome.
        for (id, call, handle) in handles {
            let Err(join_err) = handle.await else {
                continue;
            };
            error!(tool = %call.name, error = %join_err, "Tool task panicked");
            let content = failure_content(
                &call.name,
                &LoomError::Tool(format!("tool task failed: {}", join_err)),
            );
            emit(
                tx,
                AgentMessage::ExecutingToolFinish {
                    id,
                    name: call.name.clone(),
                    args: call.arguments.clone(),
                    content: content.clone(),
                },
            )
            .await;
            results.insert(call.id.clone(), content);
        }

        let mut state = self.state();
        for call in calls {
            let content = results.remove(&call.id).unwrap_or_else(|| {
                failure_content(&call.name, &LoomError::Tool("tool produced no result".into()))
            });
            state.log.push(Message::tool_result(&call.id, &content));
        }
    }
}
