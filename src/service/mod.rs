//! Service module - Multi-thread registry around agents
//!
//! [`ThreadService`] owns every thread (info plus its [`Agent`]) behind one
//! reader/writer lock. It validates requests, computes truncation points
//! before a turn starts, relays agent events 1:1 to the caller, and writes
//! each thread through to a [`ThreadStore`] after every mutation and every
//! completed turn.
//!
//! Persistence failures after a turn are logged, never surfaced: the
//! stream has already reported its own outcome.

mod events;
pub mod title;

pub use events::ThreadEvent;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::agent::{Agent, AgentConfig, AgentDeps, AgentMessage};
use crate::config::AgentsConfig;
use crate::error::{LoomError, Result};
use crate::providers::ModelInfo;
use crate::session::{ConversationLog, Role, ThreadInfo, ThreadMessage};
use crate::store::{ThreadRecord, ThreadStore};
use crate::workspace::WorkspaceInfo;

const RELAY_BUFFER: usize = 64;
const EVENT_CAPACITY: usize = 256;

struct Thread {
    info: ThreadInfo,
    agent: Arc<Agent>,
}

/// Registry of conversation threads. Clones share the same registry.
#[derive(Clone)]
pub struct ThreadService {
    threads: Arc<RwLock<HashMap<String, Thread>>>,
    store: Arc<dyn ThreadStore>,
    deps: AgentDeps,
    defaults: AgentsConfig,
    events_tx: broadcast::Sender<ThreadEvent>,
    /// Parent of every stream token; cancelled on shutdown.
    root_token: CancellationToken,
    /// Relay tasks, awaited on shutdown so final saves land.
    relays: TaskTracker,
}

fn validate_input(input: &str) -> Result<()> {
    if input.trim().is_empty() {
        return Err(LoomError::Validation("user input is empty".into()));
    }
    Ok(())
}

impl ThreadService {
    /// Empty registry; nothing is read from the store.
    pub fn new(store: Arc<dyn ThreadStore>, deps: AgentDeps, defaults: AgentsConfig) -> Self {
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
            store,
            deps,
            defaults,
            events_tx,
            root_token: CancellationToken::new(),
            relays: TaskTracker::new(),
        }
    }

    /// Registry restored from `store`. Stored workspaces are merged into
    /// the known ones first; records whose model or workspace is no longer
    /// available are skipped with a warning.
    pub async fn load(
        store: Arc<dyn ThreadStore>,
        deps: AgentDeps,
        defaults: AgentsConfig,
    ) -> Result<Self> {
        let service = Self::new(store, deps, defaults);

        for workspace in service.store.load_workspaces().await? {
            if let Err(e) = service.deps.workspaces.add(workspace.path.clone()) {
                warn!(path = %workspace.path.display(), error = %e, "Skipping stored workspace");
            }
        }
        service.persist_workspaces_logged().await;

        let records = service.store.load_all().await?;

        let mut threads = service.threads.write().await;
        for record in records {
            let thread_id = record.info.id.clone();
            match service.restore_thread(record) {
                Ok(thread) => {
                    threads.insert(thread_id, thread);
                }
                Err(e) => warn!(thread_id = %thread_id, error = %e, "Skipping unrestorable thread"),
            }
        }
        info!(threads = threads.len(), "Threads loaded from storage");
        drop(threads);

        Ok(service)
    }

    fn restore_thread(&self, record: ThreadRecord) -> Result<Thread> {
        let log = ConversationLog::from_parts(record.messages, record.message_timestamps)?;
        let config = AgentConfig::new(&record.info.model, &record.info.work_dir)
            .with_max_iterations(self.defaults.max_iterations)
            .with_request_interval(self.defaults.request_interval());
        let agent = Agent::restore(&record.info.id, config, log, record.stats, self.deps.clone())?;
        Ok(Thread {
            info: record.info,
            agent: Arc::new(agent),
        })
    }

    /// Subscribe to registry events.
    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: ThreadEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.deps.models.list()
    }

    /// Model used for new threads and title generation.
    pub fn default_model(&self) -> String {
        self.deps.models.default_model().to_string()
    }

    pub fn list_workspaces(&self) -> Vec<WorkspaceInfo> {
        self.deps.workspaces.list()
    }

    /// Register a workspace and save the workspace list.
    pub async fn add_workspace(&self, path: &str) -> Result<()> {
        self.deps.workspaces.add(path.trim())?;
        self.persist_workspaces_logged().await;
        Ok(())
    }

    pub async fn delete_workspace(&self, path: &str) -> Result<()> {
        self.deps
            .workspaces
            .remove(std::path::Path::new(path.trim()))?;
        self.persist_workspaces_logged().await;
        Ok(())
    }

    async fn persist_workspaces_logged(&self) {
        let workspaces = self.deps.workspaces.list();
        if let Err(e) = self.store.save_workspaces(&workspaces).await {
            error!(error = %e, "Failed to persist workspaces");
        }
    }

    /// Create a thread using the default model and workspace, persist it
    /// and register it. Returns the new thread id.
    pub async fn create_thread(&self) -> Result<String> {
        let work_dir = self
            .deps
            .workspaces
            .default_workspace()
            .ok_or_else(|| LoomError::Validation("no default workspace configured".into()))?;
        let config = AgentConfig::from_defaults(&self.defaults, &work_dir.to_string_lossy());
        let agent = Agent::new(config, self.deps.clone())?;
        let config = agent.config();
        let info = ThreadInfo::new(agent.id(), &config.model_id, &config.work_dir);

        let thread = Thread {
            info,
            agent: Arc::new(agent),
        };
        self.store.save(&snapshot(&thread)).await?;

        let id = thread.info.id.clone();
        let info = thread.info.clone();
        self.threads.write().await.insert(id.clone(), thread);

        info!(thread_id = %id, "Thread created");
        self.emit(ThreadEvent::Created { thread: info });
        Ok(id)
    }

    /// Thread infos, most recently updated first.
    pub async fn list_threads(&self) -> Vec<ThreadInfo> {
        let threads = self.threads.read().await;
        let mut infos: Vec<ThreadInfo> = threads.values().map(|t| t.info.clone()).collect();
        infos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        infos
    }

    pub async fn get_thread(&self, id: &str) -> Result<ThreadInfo> {
        self.threads
            .read()
            .await
            .get(id)
            .map(|t| t.info.clone())
            .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))
    }

    async fn agent(&self, id: &str) -> Result<Arc<Agent>> {
        self.threads
            .read()
            .await
            .get(id)
            .map(|t| Arc::clone(&t.agent))
            .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))
    }

    /// Non-system messages of a thread with their timestamps.
    pub async fn get_thread_messages(&self, id: &str) -> Result<Vec<ThreadMessage>> {
        let agent = self.agent(id).await?;
        let (messages, timestamps) = agent.messages_with_timestamps();
        Ok(messages
            .into_iter()
            .zip(timestamps)
            .filter(|(m, _)| m.role != Role::System)
            .map(|(m, timestamp)| ThreadMessage {
                role: m.role,
                content: m.content,
                timestamp,
            })
            .collect())
    }

    /// Whether the thread has not received any user message yet.
    pub async fn is_first_message_to_thread(&self, id: &str) -> Result<bool> {
        let agent = self.agent(id).await?;
        Ok(!agent.conversation().has_user_message())
    }

    pub async fn update_thread_model(&self, id: &str, model_id: &str) -> Result<()> {
        {
            let mut threads = self.threads.write().await;
            let thread = threads
                .get_mut(id)
                .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;
            thread.agent.update_model_id(model_id)?;
            thread.info.model = thread.agent.config().model_id;
            thread.info.touch();
        }
        self.persist_logged(id).await;
        Ok(())
    }

    pub async fn update_thread_work_dir(&self, id: &str, work_dir: &str) -> Result<()> {
        {
            let mut threads = self.threads.write().await;
            let thread = threads
                .get_mut(id)
                .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;
            thread.agent.update_work_dir(work_dir)?;
            thread.info.work_dir = thread.agent.config().work_dir;
            thread.info.touch();
        }
        self.persist_logged(id).await;
        Ok(())
    }

    pub async fn update_thread_title(&self, id: &str, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LoomError::Validation("thread title is empty".into()));
        }
        {
            let mut threads = self.threads.write().await;
            let thread = threads
                .get_mut(id)
                .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;
            thread.info.title = title.to_string();
            thread.info.touch();
        }
        self.persist_logged(id).await;
        self.emit(ThreadEvent::TitleUpdated {
            thread_id: id.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    /// Delete the stored record, then drop the thread from the registry.
    /// A storage failure leaves the thread registered.
    pub async fn delete_thread(&self, id: &str) -> Result<()> {
        if !self.threads.read().await.contains_key(id) {
            return Err(LoomError::ThreadNotFound(id.to_string()));
        }

        self.store.delete(id).await?;

        if let Some(thread) = self.threads.write().await.remove(id) {
            thread.agent.cancel_stream_request();
        }
        info!(thread_id = %id, "Thread deleted");
        self.emit(ThreadEvent::Deleted {
            thread_id: id.to_string(),
        });
        Ok(())
    }

    /// Send `input` to the thread and relay the agent's events.
    pub async fn stream_request_to_thread(
        &self,
        id: &str,
        input: &str,
    ) -> Result<mpsc::Receiver<AgentMessage>> {
        validate_input(input)?;

        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(id)
            .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;

        let first_message = !thread.agent.conversation().has_user_message();
        let origin = thread.agent.stream_request(input, &self.root_token)?;
        thread.info.touch();

        debug!(thread_id = %id, first_message, "Stream request started");
        Ok(self.relay(id, origin, first_message))
    }

    /// Replace the message at non-system `index` (and everything after it)
    /// with `input`, then resend.
    pub async fn edit_and_resend_request_to_thread(
        &self,
        id: &str,
        index: usize,
        input: &str,
    ) -> Result<mpsc::Receiver<AgentMessage>> {
        validate_input(input)?;

        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(id)
            .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;

        thread.agent.truncate_messages_from(index)?;
        self.emit(ThreadEvent::MessagesTruncated {
            thread_id: id.to_string(),
            from_index: index,
        });

        let origin = thread.agent.stream_request(input, &self.root_token)?;
        thread.info.touch();

        debug!(thread_id = %id, index, "Edit and resend started");
        Ok(self.relay(id, origin, index == 0))
    }

    /// Drop everything from the most recent user message onward and resend
    /// that message.
    pub async fn regenerate_last_response_to_thread(
        &self,
        id: &str,
    ) -> Result<mpsc::Receiver<AgentMessage>> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .get_mut(id)
            .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;

        let log = thread.agent.conversation();
        let index = log.last_user_index().ok_or(LoomError::NoUserMessage)?;
        let input = log
            .non_system(index)
            .map(|m| m.content.clone())
            .ok_or(LoomError::InvalidMessageIndex(index))?;

        thread.agent.truncate_messages_from(index)?;
        self.emit(ThreadEvent::MessagesTruncated {
            thread_id: id.to_string(),
            from_index: index,
        });

        let origin = thread.agent.stream_request(&input, &self.root_token)?;
        thread.info.touch();

        debug!(thread_id = %id, index, "Regenerate started");
        Ok(self.relay(id, origin, index == 0))
    }

    pub async fn cancel_stream_request_to_thread(&self, id: &str) -> Result<()> {
        self.agent(id).await?.cancel_stream_request();
        Ok(())
    }

    /// Cancel every in-flight stream and wait for the relays to persist
    /// their threads.
    pub async fn shutdown(&self) {
        self.root_token.cancel();
        self.relays.close();
        self.relays.wait().await;
        info!("Thread service stopped");
    }

    /// Forward every agent event, then persist the thread and, for a
    /// first-message turn that ended in a final response, generate a title.
    fn relay(
        &self,
        id: &str,
        mut origin: mpsc::Receiver<AgentMessage>,
        first_message: bool,
    ) -> mpsc::Receiver<AgentMessage> {
        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        let service = self.clone();
        let thread_id = id.to_string();
        let span = info_span!("thread_relay", thread_id = %id);

        self.relays.spawn(
            async move {
                let mut final_response = false;
                let mut consumer_gone = false;
                while let Some(event) = origin.recv().await {
                    final_response |= event.is_final_response();
                    if !consumer_gone && tx.send(event).await.is_err() {
                        debug!("Relay consumer dropped, draining turn");
                        consumer_gone = true;
                    }
                }
                drop(tx);

                service.persist_logged(&thread_id).await;

                if first_message && final_response {
                    service.refresh_title(&thread_id).await;
                }
            }
            .instrument(span),
        );

        rx
    }

    async fn refresh_title(&self, id: &str) {
        let messages = match self.get_thread_messages(id).await {
            Ok(messages) => messages,
            Err(e) => {
                debug!(thread_id = %id, error = %e, "Thread gone before title generation");
                return;
            }
        };
        match title::generate_thread_title(&self.deps.models, &messages).await {
            Ok(title) => {
                if let Err(e) = self.update_thread_title(id, &title).await {
                    warn!(thread_id = %id, error = %e, "Failed to update thread title");
                }
            }
            Err(e) => warn!(thread_id = %id, error = %e, "Failed to generate thread title"),
        }
    }

    async fn persist(&self, id: &str) -> Result<()> {
        let record = {
            let threads = self.threads.read().await;
            let thread = threads
                .get(id)
                .ok_or_else(|| LoomError::ThreadNotFound(id.to_string()))?;
            snapshot(thread)
        };
        self.store.save(&record).await
    }

    async fn persist_logged(&self, id: &str) {
        if let Err(e) = self.persist(id).await {
            error!(thread_id = %id, error = %e, "Failed to persist thread");
        }
    }
}

fn snapshot(thread: &Thread) -> ThreadRecord {
    let (messages, message_timestamps) = thread.agent.messages_with_timestamps();
    ThreadRecord {
        info: thread.info.clone(),
        messages,
        message_timestamps,
        stats: thread.agent.stats(),
    }
}
