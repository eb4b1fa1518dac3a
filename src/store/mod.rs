//! Store module - Durable snapshots of thread records
//!
//! One record per thread, written synchronously on every mutating service
//! call. There are no cross-thread transactions and no batching.
//!
//! - [`FileThreadStore`]: one JSON file per thread under a directory
//! - [`MemoryThreadStore`]: process-local map, for tests and ephemeral use

mod file;
mod memory;

pub use file::FileThreadStore;
pub use memory::MemoryThreadStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::AgentStats;
use crate::error::Result;
use crate::session::{Message, ThreadInfo};
use crate::workspace::WorkspaceInfo;

/// Persisted snapshot of a thread: its info, full message log (system
/// message included), parallel timestamps and agent stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub info: ThreadInfo,
    pub messages: Vec<Message>,
    pub message_timestamps: Vec<i64>,
    #[serde(default)]
    pub stats: AgentStats,
}

/// Durable key/value store for thread records.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Write (create or overwrite) the record for `record.info.id`.
    async fn save(&self, record: &ThreadRecord) -> Result<()>;

    /// Load every stored record.
    async fn load_all(&self) -> Result<Vec<ThreadRecord>>;

    /// Remove the record for `thread_id`. Deleting a missing record is not
    /// an error.
    async fn delete(&self, thread_id: &str) -> Result<()>;

    /// Replace the stored workspace list.
    async fn save_workspaces(&self, workspaces: &[WorkspaceInfo]) -> Result<()>;

    /// Stored workspace list; empty when nothing was saved yet.
    async fn load_workspaces(&self) -> Result<Vec<WorkspaceInfo>>;
}
