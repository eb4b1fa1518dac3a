use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::workspace::WorkspaceInfo;

use super::{ThreadRecord, ThreadStore};

/// In-memory thread store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryThreadStore {
    records: Arc<RwLock<HashMap<String, ThreadRecord>>>,
    workspaces: Arc<RwLock<Vec<WorkspaceInfo>>>,
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a single record by thread id.
    pub async fn get(&self, thread_id: &str) -> Option<ThreadRecord> {
        self.records.read().await.get(thread_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn save(&self, record: &ThreadRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.info.id.clone(), record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ThreadRecord>> {
        let records = self.records.read().await;
        let mut all: Vec<ThreadRecord> = records.values().cloned().collect();
        all.sort_by(|a, b| a.info.id.cmp(&b.info.id));
        Ok(all)
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        self.records.write().await.remove(thread_id);
        Ok(())
    }

    async fn save_workspaces(&self, workspaces: &[WorkspaceInfo]) -> Result<()> {
        *self.workspaces.write().await = workspaces.to_vec();
        Ok(())
    }

    async fn load_workspaces(&self) -> Result<Vec<WorkspaceInfo>> {
        Ok(self.workspaces.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentStats;
    use crate::session::{Message, ThreadInfo};

    #[tokio::test]
    async fn test_memory_store_clone_shares_state() {
        let store = MemoryThreadStore::new();
        let other = store.clone();

        store
            .save(&ThreadRecord {
                info: ThreadInfo::new("shared", "m", "/tmp"),
                messages: vec![Message::system("s")],
                message_timestamps: vec![0],
                stats: AgentStats::default(),
            })
            .await
            .unwrap();

        assert_eq!(other.len().await, 1);
        assert!(other.get("shared").await.is_some());

        other.delete("shared").await.unwrap();
        assert!(store.is_empty().await);
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let store = MemoryThreadStore::new();
        tokio_test::assert_ok!(tokio_test::block_on(store.delete("missing")));
        assert!(tokio_test::block_on(store.load_all()).unwrap().is_empty());
    }
}
