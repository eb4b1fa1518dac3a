use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::error::{LoomError, Result};
use crate::workspace::WorkspaceInfo;

use super::{ThreadRecord, ThreadStore};

/// Hidden file holding the workspace list. Thread keys never start with a
/// dot, so it cannot collide with a record.
const WORKSPACES_FILE: &str = ".workspaces.json";

/// File-backed thread store.
///
/// Each thread is stored as `<sanitized id>.json` inside the storage
/// directory, next to the workspace list. The directory is created on
/// construction.
#[derive(Debug, Clone)]
pub struct FileThreadStore {
    storage_path: PathBuf,
}

impl FileThreadStore {
    /// Create a store in the default `~/.threadloom/threads` directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_path(Config::dir().join("threads"))
    }

    /// Create a store rooted at a custom directory.
    ///
    /// # Example
    /// ```no_run
    /// use threadloom::store::FileThreadStore;
    /// use std::path::PathBuf;
    ///
    /// let store = FileThreadStore::with_path(PathBuf::from("/tmp/threads")).unwrap();
    /// ```
    pub fn with_path(path: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&path)?;
        Ok(Self { storage_path: path })
    }

    pub fn path(&self) -> &Path {
        &self.storage_path
    }

    fn file_path(&self, thread_id: &str) -> Result<PathBuf> {
        if thread_id.trim().is_empty() {
            return Err(LoomError::Validation("thread id is required".into()));
        }
        Ok(self
            .storage_path
            .join(format!("{}.json", Self::sanitize_key(thread_id))))
    }

    /// Replace characters that are invalid in filenames, and a leading
    /// dot, with underscores.
    fn sanitize_key(key: &str) -> String {
        let key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        match key.strip_prefix('.') {
            Some(rest) => format!("_{}", rest),
            None => key,
        }
    }

    async fn write_atomic(path: &Path, content: String) -> Result<()> {
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content).await?;
        tokio::fs::rename(&tmp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl ThreadStore for FileThreadStore {
    async fn save(&self, record: &ThreadRecord) -> Result<()> {
        let file_path = self.file_path(&record.info.id)?;
        let content = serde_json::to_string_pretty(record).map_err(|e| {
            LoomError::Storage(format!("failed to marshal thread {}: {}", record.info.id, e))
        })?;

        // Records are replaced atomically through a sibling temp file.
        Self::write_atomic(&file_path, content).await?;
        debug!(thread_id = %record.info.id, path = %file_path.display(), "Thread saved");
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<ThreadRecord>> {
        let mut records = Vec::new();
        let mut dir_entries = tokio::fs::read_dir(&self.storage_path).await?;
        while let Some(entry) = dir_entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().map(|e| e == "json").unwrap_or(false) {
                continue;
            }
            if entry.file_name() == WORKSPACES_FILE {
                continue;
            }

            let content = tokio::fs::read_to_string(&path).await?;
            if content.trim().is_empty() {
                continue;
            }

            let record: ThreadRecord = serde_json::from_str(&content).map_err(|e| {
                LoomError::Storage(format!(
                    "failed to unmarshal thread {}: {}",
                    path.display(),
                    e
                ))
            })?;
            records.push(record);
        }

        records.sort_by(|a, b| a.info.id.cmp(&b.info.id));
        Ok(records)
    }

    async fn delete(&self, thread_id: &str) -> Result<()> {
        let file_path = self.file_path(thread_id)?;
        if file_path.exists() {
            tokio::fs::remove_file(&file_path).await?;
        }
        Ok(())
    }

    async fn save_workspaces(&self, workspaces: &[WorkspaceInfo]) -> Result<()> {
        let content = serde_json::to_string_pretty(workspaces)
            .map_err(|e| LoomError::Storage(format!("failed to marshal workspaces: {}", e)))?;
        Self::write_atomic(&self.storage_path.join(WORKSPACES_FILE), content).await?;
        debug!(count = workspaces.len(), "Workspaces saved");
        Ok(())
    }

    async fn load_workspaces(&self) -> Result<Vec<WorkspaceInfo>> {
        let path = self.storage_path.join(WORKSPACES_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = tokio::fs::read_to_string(&path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            LoomError::Storage(format!("failed to unmarshal {}: {}", path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentStats;
    use crate::session::{Message, ThreadInfo};
    use tempfile::TempDir;

    fn record(id: &str) -> ThreadRecord {
        ThreadRecord {
            info: ThreadInfo::new(id, "deepseek-chat", "/tmp"),
            messages: vec![Message::system("sys"), Message::user("Persisted message")],
            message_timestamps: vec![1, 2],
            stats: AgentStats::default(),
        }
    }

    #[tokio::test]
    async fn test_file_persistence_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().to_path_buf();

        {
            let store = FileThreadStore::with_path(storage_path.clone()).unwrap();
            store.save(&record("persist-test")).await.unwrap();
        }

        {
            let store = FileThreadStore::with_path(storage_path).unwrap();
            let records = store.load_all().await.unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].info.id, "persist-test");
            assert_eq!(records[0].messages[1].content, "Persisted message");
        }
    }

    #[tokio::test]
    async fn test_file_persistence_delete() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        store.save(&record("delete-test")).await.unwrap();
        let file_path = temp_dir.path().join("delete-test.json");
        assert!(file_path.exists());

        store.delete("delete-test").await.unwrap();
        assert!(!file_path.exists());

        // Deleting again is fine
        store.delete("delete-test").await.unwrap();
    }

    #[tokio::test]
    async fn test_overwrite_keeps_single_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();

        let mut rec = record("same");
        store.save(&rec).await.unwrap();
        rec.info.title = "Renamed".into();
        store.save(&rec).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.title, "Renamed");
    }

    #[tokio::test]
    async fn test_corrupt_record_fails_load() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        std::fs::write(temp_dir.path().join("broken.json"), "{not json").unwrap();

        let err = store.load_all().await.unwrap_err();
        assert!(matches!(err, LoomError::Storage(_)));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_non_json_files_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        std::fs::write(temp_dir.path().join("notes.txt"), "hello").unwrap();
        std::fs::write(temp_dir.path().join("empty.json"), "").unwrap();

        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(FileThreadStore::sanitize_key("simple"), "simple");
        assert_eq!(FileThreadStore::sanitize_key("thread:abc"), "thread_abc");
        assert_eq!(
            FileThreadStore::sanitize_key("a:b/c\\d*e?f\"g<h>i|j"),
            "a_b_c_d_e_f_g_h_i_j"
        );
        assert_eq!(FileThreadStore::sanitize_key(".workspaces"), "_workspaces");
    }

    #[tokio::test]
    async fn test_workspaces_stored_beside_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        assert!(store.load_workspaces().await.unwrap().is_empty());

        store.save(&record("t1")).await.unwrap();
        let workspaces = vec![
            WorkspaceInfo {
                path: "/srv/a".into(),
                is_default: true,
            },
            WorkspaceInfo {
                path: "/srv/b".into(),
                is_default: false,
            },
        ];
        store.save_workspaces(&workspaces).await.unwrap();

        let reopened = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.load_workspaces().await.unwrap(), workspaces);
        let records = reopened.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].info.id, "t1");
    }

    #[tokio::test]
    async fn test_empty_id_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileThreadStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        assert!(store.delete("  ").await.is_err());
    }
}
