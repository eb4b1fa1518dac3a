//! Known working directories that threads may operate in.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::config::WorkspacesConfig;
use crate::error::{LoomError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub path: PathBuf,
    pub is_default: bool,
}

/// Registry of known workspaces with exactly one default (when non-empty).
#[derive(Debug, Default)]
pub struct Workspaces {
    entries: RwLock<Vec<WorkspaceInfo>>,
}

impl Workspaces {
    /// Build from a list of paths. `default` must be one of them; when it
    /// is `None` the first path becomes the default.
    pub fn new(paths: Vec<PathBuf>, default: Option<PathBuf>) -> Self {
        let default = default.or_else(|| paths.first().cloned());
        let mut entries: Vec<WorkspaceInfo> = Vec::with_capacity(paths.len());
        for path in paths {
            if entries.iter().any(|e| e.path == path) {
                continue;
            }
            let is_default = default.as_ref() == Some(&path);
            entries.push(WorkspaceInfo { path, is_default });
        }
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub fn from_config(config: &WorkspacesConfig) -> Self {
        let mut paths = config.paths.clone();
        if let Some(default) = &config.default {
            if !paths.contains(default) {
                paths.insert(0, default.clone());
            }
        }
        Self::new(paths, config.default.clone())
    }

    pub fn list(&self) -> Vec<WorkspaceInfo> {
        self.entries
            .read()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    pub fn default_workspace(&self) -> Option<PathBuf> {
        self.entries.read().ok().and_then(|entries| {
            entries
                .iter()
                .find(|e| e.is_default)
                .map(|e| e.path.clone())
        })
    }

    /// A path is available when it is a known workspace and currently
    /// exists as a directory.
    pub fn is_available(&self, path: &str) -> bool {
        let candidate = Path::new(path);
        let known = self
            .entries
            .read()
            .map(|entries| entries.iter().any(|e| e.path == candidate))
            .unwrap_or(false);
        known && candidate.is_dir()
    }

    /// Register a new workspace; it becomes the default if none exists.
    pub fn add(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if !path.is_absolute() {
            return Err(LoomError::Validation(format!(
                "workspace path must be absolute: {}",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(LoomError::Validation(format!(
                "workspace path is not a directory: {}",
                path.display()
            )));
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LoomError::Config("workspace registry poisoned".into()))?;
        if entries.iter().any(|e| e.path == path) {
            return Ok(());
        }
        let is_default = !entries.iter().any(|e| e.is_default);
        entries.push(WorkspaceInfo { path, is_default });
        Ok(())
    }

    /// Remove a workspace. The default workspace cannot be removed.
    pub fn remove(&self, path: &Path) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| LoomError::Config("workspace registry poisoned".into()))?;
        let pos = entries
            .iter()
            .position(|e| e.path == path)
            .ok_or_else(|| {
                LoomError::Validation(format!("workspace not found: {}", path.display()))
            })?;
        if entries[pos].is_default {
            return Err(LoomError::Validation(
                "cannot delete the default workspace".into(),
            ));
        }
        entries.remove(pos);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_path_is_default() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let ws = Workspaces::new(vec![a.path().into(), b.path().into()], None);

        assert_eq!(ws.default_workspace().as_deref(), Some(a.path()));
        assert_eq!(ws.list().len(), 2);
    }

    #[test]
    fn test_is_available_requires_known_existing_dir() {
        let dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let ws = Workspaces::new(vec![dir.path().into()], None);

        assert!(ws.is_available(dir.path().to_str().unwrap()));
        assert!(!ws.is_available(other.path().to_str().unwrap()));

        let gone = dir.path().to_path_buf();
        drop(dir);
        assert!(!ws.is_available(gone.to_str().unwrap()));
    }

    #[test]
    fn test_add_and_remove() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let ws = Workspaces::default();

        ws.add(first.path()).unwrap();
        ws.add(second.path()).unwrap();
        assert_eq!(ws.default_workspace().as_deref(), Some(first.path()));

        assert!(ws.remove(first.path()).is_err());
        ws.remove(second.path()).unwrap();
        assert_eq!(ws.list().len(), 1);
    }

    #[test]
    fn test_add_rejects_relative_and_missing() {
        let ws = Workspaces::default();
        assert!(ws.add("relative/path").is_err());
        assert!(ws.add("/definitely/not/here/threadloom").is_err());
    }

    #[test]
    fn test_from_config_includes_default() {
        let dir = TempDir::new().unwrap();
        let config = WorkspacesConfig {
            paths: vec![],
            default: Some(dir.path().into()),
        };
        let ws = Workspaces::from_config(&config);
        assert_eq!(ws.default_workspace().as_deref(), Some(dir.path()));
    }
}
