//! Configuration for Threadloom
//!
//! Configuration is read from `~/.threadloom/config.json` when present and
//! falls back to defaults otherwise. A handful of environment variables
//! override file values after loading.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{LoomError, Result};

/// Default model used for new threads and title generation.
pub const DEFAULT_MODEL_ID: &str = "deepseek-chat";
/// Default reAct loop iteration budget per turn.
pub const DEFAULT_MAX_ITERATIONS: usize = 40;
/// Default minimum spacing between provider calls, in seconds.
pub const DEFAULT_REQUEST_INTERVAL_SECS: u64 = 3;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agents: AgentsConfig,
    pub workspaces: WorkspacesConfig,
    pub providers: ProvidersConfig,
    pub storage: StorageConfig,
}

/// Agent defaults applied to newly created threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub model: String,
    pub max_iterations: usize,
    pub request_interval_secs: u64,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL_ID.to_string(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            request_interval_secs: DEFAULT_REQUEST_INTERVAL_SECS,
        }
    }
}

impl AgentsConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_secs(self.request_interval_secs)
    }
}

/// Known working directories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspacesConfig {
    pub paths: Vec<PathBuf>,
    /// Default workspace; the first entry of `paths` when unset.
    pub default: Option<PathBuf>,
}

/// Per-provider credential and endpoint overrides, keyed by provider name
/// (`deepseek`, `bytedance`, `moonshot`, `openrouter`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    #[serde(flatten)]
    pub entries: HashMap<String, ProviderConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ProvidersConfig {
    pub fn get(&self, provider: &str) -> Option<&ProviderConfig> {
        self.entries.get(provider)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding one JSON file per thread.
    pub path: Option<PathBuf>,
}

impl Config {
    /// Base directory for Threadloom state (`~/.threadloom`).
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".threadloom")
    }

    /// Path of the configuration file.
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_path(&Self::path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from a specific file; a missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| LoomError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("THREADLOOM_MODEL") {
            if !model.trim().is_empty() {
                self.agents.model = model.trim().to_string();
            }
        }
        if let Ok(workspace) = std::env::var("THREADLOOM_WORKSPACE") {
            if !workspace.trim().is_empty() {
                let path = PathBuf::from(workspace.trim());
                if !self.workspaces.paths.contains(&path) {
                    self.workspaces.paths.push(path.clone());
                }
                self.workspaces.default = Some(path);
            }
        }
        if let Ok(raw) = std::env::var("THREADLOOM_MAX_ITERATIONS") {
            match raw.trim().parse::<usize>() {
                Ok(n) => self.agents.max_iterations = n,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid THREADLOOM_MAX_ITERATIONS"),
            }
        }
    }

    /// Directory used by the file thread store.
    pub fn storage_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| Self::dir().join("threads"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.agents.model, DEFAULT_MODEL_ID);
        assert_eq!(config.agents.max_iterations, 40);
        assert_eq!(config.agents.request_interval(), Duration::from_secs(3));
        assert!(config.workspaces.paths.is_empty());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "agents": {"model": "kimi-k2-turbo-preview"},
                "providers": {"moonshot": {"api_key": "sk-test"}}
            }"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.agents.model, "kimi-k2-turbo-preview");
        assert_eq!(config.agents.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(
            config.providers.get("moonshot").unwrap().api_key.as_deref(),
            Some("sk-test")
        );
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            Config::load_from_path(&path),
            Err(LoomError::Config(_))
        ));
    }

    #[test]
    fn test_storage_path_default() {
        let config = Config::default();
        assert!(config.storage_path().ends_with("threads"));
    }
}
