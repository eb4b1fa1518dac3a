use std::time::Duration;

use crate::config::{AgentsConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_REQUEST_INTERVAL_SECS};
use crate::error::{LoomError, Result};
use crate::providers::ModelRegistry;
use crate::workspace::Workspaces;

/// Settings of a single agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub model_id: String,
    /// Zero means the default of 40.
    pub max_iterations: usize,
    /// Zero means the default of 3 seconds.
    pub request_interval: Duration,
    pub work_dir: String,
}

impl AgentConfig {
    pub fn new(model_id: &str, work_dir: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            max_iterations: 0,
            request_interval: Duration::ZERO,
            work_dir: work_dir.to_string(),
        }
    }

    /// Config for a new thread using the configured agent defaults.
    pub fn from_defaults(defaults: &AgentsConfig, work_dir: &str) -> Self {
        Self {
            model_id: defaults.model.clone(),
            max_iterations: defaults.max_iterations,
            request_interval: defaults.request_interval(),
            work_dir: work_dir.to_string(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_request_interval(mut self, interval: Duration) -> Self {
        self.request_interval = interval;
        self
    }

    /// Trim ids, fill unset limits and check the model and working
    /// directory against the registries.
    pub(crate) fn normalize(
        mut self,
        models: &ModelRegistry,
        workspaces: &Workspaces,
    ) -> Result<Self> {
        self.model_id = validate_model_id(&self.model_id, models)?;
        self.work_dir = validate_work_dir(&self.work_dir, workspaces)?;
        if self.max_iterations == 0 {
            self.max_iterations = DEFAULT_MAX_ITERATIONS;
        }
        if self.request_interval.is_zero() {
            self.request_interval = Duration::from_secs(DEFAULT_REQUEST_INTERVAL_SECS);
        }
        Ok(self)
    }
}

pub(crate) fn validate_model_id(model_id: &str, models: &ModelRegistry) -> Result<String> {
    let model_id = model_id.trim();
    if model_id.is_empty() {
        return Err(LoomError::Validation("agent model is required".into()));
    }
    if !models.contains(model_id) {
        return Err(LoomError::Validation(format!(
            "agent model is not available: {}",
            model_id
        )));
    }
    Ok(model_id.to_string())
}

pub(crate) fn validate_work_dir(work_dir: &str, workspaces: &Workspaces) -> Result<String> {
    let work_dir = work_dir.trim();
    if work_dir.is_empty() {
        return Err(LoomError::Validation("agent work dir is required".into()));
    }
    if !workspaces.is_available(work_dir) {
        return Err(LoomError::Validation(format!(
            "agent work dir is not available: {}",
            work_dir
        )));
    }
    Ok(work_dir.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ModelInfo;
    use crate::testing::ScriptedProvider;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn registries(dir: &TempDir) -> (ModelRegistry, Workspaces) {
        let mut models = ModelRegistry::new("m1");
        models.register(
            ModelInfo::new("m1", "m1", "Test", "8k"),
            Arc::new(ScriptedProvider::new(vec![])),
        );
        let workspaces = Workspaces::new(vec![dir.path().into()], None);
        (models, workspaces)
    }

    #[test]
    fn test_normalize_applies_defaults() {
        let dir = TempDir::new().unwrap();
        let (models, workspaces) = registries(&dir);
        let work_dir = format!("  {}  ", dir.path().display());

        let config = AgentConfig::new(" m1 ", &work_dir)
            .normalize(&models, &workspaces)
            .unwrap();
        assert_eq!(config.model_id, "m1");
        assert_eq!(config.work_dir, dir.path().display().to_string());
        assert_eq!(config.max_iterations, 40);
        assert_eq!(config.request_interval, Duration::from_secs(3));
    }

    #[test]
    fn test_normalize_keeps_explicit_limits() {
        let dir = TempDir::new().unwrap();
        let (models, workspaces) = registries(&dir);

        let config = AgentConfig::new("m1", dir.path().to_str().unwrap())
            .with_max_iterations(5)
            .with_request_interval(Duration::from_millis(10))
            .normalize(&models, &workspaces)
            .unwrap();
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.request_interval, Duration::from_millis(10));
    }

    #[test]
    fn test_normalize_rejects_bad_model_and_dir() {
        let dir = TempDir::new().unwrap();
        let (models, workspaces) = registries(&dir);
        let work_dir = dir.path().to_str().unwrap();

        let err = AgentConfig::new("", work_dir)
            .normalize(&models, &workspaces)
            .unwrap_err();
        assert_eq!(err.to_string(), "validation error: agent model is required");

        let err = AgentConfig::new("unknown", work_dir)
            .normalize(&models, &workspaces)
            .unwrap_err();
        assert!(err.to_string().contains("agent model is not available: unknown"));

        let err = AgentConfig::new("m1", "  ")
            .normalize(&models, &workspaces)
            .unwrap_err();
        assert!(err.to_string().contains("agent work dir is required"));

        let err = AgentConfig::new("m1", "/not/a/known/workspace")
            .normalize(&models, &workspaces)
            .unwrap_err();
        assert!(err.to_string().contains("agent work dir is not available"));
    }
}
