//! Static model registry.
//!
//! Maps a model id to its descriptive info and the provider that serves it.
//! Model selection is a plain lookup; there is no routing policy.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, DEFAULT_MODEL_ID};

use super::{LLMProvider, OpenAiProvider};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub context_window: String,
}

impl ModelInfo {
    pub fn new(id: &str, name: &str, provider: &str, context_window: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            provider: provider.to_string(),
            context_window: context_window.to_string(),
        }
    }
}

struct ModelEntry {
    info: ModelInfo,
    provider: Arc<dyn LLMProvider>,
}

/// OpenAI-compatible endpoints: (config key, display name, base url, api key env var).
const PROVIDERS: &[(&str, &str, &str, &str)] = &[
    ("deepseek", "DeepSeek", "https://api.deepseek.com", "DEEPSEEK_API_KEY"),
    (
        "bytedance",
        "ByteDance",
        "https://ark.cn-beijing.volces.com/api/v3",
        "BYTE_DANCE_API_KEY",
    ),
    ("moonshot", "Moonshot", "https://api.moonshot.cn/v1", "MOONSHOT_API_KEY"),
    (
        "openrouter",
        "OpenRouter",
        "https://openrouter.ai/api/v1",
        "OPENROUTER_API_KEY",
    ),
];

/// Built-in catalogue: (model id, display name, provider key, context window).
const MODELS: &[(&str, &str, &str, &str)] = &[
    ("deepseek-chat", "deepseek-chat", "deepseek", "128k"),
    ("deepseek-reasoner", "deepseek-reasoner", "deepseek", "128k"),
    ("doubao-seed-1-8-251215", "doubao-seed-1.8", "bytedance", "256k"),
    ("kimi-k2-turbo-preview", "kimi-k2", "moonshot", "256k"),
    ("kimi-k2-thinking-turbo", "kimi-k2-thinking", "moonshot", "256k"),
    ("x-ai/grok-4.1-fast", "grok-4.1-fast", "openrouter", "2M"),
    ("qwen/qwen3-coder:free", "qwen3-coder", "openrouter", "262k"),
    ("xiaomi/mimo-v2-flash:free", "mimo-v2-flash", "openrouter", "262k"),
];

/// Registry of available models.
pub struct ModelRegistry {
    models: HashMap<String, ModelEntry>,
    default_model: String,
}

impl ModelRegistry {
    /// Empty registry whose default model is `default_model`.
    pub fn new(default_model: &str) -> Self {
        Self {
            models: HashMap::new(),
            default_model: default_model.to_string(),
        }
    }

    /// Registry holding the built-in catalogue. Credentials come from the
    /// config first and the provider's environment variable second; a
    /// missing key only fails when the model is actually called.
    pub fn builtin(config: &Config) -> Self {
        let mut registry = Self::new(&config.agents.model);

        let mut providers: HashMap<&str, (&str, Arc<dyn LLMProvider>)> = HashMap::new();
        for (key, display, base_url, env_var) in PROVIDERS {
            let overrides = config.providers.get(key);
            let api_key = overrides
                .and_then(|p| p.api_key.clone())
                .or_else(|| std::env::var(env_var).ok())
                .filter(|k| !k.trim().is_empty());
            let base_url = overrides
                .and_then(|p| p.base_url.clone())
                .unwrap_or_else(|| base_url.to_string());
            let provider: Arc<dyn LLMProvider> =
                Arc::new(OpenAiProvider::new(display, &base_url, api_key));
            providers.insert(key, (display, provider));
        }

        for (id, name, provider_key, context_window) in MODELS {
            if let Some((display, provider)) = providers.get(provider_key) {
                registry.register(
                    ModelInfo::new(id, name, display, context_window),
                    Arc::clone(provider),
                );
            }
        }

        debug!(models = registry.models.len(), "Built-in model registry ready");
        registry
    }

    pub fn register(&mut self, info: ModelInfo, provider: Arc<dyn LLMProvider>) {
        self.models
            .insert(info.id.clone(), ModelEntry { info, provider });
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.models.contains_key(model_id)
    }

    pub fn get(&self, model_id: &str) -> Option<Arc<dyn LLMProvider>> {
        self.models.get(model_id).map(|e| Arc::clone(&e.provider))
    }

    pub fn info(&self, model_id: &str) -> Option<&ModelInfo> {
        self.models.get(model_id).map(|e| &e.info)
    }

    /// All registered models sorted by id.
    pub fn list(&self) -> Vec<ModelInfo> {
        let mut infos: Vec<ModelInfo> = self.models.values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalogue() {
        let registry = ModelRegistry::builtin(&Config::default());
        assert_eq!(registry.len(), MODELS.len());
        assert!(registry.contains("deepseek-chat"));
        assert!(registry.contains("x-ai/grok-4.1-fast"));
        assert_eq!(registry.default_model(), DEFAULT_MODEL_ID);

        let info = registry.info("kimi-k2-turbo-preview").unwrap();
        assert_eq!(info.provider, "Moonshot");
        assert_eq!(info.context_window, "256k");
    }

    #[test]
    fn test_list_sorted() {
        let registry = ModelRegistry::builtin(&Config::default());
        let ids: Vec<String> = registry.list().into_iter().map(|m| m.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_unknown_model() {
        let registry = ModelRegistry::default();
        assert!(registry.is_empty());
        assert!(!registry.contains("gpt-nope"));
        assert!(registry.get("gpt-nope").is_none());
    }
}
