//! Adapter selection and the configured provider set

use std::sync::Arc;
use std::time::Duration;

use chorus_config::{LlmConfig, LlmProviderType};
use indexmap::IndexMap;

use super::Provider;
use super::anthropic::AnthropicProvider;
use super::google::GoogleProvider;
use super::openai::OpenAiProvider;
use crate::error::LlmError;

/// Adapter implementation chosen for a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Chat Completions dialect
    OpenAi,
    /// Messages API
    Anthropic,
    /// Generative Language API
    Google,
}

/// Provider ids with a well-known adapter
const ID_TABLE: &[(&str, AdapterKind)] = &[
    ("openai", AdapterKind::OpenAi),
    ("deepseek", AdapterKind::OpenAi),
    ("ollama", AdapterKind::OpenAi),
    ("openrouter", AdapterKind::OpenAi),
    ("groq", AdapterKind::OpenAi),
    ("anthropic", AdapterKind::Anthropic),
    ("claude", AdapterKind::Anthropic),
    ("gemini", AdapterKind::Google),
    ("google", AdapterKind::Google),
    ("vertexai", AdapterKind::Google),
];

/// Pick the adapter for a provider
///
/// An exact id match in the well-known table wins over the configured type.
pub fn select_adapter(id: &str, provider_type: LlmProviderType) -> AdapterKind {
    ID_TABLE
        .iter()
        .find(|(known, _)| *known == id)
        .map_or_else(
            || match provider_type {
                LlmProviderType::Openai => AdapterKind::OpenAi,
                LlmProviderType::Anthropic => AdapterKind::Anthropic,
                LlmProviderType::Google => AdapterKind::Google,
            },
            |(_, kind)| *kind,
        )
}

/// Configured providers keyed by id, in configuration order
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: IndexMap<String, Arc<dyn Provider>>,
}

impl ProviderSet {
    /// Build one adapter per configured provider
    ///
    /// # Errors
    ///
    /// Returns an error if a provider's settings cannot produce an adapter.
    pub fn from_config(config: &LlmConfig, timeout: Option<Duration>) -> Result<Self, LlmError> {
        let mut set = Self::default();

        for (id, provider_config) in &config.providers {
            let kind = select_adapter(id, provider_config.provider_type);
            let provider: Arc<dyn Provider> = match kind {
                AdapterKind::OpenAi => Arc::new(OpenAiProvider::new(id.clone(), provider_config, timeout)?),
                AdapterKind::Anthropic => Arc::new(AnthropicProvider::new(id.clone(), provider_config, timeout)?),
                AdapterKind::Google => Arc::new(GoogleProvider::new(id.clone(), provider_config, timeout)?),
            };

            tracing::debug!(provider = %id, adapter = ?kind, "registered provider");
            set.providers.insert(id.clone(), provider);
        }

        Ok(set)
    }

    /// Add or replace a provider
    pub fn insert(&mut self, id: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(id.into(), provider);
    }

    /// Look up a provider by id
    pub fn get(&self, id: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(id).cloned()
    }

    /// Configured provider ids
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }

    /// Number of configured providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is configured
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}
