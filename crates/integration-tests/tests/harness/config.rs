//! Programmatic configuration builder for integration tests

use chorus_config::{Config, LlmProviderConfig, LlmProviderType};
use indexmap::IndexMap;
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with no providers and default pipeline limits
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Add a provider of the given family pointed at a mock backend
    pub fn with_provider(mut self, name: &str, provider_type: LlmProviderType, base_url: &str) -> Self {
        self.config.llm.providers.insert(
            name.to_owned(),
            LlmProviderConfig {
                provider_type,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                default_model: Some(format!("{name}-test-model")),
                headers: IndexMap::new(),
            },
        );
        self
    }

    /// Add an OpenAI-compatible provider pointed at a mock backend
    pub fn with_openai_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, LlmProviderType::Openai, base_url)
    }

    /// Add an Anthropic provider pointed at a mock backend
    pub fn with_anthropic_provider(self, name: &str, base_url: &str) -> Self {
        self.with_provider(name, LlmProviderType::Anthropic, base_url)
    }

    /// Bound the tool-call recursion depth
    pub fn with_max_tool_depth(mut self, depth: u32) -> Self {
        self.config.pipeline.max_tool_depth = depth;
        self
    }

    /// Retry failed provider calls
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.pipeline.max_retries = retries;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
