use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, a provider entry is
    /// unusable, or the pipeline limits are out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_providers()?;
        self.validate_pipeline()?;
        Ok(())
    }

    fn validate_providers(&self) -> anyhow::Result<()> {
        if self.llm.providers.is_empty() {
            anyhow::bail!("at least one LLM provider must be configured under [llm.providers]");
        }

        for (id, provider) in &self.llm.providers {
            if id.trim().is_empty() {
                anyhow::bail!("provider ids must not be blank");
            }

            if provider.default_model.as_deref().is_some_and(|m| m.trim().is_empty()) {
                anyhow::bail!("provider '{id}' has an empty default_model");
            }
        }

        Ok(())
    }

    fn validate_pipeline(&self) -> anyhow::Result<()> {
        if self.pipeline.max_tool_depth == 0 {
            anyhow::bail!("pipeline.max_tool_depth must be at least 1");
        }

        self.pipeline.request_timeout()?;

        Ok(())
    }
}
