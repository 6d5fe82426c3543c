use std::time::Duration;

use serde::Deserialize;

/// Default bound on tool-call re-invocations for one request
pub const DEFAULT_MAX_TOOL_DEPTH: u32 = 20;

/// Completion pipeline settings
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Maximum number of tool-call re-invocations per top-level request
    #[serde(default = "default_max_tool_depth")]
    pub max_tool_depth: u32,
    /// Retries for a failed provider call before any chunk was produced
    #[serde(default)]
    pub max_retries: u32,
    /// Stream responses by default
    #[serde(default = "default_stream_output")]
    pub stream_output: bool,
    /// Upper bound on a single provider call (e.g. "90s", "2m")
    #[serde(default)]
    pub request_timeout: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_tool_depth: DEFAULT_MAX_TOOL_DEPTH,
            max_retries: 0,
            stream_output: true,
            request_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Parsed request timeout, if configured
    ///
    /// # Errors
    ///
    /// Returns an error if the configured value is not a valid duration
    pub fn request_timeout(&self) -> anyhow::Result<Option<Duration>> {
        self.request_timeout
            .as_deref()
            .map(|raw| {
                duration_str::parse(raw).map_err(|e| anyhow::anyhow!("invalid pipeline.request_timeout `{raw}`: {e}"))
            })
            .transpose()
    }
}

const fn default_max_tool_depth() -> u32 {
    DEFAULT_MAX_TOOL_DEPTH
}

const fn default_stream_output() -> bool {
    true
}
