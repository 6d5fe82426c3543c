use serde::Deserialize;

/// Logging and metrics configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Log filter directive (e.g. "info,chorus_llm=debug")
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Log line format
    #[serde(default)]
    pub format: LogFormat,
    /// Record pipeline metrics through the global OpenTelemetry meter
    #[serde(default = "default_metrics")]
    pub metrics: bool,
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            format: LogFormat::Text,
            metrics: true,
        }
    }
}

const fn default_metrics() -> bool {
    true
}
