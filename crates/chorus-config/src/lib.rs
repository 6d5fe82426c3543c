//! Configuration for the chorus completion pipeline
//!
//! A single TOML document describes the upstream providers, the pipeline
//! limits, and logging. See [`Config::load`].

#![allow(clippy::must_use_candidate)]

mod env;
pub mod llm;
mod loader;
pub mod pipeline;
pub mod telemetry;

use serde::Deserialize;

pub use llm::*;
pub use pipeline::*;
pub use telemetry::{LogFormat, TelemetryConfig};

/// Top-level chorus configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Completion pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Logging and metrics configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
