use std::path::PathBuf;

use chorus_llm::ReasoningEffort;
use clap::{Parser, ValueEnum};

/// Chorus streaming completion client
#[derive(Debug, Parser)]
#[command(name = "chorus", about = "Stream one completion from a configured LLM provider")]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "chorus.toml", env = "CHORUS_CONFIG")]
    pub config: PathBuf,

    /// Provider id from the configuration (defaults to the first one)
    #[arg(short, long, env = "CHORUS_PROVIDER")]
    pub provider: Option<String>,

    /// Model override
    #[arg(short, long)]
    pub model: Option<String>,

    /// System prompt
    #[arg(short, long)]
    pub system: Option<String>,

    /// Reasoning effort for thinking-capable models
    #[arg(short, long, value_enum)]
    pub reasoning: Option<Effort>,

    /// Ask the provider for a single response instead of a stream
    #[arg(long)]
    pub no_stream: bool,

    /// Prompt text
    #[arg(required = true, trailing_var_arg = true)]
    pub prompt: Vec<String>,
}

/// Reasoning effort accepted on the command line
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Effort {
    Low,
    Medium,
    High,
}

impl From<Effort> for ReasoningEffort {
    fn from(effort: Effort) -> Self {
        match effort {
            Effort::Low => Self::Low,
            Effort::Medium => Self::Medium,
            Effort::High => Self::High,
        }
    }
}
