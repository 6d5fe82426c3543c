#![allow(dead_code)]

pub mod config;
pub mod mock_llm;
pub mod tools;

use std::sync::Arc;
use std::time::Duration;

use chorus_config::Config;
use chorus_llm::pipeline::AbortRegistry;
use chorus_llm::{Chunk, Completions, ErrorKind, ProviderSet};

/// Pipeline over every provider in `config`
pub fn pipeline(config: &Config) -> Completions {
    let providers = ProviderSet::from_config(&config.llm, Some(Duration::from_secs(5))).expect("valid providers");
    Completions::new(providers, Arc::new(AbortRegistry::new()), &config.pipeline).with_retry_backoff(Duration::from_millis(5))
}

/// Stable names for chunk variants, for sequence assertions
pub fn kinds(chunks: &[Chunk]) -> Vec<&'static str> {
    chunks
        .iter()
        .map(|chunk| match chunk {
            Chunk::TextStart => "text_start",
            Chunk::TextDelta { .. } => "text_delta",
            Chunk::TextEnd { .. } => "text_end",
            Chunk::ReasoningStart => "reasoning_start",
            Chunk::ReasoningDelta { .. } => "reasoning_delta",
            Chunk::ReasoningEnd { .. } => "reasoning_end",
            Chunk::ToolCallCreated { .. } => "tool_call_created",
            Chunk::ToolCallResult { .. } => "tool_call_result",
            Chunk::WebSearchResult { .. } => "web_search_result",
            Chunk::ResponseComplete { .. } => "response_complete",
            Chunk::Error(_) => "error",
        })
        .collect()
}

/// Error kind of the terminal chunk, if the stream ended in an error
pub fn error_kind(chunks: &[Chunk]) -> Option<ErrorKind> {
    match chunks.last() {
        Some(Chunk::Error(error)) => Some(error.kind),
        _ => None,
    }
}

/// Check the structural guarantees every chunk stream makes
///
/// Exactly one terminal chunk, in last position, and no reasoning delta
/// after its segment closed.
pub fn assert_well_formed(chunks: &[Chunk]) {
    let terminals = chunks.iter().filter(|c| c.is_terminal()).count();
    assert_eq!(terminals, 1, "expected one terminal chunk in {:?}", kinds(chunks));
    assert!(chunks.last().is_some_and(Chunk::is_terminal), "terminal chunk is not last: {:?}", kinds(chunks));

    let mut reasoning_open = false;
    for chunk in chunks {
        match chunk {
            Chunk::ReasoningStart => {
                assert!(!reasoning_open, "reasoning segment opened twice");
                reasoning_open = true;
            }
            Chunk::ReasoningDelta { .. } => assert!(reasoning_open, "reasoning delta outside a segment"),
            Chunk::ReasoningEnd { .. } => {
                assert!(reasoning_open, "reasoning end without a segment");
                reasoning_open = false;
            }
            _ => {}
        }
    }
}
