use serde::{Deserialize, Serialize};

use super::tool::{ToolResponse, ToolUse};
use super::usage::{Metrics, Usage};
use crate::error::ErrorKind;

/// One normalized output event
///
/// Every chunk stream ends with exactly one terminal chunk
/// (`ResponseComplete` or `Error`) and nothing follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Chunk {
    /// A text segment opened
    TextStart,
    /// Incremental text
    TextDelta {
        /// Text fragment
        text: String,
    },
    /// A text segment closed
    TextEnd {
        /// Full text of the segment
        text: String,
    },
    /// A reasoning segment opened
    ReasoningStart,
    /// Incremental reasoning
    ReasoningDelta {
        /// Reasoning fragment
        text: String,
    },
    /// A reasoning segment closed
    ReasoningEnd {
        /// Full reasoning text of the segment
        text: String,
    },
    /// The model issued a tool call with fully parsed arguments
    ToolCallCreated {
        /// The completed call
        tool_use: ToolUse,
    },
    /// A tool finished executing between turns
    ToolCallResult {
        /// The executed result
        response: ToolResponse,
    },
    /// Web search results folded into the request context
    WebSearchResult {
        /// Search results
        results: WebSearchResults,
    },
    /// The request completed
    ResponseComplete {
        /// Token usage for the response
        usage: Usage,
        /// Response timing
        metrics: Metrics,
    },
    /// The request failed or was aborted
    Error(ChunkError),
}

impl Chunk {
    /// Whether this chunk ends the stream
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::ResponseComplete { .. } | Self::Error(_))
    }

    /// Error chunk of the given kind
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error(ChunkError {
            kind,
            message: message.into(),
        })
    }

    /// Whether this is an abort error
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Error(ChunkError { kind: ErrorKind::Abort, .. }))
    }
}

/// Error carried by a terminal `Error` chunk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkError {
    /// Error category
    pub kind: ErrorKind,
    /// Human-readable cause
    pub message: String,
}

/// Results returned by the web-search collaborator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchResults {
    /// Questions that were searched
    #[serde(default)]
    pub questions: Vec<String>,
    /// Retrieved documents
    #[serde(default)]
    pub items: Vec<WebSearchItem>,
}

impl WebSearchResults {
    /// Render the results as context text appended to the user's message
    pub fn to_context(&self) -> String {
        use std::fmt::Write;

        let mut out = String::from("\n\n[Web search results]\n");
        for (i, item) in self.items.iter().enumerate() {
            let _ = writeln!(out, "[{}] {} ({})\n{}", i + 1, item.title, item.url, item.content);
        }
        out
    }
}

/// One web search hit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchItem {
    /// Page title
    pub title: String,
    /// Page URL
    pub url: String,
    /// Extracted (possibly compressed) page content
    pub content: String,
}
