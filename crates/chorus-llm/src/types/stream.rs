use serde::{Deserialize, Serialize};

use super::usage::Usage;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the `max_tokens` limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Parse the stop reasons used across vendors
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "stop" | "end_turn" | "stop_sequence" | "STOP" => Some(Self::Stop),
            "length" | "max_tokens" | "MAX_TOKENS" => Some(Self::Length),
            "tool_calls" | "tool_use" | "function_call" => Some(Self::ToolCalls),
            "content_filter" | "refusal" | "SAFETY" | "RECITATION" | "BLOCKLIST" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// Vendor-neutral frame decoded from a provider response
///
/// Adapters decode their wire events into this vocabulary; the shared
/// normalizer turns it into [`Chunk`](super::Chunk)s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StreamEvent {
    /// Vendor opened a text block
    TextStart,
    /// Incremental text
    TextDelta(String),
    /// Vendor closed a text block
    TextEnd,
    /// Incremental reasoning
    ReasoningDelta(String),
    /// Vendor closed a reasoning block
    ReasoningEnd,
    /// A tool call started
    ToolCallStart {
        /// Position of the call within the response
        index: u32,
        /// Call identifier
        id: String,
        /// Tool name
        name: String,
    },
    /// Fragment of a tool call's JSON arguments
    ToolCallDelta {
        /// Position of the call within the response
        index: u32,
        /// Argument text fragment
        arguments: String,
    },
    /// Usage snapshot
    Usage(Usage),
    /// Generation stopped
    Finish(FinishReason),
    /// Vendor signalled the end of the response
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vendor_stop_reasons() {
        assert_eq!(FinishReason::parse("end_turn"), Some(FinishReason::Stop));
        assert_eq!(FinishReason::parse("tool_use"), Some(FinishReason::ToolCalls));
        assert_eq!(FinishReason::parse("MAX_TOKENS"), Some(FinishReason::Length));
        assert_eq!(FinishReason::parse("SAFETY"), Some(FinishReason::ContentFilter));
        assert_eq!(FinishReason::parse("FINISH_REASON_UNSPECIFIED"), None);
    }
}
