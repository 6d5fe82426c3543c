use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Chunk;

/// Category of a pipeline failure as seen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Non-2xx or transport failure from the vendor call
    #[serde(rename = "PROVIDER_ERROR")]
    Provider,
    /// Malformed tool-call arguments or vendor frame
    #[serde(rename = "PARSE_ERROR")]
    Parse,
    /// Cancellation observed mid-stream
    #[serde(rename = "ABORT_ERROR")]
    Abort,
    /// The tool-call loop exceeded its maximum depth
    #[serde(rename = "RECURSION_LIMIT_ERROR")]
    RecursionLimit,
    /// An invoked tool failed
    #[serde(rename = "TOOL_EXECUTION_ERROR")]
    ToolExecution,
}

impl ErrorKind {
    /// Stable label used in logs and metrics
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Provider => "provider_error",
            Self::Parse => "parse_error",
            Self::Abort => "abort_error",
            Self::RecursionLimit => "recursion_limit_error",
            Self::ToolExecution => "tool_execution_error",
        }
    }
}

/// Errors that can occur during completion operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// Named provider does not exist in configuration
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Request could not be turned into a vendor call
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Upstream provider returned an error
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Error while reading a streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Vendor data could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// The request was cancelled
    #[error("request aborted")]
    Aborted,

    /// Tool-call recursion hit its bound
    #[error("tool call recursion limit reached ({depth} of {limit})")]
    RecursionLimit { depth: u32, limit: u32 },

    /// A tool invocation failed
    #[error("tool execution failed: {0}")]
    ToolExecution(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// Caller-facing error category
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::Parse,
            Self::Aborted => ErrorKind::Abort,
            Self::RecursionLimit { .. } => ErrorKind::RecursionLimit,
            Self::ToolExecution(_) => ErrorKind::ToolExecution,
            Self::ProviderNotFound { .. }
            | Self::InvalidRequest(_)
            | Self::Upstream(_)
            | Self::Streaming(_)
            | Self::Internal(_) => ErrorKind::Provider,
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Only transport-class failures qualify; request, abort, and tool
    /// errors are deterministic.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Streaming(_))
    }

    /// Terminal chunk describing this error
    pub fn into_chunk(self) -> Chunk {
        Chunk::error(self.kind(), self.to_string())
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Parse(e.to_string())
        } else {
            Self::Upstream(e.to_string())
        }
    }
}
