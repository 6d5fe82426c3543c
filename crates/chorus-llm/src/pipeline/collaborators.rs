//! External services the pipeline calls between turns

use async_trait::async_trait;

use crate::error::LlmError;
use crate::types::{McpTool, ToolResponse, ToolUse, WebSearchQuery, WebSearchResults};

/// Executes a tool call against the tool that owns it (an MCP client, say)
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Run one call
    ///
    /// An `Err` is reported back to the model as a failed tool result; it
    /// does not end the request.
    async fn execute(&self, call: &ToolUse, tool: &McpTool) -> Result<ToolResponse, LlmError>;
}

/// Answers the web-search questions attached to a request
#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Search for every question and link in the query
    async fn search(&self, query: &WebSearchQuery) -> Result<WebSearchResults, LlmError>;
}
