//! Internal canonical types for the completion pipeline
//!
//! These types are provider-agnostic; every vendor wire format converts
//! to and from them.

pub mod chunk;
pub mod message;
pub mod params;
pub mod request;
pub mod stream;
pub mod tool;
pub mod usage;

pub use chunk::{Chunk, ChunkError, WebSearchItem, WebSearchResults};
pub use message::{Content, ContentPart, FunctionCall, Message, Role, ToolCall};
pub use params::{AssistantSettings, CallType, ChunkCallback, CompletionHooks, CompletionsParams, WebSearchQuery};
pub use request::{CompletionRequest, ReasoningEffort, SamplingParams};
pub use stream::{FinishReason, StreamEvent};
pub use tool::{FunctionDefinition, McpTool, ToolChoice, ToolChoiceMode, ToolDefinition, ToolResponse, ToolUse};
pub use usage::{Metrics, Usage};
