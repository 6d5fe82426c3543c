//! Provider-agnostic streaming completions
//!
//! Requests are described with canonical [`types`], sent to a vendor through
//! a [`provider`] adapter, and come back as a single ordered stream of
//! [`Chunk`]s regardless of vendor. Tool calls, web search, cancellation and
//! usage accounting are handled by the [`pipeline`].
//!
//! ```rust,ignore
//! let providers = ProviderSet::from_config(&config.llm, timeout)?;
//! let completions = Completions::new(providers, Arc::new(AbortRegistry::new()), &config.pipeline);
//!
//! let mut result = completions
//!     .completions("openai", CompletionsParams::new(vec![Message::user("Hello")]))
//!     .await?;
//! let mut stream = result.take_stream().unwrap();
//! while let Some(chunk) = stream.next().await {
//!     // ...
//! }
//! ```

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod convert;
pub mod error;
pub mod pipeline;
pub mod protocol;
pub mod provider;
pub mod stream;
pub mod types;

pub use error::{ErrorKind, LlmError};
pub use pipeline::{
    AbortRegistry, Completions, CompletionsResult, ProcessingContext, ToolExecutor, WebSearcher,
};
pub use provider::{Provider, ProviderSet};
pub use stream::ChunkStream;
pub use types::{
    AssistantSettings, CallType, Chunk, ChunkError, CompletionHooks, CompletionsParams, McpTool, Message, Metrics,
    ReasoningEffort, ToolResponse, ToolUse, Usage, WebSearchQuery, WebSearchResults,
};
