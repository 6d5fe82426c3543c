use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::chunk::Chunk;
use super::message::Message;
use super::request::ReasoningEffort;
use super::tool::McpTool;

/// Assistant configuration applied to every turn of a request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantSettings {
    /// Model identifier; the provider's default model when absent
    #[serde(default)]
    pub model: Option<String>,
    /// System prompt sent ahead of the conversation
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default)]
    pub top_p: Option<f64>,
    /// Maximum tokens to generate per turn
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Reasoning effort for thinking-capable models
    #[serde(default)]
    pub reasoning_effort: Option<ReasoningEffort>,
}

/// What the completion is being used for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    /// Interactive conversation
    #[default]
    Chat,
    /// Translate the last message
    Translate,
    /// Summarize a conversation (e.g. for a topic title)
    Summary,
    /// Extract search keywords from a conversation
    Search,
    /// Free-form generation
    Generate,
}

impl CallType {
    /// Whether tools and web search are offered for this call type
    pub const fn allows_tools(self) -> bool {
        matches!(self, Self::Chat | Self::Generate)
    }
}

/// Questions and links extracted from the conversation for web search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebSearchQuery {
    /// Search questions
    #[serde(default)]
    pub questions: Vec<String>,
    /// Links to fetch directly
    #[serde(default)]
    pub links: Vec<String>,
}

impl WebSearchQuery {
    /// Whether there is nothing to search for
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty() && self.links.is_empty()
    }
}

/// Caller callback invoked with every delivered chunk
pub type ChunkCallback = Arc<dyn Fn(&Chunk) + Send + Sync>;

/// Hooks the caller can attach to a request
#[derive(Clone, Default)]
pub struct CompletionHooks {
    /// Called for every chunk delivered to the caller, in order
    pub on_chunk: Option<ChunkCallback>,
}

impl CompletionHooks {
    /// Hooks with only a chunk callback
    pub fn on_chunk(callback: impl Fn(&Chunk) + Send + Sync + 'static) -> Self {
        Self {
            on_chunk: Some(Arc::new(callback)),
        }
    }
}

impl fmt::Debug for CompletionHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHooks")
            .field("on_chunk", &self.on_chunk.is_some())
            .finish()
    }
}

/// The normalized request handed to the completion pipeline
///
/// The message history is never mutated by the pipeline; recursive turns
/// receive freshly built message vectors.
#[derive(Debug, Clone)]
pub struct CompletionsParams {
    /// Ordered conversation history
    pub messages: Vec<Message>,
    /// Assistant configuration
    pub assistant: AssistantSettings,
    /// What the completion is used for
    pub call_type: CallType,
    /// Request a streamed response from the vendor
    pub stream_output: bool,
    /// Tools the model may invoke
    pub mcp_tools: Vec<McpTool>,
    /// Web search to run before the first turn
    pub web_search: Option<WebSearchQuery>,
    /// Key correlating this request with the abort registry
    pub abort_key: Option<String>,
    /// Set on tool-call re-invocations
    pub is_recursive_call: bool,
    /// Caller hooks
    pub hooks: CompletionHooks,
}

impl CompletionsParams {
    /// Chat request over the given history with default settings
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            assistant: AssistantSettings::default(),
            call_type: CallType::Chat,
            stream_output: true,
            mcp_tools: Vec::new(),
            web_search: None,
            abort_key: None,
            is_recursive_call: false,
            hooks: CompletionHooks::default(),
        }
    }

    /// Set the assistant settings
    #[must_use]
    pub fn with_assistant(mut self, assistant: AssistantSettings) -> Self {
        self.assistant = assistant;
        self
    }

    /// Set the call type
    #[must_use]
    pub const fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    /// Choose between streamed and single-envelope vendor responses
    #[must_use]
    pub const fn with_stream_output(mut self, stream_output: bool) -> Self {
        self.stream_output = stream_output;
        self
    }

    /// Offer tools to the model
    #[must_use]
    pub fn with_tools(mut self, tools: Vec<McpTool>) -> Self {
        self.mcp_tools = tools;
        self
    }

    /// Run a web search before the first turn
    #[must_use]
    pub fn with_web_search(mut self, query: WebSearchQuery) -> Self {
        self.web_search = Some(query);
        self
    }

    /// Correlate the request with the abort registry
    #[must_use]
    pub fn with_abort_key(mut self, key: impl Into<String>) -> Self {
        self.abort_key = Some(key.into());
        self
    }

    /// Attach caller hooks
    #[must_use]
    pub fn with_hooks(mut self, hooks: CompletionHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Tools that apply to this call type
    pub fn active_tools(&self) -> &[McpTool] {
        if self.call_type.allows_tools() { &self.mcp_tools } else { &[] }
    }

    /// Parameters for the next turn of a tool-call recursion
    pub(crate) fn next_turn(&self, messages: Vec<Message>) -> Self {
        Self {
            messages,
            web_search: None,
            is_recursive_call: true,
            ..self.clone()
        }
    }
}
