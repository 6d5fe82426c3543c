//! Per-request state shared by the middleware chain

use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use chorus_config::PipelineConfig;
use tokio_util::sync::CancellationToken;

use super::aggregate::UsageAggregator;
use super::chain::Next;
use super::collaborators::{ToolExecutor, WebSearcher};
use super::registry::AbortRegistry;
use crate::error::LlmError;
use crate::provider::{Provider, VendorPayload};
use crate::stream::ChunkStream;
use crate::types::{CompletionsParams, Message, Metrics, Usage};

/// Limits applied to one request
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Maximum number of tool-call re-invocations
    pub max_tool_depth: u32,
    /// Retries of a failed provider call before the stream starts
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each later one
    pub retry_backoff: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_tool_depth: config.max_tool_depth,
            max_retries: config.max_retries,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Tool-processing state carried across turns
#[derive(Debug, Default)]
struct ToolState {
    depth: u32,
    last_payload: Option<VendorPayload>,
    sent_messages: Vec<Message>,
    last_output: String,
}

type Cleanup = Box<dyn FnOnce() + Send>;

/// State for one top-level request and all of its tool-call turns
///
/// Created by [`Completions`](super::Completions) and shared by the active
/// chain through an `Arc`; never shared between requests.
pub struct ProcessingContext {
    provider: Arc<dyn Provider>,
    settings: PipelineSettings,
    token: CancellationToken,
    abort_key: Option<String>,
    registry: Arc<AbortRegistry>,
    root: OnceLock<Next>,
    cleanup: Mutex<Option<Cleanup>>,
    tool_state: Mutex<ToolState>,
    usage: Mutex<UsageAggregator>,
    tool_executor: Option<Arc<dyn ToolExecutor>>,
    web_searcher: Option<Arc<dyn WebSearcher>>,
}

impl ProcessingContext {
    /// Context for a new top-level request
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: PipelineSettings,
        registry: Arc<AbortRegistry>,
        abort_key: Option<String>,
    ) -> Self {
        Self {
            provider,
            settings,
            token: CancellationToken::new(),
            abort_key,
            registry,
            root: OnceLock::new(),
            cleanup: Mutex::new(None),
            tool_state: Mutex::new(ToolState::default()),
            usage: Mutex::new(UsageAggregator::default()),
            tool_executor: None,
            web_searcher: None,
        }
    }

    /// Attach the tool execution collaborator
    #[must_use]
    pub fn with_tool_executor(mut self, executor: Option<Arc<dyn ToolExecutor>>) -> Self {
        self.tool_executor = executor;
        self
    }

    /// Attach the web search collaborator
    #[must_use]
    pub fn with_web_searcher(mut self, searcher: Option<Arc<dyn WebSearcher>>) -> Self {
        self.web_searcher = searcher;
        self
    }

    /// Provider serving this request
    pub fn provider(&self) -> Arc<dyn Provider> {
        Arc::clone(&self.provider)
    }

    /// Limits for this request
    pub const fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Cancellation token shared by every turn
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Whether the request was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Caller-supplied abort key
    pub fn abort_key(&self) -> Option<&str> {
        self.abort_key.as_deref()
    }

    /// Registry the request's token is published in
    pub const fn registry(&self) -> &Arc<AbortRegistry> {
        &self.registry
    }

    pub(crate) fn tool_executor(&self) -> Option<&Arc<dyn ToolExecutor>> {
        self.tool_executor.as_ref()
    }

    pub(crate) fn web_searcher(&self) -> Option<&Arc<dyn WebSearcher>> {
        self.web_searcher.as_ref()
    }

    /// Install the chain that recursive turns re-enter
    pub(crate) fn set_root(&self, root: Next) {
        if self.root.set(root).is_err() {
            tracing::debug!("chain root already set");
        }
    }

    /// Run the whole chain again for a follow-up turn
    pub(crate) async fn reenter(self: &Arc<Self>, params: CompletionsParams) -> Result<ChunkStream, LlmError> {
        let root = self
            .root
            .get()
            .cloned()
            .ok_or_else(|| LlmError::Internal(anyhow::anyhow!("processing context has no chain root")))?;
        root.run(Arc::clone(self), params).await
    }

    /// Set the callback run once when the request ends
    pub(crate) fn set_cleanup(&self, cleanup: impl FnOnce() + Send + 'static) {
        *self.cleanup.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(cleanup));
    }

    /// Run the cleanup callback if it has not run yet
    pub(crate) fn run_cleanup(&self) {
        let cleanup = self.cleanup.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    /// Current tool-call recursion depth
    pub fn depth(&self) -> u32 {
        self.tool_state.lock().unwrap_or_else(PoisonError::into_inner).depth
    }

    pub(crate) fn increment_depth(&self) -> u32 {
        let mut state = self.tool_state.lock().unwrap_or_else(PoisonError::into_inner);
        state.depth += 1;
        state.depth
    }

    /// Remember what was sent for the current turn
    pub(crate) fn record_request(&self, payload: VendorPayload, messages: Vec<Message>) {
        let mut state = self.tool_state.lock().unwrap_or_else(PoisonError::into_inner);
        state.last_payload = Some(payload);
        state.sent_messages = messages;
        state.last_output.clear();
    }

    pub(crate) fn append_output(&self, text: &str) {
        self.tool_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_output
            .push_str(text);
    }

    /// Vendor payload of the most recent turn
    pub fn last_payload(&self) -> Option<VendorPayload> {
        self.tool_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_payload
            .clone()
    }

    /// Messages actually sent on the most recent turn
    pub fn sent_messages(&self) -> Vec<Message> {
        self.tool_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sent_messages
            .clone()
    }

    /// Text produced by the most recent turn
    pub fn last_output(&self) -> String {
        self.tool_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last_output
            .clone()
    }

    /// Add a turn's usage; returns the running totals
    pub(crate) fn record_turn(&self, usage: Usage, metrics: Metrics) -> (Usage, Metrics) {
        let mut aggregate = self.usage.lock().unwrap_or_else(PoisonError::into_inner);
        aggregate.record(usage, metrics);
        (aggregate.usage(), aggregate.metrics())
    }

    /// Running usage totals
    pub fn usage(&self) -> UsageAggregator {
        *self.usage.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ProcessingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessingContext")
            .field("provider", &self.provider.name())
            .field("abort_key", &self.abort_key)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
