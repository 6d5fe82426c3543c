//! Entry point for running completions

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chorus_config::PipelineConfig;
use chorus_telemetry::metrics::{self, CompletionSample};
use futures_util::StreamExt;

use super::chain::Chain;
use super::collaborators::{ToolExecutor, WebSearcher};
use super::context::{PipelineSettings, ProcessingContext};
use super::middleware::{ProviderCall, default_middlewares};
use super::registry::AbortRegistry;
use super::result::CompletionsResult;
use crate::error::LlmError;
use crate::provider::ProviderSet;
use crate::stream::ChunkStream;
use crate::types::{Chunk, CompletionHooks, CompletionsParams};

/// Dispatches completion requests to configured providers
///
/// One instance serves any number of concurrent requests; each request
/// gets its own [`ProcessingContext`] and chain.
pub struct Completions {
    providers: ProviderSet,
    registry: Arc<AbortRegistry>,
    settings: PipelineSettings,
    tool_executor: Option<Arc<dyn ToolExecutor>>,
    web_searcher: Option<Arc<dyn WebSearcher>>,
    metrics: bool,
}

impl Completions {
    /// Create a dispatcher over `providers`
    pub fn new(providers: ProviderSet, registry: Arc<AbortRegistry>, config: &PipelineConfig) -> Self {
        Self {
            providers,
            registry,
            settings: PipelineSettings::from(config),
            tool_executor: None,
            web_searcher: None,
            metrics: true,
        }
    }

    /// Execute tool calls with `executor`
    #[must_use]
    pub fn with_tool_executor(mut self, executor: Arc<dyn ToolExecutor>) -> Self {
        self.tool_executor = Some(executor);
        self
    }

    /// Answer web-search queries with `searcher`
    #[must_use]
    pub fn with_web_searcher(mut self, searcher: Arc<dyn WebSearcher>) -> Self {
        self.web_searcher = Some(searcher);
        self
    }

    /// Enable or disable metric recording
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics = enabled;
        self
    }

    /// Override the delay before the first retry
    #[must_use]
    pub const fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.settings.retry_backoff = backoff;
        self
    }

    /// Abort registry shared by every request
    pub const fn registry(&self) -> &Arc<AbortRegistry> {
        &self.registry
    }

    /// Configured providers
    pub const fn providers(&self) -> &ProviderSet {
        &self.providers
    }

    /// Start a completion on `provider_id`
    ///
    /// Only an unknown provider fails here; every later failure is delivered
    /// as an error chunk on the stream.
    pub async fn completions(&self, provider_id: &str, mut params: CompletionsParams) -> Result<CompletionsResult, LlmError> {
        let provider = self.providers.get(provider_id).ok_or_else(|| LlmError::ProviderNotFound {
            provider: provider_id.to_owned(),
        })?;

        params.is_recursive_call = false;
        let hooks = params.hooks.clone();

        let ctx = Arc::new(
            ProcessingContext::new(
                provider,
                self.settings,
                Arc::clone(&self.registry),
                params.abort_key.clone(),
            )
            .with_tool_executor(self.tool_executor.clone())
            .with_web_searcher(self.web_searcher.clone()),
        );

        let root = Chain::build(default_middlewares(&self.settings), Arc::new(ProviderCall));
        ctx.set_root(root.clone());

        tracing::debug!(
            provider = %provider_id,
            abort_key = ?params.abort_key,
            call_type = ?params.call_type,
            messages = params.messages.len(),
            tools = params.active_tools().len(),
            "starting completion"
        );

        let started = Instant::now();
        let stream = root.run(Arc::clone(&ctx), params).await?;

        let text = Arc::new(Mutex::new(String::new()));
        let observer = Observer {
            ctx: Arc::clone(&ctx),
            text: Arc::clone(&text),
            hooks,
            metrics: self.metrics,
            started,
            first_token: None,
        };

        Ok(CompletionsResult::new(observe(stream, observer), text, ctx))
    }
}

impl std::fmt::Debug for Completions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completions")
            .field("providers", &self.providers)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// Watches the chunks delivered to the caller
struct Observer {
    ctx: Arc<ProcessingContext>,
    text: Arc<Mutex<String>>,
    hooks: CompletionHooks,
    metrics: bool,
    started: Instant,
    first_token: Option<Duration>,
}

impl Observer {
    fn observe(&mut self, chunk: &Chunk) {
        match chunk {
            Chunk::TextDelta { text } => {
                self.mark_first_token();
                self.text.lock().unwrap_or_else(PoisonError::into_inner).push_str(text);
            }
            Chunk::ReasoningDelta { .. } | Chunk::ToolCallCreated { .. } => self.mark_first_token(),
            _ => {}
        }

        if let Some(on_chunk) = &self.hooks.on_chunk {
            on_chunk(chunk);
        }

        if chunk.is_terminal() {
            self.finish(chunk);
        }
    }

    fn mark_first_token(&mut self) {
        if self.first_token.is_none() {
            self.first_token = Some(self.started.elapsed());
        }
    }

    fn finish(&self, chunk: &Chunk) {
        let provider = self.ctx.provider();
        let model = self.ctx.last_payload().map(|p| p.model).unwrap_or_default();
        let usage = match chunk {
            Chunk::ResponseComplete { usage, .. } => *usage,
            _ => self.ctx.usage().usage(),
        };
        let outcome = match chunk {
            Chunk::Error(error) => error.kind.as_str(),
            _ => "success",
        };

        tracing::info!(
            provider = %provider.name(),
            model = %model,
            outcome,
            depth = self.ctx.depth(),
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion finished"
        );

        if self.metrics {
            metrics::record_completion(&CompletionSample {
                provider: provider.name(),
                model: &model,
                outcome,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                duration: Some(self.started.elapsed()),
                time_to_first_token: self.first_token,
            });
        }
    }
}

fn observe(stream: ChunkStream, mut observer: Observer) -> ChunkStream {
    Box::pin(stream.inspect(move |chunk| observer.observe(chunk)))
}
