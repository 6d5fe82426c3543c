use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::error::LlmError;
use crate::pipeline::chain::{Middleware, Next};
use crate::pipeline::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::{Chunk, CompletionsParams};

/// Adds each turn's usage to the request totals
///
/// The turn's `ResponseComplete` is rewritten to carry the running totals,
/// so the last turn of a tool-call sequence reports the whole request.
pub struct UsageCollector;

#[async_trait]
impl Middleware for UsageCollector {
    fn name(&self) -> &'static str {
        "usage_collector"
    }

    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError> {
        let inner = next.run(Arc::clone(&ctx), params).await?;

        Ok(Box::pin(inner.map(move |chunk| match chunk {
            Chunk::ResponseComplete { usage, metrics } => {
                let (usage, metrics) = ctx.record_turn(usage, metrics);
                tracing::debug!(
                    depth = ctx.depth(),
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    "turn complete"
                );
                Chunk::ResponseComplete { usage, metrics }
            }
            other => other,
        })))
    }
}
