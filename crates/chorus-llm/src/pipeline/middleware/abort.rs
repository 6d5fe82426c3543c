use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::error::LlmError;
use crate::pipeline::chain::{Middleware, Next};
use crate::pipeline::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::CompletionsParams;

/// Publishes the request's cancellation token and stops the stream on abort
///
/// Only the top-level call registers; recursive turns reuse the same token
/// and pass straight through. On cancellation a single abort error chunk is
/// emitted and nothing follows it. Cleanup runs exactly once, whichever of
/// abort, natural completion, or consumer drop comes first.
pub struct AbortHandler;

#[async_trait]
impl Middleware for AbortHandler {
    fn name(&self) -> &'static str {
        "abort_handler"
    }

    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError> {
        if params.is_recursive_call {
            return next.run(ctx, params).await;
        }

        if let Some(key) = ctx.abort_key() {
            let guard = ctx.registry().register(key, ctx.token().clone());
            let key = key.to_owned();
            ctx.set_cleanup(move || {
                tracing::debug!(abort_key = %key, "releasing abort handle");
                drop(guard);
            });
        }

        match next.run(Arc::clone(&ctx), params).await {
            Ok(inner) => Ok(watch(ctx, inner)),
            Err(error) => {
                ctx.run_cleanup();
                Err(error)
            }
        }
    }
}

/// Stream state that runs the context cleanup if dropped early
struct Watch {
    ctx: Arc<ProcessingContext>,
    inner: ChunkStream,
}

impl Drop for Watch {
    fn drop(&mut self) {
        self.ctx.run_cleanup();
    }
}

fn watch(ctx: Arc<ProcessingContext>, inner: ChunkStream) -> ChunkStream {
    Box::pin(stream::unfold(Some(Watch { ctx, inner }), |state| async move {
        let mut watch = state?;
        let token = watch.ctx.token().clone();

        let next = tokio::select! {
            biased;
            () = token.cancelled() => None,
            chunk = watch.inner.next() => Some(chunk),
        };

        match next {
            None => {
                tracing::info!(abort_key = ?watch.ctx.abort_key(), "request aborted");
                Some((LlmError::Aborted.into_chunk(), None))
            }
            Some(Some(chunk)) if chunk.is_terminal() => Some((chunk, None)),
            Some(Some(chunk)) => Some((chunk, Some(watch))),
            Some(None) => None,
        }
    }))
}
