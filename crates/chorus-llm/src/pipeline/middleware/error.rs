use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::error::{ErrorKind, LlmError};
use crate::pipeline::chain::{Middleware, Next};
use crate::pipeline::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::{Chunk, CompletionsParams};

/// Turns failures into error chunks and enforces a single terminal chunk
///
/// After this middleware the stream never fails to start, ends with exactly
/// one terminal chunk, and yields nothing after it.
pub struct ErrorHandler;

#[async_trait]
impl Middleware for ErrorHandler {
    fn name(&self) -> &'static str {
        "error_handler"
    }

    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError> {
        match next.run(Arc::clone(&ctx), params).await {
            Ok(inner) => Ok(terminated(inner)),
            Err(error) => {
                tracing::warn!(provider = %ctx.provider().name(), error = %error, "completion failed before streaming");
                Ok(Box::pin(stream::iter([error.into_chunk()])))
            }
        }
    }
}

fn terminated(inner: ChunkStream) -> ChunkStream {
    Box::pin(stream::unfold(Some(inner), |state| async move {
        let mut inner = state?;
        match inner.next().await {
            Some(chunk) => {
                let rest = (!chunk.is_terminal()).then_some(inner);
                Some((chunk, rest))
            }
            None => Some((
                Chunk::error(ErrorKind::Provider, "stream ended without a terminal chunk"),
                None,
            )),
        }
    }))
}
