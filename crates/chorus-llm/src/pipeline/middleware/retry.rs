use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LlmError;
use crate::pipeline::chain::{Middleware, Next};
use crate::pipeline::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::CompletionsParams;

/// Retries transport failures that happen before the stream starts
///
/// Once chunks have been handed out nothing is retried; a mid-stream failure
/// reaches the caller as an error chunk.
pub struct Retry {
    max_retries: u32,
    backoff: Duration,
}

impl Retry {
    /// Retry up to `max_retries` times, doubling `backoff` after each attempt
    pub const fn new(max_retries: u32, backoff: Duration) -> Self {
        Self { max_retries, backoff }
    }

    fn delay(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

#[async_trait]
impl Middleware for Retry {
    fn name(&self) -> &'static str {
        "retry"
    }

    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError> {
        let mut attempt = 0;
        loop {
            match next.run(Arc::clone(&ctx), params.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(error) if attempt < self.max_retries && error.is_retryable() && !ctx.is_cancelled() => {
                    attempt += 1;
                    let delay = self.delay(attempt);
                    tracing::warn!(
                        provider = %ctx.provider().name(),
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "provider call failed, retrying"
                    );

                    tokio::select! {
                        biased;
                        () = ctx.token().cancelled() => return Err(LlmError::Aborted),
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }
}
