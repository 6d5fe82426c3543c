//! Handle returned to the caller for one completion

use std::sync::{Arc, Mutex, PoisonError};

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::{Chunk, Metrics, Usage};

/// Result of [`Completions::completions`](super::Completions::completions)
///
/// The chunk stream is lazy and can be taken once. Text and usage accessors
/// reflect whatever has been consumed so far.
pub struct CompletionsResult {
    stream: Option<ChunkStream>,
    text: Arc<Mutex<String>>,
    ctx: Arc<ProcessingContext>,
}

impl CompletionsResult {
    pub(crate) fn new(stream: ChunkStream, text: Arc<Mutex<String>>, ctx: Arc<ProcessingContext>) -> Self {
        Self {
            stream: Some(stream),
            text,
            ctx,
        }
    }

    /// Take the chunk stream; `None` if it was already taken
    pub fn take_stream(&mut self) -> Option<ChunkStream> {
        self.stream.take()
    }

    /// Text delivered so far, across all turns
    pub fn text(&self) -> String {
        self.text.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Token usage summed over the turns completed so far
    pub fn usage(&self) -> Usage {
        self.ctx.usage().usage()
    }

    /// Timing combined over the turns completed so far
    pub fn metrics(&self) -> Metrics {
        self.ctx.usage().metrics()
    }

    /// Cancel the request, including any tool turn in flight
    ///
    /// Idempotent, and a no-op once the stream has ended.
    pub fn cancel(&self) {
        self.ctx.token().cancel();
    }

    /// Token that cancels this request
    pub fn abort_handle(&self) -> CancellationToken {
        self.ctx.token().clone()
    }

    /// Drain the stream into a vector; empty if the stream was taken
    pub async fn collect(mut self) -> Vec<Chunk> {
        match self.take_stream() {
            Some(stream) => stream.collect().await,
            None => Vec::new(),
        }
    }
}

impl std::fmt::Debug for CompletionsResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionsResult")
            .field("stream_taken", &self.stream.is_none())
            .field("cancelled", &self.ctx.token().is_cancelled())
            .finish_non_exhaustive()
    }
}
