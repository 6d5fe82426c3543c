//! Middleware composition
//!
//! A chain is an ordered list of [`Middleware`] folded around a terminal
//! [`Handler`]; the first middleware in the list sees the request first.
//! Cross-middleware state lives in the [`ProcessingContext`] only.

use std::sync::Arc;

use async_trait::async_trait;

use super::context::ProcessingContext;
use crate::error::LlmError;
use crate::stream::ChunkStream;
use crate::types::CompletionsParams;

/// One stage of the completion pipeline
///
/// Call `next.run(ctx, params)` to continue, or return without calling it to
/// short-circuit. The returned stream may be wrapped before it is handed back.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Handle a request
    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError>;
}

/// Innermost stage that produces chunks
#[async_trait]
pub trait Handler: Send + Sync {
    /// Produce the chunk stream for one turn
    async fn handle(&self, ctx: Arc<ProcessingContext>, params: CompletionsParams) -> Result<ChunkStream, LlmError>;
}

/// Continuation into the rest of the chain
///
/// Cloning is cheap, so a middleware may run the rest of the chain several
/// times (retries).
#[derive(Clone)]
pub struct Next {
    inner: Arc<dyn Handler>,
}

impl Next {
    /// Run the remaining chain
    pub async fn run(&self, ctx: Arc<ProcessingContext>, params: CompletionsParams) -> Result<ChunkStream, LlmError> {
        self.inner.handle(ctx, params).await
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").finish_non_exhaustive()
    }
}

/// A middleware bound to its continuation
struct Layer {
    middleware: Arc<dyn Middleware>,
    next: Next,
}

#[async_trait]
impl Handler for Layer {
    async fn handle(&self, ctx: Arc<ProcessingContext>, params: CompletionsParams) -> Result<ChunkStream, LlmError> {
        tracing::trace!(middleware = self.middleware.name(), "entering middleware");
        self.middleware.call(ctx, params, self.next.clone()).await
    }
}

/// Builder for the nested continuation chain
pub struct Chain;

impl Chain {
    /// Fold `middlewares` around `terminal`, outermost first
    pub fn build(middlewares: Vec<Arc<dyn Middleware>>, terminal: Arc<dyn Handler>) -> Next {
        middlewares
            .into_iter()
            .rev()
            .fold(Next { inner: terminal }, |next, middleware| Next {
                inner: Arc::new(Layer { middleware, next }),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures_util::{StreamExt, stream};

    use super::*;
    use crate::pipeline::testing::context;
    use crate::types::{Chunk, Message, Usage};

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Middleware for Record {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn call(
            &self,
            ctx: Arc<ProcessingContext>,
            params: CompletionsParams,
            next: Next,
        ) -> Result<ChunkStream, LlmError> {
            self.log.lock().unwrap().push(format!("{} in", self.name));
            let result = next.run(ctx, params).await;
            self.log.lock().unwrap().push(format!("{} out", self.name));
            result
        }
    }

    struct Complete;

    #[async_trait]
    impl Handler for Complete {
        async fn handle(&self, _: Arc<ProcessingContext>, _: CompletionsParams) -> Result<ChunkStream, LlmError> {
            Ok(Box::pin(stream::iter([Chunk::ResponseComplete {
                usage: Usage::default(),
                metrics: crate::types::Metrics::default(),
            }])))
        }
    }

    #[tokio::test]
    async fn first_middleware_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::build(
            vec![
                Arc::new(Record {
                    name: "outer",
                    log: Arc::clone(&log),
                }),
                Arc::new(Record {
                    name: "inner",
                    log: Arc::clone(&log),
                }),
            ],
            Arc::new(Complete),
        );

        let chunks: Vec<Chunk> = chain
            .run(context(), CompletionsParams::new(vec![Message::user("hi")]))
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 1);
        assert_eq!(*log.lock().unwrap(), ["outer in", "inner in", "inner out", "outer out"]);
    }
}
