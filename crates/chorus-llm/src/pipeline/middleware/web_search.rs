use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use crate::error::LlmError;
use crate::pipeline::chain::{Middleware, Next};
use crate::pipeline::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::{Chunk, CompletionsParams, Message, Role, WebSearchResults};

/// Runs the request's web search and folds the results into the prompt
///
/// Applies to the first turn of tool-capable call types only. A failed
/// search is logged and the completion proceeds without results.
pub struct WebSearch;

#[async_trait]
impl Middleware for WebSearch {
    fn name(&self) -> &'static str {
        "web_search"
    }

    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        mut params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError> {
        if params.is_recursive_call || !params.call_type.allows_tools() {
            return next.run(ctx, params).await;
        }
        let Some(query) = params.web_search.take().filter(|q| !q.is_empty()) else {
            return next.run(ctx, params).await;
        };
        let Some(searcher) = ctx.web_searcher().cloned() else {
            tracing::debug!("web search requested but no searcher is configured");
            return next.run(ctx, params).await;
        };

        let searched = tokio::select! {
            biased;
            () = ctx.token().cancelled() => return Err(LlmError::Aborted),
            searched = searcher.search(&query) => searched,
        };

        let results = match searched {
            Ok(results) => results,
            Err(error) => {
                tracing::warn!(error = %error, questions = query.questions.len(), "web search failed");
                return next.run(ctx, params).await;
            }
        };

        tracing::debug!(items = results.items.len(), "folding web search results into prompt");
        params.messages = with_search_context(&params.messages, &results);
        let inner = next.run(ctx, params).await?;

        Ok(Box::pin(stream::iter([Chunk::WebSearchResult { results }]).chain(inner)))
    }
}

/// Copy of `messages` with the results appended to the last user message
fn with_search_context(messages: &[Message], results: &WebSearchResults) -> Vec<Message> {
    let mut messages = messages.to_vec();
    if results.items.is_empty() {
        return messages;
    }

    let context = results.to_context();
    if let Some(last_user) = messages.iter_mut().rev().find(|m| m.role == Role::User) {
        last_user.content = last_user.content.with_appended_text(&context);
    }
    messages
}
