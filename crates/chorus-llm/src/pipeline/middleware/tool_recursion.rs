use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::{StreamExt, stream};

use crate::error::LlmError;
use crate::pipeline::chain::{Middleware, Next};
use crate::pipeline::context::ProcessingContext;
use crate::stream::ChunkStream;
use crate::types::{Chunk, CompletionsParams, McpTool, Message, ToolResponse, ToolUse};

/// Executes the tools a turn asked for and re-enters the chain with results
///
/// When a turn completes with pending tool calls, its `ResponseComplete` is
/// held back, the calls are resolved against the request's tools and run,
/// and the whole chain is re-entered with the extended history. The
/// follow-up stream is then forwarded as is; it carries the final terminal
/// chunk. Calls naming an unknown tool are dropped with a warning.
pub struct ToolRecursion;

#[async_trait]
impl Middleware for ToolRecursion {
    fn name(&self) -> &'static str {
        "tool_recursion"
    }

    async fn call(
        &self,
        ctx: Arc<ProcessingContext>,
        params: CompletionsParams,
        next: Next,
    ) -> Result<ChunkStream, LlmError> {
        let inner = next.run(Arc::clone(&ctx), params.clone()).await?;
        if params.active_tools().is_empty() {
            return Ok(inner);
        }

        let turn = Turn {
            ctx,
            params,
            stream: inner,
            text: String::new(),
            calls: Vec::new(),
            delegated: false,
        };

        Ok(Box::pin(
            stream::unfold(Some(turn), |state| async move {
                let mut turn = state?;
                let chunks = turn.step().await?;
                let done = chunks.last().is_some_and(Chunk::is_terminal) && !turn.delegated;
                Some((chunks, (!done).then_some(turn)))
            })
            .flat_map(stream::iter),
        ))
    }
}

/// One turn's stream plus what it has asked for so far
struct Turn {
    ctx: Arc<ProcessingContext>,
    params: CompletionsParams,
    stream: ChunkStream,
    text: String,
    calls: Vec<ToolUse>,
    delegated: bool,
}

impl Turn {
    /// Chunks to emit next; `None` once the stream is exhausted
    async fn step(&mut self) -> Option<Vec<Chunk>> {
        let chunk = self.stream.next().await?;
        if self.delegated {
            return Some(vec![chunk]);
        }

        match chunk {
            Chunk::TextDelta { ref text } => self.text.push_str(text),
            Chunk::ToolCallCreated { ref tool_use } => self.calls.push(tool_use.clone()),
            Chunk::ResponseComplete { .. } if !self.calls.is_empty() => return Some(self.recurse(chunk).await),
            _ => {}
        }
        Some(vec![chunk])
    }

    /// Run the pending calls and switch to the follow-up turn's stream
    async fn recurse(&mut self, complete: Chunk) -> Vec<Chunk> {
        let calls = std::mem::take(&mut self.calls);
        let resolved = resolve(calls, self.params.active_tools());
        if resolved.is_empty() {
            return vec![complete];
        }

        let depth = self.ctx.depth();
        let limit = self.ctx.settings().max_tool_depth;
        if depth >= limit {
            tracing::warn!(depth, limit, "tool call recursion limit reached");
            return vec![LlmError::RecursionLimit { depth, limit }.into_chunk()];
        }

        let Some(executor) = self.ctx.tool_executor().cloned() else {
            return vec![LlmError::ToolExecution("no tool executor configured".to_owned()).into_chunk()];
        };

        let responses = join_all(resolved.iter().map(|(call, tool)| {
            let executor = Arc::clone(&executor);
            async move {
                let response = executor.execute(call, tool).await.unwrap_or_else(|e| {
                    tracing::warn!(tool = %call.name, error = %e, "tool execution failed");
                    ToolResponse::failure(call.clone(), tool, e.to_string())
                });
                chorus_telemetry::metrics::record_tool_call(&call.name, !response.is_error);
                response
            }
        }))
        .await;

        let provider = self.ctx.provider();
        let mut messages = self.params.messages.clone();
        messages.push(Message::assistant_tool_calls(
            std::mem::take(&mut self.text),
            resolved.iter().map(|(call, _)| call.to_tool_call()).collect(),
        ));
        messages.extend(responses.iter().map(|r| provider.tool_result_message(r)));

        let mut out: Vec<Chunk> = responses
            .into_iter()
            .map(|response| Chunk::ToolCallResult { response })
            .collect();

        let depth = self.ctx.increment_depth();
        tracing::debug!(depth, calls = resolved.len(), "re-entering chain with tool results");

        match self.ctx.reenter(self.params.next_turn(messages)).await {
            Ok(stream) => {
                self.stream = stream;
                self.delegated = true;
            }
            Err(error) => out.push(error.into_chunk()),
        }
        out
    }
}

/// Pair each call with the tool that serves it
fn resolve(calls: Vec<ToolUse>, tools: &[McpTool]) -> Vec<(ToolUse, McpTool)> {
    calls
        .into_iter()
        .filter_map(|call| match tools.iter().find(|t| t.matches(&call.name)) {
            Some(tool) => Some((call, tool.clone())),
            None => {
                tracing::warn!(tool = %call.name, call_id = %call.id, "dropping call to unknown tool");
                None
            }
        })
        .collect()
}
