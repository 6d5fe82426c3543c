use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::error::LlmError;
use crate::pipeline::chain::Handler;
use crate::pipeline::context::ProcessingContext;
use crate::provider::Provider;
use crate::stream::{ChunkStream, normalize};
use crate::types::{Chunk, CompletionRequest, CompletionsParams, Message, SamplingParams, ToolChoice, ToolChoiceMode, ToolDefinition};

/// Terminal stage: one vendor call, normalized into chunks
pub struct ProviderCall;

#[async_trait]
impl Handler for ProviderCall {
    async fn handle(&self, ctx: Arc<ProcessingContext>, params: CompletionsParams) -> Result<ChunkStream, LlmError> {
        let provider = ctx.provider();
        let request = build_request(provider.as_ref(), &params)?;
        let payload = provider.transform_request(&request)?;
        ctx.record_request(payload.clone(), request.messages);

        tracing::debug!(
            provider = %provider.name(),
            model = %payload.model,
            depth = ctx.depth(),
            stream = payload.stream,
            "invoking provider"
        );

        let started = Instant::now();
        let events = tokio::select! {
            biased;
            () = ctx.token().cancelled() => return Err(LlmError::Aborted),
            events = provider.invoke(&payload) => events?,
        };

        Ok(Box::pin(normalize(events, started).inspect(move |chunk| {
            if let Chunk::TextDelta { text } = chunk {
                ctx.append_output(text);
            }
        })))
    }
}

/// Canonical request for one turn
fn build_request(provider: &dyn Provider, params: &CompletionsParams) -> Result<CompletionRequest, LlmError> {
    let assistant = &params.assistant;

    let model = assistant
        .model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .or_else(|| provider.default_model().map(str::to_owned))
        .ok_or_else(|| {
            LlmError::InvalidRequest(format!(
                "no model given and provider '{}' has no default_model",
                provider.name()
            ))
        })?;

    let mut messages = Vec::with_capacity(params.messages.len() + 1);
    if let Some(prompt) = assistant.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        messages.push(Message::system(prompt));
    }
    messages.extend(params.messages.iter().cloned());

    let capabilities = provider.capabilities();
    let tools = params.active_tools();
    let tools: Option<Vec<ToolDefinition>> =
        (capabilities.tool_calling && !tools.is_empty()).then(|| tools.iter().map(ToolDefinition::from).collect());
    let tool_choice = tools.as_ref().map(|_| ToolChoice::Mode(ToolChoiceMode::Auto));

    Ok(CompletionRequest {
        model,
        messages,
        params: SamplingParams {
            temperature: assistant.temperature,
            top_p: assistant.top_p,
            max_tokens: assistant.max_tokens,
            stop: None,
        },
        reasoning_effort: assistant.reasoning_effort.filter(|_| capabilities.reasoning),
        tools,
        tool_choice,
        stream: params.stream_output && capabilities.streaming,
    })
}
