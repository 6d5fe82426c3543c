//! OpenAI-compatible provider implementation

use std::time::Duration;

use async_trait::async_trait;
use chorus_config::LlmProviderConfig;
use secrecy::ExposeSecret;

use super::{EventStream, Provider, ProviderCapabilities, SseDecoder, Upstream, VendorPayload};
use crate::convert::openai::{OpenAiStreamState, response_to_events};
use crate::error::LlmError;
use crate::protocol::openai::{OpenAiErrorResponse, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk};
use crate::types::{CompletionRequest, StreamEvent};

/// Default `OpenAI` API base URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible provider
///
/// Also serves the many vendors that speak the Chat Completions dialect
/// (`DeepSeek`, Ollama, `OpenRouter`, Groq).
pub struct OpenAiProvider {
    upstream: Upstream,
}

impl OpenAiProvider {
    /// Create from provider configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Internal` if a configured header is invalid.
    pub fn new(name: String, config: &LlmProviderConfig, timeout: Option<Duration>) -> Result<Self, LlmError> {
        Ok(Self {
            upstream: Upstream::new(name, config, DEFAULT_BASE_URL, timeout)?,
        })
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiErrorResponse>(body)
        .ok()
        .map(|e| e.error.message)
}

impl SseDecoder for OpenAiStreamState {
    type Frame = OpenAiStreamChunk;

    fn decode(&mut self, frame: OpenAiStreamChunk) -> Result<Vec<StreamEvent>, LlmError> {
        Ok(self.convert_chunk(&frame))
    }

    fn finish(&mut self) -> Vec<StreamEvent> {
        Self::finish(self)
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        self.upstream.name()
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            reasoning: true,
        }
    }

    fn default_model(&self) -> Option<&str> {
        self.upstream.default_model()
    }

    fn transform_request(&self, request: &CompletionRequest) -> Result<VendorPayload, LlmError> {
        let wire = OpenAiRequest::from(request);
        super::payload(&request.model, request.stream, &wire)
    }

    async fn invoke(&self, payload: &VendorPayload) -> Result<EventStream, LlmError> {
        let client = self.upstream.client()?;
        let mut builder = client.post(self.upstream.url("chat/completions")).json(&payload.body);

        if let Some(key) = self.upstream.api_key() {
            builder = builder.bearer_auth(key.expose_secret());
        }

        tracing::debug!(provider = %self.name(), model = %payload.model, stream = payload.stream, "sending chat completion");
        let response = self.upstream.send(builder, error_message).await?;

        if payload.stream {
            Ok(super::sse_stream(
                self.name().to_owned(),
                response,
                OpenAiStreamState::new(),
            ))
        } else {
            let wire: OpenAiResponse = super::read_json(response).await?;
            Ok(super::replay(response_to_events(&wire)))
        }
    }
}
