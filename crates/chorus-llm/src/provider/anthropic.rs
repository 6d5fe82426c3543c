//! Anthropic Messages API provider implementation

use std::time::Duration;

use async_trait::async_trait;
use chorus_config::LlmProviderConfig;
use secrecy::ExposeSecret;

use super::{EventStream, Provider, ProviderCapabilities, SseDecoder, Upstream, VendorPayload};
use crate::convert::anthropic::{AnthropicStreamState, response_to_events};
use crate::error::LlmError;
use crate::protocol::anthropic::{AnthropicErrorResponse, AnthropicRequest, AnthropicResponse, AnthropicStreamEvent};
use crate::types::{CompletionRequest, StreamEvent};

/// Default Anthropic API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Anthropic API version header value
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    upstream: Upstream,
}

impl AnthropicProvider {
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
    serde_json::from_str::<AnthropicErrorResponse>(body)
        .ok()
        .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
}

impl SseDecoder for AnthropicStreamState {
    type Frame = AnthropicStreamEvent;

    fn decode(&mut self, frame: AnthropicStreamEvent) -> Result<Vec<StreamEvent>, LlmError> {
        self.convert_event(&frame)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
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
        let wire = AnthropicRequest::from(request);
        if wire.messages.is_empty() {
            return Err(LlmError::InvalidRequest(
                "anthropic requires at least one non-system message".to_owned(),
            ));
        }
        super::payload(&request.model, request.stream, &wire)
    }

    async fn invoke(&self, payload: &VendorPayload) -> Result<EventStream, LlmError> {
        let client = self.upstream.client()?;
        let mut builder = client
            .post(self.upstream.url("messages"))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&payload.body);

        if let Some(key) = self.upstream.api_key() {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        tracing::debug!(provider = %self.name(), model = %payload.model, stream = payload.stream, "sending messages request");
        let response = self.upstream.send(builder, error_message).await?;

        if payload.stream {
            Ok(super::sse_stream(
                self.name().to_owned(),
                response,
                AnthropicStreamState::new(),
            ))
        } else {
            let wire: AnthropicResponse = super::read_json(response).await?;
            Ok(super::replay(response_to_events(&wire)))
        }
    }
}
