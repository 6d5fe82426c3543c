//! Google Generative Language API provider implementation

use std::time::Duration;

use async_trait::async_trait;
use chorus_config::LlmProviderConfig;
use secrecy::ExposeSecret;

use super::{EventStream, Provider, ProviderCapabilities, SseDecoder, Upstream, VendorPayload};
use crate::convert::google::{GoogleStreamState, response_to_events};
use crate::error::LlmError;
use crate::protocol::google::{GoogleErrorResponse, GoogleRequest, GoogleResponse};
use crate::types::{CompletionRequest, StreamEvent};

/// Default Google Generative Language API base URL
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini provider
pub struct GoogleProvider {
    upstream: Upstream,
}

impl GoogleProvider {
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

    /// Endpoint path for a model; the model travels in the URL, not the body
    fn endpoint(model: &str, stream: bool) -> String {
        if stream {
            format!("models/{model}:streamGenerateContent?alt=sse")
        } else {
            format!("models/{model}:generateContent")
        }
    }
}

fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<GoogleErrorResponse>(body)
        .ok()
        .map(|e| e.error.message)
}

impl SseDecoder for GoogleStreamState {
    type Frame = GoogleResponse;

    fn decode(&mut self, frame: GoogleResponse) -> Result<Vec<StreamEvent>, LlmError> {
        Ok(self.convert_chunk(&frame))
    }
}

#[async_trait]
impl Provider for GoogleProvider {
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
        let wire = GoogleRequest::from(request);
        super::payload(&request.model, request.stream, &wire)
    }

    async fn invoke(&self, payload: &VendorPayload) -> Result<EventStream, LlmError> {
        let client = self.upstream.client()?;
        let url = self.upstream.url(&Self::endpoint(&payload.model, payload.stream));
        let mut builder = client.post(url).json(&payload.body);

        if let Some(key) = self.upstream.api_key() {
            builder = builder.header("x-goog-api-key", key.expose_secret());
        }

        tracing::debug!(provider = %self.name(), model = %payload.model, stream = payload.stream, "sending generate request");
        let response = self.upstream.send(builder, error_message).await?;

        if payload.stream {
            Ok(super::sse_stream(
                self.name().to_owned(),
                response,
                GoogleStreamState::new(),
            ))
        } else {
            let wire: GoogleResponse = super::read_json(response).await?;
            Ok(super::replay(response_to_events(&wire)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_depends_on_streaming() {
        assert_eq!(
            GoogleProvider::endpoint("gemini-2.5-flash", true),
            "models/gemini-2.5-flash:streamGenerateContent?alt=sse"
        );
        assert_eq!(
            GoogleProvider::endpoint("gemini-2.5-flash", false),
            "models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn vendor_error_body_is_unwrapped() {
        let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("API key not valid"));
    }
}
