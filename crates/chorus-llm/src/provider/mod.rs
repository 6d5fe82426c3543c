//! Provider trait and implementations for LLM backends

pub mod anthropic;
pub mod google;
pub mod openai;
mod select;

use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use chorus_config::LlmProviderConfig;
use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt, stream};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use url::Url;

pub use select::{AdapterKind, ProviderSet, select_adapter};

use crate::error::LlmError;
use crate::types::{CompletionRequest, Message, StreamEvent, ToolResponse};

/// Stream of neutral events decoded from one vendor call
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, LlmError>> + Send>>;

/// Capabilities advertised by a provider
#[derive(Debug, Clone, Copy)]
pub struct ProviderCapabilities {
    /// Whether the provider supports streaming responses
    pub streaming: bool,
    /// Whether the provider supports tool/function calling
    pub tool_calling: bool,
    /// Whether the provider can return reasoning separately from text
    pub reasoning: bool,
}

/// Vendor-shaped request body ready to be sent
#[derive(Debug, Clone)]
pub struct VendorPayload {
    /// Model the body targets
    pub model: String,
    /// Whether the vendor was asked to stream
    pub stream: bool,
    /// Serialized wire request
    pub body: serde_json::Value,
}

/// Trait implemented by each LLM provider backend
///
/// Adapters never retry; transport failures surface as
/// [`LlmError::Upstream`] and retry policy belongs to the pipeline.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider id from configuration
    fn name(&self) -> &str;

    /// Advertised capabilities
    fn capabilities(&self) -> ProviderCapabilities;

    /// Model used when the assistant does not name one
    fn default_model(&self) -> Option<&str>;

    /// Convert a canonical request into this vendor's wire body
    fn transform_request(&self, request: &CompletionRequest) -> Result<VendorPayload, LlmError>;

    /// Send a payload and decode the response into neutral events
    ///
    /// Non-streaming payloads yield the same event sequence a stream would.
    async fn invoke(&self, payload: &VendorPayload) -> Result<EventStream, LlmError>;

    /// Message carrying a tool result back to the model
    fn tool_result_message(&self, response: &ToolResponse) -> Message {
        let mut message = Message::tool_result(
            response.tool_use.id.clone(),
            response.tool_use.name.clone(),
            response.content.clone(),
        );
        message.is_error = response.is_error;
        message
    }
}

/// Connection settings shared by every HTTP adapter
///
/// The client is built on first use and reused for every later call.
pub(crate) struct Upstream {
    name: String,
    base_url: Url,
    api_key: Option<SecretString>,
    default_model: Option<String>,
    headers: HeaderMap,
    timeout: Option<Duration>,
    client: OnceLock<Client>,
}

impl Upstream {
    pub(crate) fn new(
        name: String,
        config: &LlmProviderConfig,
        default_base_url: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => Url::parse(default_base_url).map_err(|e| LlmError::Internal(e.into()))?,
        };

        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let header = HeaderName::try_from(key.as_str())
                .map_err(|e| LlmError::Internal(anyhow::anyhow!("invalid header name '{key}' for {name}: {e}")))?;
            let value = HeaderValue::try_from(value.as_str())
                .map_err(|e| LlmError::Internal(anyhow::anyhow!("invalid value for header '{key}': {e}")))?;
            headers.insert(header, value);
        }

        Ok(Self {
            name,
            base_url,
            api_key: config.api_key.clone(),
            default_model: config.default_model.clone(),
            headers,
            timeout,
            client: OnceLock::new(),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub(crate) fn default_model(&self) -> Option<&str> {
        self.default_model.as_deref()
    }

    /// Join a path onto the base URL
    pub(crate) fn url(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/{path}")
    }

    /// Lazily built HTTP client
    pub(crate) fn client(&self) -> Result<&Client, LlmError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }

        let mut builder = Client::builder().default_headers(self.headers.clone());
        if let Some(timeout) = self.timeout {
            builder = builder.connect_timeout(timeout).read_timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| LlmError::Internal(anyhow::anyhow!("failed to build HTTP client: {e}")))?;

        Ok(self.client.get_or_init(|| client))
    }

    /// Send a request and turn non-success statuses into upstream errors
    ///
    /// `error_message` extracts the vendor's message from an error body.
    pub(crate) async fn send(
        &self,
        builder: RequestBuilder,
        error_message: fn(&str) -> Option<String>,
    ) -> Result<Response, LlmError> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!(provider = %self.name, error = %e, "upstream request failed");
            LlmError::Upstream(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = %self.name, status = %status, "upstream returned error");
            let message = error_message(&body).unwrap_or(body);
            return Err(LlmError::Upstream(format!("provider returned {status}: {message}")));
        }

        Ok(response)
    }
}

/// Decoder for one vendor's SSE data frames
pub(crate) trait SseDecoder: Send + 'static {
    /// Wire type of one `data:` payload
    type Frame: DeserializeOwned;

    /// Convert one frame to neutral events
    fn decode(&mut self, frame: Self::Frame) -> Result<Vec<StreamEvent>, LlmError>;

    /// Events still buffered when the stream ends
    fn finish(&mut self) -> Vec<StreamEvent> {
        Vec::new()
    }
}

/// Decode an SSE response body with a vendor decoder
///
/// Unparseable frames are logged and skipped. A transport or decoder error
/// is yielded once and ends the stream.
pub(crate) fn sse_stream<D: SseDecoder>(provider: String, response: Response, decoder: D) -> EventStream {
    let frames = Box::pin(response.bytes_stream().eventsource());

    let events = stream::unfold(Some((frames, decoder)), move |state| {
        let provider = provider.clone();
        async move {
            let (mut frames, mut decoder) = state?;

            let Some(frame) = frames.next().await else {
                let rest: Vec<Result<StreamEvent, LlmError>> = decoder.finish().into_iter().map(Ok).collect();
                return Some((rest, None));
            };

            let event = match frame {
                Ok(event) => event,
                Err(e) => {
                    tracing::error!(provider = %provider, error = %e, "upstream stream failed");
                    return Some((vec![Err(LlmError::Streaming(e.to_string()))], None));
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                return Some((Vec::new(), Some((frames, decoder))));
            }
            if data == "[DONE]" {
                let mut out: Vec<Result<StreamEvent, LlmError>> = decoder.finish().into_iter().map(Ok).collect();
                out.push(Ok(StreamEvent::Done));
                return Some((out, Some((frames, decoder))));
            }

            let parsed = match serde_json::from_str::<D::Frame>(data) {
                Ok(parsed) => parsed,
                Err(e) => {
                    tracing::warn!(provider = %provider, error = %e, "skipping unparseable SSE frame");
                    return Some((Vec::new(), Some((frames, decoder))));
                }
            };

            match decoder.decode(parsed) {
                Ok(decoded) => Some((decoded.into_iter().map(Ok).collect(), Some((frames, decoder)))),
                Err(e) => Some((vec![Err(e)], None)),
            }
        }
    })
    .flat_map(stream::iter);

    Box::pin(events)
}

/// Event stream over an already decoded, non-streaming response
pub(crate) fn replay(events: Vec<StreamEvent>) -> EventStream {
    Box::pin(stream::iter(events.into_iter().map(Ok)))
}

/// Read a JSON response body
pub(crate) async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, LlmError> {
    response
        .json()
        .await
        .map_err(|e| LlmError::Parse(format!("failed to parse response: {e}")))
}

/// Serialize a wire request into a payload
pub(crate) fn payload<T: serde::Serialize>(model: &str, stream: bool, wire: &T) -> Result<VendorPayload, LlmError> {
    let body = serde_json::to_value(wire).map_err(|e| LlmError::InvalidRequest(e.to_string()))?;
    Ok(VendorPayload {
        model: model.to_owned(),
        stream,
        body,
    })
}
