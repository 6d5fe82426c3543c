//! Test doubles shared by the pipeline tests

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::{StreamExt, stream};

use super::context::{PipelineSettings, ProcessingContext};
use super::registry::AbortRegistry;
use crate::error::LlmError;
use crate::provider::{EventStream, Provider, ProviderCapabilities, VendorPayload};
use crate::types::{CompletionRequest, FinishReason, McpTool, StreamEvent, Usage};

/// Response played back for one turn
pub(crate) enum Turn {
    /// Yield the events, then end
    Events(Vec<StreamEvent>),
    /// Yield the events, then never end
    Stall(Vec<StreamEvent>),
    /// Fail before streaming
    Fail(LlmError),
}

/// Provider that plays back scripted turns in order
pub(crate) struct ScriptedProvider {
    turns: Mutex<VecDeque<Turn>>,
    requests: Mutex<Vec<CompletionRequest>>,
    capabilities: ProviderCapabilities,
}

impl ScriptedProvider {
    pub(crate) fn new(turns: Vec<Turn>) -> Arc<Self> {
        Self::with_capabilities(turns, ProviderCapabilities {
            streaming: true,
            tool_calling: true,
            reasoning: true,
        })
    }

    pub(crate) fn with_capabilities(turns: Vec<Turn>, capabilities: ProviderCapabilities) -> Arc<Self> {
        Arc::new(Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
            capabilities,
        })
    }

    /// Requests seen so far
    pub(crate) fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    fn default_model(&self) -> Option<&str> {
        Some("scripted-model")
    }

    fn transform_request(&self, request: &CompletionRequest) -> Result<VendorPayload, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(VendorPayload {
            model: request.model.clone(),
            stream: request.stream,
            body: serde_json::to_value(request).unwrap(),
        })
    }

    async fn invoke(&self, _payload: &VendorPayload) -> Result<EventStream, LlmError> {
        let turn = self.turns.lock().unwrap().pop_front();
        match turn {
            Some(Turn::Events(events)) => Ok(Box::pin(stream::iter(events.into_iter().map(Ok)))),
            Some(Turn::Stall(events)) => Ok(Box::pin(
                stream::iter(events.into_iter().map(Ok)).chain(stream::pending()),
            )),
            Some(Turn::Fail(error)) => Err(error),
            None => Err(LlmError::Upstream("script exhausted".to_owned())),
        }
    }
}

/// A text turn with usage
pub(crate) fn text_turn(text: &str, usage: Usage) -> Turn {
    Turn::Events(vec![
        StreamEvent::TextDelta(text.to_owned()),
        StreamEvent::Usage(usage),
        StreamEvent::Finish(FinishReason::Stop),
        StreamEvent::Done,
    ])
}

/// A turn that calls one tool
pub(crate) fn tool_turn(id: &str, name: &str, arguments: &str, usage: Usage) -> Turn {
    Turn::Events(vec![
        StreamEvent::ToolCallStart {
            index: 0,
            id: id.to_owned(),
            name: name.to_owned(),
        },
        StreamEvent::ToolCallDelta {
            index: 0,
            arguments: arguments.to_owned(),
        },
        StreamEvent::Usage(usage),
        StreamEvent::Finish(FinishReason::ToolCalls),
        StreamEvent::Done,
    ])
}

pub(crate) fn tool(name: &str) -> McpTool {
    McpTool {
        id: format!("srv__{name}"),
        name: name.to_owned(),
        server_name: Some("srv".to_owned()),
        description: None,
        input_schema: serde_json::json!({ "type": "object" }),
    }
}

/// Context over a scripted provider with no turns
pub(crate) fn context() -> Arc<ProcessingContext> {
    context_with(ScriptedProvider::new(Vec::new()), PipelineSettings::default())
}

pub(crate) fn context_with(provider: Arc<dyn Provider>, settings: PipelineSettings) -> Arc<ProcessingContext> {
    Arc::new(ProcessingContext::new(
        provider,
        settings,
        Arc::new(AbortRegistry::new()),
        None,
    ))
}
