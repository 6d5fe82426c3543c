//! Conversion between internal types and `OpenAI` wire format

use super::think::ThinkTagExtractor;
use crate::protocol::openai::{
    OpenAiContent, OpenAiContentPart, OpenAiFile, OpenAiFunction, OpenAiFunctionCall, OpenAiImageUrl, OpenAiMessage,
    OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiStreamOptions, OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{
    CompletionRequest, Content, ContentPart, FinishReason, Message, Role, StreamEvent, ToolChoice, ToolChoiceMode,
    Usage,
};

// -- Outbound: internal request -> OpenAI wire request --

impl From<&CompletionRequest> for OpenAiRequest {
    fn from(req: &CompletionRequest) -> Self {
        Self {
            model: req.model.clone(),
            messages: req.messages.iter().map(Into::into).collect(),
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_tokens: req.params.max_tokens,
            stop: req.params.stop.clone(),
            reasoning_effort: req.reasoning_effort.map(|effort| effort.as_str().to_owned()),
            stream: req.stream.then_some(true),
            tools: req.tools.as_ref().map(|tools| {
                tools
                    .iter()
                    .map(|t| OpenAiTool {
                        tool_type: t.tool_type.clone(),
                        function: OpenAiFunction {
                            name: t.function.name.clone(),
                            description: t.function.description.clone(),
                            parameters: t.function.parameters.clone(),
                        },
                    })
                    .collect()
            }),
            tool_choice: req.tool_choice.as_ref().map(tool_choice_to_openai_value),
            stream_options: req.stream.then_some(OpenAiStreamOptions { include_usage: true }),
        }
    }
}

impl From<&Message> for OpenAiMessage {
    fn from(msg: &Message) -> Self {
        let role = match msg.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };

        let content = match &msg.content {
            Content::Text(text) if text.is_empty() && msg.tool_calls.is_some() => None,
            Content::Text(text) => Some(OpenAiContent::Text(text.clone())),
            Content::Parts(parts) => Some(OpenAiContent::Parts(parts.iter().map(Into::into).collect())),
        };

        let tool_calls = msg.tool_calls.as_ref().map(|calls| {
            calls
                .iter()
                .map(|tc| OpenAiToolCall {
                    id: tc.id.clone(),
                    tool_type: "function".to_owned(),
                    function: OpenAiFunctionCall {
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    },
                })
                .collect()
        });

        Self {
            role: role.to_owned(),
            content,
            // tool-result names are ours, not a participant name
            name: if msg.role == Role::Tool { None } else { msg.name.clone() },
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

impl From<&ContentPart> for OpenAiContentPart {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text { text } => Self::Text { text: text.clone() },
            ContentPart::Image { url, detail } => Self::ImageUrl {
                image_url: OpenAiImageUrl {
                    url: url.clone(),
                    detail: detail.clone(),
                },
            },
            ContentPart::File { name, mime_type, data } if mime_type.starts_with("text/") => Self::Text {
                text: format!("{name}\n{data}"),
            },
            ContentPart::File { name, mime_type, data } => Self::File {
                file: OpenAiFile {
                    filename: name.clone(),
                    file_data: format!("data:{mime_type};base64,{data}"),
                },
            },
        }
    }
}

/// Convert internal tool choice to `OpenAI` JSON value
fn tool_choice_to_openai_value(choice: &ToolChoice) -> serde_json::Value {
    match choice {
        ToolChoice::Mode(mode) => {
            let s = match mode {
                ToolChoiceMode::None => "none",
                ToolChoiceMode::Auto => "auto",
                ToolChoiceMode::Required => "required",
            };
            serde_json::Value::String(s.to_owned())
        }
        ToolChoice::Function { name } => serde_json::json!({
            "type": "function",
            "function": { "name": name }
        }),
    }
}

impl From<&OpenAiUsage> for Usage {
    fn from(usage: &OpenAiUsage) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

// -- Inbound: OpenAI responses -> neutral events --

/// State tracker for converting `OpenAI` stream chunks
///
/// Only the first choice is consumed; the pipeline never requests `n > 1`.
#[derive(Debug, Default)]
pub struct OpenAiStreamState {
    think: ThinkTagExtractor,
}

impl OpenAiStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert an `OpenAI` stream chunk to neutral events
    pub fn convert_chunk(&mut self, chunk: &OpenAiStreamChunk) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(choice) = chunk.choices.first() {
            let delta = &choice.delta;

            if let Some(reasoning) = delta.reasoning_content.as_ref().or(delta.reasoning.as_ref())
                && !reasoning.is_empty()
            {
                events.push(StreamEvent::ReasoningDelta(reasoning.clone()));
            }

            if let Some(content) = &delta.content {
                events.extend(self.think.push(content));
            }

            for tc in delta.tool_calls.iter().flatten() {
                let name = tc.function.as_ref().and_then(|f| f.name.clone());
                if tc.id.is_some() || name.is_some() {
                    events.push(StreamEvent::ToolCallStart {
                        index: tc.index,
                        id: tc.id.clone().unwrap_or_default(),
                        name: name.unwrap_or_default(),
                    });
                }

                if let Some(arguments) = tc.function.as_ref().and_then(|f| f.arguments.clone())
                    && !arguments.is_empty()
                {
                    events.push(StreamEvent::ToolCallDelta {
                        index: tc.index,
                        arguments,
                    });
                }
            }

            if let Some(reason) = choice.finish_reason.as_deref().and_then(FinishReason::parse) {
                events.extend(self.think.finish());
                events.push(StreamEvent::Finish(reason));
            }
        }

        if let Some(usage) = &chunk.usage {
            events.push(StreamEvent::Usage(usage.into()));
        }

        events
    }

    /// Flush buffered content at the end of the stream
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        self.think.finish()
    }
}

/// Convert a non-streaming `OpenAI` response into the same neutral events a stream would produce
pub fn response_to_events(resp: &OpenAiResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(choice) = resp.choices.first() {
        let message = &choice.message;

        if let Some(reasoning) = message.reasoning_content.as_ref().or(message.reasoning.as_ref())
            && !reasoning.is_empty()
        {
            events.push(StreamEvent::ReasoningDelta(reasoning.clone()));
            events.push(StreamEvent::ReasoningEnd);
        }

        if let Some(content) = &message.content {
            let mut think = ThinkTagExtractor::default();
            events.extend(think.push(content));
            events.extend(think.finish());
        }

        for (i, tc) in message.tool_calls.iter().flatten().enumerate() {
            let index = u32::try_from(i).unwrap_or(u32::MAX);
            events.push(StreamEvent::ToolCallStart {
                index,
                id: tc.id.clone(),
                name: tc.function.name.clone(),
            });
            events.push(StreamEvent::ToolCallDelta {
                index,
                arguments: tc.function.arguments.clone(),
            });
        }

        if let Some(reason) = choice.finish_reason.as_deref().and_then(FinishReason::parse) {
            events.push(StreamEvent::Finish(reason));
        }
    }

    if let Some(usage) = &resp.usage {
        events.push(StreamEvent::Usage(usage.into()));
    }

    events.push(StreamEvent::Done);
    events
}
