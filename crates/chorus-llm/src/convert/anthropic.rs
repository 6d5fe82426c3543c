//! Conversion between internal types and Anthropic wire format

use std::collections::HashMap;

use crate::error::LlmError;
use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicMessage, AnthropicRequest, AnthropicResponse,
    AnthropicResponseBlock, AnthropicSource, AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent,
    AnthropicThinking, AnthropicTool, AnthropicToolChoice, AnthropicUsage,
};
use crate::types::{
    CompletionRequest, Content, ContentPart, FinishReason, Message, Role, StreamEvent, ToolChoice, ToolChoiceMode,
    Usage,
};

/// Default max tokens when not specified (Anthropic requires this field)
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Outbound: internal request -> Anthropic wire request --

impl From<&CompletionRequest> for AnthropicRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system: Option<String> = None;
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for msg in &req.messages {
            if msg.role == Role::System {
                let text = msg.content.as_text();
                system = Some(match system {
                    Some(existing) => format!("{existing}\n\n{text}"),
                    None => text,
                });
                continue;
            }

            push_merged(&mut messages, internal_message_to_anthropic(msg));
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .map(|t| AnthropicTool {
                    name: t.function.name.clone(),
                    description: t.function.description.clone(),
                    input_schema: t
                        .function
                        .parameters
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                })
                .collect()
        });

        let mut max_tokens = req.params.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);
        let thinking = req.reasoning_effort.map(|effort| {
            let budget_tokens = effort.budget_tokens();
            // max_tokens must exceed the thinking budget
            max_tokens = max_tokens.max(budget_tokens + DEFAULT_MAX_TOKENS);
            AnthropicThinking {
                thinking_type: "enabled".to_owned(),
                budget_tokens,
            }
        });

        // sampling overrides are rejected while thinking is enabled
        let (temperature, top_p) = if thinking.is_some() {
            (None, None)
        } else {
            (req.params.temperature, req.params.top_p)
        };

        Self {
            model: req.model.clone(),
            max_tokens,
            system,
            messages,
            temperature,
            top_p,
            stop_sequences: req.params.stop.clone(),
            stream: req.stream.then_some(true),
            thinking,
            tools,
            tool_choice: req.tool_choice.as_ref().map(internal_tool_choice_to_anthropic),
        }
    }
}

/// Append a message, folding it into the previous one when roles repeat
///
/// Consecutive tool results must travel in a single user turn.
fn push_merged(messages: &mut Vec<AnthropicMessage>, next: AnthropicMessage) {
    if let Some(last) = messages.last_mut()
        && last.role == next.role
    {
        let mut blocks = into_blocks(std::mem::replace(&mut last.content, AnthropicContent::Blocks(Vec::new())));
        blocks.extend(into_blocks(next.content));
        last.content = AnthropicContent::Blocks(blocks);
        return;
    }

    messages.push(next);
}

fn into_blocks(content: AnthropicContent) -> Vec<AnthropicContentBlock> {
    match content {
        AnthropicContent::Text(text) => vec![AnthropicContentBlock::Text { text }],
        AnthropicContent::Blocks(blocks) => blocks,
    }
}

/// Convert an internal message to Anthropic wire format
fn internal_message_to_anthropic(msg: &Message) -> AnthropicMessage {
    if msg.role == Role::Tool {
        return AnthropicMessage {
            role: "user".to_owned(),
            content: AnthropicContent::Blocks(vec![AnthropicContentBlock::ToolResult {
                tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                content: Some(msg.content.as_text()),
                is_error: msg.is_error.then_some(true),
            }]),
        };
    }

    let role = if msg.role == Role::Assistant { "assistant" } else { "user" };

    if let Some(tool_calls) = &msg.tool_calls {
        let mut blocks: Vec<AnthropicContentBlock> = Vec::new();

        let text = msg.content.as_text();
        if !text.is_empty() {
            blocks.push(AnthropicContentBlock::Text { text });
        }

        for tc in tool_calls {
            let input = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
            blocks.push(AnthropicContentBlock::ToolUse {
                id: tc.id.clone(),
                name: tc.function.name.clone(),
                input,
            });
        }

        return AnthropicMessage {
            role: role.to_owned(),
            content: AnthropicContent::Blocks(blocks),
        };
    }

    let content = match &msg.content {
        Content::Text(text) => AnthropicContent::Text(text.clone()),
        Content::Parts(parts) => AnthropicContent::Blocks(parts.iter().map(part_to_block).collect()),
    };

    AnthropicMessage {
        role: role.to_owned(),
        content,
    }
}

fn part_to_block(part: &ContentPart) -> AnthropicContentBlock {
    match part {
        ContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        ContentPart::Image { url, .. } => AnthropicContentBlock::Image {
            source: match ContentPart::split_data_uri(url) {
                Some((media_type, data)) => AnthropicSource {
                    source_type: "base64".to_owned(),
                    media_type: Some(media_type.to_owned()),
                    data: Some(data.to_owned()),
                    url: None,
                },
                None => AnthropicSource {
                    source_type: "url".to_owned(),
                    media_type: None,
                    data: None,
                    url: Some(url.clone()),
                },
            },
        },
        ContentPart::File { mime_type, data, .. } if mime_type == "application/pdf" => AnthropicContentBlock::Document {
            source: AnthropicSource {
                source_type: "base64".to_owned(),
                media_type: Some(mime_type.clone()),
                data: Some(data.clone()),
                url: None,
            },
        },
        ContentPart::File { name, mime_type, data } if mime_type.starts_with("text/") => AnthropicContentBlock::Text {
            text: format!("{name}\n{data}"),
        },
        ContentPart::File { name, .. } => AnthropicContentBlock::Text {
            text: format!("[attached file: {name}]"),
        },
    }
}

/// Convert internal tool choice to Anthropic wire format
fn internal_tool_choice_to_anthropic(choice: &ToolChoice) -> AnthropicToolChoice {
    let (choice_type, name) = match choice {
        ToolChoice::Mode(ToolChoiceMode::None) => ("none", None),
        ToolChoice::Mode(ToolChoiceMode::Auto) => ("auto", None),
        ToolChoice::Mode(ToolChoiceMode::Required) => ("any", None),
        ToolChoice::Function { name } => ("tool", Some(name.clone())),
    };

    AnthropicToolChoice {
        choice_type: choice_type.to_owned(),
        name,
    }
}

impl From<&AnthropicUsage> for Usage {
    fn from(usage: &AnthropicUsage) -> Self {
        Self::new(usage.input_tokens, usage.output_tokens)
    }
}

// -- Inbound: Anthropic responses -> neutral events --

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    RedactedThinking,
    ToolUse { call_index: u32 },
}

/// State tracker for converting Anthropic stream events
///
/// Anthropic's content block index is shared across all block types, so
/// tool calls get their own sequential index; a tool use that follows a
/// text block would otherwise start at index 1.
#[derive(Debug, Default)]
pub struct AnthropicStreamState {
    blocks: HashMap<u32, BlockKind>,
    next_tool_call_index: u32,
}

impl AnthropicStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert an Anthropic stream event to neutral events
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Upstream` for an in-stream `error` event.
    pub fn convert_event(&mut self, event: &AnthropicStreamEvent) -> Result<Vec<StreamEvent>, LlmError> {
        let events = match event {
            AnthropicStreamEvent::Ping => Vec::new(),

            AnthropicStreamEvent::MessageStart { message } => message
                .usage
                .as_ref()
                .map(|usage| vec![StreamEvent::Usage(usage.into())])
                .unwrap_or_default(),

            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } => {
                    self.blocks.insert(*index, BlockKind::Text);
                    let mut events = vec![StreamEvent::TextStart];
                    if !text.is_empty() {
                        events.push(StreamEvent::TextDelta(text.clone()));
                    }
                    events
                }
                AnthropicStreamContentBlock::Thinking { thinking } => {
                    self.blocks.insert(*index, BlockKind::Thinking);
                    if thinking.is_empty() {
                        Vec::new()
                    } else {
                        vec![StreamEvent::ReasoningDelta(thinking.clone())]
                    }
                }
                AnthropicStreamContentBlock::RedactedThinking { .. } => {
                    self.blocks.insert(*index, BlockKind::RedactedThinking);
                    Vec::new()
                }
                AnthropicStreamContentBlock::ToolUse { id, name } => {
                    let call_index = self.next_tool_call_index;
                    self.next_tool_call_index += 1;
                    self.blocks.insert(*index, BlockKind::ToolUse { call_index });
                    vec![StreamEvent::ToolCallStart {
                        index: call_index,
                        id: id.clone(),
                        name: name.clone(),
                    }]
                }
            },

            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => vec![StreamEvent::TextDelta(text.clone())],
                AnthropicStreamDelta::ThinkingDelta { thinking } => vec![StreamEvent::ReasoningDelta(thinking.clone())],
                AnthropicStreamDelta::SignatureDelta { .. } => Vec::new(),
                AnthropicStreamDelta::InputJsonDelta { partial_json } => match self.blocks.get(index) {
                    Some(BlockKind::ToolUse { call_index }) => vec![StreamEvent::ToolCallDelta {
                        index: *call_index,
                        arguments: partial_json.clone(),
                    }],
                    _ => {
                        tracing::warn!(block = index, "input_json_delta outside a tool_use block");
                        Vec::new()
                    }
                },
            },

            AnthropicStreamEvent::ContentBlockStop { index } => match self.blocks.remove(index) {
                Some(BlockKind::Text) => vec![StreamEvent::TextEnd],
                Some(BlockKind::Thinking) => vec![StreamEvent::ReasoningEnd],
                _ => Vec::new(),
            },

            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                let mut events = Vec::new();

                if let Some(reason) = delta.stop_reason.as_deref().and_then(FinishReason::parse) {
                    events.push(StreamEvent::Finish(reason));
                }

                if let Some(usage) = usage {
                    events.push(StreamEvent::Usage(usage.into()));
                }

                events
            }

            AnthropicStreamEvent::MessageStop => vec![StreamEvent::Done],

            AnthropicStreamEvent::Error { error } => {
                return Err(LlmError::Upstream(format!("{}: {}", error.error_type, error.message)));
            }
        };

        Ok(events)
    }
}

/// Convert a non-streaming Anthropic response into neutral events
pub fn response_to_events(resp: &AnthropicResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();
    let mut call_index = 0u32;

    for block in &resp.content {
        match block {
            AnthropicResponseBlock::Text { text } => {
                events.push(StreamEvent::TextStart);
                events.push(StreamEvent::TextDelta(text.clone()));
                events.push(StreamEvent::TextEnd);
            }
            AnthropicResponseBlock::Thinking { thinking } => {
                events.push(StreamEvent::ReasoningDelta(thinking.clone()));
                events.push(StreamEvent::ReasoningEnd);
            }
            AnthropicResponseBlock::RedactedThinking { .. } => {}
            AnthropicResponseBlock::ToolUse { id, name, input } => {
                events.push(StreamEvent::ToolCallStart {
                    index: call_index,
                    id: id.clone(),
                    name: name.clone(),
                });
                events.push(StreamEvent::ToolCallDelta {
                    index: call_index,
                    arguments: input.to_string(),
                });
                call_index += 1;
            }
        }
    }

    if let Some(reason) = resp.stop_reason.as_deref().and_then(FinishReason::parse) {
        events.push(StreamEvent::Finish(reason));
    }

    events.push(StreamEvent::Usage((&resp.usage).into()));
    events.push(StreamEvent::Done);
    events
}
