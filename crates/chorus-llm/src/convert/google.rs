//! Conversion between internal types and Google Generative Language wire format

use crate::protocol::google::{
    GoogleCandidate, GoogleContent, GoogleFunctionCall, GoogleFunctionCallingConfig, GoogleFunctionDeclaration,
    GoogleFunctionResponse, GoogleGenerationConfig, GoogleInlineData, GooglePart, GoogleRequest, GoogleResponse,
    GoogleThinkingConfig, GoogleTool, GoogleToolConfig, GoogleUsageMetadata,
};
use crate::types::{
    CompletionRequest, Content, ContentPart, FinishReason, Message, Role, StreamEvent, ToolChoice, ToolChoiceMode,
    Usage,
};

// -- Outbound: internal request -> Google wire request --

impl From<&CompletionRequest> for GoogleRequest {
    fn from(req: &CompletionRequest) -> Self {
        let mut system_parts = Vec::new();
        let mut contents: Vec<GoogleContent> = Vec::new();

        for msg in &req.messages {
            let content = match msg.role {
                Role::System => {
                    system_parts.push(GooglePart::text(msg.content.as_text()));
                    continue;
                }
                Role::User => internal_message_to_google(msg, "user"),
                Role::Assistant => internal_message_to_google(msg, "model"),
                Role::Tool => tool_result_to_google(msg),
            };

            // function responses for one model turn travel together
            match contents.last_mut() {
                Some(last) if last.role == content.role => last.parts.extend(content.parts),
                _ => contents.push(content),
            }
        }

        let thinking_config = req.reasoning_effort.map(|effort| GoogleThinkingConfig {
            thinking_budget: effort.budget_tokens(),
            include_thoughts: true,
        });

        let generation_config = GoogleGenerationConfig {
            temperature: req.params.temperature,
            top_p: req.params.top_p,
            max_output_tokens: req.params.max_tokens,
            stop_sequences: req.params.stop.clone(),
            thinking_config,
        };

        let tools = req.tools.as_ref().map(|tools| {
            vec![GoogleTool {
                function_declarations: tools
                    .iter()
                    .map(|t| GoogleFunctionDeclaration {
                        name: t.function.name.clone(),
                        description: t.function.description.clone(),
                        parameters: t.function.parameters.clone(),
                    })
                    .collect(),
            }]
        });

        let tool_config = req.tool_choice.as_ref().map(|tc| {
            let (mode, allowed_function_names) = match tc {
                ToolChoice::Mode(ToolChoiceMode::None) => ("NONE", None),
                ToolChoice::Mode(ToolChoiceMode::Auto) => ("AUTO", None),
                ToolChoice::Mode(ToolChoiceMode::Required) => ("ANY", None),
                ToolChoice::Function { name } => ("ANY", Some(vec![name.clone()])),
            };
            GoogleToolConfig {
                function_calling_config: GoogleFunctionCallingConfig {
                    mode: mode.to_owned(),
                    allowed_function_names,
                },
            }
        });

        Self {
            contents,
            system_instruction: (!system_parts.is_empty()).then(|| GoogleContent {
                role: None,
                parts: system_parts,
            }),
            generation_config: Some(generation_config),
            tools,
            tool_config,
        }
    }
}

/// Convert a tool-result message into a function response
///
/// Google matches responses by function name, not call id.
fn tool_result_to_google(msg: &Message) -> GoogleContent {
    let text = msg.content.as_text();
    let response = if msg.is_error {
        serde_json::json!({ "error": text })
    } else {
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(value @ serde_json::Value::Object(_)) => value,
            _ => serde_json::json!({ "result": text }),
        }
    };

    GoogleContent {
        role: Some("user".to_owned()),
        parts: vec![GooglePart {
            function_response: Some(GoogleFunctionResponse {
                name: msg.name.clone().or_else(|| msg.tool_call_id.clone()).unwrap_or_default(),
                response,
            }),
            ..GooglePart::default()
        }],
    }
}

/// Convert an internal message to a Google content object
fn internal_message_to_google(msg: &Message, role: &str) -> GoogleContent {
    let mut parts = Vec::new();

    match &msg.content {
        Content::Text(text) => {
            if !text.is_empty() {
                parts.push(GooglePart::text(text.clone()));
            }
        }
        Content::Parts(content_parts) => {
            for part in content_parts {
                match part {
                    ContentPart::Text { text } => parts.push(GooglePart::text(text.clone())),
                    ContentPart::Image { url, .. } => {
                        // only inline images are accepted
                        if let Some((mime_type, data)) = ContentPart::split_data_uri(url) {
                            parts.push(inline_part(mime_type, data));
                        }
                    }
                    ContentPart::File { name, mime_type, data } => {
                        if mime_type.starts_with("text/") {
                            parts.push(GooglePart::text(format!("{name}\n{data}")));
                        } else {
                            parts.push(inline_part(mime_type, data));
                        }
                    }
                }
            }
        }
    }

    for tc in msg.tool_calls.iter().flatten() {
        let args = serde_json::from_str(&tc.function.arguments).unwrap_or_else(|_| serde_json::json!({}));
        parts.push(GooglePart {
            function_call: Some(GoogleFunctionCall {
                name: tc.function.name.clone(),
                args,
            }),
            ..GooglePart::default()
        });
    }

    if parts.is_empty() {
        parts.push(GooglePart::text(String::new()));
    }

    GoogleContent {
        role: Some(role.to_owned()),
        parts,
    }
}

fn inline_part(mime_type: &str, data: &str) -> GooglePart {
    GooglePart {
        inline_data: Some(GoogleInlineData {
            mime_type: mime_type.to_owned(),
            data: data.to_owned(),
        }),
        ..GooglePart::default()
    }
}

impl From<&GoogleUsageMetadata> for Usage {
    fn from(usage: &GoogleUsageMetadata) -> Self {
        let completion = usage.candidates_token_count + usage.thoughts_token_count;
        Self {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: completion,
            total_tokens: usage.total_token_count.max(usage.prompt_token_count + completion),
        }
    }
}

// -- Inbound: Google responses -> neutral events --

/// State tracker for converting Google stream frames
///
/// Each SSE frame is a complete `GenerateContentResponse`; function calls
/// arrive whole and carry no id, so they are numbered here.
#[derive(Debug, Default)]
pub struct GoogleStreamState {
    next_tool_call_index: u32,
}

impl GoogleStreamState {
    /// Create a new stream state tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert one Google response frame to neutral events
    pub fn convert_chunk(&mut self, chunk: &GoogleResponse) -> Vec<StreamEvent> {
        let mut events = Vec::new();

        if let Some(candidate) = chunk.candidates.first() {
            self.convert_candidate(candidate, &mut events);
        }

        if let Some(usage) = &chunk.usage_metadata {
            events.push(StreamEvent::Usage(usage.into()));
        }

        events
    }

    fn convert_candidate(&mut self, candidate: &GoogleCandidate, events: &mut Vec<StreamEvent>) {
        for part in &candidate.content.parts {
            if let Some(text) = &part.text
                && !text.is_empty()
            {
                if part.thought == Some(true) {
                    events.push(StreamEvent::ReasoningDelta(text.clone()));
                } else {
                    events.push(StreamEvent::TextDelta(text.clone()));
                }
            }

            if let Some(call) = &part.function_call {
                let index = self.next_tool_call_index;
                self.next_tool_call_index += 1;
                events.push(StreamEvent::ToolCallStart {
                    index,
                    id: String::new(),
                    name: call.name.clone(),
                });
                events.push(StreamEvent::ToolCallDelta {
                    index,
                    arguments: call.args.to_string(),
                });
            }
        }

        if let Some(reason) = candidate.finish_reason.as_deref().and_then(FinishReason::parse) {
            events.push(StreamEvent::Finish(reason));
        }
    }
}

/// Convert a non-streaming Google response into neutral events
pub fn response_to_events(resp: &GoogleResponse) -> Vec<StreamEvent> {
    let mut events = GoogleStreamState::new().convert_chunk(resp);
    events.push(StreamEvent::Done);
    events
}
