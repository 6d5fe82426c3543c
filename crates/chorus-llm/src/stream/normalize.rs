//! Neutral stream events to chunks
//!
//! Every adapter decodes its wire frames into [`StreamEvent`]s; the
//! [`ChunkNormalizer`] owns the ordering rules shared by all of them:
//!
//! - a text segment is only opened by its first non-empty delta, so a vendor
//!   that announces text before reasoning never yields an empty segment
//! - an open reasoning segment is closed before any text or tool call
//! - tool-call arguments are accumulated and parsed once the turn finishes;
//!   unparseable arguments become `{}`
//! - the turn always ends with `ResponseComplete`, carrying zero usage when
//!   the vendor never reported any

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use futures_util::{StreamExt, stream};

use super::ChunkStream;
use crate::error::LlmError;
use crate::provider::EventStream;
use crate::types::{Chunk, Metrics, StreamEvent, ToolUse, Usage};

/// Tool call whose arguments are still arriving
#[derive(Debug, Default)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Per-turn state machine from [`StreamEvent`]s to [`Chunk`]s
#[derive(Debug)]
pub struct ChunkNormalizer {
    started: Instant,
    first_token: Option<Duration>,
    text_announced: bool,
    text: Option<String>,
    reasoning: Option<String>,
    tool_calls: BTreeMap<u32, PendingToolCall>,
    usage: Option<Usage>,
    finished: bool,
}

impl ChunkNormalizer {
    /// Start a turn whose timing is measured from `started`
    pub fn new(started: Instant) -> Self {
        Self {
            started,
            first_token: None,
            text_announced: false,
            text: None,
            reasoning: None,
            tool_calls: BTreeMap::new(),
            usage: None,
            finished: false,
        }
    }

    /// Whether the terminal chunk has been produced
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one event
    pub fn push(&mut self, event: StreamEvent) -> Vec<Chunk> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }

        match event {
            StreamEvent::TextStart => {
                if self.text.is_none() {
                    self.text_announced = true;
                }
            }
            StreamEvent::TextDelta(delta) => {
                if delta.is_empty() {
                    return out;
                }
                self.mark_first_token();
                self.close_reasoning(&mut out);
                let text = self.text.get_or_insert_with(|| {
                    out.push(Chunk::TextStart);
                    String::new()
                });
                text.push_str(&delta);
                self.text_announced = false;
                out.push(Chunk::TextDelta { text: delta });
            }
            StreamEvent::TextEnd => {
                self.text_announced = false;
                self.close_text(&mut out);
            }
            StreamEvent::ReasoningDelta(delta) => {
                if delta.is_empty() {
                    return out;
                }
                self.mark_first_token();
                if self.text_announced {
                    tracing::debug!("dropping text start announced before reasoning");
                    self.text_announced = false;
                }
                self.close_text(&mut out);
                let reasoning = self.reasoning.get_or_insert_with(|| {
                    out.push(Chunk::ReasoningStart);
                    String::new()
                });
                reasoning.push_str(&delta);
                out.push(Chunk::ReasoningDelta { text: delta });
            }
            StreamEvent::ReasoningEnd => self.close_reasoning(&mut out),
            StreamEvent::ToolCallStart { index, id, name } => {
                self.mark_first_token();
                self.close_reasoning(&mut out);
                let call = self.tool_calls.entry(index).or_default();
                if call.id.is_empty() {
                    call.id = id;
                }
                if call.name.is_empty() {
                    call.name = name;
                }
            }
            StreamEvent::ToolCallDelta { index, arguments } => {
                self.close_reasoning(&mut out);
                self.tool_calls.entry(index).or_default().arguments.push_str(&arguments);
            }
            StreamEvent::Usage(snapshot) => {
                self.usage.get_or_insert_default().merge(snapshot);
            }
            StreamEvent::Finish(reason) => {
                tracing::debug!(reason = ?reason, tool_calls = self.tool_calls.len(), "vendor finished turn");
                self.close_segments(&mut out);
                self.flush_tool_calls(&mut out);
            }
            StreamEvent::Done => self.complete(&mut out),
        }

        out
    }

    /// The vendor stream ended
    pub fn finish(&mut self) -> Vec<Chunk> {
        let mut out = Vec::new();
        if !self.finished {
            self.complete(&mut out);
        }
        out
    }

    /// The vendor stream failed; emits a single error chunk
    pub fn fail(&mut self, error: LlmError) -> Vec<Chunk> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        tracing::warn!(error = %error, "provider stream failed");
        vec![error.into_chunk()]
    }

    fn mark_first_token(&mut self) {
        if self.first_token.is_none() {
            self.first_token = Some(self.started.elapsed());
        }
    }

    fn close_text(&mut self, out: &mut Vec<Chunk>) {
        if let Some(text) = self.text.take() {
            out.push(Chunk::TextEnd { text });
        }
    }

    fn close_reasoning(&mut self, out: &mut Vec<Chunk>) {
        if let Some(text) = self.reasoning.take() {
            out.push(Chunk::ReasoningEnd { text });
        }
    }

    fn close_segments(&mut self, out: &mut Vec<Chunk>) {
        self.close_reasoning(out);
        self.close_text(out);
        self.text_announced = false;
    }

    fn flush_tool_calls(&mut self, out: &mut Vec<Chunk>) {
        for (index, call) in std::mem::take(&mut self.tool_calls) {
            let id = if call.id.is_empty() {
                format!("call_{}", uuid::Uuid::new_v4().simple())
            } else {
                call.id
            };

            let arguments = if call.arguments.trim().is_empty() {
                serde_json::json!({})
            } else {
                serde_json::from_str(&call.arguments).unwrap_or_else(|e| {
                    tracing::warn!(
                        tool = %call.name,
                        index,
                        error = %e,
                        "tool call arguments are not valid JSON, using empty object"
                    );
                    serde_json::json!({})
                })
            };

            out.push(Chunk::ToolCallCreated {
                tool_use: ToolUse {
                    id,
                    name: call.name,
                    arguments,
                },
            });
        }
    }

    fn complete(&mut self, out: &mut Vec<Chunk>) {
        self.close_segments(out);
        self.flush_tool_calls(out);
        self.finished = true;

        out.push(Chunk::ResponseComplete {
            usage: self.usage.unwrap_or_default(),
            metrics: Metrics {
                time_first_token_ms: self.first_token.map_or(0, millis),
                time_completion_ms: millis(self.started.elapsed()),
            },
        });
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Normalize one vendor event stream into a chunk stream
///
/// The vendor stream is dropped as soon as the terminal chunk is produced.
pub fn normalize(events: EventStream, started: Instant) -> ChunkStream {
    let chunks = stream::unfold(Some((events, ChunkNormalizer::new(started))), |state| async move {
        let (mut events, mut normalizer) = state?;

        match events.next().await {
            Some(Ok(event)) => {
                let chunks = normalizer.push(event);
                let next = (!normalizer.is_finished()).then_some((events, normalizer));
                Some((chunks, next))
            }
            Some(Err(error)) => Some((normalizer.fail(error), None)),
            None => Some((normalizer.finish(), None)),
        }
    })
    .flat_map(stream::iter);

    Box::pin(chunks)
}
