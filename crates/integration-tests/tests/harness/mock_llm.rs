//! Mock LLM backend server for integration tests
//!
//! Serves the OpenAI Chat Completions and Anthropic Messages routes and
//! answers each request with the next scripted [`Reply`].

use std::collections::VecDeque;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// One scripted upstream response
#[derive(Clone)]
pub enum Reply {
    /// SSE body with the given data frames, then the end of the stream
    Sse(Vec<Value>),
    /// SSE frames, then the connection stays open without further data
    Stall(Vec<Value>),
    /// Non-streaming JSON body
    Json(Value),
    /// Error status with a vendor error body
    Status(StatusCode, Value),
}

/// Mock LLM backend that plays back scripted replies
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    request_count: AtomicU32,
    replies: Mutex<VecDeque<Reply>>,
    /// Reply used once the script runs out
    fallback: Option<Reply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Request seen by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: &'static str,
    pub headers: HeaderMap,
    pub body: Value,
}

#[derive(Clone, Copy)]
enum Wire {
    OpenAi,
    Anthropic,
}

impl MockLlm {
    /// Start a mock server that answers requests with `replies` in order
    pub async fn start(replies: Vec<Reply>) -> anyhow::Result<Self> {
        Self::start_inner(replies, None).await
    }

    /// Start a mock server that answers every request past the script with `fallback`
    pub async fn start_with_fallback(replies: Vec<Reply>, fallback: Reply) -> anyhow::Result<Self> {
        Self::start_inner(replies, Some(fallback)).await
    }

    async fn start_inner(replies: Vec<Reply>, fallback: Option<Reply>) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            request_count: AtomicU32::new(0),
            replies: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/messages", routing::post(handle_messages))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    ///
    /// Includes `/v1` since adapters append paths like `/chat/completions`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    /// Number of requests received on any route
    pub fn request_count(&self) -> u32 {
        self.state.request_count.load(Ordering::Relaxed)
    }

    /// Requests received so far, in order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

// -- Handlers --

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    respond(&state, "/v1/chat/completions", headers, body, Wire::OpenAi)
}

async fn handle_messages(State(state): State<Arc<MockLlmState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    respond(&state, "/v1/messages", headers, body, Wire::Anthropic)
}

fn respond(state: &MockLlmState, path: &'static str, headers: HeaderMap, body: Value, wire: Wire) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);
    state.requests.lock().unwrap().push(RecordedRequest { path, headers, body });

    let next = state.replies.lock().unwrap().pop_front().or_else(|| state.fallback.clone());
    let Some(reply) = next else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": { "message": "mock script exhausted", "type": "server_error" } })),
        )
            .into_response();
    };

    match reply {
        Reply::Sse(frames) => sse_response(Body::from(sse_body(&frames, wire))),
        Reply::Stall(frames) => {
            let head = stream::iter([Ok::<_, Infallible>(sse_body(&frames, wire))]);
            sse_response(Body::from_stream(head.chain(stream::pending())))
        }
        Reply::Json(value) => Json(value).into_response(),
        Reply::Status(status, value) => (status, Json(value)).into_response(),
    }
}

fn sse_response(body: Body) -> Response {
    ([(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

/// Render frames as SSE text; OpenAI streams end with a `[DONE]` marker
fn sse_body(frames: &[Value], wire: Wire) -> String {
    let mut body = String::new();
    for frame in frames {
        if let Wire::Anthropic = wire
            && let Some(event) = frame["type"].as_str()
        {
            body.push_str(&format!("event: {event}\n"));
        }
        match frame {
            Value::String(raw) => body.push_str(&format!("data: {raw}\n\n")),
            _ => body.push_str(&format!("data: {frame}\n\n")),
        }
    }
    body
}

// -- OpenAI frames --

pub mod openai {
    use serde_json::{Value, json};

    pub fn text(delta: &str) -> Value {
        json!({ "id": "chatcmpl-mock", "choices": [{ "index": 0, "delta": { "content": delta } }] })
    }

    pub fn reasoning(delta: &str) -> Value {
        json!({ "id": "chatcmpl-mock", "choices": [{ "index": 0, "delta": { "reasoning_content": delta } }] })
    }

    pub fn tool_call(index: u32, id: &str, name: &str, arguments: &str) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "choices": [{
                "index": 0,
                "delta": {
                    "tool_calls": [{
                        "index": index,
                        "id": id,
                        "type": "function",
                        "function": { "name": name, "arguments": arguments }
                    }]
                }
            }]
        })
    }

    pub fn finish(reason: &str) -> Value {
        json!({ "id": "chatcmpl-mock", "choices": [{ "index": 0, "delta": {}, "finish_reason": reason }] })
    }

    pub fn usage(prompt: u64, completion: u64) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "choices": [],
            "usage": { "prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": prompt + completion }
        })
    }

    /// Stream end marker, written verbatim
    pub fn done() -> Value {
        Value::String("[DONE]".to_owned())
    }

    /// Whole streamed text turn
    pub fn text_turn(text: &str, prompt: u64, completion: u64) -> Vec<Value> {
        vec![self::text(text), finish("stop"), usage(prompt, completion), done()]
    }

    /// Whole streamed turn that calls one tool
    pub fn tool_turn(id: &str, name: &str, arguments: &str, prompt: u64, completion: u64) -> Vec<Value> {
        vec![
            tool_call(0, id, name, arguments),
            finish("tool_calls"),
            usage(prompt, completion),
            done(),
        ]
    }

    /// Non-streaming response envelope
    pub fn response(content: &str, prompt: u64, completion: u64) -> Value {
        json!({
            "id": "chatcmpl-mock",
            "object": "chat.completion",
            "model": "mock-model",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }],
            "usage": { "prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": prompt + completion }
        })
    }
}

// -- Anthropic frames --

pub mod anthropic {
    use serde_json::{Value, json};

    pub fn message_start(input_tokens: u64) -> Value {
        json!({
            "type": "message_start",
            "message": { "id": "msg_mock", "model": "claude-mock", "usage": { "input_tokens": input_tokens, "output_tokens": 1 } }
        })
    }

    pub fn thinking_start(index: u32) -> Value {
        json!({ "type": "content_block_start", "index": index, "content_block": { "type": "thinking", "thinking": "" } })
    }

    pub fn thinking_delta(index: u32, thinking: &str) -> Value {
        json!({ "type": "content_block_delta", "index": index, "delta": { "type": "thinking_delta", "thinking": thinking } })
    }

    pub fn text_start(index: u32) -> Value {
        json!({ "type": "content_block_start", "index": index, "content_block": { "type": "text", "text": "" } })
    }

    pub fn text_delta(index: u32, text: &str) -> Value {
        json!({ "type": "content_block_delta", "index": index, "delta": { "type": "text_delta", "text": text } })
    }

    pub fn tool_use_start(index: u32, id: &str, name: &str) -> Value {
        json!({
            "type": "content_block_start",
            "index": index,
            "content_block": { "type": "tool_use", "id": id, "name": name, "input": {} }
        })
    }

    pub fn input_json_delta(index: u32, partial_json: &str) -> Value {
        json!({ "type": "content_block_delta", "index": index, "delta": { "type": "input_json_delta", "partial_json": partial_json } })
    }

    pub fn block_stop(index: u32) -> Value {
        json!({ "type": "content_block_stop", "index": index })
    }

    pub fn message_delta(stop_reason: &str, output_tokens: u64) -> Value {
        json!({ "type": "message_delta", "delta": { "stop_reason": stop_reason }, "usage": { "output_tokens": output_tokens } })
    }

    pub fn message_stop() -> Value {
        json!({ "type": "message_stop" })
    }
}
