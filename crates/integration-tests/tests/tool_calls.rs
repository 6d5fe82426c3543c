mod harness;

use std::sync::Arc;

use chorus_llm::{Chunk, CompletionsParams, ErrorKind, Message, Usage};
use harness::config::ConfigBuilder;
use harness::mock_llm::{MockLlm, Reply, anthropic, openai};
use harness::tools::{RecordingTools, tool};
use harness::{assert_well_formed, error_kind, kinds, pipeline};

fn ask_with_tools(text: &str, tools: &[&str]) -> CompletionsParams {
    CompletionsParams::new(vec![Message::user(text)]).with_tools(tools.iter().map(|name| tool(name)).collect())
}

fn final_usage(chunks: &[Chunk]) -> Usage {
    match chunks.last() {
        Some(Chunk::ResponseComplete { usage, .. }) => *usage,
        other => panic!("expected a completed response, got {other:?}"),
    }
}

#[tokio::test]
async fn usage_sums_over_two_recursions() {
    let mock = MockLlm::start(vec![
        Reply::Sse(openai::tool_turn("call_1", "weather", r#"{"city":"Oslo"}"#, 10, 4)),
        // Second turn reports no usage at all
        Reply::Sse(vec![
            openai::tool_call(0, "call_2", "weather", r#"{"city":"Bergen"}"#),
            openai::finish("tool_calls"),
            openai::done(),
        ]),
        Reply::Sse(openai::text_turn("Both are rainy.", 30, 7)),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();
    let tools = Arc::new(RecordingTools::answering("rain"));
    let completions = pipeline(&config).with_tool_executor(tools.clone());

    let mut result = completions
        .completions("openai", ask_with_tools("weather?", &["weather"]))
        .await
        .unwrap();
    let stream = result.take_stream().unwrap();
    let chunks: Vec<Chunk> = futures_util::StreamExt::collect(stream).await;

    assert_well_formed(&chunks);
    assert_eq!(final_usage(&chunks), Usage::new(40, 11));
    assert_eq!(result.usage(), Usage::new(40, 11));
    assert_eq!(result.text(), "Both are rainy.");
    assert_eq!(tools.count(), 2);
    assert_eq!(mock.request_count(), 3);

    let created = kinds(&chunks).iter().filter(|k| **k == "tool_call_created").count();
    let results = kinds(&chunks).iter().filter(|k| **k == "tool_call_result").count();
    assert_eq!((created, results), (2, 2));
}

#[tokio::test]
async fn tool_results_are_sent_back_to_the_model() {
    let mock = MockLlm::start(vec![
        Reply::Sse(openai::tool_turn("call_1", "weather", r#"{"city":"Oslo"}"#, 10, 4)),
        Reply::Sse(openai::text_turn("Rainy.", 20, 2)),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();
    let tools = Arc::new(RecordingTools::answering("rain, 9C"));

    let chunks = pipeline(&config)
        .with_tool_executor(tools.clone())
        .completions("openai", ask_with_tools("weather in Oslo?", &["weather"]))
        .await
        .unwrap()
        .collect()
        .await;

    assert_well_formed(&chunks);
    assert_eq!(tools.calls()[0].arguments["city"], "Oslo");

    let requests = mock.requests();
    assert_eq!(requests[0].body["tools"][0]["function"]["name"], "weather");

    let messages = requests[1].body["messages"].as_array().unwrap();
    let assistant = &messages[messages.len() - 2];
    assert_eq!(assistant["role"], "assistant");
    assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
    let reply = &messages[messages.len() - 1];
    assert_eq!(reply["role"], "tool");
    assert_eq!(reply["tool_call_id"], "call_1");
    assert_eq!(reply["content"], "rain, 9C");
}

#[tokio::test]
async fn anthropic_tool_use_round_trip() {
    let mock = MockLlm::start(vec![
        Reply::Sse(vec![
            anthropic::message_start(20),
            anthropic::thinking_start(0),
            anthropic::thinking_delta(0, "need weather"),
            anthropic::block_stop(0),
            anthropic::tool_use_start(1, "toolu_1", "weather"),
            anthropic::input_json_delta(1, r#"{"city":"#),
            anthropic::input_json_delta(1, r#""Oslo"}"#),
            anthropic::block_stop(1),
            anthropic::message_delta("tool_use", 15),
            anthropic::message_stop(),
        ]),
        Reply::Sse(vec![
            anthropic::message_start(40),
            anthropic::text_start(0),
            anthropic::text_delta(0, "Rainy."),
            anthropic::block_stop(0),
            anthropic::message_delta("end_turn", 3),
            anthropic::message_stop(),
        ]),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_anthropic_provider("anthropic", &mock.base_url())
        .build();
    let tools = Arc::new(RecordingTools::answering("rain"));

    let chunks = pipeline(&config)
        .with_tool_executor(tools.clone())
        .completions("anthropic", ask_with_tools("weather in Oslo?", &["weather"]))
        .await
        .unwrap()
        .collect()
        .await;

    assert_well_formed(&chunks);
    assert_eq!(&kinds(&chunks)[..5], &[
        "reasoning_start",
        "reasoning_delta",
        "reasoning_end",
        "tool_call_created",
        "tool_call_result"
    ]);
    assert_eq!(final_usage(&chunks), Usage::new(60, 18));
    assert_eq!(tools.calls()[0].arguments["city"], "Oslo");

    let second = &mock.requests()[1].body;
    let messages = second["messages"].as_array().unwrap();
    let last = &messages[messages.len() - 1];
    assert_eq!(last["role"], "user");
    assert_eq!(last["content"][0]["type"], "tool_result");
    assert_eq!(last["content"][0]["tool_use_id"], "toolu_1");
}

#[tokio::test]
async fn endless_tool_calls_stop_at_the_configured_depth() {
    let mock = MockLlm::start_with_fallback(
        Vec::new(),
        Reply::Sse(openai::tool_turn("call_loop", "again", "{}", 1, 1)),
    )
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("openai", &mock.base_url())
        .with_max_tool_depth(3)
        .build();
    let tools = Arc::new(RecordingTools::answering("call me again"));

    let chunks = pipeline(&config)
        .with_tool_executor(tools.clone())
        .completions("openai", ask_with_tools("loop", &["again"]))
        .await
        .unwrap()
        .collect()
        .await;

    assert_well_formed(&chunks);
    assert_eq!(error_kind(&chunks), Some(ErrorKind::RecursionLimit));
    assert_eq!(mock.request_count(), 4);
    assert_eq!(tools.count(), 3);
}

#[tokio::test]
async fn failing_tool_is_reported_and_the_request_continues() {
    let mock = MockLlm::start(vec![
        Reply::Sse(openai::tool_turn("call_1", "weather", "{}", 5, 1)),
        Reply::Sse(openai::text_turn("The weather service is down.", 9, 6)),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();
    let tools = Arc::new(RecordingTools::failing("service unavailable"));

    let chunks = pipeline(&config)
        .with_tool_executor(tools)
        .completions("openai", ask_with_tools("weather?", &["weather"]))
        .await
        .unwrap()
        .collect()
        .await;

    assert_well_formed(&chunks);
    let response = chunks
        .iter()
        .find_map(|c| match c {
            Chunk::ToolCallResult { response } => Some(response),
            _ => None,
        })
        .unwrap();
    assert!(response.is_error);
    assert!(response.content.contains("service unavailable"));
    assert_eq!(final_usage(&chunks), Usage::new(14, 7));

    let messages = mock.requests()[1].body["messages"].clone();
    let last = messages.as_array().unwrap().last().unwrap().clone();
    assert_eq!(last["role"], "tool");
}

// A call naming a tool that was never offered is dropped with a warning
// instead of surfacing a tool execution error. With nothing left to run,
// the turn completes as-is.
#[tokio::test]
async fn unresolved_tool_call_is_dropped() {
    let mock = MockLlm::start(vec![Reply::Sse(openai::tool_turn(
        "call_1",
        "delete_everything",
        "{}",
        5,
        2,
    ))])
    .await
    .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();
    let tools = Arc::new(RecordingTools::answering("unused"));

    let chunks = pipeline(&config)
        .with_tool_executor(tools.clone())
        .completions("openai", ask_with_tools("clean up", &["weather"]))
        .await
        .unwrap()
        .collect()
        .await;

    assert_well_formed(&chunks);
    assert_eq!(kinds(&chunks), vec!["tool_call_created", "response_complete"]);
    assert_eq!(error_kind(&chunks), None);
    assert_eq!(tools.count(), 0);
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn unresolved_calls_are_dropped_beside_resolved_ones() {
    let mock = MockLlm::start(vec![
        Reply::Sse(vec![
            openai::tool_call(0, "call_1", "weather", r#"{"city":"Oslo"}"#),
            openai::tool_call(1, "call_2", "unknown_tool", "{}"),
            openai::finish("tool_calls"),
            openai::done(),
        ]),
        Reply::Sse(openai::text_turn("Rainy.", 3, 1)),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();
    let tools = Arc::new(RecordingTools::answering("rain"));

    let chunks = pipeline(&config)
        .with_tool_executor(tools.clone())
        .completions("openai", ask_with_tools("weather?", &["weather"]))
        .await
        .unwrap()
        .collect()
        .await;

    assert_well_formed(&chunks);
    assert_eq!(tools.count(), 1);

    let messages = mock.requests()[1].body["messages"].clone();
    let tool_replies: Vec<_> = messages
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] == "tool")
        .collect();
    assert_eq!(tool_replies.len(), 1);
    assert_eq!(tool_replies[0]["tool_call_id"], "call_1");
}
