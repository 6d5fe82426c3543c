mod harness;

use axum::http::StatusCode;
use chorus_llm::{Chunk, CompletionsParams, ErrorKind, LlmError, Message, Usage};
use harness::config::ConfigBuilder;
use harness::mock_llm::{MockLlm, Reply, anthropic, openai};
use harness::{assert_well_formed, error_kind, kinds, pipeline};
use serde_json::json;

fn ask() -> CompletionsParams {
    CompletionsParams::new(vec![Message::user("hi")])
}

fn server_error() -> Reply {
    Reply::Status(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": { "message": "mock server intentional failure", "type": "server_error" } }),
    )
}

#[tokio::test]
async fn unknown_provider_fails_before_streaming() {
    let config = ConfigBuilder::new().build();

    let result = pipeline(&config).completions("nope", ask()).await;

    assert!(matches!(result, Err(LlmError::ProviderNotFound { provider }) if provider == "nope"));
}

#[tokio::test]
async fn upstream_error_becomes_a_provider_error_chunk() {
    let mock = MockLlm::start(vec![server_error()]).await.unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();

    let chunks = pipeline(&config).completions("openai", ask()).await.unwrap().collect().await;

    assert_eq!(kinds(&chunks), vec!["error"]);
    assert_eq!(error_kind(&chunks), Some(ErrorKind::Provider));
    let Chunk::Error(error) = &chunks[0] else { unreachable!() };
    assert!(error.message.contains("mock server intentional failure"));
    assert_eq!(mock.request_count(), 1);
}

#[tokio::test]
async fn retries_recover_from_transient_failures() {
    let mock = MockLlm::start(vec![
        server_error(),
        server_error(),
        Reply::Sse(openai::text_turn("third time lucky", 3, 3)),
    ])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("openai", &mock.base_url())
        .with_max_retries(2)
        .build();

    let chunks = pipeline(&config).completions("openai", ask()).await.unwrap().collect().await;

    assert_well_formed(&chunks);
    assert_eq!(error_kind(&chunks), None);
    assert_eq!(mock.request_count(), 3);
}

#[tokio::test]
async fn retries_give_up_after_the_limit() {
    let mock = MockLlm::start_with_fallback(Vec::new(), server_error()).await.unwrap();
    let config = ConfigBuilder::new()
        .with_openai_provider("openai", &mock.base_url())
        .with_max_retries(1)
        .build();

    let chunks = pipeline(&config).completions("openai", ask()).await.unwrap().collect().await;

    assert_eq!(error_kind(&chunks), Some(ErrorKind::Provider));
    assert_eq!(mock.request_count(), 2);
}

#[tokio::test]
async fn unparseable_frames_are_skipped() {
    let mock = MockLlm::start(vec![Reply::Sse(vec![
        openai::text("kept"),
        json!({ "choices": "not a list" }),
        openai::text(" going"),
        openai::finish("stop"),
        openai::done(),
    ])])
    .await
    .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();

    let mut result = pipeline(&config).completions("openai", ask()).await.unwrap();
    let chunks: Vec<Chunk> = futures_util::StreamExt::collect(result.take_stream().unwrap()).await;

    assert_well_formed(&chunks);
    assert_eq!(result.text(), "kept going");
    // No usage reported: the completion carries zeros
    assert!(matches!(chunks.last(), Some(Chunk::ResponseComplete { usage, .. }) if *usage == Usage::default()));
}

#[tokio::test]
async fn vendor_error_event_ends_the_stream() {
    let mock = MockLlm::start(vec![Reply::Sse(vec![
        anthropic::message_start(5),
        anthropic::text_start(0),
        anthropic::text_delta(0, "partial"),
        json!({ "type": "error", "error": { "type": "overloaded_error", "message": "Overloaded" } }),
        anthropic::text_delta(0, " never seen"),
    ])])
    .await
    .unwrap();
    let config = ConfigBuilder::new()
        .with_anthropic_provider("anthropic", &mock.base_url())
        .build();

    let chunks = pipeline(&config).completions("anthropic", ask()).await.unwrap().collect().await;

    assert_well_formed(&chunks);
    assert_eq!(kinds(&chunks), vec!["text_start", "text_delta", "error"]);
    let Chunk::Error(error) = &chunks[2] else { unreachable!() };
    assert_eq!(error.kind, ErrorKind::Provider);
    assert!(error.message.contains("Overloaded"));
}

#[tokio::test]
async fn stream_cut_short_still_completes() {
    // No finish reason and no `[DONE]`: the connection simply closes
    let mock = MockLlm::start(vec![Reply::Sse(vec![openai::text("abrupt")])])
        .await
        .unwrap();
    let config = ConfigBuilder::new().with_openai_provider("openai", &mock.base_url()).build();

    let chunks = pipeline(&config).completions("openai", ask()).await.unwrap().collect().await;

    assert_well_formed(&chunks);
    assert_eq!(kinds(&chunks).last(), Some(&"response_complete"));
}

#[tokio::test]
async fn system_only_anthropic_request_is_rejected_locally() {
    let mock = MockLlm::start(Vec::new()).await.unwrap();
    let config = ConfigBuilder::new()
        .with_anthropic_provider("anthropic", &mock.base_url())
        .build();

    let params = CompletionsParams::new(vec![Message::system("You are terse.")]);
    let chunks = pipeline(&config).completions("anthropic", params).await.unwrap().collect().await;

    assert_eq!(kinds(&chunks), vec!["error"]);
    assert_eq!(error_kind(&chunks), Some(ErrorKind::Provider));
    assert_eq!(mock.request_count(), 0);
}
