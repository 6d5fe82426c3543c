#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod args;

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use args::Args;
use chorus_config::Config;
use chorus_llm::{
    AbortRegistry, AssistantSettings, Chunk, ChunkError, Completions, CompletionsParams, Message, ProviderSet,
};
use clap::Parser;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load(&args.config)?;

    // Initialize telemetry; stdout is reserved for the completion text
    let telemetry = chorus_telemetry::init(config.telemetry.as_ref(), "warn")?;

    let timeout = config.pipeline.request_timeout()?;
    let providers = ProviderSet::from_config(&config.llm, timeout).context("failed to build providers")?;
    let provider_id = match args.provider {
        Some(id) => id,
        None => providers
            .ids()
            .next()
            .map(str::to_owned)
            .context("no provider configured")?,
    };

    let registry = Arc::new(AbortRegistry::new());
    let completions = Completions::new(providers, Arc::clone(&registry), &config.pipeline)
        .with_metrics(telemetry.metrics_enabled());

    let abort_key = format!("cli-{}", std::process::id());
    let params = CompletionsParams::new(vec![Message::user(args.prompt.join(" "))])
        .with_assistant(AssistantSettings {
            model: args.model,
            system_prompt: args.system,
            reasoning_effort: args.reasoning.map(Into::into),
            ..AssistantSettings::default()
        })
        .with_stream_output(config.pipeline.stream_output && !args.no_stream)
        .with_abort_key(abort_key.clone());

    // Ctrl-C aborts through the registry like any other caller would
    let interrupted = abort_on(
        async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        },
        Arc::clone(&registry),
        abort_key,
    );

    tracing::info!(
        config_path = %args.config.display(),
        provider = %provider_id,
        "starting completion"
    );

    let mut result = completions.completions(&provider_id, params).await?;
    if interrupted.is_cancelled() {
        result.cancel();
    }
    let mut stream = result.take_stream().context("completion stream already taken")?;

    let mut failure: Option<ChunkError> = None;
    while let Some(chunk) = stream.next().await {
        match chunk {
            Chunk::TextDelta { text } => {
                print!("{text}");
                std::io::stdout().flush()?;
            }
            Chunk::ReasoningDelta { text } => eprint!("{text}"),
            Chunk::ReasoningEnd { .. } => eprintln!(),
            Chunk::ToolCallCreated { tool_use } => eprintln!("[tool] {}({})", tool_use.name, tool_use.arguments),
            Chunk::ToolCallResult { response } => {
                let status = if response.is_error { "failed" } else { "ok" };
                eprintln!("[tool] {} {status}", response.tool_use.name);
            }
            Chunk::WebSearchResult { results } => eprintln!("[search] {} results", results.items.len()),
            Chunk::ResponseComplete { usage, metrics } => {
                println!();
                eprintln!(
                    "[usage] prompt={} completion={} total={} first_token={}ms elapsed={}ms",
                    usage.prompt_tokens,
                    usage.completion_tokens,
                    usage.total_tokens,
                    metrics.time_first_token_ms,
                    metrics.time_completion_ms
                );
            }
            Chunk::Error(error) => {
                println!();
                failure = Some(error);
            }
            Chunk::TextStart | Chunk::TextEnd { .. } | Chunk::ReasoningStart => {}
        }
    }

    if let Some(error) = failure {
        anyhow::bail!("{}: {}", error.kind.as_str(), error.message);
    }

    Ok(())
}

/// Abort `key` once `signal` resolves
///
/// The returned token is cancelled too, for a signal that lands before the
/// request has registered its key.
fn abort_on<F>(signal: F, registry: Arc<AbortRegistry>, key: String) -> CancellationToken
where
    F: Future<Output = ()> + Send + 'static,
{
    let interrupted = CancellationToken::new();
    let flag = interrupted.clone();
    tokio::spawn(async move {
        signal.await;
        if !registry.abort(&key) {
            tracing::debug!(key = %key, "interrupt arrived before the request registered");
        }
        flag.cancel();
    });
    interrupted
}
