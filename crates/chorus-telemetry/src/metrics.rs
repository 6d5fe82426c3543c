//! Metric name constants and recording helpers

use std::sync::OnceLock;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Histogram};

// Completion metric names
pub const LLM_REQUEST_COUNT: &str = "llm.request.count";
pub const LLM_REQUEST_DURATION: &str = "llm.request.duration";
pub const LLM_TIME_TO_FIRST_TOKEN: &str = "llm.time_to_first_token";
pub const LLM_TOKEN_USAGE: &str = "llm.token.usage";

// Tool metric names
pub const LLM_TOOL_CALL_COUNT: &str = "llm.tool_call.count";

// Attribute keys
pub const ATTR_PROVIDER: &str = "llm.provider";
pub const ATTR_MODEL: &str = "llm.model";
pub const ATTR_OUTCOME: &str = "llm.outcome";
pub const ATTR_TOKEN_TYPE: &str = "llm.token.type";
pub const ATTR_TOOL_NAME: &str = "llm.tool.name";

struct Instruments {
    requests: Counter<u64>,
    duration: Histogram<f64>,
    first_token: Histogram<f64>,
    tokens: Counter<u64>,
    tool_calls: Counter<u64>,
}

fn instruments() -> &'static Instruments {
    static INSTRUMENTS: OnceLock<Instruments> = OnceLock::new();

    INSTRUMENTS.get_or_init(|| {
        let meter = opentelemetry::global::meter("chorus");

        Instruments {
            requests: meter
                .u64_counter(LLM_REQUEST_COUNT)
                .with_description("Completed top-level completion requests")
                .build(),
            duration: meter
                .f64_histogram(LLM_REQUEST_DURATION)
                .with_unit("s")
                .with_description("Total completion time across all turns")
                .build(),
            first_token: meter
                .f64_histogram(LLM_TIME_TO_FIRST_TOKEN)
                .with_unit("s")
                .with_description("Time until the first content chunk")
                .build(),
            tokens: meter
                .u64_counter(LLM_TOKEN_USAGE)
                .with_description("Tokens consumed, by token type")
                .build(),
            tool_calls: meter
                .u64_counter(LLM_TOOL_CALL_COUNT)
                .with_description("Tool invocations, by outcome")
                .build(),
        }
    })
}

/// Summary of a finished top-level completion
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionSample<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub outcome: &'a str,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub duration: Option<Duration>,
    pub time_to_first_token: Option<Duration>,
}

/// Record one finished completion
pub fn record_completion(sample: &CompletionSample<'_>) {
    let instruments = instruments();
    let attributes = [
        KeyValue::new(ATTR_PROVIDER, sample.provider.to_owned()),
        KeyValue::new(ATTR_MODEL, sample.model.to_owned()),
    ];

    let mut with_outcome = attributes.to_vec();
    with_outcome.push(KeyValue::new(ATTR_OUTCOME, sample.outcome.to_owned()));
    instruments.requests.add(1, &with_outcome);

    if let Some(duration) = sample.duration {
        instruments.duration.record(duration.as_secs_f64(), &with_outcome);
    }

    if let Some(ttft) = sample.time_to_first_token {
        instruments.first_token.record(ttft.as_secs_f64(), &attributes);
    }

    for (kind, count) in [("input", sample.prompt_tokens), ("output", sample.completion_tokens)] {
        if count > 0 {
            let mut token_attrs = attributes.to_vec();
            token_attrs.push(KeyValue::new(ATTR_TOKEN_TYPE, kind));
            instruments.tokens.add(count, &token_attrs);
        }
    }
}

/// Record one tool invocation
pub fn record_tool_call(tool: &str, success: bool) {
    let outcome = if success { "success" } else { "error" };

    instruments().tool_calls.add(
        1,
        &[
            KeyValue::new(ATTR_TOOL_NAME, tool.to_owned()),
            KeyValue::new(ATTR_OUTCOME, outcome),
        ],
    );
}
