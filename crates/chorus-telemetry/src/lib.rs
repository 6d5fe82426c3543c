//! Telemetry for chorus
//!
//! Structured logging through the `tracing` ecosystem plus pipeline metrics
//! recorded on the global OpenTelemetry meter. Metrics are no-ops until the
//! embedding application installs a meter provider.

pub mod metrics;

use chorus_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use opentelemetry::KeyValue;

/// Handle returned by [`init`]
///
/// Hold it for the lifetime of the application.
#[derive(Debug)]
pub struct TelemetryGuard {
    metrics_enabled: bool,
}

impl TelemetryGuard {
    /// Whether pipeline metrics should be recorded
    #[must_use]
    pub const fn metrics_enabled(&self) -> bool {
        self.metrics_enabled
    }
}

/// Initialize logging from configuration
///
/// The filter is taken from `RUST_LOG` when set, then from the configured
/// `log_filter`, then from `default_filter`. Log lines go to stderr so
/// completion output on stdout stays clean.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: Option<&TelemetryConfig>, default_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let filter = build_filter(config, default_filter);
    let format = config.map_or(LogFormat::Text, |c| c.format);

    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Text => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);

            registry.with(fmt_layer).try_init()
        }
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(true)
                .with_span_list(false);

            registry.with(fmt_layer).try_init()
        }
    };

    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    Ok(TelemetryGuard {
        metrics_enabled: config.is_none_or(|c| c.metrics),
    })
}

fn build_filter(config: Option<&TelemetryConfig>, default_filter: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    let directive = config
        .and_then(|c| c.log_filter.as_deref())
        .unwrap_or(default_filter);

    EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
}
