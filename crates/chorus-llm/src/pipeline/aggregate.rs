//! Usage and timing accumulated across the turns of one request

use crate::types::{Metrics, Usage};

/// Running totals for a top-level request and its tool-call turns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageAggregator {
    usage: Usage,
    metrics: Metrics,
    turns: u32,
}

impl UsageAggregator {
    /// Add one turn's reported figures
    pub fn record(&mut self, usage: Usage, metrics: Metrics) {
        self.usage += usage;
        self.metrics += metrics;
        self.turns += 1;
    }

    /// Summed token usage
    pub const fn usage(&self) -> Usage {
        self.usage
    }

    /// Combined timing
    pub const fn metrics(&self) -> Metrics {
        self.metrics
    }

    /// Number of turns recorded
    pub const fn turns(&self) -> u32 {
        self.turns
    }
}
