use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Token usage statistics
///
/// Missing vendor fields are zero, never a sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: u64,
    /// Tokens generated in the completion
    pub completion_tokens: u64,
    /// Total tokens (prompt + completion)
    pub total_tokens: u64,
}

impl Usage {
    /// Build usage from prompt and completion counts
    pub const fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }

    /// Overlay the non-zero fields of a later snapshot from the same turn
    ///
    /// Vendors report usage piecemeal (prompt tokens at stream start, output
    /// tokens at the end), so a zero in a later frame means "not reported".
    pub fn merge(&mut self, snapshot: Self) {
        if snapshot.prompt_tokens > 0 {
            self.prompt_tokens = snapshot.prompt_tokens;
        }
        if snapshot.completion_tokens > 0 {
            self.completion_tokens = snapshot.completion_tokens;
        }
        if snapshot.total_tokens > 0 {
            self.total_tokens = snapshot.total_tokens;
        }
        self.total_tokens = self.total_tokens.max(self.prompt_tokens + self.completion_tokens);
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.prompt_tokens += rhs.prompt_tokens;
        self.completion_tokens += rhs.completion_tokens;
        self.total_tokens += rhs.total_tokens;
    }
}

/// Timing observed for a response, in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Time from request start to the first content delta
    pub time_first_token_ms: u64,
    /// Time from request start to the end of the response
    pub time_completion_ms: u64,
}

impl AddAssign for Metrics {
    /// Completion time accumulates; first-token time keeps the earliest turn's value
    fn add_assign(&mut self, rhs: Self) {
        if self.time_first_token_ms == 0 {
            self.time_first_token_ms = rhs.time_first_token_ms;
        }
        self.time_completion_ms += rhs.time_completion_ms;
    }
}
