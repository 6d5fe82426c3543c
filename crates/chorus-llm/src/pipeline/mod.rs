//! The completion pipeline
//!
//! A request flows through an ordered middleware chain around a terminal
//! provider call:
//!
//! ```text
//! ErrorHandler -> AbortHandler -> WebSearch -> [Retry] -> ToolRecursion -> UsageCollector -> ProviderCall
//! ```
//!
//! Tool-call turns re-enter the same chain through the
//! [`ProcessingContext`], sharing its cancellation token and usage totals.

mod aggregate;
mod chain;
mod collaborators;
mod completions;
mod context;
pub mod middleware;
mod registry;
mod result;
#[cfg(test)]
mod testing;

pub use aggregate::UsageAggregator;
pub use chain::{Chain, Handler, Middleware, Next};
pub use collaborators::{ToolExecutor, WebSearcher};
pub use completions::Completions;
pub use context::{PipelineSettings, ProcessingContext};
pub use registry::{AbortGuard, AbortRegistry};
pub use result::CompletionsResult;
