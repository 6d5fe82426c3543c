//! Built-in middleware, listed outermost first in [`default_middlewares`]

mod abort;
mod error;
mod provider_call;
mod retry;
mod tool_recursion;
mod usage;
mod web_search;

use std::sync::Arc;

pub use abort::AbortHandler;
pub use error::ErrorHandler;
pub use provider_call::ProviderCall;
pub use retry::Retry;
pub use tool_recursion::ToolRecursion;
pub use usage::UsageCollector;
pub use web_search::WebSearch;

use super::chain::Middleware;
use super::context::PipelineSettings;

/// Standard middleware order for a request
///
/// The web search runs outside retries so a retried request searches once.
/// Usage is collected inside tool recursion so each turn is counted once.
pub fn default_middlewares(settings: &PipelineSettings) -> Vec<Arc<dyn Middleware>> {
    let mut middlewares: Vec<Arc<dyn Middleware>> =
        vec![Arc::new(ErrorHandler), Arc::new(AbortHandler), Arc::new(WebSearch)];
    if settings.max_retries > 0 {
        middlewares.push(Arc::new(Retry::new(settings.max_retries, settings.retry_backoff)));
    }
    middlewares.push(Arc::new(ToolRecursion));
    middlewares.push(Arc::new(UsageCollector));
    middlewares
}
