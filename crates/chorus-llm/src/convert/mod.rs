//! Conversion between internal canonical types and vendor wire formats
//!
//! Outbound, each submodule turns a [`CompletionRequest`](crate::types::CompletionRequest)
//! into its vendor's request body. Inbound, a per-vendor stream state turns
//! wire frames into neutral [`StreamEvent`](crate::types::StreamEvent)s.

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod think;
