//! Wire format types for each vendor API
//!
//! These mirror the vendors' JSON shapes and carry no behavior; conversion
//! lives in [`crate::convert`].

pub mod anthropic;
pub mod google;
pub mod openai;
