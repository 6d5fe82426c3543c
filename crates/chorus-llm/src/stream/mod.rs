//! Vendor-independent chunk streams

mod normalize;

use std::pin::Pin;

use futures_util::Stream;

pub use normalize::{ChunkNormalizer, normalize};

use crate::types::Chunk;

/// Stream of normalized chunks for one request or turn
pub type ChunkStream = Pin<Box<dyn Stream<Item = Chunk> + Send>>;
