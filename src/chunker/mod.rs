//! Boundary-aware text chunking
//!
//! Splits oversized input into model-sized pieces without cutting through
//! fenced code blocks, headers, or sentences. Two passes: `boundary` scans the
//! whole input once for protected spans and boundary candidates, `splitter`
//! walks the text using those precomputed position lists.

pub mod boundary;
pub mod splitter;

pub use boundary::{BoundaryIndex, BoundaryKind, ProtectedSpan};
pub use splitter::{chunk, chunk_with_min};

use serde::{Deserialize, Serialize};

/// A contiguous piece of the input sized to fit one model call
///
/// Ordering is significant: concatenating chunk texts in index order
/// reconstitutes the original input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub text: String,
    pub length: usize,
}

impl Chunk {
    pub fn new(index: usize, text: String) -> Self {
        let length = text.len();
        Self {
            index,
            text,
            length,
        }
    }
}
