//! Pass 2: walk the text and emit chunks
//!
//! Deterministic and side-effect-free: the same input and size always produce
//! the same chunks, and concatenating the chunk texts in index order
//! reconstitutes the input exactly.

use super::boundary::{self, BoundaryIndex};
use super::Chunk;

/// Split `text` into chunks of at most `max_size` bytes, cutting at the best
/// available boundary near each window end.
///
/// A chunk may exceed `max_size` only when a fenced code block or a single
/// unbreakable token is itself larger than the window; fenced blocks are never
/// truncated.
pub fn chunk(text: &str, max_size: usize) -> Vec<Chunk> {
    let max_size = max_size.max(1);

    if text.len() <= max_size {
        return vec![Chunk::new(0, text.to_string())];
    }

    let spans = boundary::scan_protected_spans(text);
    let index = BoundaryIndex::scan(text, &spans);

    let mut chunks = Vec::new();
    let mut current = 0;

    while current < text.len() {
        let mut end = floor_char_boundary(text, (current + max_size).min(text.len()));
        if end <= current {
            // a single code point wider than the window; take it whole
            end = ceil_char_boundary(text, current + 1);
        }

        if end < text.len() {
            if let Some(span) = boundary::span_containing(&spans, end) {
                end = span.end;
            } else if let Some(best) = index.best_boundary(current, end) {
                end = best;
            }
        }

        chunks.push(Chunk::new(chunks.len(), text[current..end].to_string()));
        current = end;
    }

    chunks
}

/// Like [`chunk`], then merge any chunk shorter than `min_size` into its
/// predecessor when the merged chunk still fits `max_size`.
///
/// Avoids spending a full external call on a sliver of trailing text.
pub fn chunk_with_min(text: &str, max_size: usize, min_size: usize) -> Vec<Chunk> {
    let mut chunks = chunk(text, max_size);
    if min_size == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for piece in chunks.drain(..) {
        match merged.last_mut() {
            Some(prev) if piece.length < min_size && prev.length + piece.length <= max_size => {
                prev.text.push_str(&piece.text);
                prev.length += piece.length;
            }
            _ => merged.push(piece),
        }
    }

    for (i, piece) in merged.iter_mut().enumerate() {
        piece.index = i;
    }

    merged
}

fn floor_char_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(text: &str, mut i: usize) -> usize {
    if i >= text.len() {
        return text.len();
    }
    while !text.is_char_boundary(i) {
        i += 1;
    }
    i
}
