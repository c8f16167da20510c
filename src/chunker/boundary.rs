//! Pass 1: protected spans and boundary candidates
//!
//! Collects everything the splitter needs in one scan over the input: fenced
//! code block ranges that must never be cut, and sorted position lists for
//! each boundary quality tier.

/// A byte range the splitter must never cut through
///
/// Boundaries exactly at `start` or `end` are allowed; only positions strictly
/// inside the range are protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedSpan {
    pub start: usize,
    pub end: usize,
}

impl ProtectedSpan {
    /// Whether a position falls strictly inside this span
    pub fn contains(&self, pos: usize) -> bool {
        pos > self.start && pos < self.end
    }
}

/// Boundary quality, highest preferred
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BoundaryKind {
    Sentence = 1,
    Line = 2,
    Paragraph = 3,
    Header = 4,
}

/// Sorted boundary positions per quality tier
///
/// A position marks where a cut would fall: the chunk ends there and the next
/// chunk begins there. Candidates inside protected spans are excluded during
/// the scan, so headers inside code fences are never treated as headers.
#[derive(Debug, Default)]
pub struct BoundaryIndex {
    headers: Vec<usize>,
    paragraphs: Vec<usize>,
    lines: Vec<usize>,
    sentences: Vec<usize>,
}

/// Scan for fenced code blocks via a paired-delimiter walk over the lines.
///
/// An opening fence may carry an info string (e.g. ```` ```rust ````); the
/// closing fence toggles the block shut. An unclosed fence protects through
/// the end of the input.
pub fn scan_protected_spans(text: &str) -> Vec<ProtectedSpan> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            match open.take() {
                None => open = Some(offset),
                Some(start) => spans.push(ProtectedSpan {
                    start,
                    end: offset + line.len(),
                }),
            }
        }
        offset += line.len();
    }

    if let Some(start) = open {
        spans.push(ProtectedSpan {
            start,
            end: text.len(),
        });
    }

    spans
}

/// Find the span containing `pos` strictly inside, if any.
///
/// `spans` must be sorted by start and non-overlapping, as produced by
/// [`scan_protected_spans`].
pub fn span_containing(spans: &[ProtectedSpan], pos: usize) -> Option<ProtectedSpan> {
    let idx = spans.partition_point(|s| s.end <= pos);
    spans.get(idx).copied().filter(|s| s.contains(pos))
}

impl BoundaryIndex {
    /// Collect boundary candidates for the whole input.
    pub fn scan(text: &str, spans: &[ProtectedSpan]) -> Self {
        let mut index = BoundaryIndex::default();
        let bytes = text.as_bytes();

        // Header lines: 1-6 '#' at line start followed by whitespace. The cut
        // falls before the header line.
        let mut offset = 0;
        for line in text.split_inclusive('\n') {
            if offset > 0 && is_header_line(line) && span_containing(spans, offset).is_none() {
                index.headers.push(offset);
            }
            offset += line.len();
        }

        // Paragraph breaks, single line breaks, and sentence terminators. All
        // markers are ASCII, so the positions are always char boundaries.
        for i in 0..bytes.len() {
            if bytes[i] == b'\n' {
                let pos = i + 1;
                if span_containing(spans, pos).is_none() {
                    if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                        index.paragraphs.push(i + 2);
                    }
                    index.lines.push(pos);
                }
            } else if matches!(bytes[i], b'.' | b'!' | b'?')
                && i + 1 < bytes.len()
                && matches!(bytes[i + 1], b' ' | b'\n')
            {
                let pos = i + 2;
                if span_containing(spans, pos).is_none() {
                    index.sentences.push(pos);
                }
            }
        }

        index
    }

    /// Best boundary in `(current, end]`, searching backward within per-tier
    /// lookback windows in strict quality order. `None` means hard cut.
    pub fn best_boundary(&self, current: usize, end: usize) -> Option<usize> {
        const HEADER_LOOKBACK: usize = 500;
        const PARAGRAPH_LOOKBACK: usize = 500;
        const LINE_LOOKBACK: usize = 300;
        const SENTENCE_LOOKBACK: usize = 200;

        rightmost_in(&self.headers, current, end, HEADER_LOOKBACK)
            .or_else(|| rightmost_in(&self.paragraphs, current, end, PARAGRAPH_LOOKBACK))
            .or_else(|| rightmost_in(&self.lines, current, end, LINE_LOOKBACK))
            .or_else(|| rightmost_in(&self.sentences, current, end, SENTENCE_LOOKBACK))
    }
}

fn is_header_line(line: &str) -> bool {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&hashes)
        && matches!(line.as_bytes().get(hashes).copied(), Some(b' ') | Some(b'\t'))
}

/// Rightmost position in `positions` that lies in `(current, end]` and within
/// `lookback` of `end`.
fn rightmost_in(positions: &[usize], current: usize, end: usize, lookback: usize) -> Option<usize> {
    let idx = positions.partition_point(|&p| p <= end);
    let candidate = *positions.get(idx.checked_sub(1)?)?;
    let floor = end.saturating_sub(lookback);
    (candidate > current && candidate >= floor).then_some(candidate)
}
