//! Boundary-preferring text chunker with overlap.
//!
//! Splits a document into [`Chunk`]s of at most `chunk_size` characters.
//! Consecutive chunks share roughly `chunk_overlap` characters so that a
//! sentence cut by one window is still whole in the next.
//!
//! # Algorithm
//!
//! 1. Empty text yields no chunks; text that fits in one window yields
//!    exactly one chunk equal to the input.
//! 2. Open a window of `chunk_size` characters at the current start.
//! 3. End the window at the last natural boundary inside it, trying in
//!    order: paragraph (`\n\n`), line (`\n`), sentence (`. `, `! `, `? `),
//!    word (` `). The separator stays at the end of the chunk. Boundaries
//!    that fall inside the overlap region are ignored so that every window
//!    makes progress.
//! 4. With no usable boundary, hard-cut at `chunk_size` characters.
//! 5. Start the next window `chunk_overlap` characters before the end,
//!    moved forward to the next word start if the overlap region has one.
//!
//! Chunks are slices of the source and carry their byte offsets, so
//! [`merge_chunks`] can drop the overlap and rebuild the source exactly.
//!
//! # Example
//!
//! ```rust
//! use page_rag::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 500, 50);
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].text, "Hello world.\n\nSecond paragraph.");
//! ```

use crate::models::Chunk;

/// Default maximum chunk length, in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between consecutive chunks, in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Boundary classes, highest priority first.
const SEPARATORS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// # Guarantees
///
/// - Empty input returns an empty `Vec`.
/// - Input of at most `chunk_size` characters returns one chunk equal to it.
/// - Every chunk is at most `chunk_size` characters long.
/// - Chunk indices are contiguous: `0, 1, 2, …, N-1`.
/// - `chunks[i].start <= chunks[i - 1].end`, so no text is lost.
///
/// An overlap of `chunk_size` or more is clamped to `chunk_size - 1`.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    if text.is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    // bounds[i] is the byte offset of char i; bounds[n] == text.len()
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let n = bounds.len() - 1;

    if n <= chunk_size {
        return vec![make_chunk(text, &bounds, 0, 0, n)];
    }

    let overlap = chunk_overlap.min(chunk_size - 1);
    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let limit = start + chunk_size;
        if limit >= n {
            chunks.push(make_chunk(text, &bounds, chunks.len(), start, n));
            break;
        }

        let end = find_break(text, &bounds, start, start + overlap, limit).unwrap_or(limit);
        chunks.push(make_chunk(text, &bounds, chunks.len(), start, end));

        start = next_start(text, &bounds, end, overlap);
    }

    chunks
}

/// Rebuild the source text from chunks produced by [`chunk_text`].
///
/// The overlapping prefix of each chunk is skipped using the byte offsets.
pub fn merge_chunks(chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0;
    for c in chunks {
        if c.end <= covered {
            continue;
        }
        let skip = covered.saturating_sub(c.start);
        out.push_str(&c.text[skip..]);
        covered = c.end;
    }
    out
}

/// Find the char index just past the best boundary in `(min_end, limit]`.
fn find_break(
    text: &str,
    bounds: &[usize],
    start: usize,
    min_end: usize,
    limit: usize,
) -> Option<usize> {
    let window_start = bounds[start];
    let window = &text[window_start..bounds[limit]];

    for class in SEPARATORS {
        let best = class
            .iter()
            .filter_map(|sep| window.rfind(sep).map(|pos| window_start + pos + sep.len()))
            .max();

        if let Some(byte) = best {
            // Separators are ASCII, so `byte` is always a char boundary.
            if let Ok(end) = bounds.binary_search(&byte) {
                if end > min_end {
                    return Some(end);
                }
            }
        }
    }

    None
}

/// Pick where the next window begins, `overlap` chars before `end`.
fn next_start(text: &str, bounds: &[usize], end: usize, overlap: usize) -> usize {
    let candidate = end - overlap;
    (candidate.max(1)..end)
        .find(|&i| {
            text[bounds[i - 1]..bounds[i]]
                .chars()
                .all(char::is_whitespace)
                && !text[bounds[i]..bounds[i + 1]]
                    .chars()
                    .all(char::is_whitespace)
        })
        .unwrap_or(candidate)
}

fn make_chunk(text: &str, bounds: &[usize], index: usize, start: usize, end: usize) -> Chunk {
    let (start, end) = (bounds[start], bounds[end]);
    Chunk {
        index,
        start,
        end,
        text: text[start..end].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_text() -> String {
        (0..40)
            .map(|i| {
                format!(
                    "Paragraph {} talks about ownership, borrowing and lifetimes in some detail. \
                     It has a second sentence as well!",
                    i
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn test_empty_text() {
        assert!(chunk_text("", 500, 50).is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_exactly_chunk_size_is_single_chunk() {
        let text = "a".repeat(500);
        let chunks = chunk_text(&text, 500, 50);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
    }

    #[test]
    fn test_chunks_respect_max_size() {
        let text = long_text();
        let chunks = chunk_text(&text, 200, 30);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 200, "chunk {} too long", c.index);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous() {
        let text = long_text();
        let chunks = chunk_text(&text, 120, 20);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i, "Index mismatch at position {}", i);
        }
    }

    #[test]
    fn test_merge_reconstructs_source() {
        let text = long_text();
        for (size, overlap) in [(500, 50), (200, 30), (64, 0), (33, 32)] {
            let chunks = chunk_text(&text, size, overlap);
            assert_eq!(merge_chunks(&chunks), text, "size={} overlap={}", size, overlap);
        }
    }

    #[test]
    fn test_merge_reconstructs_without_boundaries() {
        let text = "x".repeat(1234);
        let chunks = chunk_text(&text, 100, 10);
        assert!(chunks.iter().all(|c| c.text.len() <= 100));
        assert_eq!(merge_chunks(&chunks), text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Héllo wörld ünïcode │\n└──────────────────┘ 日本語のテキストです。"
            .repeat(5);
        let chunks = chunk_text(&text, 17, 4);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 17);
            assert_eq!(&text[c.start..c.end], c.text);
        }
        assert_eq!(merge_chunks(&chunks), text);
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let para = "word ".repeat(60); // 300 chars
        let text = format!("{}\n\n{}", para.trim_end(), para.trim_end());
        let chunks = chunk_text(&text, 500, 50);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("\n\n"));
    }

    #[test]
    fn test_does_not_split_mid_word() {
        let text = long_text();
        let chunks = chunk_text(&text, 150, 25);
        for pair in chunks.windows(2) {
            let last = pair[0].text.chars().last().unwrap();
            assert!(last.is_whitespace(), "chunk {} ends mid-word", pair[0].index);
            let first = pair[1].text.chars().next().unwrap();
            assert!(!first.is_whitespace(), "chunk {} starts on whitespace", pair[1].index);
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = long_text();
        let chunks = chunk_text(&text, 200, 40);
        for pair in chunks.windows(2) {
            assert!(pair[1].start < pair[0].end, "no overlap after chunk {}", pair[0].index);
            let shared = text[pair[1].start..pair[0].end].chars().count();
            assert!(shared <= 40);
        }
    }

    #[test]
    fn test_zero_overlap_is_disjoint() {
        let text = long_text();
        let chunks = chunk_text(&text, 200, 0);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = long_text();
        assert_eq!(chunk_text(&text, 100, 10), chunk_text(&text, 100, 10));
    }
}
