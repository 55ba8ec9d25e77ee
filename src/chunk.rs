//! Line-boundary text chunker with overlap.
//!
//! Splits extracted document text into size-bounded chunks for indexing.
//! Accumulation is greedy over lines; when a line would push the buffer past
//! `chunk_size`, the buffer is flushed and the next buffer is seeded with the
//! last `overlap_lines` lines of the flushed chunk so neighboring chunks
//! share context. Markdown-friendly: splitting never cuts inside a line, so
//! headers and list items stay intact.
//!
//! A single line longer than `chunk_size` is never split and may produce an
//! oversized chunk. Whitespace-only chunks are kept here; the index build
//! step filters them.

/// Default maximum accumulated size of a chunk, in bytes.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default number of trailing lines carried into the next chunk.
pub const DEFAULT_OVERLAP_LINES: usize = 3;

/// Split text into overlapping chunks on line boundaries.
///
/// Texts no longer than `chunk_size` are returned as a single chunk equal
/// to the input.
pub fn chunk_text(text: &str, chunk_size: usize, overlap_lines: usize) -> Vec<String> {
    if text.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut buf_len = 0usize;

    for line in text.split('\n') {
        // +1 for the joining newline when the buffer is non-empty
        let added = if buf.is_empty() {
            line.len()
        } else {
            line.len() + 1
        };

        if buf_len + added > chunk_size && !buf.is_empty() {
            chunks.push(buf.join("\n").trim().to_string());

            // Seed the next buffer with the tail of the flushed chunk,
            // then the line that did not fit.
            let keep_from = buf.len().saturating_sub(overlap_lines);
            buf = buf.split_off(keep_from);
            buf.push(line);
            buf_len = buf.iter().map(|l| l.len()).sum::<usize>() + buf.len() - 1;
        } else {
            buf.push(line);
            buf_len += added;
        }
    }

    let last = buf.join("\n").trim().to_string();
    if !last.is_empty() {
        chunks.push(last);
    }

    if chunks.is_empty() {
        vec![text.to_string()]
    } else {
        chunks
    }
}
