//! Chunker — splits document text into bounded, overlapping segments.
//!
//! Lengths and offsets count `char`s. Each cut prefers, in order, a paragraph break,
//! a sentence end and plain whitespace inside a tolerance window just before the size
//! limit; with no boundary in the window the text is cut hard at the limit.
//!
//! Every chunk after the first starts `overlap` characters before the previous one ended,
//! so dropping the first `overlap` characters of each later chunk and concatenating gives
//! back the original text.

use serde::{Deserialize, Serialize};

use crate::config::{ChunkingSettings, ConfigError};

/// A bounded span of one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Source tag of the document this span was cut from.
    pub source: String,
    /// Position of this chunk within its document's chunk sequence.
    pub sequence: usize,
    /// Offset of the first character, in chars from the start of the document.
    pub offset: usize,
    /// Length in chars.
    pub length: usize,
    pub text: String,
}

impl Chunk {
    /// Offset one past the last character.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Number of characters this span shares with `other`, zero when sources differ.
    pub fn shared_chars(&self, other: &Chunk) -> usize {
        if self.source != other.source {
            return 0;
        }
        let start = self.offset.max(other.offset);
        let end = self.end().min(other.end());
        end.saturating_sub(start)
    }
}

/// Splits `text` into chunks of at most `settings.chunk_size` characters.
///
/// Empty text yields no chunks. Fails with `ConfigError` when `overlap >= chunk_size`.
pub fn chunk(
    source: &str,
    text: &str,
    settings: &ChunkingSettings,
) -> Result<Vec<Chunk>, ConfigError> {
    settings.validate()?;
    let ChunkingSettings {
        chunk_size,
        overlap,
    } = *settings;

    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();
    let mut chunks = Vec::new();
    if total == 0 {
        return Ok(chunks);
    }

    let mut start = 0;
    loop {
        let end = if total - start <= chunk_size {
            total
        } else {
            let hard_end = start + chunk_size;
            find_boundary(&chars, start, hard_end, chunk_size, overlap).unwrap_or(hard_end)
        };

        chunks.push(Chunk {
            source: source.to_string(),
            sequence: chunks.len(),
            offset: start,
            length: end - start,
            text: chars[start..end].iter().collect(),
        });

        if end == total {
            break;
        }
        // find_boundary never returns an end at or before start + overlap, so this advances.
        start = end - overlap;
    }

    tracing::debug!(
        "Chunked '{}' ({} chars) into {} chunks (size {}, overlap {})",
        source,
        total,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

/// Picks a cut position in `(start + overlap, hard_end]`, searching only the last
/// `chunk_size / 5` characters before the limit.
fn find_boundary(
    chars: &[char],
    start: usize,
    hard_end: usize,
    chunk_size: usize,
    overlap: usize,
) -> Option<usize> {
    let tolerance = (chunk_size / 5).max(1);
    let lower = hard_end.saturating_sub(tolerance).max(start + overlap + 1);
    if lower > hard_end {
        return None;
    }

    let window = || (lower..=hard_end).rev();

    let paragraph = window().find(|&end| end >= 2 && chars[end - 2] == '\n' && chars[end - 1] == '\n');
    if paragraph.is_some() {
        return paragraph;
    }

    let sentence = window().find(|&end| {
        let last = chars[end - 1];
        last == '\n'
            || (last.is_whitespace() && end >= 2 && matches!(chars[end - 2], '.' | '!' | '?'))
    });
    if sentence.is_some() {
        return sentence;
    }

    window().find(|&end| chars[end - 1].is_whitespace())
}
