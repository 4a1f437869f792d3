//! Retriever — turns one or more query strings into a bounded, deduplicated Context.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RetrievalSettings;
use crate::errors::PipelineError;
use crate::ingest::Chunk;

use super::embedder::Embedder;
use super::index::VectorIndex;

/// Chunk selected for a context, with the similarity that earned it a place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextChunk {
    pub chunk: Chunk,
    pub similarity: f32,
    /// True when the text was cut short to fit the budget.
    pub truncated: bool,
}

/// Ordered chunks (descending similarity) whose combined text never exceeds the budget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub chunks: Vec<ContextChunk>,
    pub total_chars: usize,
}

impl Context {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Prompt-ready form: one `(Source: tag)` block per chunk, separated by `---` lines.
    pub fn render(&self) -> String {
        self.chunks
            .iter()
            .map(|c| format!("(Source: {})\n{}", c.chunk.source, c.chunk.text))
            .collect::<Vec<_>>()
            .join("\n---\n")
    }

    /// Number of chunks taken from each source tag.
    pub fn source_distribution(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for c in &self.chunks {
            *counts.entry(c.chunk.source.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Retrieves context for a single query.
pub async fn retrieve(
    query: &str,
    index: &VectorIndex,
    embedder: &Embedder,
    settings: &RetrievalSettings,
) -> Result<Context, PipelineError> {
    retrieve_many(&[query], &[], index, embedder, settings).await
}

/// Runs every query, keeps each chunk's best similarity, then assembles one context.
///
/// `sources`, when non-empty, restricts matches to chunks whose source tag contains one of
/// the given tags (case-insensitive).
pub async fn retrieve_many(
    queries: &[&str],
    sources: &[String],
    index: &VectorIndex,
    embedder: &Embedder,
    settings: &RetrievalSettings,
) -> Result<Context, PipelineError> {
    settings.validate()?;
    if queries.is_empty() || index.is_empty() {
        return Ok(Context::default());
    }

    let sources: Vec<String> = sources.iter().map(|s| s.to_lowercase()).collect();
    let vectors = embedder.embed_batch(queries).await?;

    let mut merged: Vec<(Chunk, f32)> = Vec::new();
    for vector in &vectors {
        let matches = index
            .query(vector, index.len())?
            .into_iter()
            .filter(|(chunk, _)| source_allowed(&chunk.source, &sources))
            .take(settings.k);

        for (chunk, similarity) in matches {
            match merged
                .iter_mut()
                .find(|(seen, _)| seen.source == chunk.source && seen.sequence == chunk.sequence)
            {
                Some(existing) => existing.1 = existing.1.max(similarity),
                None => merged.push((chunk, similarity)),
            }
        }
    }

    merged.retain(|(_, similarity)| *similarity >= settings.threshold);
    merged.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut kept: Vec<(Chunk, f32)> = Vec::with_capacity(merged.len());
    for (chunk, similarity) in merged {
        if kept
            .iter()
            .any(|(other, _)| is_near_duplicate(&chunk, other, settings.dedup_overlap_ratio))
        {
            continue;
        }
        kept.push((chunk, similarity));
    }

    let context = assemble(kept, settings.context_budget);
    debug!(
        "Retrieved {} chunks ({} chars) for {} queries",
        context.chunks.len(),
        context.total_chars,
        queries.len()
    );
    Ok(context)
}

fn source_allowed(source: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let source = source.to_lowercase();
    allowed.iter().any(|tag| source.contains(tag.as_str()))
}

/// Identical text, or the same source with spans overlapping by more than `ratio`
/// of the shorter span.
fn is_near_duplicate(a: &Chunk, b: &Chunk, ratio: f32) -> bool {
    if a.text == b.text {
        return true;
    }
    let shared = a.shared_chars(b);
    if shared == 0 {
        return false;
    }
    let shorter = a.length.min(b.length).max(1);
    shared as f32 / shorter as f32 > ratio
}

/// Appends chunks in order until the budget is reached. The chunk that would overflow is
/// cut to the remaining space, and assembly stops there.
fn assemble(ranked: Vec<(Chunk, f32)>, budget: usize) -> Context {
    let mut context = Context::default();

    for (mut chunk, similarity) in ranked {
        let remaining = budget - context.total_chars;
        if remaining == 0 {
            break;
        }
        if chunk.length <= remaining {
            context.total_chars += chunk.length;
            context.chunks.push(ContextChunk {
                chunk,
                similarity,
                truncated: false,
            });
            continue;
        }

        chunk.text = chunk.text.chars().take(remaining).collect();
        chunk.length = remaining;
        context.total_chars += remaining;
        context.chunks.push(ContextChunk {
            chunk,
            similarity,
            truncated: true,
        });
        break;
    }

    context
}
