use tracing::info;

use crate::config::ChunkingSettings;
use crate::errors::PipelineError;
use crate::ingest::{chunk, document::prepare_documents, Chunk, Document};

use super::embedder::{Embedder, EmbeddingError};

/// Exact-search vector store. Built once, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<Entry>,
    dimension: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    vector: Vec<f32>,
    norm: f32,
    chunk: Chunk,
}

impl VectorIndex {
    /// Builds the index from `(embedding, chunk)` pairs. Every embedding must share one dimension.
    pub fn build(items: Vec<(Vec<f32>, Chunk)>) -> Result<Self, EmbeddingError> {
        let mut index = VectorIndex {
            entries: Vec::with_capacity(items.len()),
            dimension: 0,
        };

        for (vector, chunk) in items {
            if vector.is_empty() {
                return Err(EmbeddingError::EmptyVector);
            }
            if index.entries.is_empty() {
                index.dimension = vector.len();
            } else if vector.len() != index.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: index.dimension,
                    got: vector.len(),
                });
            }
            let norm = l2_norm(&vector);
            index.entries.push(Entry {
                vector,
                norm,
                chunk,
            });
        }

        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Zero for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top-`k` chunks by descending cosine similarity. Equal scores keep insertion order.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(Chunk, f32)>, EmbeddingError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }

        let query_norm = l2_norm(vector);
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, cosine(vector, query_norm, &entry.vector, entry.norm)))
            .collect();

        // sort_by is stable, so ties stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| (self.entries[i].chunk.clone(), score))
            .collect())
    }
}

fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine(a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (dot / (a_norm * b_norm)).clamp(-1.0, 1.0)
}

/// Cleans, chunks and embeds `documents`, then builds the index.
pub async fn build_index(
    documents: &[Document],
    embedder: &Embedder,
    chunking: &ChunkingSettings,
) -> Result<VectorIndex, PipelineError> {
    chunking.validate()?;
    let documents = prepare_documents(documents)?;

    let mut chunks = Vec::new();
    for document in &documents {
        chunks.extend(chunk(&document.source, &document.text, chunking)?);
    }

    let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
    let vectors = embedder.embed_batch(&texts).await?;
    let index = VectorIndex::build(vectors.into_iter().zip(chunks).collect())?;

    info!(
        "Built index: {} documents, {} chunks, dimension {}",
        documents.len(),
        index.len(),
        index.dimension()
    );
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_at(source: &str, sequence: usize, text: &str) -> Chunk {
        Chunk {
            source: source.to_string(),
            sequence,
            offset: sequence * 10,
            length: text.chars().count(),
            text: text.to_string(),
        }
    }

    fn sample_index() -> VectorIndex {
        VectorIndex::build(vec![
            (vec![1.0, 0.0, 0.0], chunk_at("a", 0, "rust")),
            (vec![0.0, 1.0, 0.0], chunk_at("a", 1, "python")),
            (vec![0.7, 0.7, 0.0], chunk_at("b", 0, "both")),
        ])
        .unwrap()
    }

    #[test]
    fn test_identical_vector_ranks_first_with_similarity_one() {
        let index = sample_index();
        let results = index.query(&[0.0, 1.0, 0.0], 3).unwrap();
        assert_eq!(results[0].0.text, "python");
        assert!((results[0].1 - 1.0).abs() < 1e-6);
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_k_limits_results() {
        let index = sample_index();
        assert_eq!(index.query(&[1.0, 0.0, 0.0], 2).unwrap().len(), 2);
        assert!(index.query(&[1.0, 0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let index = VectorIndex::build(vec![
            (vec![1.0, 0.0], chunk_at("a", 0, "first")),
            (vec![2.0, 0.0], chunk_at("a", 1, "second")),
            (vec![3.0, 0.0], chunk_at("a", 2, "third")),
        ])
        .unwrap();
        let texts: Vec<String> = index
            .query(&[1.0, 0.0], 3)
            .unwrap()
            .into_iter()
            .map(|(c, _)| c.text)
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_zero_norm_scores_zero() {
        let index = VectorIndex::build(vec![(vec![0.0, 0.0], chunk_at("a", 0, "blank"))]).unwrap();
        let results = index.query(&[1.0, 0.0], 1).unwrap();
        assert_eq!(results[0].1, 0.0);
    }

    #[test]
    fn test_dimension_mismatch_rejected() {
        let err = VectorIndex::build(vec![
            (vec![1.0, 0.0], chunk_at("a", 0, "x")),
            (vec![1.0], chunk_at("a", 1, "y")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        ));
        assert!(sample_index().query(&[1.0], 1).is_err());
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = VectorIndex::default();
        assert!(index.is_empty());
        assert!(index.query(&[1.0], 5).unwrap().is_empty());
    }
}
