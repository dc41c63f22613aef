use anyhow::Result;
use tracing::info;

use crate::llm::Embedder;
use crate::parser::{Chunk, ChunkSet};

/// Cosine similarity between two vectors; 0.0 when either is all zeros or lengths differ
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let magnitude_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot_product / (magnitude_a * magnitude_b)
}

/// A retrieved chunk and its similarity to the query
#[derive(Debug, Clone)]
pub struct ScoredChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

/// In-memory nearest-neighbour index over chunk embeddings
pub struct VectorIndex {
    chunks: Vec<Chunk>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Embed every chunk and index the vectors
    pub async fn build(chunks: &ChunkSet, embedder: &dyn Embedder) -> Result<Self> {
        let embeddings = if chunks.is_empty() {
            Vec::new()
        } else {
            embedder.embed_documents(&chunks.texts()).await?
        };

        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "Embedder returned {} vectors for {} chunks",
                embeddings.len(),
                chunks.len()
            );
        }

        info!(chunks = chunks.len(), "Built answer index");

        Ok(Self {
            chunks: chunks.chunks.clone(),
            embeddings,
        })
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Return the `k` chunks most similar to `query`, best first
    ///
    /// Equal scores keep chunk order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk<'_>> {
        let mut scored: Vec<ScoredChunk<'_>> = self
            .chunks
            .iter()
            .zip(&self.embeddings)
            .map(|(chunk, embedding)| ScoredChunk {
                chunk,
                score: cosine_similarity(query, embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        scored
    }
}
