use anyhow::{Context, Result};
use tracing::debug;

use super::index::VectorIndex;
use crate::llm::prompts::answer_system_prompt;
use crate::llm::{ChatModel, Embedder};
use crate::parser::ChunkSet;

/// A selected question and its generated answer
#[derive(Debug, Clone, PartialEq)]
pub struct AnsweredQuestion {
    pub question: String,
    pub answer: String,
}

/// Retrieval-augmented answering over the small chunk set
///
/// All retrieved chunks are stuffed into a single prompt. Nothing guards
/// against the combined context exceeding the model's input limit.
pub struct AnswerRetriever {
    index: VectorIndex,
    k: usize,
}

impl AnswerRetriever {
    /// Embed and index the answer chunks
    pub async fn build(chunks: &ChunkSet, embedder: &dyn Embedder, k: usize) -> Result<Self> {
        let index = VectorIndex::build(chunks, embedder)
            .await
            .context("Failed to build answer index")?;
        Ok(Self { index, k })
    }

    /// Answer one question using only the most relevant chunks as context
    pub async fn answer(
        &self,
        question: &str,
        llm: &dyn ChatModel,
        embedder: &dyn Embedder,
    ) -> Result<String> {
        let query = embedder
            .embed_query(question)
            .await
            .context("Failed to embed question")?;

        let hits = self.index.search(&query, self.k);
        debug!(
            question,
            retrieved = hits.len(),
            best_score = hits.first().map(|h| h.score).unwrap_or_default(),
            "Retrieved context"
        );

        let passages: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
        let system = answer_system_prompt(&passages);

        llm.complete(Some(&system), question)
            .await
            .with_context(|| format!("Failed to answer question: {}", question))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{MockChat, MockEmbedder};
    use crate::parser::Chunk;

    fn chunk_set(texts: &[&str]) -> ChunkSet {
        ChunkSet {
            chunk_size: 1000,
            chunk_overlap: 100,
            chunks: texts
                .iter()
                .enumerate()
                .map(|(index, text)| Chunk {
                    index,
                    text: text.to_string(),
                    token_count: 1,
                })
                .collect(),
        }
    }

    #[tokio::test]
    async fn test_answer_stuffs_top_k_chunks() {
        let (embedder, _) = MockEmbedder::new();
        let (llm, calls) = MockChat::new(|_, _| Ok("Water moves across membranes.".into()));
        let chunks = chunk_set(&["osmosis osmosis", "kkkk", "osmosis and diffusion", "qqqq"]);

        let retriever = AnswerRetriever::build(&chunks, &embedder, 2).await.unwrap();
        let answer = retriever.answer("osmosis", &llm, &embedder).await.unwrap();

        assert_eq!(answer, "Water moves across membranes.");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].prompt, "osmosis");
        let system = calls[0].system.as_deref().unwrap();
        assert!(system.contains("osmosis osmosis"));
        assert!(system.contains("osmosis and diffusion"));
        assert!(!system.contains("kkkk"));
        assert!(!system.contains("qqqq"));
    }

    #[tokio::test]
    async fn test_answer_failure_is_reported() {
        let (embedder, _) = MockEmbedder::new();
        let (llm, _) = MockChat::new(|_, _| anyhow::bail!("service unavailable"));
        let retriever = AnswerRetriever::build(&chunk_set(&["text"]), &embedder, 4)
            .await
            .unwrap();

        let err = retriever.answer("Q1?", &llm, &embedder).await.unwrap_err();
        assert!(err.to_string().contains("Q1?"));
    }
}
