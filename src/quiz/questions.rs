use anyhow::{Context, Result};
use futures::stream::{self, TryStreamExt};
use tracing::{debug, info};

use crate::llm::ChatModel;
use crate::llm::prompts::{question_prompt, refine_prompt};
use crate::parser::ChunkSet;

/// Generates practice questions with the refine pattern
///
/// The first chunk produces an initial question set; every following chunk
/// is folded in by asking the model to refine the questions accumulated so
/// far. Each step depends on the previous one, so calls run strictly in
/// order.
pub struct QuestionGenerator<'a> {
    llm: &'a dyn ChatModel,
}

impl<'a> QuestionGenerator<'a> {
    pub fn new(llm: &'a dyn ChatModel) -> Self {
        Self { llm }
    }

    /// Produce one block of newline-delimited questions covering every chunk
    pub async fn generate(&self, chunks: &ChunkSet) -> Result<String> {
        let Some((first, rest)) = chunks.chunks.split_first() else {
            debug!("No chunks to generate questions from");
            return Ok(String::new());
        };

        info!(model = self.llm.name(), chunks = chunks.len(), "Generating questions");

        let llm = self.llm;
        let initial = llm
            .complete(None, &question_prompt(&first.text))
            .await
            .with_context(|| format!("Failed to generate questions from chunk {}", first.index))?;

        let questions = stream::iter(rest.iter().map(Ok::<_, anyhow::Error>))
            .try_fold(initial, move |questions, chunk| async move {
                debug!(chunk = chunk.index, "Refining questions");
                llm.complete(None, &refine_prompt(&questions, &chunk.text))
                    .await
                    .with_context(|| format!("Failed to refine questions with chunk {}", chunk.index))
            })
            .await?;

        info!(chars = questions.len(), "Question generation complete");
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockChat;
    use crate::parser::Chunk;

    fn chunk_set(texts: &[&str]) -> ChunkSet {
        ChunkSet {
            chunk_size: 10000,
            chunk_overlap: 200,
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
    async fn test_no_chunks_makes_no_calls() {
        let (llm, calls) = MockChat::numbered();
        let questions = QuestionGenerator::new(&llm)
            .generate(&ChunkSet::default())
            .await
            .unwrap();
        assert_eq!(questions, "");
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_chunk_uses_question_prompt() {
        let (llm, calls) = MockChat::numbered();
        let questions = QuestionGenerator::new(&llm)
            .generate(&chunk_set(&["Cells divide by mitosis."]))
            .await
            .unwrap();

        assert_eq!(questions, "reply-0");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.contains("QUESTIONS:"));
        assert!(calls[0].prompt.contains("Cells divide by mitosis."));
        assert!(calls[0].system.is_none());
    }

    #[tokio::test]
    async fn test_refine_folds_previous_questions_forward() {
        let (llm, calls) = MockChat::numbered();
        let questions = QuestionGenerator::new(&llm)
            .generate(&chunk_set(&["part one", "part two", "part three"]))
            .await
            .unwrap();

        assert_eq!(questions, "reply-2");
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[1].prompt.contains("Existing Questions:\nreply-0"));
        assert!(calls[1].prompt.contains("part two"));
        assert!(calls[2].prompt.contains("Existing Questions:\nreply-1"));
        assert!(calls[2].prompt.contains("part three"));
    }

    #[tokio::test]
    async fn test_step_failure_aborts_generation() {
        let (llm, calls) = MockChat::new(|n, _| {
            if n == 1 {
                anyhow::bail!("upstream timeout")
            }
            Ok(format!("reply-{n}"))
        });

        let err = QuestionGenerator::new(&llm)
            .generate(&chunk_set(&["a", "b", "c"]))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("chunk 1"));
        assert_eq!(calls.lock().unwrap().len(), 2);
    }
}
