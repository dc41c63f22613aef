mod chunker;
mod pdf;

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

pub use chunker::{Chunk, ChunkSet, TokenChunker};
pub use pdf::extract_text;

use crate::config::PipelineConfig;
use crate::error::QuizError;

/// A single uploaded study document
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Accept an in-memory upload; only PDF files are allowed
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, QuizError> {
        let file_name = file_name.into();
        let extension = Path::new(&file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        if extension != "pdf" {
            return Err(QuizError::UnsupportedUpload(file_name));
        }

        Ok(Self { file_name, bytes })
    }

    /// Read an upload from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        // Check the type before touching the file
        Self::new(file_name.clone(), Vec::new())?;

        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read PDF file: {}", path.display()))?;

        Ok(Self { file_name, bytes })
    }
}

/// The two chunk sets derived from one uploaded document
#[derive(Debug, Clone, Default)]
pub struct PipelineDocuments {
    /// Large chunks feeding question generation
    pub question_chunks: ChunkSet,
    /// Small chunks feeding answer retrieval
    pub answer_chunks: ChunkSet,
}

impl PipelineDocuments {
    pub fn prepare(text: &str, config: &PipelineConfig) -> Result<Self> {
        let question_chunker = TokenChunker::new(
            &config.tokenizer_model,
            config.question_chunk_size,
            config.question_chunk_overlap,
        )?;
        let answer_chunker = TokenChunker::new(
            &config.tokenizer_model,
            config.answer_chunk_size,
            config.answer_chunk_overlap,
        )?;

        let documents = Self {
            question_chunks: question_chunker.split(text),
            answer_chunks: answer_chunker.split(text),
        };

        info!(
            question_chunks = documents.question_chunks.len(),
            answer_chunks = documents.answer_chunks.len(),
            "Split document"
        );

        Ok(documents)
    }
}
