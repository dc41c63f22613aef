use tiktoken_rs::CoreBPE;

use crate::error::QuizError;

/// A bounded-size fragment of the source text
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position in the originating chunk set
    pub index: usize,
    pub text: String,
    pub token_count: usize,
}

/// Ordered chunks produced by one chunking pass
#[derive(Debug, Clone, Default)]
pub struct ChunkSet {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunks: Vec<Chunk>,
}

impl ChunkSet {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn texts(&self) -> Vec<String> {
        self.chunks.iter().map(|c| c.text.clone()).collect()
    }
}

/// Splits text into overlapping windows measured in model tokens
pub struct TokenChunker {
    bpe: CoreBPE,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl TokenChunker {
    /// Create a chunker using the tokenizer of `model`
    pub fn new(model: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Self, QuizError> {
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(QuizError::InvalidChunking {
                size: chunk_size,
                overlap: chunk_overlap,
            });
        }

        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|_| QuizError::UnknownTokenizer(model.to_string()))?;

        Ok(Self {
            bpe,
            chunk_size,
            chunk_overlap,
        })
    }

    /// Number of tokens `text` encodes to
    #[cfg(test)]
    pub fn count_tokens(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }

    /// Split text into windows of `chunk_size` tokens sharing `chunk_overlap` tokens
    ///
    /// The final window may be shorter. Windows that cut a multi-byte
    /// character decode with U+FFFD in its place.
    pub fn split(&self, text: &str) -> ChunkSet {
        let tokens = self.bpe.encode_ordinary(text);
        let stride = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < tokens.len() {
            let end = (start + self.chunk_size).min(tokens.len());
            let window = &tokens[start..end];
            let bytes: Vec<u8> = self
                .bpe
                ._decode_native_and_split(window.to_vec())
                .flatten()
                .collect();

            chunks.push(Chunk {
                index: chunks.len(),
                text: String::from_utf8_lossy(&bytes).into_owned(),
                token_count: window.len(),
            });

            if end == tokens.len() {
                break;
            }
            start += stride;
        }

        ChunkSet {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            chunks,
        }
    }
}
