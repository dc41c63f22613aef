#[cfg(test)]
pub(crate) mod mock;
mod openai;
pub mod prompts;

use anyhow::Result;
use async_trait::async_trait;

pub use openai::OpenAIProvider;

use crate::config::Config;
use crate::error::QuizError;

/// A chat-completion model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Send one prompt, optionally preceded by a system message, and return the reply text
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String>;

    /// Get the provider name
    fn name(&self) -> &'static str;
}

/// A text embedding model
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of passages, one vector per input in input order
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a search query
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}

/// The model clients one quiz session needs
pub struct QuizModels {
    /// Drafts and refines practice questions
    pub question_llm: Box<dyn ChatModel>,
    /// Answers questions from retrieved context
    pub answer_llm: Box<dyn ChatModel>,
    pub embedder: Box<dyn Embedder>,
}

impl QuizModels {
    /// Build OpenAI-backed clients from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let openai = &config.openai;
        if openai.api_key.is_empty() {
            return Err(QuizError::MissingCredential("OpenAI API key", "openai").into());
        }

        let base_url = openai.base_url.as_deref();
        let pipeline = &config.pipeline;

        Ok(Self {
            question_llm: Box::new(OpenAIProvider::new(
                &openai.api_key,
                &openai.chat_model,
                base_url,
                pipeline.question_temperature,
            )?),
            answer_llm: Box::new(OpenAIProvider::new(
                &openai.api_key,
                &openai.chat_model,
                base_url,
                pipeline.answer_temperature,
            )?),
            embedder: Box::new(
                OpenAIProvider::new(
                    &openai.api_key,
                    &openai.chat_model,
                    base_url,
                    pipeline.answer_temperature,
                )?
                .with_embedding_model(&openai.embedding_model),
            ),
        })
    }
}
