//! In-memory model doubles for unit tests.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{ChatModel, Embedder};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system: Option<String>,
    pub prompt: String,
}

pub type CallLog = Arc<Mutex<Vec<RecordedCall>>>;

type Responder = Box<dyn Fn(usize, &RecordedCall) -> Result<String> + Send + Sync>;

/// Chat model that records every call and replies through a closure
pub struct MockChat {
    calls: CallLog,
    responder: Responder,
}

impl MockChat {
    pub fn new(
        responder: impl Fn(usize, &RecordedCall) -> Result<String> + Send + Sync + 'static,
    ) -> (Self, CallLog) {
        let calls = CallLog::default();
        let mock = Self {
            calls: calls.clone(),
            responder: Box::new(responder),
        };
        (mock, calls)
    }

    /// Replies `reply-<n>` for the n-th call
    pub fn numbered() -> (Self, CallLog) {
        Self::new(|n, _| Ok(format!("reply-{n}")))
    }
}

#[async_trait]
impl ChatModel for MockChat {
    async fn complete(&self, system: Option<&str>, prompt: &str) -> Result<String> {
        let call = RecordedCall {
            system: system.map(String::from),
            prompt: prompt.to_string(),
        };
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call.clone());
            calls.len() - 1
        };
        (self.responder)(n, &call)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Embeds text as lowercase letter frequencies so related words land close together
pub struct MockEmbedder {
    pub document_calls: Arc<Mutex<usize>>,
}

impl MockEmbedder {
    pub fn new() -> (Self, Arc<Mutex<usize>>) {
        let document_calls = Arc::new(Mutex::new(0));
        (
            Self {
                document_calls: document_calls.clone(),
            },
            document_calls,
        )
    }

    fn letters(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; 26];
        for c in text.chars().filter(|c| c.is_ascii_alphabetic()) {
            vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        *self.document_calls.lock().unwrap() += 1;
        Ok(texts.iter().map(|t| Self::letters(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::letters(text))
    }
}
