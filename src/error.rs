use thiserror::Error;

use crate::quiz::FlowState;

/// Domain errors surfaced by the quiz pipeline and the access gate
#[derive(Debug, Error)]
pub enum QuizError {
    #[error("payment_provider must be 'stripe' or 'bmac' (got '{0}')")]
    InvalidPaymentProvider(String),

    #[error("{0} is not configured. Run 'smartquiz auth --service {1}'.")]
    MissingCredential(&'static str, &'static str),

    #[error("Only PDF uploads are supported (got '{0}')")]
    UnsupportedUpload(String),

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    InvalidChunking { size: usize, overlap: usize },

    #[error("No tokenizer available for model '{0}'")]
    UnknownTokenizer(String),

    #[error("'{0}' is not one of the generated questions")]
    UnknownQuestion(String),

    #[error("Invalid selection '{0}': expected question numbers between 1 and {1}")]
    InvalidSelection(String, usize),

    #[error("Cannot {action} while the session is {state:?}")]
    InvalidState { action: &'static str, state: FlowState },
}
