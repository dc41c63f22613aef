use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;
use tracing::{info, warn};
use uuid::Uuid;

use super::answers::{AnswerRetriever, AnsweredQuestion};
use super::questions::QuestionGenerator;
use crate::config::PipelineConfig;
use crate::error::QuizError;
use crate::llm::QuizModels;
use crate::parser::{self, PipelineDocuments, Upload};

static SELECTION_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[,\s]+").expect("valid selection separator regex"));

/// A session slot: either the `Empty` sentinel or a value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Slot<T> {
    #[default]
    Empty,
    Filled(T),
}

impl<T> Slot<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Slot::Empty => None,
            Slot::Filled(value) => Some(value),
        }
    }
}

/// Per-session values, mutated only by the flow controller
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub questions: Slot<String>,
    pub questions_list: Slot<Vec<String>>,
    pub questions_to_answer: Slot<Vec<String>>,
    pub submitted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    AwaitingUpload,
    GeneratingQuestions,
    AwaitingSelection,
    GeneratingAnswers,
}

/// Split a question block on newlines, keeping empty entries
pub fn split_questions(block: &str) -> Vec<String> {
    block.split('\n').map(String::from).collect()
}

/// Map 1-based question numbers separated by commas or whitespace onto the list
///
/// Repeated numbers select the question once.
pub fn parse_selection(input: &str, questions: &[String]) -> Result<Vec<String>, QuizError> {
    let mut selection: Vec<String> = Vec::new();

    for token in SELECTION_SEPARATOR.split(input.trim()).filter(|t| !t.is_empty()) {
        let question = token
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| questions.get(i))
            .ok_or_else(|| QuizError::InvalidSelection(token.to_string(), questions.len()))?;

        if !selection.contains(question) {
            selection.push(question.clone());
        }
    }

    Ok(selection)
}

/// Drives one interactive session: upload, generate questions once, answer selections
pub struct FlowController {
    id: Uuid,
    state: FlowState,
    session: SessionState,
    models: QuizModels,
    pipeline: PipelineConfig,
    documents: Option<PipelineDocuments>,
    retriever: Option<AnswerRetriever>,
}

impl FlowController {
    pub fn new(models: QuizModels, pipeline: PipelineConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: FlowState::Idle,
            session: SessionState::default(),
            models,
            pipeline,
            documents: None,
            retriever: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn questions(&self) -> Option<&str> {
        self.session.questions.get().map(String::as_str)
    }

    pub fn questions_list(&self) -> &[String] {
        self.session
            .questions_list
            .get()
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Begin a session with every slot at its sentinel
    pub fn start(&mut self) {
        self.session = SessionState::default();
        self.documents = None;
        self.retriever = None;
        self.state = FlowState::AwaitingUpload;
        info!(session = %self.id, "Session started");
    }

    /// Extract an uploaded PDF and run it through the pipeline
    ///
    /// Returns whether questions were generated by this call.
    pub async fn upload(&mut self, upload: Upload) -> Result<bool> {
        self.ensure_accepts_upload()?;
        let text = parser::extract_text(&upload)?;
        info!(session = %self.id, file = %upload.file_name, "Document uploaded");
        self.accept_text(&text).await
    }

    /// Chunk document text and generate questions if none exist yet
    ///
    /// A later document replaces the answer context but never regenerates
    /// questions within the same session.
    pub async fn accept_text(&mut self, text: &str) -> Result<bool> {
        self.ensure_accepts_upload()?;

        let documents = PipelineDocuments::prepare(text, &self.pipeline)?;

        if self.session.questions.is_empty() && documents.question_chunks.is_empty() {
            warn!(session = %self.id, "Document has no extractable text, no questions generated");
            return Ok(false);
        }

        self.retriever = None;

        let generated = if self.session.questions.is_empty() {
            self.state = FlowState::GeneratingQuestions;
            let generator = QuestionGenerator::new(self.models.question_llm.as_ref());
            match generator.generate(&documents.question_chunks).await {
                Ok(questions) => {
                    self.session.questions = Slot::Filled(questions);
                    true
                }
                Err(e) => {
                    self.state = FlowState::AwaitingUpload;
                    return Err(e);
                }
            }
        } else {
            info!(session = %self.id, "Questions already generated for this session, skipping");
            false
        };

        self.documents = Some(documents);

        let list = split_questions(self.questions().unwrap_or_default());
        self.session.questions_list = Slot::Filled(list);
        self.state = FlowState::AwaitingSelection;

        Ok(generated)
    }

    /// Answer every selected question, in selection order
    pub async fn submit(&mut self, selection: Vec<String>) -> Result<Vec<AnsweredQuestion>> {
        if self.state != FlowState::AwaitingSelection {
            return Err(QuizError::InvalidState {
                action: "submit a selection",
                state: self.state,
            }
            .into());
        }

        if let Some(unknown) = selection
            .iter()
            .find(|q| !self.questions_list().contains(*q))
        {
            return Err(QuizError::UnknownQuestion(unknown.clone()).into());
        }

        self.session.questions_to_answer = Slot::Filled(selection.clone());
        self.session.submitted = true;

        if selection.is_empty() {
            info!(session = %self.id, "Empty selection submitted");
            return Ok(Vec::new());
        }

        self.state = FlowState::GeneratingAnswers;
        let result = self.answer_selection(&selection).await;
        self.state = FlowState::AwaitingSelection;

        if let Err(e) = &result {
            warn!(session = %self.id, error = %e, "Answer generation failed");
        }
        result
    }

    async fn answer_selection(&mut self, selection: &[String]) -> Result<Vec<AnsweredQuestion>> {
        let retriever = match self.retriever.take() {
            Some(retriever) => retriever,
            None => {
                let chunks = self
                    .documents
                    .as_ref()
                    .map(|d| &d.answer_chunks)
                    .ok_or(QuizError::InvalidState {
                        action: "answer questions",
                        state: self.state,
                    })?;
                AnswerRetriever::build(chunks, self.models.embedder.as_ref(), self.pipeline.retrieval_k)
                    .await?
            }
        };

        info!(session = %self.id, questions = selection.len(), "Generating answers");

        let mut answered = Vec::with_capacity(selection.len());
        let mut failure = None;
        for question in selection {
            match retriever
                .answer(question, self.models.answer_llm.as_ref(), self.models.embedder.as_ref())
                .await
            {
                Ok(answer) => answered.push(AnsweredQuestion {
                    question: question.clone(),
                    answer,
                }),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        self.retriever = Some(retriever);

        match failure {
            Some(e) => Err(e),
            None => Ok(answered),
        }
    }

    fn ensure_accepts_upload(&self) -> Result<(), QuizError> {
        match self.state {
            FlowState::AwaitingUpload | FlowState::AwaitingSelection => Ok(()),
            state => Err(QuizError::InvalidState {
                action: "upload a document",
                state,
            }),
        }
    }
}
