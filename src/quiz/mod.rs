mod generator;

pub use generator::LlmQuestionGenerator;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// Produces a quiz from plain text.
pub trait QuestionGenerator: Send + Sync {
    fn generate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<QuestionSet, GenerateError>>;
}

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The generator cannot run as deployed (missing key, bad model name).
    #[error("{0}")]
    Configuration(String),
    #[error(transparent)]
    Llm(LlmError),
    #[error("model output is not a parseable JSON object")]
    MalformedResponse,
    #[error("model output contained no usable questions")]
    EmptyQuiz,
}

impl From<LlmError> for GenerateError {
    fn from(err: LlmError) -> Self {
        if err.is_configuration() {
            GenerateError::Configuration(err.to_string())
        } else {
            GenerateError::Llm(err)
        }
    }
}

/// Quiz returned to the client, grouped into sections in document order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub sections: Vec<Section>,
    pub total_sections: usize,
}

impl QuestionSet {
    pub fn new(sections: Vec<Section>) -> Self {
        Self {
            total_sections: sections.len(),
            sections,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.questions.len())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub section_number: usize,
    pub title: String,
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: AnswerOptions,
    /// One of `A`, `B`, `C`, `D`.
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerOptions {
    #[serde(rename = "A")]
    pub a: String,
    #[serde(rename = "B")]
    pub b: String,
    #[serde(rename = "C")]
    pub c: String,
    #[serde(rename = "D")]
    pub d: String,
}
