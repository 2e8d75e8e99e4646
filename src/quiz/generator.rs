use std::collections::HashMap;

use futures::{
    StreamExt, TryStreamExt,
    future::BoxFuture,
    stream,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{AnswerOptions, GenerateError, Question, QuestionGenerator, QuestionSet, Section};
use crate::{
    config::QuizSettings,
    llm::{ChatMessage, LlmClient, LlmRequest, MessageRole},
};

const ANSWER_KEYS: [&str; 4] = ["A", "B", "C", "D"];

/// Splits notes into sections and asks the configured model for a batch of
/// multiple-choice questions per section.
#[derive(Clone)]
pub struct LlmQuestionGenerator {
    client: LlmClient,
    settings: QuizSettings,
}

impl LlmQuestionGenerator {
    pub fn new(client: LlmClient, settings: QuizSettings) -> Self {
        Self { client, settings }
    }

    async fn generate_quiz(&self, text: &str) -> Result<QuestionSet, GenerateError> {
        let chunks = split_sections(
            text,
            self.settings.section_chars,
            self.settings.max_sections,
        );
        let total = chunks.len();
        let prompt = self.settings.render_prompt();

        info!(sections = total, model = %self.settings.model, "requesting quiz sections");

        let pending: Vec<_> = chunks
            .iter()
            .enumerate()
            .map(|(idx, chunk)| self.generate_section(&prompt, idx, total, chunk))
            .collect();

        let drafts: Vec<Option<Section>> = stream::iter(pending)
            .buffered(self.settings.section_concurrency.max(1))
            .try_collect()
            .await?;

        let sections: Vec<Section> = drafts
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(idx, section)| Section {
                section_number: idx + 1,
                ..section
            })
            .collect();

        if sections.is_empty() {
            return Err(GenerateError::EmptyQuiz);
        }

        Ok(QuestionSet::new(sections))
    }

    /// `Ok(None)` means the model answered but nothing usable came back; the
    /// section is skipped instead of failing the whole quiz.
    async fn generate_section(
        &self,
        prompt: &str,
        idx: usize,
        total: usize,
        chunk: &str,
    ) -> Result<Option<Section>, GenerateError> {
        let request = LlmRequest::new(
            self.settings.model.clone(),
            vec![
                ChatMessage::new(MessageRole::System, prompt),
                ChatMessage::new(
                    MessageRole::User,
                    format!("Notes (part {} of {}):\n\n{}", idx + 1, total, chunk),
                ),
            ],
        );

        let response = self.client.execute(request).await?;
        info!(
            section = idx + 1,
            provider = %response.provider,
            model = %response.model,
            tokens = response.token_usage.total_tokens,
            "quiz section generated"
        );

        match parse_section(&response.text, idx + 1) {
            Ok(section) if !section.questions.is_empty() => Ok(Some(section)),
            Ok(_) => {
                warn!(section = idx + 1, "model returned no usable questions");
                Ok(None)
            }
            Err(err) => {
                warn!(section = idx + 1, %err, "discarding unparseable section");
                Ok(None)
            }
        }
    }
}

impl QuestionGenerator for LlmQuestionGenerator {
    fn generate<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<QuestionSet, GenerateError>> {
        Box::pin(self.generate_quiz(text))
    }
}

/// Greedily packs lines into chunks of roughly `budget` characters, growing the
/// budget when the text would otherwise need more than `max_sections` chunks.
fn split_sections(text: &str, budget: usize, max_sections: usize) -> Vec<String> {
    let max_sections = max_sections.max(1);
    let total_chars = text.chars().count();
    let budget = budget.max(1).max(total_chars.div_ceil(max_sections));

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    let pieces = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .flat_map(|line| split_long_line(line, budget));

    for piece in pieces {
        let piece_chars = piece.chars().count();
        if current_chars > 0 && current_chars + 1 + piece_chars > budget {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push('\n');
            current_chars += 1;
        }
        current.push_str(piece);
        current_chars += piece_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    while chunks.len() > max_sections {
        if let Some(tail) = chunks.pop() {
            if let Some(last) = chunks.last_mut() {
                last.push('\n');
                last.push_str(&tail);
            }
        }
    }

    chunks
}

fn split_long_line(line: &str, budget: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = line;
    while rest.chars().count() > budget {
        let cut = rest
            .char_indices()
            .nth(budget)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        // Prefer breaking at the last space inside the window.
        let cut = rest[..cut]
            .rfind(char::is_whitespace)
            .filter(|idx| *idx > 0)
            .unwrap_or(cut);
        parts.push(rest[..cut].trim_end());
        rest = rest[cut..].trim_start();
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

#[derive(Debug, Deserialize)]
struct SectionPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    questions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct QuestionPayload {
    question: String,
    options: HashMap<String, Value>,
    correct_answer: String,
    #[serde(default)]
    explanation: Option<String>,
}

fn parse_section(text: &str, section_number: usize) -> Result<Section, GenerateError> {
    let object = extract_object_from_response(text)?;
    let payload: SectionPayload = serde_json::from_value(Value::Object(object))
        .map_err(|_| GenerateError::MalformedResponse)?;

    let total = payload.questions.len();
    let questions: Vec<Question> = payload
        .questions
        .into_iter()
        .filter_map(|value| serde_json::from_value::<QuestionPayload>(value).ok())
        .filter_map(QuestionPayload::into_question)
        .collect();

    if questions.len() < total {
        warn!(
            section = section_number,
            dropped = total - questions.len(),
            "discarded malformed questions"
        );
    }

    let title = payload
        .title
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| format!("Section {section_number}"));

    Ok(Section {
        section_number,
        title,
        questions,
    })
}

impl QuestionPayload {
    fn into_question(self) -> Option<Question> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return None;
        }

        let options: HashMap<String, String> = self
            .options
            .into_iter()
            .map(|(key, value)| (key.trim().to_ascii_uppercase(), value_to_string(&value)))
            .filter(|(_, value)| !value.is_empty())
            .collect();
        let option = |key: &str| options.get(key).cloned();

        let correct_answer = normalize_answer(&self.correct_answer)?;

        Some(Question {
            question,
            options: AnswerOptions {
                a: option("A")?,
                b: option("B")?,
                c: option("C")?,
                d: option("D")?,
            },
            correct_answer,
            explanation: self
                .explanation
                .map(|text| text.trim().to_string())
                .unwrap_or_default(),
        })
    }
}

/// Accepts `"b"`, `"B)"`, `"B. Mitochondria"` and similar; returns `None` for
/// anything that does not start with an answer letter.
fn normalize_answer(raw: &str) -> Option<String> {
    let mut chars = raw.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase().to_string();
    let standalone = chars.next().is_none_or(|c| !c.is_alphanumeric());
    (standalone && ANSWER_KEYS.contains(&letter.as_str())).then_some(letter)
}

fn extract_object_from_response(text: &str) -> Result<Map<String, Value>, GenerateError> {
    let trimmed = text.trim();
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
        return Ok(map);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            let candidate = &trimmed[start..=end];
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
                return Ok(map);
            }
        }
    }

    Err(GenerateError::MalformedResponse)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}
