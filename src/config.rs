use std::{env, path::PathBuf, str::FromStr};

use anyhow::{Context, Result};

/// Hard cap on the request body, multipart framing included.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx"];
/// Minimum trimmed length (in characters) of extracted text worth quizzing on.
pub const MIN_TEXT_CHARS: usize = 100;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_INDEX_PATH: &str = "index.html";
const DEFAULT_QUIZ_MODEL: &str = "openrouter/openai/gpt-4o-mini";
const DEFAULT_QUESTIONS_PER_SECTION: usize = 10;
const DEFAULT_SECTION_CHARS: usize = 4000;
const DEFAULT_MAX_SECTIONS: usize = 10;
const DEFAULT_SECTION_CONCURRENCY: usize = 3;

const DEFAULT_QUIZ_PROMPT: &str = r#"You write multiple-choice study questions from a student's notes. Read the notes supplied by the user and write exactly {{COUNT}} questions that test understanding of the key concepts, definitions, causes and consequences they contain. Only use facts stated in the notes.
Each question must have exactly four options labelled A, B, C and D, exactly one of which is correct. Distractors should be plausible. Keep the explanation to one or two sentences and refer back to the notes.
## Output Format
Return a single JSON object and nothing else:
{
  "title": "Short title describing the topic of these notes",
  "questions": [
    {
      "question": "Question text",
      "options": { "A": "...", "B": "...", "C": "...", "D": "..." },
      "correct_answer": "B",
      "explanation": "Why B is correct."
    }
  ]
}"#;

/// Process-wide settings, read once at startup and shared immutably.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub upload_dir: PathBuf,
    pub index_path: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_extensions: &'static [&'static str],
    pub min_text_chars: usize,
    pub quiz: QuizSettings,
}

/// Knobs for the LLM-backed question generator.
#[derive(Clone, Debug)]
pub struct QuizSettings {
    pub model: String,
    pub prompt: String,
    pub questions_per_section: usize,
    pub section_chars: usize,
    pub max_sections: usize,
    pub section_concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            port: parse_var("PORT", DEFAULT_PORT)?,
            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR)),
            index_path: env::var("INDEX_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_INDEX_PATH)),
            quiz: QuizSettings::from_env()?,
            ..Self::default()
        })
    }

    /// Returns whether the filename's last extension is accepted, ignoring case.
    pub fn is_allowed_file(&self, filename: &str) -> bool {
        file_extension(filename)
            .map(|ext| self.allowed_extensions.contains(&ext.as_str()))
            .unwrap_or(false)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            allowed_extensions: ALLOWED_EXTENSIONS,
            min_text_chars: MIN_TEXT_CHARS,
            quiz: QuizSettings::default(),
        }
    }
}

impl QuizSettings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            model: env::var("QUIZ_MODEL").unwrap_or(defaults.model),
            prompt: defaults.prompt,
            questions_per_section: parse_var(
                "QUIZ_QUESTIONS_PER_SECTION",
                DEFAULT_QUESTIONS_PER_SECTION,
            )?
            .max(1),
            section_chars: parse_var("QUIZ_SECTION_CHARS", DEFAULT_SECTION_CHARS)?.max(200),
            max_sections: parse_var("QUIZ_MAX_SECTIONS", DEFAULT_MAX_SECTIONS)?.max(1),
            section_concurrency: defaults.section_concurrency,
        })
    }

    /// System prompt with the per-section question count filled in.
    pub fn render_prompt(&self) -> String {
        self.prompt
            .replace("{{COUNT}}", &self.questions_per_section.to_string())
    }
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_QUIZ_MODEL.to_string(),
            prompt: DEFAULT_QUIZ_PROMPT.to_string(),
            questions_per_section: DEFAULT_QUESTIONS_PER_SECTION,
            section_chars: DEFAULT_SECTION_CHARS,
            max_sections: DEFAULT_MAX_SECTIONS,
            section_concurrency: DEFAULT_SECTION_CONCURRENCY,
        }
    }
}

/// Lowercased text after the last `.`, if there is one.
pub fn file_extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a valid number, got `{raw}`")),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_file_checks_last_extension_case_insensitively() {
        let config = AppConfig::default();
        assert!(config.is_allowed_file("notes.PDF"));
        assert!(config.is_allowed_file("lecture.final.docx"));
        assert!(config.is_allowed_file("old.Doc"));
        assert!(!config.is_allowed_file("notes.pdf.exe"));
        assert!(!config.is_allowed_file("notes"));
        assert!(!config.is_allowed_file("notes.txt"));
    }

    #[test]
    fn extension_requires_a_dot() {
        assert_eq!(file_extension("pdf"), None);
        assert_eq!(file_extension("a.PdF"), Some("pdf".to_string()));
        assert_eq!(file_extension("trailing."), Some(String::new()));
    }

    #[test]
    fn prompt_contains_question_count() {
        let settings = QuizSettings {
            questions_per_section: 7,
            ..QuizSettings::default()
        };
        let prompt = settings.render_prompt();
        assert!(prompt.contains("exactly 7 questions"));
        assert!(!prompt.contains("{{COUNT}}"));
    }
}
