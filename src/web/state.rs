use std::sync::Arc;

use crate::{
    config::AppConfig,
    extract::{DocumentExtractor, TextExtractor},
    llm::LlmClient,
    quiz::{LlmQuestionGenerator, QuestionGenerator},
};

/// Shared, read-only request context: the startup configuration and the two
/// collaborators an upload is handed to.
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    extractor: Arc<dyn TextExtractor>,
    generator: Arc<dyn QuestionGenerator>,
}

impl AppState {
    /// Production wiring: document extractor plus the LLM-backed generator,
    /// with provider credentials read from the environment.
    pub fn new(config: AppConfig) -> Self {
        let generator = LlmQuestionGenerator::new(LlmClient::from_env(), config.quiz.clone());
        Self::with_collaborators(config, Arc::new(DocumentExtractor), Arc::new(generator))
    }

    pub fn with_collaborators(
        config: AppConfig,
        extractor: Arc<dyn TextExtractor>,
        generator: Arc<dyn QuestionGenerator>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            extractor,
            generator,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn extractor(&self) -> Arc<dyn TextExtractor> {
        self.extractor.clone()
    }

    pub fn generator(&self) -> Arc<dyn QuestionGenerator> {
        self.generator.clone()
    }
}
