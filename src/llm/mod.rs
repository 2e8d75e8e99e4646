use std::{env, fmt};

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const OPENROUTER_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
const POE_ENDPOINT: &str = "https://api.poe.com/v1/chat/completions";

/// Enumerates the supported LLM backends behind the shared client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LlmProvider {
    OpenRouter,
    Poe,
}

impl LlmProvider {
    fn endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => OPENROUTER_ENDPOINT,
            LlmProvider::Poe => POE_ENDPOINT,
        }
    }

    fn key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Poe => "POE_API_KEY",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenRouter => write!(f, "openrouter"),
            LlmProvider::Poe => write!(f, "poe"),
        }
    }
}

/// Failures surfaced by [`LlmClient::execute`].
///
/// `MissingApiKey` and `InvalidModel` are deployment problems rather than
/// transient ones; callers use [`LlmError::is_configuration`] to tell them apart.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{var} is not configured but required for {provider} requests")]
    MissingApiKey {
        provider: LlmProvider,
        var: &'static str,
    },
    #[error("invalid model `{model}`: {reason}")]
    InvalidModel { model: String, reason: String },
    #[error("{provider} request failed: {source}")]
    Transport {
        provider: LlmProvider,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} call failed with status {status}: {body}")]
    Status {
        provider: LlmProvider,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected {provider} response payload: {detail}")]
    Payload {
        provider: LlmProvider,
        detail: String,
    },
}

impl LlmError {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LlmError::MissingApiKey { .. } | LlmError::InvalidModel { .. }
        )
    }
}

/// Defines the shape of a chat-style interaction with an LLM.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl LlmRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// Individual chat message, compatible with OpenAI compliant providers.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum MessageRole {
    System,
    User,
}

impl MessageRole {
    fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
        }
    }
}

/// Captures basic token usage metrics associated with a call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub response_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub text: String,
    pub token_usage: TokenUsage,
    pub provider: LlmProvider,
    pub model: String,
}

/// Credentials and attribution headers, read from the environment once.
#[derive(Clone, Default)]
pub struct LlmCredentials {
    pub openrouter_api_key: Option<String>,
    pub poe_api_key: Option<String>,
    pub openrouter_referer: Option<String>,
    pub openrouter_title: Option<String>,
}

impl LlmCredentials {
    pub fn from_env() -> Self {
        Self {
            openrouter_api_key: non_empty_var("OPENROUTER_API_KEY"),
            poe_api_key: non_empty_var("POE_API_KEY"),
            openrouter_referer: non_empty_var("OPENROUTER_HTTP_REFERER"),
            openrouter_title: non_empty_var("OPENROUTER_X_TITLE"),
        }
    }

    fn api_key(&self, provider: LlmProvider) -> Option<&str> {
        match provider {
            LlmProvider::OpenRouter => self.openrouter_api_key.as_deref(),
            LlmProvider::Poe => self.poe_api_key.as_deref(),
        }
    }
}

/// Main entry point for invoking providers.
#[derive(Clone)]
pub struct LlmClient {
    http: Client,
    credentials: LlmCredentials,
}

impl LlmClient {
    pub fn new(credentials: LlmCredentials) -> Self {
        Self {
            http: Client::new(),
            credentials,
        }
    }

    /// Build a client using environment variables. Missing keys are not an
    /// error here; they are reported when a request needs them.
    pub fn from_env() -> Self {
        Self::new(LlmCredentials::from_env())
    }

    /// Execute a request against the provider encoded in the model name.
    pub async fn execute(&self, request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let (provider, provider_model) = parse_model_provider(&request.model)?;
        let Some(api_key) = self.credentials.api_key(provider) else {
            return Err(LlmError::MissingApiKey {
                provider,
                var: provider.key_var(),
            });
        };

        let messages: Vec<_> = request
            .messages
            .iter()
            .map(|msg| {
                serde_json::json!({
                    "role": msg.role.as_str(),
                    "content": msg.text,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "model": provider_model,
            "messages": messages,
        });

        let mut req_builder = self
            .http
            .post(provider.endpoint())
            .bearer_auth(api_key)
            .json(&payload);

        if provider == LlmProvider::OpenRouter {
            if let Some(referer) = &self.credentials.openrouter_referer {
                req_builder = req_builder.header("HTTP-Referer", referer);
            }
            if let Some(title) = &self.credentials.openrouter_title {
                req_builder = req_builder.header("X-Title", title);
            }
        }

        let transport = |source| LlmError::Transport { provider, source };
        let response = req_builder.send().await.map_err(transport)?;
        let status = response.status();
        let response_text = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(LlmError::Status {
                provider,
                status,
                body: preview(&response_text),
            });
        }

        let body: serde_json::Value =
            serde_json::from_str(&response_text).map_err(|err| LlmError::Payload {
                provider,
                detail: format!("{err}; body: {}", preview(&response_text)),
            })?;

        let (text, usage) = extract_text_and_usage(&body).ok_or_else(|| LlmError::Payload {
            provider,
            detail: preview(&body.to_string()),
        })?;

        let mut token_usage = usage.unwrap_or_default();
        if token_usage.total_tokens == 0 {
            token_usage.total_tokens = token_usage.prompt_tokens + token_usage.response_tokens;
        }

        Ok(LlmResponse {
            text,
            token_usage,
            provider,
            model: provider_model.to_string(),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn preview(body: &str) -> String {
    const LIMIT: usize = 500;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Extract assistant text and optional usage metrics from a chat completions payload.
fn extract_text_and_usage(value: &serde_json::Value) -> Option<(String, Option<TokenUsage>)> {
    let chat = serde_json::from_value::<ChatCompletionPayload>(value.clone()).ok()?;
    let text = chat
        .choices
        .into_iter()
        .find_map(|choice| choice.message.content)?;
    Some((text, chat.usage.map(TokenUsage::from)))
}

fn parse_model_provider(model: &str) -> Result<(LlmProvider, &str), LlmError> {
    let invalid = |reason: &str| LlmError::InvalidModel {
        model: model.to_string(),
        reason: reason.to_string(),
    };

    let (provider, name) = model.split_once('/').ok_or_else(|| {
        invalid("model must be prefixed with provider, e.g. 'openrouter/openai/gpt-4o'")
    })?;

    if name.trim().is_empty() {
        return Err(invalid("model name is required after provider prefix"));
    }

    match provider {
        "openrouter" => Ok((LlmProvider::OpenRouter, name)),
        "poe" => Ok((LlmProvider::Poe, name)),
        other => Err(invalid(&format!("unsupported provider prefix: {other}"))),
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionPayload {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

impl From<UsagePayload> for TokenUsage {
    fn from(usage: UsagePayload) -> Self {
        Self {
            prompt_tokens: usage.prompt_tokens.unwrap_or_default(),
            response_tokens: usage.completion_tokens.unwrap_or_default(),
            total_tokens: usage.total_tokens.unwrap_or_default(),
        }
    }
}
