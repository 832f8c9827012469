//! DeepSeek API client for comment generation
//!
//! OpenAI-style chat completions over a long-lived reqwest::Client.
//! Rate limiting, server errors and transport failures are retried with
//! exponential backoff.

use crate::config::DeepSeekConfig;
use crate::error::RelayError;
use crate::generation::{CommentBackend, CommentStyle};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SHORT_PROMPT: &str = r#"You are a sarcastic commentator reviewing forwarded messages.

Rules:
1. Work from the facts in the message (text, context, figures)
2. Focus on logical gaps, exaggerations and contradictions
3. Use irony, hyperbole and understatement aimed at the content
4. Keep the comment short (under 200 characters)
5. Light jabs at the author are fine; avoid outright rudeness and personal attacks

Write a sarcastic comment on the following message:"#;

const DETAILED_PROMPT: &str = r#"Analyze the context made of several forwarded messages and write a detailed sarcastic comment (3-5 sentences).

Focus on:
1. Logical inconsistencies between the messages
2. Exaggerations and contradictions
3. Picking apart the facts, with a measured assessment of the author
4. Irony, hyperbole and sarcasm
5. A structured answer that walks through the key points

Avoid outright rudeness, extreme personal attacks, one-word answers and excessive aggression.
Treat all messages in the context as a single whole.

Analyze the following context:"#;

/// Reusable DeepSeek client (connection-pooled)
pub struct DeepSeekClient {
    client: Client,
    config: DeepSeekConfig,
}

/// How a response status should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusClass {
    Success,
    Retryable,
    Fatal,
}

fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        StatusClass::Success
    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusClass::Retryable
    } else {
        StatusClass::Fatal
    }
}

/// Delay before retry number `attempt + 1`
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt))
}

/// Outcome of a single request
enum AttemptError {
    Retryable(RelayError),
    Fatal(RelayError),
}

impl DeepSeekClient {
    pub fn new(config: DeepSeekConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        if !config.has_api_key() {
            warn!("DEEPSEEK_API_KEY not configured");
        }

        Ok(Self { client, config })
    }

    /// Generate a comment, retrying transient failures
    pub async fn generate_comment(&self, text: &str, style: CommentStyle) -> Result<String> {
        if !self.config.has_api_key() {
            return Err(RelayError::ApiKeyMissing(
                "DEEPSEEK_API_KEY not configured".to_string(),
            ));
        }

        if text.trim().chars().count() < style.min_input_chars() {
            return Err(RelayError::InputRejected(format!(
                "text too short for a {:?} comment",
                style
            )));
        }

        let request = build_request(&self.config, text, style);
        let retries = self.config.retries;
        let mut attempt = 0;

        loop {
            debug!(attempt = attempt + 1, ?style, "Sending DeepSeek request");

            match self.send_once(&request).await {
                Ok(comment) => {
                    info!(
                        ?style,
                        "DeepSeek comment received: {}",
                        preview(&comment, 50)
                    );
                    return Ok(comment);
                }
                Err(AttemptError::Retryable(err)) if attempt < retries => {
                    let delay = backoff_delay(attempt);
                    warn!("DeepSeek attempt {} failed: {}. Retrying in {:?}", attempt + 1, err, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(AttemptError::Retryable(err)) | Err(AttemptError::Fatal(err)) => {
                    error!("DeepSeek request failed: {}", err);
                    return Err(err);
                }
            }
        }
    }

    async fn send_once(&self, request: &ChatRequest) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() || e.is_request() {
                    AttemptError::Retryable(RelayError::HttpError(e))
                } else {
                    AttemptError::Fatal(RelayError::HttpError(e))
                }
            })?;

        let status = response.status();
        match classify_status(status) {
            StatusClass::Success => {}
            StatusClass::Retryable => {
                return Err(AttemptError::Retryable(RelayError::LlmError(format!(
                    "DeepSeek returned {}",
                    status
                ))));
            }
            StatusClass::Fatal => {
                let body = response.text().await.unwrap_or_default();
                let message = if status == StatusCode::UNAUTHORIZED {
                    "DeepSeek rejected the API key".to_string()
                } else {
                    format!("Unexpected DeepSeek status {}: {}", status, body)
                };
                return Err(AttemptError::Fatal(RelayError::LlmError(message)));
            }
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Fatal(RelayError::LlmError(format!("DeepSeek parse error: {}", e))))?;

        extract_comment(parsed).map_err(AttemptError::Fatal)
    }
}

#[async_trait]
impl CommentBackend for DeepSeekClient {
    async fn generate(&self, text: &str, style: CommentStyle) -> Result<String> {
        self.generate_comment(text, style).await
    }

    fn name(&self) -> &'static str {
        "DeepSeek API"
    }
}

fn build_request(config: &DeepSeekConfig, text: &str, style: CommentStyle) -> ChatRequest {
    let prompt = match style {
        CommentStyle::Short => SHORT_PROMPT,
        CommentStyle::Detailed => DETAILED_PROMPT,
    };

    ChatRequest {
        model: config.model.clone(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: format!("{}\n\n{}", prompt, text),
        }],
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    }
}

fn extract_comment(response: ChatResponse) -> Result<String> {
    let comment = response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.trim().to_string())
        .ok_or_else(|| RelayError::LlmError("No choices in DeepSeek response".to_string()))?;

    if comment.is_empty() {
        return Err(RelayError::LlmError("Empty comment from DeepSeek".to_string()));
    }
    Ok(comment)
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut preview: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        preview.push_str("...");
    }
    preview
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}
