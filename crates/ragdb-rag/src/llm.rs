//! OpenAI-compatible chat client with Moonshot defaults.
//!
//! Failures are typed so callers can retry rate limits and transient
//! network errors with backoff while surfacing everything else at once.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use ragdb_core::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("model call failed: {0}")]
    Fatal(String),
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::RateLimited(_) | LlmError::Transient(_))
    }
}

/// The generation model seam. Streamed fragments arrive in order over
/// the channel and the stream ends when the sender is dropped; nothing
/// already emitted is ever retracted.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;

    async fn complete_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<mpsc::Receiver<String>, LlmError>;
}

/// Retry wrapper: rate-limit and transient errors back off exponentially
/// up to `max_retries` attempts; fatal errors return immediately.
pub async fn complete_with_retry(
    model: &dyn ChatModel,
    system: &str,
    user: &str,
    max_retries: usize,
) -> Result<String, LlmError> {
    let mut attempt = 0usize;
    loop {
        match model.complete(system, user).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = Duration::from_millis(500 * (1 << attempt.min(4)));
                warn!(attempt, error = %e, "Retrying model call after backoff");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: usize,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct MoonshotClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
    api_key: String,
}

impl MoonshotClient {
    /// Reads the API key from the environment variable named in config.
    pub fn new(config: &LlmConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            anyhow::anyhow!("API key environment variable {} is not set", config.api_key_env)
        })?;
        let http = reqwest::Client::builder().timeout(Duration::from_secs(120)).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    fn request_body<'a>(&'a self, system: &'a str, user: &'a str, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    async fn post(
        &self,
        system: &str,
        user: &str,
        stream: bool,
    ) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system, user, stream))
            .send()
            .await
            .map_err(classify_reqwest_error)?;
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited(format!("HTTP {status}")));
        }
        if status.is_server_error() {
            return Err(LlmError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Fatal(format!("HTTP {status}: {body}")));
        }
        Ok(response)
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> LlmError {
    if e.is_timeout() || e.is_connect() {
        LlmError::Transient(e.to_string())
    } else {
        LlmError::Fatal(e.to_string())
    }
}

#[async_trait]
impl ChatModel for MoonshotClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let response = self.post(system, user, false).await?;
        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Fatal(format!("malformed chat response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Fatal("chat response had no choices".to_string()))?;
        debug!(chars = content.len(), "Model completion received");
        Ok(content)
    }

    async fn complete_stream(
        &self,
        system: &str,
        user: &str,
    ) -> Result<mpsc::Receiver<String>, LlmError> {
        let response = self.post(system, user, true).await?;
        let (tx, rx) = mpsc::channel::<String>(32);
        let mut byte_stream = response.bytes_stream();
        tokio::spawn(async move {
            let mut buffer = String::new();
            while let Some(chunk) = byte_stream.next().await {
                let Ok(bytes) = chunk else {
                    // Mid-stream transport error: end the stream; the
                    // consumer keeps whatever arrived.
                    return;
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }
                    let Ok(value) = serde_json::from_str::<serde_json::Value>(data) else {
                        continue;
                    };
                    if let Some(fragment) = value["choices"][0]["delta"]["content"].as_str() {
                        if !fragment.is_empty()
                            && tx.send(fragment.to_string()).await.is_err()
                        {
                            return;
                        }
                    }
                }
            }
        });
        Ok(rx)
    }
}

/// Find the outermost JSON object in model output that may be wrapped in
/// prose or code fences, and parse it.
pub fn extract_json_object(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_is_extracted_from_surrounding_prose() {
        let text = "Sure! Here is the result:\n```json\n{\"sufficient\": true}\n```";
        let value = extract_json_object(text).unwrap();
        assert_eq!(value["sufficient"], true);
    }

    #[test]
    fn plain_json_parses_directly() {
        let value = extract_json_object("{\"next_query\": \"tomato\"}").unwrap();
        assert_eq!(value["next_query"], "tomato");
    }

    #[test]
    fn text_without_an_object_yields_none() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("} backwards {").is_none());
    }
}
