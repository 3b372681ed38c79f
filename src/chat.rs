// src/chat.rs
//! AI chat assistant: provider abstraction + retry wrapper.
//!
//! A `ChatBackend` performs exactly one remote call and classifies its
//! failure. `RetryingChat` wraps a backend and retries rate-limit, overload
//! and network failures with a linearly growing delay. Auth failures,
//! undecodable bodies and empty replies are returned immediately.

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ChatSection;
use crate::error::ChatError;

pub const MAX_MESSAGE_CHARS: usize = 2000;

const SYSTEM_PROMPT: &str = "You are a friendly assistant inside a Thai Sign Language (TSL) \
learning app. Answer in the same language as the user (Thai or English), briefly and \
accurately. When asked how to sign a word, describe hand shape, location, movement and \
facial expression. If unsure, say so instead of inventing a sign.";

/// Single remote call, no retries.
#[async_trait]
pub trait ChatBackend: Send + Sync + 'static {
    async fn complete(&self, message: &str) -> Result<String, ChatError>;
    fn name(&self) -> &'static str;
}

/// What the HTTP layer talks to.
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn reply(&self, message: &str) -> Result<String, ChatError>;
}

pub type DynChat = Arc<dyn ChatClient>;

/// Attempt budget and delay schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub step_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ChatSection::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &ChatSection) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.base_delay_ms),
            step_delay: Duration::from_millis(cfg.step_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let grown = self
            .base_delay
            .saturating_add(self.step_delay.saturating_mul(retry.saturating_sub(1)));
        grown.min(self.max_delay)
    }
}

pub struct RetryingChat<B: ChatBackend> {
    inner: B,
    policy: RetryPolicy,
}

impl<B: ChatBackend> RetryingChat<B> {
    pub fn new(inner: B, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<B: ChatBackend> ChatClient for RetryingChat<B> {
    async fn reply(&self, message: &str) -> Result<String, ChatError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            counter!("chat_attempts_total").increment(1);
            match self.inner.complete(message).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.policy.max_attempts => {
                    let delay = self.policy.delay_for(attempt);
                    tracing::warn!(
                        error = %e,
                        provider = self.inner.name(),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "chat call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, provider = self.inner.name(), attempt, "chat call failed");
                    counter!("chat_failures_total", "kind" => e.kind()).increment(1);
                    return Err(e);
                }
            }
        }
    }
}

/// OpenAI-compatible chat completions backend.
pub struct OpenAiChat {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiChat {
    pub fn new(cfg: &ChatSection) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("sign-news/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(&self, message: &str) -> Result<String, ChatError> {
        let key = self.api_key.as_deref().ok_or(ChatError::Unauthorized)?;
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: message,
                },
            ],
            temperature: 0.4,
            max_tokens: 600,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(key)
            .json(&req)
            .send()
            .await
            .map_err(|e| ChatError::Network(e.without_url().to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatError::from_status(status.as_u16()));
        }
        let text = resp
            .text()
            .await
            .map_err(|e| ChatError::Network(e.without_url().to_string()))?;
        let body: Resp =
            serde_json::from_str(&text).map_err(|e| ChatError::Decode(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ChatError::EmptyReply)
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Build the production client from config.
pub fn build_chat_client(cfg: &ChatSection) -> anyhow::Result<DynChat> {
    let backend = OpenAiChat::new(cfg)?;
    Ok(Arc::new(RetryingChat::new(
        backend,
        RetryPolicy::from_config(cfg),
    )))
}

/// Validate a user message before any outbound call.
pub fn validate_message(message: &str) -> Result<&str, String> {
    let m = message.trim();
    if m.is_empty() {
        return Err("message is empty".to_string());
    }
    if m.chars().count() > MAX_MESSAGE_CHARS {
        return Err(format!("message exceeds {MAX_MESSAGE_CHARS} characters"));
    }
    Ok(m)
}
