// src/config.rs
//! Service configuration: TOML file + environment overrides.
//!
//! Resolution order:
//! 1) `$NEWS_CONFIG_PATH` (must exist when set)
//! 2) `config/news.toml`
//! 3) built-in defaults
//!
//! API keys and the HTTP timeout can always be overridden from env
//! (`NEWSAPI_KEY`, `GNEWS_API_KEY`, `OPENAI_API_KEY`, `NEWS_HTTP_TIMEOUT_SECS`).
//! Keys are not validated here; a missing key surfaces as a provider failure.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CONFIG_PATH: &str = "NEWS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/news.toml";

pub const ENV_NEWSAPI_KEY: &str = "NEWSAPI_KEY";
pub const ENV_GNEWS_KEY: &str = "GNEWS_API_KEY";
pub const ENV_OPENAI_KEY: &str = "OPENAI_API_KEY";
pub const ENV_HTTP_TIMEOUT: &str = "NEWS_HTTP_TIMEOUT_SECS";

/// Hard ceiling for both `limit` and provider page sizes.
pub const MAX_PAGE: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub news: NewsSection,
    pub newsapi: ProviderSection,
    pub gnews: ProviderSection,
    pub chat: ChatSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsSection {
    /// Search expression sent to every provider.
    pub query: String,
    pub page_size: usize,
    pub default_limit: usize,
    pub max_limit: usize,
    pub timeout_secs: u64,
}

impl Default for NewsSection {
    fn default() -> Self {
        Self {
            query: r#""sign language" OR deaf OR "hearing impaired" OR disability OR accessibility"#
                .to_string(),
            page_size: 20,
            default_limit: 20,
            max_limit: MAX_PAGE,
            timeout_secs: 10,
        }
    }
}

/// Per-provider settings. `base_url = None` means the provider's public endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderSection {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub step_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_attempts: 5,
            base_delay_ms: 1_000,
            step_delay_ms: 2_000,
            max_delay_ms: 9_000,
        }
    }
}

impl NewsSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve a caller-supplied `limit` query value.
    /// Missing or non-numeric values fall back to `default_limit`.
    pub fn resolve_limit(&self, raw: Option<&str>) -> usize {
        raw.and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(self.default_limit)
            .min(self.max_limit)
    }
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: AppConfig = toml::from_str(s).context("parsing news config")?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading news config from {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    /// Load using `$NEWS_CONFIG_PATH` and fallbacks, then apply env overrides.
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("NEWS_CONFIG_PATH points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::load_from(&fallback)?
            } else {
                Self::default()
            }
        };
        cfg.apply_overrides(|k| std::env::var(k).ok());
        Ok(cfg)
    }

    /// Apply overrides from a key lookup (env in production, a map in tests).
    pub fn apply_overrides<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(k) = non_empty(ENV_NEWSAPI_KEY) {
            self.newsapi.api_key = Some(k);
        }
        if let Some(k) = non_empty(ENV_GNEWS_KEY) {
            self.gnews.api_key = Some(k);
        }
        if let Some(k) = non_empty(ENV_OPENAI_KEY) {
            self.chat.api_key = Some(k);
        }
        if let Some(t) = non_empty(ENV_HTTP_TIMEOUT).and_then(|v| v.parse::<u64>().ok()) {
            self.news.timeout_secs = t;
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        let n = &mut self.news;
        n.max_limit = n.max_limit.clamp(1, MAX_PAGE);
        n.default_limit = n.default_limit.clamp(1, n.max_limit);
        n.page_size = n.page_size.clamp(1, MAX_PAGE);
        n.timeout_secs = n.timeout_secs.max(1);
        if n.query.trim().is_empty() {
            n.query = NewsSection::default().query;
        }

        let c = &mut self.chat;
        c.max_attempts = c.max_attempts.clamp(1, 10);
        c.timeout_secs = c.timeout_secs.max(1);
        if c.base_delay_ms > c.max_delay_ms {
            // keep a valid interval
            std::mem::swap(&mut c.base_delay_ms, &mut c.max_delay_ms);
        }

        for key in [
            &mut self.newsapi.api_key,
            &mut self.gnews.api_key,
            &mut self.chat.api_key,
        ] {
            if key.as_deref().is_some_and(|k| k.trim().is_empty()) {
                *key = None;
            }
        }
    }
}
