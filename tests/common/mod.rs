// tests/common/mod.rs
// Shared fakes for integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{body, Router};
use serde_json::Value as Json;

use sign_news::chat::{ChatClient, DynChat};
use sign_news::config::NewsSection;
use sign_news::error::{ChatError, FetchError};
use sign_news::news::aggregate::Aggregator;
use sign_news::news::classify::Classifier;
use sign_news::news::types::{Article, ArticleDraft, NewsSource};
use sign_news::AppState;

pub const BODY_LIMIT: usize = 1024 * 1024;

/// Build a classified article the same way the real adapters do.
pub fn article(provider: &str, url: &str, title: &str, published_at: &str) -> Article {
    ArticleDraft {
        title: Some(title.to_string()),
        url: Some(url.to_string()),
        published_at: Some(published_at.to_string()),
        ..Default::default()
    }
    .finish(provider, &Classifier::builtin())
    .expect("valid draft")
}

/// Provider returning a fixed batch, or failing with the given status.
pub struct FakeSource {
    pub name: &'static str,
    pub outcome: Result<Vec<Article>, u16>,
}

impl FakeSource {
    pub fn ok(name: &'static str, articles: Vec<Article>) -> Box<dyn NewsSource> {
        Box::new(Self {
            name,
            outcome: Ok(articles),
        })
    }

    pub fn failing(name: &'static str, status: u16) -> Box<dyn NewsSource> {
        Box::new(Self {
            name,
            outcome: Err(status),
        })
    }
}

#[async_trait]
impl NewsSource for FakeSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn try_fetch(&self, _query: &str, _page_size: usize) -> Result<Vec<Article>, FetchError> {
        match &self.outcome {
            Ok(v) => Ok(v.clone()),
            Err(status) => Err(FetchError::Status(*status)),
        }
    }
}

/// Provider whose fetch panics; exercises the endpoint's generic failure path.
pub struct PanickingSource;

#[async_trait]
impl NewsSource for PanickingSource {
    fn name(&self) -> &'static str {
        "Panicking"
    }

    async fn try_fetch(&self, _query: &str, _page_size: usize) -> Result<Vec<Article>, FetchError> {
        panic!("provider bug");
    }
}

pub struct EchoChat;

#[async_trait]
impl ChatClient for EchoChat {
    async fn reply(&self, message: &str) -> Result<String, ChatError> {
        Ok(format!("echo: {message}"))
    }
}

pub struct RateLimitedChat;

#[async_trait]
impl ChatClient for RateLimitedChat {
    async fn reply(&self, _message: &str) -> Result<String, ChatError> {
        Err(ChatError::RateLimited)
    }
}

pub fn state_with(sources: Vec<Box<dyn NewsSource>>, chat: DynChat) -> AppState {
    AppState {
        news: Arc::new(NewsSection::default()),
        aggregator: Arc::new(Aggregator::new(sources, "deaf", 20)),
        classifier: Arc::new(Classifier::builtin()),
        chat,
    }
}

/// Serve `app` on an ephemeral local port; returns its base url.
pub async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{addr}")
}

pub async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

pub fn urls(v: &Json) -> Vec<String> {
    v["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|a| a["url"].as_str().unwrap_or_default().to_string())
        .collect()
}
