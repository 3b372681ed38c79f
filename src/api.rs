// src/api.rs
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::chat::{build_chat_client, validate_message, DynChat};
use crate::config::{AppConfig, NewsSection};
use crate::error::ApiError;
use crate::news::aggregate::Aggregator;
use crate::news::classify::Classifier;
use crate::news::providers::default_sources;
use crate::news::types::Article;

/// Shared, read-only handler state. Built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub news: Arc<NewsSection>,
    pub aggregator: Arc<Aggregator>,
    pub classifier: Arc<Classifier>,
    pub chat: DynChat,
}

impl AppState {
    /// Wire the production providers and chat client from config.
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let classifier = Arc::new(Classifier::load_default()?);
        let http = reqwest::Client::builder()
            .user_agent(concat!("sign-news/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(cfg.news.timeout())
            .build()
            .context("building news http client")?;

        let aggregator = Aggregator::new(
            default_sources(cfg, http, classifier.clone()),
            cfg.news.query.clone(),
            cfg.news.page_size,
        );
        tracing::info!(
            providers = ?aggregator.source_names(),
            newsapi_key = cfg.newsapi.api_key.is_some(),
            gnews_key = cfg.gnews.api_key.is_some(),
            chat_key = cfg.chat.api_key.is_some(),
            "news providers configured"
        );

        Ok(Self {
            news: Arc::new(cfg.news.clone()),
            aggregator: Arc::new(aggregator),
            classifier,
            chat: build_chat_client(&cfg.chat)?,
        })
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/news", get(list_news))
        .route("/news/categories", get(list_categories))
        .route("/news/{id}", get(news_by_id))
        .route("/chat", post(chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Deserialize)]
struct NewsQuery {
    // kept as text: a non-numeric value falls back to the default
    limit: Option<String>,
}

#[derive(Serialize)]
struct NewsResp {
    success: bool,
    data: Vec<Article>,
    total: usize,
}

async fn list_news(
    State(state): State<AppState>,
    Query(q): Query<NewsQuery>,
) -> Result<Json<NewsResp>, ApiError> {
    let limit = state.news.resolve_limit(q.limit.as_deref());
    let aggregator = state.aggregator.clone();

    // A panic while merging/ranking surfaces as a JoinError, not a dropped connection.
    let out = tokio::spawn(async move { aggregator.get_news(limit).await })
        .await
        .map_err(|e| ApiError::Internal(format!("aggregation task failed: {e}")))?;

    Ok(Json(NewsResp {
        success: true,
        total: out.total(),
        data: out.articles,
    }))
}

#[derive(Serialize)]
struct CategoryOut {
    id: String,
    name: String,
    name_en: String,
}

#[derive(Serialize)]
struct CategoriesResp {
    success: bool,
    data: Vec<CategoryOut>,
}

async fn list_categories(State(state): State<AppState>) -> Json<CategoriesResp> {
    let data = state
        .classifier
        .categories()
        .into_iter()
        .map(|c| CategoryOut {
            id: c.id.clone(),
            name: c.th.clone(),
            name_en: c.en.clone(),
        })
        .collect();
    Json(CategoriesResp {
        success: true,
        data,
    })
}

async fn news_by_id(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "success": true,
        "id": id,
        "message": "Use the article URL to read the full story",
    }))
}

#[derive(Deserialize)]
struct ChatReq {
    message: String,
}

#[derive(Serialize)]
struct ChatResp {
    success: bool,
    reply: String,
}

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatReq>, JsonRejection>,
) -> Result<Json<ChatResp>, ApiError> {
    // keep the {success, message} error shape for malformed bodies too
    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let message = validate_message(&body.message).map_err(ApiError::BadRequest)?;
    let reply = state.chat.reply(message).await?;
    Ok(Json(ChatResp {
        success: true,
        reply,
    }))
}
