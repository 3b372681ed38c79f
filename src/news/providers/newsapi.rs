// src/news/providers/newsapi.rs
//! NewsAPI.org `/v2/everything` adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ProviderSection;
use crate::error::FetchError;
use crate::news::classify::Classifier;
use crate::news::providers::{get_json, trim_base};
use crate::news::types::{Article, ArticleDraft, NewsSource};

pub const NEWSAPI_BASE_URL: &str = "https://newsapi.org";

#[derive(Debug, Deserialize)]
struct Resp {
    status: String,
    #[serde(default)]
    articles: Vec<Item>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    // some items carry `"source": null`
    source: Option<ItemSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    name: Option<String>,
}

pub struct NewsApiSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    classifier: Arc<Classifier>,
}

impl NewsApiSource {
    pub fn new(client: reqwest::Client, cfg: &ProviderSection, classifier: Arc<Classifier>) -> Self {
        Self {
            client,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| NEWSAPI_BASE_URL.to_string()),
            api_key: cfg.api_key.clone(),
            classifier,
        }
    }

    fn map_response(&self, resp: Resp) -> Result<Vec<Article>, FetchError> {
        if resp.status != "ok" {
            return Err(FetchError::Provider(
                resp.message.unwrap_or_else(|| resp.status.clone()),
            ));
        }
        Ok(resp
            .articles
            .into_iter()
            .filter_map(|it| {
                ArticleDraft {
                    id: None,
                    title: it.title,
                    description: it.description,
                    url: it.url,
                    image_url: it.url_to_image,
                    source: it.source.and_then(|src| src.name),
                    author: it.author,
                    published_at: it.published_at,
                }
                .finish(self.name(), &self.classifier)
            })
            .collect())
    }
}

#[async_trait]
impl NewsSource for NewsApiSource {
    fn name(&self) -> &'static str {
        "NewsAPI"
    }

    async fn try_fetch(&self, query: &str, page_size: usize) -> Result<Vec<Article>, FetchError> {
        let key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        let url = format!("{}/v2/everything", trim_base(&self.base_url));
        let size = page_size.to_string();
        let req = self.client.get(url).query(&[
            ("q", query),
            ("language", "en"),
            ("sortBy", "publishedAt"),
            ("pageSize", size.as_str()),
            ("apiKey", key),
        ]);
        let resp: Resp = get_json(req).await?;
        self.map_response(resp)
    }
}
