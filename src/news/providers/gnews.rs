// src/news/providers/gnews.rs
//! GNews.io `/api/v4/search` adapter.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ProviderSection;
use crate::error::FetchError;
use crate::news::classify::Classifier;
use crate::news::providers::{get_json, trim_base};
use crate::news::types::{Article, ArticleDraft, NewsSource};

pub const GNEWS_BASE_URL: &str = "https://gnews.io";

#[derive(Debug, Deserialize)]
struct Resp {
    // required: a body without it is an unexpected shape
    articles: Vec<Item>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    image: Option<String>,
    published_at: Option<String>,
    // some items carry `"source": null`
    source: Option<ItemSource>,
}

#[derive(Debug, Deserialize)]
struct ItemSource {
    name: Option<String>,
}

pub struct GNewsSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    classifier: Arc<Classifier>,
}

impl GNewsSource {
    pub fn new(client: reqwest::Client, cfg: &ProviderSection, classifier: Arc<Classifier>) -> Self {
        Self {
            client,
            base_url: cfg
                .base_url
                .clone()
                .unwrap_or_else(|| GNEWS_BASE_URL.to_string()),
            api_key: cfg.api_key.clone(),
            classifier,
        }
    }

    fn map_response(&self, resp: Resp) -> Vec<Article> {
        // GNews has no author field; the draft falls back to the outlet name.
        resp.articles
            .into_iter()
            .filter_map(|it| {
                ArticleDraft {
                    id: it.id,
                    title: it.title,
                    description: it.description,
                    url: it.url,
                    image_url: it.image,
                    source: it.source.and_then(|src| src.name),
                    author: None,
                    published_at: it.published_at,
                }
                .finish(self.name(), &self.classifier)
            })
            .collect()
    }
}

#[async_trait]
impl NewsSource for GNewsSource {
    fn name(&self) -> &'static str {
        "GNews"
    }

    async fn try_fetch(&self, query: &str, page_size: usize) -> Result<Vec<Article>, FetchError> {
        let key = self.api_key.as_deref().ok_or(FetchError::MissingApiKey)?;
        let url = format!("{}/api/v4/search", trim_base(&self.base_url));
        let size = page_size.to_string();
        let req = self.client.get(url).query(&[
            ("q", query),
            ("lang", "en"),
            ("sortby", "publishedAt"),
            ("max", size.as_str()),
            ("apikey", key),
        ]);
        let resp: Resp = get_json(req).await?;
        Ok(self.map_response(resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> GNewsSource {
        GNewsSource::new(
            reqwest::Client::new(),
            &ProviderSection::default(),
            Arc::new(Classifier::builtin()),
        )
    }

    #[test]
    fn maps_fields_and_falls_back_to_source_for_author() {
        let resp: Resp = serde_json::from_str(
            r#"{
              "totalArticles": 1,
              "articles": [{
                "id": "a1b2",
                "title": "Hospital trains staff",
                "description": "Nurses learn basic signs",
                "content": "...",
                "url": "https://post.test/hospital",
                "image": null,
                "publishedAt": "2025-03-02T08:00:00Z",
                "source": {"name": "Bangkok Post", "url": "https://post.test"}
              }]
            }"#,
        )
        .unwrap();
        let out = source().map_response(resp);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "a1b2");
        assert_eq!(out[0].author, "Bangkok Post");
        assert!(out[0].image_url.is_none());
        assert_eq!(out[0].category.id, "healthcare");
    }

    #[test]
    fn null_or_missing_source_falls_back_to_provider() {
        let resp: Resp = serde_json::from_str(
            r#"{
              "articles": [
                {"title": "Deaf poets meet", "url": "https://x.test/1", "source": null},
                {"title": "School ramps built", "url": "https://x.test/2"}
              ]
            }"#,
        )
        .unwrap();
        let out = source().map_response(resp);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|a| a.source == "GNews" && a.author == "GNews"));
    }

    #[test]
    fn body_without_articles_is_rejected() {
        let parsed: Result<Resp, _> = serde_json::from_str(r#"{"errors":["bad key"]}"#);
        assert!(parsed.is_err());
    }
}
