// src/news/types.rs
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Serialize;

use crate::error::FetchError;
use crate::news::classify::Classifier;
use crate::news::normalize_text;

/// Topic label attached to every classified article.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Category {
    pub id: String, // slug, e.g. "sign-language"
    pub th: String,
    pub en: String,
}

/// Normalized, classified article. Lives for one request only.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub image_url: Option<String>,
    pub source: String,
    pub author: String,
    pub published_at: String, // ISO-8601 as supplied by the provider
    pub category: Category,
    /// Ranking only; never sent to clients.
    #[serde(skip)]
    pub score: i32,
}

/// Provider-neutral article fields before normalization and classification.
#[derive(Debug, Clone, Default)]
pub struct ArticleDraft {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub image_url: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl ArticleDraft {
    /// Apply fallbacks, normalize text and classify.
    /// Returns `None` for entries without a usable title or url.
    pub fn finish(self, provider: &str, classifier: &Classifier) -> Option<Article> {
        let url = non_empty(self.url)?;
        let title = non_empty(self.title).map(|t| normalize_text(&t))?;
        if title.is_empty() || title == "[Removed]" {
            return None;
        }
        let description = non_empty(self.description)
            .map(|d| normalize_text(&d))
            .filter(|d| !d.is_empty() && d != "[Removed]")
            .unwrap_or_else(|| title.clone());
        let source = non_empty(self.source).unwrap_or_else(|| provider.to_string());
        let author = non_empty(self.author).unwrap_or_else(|| source.clone());

        let c = classifier.classify(&title, &description);
        Some(Article {
            id: non_empty(self.id).unwrap_or_else(|| url.clone()),
            title,
            description,
            image_url: non_empty(self.image_url),
            url,
            source,
            author,
            published_at: non_empty(self.published_at).unwrap_or_default(),
            category: c.category,
            score: c.score,
        })
    }
}

/// Outcome of one provider call, as seen by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStatus {
    Ok { fetched: usize },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SourceFetch {
    pub provider: &'static str,
    pub status: SourceStatus,
    pub articles: Vec<Article>,
}

/// A single external news provider.
///
/// Implementors only write `try_fetch`; callers use `fetch`, which keeps
/// every failure inside the adapter and degrades to an empty list.
#[async_trait]
pub trait NewsSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_fetch(&self, query: &str, page_size: usize) -> Result<Vec<Article>, FetchError>;

    async fn fetch(&self, query: &str, page_size: usize) -> SourceFetch {
        let t0 = std::time::Instant::now();
        let provider = self.name();
        let out = match self.try_fetch(query, page_size).await {
            Ok(articles) => {
                counter!("news_articles_fetched_total", "provider" => provider)
                    .increment(articles.len() as u64);
                SourceFetch {
                    provider,
                    status: SourceStatus::Ok {
                        fetched: articles.len(),
                    },
                    articles,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, provider, "provider fetch failed");
                counter!("news_provider_errors_total", "provider" => provider).increment(1);
                SourceFetch {
                    provider,
                    status: SourceStatus::Failed {
                        reason: e.to_string(),
                    },
                    articles: Vec::new(),
                }
            }
        };
        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("news_fetch_ms", "provider" => provider).record(ms);
        out
    }
}
