// src/news/aggregate.rs
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::config::MAX_PAGE;
use crate::news::types::{Article, NewsSource, SourceStatus};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("news_requests_total", "Aggregation runs.");
        describe_counter!(
            "news_articles_fetched_total",
            "Articles mapped from provider responses."
        );
        describe_counter!(
            "news_provider_errors_total",
            "Provider fetch/parse errors."
        );
        describe_counter!("news_dedup_total", "Articles removed as url duplicates.");
        describe_histogram!("news_fetch_ms", "Provider fetch time in milliseconds.");
    });
}

/// Per-source outcome of one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub provider: &'static str,
    pub status: SourceStatus,
}

/// Ranked articles plus how each provider fared.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub articles: Vec<Article>,
    pub sources: Vec<SourceReport>,
}

impl Aggregated {
    pub fn total(&self) -> usize {
        self.articles.len()
    }

    /// True when at least one provider failed.
    pub fn degraded(&self) -> bool {
        self.sources
            .iter()
            .any(|s| matches!(s.status, SourceStatus::Failed { .. }))
    }
}

pub struct Aggregator {
    sources: Vec<Box<dyn NewsSource>>,
    query: String,
    page_size: usize,
}

impl Aggregator {
    pub fn new(sources: Vec<Box<dyn NewsSource>>, query: impl Into<String>, page_size: usize) -> Self {
        Self {
            sources,
            query: query.into(),
            page_size,
        }
    }

    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fetch from every source concurrently, then dedup, rank and truncate.
    /// Never fails: a provider outage only shrinks the result.
    pub async fn get_news(&self, limit: usize) -> Aggregated {
        ensure_metrics_described();
        counter!("news_requests_total").increment(1);

        let page_size = self.page_size.max(limit).clamp(1, MAX_PAGE);
        let fetches = join_all(
            self.sources
                .iter()
                .map(|s| s.fetch(&self.query, page_size)),
        )
        .await;

        let mut sources = Vec::with_capacity(fetches.len());
        let mut batches = Vec::with_capacity(fetches.len());
        for f in fetches {
            sources.push(SourceReport {
                provider: f.provider,
                status: f.status,
            });
            batches.push(f.articles);
        }

        let (articles, dedup_cnt) = merge_rank_truncate(batches, limit);
        counter!("news_dedup_total").increment(dedup_cnt as u64);

        let out = Aggregated { articles, sources };
        tracing::info!(
            target: "news",
            returned = out.total(),
            dedup = dedup_cnt,
            degraded = out.degraded(),
            limit,
            "news aggregated"
        );
        out
    }
}

/// Concatenate batches in order, drop url duplicates, rank, truncate.
/// Returns (articles, dedup_count).
pub fn merge_rank_truncate(batches: Vec<Vec<Article>>, limit: usize) -> (Vec<Article>, usize) {
    let all: Vec<Article> = batches.into_iter().flatten().collect();
    let (mut kept, dedup_cnt) = dedup_by_url(all);
    rank(&mut kept);
    kept.truncate(limit);
    (kept, dedup_cnt)
}

/// Keep the first article seen for each url.
pub fn dedup_by_url(articles: Vec<Article>) -> (Vec<Article>, usize) {
    let mut seen: HashSet<String> = HashSet::with_capacity(articles.len());
    let mut keep = Vec::with_capacity(articles.len());
    let mut dedup_out = 0usize;
    for a in articles {
        if !seen.insert(a.url.clone()) {
            dedup_out += 1;
            continue;
        }
        keep.push(a);
    }
    (keep, dedup_out)
}

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// RFC 3339, else offset-less ISO-8601 (date-time or bare date) read as UTC.
fn published_ts(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|ndt| ndt.and_utc())
}

/// Score desc, then publish time desc. Unparsable timestamps sort last
/// within their score.
pub fn compare_rank(a: &Article, b: &Article) -> Ordering {
    b.score
        .cmp(&a.score)
        .then_with(|| published_ts(&b.published_at).cmp(&published_ts(&a.published_at)))
}

/// Stable: equal keys keep arrival order.
pub fn rank(articles: &mut [Article]) {
    articles.sort_by(compare_rank);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::news::types::Category;

    fn art(url: &str, score: i32, published_at: &str) -> Article {
        Article {
            id: url.into(),
            title: url.into(),
            description: url.into(),
            url: url.into(),
            image_url: None,
            source: "Test".into(),
            author: "Test".into(),
            published_at: published_at.into(),
            category: Category {
                id: "general".into(),
                th: "ทั่วไป".into(),
                en: "General".into(),
            },
            score,
        }
    }

    fn urls(v: &[Article]) -> Vec<&str> {
        v.iter().map(|a| a.url.as_str()).collect()
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut first = art("u1", 3, "2025-01-01T00:00:00Z");
        first.title = "first".into();
        let mut second = art("u1", 10, "2025-02-01T00:00:00Z");
        second.title = "second".into();
        let (kept, dedup) = dedup_by_url(vec![first, art("u2", 1, ""), second]);
        assert_eq!(dedup, 1);
        assert_eq!(urls(&kept), vec!["u1", "u2"]);
        assert_eq!(kept[0].title, "first");
    }

    #[test]
    fn ranks_by_score_then_recency() {
        let mut v = vec![
            art("old-high", 10, "2024-01-01T00:00:00Z"),
            art("low", 1, "2025-06-01T00:00:00Z"),
            art("new-high", 10, "2025-01-01T00:00:00+07:00"),
            art("mid", 5, "2025-01-01T00:00:00Z"),
        ];
        rank(&mut v);
        assert_eq!(urls(&v), vec!["new-high", "old-high", "mid", "low"]);
    }

    #[test]
    fn unparsable_dates_sort_lowest_without_panicking() {
        let mut v = vec![
            art("garbage", 4, "not a date"),
            art("empty", 4, ""),
            art("dated", 4, "2020-01-01T00:00:00Z"),
        ];
        rank(&mut v);
        assert_eq!(v[0].url, "dated");
        // equal (unparsable) keys keep arrival order
        assert_eq!(urls(&v[1..]), vec!["garbage", "empty"]);
    }

    #[test]
    fn offsets_compare_as_instants() {
        // 08:00+07:00 == 01:00Z, so the 02:00Z article is newer
        let mut v = vec![
            art("bkk", 2, "2025-01-01T08:00:00+07:00"),
            art("utc", 2, "2025-01-01T02:00:00Z"),
        ];
        rank(&mut v);
        assert_eq!(urls(&v), vec!["utc", "bkk"]);
    }

    #[test]
    fn offsetless_timestamps_are_read_as_utc() {
        let mut v = vec![
            art("garbage", 3, "soon"),
            art("day-only", 3, "2025-01-01"),
            art("naive", 3, "2025-01-02T00:00:00"),
            art("naive-frac", 3, "2025-01-03 06:30:00.250"),
            art("rfc", 3, "2025-01-02T12:00:00Z"),
        ];
        rank(&mut v);
        assert_eq!(
            urls(&v),
            vec!["naive-frac", "rfc", "naive", "day-only", "garbage"]
        );
    }

    #[test]
    fn truncates_to_top_n() {
        let batch: Vec<Article> = (0..10)
            .map(|i| art(&format!("u{i}"), i, "2025-01-01T00:00:00Z"))
            .collect();
        let (out, _) = merge_rank_truncate(vec![batch], 3);
        assert_eq!(urls(&out), vec!["u9", "u8", "u7"]);
    }

    #[test]
    fn zero_limit_yields_empty() {
        let (out, _) = merge_rank_truncate(vec![vec![art("a", 1, "")]], 0);
        assert!(out.is_empty());
    }
}
