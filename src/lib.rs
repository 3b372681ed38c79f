// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod metrics;
pub mod news;

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;

use axum::Router;

/// Build the full app (API + `/metrics`) from `config/news.toml` and env.
pub fn app() -> anyhow::Result<Router> {
    let cfg = AppConfig::load_default()?;
    app_with_config(&cfg)
}

pub fn app_with_config(cfg: &AppConfig) -> anyhow::Result<Router> {
    let state = AppState::from_config(cfg)?;
    let metrics = metrics::Metrics::init();
    Ok(router(state).merge(metrics.router()))
}
