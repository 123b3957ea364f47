use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AppState;

pub const PAGE_PATH: &str = "/revalidation";

#[derive(Debug, Serialize, Deserialize)]
pub struct ArticleResponse {
    pub title: String,
    pub description: String,
    pub extract: String,
    pub page_url: String,
    pub fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct RevalidateParams {
    pub tag: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RevalidateResponse {
    pub revalidated: bool,
    pub tag: String,
    pub entries: usize,
    pub now: DateTime<Utc>,
}

pub async fn index() -> impl IntoResponse {
    Redirect::temporary(PAGE_PATH)
}

pub async fn show_page(
    State(state): State<Arc<AppState>>,
) -> Result<Html<String>, StatusCode> {
    let outcome = state.fetcher.fetch_summary(&state.config).await;
    state
        .pages
        .render(&state.config, outcome.summary())
        .map(Html)
        .map_err(|e| {
            tracing::error!("❌ Failed to render page: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// Form target behind the page's revalidate button.
pub async fn revalidate_page(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.cache.revalidate_tag(&state.config.cache_tag).await;
    Redirect::to(PAGE_PATH)
}

pub async fn get_article(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.fetcher.fetch_summary(&state.config).await;
    let fallback = outcome.is_fallback();
    let summary = outcome.into_summary();
    Json(ArticleResponse {
        title: summary.title,
        description: summary.description,
        extract: summary.extract,
        page_url: summary.page_url,
        fallback,
    })
}

pub async fn revalidate_tag(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RevalidateParams>,
) -> impl IntoResponse {
    let tag = params
        .tag
        .filter(|tag| !tag.trim().is_empty())
        .unwrap_or_else(|| state.config.cache_tag.clone());
    let entries = state.cache.revalidate_tag(&tag).await;

    Json(RevalidateResponse {
        revalidated: true,
        tag,
        entries,
        now: Utc::now(),
    })
}
