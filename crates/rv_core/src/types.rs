use serde::{Deserialize, Serialize};

use crate::error::FetchFailure;

pub const FALLBACK_PAGE_URL: &str = "#";

/// Display-ready summary of one encyclopedia article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub title: String,
    pub description: String,
    pub extract: String,
    pub page_url: String,
}

impl ArticleSummary {
    /// Shown whenever the upstream fetch fails for any reason.
    pub fn fallback() -> Self {
        Self {
            title: "No article".to_string(),
            description: "Fetch failed".to_string(),
            extract: "Could not fetch Wikipedia article during build.".to_string(),
            page_url: FALLBACK_PAGE_URL.to_string(),
        }
    }

    /// Shapes an upstream JSON body. Unknown fields are ignored, `description`
    /// and the page link are optional, `title` and `extract` are not.
    pub fn from_upstream(body: &[u8]) -> Result<Self, FetchFailure> {
        let upstream: UpstreamSummary = serde_json::from_slice(body)?;

        let title = upstream.title.ok_or(FetchFailure::MissingField("title"))?;
        let extract = upstream
            .extract
            .ok_or(FetchFailure::MissingField("extract"))?;
        let page_url = upstream
            .content_urls
            .and_then(|urls| urls.desktop)
            .and_then(|desktop| desktop.page)
            .unwrap_or_else(|| FALLBACK_PAGE_URL.to_string());

        Ok(Self {
            title,
            description: upstream.description.unwrap_or_default(),
            extract,
            page_url,
        })
    }
}

#[derive(Debug, Deserialize)]
struct UpstreamSummary {
    title: Option<String>,
    description: Option<String>,
    extract: Option<String>,
    content_urls: Option<ContentUrls>,
}

#[derive(Debug, Deserialize)]
struct ContentUrls {
    desktop: Option<PageLink>,
}

#[derive(Debug, Deserialize)]
struct PageLink {
    page: Option<String>,
}

/// Result of a summary fetch. Either arm carries something renderable.
#[derive(Debug)]
pub enum FetchOutcome {
    Fresh(ArticleSummary),
    Fallback {
        summary: ArticleSummary,
        failure: FetchFailure,
    },
}

impl FetchOutcome {
    pub fn fallback(failure: FetchFailure) -> Self {
        FetchOutcome::Fallback {
            summary: ArticleSummary::fallback(),
            failure,
        }
    }

    pub fn summary(&self) -> &ArticleSummary {
        match self {
            FetchOutcome::Fresh(summary) => summary,
            FetchOutcome::Fallback { summary, .. } => summary,
        }
    }

    pub fn into_summary(self) -> ArticleSummary {
        match self {
            FetchOutcome::Fresh(summary) => summary,
            FetchOutcome::Fallback { summary, .. } => summary,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, FetchOutcome::Fallback { .. })
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            FetchOutcome::Fresh(_) => None,
            FetchOutcome::Fallback { failure, .. } => Some(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_upstream_full() {
        let body = br#"{"title":"Cat","description":"Animal","extract":"A cat.","lang":"en","content_urls":{"desktop":{"page":"https://en.wikipedia.org/wiki/Cat"},"mobile":{"page":"https://en.m.wikipedia.org/wiki/Cat"}}}"#;
        let summary = ArticleSummary::from_upstream(body).unwrap();
        assert_eq!(summary.title, "Cat");
        assert_eq!(summary.description, "Animal");
        assert_eq!(summary.extract, "A cat.");
        assert_eq!(summary.page_url, "https://en.wikipedia.org/wiki/Cat");
    }

    #[test]
    fn test_from_upstream_optional_fields() {
        let summary = ArticleSummary::from_upstream(br#"{"title":"Cat","extract":"A cat."}"#).unwrap();
        assert_eq!(summary.description, "");
        assert_eq!(summary.page_url, "#");

        let summary = ArticleSummary::from_upstream(
            br#"{"title":"Cat","extract":"A cat.","content_urls":{"desktop":{}}}"#,
        )
        .unwrap();
        assert_eq!(summary.page_url, "#");
    }

    #[test]
    fn test_from_upstream_missing_extract() {
        let err = ArticleSummary::from_upstream(br#"{"title":"Cat"}"#).unwrap_err();
        assert!(matches!(err, FetchFailure::MissingField("extract")));
    }

    #[test]
    fn test_from_upstream_missing_title() {
        let err = ArticleSummary::from_upstream(br#"{"extract":"A cat."}"#).unwrap_err();
        assert!(matches!(err, FetchFailure::MissingField("title")));
    }

    #[test]
    fn test_from_upstream_bad_bodies() {
        assert!(matches!(ArticleSummary::from_upstream(b""), Err(FetchFailure::Parse(_))));
        assert!(matches!(ArticleSummary::from_upstream(b"<html>"), Err(FetchFailure::Parse(_))));
        assert!(matches!(ArticleSummary::from_upstream(b"[1,2]"), Err(FetchFailure::Parse(_))));
        assert!(matches!(
            ArticleSummary::from_upstream(br#"{"title":"Cat","extract":42}"#),
            Err(FetchFailure::Parse(_))
        ));
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = FetchOutcome::fallback(FetchFailure::Status(500));
        assert!(outcome.is_fallback());
        assert_eq!(outcome.summary(), &ArticleSummary::fallback());
        assert!(matches!(outcome.failure(), Some(FetchFailure::Status(500))));
        assert_eq!(outcome.into_summary().page_url, "#");
    }
}
