use std::sync::Arc;

use rv_core::{
    truncate_extract, ArticleSummary, FetchConfig, FetchFailure, FetchOutcome, Transport,
};

use crate::logging::Logger;

/// Fetches one article summary per call and shapes it for display.
///
/// The transport decides whether the request is served from a cache; the
/// fetcher only attaches the tag and TTL from the [`FetchConfig`].
#[derive(Clone)]
pub struct ArticleFetcher {
    transport: Arc<dyn Transport>,
}

impl ArticleFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Never fails: any error is logged and turned into the fallback summary.
    pub async fn fetch_summary(&self, config: &FetchConfig) -> FetchOutcome {
        let logger = Logger::new()
            .with_prefix("📰".to_string())
            .with_prefix(format!("[{}]", config.cache_tag));

        match self.try_fetch_summary(config).await {
            Ok(summary) => {
                logger.debug(&format!("fetched \"{}\" via {}", summary.title, self.transport.name()));
                FetchOutcome::Fresh(summary)
            }
            Err(failure) => {
                logger.error(&format!(
                    "RandomWikiArticle fetch failed for {}: {}",
                    config.source_url, failure
                ));
                FetchOutcome::fallback(failure)
            }
        }
    }

    async fn try_fetch_summary(&self, config: &FetchConfig) -> Result<ArticleSummary, FetchFailure> {
        let response = self.transport.get(&config.request()).await?;
        if !response.is_success() {
            return Err(FetchFailure::Status(response.status));
        }

        let mut summary = ArticleSummary::from_upstream(&response.body)?;
        summary.extract = truncate_extract(&summary.extract, config.max_extract_length.get());
        Ok(summary)
    }
}
