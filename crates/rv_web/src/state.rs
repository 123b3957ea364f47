use std::sync::Arc;

use rv_cache::SwrCache;
use rv_core::{Error, FetchConfig, Transport};
use rv_fetch::ArticleFetcher;

use crate::page::Pages;

pub struct AppState {
    pub config: FetchConfig,
    pub cache: SwrCache,
    pub fetcher: ArticleFetcher,
    pub pages: Pages,
}

impl AppState {
    /// Puts a tag-aware cache in front of `origin` and points the fetcher at it.
    pub fn new(
        origin: Arc<dyn Transport>,
        config: FetchConfig,
        max_entries: u64,
    ) -> rv_core::Result<Self> {
        let pages = Pages::new().map_err(|e| Error::External(anyhow::Error::new(e)))?;
        let cache = SwrCache::with_capacity(origin, max_entries);
        let fetcher = ArticleFetcher::new(Arc::new(cache.clone()));
        Ok(Self {
            config,
            cache,
            fetcher,
            pages,
        })
    }
}
