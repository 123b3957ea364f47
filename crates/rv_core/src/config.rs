use std::num::NonZeroUsize;
use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};
use crate::transport::{CacheDirectives, FetchRequest};

pub const DEFAULT_SOURCE_URL: &str = "https://en.wikipedia.org/api/rest_v1/page/random/summary";
pub const DEFAULT_CACHE_TAG: &str = "randomWiki";
pub const DEFAULT_TTL_SECS: u64 = 60;
pub const DEFAULT_MAX_EXTRACT_LENGTH: usize = 200;

/// What to fetch, how to tag it and how long the body may run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub source_url: Url,
    pub cache_tag: String,
    pub ttl: Duration,
    pub max_extract_length: NonZeroUsize,
}

impl FetchConfig {
    pub fn new(
        source_url: &str,
        cache_tag: impl Into<String>,
        ttl: Duration,
        max_extract_length: usize,
    ) -> Result<Self> {
        let source_url = Url::parse(source_url)?;
        if !matches!(source_url.scheme(), "http" | "https") {
            return Err(Error::InvalidConfig(format!(
                "unsupported scheme for source url: {}",
                source_url.scheme()
            )));
        }

        let cache_tag = cache_tag.into();
        if cache_tag.trim().is_empty() {
            return Err(Error::InvalidConfig("cache tag must not be empty".to_string()));
        }

        let max_extract_length = NonZeroUsize::new(max_extract_length).ok_or_else(|| {
            Error::InvalidConfig("max extract length must be positive".to_string())
        })?;

        Ok(Self {
            source_url,
            cache_tag,
            ttl,
            max_extract_length,
        })
    }

    pub fn directives(&self) -> CacheDirectives {
        CacheDirectives::new(self.cache_tag.clone(), self.ttl)
    }

    pub fn request(&self) -> FetchRequest {
        FetchRequest {
            url: self.source_url.to_string(),
            directives: self.directives(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            source_url: Url::parse(DEFAULT_SOURCE_URL).expect("default source url is valid"),
            cache_tag: DEFAULT_CACHE_TAG.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            max_extract_length: NonZeroUsize::new(DEFAULT_MAX_EXTRACT_LENGTH)
                .expect("default max extract length is non-zero"),
        }
    }
}
