use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchFailure;

/// Caching instructions sent along with every outbound request.
///
/// The core only forwards these; whatever sits behind the [`Transport`]
/// decides what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDirectives {
    pub tags: Vec<String>,
    pub revalidate: Duration,
}

impl CacheDirectives {
    pub fn new(tag: impl Into<String>, revalidate: Duration) -> Self {
        Self {
            tags: vec![tag.into()],
            revalidate,
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub directives: CacheDirectives,
}

/// Status and body of an upstream response, unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET for `request.url`, honouring the directives if able.
    async fn get(&self, request: &FetchRequest) -> Result<RawResponse, FetchFailure>;

    /// Short name used in log lines
    fn name(&self) -> &str;
}
