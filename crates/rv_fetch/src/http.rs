use std::time::Duration;

use async_trait::async_trait;
use rv_core::{FetchFailure, FetchRequest, RawResponse, Transport};

const USER_AGENT: &str = concat!("rv/", env!("CARGO_PKG_VERSION"));

/// Plain reqwest-backed origin. It does no caching of its own; the
/// directives are only logged.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> rv_core::Result<Self> {
        Self::with_timeout(None)
    }

    pub fn with_timeout(timeout: Option<Duration>) -> rv_core::Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying client, for callers that need more than GET.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &FetchRequest) -> Result<RawResponse, FetchFailure> {
        tracing::debug!(
            url = %request.url,
            tags = ?request.directives.tags,
            revalidate_secs = request.directives.revalidate.as_secs(),
            "🌐 GET"
        );

        let response = self.client.get(&request.url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(RawResponse { status, body })
    }

    fn name(&self) -> &str {
        "http"
    }
}
