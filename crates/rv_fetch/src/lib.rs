pub mod fetcher;
pub mod http;
pub mod logging;

pub use fetcher::ArticleFetcher;
pub use http::HttpTransport;
pub use logging::{init_logging, Logger};

pub mod prelude {
    pub use super::fetcher::ArticleFetcher;
    pub use rv_core::{ArticleSummary, FetchConfig, FetchOutcome, Transport};
}
