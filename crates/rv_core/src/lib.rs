pub mod config;
pub mod error;
pub mod transport;
pub mod truncate;
pub mod types;

pub use config::FetchConfig;
pub use error::{Error, FetchFailure, Result};
pub use transport::{CacheDirectives, FetchRequest, RawResponse, Transport};
pub use truncate::{truncate_extract, ELLIPSIS_MARKER};
pub use types::{ArticleSummary, FetchOutcome};
