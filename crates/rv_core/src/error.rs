use thiserror::Error;

/// Everything that can go wrong while fetching and shaping a summary.
///
/// The fetcher never hands these to its caller directly; they ride along
/// inside [`crate::FetchOutcome::Fallback`] for diagnostics.
#[derive(Error, Debug)]
pub enum FetchFailure {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error! Status: {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing field in upstream response: {0}")]
    MissingField(&'static str),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
