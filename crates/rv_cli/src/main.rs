use anyhow::Context;
use clap::Parser;
use rv_core::config::{
    DEFAULT_CACHE_TAG, DEFAULT_MAX_EXTRACT_LENGTH, DEFAULT_SOURCE_URL, DEFAULT_TTL_SECS,
};
use rv_core::FetchConfig;
use rv_fetch::{init_logging, ArticleFetcher, HttpTransport};
use rv_web::AppState;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_seconds = 0u64;
        let mut current_number = String::new();
        let mut has_value = false;

        for c in s.chars() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if !current_number.is_empty() {
                let num = current_number
                    .parse::<u64>()
                    .map_err(|_| "Duration too large".to_string())?;
                let unit = match c {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_seconds = num
                    .checked_mul(unit)
                    .and_then(|secs| total_seconds.checked_add(secs))
                    .ok_or_else(|| "Duration too large".to_string())?;
                current_number.clear();
                has_value = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // bare numbers are seconds
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Duration too large".to_string())?;
            total_seconds = total_seconds
                .checked_add(num)
                .ok_or_else(|| "Duration too large".to_string())?;
            has_value = true;
        }

        if !has_value {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_secs(total_seconds)))
    }
}

impl std::fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.0.as_secs())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "On-demand revalidation demo", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_SOURCE_URL)]
    source_url: String,
    #[arg(long, global = true, default_value = DEFAULT_CACHE_TAG)]
    cache_tag: String,
    /// Seconds before a cached summary goes stale (e.g. 60, 1m30s)
    #[arg(long, global = true, default_value_t = HumanDuration(Duration::from_secs(DEFAULT_TTL_SECS)), value_parser = clap::value_parser!(HumanDuration))]
    ttl: HumanDuration,
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_EXTRACT_LENGTH)]
    max_extract_length: usize,
    #[arg(long, global = true, default_value = "info", help = "One of: error, warn, info, debug, trace")]
    log_level: Level,
    /// Upstream request timeout; the client default applies when unset
    #[arg(long, global = true)]
    timeout: Option<HumanDuration>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Run the web host
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
        #[arg(long, default_value_t = rv_cache::DEFAULT_MAX_ENTRIES)]
        max_entries: u64,
    },
    /// Fetch one summary straight from the source and print it
    Fetch {
        #[arg(long)]
        json: bool,
    },
    /// Ask a running host to revalidate a tag
    Revalidate {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        server: String,
        /// Defaults to --cache-tag
        #[arg(long)]
        tag: Option<String>,
    },
}

impl Cli {
    fn fetch_config(&self) -> rv_core::Result<FetchConfig> {
        FetchConfig::new(
            &self.source_url,
            self.cache_tag.clone(),
            self.ttl.0,
            self.max_extract_length,
        )
    }

    fn transport(&self) -> rv_core::Result<HttpTransport> {
        HttpTransport::with_timeout(self.timeout.as_ref().map(|t| t.0))
    }
}

/// Resolves the revalidate endpoint under `server`, keeping any path prefix.
fn revalidate_url(server: &str, tag: &str) -> anyhow::Result<url::Url> {
    let mut base =
        url::Url::parse(server).with_context(|| format!("invalid server url: {}", server))?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    let mut url = base.join("api/revalidate")?;
    url.query_pairs_mut().append_pair("tag", tag);
    Ok(url)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let logger = init_logging(cli.log_level).with_prefix("[rv]".to_string());

    let config = cli.fetch_config()?;
    let transport = Arc::new(cli.transport()?);

    match &cli.command {
        Commands::Serve { addr, max_entries } => {
            logger.info(&format!(
                "🏁 Serving {} with tag \"{}\" and a {}s window",
                config.source_url,
                config.cache_tag,
                config.ttl.as_secs()
            ));
            let state = AppState::new(transport, config, *max_entries)?;
            rv_web::serve(*addr, state).await?;
        }
        Commands::Fetch { json } => {
            let fetcher = ArticleFetcher::new(transport);
            let outcome = fetcher.fetch_summary(&config).await;
            if let Some(failure) = outcome.failure() {
                logger.warn(&format!("⚠️ Showing fallback article: {}", failure));
            }
            let summary = outcome.into_summary();
            if *json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.title);
                println!("{}", summary.description);
                println!();
                println!("{}", summary.extract);
                println!();
                println!("From Wikipedia: {}", summary.page_url);
            }
        }
        Commands::Revalidate { server, tag } => {
            let tag = tag.as_deref().unwrap_or(&config.cache_tag);
            let url = revalidate_url(server, tag)?;
            logger.info(&format!("♻️ Revalidating \"{}\" on {}", tag, server));

            let response = transport
                .client()
                .post(url)
                .send()
                .await
                .context("revalidate request failed")?
                .error_for_status()?;
            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    Ok(())
}
