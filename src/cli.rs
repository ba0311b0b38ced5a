//! Command-line interface definitions for wiki_pageviews.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Client options are global and can also be provided via environment
//! variables; each data source is a subcommand.

use crate::error::Result;
use crate::sources::per_article::Granularity;
use crate::sources::top::Access;
use crate::sources::{DEFAULT_API_BASE_URL, DEFAULT_DUMPS_BASE_URL, Endpoints};
use crate::transport::{ReqwestTransport, RetryTransport};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "wiki_pageviews/",
    env!("CARGO_PKG_VERSION"),
    " (Wikipedia pageview statistics fetcher)"
);

/// Command-line arguments for the wiki_pageviews application.
///
/// # Examples
///
/// ```sh
/// # Latest hourly dump, looking back at most 6 hours
/// wiki_pageviews dump
///
/// # Daily views of one article
/// wiki_pageviews article --title Apache_Airflow --start 20250101 --end 20251001
///
/// # Top articles for a range of days, mobile web only
/// wiki_pageviews top --access mobile-web --start-date 2025-10-01 --end-date 2025-10-05
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    #[command(flatten)]
    pub client: ClientArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ClientArgs {
    /// User-Agent sent with every request
    #[arg(long, env = "WIKI_PAGEVIEWS_USER_AGENT", default_value = DEFAULT_USER_AGENT, global = true)]
    pub user_agent: String,

    /// Connect and per-read idle timeout in seconds
    #[arg(long, env = "WIKI_PAGEVIEWS_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub timeout_secs: u64,

    /// Retries for connection failures and 5xx responses
    #[arg(long, env = "WIKI_PAGEVIEWS_MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: usize,

    /// Root of the hourly dump tree
    #[arg(long, env = "WIKI_PAGEVIEWS_DUMPS_BASE_URL", default_value = DEFAULT_DUMPS_BASE_URL, value_parser = parse_base_url, global = true)]
    pub dumps_base_url: String,

    /// Root of the Wikimedia REST API
    #[arg(long, env = "WIKI_PAGEVIEWS_API_BASE_URL", default_value = DEFAULT_API_BASE_URL, value_parser = parse_base_url, global = true)]
    pub api_base_url: String,

    /// Number of fetched rows to log before writing
    #[arg(long, default_value_t = 5, global = true)]
    pub preview: usize,
}

impl ClientArgs {
    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.dumps_base_url, &self.api_base_url)
    }

    /// HTTP transport with the configured user agent, timeout and retry budget.
    pub fn build_transport(&self) -> Result<RetryTransport<ReqwestTransport>> {
        let inner = ReqwestTransport::new(&self.user_agent, Duration::from_secs(self.timeout_secs))?;
        Ok(RetryTransport::new(
            inner,
            self.max_retries,
            Duration::from_secs(1),
        ))
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch the latest available hourly dump of all pages
    Dump(DumpArgs),
    /// Fetch the view series of a single article
    Article(ArticleArgs),
    /// Fetch the most viewed articles for every day of a range
    Top(TopArgs),
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// How many hours to look back for a published dump
    #[arg(long, default_value_t = 6)]
    pub max_hours_back: u32,

    /// Reference time (RFC 3339); defaults to now
    #[arg(long)]
    pub reference_time: Option<DateTime<Utc>>,

    /// Output directory for the CSV file
    #[arg(short, long, default_value = "dumps")]
    pub output_dir: PathBuf,

    /// Fetch and preview without writing a file
    #[arg(long)]
    pub no_write: bool,
}

#[derive(Args, Debug)]
pub struct ArticleArgs {
    /// Article title, with underscores instead of spaces
    #[arg(short, long)]
    pub title: String,

    /// First day of the range (YYYYMMDD)
    #[arg(long, default_value = "20250101", value_parser = parse_compact_date)]
    pub start: NaiveDate,

    /// Last day of the range (YYYYMMDD)
    #[arg(long, default_value = "20251001", value_parser = parse_compact_date)]
    pub end: NaiveDate,

    /// Wiki project
    #[arg(short, long, default_value = "en.wikipedia")]
    pub project: String,

    #[arg(short, long, value_enum, default_value_t = Granularity::Daily)]
    pub granularity: Granularity,

    /// Output directory for the CSV file
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Fetch and preview without writing a file
    #[arg(long)]
    pub no_write: bool,
}

#[derive(Args, Debug)]
pub struct TopArgs {
    /// Wiki project
    #[arg(short, long, default_value = "en.wikipedia")]
    pub project: String,

    /// Traffic segment
    #[arg(short, long, value_enum, default_value_t = Access::AllAccess)]
    pub access: Access,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long, env = "TOP_START_DATE", default_value = "2025-10-01")]
    pub start_date: NaiveDate,

    /// Last day of the range (YYYY-MM-DD)
    #[arg(long, env = "TOP_END_DATE", default_value = "2025-10-05")]
    pub end_date: NaiveDate,

    /// Output directory for the CSV file
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Fetch and preview without writing a file
    #[arg(long)]
    pub no_write: bool,
}

fn parse_compact_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y%m%d").map_err(|e| format!("expected YYYYMMDD: {e}"))
}

fn parse_base_url(s: &str) -> std::result::Result<String, String> {
    let url = Url::parse(s).map_err(|e| e.to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(s.trim_end_matches('/').to_string()),
        other => Err(format!("unsupported scheme {other:?}")),
    }
}
