//! Per-article pageview time series from the Wikimedia metrics API.
//!
//! One request covers the whole date range:
//!
//! ```text
//! <api>/metrics/pageviews/per-article/en.wikipedia/all-access/all-agents/Apache_Airflow/daily/20250101/20251001
//! ```

use crate::error::{PageviewError, Result};
use crate::models::{PageviewRow, RowDate, RowSet};
use crate::sources::decode_json;
use crate::transport::Transport;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use tracing::{info, instrument};

/// Fixed qualifiers: every access method, every agent type.
const ACCESS: &str = "all-access";
const AGENT: &str = "all-agents";

/// Time-bucket size of a per-article query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Granularity {
    Daily,
    Monthly,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of a per-article series request.
#[derive(Debug, Clone)]
pub struct ArticleQuery {
    /// Article title with underscores instead of spaces.
    pub title: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Wiki project, e.g. `en.wikipedia`.
    pub project: String,
    pub granularity: Granularity,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    items: Vec<SeriesItem>,
}

#[derive(Debug, Deserialize)]
struct SeriesItem {
    article: String,
    views: u64,
    /// `YYYYMMDDHH`; only the date prefix is used.
    timestamp: String,
}

/// Endpoint URL for `query`. The title is percent-encoded as one path segment.
pub fn per_article_url(api_base: &str, query: &ArticleQuery) -> String {
    format!(
        "{}/metrics/pageviews/per-article/{}/{}/{}/{}/{}/{}/{}",
        api_base.trim_end_matches('/'),
        query.project,
        ACCESS,
        AGENT,
        urlencoding::encode(&query.title),
        query.granularity,
        query.start.format("%Y%m%d"),
        query.end.format("%Y%m%d"),
    )
}

/// Fetch the view series of one article.
///
/// Rows come back in the order the API lists them. A response without an
/// `items` list is an empty series.
///
/// # Errors
///
/// - [`PageviewError::Transport`] for any status other than 200
/// - [`PageviewError::Format`] when an item lacks a required key or its
///   timestamp does not start with `YYYYMMDD`
#[instrument(level = "info", skip(transport, api_base), fields(title = %query.title))]
pub async fn fetch_article_series<T: Transport>(
    transport: &T,
    api_base: &str,
    query: &ArticleQuery,
) -> Result<RowSet> {
    let url = per_article_url(api_base, query);
    info!(%url, "Fetching article series");

    let response = transport.get(&url).await?;
    if !response.is_ok() {
        return Err(response.into_error());
    }

    let decoded: SeriesResponse = decode_json(&response.body, "per-article")?;
    let rows = decoded
        .items
        .into_iter()
        .map(|item| {
            Ok(PageviewRow {
                domain_or_project: query.project.clone(),
                date: RowDate::Day(item_date(&item.timestamp)?),
                page_title: item.article,
                page_views: item.views,
                byte_count: None,
            })
        })
        .collect::<Result<RowSet>>()?;

    info!(rows = rows.len(), "Parsed article series");
    Ok(rows)
}

fn item_date(timestamp: &str) -> Result<NaiveDate> {
    timestamp
        .get(..8)
        .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y%m%d").ok())
        .ok_or_else(|| PageviewError::Format(format!("invalid item timestamp {timestamp:?}")))
}
