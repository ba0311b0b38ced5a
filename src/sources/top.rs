//! Most-viewed articles per day from the Wikimedia metrics API.
//!
//! The endpoint answers one day at a time:
//!
//! ```text
//! <api>/metrics/pageviews/top/en.wikipedia/all-access/2025/10/01
//! ```
//!
//! Days the API has no data for answer 404 and are skipped.

use crate::error::{PageviewError, Result};
use crate::models::{PageviewRow, RowDate, RowSet};
use crate::sources::decode_json;
use crate::transport::Transport;
use crate::utils::days_inclusive;
use chrono::NaiveDate;
use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;
use tracing::{info, instrument};

/// Traffic segment of a top-articles query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Access {
    AllAccess,
    Desktop,
    MobileApp,
    MobileWeb,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::AllAccess => "all-access",
            Access::Desktop => "desktop",
            Access::MobileApp => "mobile-app",
            Access::MobileWeb => "mobile-web",
        }
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct TopQuery {
    pub project: String,
    pub access: Access,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct TopResponse {
    items: Vec<TopItem>,
}

#[derive(Debug, Deserialize)]
struct TopItem {
    articles: Vec<TopArticle>,
}

#[derive(Debug, Deserialize)]
struct TopArticle {
    article: String,
    views: u64,
}

pub fn top_url(api_base: &str, project: &str, access: Access, day: NaiveDate) -> String {
    format!(
        "{}/metrics/pageviews/top/{}/{}/{}",
        api_base.trim_end_matches('/'),
        project,
        access,
        day.format("%Y/%m/%d")
    )
}

/// Fetch the top articles for every day of `query`, sorted by day then views.
///
/// Days are requested one after another in ascending order. A 404 means the
/// API has nothing for that day and the day contributes no rows; any other
/// non-200 status aborts the whole range. An inverted range returns an empty
/// set without issuing requests.
///
/// # Errors
///
/// - [`PageviewError::Transport`] for a non-200, non-404 status
/// - [`PageviewError::Format`] when `items[0].articles` is missing
#[instrument(level = "info", skip(transport, api_base))]
pub async fn fetch_top_pages_for_range<T: Transport>(
    transport: &T,
    api_base: &str,
    query: &TopQuery,
) -> Result<RowSet> {
    let mut rows = Vec::new();

    for day in days_inclusive(query.start, query.end) {
        let url = top_url(api_base, &query.project, query.access, day);
        info!(%day, "Fetching top articles");

        let response = transport.get(&url).await?;
        match response.status {
            200 => {}
            404 => {
                info!(%day, "No data for day; skipping");
                continue;
            }
            _ => return Err(response.into_error()),
        }

        let decoded: TopResponse = decode_json(&response.body, "top articles")?;
        let first = decoded.items.into_iter().next().ok_or_else(|| {
            PageviewError::Format(format!("top articles for {day} has no items"))
        })?;

        let before = rows.len();
        rows.extend(first.articles.into_iter().map(|article| PageviewRow {
            domain_or_project: query.project.clone(),
            page_title: article.article,
            page_views: article.views,
            byte_count: None,
            date: RowDate::Day(day),
        }));
        info!(%day, rows = rows.len() - before, "Collected top articles");
    }

    let rows = RowSet::new(rows).sorted_by_date_then_views();
    info!(rows = rows.len(), "Top articles collected for range");
    Ok(rows)
}
