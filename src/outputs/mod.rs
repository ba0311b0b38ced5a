//! Output generation for fetched row sets.
//!
//! # Submodules
//!
//! - [`csv_file`]: Writes a [`RowSet`] to a CSV file
//!
//! # Output Structure
//!
//! ```text
//! dumps/
//! └── wikipedia_pageviews_20251016_13.csv     # one hourly dump
//!
//! output/
//! ├── pageviews_Apache_Airflow_20250101_20251001.csv
//! └── top_wikipedia_pages.csv
//! ```

use crate::models::RowSet;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::info;

pub mod csv_file;

/// File name for a dump fetched for `hour`, e.g. `wikipedia_pageviews_20251016_13.csv`.
pub fn dump_filename(hour: DateTime<Utc>) -> String {
    format!("wikipedia_pageviews_{}.csv", hour.format("%Y%m%d_%H"))
}

/// File name for a per-article series.
///
/// Characters that cannot appear in a file name are replaced with `_`.
pub fn article_filename(title: &str, start: NaiveDate, end: NaiveDate) -> String {
    let safe: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    format!(
        "pageviews_{}_{}_{}.csv",
        safe,
        start.format("%Y%m%d"),
        end.format("%Y%m%d")
    )
}

pub const TOP_FILENAME: &str = "top_wikipedia_pages.csv";

/// Log the first `limit` rows so a run shows what it fetched.
pub fn log_preview(rows: &RowSet, limit: usize) {
    for (i, row) in rows.iter().take(limit).enumerate() {
        info!(
            index = i,
            domain = %row.domain_or_project,
            title = %row.page_title,
            views = row.page_views,
            bytes = ?row.byte_count,
            date = %row.date,
            "Preview"
        );
    }
}
