//! CSV output for row sets.
//!
//! Every file starts with a header row followed by one line per row. Dump
//! and per-article files use [`DOMAIN_COLUMNS`]; top-N files name their
//! first column `project` instead ([`PROJECT_COLUMNS`]). Field order is the
//! same either way. Absent byte counts are written as empty fields.
//!
//! The file is first written next to its destination with a `.tmp` suffix
//! and renamed into place, so a reader never observes a half-written file.

use crate::error::Result;
use crate::models::RowSet;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Header row of a CSV file.
pub type Columns = [&'static str; 5];

pub const DOMAIN_COLUMNS: Columns = ["domain_code", "page_title", "page_views", "bytes", "date"];
pub const PROJECT_COLUMNS: Columns = ["project", "page_title", "page_views", "bytes", "date"];

/// Serialize `rows` to CSV bytes, `columns` first.
pub fn to_csv_bytes(rows: &RowSet, columns: &Columns) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(columns)?;
    for row in rows.rows() {
        writer.serialize(row)?;
    }
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

/// Write `rows` to `path`, replacing any previous file.
#[instrument(level = "info", skip_all, fields(path = %path.display(), rows = rows.len()))]
pub async fn write_rows(rows: &RowSet, columns: &Columns, path: &Path) -> Result<()> {
    let bytes = to_csv_bytes(rows, columns)?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;

    info!("Wrote CSV file");
    Ok(())
}
