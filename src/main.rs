//! # wiki_pageviews
//!
//! Fetches Wikipedia pageview statistics and writes them as CSV.
//!
//! ## Sources
//!
//! - **Hourly dumps**: the latest published `pageviews-YYYYMMDD-HH0000.gz`
//!   file, found by probing backward hour by hour
//! - **Per-article series**: daily or monthly views of one article from the
//!   Wikimedia metrics API
//! - **Top articles**: the most viewed articles of every day in a range
//!
//! ## Usage
//!
//! ```sh
//! wiki_pageviews dump --max-hours-back 6
//! wiki_pageviews article --title Apache_Airflow
//! wiki_pageviews top --start-date 2025-10-01 --end-date 2025-10-05
//! ```
//!
//! ## Architecture
//!
//! Each subcommand runs the same short pipeline:
//! 1. **Request**: build the URL(s) from the date parameters and fetch them
//!    through a retrying HTTP transport
//! 2. **Parse**: turn the gzip text or JSON body into a [`models::RowSet`]
//! 3. **Output**: log a preview and write one CSV file
//!
//! Nothing is written when a fetch fails.

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod error;
mod models;
mod outputs;
mod sources;
mod transport;
mod utils;

use cli::{ArticleArgs, Cli, Command, DumpArgs, TopArgs};
use models::RowSet;
use outputs::csv_file::{self, Columns, DOMAIN_COLUMNS, PROJECT_COLUMNS};
use outputs::{article_filename, dump_filename, log_preview, TOP_FILENAME};
use sources::per_article::ArticleQuery;
use sources::top::TopQuery;
use sources::{Endpoints, dumps, per_article, top};
use transport::Transport;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("wiki_pageviews starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let transport = args.client.build_transport()?;
    let endpoints = args.client.endpoints();
    let preview = args.client.preview;

    let result = match &args.command {
        Command::Dump(dump_args) => run_dump(&transport, &endpoints, dump_args, preview).await,
        Command::Article(article) => run_article(&transport, &endpoints, article, preview).await,
        Command::Top(top_args) => run_top(&transport, &endpoints, top_args, preview).await,
    };

    if let Err(e) = &result {
        error!(error = %e, "Fetch failed; no output written");
    }
    result?;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all)]
async fn run_dump<T: Transport>(
    transport: &T,
    endpoints: &Endpoints,
    args: &DumpArgs,
    preview: usize,
) -> error::Result<()> {
    // Early check: fail before any download if the output can't be written
    if !args.no_write {
        ensure_writable_dir(&args.output_dir).await?;
    }

    let reference = args.reference_time.unwrap_or_else(Utc::now);
    let (location, rows) =
        dumps::fetch_latest(transport, &endpoints.dumps_base, reference, args.max_hours_back)
            .await?;

    let filename = dump_filename(location.hour);
    finish(&rows, &DOMAIN_COLUMNS, preview, args.no_write, &args.output_dir, &filename).await
}

#[instrument(level = "info", skip_all, fields(title = %args.title))]
async fn run_article<T: Transport>(
    transport: &T,
    endpoints: &Endpoints,
    args: &ArticleArgs,
    preview: usize,
) -> error::Result<()> {
    if !args.no_write {
        ensure_writable_dir(&args.output_dir).await?;
    }

    let query = ArticleQuery {
        title: args.title.clone(),
        start: args.start,
        end: args.end,
        project: args.project.clone(),
        granularity: args.granularity,
    };
    let rows = per_article::fetch_article_series(transport, &endpoints.api_base, &query).await?;

    let filename = article_filename(&args.title, args.start, args.end);
    finish(&rows, &DOMAIN_COLUMNS, preview, args.no_write, &args.output_dir, &filename).await
}

#[instrument(level = "info", skip_all, fields(project = %args.project))]
async fn run_top<T: Transport>(
    transport: &T,
    endpoints: &Endpoints,
    args: &TopArgs,
    preview: usize,
) -> error::Result<()> {
    if !args.no_write {
        ensure_writable_dir(&args.output_dir).await?;
    }

    let query = TopQuery {
        project: args.project.clone(),
        access: args.access,
        start: args.start_date,
        end: args.end_date,
    };
    let rows = top::fetch_top_pages_for_range(transport, &endpoints.api_base, &query).await?;

    finish(&rows, &PROJECT_COLUMNS, preview, args.no_write, &args.output_dir, TOP_FILENAME).await
}

/// Log a preview of `rows` and, unless disabled, write them to `dir/filename`.
///
/// An empty set is still written, as a header-only file.
async fn finish(
    rows: &RowSet,
    columns: &Columns,
    preview: usize,
    no_write: bool,
    dir: &Path,
    filename: &str,
) -> error::Result<()> {
    if rows.is_empty() {
        warn!("Fetch complete but returned no rows");
    } else {
        info!(rows = rows.len(), "Fetch complete");
        log_preview(rows, preview);
    }

    if no_write {
        info!("Skipping output (--no-write)");
        return Ok(());
    }

    let path = dir.join(filename);
    csv_file::write_rows(rows, columns, &path).await?;
    info!(path = %path.display(), "Saved");
    Ok(())
}
