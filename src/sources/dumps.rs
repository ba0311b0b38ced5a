//! Hourly pageview dumps.
//!
//! Dumps are published once per hour at predictable addresses:
//!
//! ```text
//! <base>/2025/2025-10/pageviews-20251016-130000.gz
//! ```
//!
//! Each file is gzip-compressed text with one page per line:
//!
//! ```text
//! en Main_Page 242332 0
//! de Rust_(Programmiersprache) 310 0
//! ```
//!
//! Publication lags behind the clock, so [`find_latest_available`] walks
//! backward hour by hour until a HEAD request answers 200.

use crate::error::{PageviewError, Result};
use crate::models::{PageviewRow, RowDate, RowSet};
use crate::transport::Transport;
use crate::utils::truncate_to_hour;
use chrono::{DateTime, TimeDelta, Utc};
use flate2::read::MultiGzDecoder;
use std::io::Read;
use tracing::{debug, info, instrument};

/// A dump confirmed to exist, with the hour it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpLocation {
    pub url: String,
    pub hour: DateTime<Utc>,
}

/// Address of the dump covering `hour`.
pub fn dump_url(dumps_base: &str, hour: DateTime<Utc>) -> String {
    format!(
        "{}/{}",
        dumps_base.trim_end_matches('/'),
        hour.format("%Y/%Y-%m/pageviews-%Y%m%d-%H0000.gz")
    )
}

/// Find the most recent published dump before `reference`.
///
/// `reference` is truncated to its hour, then the hours `reference - 1h`
/// through `reference - max_hours_back h` are checked newest first. The first
/// dump that answers 200 wins and no older hour is requested.
///
/// Any other 4xx status means "not published" and the scan moves on. A 5xx
/// status (once the transport has given up retrying) aborts the scan with
/// [`PageviewError::Transport`], as do connection-level failures, so an
/// outage is never mistaken for a missing hour.
///
/// # Errors
///
/// [`PageviewError::NotFound`] carrying `max_hours_back` when no candidate exists.
#[instrument(level = "info", skip(transport, dumps_base))]
pub async fn find_latest_available<T: Transport>(
    transport: &T,
    dumps_base: &str,
    reference: DateTime<Utc>,
    max_hours_back: u32,
) -> Result<DumpLocation> {
    let reference_hour = truncate_to_hour(reference);

    for i in 1..=max_hours_back {
        let hour = reference_hour - TimeDelta::hours(i64::from(i));
        let url = dump_url(dumps_base, hour);
        info!(attempt = i, %url, "Trying dump");

        match transport.head(&url).await? {
            200 => {
                info!(%hour, "Found available dump");
                return Ok(DumpLocation { url, hour });
            }
            status if status >= 500 => {
                return Err(PageviewError::Transport {
                    status,
                    body: format!("existence check failed for {url}"),
                });
            }
            status => debug!(status, "Dump not published"),
        }
    }

    Err(PageviewError::NotFound {
        hours: max_hours_back,
    })
}

/// Download the dump at `url` and parse it, stamping every row with `hour`.
///
/// # Errors
///
/// - [`PageviewError::Transport`] for a non-success status
/// - [`PageviewError::Format`] when the body is not valid gzip
#[instrument(level = "info", skip(transport))]
pub async fn fetch_and_parse<T: Transport>(
    transport: &T,
    url: &str,
    hour: DateTime<Utc>,
) -> Result<RowSet> {
    info!("Downloading dump");
    let response = transport.get(url).await?;
    if !(200..300).contains(&response.status) {
        return Err(response.into_error());
    }
    info!(bytes = response.body.len(), "Downloaded dump");

    let rows = parse_dump(response.body.as_slice(), hour)?;
    info!(rows = rows.len(), %hour, "Parsed dump");
    Ok(rows)
}

/// Find the latest dump, then download and parse it.
pub async fn fetch_latest<T: Transport>(
    transport: &T,
    dumps_base: &str,
    reference: DateTime<Utc>,
    max_hours_back: u32,
) -> Result<(DumpLocation, RowSet)> {
    let location = find_latest_available(transport, dumps_base, reference, max_hours_back).await?;
    let rows = fetch_and_parse(transport, &location.url, location.hour).await?;
    Ok((location, rows))
}

/// Decompress and parse a dump body.
///
/// Lines that do not hold exactly four single-space separated fields, or whose
/// counts are not non-negative integers, are skipped. Only a broken gzip
/// stream fails the whole parse.
pub fn parse_dump<R: Read>(compressed: R, hour: DateTime<Utc>) -> Result<RowSet> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b' ')
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(MultiGzDecoder::new(compressed));

    let date = RowDate::Hour(hour);
    let mut record = csv::ByteRecord::new();
    let mut rows = Vec::new();
    let mut skipped = 0usize;

    loop {
        match reader.read_byte_record(&mut record) {
            Ok(false) => break,
            Ok(true) => match parse_line(&record, date) {
                Some(row) => rows.push(row),
                None => skipped += 1,
            },
            Err(e) => {
                return Err(PageviewError::Format(format!(
                    "cannot decompress dump: {e}"
                )));
            }
        }
    }

    debug!(parsed = rows.len(), skipped, "Dump lines processed");
    Ok(RowSet::new(rows))
}

fn parse_line(record: &csv::ByteRecord, date: RowDate) -> Option<PageviewRow> {
    if record.len() != 4 {
        return None;
    }
    Some(PageviewRow {
        domain_or_project: field(record, 0)?.to_string(),
        page_title: field(record, 1)?.to_string(),
        page_views: count(record, 2)?,
        byte_count: Some(count(record, 3)?),
        date,
    })
}

fn field(record: &csv::ByteRecord, i: usize) -> Option<&str> {
    std::str::from_utf8(record.get(i)?).ok()
}

fn count(record: &csv::ByteRecord, i: usize) -> Option<u64> {
    field(record, i)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;
    use chrono::TimeZone;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const BASE: &str = "https://dumps.test/other/pageviews";

    fn gzip(text: &str) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        encoder.finish().unwrap()
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 16, h, 0, 0).unwrap()
    }

    #[test]
    fn test_dump_url_is_zero_padded() {
        let hour = Utc.with_ymd_and_hms(2025, 3, 7, 4, 0, 0).unwrap();
        assert_eq!(
            dump_url(BASE, hour),
            "https://dumps.test/other/pageviews/2025/2025-03/pageviews-20250307-040000.gz"
        );
    }

    #[tokio::test]
    async fn test_scan_short_circuits_on_first_hit() {
        let reference = Utc.with_ymd_and_hms(2025, 10, 16, 12, 34, 56).unwrap();
        let hour_1 = dump_url(BASE, at(11));
        let hour_2 = dump_url(BASE, at(10));
        let hour_3 = dump_url(BASE, at(9));
        let mock = MockTransport::new()
            .respond(&hour_1, 404, "")
            .respond(&hour_2, 200, "")
            .respond(&hour_3, 200, "");

        let found = find_latest_available(&mock, BASE, reference, 6).await.unwrap();

        assert_eq!(found.url, hour_2);
        assert_eq!(found.hour, at(10));
        assert_eq!(
            mock.calls(),
            vec![format!("HEAD {hour_1}"), format!("HEAD {hour_2}")]
        );
    }

    #[tokio::test]
    async fn test_scan_exhaustion_reports_window() {
        let mock = MockTransport::new();
        let err = find_latest_available(&mock, BASE, at(12), 3)
            .await
            .unwrap_err();

        assert!(matches!(err, PageviewError::NotFound { hours: 3 }));
        assert_eq!(mock.calls().len(), 3);
        assert!(mock.calls()[2].ends_with("pageviews-20251016-090000.gz"));
    }

    #[tokio::test]
    async fn test_scan_zero_window_issues_no_requests() {
        let mock = MockTransport::new();
        let err = find_latest_available(&mock, BASE, at(12), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, PageviewError::NotFound { hours: 0 }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scan_crosses_midnight() {
        let reference = Utc.with_ymd_and_hms(2025, 11, 1, 0, 15, 0).unwrap();
        let mock = MockTransport::new().respond(
            &format!("{BASE}/2025/2025-10/pageviews-20251031-230000.gz"),
            200,
            "",
        );
        let found = find_latest_available(&mock, BASE, reference, 1).await.unwrap();
        assert_eq!(found.hour, Utc.with_ymd_and_hms(2025, 10, 31, 23, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_scan_server_error_is_not_absence() {
        let mock = MockTransport::new().respond(&dump_url(BASE, at(11)), 503, "");
        let err = find_latest_available(&mock, BASE, at(12), 6)
            .await
            .unwrap_err();
        assert!(matches!(err, PageviewError::Transport { status: 503, .. }));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_scan_connection_failure_aborts() {
        let mock = MockTransport::new()
            .fail(&dump_url(BASE, at(11)), std::io::ErrorKind::ConnectionReset)
            .respond(&dump_url(BASE, at(10)), 200, "");
        let err = find_latest_available(&mock, BASE, at(12), 6)
            .await
            .unwrap_err();
        assert!(matches!(err, PageviewError::Io(_)));
        assert_eq!(mock.calls(), vec![format!("HEAD {}", dump_url(BASE, at(11)))]);
    }

    #[test]
    fn test_malformed_lines_are_skipped() {
        let body = gzip("en Main_Page 10 2048\nen Broken_Page many 12\nde\nfr Page 1 2 3\n");
        let rows = parse_dump(body.as_slice(), at(5)).unwrap();

        assert_eq!(rows.len(), 1);
        let row = &rows.rows()[0];
        assert_eq!(row.domain_or_project, "en");
        assert_eq!(row.page_title, "Main_Page");
        assert_eq!(row.page_views, 10);
        assert_eq!(row.byte_count, Some(2048));
    }

    #[test]
    fn test_rows_are_stamped_with_requested_hour() {
        let body = gzip("en 2025-01-01 1 0\nde Zeit 7 0\r\nja 東京 3 0\n");
        let rows = parse_dump(body.as_slice(), at(13)).unwrap();

        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.date == RowDate::Hour(at(13))));
        assert_eq!(rows.rows()[2].page_title, "東京");
    }

    #[test]
    fn test_titles_with_quotes_are_kept() {
        let body = gzip("en \"Weird\"_Title 4 0\n");
        let rows = parse_dump(body.as_slice(), at(1)).unwrap();
        assert_eq!(rows.rows()[0].page_title, "\"Weird\"_Title");
    }

    #[test]
    fn test_invalid_utf8_line_is_skipped() {
        let mut raw = b"en Good 1 0\nen ".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe]);
        raw.extend_from_slice(b" 2 0\n");
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&raw).unwrap();
        let body = encoder.finish().unwrap();

        let rows = parse_dump(body.as_slice(), at(1)).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_not_gzip_is_format_error() {
        let err = parse_dump(&b"en Main_Page 1 0\n"[..], at(1)).unwrap_err();
        assert!(matches!(err, PageviewError::Format(_)));
    }

    #[tokio::test]
    async fn test_fetch_and_parse_rejects_error_status() {
        let url = dump_url(BASE, at(3));
        let mock = MockTransport::new().respond(&url, 403, "denied");
        let err = fetch_and_parse(&mock, &url, at(3)).await.unwrap_err();
        match err {
            PageviewError::Transport { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "denied");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_latest_finds_then_downloads() {
        let url = dump_url(BASE, at(11));
        let mock = MockTransport::new().respond(&url, 200, gzip("en A 1 10\nen B 2 20\n"));

        let (location, rows) = fetch_latest(&mock, BASE, at(12), 6).await.unwrap();

        assert_eq!(location.hour, at(11));
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.date == RowDate::Hour(at(11))));
        assert_eq!(mock.calls(), vec![format!("HEAD {url}"), format!("GET {url}")]);
    }
}
