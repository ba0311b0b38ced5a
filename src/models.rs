//! Data models for pageview rows and the row sets produced by each fetch.
//!
//! This module defines the core data structures used throughout the application:
//! - [`PageviewRow`]: one page's view count for one hour or one day
//! - [`RowDate`]: the date quantum stamped on a row (an exact hour or a day)
//! - [`RowSet`]: the ordered, immutable result of a single fetch
//!
//! Rows serialize to CSV with the columns `domain_code`, `page_title`,
//! `page_views`, `bytes` and `date`.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

const HOUR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DAY_FORMAT: &str = "%Y-%m-%d";

/// The date associated with a row.
///
/// Dump rows carry the exact UTC hour of the dump file. Rows derived from the
/// metrics API carry the calendar day they were reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RowDate {
    Hour(DateTime<Utc>),
    Day(NaiveDate),
}

impl RowDate {
    /// Start instant of the quantum, used to order hours and days together.
    pub fn start(&self) -> NaiveDateTime {
        match self {
            RowDate::Hour(hour) => hour.naive_utc(),
            RowDate::Day(day) => day.and_time(chrono::NaiveTime::MIN),
        }
    }
}

impl fmt::Display for RowDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDate::Hour(hour) => write!(f, "{}", hour.format(HOUR_FORMAT)),
            RowDate::Day(day) => write!(f, "{}", day.format(DAY_FORMAT)),
        }
    }
}

impl FromStr for RowDate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(hour) = NaiveDateTime::parse_from_str(s, HOUR_FORMAT) {
            return Ok(RowDate::Hour(hour.and_utc()));
        }
        NaiveDate::parse_from_str(s, DAY_FORMAT)
            .map(RowDate::Day)
            .map_err(|e| format!("invalid row date {s:?}: {e}"))
    }
}

impl From<RowDate> for String {
    fn from(date: RowDate) -> Self {
        date.to_string()
    }
}

impl TryFrom<String> for RowDate {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// One page's view count for one date quantum.
///
/// # Fields
///
/// * `domain_or_project` - raw domain code for dump rows, the requested project otherwise
/// * `page_title` - the article identifier as the source spells it (underscores, not spaces)
/// * `page_views` - view count
/// * `byte_count` - response bytes, only present in dump rows
/// * `date` - hour or day the count belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageviewRow {
    #[serde(rename = "domain_code")]
    pub domain_or_project: String,
    pub page_title: String,
    pub page_views: u64,
    #[serde(rename = "bytes")]
    pub byte_count: Option<u64>,
    pub date: RowDate,
}

/// The ordered rows produced by one fetch.
///
/// Insertion order is source emission order. Once returned from a fetcher the
/// set is only read: logged, serialized or handed to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    rows: Vec<PageviewRow>,
}

impl RowSet {
    pub fn new(rows: Vec<PageviewRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[PageviewRow] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PageviewRow> {
        self.rows.iter()
    }

    /// Reorder by date ascending, then page views descending.
    ///
    /// The sort is stable, so rows tied on both keys keep their source order.
    pub fn sorted_by_date_then_views(mut self) -> Self {
        self.rows
            .sort_by_key(|row| (row.date.start(), Reverse(row.page_views)));
        self
    }
}

impl FromIterator<PageviewRow> for RowSet {
    fn from_iter<I: IntoIterator<Item = PageviewRow>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
