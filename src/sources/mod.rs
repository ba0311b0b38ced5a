//! Pageview sources and the fetchers that turn them into [`RowSet`]s.
//!
//! # Supported Sources
//!
//! | Source | Module | Format | Notes |
//! |--------|--------|--------|-------|
//! | Hourly dumps | [`dumps`] | gzip + space-delimited text | Steps backward to the latest published hour |
//! | Per-article series | [`per_article`] | JSON | One request for the whole range |
//! | Top articles per day | [`top`] | JSON | One request per day, missing days skipped |
//!
//! Every fetcher takes a [`Transport`](crate::transport::Transport) so tests can
//! script responses, and an [`Endpoints`] so the base URLs can be redirected.
//!
//! [`RowSet`]: crate::models::RowSet

use crate::error::{PageviewError, Result};
use serde::de::DeserializeOwned;

pub mod dumps;
pub mod per_article;
pub mod top;

pub const DEFAULT_DUMPS_BASE_URL: &str = "https://dumps.wikimedia.org/other/pageviews";
pub const DEFAULT_API_BASE_URL: &str = "https://wikimedia.org/api/rest_v1";

/// Base URLs of the two upstream services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// Root of the hourly dump tree, without a trailing slash.
    pub dumps_base: String,
    /// Root of the REST API, without a trailing slash.
    pub api_base: String,
}

impl Endpoints {
    pub fn new(dumps_base: &str, api_base: &str) -> Self {
        Self {
            dumps_base: dumps_base.trim_end_matches('/').to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_DUMPS_BASE_URL, DEFAULT_API_BASE_URL)
    }
}

/// Decode a JSON body against an explicit schema.
///
/// Missing required keys and type mismatches become [`PageviewError::Format`].
pub(crate) fn decode_json<D: DeserializeOwned>(body: &[u8], what: &str) -> Result<D> {
    serde_json::from_slice(body)
        .map_err(|e| PageviewError::Format(format!("unexpected {what} response: {e}")))
}
