//! Error taxonomy shared by every fetcher.
//!
//! The three domain failures are [`PageviewError::NotFound`],
//! [`PageviewError::Transport`] and [`PageviewError::Format`]. The remaining
//! variants wrap infrastructure errors so they can travel through `?`.

#[derive(Debug, thiserror::Error)]
pub enum PageviewError {
    /// No dump answered within the look-back window.
    #[error("no available dumps found in the last {hours} hours")]
    NotFound { hours: u32 },

    /// The server answered with a status that is not treated as benign.
    #[error("unexpected HTTP status {status}: {body}")]
    Transport { status: u16, body: String },

    /// The body could not be decompressed or did not match the expected schema.
    #[error("malformed response: {0}")]
    Format(String),

    /// Connection-level failure (DNS, TLS, timeout, reset).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PageviewError {
    /// Whether a retry has a chance of producing a different outcome.
    pub fn is_transient(&self) -> bool {
        match self {
            PageviewError::Http(_) => true,
            PageviewError::Transport { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, PageviewError>;
