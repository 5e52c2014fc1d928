use thiserror::Error;

/// FeedError covers every failure the race feed can report. None of them is fatal: fetch errors are
/// retried or surfaced on the board, page errors leave the cursor untouched, and persistence
/// errors are swallowed at the filter boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Network(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("no valid race data available ({rejected} of {batch_size} races rejected)")]
    NoValidData { batch_size: usize, rejected: usize },

    #[error("page {requested} is outside the valid range [1, {total_pages}]")]
    InvalidPageRequest { requested: usize, total_pages: usize },

    #[error("persisted filter state could not be read: {0}")]
    PersistenceRead(String),
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        FeedError::Network(err.to_string())
    }
}
