use thiserror::Error;

/// Failures of a recommendation operation.
///
/// "Nothing to recommend yet" is not an error; see
/// [`crate::engine::Recommendation`].
#[derive(Debug, Error)]
pub enum RecommendError {
    /// Smart playlist criteria that cannot be satisfied by construction.
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A history, catalog or playlist read/write failed. Not retried.
    #[error("Store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl RecommendError {
    /// True for errors caused by the caller's input rather than the store.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidCriteria(_) | Self::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
