use rusqlite::ErrorCode;
use thiserror::Error;

/// Failure of a single poll. Anything returned here means nothing from that
/// poll was committed and no new-occurrence report exists for it.
#[derive(Debug, Error)]
pub enum PollError {
    #[error("malformed snapshot: {0}")]
    InputShape(String),

    #[error("match {0} has not been seeded")]
    MatchNotSeeded(u64),

    #[error("store timed out: {0}")]
    Timeout(String),

    #[error("store error: {0}")]
    Store(rusqlite::Error),

    #[error("type catalog error: {0}")]
    Catalog(String),

    #[error("invalid match seed: {0}")]
    Seed(String),

    #[error("snapshot fetch failed: {0}")]
    Source(String),
}

impl PollError {
    /// Failures the scheduler may simply retry on its next tick.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PollError::Timeout(_) | PollError::Source(_))
    }
}

impl From<rusqlite::Error> for PollError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(inner, _) = &err
            && matches!(
                inner.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            )
        {
            return PollError::Timeout(err.to_string());
        }
        PollError::Store(err)
    }
}

impl From<serde_json::Error> for PollError {
    fn from(err: serde_json::Error) -> Self {
        PollError::InputShape(err.to_string())
    }
}
