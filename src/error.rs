use thiserror::Error;

/// Errors produced while fetching, ingesting, or reconstructing archives.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The thread is already stored with an equal or greater reply count.
    /// Expected condition, reported to the caller rather than logged as a
    /// system error.
    #[error("thread is already archived")]
    Duplicate,

    /// Prepare/exec/scan failure. Always aborts the enclosing transaction.
    #[error("storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    /// The content API answered with a non-success status.
    #[error("upstream responded with status {0}")]
    UpstreamStatus(u16),

    /// Network, timeout, or body-read failure while talking to the content API.
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// The fetched document is not a thread listing at all.
    #[error("malformed thread document: {0}")]
    Document(String),

    /// The background archive task was aborted or panicked.
    #[error("archive task aborted: {0}")]
    Task(String),
}
