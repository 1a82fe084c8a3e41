//! Core data types flowing through ingestion and reconstruction.

use serde::Serialize;

/// A stored thread page row: either a true root post or a continuation page
/// rooted at an anchor comment.
#[derive(Debug, Clone)]
pub struct ThreadPage {
    /// Internal surrogate key (`thread_key` on the comments side).
    pub key: i64,
    pub thread_id: String,
    /// Anchor comment's external id, or empty for a true root.
    pub continuing_reply: String,
    pub replies_num: i64,
    pub sub: String,
    pub title: String,
    pub content: String,
    pub content_link: String,
    pub author: String,
    /// Original post creation time (external clock).
    pub timestamp: i64,
    /// Local wall time at ingestion.
    pub archive_timestamp: i64,
}

/// A reconstructed comment with its replies ranked by score.
#[derive(Debug, Clone, Serialize)]
pub struct CommentView {
    pub comment_id: String,
    pub content: String,
    pub author: String,
    pub timestamp: i64,
    pub score: i64,
    /// True when the stored reply list was truncated externally and a
    /// continuation page anchored at this comment may exist.
    pub continues: bool,
    pub replies: Vec<CommentView>,
}

/// A fully reconstructed archive page: thread metadata plus the ranked tree.
#[derive(Debug, Clone, Serialize)]
pub struct ArchivedThread {
    pub thread_id: String,
    /// Anchor this page was reconstructed at; empty for the root page.
    pub anchor: String,
    pub sub: String,
    pub title: String,
    pub content: String,
    pub content_link: String,
    pub author: String,
    pub timestamp: i64,
    pub archive_timestamp: i64,
    pub replies: Vec<CommentView>,
}

/// One entry of the latest-archives listing.
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveLink {
    pub thread_id: String,
    pub title: String,
    pub sub: String,
    pub archive_timestamp: i64,
}
