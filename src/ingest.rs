//! Archive ingestion.
//!
//! Flattens a fetched thread document into relational rows inside one write
//! transaction: a thread row per page, a comment row per visited node.
//! Continuation pages discovered mid-traversal are fetched inline and
//! ingested recursively under the same open transaction, so a request either
//! commits a complete snapshot or nothing at all.
//!
//! Comments are stored in arrival order; the score ranking shown to readers
//! is applied at reconstruction time only.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::task::JoinHandle;

use crate::db::WriteScope;
use crate::document::{ReplyNode, ThreadDoc};
use crate::error::ArchiveError;
use crate::fetch::{ThreadFetcher, ThreadRequest};

type IngestFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ArchiveError>> + Send + 'a>>;

/// Accepts archive requests, guards against duplicates, and runs the actual
/// ingestion in the background.
pub struct Archiver {
    write: SqlitePool,
    read: SqlitePool,
    fetcher: Arc<dyn ThreadFetcher>,
    max_depth: usize,
}

/// Handle to one submitted archive run. The request was already acknowledged
/// when the ticket existed; completion and failure are observable only here
/// and in the logs.
#[derive(Debug)]
pub struct ArchiveTicket {
    handle: JoinHandle<Result<(), ArchiveError>>,
}

impl ArchiveTicket {
    /// Await completion of the background ingestion. Used by the CLI and by
    /// tests; the HTTP layer drops the ticket after acknowledging.
    pub async fn wait(self) -> Result<(), ArchiveError> {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Err(ArchiveError::Task(join_err.to_string())),
        }
    }
}

impl Archiver {
    pub fn new(
        write: SqlitePool,
        read: SqlitePool,
        fetcher: Arc<dyn ThreadFetcher>,
        max_depth: usize,
    ) -> Self {
        Self {
            write,
            read,
            fetcher,
            max_depth,
        }
    }

    /// Monotonic freshness check: the thread counts as already archived
    /// unless the new observation strictly exceeds every stored reply count
    /// for it.
    pub async fn already_archived(
        &self,
        thread_id: &str,
        replies_num: i64,
    ) -> Result<bool, ArchiveError> {
        let hit: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM threads WHERE thread_id = ? AND replies_num >= ? LIMIT 1")
                .bind(thread_id)
                .bind(replies_num)
                .fetch_optional(&self.read)
                .await?;

        Ok(hit.is_some())
    }

    /// Validate and enqueue one archive request.
    ///
    /// Returns as soon as the document passes the duplicate guard; the
    /// returned ticket resolves when the background ingestion finishes.
    /// Callers that only need the acknowledgment drop the ticket.
    pub async fn submit(&self, sub: &str, document: Vec<u8>) -> Result<ArchiveTicket, ArchiveError> {
        let doc = ThreadDoc::parse(&document)?;

        if self.already_archived(&doc.root_id(), doc.replies_num()).await? {
            return Err(ArchiveError::Duplicate);
        }

        let write = self.write.clone();
        let fetcher = Arc::clone(&self.fetcher);
        let sub = sub.to_string();
        let max_depth = self.max_depth;

        let handle = tokio::spawn(async move {
            let outcome = archive_document(&write, fetcher.as_ref(), &doc, &sub, max_depth).await;
            if let Err(ref err) = outcome {
                tracing::error!(sub = %sub, error = %err, "archive run failed");
            }
            outcome
        });

        Ok(ArchiveTicket { handle })
    }
}

/// Run one archive request to completion: open a scope, ingest, then commit
/// or roll back. Exactly one of the two happens on every path.
async fn archive_document(
    pool: &SqlitePool,
    fetcher: &dyn ThreadFetcher,
    doc: &ThreadDoc,
    sub: &str,
    max_depth: usize,
) -> Result<(), ArchiveError> {
    let mut scope = WriteScope::open(pool).await?;

    match ingest_thread(&mut scope, fetcher, doc, sub, "", max_depth).await {
        Ok(()) => {
            scope.commit().await?;
            Ok(())
        }
        Err(err) => {
            if let Err(abort_err) = scope.abort().await {
                tracing::error!(error = %abort_err, "rollback failed");
            }
            Err(err)
        }
    }
}

/// Insert one thread page row and ingest its reply forest.
///
/// `continuing_from` is empty for a true root page and carries the anchor
/// comment's external id for a continuation page. Every row lands in the
/// caller's scope; this function never commits or rolls back itself.
pub fn ingest_thread<'a>(
    scope: &'a mut WriteScope,
    fetcher: &'a dyn ThreadFetcher,
    doc: &'a ThreadDoc,
    sub: &'a str,
    continuing_from: &'a str,
    max_depth: usize,
) -> IngestFuture<'a, ()> {
    Box::pin(async move {
        let thread_id = doc.root_id();

        let result = sqlx::query(
            r#"
            INSERT INTO threads (
                thread_id,
                continuing_reply,
                replies_num,
                title,
                content,
                content_link,
                author,
                sub,
                timestamp,
                archive_timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&thread_id)
        .bind(continuing_from)
        .bind(doc.replies_num())
        .bind(doc.title())
        .bind(doc.content())
        .bind(doc.content_link())
        .bind(doc.author())
        .bind(sub)
        .bind(doc.created_at())
        .bind(chrono::Utc::now().timestamp())
        .execute(scope.conn())
        .await?;
        let thread_key = result.last_insert_rowid();

        tracing::info!(thread_id = %thread_id, sub = %sub, "archived thread page");

        for node in doc.replies() {
            ingest_comment(
                scope, fetcher, node, &thread_id, thread_key, sub, None, 0, max_depth,
            )
            .await?;
        }

        Ok(())
    })
}

/// Insert one comment row, then either recurse into its replies or, when the
/// reply list was truncated externally, fetch the continuation page and
/// ingest it as its own thread page under the same scope.
///
/// Returns the inserted row id, or `None` when the depth ceiling dropped the
/// node (truncation alone is not an error). The first persistence failure
/// anywhere unwinds the whole run for rollback.
#[allow(clippy::too_many_arguments)]
pub fn ingest_comment<'a>(
    scope: &'a mut WriteScope,
    fetcher: &'a dyn ThreadFetcher,
    node: ReplyNode<'a>,
    thread_id: &'a str,
    thread_key: i64,
    sub: &'a str,
    parent_id: Option<i64>,
    depth: usize,
    max_depth: usize,
) -> IngestFuture<'a, Option<i64>> {
    Box::pin(async move {
        if depth == max_depth {
            return Ok(None);
        }

        let comment_id = node.external_id();
        let continues = node.has_continuation();

        let result = sqlx::query(
            r#"
            INSERT INTO comments (
                comment_id,
                content,
                author,
                thread_key,
                parent_id,
                timestamp,
                continues,
                score
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&comment_id)
        .bind(node.content())
        .bind(node.author())
        .bind(thread_key)
        .bind(parent_id)
        .bind(node.created_at())
        .bind(continues)
        .bind(node.score())
        .execute(scope.conn())
        .await?;
        let inserted = result.last_insert_rowid();

        if continues {
            // The reply list continues in a separately fetched page rooted at
            // this comment. A failed fetch truncates only this branch; the
            // rest of the tree still commits.
            let request = ThreadRequest::continuation(sub, thread_id, &comment_id);
            match fetcher.fetch(&request).await {
                Ok(bytes) => match ThreadDoc::parse(&bytes) {
                    Ok(page) => {
                        ingest_thread(scope, fetcher, &page, sub, &comment_id, max_depth).await?;
                    }
                    Err(err) => {
                        tracing::warn!(
                            comment_id = %comment_id,
                            error = %err,
                            "skipping unparseable continuation page"
                        );
                    }
                },
                Err(err) => {
                    tracing::warn!(
                        comment_id = %comment_id,
                        error = %err,
                        "continuation fetch failed"
                    );
                }
            }
        } else {
            for reply in node.replies() {
                ingest_comment(
                    scope,
                    fetcher,
                    reply,
                    thread_id,
                    thread_key,
                    sub,
                    Some(inserted),
                    depth + 1,
                    max_depth,
                )
                .await?;
            }
        }

        Ok(Some(inserted))
    })
}
