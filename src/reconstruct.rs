//! Archive reconstruction.
//!
//! Rebuilds the nested comment tree of an archived page from its flattened
//! rows. Traversal is breadth-first over the stored parent edges; children
//! are ranked by score at read time, independent of stored arrival order.
//! The traversal always terminates: the queue grows only by already
//! persisted children, and parent edges were written as a DAG rooted at the
//! page.

use std::collections::VecDeque;

use sqlx::{Row, SqlitePool};

use crate::error::ArchiveError;
use crate::models::{ArchiveLink, ArchivedThread, CommentView, ThreadPage};

/// Load the most recent archive of `(thread_id, anchor)` and rebuild its
/// comment tree. `Ok(None)` means the page was never archived, which is not
/// an error.
pub async fn load_archive(
    pool: &SqlitePool,
    thread_id: &str,
    anchor: &str,
) -> Result<Option<ArchivedThread>, ArchiveError> {
    let page = match load_page(pool, thread_id, anchor).await? {
        Some(page) => page,
        None => return Ok(None),
    };

    let replies = load_comment_tree(pool, page.key).await?;

    Ok(Some(ArchivedThread {
        thread_id: page.thread_id,
        anchor: page.continuing_reply,
        sub: page.sub,
        title: page.title,
        content: page.content,
        content_link: page.content_link,
        author: page.author,
        timestamp: page.timestamp,
        archive_timestamp: page.archive_timestamp,
        replies,
    }))
}

/// The most recent true-root archives, newest first.
pub async fn latest_archives(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<ArchiveLink>, ArchiveError> {
    let rows = sqlx::query(
        r#"
        SELECT thread_id, title, sub, archive_timestamp
        FROM threads
        WHERE continuing_reply = ''
        ORDER BY archive_timestamp DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| ArchiveLink {
            thread_id: row.get("thread_id"),
            title: row.get("title"),
            sub: row.get("sub"),
            archive_timestamp: row.get("archive_timestamp"),
        })
        .collect())
}

/// Point lookup of the newest stored page for `(thread_id, anchor)`.
async fn load_page(
    pool: &SqlitePool,
    thread_id: &str,
    anchor: &str,
) -> Result<Option<ThreadPage>, ArchiveError> {
    let row = sqlx::query(
        r#"
        SELECT id, thread_id, continuing_reply, replies_num, sub, title,
               content, content_link, author, timestamp, archive_timestamp
        FROM threads
        WHERE thread_id = ? AND continuing_reply = ?
        ORDER BY archive_timestamp DESC
        LIMIT 1
        "#,
    )
    .bind(thread_id)
    .bind(anchor)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|row| ThreadPage {
        key: row.get("id"),
        thread_id: row.get("thread_id"),
        continuing_reply: row.get("continuing_reply"),
        replies_num: row.get("replies_num"),
        sub: row.get("sub"),
        title: row.get("title"),
        content: row.get("content"),
        content_link: row.get("content_link"),
        author: row.get("author"),
        timestamp: row.get("timestamp"),
        archive_timestamp: row.get("archive_timestamp"),
    }))
}

/// Breadth-first expansion of the stored parent edges into a nested tree.
///
/// Nodes land in a slab in visit order, so every child's slot index is
/// greater than its parent's; a single reverse pass then moves each node
/// into its parent without revisiting anything.
async fn load_comment_tree(
    pool: &SqlitePool,
    thread_key: i64,
) -> Result<Vec<CommentView>, ArchiveError> {
    let mut nodes: Vec<Option<CommentView>> = Vec::new();
    let mut children: Vec<Vec<usize>> = Vec::new();
    let mut top_level: Vec<usize> = Vec::new();

    // (parent row id for the query, parent slot); the root sentinel has
    // neither.
    let mut queue: VecDeque<(Option<i64>, Option<usize>)> = VecDeque::new();
    queue.push_back((None, None));

    while let Some((parent_key, parent_slot)) = queue.pop_front() {
        let rows = sqlx::query(
            r#"
            SELECT id, comment_id, content, author, timestamp, continues, score
            FROM comments
            WHERE thread_key = ? AND parent_id IS ?
            ORDER BY score DESC
            "#,
        )
        .bind(thread_key)
        .bind(parent_key)
        .fetch_all(pool)
        .await?;

        for row in rows {
            let row_key: i64 = row.get("id");
            let slot = nodes.len();

            nodes.push(Some(CommentView {
                comment_id: row.get("comment_id"),
                content: row.get("content"),
                author: row.get("author"),
                timestamp: row.get("timestamp"),
                score: row.get("score"),
                continues: row.get("continues"),
                replies: Vec::new(),
            }));
            children.push(Vec::new());

            match parent_slot {
                Some(parent) => children[parent].push(slot),
                None => top_level.push(slot),
            }

            queue.push_back((Some(row_key), Some(slot)));
        }
    }

    // Materialize bottom-up; child lists keep their score order.
    for slot in (0..nodes.len()).rev() {
        let mut replies = Vec::new();
        for child in std::mem::take(&mut children[slot]) {
            if let Some(view) = nodes[child].take() {
                replies.push(view);
            }
        }
        if let Some(node) = nodes[slot].as_mut() {
            node.replies = replies;
        }
    }

    Ok(top_level
        .into_iter()
        .filter_map(|slot| nodes[slot].take())
        .collect())
}
