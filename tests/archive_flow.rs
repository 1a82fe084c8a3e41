//! End-to-end archive properties: ingest synthetic thread documents through
//! the real write path and check what reconstruction returns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tempfile::TempDir;

use threadkeep::config::Config;
use threadkeep::db;
use threadkeep::error::ArchiveError;
use threadkeep::fetch::{ThreadFetcher, ThreadRequest};
use threadkeep::html;
use threadkeep::ingest::Archiver;
use threadkeep::migrate;
use threadkeep::reconstruct;

/// Serves canned continuation pages keyed by anchor id; a missing key
/// behaves like an upstream failure.
#[derive(Default)]
struct StubFetcher {
    pages: HashMap<String, Vec<u8>>,
}

#[async_trait]
impl ThreadFetcher for StubFetcher {
    async fn fetch(&self, request: &ThreadRequest) -> Result<Vec<u8>, ArchiveError> {
        let key = request.anchor.clone().unwrap_or_default();
        self.pages
            .get(&key)
            .cloned()
            .ok_or(ArchiveError::UpstreamStatus(404))
    }
}

fn comment(id: &str, score: i64, body: &str, replies: Vec<Value>) -> Value {
    // The source API encodes an empty reply list as an empty string.
    let replies_value = if replies.is_empty() {
        json!("")
    } else {
        json!({ "data": { "children": replies } })
    };

    json!({
        "kind": "t1",
        "data": {
            "id": id,
            "body_html": body,
            "author": format!("user_{}", id),
            "created": 1_700_000_000,
            "score": score,
            "replies": replies_value
        }
    })
}

fn continuation_marker() -> Value {
    json!({ "kind": "more", "data": { "children": [] } })
}

fn listing(thread_id: &str, title: &str, num_comments: i64, comments: Vec<Value>) -> Vec<u8> {
    serde_json::to_vec(&json!([
        {
            "data": {
                "children": [
                    {
                        "data": {
                            "id": thread_id,
                            "title": title,
                            "selftext_html": "&lt;p&gt;hello&lt;/p&gt;",
                            "url_overridden_by_dest": "https://example.com/x",
                            "author": "op_author",
                            "num_comments": num_comments,
                            "created": 1_700_000_000.0
                        }
                    }
                ]
            }
        },
        { "data": { "children": comments } }
    ]))
    .unwrap()
}

async fn setup() -> (TempDir, SqlitePool, SqlitePool) {
    let dir = TempDir::new().unwrap();
    let config: Config = toml::from_str(&format!(
        r#"
        [db]
        path = "{}/archive.sqlite"

        [server]
        bind = "127.0.0.1:0"
        "#,
        dir.path().display()
    ))
    .unwrap();

    let write = db::connect_write(&config).await.unwrap();
    migrate::init_schema(&write).await.unwrap();
    let read = db::connect_read(&config).await.unwrap();

    (dir, write, read)
}

fn archiver(write: SqlitePool, read: SqlitePool, max_depth: usize) -> Archiver {
    Archiver::new(write, read, Arc::new(StubFetcher::default()), max_depth)
}

fn archiver_with_pages(
    write: SqlitePool,
    read: SqlitePool,
    pages: HashMap<String, Vec<u8>>,
) -> Archiver {
    Archiver::new(write, read, Arc::new(StubFetcher { pages }), 100)
}

async fn comment_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM comments")
        .fetch_one(pool)
        .await
        .unwrap()
}

async fn thread_count(pool: &SqlitePool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM threads")
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn round_trip_preserves_tree() {
    let (_dir, write, read) = setup().await;

    let doc = listing(
        "thr001",
        "A thread",
        3,
        vec![comment(
            "c1",
            10,
            "parent &amp; one",
            vec![comment(
                "c2",
                5,
                "child",
                vec![comment("c3", 1, "grandchild", vec![])],
            )],
        )],
    );

    let archiver = archiver(write, read.clone(), 100);
    archiver
        .submit("rust", doc)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    let thread = reconstruct::load_archive(&read, "thr001", "")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(thread.title, "A thread");
    assert_eq!(thread.author, "op_author");
    assert_eq!(html::unescape(&thread.content), "<p>hello</p>");

    assert_eq!(thread.replies.len(), 1);
    let c1 = &thread.replies[0];
    assert_eq!(c1.comment_id, "c1");
    assert_eq!(html::unescape(&c1.content), "parent & one");

    assert_eq!(c1.replies.len(), 1);
    let c2 = &c1.replies[0];
    assert_eq!(c2.comment_id, "c2");
    assert_eq!(c2.replies.len(), 1);
    assert_eq!(c2.replies[0].comment_id, "c3");
    assert!(c2.replies[0].replies.is_empty());
}

#[tokio::test]
async fn depth_ceiling_truncates_without_error() {
    let (_dir, write, read) = setup().await;

    // depth 0..3 chain; with max_depth = 2 only the first two levels store
    let doc = listing(
        "thr001",
        "A thread",
        4,
        vec![comment(
            "c1",
            1,
            "level zero",
            vec![comment(
                "c2",
                1,
                "level one",
                vec![comment(
                    "c3",
                    1,
                    "level two",
                    vec![comment("c4", 1, "level three", vec![])],
                )],
            )],
        )],
    );

    let archiver = archiver(write, read.clone(), 2);
    archiver
        .submit("rust", doc)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(comment_count(&read).await, 2);

    let thread = reconstruct::load_archive(&read, "thr001", "")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(thread.replies[0].comment_id, "c1");
    assert_eq!(thread.replies[0].replies[0].comment_id, "c2");
    assert!(thread.replies[0].replies[0].replies.is_empty());
}

#[tokio::test]
async fn duplicate_rejected_unless_more_complete() {
    let (_dir, write, read) = setup().await;
    let archiver = archiver(write, read.clone(), 100);

    let doc = listing("thr001", "A thread", 3, vec![comment("c1", 1, "x", vec![])]);
    archiver
        .submit("rust", doc.clone())
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    // Same observed reply count: rejected before anything is written.
    let err = archiver.submit("rust", doc).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Duplicate));
    assert_eq!(thread_count(&read).await, 1);

    // Lower count is also a duplicate.
    let smaller = listing("thr001", "A thread", 2, vec![comment("c1", 1, "x", vec![])]);
    let err = archiver.submit("rust", smaller).await.unwrap_err();
    assert!(matches!(err, ArchiveError::Duplicate));

    // Strictly greater count re-archives, leaving the prior row intact.
    let bigger = listing(
        "thr001",
        "A thread",
        5,
        vec![comment("c1", 1, "x", vec![comment("c2", 1, "y", vec![])])],
    );
    archiver
        .submit("rust", bigger)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();
    assert_eq!(thread_count(&read).await, 2);
}

#[tokio::test]
async fn failed_insert_rolls_back_everything() {
    let (_dir, write, read) = setup().await;

    // Force a persistence failure on one specific comment mid-tree.
    sqlx::query(
        "CREATE TRIGGER force_comment_failure BEFORE INSERT ON comments \
         WHEN NEW.comment_id = 'boom' \
         BEGIN SELECT RAISE(ABORT, 'forced failure'); END",
    )
    .execute(&write)
    .await
    .unwrap();

    let doc = listing(
        "thr001",
        "A thread",
        3,
        vec![
            comment(
                "c1",
                2,
                "first",
                vec![comment("c2", 1, "second", vec![comment("boom", 0, "third", vec![])])],
            ),
            comment("c4", 9, "sibling", vec![]),
        ],
    );

    let archiver = archiver(write, read.clone(), 100);
    let outcome = archiver
        .submit("rust", doc)
        .await
        .unwrap()
        .wait()
        .await;

    assert!(matches!(outcome, Err(ArchiveError::Persistence(_))));
    assert_eq!(thread_count(&read).await, 0);
    assert_eq!(comment_count(&read).await, 0);
}

#[tokio::test]
async fn replies_ranked_by_score_not_arrival() {
    let (_dir, write, read) = setup().await;

    let doc = listing(
        "thr001",
        "A thread",
        3,
        vec![
            comment("c1", 5, "five", vec![]),
            comment("c2", 1, "one", vec![]),
            comment("c3", 3, "three", vec![]),
        ],
    );

    let archiver = archiver(write, read.clone(), 100);
    archiver
        .submit("rust", doc)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    let thread = reconstruct::load_archive(&read, "thr001", "")
        .await
        .unwrap()
        .unwrap();

    let scores: Vec<i64> = thread.replies.iter().map(|r| r.score).collect();
    assert_eq!(scores, vec![5, 3, 1]);
}

#[tokio::test]
async fn continuation_page_linked_and_reconstructable() {
    let (_dir, write, read) = setup().await;

    let root = listing(
        "thr001",
        "A thread",
        12,
        vec![comment("c1", 4, "truncated here", vec![continuation_marker()])],
    );
    let continuation = listing(
        "thr001",
        "A thread",
        12,
        vec![
            comment("c9", 2, "from the next page", vec![]),
            comment("c10", 7, "also next page", vec![]),
        ],
    );

    let mut pages = HashMap::new();
    pages.insert("c1".to_string(), continuation);

    let archiver = archiver_with_pages(write, read.clone(), pages);
    archiver
        .submit("rust", root)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    // Both pages committed in one request.
    assert_eq!(thread_count(&read).await, 2);
    let anchored: Option<String> =
        sqlx::query_scalar("SELECT continuing_reply FROM threads WHERE continuing_reply != ''")
            .fetch_optional(&read)
            .await
            .unwrap();
    assert_eq!(anchored.as_deref(), Some("c1"));

    // The root view flags the truncated comment.
    let root_view = reconstruct::load_archive(&read, "thr001", "")
        .await
        .unwrap()
        .unwrap();
    assert!(root_view.replies[0].continues);
    assert!(root_view.replies[0].replies.is_empty());

    // Reconstructing at the anchor serves the continuation page's own
    // top-level comments, ranked by score.
    let page = reconstruct::load_archive(&read, "thr001", "c1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(page.anchor, "c1");
    let ids: Vec<&str> = page.replies.iter().map(|r| r.comment_id.as_str()).collect();
    assert_eq!(ids, vec!["c10", "c9"]);
}

#[tokio::test]
async fn continuation_fetch_failure_truncates_branch_only() {
    let (_dir, write, read) = setup().await;

    let root = listing(
        "thr001",
        "A thread",
        9,
        vec![
            comment("c1", 4, "truncated here", vec![continuation_marker()]),
            comment("c2", 1, "unaffected sibling", vec![]),
        ],
    );

    // No continuation page registered: the fetch fails, the branch stops,
    // the rest of the tree still commits.
    let archiver = archiver(write, read.clone(), 100);
    archiver
        .submit("rust", root)
        .await
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(thread_count(&read).await, 1);
    assert_eq!(comment_count(&read).await, 2);

    let thread = reconstruct::load_archive(&read, "thr001", "")
        .await
        .unwrap()
        .unwrap();
    assert!(thread.replies.iter().any(|r| r.continues));
}

#[tokio::test]
async fn unarchived_thread_is_none_not_error() {
    let (_dir, _write, read) = setup().await;

    let result = reconstruct::load_archive(&read, "zzz999", "").await.unwrap();
    assert!(result.is_none());
}
