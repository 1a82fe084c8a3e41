use anyhow::Result;
use sqlx::SqlitePool;

/// Create both relations and their indexes. Idempotent; failure here is a
/// startup-time fatal condition.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    // One row per archived root post or per continuation page. The UNIQUE
    // triple makes re-archiving the same page with the same observed reply
    // count a constraint violation at the storage layer.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS threads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            thread_id TEXT NOT NULL,
            continuing_reply TEXT NOT NULL DEFAULT '',
            replies_num INTEGER NOT NULL,
            sub TEXT NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            content_link TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '',
            timestamp INTEGER NOT NULL,
            archive_timestamp INTEGER NOT NULL,
            CONSTRAINT unq UNIQUE(thread_id, replies_num, continuing_reply),
            CONSTRAINT chk_id CHECK(LENGTH(thread_id) >= 6),
            CONSTRAINT chk_title CHECK(LENGTH(title) > 1),
            CONSTRAINT chk_sub CHECK(LENGTH(sub) > 1)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One row per comment in any archived page. parent_id is NULL for a
    // top-level reply of its page.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            comment_id TEXT NOT NULL,
            content TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '',
            thread_key INTEGER NOT NULL,
            parent_id INTEGER,
            timestamp INTEGER NOT NULL,
            continues BOOLEAN NOT NULL DEFAULT FALSE,
            score INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (thread_key) REFERENCES threads(id),
            FOREIGN KEY (parent_id) REFERENCES comments(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_threads_thread_id ON threads(thread_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_threads_timestamp ON threads(timestamp)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_threads_archive_timestamp ON threads(archive_timestamp DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
