use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, Transaction};
use std::str::FromStr;
use std::time::Duration;

use crate::config::Config;

/// Busy-wait ceiling for both pools. A blocked writer queues behind the open
/// write connection instead of failing fast, and readers wait out WAL
/// checkpoints.
const BUSY_TIMEOUT: Duration = Duration::from_secs(600);

fn connect_options(config: &Config) -> Result<SqliteConnectOptions> {
    let db_path = &config.db.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    Ok(options)
}

/// Read-side pool. Sees only committed data and never participates in write
/// transactions.
pub async fn connect_read(config: &Config) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(connect_options(config)?)
        .await?;

    Ok(pool)
}

/// Write-side pool, restricted to a single connection system-wide so all
/// writes are totally ordered: two concurrent archive requests serialize
/// rather than interleave.
pub async fn connect_write(config: &Config) -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(connect_options(config)?)
        .await?;

    Ok(pool)
}

/// An open write transaction holding the (sole) write connection.
///
/// Exactly one of [`WriteScope::commit`] or [`WriteScope::abort`] consumes
/// the scope; a scope dropped on an early return or panic rolls back when
/// the underlying transaction is dropped, so the connection never leaks in
/// an open state.
pub struct WriteScope {
    tx: Transaction<'static, Sqlite>,
}

impl WriteScope {
    pub async fn open(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let tx = pool.begin().await?;
        Ok(Self { tx })
    }

    /// The transaction's connection, for executing statements inside the scope.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.tx
    }

    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }

    pub async fn abort(self) -> Result<(), sqlx::Error> {
        self.tx.rollback().await
    }
}
