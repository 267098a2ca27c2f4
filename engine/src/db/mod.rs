//! Run store persistence
//!
//! Completed calculations land in one SQLite file: a `lab_runs` row with the
//! raw inputs, one `measurements` row per value and a single `results` row.
//! The pool runs in WAL mode with foreign keys on, so independent chat
//! sessions can save runs concurrently.

use anyhow::{Context, Result};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

pub mod runs;

pub use runs::{MeasurementRow, ResultRecord, RunRecord, RunRepository, RunStore};

/// Schema for runs, measurements and results; every statement is `IF NOT EXISTS`
const SCHEMA: &str = include_str!("../../migrations/001_lab_runs.sql");

/// Pool size; a chat turn holds at most one connection at a time
const MAX_CONNECTIONS: u32 = 5;

/// Handle to the lab run database
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at `db_path` and apply the schema
    ///
    /// Missing parent directories are created. Applying the schema is
    /// idempotent, so this runs on every start.
    pub async fn new(db_path: &Path) -> Result<Self> {
        info!("Opening run store at {}", db_path.display());

        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .context("Failed to connect to run store")?;

        let db = Self { pool };
        db.apply_schema().await?;

        Ok(db)
    }

    async fn apply_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to apply run store schema")?;

        debug!("Run store schema is up to date");
        Ok(())
    }

    /// Underlying pool, for ad-hoc queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Repository for run reads and writes
    pub fn runs(&self) -> RunRepository {
        RunRepository::new(self.pool.clone())
    }

    /// Checkpoint the WAL into the main file and close every connection
    ///
    /// Repositories created from this handle fail afterwards.
    pub async fn close(self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await
            .context("Failed to checkpoint run store")?;

        self.pool.close().await;
        info!("Run store closed");
        Ok(())
    }
}
