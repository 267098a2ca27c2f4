/// Lab run persistence operations
///
/// A run is written in three self-contained steps: the `lab_runs` row, one
/// `measurements` row per value, and the `results` row. Results are upserted by
/// run id, so repeating the last step for the same run never duplicates rows.
/// All queries are parameterized.
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::stats::ErrorBudget;

/// A persisted calculation run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    pub id: i64,
    pub sender_id: String,
    pub measurements_text: Option<String>,
    pub instrument_error: Option<f64>,
    pub created_at: String,
}

/// One measurement value of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementRow {
    pub id: i64,
    pub run_id: i64,
    pub value: f64,
    pub idx: i64,
}

/// Derived statistics of a run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub run_id: i64,
    pub n: i64,
    pub xbar: f64,
    pub s: f64,
    pub s_mean: f64,
    pub delta_stat: f64,
    pub delta_total: f64,
    pub rel_percent: f64,
    pub used_instr: bool,
    pub created_at: String,
}

impl ResultRecord {
    pub fn from_budget(run_id: i64, budget: &ErrorBudget, created_at: String) -> Self {
        Self {
            run_id,
            n: budget.summary.n as i64,
            xbar: budget.summary.mean,
            s: budget.summary.stddev,
            s_mean: budget.summary.std_error,
            delta_stat: budget.delta_stat,
            delta_total: budget.delta_total,
            rel_percent: budget.rel_percent,
            used_instr: budget.used_instrument(),
            created_at,
        }
    }
}

/// Store/retrieve semantics the conversation needs from persistence
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a new run and return its id
    async fn create_run(
        &self,
        sender_id: &str,
        measurements_text: &str,
        instrument_error: Option<f64>,
    ) -> Result<i64>;

    /// Append each value with its 0-based position
    async fn insert_measurements(&self, run_id: i64, values: &[f64]) -> Result<()>;

    /// Insert or replace the results row of a run
    async fn save_results(&self, run_id: i64, budget: &ErrorBudget) -> Result<()>;

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>>;

    async fn get_measurements(&self, run_id: i64) -> Result<Vec<MeasurementRow>>;

    async fn get_results(&self, run_id: i64) -> Result<Option<ResultRecord>>;

    /// Most recent runs first
    async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>>;

    /// Create the run, its measurement rows and its results
    ///
    /// A budget with a non-finite value is refused before anything is
    /// written, so a run never exists without its results row.
    async fn persist_run(
        &self,
        sender_id: &str,
        measurements_text: &str,
        values: &[f64],
        budget: &ErrorBudget,
    ) -> Result<i64> {
        if !budget.is_finite() {
            anyhow::bail!("calculated values are out of range and cannot be stored");
        }

        let run_id = self
            .create_run(sender_id, measurements_text, budget.instrument_error)
            .await?;
        self.insert_measurements(run_id, values).await?;
        self.save_results(run_id, budget).await?;
        Ok(run_id)
    }
}

/// UTC timestamp with second precision, ISO 8601
fn now_iso() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

fn run_from_row(r: &sqlx::sqlite::SqliteRow) -> RunRecord {
    RunRecord {
        id: r.get("id"),
        sender_id: r.get("sender_id"),
        measurements_text: r.get("measurements_text"),
        instrument_error: r.get("instrument_error"),
        created_at: r.get("created_at"),
    }
}

/// SQLite-backed run repository
#[derive(Clone)]
pub struct RunRepository {
    pool: SqlitePool,
}

impl RunRepository {
    /// Create a new run repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs of a single sender, most recent first
    pub async fn runs_for_sender(&self, sender_id: &str, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT id, sender_id, measurements_text, instrument_error, created_at FROM lab_runs WHERE sender_id = ? ORDER BY id DESC LIMIT ?"
        )
        .bind(sender_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch runs for sender")?;

        Ok(rows.iter().map(run_from_row).collect())
    }
}

#[async_trait]
impl RunStore for RunRepository {
    async fn create_run(
        &self,
        sender_id: &str,
        measurements_text: &str,
        instrument_error: Option<f64>,
    ) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO lab_runs (sender_id, measurements_text, instrument_error, created_at) VALUES (?, ?, ?, ?)"
        )
        .bind(sender_id)
        .bind(measurements_text)
        .bind(instrument_error)
        .bind(now_iso())
        .execute(&self.pool)
        .await
        .context("Failed to create run")?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_measurements(&self, run_id: i64, values: &[f64]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin measurements transaction")?;

        for (idx, value) in values.iter().enumerate() {
            sqlx::query("INSERT INTO measurements (run_id, value, idx) VALUES (?, ?, ?)")
                .bind(run_id)
                .bind(*value)
                .bind(idx as i64)
                .execute(&mut *tx)
                .await
                .context("Failed to insert measurement")?;
        }

        tx.commit()
            .await
            .context("Failed to commit measurements")?;

        Ok(())
    }

    async fn save_results(&self, run_id: i64, budget: &ErrorBudget) -> Result<()> {
        let record = ResultRecord::from_budget(run_id, budget, now_iso());

        sqlx::query(
            r#"
            INSERT INTO results
                (run_id, n, xbar, s, s_mean, delta_stat, delta_total, rel_percent, used_instr, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(run_id) DO UPDATE SET
                n = excluded.n,
                xbar = excluded.xbar,
                s = excluded.s,
                s_mean = excluded.s_mean,
                delta_stat = excluded.delta_stat,
                delta_total = excluded.delta_total,
                rel_percent = excluded.rel_percent,
                used_instr = excluded.used_instr,
                created_at = excluded.created_at
            "#,
        )
        .bind(record.run_id)
        .bind(record.n)
        .bind(record.xbar)
        .bind(record.s)
        .bind(record.s_mean)
        .bind(record.delta_stat)
        .bind(record.delta_total)
        .bind(record.rel_percent)
        .bind(record.used_instr)
        .bind(&record.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to save results")?;

        Ok(())
    }

    async fn get_run(&self, run_id: i64) -> Result<Option<RunRecord>> {
        let row = sqlx::query(
            "SELECT id, sender_id, measurements_text, instrument_error, created_at FROM lab_runs WHERE id = ?"
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch run")?;

        Ok(row.as_ref().map(run_from_row))
    }

    async fn get_measurements(&self, run_id: i64) -> Result<Vec<MeasurementRow>> {
        let rows = sqlx::query(
            "SELECT id, run_id, value, idx FROM measurements WHERE run_id = ? ORDER BY idx ASC",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch measurements")?;

        Ok(rows
            .into_iter()
            .map(|r| MeasurementRow {
                id: r.get("id"),
                run_id: r.get("run_id"),
                value: r.get("value"),
                idx: r.get("idx"),
            })
            .collect())
    }

    async fn get_results(&self, run_id: i64) -> Result<Option<ResultRecord>> {
        let row = sqlx::query(
            "SELECT run_id, n, xbar, s, s_mean, delta_stat, delta_total, rel_percent, used_instr, created_at FROM results WHERE run_id = ?"
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch results")?;

        Ok(row.map(|r| ResultRecord {
            run_id: r.get("run_id"),
            n: r.get("n"),
            xbar: r.get("xbar"),
            s: r.get("s"),
            s_mean: r.get("s_mean"),
            delta_stat: r.get("delta_stat"),
            delta_total: r.get("delta_total"),
            rel_percent: r.get("rel_percent"),
            used_instr: r.get("used_instr"),
            created_at: r.get("created_at"),
        }))
    }

    async fn recent_runs(&self, limit: i64) -> Result<Vec<RunRecord>> {
        let rows = sqlx::query(
            "SELECT id, sender_id, measurements_text, instrument_error, created_at FROM lab_runs ORDER BY id DESC LIMIT ?"
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent runs")?;

        Ok(rows.iter().map(run_from_row).collect())
    }
}
