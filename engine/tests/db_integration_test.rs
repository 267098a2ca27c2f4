/// Integration tests for the run store
///
/// Tests the complete persistence lifecycle including:
/// - Database creation, WAL mode and schema
/// - Referential integrity between runs, measurements and results
/// - Results upsert by run id
/// - Concurrent writers
use labbot_engine::db::{Database, RunStore};
use labbot_engine::stats::ErrorBudget;
use tempfile::TempDir;

async fn open(temp_dir: &TempDir) -> Database {
    Database::new(&temp_dir.path().join("lab_data.db"))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_database_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("lab_data.db");

    let db = Database::new(&db_path).await.unwrap();
    assert!(db_path.exists());

    // WAL file appears once WAL mode is enabled
    assert!(temp_dir.path().join("lab_data.db-wal").exists());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lab_runs")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_schema_indexes() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;

    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%' ORDER BY name",
    )
    .fetch_all(db.pool())
    .await
    .unwrap();

    assert_eq!(
        indexes,
        vec![
            "idx_lab_runs_created_at".to_string(),
            "idx_lab_runs_sender_id".to_string(),
            "idx_measurements_run_id".to_string(),
        ]
    );

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_persist_and_read_back() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    let runs = db.runs();

    let values = [10.1, 10.2, 10.0, 10.3];
    let budget = ErrorBudget::compute(&values, Some(0.01)).unwrap();
    let run_id = runs
        .persist_run("chat-1", "10.1 10.2 10.0 10.3", &values, &budget)
        .await
        .unwrap();

    let run = runs.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.sender_id, "chat-1");
    assert_eq!(run.measurements_text.as_deref(), Some("10.1 10.2 10.0 10.3"));
    assert_eq!(run.instrument_error, Some(0.01));
    // ISO 8601, second precision
    assert_eq!(run.created_at.len(), 19);
    assert_eq!(&run.created_at[10..11], "T");

    let measurements = runs.get_measurements(run_id).await.unwrap();
    let stored: Vec<f64> = measurements.iter().map(|m| m.value).collect();
    let indexes: Vec<i64> = measurements.iter().map(|m| m.idx).collect();
    assert_eq!(stored, values);
    assert_eq!(indexes, vec![0, 1, 2, 3]);

    let results = runs.get_results(run_id).await.unwrap().unwrap();
    assert_eq!(results.n, 4);
    assert!((results.xbar - 10.15).abs() < 1e-9);
    assert!(results.used_instr);
    assert!(results.delta_total >= results.delta_stat);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_results_upsert_keeps_single_row() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    let runs = db.runs();

    let run_id = runs.create_run("s1", "1 2 3", None).await.unwrap();

    let first = ErrorBudget::compute(&[1.0, 2.0, 3.0], None).unwrap();
    runs.save_results(run_id, &first).await.unwrap();

    let second = ErrorBudget::compute(&[1.0, 2.0, 3.0], Some(1.0)).unwrap();
    runs.save_results(run_id, &second).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE run_id = ?")
        .bind(run_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);

    let stored = runs.get_results(run_id).await.unwrap().unwrap();
    assert!(stored.used_instr);
    assert!((stored.delta_total - second.delta_total).abs() < 1e-12);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_orphan_rows_are_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    let runs = db.runs();

    assert!(runs.insert_measurements(9999, &[1.0, 2.0]).await.is_err());

    let budget = ErrorBudget::compute(&[1.0], None).unwrap();
    assert!(runs.save_results(9999, &budget).await.is_err());

    // The failed measurement batch left nothing behind
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM measurements")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_deleting_run_cascades() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    let runs = db.runs();

    let values = [4.0, 5.0];
    let budget = ErrorBudget::compute(&values, None).unwrap();
    let run_id = runs
        .persist_run("s1", "4 5", &values, &budget)
        .await
        .unwrap();

    sqlx::query("DELETE FROM lab_runs WHERE id = ?")
        .bind(run_id)
        .execute(db.pool())
        .await
        .unwrap();

    assert!(runs.get_measurements(run_id).await.unwrap().is_empty());
    assert!(runs.get_results(run_id).await.unwrap().is_none());

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_recent_runs_and_sender_filter() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;
    let runs = db.runs();

    let a1 = runs.create_run("alice", "1 2", None).await.unwrap();
    let b1 = runs.create_run("bob", "3 4", Some(0.1)).await.unwrap();
    let a2 = runs.create_run("alice", "5 6", None).await.unwrap();

    let recent: Vec<i64> = runs
        .recent_runs(2)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(recent, vec![a2, b1]);

    let alice: Vec<i64> = runs
        .runs_for_sender("alice", 10)
        .await
        .unwrap()
        .iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(alice, vec![a2, a1]);

    db.close().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_writers() {
    let temp_dir = TempDir::new().unwrap();
    let db = open(&temp_dir).await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let runs = db.runs();
        handles.push(tokio::spawn(async move {
            let values = vec![i as f64, i as f64 + 1.0, i as f64 + 2.0];
            let budget = ErrorBudget::compute(&values, None).unwrap();
            runs.persist_run(&format!("sender-{}", i), "batch", &values, &budget)
                .await
                .unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 8);

    let measurement_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM measurements")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(measurement_count, 24);

    let result_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(result_count, 8);

    db.close().await.unwrap();
}
