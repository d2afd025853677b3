//! Schema and integrity checks (§6, §7).

use claude_slack_db::{integrity, DbPool};

#[tokio::test]
async fn fresh_database_passes_quick_check() {
    let pool = DbPool::open_in_memory().await.unwrap();
    integrity::quick_check(pool.readers()).await.unwrap();
}

#[tokio::test]
async fn fresh_database_passes_full_check() {
    let pool = DbPool::open_in_memory().await.unwrap();
    integrity::full_check(pool.readers()).await.unwrap();
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let pool = DbPool::open_in_memory().await.unwrap();
    claude_slack_db::schema::run_migrations(pool.readers()).await.unwrap();
    claude_slack_db::schema::run_migrations(pool.readers()).await.unwrap();
}

#[tokio::test]
async fn opening_a_file_backed_database_twice_reuses_schema() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("claude-slack.db");
    let config = claude_slack_core::Config {
        db_path: db_path.clone(),
        ..claude_slack_core::Config::in_memory()
    };

    let pool_a = DbPool::open(&config).await.unwrap();
    claude_slack_db::queries::projects::ensure_project(pool_a.readers(), "/repo/x", "x")
        .await
        .unwrap();
    drop(pool_a);

    let pool_b = DbPool::open(&config).await.unwrap();
    let found = claude_slack_db::queries::projects::get_project_by_path(pool_b.readers(), "/repo/x")
        .await
        .unwrap();
    assert!(found.is_some());
}
