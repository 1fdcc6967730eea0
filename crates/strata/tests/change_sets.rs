//! End-to-end runs of the built-in migrations and seeds against the
//! in-memory store.

use serde_json::json;

use strata::{changes, seeds};
use strata_runtime::testing::MemoryExecutor;
use strata_runtime::{ChangeSetRunner, Ledger};

fn migrations() -> ChangeSetRunner {
    ChangeSetRunner::new(changes::registry(), Ledger::new("strata_migrations"))
}

fn seed_runner() -> ChangeSetRunner {
    ChangeSetRunner::new(seeds::registry(), Ledger::new("strata_seeds"))
}

#[tokio::test]
async fn test_migrate_up_creates_all_tables() {
    let exec = MemoryExecutor::new();
    let report = migrations().apply_all(&exec).await.unwrap();

    assert_eq!(
        report.executed,
        vec![
            "001_create_users",
            "002_create_categories",
            "003_create_posts",
            "004_create_comments",
        ]
    );
    for table in ["users", "categories", "posts", "comments"] {
        assert!(exec.has_table(table), "missing table {}", table);
    }
    assert!(exec.indexes().contains(&"idx_posts_status".to_string()));
    assert!(exec.indexes().contains(&"idx_comments_post_id".to_string()));
}

#[tokio::test]
async fn test_seed_up_populates_tables() {
    let exec = MemoryExecutor::new();
    migrations().apply_all(&exec).await.unwrap();
    let report = seed_runner().apply_all(&exec).await.unwrap();

    assert_eq!(report.total, 5);
    assert_eq!(exec.rows("users").len(), 5);
    assert_eq!(exec.rows("categories").len(), 6);
    assert_eq!(exec.rows("posts").len(), 4);
    assert_eq!(exec.rows("comments").len(), 10);

    // Sequence ids line up with the cross-references the seeds assume.
    let users = exec.rows("users");
    assert_eq!(users[0]["username"], json!("admin"));
    assert_eq!(users[0]["id"], json!(1));
    assert_eq!(users[0]["role"], json!("admin"));

    let nodejs = exec
        .rows("categories")
        .into_iter()
        .find(|c| c["slug"] == json!("nodejs"))
        .unwrap();
    assert_eq!(nodejs["parent_id"], json!(3));

    // Omitted columns took their defaults.
    let drafts: Vec<_> = exec
        .rows("posts")
        .into_iter()
        .filter(|p| p["status"] == json!("draft"))
        .collect();
    assert_eq!(drafts.len(), 1);
    assert!(drafts[0]["created_at"].is_string());
}

#[tokio::test]
async fn test_seed_down_removes_all_rows() {
    let exec = MemoryExecutor::new();
    migrations().apply_all(&exec).await.unwrap();

    let runner = seed_runner();
    runner.apply_all(&exec).await.unwrap();
    let report = runner.rollback(&exec, 5).await.unwrap();

    assert_eq!(report.total, 5);
    for table in ["users", "categories", "posts", "comments"] {
        assert!(exec.has_table(table));
        assert!(exec.rows(table).is_empty(), "{} still has rows", table);
    }
}

#[tokio::test]
async fn test_seeds_reapply_after_rollback() {
    let exec = MemoryExecutor::new();
    migrations().apply_all(&exec).await.unwrap();

    let runner = seed_runner();
    runner.apply_all(&exec).await.unwrap();
    runner.rollback(&exec, 2).await.unwrap();

    let report = runner.apply_all(&exec).await.unwrap();
    assert_eq!(
        report.executed,
        vec!["004_sample_posts", "005_sample_comments"]
    );
    let status = runner.status(&exec).await.unwrap();
    assert_eq!(status.executed, 5);
    assert_eq!(status.pending, 0);
}

#[tokio::test]
async fn test_migrate_reset_drops_everything() {
    let exec = MemoryExecutor::new();
    let runner = migrations();
    runner.apply_all(&exec).await.unwrap();

    let report = runner.reset(&exec).await.unwrap();
    assert!(report.reset);
    assert_eq!(report.count, 4);
    for table in ["users", "categories", "posts", "comments"] {
        assert!(!exec.has_table(table), "{} survived reset", table);
    }
    assert!(!exec.has_table("strata_migrations"));
}

#[tokio::test]
async fn test_migrations_and_seeds_keep_separate_ledgers() {
    let exec = MemoryExecutor::new();
    migrations().apply_all(&exec).await.unwrap();
    seed_runner().apply_all(&exec).await.unwrap();

    let migration_names: Vec<_> = exec
        .rows("strata_migrations")
        .into_iter()
        .map(|r| r["name"].clone())
        .collect();
    assert_eq!(migration_names.len(), 4);
    assert!(migration_names.contains(&json!("001_create_users")));

    let seed_names: Vec<_> = exec
        .rows("strata_seeds")
        .into_iter()
        .map(|r| r["name"].clone())
        .collect();
    assert_eq!(seed_names.len(), 5);
    assert!(seed_names.contains(&json!("005_sample_comments")));
}
