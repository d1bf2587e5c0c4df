//! Database initialization tests

use loom_common::db;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_creates_database_file() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("loom.db");

    let pool = db::init_database(&db_path).await.unwrap();

    assert!(db_path.exists(), "database file should be created");

    // All four tables exist
    for table in ["users", "sessions", "dreams", "dream_interpretations"] {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count.0, 1, "table {} should exist", table);
    }
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("loom.db");

    let pool = db::init_database(&db_path).await.unwrap();
    sqlx::query("INSERT INTO users (email, hashed_password) VALUES ('a@b.c', 'x')")
        .execute(&pool)
        .await
        .unwrap();
    drop(pool);

    // Re-opening must not wipe existing rows
    let pool = db::init_database(&db_path).await.unwrap();
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);
}

#[tokio::test]
async fn test_interpretation_cascades_with_dream() {
    let pool = db::init_memory_database().await.unwrap();

    sqlx::query("INSERT INTO users (email, hashed_password) VALUES ('a@b.c', 'x')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO dreams (user_id, title, raw_text, created_at) VALUES (1, 't', 'r', ?)",
    )
    .bind(chrono::Utc::now())
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO dream_interpretations (dream_id, meaning) VALUES (1, 'm')")
        .execute(&pool)
        .await
        .unwrap();

    sqlx::query("DELETE FROM dreams WHERE id = 1")
        .execute(&pool)
        .await
        .unwrap();

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM dream_interpretations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0, "interpretation should cascade with its dream");
}
