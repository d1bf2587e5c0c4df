//! Dream queries

use chrono::Utc;
use loom_common::db::models::Dream;
use loom_common::Result;
use sqlx::SqlitePool;

/// Persist a new dream record; interpretation follows asynchronously
pub async fn insert(
    pool: &SqlitePool,
    user_id: i64,
    title: &str,
    raw_text: &str,
) -> Result<Dream> {
    let created_at = Utc::now();
    let id = sqlx::query(
        "INSERT INTO dreams (user_id, title, raw_text, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(user_id)
    .bind(title)
    .bind(raw_text)
    .bind(created_at)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Dream {
        id,
        user_id,
        title: title.to_string(),
        raw_text: raw_text.to_string(),
        created_at,
    })
}

/// Fetch by id regardless of owner (pipeline-internal)
pub async fn find(pool: &SqlitePool, id: i64) -> Result<Option<Dream>> {
    let dream = sqlx::query_as::<_, Dream>(
        "SELECT id, user_id, title, raw_text, created_at FROM dreams WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(dream)
}

/// Fetch by id, scoped to the owner (API-facing)
pub async fn find_for_user(pool: &SqlitePool, id: i64, user_id: i64) -> Result<Option<Dream>> {
    let dream = sqlx::query_as::<_, Dream>(
        "SELECT id, user_id, title, raw_text, created_at FROM dreams \
         WHERE id = ? AND user_id = ?",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(dream)
}

/// All of a user's dreams, newest first
pub async fn list_for_user(pool: &SqlitePool, user_id: i64) -> Result<Vec<Dream>> {
    let dreams = sqlx::query_as::<_, Dream>(
        "SELECT id, user_id, title, raw_text, created_at FROM dreams \
         WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(dreams)
}

/// Update title and/or text; absent fields keep their value
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    title: Option<&str>,
    raw_text: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE dreams SET title = COALESCE(?, title), raw_text = COALESCE(?, raw_text) \
         WHERE id = ?",
    )
    .bind(title)
    .bind(raw_text)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a dream; its interpretation cascades
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM dreams WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
