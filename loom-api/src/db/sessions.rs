//! Bearer session queries
//!
//! Sessions store only the SHA-256 hash of the issued token; the plaintext
//! token exists nowhere but the client.

use chrono::{DateTime, Utc};
use loom_common::db::models::User;
use loom_common::Result;
use sqlx::SqlitePool;

pub async fn insert(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO sessions (token_hash, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(token_hash)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Resolve a token hash to its user, rejecting and pruning expired sessions
pub async fn find_user_by_token_hash(
    pool: &SqlitePool,
    token_hash: &str,
) -> Result<Option<User>> {
    let row: Option<(i64, DateTime<Utc>)> =
        sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .fetch_optional(pool)
            .await?;

    let Some((user_id, expires_at)) = row else {
        return Ok(None);
    };

    if expires_at < Utc::now() {
        delete(pool, token_hash).await?;
        return Ok(None);
    }

    crate::db::users::find_by_id(pool, user_id).await
}

pub async fn delete(pool: &SqlitePool, token_hash: &str) -> Result<()> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(())
}
