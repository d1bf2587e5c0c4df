//! Dream interpretation queries

use loom_common::db::models::Interpretation;
use loom_common::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

/// Fields of an interpretation row as produced by the pipeline
#[derive(Debug, Clone, Default)]
pub struct NewInterpretation {
    pub poetic_narrative: Option<String>,
    pub meaning: Option<String>,
    pub symbols: Option<String>,
    pub emotions: Option<String>,
    pub image_url: Option<String>,
}

/// Persist the single interpretation row for a dream
///
/// The UNIQUE constraint on dream_id enforces at-most-one; regenerate must
/// delete the prior row before re-running the pipeline.
pub async fn insert(pool: &SqlitePool, dream_id: i64, new: &NewInterpretation) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO dream_interpretations
            (dream_id, poetic_narrative, meaning, symbols, emotions, image_url)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(dream_id)
    .bind(&new.poetic_narrative)
    .bind(&new.meaning)
    .bind(&new.symbols)
    .bind(&new.emotions)
    .bind(&new.image_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_dream(pool: &SqlitePool, dream_id: i64) -> Result<Option<Interpretation>> {
    let interpretation = sqlx::query_as::<_, Interpretation>(
        "SELECT id, dream_id, poetic_narrative, meaning, symbols, emotions, image_url \
         FROM dream_interpretations WHERE dream_id = ?",
    )
    .bind(dream_id)
    .fetch_optional(pool)
    .await?;
    Ok(interpretation)
}

pub async fn delete_by_dream(pool: &SqlitePool, dream_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM dream_interpretations WHERE dream_id = ?")
        .bind(dream_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// All interpretations for a user's dreams, keyed by dream id
pub async fn map_for_user(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<HashMap<i64, Interpretation>> {
    let rows = sqlx::query_as::<_, Interpretation>(
        r#"
        SELECT i.id, i.dream_id, i.poetic_narrative, i.meaning, i.symbols, i.emotions,
               i.image_url
        FROM dream_interpretations i
        JOIN dreams d ON d.id = i.dream_id
        WHERE d.user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|i| (i.dream_id, i)).collect())
}
