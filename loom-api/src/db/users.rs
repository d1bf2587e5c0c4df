//! User account queries

use chrono::{DateTime, Utc};
use loom_common::db::models::User;
use loom_common::Result;
use sqlx::SqlitePool;

const USER_COLUMNS: &str = "id, email, username, first_name, last_name, hashed_password, \
     email_verified, otp_code, otp_expires, reset_token, reset_token_expires";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE id = ?",
        USER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Case-insensitive lookup, used by login so `Foo@Bar.com` finds `foo@bar.com`
pub async fn find_by_email_ci(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE LOWER(email) = ?",
        USER_COLUMNS
    ))
    .bind(email.trim().to_lowercase())
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn username_exists(pool: &SqlitePool, username: &str) -> Result<bool> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE username = ?")
        .bind(username)
        .fetch_one(pool)
        .await?;
    Ok(count.0 > 0)
}

/// Create an unverified account with a pending OTP
pub async fn insert(
    pool: &SqlitePool,
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
    hashed_password: &str,
    otp_code: &str,
    otp_expires: DateTime<Utc>,
) -> Result<User> {
    let id = sqlx::query(
        r#"
        INSERT INTO users (email, username, first_name, last_name, hashed_password,
                           email_verified, otp_code, otp_expires)
        VALUES (?, ?, ?, ?, ?, 'False', ?, ?)
        "#,
    )
    .bind(email)
    .bind(username)
    .bind(first_name)
    .bind(last_name)
    .bind(hashed_password)
    .bind(otp_code)
    .bind(otp_expires)
    .execute(pool)
    .await?
    .last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| loom_common::Error::Internal("User vanished after insert".to_string()))
}

/// Refresh an existing unverified registration with new details and OTP
#[allow(clippy::too_many_arguments)]
pub async fn update_registration(
    pool: &SqlitePool,
    id: i64,
    first_name: &str,
    last_name: &str,
    hashed_password: &str,
    username: Option<&str>,
    otp_code: &str,
    otp_expires: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET first_name = ?, last_name = ?, hashed_password = ?,
            username = COALESCE(?, username),
            otp_code = ?, otp_expires = ?, email_verified = 'False'
        WHERE id = ?
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(hashed_password)
    .bind(username)
    .bind(otp_code)
    .bind(otp_expires)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_otp(
    pool: &SqlitePool,
    id: i64,
    otp_code: &str,
    otp_expires: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("UPDATE users SET otp_code = ?, otp_expires = ? WHERE id = ?")
        .bind(otp_code)
        .bind(otp_expires)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark the email verified and clear the consumed OTP
pub async fn mark_verified(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE users SET email_verified = 'True', otp_code = NULL, otp_expires = NULL \
         WHERE id = ?",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Store a password-reset token, clearing the consumed OTP
pub async fn set_reset_token(
    pool: &SqlitePool,
    id: i64,
    token: &str,
    expires: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE users SET reset_token = ?, reset_token_expires = ?, \
         otp_code = NULL, otp_expires = NULL WHERE id = ?",
    )
    .bind(token)
    .bind(expires)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_reset_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE reset_token = ?",
        USER_COLUMNS
    ))
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Set a new password hash and clear any outstanding reset token
pub async fn update_password(pool: &SqlitePool, id: i64, hashed_password: &str) -> Result<()> {
    sqlx::query(
        "UPDATE users SET hashed_password = ?, reset_token = NULL, \
         reset_token_expires = NULL WHERE id = ?",
    )
    .bind(hashed_password)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Backfill a username for accounts created before usernames existed
pub async fn set_username(pool: &SqlitePool, id: i64, username: &str) -> Result<()> {
    sqlx::query("UPDATE users SET username = ? WHERE id = ?")
        .bind(username)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete the account; dreams, interpretations, and sessions cascade
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
