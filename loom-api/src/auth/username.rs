//! Unique username generation
//!
//! Usernames are derived from the registrant's name: lowercase alphanumeric
//! `firstlast`, with a numeric suffix on collision and a random suffix as a
//! last resort once sequential probing becomes unreasonable.

use loom_common::Result;
use rand::Rng;
use sqlx::SqlitePool;

/// Sequential collision probes before falling back to a random suffix
const MAX_SEQUENTIAL_PROBES: u32 = 9999;

/// Generate a username unique among existing users
pub async fn generate_username(
    pool: &SqlitePool,
    first_name: &str,
    last_name: &str,
) -> Result<String> {
    let base = base_username(first_name, last_name);

    let mut username = base.clone();
    let mut counter: u32 = 1;
    while crate::db::users::username_exists(pool, &username).await? {
        if counter > MAX_SEQUENTIAL_PROBES {
            username = format!("{}{}", base, rand::thread_rng().gen_range(0..10_000));
            break;
        }
        username = format!("{}{}", base, counter);
        counter += 1;
    }

    Ok(username)
}

/// Lowercase alphanumeric `firstlast`, or `user` when nothing survives cleaning
fn base_username(first_name: &str, last_name: &str) -> String {
    let clean = |name: &str| -> String {
        name.to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect()
    };

    let base = format!("{}{}", clean(first_name), clean(last_name));
    if base.is_empty() {
        "user".to_string()
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_strips_non_alphanumeric() {
        assert_eq!(base_username("Ada", "Lovelace"), "adalovelace");
        assert_eq!(base_username("Jean-Luc", "O'Brien"), "jeanlucobrien");
    }

    #[test]
    fn test_empty_names_fall_back_to_user() {
        assert_eq!(base_username("", ""), "user");
        assert_eq!(base_username("---", "!!!"), "user");
    }

    #[tokio::test]
    async fn test_collision_appends_counter() {
        let pool = loom_common::db::init_memory_database().await.unwrap();
        sqlx::query(
            "INSERT INTO users (email, username, hashed_password) VALUES ('a@b.c', 'adalovelace', 'x')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let username = generate_username(&pool, "Ada", "Lovelace").await.unwrap();
        assert_eq!(username, "adalovelace1");
    }

    #[tokio::test]
    async fn test_no_collision_uses_base() {
        let pool = loom_common::db::init_memory_database().await.unwrap();
        let username = generate_username(&pool, "Ada", "Lovelace").await.unwrap();
        assert_eq!(username, "adalovelace");
    }
}
