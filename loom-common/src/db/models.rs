//! Database row models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered account
///
/// `email_verified` is stored as the TEXT literals 'True'/'False' — a
/// SQLite-compatibility quirk inherited from the original schema that
/// existing databases and clients depend on.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub email_verified: String,
    #[serde(skip_serializing)]
    pub otp_code: Option<String>,
    #[serde(skip_serializing)]
    pub otp_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.email_verified == "True"
    }
}

/// A submitted dream entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Dream {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub raw_text: String,
    pub created_at: DateTime<Utc>,
}

/// AI-derived analysis attached to a dream (one-to-one, optional)
///
/// All analysis fields are nullable. A `meaning` beginning with a failure
/// marker ("⚠️ Configuration Error:" / "⚠️ AI interpretation unavailable:")
/// records a terminal processing failure; clients render it as display text.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Interpretation {
    pub id: i64,
    pub dream_id: i64,
    pub poetic_narrative: Option<String>,
    pub meaning: Option<String>,
    pub symbols: Option<String>,
    pub emotions: Option<String>,
    pub image_url: Option<String>,
}
