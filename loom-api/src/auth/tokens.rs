//! Session tokens, reset tokens, and one-time codes

use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Bearer session lifetime
const SESSION_TTL_DAYS: i64 = 7;

/// Password-reset token lifetime (issued after OTP verification)
const RESET_TOKEN_TTL_MINUTES: i64 = 15;

/// One-time code lifetime
pub const OTP_TTL_MINUTES: i64 = 10;

const TOKEN_CHARS: usize = 48;

/// A freshly issued bearer token
///
/// `token` goes to the client once; only `token_hash` is persisted.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Issue a new bearer session token
pub fn issue_session_token() -> IssuedToken {
    let token = random_token();
    IssuedToken {
        token_hash: sha256_hex(token.as_bytes()),
        token,
        expires_at: Utc::now() + Duration::days(SESSION_TTL_DAYS),
    }
}

/// Issue a short-lived password-reset token
///
/// Stored verbatim on the user row: it is single-use, minutes-lived, and
/// only grants the ability to set a password the holder already proved
/// control of the mailbox for.
pub fn issue_reset_token() -> (String, DateTime<Utc>) {
    (
        random_token(),
        Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
    )
}

/// Generate a 6-digit one-time code and its expiry
pub fn generate_otp() -> (String, DateTime<Utc>) {
    let code: u32 = rand::thread_rng().gen_range(100_000..=999_999);
    (
        code.to_string(),
        Utc::now() + Duration::minutes(OTP_TTL_MINUTES),
    )
}

/// Lowercase hex SHA-256
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn random_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_CHARS)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_hash_matches_token() {
        let issued = issue_session_token();
        assert_eq!(issued.token.len(), TOKEN_CHARS);
        assert_eq!(issued.token_hash, sha256_hex(issued.token.as_bytes()));
        assert!(issued.expires_at > Utc::now());
    }

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(issue_session_token().token, issue_session_token().token);
    }

    #[test]
    fn test_otp_is_six_digits() {
        for _ in 0..50 {
            let (code, expires) = generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(expires > Utc::now());
        }
    }
}
