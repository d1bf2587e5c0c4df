//! Account credential primitives
//!
//! Password hashing, opaque bearer session tokens, one-time codes, and
//! username generation. Only hashes are stored: a leaked database row
//! yields neither a usable password nor a usable session token.

pub mod passwords;
pub mod tokens;
pub mod username;

pub use passwords::{hash_password, verify_password};
pub use tokens::{generate_otp, issue_reset_token, issue_session_token, sha256_hex, IssuedToken};
pub use username::generate_username;
