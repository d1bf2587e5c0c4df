//! Configuration loading for the Lucid Loom backend
//!
//! Resolution follows a two-tier priority order for every setting:
//! 1. Environment variable (highest priority)
//! 2. TOML config file
//! with compiled defaults as the fallback for non-secret settings.
//!
//! Provider credentials have no default: an absent or placeholder key means
//! the matching AI/email feature reports itself unconfigured at call time
//! rather than failing at startup.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Default HTTP bind address
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

/// Resolved service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Address the HTTP/WebSocket listener binds to
    pub bind_addr: String,
    /// SQLite database file path
    pub database_path: PathBuf,
    /// Groq API key (text generation); None when unconfigured
    pub groq_api_key: Option<String>,
    /// OpenAI API key (image generation only); None when unconfigured
    pub openai_api_key: Option<String>,
    /// SendGrid API key (OTP delivery); None when unconfigured
    pub sendgrid_api_key: Option<String>,
    /// Verified sender address for OTP mail
    pub sendgrid_from_email: Option<String>,
    /// Display name on outgoing OTP mail
    pub sendgrid_from_name: String,
    /// Origins allowed by the CORS layer
    pub cors_origins: Vec<String>,
}

/// On-disk TOML configuration (all fields optional)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub bind_addr: Option<String>,
    pub database_path: Option<String>,
    pub groq_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub sendgrid_api_key: Option<String>,
    pub sendgrid_from_email: Option<String>,
    pub sendgrid_from_name: Option<String>,
    pub cors_origins: Option<Vec<String>>,
}

impl AppConfig {
    /// Load configuration with ENV → TOML → default resolution
    pub fn load() -> Result<Self> {
        let toml_config = load_toml_config()?;
        Ok(Self::resolve(toml_config))
    }

    /// Resolve a config from an already-loaded TOML layer
    pub fn resolve(toml_config: TomlConfig) -> Self {
        let bind_addr = env_or("LOOM_BIND_ADDR", toml_config.bind_addr)
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let database_path = env_or("LOOM_DATABASE_PATH", toml_config.database_path)
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let sendgrid_from_name = env_or("SENDGRID_FROM_NAME", toml_config.sendgrid_from_name)
            .unwrap_or_else(|| "Lucid Loom".to_string());

        let cors_origins = std::env::var("LOOM_CORS_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .or(toml_config.cors_origins)
            .unwrap_or_else(|| vec!["http://localhost:5173".to_string()]);

        Self {
            bind_addr,
            database_path,
            groq_api_key: configured_key(env_or("GROQ_API_KEY", toml_config.groq_api_key)),
            openai_api_key: configured_key(env_or("OPENAI_API_KEY", toml_config.openai_api_key)),
            sendgrid_api_key: configured_key(env_or(
                "SENDGRID_API_KEY",
                toml_config.sendgrid_api_key,
            )),
            sendgrid_from_email: configured_key(env_or(
                "SENDGRID_FROM_EMAIL",
                toml_config.sendgrid_from_email,
            )),
            sendgrid_from_name,
            cors_origins,
        }
    }
}

/// Environment variable value, falling back to the TOML layer
fn env_or(var: &str, toml_value: Option<String>) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.is_empty()).or(toml_value)
}

/// Filter out unset and placeholder credentials
///
/// Scaffold configs ship keys like `your_groq_api_key_here`; treating those
/// as configured would turn every dream submission into an upstream 401.
pub fn configured_key(value: Option<String>) -> Option<String> {
    value.filter(|key| is_configured_key(key))
}

/// Validate a credential (non-empty, non-whitespace, not a placeholder)
pub fn is_configured_key(key: &str) -> bool {
    let key = key.trim();
    if key.is_empty() {
        return false;
    }
    !(key.starts_with("your_") && key.ends_with("_here"))
}

/// Locate the TOML config file and parse it; absent file is an empty layer
fn load_toml_config() -> Result<TomlConfig> {
    let path = match config_file_path() {
        Some(path) if path.exists() => path,
        _ => return Ok(TomlConfig::default()),
    };

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read config file failed: {}", e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    tracing::info!("Loaded config file: {}", path.display());
    Ok(config)
}

/// Config file path: `LOOM_CONFIG` override, else the platform config dir
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("LOOM_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("lucidloom").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("lucidloom"))
        .unwrap_or_else(|| PathBuf::from("./lucidloom_data"))
        .join("loom.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_keys_rejected() {
        assert!(!is_configured_key(""));
        assert!(!is_configured_key("   "));
        assert!(!is_configured_key("your_groq_api_key_here"));
        assert!(!is_configured_key("your_openai_api_key_here"));
        assert!(is_configured_key("gsk_live_abc123"));
    }

    #[test]
    fn test_resolve_defaults() {
        let config = AppConfig::resolve(TomlConfig::default());
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.sendgrid_from_name, "Lucid Loom");
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_toml_layer_used_when_env_absent() {
        let toml_config = TomlConfig {
            groq_api_key: Some("gsk_from_toml".to_string()),
            sendgrid_from_name: Some("Test Sender".to_string()),
            ..TomlConfig::default()
        };
        // GROQ_API_KEY may be set in the host env; only assert when it is not.
        if std::env::var("GROQ_API_KEY").is_err() {
            let config = AppConfig::resolve(toml_config);
            assert_eq!(config.groq_api_key.as_deref(), Some("gsk_from_toml"));
            assert_eq!(config.sendgrid_from_name, "Test Sender");
        }
    }

    #[test]
    fn test_placeholder_key_resolves_to_none() {
        let toml_config = TomlConfig {
            openai_api_key: Some("your_openai_api_key_here".to_string()),
            ..TomlConfig::default()
        };
        if std::env::var("OPENAI_API_KEY").is_err() {
            let config = AppConfig::resolve(toml_config);
            assert_eq!(config.openai_api_key, None);
        }
    }
}
