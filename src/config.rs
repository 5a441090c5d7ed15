//! Configuration loading and management.
//!
//! All tunables live in a single TOML file: server identity, database path,
//! token signing parameters, and the per-endpoint admission limits.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Server identity and listen address.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token issuance and validation parameters.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Admission rate limits.
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name, also used as the token issuer.
    #[serde(default = "default_server_name")]
    pub name: String,
    /// Address the HTTP API binds to.
    #[serde(default = "default_bind")]
    pub bind: std::net::SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_server_name(),
            bind: default_bind(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or ":memory:" for an ephemeral database.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Token signing and lifetime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret. MUST be replaced before production use;
    /// the daemon refuses to start on the built-in default.
    #[serde(default = "default_token_secret")]
    pub token_secret: String,
    /// Audience claim stamped into every issued token.
    #[serde(default = "default_audience")]
    pub audience: String,
    /// Access token lifetime in minutes.
    #[serde(default = "default_access_ttl_mins")]
    pub access_ttl_mins: u64,
    /// Refresh token lifetime in days.
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: default_token_secret(),
            audience: default_audience(),
            access_ttl_mins: default_access_ttl_mins(),
            refresh_ttl_days: default_refresh_ttl_days(),
        }
    }
}

/// A single limiter parameterization: `rate` tokens per `interval_secs`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimiterSpec {
    pub rate: u32,
    pub interval_secs: u64,
}

/// Admission limits, one independent bucket table per endpoint class.
/// Exhausting one endpoint's budget must not affect another's.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Login attempts per client IP.
    #[serde(default = "default_login_limit")]
    pub login: LimiterSpec,
    /// Registration attempts per client IP.
    #[serde(default = "default_register_limit")]
    pub register: LimiterSpec,
    /// All other API requests per client IP.
    #[serde(default = "default_general_limit")]
    pub general: LimiterSpec,
    /// Message sends per user, consumed by the transport layer.
    #[serde(default = "default_message_limit")]
    pub message: LimiterSpec,
    /// How often idle buckets are swept.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login: default_login_limit(),
            register: default_register_limit(),
            general: default_general_limit(),
            message: default_message_limit(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn default_server_name() -> String {
    "commcomms".to_string()
}

fn default_bind() -> std::net::SocketAddr {
    ([0, 0, 0, 0], 8080).into()
}

fn default_db_path() -> String {
    "commsd.db".to_string()
}

fn default_token_secret() -> String {
    "change-this-secret".to_string()
}

fn default_audience() -> String {
    "commcomms-api".to_string()
}

fn default_access_ttl_mins() -> u64 {
    15
}

fn default_refresh_ttl_days() -> u64 {
    7
}

fn default_login_limit() -> LimiterSpec {
    LimiterSpec {
        rate: 10,
        interval_secs: 900,
    }
}

fn default_register_limit() -> LimiterSpec {
    LimiterSpec {
        rate: 5,
        interval_secs: 3600,
    }
}

fn default_general_limit() -> LimiterSpec {
    LimiterSpec {
        rate: 100,
        interval_secs: 60,
    }
}

fn default_message_limit() -> LimiterSpec {
    LimiterSpec {
        rate: 30,
        interval_secs: 60,
    }
}

fn default_sweep_interval_secs() -> u64 {
    300
}

/// True when the signing secret is still the shipped default.
///
/// Tokens signed with a predictable secret can be forged by anyone who has
/// read the source, so startup refuses this value outside of tests.
pub fn is_default_secret(secret: &str) -> bool {
    secret == default_token_secret() || secret.len() < 16
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_endpoint_budgets() {
        let config = Config::default();
        assert_eq!(config.rate_limits.login.rate, 10);
        assert_eq!(config.rate_limits.login.interval_secs, 900);
        assert_eq!(config.rate_limits.register.rate, 5);
        assert_eq!(config.rate_limits.register.interval_secs, 3600);
        assert_eq!(config.auth.access_ttl_mins, 15);
        assert_eq!(config.auth.refresh_ttl_days, 7);
    }

    #[test]
    fn load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [server]
            name = "testnet"

            [auth]
            token_secret = "0123456789abcdef0123456789abcdef"

            [rate_limits]
            login = {{ rate = 3, interval_secs = 60 }}
            "#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.name, "testnet");
        assert_eq!(config.rate_limits.login.rate, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.rate_limits.register.rate, 5);
        assert_eq!(config.database.path, "commsd.db");
    }

    #[test]
    fn default_secret_is_rejected() {
        assert!(is_default_secret(&AuthConfig::default().token_secret));
        assert!(is_default_secret("short"));
        assert!(!is_default_secret("0123456789abcdef0123456789abcdef"));
    }
}
