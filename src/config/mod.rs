use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Minimum length of the token signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Built SPA bundle served for every non-API path
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
    /// Browser origins allowed to call the API with credentials
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: None,
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://./data/leadgrid.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. Has no default.
    #[serde(default)]
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    #[serde(default = "default_cookie_max_age_hours")]
    pub cookie_max_age_hours: i64,
    /// Mark the session cookie `Secure` and `SameSite=None` (cross-site SPA over HTTPS)
    #[serde(default)]
    pub cookie_secure: bool,
    /// Issue a session cookie right after registration
    #[serde(default)]
    pub login_on_register: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            cookie_max_age_hours: default_cookie_max_age_hours(),
            cookie_secure: false,
            login_on_register: false,
        }
    }
}

fn default_token_ttl_hours() -> i64 {
    24
}

fn default_cookie_max_age_hours() -> i64 {
    24
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load the TOML file (if present), apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)?
        } else {
            info!("No config file found, using defaults");
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    /// Overlay values from the environment. `lookup` is injectable for tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("LEADGRID_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(secret) = lookup("LEADGRID_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = lookup("LEADGRID_TOKEN_TTL_HOURS") {
            self.auth.token_ttl_hours = ttl
                .parse()
                .with_context(|| format!("LEADGRID_TOKEN_TTL_HOURS is not an integer: {}", ttl))?;
        }
        if let Some(max_age) = lookup("LEADGRID_COOKIE_MAX_AGE_HOURS") {
            self.auth.cookie_max_age_hours = max_age.parse().with_context(|| {
                format!("LEADGRID_COOKIE_MAX_AGE_HOURS is not an integer: {}", max_age)
            })?;
        }
        if let Some(host) = lookup("LEADGRID_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("LEADGRID_PORT").or_else(|| lookup("PORT")) {
            self.server.port = port
                .parse()
                .with_context(|| format!("Port is not a valid number: {}", port))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            bail!("auth.jwt_secret is not set (use LEADGRID_JWT_SECRET or the config file)");
        }
        if self.auth.jwt_secret.len() < MIN_SECRET_LEN {
            bail!(
                "auth.jwt_secret is too short (min {} bytes)",
                MIN_SECRET_LEN
            );
        }
        if self.auth.token_ttl_hours <= 0 {
            bail!("auth.token_ttl_hours must be positive");
        }
        if self.auth.cookie_max_age_hours <= 0 {
            bail!("auth.cookie_max_age_hours must be positive");
        }
        if self.database.max_connections == 0 {
            bail!("database.max_connections must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.auth.token_ttl_hours, 24);
        assert!(config.auth.jwt_secret.is_empty());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_toml() {
        let config = Config::from_toml(
            r#"
            [server]
            port = 8080
            cors_origins = ["http://localhost:5173"]

            [auth]
            jwt_secret = "0123456789abcdef0123456789abcdef"
            token_ttl_hours = 168
            cookie_secure = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.cors_origins, vec!["http://localhost:5173"]);
        assert_eq!(config.auth.token_ttl_hours, 168);
        assert!(config.auth.cookie_secure);
        assert_eq!(config.database.max_connections, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("LEADGRID_JWT_SECRET", SECRET),
            ("LEADGRID_DATABASE_URL", "sqlite::memory:"),
            ("PORT", "4000"),
            ("LEADGRID_TOKEN_TTL_HOURS", "48"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.auth.jwt_secret, SECRET);
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.auth.token_ttl_hours, 48);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_rejects_bad_numbers() {
        let mut config = Config::default();
        let result = config.apply_env(|k| {
            (k == "LEADGRID_PORT").then(|| "not-a-port".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = Config::default();
        config.auth.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }
}
