//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Administrator provisioning.
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Administrator provisioning.
///
/// The admin role is never granted through the public API. Emails listed
/// here get it at sign-up and whenever their token is authenticated, so a
/// config change promotes existing accounts too. Anyone else has to be
/// promoted directly in the database.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Emails that receive the admin role when they register.
    #[serde(default)]
    pub bootstrap_emails: Vec<String>,
}

impl AdminConfig {
    /// Whether `email` is a bootstrap admin (case-insensitive).
    #[must_use]
    pub fn is_bootstrap_admin(&self, email: &str) -> bool {
        self.bootstrap_emails
            .iter()
            .any(|e| e.trim().eq_ignore_ascii_case(email.trim()))
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `VOTEROOM_ENV`)
    /// 3. Environment variables with `VOTEROOM__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("VOTEROOM_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("VOTEROOM")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("admin.bootstrap_emails")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("VOTEROOM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Config, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_toml(
            r#"
            [server]
            [database]
            url = "postgres://localhost/voteroom"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 2);
        assert!(config.admin.bootstrap_emails.is_empty());
    }

    #[test]
    fn test_missing_database_url_is_error() {
        let result = from_toml(
            r"
            [server]
            port = 8080
            [database]
            ",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bootstrap_admin_is_case_insensitive() {
        let admin = AdminConfig {
            bootstrap_emails: vec!["Root@Example.com".to_string()],
        };

        assert!(admin.is_bootstrap_admin("root@example.com"));
        assert!(admin.is_bootstrap_admin(" ROOT@EXAMPLE.COM "));
        assert!(!admin.is_bootstrap_admin("voter@example.com"));
    }
}
