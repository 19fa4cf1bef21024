//! Configuration management for the Koperasi back-office server
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with KOP_ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub jwt: JwtConfig,

    pub qr: QrConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret used to verify bearer tokens
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QrConfig {
    /// HMAC key for signing QR payloads
    pub signing_secret: String,

    /// Lifetime of purchase order codes
    pub purchase_order_ttl_hours: i64,

    /// Lifetime of kitchen order codes
    pub kitchen_order_ttl_hours: i64,
}

impl QrConfig {
    pub fn purchase_order_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.purchase_order_ttl_hours)
    }

    pub fn kitchen_order_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.kitchen_order_ttl_hours)
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("KOP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(config::Config::builder(), &environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (KOP_ prefix)
            .add_source(
                Environment::with_prefix("KOP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        environment: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("environment", environment)?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("qr.purchase_order_ttl_hours", 24 * 14)?
            .set_default("qr.kitchen_order_ttl_hours", 48)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.qr.signing_secret.trim().is_empty() {
            return Err(ConfigError::Message("qr.signing_secret must not be empty".into()));
        }
        if self.qr.purchase_order_ttl_hours <= 0 || self.qr.kitchen_order_ttl_hours <= 0 {
            return Err(ConfigError::Message("qr TTLs must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(overrides: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let mut builder = Config::defaults(config::Config::builder(), "test")?
            .set_override("database.url", "postgres://localhost/koperasi_test")?
            .set_override("jwt.secret", "jwt-test")?
            .set_override("qr.signing_secret", "qr-test")?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = build(&[]).unwrap();
        assert_eq!(config.environment, "test");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.qr.purchase_order_ttl(), chrono::Duration::days(14));
        assert_eq!(config.qr.kitchen_order_ttl(), chrono::Duration::hours(48));
    }

    #[test]
    fn test_empty_qr_secret_is_rejected() {
        assert!(build(&[("qr.signing_secret", "  ")]).is_err());
    }

    #[test]
    fn test_non_positive_ttl_is_rejected() {
        assert!(build(&[("qr.kitchen_order_ttl_hours", "0")]).is_err());
    }
}
