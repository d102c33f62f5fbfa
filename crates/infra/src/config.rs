//! Configuration loading.
//!
//! Layered, later sources win:
//! 1. defaults in code
//! 2. `config/<environment>.toml` (optional)
//! 3. environment variables prefixed `TONER__` (e.g. `TONER__DATABASE__PATH`)
//!
//! A `.env` file in the working directory is read first, if present.

use config::{ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    /// `development`, `production`, ...
    pub environment: String,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`.
    pub path: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct SessionConfig {
    pub ttl_hours: i64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// JSON lines when true, human-readable text otherwise.
    pub json: bool,
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
}

impl AppConfig {
    /// Load configuration from defaults, file and environment.
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let environment =
            std::env::var("TONER_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("database.path", "toner.db")?
            .set_default("database.max_connections", 4)?
            .set_default("database.busy_timeout_secs", 30)?
            .set_default("session.ttl_hours", 8)?
            .set_default("logging.json", true)?
            .set_default("logging.level", "info")?
            .add_source(File::with_name(&format!("config/{environment}")).required(false))
            .add_source(
                Environment::with_prefix("TONER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            database: DatabaseConfig {
                path: "toner.db".into(),
                max_connections: 4,
                busy_timeout_secs: 30,
            },
            session: SessionConfig { ttl_hours: 8 },
            logging: LoggingConfig {
                json: true,
                level: "info".into(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_a_local_database() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.database.path, "toner.db");
        assert_eq!(cfg.session.ttl_hours, 8);
        assert!(!cfg.is_production());
    }

    #[test]
    fn load_without_sources_matches_defaults() {
        // Only meaningful when no TONER__ overrides are set in the test environment.
        if std::env::vars().any(|(k, _)| k.starts_with("TONER")) {
            return;
        }
        let cfg = AppConfig::load().unwrap();
        assert_eq!(cfg.database.max_connections, 4);
        assert!(cfg.logging.json);
    }
}
