//! TOML configuration for the command surface.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StrataError};

/// Root configuration, usually loaded from `strata.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrataConfig {
    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Structural schema change-set.
    #[serde(default = "ChangeSetConfig::migrations")]
    pub migrations: ChangeSetConfig,

    /// Reference/seed data change-set.
    #[serde(default = "ChangeSetConfig::seeds")]
    pub seeds: ChangeSetConfig,
}

impl StrataConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| StrataError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string, substituting `${ENV_VAR}`
    /// placeholders from the environment first.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| StrataError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Configuration with defaults for everything but the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            migrations: ChangeSetConfig::migrations(),
            seeds: ChangeSetConfig::seeds(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,

    /// Connection pool size.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Pool checkout timeout in seconds.
    #[serde(default = "default_pool_timeout")]
    pub pool_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: default_pool_size(),
            pool_timeout_secs: default_pool_timeout(),
        }
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_pool_timeout() -> u64 {
    30
}

/// Settings for one change-set instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeSetConfig {
    /// Ledger table recording applied scripts.
    pub table: String,
}

impl ChangeSetConfig {
    pub fn migrations() -> Self {
        Self {
            table: "strata_migrations".to_string(),
        }
    }

    pub fn seeds() -> Self {
        Self {
            table: "strata_seeds".to_string(),
        }
    }
}

/// Substitute `${VAR_NAME}` with environment variable values.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
