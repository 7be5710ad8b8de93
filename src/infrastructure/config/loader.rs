use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;

use super::schema::Config;
use crate::domain::errors::ConfigError;

/// Loads the process-wide [`Config`] with hierarchical merging (spec §10.3).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults.
    /// 2. `.tripledb/config.yaml` (project config).
    /// 3. `.tripledb/local.yaml` (project-local overrides, optional).
    /// 4. Environment variables, `TRIPLEDB_` prefixed, `__`-nested.
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".tripledb/config.yaml"))
            .merge(Yaml::file(".tripledb/local.yaml"))
            .merge(Env::prefixed("TRIPLEDB_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Loads configuration from a specific file, defaults merged underneath.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validates configuration after loading.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.worker_count == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        if config.sync_batch_size == 0 {
            return Err(ConfigError::InvalidBatchSize);
        }
        if config.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries);
        }
        if config.backoff_base < 2 {
            return Err(ConfigError::InvalidBackoffBase);
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections);
        }

        if config.connection_cap_relational == 0 {
            return Err(ConfigError::InvalidConnectionCap("relational".to_string()));
        }
        if config.connection_cap_vector == 0 {
            return Err(ConfigError::InvalidConnectionCap("vector".to_string()));
        }
        if config.connection_cap_graph == 0 {
            return Err(ConfigError::InvalidConnectionCap("graph".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(ConfigLoader::validate(&config).is_ok());
    }

    #[test]
    fn zero_worker_count_is_rejected() {
        let mut config = Config::default();
        config.worker_count = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidWorkerCount)
        ));
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn zero_connection_cap_is_rejected() {
        let mut config = Config::default();
        config.connection_cap_graph = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidConnectionCap(store)) if store == "graph"
        ));
    }
}
