use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::{Config, StorageBackend};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid rate limit: {0}. Must be positive")]
    InvalidRateLimit(f64),

    #[error("Invalid burst_size: {0}. Must be at least 1")]
    InvalidBurstSize(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid {phase} concurrency: {value}. Must be at least 1")]
    InvalidConcurrency { phase: &'static str, value: usize },

    #[error("Task timeout must be at least 1 second")]
    InvalidTaskTimeout,

    #[error("Invalid quality threshold {value} for {doc_type}. Must be between 0 and 100")]
    InvalidThreshold { doc_type: String, value: f64 },

    #[error("Model name cannot be empty")]
    EmptyModel,

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Project configuration file, relative to the working directory.
    pub const PROJECT_CONFIG: &'static str = ".docsuite/config.yaml";
    /// Optional local overrides, relative to the working directory.
    pub const LOCAL_CONFIG: &'static str = ".docsuite/local.yaml";
    pub const ENV_PREFIX: &'static str = "DOCSUITE_";

    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `.docsuite/config.yaml`
    /// 3. `.docsuite/local.yaml`
    /// 4. Environment variables (`DOCSUITE_` prefix, `__` separates nested keys)
    pub fn load() -> Result<Config> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(Self::PROJECT_CONFIG))
            .merge(Yaml::file(Self::LOCAL_CONFIG))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"));
        Self::extract(&figment, "Failed to extract configuration from figment")
    }

    /// Load configuration from a specific file, still honouring the environment
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"));
        Self::extract(
            &figment,
            &format!("Failed to load config from {}", path.display()),
        )
    }

    fn extract(figment: &Figment, context: &str) -> Result<Config> {
        let config: Config = figment.extract().context(context.to_string())?;
        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.rate_limit.requests_per_second <= 0.0
            || !config.rate_limit.requests_per_second.is_finite()
        {
            return Err(ConfigError::InvalidRateLimit(
                config.rate_limit.requests_per_second,
            ));
        }
        if config.rate_limit.burst_size == 0 {
            return Err(ConfigError::InvalidBurstSize(config.rate_limit.burst_size));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let workflow = &config.workflow;
        if workflow.phase1_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency {
                phase: "phase1",
                value: 0,
            });
        }
        if workflow.phase2_concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency {
                phase: "phase2",
                value: 0,
            });
        }
        if workflow.task_timeout_secs == 0 {
            return Err(ConfigError::InvalidTaskTimeout);
        }
        if let Some((doc_type, value)) = workflow
            .quality_thresholds
            .iter()
            .find(|(_, v)| !(0.0..=100.0).contains(*v))
        {
            return Err(ConfigError::InvalidThreshold {
                doc_type: doc_type.to_string(),
                value: *value,
            });
        }

        if config.generation.model.trim().is_empty()
            || config.generation.phase_models.values().any(|m| m.trim().is_empty())
        {
            return Err(ConfigError::EmptyModel);
        }

        if config.storage.backend == StorageBackend::Sqlite {
            if config.storage.database_path.is_empty() {
                return Err(ConfigError::EmptyDatabasePath);
            }
            if config.storage.max_connections == 0 {
                return Err(ConfigError::InvalidMaxConnections(0));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DocumentType, ProviderKind};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn yaml_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{contents}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config_is_valid() {
        ConfigLoader::validate(&Config::default()).expect("Default config should be valid");
    }

    #[test]
    fn test_load_from_file_merges_defaults() {
        let file = yaml_file(
            "workflow:\n  phase1_concurrency: 2\ngeneration:\n  provider: ollama\n",
        );
        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.workflow.phase1_concurrency, 2);
        assert_eq!(config.workflow.phase2_concurrency, 8);
        assert_eq!(config.generation.provider, ProviderKind::Ollama);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = yaml_file("workflow:\n  phase2_concurrency: 2\n");
        temp_env::with_vars(
            [
                ("DOCSUITE_WORKFLOW__PHASE2_CONCURRENCY", Some("3")),
                ("DOCSUITE_LOGGING__LEVEL", Some("debug")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.workflow.phase2_concurrency, 3);
                assert_eq!(config.logging.level, "debug");
            },
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ConfigLoader::load_from_file("/nonexistent/docsuite.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let file = yaml_file("workflow:\n  phase1_concurrency: 0\n");
        assert!(ConfigLoader::load_from_file(file.path()).is_err());

        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));

        let mut config = Config::default();
        config.rate_limit.requests_per_second = 0.0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidRateLimit(_))
        ));

        let mut config = Config::default();
        config.retry.initial_backoff_ms = 60_000;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(60_000, 30_000))
        ));

        let mut config = Config::default();
        config
            .workflow
            .quality_thresholds
            .insert(DocumentType::Requirements, 120.0);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn test_memory_backend_ignores_database_path() {
        let mut config = Config::default();
        config.storage.backend = StorageBackend::Memory;
        config.storage.database_path = String::new();
        assert!(ConfigLoader::validate(&config).is_ok());
    }
}
