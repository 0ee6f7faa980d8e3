//! Configuration Loader
//!
//! Environment-aware loading: a base `order-workflow.yaml`, an optional
//! `environments/<env>.yaml` override, then `ORDER_WORKFLOW__*` environment
//! variables (double underscore separates nested keys).

use super::error::{ConfigResult, ConfigurationError};
use super::AppConfig;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

pub const BASE_CONFIG_FILE: &str = "order-workflow.yaml";
pub const ENVIRONMENT_DIRECTORY: &str = "environments";
pub const ENV_PREFIX: &str = "ORDER_WORKFLOW";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: AppConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory = config_dir.unwrap_or_else(Self::default_config_directory);

        debug!(
            environment = %environment,
            directory = %config_directory.display(),
            "Loading order workflow configuration"
        );

        let config = Self::load_and_merge_config(&config_directory, environment)?;
        config.validate()?;

        info!(
            environment = %environment,
            multi_approver = config.workflow.multi_approver,
            chain_len = config.workflow.chain_len(),
            notifications = config.notification.enabled,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Wrap an already-built configuration, e.g. when embedding the engine
    pub fn from_config(config: AppConfig, environment: &str) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory: Self::default_config_directory(),
        }))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_directory(&self) -> &Path {
        &self.config_directory
    }

    /// `ORDER_WORKFLOW_ENV`, then `APP_ENV`, defaulting to development
    pub fn detect_environment() -> String {
        env::var("ORDER_WORKFLOW_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
    }

    fn default_config_directory() -> PathBuf {
        env::var("ORDER_WORKFLOW_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    fn load_and_merge_config(config_directory: &Path, environment: &str) -> ConfigResult<AppConfig> {
        let base_path = config_directory.join(BASE_CONFIG_FILE);
        if !base_path.is_file() {
            return Err(ConfigurationError::ConfigFileNotFound {
                searched_paths: vec![base_path],
            });
        }

        let override_path = config_directory
            .join(ENVIRONMENT_DIRECTORY)
            .join(format!("{environment}.yaml"));
        if override_path.is_file() {
            debug!(path = %override_path.display(), "Applying environment override");
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(base_path.as_path()))
            .add_source(config::File::from(override_path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize::<AppConfig>()?)
    }
}
