//! # Workflow Configuration
//!
//! Configuration is loaded once at process start by [`ConfigManager`] and
//! handed to the engine, resolver and search constructors. Nothing in the
//! crate reads configuration from ambient global state.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use order_workflow::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let chain = manager.config().workflow.effective_chain();
//! println!("{} approval steps", chain.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use crate::constants::{
    DEFAULT_CONFLICT_RETRIES, DEFAULT_EVENT_CHANNEL_CAPACITY, DEFAULT_WORK_ID_ATTEMPTS,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

/// Placeholders a chain step scope may reference
pub const SCOPE_PLACEHOLDERS: [&str; 3] = ["source", "idc", "database"];

/// Root configuration structure mirroring `config/order-workflow.yaml`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Approval policy shared by the engine and the assignment resolver
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// When false only the first chain step is used
    #[serde(default)]
    pub multi_approver: bool,
    pub approval_chain: Vec<ChainStep>,
    #[serde(default = "default_conflict_retries")]
    pub conflict_retries: u32,
    #[serde(default = "default_work_id_attempts")]
    pub work_id_attempts: u32,
    /// Refuse a second open order with the same owner, target and text
    #[serde(default)]
    pub reject_duplicates: bool,
}

fn default_conflict_retries() -> u32 {
    DEFAULT_CONFLICT_RETRIES
}

fn default_work_id_attempts() -> u32 {
    DEFAULT_WORK_ID_ATTEMPTS
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            multi_approver: false,
            approval_chain: vec![ChainStep::new("review", "{source}")],
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
            work_id_attempts: DEFAULT_WORK_ID_ATTEMPTS,
            reject_duplicates: false,
        }
    }
}

impl WorkflowConfig {
    pub fn with_chain(multi_approver: bool, approval_chain: Vec<ChainStep>) -> Self {
        Self {
            multi_approver,
            approval_chain,
            ..Self::default()
        }
    }

    /// The chain actually enforced
    pub fn effective_chain(&self) -> &[ChainStep] {
        if self.multi_approver {
            &self.approval_chain
        } else {
            &self.approval_chain[..self.approval_chain.len().min(1)]
        }
    }

    pub fn chain_len(&self) -> u32 {
        self.effective_chain().len() as u32
    }

    pub fn step(&self, step: u32) -> Option<&ChainStep> {
        self.effective_chain().get(step as usize)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.approval_chain.is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "approval_chain",
                "workflow",
            ));
        }

        let mut names = HashSet::new();
        for step in &self.approval_chain {
            if step.name.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    "name",
                    "workflow.approval_chain",
                ));
            }
            if !names.insert(step.name.as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "workflow.approval_chain.name",
                    &step.name,
                    "step names must be unique",
                ));
            }
            step.validate()?;
        }

        if self.conflict_retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "workflow.conflict_retries",
                "0",
                "must be at least 1",
            ));
        }
        if self.work_id_attempts == 0 {
            return Err(ConfigurationError::invalid_value(
                "workflow.work_id_attempts",
                "0",
                "must be at least 1",
            ));
        }

        Ok(())
    }
}

/// One reviewer group in the approval chain
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChainStep {
    pub name: String,
    /// Scope label template, e.g. `dba:{idc}` or `owner:{source}/{database}`
    pub scope: String,
}

impl ChainStep {
    pub fn new(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Placeholder names referenced by the scope template
    pub fn placeholders(&self) -> Vec<&str> {
        let mut found = Vec::new();
        let mut rest = self.scope.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    found.push(&after[..close]);
                    rest = &after[close + 1..];
                }
                None => break,
            }
        }
        found
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.scope.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "scope",
                format!("workflow.approval_chain[{}]", self.name),
            ));
        }
        let opens = self.scope.matches('{').count();
        let closes = self.scope.matches('}').count();
        if opens != closes {
            return Err(ConfigurationError::invalid_value(
                "workflow.approval_chain.scope",
                &self.scope,
                "unbalanced braces",
            ));
        }
        if let Some(unknown) = self
            .placeholders()
            .into_iter()
            .find(|name| !SCOPE_PLACEHOLDERS.contains(name))
        {
            return Err(ConfigurationError::invalid_value(
                "workflow.approval_chain.scope",
                &self.scope,
                format!("unknown placeholder '{{{unknown}}}'"),
            ));
        }
        Ok(())
    }
}

/// Worklist settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchConfig {
    /// IDC labels offered to the UI with every list response
    #[serde(default)]
    pub idc: Vec<String>,
}

/// Outbound notification settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Username to message-channel user id
    #[serde(default)]
    pub recipients: HashMap<String, String>,
}

fn default_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            recipients: HashMap::new(),
        }
    }
}

/// PostgreSQL connection settings for the SQL order store
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_seconds")]
    pub acquire_timeout_seconds: u64,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_acquire_timeout_seconds() -> u64 {
    5
}

fn default_run_migrations() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout_seconds(),
            run_migrations: default_run_migrations(),
        }
    }
}

impl DatabaseConfig {
    /// Explicit url, falling back to `DATABASE_URL`
    pub fn database_url(&self) -> Option<String> {
        self.url
            .clone()
            .or_else(|| std::env::var("DATABASE_URL").ok())
    }
}

/// Structured logging settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_directory")]
    pub directory: PathBuf,
    /// Overrides the environment-derived level, e.g. `info,order_workflow=debug`
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default = "default_file_output")]
    pub file_output: bool,
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("log")
}

fn default_file_output() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_directory(),
            level: None,
            file_output: default_file_output(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        self.workflow.validate()?;

        if let Some(blank) = self.search.idc.iter().find(|idc| idc.trim().is_empty()) {
            return Err(ConfigurationError::invalid_value(
                "search.idc",
                blank,
                "IDC labels must not be blank",
            ));
        }
        if self.notification.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "notification.channel_capacity",
                "0",
                "must be at least 1",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigurationError::invalid_value(
                "database.max_connections",
                "0",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
