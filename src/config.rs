//! Configuration loading and management
//!
//! Handles parsing of `.cadence.toml` configuration files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage::CONFIG_FILE;
use crate::task::{TaskPriority, TaskStatus};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Actor configuration
    #[serde(default)]
    pub actor: ActorConfig,

    /// Recurrence expansion configuration
    #[serde(default)]
    pub recurrence: RecurrenceConfig,

    /// Task defaults
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Statically granted permissions
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

/// Actor-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Default actor name when none specified
    #[serde(default = "default_actor")]
    pub default: String,
}

fn default_actor() -> String {
    "unknown".to_string()
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            default: default_actor(),
        }
    }
}

/// Recurrence expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceConfig {
    /// Rolling generation window, in months past today
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,

    /// Upper bound on instances materialized per series per run
    #[serde(default = "default_max_instances_per_run")]
    pub max_instances_per_run: usize,
}

fn default_horizon_months() -> u32 {
    3
}

fn default_max_instances_per_run() -> usize {
    1000
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            horizon_months: default_horizon_months(),
            max_instances_per_run: default_max_instances_per_run(),
        }
    }
}

/// Task defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Status given to new tasks
    #[serde(default)]
    pub default_status: TaskStatus,

    /// Priority given to new tasks when none is specified
    #[serde(default)]
    pub default_priority: TaskPriority,

    /// Page size for listings without an explicit limit
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize {
    25
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            default_status: TaskStatus::default(),
            default_priority: TaskPriority::default(),
            page_size: default_page_size(),
        }
    }
}

/// Permission grants, as glob patterns over slugs (e.g. `tasks.*`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    #[serde(default = "default_granted")]
    pub granted: Vec<String>,
}

fn default_granted() -> Vec<String> {
    vec!["tasks.*".to_string()]
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            granted: default_granted(),
        }
    }
}

impl Config {
    /// Load configuration from a `.cadence.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a root directory, or return defaults when absent
    pub fn load_from_dir(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.actor.default.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "actor.default cannot be empty".to_string(),
            ));
        }
        self.recurrence.validate()?;
        self.tasks.validate()?;
        self.permissions.validate()?;
        Ok(())
    }
}

impl RecurrenceConfig {
    fn validate(&self) -> Result<()> {
        if self.horizon_months == 0 {
            return Err(Error::InvalidConfig(
                "recurrence.horizon_months must be >= 1".to_string(),
            ));
        }
        if self.horizon_months > 120 {
            return Err(Error::InvalidConfig(
                "recurrence.horizon_months must be <= 120".to_string(),
            ));
        }
        if self.max_instances_per_run == 0 {
            return Err(Error::InvalidConfig(
                "recurrence.max_instances_per_run must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        if self.default_status.is_closed() {
            return Err(Error::InvalidConfig(format!(
                "tasks.default_status cannot be a closed status ('{}')",
                self.default_status
            )));
        }
        if self.page_size == 0 {
            return Err(Error::InvalidConfig(
                "tasks.page_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl PermissionsConfig {
    fn validate(&self) -> Result<()> {
        for pattern in &self.granted {
            if pattern.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "permissions.granted cannot include empty entries".to_string(),
                ));
            }
            glob::Pattern::new(pattern).map_err(|err| {
                Error::InvalidConfig(format!(
                    "permissions.granted: invalid pattern '{pattern}': {err}"
                ))
            })?;
        }
        Ok(())
    }
}
