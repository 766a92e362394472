//! Storage layer for cadence
//!
//! All state for one tenant lives under a single root directory:
//!
//! ```text
//! <root>/
//!   .cadence.toml                 # Configuration (optional)
//!   .cadence/
//!     actor                       # Persisted actor identity
//!     tasks.json                  # Task snapshot
//!     series.json                 # Recurrence series snapshot
//!     locks/
//!       store.lock                # Held for every read-modify-write
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Result;
use crate::lock::{self, FileLock};
use crate::series::RecurrenceSeries;
use crate::task::TaskRecord;

/// Name of the data directory under the root
pub const DATA_DIR: &str = ".cadence";

/// Name of the configuration file under the root
pub const CONFIG_FILE: &str = ".cadence.toml";

const TASKS_SCHEMA_VERSION: &str = "cadence.tasks.v1";
const SERIES_SCHEMA_VERSION: &str = "cadence.series.v1";

/// Storage manager for cadence state
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    // =========================================================================
    // Path accessors
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the `.cadence/` data directory
    pub fn data_dir(&self) -> PathBuf {
        self.root.join(DATA_DIR)
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn actor_file(&self) -> PathBuf {
        self.data_dir().join("actor")
    }

    pub fn tasks_file(&self) -> PathBuf {
        self.data_dir().join("tasks.json")
    }

    pub fn series_file(&self) -> PathBuf {
        self.data_dir().join("series.json")
    }

    pub fn locks_dir(&self) -> PathBuf {
        self.data_dir().join("locks")
    }

    pub fn store_lock_file(&self) -> PathBuf {
        self.locks_dir().join("store.lock")
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create the data directory layout
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(self.locks_dir())?;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.data_dir().exists()
    }

    /// Acquire the store-wide lock
    pub fn lock(&self, timeout_ms: u64) -> Result<FileLock> {
        FileLock::acquire(self.store_lock_file(), timeout_ms)
    }

    // =========================================================================
    // File I/O helpers
    // =========================================================================

    /// Write JSON data atomically (write to temp, then rename)
    pub fn write_json<T: Serialize>(&self, path: &Path, data: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        lock::write_atomic(path, json.as_bytes())
    }

    /// Read JSON data from a file
    pub fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)?;
        let data: T = serde_json::from_str(&content)?;
        Ok(data)
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn read_tasks(&self) -> Result<Vec<TaskRecord>> {
        let path = self.tasks_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let snapshot: TaskSnapshot = self.read_json(&path)?;
        Ok(snapshot.tasks)
    }

    pub fn write_tasks(&self, tasks: &[TaskRecord]) -> Result<()> {
        let snapshot = TaskSnapshot {
            schema_version: TASKS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            tasks: tasks.to_vec(),
        };
        self.write_json(&self.tasks_file(), &snapshot)
    }

    pub fn read_series(&self) -> Result<Vec<RecurrenceSeries>> {
        let path = self.series_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let snapshot: SeriesSnapshot = self.read_json(&path)?;
        Ok(snapshot.series)
    }

    pub fn write_series(&self, series: &[RecurrenceSeries]) -> Result<()> {
        let snapshot = SeriesSnapshot {
            schema_version: SERIES_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            series: series.to_vec(),
        };
        self.write_json(&self.series_file(), &snapshot)
    }

    // =========================================================================
    // Actor persistence
    // =========================================================================

    /// Read the persisted actor identity
    pub fn read_actor(&self) -> Option<String> {
        fs::read_to_string(self.actor_file())
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Persist the actor identity
    pub fn write_actor(&self, actor: &str) -> Result<()> {
        self.init()?;
        lock::write_atomic(self.actor_file(), format!("{actor}\n").as_bytes())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskSnapshot {
    schema_version: String,
    generated_at: DateTime<Utc>,
    tasks: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SeriesSnapshot {
    schema_version: String,
    generated_at: DateTime<Utc>,
    series: Vec<RecurrenceSeries>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskDraft, TaskStatus, TaskTemplate};
    use tempfile::TempDir;

    #[test]
    fn init_creates_layout() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert!(!storage.is_initialized());

        storage.init().unwrap();
        assert!(storage.is_initialized());
        assert!(storage.locks_dir().is_dir());
    }

    #[test]
    fn missing_snapshots_read_empty() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert!(storage.read_tasks().unwrap().is_empty());
        assert!(storage.read_series().unwrap().is_empty());
    }

    #[test]
    fn task_snapshot_round_trip() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        let task = TaskRecord::from_draft(
            TaskDraft::standalone(TaskTemplate::new("Renew license"), None),
            TaskStatus::Pending,
            Some("ana"),
            Utc::now(),
        );
        storage.write_tasks(std::slice::from_ref(&task)).unwrap();

        let raw = fs::read_to_string(storage.tasks_file()).unwrap();
        assert!(raw.contains(TASKS_SCHEMA_VERSION));
        assert_eq!(storage.read_tasks().unwrap(), vec![task]);
    }

    #[test]
    fn actor_persistence() {
        let temp = TempDir::new().unwrap();
        let storage = Storage::new(temp.path());
        assert_eq!(storage.read_actor(), None);
        storage.write_actor("ana").unwrap();
        assert_eq!(storage.read_actor().as_deref(), Some("ana"));
    }
}
