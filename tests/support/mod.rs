#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assert_cmd::Command;
use cadence::config::Config;
use cadence::permission::StaticPermissions;
use cadence::storage::{Storage, CONFIG_FILE};
use cadence::store::TaskStore;
use chrono::NaiveDate;
use tempfile::TempDir;

pub struct TestRoot {
    dir: TempDir,
}

impl TestRoot {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(CONFIG_FILE);
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Store using `.cadence.toml` from this root (or defaults)
    pub fn store(&self) -> TaskStore {
        TaskStore::open(self.path()).expect("open store")
    }

    /// Store with explicit permission grants
    pub fn store_with_grants(&self, granted: &[&str]) -> TaskStore {
        TaskStore::new(
            Storage::new(self.path()),
            Config::default(),
            Arc::new(StaticPermissions::new(granted).expect("grants")),
        )
    }

    /// `cadence` binary rooted here, with a fixed actor
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("cadence").expect("binary");
        cmd.env_remove("RUST_LOG")
            .env("CADENCE_ACTOR", "tester")
            .env("CADENCE_ROOT", self.path());
        cmd
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}
