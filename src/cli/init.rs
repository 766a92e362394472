//! cadence init command implementation
//!
//! Creates the default config and the data directory.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::{Storage, CONFIG_FILE, DATA_DIR};

#[derive(serde::Serialize)]
struct InitReport {
    root: PathBuf,
    created: InitCreated,
}

#[derive(serde::Serialize)]
struct InitCreated {
    config: bool,
    data_dir: bool,
}

pub fn run(root: Option<PathBuf>, output: OutputOptions) -> Result<()> {
    let root = super::resolve_root(root)?;
    std::fs::create_dir_all(&root)?;
    let storage = Storage::new(root.clone());

    let created_data_dir = !storage.is_initialized();
    storage.init()?;

    let config_path = storage.config_file();
    let created_config = !config_path.exists();
    if created_config {
        Config::default().save(&config_path)?;
    } else {
        // An existing config must still parse.
        Config::load(&config_path)?;
    }
    tracing::info!(root = %root.display(), created_config, created_data_dir, "initialized");

    let report = InitReport {
        root: root.clone(),
        created: InitCreated {
            config: created_config,
            data_dir: created_data_dir,
        },
    };

    let mut created_items = Vec::new();
    if created_config {
        created_items.push(CONFIG_FILE.to_string());
    }
    if created_data_dir {
        created_items.push(format!("{DATA_DIR}/"));
    }

    let header = if created_items.is_empty() {
        "cadence init: nothing to do".to_string()
    } else {
        "cadence init: initialized".to_string()
    };

    let mut human = HumanOutput::new(header);
    human.push_summary("root", root.display().to_string());
    human.push_summary(
        "created",
        if created_items.is_empty() {
            "none".to_string()
        } else {
            created_items.join(", ")
        },
    );
    human.push_next_step("cadence actor set <name>");
    human.push_next_step("cadence series new <title> --start <date> --every weekly");

    emit_success(output, "init", &report, Some(&human))
}
