//! cadence actor command implementation
//!
//! Provides actor identity helpers (set/show).

use std::path::PathBuf;

use crate::actor;
use crate::error::Result;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::storage::Storage;

#[derive(serde::Serialize)]
struct ActorSetReport {
    actor: String,
    path: PathBuf,
}

#[derive(serde::Serialize)]
struct ActorShowReport {
    actor: String,
}

pub fn run_set(root: Option<PathBuf>, name: &str, output: OutputOptions) -> Result<()> {
    let storage = Storage::new(super::resolve_root(root)?);
    let actor_name = actor::persist_actor(&storage, name)?;
    let actor_path = storage.actor_file();

    let report = ActorSetReport {
        actor: actor_name.clone(),
        path: actor_path.clone(),
    };

    let mut human = HumanOutput::new(format!("cadence actor set: {actor_name}"));
    human.push_summary("actor", actor_name);
    human.push_summary("path", actor_path.display().to_string());

    emit_success(output, "actor set", &report, Some(&human))
}

pub fn run_show(root: Option<PathBuf>, cli_actor: Option<String>, output: OutputOptions) -> Result<()> {
    let storage = Storage::new(super::resolve_root(root)?);
    let actor_name = actor::resolve_actor(Some(&storage), cli_actor.as_deref())?;

    let report = ActorShowReport {
        actor: actor_name.clone(),
    };
    let human = HumanOutput::new(format!("cadence actor: {actor_name}"));

    emit_success(output, "actor show", &report, Some(&human))
}
