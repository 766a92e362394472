//! cadence - recurring task series
//!
//! This library provides the core functionality for the cadence CLI tool:
//! recurrence rules, deterministic occurrence expansion, series edit modes,
//! and a locked file-backed task store.
//!
//! # Core Concepts
//!
//! - **Rules**: daily/weekly/monthly/yearly schedules with an interval and an
//!   end condition
//! - **Series**: a rule plus a task template, materialized up to a watermark
//! - **Edit modes**: change one occurrence, split the series from an
//!   occurrence on, or rewrite the whole series
//! - **Board**: status columns with optimistic, rollback-able moves
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.cadence.toml`
//! - `error`: Error types and result aliases
//! - `rule`: Recurrence rules and validation
//! - `expand`: Occurrence expansion
//! - `series`: Series state and edit modes
//! - `task`: Task records, templates and patches
//! - `query`: Filter, sort and paging for task listings
//! - `store`: Locked, permission-checked task store
//! - `board`: Status columns with optimistic moves
//! - `permission`: Permission oracle and slugs
//! - `actor`: Actor identity management
//! - `storage`: File storage and directory management
//! - `lock`: File locking and atomic operations for concurrency safety
//! - `output`: Human and JSON output

pub mod actor;
pub mod board;
pub mod cli;
pub mod config;
pub mod error;
pub mod expand;
pub mod lock;
pub mod output;
pub mod permission;
pub mod query;
pub mod rule;
pub mod series;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
