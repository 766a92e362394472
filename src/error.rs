//! Error types for cadence
//!
//! Exit codes:
//! - 0: Success
//! - 2: User error (bad args, invalid rule, inapplicable edit mode)
//! - 3: Blocked by policy (missing permission, concurrent series write)
//! - 4: Operation failed (I/O, serialization, lock timeout)

use std::path::PathBuf;
use thiserror::Error;

/// Exit codes for the cadence CLI
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const USER_ERROR: i32 = 2;
    pub const POLICY_BLOCKED: i32 = 3;
    pub const OPERATION_FAILED: i32 = 4;
}

/// Main error type for cadence operations
#[derive(Error, Debug)]
pub enum Error {
    // User errors (exit code 2)
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid recurrence rule: {0}")]
    InvalidRule(String),

    #[error("Invalid edit mode: {0}")]
    InvalidEditMode(String),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    // Policy blocks (exit code 3)
    #[error("Permission denied: missing '{0}'")]
    PermissionDenied(String),

    #[error("Series {series_id} was modified concurrently (expected revision {expected}, found {found})")]
    Conflict {
        series_id: String,
        expected: u64,
        found: u64,
    },

    #[error("A move is already in flight for task {0}")]
    MoveInFlight(String),

    // Operation failures (exit code 4)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Lock acquisition failed: {0}")]
    LockFailed(PathBuf),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors
            Error::InvalidConfig(_)
            | Error::InvalidArgument(_)
            | Error::InvalidRule(_)
            | Error::InvalidEditMode(_)
            | Error::TaskNotFound(_)
            | Error::SeriesNotFound(_) => exit_codes::USER_ERROR,

            // Policy blocks
            Error::PermissionDenied(_) | Error::Conflict { .. } | Error::MoveInFlight(_) => {
                exit_codes::POLICY_BLOCKED
            }

            // Operation failures
            Error::Io(_)
            | Error::Json(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_)
            | Error::LockFailed(_)
            | Error::OperationFailed(_) => exit_codes::OPERATION_FAILED,
        }
    }

    /// Structured context for JSON error output
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Error::Conflict {
                series_id,
                expected,
                found,
            } => Some(serde_json::json!({
                "series_id": series_id,
                "expected": expected,
                "found": found,
            })),
            Error::PermissionDenied(slug) => Some(serde_json::json!({ "permission": slug })),
            _ => None,
        }
    }
}

/// Result type alias for cadence operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wrapper for displaying errors in JSON format
#[derive(serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&Error> for JsonError {
    fn from(err: &Error) -> Self {
        JsonError {
            error: err.to_string(),
            code: err.exit_code(),
            details: err.details(),
        }
    }
}
