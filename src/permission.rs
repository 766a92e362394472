//! Permission checks.
//!
//! Callers consult a [`PermissionOracle`] before mutating tasks. The default
//! oracle grants slugs matching glob patterns from `[permissions] granted`.

use crate::config::Config;
use crate::error::{Error, Result};

pub const TASKS_VIEW: &str = "tasks.view";
pub const TASKS_CREATE: &str = "tasks.create";
pub const TASKS_UPDATE: &str = "tasks.update";
pub const TASKS_DELETE: &str = "tasks.delete";

/// Answers whether the current subject holds a permission slug
pub trait PermissionOracle {
    fn has_permission(&self, slug: &str) -> bool;
}

/// Fail with `PermissionDenied` unless `oracle` grants `slug`
pub fn require(oracle: &dyn PermissionOracle, slug: &str) -> Result<()> {
    if oracle.has_permission(slug) {
        Ok(())
    } else {
        tracing::debug!(slug, "permission denied");
        Err(Error::PermissionDenied(slug.to_string()))
    }
}

/// Grants from a fixed list of glob patterns
#[derive(Debug, Clone)]
pub struct StaticPermissions {
    patterns: Vec<glob::Pattern>,
}

impl StaticPermissions {
    pub fn new<I, S>(granted: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = granted
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                glob::Pattern::new(pattern).map_err(|err| {
                    Error::InvalidConfig(format!("invalid permission pattern '{pattern}': {err}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.permissions.granted)
    }

    /// Grants every slug
    pub fn allow_all() -> Self {
        Self {
            patterns: glob::Pattern::new("*").into_iter().collect(),
        }
    }

    /// Grants nothing
    pub fn deny_all() -> Self {
        Self {
            patterns: Vec::new(),
        }
    }
}

impl PermissionOracle for StaticPermissions {
    fn has_permission(&self, slug: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_grants_match_slugs() {
        let oracle = StaticPermissions::new(["tasks.view", "tasks.up*"]).expect("patterns");
        assert!(oracle.has_permission(TASKS_VIEW));
        assert!(oracle.has_permission(TASKS_UPDATE));
        assert!(!oracle.has_permission(TASKS_DELETE));
    }

    #[test]
    fn default_config_grants_all_task_slugs() {
        let oracle = StaticPermissions::from_config(&Config::default()).expect("config");
        for slug in [TASKS_VIEW, TASKS_CREATE, TASKS_UPDATE, TASKS_DELETE] {
            assert!(oracle.has_permission(slug), "{slug}");
        }
        assert!(!oracle.has_permission("finance.view"));
    }

    #[test]
    fn require_reports_missing_slug() {
        let err = require(&StaticPermissions::deny_all(), TASKS_CREATE).expect_err("denied");
        match err {
            Error::PermissionDenied(slug) => assert_eq!(slug, TASKS_CREATE),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(require(&StaticPermissions::allow_all(), TASKS_CREATE).is_ok());
    }

    #[test]
    fn invalid_pattern_rejected() {
        assert!(matches!(
            StaticPermissions::new(["tasks.["]),
            Err(Error::InvalidConfig(_))
        ));
    }
}
