//! Recurrence series and edit modes.
//!
//! A series owns a rule, a template and a start date. Instances are
//! materialized from it up to a moving "expanded through" watermark. Edits on
//! a generated occurrence name a [`RecurrenceEditMode`] that decides whether
//! the change stays on that occurrence, splits the series, or rewrites the
//! template for every occurrence.
//!
//! Everything here works on in-memory values. Persistence and locking live in
//! [`crate::store`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::expand;
use crate::rule::{EndCondition, RecurrenceRule};
use crate::task::{TaskDraft, TaskPatch, TaskRecord, TaskTemplate};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceSeries {
    pub id: String,
    pub rule: RecurrenceRule,
    pub template: TaskTemplate,
    pub start_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Instances exist (or were deliberately skipped) through this date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expanded_through: Option<NaiveDate>,
    pub active: bool,
    /// No occurrence on or after this date belongs to the series
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncated_at: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<String>,
    #[serde(default)]
    pub revision: u64,
}

impl RecurrenceSeries {
    /// Create a series, validating the rule and template first
    pub fn new(
        rule: RecurrenceRule,
        template: TaskTemplate,
        start_date: NaiveDate,
        created_by: Option<&str>,
    ) -> Result<Self> {
        rule.validate(start_date)?;
        template.validate()?;
        let now = Utc::now();
        Ok(Self {
            id: new_series_id(),
            rule,
            template,
            start_date,
            created_by: created_by.map(str::to_string),
            created_at: now,
            updated_at: now,
            expanded_through: None,
            active: true,
            truncated_at: None,
            split_from: None,
            revision: 0,
        })
    }

    /// Fail with `Conflict` unless the series is still at `expected`
    pub fn check_revision(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.revision => Err(Error::Conflict {
                series_id: self.id.clone(),
                expected,
                found: self.revision,
            }),
            _ => Ok(()),
        }
    }

    fn bump(&mut self, now: DateTime<Utc>) {
        self.revision += 1;
        self.updated_at = now;
    }

    /// Stop producing new instances; existing ones are kept
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        if self.active {
            self.active = false;
            self.bump(now);
        }
    }

    /// Drafts for occurrences past the watermark, up to `horizon`.
    ///
    /// `known` holds the original dates that already have an instance;
    /// those are never generated twice. At most `limit` drafts are produced.
    /// Advances the watermark to the last date covered.
    pub fn materialize(
        &mut self,
        horizon: NaiveDate,
        known: &[NaiveDate],
        limit: usize,
        now: DateTime<Utc>,
    ) -> Vec<TaskDraft> {
        if !self.active {
            return Vec::new();
        }

        let pending = expand::expand_after(self, self.expanded_through, horizon);
        let mut drafts = Vec::new();
        let mut covered = None;
        let mut hit_limit = false;
        for date in pending {
            if known.contains(&date) {
                covered = Some(date);
                continue;
            }
            if drafts.len() >= limit {
                hit_limit = true;
                break;
            }
            covered = Some(date);
            drafts.push(TaskDraft::occurrence(self.template.clone(), self.id.clone(), date));
        }

        let watermark = if hit_limit {
            covered
        } else if expand::next_after(self, horizon).is_some() {
            Some(horizon)
        } else {
            // Series exhausted: the watermark stops at its last occurrence.
            covered.or(self.expanded_through)
        };

        if watermark > self.expanded_through {
            self.expanded_through = watermark;
            self.bump(now);
        }
        drafts
    }
}

pub fn new_series_id() -> String {
    format!("rs-{}", Ulid::new().to_string().to_lowercase())
}

// =============================================================================
// Edit modes
// =============================================================================

/// Scope of an edit made on a generated occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceEditMode {
    /// Only this occurrence; edited fields detach from the series
    ThisTask,
    /// Split the series here; this and later occurrences take the change
    ThisAndFuture,
    /// Rewrite the template; attached occurrences from the edited one on
    /// take the change
    AllTasks,
}

impl Default for RecurrenceEditMode {
    fn default() -> Self {
        RecurrenceEditMode::ThisTask
    }
}

impl fmt::Display for RecurrenceEditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceEditMode::ThisTask => write!(f, "this_task"),
            RecurrenceEditMode::ThisAndFuture => write!(f, "this_and_future"),
            RecurrenceEditMode::AllTasks => write!(f, "all_tasks"),
        }
    }
}

impl FromStr for RecurrenceEditMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "this" | "this_task" => Ok(RecurrenceEditMode::ThisTask),
            "future" | "this_and_future" => Ok(RecurrenceEditMode::ThisAndFuture),
            "all" | "all_tasks" => Ok(RecurrenceEditMode::AllTasks),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid edit mode '{}'. Expected: this, future, all",
                s
            ))),
        }
    }
}

/// Check that `mode` can apply to `task` with `patch`
pub fn check_edit_mode(task: &TaskRecord, mode: RecurrenceEditMode, patch: &TaskPatch) -> Result<()> {
    if mode == RecurrenceEditMode::ThisTask {
        return Ok(());
    }
    if !task.is_recurring() {
        return Err(Error::InvalidEditMode(format!(
            "task {} is not part of a series; only this_task applies",
            task.id
        )));
    }
    if patch.touches_occurrence() {
        return Err(Error::InvalidEditMode(format!(
            "status, due date and position belong to a single occurrence; use this_task instead of {}",
            mode
        )));
    }
    Ok(())
}

/// Apply a `THIS_TASK` edit: the instance changes and detaches what it touched
pub fn edit_this_task(
    task: &mut TaskRecord,
    patch: &TaskPatch,
    actor: Option<&str>,
    now: DateTime<Utc>,
) {
    if task.is_recurring() {
        task.detached_fields.extend(patch.template_fields());
        task.detached_fields.extend(patch.occurrence_fields());
    }
    patch.apply_to_task(task, actor, now);
}

/// Apply an `ALL_TASKS` edit to the template and to the open instances of
/// the series whose occurrence falls on or after `from`.
///
/// Earlier and closed instances are history and keep their values. Returns
/// the ids of instances that changed.
pub fn edit_all_tasks(
    series: &mut RecurrenceSeries,
    instances: &mut [TaskRecord],
    from: NaiveDate,
    patch: &TaskPatch,
    actor: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<String> {
    patch.apply_to_template(&mut series.template);
    series.bump(now);
    instances
        .iter_mut()
        .filter(|task| task.series_id.as_deref() == Some(series.id.as_str()))
        .filter(|task| task.original_date.map(|date| date >= from).unwrap_or(false))
        .filter(|task| !task.status.is_closed())
        .filter_map(|task| {
            patch
                .apply_to_attached(task, actor, now)
                .then(|| task.id.clone())
        })
        .collect()
}

/// Result of splitting a series for a `THIS_AND_FUTURE` edit
#[derive(Debug, Clone)]
pub struct Split {
    /// The original series, truncated at the split date
    pub head: RecurrenceSeries,
    /// The new series starting at the split date
    pub tail: RecurrenceSeries,
}

/// Split `series` at the occurrence `at`.
///
/// The head keeps every occurrence before `at`, with its watermark capped at
/// the last of them (or deactivated if there is none). The tail starts at
/// `at` with the patched template. Without a new rule, the tail continues the
/// original schedule exactly: anchors are made explicit and an occurrence
/// count is reduced by what the head already produced.
///
/// Nothing is modified when the split is rejected.
pub fn split_series(
    series: &RecurrenceSeries,
    at: NaiveDate,
    patch: &TaskPatch,
    new_rule: Option<RecurrenceRule>,
    actor: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Split> {
    if !expand::is_occurrence(series, at) {
        return Err(Error::InvalidEditMode(format!(
            "{} is not an occurrence of series {}",
            at, series.id
        )));
    }

    let (consumed, prior) = expand::before(series, at);

    let tail_rule = match new_rule {
        Some(rule) => rule,
        None => {
            let mut rule = series.rule.resolved(series.start_date);
            if let EndCondition::AfterOccurrences { count } = rule.end_condition {
                rule.end_condition = EndCondition::AfterOccurrences {
                    count: count.saturating_sub(consumed),
                };
            }
            rule
        }
    };
    tail_rule.validate(at)?;

    let mut template = series.template.clone();
    patch.apply_to_template(&mut template);
    template.validate()?;

    let mut head = series.clone();
    head.truncated_at = Some(at);
    head.expanded_through = match (head.expanded_through, prior) {
        (Some(watermark), Some(prior)) => Some(watermark.min(prior)),
        _ => None,
    };
    if prior.is_none() {
        head.active = false;
    }
    head.bump(now);

    let tail = RecurrenceSeries {
        id: new_series_id(),
        rule: tail_rule,
        template,
        start_date: at,
        created_by: actor.map(str::to_string).or_else(|| series.created_by.clone()),
        created_at: now,
        updated_at: now,
        expanded_through: None,
        active: series.active,
        truncated_at: series.truncated_at,
        split_from: Some(series.id.clone()),
        revision: 0,
    };

    Ok(Split { head, tail })
}

/// Move instances on or after the split date from the head to the tail.
///
/// With an unchanged rule every such instance is re-parented and takes the
/// patch on its attached fields; the tail's watermark picks up the head's
/// old one. With a new rule, untouched instances are removed (the tail
/// regenerates them) and customized ones are re-parented to the tail, where
/// their dates count as already generated.
///
/// Returns the ids of removed instances.
pub fn reassign_future(
    split: &mut Split,
    previous_watermark: Option<NaiveDate>,
    instances: &mut Vec<TaskRecord>,
    patch: &TaskPatch,
    rule_changed: bool,
    actor: Option<&str>,
    now: DateTime<Utc>,
) -> Vec<String> {
    let at = split.tail.start_date;
    let head_id = split.head.id.clone();
    let is_future = |task: &TaskRecord| {
        task.series_id.as_deref() == Some(head_id.as_str())
            && task.original_date.map(|date| date >= at).unwrap_or(false)
    };

    let mut removed = Vec::new();
    if rule_changed {
        instances.retain(|task| {
            let stale = is_future(task) && !task.is_customized();
            if stale {
                removed.push(task.id.clone());
            }
            !stale
        });
    }

    for task in instances.iter_mut().filter(|task| is_future(task)) {
        task.series_id = Some(split.tail.id.clone());
        patch.apply_to_attached(task, actor, now);
    }
    if !rule_changed {
        split.tail.expanded_through = previous_watermark.filter(|watermark| *watermark >= at);
    }
    removed
}
