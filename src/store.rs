//! Task store: locked, permission-checked access to tasks and series.
//!
//! Every mutation runs as one transaction: take the store lock, load both
//! snapshots, apply the change in memory, write both back atomically. Series
//! writes may carry an expected revision; a mismatch fails with
//! [`Error::Conflict`] before anything is written, so a split and a
//! concurrent template edit on the same series cannot interleave.
//!
//! Tasks are written before series. If the process dies between the two
//! renames, new instances exist under an old watermark and the next run
//! sees their dates as already generated. The reverse order could leave a
//! watermark covering instances that were never written.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Months, NaiveDate, Utc};
use serde::Serialize;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;
use crate::permission::{
    self, PermissionOracle, StaticPermissions, TASKS_CREATE, TASKS_DELETE, TASKS_UPDATE,
    TASKS_VIEW,
};
use crate::query::{TaskPage, TaskQuery};
use crate::rule::RecurrenceRule;
use crate::series::{self, RecurrenceEditMode, RecurrenceSeries};
use crate::storage::Storage;
use crate::task::{TaskDraft, TaskField, TaskPatch, TaskRecord, TaskStatus, TaskTemplate};

/// Permission oracle shared between the store and its callers
pub type SharedOracle = Arc<dyn PermissionOracle + Send + Sync>;

pub struct TaskStore {
    storage: Storage,
    config: Config,
    permissions: SharedOracle,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("storage", &self.storage)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// A series together with the instances an operation created for it
#[derive(Debug, Clone, Serialize)]
pub struct SeriesReport {
    pub series: RecurrenceSeries,
    pub created: Vec<TaskRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub horizon: NaiveDate,
    pub series: Vec<SeriesReport>,
}

impl GenerateReport {
    pub fn created_count(&self) -> usize {
        self.series.iter().map(|entry| entry.created.len()).sum()
    }
}

/// Outcome of moving a series onto a new rule from one occurrence on
#[derive(Debug, Clone, Serialize)]
pub struct RescheduleReport {
    pub head: RecurrenceSeries,
    pub tail: RecurrenceSeries,
    /// Instances dropped because the new rule regenerates them
    pub removed: Vec<String>,
    pub created: Vec<TaskRecord>,
}

#[derive(Debug, Default)]
struct State {
    tasks: Vec<TaskRecord>,
    series: Vec<RecurrenceSeries>,
}

impl State {
    fn task_index(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    fn series_index(&self, id: &str) -> Result<usize> {
        self.series
            .iter()
            .position(|series| series.id == id)
            .ok_or_else(|| Error::SeriesNotFound(id.to_string()))
    }

    fn next_position(&self, status: TaskStatus) -> u32 {
        self.tasks
            .iter()
            .filter(|task| task.status == status)
            .map(|task| task.position + 1)
            .max()
            .unwrap_or(0)
    }

    fn insert(&mut self, mut task: TaskRecord) -> TaskRecord {
        task.position = self.next_position(task.status);
        self.tasks.push(task.clone());
        task
    }

    /// Create missing instances of one series through `horizon`
    fn materialize(
        &mut self,
        index: usize,
        horizon: NaiveDate,
        limit: usize,
        default_status: TaskStatus,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<TaskRecord> {
        let series_id = self.series[index].id.clone();
        let known: Vec<NaiveDate> = self
            .tasks
            .iter()
            .filter(|task| task.series_id.as_deref() == Some(series_id.as_str()))
            .filter_map(|task| task.original_date)
            .collect();
        let drafts = self.series[index].materialize(horizon, &known, limit, now);
        tracing::debug!(series_id = %series_id, count = drafts.len(), %horizon, "materialized occurrences");
        drafts
            .into_iter()
            .map(|draft| self.insert(TaskRecord::from_draft(draft, default_status, actor, now)))
            .collect()
    }

    /// Place a task at `index` within the `to` column and renumber the
    /// columns it left and joined
    fn reposition(&mut self, task_index: usize, from: TaskStatus, to: TaskStatus, index: Option<usize>) {
        self.tasks[task_index].status = to;

        let mut column = self.column(to);
        column.retain(|other| *other != task_index);
        let at = index.unwrap_or(column.len()).min(column.len());
        column.insert(at, task_index);
        self.renumber(&column);

        if from != to {
            let rest = self.column(from);
            self.renumber(&rest);
        }
    }

    /// Indices of tasks in a status column, by position
    fn column(&self, status: TaskStatus) -> Vec<usize> {
        let mut column: Vec<usize> = (0..self.tasks.len())
            .filter(|index| self.tasks[*index].status == status)
            .collect();
        column.sort_by(|a, b| {
            let (a, b) = (&self.tasks[*a], &self.tasks[*b]);
            a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id))
        });
        column
    }

    fn renumber(&mut self, column: &[usize]) {
        for (position, index) in column.iter().enumerate() {
            self.tasks[*index].position = position as u32;
        }
    }
}

impl TaskStore {
    pub fn new(storage: Storage, config: Config, permissions: SharedOracle) -> Self {
        Self {
            storage,
            config,
            permissions,
        }
    }

    /// Open the store at `root`, with configuration and grants from `.cadence.toml`
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let storage = Storage::new(root);
        let config = Config::load_from_dir(storage.root())?;
        let permissions = StaticPermissions::from_config(&config)?;
        Ok(Self::new(storage, config, Arc::new(permissions)))
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn permissions(&self) -> &(dyn PermissionOracle + Send + Sync) {
        self.permissions.as_ref()
    }

    /// Rolling generation horizon: `today` plus the configured number of months
    pub fn default_horizon(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_months(Months::new(self.config.recurrence.horizon_months))
            .unwrap_or(NaiveDate::MAX)
    }

    fn today_horizon(&self) -> NaiveDate {
        self.default_horizon(Utc::now().date_naive())
    }

    fn require(&self, slug: &str) -> Result<()> {
        permission::require(self.permissions(), slug)
    }

    fn load(&self) -> Result<State> {
        Ok(State {
            tasks: self.storage.read_tasks()?,
            series: self.storage.read_series()?,
        })
    }

    fn transact<T>(&self, op: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        self.storage.init()?;
        let _lock = self.storage.lock(DEFAULT_LOCK_TIMEOUT_MS)?;
        let mut state = self.load()?;
        let out = op(&mut state)?;
        self.storage.write_tasks(&state.tasks)?;
        self.storage.write_series(&state.series)?;
        Ok(out)
    }

    // =========================================================================
    // Tasks
    // =========================================================================

    pub fn create_task(&self, draft: TaskDraft, actor: Option<&str>) -> Result<TaskRecord> {
        self.require(TASKS_CREATE)?;
        draft.template.validate()?;
        let default_status = self.config.tasks.default_status;
        let now = Utc::now();
        let task = self.transact(|state| {
            if let Some(series_id) = draft.series_id.as_deref() {
                state.series_index(series_id)?;
            }
            Ok(state.insert(TaskRecord::from_draft(draft, default_status, actor, now)))
        })?;
        tracing::info!(task_id = %task.id, "created task");
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<TaskRecord> {
        self.require(TASKS_VIEW)?;
        let state = self.load()?;
        let index = state.task_index(id)?;
        Ok(state.tasks[index].clone())
    }

    /// Delete a task. A deleted occurrence stays covered by its series'
    /// watermark and is not generated again.
    pub fn delete_task(&self, id: &str) -> Result<TaskRecord> {
        self.require(TASKS_DELETE)?;
        let removed = self.transact(|state| {
            let index = state.task_index(id)?;
            let removed = state.tasks.remove(index);
            let rest = state.column(removed.status);
            state.renumber(&rest);
            Ok(removed)
        })?;
        tracing::info!(task_id = %removed.id, "deleted task");
        Ok(removed)
    }

    pub fn list_tasks(&self, query: &TaskQuery) -> Result<TaskPage> {
        self.require(TASKS_VIEW)?;
        let state = self.load()?;
        Ok(query.apply(state.tasks))
    }

    /// Instances of a series, by original date
    pub fn list_tasks_by_series(&self, series_id: &str) -> Result<Vec<TaskRecord>> {
        self.require(TASKS_VIEW)?;
        let state = self.load()?;
        state.series_index(series_id)?;
        let mut tasks: Vec<TaskRecord> = state
            .tasks
            .into_iter()
            .filter(|task| task.series_id.as_deref() == Some(series_id))
            .collect();
        tasks.sort_by(|a, b| {
            a.original_date
                .cmp(&b.original_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(tasks)
    }

    pub fn update_task(
        &self,
        id: &str,
        patch: &TaskPatch,
        mode: RecurrenceEditMode,
        actor: Option<&str>,
    ) -> Result<TaskRecord> {
        self.update_task_at(id, patch, mode, None, actor)
    }

    /// Apply `patch` to a task under `mode`.
    ///
    /// With `expected_revision`, series-level modes fail with `Conflict` if
    /// the series has moved on since the caller read it.
    pub fn update_task_at(
        &self,
        id: &str,
        patch: &TaskPatch,
        mode: RecurrenceEditMode,
        expected_revision: Option<u64>,
        actor: Option<&str>,
    ) -> Result<TaskRecord> {
        self.require(TASKS_UPDATE)?;
        patch.validate()?;
        if patch.is_empty() {
            return Err(Error::InvalidArgument("nothing to update".to_string()));
        }
        let now = Utc::now();

        self.transact(|state| {
            let index = state.task_index(id)?;
            series::check_edit_mode(&state.tasks[index], mode, patch)?;

            match mode {
                RecurrenceEditMode::ThisTask => {
                    let before = state.tasks[index].status;
                    let occurrence_only = TaskPatch {
                        position: None,
                        ..patch.clone()
                    };
                    series::edit_this_task(&mut state.tasks[index], &occurrence_only, actor, now);
                    let after = state.tasks[index].status;
                    if before != after || patch.position.is_some() {
                        let at = patch.position.map(|position| position as usize);
                        state.reposition(index, before, after, at);
                    }
                }
                RecurrenceEditMode::AllTasks => {
                    let series_index = owning_series(state, index)?;
                    let from = occurrence_date(&state.tasks[index])?;
                    let series = &mut state.series[series_index];
                    series.check_revision(expected_revision)?;
                    let changed =
                        series::edit_all_tasks(series, &mut state.tasks, from, patch, actor, now);
                    tracing::info!(
                        series_id = %state.series[series_index].id,
                        changed = changed.len(),
                        "updated series template"
                    );
                }
                RecurrenceEditMode::ThisAndFuture => {
                    let series_index = owning_series(state, index)?;
                    state.series[series_index].check_revision(expected_revision)?;
                    let at = occurrence_date(&state.tasks[index])?;
                    let original = &state.series[series_index];
                    let watermark = original.expanded_through;
                    let mut split = series::split_series(original, at, patch, None, actor, now)?;
                    series::reassign_future(
                        &mut split,
                        watermark,
                        &mut state.tasks,
                        patch,
                        false,
                        actor,
                        now,
                    );
                    tracing::info!(
                        series_id = %split.head.id,
                        tail_id = %split.tail.id,
                        %at,
                        "split series"
                    );
                    state.series[series_index] = split.head;
                    state.series.push(split.tail);
                }
            }

            let index = state.task_index(id)?;
            Ok(state.tasks[index].clone())
        })
    }

    /// Put the occurrence `task_id` and everything after it on `rule`.
    ///
    /// The series splits at the occurrence; untouched instances from there on
    /// are dropped and regenerated from the new rule through the default
    /// horizon. Customized ones (detached fields, completed, moved to another
    /// date) move to the new series and block regeneration of their date.
    pub fn reschedule(
        &self,
        task_id: &str,
        rule: RecurrenceRule,
        patch: &TaskPatch,
        expected_revision: Option<u64>,
        actor: Option<&str>,
    ) -> Result<RescheduleReport> {
        self.require(TASKS_UPDATE)?;
        patch.validate()?;
        let horizon = self.today_horizon();
        let limit = self.config.recurrence.max_instances_per_run;
        let default_status = self.config.tasks.default_status;
        let now = Utc::now();

        self.transact(|state| {
            let index = state.task_index(task_id)?;
            series::check_edit_mode(&state.tasks[index], RecurrenceEditMode::ThisAndFuture, patch)?;
            let series_index = owning_series(state, index)?;
            state.series[series_index].check_revision(expected_revision)?;
            let at = occurrence_date(&state.tasks[index])?;

            let original = &state.series[series_index];
            let watermark = original.expanded_through;
            let mut split = series::split_series(original, at, patch, Some(rule), actor, now)?;
            let removed = series::reassign_future(
                &mut split,
                watermark,
                &mut state.tasks,
                patch,
                true,
                actor,
                now,
            );
            tracing::info!(
                series_id = %split.head.id,
                tail_id = %split.tail.id,
                %at,
                removed = removed.len(),
                "rescheduled series"
            );

            state.series[series_index] = split.head;
            state.series.push(split.tail);
            let tail_index = state.series.len() - 1;
            let created = state.materialize(tail_index, horizon, limit, default_status, actor, now);

            Ok(RescheduleReport {
                head: state.series[series_index].clone(),
                tail: state.series[tail_index].clone(),
                removed,
                created,
            })
        })
    }

    /// Move a task into `to` at `index` within that column (end if `None`)
    pub fn move_task(
        &self,
        id: &str,
        to: TaskStatus,
        index: Option<usize>,
        actor: Option<&str>,
    ) -> Result<TaskRecord> {
        self.require(TASKS_UPDATE)?;
        let now = Utc::now();
        self.transact(|state| {
            let task_index = state.task_index(id)?;
            let from = state.tasks[task_index].status;
            state.reposition(task_index, from, to, index);
            let task = &mut state.tasks[task_index];
            if from != to && task.is_recurring() {
                task.detached_fields.insert(TaskField::Status);
            }
            task.updated_at = now;
            task.updated_by = actor.map(str::to_string);
            Ok(task.clone())
        })
    }

    // =========================================================================
    // Series
    // =========================================================================

    /// Create a series and materialize its instances through `horizon`
    /// (default: the rolling horizon). Invalid rules persist nothing.
    pub fn create_series(
        &self,
        rule: RecurrenceRule,
        template: TaskTemplate,
        start_date: NaiveDate,
        horizon: Option<NaiveDate>,
        actor: Option<&str>,
    ) -> Result<SeriesReport> {
        self.require(TASKS_CREATE)?;
        let series = RecurrenceSeries::new(rule, template, start_date, actor)?;
        let horizon = horizon.unwrap_or_else(|| self.today_horizon());
        let limit = self.config.recurrence.max_instances_per_run;
        let default_status = self.config.tasks.default_status;
        let now = Utc::now();

        let report = self.transact(|state| {
            state.series.push(series);
            let index = state.series.len() - 1;
            let created = state.materialize(index, horizon, limit, default_status, actor, now);
            Ok(SeriesReport {
                series: state.series[index].clone(),
                created,
            })
        })?;
        tracing::info!(
            series_id = %report.series.id,
            created = report.created.len(),
            "created series"
        );
        Ok(report)
    }

    pub fn get_series(&self, id: &str) -> Result<RecurrenceSeries> {
        self.require(TASKS_VIEW)?;
        let state = self.load()?;
        let index = state.series_index(id)?;
        Ok(state.series[index].clone())
    }

    pub fn list_series(&self) -> Result<Vec<RecurrenceSeries>> {
        self.require(TASKS_VIEW)?;
        let mut series = self.load()?.series;
        series.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(series)
    }

    /// Materialize missing instances through `horizon` for one series, or
    /// every active series when `series_id` is `None`
    pub fn generate(
        &self,
        series_id: Option<&str>,
        horizon: Option<NaiveDate>,
        actor: Option<&str>,
    ) -> Result<GenerateReport> {
        self.require(TASKS_CREATE)?;
        let horizon = horizon.unwrap_or_else(|| self.today_horizon());
        let limit = self.config.recurrence.max_instances_per_run;
        let default_status = self.config.tasks.default_status;
        let now = Utc::now();

        let report = self.transact(|state| {
            let targets: Vec<usize> = match series_id {
                Some(id) => vec![state.series_index(id)?],
                None => (0..state.series.len())
                    .filter(|index| state.series[*index].active)
                    .collect(),
            };
            let series = targets
                .into_iter()
                .map(|index| {
                    let created =
                        state.materialize(index, horizon, limit, default_status, actor, now);
                    SeriesReport {
                        series: state.series[index].clone(),
                        created,
                    }
                })
                .collect();
            Ok(GenerateReport { horizon, series })
        })?;
        tracing::info!(%horizon, created = report.created_count(), "generated instances");
        Ok(report)
    }

    /// Deactivate a series; existing instances are kept
    pub fn stop_series(
        &self,
        id: &str,
        expected_revision: Option<u64>,
    ) -> Result<RecurrenceSeries> {
        self.require(TASKS_UPDATE)?;
        let now = Utc::now();
        let series = self.transact(|state| {
            let index = state.series_index(id)?;
            let series = &mut state.series[index];
            series.check_revision(expected_revision)?;
            series.deactivate(now);
            Ok(series.clone())
        })?;
        tracing::info!(series_id = %series.id, "stopped series");
        Ok(series)
    }
}

fn owning_series(state: &State, task_index: usize) -> Result<usize> {
    let task = &state.tasks[task_index];
    let series_id = task.series_id.as_deref().ok_or_else(|| {
        Error::InvalidEditMode(format!("task {} is not part of a series", task.id))
    })?;
    state.series_index(series_id)
}

fn occurrence_date(task: &TaskRecord) -> Result<NaiveDate> {
    task.original_date.ok_or_else(|| {
        Error::InvalidEditMode(format!("task {} has no original occurrence date", task.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::Frequency;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn store(temp: &TempDir) -> TaskStore {
        TaskStore::open(temp.path()).expect("open store")
    }

    #[test]
    fn default_horizon_adds_configured_months() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert_eq!(store.default_horizon(date(2024, 11, 30)), date(2025, 2, 28));
    }

    #[test]
    fn create_and_fetch_standalone_task() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let first = store
            .create_task(TaskDraft::standalone(TaskTemplate::new("Order gloves"), None), Some("ana"))
            .unwrap();
        let second = store
            .create_task(TaskDraft::standalone(TaskTemplate::new("Call lab"), None), Some("ana"))
            .unwrap();
        assert_eq!(first.position, 0);
        assert_eq!(second.position, 1);
        assert_eq!(store.get_task(&first.id).unwrap(), first);
    }

    #[test]
    fn create_series_materializes_through_horizon() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let report = store
            .create_series(
                RecurrenceRule::new(Frequency::Daily),
                TaskTemplate::new("Check fridge temperature"),
                date(2024, 1, 1),
                Some(date(2024, 1, 5)),
                Some("ana"),
            )
            .unwrap();
        assert_eq!(report.created.len(), 5);
        assert_eq!(report.series.expanded_through, Some(date(2024, 1, 5)));

        let again = store
            .generate(Some(&report.series.id), Some(date(2024, 1, 5)), None)
            .unwrap();
        assert_eq!(again.created_count(), 0);
        assert_eq!(store.list_tasks_by_series(&report.series.id).unwrap().len(), 5);
    }

    #[test]
    fn invalid_rule_persists_nothing() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let err = store
            .create_series(
                RecurrenceRule::new(Frequency::Monthly).on_month_day(32),
                TaskTemplate::new("Payroll"),
                date(2024, 1, 1),
                None,
                None,
            )
            .expect_err("invalid rule");
        assert!(matches!(err, Error::InvalidRule(_)));
        assert!(store.list_series().unwrap().is_empty());
    }

    #[test]
    fn moving_renumbers_columns() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let ids: Vec<String> = ["a", "b", "c"]
            .into_iter()
            .map(|title| {
                store
                    .create_task(TaskDraft::standalone(TaskTemplate::new(title), None), None)
                    .unwrap()
                    .id
            })
            .collect();

        let moved = store
            .move_task(&ids[2], TaskStatus::Pending, Some(0), None)
            .unwrap();
        assert_eq!(moved.position, 0);
        assert_eq!(store.get_task(&ids[0]).unwrap().position, 1);
        assert_eq!(store.get_task(&ids[1]).unwrap().position, 2);

        let done = store
            .move_task(&ids[0], TaskStatus::Completed, None, None)
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.position, 0);
        assert_eq!(store.get_task(&ids[1]).unwrap().position, 1);
    }

    #[test]
    fn stale_revision_conflicts() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let report = store
            .create_series(
                RecurrenceRule::new(Frequency::Daily),
                TaskTemplate::new("Sweep"),
                date(2024, 1, 1),
                Some(date(2024, 1, 2)),
                None,
            )
            .unwrap();
        let seen = report.series.revision;
        store.stop_series(&report.series.id, Some(seen)).unwrap();
        let err = store
            .stop_series(&report.series.id, Some(seen))
            .expect_err("stale");
        assert!(matches!(err, Error::Conflict { .. }));
    }

    #[test]
    fn denied_permissions_block_mutation() {
        let temp = TempDir::new().unwrap();
        let store = TaskStore::new(
            Storage::new(temp.path()),
            Config::default(),
            Arc::new(StaticPermissions::new(["tasks.view"]).unwrap()),
        );
        let err = store
            .create_task(TaskDraft::standalone(TaskTemplate::new("x"), None), None)
            .expect_err("denied");
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(store.list_series().unwrap().is_empty());
    }
}
