//! Task board with optimistic moves.
//!
//! A move is applied to the local columns first, then persisted. If the store
//! rejects it, the task goes back to its previous column and index and a
//! [`MoveNotice`] is queued for the caller to surface. A task has at most one
//! move in flight.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::permission::{self, PermissionOracle, TASKS_UPDATE};
use crate::store::TaskStore;
use crate::task::{TaskRecord, TaskStatus};

/// A locally applied move awaiting persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMove {
    pub move_id: Uuid,
    pub task_id: String,
    pub from_status: TaskStatus,
    pub from_index: usize,
    pub to_status: TaskStatus,
    pub to_index: usize,
}

/// Raised when a move was rolled back
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveNotice {
    pub move_id: Uuid,
    pub task_id: String,
    pub restored_status: TaskStatus,
    pub restored_index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct Board {
    columns: BTreeMap<TaskStatus, Vec<TaskRecord>>,
    in_flight: HashMap<String, PendingMove>,
    notices: Vec<MoveNotice>,
}

impl Board {
    /// Group tasks into one column per status, ordered by position
    pub fn from_tasks(tasks: impl IntoIterator<Item = TaskRecord>) -> Self {
        let mut columns: BTreeMap<TaskStatus, Vec<TaskRecord>> = TaskStatus::ALL
            .into_iter()
            .map(|status| (status, Vec::new()))
            .collect();
        for task in tasks {
            columns.entry(task.status).or_default().push(task);
        }
        for column in columns.values_mut() {
            column.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
        }
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn column(&self, status: TaskStatus) -> &[TaskRecord] {
        self.columns.get(&status).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Column and index of a task
    pub fn locate(&self, task_id: &str) -> Option<(TaskStatus, usize)> {
        self.columns.iter().find_map(|(status, column)| {
            column
                .iter()
                .position(|task| task.id == task_id)
                .map(|index| (*status, index))
        })
    }

    pub fn is_in_flight(&self, task_id: &str) -> bool {
        self.in_flight.contains_key(task_id)
    }

    /// Drain notices raised by rolled-back moves
    pub fn take_notices(&mut self) -> Vec<MoveNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Apply a move locally.
    ///
    /// Nothing changes if the oracle denies `tasks.update` or the task
    /// already has a move in flight.
    pub fn begin_move(
        &mut self,
        task_id: &str,
        to_status: TaskStatus,
        index: Option<usize>,
        oracle: &dyn PermissionOracle,
    ) -> Result<PendingMove> {
        permission::require(oracle, TASKS_UPDATE)?;
        if self.is_in_flight(task_id) {
            return Err(Error::MoveInFlight(task_id.to_string()));
        }
        let (from_status, from_index) = self
            .locate(task_id)
            .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

        let to_index = self.splice(from_status, from_index, to_status, index);
        let pending = PendingMove {
            move_id: Uuid::new_v4(),
            task_id: task_id.to_string(),
            from_status,
            from_index,
            to_status,
            to_index,
        };
        self.in_flight.insert(task_id.to_string(), pending.clone());
        tracing::debug!(task_id, from = %from_status, to = %to_status, to_index, "move applied locally");
        Ok(pending)
    }

    /// Mark a move as persisted
    pub fn confirm(&mut self, pending: &PendingMove) -> Result<()> {
        self.take_in_flight(pending)?;
        Ok(())
    }

    /// Undo a move locally and queue a notice carrying `reason`
    pub fn rollback(&mut self, pending: &PendingMove, reason: &str) -> Result<MoveNotice> {
        self.take_in_flight(pending)?;
        let (status, index) = self
            .locate(&pending.task_id)
            .ok_or_else(|| Error::TaskNotFound(pending.task_id.clone()))?;
        let restored_index =
            self.splice(status, index, pending.from_status, Some(pending.from_index));

        let notice = MoveNotice {
            move_id: pending.move_id,
            task_id: pending.task_id.clone(),
            restored_status: pending.from_status,
            restored_index,
            message: reason.to_string(),
        };
        self.notices.push(notice.clone());
        Ok(notice)
    }

    /// Move a task: apply locally, persist through `store`, roll back on failure.
    ///
    /// On failure the store's error is returned and a notice is queued.
    pub fn move_task(
        &mut self,
        store: &TaskStore,
        task_id: &str,
        to_status: TaskStatus,
        index: Option<usize>,
        actor: Option<&str>,
    ) -> Result<TaskRecord> {
        let pending = self.begin_move(task_id, to_status, index, store.permissions())?;
        match store.move_task(task_id, to_status, Some(pending.to_index), actor) {
            Ok(task) => {
                self.confirm(&pending)?;
                self.replace(task.clone());
                Ok(task)
            }
            Err(err) => {
                let notice = self.rollback(&pending, &err.to_string())?;
                tracing::warn!(
                    task_id,
                    move_id = %notice.move_id,
                    restored = %notice.restored_status,
                    error = %err,
                    "move rolled back"
                );
                Err(err)
            }
        }
    }

    fn take_in_flight(&mut self, pending: &PendingMove) -> Result<PendingMove> {
        match self.in_flight.get(&pending.task_id) {
            Some(current) if current.move_id == pending.move_id => self
                .in_flight
                .remove(&pending.task_id)
                .ok_or_else(|| Error::MoveInFlight(pending.task_id.clone())),
            _ => Err(Error::InvalidArgument(format!(
                "move {} is not in flight",
                pending.move_id
            ))),
        }
    }

    /// Remove the task at `from`/`from_index` and insert it into `to` at
    /// `index` (clamped; end when `None`). Returns the index it landed at.
    fn splice(
        &mut self,
        from: TaskStatus,
        from_index: usize,
        to: TaskStatus,
        index: Option<usize>,
    ) -> usize {
        let mut task = self.columns.entry(from).or_default().remove(from_index);
        task.status = to;
        let column = self.columns.entry(to).or_default();
        let at = index.unwrap_or(column.len()).min(column.len());
        column.insert(at, task);
        renumber(column);
        if from != to {
            renumber(self.columns.entry(from).or_default());
        }
        at
    }

    fn replace(&mut self, task: TaskRecord) {
        if let Some((status, index)) = self.locate(&task.id) {
            if let Some(column) = self.columns.get_mut(&status) {
                column[index] = task;
            }
        }
    }
}

fn renumber(column: &mut [TaskRecord]) {
    for (position, task) in column.iter_mut().enumerate() {
        task.position = position as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::StaticPermissions;
    use crate::task::{TaskDraft, TaskTemplate};
    use chrono::Utc;

    fn task(title: &str, position: u32) -> TaskRecord {
        let mut task = TaskRecord::from_draft(
            TaskDraft::standalone(TaskTemplate::new(title), None),
            TaskStatus::Pending,
            None,
            Utc::now(),
        );
        task.position = position;
        task
    }

    fn titles(board: &Board, status: TaskStatus) -> Vec<String> {
        board.column(status).iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn begin_move_splices_and_renumbers() {
        let tasks = vec![task("a", 0), task("b", 1), task("c", 2)];
        let b = tasks[1].id.clone();
        let mut board = Board::from_tasks(tasks);

        let pending = board
            .begin_move(&b, TaskStatus::InProgress, None, &StaticPermissions::allow_all())
            .unwrap();
        assert_eq!(pending.from_index, 1);
        assert_eq!(pending.to_index, 0);
        assert_eq!(titles(&board, TaskStatus::Pending), vec!["a", "c"]);
        assert_eq!(board.column(TaskStatus::Pending)[1].position, 1);
        assert_eq!(board.column(TaskStatus::InProgress)[0].status, TaskStatus::InProgress);
    }

    #[test]
    fn second_move_of_same_task_rejected() {
        let tasks = vec![task("a", 0)];
        let a = tasks[0].id.clone();
        let mut board = Board::from_tasks(tasks);
        let oracle = StaticPermissions::allow_all();

        let pending = board.begin_move(&a, TaskStatus::Review, None, &oracle).unwrap();
        let err = board
            .begin_move(&a, TaskStatus::Completed, None, &oracle)
            .expect_err("in flight");
        assert!(matches!(err, Error::MoveInFlight(_)));

        board.confirm(&pending).unwrap();
        assert!(!board.is_in_flight(&a));
        assert!(board.confirm(&pending).is_err());
    }

    #[test]
    fn rollback_restores_column_and_index() {
        let tasks = vec![task("a", 0), task("b", 1), task("c", 2)];
        let b = tasks[1].id.clone();
        let mut board = Board::from_tasks(tasks);

        let pending = board
            .begin_move(&b, TaskStatus::Completed, None, &StaticPermissions::allow_all())
            .unwrap();
        let notice = board.rollback(&pending, "store unavailable").unwrap();
        assert_eq!(notice.restored_status, TaskStatus::Pending);
        assert_eq!(notice.restored_index, 1);
        assert_eq!(titles(&board, TaskStatus::Pending), vec!["a", "b", "c"]);
        assert!(board.column(TaskStatus::Completed).is_empty());
        assert_eq!(board.take_notices(), vec![notice]);
        assert!(board.take_notices().is_empty());
    }

    #[test]
    fn denied_move_leaves_board_untouched() {
        let tasks = vec![task("a", 0)];
        let a = tasks[0].id.clone();
        let mut board = Board::from_tasks(tasks);

        let err = board
            .begin_move(&a, TaskStatus::Review, None, &StaticPermissions::deny_all())
            .expect_err("denied");
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert_eq!(board.locate(&a), Some((TaskStatus::Pending, 0)));
        assert!(!board.is_in_flight(&a));
    }
}
