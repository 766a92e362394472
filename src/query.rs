//! Typed task listing queries: filter, sort and page.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::task::{TaskPriority, TaskRecord, TaskStatus};

/// Filter for selecting tasks; empty sets and `None` match everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskFilter {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub statuses: BTreeSet<TaskStatus>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub priorities: BTreeSet<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_from: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_to: Option<NaiveDate>,
    /// Case-insensitive substring of title, description or tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
}

impl TaskFilter {
    pub fn matches(&self, task: &TaskRecord) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&task.status) {
            return false;
        }

        if !self.priorities.is_empty() && !self.priorities.contains(&task.priority) {
            return false;
        }

        // A date range excludes undated tasks.
        if self.due_from.is_some() || self.due_to.is_some() {
            let Some(due) = task.due_date else {
                return false;
            };
            if self.due_from.map(|from| due < from).unwrap_or(false) {
                return false;
            }
            if self.due_to.map(|to| due > to).unwrap_or(false) {
                return false;
            }
        }

        if let Some(series_id) = &self.series_id {
            if task.series_id.as_deref() != Some(series_id.as_str()) {
                return false;
            }
        }

        if let Some(assignee) = &self.assignee {
            let matched = task
                .assignee
                .as_deref()
                .map(|value| value.eq_ignore_ascii_case(assignee))
                .unwrap_or(false);
            if !matched {
                return false;
            }
        }

        if let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let needle = needle.to_lowercase();
            let hit = task.title.to_lowercase().contains(&needle)
                || task
                    .description
                    .as_deref()
                    .map(|text| text.to_lowercase().contains(&needle))
                    .unwrap_or(false)
                || task.tags.iter().any(|tag| tag.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    DueDate,
    Priority,
    Title,
    CreatedAt,
    UpdatedAt,
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortField::DueDate => write!(f, "due_date"),
            SortField::Priority => write!(f, "priority"),
            SortField::Title => write!(f, "title"),
            SortField::CreatedAt => write!(f, "created_at"),
            SortField::UpdatedAt => write!(f, "updated_at"),
        }
    }
}

impl FromStr for SortField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "due" | "due_date" => Ok(SortField::DueDate),
            "priority" => Ok(SortField::Priority),
            "title" => Ok(SortField::Title),
            "created" | "created_at" => Ok(SortField::CreatedAt),
            "updated" | "updated_at" => Ok(SortField::UpdatedAt),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid sort field '{}'. Expected: due_date, priority, title, created_at, updated_at",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid sort direction '{}'. Expected: asc, desc",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl TaskSort {
    pub fn compare(&self, left: &TaskRecord, right: &TaskRecord) -> Ordering {
        let primary = match self.field {
            // Undated tasks sort after dated ones in ascending order.
            SortField::DueDate => match (left.due_date, right.due_date) {
                (Some(a), Some(b)) => a.cmp(&b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            SortField::Priority => left.priority.cmp(&right.priority),
            SortField::Title => left.title.to_lowercase().cmp(&right.title.to_lowercase()),
            SortField::CreatedAt => left.created_at.cmp(&right.created_at),
            SortField::UpdatedAt => left.updated_at.cmp(&right.updated_at),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| left.id.cmp(&right.id))
    }
}

/// Offset/limit pagination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit must be >= 1".to_string()));
        }
        Ok(Self { offset, limit })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskQuery {
    #[serde(default)]
    pub filter: TaskFilter,
    #[serde(default)]
    pub sort: TaskSort,
    /// `None` returns every match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

/// One page of query results plus the number of matches overall
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPage {
    pub tasks: Vec<TaskRecord>,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<Page>,
}

impl TaskQuery {
    pub fn apply(&self, tasks: Vec<TaskRecord>) -> TaskPage {
        let mut matched: Vec<TaskRecord> = tasks
            .into_iter()
            .filter(|task| self.filter.matches(task))
            .collect();
        matched.sort_by(|left, right| self.sort.compare(left, right));
        let total = matched.len();

        let tasks = match self.page {
            Some(page) => matched
                .into_iter()
                .skip(page.offset)
                .take(page.limit)
                .collect(),
            None => matched,
        };
        TaskPage {
            tasks,
            total,
            page: self.page,
        }
    }
}
