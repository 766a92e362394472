//! Task records, templates and patches.
//!
//! A task generated by a recurrence series carries `series_id` and
//! `original_date` back-references. Fields edited on a single occurrence are
//! recorded in `detached_fields` so later series-level edits leave them alone.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Workflow status of a task (one board column per status)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Review,
    Completed,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Completed,
        TaskStatus::Cancelled,
    ];

    pub fn is_closed(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Cancelled)
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Review => write!(f, "review"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" | "todo" => Ok(TaskStatus::Pending),
            "in_progress" | "doing" => Ok(TaskStatus::InProgress),
            "review" => Ok(TaskStatus::Review),
            "completed" | "done" => Ok(TaskStatus::Completed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid status '{}'. Expected: pending, in_progress, review, completed, cancelled",
                s
            ))),
        }
    }
}

/// Priority of a task, lowest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for TaskPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(TaskPriority::Low),
            "medium" | "normal" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid priority '{}'. Expected: low, medium, high, urgent",
                s
            ))),
        }
    }
}

/// Fields an occurrence can detach from its series.
///
/// Status and due date never come from the template; they are recorded here
/// once set on a single occurrence so the occurrence counts as user-owned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Title,
    Description,
    Priority,
    Assignee,
    Tags,
    Category,
    Project,
    EstimatedMinutes,
    Status,
    DueDate,
}

/// Payload a recurrence series clones into each occurrence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
}

impl TaskTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: TaskPriority::default(),
            assignee: None,
            tags: Vec::new(),
            category: None,
            project: None,
            estimated_minutes: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
        }
        Ok(())
    }
}

/// Input for creating a task record
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub template: TaskTemplate,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
    pub series_id: Option<String>,
    pub original_date: Option<NaiveDate>,
}

impl TaskDraft {
    /// A standalone (non-recurring) task
    pub fn standalone(template: TaskTemplate, due_date: Option<NaiveDate>) -> Self {
        Self {
            template,
            status: None,
            due_date,
            series_id: None,
            original_date: None,
        }
    }

    /// An occurrence of a series on `date`
    pub fn occurrence(template: TaskTemplate, series_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            template,
            status: None,
            due_date: Some(date),
            series_id: Some(series_id.into()),
            original_date: Some(date),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Order within the status column
    #[serde(default)]
    pub position: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub detached_fields: BTreeSet<TaskField>,
}

impl TaskRecord {
    pub fn from_draft(
        draft: TaskDraft,
        default_status: TaskStatus,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Self {
        let TaskDraft {
            template,
            status,
            due_date,
            series_id,
            original_date,
        } = draft;
        Self {
            id: new_task_id(),
            title: template.title,
            description: template.description,
            status: status.unwrap_or(default_status),
            priority: template.priority,
            assignee: template.assignee,
            tags: template.tags,
            category: template.category,
            project: template.project,
            estimated_minutes: template.estimated_minutes,
            due_date,
            position: 0,
            created_at: now,
            updated_at: now,
            created_by: actor.map(str::to_string),
            updated_by: actor.map(str::to_string),
            series_id,
            original_date,
            detached_fields: BTreeSet::new(),
        }
    }

    pub fn is_recurring(&self) -> bool {
        self.series_id.is_some()
    }

    /// Whether the occurrence was changed on its own: it detached a field
    /// or its due date no longer matches the generated date
    pub fn is_customized(&self) -> bool {
        !self.detached_fields.is_empty() || self.due_date != self.original_date
    }

    fn touch(&mut self, actor: Option<&str>, now: DateTime<Utc>) {
        self.updated_at = now;
        self.updated_by = actor.map(str::to_string);
    }
}

pub fn new_task_id() -> String {
    Ulid::new().to_string().to_lowercase()
}

/// A partial update to a task.
///
/// `None` leaves a field unchanged. Status, due date and position belong to a
/// single occurrence; everything else is a template field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        self.template_fields().is_empty() && !self.touches_occurrence()
    }

    /// Whether the patch sets status, due date or position
    pub fn touches_occurrence(&self) -> bool {
        self.status.is_some() || self.due_date.is_some() || self.position.is_some()
    }

    /// Template fields this patch sets
    pub fn template_fields(&self) -> BTreeSet<TaskField> {
        let mut fields = BTreeSet::new();
        if self.title.is_some() {
            fields.insert(TaskField::Title);
        }
        if self.description.is_some() {
            fields.insert(TaskField::Description);
        }
        if self.priority.is_some() {
            fields.insert(TaskField::Priority);
        }
        if self.assignee.is_some() {
            fields.insert(TaskField::Assignee);
        }
        if self.tags.is_some() {
            fields.insert(TaskField::Tags);
        }
        if self.category.is_some() {
            fields.insert(TaskField::Category);
        }
        if self.project.is_some() {
            fields.insert(TaskField::Project);
        }
        if self.estimated_minutes.is_some() {
            fields.insert(TaskField::EstimatedMinutes);
        }
        fields
    }

    /// Occurrence fields this patch sets (position is never recorded)
    pub fn occurrence_fields(&self) -> BTreeSet<TaskField> {
        let mut fields = BTreeSet::new();
        if self.status.is_some() {
            fields.insert(TaskField::Status);
        }
        if self.due_date.is_some() {
            fields.insert(TaskField::DueDate);
        }
        fields
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn apply_to_template(&self, template: &mut TaskTemplate) {
        if let Some(title) = &self.title {
            template.title = title.clone();
        }
        if let Some(description) = &self.description {
            template.description = Some(description.clone());
        }
        if let Some(priority) = self.priority {
            template.priority = priority;
        }
        if let Some(assignee) = &self.assignee {
            template.assignee = Some(assignee.clone());
        }
        if let Some(tags) = &self.tags {
            template.tags = tags.clone();
        }
        if let Some(category) = &self.category {
            template.category = Some(category.clone());
        }
        if let Some(project) = &self.project {
            template.project = Some(project.clone());
        }
        if let Some(minutes) = self.estimated_minutes {
            template.estimated_minutes = Some(minutes);
        }
    }

    /// Apply every field to a single task
    pub fn apply_to_task(&self, task: &mut TaskRecord, actor: Option<&str>, now: DateTime<Utc>) {
        self.apply_template_fields(task, &BTreeSet::new());
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = Some(due_date);
        }
        if let Some(position) = self.position {
            task.position = position;
        }
        task.touch(actor, now);
    }

    /// Apply template fields the task has not detached from its series.
    ///
    /// Returns true if anything changed.
    pub fn apply_to_attached(
        &self,
        task: &mut TaskRecord,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> bool {
        let detached = task.detached_fields.clone();
        let touched = self
            .template_fields()
            .iter()
            .any(|field| !detached.contains(field));
        if touched {
            self.apply_template_fields(task, &detached);
            task.touch(actor, now);
        }
        touched
    }

    fn apply_template_fields(&self, task: &mut TaskRecord, skip: &BTreeSet<TaskField>) {
        let open = |field: TaskField| !skip.contains(&field);
        if let Some(title) = self.title.as_ref().filter(|_| open(TaskField::Title)) {
            task.title = title.clone();
        }
        if let Some(description) = self
            .description
            .as_ref()
            .filter(|_| open(TaskField::Description))
        {
            task.description = Some(description.clone());
        }
        if let Some(priority) = self.priority.filter(|_| open(TaskField::Priority)) {
            task.priority = priority;
        }
        if let Some(assignee) = self.assignee.as_ref().filter(|_| open(TaskField::Assignee)) {
            task.assignee = Some(assignee.clone());
        }
        if let Some(tags) = self.tags.as_ref().filter(|_| open(TaskField::Tags)) {
            task.tags = tags.clone();
        }
        if let Some(category) = self.category.as_ref().filter(|_| open(TaskField::Category)) {
            task.category = Some(category.clone());
        }
        if let Some(project) = self.project.as_ref().filter(|_| open(TaskField::Project)) {
            task.project = Some(project.clone());
        }
        if let Some(minutes) = self
            .estimated_minutes
            .filter(|_| open(TaskField::EstimatedMinutes))
        {
            task.estimated_minutes = Some(minutes);
        }
    }
}
