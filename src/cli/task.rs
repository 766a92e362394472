//! cadence task command implementations.

use crate::board::Board;
use crate::cli::args::{parse_date, PatchArgs, RuleArgs, TemplateArgs};
use crate::cli::Context;
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::query::{Page, SortDirection, TaskFilter, TaskQuery, TaskSort};
use crate::series::RecurrenceEditMode;
use crate::task::{TaskDraft, TaskPriority, TaskRecord, TaskStatus};

pub struct ListOptions {
    pub statuses: Vec<String>,
    pub priorities: Vec<String>,
    pub due_from: Option<String>,
    pub due_to: Option<String>,
    pub search: Option<String>,
    pub series: Option<String>,
    pub assignee: Option<String>,
    pub sort: String,
    pub desc: bool,
    pub offset: usize,
    pub limit: Option<usize>,
}

/// One-line human rendering of a task
pub(crate) fn format_task_line(task: &TaskRecord) -> String {
    let mut line = format!("{}  [{}] {}", task.id, task.status, task.title);
    if let Some(due) = task.due_date {
        line.push_str(&format!("  due {due}"));
    }
    line.push_str(&format!("  ({})", task.priority));
    if let Some(assignee) = &task.assignee {
        line.push_str(&format!("  @{assignee}"));
    }
    if let Some(series_id) = &task.series_id {
        line.push_str(&format!("  series {series_id}"));
    }
    line
}

fn push_task_summary(human: &mut HumanOutput, task: &TaskRecord) {
    human.push_summary("id", task.id.clone());
    human.push_summary("title", task.title.clone());
    human.push_summary("status", task.status.to_string());
    human.push_summary("priority", task.priority.to_string());
    if let Some(due) = task.due_date {
        human.push_summary("due", due.to_string());
    }
    if let Some(assignee) = &task.assignee {
        human.push_summary("assignee", assignee.clone());
    }
    if !task.tags.is_empty() {
        human.push_summary("tags", task.tags.join(", "));
    }
    if let Some(series_id) = &task.series_id {
        human.push_summary("series", series_id.clone());
    }
    if let Some(original) = task.original_date {
        human.push_summary("occurrence", original.to_string());
    }
    if !task.detached_fields.is_empty() {
        let fields: Vec<String> = task
            .detached_fields
            .iter()
            .map(|field| format!("{field:?}").to_lowercase())
            .collect();
        human.push_summary("detached", fields.join(", "));
    }
}

pub fn run_new(
    ctx: &Context,
    template: TemplateArgs,
    due: Option<&str>,
    status: Option<&str>,
) -> Result<()> {
    let template = template.to_template(ctx.store.config().tasks.default_priority)?;
    let mut draft = TaskDraft::standalone(template, due.map(parse_date).transpose()?);
    draft.status = status.map(str::parse::<TaskStatus>).transpose()?;

    let task = ctx.store.create_task(draft, ctx.actor())?;

    let mut human = HumanOutput::new(format!("cadence task new: {}", task.id));
    push_task_summary(&mut human, &task);
    emit_success(ctx.output, "task new", &task, Some(&human))
}

pub fn run_list(ctx: &Context, options: ListOptions) -> Result<()> {
    let filter = TaskFilter {
        statuses: options
            .statuses
            .iter()
            .map(|status| status.parse::<TaskStatus>())
            .collect::<Result<_>>()?,
        priorities: options
            .priorities
            .iter()
            .map(|priority| priority.parse::<TaskPriority>())
            .collect::<Result<_>>()?,
        due_from: options.due_from.as_deref().map(parse_date).transpose()?,
        due_to: options.due_to.as_deref().map(parse_date).transpose()?,
        search: options.search,
        series_id: options.series,
        assignee: options.assignee,
    };
    let sort = TaskSort {
        field: options.sort.parse()?,
        direction: if options.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        },
    };
    let limit = options.limit.unwrap_or(ctx.store.config().tasks.page_size);
    let query = TaskQuery {
        filter,
        sort,
        page: Some(Page::new(options.offset, limit)?),
    };

    let page = ctx.store.list_tasks(&query)?;

    let mut human = HumanOutput::new(format!(
        "cadence task list: {} of {} tasks",
        page.tasks.len(),
        page.total
    ));
    for task in &page.tasks {
        human.push_detail(format_task_line(task));
    }
    if options.offset + page.tasks.len() < page.total {
        human.push_next_step(format!(
            "cadence task list --offset {}",
            options.offset + page.tasks.len()
        ));
    }

    emit_success(ctx.output, "task list", &page, Some(&human))
}

pub fn run_show(ctx: &Context, id: &str) -> Result<()> {
    let task = ctx.store.get_task(id)?;

    let mut human = HumanOutput::new(format!("cadence task show: {}", task.id));
    push_task_summary(&mut human, &task);
    if let Some(description) = &task.description {
        human.push_detail(description.clone());
    }
    emit_success(ctx.output, "task show", &task, Some(&human))
}

pub fn run_edit(
    ctx: &Context,
    id: &str,
    mode: &str,
    revision: Option<u64>,
    patch: PatchArgs,
    rule: RuleArgs,
) -> Result<()> {
    let mode: RecurrenceEditMode = mode.parse()?;
    let patch = patch.to_patch()?;

    if rule.is_set() {
        if mode != RecurrenceEditMode::ThisAndFuture {
            return Err(Error::InvalidEditMode(
                "rule changes apply from an occurrence on; use --mode future".to_string(),
            ));
        }
        let report = ctx
            .store
            .reschedule(id, rule.to_rule()?, &patch, revision, ctx.actor())?;

        let mut human = HumanOutput::new(format!(
            "cadence task edit: rescheduled from {} as {}",
            report.tail.start_date, report.tail.id
        ));
        human.push_summary("series", report.head.id.clone());
        human.push_summary("new series", report.tail.id.clone());
        human.push_summary("rule", report.tail.rule.describe(report.tail.start_date));
        human.push_summary("removed", report.removed.len().to_string());
        human.push_summary("created", report.created.len().to_string());
        for task in &report.created {
            human.push_detail(format_task_line(task));
        }
        return emit_success(ctx.output, "task edit", &report, Some(&human));
    }

    let task = ctx
        .store
        .update_task_at(id, &patch, mode, revision, ctx.actor())?;

    let mut human = HumanOutput::new(format!("cadence task edit: {} ({})", task.id, mode));
    push_task_summary(&mut human, &task);
    emit_success(ctx.output, "task edit", &task, Some(&human))
}

pub fn run_move(ctx: &Context, id: &str, status: &str, index: Option<usize>) -> Result<()> {
    let status: TaskStatus = status.parse()?;
    let all = ctx.store.list_tasks(&TaskQuery::default())?;
    let mut board = Board::from_tasks(all.tasks);

    let task = board.move_task(&ctx.store, id, status, index, ctx.actor())?;

    let mut human = HumanOutput::new(format!(
        "cadence task move: {} -> {} #{}",
        task.id, task.status, task.position
    ));
    push_task_summary(&mut human, &task);
    emit_success(ctx.output, "task move", &task, Some(&human))
}

pub fn run_delete(ctx: &Context, id: &str) -> Result<()> {
    let task = ctx.store.delete_task(id)?;

    let mut human = HumanOutput::new(format!("cadence task delete: {}", task.id));
    push_task_summary(&mut human, &task);
    if task.is_recurring() {
        human.push_warning("the occurrence will not be generated again");
    }
    emit_success(ctx.output, "task delete", &task, Some(&human))
}
