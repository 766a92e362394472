//! cadence series command implementations.

use chrono::{NaiveDate, Utc};
use serde::Serialize;

use crate::cli::args::{parse_date, RuleArgs, TemplateArgs};
use crate::cli::task::format_task_line;
use crate::cli::Context;
use crate::error::Result;
use crate::expand;
use crate::output::{emit_success, HumanOutput};
use crate::series::RecurrenceSeries;
use crate::task::{TaskRecord, TaskTemplate};

#[derive(Serialize)]
struct PreviewReport {
    rule: String,
    start: NaiveDate,
    horizon: NaiveDate,
    dates: Vec<NaiveDate>,
}

#[derive(Serialize)]
struct SeriesDetails {
    series: RecurrenceSeries,
    rule: String,
    tasks: Vec<TaskRecord>,
}

fn horizon_or_default(ctx: &Context, raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(raw) => parse_date(raw),
        None => Ok(ctx.store.default_horizon(Utc::now().date_naive())),
    }
}

fn push_series_summary(human: &mut HumanOutput, series: &RecurrenceSeries) {
    human.push_summary("id", series.id.clone());
    human.push_summary("title", series.template.title.clone());
    human.push_summary("rule", series.rule.describe(series.start_date));
    human.push_summary("start", series.start_date.to_string());
    human.push_summary(
        "expanded through",
        series
            .expanded_through
            .map(|date| date.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    human.push_summary("active", series.active.to_string());
    human.push_summary("revision", series.revision.to_string());
    if let Some(parent) = &series.split_from {
        human.push_summary("split from", parent.clone());
    }
}

pub fn run_new(
    ctx: &Context,
    template: TemplateArgs,
    start: &str,
    rule: RuleArgs,
    horizon: Option<&str>,
) -> Result<()> {
    let template = template.to_template(ctx.store.config().tasks.default_priority)?;
    let start = parse_date(start)?;
    let rule = rule.to_rule()?;
    let horizon = horizon.map(parse_date).transpose()?;

    let report = ctx
        .store
        .create_series(rule, template, start, horizon, ctx.actor())?;

    let mut human = HumanOutput::new(format!(
        "cadence series new: {} ({} occurrences)",
        report.series.id,
        report.created.len()
    ));
    push_series_summary(&mut human, &report.series);
    for task in &report.created {
        human.push_detail(format_task_line(task));
    }
    human.push_next_step(format!("cadence series show {}", report.series.id));

    emit_success(ctx.output, "series new", &report, Some(&human))
}

pub fn run_preview(
    ctx: &Context,
    start: &str,
    rule: RuleArgs,
    horizon: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let start = parse_date(start)?;
    let rule = rule.to_rule()?;
    let horizon = horizon_or_default(ctx, horizon)?;
    let series = RecurrenceSeries::new(rule, TaskTemplate::new("preview"), start, None)?;

    let mut dates = expand::expand(&series, horizon);
    if let Some(limit) = limit {
        dates.truncate(limit);
    }

    let report = PreviewReport {
        rule: series.rule.describe(start),
        start,
        horizon,
        dates,
    };

    let mut human = HumanOutput::new(format!(
        "cadence series preview: {} dates through {}",
        report.dates.len(),
        horizon
    ));
    human.push_summary("rule", report.rule.clone());
    human.push_summary("start", start.to_string());
    for date in &report.dates {
        human.push_detail(format!("{} {}", date, date.format("%a")));
    }

    emit_success(ctx.output, "series preview", &report, Some(&human))
}

pub fn run_generate(ctx: &Context, series_id: Option<&str>, horizon: Option<&str>) -> Result<()> {
    let horizon = horizon.map(parse_date).transpose()?;
    let report = ctx.store.generate(series_id, horizon, ctx.actor())?;

    let mut human = HumanOutput::new(format!(
        "cadence series generate: {} new occurrences through {}",
        report.created_count(),
        report.horizon
    ));
    for entry in &report.series {
        human.push_summary(entry.series.id.clone(), entry.created.len().to_string());
        for task in &entry.created {
            human.push_detail(format_task_line(task));
        }
    }

    emit_success(ctx.output, "series generate", &report, Some(&human))
}

pub fn run_list(ctx: &Context, all: bool) -> Result<()> {
    let mut series = ctx.store.list_series()?;
    if !all {
        series.retain(|entry| entry.active);
    }

    let mut human = HumanOutput::new(format!("cadence series list: {} series", series.len()));
    for entry in &series {
        let state = if entry.active { "active" } else { "stopped" };
        human.push_detail(format!(
            "{}  {}  [{}] {}",
            entry.id,
            entry.template.title,
            state,
            entry.rule.describe(entry.start_date)
        ));
    }

    emit_success(ctx.output, "series list", &series, Some(&human))
}

pub fn run_show(ctx: &Context, id: &str) -> Result<()> {
    let series = ctx.store.get_series(id)?;
    let tasks = ctx.store.list_tasks_by_series(id)?;

    let mut human = HumanOutput::new(format!("cadence series show: {}", series.id));
    push_series_summary(&mut human, &series);
    for task in &tasks {
        human.push_detail(format_task_line(task));
    }

    let details = SeriesDetails {
        rule: series.rule.describe(series.start_date),
        series,
        tasks,
    };
    emit_success(ctx.output, "series show", &details, Some(&human))
}

pub fn run_stop(ctx: &Context, id: &str, revision: Option<u64>) -> Result<()> {
    let series = ctx.store.stop_series(id, revision)?;

    let mut human = HumanOutput::new(format!("cadence series stop: {}", series.id));
    push_series_summary(&mut human, &series);
    human.push_warning("existing occurrences are kept");

    emit_success(ctx.output, "series stop", &series, Some(&human))
}
