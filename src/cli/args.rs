//! Argument groups shared by several commands, and their conversions.

use chrono::NaiveDate;
use clap::Args;

use crate::error::{Error, Result};
use crate::rule::{parse_weekday, EndCondition, Frequency, RecurrenceRule};
use crate::task::{TaskPatch, TaskPriority, TaskStatus, TaskTemplate};

/// Recurrence rule flags
#[derive(Args, Debug, Clone, Default)]
pub struct RuleArgs {
    /// Frequency: daily, weekly, monthly, yearly
    #[arg(long)]
    pub every: Option<String>,

    /// Repeat every N periods
    #[arg(long)]
    pub interval: Option<u32>,

    /// Weekdays for weekly rules (e.g. mon,wed or 1,3)
    #[arg(long = "on", value_delimiter = ',')]
    pub week_days: Vec<String>,

    /// Day of month for monthly rules (1-31, clamped to short months)
    #[arg(long)]
    pub month_day: Option<u8>,

    /// Month for yearly rules (1-12)
    #[arg(long)]
    pub year_month: Option<u8>,

    /// Day of month for yearly rules (1-31)
    #[arg(long)]
    pub year_day: Option<u8>,

    /// Stop after N occurrences
    #[arg(long, conflicts_with = "until")]
    pub count: Option<u32>,

    /// Stop after this date (inclusive)
    #[arg(long)]
    pub until: Option<String>,
}

impl RuleArgs {
    pub fn is_set(&self) -> bool {
        self.every.is_some()
            || self.interval.is_some()
            || !self.week_days.is_empty()
            || self.month_day.is_some()
            || self.year_month.is_some()
            || self.year_day.is_some()
            || self.count.is_some()
            || self.until.is_some()
    }

    /// Build the rule; `--every` is required once any rule flag is given
    pub fn to_rule(&self) -> Result<RecurrenceRule> {
        let frequency: Frequency = self
            .every
            .as_deref()
            .ok_or_else(|| Error::InvalidArgument("--every is required for a rule".to_string()))?
            .parse()?;

        let mut rule = RecurrenceRule::new(frequency).every(self.interval.unwrap_or(1));
        rule.week_days = self
            .week_days
            .iter()
            .map(|day| parse_weekday(day))
            .collect::<Result<_>>()?;
        rule.month_day = self.month_day;
        rule.year_month = self.year_month;
        rule.year_day = self.year_day;
        rule.end_condition = match (self.count, self.until.as_deref()) {
            (Some(count), _) => EndCondition::AfterOccurrences { count },
            (None, Some(until)) => EndCondition::OnDate {
                date: parse_date(until)?,
            },
            (None, None) => EndCondition::Never,
        };
        Ok(rule)
    }
}

/// Task template flags
#[derive(Args, Debug, Clone)]
pub struct TemplateArgs {
    /// Task title
    pub title: String,

    /// Longer description
    #[arg(long)]
    pub description: Option<String>,

    /// Priority: low, medium, high, urgent (defaults to tasks.default_priority)
    #[arg(long)]
    pub priority: Option<String>,

    /// Person responsible
    #[arg(long)]
    pub assignee: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    /// Estimated effort in minutes
    #[arg(long)]
    pub estimate: Option<u32>,
}

impl TemplateArgs {
    pub fn to_template(&self, default_priority: TaskPriority) -> Result<TaskTemplate> {
        let template = TaskTemplate {
            title: self.title.trim().to_string(),
            description: self.description.clone(),
            priority: match self.priority.as_deref() {
                Some(priority) => priority.parse()?,
                None => default_priority,
            },
            assignee: self.assignee.clone(),
            tags: self.tags.clone(),
            category: self.category.clone(),
            project: self.project.clone(),
            estimated_minutes: self.estimate,
        };
        template.validate()?;
        Ok(template)
    }
}

/// Task edit flags
#[derive(Args, Debug, Clone, Default)]
pub struct PatchArgs {
    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub priority: Option<String>,

    #[arg(long)]
    pub assignee: Option<String>,

    /// Replace tags (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long)]
    pub project: Option<String>,

    /// Estimated effort in minutes
    #[arg(long)]
    pub estimate: Option<u32>,

    /// New status (single occurrence only)
    #[arg(long)]
    pub status: Option<String>,

    /// New due date (single occurrence only)
    #[arg(long)]
    pub due: Option<String>,

    /// New index within the status column (single occurrence only)
    #[arg(long)]
    pub position: Option<u32>,
}

impl PatchArgs {
    pub fn to_patch(&self) -> Result<TaskPatch> {
        let patch = TaskPatch {
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self
                .priority
                .as_deref()
                .map(str::parse::<TaskPriority>)
                .transpose()?,
            assignee: self.assignee.clone(),
            tags: (!self.tags.is_empty()).then(|| self.tags.clone()),
            category: self.category.clone(),
            project: self.project.clone(),
            estimated_minutes: self.estimate,
            status: self
                .status
                .as_deref()
                .map(str::parse::<TaskStatus>)
                .transpose()?,
            due_date: self.due.as_deref().map(parse_date).transpose()?,
            position: self.position,
        };
        patch.validate()?;
        Ok(patch)
    }
}

/// Parse a calendar date given as YYYY-MM-DD
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        Error::InvalidArgument(format!("Invalid date '{}'. Expected YYYY-MM-DD", raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_args_build_weekly_rule() {
        let args = RuleArgs {
            every: Some("weekly".to_string()),
            interval: Some(2),
            week_days: vec!["mon".to_string(), "3".to_string()],
            count: Some(4),
            ..RuleArgs::default()
        };
        let rule = args.to_rule().expect("rule");
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 2);
        assert_eq!(rule.week_days.into_iter().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(rule.end_condition, EndCondition::AfterOccurrences { count: 4 });
    }

    #[test]
    fn rule_flags_without_frequency_rejected() {
        let args = RuleArgs {
            interval: Some(2),
            ..RuleArgs::default()
        };
        assert!(args.is_set());
        assert!(matches!(args.to_rule(), Err(Error::InvalidArgument(_))));
        assert!(!RuleArgs::default().is_set());
    }

    #[test]
    fn patch_args_parse_enums_and_dates() {
        let args = PatchArgs {
            priority: Some("urgent".to_string()),
            due: Some("2024-02-29".to_string()),
            ..PatchArgs::default()
        };
        let patch = args.to_patch().expect("patch");
        assert_eq!(patch.priority, Some(TaskPriority::Urgent));
        assert_eq!(patch.due_date, NaiveDate::from_ymd_opt(2024, 2, 29));
        assert!(patch.tags.is_none());

        let bad = PatchArgs {
            due: Some("29/02/2024".to_string()),
            ..PatchArgs::default()
        };
        assert!(bad.to_patch().is_err());
    }
}
