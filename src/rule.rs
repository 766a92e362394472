//! Recurrence rules
//!
//! A rule describes how a template task repeats: a frequency, an interval
//! ("every N units"), an end condition, and the frequency-specific anchors
//! (weekday set, day of month, month/day of year).
//!
//! Anchors that do not apply to the active frequency are carried but ignored.
//! Absent anchors fall back to the series start date, so a rule can always be
//! [`resolved`](RecurrenceRule::resolved) against a start date into a form
//! with every anchor explicit.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const WEEKDAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];
const WEEKDAY_FULL_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

// =============================================================================
// Frequency
// =============================================================================

/// Unit a rule advances by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn unit(&self) -> &'static str {
        match self {
            Frequency::Daily => "day",
            Frequency::Weekly => "week",
            Frequency::Monthly => "month",
            Frequency::Yearly => "year",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Daily => write!(f, "daily"),
            Frequency::Weekly => write!(f, "weekly"),
            Frequency::Monthly => write!(f, "monthly"),
            Frequency::Yearly => write!(f, "yearly"),
        }
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" => Ok(Frequency::Daily),
            "weekly" | "week" => Ok(Frequency::Weekly),
            "monthly" | "month" => Ok(Frequency::Monthly),
            "yearly" | "year" | "annually" => Ok(Frequency::Yearly),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid frequency '{}'. Expected: daily, weekly, monthly, yearly",
                s
            ))),
        }
    }
}

// =============================================================================
// End condition
// =============================================================================

/// When a series stops producing occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EndCondition {
    Never,
    AfterOccurrences { count: u32 },
    OnDate { date: NaiveDate },
}

impl Default for EndCondition {
    fn default() -> Self {
        EndCondition::Never
    }
}

impl EndCondition {
    /// Maximum number of occurrences, if bounded by count
    pub fn count(&self) -> Option<u32> {
        match self {
            EndCondition::AfterOccurrences { count } => Some(*count),
            _ => None,
        }
    }

    /// Last admissible date, if bounded by date
    pub fn until(&self) -> Option<NaiveDate> {
        match self {
            EndCondition::OnDate { date } => Some(*date),
            _ => None,
        }
    }
}

impl fmt::Display for EndCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndCondition::Never => write!(f, "never"),
            EndCondition::AfterOccurrences { count } => write!(f, "after {} occurrences", count),
            EndCondition::OnDate { date } => write!(f, "on {}", date),
        }
    }
}

// =============================================================================
// Weekdays
// =============================================================================

/// Weekday index of a date, 0 = Sunday .. 6 = Saturday
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Parse a weekday given as a name ("mon", "Monday") or an index ("1")
pub fn parse_weekday(s: &str) -> Result<u8> {
    let lower = s.trim().to_lowercase();
    if let Ok(index) = lower.parse::<u8>() {
        if index <= 6 {
            return Ok(index);
        }
        return Err(Error::InvalidArgument(format!(
            "Weekday index {} out of range (0=Sunday..6=Saturday)",
            index
        )));
    }
    if lower.len() >= 3 {
        if let Some(index) = WEEKDAY_FULL_NAMES
            .iter()
            .position(|day| day.starts_with(lower.as_str()))
        {
            return Ok(index as u8);
        }
    }
    Err(Error::InvalidArgument(format!(
        "Invalid weekday '{}'. Expected: sun, mon, tue, wed, thu, fri, sat or 0-6",
        s
    )))
}

/// Short name for a weekday index
pub fn weekday_name(index: u8) -> &'static str {
    WEEKDAY_NAMES.get(index as usize).copied().unwrap_or("?")
}

// =============================================================================
// Calendar helpers
// =============================================================================

/// Number of days in a month of a given year
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}

/// Build a date, clamping `day` to the last day of the month
pub fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let day = day.min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Largest day a month can have in any year (February counts 29)
fn max_days_in_month(month: u8) -> u8 {
    match month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

// =============================================================================
// Recurrence rule
// =============================================================================

fn default_interval() -> u32 {
    1
}

/// How a template task repeats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub end_condition: EndCondition,
    /// Weekdays (0=Sunday..6=Saturday); weekly only, empty = start's weekday
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub week_days: BTreeSet<u8>,
    /// Day of month (1..31); monthly only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month_day: Option<u8>,
    /// Month of year (1..12); yearly only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_month: Option<u8>,
    /// Day of month for the yearly anchor (1..31); yearly only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_day: Option<u8>,
}

impl RecurrenceRule {
    /// A rule repeating every single unit, forever
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            end_condition: EndCondition::Never,
            week_days: BTreeSet::new(),
            month_day: None,
            year_month: None,
            year_day: None,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn on_weekdays(mut self, days: impl IntoIterator<Item = u8>) -> Self {
        self.week_days = days.into_iter().collect();
        self
    }

    pub fn on_month_day(mut self, day: u8) -> Self {
        self.month_day = Some(day);
        self
    }

    pub fn on_year_day(mut self, month: u8, day: u8) -> Self {
        self.year_month = Some(month);
        self.year_day = Some(day);
        self
    }

    pub fn ending(mut self, end_condition: EndCondition) -> Self {
        self.end_condition = end_condition;
        self
    }

    /// Check the rule against the series start date.
    ///
    /// A rule that fails validation must never be persisted.
    pub fn validate(&self, start: NaiveDate) -> Result<()> {
        if self.interval == 0 {
            return Err(Error::InvalidRule("interval must be >= 1".to_string()));
        }

        match self.frequency {
            Frequency::Daily => {}
            Frequency::Weekly => {
                if let Some(day) = self.week_days.iter().find(|day| **day > 6) {
                    return Err(Error::InvalidRule(format!(
                        "weekday {} out of range (0=Sunday..6=Saturday)",
                        day
                    )));
                }
            }
            Frequency::Monthly => {
                if let Some(day) = self.month_day {
                    if !(1..=31).contains(&day) {
                        return Err(Error::InvalidRule(format!(
                            "month_day {} out of range (1..31)",
                            day
                        )));
                    }
                }
            }
            Frequency::Yearly => {
                let month = self.year_month.unwrap_or(start.month() as u8);
                if !(1..=12).contains(&month) {
                    return Err(Error::InvalidRule(format!(
                        "year_month {} out of range (1..12)",
                        month
                    )));
                }
                let day = self.year_day.unwrap_or(start.day() as u8);
                if day == 0 || day > max_days_in_month(month) {
                    return Err(Error::InvalidRule(format!(
                        "year_day {} is not valid for month {}",
                        day, month
                    )));
                }
            }
        }

        match self.end_condition {
            EndCondition::Never => {}
            EndCondition::AfterOccurrences { count } => {
                if count == 0 {
                    return Err(Error::InvalidRule(
                        "occurrence count must be >= 1".to_string(),
                    ));
                }
            }
            EndCondition::OnDate { date } => {
                if date < start {
                    return Err(Error::InvalidRule(format!(
                        "end date {} is before start date {}",
                        date, start
                    )));
                }
            }
        }

        Ok(())
    }

    /// Weekdays a weekly rule fires on, given the series start
    pub fn effective_week_days(&self, start: NaiveDate) -> BTreeSet<u8> {
        if self.week_days.is_empty() {
            BTreeSet::from([weekday_index(start)])
        } else {
            self.week_days.clone()
        }
    }

    /// Day of month a monthly rule fires on, given the series start
    pub fn effective_month_day(&self, start: NaiveDate) -> u32 {
        self.month_day.map(u32::from).unwrap_or_else(|| start.day())
    }

    /// Month and day a yearly rule fires on, given the series start
    pub fn effective_year_day(&self, start: NaiveDate) -> (u32, u32) {
        (
            self.year_month.map(u32::from).unwrap_or_else(|| start.month()),
            self.year_day.map(u32::from).unwrap_or_else(|| start.day()),
        )
    }

    /// Copy of the rule with the anchors for its frequency made explicit.
    ///
    /// Needed when a series is re-anchored on a different start date (a
    /// split), so the continuation keeps firing on the original days.
    pub fn resolved(&self, start: NaiveDate) -> RecurrenceRule {
        let mut rule = self.clone();
        match self.frequency {
            Frequency::Daily => {}
            Frequency::Weekly => rule.week_days = self.effective_week_days(start),
            Frequency::Monthly => rule.month_day = Some(self.effective_month_day(start) as u8),
            Frequency::Yearly => {
                let (month, day) = self.effective_year_day(start);
                rule.year_month = Some(month as u8);
                rule.year_day = Some(day as u8);
            }
        }
        rule
    }

    /// Human-readable summary, e.g. "every 2 weeks on mon, wed (never ends)"
    pub fn describe(&self, start: NaiveDate) -> String {
        let mut out = if self.interval == 1 {
            format!("every {}", self.frequency.unit())
        } else {
            format!("every {} {}s", self.interval, self.frequency.unit())
        };
        match self.frequency {
            Frequency::Daily => {}
            Frequency::Weekly => {
                let names: Vec<&str> = self
                    .effective_week_days(start)
                    .into_iter()
                    .map(weekday_name)
                    .collect();
                out.push_str(&format!(" on {}", names.join(", ")));
            }
            Frequency::Monthly => {
                out.push_str(&format!(" on day {}", self.effective_month_day(start)));
            }
            Frequency::Yearly => {
                let (month, day) = self.effective_year_day(start);
                out.push_str(&format!(" on {:02}-{:02}", month, day));
            }
        }
        out.push_str(&format!(" (ends {})", self.end_condition));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn zero_interval_rejected() {
        let rule = RecurrenceRule::new(Frequency::Daily).every(0);
        let err = rule.validate(date(2024, 1, 1)).expect_err("invalid");
        assert!(matches!(err, Error::InvalidRule(_)));
    }

    #[test]
    fn weekday_out_of_range_rejected() {
        let rule = RecurrenceRule::new(Frequency::Weekly).on_weekdays([1, 7]);
        assert!(rule.validate(date(2024, 1, 1)).is_err());
    }

    #[test]
    fn irrelevant_fields_are_ignored() {
        let rule = RecurrenceRule::new(Frequency::Daily)
            .on_weekdays([9])
            .on_month_day(40);
        rule.validate(date(2024, 1, 1)).expect("valid daily rule");
    }

    #[test]
    fn month_day_bounds() {
        let start = date(2024, 1, 1);
        assert!(RecurrenceRule::new(Frequency::Monthly)
            .on_month_day(31)
            .validate(start)
            .is_ok());
        assert!(RecurrenceRule::new(Frequency::Monthly)
            .on_month_day(0)
            .validate(start)
            .is_err());
        assert!(RecurrenceRule::new(Frequency::Monthly)
            .on_month_day(32)
            .validate(start)
            .is_err());
    }

    #[test]
    fn yearly_day_must_fit_month() {
        let start = date(2024, 1, 1);
        assert!(RecurrenceRule::new(Frequency::Yearly)
            .on_year_day(2, 29)
            .validate(start)
            .is_ok());
        assert!(RecurrenceRule::new(Frequency::Yearly)
            .on_year_day(2, 30)
            .validate(start)
            .is_err());
        assert!(RecurrenceRule::new(Frequency::Yearly)
            .on_year_day(4, 31)
            .validate(start)
            .is_err());
        assert!(RecurrenceRule::new(Frequency::Yearly)
            .on_year_day(13, 1)
            .validate(start)
            .is_err());
    }

    #[test]
    fn end_conditions_validated() {
        let start = date(2024, 3, 10);
        let zero = RecurrenceRule::new(Frequency::Daily)
            .ending(EndCondition::AfterOccurrences { count: 0 });
        assert!(zero.validate(start).is_err());

        let before = RecurrenceRule::new(Frequency::Daily).ending(EndCondition::OnDate {
            date: date(2024, 3, 9),
        });
        assert!(before.validate(start).is_err());

        let same_day = RecurrenceRule::new(Frequency::Daily)
            .ending(EndCondition::OnDate { date: start });
        assert!(same_day.validate(start).is_ok());
    }

    #[test]
    fn resolved_fills_anchors_from_start() {
        let start = date(2024, 1, 31);
        let weekly = RecurrenceRule::new(Frequency::Weekly).resolved(start);
        assert_eq!(weekly.week_days, BTreeSet::from([3]));

        let monthly = RecurrenceRule::new(Frequency::Monthly).resolved(start);
        assert_eq!(monthly.month_day, Some(31));

        let yearly = RecurrenceRule::new(Frequency::Yearly).resolved(start);
        assert_eq!((yearly.year_month, yearly.year_day), (Some(1), Some(31)));
    }

    #[test]
    fn parses_weekdays() {
        assert_eq!(parse_weekday("mon").expect("mon"), 1);
        assert_eq!(parse_weekday("Wednesday").expect("wed"), 3);
        assert_eq!(parse_weekday("0").expect("sun"), 0);
        assert!(parse_weekday("7").is_err());
        assert!(parse_weekday("moon").is_err());
        assert!(parse_weekday("mo").is_err());
    }

    #[test]
    fn days_in_month_handles_leap_years() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2024, 4), 30);
        assert_eq!(days_in_month(2024, 12), 31);
        assert_eq!(clamped_date(2024, 4, 31), Some(date(2024, 4, 30)));
    }

    #[test]
    fn rule_json_shape() {
        let rule = RecurrenceRule::new(Frequency::Weekly)
            .every(2)
            .on_weekdays([1, 3])
            .ending(EndCondition::AfterOccurrences { count: 4 });
        let json = serde_json::to_value(&rule).expect("serialize");
        assert_eq!(json["frequency"], "weekly");
        assert_eq!(json["end_condition"]["type"], "after_occurrences");
        assert_eq!(json["end_condition"]["count"], 4);
        let back: RecurrenceRule = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, rule);
    }

    #[test]
    fn describe_reads_naturally() {
        let start = date(2024, 1, 1);
        let rule = RecurrenceRule::new(Frequency::Weekly)
            .every(2)
            .on_weekdays([1, 3]);
        assert_eq!(rule.describe(start), "every 2 weeks on mon, wed (ends never)");
    }
}
