//! Occurrence expansion.
//!
//! Expansion is a pure function of a series and a horizon: it reads no clock
//! and keeps no state between calls, so expanding the same series twice
//! yields the same dates.
//!
//! Occurrences are anchored on the series start date. Period `k` of a rule
//! with interval `n` covers:
//!
//! - daily: the single day `start + k·n`
//! - weekly: the Sunday-first week `week(start) + k·n`, one date per
//!   selected weekday in ascending weekday order
//! - monthly: month `month(start) + k·n`, day clamped to the month length
//! - yearly: year `year(start) + k·n`, month/day clamped the same way
//!
//! Candidates before the start date are skipped, so the start date is the
//! first occurrence only when it matches the rule.

use chrono::{Datelike, Days, NaiveDate};

use crate::rule::{clamped_date, Frequency, RecurrenceRule};
use crate::series::RecurrenceSeries;
use crate::task::TaskDraft;

/// Unbounded ascending iterator over the dates a rule produces from `start`.
///
/// End conditions are not applied here; see [`expand`].
#[derive(Debug, Clone)]
pub struct Occurrences {
    frequency: Frequency,
    interval: u64,
    start: NaiveDate,
    week_start: NaiveDate,
    week_days: Vec<u8>,
    month_day: u32,
    year_month: u32,
    period: u64,
    slot: usize,
    done: bool,
}

impl Occurrences {
    pub fn new(rule: &RecurrenceRule, start: NaiveDate) -> Self {
        let week_start = start
            .checked_sub_days(Days::new(u64::from(start.weekday().num_days_from_sunday())))
            .unwrap_or(start);
        let (month_day, year_month) = match rule.frequency {
            Frequency::Yearly => {
                let (month, day) = rule.effective_year_day(start);
                (day, month)
            }
            _ => (rule.effective_month_day(start), start.month()),
        };
        Self {
            frequency: rule.frequency,
            interval: u64::from(rule.interval.max(1)),
            start,
            week_start,
            week_days: rule.effective_week_days(start).into_iter().collect(),
            month_day,
            year_month,
            period: 0,
            slot: 0,
            done: false,
        }
    }

    fn candidate(&mut self) -> Option<NaiveDate> {
        let step = self.period.checked_mul(self.interval)?;
        match self.frequency {
            Frequency::Daily => {
                self.period += 1;
                self.start.checked_add_days(Days::new(step))
            }
            Frequency::Weekly => {
                let day = *self.week_days.get(self.slot)?;
                self.slot += 1;
                if self.slot == self.week_days.len() {
                    self.slot = 0;
                    self.period += 1;
                }
                let offset = step.checked_mul(7)?.checked_add(u64::from(day))?;
                self.week_start.checked_add_days(Days::new(offset))
            }
            Frequency::Monthly => {
                self.period += 1;
                let base = i64::from(self.start.year()) * 12 + i64::from(self.start.month0());
                let index = base.checked_add(i64::try_from(step).ok()?)?;
                let year = i32::try_from(index.div_euclid(12)).ok()?;
                let month = index.rem_euclid(12) as u32 + 1;
                clamped_date(year, month, self.month_day)
            }
            Frequency::Yearly => {
                self.period += 1;
                let year = i64::from(self.start.year()).checked_add(i64::try_from(step).ok()?)?;
                let year = i32::try_from(year).ok()?;
                clamped_date(year, self.year_month, self.month_day)
            }
        }
    }
}

impl Iterator for Occurrences {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while !self.done {
            match self.candidate() {
                Some(date) if date < self.start => continue,
                Some(date) => return Some(date),
                None => self.done = true,
            }
        }
        None
    }
}

/// Last date a series may produce an occurrence on, ignoring the horizon
fn series_bound(series: &RecurrenceSeries) -> Option<NaiveDate> {
    let until = series.rule.end_condition.until();
    let before_split = match series.truncated_at {
        Some(at) => Some(at.pred_opt()?),
        None => None,
    };
    match (until, before_split) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b).or(Some(NaiveDate::MAX)),
    }
}

/// Every occurrence of the series, honoring count, end date and truncation
fn bounded(series: &RecurrenceSeries) -> impl Iterator<Item = NaiveDate> {
    let limit = series
        .rule
        .end_condition
        .count()
        .map(|count| count as usize)
        .unwrap_or(usize::MAX);
    let bound = series_bound(series);
    Occurrences::new(&series.rule, series.start_date)
        .take(limit)
        .take_while(move |date| bound.map(|bound| *date <= bound).unwrap_or(false))
}

/// Occurrence dates of `series` up to and including `horizon`.
///
/// Strictly ascending, no duplicates. Stops at the horizon, the occurrence
/// count, the end date or the truncation date, whichever comes first.
pub fn expand(series: &RecurrenceSeries, horizon: NaiveDate) -> Vec<NaiveDate> {
    bounded(series).take_while(|date| *date <= horizon).collect()
}

/// Occurrence dates strictly after `after` and up to `horizon`
pub fn expand_after(
    series: &RecurrenceSeries,
    after: Option<NaiveDate>,
    horizon: NaiveDate,
) -> Vec<NaiveDate> {
    bounded(series)
        .take_while(|date| *date <= horizon)
        .filter(|date| after.map(|after| *date > after).unwrap_or(true))
        .collect()
}

/// First occurrence strictly after `date`, if the series has one
pub fn next_after(series: &RecurrenceSeries, date: NaiveDate) -> Option<NaiveDate> {
    bounded(series).find(|candidate| *candidate > date)
}

/// Occurrences strictly before `date`: how many, and the latest one
pub fn before(series: &RecurrenceSeries, date: NaiveDate) -> (u32, Option<NaiveDate>) {
    bounded(series)
        .take_while(|candidate| *candidate < date)
        .fold((0, None), |(count, _), candidate| (count + 1, Some(candidate)))
}

/// Whether `date` is one of the series' occurrences
pub fn is_occurrence(series: &RecurrenceSeries, date: NaiveDate) -> bool {
    bounded(series)
        .find(|candidate| *candidate >= date)
        .map(|candidate| candidate == date)
        .unwrap_or(false)
}

/// Task drafts for each occurrence up to `horizon`, cloned from the template
pub fn instances(series: &RecurrenceSeries, horizon: NaiveDate) -> Vec<TaskDraft> {
    expand(series, horizon)
        .into_iter()
        .map(|date| TaskDraft::occurrence(series.template.clone(), series.id.clone(), date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::EndCondition;
    use crate::task::TaskTemplate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn series(rule: RecurrenceRule, start: NaiveDate) -> RecurrenceSeries {
        RecurrenceSeries::new(rule, TaskTemplate::new("Check"), start, Some("ana"))
            .expect("valid series")
    }

    #[test]
    fn daily_steps_by_interval() {
        let s = series(RecurrenceRule::new(Frequency::Daily).every(3), date(2024, 1, 1));
        assert_eq!(
            expand(&s, date(2024, 1, 10)),
            vec![date(2024, 1, 1), date(2024, 1, 4), date(2024, 1, 7), date(2024, 1, 10)]
        );
    }

    #[test]
    fn biweekly_monday_wednesday() {
        let rule = RecurrenceRule::new(Frequency::Weekly)
            .every(2)
            .on_weekdays([1, 3]);
        let s = series(rule, date(2024, 1, 1));
        assert_eq!(
            expand(&s, date(2024, 1, 31)),
            vec![
                date(2024, 1, 1),
                date(2024, 1, 3),
                date(2024, 1, 15),
                date(2024, 1, 17),
                date(2024, 1, 29),
                date(2024, 1, 31),
            ]
        );
    }

    #[test]
    fn weekly_empty_set_uses_start_weekday() {
        let s = series(RecurrenceRule::new(Frequency::Weekly), date(2024, 1, 4));
        assert_eq!(
            expand(&s, date(2024, 1, 25)),
            vec![date(2024, 1, 4), date(2024, 1, 11), date(2024, 1, 18), date(2024, 1, 25)]
        );
    }

    #[test]
    fn weekly_skips_days_before_start_in_first_window() {
        let rule = RecurrenceRule::new(Frequency::Weekly).on_weekdays([1, 5]);
        // Wednesday start: Monday of the first week is skipped.
        let s = series(rule, date(2024, 1, 3));
        assert_eq!(
            expand(&s, date(2024, 1, 12)),
            vec![date(2024, 1, 5), date(2024, 1, 8), date(2024, 1, 12)]
        );
    }

    #[test]
    fn monthly_clamps_short_months() {
        let rule = RecurrenceRule::new(Frequency::Monthly).on_month_day(31);
        let s = series(rule, date(2024, 1, 31));
        assert_eq!(
            expand(&s, date(2024, 5, 31)),
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30),
                date(2024, 5, 31),
            ]
        );
    }

    #[test]
    fn monthly_day_before_start_moves_to_next_period() {
        let rule = RecurrenceRule::new(Frequency::Monthly)
            .every(2)
            .on_month_day(5);
        let s = series(rule, date(2024, 1, 20));
        assert_eq!(
            expand(&s, date(2024, 8, 1)),
            vec![date(2024, 3, 5), date(2024, 5, 5), date(2024, 7, 5)]
        );
    }

    #[test]
    fn yearly_leap_day_clamps() {
        let rule = RecurrenceRule::new(Frequency::Yearly).on_year_day(2, 29);
        let s = series(rule, date(2024, 1, 1));
        assert_eq!(
            expand(&s, date(2028, 12, 31)),
            vec![
                date(2024, 2, 29),
                date(2025, 2, 28),
                date(2026, 2, 28),
                date(2027, 2, 28),
                date(2028, 2, 29),
            ]
        );
    }

    #[test]
    fn count_limits_occurrences() {
        let rule = RecurrenceRule::new(Frequency::Daily)
            .ending(EndCondition::AfterOccurrences { count: 3 });
        let s = series(rule, date(2024, 1, 1));
        assert_eq!(expand(&s, date(2030, 1, 1)).len(), 3);
        assert_eq!(
            expand(&s, date(2024, 1, 2)),
            vec![date(2024, 1, 1), date(2024, 1, 2)]
        );
    }

    #[test]
    fn end_date_is_inclusive() {
        let rule = RecurrenceRule::new(Frequency::Weekly).ending(EndCondition::OnDate {
            date: date(2024, 1, 15),
        });
        let s = series(rule, date(2024, 1, 1));
        assert_eq!(
            expand(&s, date(2024, 12, 31)),
            vec![date(2024, 1, 1), date(2024, 1, 8), date(2024, 1, 15)]
        );
    }

    #[test]
    fn truncation_excludes_split_date() {
        let mut s = series(RecurrenceRule::new(Frequency::Daily), date(2024, 1, 1));
        s.truncated_at = Some(date(2024, 1, 3));
        assert_eq!(
            expand(&s, date(2024, 1, 10)),
            vec![date(2024, 1, 1), date(2024, 1, 2)]
        );

        s.truncated_at = Some(date(2024, 1, 1));
        assert!(expand(&s, date(2024, 1, 10)).is_empty());
    }

    #[test]
    fn horizon_before_start_is_empty() {
        let s = series(RecurrenceRule::new(Frequency::Daily), date(2024, 1, 10));
        assert!(expand(&s, date(2024, 1, 9)).is_empty());
    }

    #[test]
    fn helpers_agree_with_expand() {
        let rule = RecurrenceRule::new(Frequency::Weekly).on_weekdays([2, 4]);
        let s = series(rule, date(2024, 1, 2));
        assert_eq!(before(&s, date(2024, 1, 9)), (2, Some(date(2024, 1, 4))));
        assert_eq!(next_after(&s, date(2024, 1, 4)), Some(date(2024, 1, 9)));
        assert!(is_occurrence(&s, date(2024, 1, 11)));
        assert!(!is_occurrence(&s, date(2024, 1, 10)));
        assert_eq!(
            expand_after(&s, Some(date(2024, 1, 4)), date(2024, 1, 11)),
            vec![date(2024, 1, 9), date(2024, 1, 11)]
        );
    }

    #[test]
    fn instances_clone_template() {
        let s = series(RecurrenceRule::new(Frequency::Daily), date(2024, 1, 1));
        let drafts = instances(&s, date(2024, 1, 2));
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].template.title, "Check");
        assert_eq!(drafts[1].due_date, Some(date(2024, 1, 2)));
        assert_eq!(drafts[1].original_date, Some(date(2024, 1, 2)));
        assert_eq!(drafts[1].series_id.as_deref(), Some(s.id.as_str()));
    }
}
