//! Property-based tests for occurrence expansion and series splits

use cadence::expand;
use cadence::rule::{days_in_month, EndCondition, Frequency, RecurrenceRule};
use cadence::series::{split_series, RecurrenceSeries};
use cadence::task::{TaskPatch, TaskTemplate};
use chrono::{Datelike, Days, NaiveDate, Utc};
use proptest::prelude::*;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).expect("valid date")
}

fn start_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..3650).prop_map(|offset| base_date() + Days::new(offset))
}

/// How a generated rule ends; end dates are relative to the start
#[derive(Debug, Clone)]
enum End {
    Never,
    Count(u32),
    Within(u64),
}

fn end_strategy() -> impl Strategy<Value = End> {
    prop_oneof![
        Just(End::Never),
        (1u32..20).prop_map(End::Count),
        (0u64..1500).prop_map(End::Within),
    ]
}

fn rule_strategy() -> impl Strategy<Value = RecurrenceRule> {
    (
        prop_oneof![
            Just(Frequency::Daily),
            Just(Frequency::Weekly),
            Just(Frequency::Monthly),
            Just(Frequency::Yearly),
        ],
        1u32..5,
        prop::collection::btree_set(0u8..7, 0..4),
        prop::option::of(1u8..=31),
        prop::option::of((1u8..=12, 1u8..=31)),
    )
        .prop_map(|(frequency, interval, days, month_day, year_day)| {
            let mut rule = RecurrenceRule::new(frequency).every(interval);
            match frequency {
                Frequency::Weekly => rule.week_days = days,
                Frequency::Monthly => rule.month_day = month_day,
                Frequency::Yearly => {
                    if let Some((month, day)) = year_day {
                        rule = rule.on_year_day(month, day);
                    }
                }
                Frequency::Daily => {}
            }
            rule
        })
}

/// A rule with its end condition, together with the series start
fn case_strategy() -> impl Strategy<Value = (RecurrenceRule, NaiveDate)> {
    (rule_strategy(), start_strategy(), end_strategy()).prop_map(|(rule, start, end)| {
        let end_condition = match end {
            End::Never => EndCondition::Never,
            End::Count(count) => EndCondition::AfterOccurrences { count },
            End::Within(days) => EndCondition::OnDate {
                date: start + Days::new(days),
            },
        };
        (rule.ending(end_condition), start)
    })
}

fn series(rule: RecurrenceRule, start: NaiveDate) -> Option<RecurrenceSeries> {
    RecurrenceSeries::new(rule, TaskTemplate::new("Check"), start, None).ok()
}

/// Property: expansion is strictly ascending, starts no earlier than the
/// start date, stops at the horizon, and every date is an occurrence.
#[test]
fn prop_expansion_strictly_ascending_within_bounds() {
    proptest!(|((rule, start) in case_strategy(), span in 0u64..800)| {
        let Some(series) = series(rule, start) else {
            return Ok(());
        };
        let horizon = start + Days::new(span);
        let dates = expand::expand(&series, horizon);

        for pair in dates.windows(2) {
            prop_assert!(pair[0] < pair[1], "dates must be strictly ascending");
        }
        for date in &dates {
            prop_assert!(*date >= start);
            prop_assert!(*date <= horizon);
            prop_assert!(expand::is_occurrence(&series, *date));
        }
        if let Some(count) = series.rule.end_condition.count() {
            prop_assert!(dates.len() <= count as usize);
        }
        if let Some(until) = series.rule.end_condition.until() {
            prop_assert!(dates.iter().all(|date| *date <= until));
        }
    });
}

/// Property: expanding the same input twice gives the same output, and a
/// shorter horizon yields a prefix of a longer one.
#[test]
fn prop_expansion_deterministic_and_prefix_stable() {
    proptest!(|(
        (rule, start) in case_strategy(),
        short in 0u64..400,
        extra in 0u64..400,
    )| {
        let Some(series) = series(rule, start) else {
            return Ok(());
        };
        let near = start + Days::new(short);
        let far = near + Days::new(extra);

        let first = expand::expand(&series, far);
        let second = expand::expand(&series, far);
        prop_assert_eq!(&first, &second);

        let prefix = expand::expand(&series, near);
        prop_assert_eq!(&first[..prefix.len()], &prefix[..]);
    });
}

/// Property: splitting at any occurrence without changes yields the same
/// dates as the unsplit series.
#[test]
fn prop_split_preserves_occurrences() {
    proptest!(|(
        (rule, start) in case_strategy(),
        span in 1u64..800,
        pick in 0usize..1000,
    )| {
        let Some(original) = series(rule, start) else {
            return Ok(());
        };
        let horizon = start + Days::new(span);
        let dates = expand::expand(&original, horizon);
        prop_assume!(!dates.is_empty());
        let at = dates[pick % dates.len()];

        let split = split_series(&original, at, &TaskPatch::default(), None, None, Utc::now())
            .expect("split at an occurrence");
        let mut combined = expand::expand(&split.head, horizon);
        prop_assert!(combined.iter().all(|date| *date < at));
        combined.extend(expand::expand(&split.tail, horizon));

        prop_assert_eq!(combined, dates);
        prop_assert_eq!(
            split.tail.rule.end_condition.until(),
            original.rule.end_condition.until()
        );
    });
}

/// Property: a monthly day past the end of a month lands on the month's
/// last day.
#[test]
fn prop_monthly_day_clamps_to_month_length() {
    proptest!(|(start in start_strategy(), day in 1u8..=31, interval in 1u32..4)| {
        let rule = RecurrenceRule::new(Frequency::Monthly)
            .every(interval)
            .on_month_day(day);
        let Some(series) = series(rule, start) else {
            return Ok(());
        };
        for date in expand::expand(&series, start + Days::new(730)) {
            let expected = u32::from(day).min(days_in_month(date.year(), date.month()));
            prop_assert_eq!(date.day(), expected);
        }
    });
}

/// Property: a yearly day past the end of its month lands on the month's
/// last day (Feb 29 becomes Feb 28 outside leap years).
#[test]
fn prop_yearly_day_clamps_to_month_length() {
    proptest!(|(start in start_strategy(), month in 1u8..=12, day in 28u8..=31)| {
        let rule = RecurrenceRule::new(Frequency::Yearly).on_year_day(month, day);
        let Some(series) = series(rule, start) else {
            return Ok(());
        };
        let dates = expand::expand(&series, start + Days::new(366 * 6));
        prop_assert!(!dates.is_empty());
        for date in dates {
            prop_assert_eq!(date.month(), u32::from(month));
            let expected = u32::from(day).min(days_in_month(date.year(), date.month()));
            prop_assert_eq!(date.day(), expected);
        }
    });
}
