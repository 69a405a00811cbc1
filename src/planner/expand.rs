use std::collections::HashMap;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::models::{Course, CourseTime, PeriodDefinition};
use crate::planner::term::{is_slot_active, week_number, week_within_term};

const ENABLE_LOGS: bool = true;

use crate::log_debug;

/// One concrete, dated instance of a recurring course slot.
#[derive(Debug, Clone)]
pub struct ScheduledOccurrence<'a, Tz: TimeZone> {
    pub course: &'a Course,
    pub slot: &'a CourseTime,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

/// Expands recurring course slots into dated occurrences for every day in
/// `[from, from + days_ahead]`, sorted by start.
///
/// Slots whose start or end period is missing from `periods` are skipped, as
/// are days outside the term. No de-duplication is performed.
pub fn expand_schedule<'a, Tz: TimeZone>(
    courses: &'a [Course],
    periods: &[PeriodDefinition],
    term_start: Option<NaiveDate>,
    total_weeks: u32,
    zone: &Tz,
    from: NaiveDate,
    days_ahead: u32,
) -> Vec<ScheduledOccurrence<'a, Tz>> {
    if periods.is_empty() {
        return Vec::new();
    }

    let period_map: HashMap<u32, &PeriodDefinition> =
        periods.iter().map(|p| (p.sequence, p)).collect();

    let mut results = Vec::new();

    for date in from.iter_days().take(days_ahead as usize + 1) {
        if !week_within_term(term_start, total_weeks, date) {
            continue;
        }

        let day_value = date.weekday().number_from_monday();
        let week = week_number(term_start, date);

        for course in courses {
            for slot in &course.times {
                if u32::from(slot.day_of_week) != day_value {
                    continue;
                }
                if !is_slot_active(&slot.weeks, week) {
                    continue;
                }

                let (Some(start_period), Some(end_period)) = (
                    period_map.get(&slot.start_period),
                    period_map.get(&slot.end_period),
                ) else {
                    log_debug!(
                        "Skipping slot {} of '{}': period {}..{} not defined",
                        slot.id,
                        course.name,
                        slot.start_period,
                        slot.end_period
                    );
                    continue;
                };

                let start = localize(zone, at_minutes(date, start_period.start_minutes));
                let end = localize(zone, at_minutes(date, end_period.end_minutes));
                let (Some(start), Some(end)) = (start, end) else {
                    log_debug!(
                        "Skipping '{}' on {date}: local time does not exist in zone",
                        course.name
                    );
                    continue;
                };
                if end <= start {
                    log_debug!(
                        "Skipping '{}' on {date}: period {} ends before period {} starts",
                        course.name,
                        slot.end_period,
                        slot.start_period
                    );
                    continue;
                }

                results.push(ScheduledOccurrence {
                    course,
                    slot,
                    start,
                    end,
                });
            }
        }
    }

    results.sort_by(|a, b| a.start.cmp(&b.start));
    results
}

/// `date` at `minutes` past midnight. 1440 lands on the next midnight.
fn at_minutes(date: NaiveDate, minutes: u16) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN) + Duration::minutes(i64::from(minutes))
}

/// Ambiguous local times resolve to the earlier instant; times inside a DST
/// gap are pushed forward by an hour.
fn localize<Tz: TimeZone>(zone: &Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => {
            log_debug!("{naive} falls in a DST gap; shifting one hour later");
            zone.from_local_datetime(&(naive + Duration::hours(1)))
                .earliest()
        }
    }
}
