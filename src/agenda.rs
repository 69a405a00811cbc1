//! Read-only views over the timetable: the weekly grid and today's next classes.

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use serde::Serialize;

use crate::models::{Course, CourseTime, PeriodDefinition};
use crate::planner::{is_slot_active, week_number, ScheduledOccurrence};
use crate::settings::UserPreferences;

/// One slot drawn in the weekly grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridItem {
    pub course_id: i64,
    pub course_name: String,
    pub location: Option<String>,
    pub slot: CourseTime,
    pub start_minutes: u16,
    pub end_minutes: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub day_of_week: u8,
    pub items: Vec<GridItem>,
}

/// Calendar date of `now` in the configured zone, else the system zone.
pub fn local_today(prefs: &UserPreferences, now: DateTime<Utc>) -> NaiveDate {
    match prefs.zone() {
        Some(zone) => now.with_timezone(&zone).date_naive(),
        None => now.with_timezone(&Local).date_naive(),
    }
}

/// Academic week for `today` under the configured term, if one is set.
pub fn current_week(prefs: &UserPreferences, today: NaiveDate) -> Option<u32> {
    week_number(prefs.term_start_date(), today)
}

/// Monday-first grid of the recurring timetable. Weekend columns follow the
/// `show_saturday`/`show_sunday` preferences.
pub fn week_grid(
    courses: &[Course],
    periods: &[PeriodDefinition],
    prefs: &UserPreferences,
    today: NaiveDate,
) -> Vec<DaySchedule> {
    let period_map: HashMap<u32, &PeriodDefinition> =
        periods.iter().map(|p| (p.sequence, p)).collect();

    let week = current_week(prefs, today);
    let hide_inactive = !prefs.show_non_current_week_courses && week.is_some();

    (1u8..=7)
        .filter(|day| match *day {
            6 => prefs.show_saturday,
            7 => prefs.show_sunday,
            _ => true,
        })
        .map(|day| {
            let mut items: Vec<GridItem> = courses
                .iter()
                .flat_map(|course| course.times.iter().map(move |slot| (course, slot)))
                .filter(|(_, slot)| slot.day_of_week == day)
                .filter(|(_, slot)| !hide_inactive || is_slot_active(&slot.weeks, week))
                .filter_map(|(course, slot)| {
                    let start = period_map.get(&slot.start_period)?;
                    let end = period_map.get(&slot.end_period)?;
                    Some(GridItem {
                        course_id: course.id,
                        course_name: course.name.clone(),
                        location: course.location.clone(),
                        slot: slot.clone(),
                        start_minutes: start.start_minutes,
                        end_minutes: end.end_minutes,
                    })
                })
                .collect();
            items.sort_by_key(|item| (item.start_minutes, item.end_minutes, item.course_id));
            DaySchedule {
                day_of_week: day,
                items,
            }
        })
        .collect()
}

/// Occurrences on `now`'s local day that have not started yet, earliest
/// first, at most `limit` of them.
pub fn upcoming_today<'o, 'a, Tz: TimeZone>(
    occurrences: &'o [ScheduledOccurrence<'a, Tz>],
    now: &DateTime<Utc>,
    limit: usize,
) -> Vec<&'o ScheduledOccurrence<'a, Tz>> {
    let mut upcoming: Vec<&ScheduledOccurrence<'a, Tz>> = occurrences
        .iter()
        .filter(|o| {
            let local_now = now.with_timezone(&o.start.timezone());
            o.start.date_naive() == local_now.date_naive() && o.start.with_timezone(&Utc) > *now
        })
        .collect();
    upcoming.sort_by(|a, b| a.start.cmp(&b.start));
    upcoming.truncate(limit);
    upcoming
}
