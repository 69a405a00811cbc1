use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

use super::expand::ScheduledOccurrence;

pub const REMINDER_TAG: &str = "reminder";

/// A reminder due at `fire_at` for `occurrence`.
#[derive(Debug, Clone)]
pub struct PlannedReminder<'a, Tz: TimeZone> {
    pub fire_at: DateTime<Tz>,
    pub occurrence: ScheduledOccurrence<'a, Tz>,
}

/// What the notification collaborator needs to enqueue a reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderInstruction {
    pub fire_at: DateTime<Utc>,
    pub course_name: String,
    pub subtitle: String,
    /// Unique per occurrence; re-enqueueing the same key replaces the job.
    pub dedup_key: String,
    pub notification_id: i32,
}

/// One reminder per occurrence at `start - lead_minutes`.
///
/// A negative lead disables reminders entirely. Reminders due at or before
/// `now` are dropped rather than fired late.
pub fn plan_reminders<'a, Tz: TimeZone>(
    occurrences: &[ScheduledOccurrence<'a, Tz>],
    lead_minutes: i64,
    now: &DateTime<Utc>,
) -> Vec<PlannedReminder<'a, Tz>> {
    if lead_minutes < 0 {
        return Vec::new();
    }

    occurrences
        .iter()
        .filter_map(|occurrence| {
            let fire_at = occurrence.start.clone() - Duration::minutes(lead_minutes);
            if fire_at.with_timezone(&Utc) <= *now {
                return None;
            }
            Some(PlannedReminder {
                fire_at,
                occurrence: occurrence.clone(),
            })
        })
        .collect()
}

impl<Tz: TimeZone> PlannedReminder<'_, Tz> {
    pub fn instruction(&self) -> ReminderInstruction {
        let start_epoch = self.occurrence.start.timestamp();
        let course = self.occurrence.course;
        ReminderInstruction {
            fire_at: self.fire_at.with_timezone(&Utc),
            course_name: course.name.clone(),
            subtitle: course.reminder_subtitle(),
            dedup_key: reminder_key(start_epoch, course.id),
            notification_id: notification_id(start_epoch),
        }
    }
}

pub fn reminder_key(start_epoch_secs: i64, course_id: i64) -> String {
    format!("{REMINDER_TAG}_{start_epoch_secs}_{course_id}")
}

/// Stable positive notification id derived from the class start.
pub fn notification_id(start_epoch_secs: i64) -> i32 {
    start_epoch_secs.rem_euclid(i64::from(i32::MAX)) as i32
}
