//! Schedule expansion and notification planning.
//!
//! Everything here is a pure function over plain values: no I/O, no shared
//! state. Callers re-run the whole pipeline whenever courses, periods, or
//! preferences change and replace whatever they scheduled before.

pub mod config;
pub mod dnd;
pub mod expand;
pub mod reminders;
pub mod term;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::models::{Course, PeriodDefinition};

pub use config::PlannerConfig;
pub use dnd::{plan_dnd_toggles, plan_dnd_windows, DndPolicy, DndToggle, DndWindow};
pub use expand::{expand_schedule, ScheduledOccurrence};
pub use reminders::{plan_reminders, PlannedReminder, ReminderInstruction};
pub use term::{is_slot_active, week_number, week_within_term};

/// Everything the job scheduler needs for one planning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchedulePlan {
    pub generated_at: DateTime<Utc>,
    pub occurrence_count: usize,
    pub reminders: Vec<ReminderInstruction>,
    pub dnd_toggles: Vec<DndToggle>,
}

impl SchedulePlan {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            generated_at: now,
            occurrence_count: 0,
            reminders: Vec::new(),
            dnd_toggles: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reminders.is_empty() && self.dnd_toggles.is_empty()
    }
}

/// Expands the timetable from today (in `zone`) and plans reminders plus,
/// when enabled, DND toggles.
pub fn plan_all<Tz: TimeZone>(
    courses: &[Course],
    periods: &[PeriodDefinition],
    config: &PlannerConfig,
    zone: &Tz,
    now: DateTime<Utc>,
) -> SchedulePlan {
    if courses.is_empty() || periods.is_empty() {
        return SchedulePlan::empty(now);
    }

    let today = now.with_timezone(zone).date_naive();
    let occurrences = expand_schedule(
        courses,
        periods,
        config.term_start,
        config.total_weeks,
        zone,
        today,
        config.days_ahead,
    );

    let reminders = plan_reminders(&occurrences, config.reminder_lead_minutes, &now)
        .iter()
        .map(PlannedReminder::instruction)
        .collect();

    let dnd_toggles = if config.dnd_enabled {
        plan_dnd_toggles(&occurrences, config.dnd, &now)
    } else {
        Vec::new()
    };

    SchedulePlan {
        generated_at: now,
        occurrence_count: occurrences.len(),
        reminders,
        dnd_toggles,
    }
}
