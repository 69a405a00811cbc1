use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::Serialize;

use super::expand::ScheduledOccurrence;

pub const DND_TAG: &str = "dnd";

/// A continuous span during which Do Not Disturb should be on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DndWindow<Tz: TimeZone> {
    pub enable_at: DateTime<Tz>,
    pub disable_at: DateTime<Tz>,
}

/// One ON or OFF transition for the DND collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DndToggle {
    pub at: DateTime<Utc>,
    pub enable: bool,
    /// Derived from `(at, enable)` so re-planning the same window replaces
    /// the earlier job instead of adding a second one.
    pub dedup_key: String,
}

/// Padding and merge policy for DND windows, in minutes. Negative values are
/// treated as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DndPolicy {
    pub lead_minutes: i64,
    pub release_minutes: i64,
    pub skip_break_threshold_minutes: i64,
}

impl DndPolicy {
    pub fn new(lead_minutes: i64, release_minutes: i64, skip_break_threshold_minutes: i64) -> Self {
        Self {
            lead_minutes: lead_minutes.max(0),
            release_minutes: release_minutes.max(0),
            skip_break_threshold_minutes: skip_break_threshold_minutes.max(0),
        }
    }
}

/// Pads every occurrence by the lead/release minutes and merges candidates
/// whose gap to the current window is at most the skip-break threshold.
///
/// Input order does not matter; occurrences are sorted by start first. A
/// merge only ever pushes the current window's end later.
pub fn merge_dnd_windows<Tz: TimeZone>(
    occurrences: &[ScheduledOccurrence<'_, Tz>],
    policy: DndPolicy,
) -> Vec<DndWindow<Tz>> {
    let policy = DndPolicy::new(
        policy.lead_minutes,
        policy.release_minutes,
        policy.skip_break_threshold_minutes,
    );

    let mut sorted: Vec<&ScheduledOccurrence<'_, Tz>> = occurrences.iter().collect();
    sorted.sort_by(|a, b| a.start.cmp(&b.start));

    let mut windows = Vec::new();
    let mut current: Option<DndWindow<Tz>> = None;

    for occurrence in sorted {
        if occurrence.end <= occurrence.start {
            continue;
        }
        let candidate = DndWindow {
            enable_at: occurrence.start.clone() - Duration::minutes(policy.lead_minutes),
            disable_at: occurrence.end.clone() + Duration::minutes(policy.release_minutes),
        };

        let Some(window) = current.as_mut() else {
            current = Some(candidate);
            continue;
        };

        let gap = (candidate.enable_at.clone() - window.disable_at.clone()).num_minutes();
        if gap <= policy.skip_break_threshold_minutes {
            // Short break: keep DND on, stretch to the later end
            if candidate.disable_at > window.disable_at {
                window.disable_at = candidate.disable_at;
            }
        } else {
            windows.push(std::mem::replace(window, candidate));
        }
    }

    if let Some(window) = current {
        windows.push(window);
    }

    windows
}

/// Turns windows into enable/disable toggles, dropping every toggle at or
/// before `now`. A window already under way still yields its disable toggle.
pub fn dnd_toggles<Tz: TimeZone>(windows: &[DndWindow<Tz>], now: &DateTime<Utc>) -> Vec<DndToggle> {
    windows
        .iter()
        .flat_map(|window| {
            [
                (window.enable_at.with_timezone(&Utc), true),
                (window.disable_at.with_timezone(&Utc), false),
            ]
        })
        .filter(|(at, _)| at > now)
        .map(|(at, enable)| DndToggle {
            at,
            enable,
            dedup_key: dnd_key(at.timestamp(), enable),
        })
        .collect()
}

/// Merged windows that still have at least one toggle after `now`.
pub fn plan_dnd_windows<Tz: TimeZone>(
    occurrences: &[ScheduledOccurrence<'_, Tz>],
    policy: DndPolicy,
    now: &DateTime<Utc>,
) -> Vec<DndWindow<Tz>> {
    merge_dnd_windows(occurrences, policy)
        .into_iter()
        .filter(|window| window.disable_at.with_timezone(&Utc) > *now)
        .collect()
}

pub fn plan_dnd_toggles<Tz: TimeZone>(
    occurrences: &[ScheduledOccurrence<'_, Tz>],
    policy: DndPolicy,
    now: &DateTime<Utc>,
) -> Vec<DndToggle> {
    dnd_toggles(&merge_dnd_windows(occurrences, policy), now)
}

pub fn dnd_key(epoch_secs: i64, enable: bool) -> String {
    let direction = if enable { "on" } else { "off" };
    format!("{DND_TAG}_{epoch_secs}_{direction}")
}
