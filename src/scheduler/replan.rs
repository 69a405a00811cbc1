use std::{fs, sync::Arc, time::SystemTime};

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::db::Database;
use crate::models::{Course, PeriodDefinition};
use crate::planner::{plan_all, PlannerConfig, SchedulePlan};
use crate::settings::{SettingsStore, UserPreferences};

use super::jobs::ReminderScheduler;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub const DEFAULT_REPLAN_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_CHANGE_POLL_SECS: u64 = 5;

/// Plans in the preferred zone, falling back to the system local zone.
pub fn plan_for_preferences(
    courses: &[Course],
    periods: &[PeriodDefinition],
    prefs: &UserPreferences,
    now: DateTime<Utc>,
) -> SchedulePlan {
    let config = PlannerConfig::from(prefs);
    match prefs.zone() {
        Some(zone) => plan_all(courses, periods, &config, &zone, now),
        None => plan_all(courses, periods, &config, &Local, now),
    }
}

/// Loads the stored timetable, plans from `now`, and replaces every
/// scheduled reminder and DND job.
pub async fn replan_once(
    db: &Database,
    settings: &SettingsStore,
    scheduler: &ReminderScheduler,
) -> Result<SchedulePlan> {
    let courses = db.get_courses().await?;
    let periods = db.get_periods().await?;
    let prefs = settings.preferences();

    let plan = plan_for_preferences(&courses, &periods, &prefs, Utc::now());
    scheduler.reschedule_all(&plan).await;
    Ok(plan)
}

/// What another process can change under a running daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ChangeStamp {
    data_version: Option<i64>,
    settings_modified: Option<SystemTime>,
}

async fn change_stamp(db: &Database, settings: &SettingsStore) -> ChangeStamp {
    let data_version = match db.data_version().await {
        Ok(version) => Some(version),
        Err(err) => {
            log_debug!("Could not read data_version: {err:#}");
            None
        }
    };
    let settings_modified = fs::metadata(settings.path())
        .and_then(|meta| meta.modified())
        .ok();

    ChangeStamp {
        data_version,
        settings_modified,
    }
}

async fn reload_and_replan(db: &Database, settings: &SettingsStore, scheduler: &ReminderScheduler) {
    if let Err(err) = settings.reload() {
        log_debug!("Keeping cached settings: {err:#}");
    }
    match replan_once(db, settings, scheduler).await {
        Ok(plan) => log_debug!(
            "Planned {} occurrences, next reminder {:?}",
            plan.occurrence_count,
            plan.reminders.first().map(|r| r.fire_at)
        ),
        Err(err) => log_error!("Replanning failed: {err:#}"),
    }
}

/// Replans immediately and then every `interval` until `cancel_token` fires.
///
/// Every `poll_interval` the database `data_version` and the settings file
/// mtime are checked. A change from another process (a CLI edit) triggers a
/// replan right away instead of waiting for the next `interval` tick.
pub async fn replan_loop(
    db: Database,
    settings: Arc<SettingsStore>,
    scheduler: ReminderScheduler,
    interval: Duration,
    poll_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watcher = tokio::time::interval(poll_interval);
    watcher.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut last_seen = change_stamp(&db, &settings).await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                last_seen = change_stamp(&db, &settings).await;
                reload_and_replan(&db, &settings, &scheduler).await;
            }
            _ = watcher.tick() => {
                let current = change_stamp(&db, &settings).await;
                if current != last_seen {
                    log_info!("Timetable changed on disk; replanning");
                    last_seen = current;
                    reload_and_replan(&db, &settings, &scheduler).await;
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("Replan loop shutting down");
                break;
            }
        }
    }
}
