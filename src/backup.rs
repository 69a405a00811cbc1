//! JSON export and import of the whole timetable.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::db::Database;
use crate::models::{Course, PeriodDefinition};
use crate::settings::{SettingsStore, UserPreferences};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBackup {
    pub courses: Vec<Course>,
    pub periods: Vec<PeriodDefinition>,
    #[serde(default)]
    pub preferences: UserPreferences,
}

impl ScheduleBackup {
    pub async fn capture(db: &Database, settings: &SettingsStore) -> Result<Self> {
        Ok(Self {
            courses: db.get_courses().await?,
            periods: db.get_periods().await?,
            preferences: settings.preferences(),
        })
    }
}

/// Writes the current timetable to `path` as pretty JSON.
pub async fn export_to(db: &Database, settings: &SettingsStore, path: &Path) -> Result<ScheduleBackup> {
    let backup = ScheduleBackup::capture(db, settings).await?;
    let serialized = serde_json::to_string_pretty(&backup)?;
    fs::write(path, serialized)
        .with_context(|| format!("Failed to write backup to {}", path.display()))?;

    info!(
        "Exported {} courses and {} periods to {}",
        backup.courses.len(),
        backup.periods.len(),
        path.display()
    );
    Ok(backup)
}

/// Replaces courses, periods and preferences with the contents of `path`.
/// Nothing is changed when the file cannot be read or fails validation.
/// Preferences are written first and restored if the schedule is rejected.
pub async fn import_from(db: &Database, settings: &SettingsStore, path: &Path) -> Result<ScheduleBackup> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup from {}", path.display()))?;
    let backup: ScheduleBackup = serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a valid timetable backup", path.display()))?;

    let previous = settings.preferences();
    settings
        .replace_all(backup.preferences.clone())
        .context("Failed to import preferences")?;

    if let Err(err) = db
        .replace_schedule(backup.periods.clone(), backup.courses.clone())
        .await
    {
        if let Err(restore_err) = settings.replace_all(previous) {
            warn!("Failed to restore preferences after a rejected import: {restore_err:#}");
        }
        return Err(err.context("Failed to import timetable"));
    }

    info!(
        "Imported {} courses and {} periods from {}",
        backup.courses.len(),
        backup.periods.len(),
        path.display()
    );
    Ok(backup)
}
