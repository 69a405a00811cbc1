use anyhow::{Context, Result};
use chrono::NaiveDate;
use chrono_tz::Tz;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const DEFAULT_TOTAL_WEEKS: u32 = 20;
pub const DEFAULT_LOOKAHEAD_DAYS: u32 = 14;

/// User preferences persisted to `settings.json`.
///
/// Every field has a default so older or hand-edited files still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub timetable_name: String,
    /// Negative disables class reminders.
    pub reminder_lead_minutes: i32,
    pub dnd_enabled: bool,
    pub dnd_lead_minutes: i32,
    pub dnd_release_minutes: i32,
    pub dnd_skip_break_threshold_minutes: i32,
    pub show_saturday: bool,
    pub show_sunday: bool,
    /// ISO `YYYY-MM-DD`; absent means no term restriction.
    pub term_start_date_iso: Option<String>,
    pub total_weeks: u32,
    pub show_non_current_week_courses: bool,
    /// IANA zone name; absent means the system local zone.
    pub time_zone: Option<String>,
    pub lookahead_days: u32,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            timetable_name: "My Timetable".into(),
            reminder_lead_minutes: 10,
            dnd_enabled: false,
            dnd_lead_minutes: 5,
            dnd_release_minutes: 5,
            dnd_skip_break_threshold_minutes: 15,
            show_saturday: true,
            show_sunday: true,
            term_start_date_iso: None,
            total_weeks: DEFAULT_TOTAL_WEEKS,
            show_non_current_week_courses: true,
            time_zone: None,
            lookahead_days: DEFAULT_LOOKAHEAD_DAYS,
        }
    }
}

impl UserPreferences {
    /// Parsed term start. Blank or malformed values mean "no term configured".
    pub fn term_start_date(&self) -> Option<NaiveDate> {
        let raw = self.term_start_date_iso.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(err) => {
                warn!("Ignoring malformed term start date '{raw}': {err}");
                None
            }
        }
    }

    /// Configured IANA zone, or `None` to use the system local zone.
    pub fn zone(&self) -> Option<Tz> {
        let raw = self.time_zone.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<Tz>() {
            Ok(tz) => Some(tz),
            Err(err) => {
                warn!("Ignoring unknown time zone '{raw}': {err}");
                None
            }
        }
    }

    pub fn total_weeks(&self) -> u32 {
        self.total_weeks.max(1)
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserPreferences>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Settings at {} could not be parsed ({err}); using defaults",
                    path.display()
                );
                UserPreferences::default()
            })
        } else {
            UserPreferences::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn preferences(&self) -> UserPreferences {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Applies `transform` to the current preferences and persists the result.
    pub fn update<F>(&self, transform: F) -> Result<UserPreferences>
    where
        F: FnOnce(&mut UserPreferences),
    {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut updated = guard.clone();
        transform(&mut updated);
        if updated
            .term_start_date_iso
            .as_deref()
            .is_some_and(|raw| raw.trim().is_empty())
        {
            updated.term_start_date_iso = None;
        }
        self.persist(&updated)?;
        *guard = updated.clone();
        Ok(updated)
    }

    pub fn replace_all(&self, preferences: UserPreferences) -> Result<()> {
        self.update(|current| *current = preferences).map(|_| ())
    }

    fn persist(&self, data: &UserPreferences) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)?;
        let data: UserPreferences = serde_json::from_str(&contents)?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = data;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preferences() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.reminder_lead_minutes, 10);
        assert!(!prefs.dnd_enabled);
        assert_eq!(prefs.dnd_skip_break_threshold_minutes, 15);
        assert_eq!(prefs.total_weeks, 20);
        assert_eq!(prefs.lookahead_days, 14);
        assert!(prefs.term_start_date().is_none());
        assert!(prefs.zone().is_none());
    }

    #[test]
    fn test_term_start_date_is_lenient() {
        let mut prefs = UserPreferences::default();
        prefs.term_start_date_iso = Some("2024-09-02".into());
        assert_eq!(
            prefs.term_start_date(),
            NaiveDate::from_ymd_opt(2024, 9, 2)
        );

        prefs.term_start_date_iso = Some("next monday".into());
        assert!(prefs.term_start_date().is_none());

        prefs.term_start_date_iso = Some("  ".into());
        assert!(prefs.term_start_date().is_none());
    }

    #[test]
    fn test_zone_parsing() {
        let mut prefs = UserPreferences::default();
        prefs.time_zone = Some("Asia/Tokyo".into());
        assert_eq!(prefs.zone(), Some(chrono_tz::Asia::Tokyo));

        prefs.time_zone = Some("Mars/Olympus".into());
        assert!(prefs.zone().is_none());
    }

    #[test]
    fn test_total_weeks_floor() {
        let mut prefs = UserPreferences::default();
        prefs.total_weeks = 0;
        assert_eq!(prefs.total_weeks(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let prefs: UserPreferences =
            serde_json::from_str(r#"{"dndEnabled":true,"totalWeeks":16}"#).expect("parse");
        assert!(prefs.dnd_enabled);
        assert_eq!(prefs.total_weeks, 16);
        assert_eq!(prefs.reminder_lead_minutes, 10);
        assert_eq!(prefs.timetable_name, "My Timetable");
    }

    #[test]
    fn test_store_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("store");
        assert_eq!(store.preferences(), UserPreferences::default());

        store
            .update(|prefs| {
                prefs.dnd_enabled = true;
                prefs.term_start_date_iso = Some("".into());
            })
            .expect("update");

        let reopened = SettingsStore::new(path).expect("reopen");
        let prefs = reopened.preferences();
        assert!(prefs.dnd_enabled);
        assert!(prefs.term_start_date_iso.is_none());
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").expect("write");

        let store = SettingsStore::new(path).expect("store");
        assert_eq!(store.preferences(), UserPreferences::default());
    }
}
