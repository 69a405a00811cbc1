use chrono::NaiveDate;

use crate::planner::dnd::DndPolicy;
use crate::settings::{UserPreferences, DEFAULT_LOOKAHEAD_DAYS};

/// Planner inputs taken from the user's preferences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub term_start: Option<NaiveDate>,
    /// Floored at 1.
    pub total_weeks: u32,
    /// Days after today to expand; today itself is always included.
    pub days_ahead: u32,
    /// Negative disables reminders.
    pub reminder_lead_minutes: i64,
    pub dnd_enabled: bool,
    pub dnd: DndPolicy,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::from(&UserPreferences::default())
    }
}

impl From<&UserPreferences> for PlannerConfig {
    fn from(prefs: &UserPreferences) -> Self {
        Self {
            term_start: prefs.term_start_date(),
            total_weeks: prefs.total_weeks(),
            days_ahead: if prefs.lookahead_days == 0 {
                DEFAULT_LOOKAHEAD_DAYS
            } else {
                prefs.lookahead_days
            },
            reminder_lead_minutes: i64::from(prefs.reminder_lead_minutes),
            dnd_enabled: prefs.dnd_enabled,
            dnd: DndPolicy::new(
                i64::from(prefs.dnd_lead_minutes),
                i64::from(prefs.dnd_release_minutes),
                i64::from(prefs.dnd_skip_break_threshold_minutes),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_preferences() {
        let mut prefs = UserPreferences::default();
        prefs.term_start_date_iso = Some("2024-09-02".into());
        prefs.total_weeks = 0;
        prefs.dnd_lead_minutes = -3;
        prefs.lookahead_days = 0;

        let config = PlannerConfig::from(&prefs);
        assert_eq!(config.term_start, NaiveDate::from_ymd_opt(2024, 9, 2));
        assert_eq!(config.total_weeks, 1);
        assert_eq!(config.days_ahead, DEFAULT_LOOKAHEAD_DAYS);
        assert_eq!(config.dnd.lead_minutes, 0);
        assert_eq!(config.dnd.skip_break_threshold_minutes, 15);
        assert_eq!(config.reminder_lead_minutes, 10);
    }
}
