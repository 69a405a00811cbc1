//! Period definitions: the numbered clock-time slots every course time refers to.

use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: u16 = 24 * 60;

const DEFAULT_PERIOD_COUNT: u32 = 8;
const DEFAULT_DAY_START_MINUTES: u16 = 8 * 60;
const DEFAULT_PERIOD_LENGTH_MINUTES: u16 = 45;

/// A user-defined class period ("Period 3: 10:00-10:45").
///
/// Course times reference periods by `sequence`, never by `id`, so the
/// sequence is the join key the planner uses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodDefinition {
    #[serde(default)]
    pub id: i64,
    pub sequence: u32,
    /// Minutes since midnight, 0..=1439.
    pub start_minutes: u16,
    /// Minutes since midnight, `start_minutes < end_minutes <= 1440`.
    pub end_minutes: u16,
    #[serde(default)]
    pub label: Option<String>,
}

impl PeriodDefinition {
    pub fn new(sequence: u32, start_minutes: u16, end_minutes: u16) -> Self {
        Self {
            id: 0,
            sequence,
            start_minutes,
            end_minutes,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn duration_minutes(&self) -> u16 {
        self.end_minutes.saturating_sub(self.start_minutes)
    }

    /// "08:00-08:45"
    pub fn time_range_text(&self) -> String {
        format!(
            "{}-{}",
            minutes_to_time_text(self.start_minutes),
            minutes_to_time_text(self.end_minutes)
        )
    }

    pub fn display_label(&self) -> String {
        match self.label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => format!("Period {}", self.sequence),
        }
    }
}

/// Formats minutes since midnight as `HH:MM`.
pub fn minutes_to_time_text(minutes: u16) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// The table seeded on first launch: eight back-to-back 45 minute periods from 08:00.
pub fn default_periods() -> Vec<PeriodDefinition> {
    (1..=DEFAULT_PERIOD_COUNT)
        .map(|index| {
            let offset = (index as u16 - 1) * DEFAULT_PERIOD_LENGTH_MINUTES;
            let start = DEFAULT_DAY_START_MINUTES + offset;
            PeriodDefinition::new(index, start, start + DEFAULT_PERIOD_LENGTH_MINUTES)
                .with_label(format!("Period {index}"))
        })
        .collect()
}
