//! Course data models.
//!
//! A course owns its weekly time slots. Slots point at periods through the
//! period `sequence`, and may be restricted to a subset of academic weeks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Highest academic week a slot may be restricted to.
pub const MAX_WEEK_NUMBER: u32 = 60;

/// Which academic weeks a time slot runs in.
///
/// `Every` and an unknown week number (see `planner::term::week_number`) are
/// distinct states: `Every` is a property of the slot, an unknown week is a
/// property of the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub enum WeekRestriction {
    #[default]
    Every,
    Only(BTreeSet<u32>),
}

impl WeekRestriction {
    /// Builds a restriction from raw week numbers. Zeros are dropped; an
    /// empty result means "every week".
    pub fn from_weeks<I: IntoIterator<Item = u32>>(weeks: I) -> Self {
        let set: BTreeSet<u32> = weeks.into_iter().filter(|week| *week > 0).collect();
        if set.is_empty() {
            Self::Every
        } else {
            Self::Only(set)
        }
    }

    pub fn is_every_week(&self) -> bool {
        matches!(self, Self::Every)
    }

    /// Sorted, de-duplicated week numbers; empty for `Every`.
    pub fn weeks(&self) -> Vec<u32> {
        match self {
            Self::Every => Vec::new(),
            Self::Only(set) => set.iter().copied().collect(),
        }
    }

    pub fn contains(&self, week: u32) -> bool {
        match self {
            Self::Every => true,
            Self::Only(set) => set.contains(&week),
        }
    }

    /// Comma-joined storage form ("" for every week).
    pub fn to_storage(&self) -> String {
        self.weeks()
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Lenient parse of the storage form; unparseable entries are skipped.
    pub fn from_storage(raw: Option<&str>) -> Self {
        match raw {
            Some(text) => Self::from_weeks(
                text.split(',')
                    .filter_map(|part| part.trim().parse::<u32>().ok()),
            ),
            None => Self::Every,
        }
    }
}

impl From<Vec<u32>> for WeekRestriction {
    fn from(weeks: Vec<u32>) -> Self {
        Self::from_weeks(weeks)
    }
}

impl From<WeekRestriction> for Vec<u32> {
    fn from(restriction: WeekRestriction) -> Self {
        restriction.weeks()
    }
}

/// One recurring weekly slot of a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseTime {
    #[serde(default)]
    pub id: i64,
    /// ISO day of week, 1 = Monday .. 7 = Sunday.
    pub day_of_week: u8,
    pub start_period: u32,
    pub end_period: u32,
    #[serde(default)]
    pub weeks: WeekRestriction,
}

impl CourseTime {
    pub fn new(day_of_week: u8, start_period: u32, end_period: u32) -> Self {
        Self {
            id: 0,
            day_of_week,
            start_period,
            end_period,
            weeks: WeekRestriction::Every,
        }
    }

    pub fn in_weeks<I: IntoIterator<Item = u32>>(mut self, weeks: I) -> Self {
        self.weeks = WeekRestriction::from_weeks(weeks);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub teacher: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub times: Vec<CourseTime>,
}

impl Course {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            teacher: None,
            location: None,
            notes: None,
            color_hex: None,
            times: Vec::new(),
        }
    }

    pub fn with_time(mut self, time: CourseTime) -> Self {
        self.times.push(time);
        self
    }

    /// Text shown under the course name in reminders: "teacher | location",
    /// skipping blank parts.
    pub fn reminder_subtitle(&self) -> String {
        [self.teacher.as_deref(), self.location.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" | ")
    }

    /// Trims text fields and turns blank optional fields into `None`.
    pub fn normalized(mut self) -> Self {
        fn blank_to_none(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        self.name = self.name.trim().to_string();
        self.teacher = blank_to_none(self.teacher);
        self.location = blank_to_none(self.location);
        self.notes = blank_to_none(self.notes);
        self.color_hex = blank_to_none(self.color_hex);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_week_restriction_normalizes() {
        let weeks = WeekRestriction::from_weeks(vec![5, 1, 0, 5, 3]);
        assert_eq!(weeks.weeks(), vec![1, 3, 5]);
        assert!(!weeks.is_every_week());
        assert!(weeks.contains(3));
        assert!(!weeks.contains(2));

        assert_eq!(WeekRestriction::from_weeks(vec![0]), WeekRestriction::Every);
        assert!(WeekRestriction::Every.contains(42));
    }

    #[test]
    fn test_week_restriction_storage_form() {
        let weeks = WeekRestriction::from_weeks(vec![10, 2]);
        assert_eq!(weeks.to_storage(), "2,10");
        assert_eq!(WeekRestriction::from_storage(Some("2, 10,x,,0")), weeks);
        assert_eq!(WeekRestriction::from_storage(Some("")), WeekRestriction::Every);
        assert_eq!(WeekRestriction::from_storage(None), WeekRestriction::Every);
        assert_eq!(WeekRestriction::Every.to_storage(), "");
    }

    #[test]
    fn test_week_restriction_json_is_plain_list() {
        let time = CourseTime::new(1, 1, 2).in_weeks(vec![3, 1]);
        let json = serde_json::to_value(&time).expect("serialize");
        assert_eq!(json["weeks"], serde_json::json!([1, 3]));

        let parsed: CourseTime =
            serde_json::from_str(r#"{"dayOfWeek":2,"startPeriod":1,"endPeriod":1}"#)
                .expect("deserialize");
        assert_eq!(parsed.weeks, WeekRestriction::Every);
    }

    #[test]
    fn test_reminder_subtitle() {
        let mut course = Course::new("Linear Algebra");
        assert_eq!(course.reminder_subtitle(), "");

        course.teacher = Some("Dr. Sato".into());
        assert_eq!(course.reminder_subtitle(), "Dr. Sato");

        course.location = Some("Room 101".into());
        assert_eq!(course.reminder_subtitle(), "Dr. Sato | Room 101");

        course.teacher = Some("   ".into());
        assert_eq!(course.reminder_subtitle(), "Room 101");
    }

    #[test]
    fn test_normalized_trims_and_clears_blanks() {
        let mut course = Course::new("  Physics ");
        course.teacher = Some(" ".into());
        course.notes = Some(" bring lab coat ".into());
        let course = course.normalized();
        assert_eq!(course.name, "Physics");
        assert_eq!(course.teacher, None);
        assert_eq!(course.notes.as_deref(), Some("bring lab coat"));
    }
}
