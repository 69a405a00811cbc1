//! Validation for user-entered courses and periods.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};

use super::{
    minutes_to_time_text, Course, CourseTime, PeriodDefinition, MAX_WEEK_NUMBER, MINUTES_PER_DAY,
};

pub fn validate_color(color: &str) -> Result<()> {
    let Some(hex_part) = color.strip_prefix('#') else {
        bail!("Invalid color format. Must be hex (#RRGGBB)");
    };

    if hex_part.len() != 6 && hex_part.len() != 8 {
        bail!("Invalid color format. Must be hex (#RRGGBB or #RRGGBBAA)");
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("Invalid color format. Must be hex (#RRGGBB)");
    }

    Ok(())
}

pub fn validate_course_time(time: &CourseTime) -> Result<()> {
    if !(1..=7).contains(&time.day_of_week) {
        bail!(
            "Invalid day of week {}. Must be 1 (Monday) to 7 (Sunday)",
            time.day_of_week
        );
    }
    if time.start_period == 0 || time.end_period == 0 {
        bail!("Period sequences start at 1");
    }
    if time.start_period > time.end_period {
        bail!(
            "Start period {} is after end period {}",
            time.start_period,
            time.end_period
        );
    }
    if let Some(week) = time.weeks.weeks().into_iter().find(|w| *w > MAX_WEEK_NUMBER) {
        bail!("Week {week} is past the last allowed week ({MAX_WEEK_NUMBER})");
    }
    Ok(())
}

/// A course must have a non-blank name and at least one usable time slot.
pub fn validate_course(course: &Course) -> Result<()> {
    if course.name.trim().is_empty() {
        bail!("Course name must not be blank");
    }
    if course.times.is_empty() {
        bail!("Course '{}' has no time slots", course.name.trim());
    }
    for time in &course.times {
        validate_course_time(time)?;
    }
    if let Some(color) = course.color_hex.as_deref() {
        validate_color(color)?;
    }
    Ok(())
}

/// Every slot whose periods are both defined must end after it starts on
/// the clock. Slots pointing at missing periods are left alone.
pub fn validate_course_against_periods(course: &Course, periods: &[PeriodDefinition]) -> Result<()> {
    let by_sequence: HashMap<u32, &PeriodDefinition> =
        periods.iter().map(|p| (p.sequence, p)).collect();

    for time in &course.times {
        let (Some(start), Some(end)) = (
            by_sequence.get(&time.start_period),
            by_sequence.get(&time.end_period),
        ) else {
            continue;
        };
        if end.end_minutes <= start.start_minutes {
            bail!(
                "Course '{}': period {} ends at {} before period {} starts at {}",
                course.name.trim(),
                end.sequence,
                minutes_to_time_text(end.end_minutes),
                start.sequence,
                minutes_to_time_text(start.start_minutes)
            );
        }
    }
    Ok(())
}

pub fn validate_period(period: &PeriodDefinition) -> Result<()> {
    if period.sequence == 0 {
        bail!("Period sequence must be positive");
    }
    if period.start_minutes >= MINUTES_PER_DAY {
        bail!(
            "Period {} starts at minute {}, past the end of the day",
            period.sequence,
            period.start_minutes
        );
    }
    if period.end_minutes <= period.start_minutes || period.end_minutes > MINUTES_PER_DAY {
        bail!(
            "Period {} must end after it starts and no later than 24:00",
            period.sequence
        );
    }
    Ok(())
}

/// Validates every period and rejects duplicate sequences.
pub fn validate_period_table(periods: &[PeriodDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for period in periods {
        validate_period(period)?;
        if !seen.insert(period.sequence) {
            bail!("Duplicate period sequence {}", period.sequence);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_course() -> Course {
        Course::new("Chemistry").with_time(CourseTime::new(3, 1, 2))
    }

    #[test]
    fn test_validate_color() {
        assert!(validate_color("#FFBB86").is_ok());
        assert!(validate_color("#FFBB86FC").is_ok());
        assert!(validate_color("FFBB86").is_err());
        assert!(validate_color("#FFB").is_err());
        assert!(validate_color("#GGGGGG").is_err());
    }

    #[test]
    fn test_validate_course() {
        assert!(validate_course(&valid_course()).is_ok());

        let mut blank = valid_course();
        blank.name = "   ".into();
        assert!(validate_course(&blank).is_err());

        let no_slots = Course::new("Chemistry");
        assert!(validate_course(&no_slots).is_err());

        let bad_day = Course::new("Chemistry").with_time(CourseTime::new(8, 1, 1));
        assert!(validate_course(&bad_day).is_err());

        let reversed = Course::new("Chemistry").with_time(CourseTime::new(1, 3, 2));
        assert!(validate_course(&reversed).is_err());

        let mut bad_color = valid_course();
        bad_color.color_hex = Some("red".into());
        assert!(validate_course(&bad_color).is_err());
    }

    #[test]
    fn test_week_numbers_are_capped() {
        let in_range = Course::new("Chemistry").with_time(CourseTime::new(1, 1, 1).in_weeks(vec![1, 60]));
        assert!(validate_course(&in_range).is_ok());

        let too_far = Course::new("Chemistry").with_time(CourseTime::new(1, 1, 1).in_weeks(vec![61]));
        assert!(validate_course(&too_far).is_err());
    }

    #[test]
    fn test_slot_must_end_after_it_starts() {
        let periods = vec![
            PeriodDefinition::new(1, 600, 645),
            PeriodDefinition::new(2, 480, 525),
        ];
        let backwards = Course::new("Chemistry").with_time(CourseTime::new(1, 1, 2));
        assert!(validate_course(&backwards).is_ok());
        assert!(validate_course_against_periods(&backwards, &periods).is_err());

        let forwards = Course::new("Chemistry").with_time(CourseTime::new(1, 2, 2));
        assert!(validate_course_against_periods(&forwards, &periods).is_ok());

        // Missing periods are skipped at expansion time, not rejected here
        let dangling = Course::new("Chemistry").with_time(CourseTime::new(1, 1, 9));
        assert!(validate_course_against_periods(&dangling, &periods).is_ok());
    }

    #[test]
    fn test_validate_period_bounds() {
        assert!(validate_period(&PeriodDefinition::new(1, 480, 525)).is_ok());
        assert!(validate_period(&PeriodDefinition::new(1, 1380, 1440)).is_ok());
        assert!(validate_period(&PeriodDefinition::new(0, 480, 525)).is_err());
        assert!(validate_period(&PeriodDefinition::new(1, 525, 525)).is_err());
        assert!(validate_period(&PeriodDefinition::new(1, 1400, 1441)).is_err());
        assert!(validate_period(&PeriodDefinition::new(1, 1440, 1441)).is_err());
    }

    #[test]
    fn test_validate_period_table_rejects_duplicates() {
        let table = vec![
            PeriodDefinition::new(1, 480, 525),
            PeriodDefinition::new(1, 530, 575),
        ];
        assert!(validate_period_table(&table).is_err());

        // Non-contiguous sequences are fine
        let sparse = vec![
            PeriodDefinition::new(1, 480, 525),
            PeriodDefinition::new(5, 530, 575),
        ];
        assert!(validate_period_table(&sparse).is_ok());
    }
}
