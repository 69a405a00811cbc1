pub mod course;
pub mod period;
pub mod validation;

pub use course::{Course, CourseTime, WeekRestriction, MAX_WEEK_NUMBER};
pub use period::{default_periods, minutes_to_time_text, PeriodDefinition, MINUTES_PER_DAY};
