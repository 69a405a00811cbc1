use std::convert::TryFrom;

use anyhow::{anyhow, Result};

use crate::models::WeekRestriction;

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn to_u16(value: i64, field: &str) -> Result<u16> {
    u16::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

pub fn to_u8(value: i64, field: &str) -> Result<u8> {
    u8::try_from(value).map_err(|_| anyhow!("{field} out of range: {value}"))
}

/// Weeks column: empty string means every week.
pub fn parse_weeks(value: Option<String>) -> WeekRestriction {
    WeekRestriction::from_storage(value.as_deref())
}

/// Trimmed, with blank strings stored as NULL.
pub fn optional_text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_checks() {
        assert_eq!(to_u32(5, "sequence").unwrap(), 5);
        assert!(to_u32(-1, "sequence").is_err());
        assert!(to_u16(70_000, "start_minutes").is_err());
        assert!(to_u8(256, "day_of_week").is_err());
    }

    #[test]
    fn test_optional_text() {
        assert_eq!(optional_text(&Some("  Room 1 ".into())), Some("Room 1".into()));
        assert_eq!(optional_text(&Some("   ".into())), None);
        assert_eq!(optional_text(&None), None);
    }
}
