//! Academic week numbering.

use chrono::NaiveDate;

use crate::models::WeekRestriction;

/// 1-based academic week of `date`, where `[term_start, term_start + 6]` is week 1.
///
/// `None` when no term is configured or when `date` precedes the term start.
/// Callers must read `None` as "unknown", which never restricts a slot.
pub fn week_number(term_start: Option<NaiveDate>, date: NaiveDate) -> Option<u32> {
    let start = term_start?;
    let days = (date - start).num_days();
    if days < 0 {
        return None;
    }
    u32::try_from(days / 7 + 1).ok()
}

/// Whether `date` lies inside the term. Always true without a term start.
pub fn week_within_term(term_start: Option<NaiveDate>, total_weeks: u32, date: NaiveDate) -> bool {
    if term_start.is_none() {
        return true;
    }
    match week_number(term_start, date) {
        Some(week) => (1..=total_weeks.max(1)).contains(&week),
        None => false,
    }
}

/// A slot is active when it runs every week, when the week is unknown, or
/// when the week is one of its listed weeks.
pub fn is_slot_active(weeks: &WeekRestriction, week: Option<u32>) -> bool {
    match (weeks, week) {
        (WeekRestriction::Every, _) => true,
        (WeekRestriction::Only(_), None) => true,
        (WeekRestriction::Only(set), Some(week)) => set.contains(&week),
    }
}
