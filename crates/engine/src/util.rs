//! Internal helpers for validation and period arithmetic.
//!
//! These utilities are **not** part of the public API.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

use crate::{EngineError, MoneyCents, ResultEngine};

/// Whether `[a_start, a_end]` and `[b_start, b_end]` intersect. A missing end
/// is unbounded.
pub(crate) fn ranges_overlap(
    a_start: DateTime<Utc>,
    a_end: Option<DateTime<Utc>>,
    b_start: DateTime<Utc>,
    b_end: Option<DateTime<Utc>>,
) -> bool {
    let a_before_b_ends = b_end.is_none_or(|end| a_start <= end);
    let b_before_a_ends = a_end.is_none_or(|end| b_start <= end);
    a_before_b_ends && b_before_a_ends
}

/// Whether a record starting at `start` and ending at `end` has either date
/// inside `[window_start, window_end]` (bounds inclusive).
///
/// A record spanning the whole window without either date inside it does not
/// touch the window.
pub(crate) fn touches_window(
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    let inside = |at: DateTime<Utc>| at >= window_start && at <= window_end;
    inside(start) || end.is_some_and(inside)
}

pub(crate) fn ensure_window(start: DateTime<Utc>, end: DateTime<Utc>) -> ResultEngine<()> {
    if end < start {
        return Err(EngineError::Validation(
            "period end must not precede its start".to_string(),
        ));
    }
    Ok(())
}

pub(crate) fn ensure_positive(amount: MoneyCents, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::Validation(format!("{label} must be > 0")));
    }
    Ok(())
}

pub(crate) fn ensure_not_negative(amount: MoneyCents, label: &str) -> ResultEngine<()> {
    if amount.is_negative() {
        return Err(EngineError::Validation(format!("{label} must be >= 0")));
    }
    Ok(())
}

/// First instant of `year` and first instant of the following year.
pub(crate) fn year_bounds(year: i32) -> ResultEngine<(DateTime<Utc>, DateTime<Utc>)> {
    let start = first_instant(year, 1)?;
    let end = first_instant(year + 1, 1)?;
    Ok((start, end))
}

fn first_instant(year: i32, month: u32) -> ResultEngine<DateTime<Utc>> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| EngineError::Validation(format!("year out of range: {year}")))
}

pub(crate) fn in_year(at: DateTime<Utc>, year: i32) -> bool {
    at.year() == year
}

/// Zero-based month index of `at` when it falls in `year`.
pub(crate) fn month_index(at: DateTime<Utc>, year: i32) -> Option<usize> {
    (at.year() == year).then(|| at.month0() as usize)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn open_ended_ranges_overlap_everything_after_start() {
        assert!(ranges_overlap(day(1), None, day(20), Some(day(25))));
        assert!(!ranges_overlap(day(10), None, day(1), Some(day(5))));
        assert!(ranges_overlap(day(1), Some(day(10)), day(10), None));
    }

    #[test]
    fn closed_ranges_touching_at_a_bound_overlap() {
        assert!(ranges_overlap(day(1), Some(day(5)), day(5), Some(day(9))));
        assert!(!ranges_overlap(day(1), Some(day(4)), day(5), Some(day(9))));
    }

    #[test]
    fn window_inclusion_is_either_bound() {
        assert!(touches_window(day(1), Some(day(10)), day(10), day(20)));
        assert!(touches_window(day(15), None, day(10), day(20)));
        assert!(!touches_window(day(1), Some(day(30)), day(10), day(20)));
        assert!(!touches_window(day(1), None, day(10), day(20)));
    }

    #[test]
    fn month_index_ignores_other_years() {
        assert_eq!(month_index(day(2), 2025), Some(2));
        assert_eq!(month_index(day(2), 2024), None);
    }
}
