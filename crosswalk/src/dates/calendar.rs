//! Year-level Gregorian ⇄ Hijri conversion.
//!
//! Uses the arithmetic approximation `ceil((g - 622) * 33 / 32)`. It is exact
//! to within one year, which is all a year-granularity facet needs.

use crate::models::DateRange;

/// Gregorian year of the Hijra.
pub const HIJRA_YEAR: i32 = 622;

/// Convert a Gregorian range into a Hijri range.
///
/// Years before the Hijra have no Hijri counterpart: a range ending before 622
/// yields `None`, and a range straddling it starts at 1 AH. Years too large to
/// convert also yield `None`.
pub fn to_hijri(range: DateRange) -> Option<DateRange> {
    if range.end < HIJRA_YEAR {
        return None;
    }
    Some(DateRange::ordered(
        gregorian_year_to_hijri(range.start.max(HIJRA_YEAR))?,
        gregorian_year_to_hijri(range.end)?,
    ))
}

/// Convert a Hijri range back into a Gregorian range.
///
/// Years before 1 AH yield `None`.
pub fn from_hijri(range: DateRange) -> Option<DateRange> {
    if range.start < 1 {
        return None;
    }
    Some(DateRange::ordered(
        hijri_year_to_gregorian(range.start)?,
        hijri_year_to_gregorian(range.end)?,
    ))
}

/// `None` when the result does not fit an `i32` year.
pub fn gregorian_year_to_hijri(year: i32) -> Option<i32> {
    let scaled = (i64::from(year) - i64::from(HIJRA_YEAR)) * 33;
    let quotient = scaled.div_euclid(32);
    let hijri = if scaled.rem_euclid(32) == 0 {
        quotient
    } else {
        quotient + 1
    };
    i32::try_from(hijri).ok()
}

/// `None` when the result does not fit an `i32` year.
pub fn hijri_year_to_gregorian(year: i32) -> Option<i32> {
    i32::try_from((i64::from(year) * 32).div_euclid(33) + i64::from(HIJRA_YEAR)).ok()
}
