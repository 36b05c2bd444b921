//! Solar Hijri (Persian) calendar arithmetic.
//!
//! Day-level conversion through a day count from the epoch, 1 Farvardin 1 SH =
//! 21 March 622 (proleptic Gregorian). Leap years follow the 33-year arithmetic
//! cycle: year `y` is leap when `(8y + 29) mod 33 < 8`.

use chrono::{Datelike, Days, NaiveDate};
use std::fmt;

use crate::models::DateRange;

/// A day in the Solar Hijri calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SolarHijriDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

fn epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(622, 3, 21)
}

/// Leap years among years `1..=n`.
fn leap_years_through(n: i64) -> i64 {
    (8 * n + 29).div_euclid(33)
}

/// Days from the epoch to 1 Farvardin of `year`.
fn days_before_year(year: i32) -> i64 {
    let prior = i64::from(year) - 1;
    365 * prior + leap_years_through(prior)
}

pub fn is_leap_year(year: i32) -> bool {
    (8 * i64::from(year) + 29).rem_euclid(33) < 8
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    match month {
        1..=6 => Some(31),
        7..=11 => Some(30),
        12 if is_leap_year(year) => Some(30),
        12 => Some(29),
        _ => None,
    }
}

impl SolarHijriDate {
    /// A validated date; `None` for out-of-range months, days, or years before 1 SH.
    pub fn new(year: i32, month: u32, day: u32) -> Option<Self> {
        if year < 1 || day == 0 || day > days_in_month(year, month)? {
            return None;
        }
        Some(Self { year, month, day })
    }

    /// The last day of a year (29 or 30 Esfand).
    pub fn last_of_year(year: i32) -> Option<Self> {
        Self::new(year, 12, days_in_month(year, 12)?)
    }

    fn day_of_year(&self) -> i64 {
        let month = i64::from(self.month);
        let day = i64::from(self.day);
        if month <= 6 {
            (month - 1) * 31 + day
        } else {
            186 + (month - 7) * 30 + day
        }
    }

    pub fn to_gregorian(&self) -> Option<NaiveDate> {
        let offset = days_before_year(self.year) + self.day_of_year() - 1;
        epoch()?.checked_add_days(Days::new(u64::try_from(offset).ok()?))
    }

    /// Convert a Gregorian date; dates before the epoch yield `None`.
    pub fn from_gregorian(date: NaiveDate) -> Option<Self> {
        let elapsed = date.signed_duration_since(epoch()?).num_days();
        if elapsed < 0 {
            return None;
        }

        // 12053 / 33 is the mean year length of the cycle.
        let mut year = i32::try_from(elapsed * 33 / 12053).ok()? + 1;
        while days_before_year(year + 1) <= elapsed {
            year += 1;
        }
        while days_before_year(year) > elapsed {
            year -= 1;
        }

        let doy = elapsed - days_before_year(year);
        let (month, day) = if doy < 186 {
            (doy / 31 + 1, doy % 31 + 1)
        } else {
            let rest = doy - 186;
            (rest / 30 + 7, rest % 30 + 1)
        };
        Self::new(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)
    }
}

impl fmt::Display for SolarHijriDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}-{:02} SH", self.year, self.month, self.day)
    }
}

/// Gregorian years overlapped by a Solar Hijri year range.
///
/// A Solar Hijri year starts in March, so `[a, b]` spans `[a + 621, b + 622]`.
pub fn solar_hijri_to_gregorian(range: DateRange) -> Option<DateRange> {
    let first = SolarHijriDate::new(range.start, 1, 1)?.to_gregorian()?;
    let last = SolarHijriDate::last_of_year(range.end)?.to_gregorian()?;
    Some(DateRange::ordered(first.year(), last.year()))
}

/// Solar Hijri years overlapped by a Gregorian year range.
pub fn gregorian_to_solar_hijri(range: DateRange) -> Option<DateRange> {
    let first = SolarHijriDate::from_gregorian(NaiveDate::from_ymd_opt(range.start, 1, 1)?)?;
    let last = SolarHijriDate::from_gregorian(NaiveDate::from_ymd_opt(range.end, 12, 31)?)?;
    Some(DateRange::ordered(first.year, last.year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_nowruz_dates() {
        let nowruz_1403 = SolarHijriDate::new(1403, 1, 1).unwrap();
        assert_eq!(nowruz_1403.to_gregorian(), Some(ymd(2024, 3, 20)));
        assert_eq!(SolarHijriDate::new(1400, 1, 1).unwrap().to_gregorian(), Some(ymd(2021, 3, 21)));
        assert_eq!(SolarHijriDate::new(1399, 1, 1).unwrap().to_gregorian(), Some(ymd(2020, 3, 20)));
    }

    #[test]
    fn test_leap_years() {
        assert!(is_leap_year(1399));
        assert!(!is_leap_year(1400));
        assert!(is_leap_year(1403));
        assert_eq!(days_in_month(1399, 12), Some(30));
        assert_eq!(days_in_month(1400, 12), Some(29));
        assert_eq!(days_in_month(1400, 13), None);
    }

    #[test]
    fn test_last_day_of_leap_year() {
        let last = SolarHijriDate::last_of_year(1399).unwrap();
        assert_eq!(last.day, 30);
        assert_eq!(last.to_gregorian(), Some(ymd(2021, 3, 20)));
    }

    #[test]
    fn test_from_gregorian() {
        assert_eq!(
            SolarHijriDate::from_gregorian(ymd(2024, 3, 20)),
            SolarHijriDate::new(1403, 1, 1)
        );
        assert_eq!(
            SolarHijriDate::from_gregorian(ymd(2024, 3, 19)),
            SolarHijriDate::new(1402, 12, 29)
        );
        assert_eq!(SolarHijriDate::from_gregorian(ymd(622, 3, 20)), None);
    }

    #[test]
    fn test_invalid_dates() {
        assert_eq!(SolarHijriDate::new(1400, 12, 30), None);
        assert_eq!(SolarHijriDate::new(1400, 7, 31), None);
        assert_eq!(SolarHijriDate::new(0, 1, 1), None);
    }

    #[test]
    fn test_range_conversions() {
        assert_eq!(
            solar_hijri_to_gregorian(DateRange { start: 1300, end: 1310 }),
            Some(DateRange { start: 1921, end: 1932 })
        );
        assert_eq!(
            gregorian_to_solar_hijri(DateRange { start: 1979, end: 1979 }),
            Some(DateRange { start: 1357, end: 1358 })
        );
        assert_eq!(gregorian_to_solar_hijri(DateRange { start: -100, end: 10 }), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(SolarHijriDate::new(1403, 1, 1).unwrap().to_string(), "1403-01-01 SH");
    }

    proptest! {
        #[test]
        fn prop_day_round_trip(days in 0u64..800_000) {
            let date = epoch().unwrap().checked_add_days(Days::new(days)).unwrap();
            let solar = SolarHijriDate::from_gregorian(date).unwrap();
            prop_assert_eq!(solar.to_gregorian(), Some(date));
        }
    }
}
