//! Date handling: free-text parsing and calendar conversion.
//!
//! - [`parser`] - date expression → [`DateRange`](crate::models::DateRange)
//! - [`calendar`] - Gregorian ⇄ Hijri year ranges
//! - [`solar`] - Solar Hijri day arithmetic and year ranges

pub mod calendar;
pub mod parser;
pub mod solar;

pub use calendar::{from_hijri, to_hijri};
pub use parser::{normalize_digits, Calendar, DateParser, ParsedDate, RangePolicy};
pub use solar::{gregorian_to_solar_hijri, solar_hijri_to_gregorian, SolarHijriDate};
