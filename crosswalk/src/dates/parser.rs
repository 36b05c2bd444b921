//! Free-text date expression parser.
//!
//! Turns the date strings found in provider metadata ("1301-1305", "c. 1850",
//! "19th century", "500-480 BC", "1305 هـ", "١٣٠٥") into a [`DateRange`].
//!
//! Matchers are tried in order and the first one that fits wins:
//!
//! 1. explicit begin/end inputs ([`DateParser::parse_pair`])
//! 2. a two-sided range, after folding `-`, `–`, `—`, `/`, `to`, `until`, ... into one separator
//! 3. a single year
//! 4. a century phrase (`19th century` → 1800-1899) or a plural (`1850s`, `1800s`)
//! 5. nothing else matches
//!
//! ISO dates and `YYYY-0M` year-months are cut down to their year before
//! matching, so `1901-05` is the single year 1901.
//!
//! A failed parse returns `None`; it never panics and never reports an error.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::calendar::{from_hijri, to_hijri};
use super::solar::solar_hijri_to_gregorian;
use crate::models::DateRange;

/// What to do with a range whose end precedes its start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangePolicy {
    /// Swap the bounds.
    #[default]
    Swap,
    /// Reject the expression.
    Strict,
}

/// The calendar a date expression is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Calendar {
    Gregorian,
    Hijri,
    SolarHijri,
}

/// A parsed expression, still in its own calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDate {
    pub range: DateRange,
    pub calendar: Calendar,
}

const BCE_MARKERS: &[&str] = &["bc", "bce", "قم"];
const CE_MARKERS: &[&str] = &["ad", "ce", "م", "ميلادي", "ميلادية"];
const AH_MARKERS: &[&str] = &["ah", "h", "هـ", "ه", "هجري", "هجرية", "hijri"];
const SH_MARKERS: &[&str] = &["sh", "hs", "ش", "هش", "هـش", "شمسی", "شمسي"];
const QUALIFIERS: &[&str] = &[
    "c", "ca", "circa", "approx", "approximately", "about", "around", "between", "from", "dated",
    "حوالي", "حوالى", "نحو", "بين", "من",
];
const SEPARATORS: &[&str] = &["-", "to", "until", "till", "through", "and", "إلى", "الى", "حتى", "و"];

static ISO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(\d{3,4})-\d{1,2}-\d{1,2}(?:t[0-9:.]+z?)?\b").expect("valid ISO date regex")
});
// A zero-padded two-digit suffix reads as a month, not as a range end:
// "1901-05" is May 1901, while "1301-5" and "1895-10" stay ranges.
static YEAR_MONTH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-0[1-9]\b").expect("valid year-month regex"));
static DMY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d{1,2}[/.-]\d{1,2}[/.-](\d{3,4})\b").expect("valid day-month-year regex")
});
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,4})$").expect("valid year regex"));
static PLURAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{2,4}) s$").expect("valid plural regex"));
static CENTURY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})(?: (?:st|nd|rd|th|e|er|eme|ème))? (?:century|centuries|cent|c)$")
        .expect("valid century regex")
});
static AR_CENTURY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:القرن|قرن) (\d{1,2})$").expect("valid Arabic century regex"));
static ORDINAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2}) (?:st|nd|rd|th)$").expect("valid ordinal regex"));

/// Date expression parser, configured with a reversed-range policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateParser {
    policy: RangePolicy,
}

impl DateParser {
    pub fn new(policy: RangePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RangePolicy {
        self.policy
    }

    /// Parse an expression into a Gregorian range.
    ///
    /// Hijri (`AH`) and Solar Hijri (`SH`) expressions are read in their own
    /// calendar and converted.
    pub fn parse(&self, text: &str) -> Option<DateRange> {
        let parsed = self.parse_as(text, Calendar::Gregorian)?;
        gregorian_range(parsed)
    }

    /// Parse an expression without converting it, reporting its calendar.
    pub fn parse_expression(&self, text: &str) -> Option<ParsedDate> {
        self.parse_as(text, Calendar::Gregorian)
    }

    /// Parse a Hijri-native expression into a Hijri range.
    ///
    /// Unmarked numbers are read as AH years; explicitly Gregorian or Solar
    /// Hijri expressions are converted.
    pub fn parse_hijri(&self, text: &str) -> Option<DateRange> {
        let parsed = self.parse_as(text, Calendar::Hijri)?;
        match parsed.calendar {
            Calendar::Hijri => Some(parsed.range),
            Calendar::Gregorian => to_hijri(parsed.range),
            Calendar::SolarHijri => solar_hijri_to_gregorian(parsed.range).and_then(to_hijri),
        }
    }

    /// Parse a Solar Hijri expression into a Gregorian range.
    pub fn parse_solar_hijri(&self, text: &str) -> Option<DateRange> {
        let parsed = self.parse_as(text, Calendar::SolarHijri)?;
        gregorian_range(parsed)
    }

    /// Combine separate begin and end inputs into one Gregorian range.
    ///
    /// With only one side present, that side alone is the range.
    pub fn parse_pair(&self, begin: Option<&str>, end: Option<&str>) -> Option<DateRange> {
        let begin = begin.and_then(|b| self.parse(b));
        let end = end.and_then(|e| self.parse(e));
        match (begin, end) {
            (Some(b), Some(e)) => self.apply_policy(b.start, e.end),
            (Some(only), None) | (None, Some(only)) => Some(only),
            (None, None) => None,
        }
    }

    /// Check a range taken as-is from source data against the reversed-range
    /// policy.
    pub fn check_range(&self, range: DateRange) -> Option<DateRange> {
        self.apply_policy(range.start, range.end)
    }

    /// Parse, treating unmarked years as belonging to `default_calendar`.
    pub fn parse_as(&self, text: &str, default_calendar: Calendar) -> Option<ParsedDate> {
        let tokens = tokenize(text);
        let parts = split_parts(tokens);
        match parts.as_slice() {
            [single] => {
                let bound = analyze(single)?;
                let calendar = bound.calendar.unwrap_or(default_calendar);
                let range = bound.resolve(bound.bce)?;
                finish(range, calendar)
            }
            [first, second] => {
                let mut left = analyze(first)?;
                let mut right = analyze(second)?;

                // "1305 AH / 1887 CE": two renderings of one date, keep the Gregorian one.
                if let (Some(a), Some(b)) = (left.calendar, right.calendar) {
                    if a != b {
                        let chosen = if b == Calendar::Gregorian { right } else { left };
                        let calendar = chosen.calendar.unwrap_or(default_calendar);
                        let range = chosen.resolve(chosen.bce)?;
                        return finish(range, calendar);
                    }
                }

                let calendar = left.calendar.or(right.calendar).unwrap_or(default_calendar);
                // A trailing era marker ("500-480 BC") covers both sides.
                let left_bce = left.bce || (right.bce && !left.explicit_ce);
                if left.kind == BoundKind::Ordinal && right.kind == BoundKind::Century {
                    left.kind = BoundKind::Century;
                }
                if left.kind == BoundKind::Year
                    && right.kind == BoundKind::Year
                    && !left_bce
                    && !right.bce
                    && right.digits < left.digits
                {
                    right.value = expand_abbreviated(left.value, right.value, right.digits);
                }

                let start = left.resolve(left_bce)?;
                let end = right.resolve(right.bce)?;
                let range = self.apply_policy(start.start, end.end)?;
                finish(range, calendar)
            }
            _ => None,
        }
    }

    fn apply_policy(&self, start: i32, end: i32) -> Option<DateRange> {
        if start <= end {
            return Some(DateRange { start, end });
        }
        match self.policy {
            RangePolicy::Swap => Some(DateRange::ordered(start, end)),
            RangePolicy::Strict => None,
        }
    }
}

fn finish(range: DateRange, calendar: Calendar) -> Option<ParsedDate> {
    // Era markers other than BCE/CE make no sense before year one.
    if calendar != Calendar::Gregorian && range.start < 1 {
        return None;
    }
    Some(ParsedDate { range, calendar })
}

fn gregorian_range(parsed: ParsedDate) -> Option<DateRange> {
    match parsed.calendar {
        Calendar::Gregorian => Some(parsed.range),
        Calendar::Hijri => from_hijri(parsed.range),
        Calendar::SolarHijri => solar_hijri_to_gregorian(parsed.range),
    }
}

// =============================================================================
// Tokenizer
// =============================================================================

/// Map Arabic-Indic and Extended Arabic-Indic (Persian) digits to ASCII.
pub fn normalize_digits(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            other => other,
        })
        .collect()
}

fn tokenize(text: &str) -> Vec<String> {
    let lowered = normalize_digits(text).to_lowercase();
    let reduced = ISO_DATE_RE.replace_all(&lowered, "$1");
    let reduced = YEAR_MONTH_RE.replace_all(&reduced, "$1");
    let reduced = DMY_RE.replace_all(&reduced, "$1");

    let mut spaced = String::with_capacity(reduced.len() + 8);
    let mut last: Option<char> = None;
    for ch in reduced.chars() {
        match ch {
            '.' => continue,
            ',' | '?' | '[' | ']' | '(' | ')' | '{' | '}' | ':' | ';' | '"' | '\'' => {
                spaced.push(' ');
                last = None;
            }
            '-' | '–' | '—' | '/' | '\u{2010}' | '\u{2012}' => {
                spaced.push_str(" - ");
                last = None;
            }
            c if c.is_whitespace() => {
                spaced.push(' ');
                last = None;
            }
            c => {
                if last.is_some_and(|l| l.is_ascii_digit() != c.is_ascii_digit()) {
                    spaced.push(' ');
                }
                spaced.push(c);
                last = Some(c);
            }
        }
    }

    let mut tokens: Vec<String> = Vec::new();
    for token in spaced.split_whitespace() {
        // "ق م" (before the Common Era) arrives as two tokens.
        if token == "م" && tokens.last().is_some_and(|t| t == "ق") {
            tokens.pop();
            tokens.push("قم".to_string());
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

#[derive(Debug, Default)]
struct Part {
    tokens: Vec<String>,
    negative: bool,
}

fn split_parts(tokens: Vec<String>) -> Vec<Part> {
    let mut parts = vec![Part::default()];
    for token in tokens {
        if SEPARATORS.contains(&token.as_str()) {
            let Some(current) = parts.last_mut() else {
                continue;
            };
            if current.tokens.is_empty() {
                // A dash with nothing before it is a minus sign.
                if token == "-" {
                    current.negative = true;
                }
            } else {
                parts.push(Part::default());
            }
        } else if let Some(current) = parts.last_mut() {
            current.tokens.push(token);
        }
    }
    parts.retain(|p| !p.tokens.is_empty());
    parts
}

// =============================================================================
// Bounds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundKind {
    Year,
    Decade,
    CenturyPlural,
    Century,
    Ordinal,
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    kind: BoundKind,
    value: i32,
    digits: usize,
    bce: bool,
    explicit_ce: bool,
    calendar: Option<Calendar>,
}

impl Bound {
    /// Resolve to a range of years.
    fn resolve(&self, bce: bool) -> Option<DateRange> {
        let (lo, hi) = match self.kind {
            BoundKind::Year => {
                if self.value == 0 {
                    return None;
                }
                (self.value, self.value)
            }
            BoundKind::Decade => (self.value, self.value + 9),
            BoundKind::CenturyPlural => (self.value, self.value + 99),
            BoundKind::Century => {
                if self.value == 0 {
                    return None;
                }
                if bce {
                    return Some(DateRange {
                        start: -(self.value * 100),
                        end: -((self.value - 1) * 100 + 1),
                    });
                }
                let c = self.value - 1;
                (c * 100, c * 100 + 99)
            }
            // A bare ordinal only means something next to a century phrase.
            BoundKind::Ordinal => return None,
        };
        if bce {
            Some(DateRange::ordered(-hi, -lo))
        } else {
            Some(DateRange { start: lo, end: hi })
        }
    }
}

fn analyze(part: &Part) -> Option<Bound> {
    let mut bce = part.negative;
    let mut explicit_ce = false;
    let mut calendar = None;
    let mut body: Vec<&str> = Vec::new();

    for (idx, token) in part.tokens.iter().enumerate() {
        let t = token.as_str();
        if BCE_MARKERS.contains(&t) {
            bce = true;
        } else if CE_MARKERS.contains(&t) {
            explicit_ce = true;
            calendar = Some(Calendar::Gregorian);
        } else if AH_MARKERS.contains(&t) {
            calendar = Some(Calendar::Hijri);
        } else if SH_MARKERS.contains(&t) {
            calendar = Some(Calendar::SolarHijri);
        } else if body.is_empty() && QUALIFIERS.contains(&t) && idx + 1 < part.tokens.len() {
            continue;
        } else {
            body.push(t);
        }
    }
    if bce {
        calendar = calendar.or(Some(Calendar::Gregorian));
    }

    let joined = body.join(" ");
    let (kind, captured) = if let Some(c) = YEAR_RE.captures(&joined) {
        (BoundKind::Year, c.get(1)?.as_str().to_string())
    } else if let Some(c) = PLURAL_RE.captures(&joined) {
        let digits = c.get(1)?.as_str().to_string();
        let kind = if digits.ends_with("00") {
            BoundKind::CenturyPlural
        } else if digits.ends_with('0') {
            BoundKind::Decade
        } else {
            return None;
        };
        (kind, digits)
    } else if let Some(c) = CENTURY_RE.captures(&joined).or_else(|| AR_CENTURY_RE.captures(&joined)) {
        (BoundKind::Century, c.get(1)?.as_str().to_string())
    } else if let Some(c) = ORDINAL_RE.captures(&joined) {
        (BoundKind::Ordinal, c.get(1)?.as_str().to_string())
    } else {
        return None;
    };

    Some(Bound {
        kind,
        value: captured.parse().ok()?,
        digits: captured.len(),
        bce,
        explicit_ce,
        calendar,
    })
}

/// Expand an abbreviated range end: `1850-55` ends in 1855, `1895-10` in 1910.
fn expand_abbreviated(start: i32, end: i32, end_digits: usize) -> i32 {
    let modulus = 10_i32.pow(end_digits as u32);
    let candidate = start - start.rem_euclid(modulus) + end;
    if candidate < start {
        candidate + modulus
    } else {
        candidate
    }
}
