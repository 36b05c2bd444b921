//! Value operations behind the compiled steps.
//!
//! String operations map over scalar values and leave structured values (date
//! ranges, arrays) untouched. List operations work on the whole accumulator.

use regex::Regex;
use serde_json::{Number, Value};

use crate::dates::{gregorian_to_solar_hijri, to_hijri, DateParser};
use crate::error::{StepError, StepResult};
use crate::models::{value_text, DateRange};

// =============================================================================
// String Operations
// =============================================================================

#[derive(Debug, Clone)]
pub enum TextOp {
    Trim,
    Squish,
    Uppercase,
    Lowercase,
    StripPunctuation,
    Replace { regex: Regex, value: String },
    Prepend(String),
    Append(String),
    Substring { start: usize, length: Option<usize> },
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_isbd_punctuation(c: char) -> bool {
    c.is_whitespace() || matches!(c, '/' | ',' | ':' | ';' | '.' | '=' | '،' | '؛')
}

impl TextOp {
    pub fn apply(&self, value: Value) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.apply(v)).collect()),
            other => match as_string(&other) {
                Some(s) => Value::String(self.apply_str(&s)),
                None => other,
            },
        }
    }

    fn apply_str(&self, s: &str) -> String {
        match self {
            TextOp::Trim => s.trim().to_string(),
            TextOp::Squish => s.split_whitespace().collect::<Vec<_>>().join(" "),
            TextOp::Uppercase => s.to_uppercase(),
            TextOp::Lowercase => s.to_lowercase(),
            TextOp::StripPunctuation => self.apply_strip_punctuation(s),
            TextOp::Replace { regex, value } => regex.replace_all(s, value.as_str()).into_owned(),
            TextOp::Prepend(prefix) => format!("{}{}", prefix, s),
            TextOp::Append(suffix) => format!("{}{}", s, suffix),
            TextOp::Substring { start, length } => self.apply_substring(s, *start, *length),
        }
    }

    fn apply_strip_punctuation(&self, s: &str) -> String {
        s.trim_end_matches(is_isbd_punctuation)
            .trim_start_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ':' | ';' | '/' | '='))
            .to_string()
    }

    fn apply_substring(&self, s: &str, start: usize, length: Option<usize>) -> String {
        let chars: Vec<char> = s.chars().collect();
        let end = length
            .map(|l| start.saturating_add(l))
            .unwrap_or(chars.len())
            .min(chars.len());
        chars.get(start..end).map(|c| c.iter().collect()).unwrap_or_default()
    }
}

// =============================================================================
// List Operations
// =============================================================================

#[derive(Debug, Clone)]
pub enum ListOp {
    Split(String),
    Join(String),
    Flatten,
    Compact,
    First,
    Last,
    Unique,
    Index(usize),
    EvenIndexed,
    OddIndexed,
    Select(Regex),
    Reject(Regex),
}

/// Whether a value counts as "no value": null, empty or blank string, empty array.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        other => out.push(other),
    }
}

impl ListOp {
    pub fn apply(&self, values: Vec<Value>) -> Vec<Value> {
        match self {
            ListOp::Split(separator) => self.apply_split(values, separator),
            ListOp::Join(separator) => self.apply_join(values, separator),
            ListOp::Flatten => {
                let mut out = Vec::with_capacity(values.len());
                for value in values {
                    flatten_into(value, &mut out);
                }
                out
            }
            ListOp::Compact => values.into_iter().filter(|v| !is_blank(v)).collect(),
            ListOp::First => values.into_iter().take(1).collect(),
            ListOp::Last => values.into_iter().last().into_iter().collect(),
            ListOp::Unique => {
                let mut out: Vec<Value> = Vec::with_capacity(values.len());
                for value in values {
                    if !out.contains(&value) {
                        out.push(value);
                    }
                }
                out
            }
            ListOp::Index(n) => values.into_iter().nth(*n).into_iter().collect(),
            ListOp::EvenIndexed => values.into_iter().step_by(2).collect(),
            ListOp::OddIndexed => values.into_iter().skip(1).step_by(2).collect(),
            ListOp::Select(regex) => values
                .into_iter()
                .filter(|v| regex.is_match(&value_text(v)))
                .collect(),
            ListOp::Reject(regex) => values
                .into_iter()
                .filter(|v| !regex.is_match(&value_text(v)))
                .collect(),
        }
    }

    fn apply_split(&self, values: Vec<Value>, separator: &str) -> Vec<Value> {
        let mut out = Vec::with_capacity(values.len());
        for value in values {
            match value {
                Value::String(s) if !separator.is_empty() => out.extend(
                    s.split(separator)
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(|p| Value::String(p.to_string())),
                ),
                other => out.push(other),
            }
        }
        out
    }

    fn apply_join(&self, values: Vec<Value>, separator: &str) -> Vec<Value> {
        if values.is_empty() {
            return values;
        }
        let joined = values
            .iter()
            .filter(|v| !is_blank(v))
            .map(value_text)
            .collect::<Vec<_>>()
            .join(separator);
        vec![Value::String(joined)]
    }
}

// =============================================================================
// Numbers
// =============================================================================

/// Coerce a value into a JSON number; non-numeric input is a step failure.
pub fn to_number(value: Value) -> StepResult<Value> {
    match value {
        Value::Number(_) => Ok(value),
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(n) = trimmed.parse::<i64>() {
                return Ok(Value::Number(n.into()));
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or(StepError::NotNumeric(s))
        }
        other => Err(StepError::NotNumeric(value_text(&other))),
    }
}

// =============================================================================
// Script Detection
// =============================================================================

/// Whether the text contains any Arabic-script letter.
pub fn has_arabic_script(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0600}'..='\u{06FF}'
            | '\u{0750}'..='\u{077F}'
            | '\u{08A0}'..='\u{08FF}'
            | '\u{FB50}'..='\u{FDFF}'
            | '\u{FE70}'..='\u{FEFF}')
            && c.is_alphabetic()
    })
}

// =============================================================================
// Date Operations
// =============================================================================

/// Widest range `expand_years` enumerates.
pub const MAX_EXPANDED_YEARS: u32 = 10_000;

#[derive(Debug, Clone)]
pub enum DateOp {
    Parse,
    ParseHijri,
    ParseSolarHijri,
    ToHijri,
    ToSolarHijri,
    ExpandYears,
    FormatRange(String),
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(_) => "a boolean".into(),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("text '{}'", s),
        Value::Array(_) => "an array".into(),
        Value::Object(_) => "an object".into(),
    }
}

impl DateOp {
    pub fn name(&self) -> &'static str {
        match self {
            DateOp::Parse => "parse_date",
            DateOp::ParseHijri => "parse_hijri_date",
            DateOp::ParseSolarHijri => "parse_solar_hijri_date",
            DateOp::ToHijri => "to_hijri",
            DateOp::ToSolarHijri => "to_solar_hijri",
            DateOp::ExpandYears => "expand_years",
            DateOp::FormatRange(_) => "format_range",
        }
    }

    /// Apply to one value. An unparseable expression or a range with no
    /// counterpart in the target calendar yields nothing.
    pub fn apply(&self, value: Value, parser: &DateParser) -> StepResult<Vec<Value>> {
        match self {
            DateOp::Parse | DateOp::ParseHijri | DateOp::ParseSolarHijri => {
                if let Some(range) = DateRange::from_value(&value) {
                    return Ok(parser.check_range(range).map(|r| r.to_value()).into_iter().collect());
                }
                let text = match &value {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    other => {
                        return Err(StepError::TypeMismatch {
                            step: self.name(),
                            found: describe(other),
                        })
                    }
                };
                let parsed = match self {
                    DateOp::ParseHijri => parser.parse_hijri(&text),
                    DateOp::ParseSolarHijri => parser.parse_solar_hijri(&text),
                    _ => parser.parse(&text),
                };
                Ok(parsed.map(|r| r.to_value()).into_iter().collect())
            }
            DateOp::ToHijri => Ok(to_hijri(self.range(&value)?)
                .map(|r| r.to_value())
                .into_iter()
                .collect()),
            DateOp::ToSolarHijri => Ok(gregorian_to_solar_hijri(self.range(&value)?)
                .map(|r| r.to_value())
                .into_iter()
                .collect()),
            DateOp::ExpandYears => {
                let range = self.range(&value)?;
                let span = i64::from(range.end) - i64::from(range.start) + 1;
                if span > i64::from(MAX_EXPANDED_YEARS) {
                    return Err(StepError::SpanTooLarge {
                        range: range.to_string(),
                        limit: MAX_EXPANDED_YEARS,
                    });
                }
                Ok(range.years().map(Value::from).collect())
            }
            DateOp::FormatRange(separator) => {
                let range = self.range(&value)?;
                let text = if range.start == range.end {
                    range.start.to_string()
                } else {
                    format!("{}{}{}", range.start, separator, range.end)
                };
                Ok(vec![Value::String(text)])
            }
        }
    }

    fn range(&self, value: &Value) -> StepResult<DateRange> {
        DateRange::from_value(value).ok_or_else(|| StepError::NotADateRange {
            step: self.name(),
            found: describe(value),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::RangePolicy;
    use serde_json::json;

    fn strings(values: &[&str]) -> Vec<Value> {
        values.iter().map(|s| json!(s)).collect()
    }

    #[test]
    fn test_trim_and_squish() {
        assert_eq!(TextOp::Trim.apply(json!("  Kitab  ")), json!("Kitab"));
        assert_eq!(TextOp::Squish.apply(json!(" Kitab \n al-Shifa ")), json!("Kitab al-Shifa"));
        assert_eq!(TextOp::Uppercase.apply(json!(["a", "b"])), json!(["A", "B"]));
    }

    #[test]
    fn test_strip_punctuation() {
        let op = TextOp::StripPunctuation;
        assert_eq!(op.apply(json!("Kitab al-Shifa /")), json!("Kitab al-Shifa"));
        assert_eq!(op.apply(json!("Ibn Sina,")), json!("Ibn Sina"));
        assert_eq!(op.apply(json!("al-Ilahiyat :")), json!("al-Ilahiyat"));
        assert_eq!(op.apply(json!("كتاب الشفاء ،")), json!("كتاب الشفاء"));
    }

    #[test]
    fn test_replace_prepend_append() {
        let replace = TextOp::Replace {
            regex: Regex::new(r"\s*\[.*\]").unwrap(),
            value: String::new(),
        };
        assert_eq!(replace.apply(json!("Dirham [fragment]")), json!("Dirham"));
        assert_eq!(TextOp::Prepend("urn:".into()).apply(json!("obj-1")), json!("urn:obj-1"));
        assert_eq!(TextOp::Append("!".into()).apply(json!(42)), json!("42!"));
    }

    #[test]
    fn test_structured_values_untouched() {
        let range = json!({ "start": 1301, "end": 1305 });
        assert_eq!(TextOp::Trim.apply(range.clone()), range);
    }

    #[test]
    fn test_substring_by_characters() {
        let op = TextOp::Substring { start: 0, length: Some(5) };
        assert_eq!(op.apply(json!("كتاب الشفاء")), json!("كتاب "));
        let tail = TextOp::Substring { start: 40, length: None };
        assert_eq!(tail.apply(json!("short")), json!(""));
    }

    #[test]
    fn test_split_and_join() {
        let split = ListOp::Split(";".into());
        assert_eq!(split.apply(strings(&["Coins; Numismatics;", "Silver"])), strings(&["Coins", "Numismatics", "Silver"]));
        let join = ListOp::Join(", ".into());
        assert_eq!(join.apply(strings(&["Cairo", "Egypt"])), strings(&["Cairo, Egypt"]));
        assert!(join.apply(Vec::new()).is_empty());
    }

    #[test]
    fn test_flatten_and_compact() {
        let nested = vec![json!(["a", ["b", null]]), json!("c")];
        assert_eq!(ListOp::Flatten.apply(nested), vec![json!("a"), json!("b"), Value::Null, json!("c")]);
        let blanks = vec![json!(" "), json!("x"), json!([]), Value::Null, json!(0)];
        assert_eq!(ListOp::Compact.apply(blanks), vec![json!("x"), json!(0)]);
    }

    #[test]
    fn test_positional_filters() {
        let values = strings(&["a", "b", "c", "d", "e"]);
        assert_eq!(ListOp::First.apply(values.clone()), strings(&["a"]));
        assert_eq!(ListOp::Last.apply(values.clone()), strings(&["e"]));
        assert_eq!(ListOp::Index(3).apply(values.clone()), strings(&["d"]));
        assert!(ListOp::Index(9).apply(values.clone()).is_empty());
        assert_eq!(ListOp::EvenIndexed.apply(values.clone()), strings(&["a", "c", "e"]));
        assert_eq!(ListOp::OddIndexed.apply(values), strings(&["b", "d"]));
    }

    #[test]
    fn test_unique_select_reject() {
        let values = strings(&["Coins", "Maps", "Coins", "Manuscripts"]);
        assert_eq!(ListOp::Unique.apply(values.clone()), strings(&["Coins", "Maps", "Manuscripts"]));
        let ma = Regex::new("^Ma").unwrap();
        assert_eq!(ListOp::Select(ma.clone()).apply(values.clone()), strings(&["Maps", "Manuscripts"]));
        assert_eq!(ListOp::Reject(ma).apply(values), strings(&["Coins", "Coins"]));
    }

    #[test]
    fn test_to_number() {
        assert_eq!(to_number(json!(" 1850 ")), Ok(json!(1850)));
        assert_eq!(to_number(json!("12.5")), Ok(json!(12.5)));
        assert_eq!(to_number(json!(7)), Ok(json!(7)));
        assert_eq!(to_number(json!("ca. 1850")), Err(StepError::NotNumeric("ca. 1850".into())));
        assert!(to_number(json!({ "start": 1 })).is_err());
    }

    #[test]
    fn test_arabic_script_detection() {
        assert!(has_arabic_script("قطع نقدية"));
        assert!(has_arabic_script("Diwan دیوان"));
        assert!(!has_arabic_script("Numismatics"));
        assert!(!has_arabic_script("١٣٠٥"));
    }

    #[test]
    fn test_parse_date_values() {
        let parser = DateParser::default();
        assert_eq!(
            DateOp::Parse.apply(json!("1301-1305"), &parser),
            Ok(vec![json!({ "start": 1301, "end": 1305 })])
        );
        assert_eq!(DateOp::Parse.apply(json!(1850), &parser), Ok(vec![json!({ "start": 1850, "end": 1850 })]));
        assert_eq!(DateOp::Parse.apply(json!("undated"), &parser), Ok(vec![]));
        assert_eq!(
            DateOp::ParseHijri.apply(json!("1305"), &parser),
            Ok(vec![json!({ "start": 1305, "end": 1305 })])
        );
        assert!(DateOp::Parse.apply(json!(true), &parser).is_err());
    }

    #[test]
    fn test_structured_ranges_follow_policy() {
        let reversed = json!({ "start": 1900, "end": 1800 });
        assert_eq!(
            DateOp::Parse.apply(reversed.clone(), &DateParser::new(RangePolicy::Swap)),
            Ok(vec![json!({ "start": 1800, "end": 1900 })])
        );
        let strict = DateParser::new(RangePolicy::Strict);
        assert_eq!(DateOp::Parse.apply(reversed.clone(), &strict), Ok(vec![]));
        assert_eq!(DateOp::ParseHijri.apply(reversed, &strict), Ok(vec![]));
        assert_eq!(
            DateOp::Parse.apply(json!({ "start": 1301, "end": 1305 }), &strict),
            Ok(vec![json!({ "start": 1301, "end": 1305 })])
        );
    }

    #[test]
    fn test_expand_years_rejects_huge_spans() {
        let parser = DateParser::default();
        let err = DateOp::ExpandYears
            .apply(json!({ "start": -2_000_000_000, "end": 2_000_000_000 }), &parser)
            .unwrap_err();
        assert!(matches!(err, StepError::SpanTooLarge { limit: MAX_EXPANDED_YEARS, .. }));
        assert_eq!(
            DateOp::ExpandYears.apply(json!({ "start": 1, "end": 10_000 }), &parser).map(|v| v.len()),
            Ok(10_000)
        );
    }

    #[test]
    fn test_range_conversions() {
        let parser = DateParser::default();
        let bce = json!({ "start": -500, "end": -480 });
        assert_eq!(DateOp::ToHijri.apply(bce, &parser), Ok(vec![]));
        assert_eq!(
            DateOp::ToHijri.apply(json!("1850"), &parser),
            Err(StepError::NotADateRange {
                step: "to_hijri",
                found: "text '1850'".into()
            })
        );
        assert_eq!(
            DateOp::ExpandYears.apply(json!({ "start": 1301, "end": 1303 }), &parser),
            Ok(vec![json!(1301), json!(1302), json!(1303)])
        );
        assert_eq!(
            DateOp::FormatRange("/".into()).apply(json!({ "start": 1301, "end": 1305 }), &parser),
            Ok(vec![json!("1301/1305")])
        );
    }
}
