//! Domain models shared across the crosswalk pipeline.
//!
//! - [`DateRange`] - normalized year range, negative years are BCE
//! - [`TaggedValue`] - one emitted value with its optional language tag
//! - [`FieldValues`] - flat value list or merged language-hash
//! - [`OutputRecord`] - the per-record result handed to a writer

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

// =============================================================================
// Date Range
// =============================================================================

/// An inclusive year range. Negative years are BCE, so `end - start` stays
/// meaningful across the era boundary.
///
/// Every range produced by the date parser or the calendar converter satisfies
/// `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: i32,
    pub end: i32,
}

impl DateRange {
    /// Build a range, reordering the bounds so that `start <= end`.
    pub fn ordered(a: i32, b: i32) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// A range covering exactly one year.
    pub fn single(year: i32) -> Self {
        Self {
            start: year,
            end: year,
        }
    }

    /// Whether any year of the range is BCE.
    pub fn has_bce(&self) -> bool {
        self.start < 0
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }

    /// Every year of the range, in order.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    /// Encode as the accumulator value `{"start": .., "end": ..}`.
    pub fn to_value(&self) -> Value {
        json!({ "start": self.start, "end": self.end })
    }

    /// Decode an accumulator value written by [`DateRange::to_value`].
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let start = i32::try_from(obj.get("start")?.as_i64()?).ok()?;
        let end = i32::try_from(obj.get("end")?.as_i64()?).ok()?;
        Some(Self { start, end })
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

// =============================================================================
// Emitted Values
// =============================================================================

/// A value emitted by a field chain, with the language tag of its terminal step.
///
/// Serializes as the bare value; the tag only matters to the merger.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedValue {
    pub value: Value,
    pub lang: Option<String>,
}

impl TaggedValue {
    pub fn new(value: Value, lang: Option<String>) -> Self {
        Self { value, lang }
    }

    /// The string form used for merging and deduplication.
    pub fn text(&self) -> String {
        value_text(&self.value)
    }
}

impl Serialize for TaggedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.value.serialize(serializer)
    }
}

/// String form of a scalar value: strings as-is, everything else as JSON text.
pub fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Values held by one output field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValues {
    /// Ordered values, as appended by the field chains.
    Flat(Vec<TaggedValue>),
    /// Language tag → ordered distinct strings, produced by the merger.
    Languages(IndexMap<String, Vec<String>>),
}

impl FieldValues {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValues::Flat(values) => values.is_empty(),
            FieldValues::Languages(langs) => langs.values().all(Vec::is_empty),
        }
    }

    /// Every value as a string, in order (language-hash values in tag order).
    pub fn texts(&self) -> Vec<String> {
        match self {
            FieldValues::Flat(values) => values.iter().map(TaggedValue::text).collect(),
            FieldValues::Languages(langs) => langs.values().flatten().cloned().collect(),
        }
    }
}

// =============================================================================
// Output Record
// =============================================================================

/// The normalized record built for one source record.
///
/// Fields keep the order in which they first received a value. A field is never
/// present with an empty value list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutputRecord {
    fields: IndexMap<String, FieldValues>,
}

impl OutputRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values to a field, creating it on first use.
    ///
    /// Nothing happens when `values` is empty, so a field that never produced a
    /// value is absent rather than empty. With `allow_duplicates == false`, a
    /// value already present with the same tag is skipped. Untagged values
    /// appended to an already merged field go under `default_language`.
    pub fn append(
        &mut self,
        field: &str,
        values: Vec<TaggedValue>,
        allow_duplicates: bool,
        default_language: &str,
    ) {
        if values.is_empty() {
            return;
        }
        let entry = self
            .fields
            .entry(field.to_string())
            .or_insert_with(|| FieldValues::Flat(Vec::new()));

        match entry {
            FieldValues::Flat(existing) => {
                for value in values {
                    if allow_duplicates || !existing.contains(&value) {
                        existing.push(value);
                    }
                }
            }
            FieldValues::Languages(langs) => {
                for value in values {
                    let tag = value.lang.clone().unwrap_or_else(|| default_language.to_string());
                    let text = value.text();
                    let list = langs.entry(tag).or_default();
                    if !list.contains(&text) {
                        list.push(text);
                    }
                }
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValues> {
        self.fields.get(field)
    }

    /// Whether the field holds at least one value.
    pub fn has_values(&self, field: &str) -> bool {
        self.fields.get(field).is_some_and(|v| !v.is_empty())
    }

    /// Flat values of a field, if it has not been merged.
    pub fn flat(&self, field: &str) -> Option<&[TaggedValue]> {
        match self.fields.get(field)? {
            FieldValues::Flat(values) => Some(values),
            FieldValues::Languages(_) => None,
        }
    }

    /// Language-hash of a merged field.
    pub fn languages(&self, field: &str) -> Option<&IndexMap<String, Vec<String>>> {
        match self.fields.get(field)? {
            FieldValues::Languages(langs) => Some(langs),
            FieldValues::Flat(_) => None,
        }
    }

    /// Replace a field's values in place, keeping its position.
    pub fn replace(&mut self, field: &str, values: FieldValues) {
        if let Some(slot) = self.fields.get_mut(field) {
            *slot = values;
        }
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Serialize into a JSON object.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagged(value: &str, lang: Option<&str>) -> TaggedValue {
        TaggedValue::new(json!(value), lang.map(String::from))
    }

    #[test]
    fn test_ordered_range() {
        assert_eq!(DateRange::ordered(1305, 1301), DateRange { start: 1301, end: 1305 });
        assert_eq!(DateRange::single(-500).to_string(), "-500");
        assert_eq!(DateRange::ordered(1301, 1305).to_string(), "1301-1305");
    }

    #[test]
    fn test_range_value_encoding() {
        let range = DateRange { start: -500, end: -480 };
        let value = range.to_value();
        assert_eq!(value["start"], -500);
        assert_eq!(DateRange::from_value(&value), Some(range));
        assert_eq!(DateRange::from_value(&json!("1301")), None);
        assert_eq!(DateRange::from_value(&json!({ "start": 1 })), None);
    }

    #[test]
    fn test_append_to_merged_field_uses_default_language() {
        let mut langs = IndexMap::new();
        langs.insert("en".to_string(), vec!["Coins".to_string()]);
        let mut record = OutputRecord::new();
        record.replace("cho_type", FieldValues::Languages(langs));

        record.append(
            "cho_type",
            vec![tagged("Monnaies", Some("fr")), tagged("Coins", None)],
            true,
            "und",
        );
        assert_eq!(
            record.to_json(),
            json!({ "cho_type": { "en": ["Coins"], "fr": ["Monnaies"], "und": ["Coins"] } })
        );
    }

    #[test]
    fn test_append_empty_creates_no_key() {
        let mut record = OutputRecord::new();
        record.append("cho_title", Vec::new(), true, "none");
        assert!(record.get("cho_title").is_none());
        assert!(record.is_empty());
    }

    #[test]
    fn test_append_preserves_order_and_duplicates_policy() {
        let mut record = OutputRecord::new();
        record.append("cho_creator", vec![tagged("Ibn Sina", None)], true, "none");
        record.append("cho_creator", vec![tagged("Ibn Sina", None)], true, "none");
        assert_eq!(record.flat("cho_creator").map(<[_]>::len), Some(2));

        let mut strict = OutputRecord::new();
        strict.append("cho_creator", vec![tagged("Ibn Sina", None)], false, "none");
        strict.append(
            "cho_creator",
            vec![tagged("Ibn Sina", None), tagged("al-Razi", None)],
            false,
            "none",
        );
        assert_eq!(
            strict.get("cho_creator").map(FieldValues::texts),
            Some(vec!["Ibn Sina".to_string(), "al-Razi".to_string()])
        );
    }

    #[test]
    fn test_serializes_flat_values_without_tags() {
        let mut record = OutputRecord::new();
        record.append("id", vec![tagged("rec-1", None)], true, "none");
        record.append("cho_date", vec![TaggedValue::new(json!(1301), None)], true, "none");
        assert_eq!(record.to_json(), json!({ "id": ["rec-1"], "cho_date": [1301] }));
    }
}
