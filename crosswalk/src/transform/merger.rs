//! End-of-record language merge.
//!
//! Folds the flat values of the listed fields into language-hashes:
//!
//! ```text
//! cho_subject: ["Coins"@en, "Numismatics"@en, "قطع نقدية"@ar-Arab, "Coins"@en]
//!   → {"en": ["Coins", "Numismatics"], "ar-Arab": ["قطع نقدية"]}
//! ```

use indexmap::IndexMap;

use crate::models::{FieldValues, OutputRecord, TaggedValue};

/// Group tagged values by language, keeping first-seen order of tags and of
/// distinct values. Untagged values go under `default_language`.
pub fn group_by_language(values: &[TaggedValue], default_language: &str) -> IndexMap<String, Vec<String>> {
    let mut langs: IndexMap<String, Vec<String>> = IndexMap::new();
    for value in values {
        let tag = value.lang.as_deref().unwrap_or(default_language);
        let text = value.text();
        let list = langs.entry(tag.to_string()).or_default();
        if !list.contains(&text) {
            list.push(text);
        }
    }
    langs
}

/// Merge every listed field of `record` in place.
///
/// Unlisted fields stay flat, absent fields stay absent, already merged fields
/// are left alone, so running the pass twice changes nothing.
pub fn merge_fields(record: &mut OutputRecord, fields: &[String], default_language: &str) {
    for field in fields {
        let Some(values) = record.flat(field) else {
            continue;
        };
        let merged = group_by_language(values, default_language);
        record.replace(field, FieldValues::Languages(merged));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn tagged(value: &str, lang: Option<&str>) -> TaggedValue {
        TaggedValue::new(json!(value), lang.map(String::from))
    }

    fn subject_record() -> OutputRecord {
        let mut record = OutputRecord::new();
        record.append(
            "cho_subject",
            vec![tagged("Coins", Some("en")), tagged("Numismatics", Some("en"))],
            true,
            "none",
        );
        record.append("cho_subject", vec![tagged("قطع نقدية", Some("ar-Arab"))], true, "none");
        record.append("cho_subject", vec![tagged("Coins", Some("en"))], true, "none");
        record.append("cho_identifier", vec![tagged("MS-1", None)], true, "none");
        record
    }

    #[test]
    fn test_merge_groups_and_dedups() {
        let mut record = subject_record();
        merge_fields(&mut record, &["cho_subject".to_string()], "none");

        assert_eq!(
            record.to_json(),
            json!({
                "cho_subject": { "en": ["Coins", "Numismatics"], "ar-Arab": ["قطع نقدية"] },
                "cho_identifier": ["MS-1"]
            })
        );
    }

    #[test]
    fn test_untagged_values_use_default_language() {
        let mut record = OutputRecord::new();
        record.append(
            "cho_title",
            vec![tagged("Untitled", None), tagged("Sans titre", Some("fr"))],
            true,
            "none",
        );
        merge_fields(&mut record, &["cho_title".to_string()], "und");

        let langs = record.languages("cho_title").unwrap();
        assert_eq!(langs["und"], vec!["Untitled"]);
        assert_eq!(langs.keys().collect::<Vec<_>>(), vec!["und", "fr"]);
    }

    #[test]
    fn test_absent_field_stays_absent() {
        let mut record = subject_record();
        merge_fields(&mut record, &["cho_creator".to_string()], "none");
        assert!(record.get("cho_creator").is_none());
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_non_string_values_merge_as_text() {
        let values = vec![
            TaggedValue::new(json!(1850), Some("en".into())),
            TaggedValue::new(json!("1850"), Some("en".into())),
        ];
        let langs = group_by_language(&values, "none");
        assert_eq!(langs["en"], vec!["1850"]);
    }

    proptest! {
        #[test]
        fn prop_merge_is_idempotent(
            entries in prop::collection::vec(("[a-c]{1,2}", prop::option::of("(en|fr|ar)")), 0..20)
        ) {
            let mut record = OutputRecord::new();
            let values = entries
                .iter()
                .map(|(v, l)| tagged(v, l.as_deref()))
                .collect();
            record.append("f", values, true, "none");
            let fields = vec!["f".to_string()];

            merge_fields(&mut record, &fields, "none");
            let once = record.clone();
            merge_fields(&mut record, &fields, "none");
            prop_assert_eq!(once, record);
        }

        #[test]
        fn prop_merge_preserves_first_seen_order(values in prop::collection::vec("[a-e]", 1..20)) {
            let tagged_values: Vec<TaggedValue> = values.iter().map(|v| tagged(v, Some("en"))).collect();
            let langs = group_by_language(&tagged_values, "none");

            let mut expected: Vec<String> = Vec::new();
            for v in &values {
                if !expected.contains(v) {
                    expected.push(v.clone());
                }
            }
            prop_assert_eq!(&langs["en"], &expected);
        }
    }
}
