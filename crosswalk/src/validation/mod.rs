//! JSON Schema validation for crosswalk configurations, plus the output
//! record check.
//!
//! # Embedded Schema
//!
//! The crosswalk schema is embedded at compile time from
//! `schemas/crosswalk-config.json` and checked with JSON Schema Draft 7
//! before a crosswalk is deserialized, so a misspelled setting or step type
//! is reported before any chain is compiled.
//!
//! # Output Records
//!
//! [`validate_output_record`] checks the one property every emitted record
//! must have: no empty values, and no duplicates inside a merged language
//! list (or inside a flat list when duplicates are disallowed).
//!
//! # Example
//!
//! ```rust,ignore
//! use serde_json::json;
//! use crosswalk::validation::validate_crosswalk_config;
//!
//! let config = json!({
//!     "fields": [{ "name": "cho_title", "steps": [{ "type": "extract", "path": "title" }] }]
//! });
//! assert!(validate_crosswalk_config(&config).is_ok());
//! ```

use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::models::{FieldValues, OutputRecord};

static CROSSWALK_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/crosswalk-config.json")).expect("Invalid embedded schema")
});

/// Validate a JSON document against a JSON schema.
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(Vec<String>)` with one message per violation
pub fn validate(schema: &Value, data: &Value) -> Result<(), Vec<String>> {
    let validator = jsonschema::draft7::new(schema).map_err(|e| vec![format!("Invalid schema: {}", e)])?;

    let errors: Vec<String> = validator
        .iter_errors(data)
        .map(|e| e.to_string())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Simpler variant: just true/false.
pub fn is_valid(schema: &Value, data: &Value) -> bool {
    jsonschema::draft7::is_valid(schema, data)
}

/// The embedded crosswalk schema.
pub fn crosswalk_schema() -> &'static Value {
    &CROSSWALK_SCHEMA
}

/// Validate a crosswalk document before deserializing it.
pub fn validate_crosswalk_config(data: &Value) -> ConfigResult<()> {
    validate(&CROSSWALK_SCHEMA, data).map_err(|errors| ConfigError::Schema { errors })
}

/// Quick check against the crosswalk schema.
pub fn is_valid_crosswalk_config(data: &Value) -> bool {
    is_valid(&CROSSWALK_SCHEMA, data)
}

/// Check an emitted record: no empty field, no blank value, no repeated value
/// in a merged language list. Flat lists are checked for repeats too unless
/// `allow_duplicates` is set.
pub fn validate_output_record(record: &OutputRecord, allow_duplicates: bool) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    for field in record.field_names() {
        let Some(values) = record.get(field) else {
            continue;
        };
        if values.is_empty() {
            errors.push(format!("{}: field has no values", field));
            continue;
        }
        match values {
            FieldValues::Flat(flat) => {
                let texts: Vec<String> = flat.iter().map(|v| v.text()).collect();
                check_values(field, None, &texts, !allow_duplicates, &mut errors);
            }
            FieldValues::Languages(langs) => {
                for (lang, texts) in langs {
                    check_values(field, Some(lang.as_str()), texts, true, &mut errors);
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_values(field: &str, lang: Option<&str>, texts: &[String], unique: bool, errors: &mut Vec<String>) {
    let location = match lang {
        Some(lang) => format!("{}[{}]", field, lang),
        None => field.to_string(),
    };
    let mut seen = HashSet::new();
    for text in texts {
        if text.trim().is_empty() || text == "null" {
            errors.push(format!("{}: empty value", location));
        } else if unique && !seen.insert(text.as_str()) {
            errors.push(format!("{}: duplicate value '{}'", location, text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaggedValue;
    use crate::transform::dsl::crosswalk::example_crosswalk;
    use indexmap::IndexMap;
    use serde_json::json;

    #[test]
    fn test_example_crosswalk_is_valid() {
        let value = serde_json::to_value(example_crosswalk()).unwrap();
        assert!(validate_crosswalk_config(&value).is_ok());
        assert!(is_valid_crosswalk_config(&value));
    }

    #[test]
    fn test_unknown_step_type_is_reported() {
        let config = json!({
            "fields": [{ "name": "cho_title", "steps": [{ "type": "transliterate" }] }]
        });
        let Err(ConfigError::Schema { errors }) = validate_crosswalk_config(&config) else {
            panic!("expected a schema error");
        };
        assert!(errors.iter().any(|e| e.contains("transliterate")));
    }

    #[test]
    fn test_invalid_settings() {
        let config = json!({
            "settings": { "reader": "yaml", "csv_delimiter": ";;" },
            "fields": []
        });
        let Err(ConfigError::Schema { errors }) = validate_crosswalk_config(&config) else {
            panic!("expected a schema error");
        };
        assert_eq!(errors.len(), 2);
        assert!(!is_valid_crosswalk_config(&json!({ "fields": [], "settingz": {} })));
    }

    #[test]
    fn test_empty_chain_fails_schema() {
        let config = json!({ "fields": [{ "name": "cho_title", "steps": [] }] });
        assert!(validate_crosswalk_config(&config).is_err());
    }

    #[test]
    fn test_output_record_checks() {
        let mut record = OutputRecord::new();
        record.append(
            "cho_type",
            vec![
                TaggedValue::new(json!("Text"), None),
                TaggedValue::new(json!("Text"), None),
            ],
            true,
            "none",
        );
        assert!(validate_output_record(&record, true).is_ok());

        let errors = validate_output_record(&record, false).unwrap_err();
        assert_eq!(errors, vec!["cho_type: duplicate value 'Text'".to_string()]);

        let mut langs = IndexMap::new();
        langs.insert("en".to_string(), vec!["Coins".to_string(), " ".to_string()]);
        record.replace("cho_type", FieldValues::Languages(langs));
        let errors = validate_output_record(&record, true).unwrap_err();
        assert_eq!(errors, vec!["cho_type[en]: empty value".to_string()]);
    }
}
