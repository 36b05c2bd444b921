//! Crosswalk declaration
//!
//! A crosswalk defines, for one provider, how source records become output
//! records: settings, ordered field chains, the merge list, post-merge
//! derivations and extra vocabulary tables.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::steps::Step;
use crate::dates::RangePolicy;
use crate::error::ConfigResult;
use crate::source::{CsvExtractor, MarcExtractor, ReaderKind, XmlExtractor};
use crate::validation::validate_crosswalk_config;
use crate::vocab::VocabTable;

/// A complete crosswalk declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrosswalkConfig {
    /// Version of the crosswalk format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub settings: Settings,

    /// Field chains, evaluated in order for every record
    pub fields: Vec<FieldSpec>,

    /// Fields folded into language-hashes at the end of each record
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge: Vec<String>,

    /// Chains run after the merge pass, over merged values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub derive: Vec<Derivation>,

    /// Extra vocabulary tables; same-named built-in tables are replaced
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vocabularies: HashMap<String, VocabTable>,
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Output format of the CLI writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriterKind {
    /// One JSON object per line
    #[default]
    Ndjson,
    /// One pretty-printed JSON array
    Json,
}

/// Explicit crosswalk settings, fixed at load time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub reader: ReaderKind,
    pub writer: WriterKind,

    /// When false, a flat field skips values it already holds.
    pub allow_duplicate_values: bool,

    pub date_range_policy: RangePolicy,

    /// Language key for untagged values in merged fields.
    pub default_language: String,

    /// Clipboard slot holding the record identifier used in logs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,

    /// XML prefix → namespace URI.
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub namespaces: HashMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_delimiter: Option<char>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv_multi_value_separator: Option<String>,

    /// Joins the subfields of one MARC field; `null` keeps them separate.
    pub marc_subfield_separator: Option<String>,

    /// Element that splits an XML collection into records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xml_record_element: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reader: ReaderKind::default(),
            writer: WriterKind::default(),
            allow_duplicate_values: true,
            date_range_policy: RangePolicy::default(),
            default_language: "none".to_string(),
            record_id: None,
            namespaces: HashMap::new(),
            csv_delimiter: None,
            csv_multi_value_separator: None,
            marc_subfield_separator: Some(" ".to_string()),
            xml_record_element: None,
        }
    }
}

impl Settings {
    pub fn csv_extractor(&self) -> CsvExtractor {
        CsvExtractor::new(self.csv_multi_value_separator.clone())
    }

    pub fn xml_extractor(&self) -> XmlExtractor {
        XmlExtractor::new(self.namespaces.clone())
    }

    pub fn marc_extractor(&self) -> MarcExtractor {
        MarcExtractor::new(self.marc_subfield_separator.clone())
    }

    /// The CSV delimiter as a byte, when one is set and is ASCII.
    pub fn csv_delimiter_byte(&self) -> Option<u8> {
        self.csv_delimiter
            .filter(char::is_ascii)
            .map(|c| c as u8)
    }
}

/// One output field and the chain that fills it.
///
/// Several specs may target the same field; their values append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub steps: Vec<Step>,
}

impl FieldSpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            steps: Vec::new(),
        }
    }

    /// A field filled from one source path
    pub fn from_path(name: &str, path: &str) -> Self {
        Self::new(name).with_step(Step::extract(path))
    }

    /// A field filled with a constant
    pub fn from_literal(name: &str, value: Value) -> Self {
        Self::new(name).with_step(Step::Literal { value })
    }

    /// Add a step to the chain
    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Finish the chain with a language tag
    pub fn with_lang(self, tag: &str) -> Self {
        self.with_step(Step::lang(tag))
    }
}

/// A chain run after the merge pass over the values of another field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    pub name: String,

    /// Field whose (merged) values seed the chain
    pub from: String,

    /// Only read this language of a merged field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    pub steps: Vec<Step>,
}

impl CrosswalkConfig {
    /// Create an empty crosswalk
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            settings: Settings::default(),
            fields: Vec::new(),
            merge: Vec::new(),
            derive: Vec::new(),
            vocabularies: HashMap::new(),
        }
    }

    /// Parse a crosswalk from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Parse a crosswalk from JSON value
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Validate a JSON document against the crosswalk schema, then parse it.
    pub fn load(json: &str) -> ConfigResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        validate_crosswalk_config(&value)?;
        Ok(Self::from_value(&value)?)
    }

    /// Read, validate and parse a crosswalk file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::load(&text)
    }

    /// Add a field chain
    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Every distinct output field, in declaration order, derivations last
    pub fn target_fields(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let declared = self.fields.iter().map(|f| &f.name);
        let derived = self.derive.iter().map(|d| &d.name);
        for name in declared.chain(derived) {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

impl Default for CrosswalkConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate an example crosswalk for documentation
pub fn example_crosswalk() -> CrosswalkConfig {
    let mut config = CrosswalkConfig::new();
    config.description = "Example crosswalk for a JSON museum export".to_string();
    config.settings.record_id = Some("id".to_string());

    config = config
        .with_field(
            FieldSpec::from_path("id", "id")
                .with_step(Step::Trim)
                .with_step(Step::ToClipboard { slot: "id".into() }),
        )
        .with_field(FieldSpec::from_path("cho_title", "title.en").with_lang("en"))
        .with_field(FieldSpec::from_path("cho_title", "title.ar").with_lang("ar-Arab"))
        .with_field(
            FieldSpec::from_path("cho_creator", "makers.name")
                .with_step(Step::StripPunctuation)
                .with_step(Step::ScriptLang {
                    arabic: "ar-Arab".into(),
                    other: "en".into(),
                }),
        )
        .with_field(
            FieldSpec::from_path("cho_date", "date")
                .with_step(Step::Squish)
                .with_step(Step::Default {
                    value: Value::String("undated".into()),
                }),
        )
        .with_field(
            FieldSpec::from_path("cho_date_range_norm", "date")
                .with_step(Step::ParseDate)
                .with_step(Step::ToClipboard {
                    slot: "date_range".into(),
                }),
        )
        .with_field(
            FieldSpec::new("cho_date_range_hijri")
                .with_step(Step::FromClipboard {
                    slot: "date_range".into(),
                })
                .with_step(Step::ToHijri),
        )
        .with_field(
            FieldSpec::from_path("cho_type", "object_type")
                .with_step(Step::Translate {
                    table: "object_types".into(),
                })
                .with_lang("en"),
        )
        .with_field(
            FieldSpec::from_path("cho_language", "language")
                .with_step(Step::Split { separator: ";".into() })
                .with_step(Step::Translate {
                    table: "languages".into(),
                })
                .with_lang("en"),
        )
        .with_field(FieldSpec::from_literal("agg_provider", Value::String("Example Museum".into())).with_lang("en"));

    config.merge = vec![
        "cho_title".to_string(),
        "cho_creator".to_string(),
        "cho_type".to_string(),
        "cho_language".to_string(),
        "agg_provider".to_string(),
    ];
    config.derive = vec![Derivation {
        name: "cho_edm_type".to_string(),
        from: "cho_type".to_string(),
        language: Some("en".to_string()),
        steps: vec![
            Step::First,
            Step::Translate {
                table: "edm_types".into(),
            },
        ],
    }];
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_crosswalk_serialization() {
        let config = example_crosswalk();
        let json = config.to_json().unwrap();
        let parsed = CrosswalkConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_settings_defaults() {
        let config = CrosswalkConfig::from_value(&json!({ "fields": [] })).unwrap();
        assert_eq!(config.version, "1.0");
        assert!(config.settings.allow_duplicate_values);
        assert_eq!(config.settings.default_language, "none");
        assert_eq!(config.settings.date_range_policy, RangePolicy::Swap);
        assert_eq!(config.settings.marc_subfield_separator.as_deref(), Some(" "));
    }

    #[test]
    fn test_explicit_settings() {
        let config = CrosswalkConfig::from_value(&json!({
            "settings": {
                "reader": "csv",
                "csv_delimiter": ";",
                "date_range_policy": "strict",
                "marc_subfield_separator": null
            },
            "fields": []
        }))
        .unwrap();
        assert_eq!(config.settings.reader, ReaderKind::Csv);
        assert_eq!(config.settings.csv_delimiter_byte(), Some(b';'));
        assert_eq!(config.settings.date_range_policy, RangePolicy::Strict);
        assert_eq!(config.settings.marc_subfield_separator, None);
    }

    #[test]
    fn test_target_fields_are_distinct_and_ordered() {
        let fields = example_crosswalk().target_fields();
        assert_eq!(fields[0], "id");
        assert_eq!(fields.iter().filter(|f| *f == "cho_title").count(), 1);
        assert_eq!(fields.last().map(String::as_str), Some("cho_edm_type"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", example_crosswalk().to_json().unwrap()).unwrap();
        let loaded = CrosswalkConfig::from_path(file.path()).unwrap();
        assert_eq!(loaded.fields.len(), example_crosswalk().fields.len());
    }

    #[test]
    fn test_load_rejects_schema_violations() {
        let err = CrosswalkConfig::load(r#"{"fields": [{"name": "x"}]}"#).unwrap_err();
        assert!(matches!(err, crate::error::ConfigError::Schema { .. }));
        assert!(CrosswalkConfig::from_path("/nonexistent/crosswalk.json").is_err());
    }
}
