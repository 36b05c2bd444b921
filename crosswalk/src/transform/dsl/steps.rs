//! Step declarations for field chains.
//!
//! Steps are declared in crosswalk JSON as objects tagged by `"type"` and
//! compiled once when the engine is built.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step of a field chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    // ---- extraction ----------------------------------------------------
    /// Append every value found at `path` (or at each of `paths`, in order).
    Extract {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        paths: Vec<String>,
    },

    /// Build one date range from separate begin/end paths.
    DatePair { begin: String, end: String },

    // ---- injection -----------------------------------------------------
    /// Append a constant.
    Literal { value: Value },

    /// Use this value only when the chain has produced nothing so far.
    Default { value: Value },

    // ---- strings -------------------------------------------------------
    Trim,
    /// Collapse internal whitespace runs.
    Squish,
    Uppercase,
    Lowercase,
    /// Strip leading/trailing ISBD punctuation (` /`, `,`, `:`, `;`, `.`, `=`).
    StripPunctuation,
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },
    Prepend { value: String },
    Append { value: String },
    Substring {
        start: usize,
        #[serde(default)]
        length: Option<usize>,
    },

    // ---- arrays --------------------------------------------------------
    Split {
        #[serde(default = "default_split_separator")]
        separator: String,
    },
    Join {
        #[serde(default = "default_join_separator")]
        separator: String,
    },
    Flatten,

    // ---- numbers -------------------------------------------------------
    ToNumber,

    // ---- filters -------------------------------------------------------
    Compact,
    First,
    Last,
    Unique,
    /// Keep the value at position `n` (0-based).
    Index { n: usize },
    /// Keep values at positions 0, 2, 4, ...
    EvenIndexed,
    /// Keep values at positions 1, 3, 5, ...
    OddIndexed,
    Select { pattern: String },
    Reject { pattern: String },

    // ---- vocabulary ----------------------------------------------------
    Translate { table: String },

    // ---- dates ---------------------------------------------------------
    ParseDate,
    ParseHijriDate,
    ParseSolarHijriDate,
    ToHijri,
    ToSolarHijri,
    ExpandYears,
    FormatRange {
        #[serde(default = "default_range_separator")]
        separator: String,
    },

    // ---- record context ------------------------------------------------
    /// Stop the chain unless `field` has no value yet.
    OnlyIfEmpty { field: String },
    /// Stop the chain unless `field` already has a value.
    OnlyIfPresent { field: String },
    ToClipboard { slot: String },
    FromClipboard { slot: String },
    FromField { field: String },

    // ---- terminal ------------------------------------------------------
    Lang { tag: String },
    /// Tag Arabic-script values with `arabic`, everything else with `other`.
    ScriptLang { arabic: String, other: String },
    /// Run each branch on its own copy of the values and emit all results.
    Fork { branches: Vec<Vec<Step>> },
}

fn default_split_separator() -> String {
    ",".to_string()
}

fn default_join_separator() -> String {
    " ".to_string()
}

fn default_range_separator() -> String {
    "-".to_string()
}

impl Step {
    /// Shorthand for a single-path extraction.
    pub fn extract(path: &str) -> Self {
        Step::Extract {
            path: Some(path.to_string()),
            paths: Vec::new(),
        }
    }

    pub fn lang(tag: &str) -> Self {
        Step::Lang {
            tag: tag.to_string(),
        }
    }

    /// The `type` tag of this step.
    pub fn name(&self) -> &'static str {
        match self {
            Step::Extract { .. } => "extract",
            Step::DatePair { .. } => "date_pair",
            Step::Literal { .. } => "literal",
            Step::Default { .. } => "default",
            Step::Trim => "trim",
            Step::Squish => "squish",
            Step::Uppercase => "uppercase",
            Step::Lowercase => "lowercase",
            Step::StripPunctuation => "strip_punctuation",
            Step::Replace { .. } => "replace",
            Step::Prepend { .. } => "prepend",
            Step::Append { .. } => "append",
            Step::Substring { .. } => "substring",
            Step::Split { .. } => "split",
            Step::Join { .. } => "join",
            Step::Flatten => "flatten",
            Step::ToNumber => "to_number",
            Step::Compact => "compact",
            Step::First => "first",
            Step::Last => "last",
            Step::Unique => "unique",
            Step::Index { .. } => "index",
            Step::EvenIndexed => "even_indexed",
            Step::OddIndexed => "odd_indexed",
            Step::Select { .. } => "select",
            Step::Reject { .. } => "reject",
            Step::Translate { .. } => "translate",
            Step::ParseDate => "parse_date",
            Step::ParseHijriDate => "parse_hijri_date",
            Step::ParseSolarHijriDate => "parse_solar_hijri_date",
            Step::ToHijri => "to_hijri",
            Step::ToSolarHijri => "to_solar_hijri",
            Step::ExpandYears => "expand_years",
            Step::FormatRange { .. } => "format_range",
            Step::OnlyIfEmpty { .. } => "only_if_empty",
            Step::OnlyIfPresent { .. } => "only_if_present",
            Step::ToClipboard { .. } => "to_clipboard",
            Step::FromClipboard { .. } => "from_clipboard",
            Step::FromField { .. } => "from_field",
            Step::Lang { .. } => "lang",
            Step::ScriptLang { .. } => "script_lang",
            Step::Fork { .. } => "fork",
        }
    }

    /// Terminal steps must end their chain.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Step::Lang { .. } | Step::ScriptLang { .. } | Step::Fork { .. })
    }

    /// Steps that read the source record, which post-merge derivations cannot do.
    pub fn reads_source(&self) -> bool {
        matches!(self, Step::Extract { .. } | Step::DatePair { .. })
    }
}

/// Reference table of every step, printed by `crosswalk steps`.
pub fn steps_description() -> String {
    r#"Available steps:

| Step | Description | Parameters |
|------|-------------|------------|
| extract | Append values found at a source path | path or paths |
| date_pair | Date range from separate begin/end paths | begin, end |
| literal | Append a constant | value |
| default | Constant used only when nothing was produced | value |
| trim | Remove leading/trailing whitespace | - |
| squish | Collapse whitespace runs | - |
| uppercase | Convert to uppercase | - |
| lowercase | Convert to lowercase | - |
| strip_punctuation | Strip trailing ISBD punctuation | - |
| replace | Regex replacement | pattern, value |
| prepend | Add a prefix | value |
| append | Add a suffix | value |
| substring | Character slice | start, length (optional) |
| split | Split strings into several values | separator (default ",") |
| join | Join all values into one | separator (default " ") |
| flatten | Spread nested arrays | - |
| to_number | Numeric coercion, fails on non-numeric input | - |
| compact | Drop blank values | - |
| first / last | Keep the first / last value | - |
| unique | Drop repeated values | - |
| index | Keep the value at a 0-based position | n |
| even_indexed / odd_indexed | Keep values at even / odd positions | - |
| select / reject | Keep / drop values matching a regex | pattern |
| translate | Controlled-vocabulary lookup | table |
| parse_date | Date expression to Gregorian {start, end} | - |
| parse_hijri_date | Date expression to Hijri {start, end} | - |
| parse_solar_hijri_date | Solar Hijri expression to Gregorian {start, end} | - |
| to_hijri / to_solar_hijri | Convert a Gregorian range | - |
| expand_years | Range to every year it covers | - |
| format_range | Range to text | separator (default "-") |
| only_if_empty / only_if_present | Run only if a field is empty / filled | field |
| to_clipboard / from_clipboard | Store / read values for later fields | slot |
| from_field | Read values already written to a field | field |
| lang | Tag every value with a language (last step) | tag |
| script_lang | Tag by script, Arabic vs other (last step) | arabic, other |
| fork | Run independent branches (last step) | branches |

Example chain in JSON:
[
  {"type": "extract", "path": "titleInfo/title"},
  {"type": "strip_punctuation"},
  {"type": "script_lang", "arabic": "ar-Arab", "other": "en"}
]"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_tagged_steps() {
        let steps: Vec<Step> = serde_json::from_value(json!([
            { "type": "extract", "path": "title" },
            { "type": "replace", "pattern": "\\s+/$" },
            { "type": "split" },
            { "type": "index", "n": 2 },
            { "type": "lang", "tag": "en" }
        ]))
        .unwrap();

        assert_eq!(steps[0], Step::extract("title"));
        assert_eq!(
            steps[1],
            Step::Replace {
                pattern: "\\s+/$".into(),
                value: String::new()
            }
        );
        assert_eq!(steps[2], Step::Split { separator: ",".into() });
        assert_eq!(steps[3], Step::Index { n: 2 });
        assert!(steps[4].is_terminal());
    }

    #[test]
    fn test_unknown_step_type_rejected() {
        let result: Result<Step, _> = serde_json::from_value(json!({ "type": "transliterate" }));
        assert!(result.is_err());
    }

    #[test]
    fn test_nested_fork() {
        let step: Step = serde_json::from_value(json!({
            "type": "fork",
            "branches": [
                [{ "type": "lang", "tag": "en" }],
                [{ "type": "prepend", "value": "Subject: " }, { "type": "lang", "tag": "und" }]
            ]
        }))
        .unwrap();
        let Step::Fork { branches } = &step else {
            panic!("expected fork");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(step.name(), "fork");
    }

    #[test]
    fn test_serialization_uses_type_tag() {
        let value = serde_json::to_value(Step::extract("a.b")).unwrap();
        assert_eq!(value, json!({ "type": "extract", "path": "a.b" }));
        assert_eq!(serde_json::to_value(Step::ToHijri).unwrap(), json!({ "type": "to_hijri" }));
    }

    #[test]
    fn test_description_lists_every_step_group() {
        let description = steps_description();
        for name in ["extract", "date_pair", "translate", "parse_hijri_date", "fork", "script_lang"] {
            assert!(description.contains(name), "missing {}", name);
        }
    }
}
