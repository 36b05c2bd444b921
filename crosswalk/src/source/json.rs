//! JSON records and dotted-path / JSON-pointer extraction.

use serde_json::Value;

use super::Extractor;
use crate::error::{ConfigError, ConfigResult, ReaderError, ReaderResult};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Key(String),
    Index(usize),
}

/// A compiled JSON path.
///
/// Dotted paths (`record.titles.value`) fan out over arrays met on a name
/// segment; numeric segments (`titles.0`) index into arrays. Paths starting
/// with `/` are JSON pointers and never fan out.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonPath {
    segments: Vec<Segment>,
    pointer: bool,
}

impl JsonPath {
    pub fn parse(path: &str) -> ConfigResult<Self> {
        let invalid = |reason: &str| ConfigError::InvalidPath {
            path: path.to_string(),
            reason: reason.to_string(),
        };

        if path.trim().is_empty() {
            return Err(invalid("path is empty"));
        }

        if let Some(pointer) = path.strip_prefix('/') {
            let segments = pointer
                .split('/')
                .map(|s| Segment::Key(s.replace("~1", "/").replace("~0", "~")))
                .collect();
            return Ok(Self {
                segments,
                pointer: true,
            });
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            if part.is_empty() {
                return Err(invalid("empty segment"));
            }
            let segment = match part.parse::<usize>() {
                Ok(idx) => Segment::Index(idx),
                Err(_) => Segment::Key(part.to_string()),
            };
            segments.push(segment);
        }
        Ok(Self {
            segments,
            pointer: false,
        })
    }

    /// Every value at this path. Null values are skipped and a terminal array
    /// contributes its elements.
    pub fn find<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current: Vec<&Value> = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                self.step(value, segment, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        let mut found = Vec::new();
        for value in current {
            match value {
                Value::Null => {}
                Value::Array(items) => found.extend(items.iter().filter(|v| !v.is_null())),
                other => found.push(other),
            }
        }
        found
    }

    fn step<'a>(&self, value: &'a Value, segment: &Segment, out: &mut Vec<&'a Value>) {
        match (value, segment) {
            (Value::Object(map), Segment::Key(key)) => out.extend(map.get(key)),
            (Value::Object(map), Segment::Index(idx)) => out.extend(map.get(&idx.to_string())),
            (Value::Array(items), Segment::Index(idx)) => out.extend(items.get(*idx)),
            (Value::Array(items), Segment::Key(key)) if self.pointer => {
                if let Ok(idx) = key.parse::<usize>() {
                    out.extend(items.get(idx));
                }
            }
            (Value::Array(items), Segment::Key(_)) => {
                for item in items {
                    self.step(item, segment, out);
                }
            }
            _ => {}
        }
    }
}

/// Extractor for JSON records.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    type Record = Value;
    type Query = JsonPath;

    fn name(&self) -> &'static str {
        "json"
    }

    fn compile(&self, path: &str) -> ConfigResult<JsonPath> {
        JsonPath::parse(path)
    }

    fn extract(&self, record: &Value, query: &JsonPath) -> Vec<Value> {
        query.find(record).into_iter().cloned().collect()
    }
}

/// Read JSON records: a top-level array, a single object, or one object per line.
pub fn read_json(text: &str) -> ReaderResult<Vec<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ReaderError::Empty);
    }

    let records = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) => items,
        Ok(single) => vec![single],
        Err(whole_err) => {
            let lines: Result<Vec<Value>, _> = trimmed
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(serde_json::from_str)
                .collect();
            // Not NDJSON either: report the whole-document error.
            lines.map_err(|_| ReaderError::Json(whole_err))?
        }
    };

    if records.is_empty() {
        return Err(ReaderError::Empty);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(record: &Value, path: &str) -> Vec<Value> {
        let extractor = JsonExtractor;
        let query = extractor.compile(path).unwrap();
        extractor.extract(record, &query)
    }

    fn museum_record() -> Value {
        json!({
            "id": "obj-17",
            "title": { "en": "Silver dirham", "ar": "درهم فضي" },
            "makers": [
                { "name": "Mint of Baghdad", "role": "mint" },
                { "name": "Harun al-Rashid", "role": null }
            ],
            "keywords": ["coin", "silver", null],
            "dimensions": null
        })
    }

    #[test]
    fn test_nested_keys() {
        let record = museum_record();
        assert_eq!(extract(&record, "title.en"), vec![json!("Silver dirham")]);
        assert_eq!(extract(&record, "id"), vec![json!("obj-17")]);
    }

    #[test]
    fn test_arrays_fan_out_in_order() {
        let record = museum_record();
        assert_eq!(
            extract(&record, "makers.name"),
            vec![json!("Mint of Baghdad"), json!("Harun al-Rashid")]
        );
        assert_eq!(extract(&record, "makers.role"), vec![json!("mint")]);
    }

    #[test]
    fn test_numeric_segment_indexes() {
        let record = museum_record();
        assert_eq!(extract(&record, "makers.1.name"), vec![json!("Harun al-Rashid")]);
        assert_eq!(extract(&record, "keywords.0"), vec![json!("coin")]);
    }

    #[test]
    fn test_terminal_array_contributes_elements() {
        let record = museum_record();
        assert_eq!(extract(&record, "keywords"), vec![json!("coin"), json!("silver")]);
    }

    #[test]
    fn test_json_pointer() {
        let record = museum_record();
        assert_eq!(extract(&record, "/makers/0/role"), vec![json!("mint")]);
        assert!(extract(&record, "/makers/name").is_empty());
    }

    #[test]
    fn test_absent_and_null_paths_are_empty() {
        let record = museum_record();
        assert!(extract(&record, "dimensions").is_empty());
        assert!(extract(&record, "provenance.owner").is_empty());
        assert!(extract(&record, "title.en.value").is_empty());
    }

    #[test]
    fn test_malformed_paths_rejected() {
        assert!(matches!(JsonPath::parse(""), Err(ConfigError::InvalidPath { .. })));
        assert!(matches!(JsonPath::parse("a..b"), Err(ConfigError::InvalidPath { .. })));
    }

    #[test]
    fn test_read_json_shapes() {
        assert_eq!(read_json(r#"[{"a":1},{"a":2}]"#).unwrap().len(), 2);
        assert_eq!(read_json(r#"{"a":1}"#).unwrap().len(), 1);
        assert_eq!(read_json("{\"a\":1}\n\n{\"a\":2}\n").unwrap().len(), 2);
        assert!(matches!(read_json("  "), Err(ReaderError::Empty)));
        assert!(matches!(read_json("[]"), Err(ReaderError::Empty)));
        assert!(matches!(read_json("{not json"), Err(ReaderError::Json(_))));
    }
}
