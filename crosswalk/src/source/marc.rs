//! MARC records (MARC-in-JSON) and field-spec extraction.
//!
//! Spec grammar, several specs joined with `:`:
//!
//! - `245` - all subfields of every 245
//! - `245ab` - subfields `a` and `b`
//! - `245|1*|a` - indicator filter, `*` matches anything, `_`/`#` match blank
//! - `008[35-37]`, `LDR[6]` - character positions of a control field or the leader

use serde::Deserialize;
use serde_json::{Map, Value};

use super::Extractor;
use crate::error::{ConfigError, ConfigResult, ReaderError, ReaderResult};

#[derive(Debug, Clone, PartialEq)]
pub enum MarcField {
    Control {
        tag: String,
        value: String,
    },
    Data {
        tag: String,
        ind1: char,
        ind2: char,
        subfields: Vec<(char, String)>,
    },
}

impl MarcField {
    pub fn tag(&self) -> &str {
        match self {
            MarcField::Control { tag, .. } | MarcField::Data { tag, .. } => tag,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarcRecord {
    pub leader: String,
    pub fields: Vec<MarcField>,
}

// MARC-in-JSON wire shape.
#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    leader: String,
    #[serde(default)]
    fields: Vec<Map<String, Value>>,
}

#[derive(Deserialize)]
struct RawDataField {
    #[serde(default)]
    ind1: Option<String>,
    #[serde(default)]
    ind2: Option<String>,
    #[serde(default)]
    subfields: Vec<Map<String, Value>>,
}

fn indicator(raw: Option<&str>) -> char {
    raw.and_then(|s| s.chars().next()).unwrap_or(' ')
}

impl MarcRecord {
    pub fn from_value(value: Value) -> ReaderResult<Self> {
        let raw: RawRecord = serde_json::from_value(value)?;
        let mut fields = Vec::new();

        for entry in raw.fields {
            for (tag, content) in entry {
                let field = match content {
                    Value::String(value) => MarcField::Control { tag, value },
                    other @ Value::Object(_) => {
                        let data: RawDataField = serde_json::from_value(other)?;
                        let mut subfields = Vec::new();
                        for sub in data.subfields {
                            for (code, value) in sub {
                                let Some(code) = code.chars().next() else {
                                    continue;
                                };
                                if let Value::String(text) = value {
                                    subfields.push((code, text));
                                }
                            }
                        }
                        MarcField::Data {
                            tag,
                            ind1: indicator(data.ind1.as_deref()),
                            ind2: indicator(data.ind2.as_deref()),
                            subfields,
                        }
                    }
                    other => {
                        return Err(ReaderError::Marc(format!(
                            "field {} has unexpected content {}",
                            tag, other
                        )))
                    }
                };
                fields.push(field);
            }
        }

        Ok(Self {
            leader: raw.leader,
            fields,
        })
    }
}

/// Read MARC-in-JSON: one record object or an array of them.
pub fn read_marc_json(text: &str) -> ReaderResult<Vec<MarcRecord>> {
    if text.trim().is_empty() {
        return Err(ReaderError::Empty);
    }
    let records = match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => items
            .into_iter()
            .map(MarcRecord::from_value)
            .collect::<ReaderResult<Vec<_>>>()?,
        single @ Value::Object(_) => vec![MarcRecord::from_value(single)?],
        other => return Err(ReaderError::Marc(format!("expected object or array, found {}", other))),
    };
    if records.is_empty() {
        return Err(ReaderError::Empty);
    }
    Ok(records)
}

// =============================================================================
// Specs
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum MarcSpec {
    Leader {
        range: Option<(usize, usize)>,
    },
    Control {
        tag: String,
        range: Option<(usize, usize)>,
    },
    Data {
        tag: String,
        ind1: Option<char>,
        ind2: Option<char>,
        codes: Option<Vec<char>>,
    },
}

/// A compiled `:`-joined list of specs.
#[derive(Debug, Clone, PartialEq)]
pub struct MarcQuery {
    specs: Vec<MarcSpec>,
}

fn is_control_tag(tag: &str) -> bool {
    tag.starts_with("00")
}

fn parse_range(raw: &str) -> Result<(usize, usize), String> {
    let inner = raw
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .ok_or_else(|| format!("malformed position '{}'", raw))?;
    let (from, to) = match inner.split_once('-') {
        Some((a, b)) => (a, b),
        None => (inner, inner),
    };
    let from: usize = from.trim().parse().map_err(|_| format!("bad position '{}'", inner))?;
    let to: usize = to.trim().parse().map_err(|_| format!("bad position '{}'", inner))?;
    if to < from {
        return Err(format!("reversed position range '{}'", inner));
    }
    Ok((from, to))
}

fn parse_indicator(c: char) -> Option<char> {
    match c {
        '*' => None,
        '_' | '#' => Some(' '),
        other => Some(other),
    }
}

fn parse_spec(raw: &str) -> Result<MarcSpec, String> {
    let raw = raw.trim();
    if raw.len() < 3 || !raw.is_char_boundary(3) {
        return Err("tag must have three characters".into());
    }
    let (tag, rest) = raw.split_at(3);
    if !tag.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("invalid tag '{}'", tag));
    }

    if tag == "LDR" {
        let range = (!rest.is_empty()).then(|| parse_range(rest)).transpose()?;
        return Ok(MarcSpec::Leader { range });
    }
    if is_control_tag(tag) {
        let range = (!rest.is_empty()).then(|| parse_range(rest)).transpose()?;
        return Ok(MarcSpec::Control {
            tag: tag.to_string(),
            range,
        });
    }

    let (ind1, ind2, codes) = match rest.strip_prefix('|') {
        Some(after) => {
            let (indicators, codes) = after
                .split_once('|')
                .ok_or_else(|| "unclosed indicator block".to_string())?;
            let chars: Vec<char> = indicators.chars().collect();
            let [i1, i2] = chars.as_slice() else {
                return Err(format!("indicator block '{}' needs two characters", indicators));
            };
            (parse_indicator(*i1), parse_indicator(*i2), codes)
        }
        None => (None, None, rest),
    };

    if !codes.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("invalid subfield codes '{}'", codes));
    }
    let codes = (!codes.is_empty()).then(|| codes.chars().collect());
    Ok(MarcSpec::Data {
        tag: tag.to_string(),
        ind1,
        ind2,
        codes,
    })
}

impl MarcQuery {
    pub fn parse(path: &str) -> ConfigResult<Self> {
        let invalid = |reason: String| ConfigError::InvalidPath {
            path: path.to_string(),
            reason,
        };
        if path.trim().is_empty() {
            return Err(invalid("spec is empty".into()));
        }
        let specs = path
            .split(':')
            .map(parse_spec)
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        Ok(Self { specs })
    }
}

fn slice_chars(value: &str, range: Option<(usize, usize)>) -> Option<String> {
    match range {
        None => Some(value.to_string()),
        Some((from, to)) => {
            let chars: Vec<char> = value.chars().collect();
            if from >= chars.len() {
                return None;
            }
            let to = to.min(chars.len() - 1);
            Some(chars[from..=to].iter().collect())
        }
    }
}

/// Extractor for MARC records.
///
/// With a subfield separator, the selected subfields of one field are joined
/// into one value; without one each subfield is its own value.
#[derive(Debug, Clone)]
pub struct MarcExtractor {
    subfield_separator: Option<String>,
}

impl Default for MarcExtractor {
    fn default() -> Self {
        Self {
            subfield_separator: Some(" ".to_string()),
        }
    }
}

impl MarcExtractor {
    pub fn new(subfield_separator: Option<String>) -> Self {
        Self { subfield_separator }
    }
}

impl Extractor for MarcExtractor {
    type Record = MarcRecord;
    type Query = MarcQuery;

    fn name(&self) -> &'static str {
        "marc"
    }

    fn compile(&self, path: &str) -> ConfigResult<MarcQuery> {
        MarcQuery::parse(path)
    }

    fn extract(&self, record: &MarcRecord, query: &MarcQuery) -> Vec<Value> {
        let mut out = Vec::new();
        for spec in &query.specs {
            match spec {
                MarcSpec::Leader { range } => out.extend(slice_chars(&record.leader, *range)),
                MarcSpec::Control { tag, range } => {
                    for field in &record.fields {
                        if let MarcField::Control { tag: t, value } = field {
                            if t == tag {
                                out.extend(slice_chars(value, *range));
                            }
                        }
                    }
                }
                MarcSpec::Data {
                    tag,
                    ind1,
                    ind2,
                    codes,
                } => {
                    for field in &record.fields {
                        let MarcField::Data {
                            tag: t,
                            ind1: i1,
                            ind2: i2,
                            subfields,
                        } = field
                        else {
                            continue;
                        };
                        if t != tag || ind1.is_some_and(|c| c != *i1) || ind2.is_some_and(|c| c != *i2) {
                            continue;
                        }
                        let selected = subfields
                            .iter()
                            .filter(|(code, _)| codes.as_ref().map_or(true, |cs| cs.contains(code)))
                            .map(|(_, value)| value.trim())
                            .filter(|v| !v.is_empty());
                        match &self.subfield_separator {
                            Some(sep) => {
                                let joined = selected.collect::<Vec<_>>().join(sep);
                                if !joined.is_empty() {
                                    out.push(joined);
                                }
                            }
                            None => out.extend(selected.map(str::to_string)),
                        }
                    }
                }
            }
        }
        out.into_iter()
            .filter(|v| !v.trim().is_empty())
            .map(Value::String)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> MarcRecord {
        MarcRecord::from_value(json!({
            "leader": "00714cam a2200205 a 4500",
            "fields": [
                { "001": "ocm12345" },
                { "008": "850101s1887    ua            000 0 ara d" },
                { "100": { "ind1": "0", "ind2": " ", "subfields": [{ "a": "Ibn Sina," }, { "d": "980-1037" }] } },
                { "245": { "ind1": "1", "ind2": "0", "subfields": [
                    { "a": "Kitab al-Shifa /" }, { "b": "al-Ilahiyat" }, { "c": "Ibn Sina." }
                ] } },
                { "650": { "ind1": " ", "ind2": "0", "subfields": [{ "a": "Medicine" }] } },
                { "650": { "ind1": " ", "ind2": "7", "subfields": [{ "a": "طب" }] } }
            ]
        }))
        .unwrap()
    }

    fn extract(spec: &str) -> Vec<Value> {
        let extractor = MarcExtractor::default();
        let query = extractor.compile(spec).unwrap();
        extractor.extract(&record(), &query)
    }

    #[test]
    fn test_subfield_selection() {
        assert_eq!(extract("245ab"), vec![json!("Kitab al-Shifa / al-Ilahiyat")]);
        assert_eq!(extract("245"), vec![json!("Kitab al-Shifa / al-Ilahiyat Ibn Sina.")]);
        assert_eq!(extract("100a"), vec![json!("Ibn Sina,")]);
    }

    #[test]
    fn test_indicator_filter() {
        assert_eq!(extract("650|*0|a"), vec![json!("Medicine")]);
        assert_eq!(extract("650|_7|a"), vec![json!("طب")]);
        assert_eq!(extract("650a"), vec![json!("Medicine"), json!("طب")]);
    }

    #[test]
    fn test_control_fields_and_leader() {
        assert_eq!(extract("001"), vec![json!("ocm12345")]);
        assert_eq!(extract("008[35-37]"), vec![json!("ara")]);
        assert_eq!(extract("008[7-10]"), vec![json!("1887")]);
        assert_eq!(extract("LDR[6]"), vec![json!("a")]);
    }

    #[test]
    fn test_joined_specs_in_order() {
        assert_eq!(extract("100a:650a"), vec![json!("Ibn Sina,"), json!("Medicine"), json!("طب")]);
    }

    #[test]
    fn test_separate_subfields_without_separator() {
        let extractor = MarcExtractor::new(None);
        let query = extractor.compile("245ab").unwrap();
        assert_eq!(
            extractor.extract(&record(), &query),
            vec![json!("Kitab al-Shifa /"), json!("al-Ilahiyat")]
        );
    }

    #[test]
    fn test_absent_field_is_empty() {
        assert!(extract("520a").is_empty());
        assert!(extract("008[90]").is_empty());
    }

    #[test]
    fn test_malformed_specs_rejected() {
        for bad in ["", "24", "245|1|a", "245|10a", "008[5-2]", "008[x]", "2!5a"] {
            assert!(MarcQuery::parse(bad).is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn test_read_marc_json() {
        let text = r#"[{"leader":"x","fields":[{"001":"a"}]},{"leader":"y","fields":[]}]"#;
        let records = read_marc_json(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].fields[0].tag(), "001");
        assert!(matches!(read_marc_json("[]"), Err(ReaderError::Empty)));
        assert!(matches!(read_marc_json("3"), Err(ReaderError::Marc(_))));
        assert!(matches!(
            read_marc_json(r#"{"fields":[{"245":5}]}"#),
            Err(ReaderError::Marc(_))
        ));
    }
}
