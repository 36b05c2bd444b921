//! Source formats and their extractor strategies.
//!
//! Each format provides a record type, an in-memory reader that turns already
//! loaded text into records, and an [`Extractor`] that answers path lookups
//! against one record:
//!
//! | format | record | path language |
//! |--------|--------|---------------|
//! | JSON   | `serde_json::Value` | dotted path or JSON pointer |
//! | CSV    | [`CsvRow`] | column header |
//! | XML    | [`XmlNode`] | namespace-aware XPath subset |
//! | MARC   | [`MarcRecord`] | `245ab`, `245|1*|a`, `008[35-37]`, `LDR[6]` |
//!
//! Paths are compiled once, when the crosswalk is loaded, so a malformed path
//! is a configuration error and never a per-record failure.

pub mod csv;
pub mod json;
pub mod marc;
pub mod xml;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;

use crate::error::ConfigResult;

pub use self::csv::{read_csv, CsvColumn, CsvExtractor, CsvRow};
pub use self::json::{read_json, JsonExtractor, JsonPath};
pub use self::marc::{read_marc_json, MarcExtractor, MarcQuery, MarcRecord};
pub use self::xml::{read_xml, XPath, XmlExtractor, XmlNode};

/// Path lookup strategy for one source format.
///
/// The engine is generic over this trait and never looks inside a record.
pub trait Extractor {
    /// One source record.
    type Record;

    /// A compiled path.
    type Query: Clone + Debug;

    /// Short format name used in logs.
    fn name(&self) -> &'static str;

    /// Compile a path expression; a malformed path is a configuration error.
    fn compile(&self, path: &str) -> ConfigResult<Self::Query>;

    /// Every value found at `query`, in document order. Absent paths yield an
    /// empty list, never an error.
    fn extract(&self, record: &Self::Record, query: &Self::Query) -> Vec<Value>;
}

/// Which reader/extractor pair a crosswalk uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReaderKind {
    #[default]
    Json,
    Csv,
    Xml,
    Marc,
}

impl ReaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderKind::Json => "json",
            ReaderKind::Csv => "csv",
            ReaderKind::Xml => "xml",
            ReaderKind::Marc => "marc",
        }
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn squish(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
