//! # Crosswalk - heritage metadata normalization
//!
//! Crosswalk turns metadata exported by museums, libraries and archives (JSON,
//! CSV, XML/MODS, MARC) into one multilingual record schema, driven by a
//! declarative crosswalk per provider.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Source text │────▶│   Reader    │────▶│   Engine    │────▶│   NDJSON    │
//! │ JSON/CSV/.. │     │ (per format)│     │ chains+merge│     │  (writer)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use crosswalk::{run_crosswalk, write_ndjson, CrosswalkConfig};
//!
//! let config = CrosswalkConfig::from_path("crosswalks/museum.json")?;
//! let report = run_crosswalk(&config, &std::fs::read_to_string("export.json")?)?;
//! write_ndjson(std::io::stdout().lock(), &report.records)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Date ranges, tagged values, output records
//! - [`dates`] - Date expression parser and calendar conversion
//! - [`source`] - Readers and extractor strategies per format
//! - [`vocab`] - Controlled-vocabulary tables
//! - [`transform`] - Step DSL, engine, merger and batch pipeline
//! - [`validation`] - Crosswalk schema and output checks

// Core modules
pub mod error;
pub mod models;

// Dates
pub mod dates;

// Sources
pub mod source;

// Vocabularies
pub mod vocab;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ConfigResult, PipelineError, PipelineResult, ReaderError, ReaderResult, StepError,
    StepResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{DateRange, FieldValues, OutputRecord, TaggedValue};

// =============================================================================
// Re-exports - Dates
// =============================================================================

pub use dates::{
    from_hijri, gregorian_to_solar_hijri, normalize_digits, solar_hijri_to_gregorian, to_hijri,
    Calendar, DateParser, ParsedDate, RangePolicy, SolarHijriDate,
};

// =============================================================================
// Re-exports - Sources
// =============================================================================

pub use source::{
    read_csv, read_json, read_marc_json, read_xml, CsvExtractor, CsvRow, Extractor, JsonExtractor,
    MarcExtractor, MarcRecord, ReaderKind, XmlExtractor, XmlNode,
};

// =============================================================================
// Re-exports - Vocabularies
// =============================================================================

pub use vocab::{MissPolicy, VocabTable, VocabularyRegistry};

// =============================================================================
// Re-exports - DSL
// =============================================================================

pub use transform::dsl::{
    example_crosswalk, steps_description, CrosswalkConfig, Derivation, Engine, FieldSpec, Settings,
    Step, WriterKind,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    process_batch, run_crosswalk, write_json, write_ndjson, write_records, BatchReport,
    FieldFailure,
};
pub use transform::{merge_fields, RecordContext};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{
    is_valid, is_valid_crosswalk_config, validate, validate_crosswalk_config,
    validate_output_record,
};
