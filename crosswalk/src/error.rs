//! Error types for the crosswalk pipeline.
//!
//! Only two kinds of failure are real errors here:
//!
//! - [`ConfigError`] - a crosswalk declaration that cannot be loaded. Fatal, raised
//!   before any record is processed.
//! - [`StepError`] - an unexpected failure inside one step for one record. Caught at
//!   the field boundary by the engine, logged, and counted in the batch report.
//!
//! A missing path ("extraction miss") or an unrecognized date or vocabulary term
//! ("parse failure") is not an error: the step simply yields no value.
//!
//! [`ReaderError`] and [`PipelineError`] belong to the collaborator layers (source
//! readers and the CLI). Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors raised while loading and compiling a crosswalk configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration is not valid JSON or does not match the declaration types.
    #[error("Invalid crosswalk JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read.
    #[error("Failed to read crosswalk file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration failed schema validation.
    #[error("Crosswalk does not match schema: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    /// A field declares no steps at all.
    #[error("Field '{0}' has an empty step chain")]
    EmptyChain(String),

    /// A terminal step (`lang`, `script_lang`, `fork`) is followed by other steps.
    #[error("Field '{field}': step '{step}' must be the last step of its chain")]
    MisplacedTerminal { field: String, step: String },

    /// A step is not allowed in this position (e.g. `extract` in a derivation).
    #[error("Field '{field}': step '{step}' is not allowed here: {reason}")]
    StepNotAllowed {
        field: String,
        step: String,
        reason: String,
    },

    /// An extractor path could not be compiled.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A regex pattern could not be compiled.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A `translate` step names a table that was never loaded.
    #[error("Unknown vocabulary table: {0}")]
    UnknownVocabulary(String),

    /// A vocabulary table resource is malformed.
    #[error("Invalid vocabulary table '{name}': {reason}")]
    InvalidVocabulary { name: String, reason: String },

    /// A post-merge derivation is inconsistent with the rest of the crosswalk.
    #[error("Invalid derivation '{field}': {reason}")]
    InvalidDerivation { field: String, reason: String },

    /// The merge list names a field that no chain writes.
    #[error("Merge list names unknown field '{0}'")]
    UnknownMergeField(String),
}

// =============================================================================
// Step Errors
// =============================================================================

/// Unexpected failure of one step while evaluating one field of one record.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StepError {
    /// `to_number` met a value with no numeric reading.
    #[error("Value '{0}' is not numeric")]
    NotNumeric(String),

    /// A step received a value shape it cannot work with.
    #[error("Step '{step}' cannot handle {found}")]
    TypeMismatch { step: &'static str, found: String },

    /// A date step received a value that is not a date range.
    #[error("Step '{step}' expects a date range, found {found}")]
    NotADateRange { step: &'static str, found: String },

    /// `expand_years` met a range wider than it will enumerate.
    #[error("Range {range} spans more than {limit} years")]
    SpanTooLarge { range: String, limit: u32 },
}

// =============================================================================
// Reader Errors
// =============================================================================

/// Errors from the in-memory source readers.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Malformed CSV text.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Malformed JSON text.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed XML text.
    #[error("XML error at byte {position}: {message}")]
    Xml { position: u64, message: String },

    /// A MARC-in-JSON document with an unexpected shape.
    #[error("MARC error: {0}")]
    Marc(String),

    /// Input held no records at all.
    #[error("Input contains no records")]
    Empty,
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors for the CLI and other whole-run callers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Crosswalk configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Source reader error.
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Output serialization error.
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for step execution.
pub type StepResult<T> = Result<T, StepError>;

/// Result type for source readers.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type for whole-run operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
