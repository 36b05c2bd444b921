//! DSL for declarative field chains
//!
//! This module provides:
//! - `steps`: Step declarations as they appear in crosswalk JSON
//! - `crosswalk`: The crosswalk declaration (settings, fields, merge, derivations)
//! - `compile`: Load-time compilation of chains
//! - `ops`: Value operations behind the compiled steps
//! - `executor`: The engine that runs chains per record
//!
//! ## Usage Flow
//!
//! ```text
//! crosswalk JSON → schema check → CrosswalkConfig → Engine::new (compile) → process_record
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use crosswalk::source::JsonExtractor;
//! use crosswalk::transform::dsl::{CrosswalkConfig, Engine, FieldSpec};
//! use serde_json::json;
//!
//! let config = CrosswalkConfig::new()
//!     .with_field(FieldSpec::from_path("cho_title", "title").with_lang("en"));
//! let engine = Engine::new(&config, JsonExtractor)?;
//!
//! let (record, failures) = engine.process_record(&json!({ "title": "Diwan" }), 0);
//! assert_eq!(record.to_json(), json!({ "cho_title": ["Diwan"] }));
//! assert!(failures.is_empty());
//! ```

pub mod compile;
pub mod crosswalk;
pub mod executor;
pub mod ops;
pub mod steps;

// Re-exports for convenience
pub use compile::{compile_chain, Chain, CompileContext, CompiledStep};
pub use crosswalk::{example_crosswalk, CrosswalkConfig, Derivation, FieldSpec, Settings, WriterKind};
pub use executor::{CompiledDerivation, CompiledField, Engine};
pub use ops::{DateOp, ListOp, TextOp};
pub use steps::{steps_description, Step};
