//! Transformation module.
//!
//! This module turns source records into output records:
//! - DSL: Step declarations, crosswalk config, compiler and engine
//! - Context: Per-record output and clipboard
//! - Merger: End-of-record language merge
//! - Pipeline: Batch processing and writers

pub mod context;
pub mod dsl;
pub mod merger;
pub mod pipeline;

pub use context::RecordContext;
pub use dsl::*;
pub use merger::{group_by_language, merge_fields};
pub use pipeline::*;
