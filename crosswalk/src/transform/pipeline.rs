//! Batch processing and output writers.
//!
//! This module runs a compiled crosswalk over every record of a batch and
//! writes the results:
//!
//! ```text
//! source text → read_* → Vec<Record> → process_batch → BatchReport → write_ndjson
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use crosswalk::{run_crosswalk, write_ndjson, CrosswalkConfig};
//!
//! let config = CrosswalkConfig::from_path("crosswalks/museum.json")?;
//! let report = run_crosswalk(&config, &std::fs::read_to_string("export.json")?)?;
//! println!("{}", report.summary());
//! write_ndjson(std::io::stdout().lock(), &report.records)?;
//! ```

use indexmap::IndexMap;
use serde::Serialize;
use std::io::Write;
use tracing::info;

use super::dsl::crosswalk::{CrosswalkConfig, WriterKind};
use super::dsl::executor::Engine;
use crate::error::PipelineResult;
use crate::models::OutputRecord;
use crate::source::{read_csv, read_json, read_marc_json, read_xml, Extractor, JsonExtractor, ReaderKind};

/// A field whose chain failed for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldFailure {
    pub record_index: usize,
    pub record_id: String,
    pub field: String,
    pub message: String,
}

/// Result of running a crosswalk over a batch
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One output record per source record, in input order
    pub records: Vec<OutputRecord>,
    /// Field failures, in the order they occurred
    pub failures: Vec<FieldFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if every field of every record evaluated cleanly
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of distinct records with at least one failed field
    pub fn failed_records(&self) -> usize {
        let mut indices: Vec<usize> = self.failures.iter().map(|f| f.record_index).collect();
        indices.dedup();
        indices.len()
    }

    /// Failure count per field, in first-failure order
    pub fn failure_counts(&self) -> IndexMap<String, usize> {
        let mut counts = IndexMap::new();
        for failure in &self.failures {
            *counts.entry(failure.field.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Processed: {} records, {} field failures in {} records",
            self.records.len(),
            self.failures.len(),
            self.failed_records()
        )
    }
}

/// Run an engine over every record of a batch.
///
/// Failures never stop the batch; each record is emitted with whatever its
/// healthy fields produced.
pub fn process_batch<E: Extractor>(engine: &Engine<E>, records: &[E::Record]) -> BatchReport {
    let mut report = BatchReport::new();
    for (index, record) in records.iter().enumerate() {
        let (output, failures) = engine.process_record(record, index);
        report.records.push(output);
        report.failures.extend(failures);
    }

    info!(reader = engine.extractor().name(), "{}", report.summary());
    for (field, count) in report.failure_counts() {
        info!(field = %field, count, "Field failure count");
    }
    report
}

/// Read `input` with the crosswalk's reader, then run the batch.
pub fn run_crosswalk(config: &CrosswalkConfig, input: &str) -> PipelineResult<BatchReport> {
    let settings = &config.settings;
    let report = match settings.reader {
        ReaderKind::Json => {
            let engine = Engine::new(config, JsonExtractor)?;
            process_batch(&engine, &read_json(input)?)
        }
        ReaderKind::Csv => {
            let engine = Engine::new(config, settings.csv_extractor())?;
            process_batch(&engine, &read_csv(input, settings.csv_delimiter_byte())?)
        }
        ReaderKind::Xml => {
            let engine = Engine::new(config, settings.xml_extractor())?;
            process_batch(&engine, &read_xml(input, settings.xml_record_element.as_deref())?)
        }
        ReaderKind::Marc => {
            let engine = Engine::new(config, settings.marc_extractor())?;
            process_batch(&engine, &read_marc_json(input)?)
        }
    };
    Ok(report)
}

/// Write one JSON object per line.
pub fn write_ndjson<W: Write>(mut writer: W, records: &[OutputRecord]) -> PipelineResult<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Write all records as one pretty-printed JSON array.
pub fn write_json<W: Write>(mut writer: W, records: &[OutputRecord]) -> PipelineResult<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Write records in the given format.
pub fn write_records<W: Write>(writer: W, kind: WriterKind, records: &[OutputRecord]) -> PipelineResult<()> {
    match kind {
        WriterKind::Ndjson => write_ndjson(writer, records),
        WriterKind::Json => write_json(writer, records),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{PipelineError, ReaderError};
    use serde_json::{json, Value};

    fn config(value: Value) -> CrosswalkConfig {
        CrosswalkConfig::from_value(&value).unwrap()
    }

    #[test]
    fn test_process_batch_keeps_going_after_failures() {
        let cfg = config(json!({
            "fields": [
                { "name": "cho_extent", "steps": [{ "type": "extract", "path": "pages" }, { "type": "to_number" }] },
                { "name": "cho_title", "steps": [{ "type": "extract", "path": "title" }] }
            ]
        }));
        let engine = Engine::new(&cfg, JsonExtractor).unwrap();
        let records = vec![
            json!({ "pages": "12", "title": "A" }),
            json!({ "pages": "xii", "title": "B" }),
            json!({ "pages": "n/a", "title": "C" }),
        ];

        let report = process_batch(&engine, &records);
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[0].to_json(), json!({ "cho_extent": [12], "cho_title": ["A"] }));
        assert_eq!(report.records[1].to_json(), json!({ "cho_title": ["B"] }));
        assert!(!report.is_ok());
        assert_eq!(report.failed_records(), 2);
        assert_eq!(report.failure_counts()["cho_extent"], 2);
        assert_eq!(report.failures[1].record_id, "#2");
        assert!(report.summary().contains("3 records"));
    }

    #[test]
    fn test_out_of_range_years_do_not_stop_batch() {
        let cfg = config(json!({
            "fields": [
                { "name": "cho_date_range_hijri", "steps": [
                    { "type": "extract", "path": "date" },
                    { "type": "parse_date" },
                    { "type": "to_hijri" }
                ]}
            ]
        }));
        let engine = Engine::new(&cfg, JsonExtractor).unwrap();
        let records = vec![
            json!({ "date": { "start": 2_147_483_647, "end": 2_147_483_647 } }),
            json!({ "date": "1850" }),
        ];

        let report = process_batch(&engine, &records);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].to_json(), json!({}));
        let hijri = crate::dates::to_hijri(crate::models::DateRange::single(1850)).unwrap();
        assert_eq!(report.records[1].to_json(), json!({ "cho_date_range_hijri": [hijri.to_value()] }));
    }

    #[test]
    fn test_run_crosswalk_csv() {
        let cfg = config(json!({
            "settings": { "reader": "csv", "csv_multi_value_separator": "|" },
            "fields": [
                { "name": "cho_title", "steps": [{ "type": "extract", "path": "Title" }, { "type": "lang", "tag": "en" }] },
                { "name": "cho_subject", "steps": [{ "type": "extract", "path": "Subjects" }] }
            ]
        }));
        let input = "Title,Subjects\nDiwan,Poetry|Persian\nUntitled,\n";

        let report = run_crosswalk(&cfg, input).unwrap();
        assert!(report.is_ok());
        assert_eq!(
            report.records[0].to_json(),
            json!({ "cho_title": ["Diwan"], "cho_subject": ["Poetry", "Persian"] })
        );
        assert_eq!(report.records[1].to_json(), json!({ "cho_title": ["Untitled"] }));
    }

    #[test]
    fn test_run_crosswalk_reader_errors() {
        let cfg = config(json!({ "fields": [] }));
        let err = run_crosswalk(&cfg, "   ").unwrap_err();
        assert!(matches!(err, PipelineError::Reader(ReaderError::Empty)));

        let bad = config(json!({
            "fields": [{ "name": "x", "steps": [{ "type": "translate", "table": "nope" }] }]
        }));
        assert!(matches!(run_crosswalk(&bad, "{}"), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_writers() {
        let mut record = OutputRecord::new();
        record.append(
            "cho_title",
            vec![crate::models::TaggedValue::new(json!("Diwan"), Some("en".into()))],
            true,
            "none",
        );
        let records = vec![record.clone(), record];

        let mut ndjson = Vec::new();
        write_ndjson(&mut ndjson, &records).unwrap();
        let text = String::from_utf8(ndjson).unwrap();
        assert_eq!(text, "{\"cho_title\":[\"Diwan\"]}\n{\"cho_title\":[\"Diwan\"]}\n");

        let mut pretty = Vec::new();
        write_records(&mut pretty, WriterKind::Json, &records).unwrap();
        let parsed: Value = serde_json::from_slice(&pretty).unwrap();
        assert_eq!(parsed.as_array().map(Vec::len), Some(2));
    }
}
