//! Per-record evaluation state.

use serde_json::Value;
use std::collections::HashMap;

use crate::models::{value_text, OutputRecord};

/// State shared by every field chain of one record: the output being built
/// and the clipboard.
///
/// Created per record and discarded once the record is emitted.
#[derive(Debug, Default)]
pub struct RecordContext {
    index: usize,
    output: OutputRecord,
    clipboard: HashMap<String, Vec<Value>>,
}

impl RecordContext {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// Position of the record in its batch.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn output(&self) -> &OutputRecord {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputRecord {
        &mut self.output
    }

    pub fn into_output(self) -> OutputRecord {
        self.output
    }

    /// Values stored in a clipboard slot; empty if never written.
    pub fn clipboard(&self, slot: &str) -> &[Value] {
        self.clipboard.get(slot).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Overwrite a clipboard slot.
    pub fn set_clipboard(&mut self, slot: &str, values: Vec<Value>) {
        self.clipboard.insert(slot.to_string(), values);
    }

    /// Identifier used in logs: first value of `slot`, or `#index`.
    pub fn record_id(&self, slot: Option<&str>) -> String {
        slot.and_then(|s| self.clipboard(s).first())
            .map(value_text)
            .unwrap_or_else(|| format!("#{}", self.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clipboard_slots() {
        let mut ctx = RecordContext::new(3);
        assert!(ctx.clipboard("id").is_empty());

        ctx.set_clipboard("id", vec![json!("MS-42"), json!("alt")]);
        assert_eq!(ctx.clipboard("id"), &[json!("MS-42"), json!("alt")]);

        ctx.set_clipboard("id", vec![json!("MS-43")]);
        assert_eq!(ctx.clipboard("id").len(), 1);
    }

    #[test]
    fn test_record_id_fallback() {
        let mut ctx = RecordContext::new(7);
        assert_eq!(ctx.record_id(None), "#7");
        assert_eq!(ctx.record_id(Some("id")), "#7");

        ctx.set_clipboard("id", vec![json!(1042)]);
        assert_eq!(ctx.record_id(Some("id")), "1042");
    }
}
