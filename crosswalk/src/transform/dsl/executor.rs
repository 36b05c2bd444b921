//! DSL Executor
//!
//! Runs compiled field chains against one source record at a time.
//!
//! For each record the engine evaluates every field chain in declaration
//! order, merges the listed fields into language-hashes, then runs the
//! post-merge derivations. A step error ends its own field only: it is logged
//! with the record id and field name and returned as a [`FieldFailure`].

use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, debug_span, warn};

use super::compile::{compile_chain, Chain, CompileContext, CompiledStep};
use super::crosswalk::{CrosswalkConfig, Settings};
use super::ops::{has_arabic_script, is_blank, to_number};
use crate::dates::DateParser;
use crate::error::{ConfigError, ConfigResult, StepResult};
use crate::models::{value_text, FieldValues, OutputRecord, TaggedValue};
use crate::source::Extractor;
use crate::transform::context::RecordContext;
use crate::transform::merger::merge_fields;
use crate::transform::pipeline::FieldFailure;
use crate::vocab::VocabularyRegistry;

/// A field chain ready to run.
#[derive(Debug, Clone)]
pub struct CompiledField<Q> {
    pub name: String,
    pub chain: Chain<Q>,
}

/// A post-merge chain seeded from another field.
#[derive(Debug, Clone)]
pub struct CompiledDerivation<Q> {
    pub name: String,
    pub from: String,
    pub language: Option<String>,
    pub chain: Chain<Q>,
}

/// What a step hands back to the chain loop.
enum Flow {
    /// Keep going with these values.
    Continue(Vec<Value>),
    /// A guard failed; the field contributes nothing.
    Halt,
    /// A terminal step tagged the final values.
    Emit(Vec<TaggedValue>),
}

/// A compiled crosswalk bound to one extractor. Read-only once built.
pub struct Engine<E: Extractor> {
    extractor: E,
    settings: Settings,
    fields: Vec<CompiledField<E::Query>>,
    derivations: Vec<CompiledDerivation<E::Query>>,
    merge_declared: Vec<String>,
    merge_derived: Vec<String>,
    vocabularies: VocabularyRegistry,
    dates: DateParser,
}

impl<E: Extractor> Engine<E> {
    /// Compile a crosswalk against the built-in vocabulary tables plus the
    /// crosswalk's own.
    pub fn new(config: &CrosswalkConfig, extractor: E) -> ConfigResult<Self> {
        Self::with_vocabulary(config, extractor, VocabularyRegistry::builtin()?)
    }

    /// Compile a crosswalk against a caller-supplied registry. The
    /// crosswalk's own tables are added on top.
    pub fn with_vocabulary(
        config: &CrosswalkConfig,
        extractor: E,
        mut vocabularies: VocabularyRegistry,
    ) -> ConfigResult<Self> {
        vocabularies.extend(config.vocabularies.clone());

        let mut fields = Vec::with_capacity(config.fields.len());
        for spec in &config.fields {
            let ctx = CompileContext::new(&extractor, &vocabularies, &spec.name);
            fields.push(CompiledField {
                name: spec.name.clone(),
                chain: compile_chain(&spec.steps, &ctx)?,
            });
        }

        let declared: HashSet<&str> = config.fields.iter().map(|f| f.name.as_str()).collect();
        let mut derived: HashSet<&str> = HashSet::new();
        let mut derivations = Vec::with_capacity(config.derive.len());
        for derivation in &config.derive {
            let name = derivation.name.as_str();
            if declared.contains(name) || derived.contains(name) {
                return Err(ConfigError::InvalidDerivation {
                    field: name.to_string(),
                    reason: "name is already used by another field".to_string(),
                });
            }
            let from = derivation.from.as_str();
            if !declared.contains(from) && !derived.contains(from) {
                return Err(ConfigError::InvalidDerivation {
                    field: name.to_string(),
                    reason: format!("source field '{}' is not declared before it", from),
                });
            }
            let ctx = CompileContext::new(&extractor, &vocabularies, name).for_derivation();
            derivations.push(CompiledDerivation {
                name: derivation.name.clone(),
                from: derivation.from.clone(),
                language: derivation.language.clone(),
                chain: compile_chain(&derivation.steps, &ctx)?,
            });
            derived.insert(name);
        }

        let mut merge_declared = Vec::new();
        let mut merge_derived = Vec::new();
        for name in &config.merge {
            if declared.contains(name.as_str()) {
                merge_declared.push(name.clone());
            } else if derived.contains(name.as_str()) {
                merge_derived.push(name.clone());
            } else {
                return Err(ConfigError::UnknownMergeField(name.clone()));
            }
        }

        let dates = DateParser::new(config.settings.date_range_policy);
        Ok(Self {
            extractor,
            settings: config.settings.clone(),
            fields,
            derivations,
            merge_declared,
            merge_derived,
            vocabularies,
            dates,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    pub fn fields(&self) -> &[CompiledField<E::Query>] {
        &self.fields
    }

    /// Evaluate one field chain and append its values to the output.
    pub fn evaluate(
        &self,
        field: &CompiledField<E::Query>,
        record: &E::Record,
        ctx: &mut RecordContext,
    ) -> StepResult<()> {
        let values = self.run_chain(&field.name, &field.chain, record, ctx, Vec::new())?;
        ctx.output_mut().append(
            &field.name,
            values,
            self.settings.allow_duplicate_values,
            &self.settings.default_language,
        );
        Ok(())
    }

    /// Build the output record for one source record.
    ///
    /// The record is always produced; fields whose chain failed are missing
    /// from it and listed in the returned failures.
    pub fn process_record(&self, record: &E::Record, index: usize) -> (OutputRecord, Vec<FieldFailure>) {
        let span = debug_span!("record", index, reader = self.extractor.name());
        let _enter = span.enter();

        let mut ctx = RecordContext::new(index);
        let mut failures = Vec::new();

        for field in &self.fields {
            if let Err(e) = self.evaluate(field, record, &mut ctx) {
                failures.push(self.failure(&ctx, &field.name, e.to_string()));
            }
        }

        let default_language = self.settings.default_language.as_str();
        merge_fields(ctx.output_mut(), &self.merge_declared, default_language);

        for derivation in &self.derivations {
            let seed = self.derivation_seed(derivation, ctx.output());
            match self.run_chain(&derivation.name, &derivation.chain, record, &mut ctx, seed) {
                Ok(values) => ctx.output_mut().append(
                    &derivation.name,
                    values,
                    self.settings.allow_duplicate_values,
                    default_language,
                ),
                Err(e) => failures.push(self.failure(&ctx, &derivation.name, e.to_string())),
            }
        }

        merge_fields(ctx.output_mut(), &self.merge_derived, default_language);
        (ctx.into_output(), failures)
    }

    fn failure(&self, ctx: &RecordContext, field: &str, message: String) -> FieldFailure {
        let record_id = ctx.record_id(self.settings.record_id.as_deref());
        warn!(record_id = %record_id, field, error = %message, "Field failed");
        FieldFailure {
            record_index: ctx.index(),
            record_id,
            field: field.to_string(),
            message,
        }
    }

    /// Values of the derivation's source field, optionally one language only.
    fn derivation_seed(&self, derivation: &CompiledDerivation<E::Query>, output: &OutputRecord) -> Vec<Value> {
        let Some(values) = output.get(&derivation.from) else {
            return Vec::new();
        };
        match (values, derivation.language.as_deref()) {
            (FieldValues::Languages(langs), Some(lang)) => langs
                .get(lang)
                .map(|list| list.iter().cloned().map(Value::String).collect())
                .unwrap_or_default(),
            (FieldValues::Flat(flat), Some(lang)) => flat
                .iter()
                .filter(|v| v.lang.as_deref() == Some(lang))
                .map(|v| v.value.clone())
                .collect(),
            (FieldValues::Flat(flat), None) => flat.iter().map(|v| v.value.clone()).collect(),
            (languages, None) => languages.texts().into_iter().map(Value::String).collect(),
        }
    }

    /// Run a chain from an initial accumulator.
    ///
    /// When a value-producing step leaves nothing, the chain jumps to its next
    /// `default` step; without one the field contributes nothing.
    fn run_chain(
        &self,
        field: &str,
        chain: &Chain<E::Query>,
        record: &E::Record,
        ctx: &mut RecordContext,
        mut acc: Vec<Value>,
    ) -> StepResult<Vec<TaggedValue>> {
        let mut i = 0;
        while i < chain.len() {
            let step = &chain.steps[i];
            match self.apply(field, step, record, ctx, acc)? {
                Flow::Continue(values) => acc = compact(values),
                Flow::Halt => return Ok(Vec::new()),
                Flow::Emit(values) => return Ok(values),
            }

            if acc.is_empty() && step.produces_values() {
                match chain.next_default(i) {
                    Some(next) => {
                        i = next;
                        continue;
                    }
                    None => {
                        debug!(field, step = i, "No value");
                        return Ok(Vec::new());
                    }
                }
            }
            i += 1;
        }
        Ok(tag_all(acc, None))
    }

    fn apply(
        &self,
        field: &str,
        step: &CompiledStep<E::Query>,
        record: &E::Record,
        ctx: &mut RecordContext,
        mut acc: Vec<Value>,
    ) -> StepResult<Flow> {
        let flow = match step {
            CompiledStep::Extract(queries) => {
                for query in queries {
                    acc.extend(self.extractor.extract(record, query));
                }
                Flow::Continue(acc)
            }
            CompiledStep::DatePair { begin, end } => {
                let begin = self.first_text(record, begin);
                let end = self.first_text(record, end);
                if let Some(range) = self.dates.parse_pair(begin.as_deref(), end.as_deref()) {
                    acc.push(range.to_value());
                }
                Flow::Continue(acc)
            }

            CompiledStep::Literal(value) => {
                acc.push(value.clone());
                Flow::Continue(acc)
            }
            CompiledStep::Default(value) => {
                if acc.is_empty() {
                    acc.push(value.clone());
                }
                Flow::Continue(acc)
            }

            CompiledStep::Text(op) => Flow::Continue(acc.into_iter().map(|v| op.apply(v)).collect()),
            CompiledStep::List(op) => Flow::Continue(op.apply(acc)),
            CompiledStep::ToNumber => Flow::Continue(acc.into_iter().map(to_number).collect::<StepResult<_>>()?),
            CompiledStep::Translate(table) => Flow::Continue(self.translate(table, acc)),
            CompiledStep::Date(op) => {
                let mut out = Vec::with_capacity(acc.len());
                for value in acc {
                    out.extend(op.apply(value, &self.dates)?);
                }
                Flow::Continue(out)
            }

            CompiledStep::OnlyIfEmpty(other) => {
                if ctx.output().has_values(other) {
                    debug!(field, guard = %other, "Skipped: field already filled");
                    Flow::Halt
                } else {
                    Flow::Continue(acc)
                }
            }
            CompiledStep::OnlyIfPresent(other) => {
                if ctx.output().has_values(other) {
                    Flow::Continue(acc)
                } else {
                    debug!(field, guard = %other, "Skipped: field still empty");
                    Flow::Halt
                }
            }
            CompiledStep::ToClipboard(slot) => {
                ctx.set_clipboard(slot, acc.clone());
                Flow::Continue(acc)
            }
            CompiledStep::FromClipboard(slot) => {
                acc.extend(ctx.clipboard(slot).iter().cloned());
                Flow::Continue(acc)
            }
            CompiledStep::FromField(other) => {
                match ctx.output().get(other) {
                    Some(FieldValues::Flat(values)) => acc.extend(values.iter().map(|v| v.value.clone())),
                    Some(languages) => acc.extend(languages.texts().into_iter().map(Value::String)),
                    None => {}
                }
                Flow::Continue(acc)
            }

            CompiledStep::Lang(tag) => Flow::Emit(tag_all(acc, Some(tag))),
            CompiledStep::ScriptLang { arabic, other } => {
                let mut values = Vec::new();
                for value in flatten(acc) {
                    let tag = if has_arabic_script(&value_text(&value)) { arabic } else { other };
                    values.push(TaggedValue::new(value, Some(tag.clone())));
                }
                Flow::Emit(values)
            }
            CompiledStep::Fork(branches) => {
                let mut values = Vec::new();
                for branch in branches {
                    values.extend(self.run_chain(field, branch, record, ctx, acc.clone())?);
                }
                Flow::Emit(values)
            }
        };
        Ok(flow)
    }

    fn first_text(&self, record: &E::Record, query: &E::Query) -> Option<String> {
        self.extractor
            .extract(record, query)
            .into_iter()
            .find(|v| !is_blank(v) && !v.is_object() && !v.is_array())
            .map(|v| value_text(&v))
    }

    /// Look every scalar up in `table`; values the table drops disappear.
    fn translate(&self, table: &str, acc: Vec<Value>) -> Vec<Value> {
        acc.into_iter()
            .filter_map(|value| match value {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => self
                    .vocabularies
                    .normalize(table, &value_text(&value))
                    .map(Value::String),
                other => Some(other),
            })
            .collect()
    }
}

/// Drop null and blank entries from the accumulator.
fn compact(values: Vec<Value>) -> Vec<Value> {
    values.into_iter().filter(|v| !is_blank(v)).collect()
}

fn flatten(values: Vec<Value>) -> Vec<Value> {
    let mut out = Vec::with_capacity(values.len());
    let mut stack: Vec<Value> = values.into_iter().rev().collect();
    while let Some(value) = stack.pop() {
        match value {
            Value::Array(items) => stack.extend(items.into_iter().rev()),
            other if is_blank(&other) => {}
            other => out.push(other),
        }
    }
    out
}

fn tag_all(values: Vec<Value>, tag: Option<&String>) -> Vec<TaggedValue> {
    flatten(values)
        .into_iter()
        .map(|value| TaggedValue::new(value, tag.cloned()))
        .collect()
}
