//! Load-time compilation of step chains.
//!
//! Every path, regex and table reference is resolved here, once, so that a
//! malformed crosswalk fails before any record is read.

use regex::Regex;
use serde_json::Value;

use super::ops::{DateOp, ListOp, TextOp};
use super::steps::Step;
use crate::error::{ConfigError, ConfigResult};
use crate::source::Extractor;
use crate::vocab::VocabularyRegistry;

/// A step with its paths and patterns compiled.
#[derive(Debug, Clone)]
pub enum CompiledStep<Q> {
    Extract(Vec<Q>),
    DatePair { begin: Q, end: Q },
    Literal(Value),
    Default(Value),
    Text(TextOp),
    List(ListOp),
    ToNumber,
    Translate(String),
    Date(DateOp),
    OnlyIfEmpty(String),
    OnlyIfPresent(String),
    ToClipboard(String),
    FromClipboard(String),
    FromField(String),
    Lang(String),
    ScriptLang { arabic: String, other: String },
    Fork(Vec<Chain<Q>>),
}

impl<Q> CompiledStep<Q> {
    /// Whether an empty accumulator after this step ends the chain.
    ///
    /// Guards and clipboard writes leave the values alone, so they never do.
    pub fn produces_values(&self) -> bool {
        !matches!(
            self,
            CompiledStep::OnlyIfEmpty(_) | CompiledStep::OnlyIfPresent(_) | CompiledStep::ToClipboard(_)
        )
    }
}

/// An ordered, compiled step chain.
#[derive(Debug, Clone)]
pub struct Chain<Q> {
    pub steps: Vec<CompiledStep<Q>>,
}

impl<Q> Chain<Q> {
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the first `default` step after position `from`.
    pub fn next_default(&self, from: usize) -> Option<usize> {
        self.steps
            .iter()
            .enumerate()
            .skip(from + 1)
            .find(|(_, step)| matches!(step, CompiledStep::Default(_)))
            .map(|(i, _)| i)
    }
}

/// What a chain is compiled against.
pub struct CompileContext<'a, E> {
    pub extractor: &'a E,
    pub vocabularies: &'a VocabularyRegistry,
    /// Output field name, for error messages.
    pub field: &'a str,
    /// Post-merge derivations may not read the source record.
    pub in_derivation: bool,
}

impl<'a, E: Extractor> CompileContext<'a, E> {
    pub fn new(extractor: &'a E, vocabularies: &'a VocabularyRegistry, field: &'a str) -> Self {
        Self {
            extractor,
            vocabularies,
            field,
            in_derivation: false,
        }
    }

    pub fn for_derivation(mut self) -> Self {
        self.in_derivation = true;
        self
    }

    fn regex(&self, pattern: &str) -> ConfigResult<Regex> {
        Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
    }
}

/// Compile one chain, checking its shape.
pub fn compile_chain<E: Extractor>(
    steps: &[Step],
    ctx: &CompileContext<'_, E>,
) -> ConfigResult<Chain<E::Query>> {
    if steps.is_empty() {
        return Err(ConfigError::EmptyChain(ctx.field.to_string()));
    }

    let last = steps.len() - 1;
    let mut compiled = Vec::with_capacity(steps.len());
    for (i, step) in steps.iter().enumerate() {
        if step.is_terminal() && i != last {
            return Err(ConfigError::MisplacedTerminal {
                field: ctx.field.to_string(),
                step: step.name().to_string(),
            });
        }
        if step.reads_source() && ctx.in_derivation {
            return Err(ConfigError::StepNotAllowed {
                field: ctx.field.to_string(),
                step: step.name().to_string(),
                reason: "derivations read merged values, not the source record".to_string(),
            });
        }
        compiled.push(compile_step(step, ctx)?);
    }

    Ok(Chain { steps: compiled })
}

fn compile_step<E: Extractor>(step: &Step, ctx: &CompileContext<'_, E>) -> ConfigResult<CompiledStep<E::Query>> {
    let compiled = match step {
        Step::Extract { path, paths } => {
            let all: Vec<&String> = path.iter().chain(paths.iter()).collect();
            if all.is_empty() {
                return Err(ConfigError::InvalidPath {
                    path: String::new(),
                    reason: format!("extract in '{}' needs 'path' or 'paths'", ctx.field),
                });
            }
            let queries = all
                .into_iter()
                .map(|p| ctx.extractor.compile(p))
                .collect::<ConfigResult<Vec<_>>>()?;
            CompiledStep::Extract(queries)
        }
        Step::DatePair { begin, end } => CompiledStep::DatePair {
            begin: ctx.extractor.compile(begin)?,
            end: ctx.extractor.compile(end)?,
        },

        Step::Literal { value } => CompiledStep::Literal(value.clone()),
        Step::Default { value } => CompiledStep::Default(value.clone()),

        Step::Trim => CompiledStep::Text(TextOp::Trim),
        Step::Squish => CompiledStep::Text(TextOp::Squish),
        Step::Uppercase => CompiledStep::Text(TextOp::Uppercase),
        Step::Lowercase => CompiledStep::Text(TextOp::Lowercase),
        Step::StripPunctuation => CompiledStep::Text(TextOp::StripPunctuation),
        Step::Replace { pattern, value } => CompiledStep::Text(TextOp::Replace {
            regex: ctx.regex(pattern)?,
            value: value.clone(),
        }),
        Step::Prepend { value } => CompiledStep::Text(TextOp::Prepend(value.clone())),
        Step::Append { value } => CompiledStep::Text(TextOp::Append(value.clone())),
        Step::Substring { start, length } => CompiledStep::Text(TextOp::Substring {
            start: *start,
            length: *length,
        }),

        Step::Split { separator } => CompiledStep::List(ListOp::Split(separator.clone())),
        Step::Join { separator } => CompiledStep::List(ListOp::Join(separator.clone())),
        Step::Flatten => CompiledStep::List(ListOp::Flatten),
        Step::ToNumber => CompiledStep::ToNumber,
        Step::Compact => CompiledStep::List(ListOp::Compact),
        Step::First => CompiledStep::List(ListOp::First),
        Step::Last => CompiledStep::List(ListOp::Last),
        Step::Unique => CompiledStep::List(ListOp::Unique),
        Step::Index { n } => CompiledStep::List(ListOp::Index(*n)),
        Step::EvenIndexed => CompiledStep::List(ListOp::EvenIndexed),
        Step::OddIndexed => CompiledStep::List(ListOp::OddIndexed),
        Step::Select { pattern } => CompiledStep::List(ListOp::Select(ctx.regex(pattern)?)),
        Step::Reject { pattern } => CompiledStep::List(ListOp::Reject(ctx.regex(pattern)?)),

        Step::Translate { table } => {
            if !ctx.vocabularies.contains(table) {
                return Err(ConfigError::UnknownVocabulary(table.clone()));
            }
            CompiledStep::Translate(table.clone())
        }

        Step::ParseDate => CompiledStep::Date(DateOp::Parse),
        Step::ParseHijriDate => CompiledStep::Date(DateOp::ParseHijri),
        Step::ParseSolarHijriDate => CompiledStep::Date(DateOp::ParseSolarHijri),
        Step::ToHijri => CompiledStep::Date(DateOp::ToHijri),
        Step::ToSolarHijri => CompiledStep::Date(DateOp::ToSolarHijri),
        Step::ExpandYears => CompiledStep::Date(DateOp::ExpandYears),
        Step::FormatRange { separator } => CompiledStep::Date(DateOp::FormatRange(separator.clone())),

        Step::OnlyIfEmpty { field } => CompiledStep::OnlyIfEmpty(field.clone()),
        Step::OnlyIfPresent { field } => CompiledStep::OnlyIfPresent(field.clone()),
        Step::ToClipboard { slot } => CompiledStep::ToClipboard(slot.clone()),
        Step::FromClipboard { slot } => CompiledStep::FromClipboard(slot.clone()),
        Step::FromField { field } => CompiledStep::FromField(field.clone()),

        Step::Lang { tag } => CompiledStep::Lang(tag.clone()),
        Step::ScriptLang { arabic, other } => CompiledStep::ScriptLang {
            arabic: arabic.clone(),
            other: other.clone(),
        },
        Step::Fork { branches } => {
            if branches.is_empty() {
                return Err(ConfigError::EmptyChain(format!("{} (fork)", ctx.field)));
            }
            let chains = branches
                .iter()
                .map(|branch| compile_chain(branch, ctx))
                .collect::<ConfigResult<Vec<_>>>()?;
            CompiledStep::Fork(chains)
        }
    };
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::JsonExtractor;
    use serde_json::json;

    fn steps(value: Value) -> Vec<Step> {
        serde_json::from_value(value).unwrap()
    }

    fn compile(value: Value) -> ConfigResult<Chain<crate::source::JsonPath>> {
        let vocab = VocabularyRegistry::builtin().unwrap();
        let ctx = CompileContext::new(&JsonExtractor, &vocab, "cho_title");
        compile_chain(&steps(value), &ctx)
    }

    #[test]
    fn test_compile_full_chain() {
        let chain = compile(json!([
            { "type": "extract", "paths": ["title.en", "title.fr"] },
            { "type": "replace", "pattern": "\\s+/$", "value": "" },
            { "type": "translate", "table": "object_types" },
            { "type": "lang", "tag": "en" }
        ]))
        .unwrap();
        assert_eq!(chain.len(), 4);
        assert!(matches!(&chain.steps[0], CompiledStep::Extract(q) if q.len() == 2));
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(matches!(compile(json!([])), Err(ConfigError::EmptyChain(f)) if f == "cho_title"));
    }

    #[test]
    fn test_terminal_must_be_last() {
        let err = compile(json!([
            { "type": "extract", "path": "title" },
            { "type": "lang", "tag": "en" },
            { "type": "trim" }
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::MisplacedTerminal { step, .. } if step == "lang"));
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let err = compile(json!([{ "type": "select", "pattern": "([a-z" }])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }

    #[test]
    fn test_unknown_vocabulary_rejected() {
        let err = compile(json!([{ "type": "translate", "table": "scripts" }])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVocabulary(t) if t == "scripts"));
    }

    #[test]
    fn test_malformed_path_rejected() {
        assert!(matches!(
            compile(json!([{ "type": "extract", "path": "a..b" }])),
            Err(ConfigError::InvalidPath { .. })
        ));
        assert!(matches!(
            compile(json!([{ "type": "extract" }])),
            Err(ConfigError::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_derivation_cannot_extract() {
        let vocab = VocabularyRegistry::builtin().unwrap();
        let ctx = CompileContext::new(&JsonExtractor, &vocab, "cho_edm_type").for_derivation();
        let err = compile_chain(&steps(json!([{ "type": "extract", "path": "type" }])), &ctx).unwrap_err();
        assert!(matches!(err, ConfigError::StepNotAllowed { step, .. } if step == "extract"));

        let ok = compile_chain(&steps(json!([{ "type": "first" }])), &ctx);
        assert!(ok.is_ok());
    }

    #[test]
    fn test_fork_branches_compiled() {
        let chain = compile(json!([
            { "type": "extract", "path": "subject" },
            { "type": "fork", "branches": [
                [{ "type": "lang", "tag": "en" }],
                [{ "type": "select", "pattern": "[" }]
            ]}
        ]));
        assert!(matches!(chain, Err(ConfigError::InvalidPattern { .. })));

        let empty = compile(json!([{ "type": "fork", "branches": [] }]));
        assert!(matches!(empty, Err(ConfigError::EmptyChain(_))));
    }

    #[test]
    fn test_next_default() {
        let chain = compile(json!([
            { "type": "extract", "path": "date" },
            { "type": "parse_date" },
            { "type": "default", "value": "undated" },
            { "type": "trim" }
        ]))
        .unwrap();
        assert_eq!(chain.next_default(0), Some(2));
        assert_eq!(chain.next_default(2), None);
        assert!(!CompiledStep::<()>::ToClipboard("x".into()).produces_values());
        assert!(chain.steps[1].produces_values());
    }
}
