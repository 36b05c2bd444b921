//! Controlled-vocabulary lookup tables.
//!
//! A table is plain data: exact-match key → value entries plus a policy for
//! keys it does not know. Built-in tables are embedded at compile time from
//! `data/vocab/`:
//!
//! - `languages` - language names across scripts → English label (drop on miss)
//! - `object_types` - object/format labels → normalized type (pass-through)
//! - `edm_types` - normalized type → EDM type (drop on miss)
//!
//! Crosswalk configurations may add tables or replace built-in ones.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{ConfigError, ConfigResult};

/// What a table does with a key it does not contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Keep the raw value unchanged.
    #[default]
    PassThrough,
    /// Drop the value.
    Drop,
}

/// One named key → value table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabTable {
    #[serde(default)]
    pub policy: MissPolicy,

    /// Compare keys ignoring case.
    #[serde(default)]
    pub case_insensitive: bool,

    pub entries: HashMap<String, String>,
}

impl VocabTable {
    pub fn new(entries: HashMap<String, String>, policy: MissPolicy) -> Self {
        Self {
            policy,
            case_insensitive: false,
            entries,
        }
        .normalized()
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self.normalized()
    }

    /// Lowercase the keys of a case-insensitive table once, at load time.
    fn normalized(mut self) -> Self {
        if self.case_insensitive {
            self.entries = self
                .entries
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v))
                .collect();
        }
        self
    }

    /// Map a raw value: the mapped value on a hit, the raw value or nothing on a
    /// miss depending on the table policy.
    pub fn normalize(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        let hit = if self.case_insensitive {
            self.entries.get(&trimmed.to_lowercase())
        } else {
            self.entries.get(trimmed)
        };

        match (hit, self.policy) {
            (Some(mapped), _) => Some(mapped.clone()),
            (None, MissPolicy::PassThrough) => Some(raw.to_string()),
            (None, MissPolicy::Drop) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// All vocabulary tables known to one crosswalk, read-only once built.
#[derive(Debug, Clone, Default)]
pub struct VocabularyRegistry {
    tables: HashMap<String, VocabTable>,
}

const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("languages", include_str!("../../data/vocab/languages.json")),
    ("object_types", include_str!("../../data/vocab/object_types.json")),
    ("edm_types", include_str!("../../data/vocab/edm_types.json")),
];

impl VocabularyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the embedded tables.
    pub fn builtin() -> ConfigResult<Self> {
        let mut registry = Self::new();
        for (name, source) in BUILTIN_TABLES {
            let table = parse_table(name, source)?;
            registry.insert(*name, table);
        }
        Ok(registry)
    }

    /// Add or replace a table.
    pub fn insert(&mut self, name: impl Into<String>, table: VocabTable) {
        self.tables.insert(name.into(), table.normalized());
    }

    /// Add every table of `other`, replacing same-named ones.
    pub fn extend(&mut self, other: HashMap<String, VocabTable>) {
        for (name, table) in other {
            self.insert(name, table);
        }
    }

    pub fn get(&self, name: &str) -> Option<&VocabTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Normalize a raw value against a named table. Unknown tables yield nothing.
    pub fn normalize(&self, table: &str, raw: &str) -> Option<String> {
        self.tables.get(table)?.normalize(raw)
    }

    pub fn table_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

fn parse_table(name: &str, source: &str) -> ConfigResult<VocabTable> {
    serde_json::from_str(source).map_err(|e| ConfigError::InvalidVocabulary {
        name: name.to_string(),
        reason: e.to_string(),
    })
}
