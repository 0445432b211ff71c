//! JSON artifact shapes exchanged with prior/aggregate corpus analysis
//! (spec §6): path-suffix frequency summaries, string-window hit
//! summaries, and the global-string dictionary. This module only shapes
//! the data (`serde`) and builds [`ProbTable`]s from it; reading/writing
//! the files themselves is the CLI's concern.

use std::{collections::HashMap, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::{
    entropy::prob_table::{FreqTable, ProbTable},
    error::{BadProbTable, CoreError},
};

/// A `FreqEntry.name` is either a symbol name or a numeric alphabet
/// member (spec §6: `name: string|int`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameOrIndex {
    Str(String),
    Int(i64),
}

impl Display for NameOrIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameOrIndex::Str(s) => write!(f, "{s}"),
            NameOrIndex::Int(i) => write!(f, "{i}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreqEntry {
    pub name: NameOrIndex,
    pub index: usize,
    pub hits: u64,
}

/// One row of `path-suffix/<len>/ALL.json`. `suffix` is the literal
/// ProbTable context key — for a type-tag table this already carries the
/// `#type` suffix, for a value table the `#<tag>` suffix (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathSuffixRecord {
    pub suffix: String,
    pub total_hits: u64,
    pub total_symbols: u64,
    pub freqs: Vec<FreqEntry>,
}

impl PathSuffixRecord {
    /// Serializes a trained [`FreqTable`] back into corpus-artifact shape.
    pub fn from_freq(suffix: impl Into<String>, freq: &FreqTable) -> Self {
        let freqs = freq
            .alphabet()
            .iter()
            .zip(freq.counts())
            .enumerate()
            .map(|(index, (name, &hits))| FreqEntry {
                name: NameOrIndex::Str(name.clone()),
                index,
                hits,
            })
            .collect();
        Self {
            suffix: suffix.into(),
            total_hits: freq.total(),
            total_symbols: freq.alphabet().len() as u64,
            freqs,
        }
    }

    /// Builds the [`ProbTable`] this record trains, keyed by `suffix`.
    pub fn build_table(&self) -> Result<ProbTable, BadProbTable> {
        let mut entries: Vec<&FreqEntry> = self.freqs.iter().collect();
        entries.sort_by_key(|f| f.index);
        let alphabet = entries.iter().map(|f| f.name.to_string()).collect();
        let counts = entries.iter().map(|f| f.hits).collect();
        let freq = FreqTable::from_counts(alphabet, counts);
        ProbTable::from_freq(self.suffix.clone(), &freq)
    }
}

/// A loaded set of path-suffix `ProbTable`s, keyed by their full context
/// key (`"<suffixKey>#type"` or `"<suffixKey>#<valTag>"`).
#[derive(Default)]
pub struct ProbTables {
    by_key: HashMap<String, ProbTable>,
}

impl ProbTables {
    pub fn from_records(records: &[PathSuffixRecord]) -> Result<Self, CoreError> {
        let mut by_key = HashMap::with_capacity(records.len());
        for rec in records {
            let table = rec.build_table()?;
            by_key.insert(rec.suffix.clone(), table);
        }
        Ok(Self { by_key })
    }

    pub fn insert(&mut self, table: ProbTable) {
        self.by_key.insert(table.key().to_string(), table);
    }

    /// Spec §9's resolved Open Question: an absent context key aborts
    /// rather than silently escaping to a uniform distribution.
    pub fn get(&self, key: &str) -> Result<&ProbTable, CoreError> {
        self.by_key
            .get(key)
            .ok_or_else(|| CoreError::BadProbTable(BadProbTable::MissingContext(key.to_string())))
    }
}

/// `string-window/<size>/ALL.json`'s per-kind array: `size` positional
/// hit counts followed by `MISSES`, `HITS`, `TOTAL` (spec §6, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringWindowSummary {
    pub window_size: usize,
    pub idents: Vec<u64>,
    pub props: Vec<u64>,
    pub strings: Vec<u64>,
}

impl StringWindowSummary {
    pub fn ident_table(&self) -> Result<ProbTable, BadProbTable> {
        build_string_window_table("ident", &self.idents, self.window_size)
    }

    pub fn prop_table(&self) -> Result<ProbTable, BadProbTable> {
        build_string_window_table("prop", &self.props, self.window_size)
    }

    pub fn raw_table(&self) -> Result<ProbTable, BadProbTable> {
        build_string_window_table("raw", &self.strings, self.window_size)
    }
}

/// Builds a per-kind string-window `ProbTable`: `window_size` positional
/// symbols plus a trailing `"MISS"` symbol carrying the miss count.
fn build_string_window_table(key: &str, counts: &[u64], window_size: usize) -> Result<ProbTable, BadProbTable> {
    let hits = counts.get(..window_size).unwrap_or(&[]);
    let misses = counts.get(window_size).copied().unwrap_or(0);

    let mut alphabet: Vec<String> = (0..window_size).map(|i| i.to_string()).collect();
    alphabet.push("MISS".into());
    let mut table_counts: Vec<u64> = hits.to_vec();
    table_counts.resize(window_size, 0);
    table_counts.push(misses);

    let freq = FreqTable::from_counts(alphabet, table_counts);
    ProbTable::from_freq(key, &freq)
}

/// `global-strings/ALL.json`'s rows, sorted by `totalCount` descending;
/// the first [`GLOBAL_DICT_SIZE`] form the dictionary (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStringEntry {
    pub str: String,
    pub ident_count: u64,
    pub prop_count: u64,
    pub raw_count: u64,
    pub total_count: u64,
}

pub const GLOBAL_DICT_SIZE: usize = 4096;

/// Builds the `string -> dictionary index` map from the top
/// [`GLOBAL_DICT_SIZE`] entries by `totalCount`.
pub fn global_dictionary(entries: &[GlobalStringEntry]) -> HashMap<String, usize> {
    let mut sorted: Vec<&GlobalStringEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.total_count.cmp(&a.total_count));
    sorted
        .into_iter()
        .take(GLOBAL_DICT_SIZE)
        .enumerate()
        .map(|(i, e)| (e.str.clone(), i))
        .collect()
}
