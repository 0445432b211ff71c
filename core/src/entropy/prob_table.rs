//! Frequency tallies and the scaled probability tables built from them
//! (spec §3 `FreqTable`/`ProbTable`, §4.5's normalization rules, §8
//! property 6, S5).

use crate::error::BadProbTable;

/// `{alphabet, counter}` — per-symbol hit counts plus a running total
/// (spec §3). The alphabet is the symbol's display name (numeric
/// alphabets are stringified by the caller).
#[derive(Debug, Clone)]
pub struct FreqTable {
    alphabet: Vec<String>,
    counts: Vec<u64>,
}

impl FreqTable {
    pub fn new(alphabet: Vec<String>) -> Self {
        let counts = vec![0; alphabet.len()];
        Self { alphabet, counts }
    }

    /// Builds directly from pre-aggregated counts, e.g. corpus-summary
    /// JSON already carrying per-symbol hit totals rather than individual
    /// `record()` calls.
    pub fn from_counts(alphabet: Vec<String>, counts: Vec<u64>) -> Self {
        Self { alphabet, counts }
    }

    pub fn record(&mut self, index: usize) {
        if let Some(c) = self.counts.get_mut(index) {
            *c += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn alphabet(&self) -> &[String] {
        &self.alphabet
    }
}

/// Total probability mass a [`ProbTable`] is scaled to (spec §4.5).
const SCALE: u64 = 1 << 18;

/// `{key, names[], probs[], accum[], total, allowEscape}` (spec §3).
/// `probs[i]` is `sizeOf(i)`; `accum[i]` is the running cumulative sum.
#[derive(Debug, Clone)]
pub struct ProbTable {
    key: String,
    names: Vec<String>,
    probs: Vec<u64>,
    accum: Vec<u64>,
    total: u64,
    allow_escape: bool,
}

impl ProbTable {
    /// Builds from raw hit counts, scaling so `accum` sums to `2^18` minus
    /// one slot reserved for escape if any training count is zero. Any
    /// raw count `> 0` is guaranteed a scaled size `> 0` (floor of 1).
    pub fn from_freq(key: impl Into<String>, freq: &FreqTable) -> Result<ProbTable, BadProbTable> {
        let key = key.into();
        let sum = freq.total();
        if sum == 0 {
            return Err(BadProbTable::ZeroTotal(key));
        }

        let allow_escape = freq.counts.iter().any(|&c| c == 0);
        let budget = SCALE - if allow_escape { 1 } else { 0 };
        let scale = budget as f64 / sum as f64;

        let mut sizes: Vec<u64> = freq
            .counts
            .iter()
            .map(|&c| {
                if c == 0 {
                    0
                } else {
                    (((c as f64) * scale).floor() as u64).max(1)
                }
            })
            .collect();

        let sum_sizes: u64 = sizes.iter().sum();
        if sum_sizes != budget {
            let adjust = sizes
                .iter()
                .enumerate()
                .max_by_key(|(_, &s)| s)
                .map(|(i, _)| i)
                .expect("non-empty alphabet");
            let diff = budget as i64 - sum_sizes as i64;
            sizes[adjust] = (sizes[adjust] as i64 + diff) as u64;
        }

        let mut accum = Vec::with_capacity(sizes.len());
        let mut running = 0u64;
        for &s in &sizes {
            running += s;
            accum.push(running);
        }

        Ok(ProbTable {
            key,
            names: freq.alphabet.clone(),
            probs: sizes,
            accum,
            total: SCALE,
            allow_escape,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn allow_escape(&self) -> bool {
        self.allow_escape
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn offset_of(&self, index: usize) -> u64 {
        if index == 0 {
            0
        } else {
            self.accum[index - 1]
        }
    }

    fn size_of(&self, index: usize) -> u64 {
        self.probs[index]
    }

    /// `(offset, size, total)` for `index`. A `size == 0` result means the
    /// symbol was never observed during training; the caller must route
    /// through the escape mechanism if `allow_escape()`, or treat it as
    /// `BadProbTable::ZeroSizeNoEscape` otherwise.
    pub fn offset_size_total(&self, index: usize) -> Option<(u64, u64, u64)> {
        if index >= self.probs.len() {
            return None;
        }
        Some((self.offset_of(index), self.size_of(index), self.total))
    }
}
