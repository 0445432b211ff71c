//! Move-to-front string window cache over identifiers/property names/raw
//! strings, with miss tracking and corpus-summary serialization (spec
//! §4.4, §8 property 7).

use std::collections::VecDeque;

/// Bounded move-to-front list. Backing storage may grow to `2*limit`
/// before being truncated back down to `limit` (spec §3 `StringCache`).
pub struct StringCache {
    limit: usize,
    entries: VecDeque<String>,
}

impl StringCache {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            entries: VecDeque::with_capacity(limit.min(1024)),
        }
    }

    /// Returns the 0-based front-relative position on a hit (and moves the
    /// entry to front), or `-1` on a miss (and inserts at front). A hit
    /// found past the `limit`-sized logical window (but still within the
    /// `2*limit` backing slack) reports `limit - 1` rather than its raw
    /// index, since downstream probability tables only allocate `limit`
    /// indexed slots.
    pub fn lookup(&mut self, s: &str) -> i64 {
        if let Some(pos) = self.entries.iter().position(|e| e == s) {
            let entry = self.entries.remove(pos).expect("position just found");
            self.entries.push_front(entry);
            let reported = pos.min(self.limit.saturating_sub(1));
            return reported as i64;
        }

        self.entries.push_front(s.to_string());
        if self.entries.len() > self.limit.saturating_mul(2) {
            self.entries.truncate(self.limit);
        }
        -1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// Per-kind hit counter over cache positions `[0, limit)` plus a
/// distinguished miss bucket, accumulated across a corpus.
pub struct HitCounter {
    limit: usize,
    counts: Vec<u64>,
    misses: u64,
}

impl HitCounter {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            counts: vec![0; limit],
            misses: 0,
        }
    }

    pub fn record(&mut self, position: i64) {
        if position < 0 {
            self.misses += 1;
        } else if let Some(slot) = self.counts.get_mut(position as usize) {
            *slot += 1;
        } else {
            // A hit reported at a position beyond the window (possible only
            // if the caller's limit disagrees with the cache's) counts as a
            // miss rather than panicking.
            self.misses += 1;
        }
    }

    pub fn hits(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses
    }

    /// `windowSize S` corpus summary rows: `S` indexed counts plus
    /// `MISSES`, `HITS`, `TOTAL` (spec §4.4).
    pub fn summary_rows(&self) -> Vec<(String, u64)> {
        let mut rows: Vec<(String, u64)> = self
            .counts
            .iter()
            .enumerate()
            .map(|(i, c)| (i.to_string(), *c))
            .collect();
        rows.push(("MISSES".into(), self.misses()));
        rows.push(("HITS".into(), self.hits()));
        rows.push(("TOTAL".into(), self.total()));
        rows
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// The three independent per-file caches (spec §4.4).
pub struct StringWindows {
    pub ident: StringCache,
    pub prop: StringCache,
    pub raw: StringCache,
}

impl StringWindows {
    pub fn new(limit: usize) -> Self {
        Self {
            ident: StringCache::new(limit),
            prop: StringCache::new(limit),
            raw: StringCache::new(limit),
        }
    }
}
