//! Per-file append-only literal string table and its WTF-8 codec (spec
//! §4.6, §8 property 8).
//!
//! Strings here are modeled as raw Unicode code-point sequences (`u32`,
//! not Rust `char`/`str`) rather than validated Rust strings: Rust's
//! `String` type guarantees well-formed UTF-8 and so cannot represent an
//! unpaired surrogate, but JS source text is UTF-16-based and can contain
//! them. The rest of the pipeline's `Value::Str`/`Identifier::name` stay
//! plain `String`s (this table is the one place the raw, possibly
//! ill-formed code-point sequence matters).

use std::collections::HashMap;

use crate::{entropy::varuint, error::CoreError};

pub type CodePoint = u32;

/// WTF-8: UTF-8 that tolerates unpaired surrogates (0xD800..=0xDFFF) by
/// encoding them with the same 3-byte form as any other code point in
/// that range, rather than rejecting them.
pub mod wtf8 {
    use super::CodePoint;

    pub fn encode(code_points: &[CodePoint]) -> Vec<u8> {
        let mut out = Vec::with_capacity(code_points.len());
        for &cp in code_points {
            encode_one(cp, &mut out);
        }
        out
    }

    fn encode_one(cp: CodePoint, out: &mut Vec<u8>) {
        match cp {
            0x00..=0x7F => out.push(cp as u8),
            0x80..=0x7FF => {
                out.push(0xC0 | (cp >> 6) as u8);
                out.push(0x80 | (cp & 0x3F) as u8);
            }
            0x800..=0xFFFF => {
                out.push(0xE0 | (cp >> 12) as u8);
                out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
                out.push(0x80 | (cp & 0x3F) as u8);
            }
            0x1_0000..=0x10_FFFF => {
                out.push(0xF0 | (cp >> 18) as u8);
                out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
                out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
                out.push(0x80 | (cp & 0x3F) as u8);
            }
            _ => { /* outside the Unicode range; drop rather than emit garbage */ }
        }
    }

    pub fn decode(bytes: &[u8]) -> Option<Vec<CodePoint>> {
        let mut out = Vec::new();
        let mut i = 0;
        while i < bytes.len() {
            let b0 = bytes[i];
            if b0 & 0x80 == 0 {
                out.push(b0 as u32);
                i += 1;
            } else if b0 & 0xE0 == 0xC0 {
                let b1 = *bytes.get(i + 1)?;
                out.push((((b0 & 0x1F) as u32) << 6) | (b1 & 0x3F) as u32);
                i += 2;
            } else if b0 & 0xF0 == 0xE0 {
                let b1 = *bytes.get(i + 1)?;
                let b2 = *bytes.get(i + 2)?;
                out.push((((b0 & 0x0F) as u32) << 12) | (((b1 & 0x3F) as u32) << 6) | (b2 & 0x3F) as u32);
                i += 3;
            } else if b0 & 0xF8 == 0xF0 {
                let b1 = *bytes.get(i + 1)?;
                let b2 = *bytes.get(i + 2)?;
                let b3 = *bytes.get(i + 3)?;
                out.push(
                    (((b0 & 0x07) as u32) << 18)
                        | (((b1 & 0x3F) as u32) << 12)
                        | (((b2 & 0x3F) as u32) << 6)
                        | (b3 & 0x3F) as u32,
                );
                i += 4;
            } else {
                return None;
            }
        }
        Some(out)
    }

    pub fn from_str(s: &str) -> Vec<CodePoint> {
        s.chars().map(|c| c as u32).collect()
    }
}

/// Per-file append-only string table, indexed by insertion order (spec
/// §4.6). Index lookups dedup: re-appending an already-stored string
/// returns its existing index rather than a new entry.
#[derive(Default)]
pub struct LiteralStringTable {
    entries: Vec<Vec<CodePoint>>,
    index_of: HashMap<Vec<CodePoint>, usize>,
}

impl LiteralStringTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_of(&self, s: &[CodePoint]) -> Option<usize> {
        self.index_of.get(s).copied()
    }

    pub fn append(&mut self, s: Vec<CodePoint>) -> usize {
        if let Some(&idx) = self.index_of.get(&s) {
            return idx;
        }
        let idx = self.entries.len();
        self.index_of.insert(s.clone(), idx);
        self.entries.push(s);
        idx
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum over stored strings of `wtf8Bytes(s).length + varuintBytes(s.len())`.
    pub fn encoded_size(&self) -> Result<u64, CoreError> {
        let mut total = 0u64;
        for entry in &self.entries {
            total += wtf8::encode(entry).len() as u64;
            total += varuint::byte_len(entry.len() as u64)? as u64;
        }
        Ok(total)
    }

    /// The WTF-8 concatenation of every stored string, followed by a
    /// single terminator byte (spec §4.6).
    pub fn encoded_data(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend(wtf8::encode(entry));
        }
        out.push(0);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wtf8_round_trips_ordinary_text() {
        let cps = wtf8::from_str("héllo wörld 漢字 🦀");
        let bytes = wtf8::encode(&cps);
        assert_eq!(wtf8::decode(&bytes).unwrap(), cps);
    }

    #[test]
    fn wtf8_round_trips_unpaired_surrogate() {
        let cps = vec!['a' as u32, 0xD800, 'b' as u32];
        let bytes = wtf8::encode(&cps);
        assert_eq!(wtf8::decode(&bytes).unwrap(), cps);
    }

    #[test]
    fn append_dedups_by_content() {
        let mut table = LiteralStringTable::new();
        let a = table.append(wtf8::from_str("foo"));
        let b = table.append(wtf8::from_str("bar"));
        let a_again = table.append(wtf8::from_str("foo"));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(a_again, a);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn encoded_data_ends_with_terminator() {
        let mut table = LiteralStringTable::new();
        table.append(wtf8::from_str("x"));
        let data = table.encoded_data();
        assert_eq!(*data.last().unwrap(), 0);
    }
}
