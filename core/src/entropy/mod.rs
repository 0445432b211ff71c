//! Entropy coder: combines the path-suffix and string-window probability
//! models into per-symbol bit budgets while driving the tree visitor
//! (spec §4.5, §4.6, §8 property 9).

pub mod literal_table;
pub mod prob_table;
pub mod varuint;

use std::collections::BTreeMap;

use crate::{
    corpus::ProbTables,
    error::{BadProbTable, CoreError},
    path_suffix::{self, PathInterner},
    schema::Schema,
    string_window::{StringCache, StringWindows},
    types::{FieldType, IdentTag, PrimitiveKind},
    value::Value,
    visitor::{self, Handler, Path},
};
use literal_table::{wtf8, LiteralStringTable};
use prob_table::ProbTable;

/// The three per-kind string-window `ProbTable`s (spec §4.5 input ii).
pub struct WindowProbTables {
    pub ident: ProbTable,
    pub prop: ProbTable,
    pub raw: ProbTable,
}

/// Nested bit/symbol counters keyed by `/`-separated category prefixes:
/// every emission adds to `sym`, `sym/<cat>`, and `sym/<cat>/<tyStr>`
/// (spec §4.5 "Bit accounting").
#[derive(Default, Debug)]
pub struct BitAccounting {
    bits: BTreeMap<String, f64>,
    symbols: BTreeMap<String, u64>,
}

impl BitAccounting {
    fn add(&mut self, leaf_key: &str, bits: f64) {
        let parts: Vec<&str> = leaf_key.split('/').collect();
        let mut prefix = String::new();
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                prefix.push('/');
            }
            prefix.push_str(part);
            *self.bits.entry(prefix.clone()).or_insert(0.0) += bits;
            *self.symbols.entry(prefix.clone()).or_insert(0) += 1;
        }
    }

    pub fn bits(&self, key: &str) -> f64 {
        self.bits.get(key).copied().unwrap_or(0.0)
    }

    pub fn symbols(&self, key: &str) -> u64 {
        self.symbols.get(key).copied().unwrap_or(0)
    }

    pub fn total_bits(&self) -> f64 {
        self.bits("sym")
    }

    pub fn categories(&self) -> impl Iterator<Item = (&String, f64)> {
        self.bits.iter().map(|(k, &v)| (k, v))
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Ident,
    Prop,
    Raw,
}

impl StringKind {
    fn name(self) -> &'static str {
        match self {
            StringKind::Ident => "ident",
            StringKind::Prop => "prop",
            StringKind::Raw => "raw",
        }
    }
}

/// Drives one file's encoding through the visitor, maintaining the three
/// string-window caches, the per-file literal table, and bit accounting
/// as its only mutable state between locations (spec §4.5 "State
/// machine").
pub struct EntropyCoder<'a> {
    schema: &'a Schema,
    path_tables: &'a ProbTables,
    window_tables: &'a WindowProbTables,
    global_dict: &'a std::collections::HashMap<String, usize>,
    collapse_threshold: usize,
    interner: PathInterner,
    windows: StringWindows,
    literal_table: LiteralStringTable,
    accounting: BitAccounting,
}

impl<'a> EntropyCoder<'a> {
    pub fn new(
        schema: &'a Schema,
        path_tables: &'a ProbTables,
        window_tables: &'a WindowProbTables,
        global_dict: &'a std::collections::HashMap<String, usize>,
        window_limit: usize,
        collapse_threshold: usize,
    ) -> Self {
        Self {
            schema,
            path_tables,
            window_tables,
            global_dict,
            collapse_threshold,
            interner: PathInterner::new(),
            windows: StringWindows::new(window_limit),
            literal_table: LiteralStringTable::new(),
            accounting: BitAccounting::default(),
        }
    }

    pub fn encode_file(&mut self, root_iface: FieldType, root: &Value) -> Result<(), CoreError> {
        visitor::visit(self.schema, root_iface, root, self)
    }

    pub fn accounting(&self) -> &BitAccounting {
        &self.accounting
    }

    pub fn literal_table(&self) -> &LiteralStringTable {
        &self.literal_table
    }

    /// The concrete bytes this run actually materializes for the file:
    /// the literal string table's WTF-8 blob (spec §4.6). The symbol
    /// stream itself is never bit-packed; `total_size_bytes` only
    /// estimates its size from `accounting`.
    pub fn encoded_payload(&self) -> Vec<u8> {
        self.literal_table.encoded_data()
    }

    /// `⌈bitsEmitted(sym)/8⌉ + literalTable.encodedSize()` (spec §4.5).
    pub fn total_size_bytes(&self) -> Result<u64, CoreError> {
        let header = (self.accounting.total_bits() / 8.0).ceil() as u64;
        Ok(header + self.literal_table.encoded_size()?)
    }

    fn offset_size_total(table: &ProbTable, key: &str, index: usize) -> Result<(u64, u64, u64), CoreError> {
        let (offset, size, total) = table
            .offset_size_total(index)
            .ok_or_else(|| CoreError::BadProbTable(BadProbTable::MissingContext(key.to_string())))?;
        if size == 0 && !table.allow_escape() {
            return Err(CoreError::BadProbTable(BadProbTable::ZeroSizeNoEscape {
                key: key.to_string(),
                index,
            }));
        }
        Ok((offset, size, total))
    }

    fn emit_string(&mut self, kind: StringKind, s: &str) -> Result<(), CoreError> {
        let (cache, table): (&mut StringCache, &ProbTable) = match kind {
            StringKind::Ident => (&mut self.windows.ident, &self.window_tables.ident),
            StringKind::Prop => (&mut self.windows.prop, &self.window_tables.prop),
            StringKind::Raw => (&mut self.windows.raw, &self.window_tables.raw),
        };

        let lookup = cache.lookup(s);
        // The window's ProbTable alphabet is `limit` positional symbols
        // plus a trailing `"MISS"` symbol at index `limit` (spec §4.5
        // "Allocate index N-1 as the miss/escape position", with
        // N = limit + 1).
        let miss_index = cache.limit();
        let index = if lookup >= 0 { lookup as usize } else { miss_index };

        let key = format!("window#{}", kind.name());
        let (_offset, size, total) = Self::offset_size_total(table, &key, index)?;
        let bits = (total as f64 / size.max(1) as f64).log2();
        self.accounting.add(&format!("sym/string/{}", kind.name()), bits);

        if lookup < 0 {
            let dict_index = if let Some(&gi) = self.global_dict.get(s) {
                gi
            } else {
                let cps = wtf8::from_str(s);
                self.global_dict.len() + self.literal_table.append(cps)
            };
            let bytes = varuint::encode(dict_index as u64)?;
            self.accounting
                .add(&format!("sym/stringRef/{}", kind.name()), (bytes.len() * 8) as f64);
        }
        Ok(())
    }
}

impl<'a> Handler for EntropyCoder<'a> {
    fn begin(&mut self, loc: &Path) -> Result<(), CoreError> {
        let frame = loc.top();
        let ty_pretty = frame.shape.ty.to_string();

        let Some(suffix) = [2usize, 1usize]
            .into_iter()
            .find_map(|len| path_suffix::for_location(self.schema, loc, len, self.collapse_threshold, &mut self.interner))
        else {
            return Ok(());
        };
        let suffix_key = suffix.key_string().to_string();

        if frame.shape.type_set.len() > 1 {
            let key = format!("{suffix_key}#type");
            let table = self.path_tables.get(&key)?;
            let (_, size, total) = Self::offset_size_total(table, &key, frame.shape.index)?;
            let bits = (total as f64 / size.max(1) as f64).log2();
            self.accounting.add(&format!("sym/type/{ty_pretty}"), bits);
        }

        if let Some(tag_idx) = path_suffix::value_tag_and_index(self.schema, &frame.shape.ty, frame.value) {
            let key = format!("{suffix_key}#{}", tag_idx.tag);
            let table = self.path_tables.get(&key)?;
            let (_, size, total) = Self::offset_size_total(table, &key, tag_idx.index)?;
            let bits = (total as f64 / size.max(1) as f64).log2();
            self.accounting.add(&format!("sym/value/{ty_pretty}"), bits);
            return Ok(());
        }

        match frame.shape.ty.kind() {
            crate::types::FieldTypeKind::Ident(IdentTag::Ident) => {
                if let Value::Identifier(id) = frame.value {
                    self.emit_string(StringKind::Ident, &id.name)?;
                }
            }
            crate::types::FieldTypeKind::Ident(IdentTag::Prop) => {
                if let Value::Identifier(id) = frame.value {
                    self.emit_string(StringKind::Prop, &id.name)?;
                }
            }
            crate::types::FieldTypeKind::Primitive(PrimitiveKind::Str) => {
                if let Value::Str(s) = frame.value {
                    self.emit_string(StringKind::Raw, s)?;
                }
            }
            crate::types::FieldTypeKind::Primitive(PrimitiveKind::F64) => {
                self.accounting.add(&format!("sym/value/{ty_pretty}"), 64.0);
            }
            crate::types::FieldTypeKind::Iface(_) | crate::types::FieldTypeKind::Primitive(PrimitiveKind::Null) => {}
            _ => {}
        }
        Ok(())
    }

    fn end(&mut self, _loc: &Path) -> Result<(), CoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        corpus::{PathSuffixRecord, ProbTables},
        entropy::prob_table::FreqTable,
        schema::Declaration,
        types::{PrimitiveKind, TypeRegistry},
        value::Instance,
    };
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn fixture() -> (Schema, FieldType, Value, ProbTables, WindowProbTables, HashMap<String, usize>) {
        let mut reg = TypeRegistry::new();
        let bool_ty = reg.make_primitive(PrimitiveKind::Bool);
        let null_ty = reg.make_primitive(PrimitiveKind::Null);
        let union = reg.make_union(vec![bool_ty, null_ty]).unwrap();
        let ident_ty = reg.make_ident(IdentTag::Ident);
        let root_ty = reg.make_iface("Root");

        let schema = Schema::build(vec![Declaration::Iface {
            name: "Root".into(),
            fields: vec![("flag".into(), union), ("name".into(), ident_ty)],
            is_node: true,
        }])
        .unwrap();

        let root = Value::Instance(
            Instance::new("Root")
                .with_field("flag", Value::Bool(true))
                .with_field(
                    "name",
                    Value::Identifier(crate::value::Identifier {
                        tag: IdentTag::Ident,
                        name: "x".into(),
                    }),
                ),
        );

        let mut type_freq = FreqTable::new(vec!["null".into(), "bool".into()]);
        type_freq.record(1);
        type_freq.record(1);
        let type_rec = PathSuffixRecord::from_freq("Root.flag#type", &type_freq);

        let mut bool_freq = FreqTable::new(vec!["true".into(), "false".into()]);
        bool_freq.record(0);
        bool_freq.record(0);
        let bool_rec = PathSuffixRecord::from_freq("Root.flag#bool", &bool_freq);

        let path_tables = ProbTables::from_records(&[type_rec, bool_rec]).unwrap();

        let mut ident_freq = FreqTable::new(vec!["0".into(), "1".into(), "MISS".into()]);
        ident_freq.record(2);
        ident_freq.record(2);
        let ident_table = ProbTable::from_freq("window#ident", &ident_freq).unwrap();
        let prop_table = ProbTable::from_freq("window#prop", &ident_freq).unwrap();
        let raw_table = ProbTable::from_freq("window#raw", &ident_freq).unwrap();
        let window_tables = WindowProbTables {
            ident: ident_table,
            prop: prop_table,
            raw: raw_table,
        };

        (schema, root_ty, root, path_tables, window_tables, HashMap::new())
    }

    #[test]
    fn encoding_is_deterministic_across_runs() {
        let (schema, root_ty, root, path_tables, window_tables, global_dict) = fixture();

        let mut first = EntropyCoder::new(&schema, &path_tables, &window_tables, &global_dict, 2, 4);
        first.encode_file(root_ty.clone(), &root).unwrap();

        let (schema2, root_ty2, root2, path_tables2, window_tables2, global_dict2) = fixture();
        let mut second = EntropyCoder::new(&schema2, &path_tables2, &window_tables2, &global_dict2, 2, 4);
        second.encode_file(root_ty2, &root2).unwrap();

        assert_eq!(first.accounting().total_bits(), second.accounting().total_bits());
        assert_eq!(
            first.literal_table().encoded_data(),
            second.literal_table().encoded_data()
        );
    }

    #[test]
    fn missing_path_suffix_context_aborts() {
        let mut reg = TypeRegistry::new();
        let bool_ty = reg.make_primitive(PrimitiveKind::Bool);
        let null_ty = reg.make_primitive(PrimitiveKind::Null);
        let union = reg.make_union(vec![bool_ty, null_ty]).unwrap();
        let root_ty = reg.make_iface("Root");
        let schema = Schema::build(vec![Declaration::Iface {
            name: "Root".into(),
            fields: vec![("flag".into(), union)],
            is_node: true,
        }])
        .unwrap();
        let root = Value::Instance(Instance::new("Root").with_field("flag", Value::Bool(true)));

        let path_tables = ProbTables::default();
        let mut ident_freq = FreqTable::new(vec!["0".into(), "MISS".into()]);
        ident_freq.record(0);
        let table = ProbTable::from_freq("window#ident", &ident_freq).unwrap();
        let window_tables = WindowProbTables {
            ident: table.clone(),
            prop: table.clone(),
            raw: table,
        };
        let global_dict = HashMap::new();

        let mut coder = EntropyCoder::new(&schema, &path_tables, &window_tables, &global_dict, 1, 4);
        let err = coder.encode_file(root_ty, &root).unwrap_err();
        assert!(matches!(err, CoreError::BadProbTable(BadProbTable::MissingContext(_))));
    }
}
