//! Canonical bounded ancestor-path keys and the leaf `(tag, index,
//! alphabet)` mapping used to key context-sensitive probability tables
//! (spec §4.3).
//!
//! `PathSlice`/`PathSuffix` interning follows the same owned-cache
//! discipline as [`crate::types::TypeRegistry`] — a context struct here,
//! [`PathInterner`], rather than a module-level static.

use std::{collections::HashMap, fmt::Display, rc::Rc};

use crate::{
    schema::{Declaration, Schema},
    types::{FieldType, FieldTypeKind, PrimitiveKind, TypeName},
    value::Value,
    visitor::{Key, Path},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSlice {
    pub iface: TypeName,
    pub syms: Vec<String>,
    key: Rc<str>,
}

impl PathSlice {
    fn build_key(iface: &TypeName, syms: &[String]) -> String {
        let mut s = iface.to_string();
        for sym in syms {
            s.push('.');
            s.push_str(sym);
        }
        s
    }

    pub fn key_string(&self) -> &str {
        &self.key
    }
}

impl Display for PathSlice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Fixed-length ordered list of [`PathSlice`]s, interned by its `/`-joined
/// key string (spec §3, §8 property 5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSuffix {
    pub slices: Vec<Rc<PathSlice>>,
    key: Rc<str>,
}

impl PathSuffix {
    pub fn key_string(&self) -> &str {
        &self.key
    }
}

impl Display for PathSuffix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// Owned intern tables for slices and suffixes (design notes: no
/// module-level `PATH_SLICES`/`PATH_SUFFIXES` statics).
#[derive(Default)]
pub struct PathInterner {
    slices: HashMap<String, Rc<PathSlice>>,
    suffixes: HashMap<String, Rc<PathSuffix>>,
}

impl PathInterner {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern_slice(&mut self, iface: TypeName, syms: Vec<String>) -> Rc<PathSlice> {
        let key = PathSlice::build_key(&iface, &syms);
        if let Some(existing) = self.slices.get(&key) {
            return existing.clone();
        }
        let slice = Rc::new(PathSlice {
            iface,
            syms,
            key: Rc::from(key.as_str()),
        });
        self.slices.insert(key, slice.clone());
        slice
    }

    fn intern_suffix(&mut self, slices: Vec<Rc<PathSlice>>) -> Rc<PathSuffix> {
        let key = slices.iter().map(|s| s.key_string()).collect::<Vec<_>>().join("/");
        if let Some(existing) = self.suffixes.get(&key) {
            return existing.clone();
        }
        let suffix = Rc::new(PathSuffix {
            slices,
            key: Rc::from(key.as_str()),
        });
        self.suffixes.insert(key, suffix.clone());
        suffix
    }
}

fn leaf_symbol(key: &Key, collapse_threshold: usize) -> String {
    match key {
        Key::Index(i) if *i >= collapse_threshold => "index".to_string(),
        Key::Index(i) => i.to_string(),
        Key::Str(s) => s.clone(),
    }
}

fn is_node_iface(schema: &Schema, name: &TypeName) -> bool {
    matches!(
        schema.get_decl(name),
        Ok(Declaration::Iface { is_node: true, .. })
    )
}

/// Builds a path suffix of exactly `length` slices for the current top of
/// `loc`, or returns `None` if the location is too shallow or crosses an
/// array boundary at an inner level (spec §4.3 algorithm).
pub fn for_location(
    schema: &Schema,
    loc: &Path,
    length: usize,
    collapse_threshold: usize,
    interner: &mut PathInterner,
) -> Option<Rc<PathSuffix>> {
    let mut iter = loc.ancestors();
    let leaf = iter.next()?;
    let mut sym_accum = vec![leaf_symbol(&leaf.key, collapse_threshold)];
    let mut slice_accum: Vec<Rc<PathSlice>> = Vec::new();

    for frame in iter {
        if slice_accum.len() >= length {
            break;
        }
        match &frame.key {
            Key::Index(_) => return None,
            Key::Str(s) => {
                let closes_here = matches!(frame.shape.ty.kind(), FieldTypeKind::Iface(name) if is_node_iface(schema, name));
                if closes_here {
                    let FieldTypeKind::Iface(name) = frame.shape.ty.kind() else {
                        unreachable!()
                    };
                    sym_accum.reverse();
                    let slice = interner.intern_slice(name.clone(), std::mem::take(&mut sym_accum));
                    slice_accum.push(slice);
                    sym_accum = vec![s.clone()];
                } else {
                    sym_accum.push(s.clone());
                }
            }
        }
    }

    if sym_accum.len() != 1 || slice_accum.len() < length {
        return None;
    }

    slice_accum.reverse();
    Some(interner.intern_suffix(slice_accum))
}

/// `(tag, index, alphabet)` for a leaf value under its resolved terminal
/// type (spec §4.3's table). `ty` must already be a terminal type — the
/// caller always passes a `ResolvedType::ty`, never a `Named`/`Union`.
pub struct TagAndIndex {
    pub tag: String,
    pub index: usize,
    pub alphabet: Vec<String>,
}

pub fn value_tag_and_index(schema: &Schema, ty: &FieldType, value: &Value) -> Option<TagAndIndex> {
    match ty.kind() {
        FieldTypeKind::Primitive(PrimitiveKind::Bool) => {
            let Value::Bool(b) = value else { return None };
            Some(TagAndIndex {
                tag: "bool".into(),
                index: if *b { 1 } else { 0 },
                alphabet: vec!["true".into(), "false".into()],
            })
        }
        FieldTypeKind::Primitive(PrimitiveKind::Uint) => {
            let Value::Int(v) = value else { return None };
            const N: i64 = 9;
            let index = if *v < N - 1 { *v as usize } else { (N - 1) as usize };
            let mut alphabet: Vec<String> = (0..N - 1).map(|n| n.to_string()).collect();
            alphabet.push("MISS".into());
            Some(TagAndIndex {
                tag: "uint".into(),
                index,
                alphabet,
            })
        }
        FieldTypeKind::Primitive(PrimitiveKind::Int) => {
            let Value::Int(v) = value else { return None };
            const N: i64 = 9;
            let index = if *v >= -1 && *v <= N - 3 { (*v + 1) as usize } else { (N - 1) as usize };
            let mut alphabet: Vec<String> = (-1..=N - 3).map(|n| n.to_string()).collect();
            alphabet.push("MISS".into());
            Some(TagAndIndex {
                tag: "int".into(),
                index,
                alphabet,
            })
        }
        FieldTypeKind::Array(_) => {
            let Value::Array(items) = value else { return None };
            const N: i64 = 17;
            let len = items.len() as i64;
            let index = if len < N - 1 { len as usize } else { (N - 1) as usize };
            let mut alphabet: Vec<String> = (0..N - 1).map(|n| n.to_string()).collect();
            alphabet.push("MISS".into());
            Some(TagAndIndex {
                tag: "arrayLength".into(),
                index,
                alphabet,
            })
        }
        FieldTypeKind::Enum(name) => {
            let Value::Str(s) = value else { return None };
            let Ok(Declaration::Enum { variants, .. }) = schema.get_decl(name) else {
                return None;
            };
            let index = variants.iter().position(|v| v == s)?;
            let alphabet = variants.iter().map(|v| format!("{name}.{v}")).collect();
            Some(TagAndIndex {
                tag: name.to_string(),
                index,
                alphabet,
            })
        }
        _ => None,
    }
}
