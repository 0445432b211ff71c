//! Interned, hash-consed grammar types (spec §3, §4.1).
//!
//! Mirrors the teacher's `TypeGraph` interning discipline (`BTreeMap<key,
//! id>` cache + a monotonic [`Iota`] counter, canonicalized before
//! caching) but applied to the spec's `FieldType` shape instead of the
//! teacher's JSON-inferred `TypeDef`: every constructor is idempotent and
//! returns a cheaply-clonable handle carrying a process-wide unique
//! `TypeId`, interned by a structural string key rather than by
//! `Ord`-derived `BTreeMap<TypeDef, TypeId>` lookup, since `FieldType`
//! nests other `FieldType`s directly instead of referencing them by id.

use std::{collections::BTreeMap, fmt::Display, rc::Rc};

use binast_iota::Iota;

use crate::error::SchemaError;

pub type TypeId = usize;

/// Interned string key for a declared grammar entity (typedef, enum, or
/// interface name). Cheap to clone; compares by pointer-free value equality.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeName(Rc<str>);

impl TypeName {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TypeName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TypeName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Null,
    Bool,
    Uint,
    Int,
    F64,
    Str,
}

impl Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PrimitiveKind::Null => "null",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Uint => "uint",
            PrimitiveKind::Int => "int",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Str => "str",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IdentTag {
    Ident,
    Prop,
}

impl Display for IdentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IdentTag::Ident => "ident",
            IdentTag::Prop => "prop",
        };
        write!(f, "{}", s)
    }
}

/// A grammar type, interned and hash-consed. Clone is O(1) (`Rc` bump).
#[derive(Debug, Clone)]
pub struct FieldType(Rc<FieldTypeNode>);

#[derive(Debug)]
struct FieldTypeNode {
    id: TypeId,
    kind: FieldTypeKind,
}

#[derive(Debug, Clone)]
pub enum FieldTypeKind {
    Primitive(PrimitiveKind),
    Ident(IdentTag),
    Named(TypeName),
    Iface(TypeName),
    Enum(TypeName),
    Array(FieldType),
    Union(Vec<FieldType>),
}

impl PartialEq for FieldType {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}
impl Eq for FieldType {}

impl FieldType {
    pub fn type_id(&self) -> TypeId {
        self.0.id
    }

    pub fn kind(&self) -> &FieldTypeKind {
        &self.0.kind
    }

    /// Terminal types need no further resolution against a schema;
    /// `Named`/`Union` do (spec §3).
    pub fn is_terminal(&self) -> bool {
        !matches!(self.0.kind, FieldTypeKind::Named(_) | FieldTypeKind::Union(_))
    }

    fn structural_key(kind: &FieldTypeKind) -> String {
        match kind {
            FieldTypeKind::Primitive(p) => format!("primitive:{p}"),
            FieldTypeKind::Ident(t) => format!("ident:{t}"),
            FieldTypeKind::Named(n) => format!("named:{n}"),
            FieldTypeKind::Iface(n) => format!("iface:{n}"),
            FieldTypeKind::Enum(n) => format!("enum:{n}"),
            FieldTypeKind::Array(inner) => format!("array:{}", inner.structural_key_self()),
            FieldTypeKind::Union(variants) => {
                let joined = variants
                    .iter()
                    .map(|v| v.structural_key_self())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("union:({joined})")
            }
        }
    }

    fn structural_key_self(&self) -> String {
        Self::structural_key(&self.0.kind)
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.kind {
            FieldTypeKind::Primitive(p) => write!(f, "{p}"),
            FieldTypeKind::Ident(t) => write!(f, "{t}"),
            FieldTypeKind::Named(n) => write!(f, "{n}"),
            FieldTypeKind::Iface(n) => write!(f, "{n}"),
            FieldTypeKind::Enum(n) => write!(f, "{n}"),
            FieldTypeKind::Array(inner) => write!(f, "[{inner}]"),
            FieldTypeKind::Union(variants) => {
                for v in variants {
                    write!(f, "|{v}")?;
                }
                write!(f, "|")
            }
        }
    }
}

/// Interns [`FieldType`] nodes keyed by structural string, assigning each
/// distinct key a process-wide unique [`TypeId`] via [`Iota`].
#[derive(Default)]
pub struct TypeRegistry {
    by_key: BTreeMap<String, FieldType>,
    iota: Iota,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, kind: FieldTypeKind) -> FieldType {
        let key = FieldType::structural_key(&kind);
        if let Some(existing) = self.by_key.get(&key) {
            return existing.clone();
        }
        let id = self.iota.next();
        let ty = FieldType(Rc::new(FieldTypeNode { id, kind }));
        self.by_key.insert(key, ty.clone());
        ty
    }

    pub fn make_primitive(&mut self, kind: PrimitiveKind) -> FieldType {
        self.intern(FieldTypeKind::Primitive(kind))
    }

    pub fn make_ident(&mut self, tag: IdentTag) -> FieldType {
        self.intern(FieldTypeKind::Ident(tag))
    }

    pub fn make_named(&mut self, name: impl Into<TypeName>) -> FieldType {
        self.intern(FieldTypeKind::Named(name.into()))
    }

    pub fn make_iface(&mut self, name: impl Into<TypeName>) -> FieldType {
        self.intern(FieldTypeKind::Iface(name.into()))
    }

    pub fn make_enum(&mut self, name: impl Into<TypeName>) -> FieldType {
        self.intern(FieldTypeKind::Enum(name.into()))
    }

    pub fn make_array(&mut self, inner: FieldType) -> FieldType {
        self.intern(FieldTypeKind::Array(inner))
    }

    /// Fails if fewer than two distinct variants remain after dedup by
    /// `typeId`; a degenerate union of one variant collapses to that
    /// variant instead of erroring (spec §4.1).
    pub fn make_union(&mut self, variants: Vec<FieldType>) -> Result<FieldType, SchemaError> {
        let mut deduped: Vec<FieldType> = Vec::with_capacity(variants.len());
        for v in variants {
            if !deduped.iter().any(|d| d.type_id() == v.type_id()) {
                deduped.push(v);
            }
        }

        match deduped.len() {
            0 => Err(SchemaError::DegenerateUnion(0)),
            1 => Ok(deduped.into_iter().next().unwrap()),
            _ => Ok(self.intern(FieldTypeKind::Union(deduped))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn interning_is_idempotent() {
        let mut reg = TypeRegistry::new();
        let a = reg.make_primitive(PrimitiveKind::Bool);
        let b = reg.make_primitive(PrimitiveKind::Bool);
        assert_eq!(a.type_id(), b.type_id());

        let a = reg.make_iface("Expression");
        let b = reg.make_iface("Expression");
        assert_eq!(a.type_id(), b.type_id());
    }

    #[test]
    fn distinct_constructions_get_distinct_ids() {
        let mut reg = TypeRegistry::new();
        let a = reg.make_primitive(PrimitiveKind::Bool);
        let b = reg.make_primitive(PrimitiveKind::Uint);
        assert_ne!(a.type_id(), b.type_id());
    }

    #[test]
    fn union_collapses_degenerate_single_variant() {
        let mut reg = TypeRegistry::new();
        let bool_ty = reg.make_primitive(PrimitiveKind::Bool);
        let dup = reg.make_primitive(PrimitiveKind::Bool);
        let collapsed = reg.make_union(vec![bool_ty.clone(), dup]).unwrap();
        assert_eq!(collapsed.type_id(), bool_ty.type_id());
    }

    #[test]
    fn union_of_zero_variants_errors() {
        let mut reg = TypeRegistry::new();
        let err = reg.make_union(vec![]).unwrap_err();
        assert!(matches!(err, SchemaError::DegenerateUnion(0)));
    }

    #[test]
    fn array_is_terminal_union_is_not() {
        let mut reg = TypeRegistry::new();
        let inner = reg.make_primitive(PrimitiveKind::Str);
        let arr = reg.make_array(inner.clone());
        assert!(arr.is_terminal());

        let u = reg
            .make_union(vec![inner, reg.make_primitive(PrimitiveKind::Uint)])
            .unwrap();
        assert!(!u.is_terminal());

        let named = reg.make_named("Foo");
        assert!(!named.is_terminal());
    }

    #[test]
    fn display_matches_structural_shape() {
        let mut reg = TypeRegistry::new();
        let inner = reg.make_primitive(PrimitiveKind::Bool);
        let arr = reg.make_array(inner);
        assert_eq!(format!("{arr}"), "[bool]");
    }
}
