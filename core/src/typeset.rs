//! Flattening: eliminating named references and nested unions from a
//! [`FieldType`], producing an ordered, deduplicated list of terminals
//! (spec §3, §4.1, §8 property 2).
//!
//! Grounded on the teacher's `TypeReducer`/`CanonicalView`: a recursive
//! walk that interns/dedups by id as it goes, except here flattening
//! produces a flat terminal list rather than merging `Object` nodes.

use std::rc::Rc;

use crate::{
    error::CoreError,
    schema::{Declaration, Schema},
    types::{FieldType, FieldTypeKind, TypeId},
    value::Value,
};

/// Ordered, deduplicated-by-`typeId` list of terminal [`FieldType`]s.
/// `Null` is pushed to the front exactly once if present anywhere in the
/// flattening (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSet {
    terminals: Vec<FieldType>,
}

impl TypeSet {
    pub fn len(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terminals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldType> {
        self.terminals.iter()
    }

    pub fn get(&self, index: usize) -> Option<&FieldType> {
        self.terminals.get(index)
    }

    pub fn index_of_type_id(&self, id: TypeId) -> Option<usize> {
        self.terminals.iter().position(|t| t.type_id() == id)
    }
}

/// The unique terminal in a [`TypeSet`] that matches a value, and its
/// index within that set (spec §3 `ResolvedType`).
#[derive(Debug, Clone)]
pub struct ResolvedType {
    pub type_set: Rc<TypeSet>,
    pub ty: FieldType,
    pub index: usize,
}

/// Resolves `value` against `type_set`: exactly one terminal must match,
/// or this fails with `ValueDoesNotMatchSchema` (no match) or
/// `AmbiguousResolution` (more than one match) — spec §4.1, §8 property 3.
pub fn resolve(
    schema: &Schema,
    type_set: Rc<TypeSet>,
    value: &Value,
    path: impl FnOnce() -> String,
) -> Result<ResolvedType, CoreError> {
    let mut matched: Vec<usize> = Vec::new();
    for (i, ty) in type_set.iter().enumerate() {
        if schema.matches(ty, value) {
            matched.push(i);
        }
    }

    match matched.len() {
        0 => Err(CoreError::ValueDoesNotMatchSchema {
            path: path(),
            bound: format!("{type_set:?}"),
        }),
        1 => {
            let index = matched[0];
            let ty = type_set.get(index).expect("index in range").clone();
            Ok(ResolvedType { type_set, ty, index })
        }
        count => Err(CoreError::AmbiguousResolution {
            path: path(),
            type_set: format!("{type_set:?}"),
            count,
        }),
    }
}

/// Flattens `ty` under `schema`. Not memoized itself — callers should go
/// through [`Schema::flatten`], which caches by `(generation, typeId)`.
pub fn flatten(schema: &Schema, ty: &FieldType) -> TypeSet {
    let mut seen_ids = Vec::new();
    let mut terminals = Vec::new();
    let mut saw_null = false;
    collect(schema, ty, &mut terminals, &mut seen_ids, &mut saw_null);

    if saw_null {
        if let Some(pos) = terminals.iter().position(|t| is_null(t)) {
            let null_ty = terminals.remove(pos);
            terminals.insert(0, null_ty);
        }
    }

    TypeSet { terminals }
}

fn is_null(ty: &FieldType) -> bool {
    matches!(
        ty.kind(),
        FieldTypeKind::Primitive(crate::types::PrimitiveKind::Null)
    )
}

fn collect(
    schema: &Schema,
    ty: &FieldType,
    terminals: &mut Vec<FieldType>,
    seen_ids: &mut Vec<TypeId>,
    saw_null: &mut bool,
) {
    match ty.kind() {
        FieldTypeKind::Named(name) => match schema.get_decl(name) {
            Ok(Declaration::Typedef { aliased, .. }) => {
                let aliased = aliased.clone();
                collect(schema, &aliased, terminals, seen_ids, saw_null);
            }
            Ok(Declaration::Iface { name, .. }) => {
                push_terminal(schema.canonical_iface(name), terminals, seen_ids, saw_null);
            }
            Ok(Declaration::Enum { name, .. }) => {
                push_terminal(schema.canonical_enum(name), terminals, seen_ids, saw_null);
            }
            Err(_) => {
                push_terminal(ty.clone(), terminals, seen_ids, saw_null);
            }
        },
        FieldTypeKind::Union(variants) => {
            for v in variants {
                collect(schema, v, terminals, seen_ids, saw_null);
            }
        }
        FieldTypeKind::Primitive(_)
        | FieldTypeKind::Ident(_)
        | FieldTypeKind::Iface(_)
        | FieldTypeKind::Enum(_)
        | FieldTypeKind::Array(_) => {
            push_terminal(ty.clone(), terminals, seen_ids, saw_null);
        }
    }
}

fn push_terminal(ty: FieldType, terminals: &mut Vec<FieldType>, seen_ids: &mut Vec<TypeId>, saw_null: &mut bool) {
    if seen_ids.contains(&ty.type_id()) {
        return;
    }
    if is_null(&ty) {
        *saw_null = true;
    }
    seen_ids.push(ty.type_id());
    terminals.push(ty);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Declaration;
    use crate::types::{PrimitiveKind, TypeRegistry};
    use pretty_assertions::assert_eq;

    #[test]
    fn null_moves_to_front() {
        let mut reg = TypeRegistry::new();
        let bool_ty = reg.make_primitive(PrimitiveKind::Bool);
        let null_ty = reg.make_primitive(PrimitiveKind::Null);
        let union = reg.make_union(vec![bool_ty.clone(), null_ty.clone()]).unwrap();

        let schema = Schema::build(vec![]).unwrap();
        let set = flatten(&schema, &union);
        assert_eq!(set.len(), 2);
        assert!(is_null(set.get(0).unwrap()));
    }

    #[test]
    fn named_ref_to_iface_flattens_to_iface_terminal() {
        let mut reg = TypeRegistry::new();
        let named = reg.make_named("Node");

        let schema = Schema::build(vec![Declaration::Iface {
            name: "Node".into(),
            fields: vec![],
            is_node: true,
        }])
        .unwrap();

        let set = flatten(&schema, &named);
        assert_eq!(set.len(), 1);
        assert!(matches!(set.get(0).unwrap().kind(), FieldTypeKind::Iface(n) if n.as_str() == "Node"));
    }

    #[test]
    fn typedef_alias_flattens_transparently() {
        let mut reg = TypeRegistry::new();
        let bool_ty = reg.make_primitive(PrimitiveKind::Bool);
        let null_ty = reg.make_primitive(PrimitiveKind::Null);
        let union = reg.make_union(vec![bool_ty, null_ty]).unwrap();
        let named = reg.make_named("T");

        let schema = Schema::build(vec![Declaration::Typedef {
            name: "T".into(),
            aliased: union,
        }])
        .unwrap();

        let set = flatten(&schema, &named);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn flattening_is_idempotent() {
        let mut reg = TypeRegistry::new();
        let a = reg.make_primitive(PrimitiveKind::Bool);
        let b = reg.make_primitive(PrimitiveKind::Uint);
        let union = reg.make_union(vec![a, b]).unwrap();
        let schema = Schema::build(vec![]).unwrap();

        let once = flatten(&schema, &union);
        let rebuilt = reg.make_union(once.iter().cloned().collect()).unwrap();
        let twice = flatten(&schema, &rebuilt);
        assert_eq!(once, twice);
    }

    #[test]
    fn dedups_by_type_id() {
        let mut reg = TypeRegistry::new();
        let a = reg.make_primitive(PrimitiveKind::Bool);
        let dup_path_a = reg.make_primitive(PrimitiveKind::Bool);
        let c = reg.make_primitive(PrimitiveKind::Uint);
        let inner = reg.make_union(vec![a, c]).unwrap();
        let outer = reg.make_union(vec![inner, dup_path_a]).unwrap();

        let schema = Schema::build(vec![]).unwrap();
        let set = flatten(&schema, &outer);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn resolve_reports_ambiguous_match() {
        let mut reg = TypeRegistry::new();
        let uint_ty = reg.make_primitive(PrimitiveKind::Uint);
        let int_ty = reg.make_primitive(PrimitiveKind::Int);
        let union = reg.make_union(vec![uint_ty, int_ty]).unwrap();

        let schema = Schema::build(vec![]).unwrap();
        let set = Rc::new(flatten(&schema, &union));

        let err = resolve(&schema, set, &Value::Int(0), || "$Root.n".to_string()).unwrap_err();
        assert!(matches!(err, CoreError::AmbiguousResolution { count: 2, .. }));
    }
}
