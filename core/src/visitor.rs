//! Depth-first tree visitor producing a stream of `(key, shape, bound,
//! value)` tuples through `begin`/`end` callbacks, maintaining a path
//! stack (spec §4.2).
//!
//! Grounded on the teacher's `TypeGraphIter` frontier/visited traversal
//! style, and on the `dyn Sink`/`dyn io::Write` capability pattern from
//! the pack's `sink` crate for expressing the handler as a swappable
//! trait object rather than a generic bound (pipeline stages pick a
//! different handler at runtime from the CLI's flag set).

use std::rc::Rc;

use crate::{
    error::CoreError,
    schema::Schema,
    typeset::{self, ResolvedType, TypeSet},
    types::{FieldType, FieldTypeKind},
    value::Value,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Str(String),
    Index(usize),
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Str(s) => write!(f, "{s}"),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

pub struct Frame<'v> {
    pub key: Key,
    pub shape: ResolvedType,
    pub bound: FieldType,
    pub value: &'v Value,
}

/// Parallel ordered stacks of visited frames; `ancestors()` yields most
/// recent first, with the current frame at top (spec §3, §4.2).
pub struct Path<'v> {
    frames: Vec<Frame<'v>>,
}

impl<'v> Path<'v> {
    fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn top(&self) -> &Frame<'v> {
        self.frames.last().expect("path is never empty during a callback")
    }

    pub fn ancestors(&self) -> impl Iterator<Item = &Frame<'v>> {
        self.frames.iter().rev()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn keystring(&self) -> String {
        self.frames
            .iter()
            .map(|f| f.key.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Capability a pipeline stage implements to observe tree positions.
pub trait Handler {
    fn begin(&mut self, loc: &Path) -> Result<(), CoreError>;
    fn end(&mut self, loc: &Path) -> Result<(), CoreError>;
}

/// Walks `root` (an instance of interface `root_iface`) against `schema`,
/// invoking `handler.begin`/`handler.end` in depth-first pre/post order
/// (spec §4.2). The path stack is balanced: every `begin` has a matching
/// `end` with the same value, and it is empty again once `visit` returns.
pub fn visit(schema: &Schema, root_iface: FieldType, root: &Value, handler: &mut dyn Handler) -> Result<(), CoreError> {
    let mut path = Path::new();
    visit_value(schema, Key::Str("$Root".into()), root_iface, root, handler, &mut path)
}

fn visit_value<'v>(
    schema: &Schema,
    key: Key,
    bound: FieldType,
    value: &'v Value,
    handler: &mut dyn Handler,
    path: &mut Path<'v>,
) -> Result<(), CoreError> {
    let type_set: Rc<TypeSet> = schema.flatten(&bound);
    let prefix = path.keystring();
    let shape = typeset::resolve(schema, type_set, value, || format!("{prefix}.{key}"))?;

    path.frames.push(Frame {
        key,
        shape: shape.clone(),
        bound: bound.clone(),
        value,
    });
    handler.begin(path)?;

    match shape.ty.kind() {
        FieldTypeKind::Iface(name) => {
            let crate::schema::Declaration::Iface { fields, .. } = schema.get_decl(name)? else {
                unreachable!("Iface terminal must resolve to an Iface declaration")
            };
            let Value::Instance(inst) = value else {
                unreachable!("matches() already confirmed this value is an Instance")
            };
            for (field_name, field_ty) in fields {
                let field_value = inst.field(field_name).ok_or_else(|| CoreError::ValueDoesNotMatchSchema {
                    path: format!("{}.{field_name}", path.keystring()),
                    bound: format!("missing field `{field_name}`"),
                })?;
                visit_value(
                    schema,
                    Key::Str(field_name.clone()),
                    field_ty.clone(),
                    field_value,
                    handler,
                    path,
                )?;
            }
        }
        FieldTypeKind::Array(inner) => {
            let Value::Array(items) = value else {
                unreachable!("matches() already confirmed this value is an array")
            };
            let inner = inner.clone();
            for (i, elem) in items.iter().enumerate() {
                visit_value(schema, Key::Index(i), inner.clone(), elem, handler, path)?;
            }
        }
        FieldTypeKind::Primitive(_) | FieldTypeKind::Ident(_) | FieldTypeKind::Enum(_) => {}
        FieldTypeKind::Named(_) | FieldTypeKind::Union(_) => {
            unreachable!("resolve() only ever returns terminal types")
        }
    }

    handler.end(path)?;
    path.frames.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        schema::Declaration,
        types::{PrimitiveKind, TypeRegistry},
        value::Instance,
    };
    use pretty_assertions::assert_eq;

    struct RecordingHandler {
        events: Vec<String>,
    }

    impl Handler for RecordingHandler {
        fn begin(&mut self, loc: &Path) -> Result<(), CoreError> {
            self.events.push(format!("begin:{}", loc.top().key));
            Ok(())
        }
        fn end(&mut self, loc: &Path) -> Result<(), CoreError> {
            self.events.push(format!("end:{}", loc.top().key));
            Ok(())
        }
    }

    #[test]
    fn visitor_is_balanced_and_depth_first() {
        let mut reg = TypeRegistry::new();
        let bool_ty = reg.make_primitive(PrimitiveKind::Bool);
        let iface_ty = reg.make_iface("Node");

        let schema = Schema::build(vec![Declaration::Iface {
            name: "Node".into(),
            fields: vec![("flag".into(), bool_ty)],
            is_node: true,
        }])
        .unwrap();

        let root = Value::Instance(Instance::new("Node").with_field("flag", Value::Bool(true)));

        let mut handler = RecordingHandler { events: vec![] };
        visit(&schema, iface_ty, &root, &mut handler).unwrap();

        assert_eq!(
            handler.events,
            vec!["begin:$Root", "begin:flag", "end:flag", "end:$Root"]
        );
    }

    #[test]
    fn mismatched_value_fails() {
        let mut reg = TypeRegistry::new();
        let iface_ty = reg.make_iface("Node");
        let schema = Schema::build(vec![Declaration::Iface {
            name: "Node".into(),
            fields: vec![],
            is_node: true,
        }])
        .unwrap();

        let root = Value::Bool(true);
        let mut handler = RecordingHandler { events: vec![] };
        let err = visit(&schema, iface_ty, &root, &mut handler).unwrap_err();
        assert!(matches!(err, CoreError::ValueDoesNotMatchSchema { .. }));
    }
}
