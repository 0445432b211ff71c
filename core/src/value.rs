//! Tree-position values (spec §3 `Value`).

use std::fmt::Display;

use crate::types::{IdentTag, TypeName};

/// An opaque variable-identifier or property-name handle. The *value* is
/// never interpreted by the core pipeline, only carried and, on a string
/// window cache miss, spelled out through the literal string table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier {
    pub tag: IdentTag,
    pub name: String,
}

/// A tree-position value, matched against a [`crate::types::FieldType`]
/// bound by [`crate::schema::Schema::matches`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    F64(f64),
    Str(String),
    Identifier(Identifier),
    Instance(Instance),
    Array(Vec<Value>),
}

/// An interface-typed node value; carries the name of the declaring
/// `Iface` and its field values in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub iface: TypeName,
    pub fields: Vec<(String, Value)>,
}

impl Instance {
    pub fn new(iface: impl Into<TypeName>) -> Self {
        Self {
            iface: iface.into(),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::F64(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Identifier(id) => write!(f, "{}:{}", id.tag, id.name),
            Value::Instance(inst) => write!(f, "{}{{..}}", inst.iface),
            Value::Array(items) => write!(f, "[{} items]", items.len()),
        }
    }
}
