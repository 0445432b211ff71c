//! JSON bridges to the external collaborators spec.md §1 puts out of
//! scope: the WebIDL-to-schema lifter's declaration-list output and the
//! JSON-AST-to-typed-tree importer's `Value`-shaped tree output. The core
//! only needs the in-memory [`Schema`]/[`Value`] these produce; this
//! module is the CLI-facing seam that deserializes their JSON shape into
//! those in-memory types.

use serde::{Deserialize, Serialize};

use crate::{
    error::SchemaError,
    schema::{Declaration, Schema},
    types::{FieldType, IdentTag, PrimitiveKind, TypeRegistry},
    value::{Identifier, Instance, Value},
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RawFieldType {
    Primitive { name: String },
    Ident { tag: String },
    Named { name: String },
    Iface { name: String },
    Enum { name: String },
    Array { inner: Box<RawFieldType> },
    Union { variants: Vec<RawFieldType> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RawDeclaration {
    Typedef {
        name: String,
        aliased: RawFieldType,
    },
    Enum {
        name: String,
        variants: Vec<String>,
    },
    Iface {
        name: String,
        fields: Vec<(String, RawFieldType)>,
        is_node: bool,
    },
}

fn parse_primitive(name: &str) -> Result<PrimitiveKind, SchemaError> {
    match name {
        "null" => Ok(PrimitiveKind::Null),
        "bool" => Ok(PrimitiveKind::Bool),
        "uint" => Ok(PrimitiveKind::Uint),
        "int" => Ok(PrimitiveKind::Int),
        "f64" => Ok(PrimitiveKind::F64),
        "str" => Ok(PrimitiveKind::Str),
        other => Err(SchemaError::UnknownType(other.into())),
    }
}

fn parse_ident_tag(tag: &str) -> Result<IdentTag, SchemaError> {
    match tag {
        "ident" => Ok(IdentTag::Ident),
        "prop" => Ok(IdentTag::Prop),
        other => Err(SchemaError::UnknownType(other.into())),
    }
}

fn lower_field_type(reg: &mut TypeRegistry, raw: RawFieldType) -> Result<FieldType, SchemaError> {
    Ok(match raw {
        RawFieldType::Primitive { name } => reg.make_primitive(parse_primitive(&name)?),
        RawFieldType::Ident { tag } => reg.make_ident(parse_ident_tag(&tag)?),
        RawFieldType::Named { name } => reg.make_named(name),
        RawFieldType::Iface { name } => reg.make_iface(name),
        RawFieldType::Enum { name } => reg.make_enum(name),
        RawFieldType::Array { inner } => {
            let inner = lower_field_type(reg, *inner)?;
            reg.make_array(inner)
        }
        RawFieldType::Union { variants } => {
            let lowered = variants
                .into_iter()
                .map(|v| lower_field_type(reg, v))
                .collect::<Result<Vec<_>, _>>()?;
            reg.make_union(lowered)?
        }
    })
}

fn lower_declaration(reg: &mut TypeRegistry, raw: RawDeclaration) -> Result<Declaration, SchemaError> {
    Ok(match raw {
        RawDeclaration::Typedef { name, aliased } => Declaration::Typedef {
            name: name.into(),
            aliased: lower_field_type(reg, aliased)?,
        },
        RawDeclaration::Enum { name, variants } => Declaration::Enum {
            name: name.into(),
            variants,
        },
        RawDeclaration::Iface { name, fields, is_node } => Declaration::Iface {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(fname, fty)| Ok((fname, lower_field_type(reg, fty)?)))
                .collect::<Result<Vec<_>, SchemaError>>()?,
            is_node,
        },
    })
}

/// Builds a [`Schema`] (and the [`TypeRegistry`] backing its field types)
/// from a deserialized declaration list.
pub fn build_schema(raw: Vec<RawDeclaration>) -> Result<(Schema, TypeRegistry), SchemaError> {
    let mut reg = TypeRegistry::new();
    let decls = raw
        .into_iter()
        .map(|d| lower_declaration(&mut reg, d))
        .collect::<Result<Vec<_>, _>>()?;
    let schema = Schema::build(decls)?;
    Ok((schema, reg))
}

/// Untagged, unlike [`RawFieldType`]/[`RawDeclaration`]: its `Bool`/`Int`/
/// `F64`/`Str`/`Array` variants wrap bare JSON scalars/arrays, which an
/// internally tagged (`kind`-keyed) representation cannot merge a tag into.
/// Declaration order matters for the numeric variants — an integer literal
/// is tried against `Int` before falling through to `F64`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    F64(f64),
    Str(String),
    Identifier { tag: String, name: String },
    Instance { iface: String, fields: Vec<(String, RawValue)> },
    Array(Vec<RawValue>),
}

pub fn lower_value(raw: RawValue) -> Result<Value, SchemaError> {
    Ok(match raw {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(b),
        RawValue::Int(i) => Value::Int(i),
        RawValue::F64(f) => Value::F64(f),
        RawValue::Str(s) => Value::Str(s),
        RawValue::Identifier { tag, name } => Value::Identifier(Identifier {
            tag: parse_ident_tag(&tag)?,
            name,
        }),
        RawValue::Instance { iface, fields } => {
            let mut inst = Instance::new(iface);
            for (fname, fval) in fields {
                inst = inst.with_field(fname, lower_value(fval)?);
            }
            Value::Instance(inst)
        }
        RawValue::Array(items) => {
            Value::Array(items.into_iter().map(lower_value).collect::<Result<Vec<_>, _>>()?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_schema_from_raw_declarations() {
        let raw = vec![RawDeclaration::Iface {
            name: "Root".into(),
            fields: vec![("flag".into(), RawFieldType::Primitive { name: "bool".into() })],
            is_node: true,
        }];
        let (schema, _reg) = build_schema(raw).unwrap();
        assert!(schema.get_decl(&"Root".into()).is_ok());
    }

    #[test]
    fn unknown_primitive_name_fails() {
        let raw = vec![RawDeclaration::Typedef {
            name: "T".into(),
            aliased: RawFieldType::Primitive { name: "nope".into() },
        }];
        let err = build_schema(raw).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType(_)));
    }

    #[test]
    fn lowers_nested_instance_value() {
        let raw = RawValue::Instance {
            iface: "Root".into(),
            fields: vec![("flag".into(), RawValue::Bool(true))],
        };
        let value = lower_value(raw).unwrap();
        match value {
            Value::Instance(inst) => assert_eq!(inst.field("flag"), Some(&Value::Bool(true))),
            other => panic!("expected Instance, got {other:?}"),
        }
    }
}
