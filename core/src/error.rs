//! Error types for the core schema/visitor/model pipeline.
//!
//! The teacher crate this workspace is descended from never modeled
//! failure at all (its JSON-schema inference is total). Once types are
//! matched against arbitrary values and probability tables are looked up
//! by context key, failure is routine, so the error enum here follows the
//! pack's `thiserror`-based convention instead (one variant per documented
//! failure mode, `#[from]` for wrapped I/O/JSON errors).

use thiserror::Error;

use crate::types::TypeName;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unknown type `{0}`")]
    UnknownType(TypeName),

    #[error("declaration `{0}` is already defined")]
    DuplicateDeclaration(TypeName),

    #[error("enum `{0}` has no variants")]
    EmptyEnum(TypeName),

    #[error("union needs at least two distinct variants, got {0}")]
    DegenerateUnion(usize),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("value at `{path}` does not match bound `{bound}`")]
    ValueDoesNotMatchSchema { path: String, bound: String },

    #[error("value at `{path}` matched {count} terminals in `{type_set}`, expected exactly one")]
    AmbiguousResolution {
        path: String,
        type_set: String,
        count: usize,
    },

    #[error("{0}")]
    BadProbTable(#[from] BadProbTable),

    #[error("string table index {index} exceeds varuint limit (2^28)")]
    VarUintOverflow { index: u64 },

    #[error("corpus artifact missing or malformed: {0}")]
    CorpusArtifactMissing(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BadProbTable {
    #[error("no probability table registered for context key `{0}`")]
    MissingContext(String),

    #[error("probability table for `{0}` has zero total count")]
    ZeroTotal(String),

    #[error("symbol {index} in `{key}` has zero size and no escape slot")]
    ZeroSizeNoEscape { key: String, index: usize },
}

pub type CoreResult<T> = Result<T, CoreError>;
