//! Error types for the registry, model and XMI codec.
//!
//! Mirrors the taxonomy in spec.md §7: schema errors abort startup,
//! invariant violations either fail fast (`NotInstanciable`) or are logged
//! and ignored (handled at the call site, not represented here), codec
//! errors carry enough context to point at the offending tag/attribute, and
//! validation errors are collected into a caller-supplied `Vec<String>`
//! rather than raised.

use thiserror::Error;

use crate::meta::TypeId;

/// Startup-time schema errors raised while populating a `TypeRegistry` or
/// `PropertyRegistry`. These abort startup; they are never recoverable.
#[derive(Debug, Error)]
pub enum MetaError {
    #[error("duplicate type id {0:?}")]
    DuplicateTypeId(TypeId),

    #[error("duplicate type name '{0}'")]
    DuplicateTypeName(String),

    #[error("unknown type id {0:?}")]
    UnknownType(TypeId),

    #[error("unknown type name '{0}'")]
    UnknownTypeName(String),

    #[error("duplicate property '{0}' on type {1:?}")]
    DuplicateProperty(String, TypeId),

    #[error("unknown property id {0:?}")]
    UnknownProperty(crate::property::PropertyId),

    #[error("property '{0}' declares a reverse on a property not owned by its target type")]
    ReverseTypeMismatch(String),

    #[error("map-key attribute '{0}' is not an attribute property of the target type")]
    UnknownMapKeyAttribute(String),
}

/// Runtime errors raised by `Model` operations.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("type {0:?} is not instanciable")]
    NotInstanciable(TypeId),

    #[error("object '{0}' not found in this model")]
    UnknownObject(String),

    #[error("property {0:?} is not declared on type {1:?}")]
    PropertyNotOnType(crate::property::PropertyId, TypeId),

    #[error("property {0:?} is not a link property")]
    NotALinkProperty(crate::property::PropertyId),

    #[error("link target '{0}' has a type incompatible with property {1:?}")]
    IncompatibleTarget(String, crate::property::PropertyId),

    #[error(transparent)]
    Meta(#[from] MetaError),
}

/// Errors surfaced while reading or writing an XMI document.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("XML error: {0}")]
    Xml(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown type tag '{0}'")]
    UnknownType(String),

    #[error("unknown property '{property}' on type '{type_name}'")]
    UnknownProperty { type_name: String, property: String },

    #[error("xsi:type '{0}' does not resolve to a known type")]
    MismatchedType(String),

    #[error("malformed numeric literal '{0}'")]
    MalformedNumber(String),

    #[error("parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl CodecError {
    pub fn xml(message: impl Into<String>) -> Self {
        Self::Xml(message.into())
    }
}
