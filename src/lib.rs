//! A runtime meta-object layer: typed object graphs with bidirectional
//! links, subset/clone projection and an XMI codec.
//!
//! Module layout, roughly bottom-up:
//!
//! - [`util`] — string interning. Depends on nothing else in the crate.
//! - [`error`] — the error taxonomy shared by every other module.
//! - [`meta`] — `TypeRegistry`/`MetaType`: the type hierarchy.
//! - [`property`] — `PropertyRegistry`/`Property`: the slot descriptors
//!   declared against `meta` types.
//! - [`object`] — `Object`/`Slot`: one runtime instance's storage.
//! - [`model`] — `Model`: owns every `Object`, runs the bidirectional-link
//!   protocol and the clone/subset algorithms.
//! - [`xmi`] — encode/decode `Model` <-> XMI, built entirely on the public
//!   surface of the modules above it.

#[cfg(test)]
mod demo;
pub mod error;
pub mod meta;
pub mod model;
pub mod object;
pub mod property;
pub mod util;
pub mod xmi;

pub use error::{CodecError, MetaError, ModelError};
pub use meta::{MetaType, TypeId, TypeRegistry, ROOT_TYPE_NAME};
pub use model::{CloneOptions, Model, OverrideValue};
pub use object::{LifecycleState, Object, Slot};
pub use property::{
    AttrKind, AttrValue, DateTimeValue, EnumDomain, LinkManyUpdate, LinkSpec, MapKey, Property, PropertyId,
    PropertyKind, PropertyRegistry,
};
pub use util::{IStr, Interner};
pub use xmi::{decode as decode_xmi, encode as encode_xmi, XmiHeader};
