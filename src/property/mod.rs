//! The property system: typed attribute, enumeration and link descriptors
//! (spec.md §4.2), and the registry that owns them.

mod link;
mod value;

pub use link::LinkManyUpdate;
pub use value::{AttrKind, AttrValue, DateTimeValue, MapKey};

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::MetaError;
use crate::meta::TypeId;
use crate::util::{IStr, Interner};

/// Identity of a `Property` within a `PropertyRegistry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyId(pub u32);

/// Shared shape of every link property (spec.md §3's `isMandatory`,
/// `isContainment`, `isSerializable`, `reverse`).
#[derive(Debug, Clone)]
pub struct LinkSpec {
    pub target_type: TypeId,
    pub is_containment: bool,
    pub is_mandatory: bool,
}

/// The finite `{key -> label}` domain of an `Enumeration` property.
#[derive(Debug, Clone, Default)]
pub struct EnumDomain {
    labels: IndexMap<i64, IStr>,
}

impl EnumDomain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: i64, label: IStr) {
        self.labels.insert(key, label);
    }

    pub fn label_for(&self, key: i64) -> Option<&str> {
        self.labels.get(&key).map(|s| s.as_ref())
    }

    /// Unknown labels deserialize to 0 (spec.md §4.2.2).
    pub fn key_for(&self, label: &str) -> i64 {
        self.labels
            .iter()
            .find(|(_, v)| v.as_ref() == label)
            .map(|(k, _)| *k)
            .unwrap_or(0)
    }
}

/// The closed set of property variants (spec.md §3's property-kinds table).
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Attribute {
        kind: AttrKind,
        default: AttrValue,
    },
    Enumeration {
        domain: EnumDomain,
        default: i64,
    },
    LinkToOne(LinkSpec),
    LinkToManySet(LinkSpec),
    LinkToManyList(LinkSpec),
    /// The `PropertyId` is the map-key attribute read off the *target*
    /// object (spec.md §4.2.4's `setKey`).
    LinkToManyMap(LinkSpec, PropertyId),
    LinkToManyMultiMap(LinkSpec, PropertyId),
}

impl PropertyKind {
    pub fn link_spec(&self) -> Option<&LinkSpec> {
        match self {
            Self::Attribute { .. } | Self::Enumeration { .. } => None,
            Self::LinkToOne(s)
            | Self::LinkToManySet(s)
            | Self::LinkToManyList(s)
            | Self::LinkToManyMap(s, _)
            | Self::LinkToManyMultiMap(s, _) => Some(s),
        }
    }

    pub fn is_link(&self) -> bool {
        self.link_spec().is_some()
    }

    pub fn is_to_many(&self) -> bool {
        matches!(
            self,
            Self::LinkToManySet(_)
                | Self::LinkToManyList(_)
                | Self::LinkToManyMap(_, _)
                | Self::LinkToManyMultiMap(_, _)
        )
    }
}

/// The uniform descriptor of one slot on an `Object` (spec.md §4.2).
#[derive(Debug)]
pub struct Property {
    id: PropertyId,
    owner_type: TypeId,
    name: IStr,
    label: IStr,
    unit: Option<IStr>,
    is_serializable: bool,
    kind: PropertyKind,
    reverse: std::cell::Cell<Option<PropertyId>>,
}

impl Property {
    pub fn id(&self) -> PropertyId {
        self.id
    }

    pub fn owner_type(&self) -> TypeId {
        self.owner_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn is_serializable(&self) -> bool {
        self.is_serializable
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn reverse(&self) -> Option<PropertyId> {
        self.reverse.get()
    }

    pub fn is_containment(&self) -> bool {
        self.kind.link_spec().is_some_and(|s| s.is_containment)
    }

    pub fn is_mandatory(&self) -> bool {
        self.kind.link_spec().is_some_and(|s| s.is_mandatory)
    }

    pub fn target_type(&self) -> Option<TypeId> {
        self.kind.link_spec().map(|s| s.target_type)
    }

    /// The declared initial value of a non-link property, as a fresh
    /// [`crate::object::Slot`]. Link slots are initialized by
    /// [`crate::object::Slot::empty_for`] instead, since their "default" is
    /// simply an empty container.
    pub fn initial_attr_value(&self) -> Option<AttrValue> {
        match &self.kind {
            PropertyKind::Attribute { default, .. } => Some(default.clone()),
            PropertyKind::Enumeration { default, .. } => Some(AttrValue::Int(*default)),
            _ => None,
        }
    }

    /// Parses XML attribute text into the value this (non-link) property
    /// stores. Link properties defer to the codec's two-pass resolution
    /// (spec.md §4.5) and never call this.
    pub fn deserialize_attr(&self, text: &str) -> AttrValue {
        match &self.kind {
            PropertyKind::Attribute { kind, default } => AttrValue::from_text(*kind, text, default),
            PropertyKind::Enumeration { domain, default } => {
                AttrValue::Int(if text.is_empty() { *default } else { domain.key_for(text) })
            }
            _ => unreachable!("deserialize_attr called on a link property"),
        }
    }

    /// Renders a non-link property's current value as XML attribute text,
    /// or `None` when it should be omitted (spec.md §4.2.1: attributes are
    /// written only when they differ from the default, to keep XMI small).
    pub fn serialize_attr(&self, current: &AttrValue) -> Option<String> {
        match &self.kind {
            PropertyKind::Attribute { default, .. } => {
                if current == default {
                    None
                } else {
                    Some(current.to_text())
                }
            }
            PropertyKind::Enumeration { domain, default } => {
                let AttrValue::Int(key) = current else {
                    unreachable!("enumeration slot must hold AttrValue::Int")
                };
                if key == default {
                    None
                } else {
                    domain.label_for(*key).map(str::to_string)
                }
            }
            _ => unreachable!("serialize_attr called on a link property"),
        }
    }
}

/// Builds every `Property`, wires opposite pairs, marks containment sides
/// and installs map keys (spec.md §4.7).
#[derive(Debug, Default)]
pub struct PropertyRegistry {
    properties: Vec<Property>,
    by_owner: HashMap<TypeId, Vec<PropertyId>>,
    by_owner_and_name: HashMap<TypeId, HashMap<IStr, PropertyId>>,
    interner: Interner,
}

impl PropertyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, owner_type: TypeId, name: &str, label: &str, kind: PropertyKind) -> Result<PropertyId, MetaError> {
        let interned_name = self.interner.intern(name);
        if self.by_owner_and_name.get(&owner_type).is_some_and(|m| m.contains_key(&interned_name)) {
            return Err(MetaError::DuplicateProperty(name.to_string(), owner_type));
        }
        let id = PropertyId(self.properties.len() as u32);
        let interned_label = self.interner.intern(label);
        self.properties.push(Property {
            id,
            owner_type,
            name: interned_name.clone(),
            label: interned_label,
            unit: None,
            is_serializable: true,
            kind,
            reverse: std::cell::Cell::new(None),
        });
        self.by_owner.entry(owner_type).or_default().push(id);
        self.by_owner_and_name.entry(owner_type).or_default().insert(interned_name, id);
        Ok(id)
    }

    /// Sets a property's display unit (spec.md §4.2's `unit()` getter).
    pub fn set_unit(&mut self, p: PropertyId, unit: &str) -> Result<(), MetaError> {
        let interned = self.interner.intern(unit);
        self.properties
            .get_mut(p.0 as usize)
            .ok_or(MetaError::UnknownProperty(p))?
            .unit = Some(interned);
        Ok(())
    }

    pub fn create_attribute(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        kind: AttrKind,
        default: AttrValue,
    ) -> Result<PropertyId, MetaError> {
        self.push(owner_type, name, label, PropertyKind::Attribute { kind, default })
    }

    pub fn create_enumeration(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        domain: EnumDomain,
        default: i64,
    ) -> Result<PropertyId, MetaError> {
        self.push(owner_type, name, label, PropertyKind::Enumeration { domain, default })
    }

    pub fn create_link_to_one(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        target_type: TypeId,
        is_mandatory: bool,
    ) -> Result<PropertyId, MetaError> {
        self.push(
            owner_type,
            name,
            label,
            PropertyKind::LinkToOne(LinkSpec {
                target_type,
                is_containment: false,
                is_mandatory,
            }),
        )
    }

    pub fn create_link_set(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        target_type: TypeId,
        is_mandatory: bool,
    ) -> Result<PropertyId, MetaError> {
        self.push(
            owner_type,
            name,
            label,
            PropertyKind::LinkToManySet(LinkSpec {
                target_type,
                is_containment: false,
                is_mandatory,
            }),
        )
    }

    pub fn create_link_list(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        target_type: TypeId,
        is_mandatory: bool,
    ) -> Result<PropertyId, MetaError> {
        self.push(
            owner_type,
            name,
            label,
            PropertyKind::LinkToManyList(LinkSpec {
                target_type,
                is_containment: false,
                is_mandatory,
            }),
        )
    }

    /// Creates a map-link property. The key attribute is installed
    /// separately via [`PropertyRegistry::set_key`] once the target type's
    /// properties exist (spec.md §4.7, step 4).
    pub fn create_link_map(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        target_type: TypeId,
        is_mandatory: bool,
    ) -> Result<PropertyId, MetaError> {
        self.push(
            owner_type,
            name,
            label,
            PropertyKind::LinkToManyMap(
                LinkSpec {
                    target_type,
                    is_containment: false,
                    is_mandatory,
                },
                PropertyId(u32::MAX),
            ),
        )
    }

    pub fn create_link_multimap(
        &mut self,
        owner_type: TypeId,
        name: &str,
        label: &str,
        target_type: TypeId,
        is_mandatory: bool,
    ) -> Result<PropertyId, MetaError> {
        self.push(
            owner_type,
            name,
            label,
            PropertyKind::LinkToManyMultiMap(
                LinkSpec {
                    target_type,
                    is_containment: false,
                    is_mandatory,
                },
                PropertyId(u32::MAX),
            ),
        )
    }

    /// Wires `p.reverse = q` and `q.reverse = p` (spec.md invariant (g)).
    pub fn link_reverse(&mut self, p: PropertyId, q: PropertyId) {
        self.properties[p.0 as usize].reverse.set(Some(q));
        self.properties[q.0 as usize].reverse.set(Some(p));
    }

    /// Marks `p` as the containment side; its reverse (if any) becomes the
    /// unique container side for its owner type (spec.md invariant (f)/(h)).
    pub fn mark_containment(
        &mut self,
        p: PropertyId,
        registry: &crate::meta::TypeRegistry,
    ) -> Result<(), MetaError> {
        {
            let prop = &mut self.properties[p.0 as usize];
            match &mut prop.kind {
                PropertyKind::LinkToOne(s)
                | PropertyKind::LinkToManySet(s)
                | PropertyKind::LinkToManyList(s)
                | PropertyKind::LinkToManyMap(s, _)
                | PropertyKind::LinkToManyMultiMap(s, _) => s.is_containment = true,
                _ => return Err(MetaError::UnknownProperty(p)),
            }
        }
        if let Some(reverse) = self.properties[p.0 as usize].reverse.get() {
            let container_type = self.properties[reverse.0 as usize].owner_type;
            registry.get(container_type)?.set_container_property(reverse);
        }
        Ok(())
    }

    /// Installs the map-key attribute for a map/multimap link property
    /// (spec.md §4.7, step 4). `key_attr` must be an `Attribute` or
    /// `Enumeration` property declared on the link's target type.
    pub fn set_key(&mut self, map_property: PropertyId, key_attr: PropertyId) -> Result<(), MetaError> {
        let key_owner = self.properties[key_attr.0 as usize].owner_type;
        let target = self.properties[map_property.0 as usize]
            .kind
            .link_spec()
            .map(|s| s.target_type)
            .ok_or(MetaError::UnknownProperty(map_property))?;
        if key_owner != target {
            return Err(MetaError::UnknownMapKeyAttribute(
                self.properties[key_attr.0 as usize].name.to_string(),
            ));
        }
        match &mut self.properties[map_property.0 as usize].kind {
            PropertyKind::LinkToManyMap(_, key) | PropertyKind::LinkToManyMultiMap(_, key) => {
                *key = key_attr;
                Ok(())
            }
            _ => Err(MetaError::UnknownProperty(map_property)),
        }
    }

    pub fn get(&self, id: PropertyId) -> Result<&Property, MetaError> {
        self.properties.get(id.0 as usize).ok_or(MetaError::UnknownProperty(id))
    }

    pub fn get_by_name(&self, owner_type: TypeId, name: &str) -> Option<PropertyId> {
        self.by_owner_and_name.get(&owner_type)?.get(name).copied()
    }

    /// Properties declared directly on `owner_type` (not including those
    /// inherited from supertypes).
    pub fn declared_on(&self, owner_type: TypeId) -> &[PropertyId] {
        self.by_owner.get(&owner_type).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All properties visible on `type_id`, walking from the root of its
    /// supertype chain down to itself so that callers can rely on
    /// declaration order for container-last application (spec.md §4.1).
    pub fn all_properties(&self, registry: &crate::meta::TypeRegistry, type_id: TypeId) -> Vec<PropertyId> {
        let mut chain = vec![type_id];
        let mut cur = type_id;
        while let Ok(meta) = registry.get(cur) {
            if let Some(&parent) = meta.super_types().first() {
                chain.push(parent);
                cur = parent;
            } else {
                break;
            }
        }
        chain.reverse();
        chain.into_iter().flat_map(|t| self.declared_on(t).to_vec()).collect()
    }

    /// Reads the map-key attribute of a map/multimap link off the *target*
    /// object, producing the normalized key used to position it
    /// (spec.md §4.2.4).
    pub fn map_key_for(
        &self,
        map_property: PropertyId,
        target: &crate::object::Object,
    ) -> Option<MapKey> {
        let key_attr = match &self.properties[map_property.0 as usize].kind {
            PropertyKind::LinkToManyMap(_, key) | PropertyKind::LinkToManyMultiMap(_, key) => *key,
            _ => return None,
        };
        let slot = target.read(key_attr)?;
        let attr = slot.as_attr()?;
        MapKey::from_attr(attr)
    }
}
