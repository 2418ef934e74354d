//! Runtime instances: identity, lifecycle state and the slot table
//! (spec.md §4.4).

use indexmap::{IndexMap, IndexSet};

use crate::meta::TypeId;
use crate::property::{AttrValue, MapKey, PropertyId, PropertyKind};
use crate::util::IStr;

/// Lifecycle states of an `Object` (spec.md §3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// Just allocated, not yet in any `Model`.
    Created,
    /// Present in exactly one owning `Model`.
    InModel,
    /// Was in a `Model` and has been removed; opposite sides unlinked.
    RemovedFromModel,
    /// A shallow-copy stand-in sharing identity with an original, used only
    /// during the two-phase `Model` clone algorithm (spec.md §4.6).
    Clone,
}

/// Storage for one property's value on an `Object`.
#[derive(Debug, Clone)]
pub enum Slot {
    Attr(AttrValue),
    LinkOne(Option<IStr>),
    LinkSet(IndexSet<IStr>),
    LinkList(Vec<IStr>),
    LinkMap(IndexMap<MapKey, IStr>),
    LinkMultiMap(IndexMap<MapKey, Vec<IStr>>),
}

impl Slot {
    /// The empty/default slot value a fresh property of `kind` starts with
    /// (spec.md invariant (i): every slot is created at construction).
    pub fn empty_for(kind: &PropertyKind) -> Self {
        match kind {
            PropertyKind::Attribute { default, .. } => Slot::Attr(default.clone()),
            PropertyKind::Enumeration { default, .. } => Slot::Attr(AttrValue::Int(*default)),
            PropertyKind::LinkToOne(_) => Slot::LinkOne(None),
            PropertyKind::LinkToManySet(_) => Slot::LinkSet(IndexSet::new()),
            PropertyKind::LinkToManyList(_) => Slot::LinkList(Vec::new()),
            PropertyKind::LinkToManyMap(_, _) => Slot::LinkMap(IndexMap::new()),
            PropertyKind::LinkToManyMultiMap(_, _) => Slot::LinkMultiMap(IndexMap::new()),
        }
    }

    pub fn as_attr(&self) -> Option<&AttrValue> {
        match self {
            Slot::Attr(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_link_one(&self) -> Option<&Option<IStr>> {
        match self {
            Slot::LinkOne(v) => Some(v),
            _ => None,
        }
    }

    /// The set of currently-linked target ids, regardless of which
    /// to-many container kind this slot is.
    pub fn members(&self) -> Vec<IStr> {
        match self {
            Slot::Attr(_) | Slot::LinkOne(_) => Vec::new(),
            Slot::LinkSet(s) => s.iter().cloned().collect(),
            Slot::LinkList(l) => l.clone(),
            Slot::LinkMap(m) => m.values().cloned().collect(),
            Slot::LinkMultiMap(m) => m.values().flatten().cloned().collect(),
        }
    }
}

/// A runtime instance of a `MetaType`.
#[derive(Debug, Clone)]
pub struct Object {
    id: IStr,
    type_id: TypeId,
    state: LifecycleState,
    name: Option<IStr>,
    seq: u64,
    slots: IndexMap<PropertyId, Slot>,
}

impl Object {
    pub fn new(id: IStr, type_id: TypeId, seq: u64) -> Self {
        Self {
            id,
            type_id,
            state: LifecycleState::Created,
            name: None,
            seq,
            slots: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn id_rc(&self) -> IStr {
        self.id.clone()
    }

    pub(crate) fn set_id(&mut self, id: IStr) {
        self.id = id;
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<IStr>) {
        self.name = name;
    }

    /// The per-type sequence number this instance was created with, kept so
    /// `default_name` can always be recomputed (spec.md §4.4).
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The name this object would carry had it never been explicitly
    /// (re)named: `"<type label>_<seq>"` (spec.md §4.1).
    pub fn default_name(&self, registry: &crate::meta::TypeRegistry) -> String {
        let label = registry.get(self.type_id).map(|t| t.label()).unwrap_or("Object");
        format!("{label}_{}", self.seq)
    }

    pub fn read(&self, property: PropertyId) -> Option<&Slot> {
        self.slots.get(&property)
    }

    /// Raw slot write — bypasses the bidirectional-link protocol. Used only
    /// by `Model`'s link primitives and by the XMI codec (spec.md §4.4).
    pub(crate) fn write(&mut self, property: PropertyId, slot: Slot) {
        self.slots.insert(property, slot);
    }

    pub(crate) fn init_slot(&mut self, property: PropertyId, slot: Slot) {
        self.slots.entry(property).or_insert(slot);
    }

    pub fn declared_properties(&self) -> impl Iterator<Item = PropertyId> + '_ {
        self.slots.keys().copied()
    }
}
