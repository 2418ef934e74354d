//! The `Model` container: object storage, instance creation, the
//! bidirectional-link protocol and the clone/subset operations
//! (spec.md §4.6).

mod clone;
mod link;

pub use clone::CloneOptions;

use indexmap::{IndexMap, IndexSet};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::ModelError;
use crate::meta::{TypeId, TypeRegistry};
use crate::object::{LifecycleState, Object, Slot};
use crate::property::{LinkManyUpdate, PropertyId, PropertyKind, PropertyRegistry};
use crate::util::IStr;

/// One property's value as supplied to [`Model::create_instance`] or applied
/// later through the public update operations.
#[derive(Debug, Clone)]
pub enum OverrideValue {
    Attr(crate::property::AttrValue),
    LinkOne(Option<IStr>),
    LinkMany(Vec<IStr>),
}

/// A typed object graph: every `Object` in it is owned here, indexed by type
/// and id (spec.md §4.6, invariant (a)). Not `Clone`/`Send`/`Sync` — the
/// runtime model is single-threaded (spec.md §5).
#[derive(Debug)]
pub struct Model {
    model_id: u64,
    owning: bool,
    registry: Rc<TypeRegistry>,
    properties: Rc<PropertyRegistry>,
    objects: IndexMap<IStr, Object>,
    by_type: IndexMap<TypeId, IndexSet<IStr>>,
}

impl Model {
    pub fn new(registry: Rc<TypeRegistry>, properties: Rc<PropertyRegistry>, model_id: u64) -> Self {
        Self {
            model_id,
            owning: true,
            registry,
            properties,
            objects: IndexMap::new(),
            by_type: IndexMap::new(),
        }
    }

    /// Marks this model as merely indexing objects owned elsewhere, so
    /// `clear_model` discards the index without destroying the objects
    /// (spec.md §4.6). Used for models built over borrowed storage.
    pub fn set_owning(&mut self, owning: bool) {
        self.owning = owning;
    }

    pub fn id(&self) -> u64 {
        self.model_id
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn properties(&self) -> &PropertyRegistry {
        &self.properties
    }

    // ---- creation -----------------------------------------------------

    /// Allocates a fresh `Object` of `type_id`, applies `overrides` (the
    /// container-property override, if any, always applied last so the
    /// bidirectional containment slot never observes a half-built object),
    /// and returns its id (spec.md §4.1).
    pub fn create_instance(
        &mut self,
        type_id: TypeId,
        name: Option<&str>,
        overrides: Vec<(PropertyId, OverrideValue)>,
    ) -> Result<IStr, ModelError> {
        let meta = self.registry.get(type_id)?;
        if !meta.is_instanciable() {
            return Err(ModelError::NotInstanciable(type_id));
        }
        let seq = meta.next_seq();
        let id: IStr = Rc::from(format!("{}_{}_{}", type_id.0, self.model_id, seq));

        let mut obj = Object::new(id.clone(), type_id, seq);
        for p in self.properties.all_properties(&self.registry, type_id) {
            let prop = self.properties.get(p)?;
            obj.init_slot(p, Slot::empty_for(prop.kind()));
        }
        obj.set_name(Some(match name {
            Some(n) => Rc::from(n),
            None => Rc::from(obj.default_name(&self.registry).as_str()),
        }));
        self.objects.insert(id.clone(), obj);
        debug!(type_id = type_id.0, id = id.as_ref(), "created instance");

        let container_prop = self.registry.container_property(type_id);
        let (container_overrides, rest): (Vec<_>, Vec<_>) =
            overrides.into_iter().partition(|(p, _)| Some(*p) == container_prop);

        for (p, v) in rest.into_iter().chain(container_overrides) {
            self.apply_override(&id, p, v)?;
        }
        Ok(id)
    }

    fn apply_override(&mut self, owner: &IStr, property: PropertyId, value: OverrideValue) -> Result<(), ModelError> {
        match value {
            OverrideValue::Attr(v) => {
                self.objects
                    .get_mut(owner.as_ref())
                    .ok_or_else(|| ModelError::UnknownObject(owner.to_string()))?
                    .write(property, Slot::Attr(v));
                Ok(())
            }
            OverrideValue::LinkOne(t) => self.set_link_one(owner, property, t),
            OverrideValue::LinkMany(members) => self.set_link_many(owner, property, LinkManyUpdate::new(members)),
        }
    }

    // ---- membership -----------------------------------------------------

    /// Adds an already-allocated object to the active index. If it was
    /// previously removed, its link slots are re-announced to their
    /// opposites (spec.md §4.3's "makeVisibleToLinked").
    pub fn add(&mut self, id: &str) -> Result<(), ModelError> {
        let Some(obj) = self.objects.get_mut(id) else {
            return Err(ModelError::UnknownObject(id.to_string()));
        };
        let was_removed = obj.state() == LifecycleState::RemovedFromModel;
        let type_id = obj.type_id();
        let id_rc = obj.id_rc();
        if !self.registry.get(type_id)?.is_instanciable() {
            warn!(type_id = type_id.0, "adding instance of a non-instanciable type");
        }
        obj.set_state(LifecycleState::InModel);
        self.by_type.entry(type_id).or_default().insert(id_rc);
        if was_removed {
            self.make_visible_to_linked(id)?;
        }
        Ok(())
    }

    /// Removes `id` from the active index. A no-op if `id` is unknown or
    /// already not `InModel`. When `hide` is set, every opposite side is
    /// unlinked first (spec.md §4.3/§4.4's `remove`/`hideFromLinked`); the
    /// `Object` itself survives in storage, in `RemovedFromModel` state.
    pub fn remove(&mut self, id: &str, hide: bool) -> Result<(), ModelError> {
        let in_model = self.objects.get(id).is_some_and(|o| o.state() == LifecycleState::InModel);
        if !in_model {
            return Ok(());
        }
        if hide {
            self.hide_from_linked(id)?;
        }
        let obj = self.objects.get_mut(id).expect("checked above");
        let type_id = obj.type_id();
        obj.set_state(LifecycleState::RemovedFromModel);
        if let Some(bucket) = self.by_type.get_mut(&type_id) {
            bucket.shift_remove(id);
        }
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects.get(id).is_some_and(|o| o.state() == LifecycleState::InModel)
    }

    pub fn get_by_id(&self, type_id: TypeId, id: &str) -> Option<&Object> {
        for t in self.registry.instanciable_descendants(type_id) {
            if self.by_type.get(&t).is_some_and(|b| b.contains(id)) {
                return self.objects.get(id);
            }
        }
        None
    }

    /// First object of `type_id` (or a subtype) whose declared name matches
    /// `name` — spec.md §4.6 makes no uniqueness guarantee, so ties resolve
    /// to iteration/bucket order.
    pub fn get_by_name(&self, type_id: TypeId, name: &str) -> Option<&Object> {
        for t in self.registry.instanciable_descendants(type_id) {
            let Some(bucket) = self.by_type.get(&t) else { continue };
            for id in bucket {
                if let Some(obj) = self.objects.get(id.as_ref()) {
                    if obj.name() == Some(name) {
                        return Some(obj);
                    }
                }
            }
        }
        None
    }

    /// All active instances of `type_id`. `use_derived` widens the search to
    /// every instanciable subtype; `filter`, when given, excludes those ids.
    pub fn get_objects(&self, type_id: TypeId, use_derived: bool, filter: Option<&IndexSet<IStr>>) -> Vec<&Object> {
        let types: Vec<TypeId> = if use_derived {
            self.registry.instanciable_descendants(type_id)
        } else {
            vec![type_id]
        };
        let mut out = Vec::new();
        for t in types {
            let Some(bucket) = self.by_type.get(&t) else { continue };
            for id in bucket {
                if filter.is_some_and(|f| f.contains(id)) {
                    continue;
                }
                if let Some(obj) = self.objects.get(id.as_ref()) {
                    out.push(obj);
                }
            }
        }
        out
    }

    /// Same as [`Model::get_objects`], sorted case-insensitively by name
    /// with id as tiebreak (spec.md §4.6).
    pub fn get_objects_ordered_by_name(
        &self,
        type_id: TypeId,
        use_derived: bool,
        filter: Option<&IndexSet<IStr>>,
    ) -> Vec<&Object> {
        let mut objs = self.get_objects(type_id, use_derived, filter);
        objs.sort_by(|a, b| {
            let an = a.name().unwrap_or_default().to_lowercase();
            let bn = b.name().unwrap_or_default().to_lowercase();
            an.cmp(&bn).then_with(|| a.id().cmp(b.id()))
        });
        objs
    }

    pub fn get_root_types(&self) -> Vec<TypeId> {
        self.registry.root_types().collect()
    }

    pub fn get_type_by_name(&self, name: &str) -> Option<TypeId> {
        self.registry.get_by_name(name)
    }

    pub fn get_types(&self) -> Vec<TypeId> {
        self.registry.types().map(|t| t.id()).collect()
    }

    /// Every currently active object, regardless of type — used by the XMI
    /// writer to find roots (spec.md §4.5).
    pub fn active_objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values().filter(|o| o.state() == LifecycleState::InModel)
    }

    // ---- housekeeping ---------------------------------------------------

    /// Discards every object not currently `InModel` (spec.md §4.6;
    /// `rebuildMap` in the source is the id-index half of this, here folded
    /// into the `by_type` buckets being rebuilt from scratch).
    pub fn rebuild_map(&mut self) {
        self.by_type.clear();
        for obj in self.objects.values() {
            if obj.state() == LifecycleState::InModel {
                self.by_type.entry(obj.type_id()).or_default().insert(obj.id_rc());
            }
        }
    }

    /// Recomputes every map/multimap slot for `map_property`'s owner type
    /// (and its subtypes), rederiving each entry's key from its current
    /// target — needed after editing a target's key attribute out from
    /// under an existing map link (spec.md §4.2.4's known map-key drift).
    pub fn rebuild_map_links(&mut self, map_property: PropertyId) -> Result<(), ModelError> {
        let owner_type = self.properties.get(map_property)?.owner_type();
        let owners: Vec<IStr> = self
            .get_objects(owner_type, true, None)
            .iter()
            .map(|o| o.id_rc())
            .collect();
        for owner_id in owners {
            let members = self
                .objects
                .get(owner_id.as_ref())
                .and_then(|o| o.read(map_property))
                .map(Slot::members)
                .unwrap_or_default();
            let new_slot = self.build_many_slot(map_property, &members)?;
            if let Some(obj) = self.objects.get_mut(owner_id.as_ref()) {
                obj.write(map_property, new_slot);
            }
        }
        Ok(())
    }

    /// Destroys every owned `Object`, or (when this model merely indexes
    /// objects owned elsewhere) just discards the index (spec.md §4.6).
    pub fn clear_model(&mut self, delete_contents: bool) {
        if self.owning && delete_contents {
            self.objects.clear();
        }
        self.by_type.clear();
    }

    // ---- validation -----------------------------------------------------

    /// Appends one message per mandatory link property left empty on any
    /// active instance whose type is not in `excluded_types` (spec.md §4.6).
    pub fn validate(&self, errors: &mut Vec<String>, excluded_types: &[TypeId]) {
        for (type_id, bucket) in &self.by_type {
            if excluded_types.contains(type_id) {
                continue;
            }
            for id in bucket {
                let Some(obj) = self.objects.get(id.as_ref()) else { continue };
                for p in self.properties.all_properties(&self.registry, *type_id) {
                    let Ok(prop) = self.properties.get(p) else { continue };
                    if !prop.is_mandatory() {
                        continue;
                    }
                    let empty = match obj.read(p) {
                        None => true,
                        Some(Slot::LinkOne(v)) => v.is_none(),
                        Some(slot) => slot.members().is_empty(),
                    };
                    if empty {
                        errors.push(format!(
                            "object '{}' (type '{}') is missing a mandatory value for '{}'",
                            obj.id(),
                            self.registry.get(*type_id).map(|t| t.name()).unwrap_or("?"),
                            prop.name()
                        ));
                    }
                }
            }
        }
    }

    /// Runs `validate` and then an application-supplied business-rule hook
    /// per active instance (spec.md §4.6's `validateBusinessRules`). The
    /// core deliberately has no opinion on what a business rule is.
    pub fn validate_business_rules(
        &self,
        errors: &mut Vec<String>,
        excluded_types: &[TypeId],
        rule: impl Fn(&Object, &mut Vec<String>),
    ) {
        self.validate(errors, excluded_types);
        for (type_id, bucket) in &self.by_type {
            if excluded_types.contains(type_id) {
                continue;
            }
            for id in bucket {
                if let Some(obj) = self.objects.get(id.as_ref()) {
                    rule(obj, errors);
                }
            }
        }
    }

    pub fn validate_model(&self, errors: &mut Vec<String>) {
        self.validate(errors, &[]);
    }

    // ---- internal helpers used by link.rs and clone.rs -----------------

    pub(crate) fn object(&self, id: &str) -> Option<&Object> {
        self.objects.get(id)
    }

    pub(crate) fn object_mut(&mut self, id: &str) -> Option<&mut Object> {
        self.objects.get_mut(id)
    }

    pub(crate) fn insert_object(&mut self, obj: Object) {
        let id = obj.id_rc();
        let type_id = obj.type_id();
        let in_model = obj.state() == LifecycleState::InModel;
        self.objects.insert(id.clone(), obj);
        if in_model {
            self.by_type.entry(type_id).or_default().insert(id);
        }
    }

    fn is_compatible(&self, property: PropertyId, target_id: &str) -> bool {
        let Ok(prop) = self.properties.get(property) else { return false };
        let Some(spec) = prop.kind().link_spec() else { return false };
        match self.objects.get(target_id) {
            Some(t) => self.registry.is_a(t.type_id(), spec.target_type),
            None => false,
        }
    }

    fn build_many_slot(&self, property: PropertyId, members: &[IStr]) -> Result<Slot, ModelError> {
        let prop = self.properties.get(property)?;
        match prop.kind() {
            PropertyKind::LinkToManySet(_) => Ok(Slot::LinkSet(members.iter().cloned().collect())),
            PropertyKind::LinkToManyList(_) => Ok(Slot::LinkList(members.to_vec())),
            PropertyKind::LinkToManyMap(..) => {
                let mut map = IndexMap::new();
                for m in members {
                    if let Some(target) = self.objects.get(m.as_ref()) {
                        if let Some(key) = self.properties.map_key_for(property, target) {
                            map.insert(key, m.clone());
                        }
                    }
                }
                Ok(Slot::LinkMap(map))
            }
            PropertyKind::LinkToManyMultiMap(..) => {
                let mut map: IndexMap<crate::property::MapKey, Vec<IStr>> = IndexMap::new();
                for m in members {
                    if let Some(target) = self.objects.get(m.as_ref()) {
                        if let Some(key) = self.properties.map_key_for(property, target) {
                            map.entry(key).or_default().push(m.clone());
                        }
                    }
                }
                Ok(Slot::LinkMultiMap(map))
            }
            _ => Err(ModelError::NotALinkProperty(property)),
        }
    }
}

impl PartialEq for Model {
    /// Structural equality: same active ids under each type bucket,
    /// independent of internal storage order (spec.md §4.6).
    fn eq(&self, other: &Self) -> bool {
        for (t, ids) in &self.by_type {
            let empty = IndexSet::new();
            let other_ids = other.by_type.get(t).unwrap_or(&empty);
            if ids != other_ids {
                return false;
            }
        }
        for (t, ids) in &other.by_type {
            if !ids.is_empty() && !self.by_type.contains_key(t) {
                return false;
            }
        }
        true
    }
}
