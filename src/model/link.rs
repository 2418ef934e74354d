//! The bidirectional-link protocol's primitive add/remove and the
//! diff-then-apply update operations (spec.md §4.2.3, §4.2.4, §4.3).
//!
//! Every operation here takes `&mut Model` because `Model` is the sole owner
//! of every `Object`: a reverse-side update just borrows a second entry out
//! of the same `IndexMap`, sequentially, never two `&mut Object` at once.

use crate::error::ModelError;
use crate::object::Slot;
use crate::property::{LinkManyUpdate, PropertyId, PropertyKind};
use crate::util::IStr;

use super::Model;

impl Model {
    /// Adds `value` into `slot_owner`'s `property` slot, without touching
    /// any opposite side. Used only to apply the *other* side of a
    /// bidirectional update once the primary side has already been decided.
    pub(super) fn primitive_add_link(
        &mut self,
        property: PropertyId,
        slot_owner: &str,
        value: IStr,
    ) -> Result<(), ModelError> {
        let prop = self.properties.get(property)?;
        let map_key = match prop.kind() {
            PropertyKind::LinkToManyMap(..) | PropertyKind::LinkToManyMultiMap(..) => {
                let target = self
                    .objects
                    .get(value.as_ref())
                    .ok_or_else(|| ModelError::UnknownObject(value.to_string()))?;
                self.properties.map_key_for(property, target)
            }
            _ => None,
        };
        let kind = prop.kind().clone();
        let obj = self
            .objects
            .get_mut(slot_owner)
            .ok_or_else(|| ModelError::UnknownObject(slot_owner.to_string()))?;
        let mut slot = obj.read(property).cloned().unwrap_or_else(|| Slot::empty_for(&kind));
        match &mut slot {
            Slot::LinkOne(v) => *v = Some(value),
            Slot::LinkSet(s) => {
                s.insert(value);
            }
            Slot::LinkList(l) => l.push(value),
            Slot::LinkMap(m) => {
                if let Some(key) = map_key {
                    m.insert(key, value);
                }
            }
            Slot::LinkMultiMap(m) => {
                if let Some(key) = map_key {
                    m.entry(key).or_default().push(value);
                }
            }
            Slot::Attr(_) => unreachable!("primitive_add_link called on an attribute property"),
        }
        obj.write(property, slot);
        Ok(())
    }

    /// Removes `value` from `slot_owner`'s `property` slot wherever it
    /// appears (map/multimap keys may have drifted since insertion — see
    /// `rebuild_map_links` — so removal matches by value, not by recomputed
    /// key). A no-op if `slot_owner` is unknown or the slot doesn't hold it.
    pub(super) fn primitive_remove_link(
        &mut self,
        property: PropertyId,
        slot_owner: &str,
        value: &IStr,
    ) -> Result<(), ModelError> {
        let Some(obj) = self.objects.get_mut(slot_owner) else {
            return Ok(());
        };
        let Some(mut slot) = obj.read(property).cloned() else {
            return Ok(());
        };
        match &mut slot {
            Slot::LinkOne(v) => {
                if v.as_ref() == Some(value) {
                    *v = None;
                }
            }
            Slot::LinkSet(s) => {
                s.shift_remove(value);
            }
            Slot::LinkList(l) => l.retain(|x| x != value),
            Slot::LinkMap(m) => m.retain(|_, v| v != value),
            Slot::LinkMultiMap(m) => {
                for vs in m.values_mut() {
                    vs.retain(|x| x != value);
                }
                m.retain(|_, vs| !vs.is_empty());
            }
            Slot::Attr(_) => unreachable!("primitive_remove_link called on an attribute property"),
        }
        obj.write(property, slot);
        Ok(())
    }

    /// Sets a link-to-one slot, updating the reverse side if one is
    /// declared. The new target is linked in before the old one is unlinked
    /// (spec.md §5's ordering guarantee for link-to-one). A target whose
    /// type doesn't match the property's declared target type is logged
    /// and the whole update is skipped, matching the source system's
    /// "silently ignore" default (spec.md §7).
    pub fn set_link_one(
        &mut self,
        owner_id: &str,
        property: PropertyId,
        new_target: Option<IStr>,
    ) -> Result<(), ModelError> {
        let prop = self.properties.get(property)?;
        if !matches!(prop.kind(), PropertyKind::LinkToOne(_)) {
            return Err(ModelError::NotALinkProperty(property));
        }
        if let Some(t) = &new_target {
            if !self.is_compatible(property, t) {
                tracing::warn!(
                    property = property.0,
                    target = t.as_ref(),
                    "link target type mismatch, update ignored"
                );
                return Ok(());
            }
        }
        let owner = self
            .objects
            .get(owner_id)
            .ok_or_else(|| ModelError::UnknownObject(owner_id.to_string()))?;
        let old = owner.read(property).and_then(Slot::as_link_one).cloned().flatten();
        if old == new_target {
            return Ok(());
        }
        let owner_rc = owner.id_rc();
        let obj = self.objects.get_mut(owner_id).expect("checked above");
        obj.write(property, Slot::LinkOne(new_target.clone()));

        if let Some(reverse) = prop.reverse() {
            if let Some(new_t) = &new_target {
                self.primitive_add_link(reverse, new_t, owner_rc.clone())?;
            }
            if let Some(old_t) = &old {
                self.primitive_remove_link(reverse, old_t, &owner_rc)?;
            }
        }
        Ok(())
    }

    /// Replaces a link-to-many slot's contents, updating the reverse side
    /// of every added/removed member. Removals are applied before additions
    /// (spec.md §5's ordering guarantee for link-to-many). Members whose
    /// type doesn't match the property's target type are logged and
    /// dropped individually rather than failing the whole update.
    pub fn set_link_many(&mut self, owner_id: &str, property: PropertyId, update: LinkManyUpdate) -> Result<(), ModelError> {
        let prop = self.properties.get(property)?;
        if !prop.kind().is_to_many() {
            return Err(ModelError::NotALinkProperty(property));
        }

        let members: Vec<IStr> = update
            .members
            .into_iter()
            .filter(|t| {
                let ok = self.is_compatible(property, t);
                if !ok {
                    tracing::warn!(property = property.0, target = t.as_ref(), "link target type mismatch, skipped");
                }
                ok
            })
            .collect();

        let owner = self
            .objects
            .get(owner_id)
            .ok_or_else(|| ModelError::UnknownObject(owner_id.to_string()))?;
        let current: Vec<IStr> = owner.read(property).map(Slot::members).unwrap_or_default();
        let owner_rc = owner.id_rc();

        let new_set: std::collections::HashSet<&IStr> = members.iter().collect();
        let current_set: std::collections::HashSet<&IStr> = current.iter().collect();

        let removed: Vec<IStr> = current.iter().filter(|x| !new_set.contains(x)).cloned().collect();
        let added: Vec<IStr> = members.iter().filter(|x| !current_set.contains(x)).cloned().collect();

        if let Some(reverse) = prop.reverse() {
            for r in &removed {
                self.primitive_remove_link(reverse, r, &owner_rc)?;
            }
            for a in &added {
                self.primitive_add_link(reverse, a, owner_rc.clone())?;
            }
        }

        let new_slot = self.build_many_slot(property, &members)?;
        let obj = self.objects.get_mut(owner_id).expect("checked above");
        obj.write(property, new_slot);
        Ok(())
    }

    /// Unlinks every opposite side pointing at `id`, without touching `id`'s
    /// own slots (spec.md §4.3/§4.4's `hideFromLinked`, invoked by
    /// `remove`).
    pub(super) fn hide_from_linked(&mut self, id: &str) -> Result<(), ModelError> {
        let owner = self.objects.get(id).ok_or_else(|| ModelError::UnknownObject(id.to_string()))?;
        let type_id = owner.type_id();
        let owner_rc = owner.id_rc();
        let props = self.properties.all_properties(&self.registry, type_id);
        for p in props {
            let Ok(prop) = self.properties.get(p) else { continue };
            if !prop.kind().is_link() || prop.is_containment() {
                continue;
            }
            let Some(reverse) = prop.reverse() else { continue };
            let members = self
                .objects
                .get(id)
                .and_then(|o| o.read(p))
                .map(Slot::members)
                .unwrap_or_default();
            for t in members {
                self.primitive_remove_link(reverse, &t, &owner_rc)?;
            }
        }
        Ok(())
    }

    /// Re-announces `id` to every opposite side its own slots still name
    /// (spec.md §4.3's `makeVisibleToLinked`, invoked by `add` when
    /// re-adding a previously-removed object).
    pub(super) fn make_visible_to_linked(&mut self, id: &str) -> Result<(), ModelError> {
        let owner = self.objects.get(id).ok_or_else(|| ModelError::UnknownObject(id.to_string()))?;
        let type_id = owner.type_id();
        let owner_rc = owner.id_rc();
        let props = self.properties.all_properties(&self.registry, type_id);
        for p in props {
            let Ok(prop) = self.properties.get(p) else { continue };
            if !prop.kind().is_link() || prop.is_containment() {
                continue;
            }
            let Some(reverse) = prop.reverse() else { continue };
            let members = self
                .objects
                .get(id)
                .and_then(|o| o.read(p))
                .map(Slot::members)
                .unwrap_or_default();
            for t in members {
                self.primitive_add_link(reverse, &t, owner_rc.clone())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::demo::{build_family, FamilySchema};
    use crate::model::{Model, OverrideValue};
    use crate::property::{AttrValue, MapKey};

    use super::*;

    fn make_person(model: &mut Model, schema: &FamilySchema, name: &str, age: i64, gender: i64) -> IStr {
        model
            .create_instance(
                schema.person,
                None,
                vec![
                    (schema.name, OverrideValue::Attr(AttrValue::String(Rc::from(name)))),
                    (schema.age, OverrideValue::Attr(AttrValue::Int(age))),
                    (schema.gender, OverrideValue::Attr(AttrValue::Int(gender))),
                ],
            )
            .unwrap()
    }

    fn partner_of(model: &Model, id: &str, schema: &FamilySchema) -> Option<IStr> {
        model.object(id).unwrap().read(schema.partner).and_then(Slot::as_link_one).cloned().flatten()
    }

    fn childs_of(model: &Model, id: &str, schema: &FamilySchema) -> Vec<IStr> {
        model.object(id).unwrap().read(schema.childs).map(Slot::members).unwrap_or_default()
    }

    /// spec.md §8 Scenario A.
    #[test]
    fn scenario_a_simple_family() {
        let schema = build_family();
        let mut model = Model::new(schema.registry.clone(), schema.properties.clone(), 1);

        let mat = make_person(&mut model, &schema, "Mat", 35, 0);
        let alice = make_person(&mut model, &schema, "Alice", 34, 1);
        let dad = make_person(&mut model, &schema, "Dad", 67, 0);
        let mum = make_person(&mut model, &schema, "Mum", 65, 1);
        for id in [&mat, &alice, &dad, &mum] {
            model.add(id).unwrap();
        }

        model.set_link_one(&mat, schema.partner, Some(alice.clone())).unwrap();
        assert_eq!(partner_of(&model, &alice, &schema), Some(mat.clone()));

        model
            .set_link_many(&mat, schema.parents, LinkManyUpdate::new(vec![mum.clone(), dad.clone()]))
            .unwrap();

        assert_eq!(childs_of(&model, &mum, &schema), vec![mat.clone()]);
        assert_eq!(childs_of(&model, &dad, &schema), vec![mat.clone()]);

        let Slot::LinkMap(map) = model.object(&mum).unwrap().read(schema.childs).unwrap() else {
            panic!("expected a map slot");
        };
        assert_eq!(map.get(&MapKey::Int(35)), Some(&mat));
    }

    /// spec.md §8 Scenario B: remove unlinks both sides, re-add restores them.
    #[test]
    fn scenario_b_remove_cleans_up_then_readd_restores() {
        let schema = build_family();
        let mut model = Model::new(schema.registry.clone(), schema.properties.clone(), 1);

        let mat = make_person(&mut model, &schema, "Mat", 35, 0);
        let alice = make_person(&mut model, &schema, "Alice", 34, 1);
        let dad = make_person(&mut model, &schema, "Dad", 67, 0);
        let mum = make_person(&mut model, &schema, "Mum", 65, 1);
        for id in [&mat, &alice, &dad, &mum] {
            model.add(id).unwrap();
        }
        model.set_link_one(&mat, schema.partner, Some(alice.clone())).unwrap();
        model
            .set_link_many(&mat, schema.parents, LinkManyUpdate::new(vec![mum.clone(), dad.clone()]))
            .unwrap();

        let mat_id_before = model.object(&mat).unwrap().id().to_string();
        model.remove(&mat, true).unwrap();

        assert_eq!(partner_of(&model, &alice, &schema), None);
        assert!(childs_of(&model, &mum, &schema).is_empty());
        assert!(childs_of(&model, &dad, &schema).is_empty());
        assert_eq!(model.object(&mat).unwrap().id(), mat_id_before);

        model.add(&mat).unwrap();
        assert_eq!(partner_of(&model, &alice, &schema), Some(mat.clone()));
        assert_eq!(childs_of(&model, &mum, &schema), vec![mat.clone()]);
        assert_eq!(childs_of(&model, &dad, &schema), vec![mat.clone()]);
    }

    /// Removing an object not in the model is a no-op (spec.md §7).
    #[test]
    fn remove_unknown_object_is_noop() {
        let schema = build_family();
        let mut model = Model::new(schema.registry.clone(), schema.properties.clone(), 1);
        assert!(model.remove("does-not-exist", true).is_ok());
    }

    /// A target of the wrong type is rejected instead of corrupting the slot
    /// (spec.md §7's "silently ignored after logging").
    #[test]
    fn incompatible_link_target_is_ignored() {
        let containment = crate::demo::build_containment();
        let mut model = Model::new(containment.registry.clone(), containment.properties.clone(), 1);
        let folder = model.create_instance(containment.folder, None, vec![]).unwrap();
        model.add(&folder).unwrap();
        // `items` targets `Item`; pointing it at a `Folder` must be rejected.
        model
            .set_link_many(&folder, containment.items, LinkManyUpdate::new(vec![folder.clone()]))
            .unwrap();
        assert!(model.object(&folder).unwrap().read(containment.items).map(Slot::members).unwrap_or_default().is_empty());
    }
}
