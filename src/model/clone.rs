//! `Model`'s clone/subset-projection operations (spec.md §4.6): a two-phase
//! shallow-copy-then-relink algorithm, reused by full clone, subset clone
//! and reachable-subset export.

use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::error::ModelError;
use crate::meta::TypeId;
use crate::object::{LifecycleState, Object, Slot};
use crate::util::IStr;

use super::Model;

/// Controls how [`Model::clone_subset`] assigns identity to the copies it
/// produces.
#[derive(Debug, Clone, Copy, Default)]
pub struct CloneOptions {
    /// Keep the originals' ids verbatim (subset export into a separate
    /// model that will never coexist with the source). When `false`, each
    /// copy gets a freshly allocated id from its type's sequence counter,
    /// and every link is translated through the resulting id map —
    /// required when source and copy live in the same `Model`.
    pub retain_ids: bool,
    /// Give each copy a non-colliding name via `get_copy_name` instead of
    /// reusing the original's name.
    pub rename: bool,
}

impl Model {
    /// Transitively walks every link property's values from `roots`
    /// (restricted to containment when `only_containment` is set), inserting
    /// each reached object at most once and never descending past an object
    /// whose type is in `exclude_types` (spec.md §4.6's `exportReachable`).
    pub fn export_reachable(&self, roots: &IndexSet<IStr>, exclude_types: &[TypeId], only_containment: bool) -> IndexSet<IStr> {
        let mut reached: IndexSet<IStr> = IndexSet::new();
        let mut stack: Vec<IStr> = roots.iter().cloned().collect();
        while let Some(id) = stack.pop() {
            if !reached.insert(id.clone()) {
                continue;
            }
            let Some(obj) = self.objects.get(id.as_ref()) else { continue };
            let type_id = obj.type_id();
            if exclude_types.contains(&type_id) {
                continue;
            }
            for p in self.properties.all_properties(&self.registry, type_id) {
                let Ok(prop) = self.properties.get(p) else { continue };
                if !prop.kind().is_link() || (only_containment && !prop.is_containment()) {
                    continue;
                }
                let Some(slot) = obj.read(p) else { continue };
                for child in slot.members() {
                    stack.push(child);
                }
            }
        }
        reached
    }

    /// First phase of the clone algorithm: shallow copies of `ids` (attr
    /// values only, every link slot empty) inserted into `target`, in
    /// `Clone` lifecycle state until phase two relinks them. Returns the
    /// original-id -> copy-id map.
    fn shallow_copy_subset(
        &self,
        ids: &IndexSet<IStr>,
        target: &mut Model,
        opts: &CloneOptions,
    ) -> Result<IndexMap<IStr, IStr>, ModelError> {
        let mut id_map = IndexMap::new();
        for id in ids {
            let Some(obj) = self.objects.get(id.as_ref()) else { continue };
            let type_id = obj.type_id();
            let new_id: IStr = if opts.retain_ids {
                id.clone()
            } else {
                let meta = self.registry.get(type_id)?;
                let seq = meta.next_seq();
                Rc::from(format!("{}_{}_{}", type_id.0, target.model_id, seq))
            };

            let mut copy = Object::new(new_id.clone(), type_id, obj.seq());
            copy.set_state(LifecycleState::Clone);
            for p in self.properties.all_properties(&self.registry, type_id) {
                let Ok(prop) = self.properties.get(p) else { continue };
                let slot = match obj.read(p) {
                    Some(Slot::Attr(v)) => Slot::Attr(v.clone()),
                    _ => Slot::empty_for(prop.kind()),
                };
                copy.init_slot(p, slot);
            }
            copy.set_name(Some(if opts.rename {
                Rc::from(target.get_copy_name(obj.name().unwrap_or_default(), type_id).as_str())
            } else {
                Rc::from(obj.name().unwrap_or_default())
            }));
            target.insert_object(copy);
            id_map.insert(id.clone(), new_id);
        }
        Ok(id_map)
    }

    /// Second phase: rewrites every link slot of the copies produced by
    /// `shallow_copy_subset`, keeping only members that were themselves
    /// copied (links leaving the subset are dropped, per subset-projection
    /// semantics), then moves each copy into `InModel` state.
    fn relink_subset(&self, id_map: &IndexMap<IStr, IStr>, target: &mut Model) -> Result<(), ModelError> {
        for (orig_id, new_id) in id_map {
            let Some(obj) = self.objects.get(orig_id.as_ref()) else { continue };
            let type_id = obj.type_id();
            for p in self.properties.all_properties(&self.registry, type_id) {
                let Ok(prop) = self.properties.get(p) else { continue };
                if !prop.kind().is_link() {
                    continue;
                }
                let translated_one = |v: &Option<IStr>| v.as_ref().and_then(|t| id_map.get(t)).cloned();
                let new_slot = match obj.read(p) {
                    Some(Slot::LinkOne(v)) => Slot::LinkOne(translated_one(v)),
                    Some(slot) => {
                        let members: Vec<IStr> = slot.members().into_iter().filter_map(|m| id_map.get(&m).cloned()).collect();
                        target.build_many_slot(p, &members)?
                    }
                    None => continue,
                };
                if let Some(copy) = target.object_mut(new_id.as_ref()) {
                    copy.write(p, new_slot);
                }
            }
            if let Some(copy) = target.object_mut(new_id.as_ref()) {
                copy.set_state(LifecycleState::InModel);
            }
        }
        for new_id in id_map.values() {
            let Some(copy) = target.objects.get(new_id.as_ref()) else { continue };
            target.by_type.entry(copy.type_id()).or_default().insert(new_id.clone());
        }
        Ok(())
    }

    /// Copies `ids` into a fresh `Model` of `target_model_id`, preserving
    /// only the links whose both ends are in `ids` (spec.md §4.6's
    /// `cloneSubset`/`shallowCopySubset` pair).
    pub fn clone_subset(&self, ids: &IndexSet<IStr>, target_model_id: u64, opts: CloneOptions) -> Result<Model, ModelError> {
        let mut target = Model::new(self.registry.clone(), self.properties.clone(), target_model_id);
        let id_map = self.shallow_copy_subset(ids, &mut target, &opts)?;
        self.relink_subset(&id_map, &mut target)?;
        Ok(target)
    }

    /// Full-model clone: every active object, with every link preserved
    /// (spec.md §4.6's `clone`).
    pub fn clone_model(&self, target_model_id: u64, opts: CloneOptions) -> Result<Model, ModelError> {
        let all: IndexSet<IStr> = self.objects.values().filter(|o| o.state() == LifecycleState::InModel).map(|o| o.id_rc()).collect();
        self.clone_subset(&all, target_model_id, opts)
    }

    /// First non-colliding name in `"<name>"`, `"<name>_copy"`,
    /// `"<name>_copy_2"`, ... for objects of `type_id` already present
    /// (spec.md §4.6's `getCopyName`).
    pub fn get_copy_name(&self, name: &str, type_id: TypeId) -> String {
        let taken: IndexSet<&str> = self.get_objects(type_id, true, None).into_iter().filter_map(|o| o.name()).collect();
        if !taken.contains(name) {
            return name.to_string();
        }
        let base = format!("{name}_copy");
        if !taken.contains(base.as_str()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{base}_{n}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }
}
