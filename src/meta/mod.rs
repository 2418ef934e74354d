//! The type registry: `MetaType` descriptors and the `TypeRegistry` that
//! owns them for the program's lifetime (spec.md §4.1, §4.7).

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::MetaError;
use crate::property::PropertyId;
use crate::util::{IStr, Interner};

/// Identity of a `MetaType` within a `TypeRegistry`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// The conventional name of the root type every instanciable type
/// ultimately derives from (spec.md §3, invariant (b)).
pub const ROOT_TYPE_NAME: &str = "Object";

/// Runtime descriptor of one object class.
///
/// `MetaType` does not hold a per-type factory callback: unlike the source
/// system (and the teacher's SysML metaclasses, which map to distinct Rust
/// types), instances here are all represented by the single generic
/// [`crate::object::Object`] struct whose shape is entirely driven by its
/// slot table. A factory closure would have nothing to construct beyond
/// what `Object::new` already does, so `createInstance` builds the object
/// directly — see DESIGN.md, Open Questions.
#[derive(Debug)]
pub struct MetaType {
    id: TypeId,
    name: IStr,
    label: IStr,
    instanciable: bool,
    super_types: Vec<TypeId>,
    sub_types: Vec<TypeId>,
    container_property: Cell<Option<PropertyId>>,
    seq: Cell<u64>,
}

impl MetaType {
    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_instanciable(&self) -> bool {
        self.instanciable
    }

    pub fn is_derived(&self) -> bool {
        !self.sub_types.is_empty()
    }

    pub fn super_types(&self) -> &[TypeId] {
        &self.super_types
    }

    pub fn sub_types(&self) -> &[TypeId] {
        &self.sub_types
    }

    pub fn container_property(&self) -> Option<PropertyId> {
        self.container_property.get()
    }

    pub(crate) fn set_container_property(&self, p: PropertyId) {
        self.container_property.set(Some(p));
    }

    /// Increments and returns this type's per-type sequence counter.
    ///
    /// Never reused, never decreased (spec.md §3): this is the only place
    /// that mutates it.
    pub(crate) fn next_seq(&self) -> u64 {
        let next = self.seq.get() + 1;
        self.seq.set(next);
        next
    }

    /// Folds an externally observed sequence number into this type's
    /// counter so a later `next_seq` never repeats an id already seen
    /// (used when re-importing a model whose ids embed a sequence number
    /// higher than anything generated so far).
    pub(crate) fn update_max_seq(&self, n: u64) {
        if n > self.seq.get() {
            self.seq.set(n);
        }
    }
}

/// Owns every `MetaType` for the program's lifetime, indexed by id and name.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<MetaType>,
    by_name: HashMap<IStr, TypeId>,
    interner: Interner,
    root: TypeId,
    finalized: bool,
}

impl TypeRegistry {
    /// Creates a registry seeded with the conventional root type "Object".
    pub fn new() -> Self {
        let mut interner = Interner::new();
        let name = interner.intern(ROOT_TYPE_NAME);
        let label = interner.intern(ROOT_TYPE_NAME);
        let root = MetaType {
            id: TypeId(0),
            name: name.clone(),
            label,
            instanciable: false,
            super_types: Vec::new(),
            sub_types: Vec::new(),
            container_property: Cell::new(None),
            seq: Cell::new(0),
        };
        let mut by_name = HashMap::new();
        by_name.insert(name, TypeId(0));
        Self {
            types: vec![root],
            by_name,
            interner,
            root: TypeId(0),
            finalized: false,
        }
    }

    pub fn root(&self) -> TypeId {
        self.root
    }

    /// Declares a new `MetaType`. `super_types` may be empty — empty lists
    /// are attached to the root type by [`TypeRegistry::finalize`].
    pub fn register_type(
        &mut self,
        name: &str,
        label: &str,
        instanciable: bool,
        super_types: &[TypeId],
    ) -> Result<TypeId, MetaError> {
        let interned = self.interner.intern(name);
        if self.by_name.contains_key(&interned) {
            return Err(MetaError::DuplicateTypeName(name.to_string()));
        }
        for &st in super_types {
            self.get(st)?;
        }
        let id = TypeId(self.types.len() as u32);
        let interned_label = self.interner.intern(label);
        self.types.push(MetaType {
            id,
            name: interned.clone(),
            label: interned_label,
            instanciable,
            super_types: super_types.to_vec(),
            sub_types: Vec::new(),
            container_property: Cell::new(None),
            seq: Cell::new(0),
        });
        self.by_name.insert(interned, id);
        for &st in super_types {
            self.types[st.0 as usize].sub_types.push(id);
        }
        Ok(id)
    }

    /// Attaches every root-of-its-own-hierarchy type (anything registered
    /// with no explicit supertype, other than "Object" itself) to the
    /// conventional "Object" root, then locks the registry. Mutation after
    /// this point is a contract violation (spec.md §5).
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        let root = self.root;
        let orphans: Vec<TypeId> = self
            .types
            .iter()
            .skip(1)
            .filter(|t| t.super_types.is_empty())
            .map(|t| t.id)
            .collect();
        for id in orphans {
            self.types[id.0 as usize].super_types.push(root);
            self.types[root.0 as usize].sub_types.push(id);
        }
        self.finalized = true;
    }

    pub fn get(&self, id: TypeId) -> Result<&MetaType, MetaError> {
        self.types.get(id.0 as usize).ok_or(MetaError::UnknownType(id))
    }

    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn types(&self) -> impl Iterator<Item = &MetaType> {
        self.types.iter()
    }

    /// Every type registered with no explicit supertype before
    /// `finalize` ran — now direct children of "Object".
    pub fn root_types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types[self.root.0 as usize].sub_types.iter().copied()
    }

    /// The containment property whose instances own `type_id`'s objects, if
    /// any — resolved up the supertype chain so a concrete subtype of an
    /// abstract containment target inherits its ancestor's container side
    /// (spec.md §4.1, §4.5's polymorphic containment).
    pub fn container_property(&self, type_id: TypeId) -> Option<PropertyId> {
        let mut cur = Some(type_id);
        while let Some(t) = cur {
            let meta = self.get(t).ok()?;
            if let Some(p) = meta.container_property() {
                return Some(p);
            }
            cur = meta.super_types().first().copied();
        }
        None
    }

    /// Reflexive-transitive `isA`: does `t` equal or derive from `of`?
    pub fn is_a(&self, t: TypeId, of: TypeId) -> bool {
        if t == of {
            return true;
        }
        let Ok(meta) = self.get(t) else { return false };
        meta.super_types.iter().any(|&st| self.is_a(st, of))
    }

    /// Transitive, deduplicated set of types deriving from `t` (not
    /// including `t` itself).
    pub fn derived_types(&self, t: TypeId) -> Vec<TypeId> {
        let mut seen = Vec::new();
        self.collect_derived(t, &mut seen);
        seen
    }

    fn collect_derived(&self, t: TypeId, out: &mut Vec<TypeId>) {
        let Ok(meta) = self.get(t) else { return };
        for &sub in &meta.sub_types {
            if !out.contains(&sub) {
                out.push(sub);
                self.collect_derived(sub, out);
            }
        }
    }

    /// The leaves and inner-instanciable nodes of the `t`-rooted subtree,
    /// including `t` itself if it is instanciable (spec.md §4.1).
    pub fn instanciable_descendants(&self, t: TypeId) -> Vec<TypeId> {
        let mut out = Vec::new();
        if let Ok(meta) = self.get(t) {
            if meta.instanciable {
                out.push(t);
            }
        }
        for d in self.derived_types(t) {
            if let Ok(meta) = self.get(d) {
                if meta.instanciable {
                    out.push(d);
                }
            }
        }
        out
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_types_attach_to_object_root() {
        let mut reg = TypeRegistry::new();
        let person = reg.register_type("Person", "Person", true, &[]).unwrap();
        reg.finalize();
        assert!(reg.is_a(person, reg.root()));
        assert_eq!(reg.root_types().collect::<Vec<_>>(), vec![person]);
    }

    #[test]
    fn is_a_is_reflexive_and_transitive() {
        let mut reg = TypeRegistry::new();
        let a = reg.register_type("A", "A", false, &[]).unwrap();
        let b = reg.register_type("B", "B", true, &[a]).unwrap();
        let c = reg.register_type("C", "C", true, &[b]).unwrap();
        reg.finalize();
        assert!(reg.is_a(c, c));
        assert!(reg.is_a(c, b));
        assert!(reg.is_a(c, a));
        assert!(!reg.is_a(a, c));
    }

    #[test]
    fn non_instanciable_type_excluded_from_descendants() {
        let mut reg = TypeRegistry::new();
        let a = reg.register_type("A", "A", false, &[]).unwrap();
        let b = reg.register_type("B", "B", true, &[a]).unwrap();
        reg.finalize();
        assert_eq!(reg.instanciable_descendants(a), vec![b]);
    }

    #[test]
    fn duplicate_type_name_rejected() {
        let mut reg = TypeRegistry::new();
        reg.register_type("Person", "Person", true, &[]).unwrap();
        let err = reg.register_type("Person", "Person", true, &[]);
        assert!(matches!(err, Err(MetaError::DuplicateTypeName(_))));
    }
}
