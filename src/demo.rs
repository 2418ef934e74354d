//! Test fixture: the Person/Meeting schema from the original miniEMF
//! `SimpleExample` (spec.md §8's concrete scenarios build this exact shape),
//! used by this crate's own `#[cfg(test)]` modules. Not shipped — spec.md
//! §1's Non-goals exclude application-level examples, and this is purely
//! test scaffolding, built entirely through the crate's public API.

use std::rc::Rc;

use crate::meta::{TypeId, TypeRegistry};
use crate::property::{AttrKind, AttrValue, EnumDomain, PropertyId, PropertyRegistry};

/// Person/Meeting schema: `partner` is a self-reverse link-to-one (a
/// symmetric relationship), `childs` is a map-link keyed by the child's
/// `age`, and `meetings` is a multimap-link keyed by the meeting's `date`.
pub(crate) struct FamilySchema {
    pub registry: Rc<TypeRegistry>,
    pub properties: Rc<PropertyRegistry>,
    pub person: TypeId,
    pub meeting: TypeId,
    pub name: PropertyId,
    pub age: PropertyId,
    pub gender: PropertyId,
    pub partner: PropertyId,
    pub parents: PropertyId,
    pub childs: PropertyId,
    pub meetings: PropertyId,
    pub attendees: PropertyId,
    pub date: PropertyId,
}

pub(crate) fn build_family() -> FamilySchema {
    let mut registry = TypeRegistry::new();
    let person = registry.register_type("Person", "Person", true, &[]).unwrap();
    let meeting = registry.register_type("Meeting", "Meeting", true, &[]).unwrap();
    registry.finalize();

    let mut properties = PropertyRegistry::new();
    let name = properties
        .create_attribute(person, "name", "Name", AttrKind::String, AttrValue::String(Rc::from("")))
        .unwrap();
    let age = properties.create_attribute(person, "age", "Age", AttrKind::Int, AttrValue::Int(0)).unwrap();

    let mut gender_domain = EnumDomain::new();
    gender_domain.insert(0, Rc::from("male"));
    gender_domain.insert(1, Rc::from("female"));
    let gender = properties.create_enumeration(person, "gender", "Gender", gender_domain, 0).unwrap();

    let partner = properties.create_link_to_one(person, "partner", "Partner", person, false).unwrap();
    properties.link_reverse(partner, partner);

    let parents = properties.create_link_set(person, "parents", "Parents", person, false).unwrap();
    let childs = properties.create_link_map(person, "childs", "Childs", person, false).unwrap();
    properties.link_reverse(parents, childs);
    properties.set_key(childs, age).unwrap();

    let date = properties
        .create_attribute(meeting, "date", "Date", AttrKind::DateTime, AttrValue::DateTime(Default::default()))
        .unwrap();

    let meetings = properties.create_link_multimap(person, "meetings", "Meetings", meeting, false).unwrap();
    let attendees = properties.create_link_set(meeting, "attendees", "Attendees", person, false).unwrap();
    properties.link_reverse(meetings, attendees);
    properties.set_key(meetings, date).unwrap();

    FamilySchema {
        registry: Rc::new(registry),
        properties: Rc::new(properties),
        person,
        meeting,
        name,
        age,
        gender,
        partner,
        parents,
        childs,
        meetings,
        attendees,
        date,
    }
}

/// A small containment schema: a `Folder` that contains `Item`s, where
/// `Item` is a non-instanciable abstract type and `Doc` is its concrete
/// subtype (spec.md §8 Scenario D's polymorphic-containment shape).
pub(crate) struct ContainmentSchema {
    pub registry: Rc<TypeRegistry>,
    pub properties: Rc<PropertyRegistry>,
    pub folder: TypeId,
    pub item: TypeId,
    pub doc: TypeId,
    pub title: PropertyId,
    pub items: PropertyId,
    pub parent: PropertyId,
}

pub(crate) fn build_containment() -> ContainmentSchema {
    let mut registry = TypeRegistry::new();
    let folder = registry.register_type("Folder", "Folder", true, &[]).unwrap();
    let item = registry.register_type("Item", "Item", false, &[]).unwrap();
    let doc = registry.register_type("Doc", "Doc", true, &[item]).unwrap();
    registry.finalize();

    let mut properties = PropertyRegistry::new();
    let title = properties
        .create_attribute(item, "title", "Title", AttrKind::String, AttrValue::String(Rc::from("")))
        .unwrap();

    let items = properties.create_link_list(folder, "items", "Items", item, false).unwrap();
    let parent = properties.create_link_to_one(item, "parent", "Parent", folder, false).unwrap();
    properties.link_reverse(items, parent);
    properties.mark_containment(items, &registry).unwrap();

    ContainmentSchema {
        registry: Rc::new(registry),
        properties: Rc::new(properties),
        folder,
        item,
        doc,
        title,
        items,
        parent,
    }
}
