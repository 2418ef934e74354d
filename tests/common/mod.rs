//! Schema builders shared by the integration tests, built entirely through
//! `emf_model`'s public API (mirrors the Person/Meeting shape from the
//! original miniEMF `SimpleExample`).

use std::rc::Rc;

use emf_model::{AttrKind, AttrValue, EnumDomain, PropertyId, PropertyRegistry, TypeId, TypeRegistry};

#[allow(dead_code)]
pub struct FamilySchema {
    pub registry: Rc<TypeRegistry>,
    pub properties: Rc<PropertyRegistry>,
    pub person: TypeId,
    pub name: PropertyId,
    pub age: PropertyId,
    pub gender: PropertyId,
    pub partner: PropertyId,
    pub parents: PropertyId,
    pub childs: PropertyId,
}

#[allow(dead_code)]
pub fn build_family() -> FamilySchema {
    let mut registry = TypeRegistry::new();
    let person = registry.register_type("Person", "Person", true, &[]).unwrap();
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

    FamilySchema {
        registry: Rc::new(registry),
        properties: Rc::new(properties),
        person,
        name,
        age,
        gender,
        partner,
        parents,
        childs,
    }
}

/// A `Folder` containing `Item`s, where `Item` is abstract and `Doc` is its
/// concrete subtype (polymorphic containment).
#[allow(dead_code)]
pub struct ContainmentSchema {
    pub registry: Rc<TypeRegistry>,
    pub properties: Rc<PropertyRegistry>,
    pub folder: TypeId,
    pub item: TypeId,
    pub doc: TypeId,
    pub title: PropertyId,
    pub items: PropertyId,
    pub parent: PropertyId,
}

#[allow(dead_code)]
pub fn build_containment() -> ContainmentSchema {
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
