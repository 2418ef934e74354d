//! spec.md §8 Scenario E: exporting a subset pulls in everything reachable
//! from the roots through links, and nothing else.

mod common;

use std::rc::Rc;

use emf_model::{AttrValue, CloneOptions, LinkManyUpdate, Model, OverrideValue};
use indexmap::IndexSet;

#[test]
fn export_reachable_includes_linked_family_but_not_unrelated_person() {
    let schema = common::build_family();
    let mut model = Model::new(schema.registry.clone(), schema.properties.clone(), 1);

    let mat = model
        .create_instance(
            schema.person,
            None,
            vec![(schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Mat"))))],
        )
        .unwrap();
    let alice = model
        .create_instance(
            schema.person,
            None,
            vec![(schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Alice"))))],
        )
        .unwrap();
    let mum = model
        .create_instance(
            schema.person,
            None,
            vec![(schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Mum"))))],
        )
        .unwrap();
    let dad = model
        .create_instance(
            schema.person,
            None,
            vec![(schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Dad"))))],
        )
        .unwrap();
    let zed = model
        .create_instance(
            schema.person,
            None,
            vec![(schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Zed"))))],
        )
        .unwrap();
    for id in [&mat, &alice, &mum, &dad, &zed] {
        model.add(id).unwrap();
    }
    model.set_link_one(&mat, schema.partner, Some(alice.clone())).unwrap();
    model
        .set_link_many(&mat, schema.parents, LinkManyUpdate::new(vec![mum.clone(), dad.clone()]))
        .unwrap();

    let seed: IndexSet<_> = [mat.clone()].into_iter().collect();
    let reachable = model.export_reachable(&seed, &[], false);
    let exported = model
        .clone_subset(&reachable, 2, CloneOptions { retain_ids: true, rename: false })
        .unwrap();

    assert!(exported.contains(&mat));
    assert!(exported.contains(&alice));
    assert!(exported.contains(&mum));
    assert!(exported.contains(&dad));
    assert!(!exported.contains(&zed));
}
