//! XMI encode/decode (spec.md §4.5): a streaming, containment-nested XML
//! rendering of a `Model`, written with `quick-xml` the way the teacher's
//! own interchange codec does.

mod reader;
mod writer;

pub use reader::decode;
pub use writer::{encode, XmiHeader};

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use crate::demo::{build_containment, build_family};
    use crate::model::{Model, OverrideValue};
    use crate::object::Slot;
    use crate::property::{AttrValue, LinkManyUpdate};

    use super::*;

    fn header() -> XmiHeader {
        XmiHeader {
            tool_name: "test-tool".to_string(),
            export_version: "1.0".to_string(),
            date: "2026/07/30 00:00:00".to_string(),
        }
    }

    /// spec.md §8 Scenario C: a full round trip preserves structure and links.
    #[test]
    fn round_trip_preserves_links() {
        let schema = build_family();
        let mut model = Model::new(schema.registry.clone(), schema.properties.clone(), 1);
        let mat = model
            .create_instance(
                schema.person,
                None,
                vec![
                    (schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Mat")))),
                    (schema.age, OverrideValue::Attr(AttrValue::Int(35))),
                ],
            )
            .unwrap();
        let alice = model
            .create_instance(
                schema.person,
                None,
                vec![(schema.name, OverrideValue::Attr(AttrValue::String(Rc::from("Alice"))))],
            )
            .unwrap();
        model.add(&mat).unwrap();
        model.add(&alice).unwrap();
        model.set_link_one(&mat, schema.partner, Some(alice.clone())).unwrap();

        let xml = encode(&model, &header()).unwrap();
        let decoded = decode(&xml, schema.registry.clone(), schema.properties.clone(), 1).unwrap();

        assert_eq!(model, decoded);
        let decoded_alice_partner = decoded
            .object(&alice)
            .unwrap()
            .read(schema.partner)
            .and_then(Slot::as_link_one)
            .cloned()
            .flatten();
        assert_eq!(decoded_alice_partner, Some(mat.clone()));
    }

    /// spec.md §8 Scenario D: a concrete subtype nested under an abstract
    /// containment property decodes back to its own concrete type.
    #[test]
    fn round_trip_preserves_polymorphic_containment() {
        let schema = build_containment();
        let mut model = Model::new(schema.registry.clone(), schema.properties.clone(), 1);
        let folder = model.create_instance(schema.folder, None, vec![]).unwrap();
        let doc = model
            .create_instance(
                schema.doc,
                None,
                vec![(schema.title, OverrideValue::Attr(AttrValue::String(Rc::from("readme"))))],
            )
            .unwrap();
        model.add(&folder).unwrap();
        model.add(&doc).unwrap();
        model.set_link_many(&folder, schema.items, LinkManyUpdate::new(vec![doc.clone()])).unwrap();

        let xml = encode(&model, &header()).unwrap();
        assert!(xml.contains("<items>"));
        assert!(xml.contains("xsi:type=\"Doc\""));
        // The container side (`parent`) is implied by nesting under <items>
        // and must never be written as a reference attribute (spec.md §4.5).
        assert!(!xml.contains("parent="));

        let decoded = decode(&xml, schema.registry.clone(), schema.properties.clone(), 1).unwrap();
        let decoded_doc = decoded.object(&doc).unwrap();
        assert_eq!(decoded_doc.type_id(), schema.doc);
        assert_eq!(
            decoded_doc.read(schema.title).and_then(Slot::as_attr),
            Some(&AttrValue::String(Rc::from("readme")))
        );
        let decoded_doc_parent = decoded_doc.read(schema.parent).and_then(Slot::as_link_one).cloned().flatten();
        assert_eq!(decoded_doc_parent, Some(folder.clone()));
    }
}
