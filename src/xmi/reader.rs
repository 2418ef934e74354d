//! XMI decoding: a two-pass reader (spec.md §4.5). The first pass builds
//! every `Object` (attributes and containment resolved as the nesting is
//! walked); the second pass resolves the non-containment link attributes
//! collected along the way, once every object referenced anywhere in the
//! document is guaranteed to already exist.
//!
//! Containment is written as a wrapper element per property (tag = the
//! property's name) holding the contained objects' own start tags, so the
//! element stack alternates `Object -> PropertyWrapper -> Object -> ...`.

use std::rc::Rc;

use indexmap::IndexMap;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::CodecError;
use crate::meta::{TypeId, TypeRegistry};
use crate::model::Model;
use crate::object::{LifecycleState, Object, Slot};
use crate::property::{LinkManyUpdate, PropertyId, PropertyKind, PropertyRegistry};
use crate::util::IStr;

const ROOT_TAG: &str = "xmi:XMI";

/// One level of XML nesting: either an `Object`'s own element, or the
/// property-named wrapper element that holds its containment children.
enum Frame {
    Root,
    Obj(IStr),
    Prop(IStr, PropertyId),
}

pub fn decode(xml: &str, registry: Rc<TypeRegistry>, properties: Rc<PropertyRegistry>, model_id: u64) -> Result<Model, CodecError> {
    let mut model = Model::new(registry.clone(), properties.clone(), model_id);
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut pending_links: Vec<(IStr, PropertyId, String)> = Vec::new();
    let mut containment_acc: IndexMap<(IStr, PropertyId), Vec<IStr>> = IndexMap::new();

    loop {
        match reader.read_event().map_err(|e| CodecError::xml(e.to_string()))? {
            Event::Eof => break,
            Event::Start(e) => {
                let frame = start_element(
                    &mut model,
                    &registry,
                    &properties,
                    &e,
                    stack.last(),
                    &mut pending_links,
                    &mut containment_acc,
                )?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                // A self-closing object element can have no nested containment
                // wrapper, so no further action is needed once it's built.
                start_element(
                    &mut model,
                    &registry,
                    &properties,
                    &e,
                    stack.last(),
                    &mut pending_links,
                    &mut containment_acc,
                )?;
            }
            Event::End(_) => {
                if let Some(frame) = stack.pop() {
                    // `Frame::Obj` needs no action on close: any containment
                    // wrapper nested inside it already resolved on its own
                    // `Frame::Prop` end, below, before this point is reached.
                    if let Frame::Prop(owner, prop_id) = frame {
                        let members = containment_acc.shift_remove(&(owner.clone(), prop_id)).unwrap_or_default();
                        apply_containment(&mut model, &properties, &owner, prop_id, members)?;
                    }
                }
            }
            _ => {}
        }
    }

    for (owner, prop_id, text) in pending_links {
        resolve_link(&mut model, &properties, &owner, prop_id, &text)?;
    }
    Ok(model)
}

fn collect_attrs(e: &BytesStart) -> Result<Vec<(String, String)>, CodecError> {
    let mut out = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| CodecError::xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| CodecError::xml(e.to_string()))?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Parses one `Start`/`Empty` event in light of its enclosing frame,
/// returning the frame this element itself introduces.
#[allow(clippy::too_many_arguments)]
fn start_element(
    model: &mut Model,
    registry: &TypeRegistry,
    properties: &PropertyRegistry,
    e: &BytesStart,
    parent: Option<&Frame>,
    pending_links: &mut Vec<(IStr, PropertyId, String)>,
    containment_acc: &mut IndexMap<(IStr, PropertyId), Vec<IStr>>,
) -> Result<Frame, CodecError> {
    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    if tag == ROOT_TAG {
        return Ok(Frame::Root);
    }

    match parent {
        None | Some(Frame::Root) => parse_object(model, registry, properties, &tag, e, pending_links, None, containment_acc),
        Some(Frame::Obj(owner_id)) => {
            // This element is the containment-property wrapper, not an object.
            let owner_type = model
                .object(owner_id.as_ref())
                .map(Object::type_id)
                .ok_or_else(|| CodecError::xml(format!("unknown owner '{owner_id}'")))?;
            let owner_type_name = registry.get(owner_type).map(|t| t.name().to_string()).unwrap_or_default();
            let prop_id = containment_property_by_name(registry, properties, owner_type, &tag).ok_or_else(|| {
                CodecError::UnknownProperty {
                    type_name: owner_type_name,
                    property: tag.clone(),
                }
            })?;
            Ok(Frame::Prop(owner_id.clone(), prop_id))
        }
        Some(Frame::Prop(owner_id, prop_id)) => parse_object(
            model,
            registry,
            properties,
            &tag,
            e,
            pending_links,
            Some((owner_id.clone(), *prop_id)),
            containment_acc,
        ),
    }
}

#[allow(clippy::too_many_arguments)]
fn parse_object(
    model: &mut Model,
    registry: &TypeRegistry,
    properties: &PropertyRegistry,
    tag: &str,
    e: &BytesStart,
    pending_links: &mut Vec<(IStr, PropertyId, String)>,
    containment_parent: Option<(IStr, PropertyId)>,
    containment_acc: &mut IndexMap<(IStr, PropertyId), Vec<IStr>>,
) -> Result<Frame, CodecError> {
    let attrs = collect_attrs(e)?;
    let declared_type = registry.get_by_name(tag).ok_or_else(|| CodecError::UnknownType(tag.to_string()))?;
    let type_id = match attrs.iter().find(|(k, _)| k == "xsi:type") {
        Some((_, xsi)) => {
            let actual = registry.get_by_name(xsi).ok_or_else(|| CodecError::MismatchedType(xsi.clone()))?;
            if !registry.is_a(actual, declared_type) {
                return Err(CodecError::MismatchedType(xsi.clone()));
            }
            actual
        }
        None => declared_type,
    };

    let id_text = attrs
        .iter()
        .find(|(k, _)| k == "xmi:id")
        .map(|(_, v)| v.clone())
        .ok_or_else(|| CodecError::xml(format!("element '{tag}' is missing xmi:id")))?;
    let id: IStr = Rc::from(id_text.as_str());

    if let Some(seq) = id_text.rsplit('_').next().and_then(|s| s.parse::<u64>().ok()) {
        if let Ok(meta) = registry.get(type_id) {
            meta.update_max_seq(seq);
        }
    }

    let mut obj = Object::new(id.clone(), type_id, 0);
    for p in properties.all_properties(registry, type_id) {
        if let Ok(prop) = properties.get(p) {
            obj.init_slot(p, Slot::empty_for(prop.kind()));
        }
    }

    for (key, value) in &attrs {
        match key.as_str() {
            "xmi:id" | "xsi:type" => {}
            "name" => obj.set_name(Some(Rc::from(value.as_str()))),
            _ => match properties.get_by_name(type_id, key) {
                Some(p) => {
                    let Ok(prop) = properties.get(p) else { continue };
                    if prop.kind().is_link() {
                        pending_links.push((id.clone(), p, value.clone()));
                    } else {
                        obj.write(p, Slot::Attr(prop.deserialize_attr(value)));
                    }
                }
                None => {
                    tracing::warn!(type_name = tag, property = key.as_str(), "unknown property, ignored");
                }
            },
        }
    }

    obj.set_state(LifecycleState::InModel);
    model.insert_object(obj);

    if let Some((owner_id, prop_id)) = containment_parent {
        containment_acc.entry((owner_id, prop_id)).or_default().push(id.clone());
    }

    Ok(Frame::Obj(id))
}

fn containment_property_by_name(registry: &TypeRegistry, properties: &PropertyRegistry, owner_type: TypeId, name: &str) -> Option<PropertyId> {
    properties
        .all_properties(registry, owner_type)
        .into_iter()
        .find(|&p| properties.get(p).is_ok_and(|prop| prop.is_containment() && prop.name() == name))
}

fn apply_containment(model: &mut Model, properties: &PropertyRegistry, owner: &IStr, prop_id: PropertyId, members: Vec<IStr>) -> Result<(), CodecError> {
    let prop = properties.get(prop_id)?;
    if matches!(prop.kind(), PropertyKind::LinkToOne(_)) {
        model.set_link_one(owner, prop_id, members.into_iter().next())?;
    } else {
        model.set_link_many(owner, prop_id, LinkManyUpdate::new(members))?;
    }
    Ok(())
}

fn resolve_link(
    model: &mut Model,
    properties: &PropertyRegistry,
    owner: &IStr,
    prop_id: PropertyId,
    text: &str,
) -> Result<(), CodecError> {
    let prop = properties.get(prop_id)?;
    let known: Vec<IStr> = text
        .split_whitespace()
        .map(Rc::from)
        .filter(|t: &IStr| {
            let exists = model.object(t.as_ref()).is_some();
            if !exists {
                tracing::warn!(reference = t.as_ref(), "dangling reference dropped");
            }
            exists
        })
        .collect();
    match prop.kind() {
        PropertyKind::LinkToOne(_) => {
            model.set_link_one(owner, prop_id, known.into_iter().next())?;
        }
        _ => {
            model.set_link_many(owner, prop_id, LinkManyUpdate::new(known))?;
        }
    }
    Ok(())
}
