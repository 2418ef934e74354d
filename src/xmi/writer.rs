//! XMI encoding: containment-nested elements, non-containment/non-container
//! links as whitespace-separated id attributes (the container side is
//! implied by nesting and never written), `xsi:type` only where the actual
//! type differs from what the containing property declares (spec.md
//! §4.5).

use quick_xml::escape::escape;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;

use crate::error::CodecError;
use crate::meta::TypeId;
use crate::model::Model;
use crate::object::{Object, Slot};
use crate::property::PropertyKind;

/// The document header attributes carried on the `<xmi:XMI>` root element.
/// Callers own wall-clock time (spec.md's ambient stack carries no date/time
/// dependency), so `date` is supplied rather than computed here.
#[derive(Debug, Clone)]
pub struct XmiHeader {
    pub tool_name: String,
    pub export_version: String,
    pub date: String,
}

pub fn encode(model: &Model, header: &XmiHeader) -> Result<String, CodecError> {
    let mut buf = Vec::new();
    let mut writer = Writer::new_with_indent(&mut buf, b' ', 2);

    let mut root = BytesStart::new("xmi:XMI");
    root.push_attribute(("xmlns:xmi", "http://www.omg.org/XMI"));
    root.push_attribute(("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"));
    root.push_attribute(("ExportVersion", header.export_version.as_str()));
    root.push_attribute(("ToolName", header.tool_name.as_str()));
    root.push_attribute(("Date", header.date.as_str()));
    root.push_attribute(("ModelId", model.id().to_string().as_str()));
    writer.write_event(Event::Start(root)).map_err(xml_err)?;

    for obj in model.active_objects() {
        if is_root(model, obj) {
            write_object(&mut writer, model, obj, obj.type_id())?;
        }
    }

    writer.write_event(Event::End(BytesEnd::new("xmi:XMI"))).map_err(xml_err)?;
    String::from_utf8(buf).map_err(|e| CodecError::xml(e.to_string()))
}

fn is_root(model: &Model, obj: &Object) -> bool {
    match model.registry().container_property(obj.type_id()) {
        None => true,
        Some(p) => !matches!(obj.read(p), Some(Slot::LinkOne(Some(_)))),
    }
}

fn write_object<W: std::io::Write>(
    writer: &mut Writer<W>,
    model: &Model,
    obj: &Object,
    declared_type: TypeId,
) -> Result<(), CodecError> {
    let registry = model.registry();
    let properties = model.properties();
    let meta = registry.get(obj.type_id()).map_err(|e| CodecError::xml(e.to_string()))?;
    let declared_meta = registry.get(declared_type).map_err(|e| CodecError::xml(e.to_string()))?;

    let mut start = BytesStart::new(declared_meta.name().to_string());
    start.push_attribute(("xmi:id", escape(obj.id()).as_ref()));
    if obj.type_id() != declared_type {
        start.push_attribute(("xsi:type", escape(meta.name()).as_ref()));
    }
    if let Some(name) = obj.name() {
        start.push_attribute(("name", escape(name).as_ref()));
    }

    // One group per containment property: (property name, target type, child ids).
    let mut containment_groups: Vec<(&str, TypeId, Vec<std::rc::Rc<str>>)> = Vec::new();
    let container_prop = registry.container_property(obj.type_id());

    for p in properties.all_properties(registry, obj.type_id()) {
        let Ok(prop) = properties.get(p) else { continue };
        if !prop.is_serializable() {
            continue;
        }
        match prop.kind() {
            PropertyKind::Attribute { .. } | PropertyKind::Enumeration { .. } => {
                if let Some(value) = obj.read(p).and_then(Slot::as_attr) {
                    if let Some(text) = prop.serialize_attr(value) {
                        start.push_attribute((prop.name(), escape(text.as_str()).as_ref()));
                    }
                }
            }
            PropertyKind::LinkToOne(spec) => {
                if spec.is_containment {
                    if let Some(Some(child)) = obj.read(p).and_then(Slot::as_link_one) {
                        containment_groups.push((prop.name(), spec.target_type, vec![child.clone()]));
                    }
                } else if Some(p) != container_prop {
                    if let Some(Some(target)) = obj.read(p).and_then(Slot::as_link_one) {
                        start.push_attribute((prop.name(), escape(target.as_ref()).as_ref()));
                    }
                }
            }
            kind => {
                let Some(spec) = kind.link_spec() else { continue };
                if spec.is_containment {
                    let members = obj.read(p).map(Slot::members).unwrap_or_default();
                    if !members.is_empty() {
                        containment_groups.push((prop.name(), spec.target_type, members));
                    }
                } else if Some(p) != container_prop {
                    let members = obj.read(p).map(Slot::members).unwrap_or_default();
                    if !members.is_empty() {
                        let joined = members.iter().map(|m| m.as_ref()).collect::<Vec<_>>().join(" ");
                        start.push_attribute((prop.name(), escape(joined.as_str()).as_ref()));
                    }
                }
            }
        }
    }

    if containment_groups.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    for (prop_name, target_type, ids) in containment_groups {
        writer.write_event(Event::Start(BytesStart::new(prop_name))).map_err(xml_err)?;
        for id in ids {
            if let Some(child) = model.object(id.as_ref()) {
                write_object(writer, model, child, target_type)?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new(prop_name))).map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(declared_meta.name().to_string())))
        .map_err(xml_err)?;
    Ok(())
}

fn xml_err(e: quick_xml::Error) -> CodecError {
    CodecError::xml(e.to_string())
}
