//! Graph → draft-07 documents.
use serde_json::{json, Map, Value};

use super::graph::{KlassPointer, NodeId, SchemaGraph};
use super::{SchemaDocument, SchemaOptions};
use crate::document::{FieldDescription, PrimitiveType, PropertyDescriptor, TypeKind, TypeRef};

pub(crate) const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

pub(crate) fn render_document(graph: &SchemaGraph, root: NodeId, options: &SchemaOptions) -> SchemaDocument {
    let node = graph.node(root);
    let id = format!("{}/{}.json", node.base_url, node.name());

    let mut doc = Map::new();
    doc.insert("$schema".into(), json!(DRAFT_07));
    doc.insert("$id".into(), json!(id));
    let body = render_body(graph, root, root);
    if let Some(kind) = body.get("type") {
        doc.insert("type".into(), kind.clone());
    }
    doc.insert("title".into(), json!(node.name()));
    if let Some(description) = &node.description.description {
        doc.insert("description".into(), json!(description));
    }

    let definitions: Map<String, Value> = graph
        .definitions_of(root)
        .map(|def| (graph.node(def).name().to_string(), render_definition(graph, def, root, options)))
        .collect();
    if !definitions.is_empty() {
        doc.insert("definitions".into(), Value::Object(definitions));
    }

    doc.extend(body.into_iter().filter(|(k, _)| k != "type"));
    insert_examples(&mut doc, node, options);

    SchemaDocument { name: node.name().to_string(), id, base_url: node.base_url.clone(), json: Value::Object(doc) }
}

fn render_definition(graph: &SchemaGraph, id: NodeId, doc: NodeId, options: &SchemaOptions) -> Value {
    let node = graph.node(id);
    let mut out = Map::new();
    out.insert("$id".into(), json!(format!("#{}", node.name())));
    let body = render_body(graph, id, doc);
    if let Some(kind) = body.get("type") {
        out.insert("type".into(), kind.clone());
    }
    out.insert("title".into(), json!(node.name()));
    if let Some(description) = &node.description.description {
        out.insert("description".into(), json!(description));
    }
    out.extend(body.into_iter().filter(|(k, _)| k != "type"));
    insert_examples(&mut out, node, options);
    Value::Object(out)
}

fn insert_examples(out: &mut Map<String, Value>, node: &KlassPointer, options: &SchemaOptions) {
    if !options.include_examples {
        return;
    }
    let mut examples: Vec<Value> = match &node.description.kind {
        TypeKind::StringOptionSet(values) => values.iter().map(|v| json!(v)).collect(),
        _ => Vec::new(),
    };
    examples.extend(node.examples.iter().map(Value::from));
    if !examples.is_empty() {
        out.insert("examples".into(), Value::Array(examples));
    }
}

/// Everything describing the value itself, `type` first.
fn render_body(graph: &SchemaGraph, id: NodeId, doc: NodeId) -> Map<String, Value> {
    let node = graph.node(id);
    let mut out = Map::new();
    match &node.description.kind {
        TypeKind::StringEnum(values) => {
            out.insert("type".into(), json!("string"));
            out.insert("enum".into(), json!(values));
        }
        TypeKind::StringLiteral { pattern } => {
            out.insert("type".into(), json!("string"));
            if let Some(pattern) = pattern {
                out.insert("pattern".into(), json!(pattern));
            }
        }
        TypeKind::StringOptionSet(_) => {
            out.insert("type".into(), json!("string"));
        }
        TypeKind::Object | TypeKind::Unknown => {
            out.insert("type".into(), json!("object"));
            render_object(graph, node, doc, &mut out);
        }
    }
    out
}

fn render_object(graph: &SchemaGraph, node: &KlassPointer, doc: NodeId, out: &mut Map<String, Value>) {
    let mut properties = Map::new();
    let mut required: Vec<String> = Vec::new();
    let mut all_of: Vec<Value> = Vec::new();

    // discriminator first, typed by the interface's type key when it has one
    for (iface, discriminator) in &node.owner_interfaces {
        let Some(info) = &graph.node(*iface).interface else { continue };
        let key = info.discriminator_key;
        if !properties.contains_key(key) {
            let mut property = Map::new();
            if let Some(type_key) = info.type_key {
                property.insert("$ref".into(), json!(reference(graph, type_key, doc)));
            }
            property.insert("const".into(), json!(discriminator));
            properties.insert(key.to_string(), Value::Object(property));
            required.push(key.to_string());
        }
        all_of.push(json!({ "$ref": reference(graph, *iface, doc) }));
    }

    for field in &node.description.fields {
        if properties.contains_key(&field.key) || is_inherited(graph, node, field) {
            continue;
        }
        let mut property = render_property(graph, &field.property, doc);
        if let Some(description) = &field.description {
            property.insert("description".into(), json!(description));
        }
        properties.insert(field.key.clone(), Value::Object(property));
        if field.required {
            required.push(field.key.clone());
        }
    }

    out.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        out.insert("required".into(), json!(required));
    }
    if !all_of.is_empty() {
        out.insert("allOf".into(), Value::Array(all_of));
    }
    if !node.description.is_open {
        out.insert("additionalProperties".into(), json!(false));
    }
}

/// Same key and same descriptor as a field of one of the owning interfaces.
fn is_inherited(graph: &SchemaGraph, node: &KlassPointer, field: &FieldDescription) -> bool {
    node.owner_interfaces.iter().any(|(iface, _)| {
        graph
            .node(*iface)
            .description
            .property_for(&field.key)
            .is_ok_and(|inherited| inherited == &field.property)
    })
}

fn render_property(graph: &SchemaGraph, property: &PropertyDescriptor, doc: NodeId) -> Map<String, Value> {
    let value = match property {
        PropertyDescriptor::Primitive(p) => primitive(*p),
        PropertyDescriptor::PrimitiveArray(p) => json!({ "type": "array", "items": primitive(*p) }),
        PropertyDescriptor::PrimitiveDictionary(p) => json!({ "type": "object", "additionalProperties": primitive(*p) }),
        PropertyDescriptor::Reference(t) => json!({ "$ref": type_reference(graph, t, doc) }),
        PropertyDescriptor::ReferenceArray(t) => {
            json!({ "type": "array", "items": { "$ref": type_reference(graph, t, doc) } })
        }
        PropertyDescriptor::ReferenceDictionary(t) => {
            json!({ "type": "object", "additionalProperties": { "$ref": type_reference(graph, t, doc) } })
        }
        PropertyDescriptor::Interface(name) => json!({ "$ref": interface_reference(graph, name, doc) }),
        PropertyDescriptor::InterfaceArray(name) => {
            json!({ "type": "array", "items": { "$ref": interface_reference(graph, name, doc) } })
        }
        PropertyDescriptor::InterfaceDictionary(name) => {
            json!({ "type": "object", "additionalProperties": { "$ref": interface_reference(graph, name, doc) } })
        }
        PropertyDescriptor::Constant(value) => json!({ "const": Value::from(value) }),
        PropertyDescriptor::Any => json!({}),
    };
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn primitive(primitive: PrimitiveType) -> Value {
    match primitive.format() {
        Some(format) => json!({ "type": primitive.json_type(), "format": format }),
        None => json!({ "type": primitive.json_type() }),
    }
}

fn type_reference(graph: &SchemaGraph, type_ref: &TypeRef, doc: NodeId) -> String {
    match graph.lookup_type(type_ref) {
        Some(id) => reference(graph, id, doc),
        None => format!("#{}", type_ref.describe().name),
    }
}

fn interface_reference(graph: &SchemaGraph, name: &str, doc: NodeId) -> String {
    match graph.lookup_interface(name) {
        Some(id) => reference(graph, id, doc),
        None => format!("{name}.json"),
    }
}

/// `$ref` from document `doc` to `target`:
///
/// | target                               | reference           |
/// |--------------------------------------|---------------------|
/// | in `doc`                             | `#Name`             |
/// | another root                         | `Name.json`         |
/// | definition inside another root       | `Other.json#Name`   |
///
/// Targets on a different base URL are prefixed with `<baseUrl>/`.
pub(crate) fn reference(graph: &SchemaGraph, target: NodeId, doc: NodeId) -> String {
    let name = graph.node(target).name();
    let target_doc = graph.document_of(target);
    if target_doc == doc {
        return format!("#{name}");
    }
    let holder = graph.node(target_doc);
    let prefix = if holder.base_url == graph.node(doc).base_url {
        String::new()
    } else {
        format!("{}/", holder.base_url)
    };
    if target_doc == target {
        format!("{prefix}{name}.json")
    } else {
        format!("{prefix}{}.json#{name}", holder.name())
    }
}
