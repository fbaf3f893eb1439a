//! Build-scoped type graph.
//!
//! Nodes ([`KlassPointer`]) are created lazily the first time a type is reached
//! and only ever gain parents afterwards. Once the walk is done, non-root nodes
//! that cannot live inside a single document are promoted to roots, and every
//! remaining node is assigned the root document that embeds it.
use std::any::TypeId;
use std::collections::{HashMap, HashSet};

use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use super::SchemaOptions;
use crate::codec::PolymorphicCodec;
use crate::document::{PropertyDescriptor, TypeDescription, TypeKind, TypeRef};
use crate::error::SchemaError;
use crate::registry::{ErasedSerializer, TypeRegistry};
use crate::value::JsonValue;

static TYPE_NAME: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").ok());

pub(crate) type NodeId = usize;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum NodeKey {
    Type(TypeId),
    Interface(String),
}

#[derive(Debug)]
pub(crate) struct InterfaceInfo {
    pub discriminator_key: &'static str,
    /// Node describing the allowed discriminator values, if the interface has one.
    pub type_key: Option<NodeId>,
}

#[derive(Debug)]
pub(crate) struct KlassPointer {
    pub key: NodeKey,
    pub description: TypeDescription,
    pub base_url: String,
    pub is_root: bool,
    pub interface: Option<InterfaceInfo>,
    /// Interfaces this type is registered under, with its discriminator there.
    pub owner_interfaces: Vec<(NodeId, String)>,
    pub parents: IndexSet<NodeId>,
    /// Root document embedding this node. `None` for roots.
    pub owner: Option<NodeId>,
    pub examples: Vec<JsonValue>,
}

impl KlassPointer {
    pub fn name(&self) -> &str { &self.description.name }
}

#[derive(Debug, Default)]
pub(crate) struct SchemaGraph {
    pub nodes: Vec<KlassPointer>,
    index: HashMap<NodeKey, NodeId>,
}

impl SchemaGraph {
    pub fn node(&self, id: NodeId) -> &KlassPointer { &self.nodes[id] }

    pub fn lookup_type(&self, type_ref: &TypeRef) -> Option<NodeId> {
        self.index.get(&NodeKey::Type(type_ref.type_id())).copied()
    }

    pub fn lookup_interface(&self, name: &str) -> Option<NodeId> {
        self.index.get(&NodeKey::Interface(name.to_string())).copied()
    }

    /// Root document holding `id`'s definition (`id` itself for roots).
    pub fn document_of(&self, id: NodeId) -> NodeId {
        self.nodes[id].owner.unwrap_or(id)
    }

    pub fn roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(move |&id| self.nodes[id].is_root)
    }

    pub fn definitions_of(&self, root: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).filter(move |&id| self.nodes[id].owner == Some(root))
    }

    fn insert(&mut self, key: NodeKey, description: TypeDescription, options: &SchemaOptions) -> NodeId {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.nodes.len();
        trace!(id, name = %description.name, "discovered type");
        let base_url = description.base_url.clone().unwrap_or_else(|| options.base_url.clone());
        let examples = if options.include_examples { description.examples.clone() } else { Vec::new() };
        self.nodes.push(KlassPointer {
            key: key.clone(),
            description,
            base_url,
            is_root: false,
            interface: None,
            owner_interfaces: Vec::new(),
            parents: IndexSet::new(),
            owner: None,
            examples,
        });
        self.index.insert(key, id);
        id
    }

    fn ensure_type(&mut self, type_ref: &TypeRef, options: &SchemaOptions) -> NodeId {
        match self.lookup_type(type_ref) {
            Some(id) => id,
            None => self.insert(NodeKey::Type(type_ref.type_id()), type_ref.describe(), options),
        }
    }

    fn add_parent(&mut self, child: NodeId, parent: NodeId) {
        if child != parent {
            self.nodes[child].parents.insert(parent);
        }
    }

    /// Roots reachable upwards from `id`, and the non-root nodes passed on the way.
    fn reach(&self, id: NodeId) -> (IndexSet<NodeId>, HashSet<NodeId>) {
        let mut roots = IndexSet::new();
        let mut ancestors = HashSet::new();
        let mut seen = HashSet::from([id]);
        let mut stack: Vec<NodeId> = self.nodes[id].parents.iter().rev().copied().collect();
        while let Some(parent) = stack.pop() {
            if !seen.insert(parent) {
                continue;
            }
            if self.nodes[parent].is_root {
                roots.insert(parent);
            } else {
                ancestors.insert(parent);
                stack.extend(self.nodes[parent].parents.iter().rev().copied());
            }
        }
        (roots, ancestors)
    }

    /// Embeddable only when exactly one root reaches the node and it shares that
    /// root's base URL.
    fn needs_promotion(&self, id: NodeId) -> bool {
        let (roots, _) = self.reach(id);
        match roots.first() {
            Some(&root) if roots.len() == 1 => self.nodes[root].base_url != self.nodes[id].base_url,
            _ => true,
        }
    }
}

// ------------------------------- Building --------------------------------- //

pub(crate) fn build_graph(registry: &TypeRegistry, options: &SchemaOptions) -> Result<SchemaGraph, SchemaError> {
    let mut graph = SchemaGraph::default();
    let codec = PolymorphicCodec::new(registry);

    for root in registry.roots() {
        let id = graph.ensure_type(root, options);
        graph.nodes[id].is_root = true;
    }

    let interfaces: Vec<(NodeId, &dyn ErasedSerializer)> = registry
        .interfaces()
        .map(|serializer| {
            let key = NodeKey::Interface(serializer.interface_name().to_string());
            let id = graph.insert(key, serializer.describe_interface(), options);
            let node = &mut graph.nodes[id];
            node.is_root = true;
            node.interface = Some(InterfaceInfo { discriminator_key: serializer.discriminator_key(), type_key: None });
            (id, serializer)
        })
        .collect();

    for &(iface, serializer) in &interfaces {
        discover_type_key(&mut graph, iface, options);
        discover_subclasses(&mut graph, iface, serializer, &codec, options)?;
    }

    walk_fields(&mut graph, registry, options)?;
    classify(&graph)?;
    promote_shared(&mut graph);

    debug!(nodes = graph.nodes.len(), roots = graph.roots().count(), "schema graph built");
    Ok(graph)
}

/// A discriminator field referencing a documentable type (usually a string
/// enum) makes that type a definition of the interface.
fn discover_type_key(graph: &mut SchemaGraph, iface: NodeId, options: &SchemaOptions) {
    let Some(info) = &graph.nodes[iface].interface else { return };
    let key = info.discriminator_key;
    let type_ref = graph.nodes[iface]
        .description
        .property_for(key)
        .ok()
        .and_then(|property| match property {
            PropertyDescriptor::Reference(type_ref) => Some(*type_ref),
            _ => None,
        });
    if let Some(type_ref) = type_ref {
        let type_key = graph.ensure_type(&type_ref, options);
        graph.add_parent(type_key, iface);
        if let Some(info) = graph.nodes[iface].interface.as_mut() {
            info.type_key = Some(type_key);
        }
    }
}

fn discover_subclasses(
    graph: &mut SchemaGraph,
    iface: NodeId,
    serializer: &dyn ErasedSerializer,
    codec: &PolymorphicCodec<'_>,
    options: &SchemaOptions,
) -> Result<(), SchemaError> {
    for discriminator in serializer.discriminators() {
        let Some(type_ref) = serializer.variant_type(&discriminator) else { continue };
        let sub = graph.ensure_type(&type_ref, options);
        graph.add_parent(sub, iface);
        trace!(interface = serializer.interface_name(), %discriminator, "subclass");

        if options.include_examples {
            let examples = serializer.encoded_examples(&discriminator, codec).map_err(|source| {
                SchemaError::Example { type_name: graph.nodes[sub].name().to_string(), source }
            })?;
            graph.nodes[iface].examples.extend(examples.iter().cloned());
            graph.nodes[sub].examples.extend(examples);
        }
        graph.nodes[sub].owner_interfaces.push((iface, discriminator));
    }
    Ok(())
}

/// Follow every reference field until no new type turns up. Nodes are
/// appended as they are found, so walking by index visits each exactly once.
fn walk_fields(graph: &mut SchemaGraph, registry: &TypeRegistry, options: &SchemaOptions) -> Result<(), SchemaError> {
    let mut next = 0;
    while next < graph.nodes.len() {
        let id = next;
        next += 1;
        let properties: Vec<PropertyDescriptor> =
            graph.nodes[id].description.fields.iter().map(|f| f.property.clone()).collect();
        for property in &properties {
            if let Some(type_ref) = property.type_ref() {
                let child = graph.ensure_type(type_ref, options);
                graph.add_parent(child, id);
            } else if let Some(interface) = property.interface_name() {
                if !registry.is_interface_registered(interface) {
                    return Err(SchemaError::MissingInterfaceRegistration {
                        interface: interface.to_string(),
                        referenced_by: graph.nodes[id].name().to_string(),
                    });
                }
            }
        }
    }
    Ok(())
}

fn classify(graph: &SchemaGraph) -> Result<(), SchemaError> {
    let mut names: HashMap<&str, &NodeKey> = HashMap::new();
    for node in &graph.nodes {
        let name = node.name();
        if !TYPE_NAME.as_ref().is_some_and(|re| re.is_match(name)) {
            return Err(SchemaError::InvalidTypeName(name.to_string()));
        }
        if let Some(existing) = names.insert(name, &node.key) {
            if existing != &node.key {
                return Err(SchemaError::DuplicateTypeName { name: name.to_string() });
            }
        }

        let unclassifiable = |reason: String| SchemaError::UnclassifiableType { name: name.to_string(), reason };
        match &node.description.kind {
            TypeKind::Object => {}
            _ if node.interface.is_some() => {
                return Err(unclassifiable("an interface must describe an object".to_string()));
            }
            TypeKind::Unknown => return Err(unclassifiable("no kind declared".to_string())),
            TypeKind::StringEnum(values) | TypeKind::StringOptionSet(values) if values.is_empty() => {
                return Err(unclassifiable("string set has no values".to_string()));
            }
            TypeKind::StringLiteral { pattern: Some(pattern) } => {
                Regex::new(pattern).map_err(|err| unclassifiable(err.to_string()))?;
            }
            TypeKind::StringEnum(_) | TypeKind::StringOptionSet(_) | TypeKind::StringLiteral { .. } => {}
        }
    }
    Ok(())
}

/// Promote until every non-root node has exactly one root on its own base URL.
///
/// Only the highest candidates are promoted per round: promoting an ancestor
/// often settles its descendants. When every candidate sits on a cycle of
/// candidates, the first one is promoted to break it. Each round promotes at
/// least one node, so this terminates within the node count.
fn promote_shared(graph: &mut SchemaGraph) {
    loop {
        let candidates: Vec<NodeId> =
            (0..graph.nodes.len()).filter(|&id| !graph.nodes[id].is_root && graph.needs_promotion(id)).collect();
        let Some(&first) = candidates.first() else { break };

        let mut highest: Vec<NodeId> = candidates
            .iter()
            .copied()
            .filter(|&id| {
                let (_, ancestors) = graph.reach(id);
                !candidates.iter().any(|c| ancestors.contains(c))
            })
            .collect();
        if highest.is_empty() {
            highest.push(first);
        }
        for id in highest {
            debug!(name = graph.nodes[id].name(), "promoted to root document");
            graph.nodes[id].is_root = true;
        }
    }

    for id in 0..graph.nodes.len() {
        if !graph.nodes[id].is_root {
            let (roots, _) = graph.reach(id);
            graph.nodes[id].owner = roots.first().copied();
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
