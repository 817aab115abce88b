// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node records and the store they live in during a translation run.

use crate::value::AttrValue;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Ordered attribute dictionary of a node
pub type Attributes = IndexMap<String, AttrValue>;

/// Set of records returned by a transform hook, keyed by node name
pub type NodeSet = IndexMap<String, NodeRecord>;

/// Upstream end of a connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Source node name
    pub node: String,
    /// Source port (attribute) name on the source node
    #[serde(default)]
    pub port: Option<String>,
    /// Extra ordering weight added to the source node
    #[serde(default)]
    pub weight: Option<i64>,
}

impl Endpoint {
    /// Create an endpoint on a node's default output
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            port: None,
            weight: None,
        }
    }

    /// Set the source port
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    /// Set the ordering weight
    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }
}

/// Instruction to redirect every reference to an old node name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Renaming {
    /// Replacement node name
    pub name: String,
    /// Replacement source port, if the port changes too
    #[serde(default)]
    pub port: Option<String>,
}

impl Renaming {
    /// Redirect to another node, keeping the port
    pub fn to(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
        }
    }
}

/// A shading node flowing through the translation pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Unique node name
    pub name: String,
    /// Type used to select the mapping schema
    pub node_type: String,
    /// Type the node had in the source scene
    #[serde(default)]
    pub source_type: String,
    /// Attribute values read from the source scene
    #[serde(default)]
    pub attributes: Attributes,
    /// Incoming connections by local input port
    #[serde(default)]
    pub connections: IndexMap<String, Endpoint>,
    /// Renamings recorded by transforms, keyed by the old node name
    #[serde(default)]
    pub renamings: IndexMap<String, Renaming>,
    /// Sibling ordering weight in the layout tree
    #[serde(default)]
    pub weight: i64,
    /// Whether the backend's postprocess hook applies to this node
    #[serde(default)]
    pub postprocess: bool,
    /// Rename-only record that is never laid out or mapped
    #[serde(default)]
    pub placeholder: bool,
}

impl NodeRecord {
    /// Create a record with the given name and type
    pub fn new(name: impl Into<String>, node_type: impl Into<String>) -> Self {
        let node_type = node_type.into();
        Self {
            name: name.into(),
            source_type: node_type.clone(),
            node_type,
            ..Self::default()
        }
    }

    /// Create a rename-only placeholder record
    pub fn placeholder(name: impl Into<String>, renamings: IndexMap<String, Renaming>) -> Self {
        Self {
            name: name.into(),
            renamings,
            placeholder: true,
            ..Self::default()
        }
    }

    /// Set an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add an incoming connection
    pub fn with_connection(mut self, port: impl Into<String>, endpoint: Endpoint) -> Self {
        self.connections.insert(port.into(), endpoint);
        self
    }

    /// Record a renaming
    pub fn with_renaming(mut self, old: impl Into<String>, renaming: Renaming) -> Self {
        self.renamings.insert(old.into(), renaming);
        self
    }

    /// Set the ordering weight
    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = weight;
        self
    }

    /// Get an attribute with single-element lists unwrapped
    pub fn attr(&self, key: &str) -> Option<AttrValue> {
        self.attributes.get(key).cloned().map(AttrValue::unwrap_single)
    }

    /// Whether a local port has an incoming connection
    pub fn has_connection(&self, port: &str) -> bool {
        self.connections.contains_key(port)
    }

    /// Whether this node takes an input from `source`
    pub fn consumes(&self, source: &str) -> bool {
        self.connections.values().any(|c| c.node == source)
    }

    /// Move a connection to another local port, keeping its position
    pub fn rename_connection(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        if let Some(index) = self.connections.get_index_of(from) {
            if let Some((_, endpoint)) = self.connections.shift_remove_index(index) {
                self.connections.shift_insert(index, to.to_string(), endpoint);
            }
        }
    }

    /// Wrap this record into a single-entry node set
    pub fn into_set(self) -> NodeSet {
        let mut set = NodeSet::new();
        set.insert(self.name.clone(), self);
        set
    }
}

/// Ordered store of node records keyed by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeStore {
    nodes: IndexMap<String, NodeRecord>,
}

impl NodeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record under its own name, replacing any previous entry
    pub fn insert(&mut self, node: NodeRecord) {
        self.nodes.insert(node.name.clone(), node);
    }

    /// Insert a record under an explicit key
    pub fn insert_as(&mut self, key: impl Into<String>, node: NodeRecord) {
        self.nodes.insert(key.into(), node);
    }

    /// Merge a node set returned by a transform hook
    pub fn merge(&mut self, set: NodeSet) {
        self.nodes.extend(set);
    }

    /// Remove a record, preserving the order of the remaining ones
    pub fn remove(&mut self, name: &str) -> Option<NodeRecord> {
        self.nodes.shift_remove(name)
    }

    /// Get a record by name
    pub fn get(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.get(name)
    }

    /// Get a mutable record by name
    pub fn get_mut(&mut self, name: &str) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(name)
    }

    /// Whether a record exists under this name
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Iterate over `(key, record)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate mutably over records in insertion order
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut NodeRecord> {
        self.nodes.values_mut()
    }

    /// Record keys in insertion order
    pub fn names(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<NodeRecord> for NodeStore {
    fn from_iter<I: IntoIterator<Item = NodeRecord>>(iter: I) -> Self {
        let mut store = Self::new();
        for node in iter {
            store.insert(node);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_connection_keeps_order() {
        let mut node = NodeRecord::new("surf", "standard")
            .with_connection("color", Endpoint::new("tex"))
            .with_connection("opacity", Endpoint::new("mask"));
        node.rename_connection("color", "Kd_color");

        let ports: Vec<_> = node.connections.keys().cloned().collect();
        assert_eq!(ports, vec!["Kd_color", "opacity"]);
        assert_eq!(node.connections["Kd_color"].node, "tex");
    }

    #[test]
    fn test_store_remove_and_reinsert_moves_to_end() {
        let mut store: NodeStore = ["a", "b", "c"]
            .into_iter()
            .map(|n| NodeRecord::new(n, "alSurface"))
            .collect();

        let mut b = store.remove("b").unwrap();
        b.name = "b_out".to_string();
        store.insert(b);

        assert_eq!(store.names(), vec!["a", "c", "b_out"]);
    }

    #[test]
    fn test_attr_unwraps_lists() {
        let node = NodeRecord::new("ramp1", "ramp")
            .with_attr("color", AttrValue::List(vec![AttrValue::rgb(1.0, 0.0, 0.0)]));
        assert_eq!(node.attr("color"), Some(AttrValue::rgb(1.0, 0.0, 0.0)));
        assert_eq!(node.attr("missing"), None);
    }

    #[test]
    fn test_consumes() {
        let node = NodeRecord::new("mix", "mix").with_connection("input1", Endpoint::new("tex"));
        assert!(node.consumes("tex"));
        assert!(!node.consumes("mix"));
    }
}
