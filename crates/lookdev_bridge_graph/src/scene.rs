// SPDX-License-Identifier: MIT OR Apache-2.0
//! Read-only access to the source scene.
//!
//! A live DCC session is one implementation of [`SceneQuery`]; the
//! [`SceneSnapshot`] here is another, loaded from a RON or JSON dump.

use crate::node::{Attributes, Endpoint};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// A downstream plug fed by one of a node's outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingPlug {
    /// Output attribute on the queried node
    pub port: String,
    /// Node consuming the output
    pub node: String,
    /// Input attribute on the consuming node
    pub input: String,
}

/// Scene queries the translator needs
pub trait SceneQuery {
    /// Node type, or `None` if the node does not exist
    fn type_of(&self, node: &str) -> Option<String>;

    /// Resolved attribute values of a node
    fn attributes_of(&self, node: &str) -> Attributes;

    /// Incoming connections by local input port
    fn connections_into(&self, node: &str) -> IndexMap<String, Endpoint>;

    /// Outgoing connections of a node
    fn connections_out_of(&self, _node: &str) -> Vec<OutgoingPlug> {
        Vec::new()
    }

    /// Every node upstream of the given ports of `node`, nearest first
    fn upstream_of(&self, node: &str, ports: &[&str]) -> Vec<String> {
        let connections = self.connections_into(node);
        let mut queue: VecDeque<String> = ports
            .iter()
            .filter_map(|port| connections.get(*port))
            .map(|endpoint| endpoint.node.clone())
            .collect();

        let mut found: Vec<String> = Vec::new();
        while let Some(name) = queue.pop_front() {
            if found.contains(&name) {
                continue;
            }
            queue.extend(self.connections_into(&name).into_values().map(|e| e.node));
            found.push(name);
        }
        found
    }
}

/// One node of a scene snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotNode {
    /// Node type in the source scene
    pub node_type: String,
    /// Attribute values
    #[serde(default)]
    pub attributes: Attributes,
    /// Incoming connections by local input port
    #[serde(default)]
    pub connections: IndexMap<String, Endpoint>,
}

/// Serializable dump of the source scene
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Nodes selected when the snapshot was taken
    #[serde(default)]
    pub selection: Vec<String>,
    /// Nodes by name
    pub nodes: IndexMap<String, SnapshotNode>,
}

impl SceneSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node
    pub fn with_node(mut self, name: impl Into<String>, node: SnapshotNode) -> Self {
        self.nodes.insert(name.into(), node);
        self
    }

    /// Parse a RON snapshot
    pub fn from_ron(content: &str) -> Result<Self, SceneError> {
        ron::from_str(content).map_err(|e| SceneError::Parse(e.to_string()))
    }

    /// Parse a JSON snapshot
    pub fn from_json(content: &str) -> Result<Self, SceneError> {
        serde_json::from_str(content).map_err(|e| SceneError::Parse(e.to_string()))
    }

    /// Load a snapshot, picking the format from the file extension
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let content = std::fs::read_to_string(path)?;
        let snapshot = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&content)?,
            _ => Self::from_ron(&content)?,
        };
        tracing::debug!("Loaded scene snapshot with {} nodes from {:?}", snapshot.nodes.len(), path);
        Ok(snapshot)
    }
}

impl SnapshotNode {
    /// Create a node of the given type
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            ..Self::default()
        }
    }

    /// Set an attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<crate::AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Add an incoming connection
    pub fn with_connection(mut self, port: impl Into<String>, endpoint: Endpoint) -> Self {
        self.connections.insert(port.into(), endpoint);
        self
    }
}

impl SceneQuery for SceneSnapshot {
    fn type_of(&self, node: &str) -> Option<String> {
        self.nodes.get(node).map(|n| n.node_type.clone())
    }

    fn attributes_of(&self, node: &str) -> Attributes {
        self.nodes
            .get(node)
            .map(|n| n.attributes.clone())
            .unwrap_or_default()
    }

    fn connections_into(&self, node: &str) -> IndexMap<String, Endpoint> {
        self.nodes
            .get(node)
            .map(|n| n.connections.clone())
            .unwrap_or_default()
    }

    fn connections_out_of(&self, node: &str) -> Vec<OutgoingPlug> {
        self.nodes
            .iter()
            .flat_map(|(consumer, n)| {
                n.connections
                    .iter()
                    .filter(|(_, e)| e.node == node)
                    .map(move |(input, e)| OutgoingPlug {
                        port: e.port.clone().unwrap_or_default(),
                        node: consumer.clone(),
                        input: input.clone(),
                    })
            })
            .collect()
    }
}

/// Error loading a scene snapshot
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// File could not be read
    #[error("Failed to read scene snapshot: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot content is malformed
    #[error("Failed to parse scene snapshot: {0}")]
    Parse(String),
}
