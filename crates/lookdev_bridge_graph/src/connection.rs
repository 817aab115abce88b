// SPDX-License-Identifier: MIT OR Apache-2.0
//! Connection resolution: renaming endpoints, weight propagation and
//! final port wiring between target documents.

use crate::document::ParameterDocument;
use crate::node::{Endpoint, NodeStore, Renaming};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static CHANNEL_PORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^out(?:Color|Value)([RGBAXYZ])").expect("valid channel pattern"));

/// A connection whose source node produced no output document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedConnection {
    /// Consuming node
    pub node: String,
    /// Input port on the consuming node
    pub port: String,
    /// Source node that could not be found
    pub source: String,
}

/// Redirect every endpoint that refers to a renamed node
///
/// Renamings from all records are flattened first; later records win.
/// An endpoint is left alone when the replacement is its own holder.
pub fn resolve_renames(store: &mut NodeStore) {
    let renamings: IndexMap<String, Renaming> = store
        .iter()
        .flat_map(|(_, node)| node.renamings.iter().map(|(old, r)| (old.clone(), r.clone())))
        .collect();
    if renamings.is_empty() {
        return;
    }

    let mut count = 0;
    for node in store.values_mut() {
        for endpoint in node.connections.values_mut() {
            let Some(renaming) = renamings.get(&endpoint.node) else {
                continue;
            };
            if renaming.name == node.name {
                continue;
            }
            endpoint.node.clone_from(&renaming.name);
            if renaming.port.is_some() {
                endpoint.port.clone_from(&renaming.port);
            }
            count += 1;
        }
    }
    tracing::debug!("Redirected {} connections through {} renamings", count, renamings.len());
}

/// Add every endpoint's declared weight to the node it points at
pub fn propagate_weights(store: &mut NodeStore) {
    let bumps: Vec<(String, i64)> = store
        .iter()
        .flat_map(|(_, node)| node.connections.values())
        .filter_map(|endpoint| endpoint.weight.map(|w| (endpoint.node.clone(), w)))
        .collect();

    for (name, weight) in bumps {
        if let Some(node) = store.get_mut(&name) {
            node.weight += weight;
        }
    }
}

/// Source path of an endpoint: `node.out`, plus a channel suffix for
/// single-channel outputs such as `outColorR`
pub fn out_port_path(endpoint: &Endpoint) -> String {
    let channel = endpoint
        .port
        .as_deref()
        .and_then(|port| CHANNEL_PORT.captures(port))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase());

    match channel {
        Some(channel) => format!("{}.out.{}", endpoint.node, channel),
        None => format!("{}.out", endpoint.node),
    }
}

/// Wire the input ports of every document to their sources
///
/// Ports missing from a document are ignored. Connections whose source has
/// no document are returned.
pub fn wire_documents(
    store: &NodeStore,
    documents: &mut IndexMap<String, ParameterDocument>,
) -> Vec<UnresolvedConnection> {
    let mut unresolved = Vec::new();
    let names: Vec<String> = documents.keys().cloned().collect();

    for name in names {
        let Some(node) = store.get(&name) else {
            continue;
        };
        for (port, endpoint) in &node.connections {
            if !documents.contains_key(&endpoint.node) {
                tracing::warn!(
                    "Unresolved connection {}.{} <- {}",
                    name,
                    port,
                    endpoint.node
                );
                unresolved.push(UnresolvedConnection {
                    node: name.clone(),
                    port: port.clone(),
                    source: endpoint.node.clone(),
                });
                continue;
            }
            if let Some(slot) = documents.get_mut(&name).and_then(|doc| doc.input_mut(port)) {
                slot.source = Some(out_port_path(endpoint));
            }
        }
    }
    unresolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeRecord;

    fn chain() -> NodeStore {
        [
            NodeRecord::new("tex", "image"),
            NodeRecord::new("surf", "alSurface")
                .with_connection("diffuseColor", Endpoint::new("tex").with_port("outColor"))
                .with_connection("specularColor", Endpoint::new("ramp1").with_port("outColorG")),
            NodeRecord::placeholder(
                "Empty",
                IndexMap::from([("ramp1".to_string(), Renaming::to("tex"))]),
            ),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_resolve_renames() {
        let mut store = chain();
        resolve_renames(&mut store);
        let surf = store.get("surf").unwrap();
        assert_eq!(surf.connections["specularColor"].node, "tex");
        assert_eq!(surf.connections["specularColor"].port.as_deref(), Some("outColorG"));
    }

    #[test]
    fn test_resolve_renames_is_idempotent() {
        let mut once = chain();
        resolve_renames(&mut once);
        let mut twice = once.clone();
        resolve_renames(&mut twice);

        for (name, node) in once.iter() {
            assert_eq!(node.connections, twice.get(name).unwrap().connections);
        }
    }

    #[test]
    fn test_rename_skips_own_holder() {
        let mut store: NodeStore = [
            NodeRecord::new("mat", "networkMaterial")
                .with_renaming("mat", Renaming::to("mat_out"))
                .with_connection("arnoldSurface", Endpoint::new("mat")),
            NodeRecord::new("mat_out", "alSurface").with_connection("diffuseColor", Endpoint::new("mat")),
        ]
        .into_iter()
        .collect();

        resolve_renames(&mut store);
        assert_eq!(store.get("mat").unwrap().connections["arnoldSurface"].node, "mat_out");
        assert_eq!(store.get("mat_out").unwrap().connections["diffuseColor"].node, "mat");
    }

    #[test]
    fn test_renaming_port_override() {
        let mut store: NodeStore = [
            NodeRecord::new("hsl", "PxrHSL")
                .with_renaming("ramp1", Renaming { name: "hsl".into(), port: Some("resultRGB".into()) }),
            NodeRecord::new("surf", "PxrSurface")
                .with_connection("diffuseColor", Endpoint::new("ramp1").with_port("outColor")),
        ]
        .into_iter()
        .collect();

        resolve_renames(&mut store);
        let endpoint = &store.get("surf").unwrap().connections["diffuseColor"];
        assert_eq!(endpoint.node, "hsl");
        assert_eq!(endpoint.port.as_deref(), Some("resultRGB"));
    }

    #[test]
    fn test_propagate_weights() {
        let mut store: NodeStore = [
            NodeRecord::new("a", "image").with_weight(1),
            NodeRecord::new("b", "image"),
            NodeRecord::new("ramp", "PxrRamp")
                .with_connection("i0", Endpoint::new("a").with_weight(0))
                .with_connection("i1", Endpoint::new("b").with_weight(1)),
        ]
        .into_iter()
        .collect();

        propagate_weights(&mut store);
        assert_eq!(store.get("a").unwrap().weight, 1);
        assert_eq!(store.get("b").unwrap().weight, 1);
        assert_eq!(store.get("ramp").unwrap().weight, 0);
    }

    #[test]
    fn test_out_port_path() {
        assert_eq!(out_port_path(&Endpoint::new("tex").with_port("outColor")), "tex.out");
        assert_eq!(out_port_path(&Endpoint::new("tex").with_port("outColorR")), "tex.out.r");
        assert_eq!(out_port_path(&Endpoint::new("n").with_port("outValueX")), "n.out.x");
        assert_eq!(out_port_path(&Endpoint::new("n").with_port("outAlpha")), "n.out");
        assert_eq!(out_port_path(&Endpoint::new("n")), "n.out");
    }

    #[test]
    fn test_wire_documents() {
        let store = chain();
        let mut documents = IndexMap::new();
        documents.insert(
            "tex".to_string(),
            ParameterDocument::new("ArnoldShadingNode", "image"),
        );
        documents.insert(
            "surf".to_string(),
            ParameterDocument::new("ArnoldShadingNode", "alSurface")
                .with_input("diffuseColor")
                .with_input("specularColor"),
        );

        let unresolved = wire_documents(&store, &mut documents);

        assert_eq!(
            documents["surf"].input("diffuseColor").unwrap().source.as_deref(),
            Some("tex.out")
        );
        assert!(documents["surf"].input("specularColor").unwrap().source.is_none());
        assert_eq!(
            unresolved,
            vec![UnresolvedConnection {
                node: "surf".into(),
                port: "specularColor".into(),
                source: "ramp1".into(),
            }]
        );
    }
}
