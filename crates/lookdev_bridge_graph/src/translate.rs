// SPDX-License-Identifier: MIT OR Apache-2.0
//! Translation runs: from selected scene nodes to positioned documents.
//!
//! A run reads the selection into a [`NodeStore`], preprocesses it through
//! the backend's premap, builds the dependency tree, postprocesses the
//! root-level nodes, maps every remaining record onto its template, wires
//! ports and assigns layout positions.

use crate::connection::{propagate_weights, resolve_renames, wire_documents, UnresolvedConnection};
use crate::document::{ParameterDocument, TemplateProvider};
use crate::mapping;
use crate::naming::UniqueNames;
use crate::node::{NodeRecord, NodeStore};
use crate::pipeline::{Backend, BackendRegistry, HookContext};
use crate::scene::SceneQuery;
use crate::tree::{self, LayoutConfig, LayoutTree};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Settings of a translation run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Node graph layout constants
    pub layout: LayoutConfig,
    /// Expand a single selected material into its whole network
    pub expand_network: bool,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            layout: LayoutConfig::default(),
            expand_network: true,
        }
    }
}

/// Result of a translation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Translation {
    /// Positioned documents in layout order
    pub documents: Vec<ParameterDocument>,
    /// Connections whose source produced no document
    pub unresolved: Vec<UnresolvedConnection>,
    /// Number of selected nodes the premap accepted
    pub translated: usize,
}

impl Translation {
    /// Whether there is nothing to output
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Find a document by node name
    pub fn document(&self, name: &str) -> Option<&ParameterDocument> {
        self.documents.iter().find(|doc| doc.name == name)
    }
}

/// Translator bound to one backend and one template source
pub struct Translator<'a> {
    backend: Arc<Backend>,
    templates: &'a dyn TemplateProvider,
    config: TranslateConfig,
    names: UniqueNames,
}

impl<'a> Translator<'a> {
    /// Create a translator for a registered backend
    pub fn new(
        registry: &BackendRegistry,
        backend: &str,
        templates: &'a dyn TemplateProvider,
        config: TranslateConfig,
    ) -> Result<Self, TranslateError> {
        let backend = registry.get(backend).ok_or_else(|| TranslateError::UnknownBackend {
            name: backend.to_string(),
            available: registry.names().join(", "),
        })?;
        Ok(Self {
            backend,
            templates,
            config,
            names: UniqueNames::new(),
        })
    }

    /// Get the backend
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Get the run settings
    pub fn config(&self) -> &TranslateConfig {
        &self.config
    }

    /// Translate the selected nodes of a scene
    pub fn translate(&mut self, scene: &dyn SceneQuery, selection: &[String]) -> Result<Translation, TranslateError> {
        let selection = self.expand_selection(scene, selection);
        if selection.is_empty() {
            tracing::info!("Nothing selected");
            return Ok(Translation::default());
        }
        self.names.reset_with(selection.iter().cloned());

        let (mut store, translated) = self.preprocess(scene, &selection);
        tracing::info!("Preprocessed {} of {} selected nodes", translated, selection.len());

        resolve_renames(&mut store);
        propagate_weights(&mut store);

        let mut tree = tree::build(&store);
        if self.postprocess(scene, &mut store, &tree) {
            resolve_renames(&mut store);
            tree = tree::build(&store);
        }

        let mut documents = self.map_documents(&mut store);
        tracing::info!("Mapped {} nodes", documents.len());

        let unresolved = wire_documents(&store, &mut documents);
        let documents = self.position(&mut tree, documents);

        Ok(Translation {
            documents,
            unresolved,
            translated,
        })
    }

    /// Dedupe the selection and expand a lone material into its network
    fn expand_selection(&self, scene: &dyn SceneQuery, selection: &[String]) -> Vec<String> {
        let mut unique: Vec<String> = Vec::with_capacity(selection.len());
        for name in selection {
            if !unique.contains(name) {
                unique.push(name.clone());
            }
        }

        if unique.len() != 1 || !self.config.expand_network {
            return unique;
        }
        let material = unique.swap_remove(0);
        if scene.type_of(&material).as_deref() != Some(self.backend.network_type.as_str()) {
            return vec![material];
        }

        let connections = scene.connections_into(&material);
        let ports: Vec<&str> = self
            .backend
            .network_ports
            .iter()
            .filter_map(|alternatives| alternatives.iter().find(|port| connections.contains_key(*port)))
            .map(String::as_str)
            .collect();

        let mut network = scene.upstream_of(&material, &ports);
        network.retain(|name| *name != material);
        tracing::info!("Expanded material {} to {} upstream nodes", material, network.len());
        network.push(material);
        network
    }

    /// Read selected nodes and run their preprocess hooks
    fn preprocess(&mut self, scene: &dyn SceneQuery, selection: &[String]) -> (NodeStore, usize) {
        let backend = Arc::clone(&self.backend);
        let mut store = NodeStore::new();
        let mut translated = 0;

        for name in selection {
            let Some(source_type) = scene.type_of(name) else {
                tracing::debug!("Node {} does not exist", name);
                continue;
            };
            let Some(entry) = backend.premap_entry(&source_type) else {
                tracing::debug!("Skipping unsupported node {} of type {}", name, source_type);
                continue;
            };

            let node = NodeRecord {
                name: name.clone(),
                node_type: entry.target_type.clone().unwrap_or_else(|| source_type.clone()),
                source_type,
                attributes: scene.attributes_of(name),
                connections: scene.connections_into(name),
                postprocess: entry.postprocess,
                ..NodeRecord::default()
            };

            let set = match &entry.transform {
                Some(transform) => {
                    let mut ctx = HookContext {
                        names: &mut self.names,
                        scene,
                    };
                    match transform.preprocess(node, &mut ctx) {
                        Ok(set) => set,
                        Err(e) => {
                            tracing::warn!("Dropping node {}: {}", name, e);
                            continue;
                        }
                    }
                }
                None => node.into_set(),
            };
            if !set.is_empty() {
                translated += 1;
            }
            store.merge(set);
        }
        (store, translated)
    }

    /// Run postprocess hooks on flagged root-level records
    ///
    /// Returns whether any hook ran.
    fn postprocess(&mut self, scene: &dyn SceneQuery, store: &mut NodeStore, tree: &LayoutTree) -> bool {
        let backend = Arc::clone(&self.backend);
        let mut changed = false;

        for name in tree.top_level() {
            let Some(record) = store.get(&name).filter(|r| r.postprocess) else {
                continue;
            };
            let Some(transform) = backend
                .premap_entry(&record.source_type)
                .and_then(|entry| entry.transform.clone())
            else {
                continue;
            };
            let Some(record) = store.remove(&name) else {
                continue;
            };

            let mut ctx = HookContext {
                names: &mut self.names,
                scene,
            };
            match transform.postprocess(record.clone(), store, &mut ctx) {
                Ok(set) => {
                    tracing::debug!("Postprocessed {} into {} nodes", name, set.len());
                    store.merge(set);
                    changed = true;
                }
                Err(e) => {
                    tracing::warn!("Postprocess of {} failed: {}", name, e);
                    store.insert(record);
                }
            }
        }
        changed
    }

    /// Fill a template document for every mappable record
    fn map_documents(&self, store: &mut NodeStore) -> IndexMap<String, ParameterDocument> {
        let mut documents = IndexMap::new();
        for node in store.values_mut() {
            if node.placeholder {
                continue;
            }
            let Some(schema) = self.backend.schema(&node.node_type) else {
                tracing::debug!("No mapping for {} of type {}", node.name, node.node_type);
                continue;
            };
            let Some(mut document) = self.templates.template(&node.node_type) else {
                tracing::debug!("No template for {} of type {}", node.name, node.node_type);
                continue;
            };

            document.name.clone_from(&node.name);
            match mapping::apply(schema, &mut document, node) {
                Ok(()) => {
                    documents.insert(node.name.clone(), document);
                }
                Err(e) => tracing::warn!("Skipping node {}: {}", node.name, e),
            }
        }
        documents
    }

    /// Lay out the tree and order documents by it
    fn position(
        &self,
        tree: &mut LayoutTree,
        mut documents: IndexMap<String, ParameterDocument>,
    ) -> Vec<ParameterDocument> {
        tree::layout(tree, &self.config.layout);
        let mut ordered = Vec::with_capacity(documents.len());
        for (name, position) in tree.positions() {
            if let Some(mut document) = documents.shift_remove(&name) {
                document.position = Some(position);
                ordered.push(document);
            }
        }
        ordered.extend(documents.into_values());
        ordered
    }
}

/// Error starting or running a translation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    /// Backend name is not registered
    #[error("Unknown renderer backend '{name}' (available: {available})")]
    UnknownBackend {
        /// Requested name
        name: String,
        /// Registered names
        available: String,
    },
}
