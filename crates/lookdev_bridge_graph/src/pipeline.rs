// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-type node transforms and the renderer backends that register them.
//!
//! A [`Backend`] pairs a premap (which source types are supported, what
//! they become, and which hooks run on them) with the mapping schemas of
//! every target type it can emit.

use crate::mapping::MappingSchema;
use crate::naming::UniqueNames;
use crate::node::{NodeRecord, NodeSet, NodeStore};
use crate::scene::SceneQuery;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// State shared with transform hooks during a run
pub struct HookContext<'a> {
    /// Unique name generator of the current run
    pub names: &'a mut UniqueNames,
    /// Source scene
    pub scene: &'a dyn SceneQuery,
}

/// Hooks run on records of one source type
pub trait NodeTransform: Send + Sync {
    /// Rewrite a freshly read record before mapping
    ///
    /// The returned set replaces the record; it may be empty, retyped, or
    /// contain additional synthesized records.
    fn preprocess(&self, node: NodeRecord, _ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        Ok(node.into_set())
    }

    /// Rewrite a root-level record after the first tree build
    ///
    /// The record has already been taken out of `store`. The hook may remove
    /// further records; the returned set is merged back.
    fn postprocess(
        &self,
        node: NodeRecord,
        _store: &mut NodeStore,
        _ctx: &mut HookContext<'_>,
    ) -> Result<NodeSet, TransformError> {
        Ok(node.into_set())
    }
}

/// How a supported source type enters the pipeline
#[derive(Clone, Default)]
pub struct PremapEntry {
    /// Target type, if it differs from the source type
    pub target_type: Option<String>,
    /// Preprocess and postprocess hooks
    pub transform: Option<Arc<dyn NodeTransform>>,
    /// Whether the postprocess hook runs for this type
    pub postprocess: bool,
}

impl PremapEntry {
    /// Supported as-is
    pub fn keep() -> Self {
        Self::default()
    }

    /// Supported under another type name
    pub fn retype(target_type: &str) -> Self {
        Self {
            target_type: Some(target_type.to_string()),
            ..Self::default()
        }
    }

    /// Attach hooks
    pub fn with_transform(mut self, transform: impl NodeTransform + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Run the postprocess hook for this type
    pub fn with_postprocess(mut self) -> Self {
        self.postprocess = true;
        self
    }
}

impl fmt::Debug for PremapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PremapEntry")
            .field("target_type", &self.target_type)
            .field("transform", &self.transform.is_some())
            .field("postprocess", &self.postprocess)
            .finish()
    }
}

/// Premap and mapping schemas of one renderer
#[derive(Debug, Clone)]
pub struct Backend {
    /// Registry name
    pub name: String,
    /// Supported source types
    pub premap: IndexMap<String, PremapEntry>,
    /// Mapping schemas by target type
    pub mappings: IndexMap<String, MappingSchema>,
    /// Source type of material nodes that expand into their whole network
    pub network_type: String,
    /// Material input ports followed during expansion, alternatives in priority order
    pub network_ports: Vec<Vec<String>>,
}

impl Backend {
    /// Create an empty backend
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            premap: IndexMap::new(),
            mappings: IndexMap::new(),
            network_type: "shadingEngine".to_string(),
            network_ports: Vec::new(),
        }
    }

    /// Register a supported source type
    pub fn register(&mut self, source_type: &str, entry: PremapEntry) {
        self.premap.insert(source_type.to_string(), entry);
    }

    /// Register a mapping schema for a target type
    pub fn map(&mut self, target_type: &str, schema: MappingSchema) {
        self.mappings.insert(target_type.to_string(), schema);
    }

    /// Add a group of alternative network ports
    pub fn network_port(&mut self, alternatives: &[&str]) {
        self.network_ports
            .push(alternatives.iter().map(|p| (*p).to_string()).collect());
    }

    /// Premap entry of a source type
    pub fn premap_entry(&self, source_type: &str) -> Option<&PremapEntry> {
        self.premap.get(source_type)
    }

    /// Mapping schema of a target type
    pub fn schema(&self, target_type: &str) -> Option<&MappingSchema> {
        self.mappings.get(target_type)
    }
}

/// Backends by name
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: IndexMap<String, Arc<Backend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the bundled backends
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(crate::backends::arnold::create_arnold_backend());
        registry.register(crate::backends::prman::create_prman_backend());
        registry
    }

    /// Register a backend under its name
    pub fn register(&mut self, backend: Backend) {
        self.backends.insert(backend.name.clone(), Arc::new(backend));
    }

    /// Look up a backend
    pub fn get(&self, name: &str) -> Option<Arc<Backend>> {
        self.backends.get(name).cloned()
    }

    /// Registered backend names
    pub fn names(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }
}

/// Error raised by a transform hook
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    /// Attribute the hook relies on is missing
    #[error("Node '{node}' has no attribute '{key}'")]
    MissingAttribute {
        /// Node name
        node: String,
        /// Attribute name
        key: String,
    },

    /// Record has an unexpected shape
    #[error("Cannot transform node '{node}': {reason}")]
    Invalid {
        /// Node name
        node: String,
        /// Explanation
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneSnapshot;

    struct Split;

    impl NodeTransform for Split {
        fn preprocess(&self, node: NodeRecord, ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
            let extra = NodeRecord::new(ctx.names.unique(&format!("{}Mix", node.name)), "mix");
            let mut set = node.into_set();
            set.insert(extra.name.clone(), extra);
            Ok(set)
        }
    }

    struct Identity;

    impl NodeTransform for Identity {}

    #[test]
    fn test_default_hooks_are_identity() {
        let scene = SceneSnapshot::new();
        let mut names = UniqueNames::new();
        let mut ctx = HookContext {
            names: &mut names,
            scene: &scene,
        };
        let mut store = NodeStore::new();

        let set = Identity.preprocess(NodeRecord::new("a", "image"), &mut ctx).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["a"]);

        let set = Identity
            .postprocess(NodeRecord::new("b", "image"), &mut store, &mut ctx)
            .unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn test_preprocess_can_expand() {
        let scene = SceneSnapshot::new();
        let mut names = UniqueNames::seeded(["ramp1", "ramp1Mix"]);
        let mut ctx = HookContext {
            names: &mut names,
            scene: &scene,
        };
        let set = Split.preprocess(NodeRecord::new("ramp1", "ramp"), &mut ctx).unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["ramp1", "ramp1MixA"]);
    }

    #[test]
    fn test_backend_registration() {
        let mut backend = Backend::new("test");
        backend.register("aiImage", PremapEntry::retype("image"));
        backend.register("ramp", PremapEntry::keep().with_transform(Split).with_postprocess());
        backend.map("image", MappingSchema::new());
        backend.network_port(&["aiSurfaceShader", "surfaceShader"]);

        assert_eq!(
            backend.premap_entry("aiImage").unwrap().target_type.as_deref(),
            Some("image")
        );
        let ramp = backend.premap_entry("ramp").unwrap();
        assert!(ramp.transform.is_some() && ramp.postprocess);
        assert!(backend.schema("image").is_some());
        assert!(backend.schema("ramp").is_none());
        assert_eq!(backend.network_ports[0], vec!["aiSurfaceShader", "surfaceShader"]);
    }

    #[test]
    fn test_default_registry() {
        let registry = BackendRegistry::with_defaults();
        assert_eq!(registry.names(), vec!["arnold", "prman"]);
        assert!(registry.get("arnold").is_some());
        assert!(registry.get("redshift").is_none());
    }
}
