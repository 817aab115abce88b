// SPDX-License-Identifier: MIT OR Apache-2.0
//! Target parameter documents and the templates they are created from.
//!
//! A [`ParameterDocument`] mirrors one Katana node: its ports, its
//! parameter slots and its placement in the node graph. Templates hold the
//! default document for every supported target type.

use crate::value::{AttrValue, ParamKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// An input port on a target node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSlot {
    /// Port name
    pub name: String,
    /// Wired source path (`node.out`), if connected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl PortSlot {
    /// Create an unconnected port
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: None,
        }
    }
}

/// A parameter of a target node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSlot {
    /// Declared attribute kind
    #[serde(default)]
    pub kind: ParamKind,
    /// Current value; tuples are written as indexed sub-fields
    pub value: AttrValue,
    /// Whether the value overrides the target default
    #[serde(default)]
    pub enabled: bool,
    /// Components per array element, zero for scalars
    #[serde(default)]
    pub tuple_size: usize,
}

impl ParameterSlot {
    /// Scalar float parameter
    pub fn float(value: f64) -> Self {
        Self::scalar(ParamKind::Float, AttrValue::Float(value))
    }

    /// Scalar int parameter
    pub fn int(value: i64) -> Self {
        Self::scalar(ParamKind::Int, AttrValue::Int(value))
    }

    /// Scalar string parameter
    pub fn string(value: impl Into<String>) -> Self {
        Self::scalar(ParamKind::String, AttrValue::Str(value.into()))
    }

    /// RGB colour parameter
    pub fn color(r: f64, g: f64, b: f64) -> Self {
        Self {
            kind: ParamKind::Float,
            value: AttrValue::rgb(r, g, b),
            enabled: false,
            tuple_size: 3,
        }
    }

    /// Empty array parameter with the given element size
    pub fn array(kind: ParamKind, tuple_size: usize) -> Self {
        Self {
            kind,
            value: AttrValue::Tuple(Vec::new()),
            enabled: false,
            tuple_size,
        }
    }

    fn scalar(kind: ParamKind, value: AttrValue) -> Self {
        Self {
            kind,
            value,
            enabled: false,
            tuple_size: 0,
        }
    }

    /// Whether the value is written as indexed sub-fields
    pub fn is_array(&self) -> bool {
        self.value.is_sequence()
    }

    /// Write a new value and enable the slot
    ///
    /// Array slots take sequences component-wise; scalar slots take scalars.
    pub fn set(&mut self, value: AttrValue) -> Result<(), SlotError> {
        if let AttrValue::Tuple(current) | AttrValue::List(current) = &mut self.value {
            let (AttrValue::Tuple(items) | AttrValue::List(items)) = value else {
                return Err(SlotError::ExpectedSequence);
            };
            for (i, item) in items.into_iter().enumerate() {
                let item = self.kind.coerce(item);
                match current.get_mut(i) {
                    Some(slot) => *slot = item,
                    None => current.push(item),
                }
            }
        } else {
            if value.is_sequence() {
                return Err(SlotError::ExpectedScalar);
            }
            self.value = self.kind.coerce(value);
        }
        self.enabled = true;
        Ok(())
    }

    /// Replace the whole array with flattened element values and enable the slot
    pub fn set_array(&mut self, values: Vec<AttrValue>) {
        let kind = self.kind;
        self.value = AttrValue::Tuple(values.into_iter().map(|v| kind.coerce(v)).collect());
        self.enabled = true;
    }

    fn normalize(&mut self) {
        let kind = self.kind;
        if let AttrValue::Tuple(items) | AttrValue::List(items) = &mut self.value {
            for item in items.iter_mut() {
                *item = kind.coerce(item.clone());
            }
            if self.tuple_size == 0 && !items.is_empty() {
                self.tuple_size = items.len();
            }
        }
    }
}

/// One target node: ports, parameters and placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDocument {
    /// Node name in the target graph
    #[serde(default)]
    pub name: String,
    /// Katana node class (`ArnoldShadingNode`, `NetworkMaterial`, ...)
    pub node_class: String,
    /// Shader type written as the `nodeType` parameter
    #[serde(default)]
    pub shader_type: String,
    /// Node colour annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[f64; 3]>,
    /// Position in the target node graph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[i64; 2]>,
    /// Input ports
    #[serde(default)]
    pub inputs: Vec<PortSlot>,
    /// Output port names
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Parameters by name
    #[serde(default)]
    pub parameters: IndexMap<String, ParameterSlot>,
}

impl ParameterDocument {
    /// Create an empty document
    pub fn new(node_class: impl Into<String>, shader_type: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            node_class: node_class.into(),
            shader_type: shader_type.into(),
            color: None,
            position: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            parameters: IndexMap::new(),
        }
    }

    /// Add an input port
    pub fn with_input(mut self, name: impl Into<String>) -> Self {
        self.inputs.push(PortSlot::new(name));
        self
    }

    /// Add an output port
    pub fn with_output(mut self, name: impl Into<String>) -> Self {
        self.outputs.push(name.into());
        self
    }

    /// Add a parameter slot
    pub fn with_param(mut self, name: impl Into<String>, slot: ParameterSlot) -> Self {
        self.parameters.insert(name.into(), slot);
        self
    }

    /// Get a parameter slot
    pub fn param(&self, name: &str) -> Option<&ParameterSlot> {
        self.parameters.get(name)
    }

    /// Get a mutable parameter slot
    pub fn param_mut(&mut self, name: &str) -> Option<&mut ParameterSlot> {
        self.parameters.get_mut(name)
    }

    /// Get an input port
    pub fn input(&self, name: &str) -> Option<&PortSlot> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Get a mutable input port
    pub fn input_mut(&mut self, name: &str) -> Option<&mut PortSlot> {
        self.inputs.iter_mut().find(|p| p.name == name)
    }

    /// Add an input port unless it already exists
    pub fn add_input(&mut self, name: &str) {
        if self.input(name).is_none() {
            self.inputs.push(PortSlot::new(name));
        }
    }

    /// Remove an input port
    pub fn remove_input(&mut self, name: &str) {
        self.inputs.retain(|p| p.name != name);
    }

    /// Coerce tuple components to their declared kinds
    pub fn normalize(&mut self) {
        for slot in self.parameters.values_mut() {
            slot.normalize();
        }
    }
}

/// Source of default documents per target type
pub trait TemplateProvider {
    /// Default document for a target type, or `None` if unsupported
    fn template(&self, target_type: &str) -> Option<ParameterDocument>;
}

/// Templates held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryTemplates {
    templates: IndexMap<String, ParameterDocument>,
}

impl InMemoryTemplates {
    /// Create an empty template set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template for a target type
    pub fn insert(&mut self, target_type: impl Into<String>, mut template: ParameterDocument) {
        template.normalize();
        self.templates.insert(target_type.into(), template);
    }

    /// Register a template, builder style
    pub fn with(mut self, target_type: impl Into<String>, template: ParameterDocument) -> Self {
        self.insert(target_type, template);
        self
    }

    /// Number of templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether no templates are registered
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateProvider for InMemoryTemplates {
    fn template(&self, target_type: &str) -> Option<ParameterDocument> {
        self.templates.get(target_type).cloned()
    }
}

/// Templates loaded from `<dir>/<target type>.ron`
#[derive(Debug, Clone)]
pub struct DirectoryTemplates {
    root: PathBuf,
    templates: InMemoryTemplates,
}

impl DirectoryTemplates {
    /// Load every `.ron` template in a directory
    pub fn load(root: &Path) -> Result<Self, TemplateError> {
        let mut templates = InMemoryTemplates::new();
        let entries = std::fs::read_dir(root).map_err(|source| TemplateError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(target_type) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let content = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                path: path.clone(),
                source,
            })?;
            let template: ParameterDocument =
                ron::from_str(&content).map_err(|e| TemplateError::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
            templates.insert(target_type.to_string(), template);
        }

        tracing::info!("Loaded {} node templates from {:?}", templates.len(), root);
        Ok(Self {
            root: root.to_path_buf(),
            templates,
        })
    }

    /// Directory the templates were loaded from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of loaded templates
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether the directory held no templates
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl TemplateProvider for DirectoryTemplates {
    fn template(&self, target_type: &str) -> Option<ParameterDocument> {
        self.templates.template(target_type)
    }
}

/// Error writing a parameter slot
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SlotError {
    /// Scalar written into an array slot
    #[error("Array parameter expects a sequence value")]
    ExpectedSequence,

    /// Sequence written into a scalar slot
    #[error("Scalar parameter expects a single value")]
    ExpectedScalar,
}

/// Error loading templates
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template file or directory could not be read
    #[error("Failed to read template {path:?}: {source}")]
    Io {
        /// Offending path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Template file is malformed
    #[error("Failed to parse template {path:?}: {message}")]
    Parse {
        /// Offending path
        path: PathBuf,
        /// Parser message
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_scalar_coerces_and_enables() {
        let mut slot = ParameterSlot::float(0.5);
        slot.set(AttrValue::Int(2)).unwrap();
        assert_eq!(slot.value, AttrValue::Float(2.0));
        assert!(slot.enabled);

        let mut flag = ParameterSlot::int(0);
        flag.set(AttrValue::Bool(true)).unwrap();
        assert_eq!(flag.value, AttrValue::Int(1));
    }

    #[test]
    fn test_set_tuple_componentwise() {
        let mut slot = ParameterSlot::color(0.0, 0.0, 0.0);
        slot.set(AttrValue::Tuple(vec![AttrValue::Int(1), AttrValue::Float(0.5), AttrValue::Float(0.25)]))
            .unwrap();
        assert_eq!(slot.value, AttrValue::rgb(1.0, 0.5, 0.25));
    }

    #[test]
    fn test_shape_mismatch() {
        let mut slot = ParameterSlot::color(0.0, 0.0, 0.0);
        assert_eq!(slot.set(AttrValue::Float(1.0)), Err(SlotError::ExpectedSequence));
        assert!(!slot.enabled);

        let mut scalar = ParameterSlot::float(0.0);
        assert_eq!(scalar.set(AttrValue::rgb(1.0, 1.0, 1.0)), Err(SlotError::ExpectedScalar));
    }

    #[test]
    fn test_directory_templates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("image.ron"),
            r#"(
                node_class: "ArnoldShadingNode",
                shader_type: "image",
                inputs: [(name: "multiply")],
                outputs: ["out"],
                parameters: {
                    "filename": (kind: String, value: Str("")),
                    "multiply": (kind: Float, value: Tuple([Int(1), Int(1), Int(1)])),
                },
            )"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let templates = DirectoryTemplates::load(dir.path()).unwrap();
        assert_eq!(templates.len(), 1);

        let image = templates.template("image").unwrap();
        let multiply = image.param("multiply").unwrap();
        assert_eq!(multiply.value, AttrValue::rgb(1.0, 1.0, 1.0));
        assert_eq!(multiply.tuple_size, 3);
        assert!(templates.template("standard").is_none());
    }

    #[test]
    fn test_malformed_template() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.ron"), "(node_class: ").unwrap();
        assert!(matches!(
            DirectoryTemplates::load(dir.path()),
            Err(TemplateError::Parse { .. })
        ));
    }
}
