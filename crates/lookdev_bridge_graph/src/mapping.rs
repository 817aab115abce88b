// SPDX-License-Identifier: MIT OR Apache-2.0
//! Declarative attribute mapping from source nodes to target documents.
//!
//! A [`MappingSchema`] is a tree of [`MapRule`]s keyed by source attribute.
//! Each rule resolves to a destination parameter plus optional enumeration
//! labels, value transform and child rules. Children of a parameter whose
//! final value is exactly zero are skipped unless the parameter is connected.

use crate::document::ParameterDocument;
use crate::node::NodeRecord;
use crate::value::{values_equal, AttrValue};
use indexmap::IndexMap;
use std::collections::HashSet;

/// Custom value transform, called as `(source key, value) -> value`
pub type ValueTransform = fn(&str, Option<AttrValue>) -> Option<AttrValue>;

/// Whole-node hook run before the generic rule traversal
pub type CustomProcess = fn(&mut ParameterDocument, &mut NodeRecord) -> Result<(), MappingError>;

/// Ordered rules keyed by source attribute
pub type Rules = IndexMap<String, MapRule>;

/// How one source attribute maps onto the target document
#[derive(Debug, Clone)]
pub enum MapRule {
    /// Same name on both sides
    Identity,
    /// Different parameter name
    Rename(String),
    /// Integer index translated into a label
    Enum(Vec<String>),
    /// Different parameter name with label translation
    RenameEnum(String, Vec<String>),
    /// Value rewritten by a function
    Transform(ValueTransform),
    /// Parameter with dependent child parameters
    Group(Rules),
    /// Renamed parameter with dependent child parameters
    RenameGroup(String, Rules),
}

impl MapRule {
    /// Rename rule
    pub fn rename(dest: &str) -> Self {
        Self::Rename(dest.to_string())
    }

    /// Enumeration rule
    pub fn labels(labels: &[&str]) -> Self {
        Self::Enum(labels.iter().map(|l| (*l).to_string()).collect())
    }

    /// Renamed enumeration rule
    pub fn rename_labels(dest: &str, labels: &[&str]) -> Self {
        Self::RenameEnum(dest.to_string(), labels.iter().map(|l| (*l).to_string()).collect())
    }

    /// Group rule
    pub fn group<const N: usize>(children: [(&str, MapRule); N]) -> Self {
        Self::Group(rules(children))
    }

    /// Renamed group rule
    pub fn rename_group<const N: usize>(dest: &str, children: [(&str, MapRule); N]) -> Self {
        Self::RenameGroup(dest.to_string(), rules(children))
    }

    fn resolve<'a>(&'a self, source_key: &'a str) -> ResolvedRule<'a> {
        let mut resolved = ResolvedRule {
            dest: source_key,
            options: None,
            transform: None,
            children: None,
        };
        match self {
            Self::Identity => {}
            Self::Rename(dest) => resolved.dest = dest,
            Self::Enum(labels) => resolved.options = Some(labels),
            Self::RenameEnum(dest, labels) => {
                resolved.dest = dest;
                resolved.options = Some(labels);
            }
            Self::Transform(transform) => resolved.transform = Some(*transform),
            Self::Group(children) => resolved.children = Some(children),
            Self::RenameGroup(dest, children) => {
                resolved.dest = dest;
                resolved.children = Some(children);
            }
        }
        resolved
    }
}

struct ResolvedRule<'a> {
    dest: &'a str,
    options: Option<&'a [String]>,
    transform: Option<ValueTransform>,
    children: Option<&'a Rules>,
}

/// Build an ordered rule map
pub fn rules<const N: usize>(entries: [(&str, MapRule); N]) -> Rules {
    entries
        .into_iter()
        .map(|(key, rule)| (key.to_string(), rule))
        .collect()
}

/// Identity rules for a list of attributes
pub fn identity<const N: usize>(keys: [&str; N]) -> Rules {
    keys.into_iter()
        .map(|key| (key.to_string(), MapRule::Identity))
        .collect()
}

/// Mapping rules and directives for one target type
#[derive(Debug, Clone, Default)]
pub struct MappingSchema {
    /// Rules by source attribute
    pub rules: Rules,
    /// Whole-node hook
    pub custom_process: Option<CustomProcess>,
    /// Node colour annotation
    pub custom_color: Option<[f64; 3]>,
    /// Map every attribute not named by a rule onto a parameter of the same name
    pub passthrough: bool,
}

impl MappingSchema {
    /// Create an empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a schema from rules
    pub fn from_rules(rules: Rules) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Add a rule
    pub fn rule(mut self, key: &str, rule: MapRule) -> Self {
        self.rules.insert(key.to_string(), rule);
        self
    }

    /// Set the colour annotation
    pub fn color(mut self, r: f64, g: f64, b: f64) -> Self {
        self.custom_color = Some([r, g, b]);
        self
    }

    /// Set the whole-node hook
    pub fn process(mut self, process: CustomProcess) -> Self {
        self.custom_process = Some(process);
        self
    }

    /// Enable attribute passthrough
    pub fn passthrough(mut self) -> Self {
        self.passthrough = true;
        self
    }

    /// Every source key named anywhere in the rule tree
    pub fn source_keys(&self) -> HashSet<&str> {
        fn collect<'a>(rules: &'a Rules, keys: &mut HashSet<&'a str>) {
            for (key, rule) in rules {
                keys.insert(key);
                if let MapRule::Group(children) | MapRule::RenameGroup(_, children) = rule {
                    collect(children, keys);
                }
            }
        }
        let mut keys = HashSet::new();
        collect(&self.rules, &mut keys);
        keys
    }
}

/// Fill `document` from `node` according to `schema`
pub fn apply(
    schema: &MappingSchema,
    document: &mut ParameterDocument,
    node: &mut NodeRecord,
) -> Result<(), MappingError> {
    if let Some(color) = schema.custom_color {
        document.color = Some(color);
    }
    if let Some(process) = schema.custom_process {
        process(document, node)?;
    }

    apply_rules(&schema.rules, document, node)?;

    if schema.passthrough {
        let listed = schema.source_keys();
        let unlisted: Vec<String> = node
            .attributes
            .keys()
            .filter(|key| !listed.contains(key.as_str()))
            .cloned()
            .collect();
        for key in unlisted {
            apply_rule(&key, &MapRule::Identity, document, node)?;
        }
    }
    Ok(())
}

fn apply_rules(rules: &Rules, document: &mut ParameterDocument, node: &mut NodeRecord) -> Result<(), MappingError> {
    for (key, rule) in rules {
        apply_rule(key, rule, document, node)?;
    }
    Ok(())
}

/// Apply one rule to the document
///
/// Every rule kind moves a connection under `source_key` to its destination
/// key, so renamed enumerations and groups keep their upstream wiring too.
fn apply_rule(
    source_key: &str,
    rule: &MapRule,
    document: &mut ParameterDocument,
    node: &mut NodeRecord,
) -> Result<(), MappingError> {
    let ResolvedRule {
        dest,
        options,
        transform,
        mut children,
    } = rule.resolve(source_key);

    node.rename_connection(source_key, dest);

    if let Some(slot) = document.param_mut(dest) {
        let default = slot.value.clone();
        let mut value = node.attr(source_key);
        let mut force = false;
        if node.has_connection(dest) {
            value = Some(default.clone());
            force = true;
        }

        if let Some(labels) = options {
            value = value
                .map(|current| translate_label(source_key, current, labels))
                .transpose()?;
        }
        if let Some(transform) = transform {
            value = transform(source_key, value);
        }

        if let Some(value) = value {
            if !values_equal(&value, &default) {
                if let Err(e) = slot.set(value.clone()) {
                    tracing::warn!("Skipping {}.{} -> {}: {}", node.name, source_key, dest, e);
                }
            }
            if value.is_zero() && !force {
                children = None;
            }
        }
    }

    if let Some(children) = children {
        apply_rules(children, document, node)?;
    }
    Ok(())
}

fn translate_label(key: &str, value: AttrValue, labels: &[String]) -> Result<AttrValue, MappingError> {
    let Some(index) = value.as_index() else {
        return Ok(value);
    };
    labels
        .get(index)
        .map(|label| AttrValue::Str(label.clone()))
        .ok_or_else(|| MappingError::EnumIndex {
            key: key.to_string(),
            index,
            count: labels.len(),
        })
}

/// Error mapping a single node
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    /// Enumeration index outside the label list
    #[error("Value {index} of '{key}' is outside its {count} enumeration labels")]
    EnumIndex {
        /// Source attribute
        key: String,
        /// Offending index
        index: usize,
        /// Number of labels
        count: usize,
    },

    /// Attribute required by a custom hook is missing
    #[error("Node '{node}' has no attribute '{key}'")]
    MissingAttribute {
        /// Node name
        node: String,
        /// Attribute name
        key: String,
    },

    /// Custom hook failure
    #[error("{0}")]
    Custom(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ParameterSlot;
    use crate::node::Endpoint;

    fn surface_template() -> ParameterDocument {
        ParameterDocument::new("ArnoldShadingNode", "alSurface")
            .with_input("sssMix")
            .with_input("diffuseColor")
            .with_param("sssMix", ParameterSlot::float(0.0))
            .with_param("sssMode", ParameterSlot::string("cubic"))
            .with_param("sssDensityScale", ParameterSlot::float(1.0))
            .with_param("diffuseColor", ParameterSlot::color(0.5, 0.5, 0.5))
            .with_param("Kd_color", ParameterSlot::color(1.0, 1.0, 1.0))
    }

    fn sss_schema() -> MappingSchema {
        MappingSchema::new().rule(
            "sssMix",
            MapRule::group([
                ("sssMode", MapRule::labels(&["cubic", "diffusion", "directional", "empirical"])),
                ("sssDensityScale", MapRule::Identity),
            ]),
        )
    }

    #[test]
    fn test_zero_value_prunes_children() {
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "alSurface")
            .with_attr("sssMix", 0.0)
            .with_attr("sssMode", 2_i64)
            .with_attr("sssDensityScale", 4.0);

        apply(&sss_schema(), &mut doc, &mut node).unwrap();

        assert!(!doc.param("sssMix").unwrap().enabled);
        assert!(!doc.param("sssMode").unwrap().enabled);
        assert_eq!(doc.param("sssDensityScale").unwrap().value, AttrValue::Float(1.0));
    }

    #[test]
    fn test_connection_forces_children() {
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "alSurface")
            .with_attr("sssMix", 0.0)
            .with_attr("sssMode", 2_i64)
            .with_attr("sssDensityScale", 4.0)
            .with_connection("sssMix", Endpoint::new("mask"));

        apply(&sss_schema(), &mut doc, &mut node).unwrap();

        let mix = doc.param("sssMix").unwrap();
        assert!(!mix.enabled);
        assert_eq!(doc.param("sssMode").unwrap().value, AttrValue::from("directional"));
        assert!(doc.param("sssMode").unwrap().enabled);
        assert_eq!(doc.param("sssDensityScale").unwrap().value, AttrValue::Float(4.0));
    }

    #[test]
    fn test_nonzero_value_descends() {
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "alSurface")
            .with_attr("sssMix", 0.5)
            .with_attr("sssMode", 0_i64)
            .with_attr("sssDensityScale", 1.0004);

        apply(&sss_schema(), &mut doc, &mut node).unwrap();

        assert!(doc.param("sssMix").unwrap().enabled);
        // Both children equal their defaults
        assert!(!doc.param("sssMode").unwrap().enabled);
        assert!(!doc.param("sssDensityScale").unwrap().enabled);
    }

    #[test]
    fn test_rename_moves_connection() {
        let schema = MappingSchema::new().rule("color", MapRule::rename("Kd_color"));
        let mut doc = surface_template();
        let mut node = NodeRecord::new("std", "standard")
            .with_attr("color", AttrValue::List(vec![AttrValue::rgb(0.2, 0.3, 0.4)]))
            .with_connection("color", Endpoint::new("tex"));

        apply(&schema, &mut doc, &mut node).unwrap();

        assert!(node.has_connection("Kd_color"));
        assert!(!node.has_connection("color"));
        // Connected: the default is kept
        assert!(!doc.param("Kd_color").unwrap().enabled);
    }

    #[test]
    fn test_renamed_enum_moves_connection() {
        let schema = MappingSchema::new().rule("sssMix", MapRule::rename_labels("sssMode", &["cubic", "diffusion"]));
        let mut doc = surface_template().with_input("sssMode");
        let mut node = NodeRecord::new("surf", "alSurface")
            .with_attr("sssMix", 1_i64)
            .with_connection("sssMix", Endpoint::new("tex"));

        apply(&schema, &mut doc, &mut node).unwrap();

        assert!(node.has_connection("sssMode"));
        assert!(!node.has_connection("sssMix"));
        assert!(!doc.param("sssMode").unwrap().enabled);
    }

    #[test]
    fn test_tuple_value_written() {
        let schema = MappingSchema::new().rule("color", MapRule::rename("Kd_color"));
        let mut doc = surface_template();
        let mut node = NodeRecord::new("std", "standard")
            .with_attr("color", AttrValue::List(vec![AttrValue::rgb(0.2, 0.3, 0.4)]));

        apply(&schema, &mut doc, &mut node).unwrap();

        let slot = doc.param("Kd_color").unwrap();
        assert!(slot.enabled);
        assert_eq!(slot.value, AttrValue::rgb(0.2, 0.3, 0.4));
    }

    #[test]
    fn test_missing_slot_still_descends() {
        let schema = MappingSchema::new().rule(
            "emissionStrength",
            MapRule::group([("diffuseColor", MapRule::Identity)]),
        );
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "alSurface")
            .with_attr("emissionStrength", 0.0)
            .with_attr("diffuseColor", AttrValue::rgb(1.0, 0.0, 0.0));

        apply(&schema, &mut doc, &mut node).unwrap();
        assert!(doc.param("diffuseColor").unwrap().enabled);
    }

    #[test]
    fn test_transform_and_color() {
        fn force_ggx(_key: &str, _value: Option<AttrValue>) -> Option<AttrValue> {
            Some(AttrValue::from("diffusion"))
        }
        let schema = MappingSchema::new()
            .color(0.2, 0.36, 0.1)
            .rule("sssMode", MapRule::Transform(force_ggx));
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "alSurface");

        apply(&schema, &mut doc, &mut node).unwrap();

        assert_eq!(doc.color, Some([0.2, 0.36, 0.1]));
        assert_eq!(doc.param("sssMode").unwrap().value, AttrValue::from("diffusion"));
    }

    #[test]
    fn test_enum_out_of_range() {
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "alSurface")
            .with_attr("sssMix", 1.0)
            .with_attr("sssMode", 9_i64);

        let err = apply(&sss_schema(), &mut doc, &mut node).unwrap_err();
        assert_eq!(
            err,
            MappingError::EnumIndex {
                key: "sssMode".into(),
                index: 9,
                count: 4
            }
        );
    }

    #[test]
    fn test_passthrough_maps_unlisted_attributes() {
        let schema = MappingSchema::new()
            .passthrough()
            .rule("sssMix", MapRule::group([("sssMode", MapRule::labels(&["cubic", "diffusion"]))]));
        let mut doc = surface_template();
        let mut node = NodeRecord::new("surf", "PxrSurface")
            .with_attr("sssMix", 0.0)
            .with_attr("sssMode", 1_i64)
            .with_attr("sssDensityScale", 3.0)
            .with_attr("notInTemplate", 1.0);

        apply(&schema, &mut doc, &mut node).unwrap();

        // Listed but pruned, so passthrough leaves it alone
        assert!(!doc.param("sssMode").unwrap().enabled);
        assert_eq!(doc.param("sssDensityScale").unwrap().value, AttrValue::Float(3.0));
    }

    #[test]
    fn test_source_keys_are_recursive() {
        let schema = sss_schema();
        let keys = schema.source_keys();
        assert!(keys.contains("sssMix"));
        assert!(keys.contains("sssMode"));
        assert!(keys.contains("sssDensityScale"));
    }
}
