// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bundled renderer backends and the helpers they share.

pub mod arnold;
pub mod prman;

use crate::document::ParameterDocument;
use crate::node::{NodeRecord, NodeSet, NodeStore, Renaming};
use crate::pipeline::{HookContext, NodeTransform, TransformError};
use crate::value::AttrValue;
use indexmap::IndexMap;

/// Fuses a material node with its terminal surface shader
///
/// Preprocessing keeps only the surface and displacement inputs, renamed to
/// the material's ports. Postprocessing renames the shader to `<name>_out`
/// and hands its old name to the material.
#[derive(Debug, Clone)]
pub struct NetworkMaterial {
    /// Material inputs holding the surface shader, in priority order
    pub surface_sources: &'static [&'static str],
    /// Material port receiving the surface shader
    pub surface_port: &'static str,
    /// Material port receiving the displacement shader
    pub displacement_port: &'static str,
    /// Material port receiving the shader's `normalCamera` input
    pub bump_port: Option<&'static str>,
    /// Shader types skipped through their `beauty` input
    pub passthrough_types: &'static [&'static str],
}

impl NodeTransform for NetworkMaterial {
    fn preprocess(&self, mut node: NodeRecord, _ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        let mut connections = IndexMap::new();
        if let Some(surface) = self
            .surface_sources
            .iter()
            .find_map(|port| node.connections.get(*port))
        {
            connections.insert(self.surface_port.to_string(), surface.clone());
        }
        if let Some(displacement) = node.connections.get("displacementShader") {
            connections.insert(self.displacement_port.to_string(), displacement.clone());
        }
        node.connections = connections;
        Ok(node.into_set())
    }

    fn postprocess(
        &self,
        mut node: NodeRecord,
        store: &mut NodeStore,
        _ctx: &mut HookContext<'_>,
    ) -> Result<NodeSet, TransformError> {
        let Some(surface) = node.connections.get(self.surface_port) else {
            return Ok(node.into_set());
        };

        let mut shader_name = surface.node.clone();
        while let Some(shader) = store.get(&shader_name) {
            if !self.passthrough_types.contains(&shader.node_type.as_str()) {
                break;
            }
            match shader.connections.get("beauty") {
                Some(beauty) => shader_name = beauty.node.clone(),
                None => break,
            }
        }

        let Some(mut shader) = store.remove(&shader_name) else {
            tracing::debug!("Material {} has no translated surface shader", node.name);
            return Ok(node.into_set());
        };

        let material_name = shader.name.clone();
        shader.name = format!("{material_name}_out");
        tracing::debug!("Fusing material {} with shader {}", node.name, material_name);

        node.name = material_name.clone();
        node.renamings = IndexMap::from([(material_name.clone(), Renaming::to(&shader.name))]);
        if let Some(bump_port) = self.bump_port {
            if let Some(bump) = shader.connections.shift_remove("normalCamera") {
                node.connections.insert(bump_port.to_string(), bump);
            }
        }

        let mut set = NodeSet::new();
        set.insert(shader.name.clone(), shader);
        set.insert(material_name, node);
        Ok(set)
    }
}

/// Drop the listed input ports that have no incoming connection
pub(crate) fn remove_unconnected_ports(document: &mut ParameterDocument, node: &NodeRecord, ports: &[&str]) {
    for port in ports {
        if !node.has_connection(port) {
            document.remove_input(port);
        }
    }
}

/// Index and remainder of an indexed attribute key such as `colors[2].color`
pub(crate) fn indexed<'a>(key: &'a str, prefix: &str) -> Option<(usize, &'a str)> {
    let rest = key.strip_prefix(prefix)?.strip_prefix('[')?;
    let (index, tail) = rest.split_once(']')?;
    Some((index.parse().ok()?, tail))
}

/// Sorted indices of a multi attribute, e.g. every `i` of `colorEntryList[i].position`
pub(crate) fn multi_indices<'a>(
    keys: impl IntoIterator<Item = &'a String>,
    prefix: &str,
    suffix: &str,
) -> Vec<usize> {
    let mut indices: Vec<usize> = keys
        .into_iter()
        .filter_map(|key| indexed(key, prefix))
        .filter(|(_, tail)| *tail == suffix)
        .map(|(index, _)| index)
        .collect();
    indices.sort_unstable();
    indices.dedup();
    indices
}

/// Write per-knot values into an array slot, one `tuple_size` group per knot
pub(crate) fn write_knot_array(document: &mut ParameterDocument, key: &str, values: &[AttrValue]) {
    let Some(slot) = document.param_mut(key) else {
        return;
    };
    let size = slot.tuple_size.max(1);
    let flat = values
        .iter()
        .flat_map(|value| {
            (0..size).map(move |j| match value.as_sequence() {
                Some(items) if size > 1 => items.get(j).cloned().unwrap_or(AttrValue::Float(0.0)),
                _ => value.clone(),
            })
        })
        .collect();
    slot.set_array(flat);
}

/// Replace a file extension, normalising separators to `/`
///
/// Paths without an extension keep none.
pub(crate) fn swap_extension(path: &str, extension: &str) -> String {
    let path = path.replace('\\', "/");
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}.{}", &path[..name_start + dot], extension),
        _ => path,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ParameterSlot;
    use crate::naming::UniqueNames;
    use crate::node::Endpoint;
    use crate::scene::SceneSnapshot;
    use crate::value::ParamKind;

    const MATERIAL: NetworkMaterial = NetworkMaterial {
        surface_sources: &["aiSurfaceShader", "surfaceShader"],
        surface_port: "arnoldSurface",
        displacement_port: "arnoldDisplacement",
        bump_port: Some("arnoldBump"),
        passthrough_types: &["aov_write_rgb"],
    };

    #[test]
    fn test_material_preprocess_keeps_first_surface() {
        let scene = SceneSnapshot::new();
        let mut names = UniqueNames::new();
        let mut ctx = HookContext {
            names: &mut names,
            scene: &scene,
        };
        let node = NodeRecord::new("SG", "networkMaterial")
            .with_connection("surfaceShader", Endpoint::new("lambert1"))
            .with_connection("aiSurfaceShader", Endpoint::new("surf"))
            .with_connection("displacementShader", Endpoint::new("disp"))
            .with_connection("dagSetMembers", Endpoint::new("mesh"));

        let set = MATERIAL.preprocess(node, &mut ctx).unwrap();
        let sg = &set["SG"];
        assert_eq!(sg.connections.len(), 2);
        assert_eq!(sg.connections["arnoldSurface"].node, "surf");
        assert_eq!(sg.connections["arnoldDisplacement"].node, "disp");
    }

    #[test]
    fn test_material_postprocess_fuses_through_aov() {
        let scene = SceneSnapshot::new();
        let mut names = UniqueNames::new();
        let mut ctx = HookContext {
            names: &mut names,
            scene: &scene,
        };
        let mut store: NodeStore = [
            NodeRecord::new("surf", "alSurface").with_connection("normalCamera", Endpoint::new("bump")),
            NodeRecord::new("aov", "aov_write_rgb").with_connection("beauty", Endpoint::new("surf")),
            NodeRecord::new("bump", "bump2d"),
        ]
        .into_iter()
        .collect();
        let material = NodeRecord::new("SG", "networkMaterial").with_connection("arnoldSurface", Endpoint::new("aov"));

        let set = MATERIAL.postprocess(material, &mut store, &mut ctx).unwrap();

        assert!(!store.contains("surf"));
        assert!(store.contains("aov"));
        let shader = &set["surf_out"];
        assert!(!shader.has_connection("normalCamera"));
        let material = &set["surf"];
        assert_eq!(material.name, "surf");
        assert_eq!(material.connections["arnoldBump"].node, "bump");
        assert_eq!(material.renamings["surf"], Renaming::to("surf_out"));
    }

    #[test]
    fn test_material_without_surface_is_kept() {
        let scene = SceneSnapshot::new();
        let mut names = UniqueNames::new();
        let mut ctx = HookContext {
            names: &mut names,
            scene: &scene,
        };
        let mut store = NodeStore::new();
        let set = MATERIAL
            .postprocess(NodeRecord::new("SG", "networkMaterial"), &mut store, &mut ctx)
            .unwrap();
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["SG"]);
    }

    #[test]
    fn test_indexed_keys() {
        assert_eq!(indexed("colors[12]", "colors"), Some((12, "")));
        assert_eq!(indexed("colorEntryList[3].color", "colorEntryList"), Some((3, ".color")));
        assert_eq!(indexed("colorsX[1]", "colors"), None);
        assert_eq!(indexed("colors[a]", "colors"), None);

        let keys = vec![
            "colorEntryList[2].position".to_string(),
            "colorEntryList[0].position".to_string(),
            "colorEntryList[0].color".to_string(),
        ];
        assert_eq!(multi_indices(&keys, "colorEntryList", ".position"), vec![0, 2]);
    }

    #[test]
    fn test_write_knot_array() {
        let mut doc = ParameterDocument::new("ArnoldShadingNode", "ramp")
            .with_param("color", ParameterSlot::array(ParamKind::Float, 3))
            .with_param("position", ParameterSlot::array(ParamKind::Float, 1));
        write_knot_array(&mut doc, "color", &[AttrValue::rgb(1.0, 0.0, 0.0), AttrValue::Int(1)]);
        write_knot_array(&mut doc, "position", &[AttrValue::Float(0.0), AttrValue::Float(1.0)]);

        let color = doc.param("color").unwrap();
        assert!(color.enabled);
        assert_eq!(color.value, AttrValue::floats(&[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]));
        assert_eq!(doc.param("position").unwrap().value, AttrValue::floats(&[0.0, 1.0]));
    }

    #[test]
    fn test_swap_extension() {
        assert_eq!(swap_extension("C:\\tex\\wood.png", "tx"), "C:/tex/wood.tx");
        assert_eq!(swap_extension("/tex/wood.1001.exr", "tex"), "/tex/wood.1001.tex");
        assert_eq!(swap_extension("/tex.d/wood", "tx"), "/tex.d/wood");
        assert_eq!(swap_extension("/tex/.hidden", "tx"), "/tex/.hidden");
    }
}
