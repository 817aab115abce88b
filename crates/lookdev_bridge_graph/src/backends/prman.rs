// SPDX-License-Identifier: MIT OR Apache-2.0
//! RenderMan backend: premap, node transforms and mapping schemas.
//!
//! Most RenderMan patterns share parameter names between Maya and Katana,
//! so their schemas pass every attribute through unchanged.

use super::{indexed, multi_indices, remove_unconnected_ports, swap_extension, write_knot_array, NetworkMaterial};
use crate::document::ParameterDocument;
use crate::mapping::{identity, MapRule, MappingError, MappingSchema};
use crate::node::{Endpoint, NodeRecord, NodeSet};
use crate::pipeline::{Backend, HookContext, NodeTransform, PremapEntry, TransformError};
use crate::value::AttrValue;
use std::collections::BTreeMap;

const SURFACE_COLOR: (f64, f64, f64) = (0.2, 0.36, 0.1);
const TEXTURE_COLOR: (f64, f64, f64) = (0.36, 0.25, 0.38);

const ARRAY_CONNECTOR: &str = "ShadingNodeArrayConnector";

const MATERIAL_PORTS: [&str; 10] = [
    "prmanBxdf",
    "prmanDisplacement",
    "prmanDisplayfilter",
    "prmanIntegrator",
    "prmanLight",
    "prmanLightfilter",
    "prmanPattern",
    "prmanProjection",
    "prmanSamplefilter",
    "prmanCoshaders.coshader",
];

/// Node types translated without any special handling
const PLAIN_TYPES: &[&str] = &[
    "aaOceanPrmanShader",
    "PxrAdjustNormal",
    "PxrAovLight",
    "PxrAttribute",
    "PxrBackgroundDisplayFilter",
    "PxrBackgroundSampleFilter",
    "PxrBakePointCloud",
    "PxrBakeTexture",
    "PxrBarnLightFilter",
    "PxrBlack",
    "PxrBlackBody",
    "PxrBlend",
    "PxrBlockerLightFilter",
    "PxrBump",
    "PxrBumpManifold2D",
    "PxrCamera",
    "PxrChecker",
    "PxrClamp",
    "PxrColorCorrect",
    "PxrCombinerLightFilter",
    "PxrConstant",
    "PxrCookieLightFilter",
    "PxrCopyAOVDisplayFilter",
    "PxrCopyAOVSampleFilter",
    "PxrCross",
    "PxrCryptomatte",
    "PxrCurvature",
    "PxrDebugShadingContext",
    "PxrDefault",
    "PxrDiffuse",
    "PxrDirectLighting",
    "PxrDirt",
    "PxrDiskLight",
    "PxrDisney",
    "PxrDispScalarLayer",
    "PxrDispTransform",
    "PxrDispVectorLayer",
    "PxrDisplayFilterCombiner",
    "PxrDistantLight",
    "PxrDomeLight",
    "PxrDot",
    "PxrEdgeDetect",
    "PxrEnvDayLight",
    "PxrExposure",
    "PxrFacingRatio",
    "PxrFilmicTonemapperDisplayFilter",
    "PxrFilmicTonemapperSampleFilter",
    "PxrFlakes",
    "PxrFractal",
    "PxrFractalize",
    "PxrGamma",
    "PxrGeometricAOVs",
    "PxrGlass",
    "PxrGoboLightFilter",
    "PxrGradeDisplayFilter",
    "PxrGradeSampleFilter",
    "PxrHSL",
    "PxrHair",
    "PxrHairColor",
    "PxrHalfBufferErrorFilter",
    "PxrImageDisplayFilter",
    "PxrImagePlaneFilter",
    "PxrIntMultLightFilter",
    "PxrInvert",
    "PxrLMDiffuse",
    "PxrLMGlass",
    "PxrLMLayer",
    "PxrLMMetal",
    "PxrLMMixer",
    "PxrLMPlastic",
    "PxrLMSubsurface",
    "PxrLayerMixer",
    "PxrLayeredBlend",
    "PxrLightEmission",
    "PxrLightProbe",
    "PxrLightSaturation",
    "PxrManifold3D",
    "PxrManifold3DN",
    "PxrMarschnerHair",
    "PxrMatteID",
    "PxrMeshLight",
    "PxrMix",
    "PxrNormalMap",
    "PxrOcclusion",
    "PxrPathTracer",
    "PxrPortalLight",
    "PxrProjectionLayer",
    "PxrProjectionStack",
    "PxrProjector",
    "PxrRampLightFilter",
    "PxrRandomTextureManifold",
    "PxrRectLight",
    "PxrRemap",
    "PxrRodLightFilter",
    "PxrRollingShutter",
    "PxrRoundCube",
    "PxrSeExpr",
    "PxrShadedSide",
    "PxrShadowDisplayFilter",
    "PxrShadowFilter",
    "PxrSkin",
    "PxrSphereLight",
    "PxrTangentField",
    "PxrTee",
    "PxrThinFilm",
    "PxrThreshold",
    "PxrTileManifold",
    "PxrToFloat",
    "PxrToFloat3",
    "PxrVariable",
    "PxrVary",
    "PxrVolume",
    "PxrVoronoise",
    "PxrWhitePointDisplayFilter",
    "PxrWhitePointSampleFilter",
    "PxrWorley",
];

/// Shading engine fusion for RenderMan materials
pub const NETWORK_MATERIAL: NetworkMaterial = NetworkMaterial {
    surface_sources: &["surfaceShader", "volumeShader"],
    surface_port: "prmanBxdf",
    displacement_port: "prmanDisplacement",
    bump_port: None,
    passthrough_types: &[],
};

/// Attribute layout of a `PxrRamp`
///
/// Older plugin versions store knots as `colorRamp[i].colorRamp_Position`
/// and `colorRamp[i].colorRamp_Color` instead of `positions[i]` and
/// `colors[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RampLayout {
    Split,
    Legacy,
}

impl RampLayout {
    fn detect(node: &NodeRecord) -> Self {
        let legacy = node
            .attributes
            .keys()
            .chain(node.connections.keys())
            .any(|key| indexed(key, "colorRamp").is_some());
        if legacy {
            Self::Legacy
        } else {
            Self::Split
        }
    }

    fn indices(self, node: &NodeRecord) -> Vec<usize> {
        match self {
            Self::Split => multi_indices(node.attributes.keys(), "positions", ""),
            Self::Legacy => multi_indices(node.attributes.keys(), "colorRamp", ".colorRamp_Position"),
        }
    }

    fn position_key(self, index: usize) -> String {
        match self {
            Self::Split => format!("positions[{index}]"),
            Self::Legacy => format!("colorRamp[{index}].colorRamp_Position"),
        }
    }

    fn color_key(self, index: usize) -> String {
        match self {
            Self::Split => format!("colors[{index}]"),
            Self::Legacy => format!("colorRamp[{index}].colorRamp_Color"),
        }
    }

    /// Knot index of a color connection port
    fn color_index(self, port: &str) -> Option<usize> {
        let (index, tail) = match self {
            Self::Split => (indexed(port, "colors")?, ""),
            Self::Legacy => (indexed(port, "colorRamp")?, ".colorRamp_Color"),
        };
        (index.1 == tail).then_some(index.0)
    }
}

/// Moves displacement subtrees to the right
#[derive(Debug, Clone, Copy)]
pub struct Displace;

impl NodeTransform for Displace {
    fn preprocess(&self, mut node: NodeRecord, _ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        node.weight = 20;
        Ok(node.into_set())
    }
}

/// Gathers indexed `utilityPattern[i]` inputs into the single Katana port
#[derive(Debug, Clone, Copy)]
pub struct UtilityPattern;

impl NodeTransform for UtilityPattern {
    fn preprocess(&self, mut node: NodeRecord, ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        let patterns: BTreeMap<usize, String> = node
            .connections
            .keys()
            .filter_map(|port| match indexed(port, "utilityPattern") {
                Some((index, "")) => Some((index, port.clone())),
                _ => None,
            })
            .collect();

        match patterns.len() {
            0 => Ok(node.into_set()),
            1 => {
                if let Some(port) = patterns.values().next() {
                    node.rename_connection(port, "utilityPattern");
                }
                Ok(node.into_set())
            }
            _ => {
                let connector_name = ctx.names.unique(&format!("{}Connector", node.name));
                let mut connector = NodeRecord::new(&connector_name, ARRAY_CONNECTOR);
                for (index, port) in &patterns {
                    if let Some(endpoint) = node.connections.shift_remove(port) {
                        connector = connector.with_connection(format!("i{index}"), endpoint);
                    }
                }
                node.connections.insert(
                    "utilityPattern".to_string(),
                    Endpoint::new(&connector_name).with_port("out"),
                );
                tracing::debug!("Connecting {} utility patterns of {}", patterns.len(), node.name);

                let mut set = node.into_set();
                set.insert(connector_name, connector);
                Ok(set)
            }
        }
    }
}

/// Feeds textured ramp knots through an array connector
///
/// Katana ramps take either all colors or all connections, so plain color
/// knots get a `PxrHSL` node holding the color.
#[derive(Debug, Clone, Copy)]
pub struct RampConnector;

impl NodeTransform for RampConnector {
    fn preprocess(&self, mut node: NodeRecord, ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        let layout = RampLayout::detect(&node);
        let mut colors: BTreeMap<usize, String> = BTreeMap::new();
        for (port, endpoint) in node.connections.iter_mut() {
            if let Some(index) = layout.color_index(port) {
                endpoint.weight = Some(index as i64);
                colors.insert(index, port.clone());
            }
        }
        node.attributes.insert("useNewRamp".to_string(), AttrValue::Int(0));
        if colors.is_empty() {
            return Ok(node.into_set());
        }

        let connector_name = ctx.names.unique(&format!("{}Connector", node.name));
        let mut connector = NodeRecord::new(&connector_name, ARRAY_CONNECTOR);
        let mut knots = Vec::new();
        for index in layout.indices(&node) {
            let connected = colors.get(&index).and_then(|port| node.connections.shift_remove(port));
            let endpoint = match connected {
                Some(endpoint) => endpoint,
                None => {
                    let hsl_name = ctx.names.unique(&format!("{}HSL{index}", node.name));
                    let color = node
                        .attr(&layout.color_key(index))
                        .unwrap_or_else(|| AttrValue::rgb(0.0, 0.0, 0.0));
                    knots.push(
                        NodeRecord::new(&hsl_name, "PxrHSL")
                            .with_attr("inputRGB", color)
                            .with_weight(index as i64),
                    );
                    Endpoint::new(hsl_name).with_port("resultRGB")
                }
            };
            connector = connector.with_connection(format!("i{index}"), endpoint);
        }
        node.connections
            .insert("colors".to_string(), Endpoint::new(&connector_name).with_port("out"));

        let mut set = node.into_set();
        for knot in knots {
            set.insert(knot.name.clone(), knot);
        }
        set.insert(connector_name, connector);
        Ok(set)
    }
}

fn prune_material_ports(document: &mut ParameterDocument, node: &mut NodeRecord) -> Result<(), MappingError> {
    remove_unconnected_ports(document, node, &MATERIAL_PORTS);
    Ok(())
}

/// Fill the ramp's position and color arrays, sorted by position
fn process_ramp(document: &mut ParameterDocument, node: &mut NodeRecord) -> Result<(), MappingError> {
    let layout = RampLayout::detect(node);
    let mut knots: Vec<(f64, AttrValue)> = layout
        .indices(node)
        .into_iter()
        .map(|index| {
            let position = node
                .attr(&layout.position_key(index))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let color = node
                .attr(&layout.color_key(index))
                .unwrap_or_else(|| AttrValue::rgb(0.0, 0.0, 0.0));
            (position, color)
        })
        .collect();
    knots.sort_by(|a, b| a.0.total_cmp(&b.0));

    let positions: Vec<AttrValue> = knots.iter().map(|(p, _)| AttrValue::Float(*p)).collect();
    let colors: Vec<AttrValue> = knots.into_iter().map(|(_, c)| c).collect();
    write_knot_array(document, "positions", &positions);
    write_knot_array(document, "colors", &colors);
    Ok(())
}

/// Declare one input port per connector element
fn process_array_connector(document: &mut ParameterDocument, node: &mut NodeRecord) -> Result<(), MappingError> {
    let mut ports: Vec<String> = node.connections.keys().cloned().collect();
    ports.sort_by_key(|port| (port.strip_prefix('i').and_then(|i| i.parse::<usize>().ok()), port.clone()));
    for port in &ports {
        document.add_input(port);
    }
    Ok(())
}

/// Texture paths point at the `.tex` conversions
pub fn replace_tex(_key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    value.map(|v| match v.as_str() {
        Some(path) => AttrValue::Str(swap_extension(path, "tex")),
        None => v,
    })
}

/// Katana expects the UV set name instead of Maya's default primvars
pub fn override_manifold_2d_params(key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    match (key, value.as_ref().and_then(AttrValue::as_str)) {
        ("primvarS", Some("u_uvSet")) => Some(AttrValue::from("map2")),
        ("primvarT", Some("v_uvSet")) => Some(AttrValue::from("")),
        _ => value,
    }
}

/// Maya exposes the color set primvar as `Cs`
pub fn override_primvar_cs(_key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    match value.as_ref().and_then(AttrValue::as_str) {
        Some("Cs") => Some(AttrValue::from("colorSet")),
        _ => value,
    }
}

fn surface() -> MappingSchema {
    let (r, g, b) = SURFACE_COLOR;
    MappingSchema::new().passthrough().color(r, g, b)
}

fn texture() -> MappingSchema {
    let (r, g, b) = TEXTURE_COLOR;
    MappingSchema::new().passthrough().color(r, g, b)
}

/// Create the RenderMan backend
pub fn create_prman_backend() -> Backend {
    let mut backend = Backend::new("prman");
    backend.network_port(&["surfaceShader"]);
    backend.network_port(&["volumeShader"]);
    backend.network_port(&["displacementShader"]);

    // ========================================================================
    // Premap
    // ========================================================================

    backend.register(
        "shadingEngine",
        PremapEntry::retype("networkMaterial")
            .with_transform(NETWORK_MATERIAL)
            .with_postprocess(),
    );
    backend.register("PxrDisplace", PremapEntry::keep().with_transform(Displace));
    backend.register("PxrSurface", PremapEntry::keep().with_transform(UtilityPattern));
    backend.register("PxrLayerSurface", PremapEntry::keep().with_transform(UtilityPattern));
    backend.register("PxrRamp", PremapEntry::keep().with_transform(RampConnector));
    for source_type in PLAIN_TYPES
        .iter()
        .chain(&["PxrLayer", "PxrTexture", "PxrPtexture", "PxrLayeredTexture", "PxrMultiTexture"])
        .chain(&["PxrManifold2D", "PxrPrimvar"])
    {
        backend.register(source_type, PremapEntry::keep());
    }

    // ========================================================================
    // Mappings
    // ========================================================================

    let (r, g, b) = (0.4, 0.35, 0.2);
    backend.map(
        "networkMaterial",
        MappingSchema::new().process(prune_material_ports).color(r, g, b),
    );
    backend.map("PxrDisplace", MappingSchema::new().passthrough());
    for target_type in PLAIN_TYPES {
        backend.map(target_type, MappingSchema::new().passthrough());
    }

    for target_type in ["PxrSurface", "PxrLayer", "PxrLayerSurface"] {
        backend.map(target_type, surface());
    }
    backend.map("PxrPtexture", texture());
    backend.map("PxrTexture", texture().rule("filename", MapRule::Transform(replace_tex)));
    backend.map("PxrLayeredTexture", texture().rule("filename", MapRule::Transform(replace_tex)));
    backend.map(
        "PxrMultiTexture",
        (0..10).fold(texture(), |schema, i| {
            schema.rule(&format!("filename{i}"), MapRule::Transform(replace_tex))
        }),
    );
    backend.map(
        "PxrManifold2D",
        MappingSchema::new()
            .passthrough()
            .rule("primvarS", MapRule::Transform(override_manifold_2d_params))
            .rule("primvarT", MapRule::Transform(override_manifold_2d_params)),
    );
    backend.map(
        "PxrPrimvar",
        MappingSchema::new()
            .passthrough()
            .rule("varname", MapRule::Transform(override_primvar_cs)),
    );

    backend.map(
        "PxrRamp",
        MappingSchema::from_rules(identity([
            "rampType",
            "useNewRamp",
            "tile",
            "reverse",
            "basis",
            "splineMap",
            "randomSource",
            "randomSeed",
            "manifold",
        ]))
        .process(process_ramp),
    );
    backend.map(ARRAY_CONNECTOR, MappingSchema::new().process(process_array_connector));

    backend
}
