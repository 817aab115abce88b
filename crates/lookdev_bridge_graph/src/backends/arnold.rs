// SPDX-License-Identifier: MIT OR Apache-2.0
//! Arnold backend: premap, node transforms and mapping schemas.

use super::{indexed, multi_indices, remove_unconnected_ports, swap_extension, write_knot_array, NetworkMaterial};
use crate::document::ParameterDocument;
use crate::mapping::{identity, rules, MapRule, MapRule::Identity, MappingError, MappingSchema, Rules};
use crate::node::{Endpoint, NodeRecord, NodeSet, Renaming};
use crate::pipeline::{Backend, HookContext, NodeTransform, PremapEntry, TransformError};
use crate::value::AttrValue;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};

const SURFACE_COLOR: (f64, f64, f64) = (0.2, 0.36, 0.1);
const TEXTURE_COLOR: (f64, f64, f64) = (0.36, 0.25, 0.38);
const MATERIAL_COLOR: (f64, f64, f64) = (0.4, 0.35, 0.2);

const MATERIAL_PORTS: [&str; 3] = ["arnoldSurface", "arnoldBump", "arnoldDisplacement"];

const KNOT_LIST: &str = "colorEntryList";

/// Remap controls shared by the alShaders utility nodes
const REMAP_CONTROLS: [&str; 12] = [
    "RMPinputMin",
    "RMPinputMax",
    "RMPcontrast",
    "RMPcontrastPivot",
    "RMPbias",
    "RMPgain",
    "RMPoutputMin",
    "RMPoutputMax",
    "RMPclampEnable",
    "RMPthreshold",
    "RMPclampMin",
    "RMPclampMax",
];

const COMBINE_OPS: [&str; 8] = [
    "multiply 1*2",
    "add 1+2",
    "divide 1/2",
    "subtract 1-2",
    "lerp(1, 2, 3)",
    "dot(1, 2)",
    "distance(1 -> 2)",
    "cross(1, 2)",
];

const LAYER_COUNT: usize = 8;

const BLEND_MODES: [&str; 25] = [
    "Normal",
    "Lighten",
    "Darken",
    "Multiply",
    "Average",
    "Add",
    "Subtract",
    "Difference",
    "Negation",
    "Exclusion",
    "Screen",
    "Overlay",
    "Soft Light",
    "Hard Light",
    "Color Dodge",
    "Color Burn",
    "Linear Dodge",
    "Linear Burn",
    "Linear Light",
    "Vivid Light",
    "Pin Light",
    "Hard Mix",
    "Reflect",
    "Glow",
    "Phoenix",
];

/// Shading engine fusion for Arnold materials
pub const NETWORK_MATERIAL: NetworkMaterial = NetworkMaterial {
    surface_sources: &["aiSurfaceShader", "surfaceShader", "aiVolumeShader", "volumeShader"],
    surface_port: "arnoldSurface",
    displacement_port: "arnoldDisplacement",
    bump_port: Some("arnoldBump"),
    passthrough_types: &["aov_write_rgb", "aov_write_float"],
};

/// Splits a ramp whose knots are driven by textures into a mix node
#[derive(Debug, Clone, Copy)]
pub struct RampSplit;

impl NodeTransform for RampSplit {
    fn preprocess(&self, mut node: NodeRecord, ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        let connected: BTreeMap<usize, Endpoint> = node
            .connections
            .iter()
            .filter_map(|(port, endpoint)| indexed(port, KNOT_LIST).map(|(i, _)| (i, endpoint.clone())))
            .collect();
        let knots = multi_indices(node.attributes.keys(), KNOT_LIST, ".position");

        let mut set = NodeSet::new();
        if knots.len() < 2 && !connected.is_empty() {
            // A single texture knot is the ramp's only output
            if knots.len() == 1 {
                if let Some(source) = connected.values().next() {
                    let empty = ctx.names.unique("Empty");
                    let renamings = IndexMap::from([(node.name.clone(), Renaming::to(&source.node))]);
                    set.insert(empty.clone(), NodeRecord::placeholder(empty, renamings));
                }
            }
            tracing::debug!("Dropping ramp {} with a single connected knot", node.name);
            return Ok(set);
        }

        if (1..=2).contains(&connected.len()) {
            let mix_name = ctx.names.unique(&format!("{}Mix", node.name));
            let mut mix = NodeRecord::new(&mix_name, "mix")
                .with_connection("mix", Endpoint::new(&node.name))
                .with_renaming(&node.name, Renaming::to(&mix_name));
            for (input, index) in ["input1", "input2"].into_iter().zip(&knots) {
                if let Some(endpoint) = connected.get(index) {
                    mix = mix.with_connection(input, endpoint.clone());
                } else if let Some(color) = node.attr(&format!("{KNOT_LIST}[{index}].color")) {
                    mix = mix.with_attr(input, color);
                }
            }
            node.node_type = "rampFloat".to_string();
            set.insert(mix_name, mix);
        }

        set.insert(node.name.clone(), node);
        Ok(set)
    }
}

/// Moves bump nodes to the right and turns tangent-space bumps into normal maps
#[derive(Debug, Clone, Copy)]
pub struct Bump;

impl NodeTransform for Bump {
    fn preprocess(&self, mut node: NodeRecord, _ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        node.weight = 10;
        // 0: bump, 1: tangent, 2: object
        if node.attr("bumpInterp").and_then(|v| v.as_i64()) == Some(1) {
            node.node_type = "spaceTransform".to_string();
            for (key, value) in [
                ("type", 2),
                ("invert_x", 0),
                ("invert_y", 0),
                ("invert_z", 0),
                ("from", 4),
                ("to", 0),
                ("color_to_signed", 1),
                ("set_normal", 1),
            ] {
                node.attributes.insert(key.to_string(), AttrValue::Int(value));
            }
        }
        Ok(node.into_set())
    }
}

/// Replaces a displacement shader by a range node fed from its input
#[derive(Debug, Clone, Copy)]
pub struct Displacement;

impl NodeTransform for Displacement {
    fn preprocess(&self, mut node: NodeRecord, _ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        node.weight = 20;
        node.node_type = "range".to_string();
        let source = node.connections.shift_remove("displacement");
        node.connections.clear();
        if let Some(source) = source {
            node.connections.insert("input".to_string(), source);
        }
        Ok(node.into_set())
    }
}

/// Replaces sampler info by the utility nodes its used outputs stand for
#[derive(Debug, Clone, Copy)]
pub struct SamplerInfo;

impl NodeTransform for SamplerInfo {
    fn preprocess(&self, node: NodeRecord, ctx: &mut HookContext<'_>) -> Result<NodeSet, TransformError> {
        let mut set = NodeSet::new();
        let mut seen = HashSet::new();
        for plug in ctx.scene.connections_out_of(&node.name) {
            if !seen.insert(plug.port.clone()) {
                continue;
            }
            let utility = match plug.port.as_str() {
                "facingRatio" => NodeRecord::new(ctx.names.unique("facingRatio"), "facingRatio"),
                "flippedNormal" => NodeRecord::new(ctx.names.unique("flippedNormal"), "two_sided")
                    .with_attr("front", AttrValue::List(vec![AttrValue::floats(&[1.0, 1.0, 1.0, 1.0])]))
                    .with_attr("back", AttrValue::List(vec![AttrValue::floats(&[0.0, 0.0, 0.0, 1.0])])),
                other => {
                    tracing::debug!("Unsupported sampler output {}.{}", node.name, other);
                    continue;
                }
            };
            let renaming = Renaming::to(&utility.name);
            set.insert(utility.name.clone(), utility.with_renaming(&node.name, renaming));
        }
        Ok(set)
    }
}

fn prune_material_ports(document: &mut ParameterDocument, node: &mut NodeRecord) -> Result<(), MappingError> {
    remove_unconnected_ports(document, node, &MATERIAL_PORTS);
    Ok(())
}

/// Fill ramp knot arrays and the ramp direction
fn process_ramp(document: &mut ParameterDocument, node: &mut NodeRecord) -> Result<(), MappingError> {
    let missing = |key: &str| MappingError::MissingAttribute {
        node: node.name.clone(),
        key: key.to_string(),
    };
    let ramp_type = node.attr("type").and_then(|v| v.as_i64()).ok_or_else(|| missing("type"))?;
    let interpolation = node.attr("interpolation").ok_or_else(|| missing("interpolation"))?;

    let (mut direction, coordinate) = match ramp_type {
        0 => ("v", Some("vCoord")),
        1 => ("u", Some("uCoord")),
        2 => ("diagonal", None),
        3 => ("radial", None),
        4 => ("circular", None),
        _ => {
            tracing::warn!("Can't translate ramp type {} of {}", ramp_type, node.name);
            ("custom", None)
        }
    };
    let mut input = None;
    if let Some(coordinate) = coordinate {
        input = Some(node.attr(coordinate).unwrap_or(AttrValue::Float(0.0)));
        if let Some(endpoint) = node.connections.shift_remove(coordinate) {
            direction = "custom";
            node.connections.insert("input".to_string(), endpoint);
        }
    }

    let value_key = if node.node_type == "ramp" { "color" } else { "value" };
    let interpolation = AttrValue::Int(if interpolation.is_zero() { 0 } else { 2 });

    let indices = multi_indices(node.attributes.keys(), KNOT_LIST, ".position");
    let textured = indices
        .iter()
        .any(|i| node.has_connection(&format!("{KNOT_LIST}[{i}].color")));
    let mut knots: Vec<(f64, AttrValue)> = indices
        .iter()
        .enumerate()
        .map(|(n, i)| {
            let position = node
                .attr(&format!("{KNOT_LIST}[{i}].position"))
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let value = if textured {
                AttrValue::Int(n as i64)
            } else {
                node.attr(&format!("{KNOT_LIST}[{i}].color"))
                    .unwrap_or(AttrValue::Float(0.0))
            };
            (position, value)
        })
        .collect();
    knots.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (key, value) in [("input", input), ("type", Some(AttrValue::from(direction)))] {
        let Some(value) = value else {
            continue;
        };
        if node.has_connection(key) {
            continue;
        }
        if let Some(slot) = document.param_mut(key) {
            if let Err(e) = slot.set(value) {
                tracing::warn!("Skipping ramp {} of {}: {}", key, node.name, e);
            }
        }
    }

    let positions: Vec<AttrValue> = knots.iter().map(|(p, _)| AttrValue::Float(*p)).collect();
    let values: Vec<AttrValue> = knots.iter().map(|(_, v)| v.clone()).collect();
    write_knot_array(document, "position", &positions);
    write_knot_array(document, value_key, &values);
    write_knot_array(document, "interpolation", &vec![interpolation; knots.len()]);
    Ok(())
}

/// Texture paths point at the `.tx` conversions
pub fn replace_tx(_key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    value.map(|v| match v.as_str() {
        Some(path) => AttrValue::Str(swap_extension(path, "tx")),
        None => v,
    })
}

/// RGB clamp limits collapse to a single float
pub fn override_clamp_params(key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    let value = value?;
    let Some(items) = value.as_sequence() else {
        return Some(value);
    };
    let floats = items.iter().filter_map(AttrValue::as_f64);
    let limit = match key {
        "min" => floats.reduce(f64::min),
        "max" => floats.reduce(f64::max),
        _ => return Some(value),
    };
    limit.map(AttrValue::Float)
}

/// Fixed hair settings
pub fn override_hair_params(key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    match key {
        "dualDepth" | "diffuseIndirectStrength" => Some(AttrValue::Int(1)),
        "extraSamplesDiffuse" | "extraSamplesGlossy" => Some(AttrValue::Int(2)),
        _ => value,
    }
}

/// Fixed specular settings
pub fn override_material_params(key: &str, value: Option<AttrValue>) -> Option<AttrValue> {
    match key {
        "specular1IndirectClamp" | "specular2IndirectClamp" => Some(AttrValue::Int(1)),
        "specular1Distribution" | "specular2Distribution" => Some(AttrValue::from("ggx")),
        _ => value,
    }
}

fn colored(schema: MappingSchema, (r, g, b): (f64, f64, f64)) -> MappingSchema {
    schema.color(r, g, b)
}

fn concat<const N: usize>(parts: [Rules; N]) -> Rules {
    parts.into_iter().flatten().collect()
}

/// Eight `layer<n>` / `layer<n>a` pairs, with a blend mode per layer for colours
fn layer_stack(blend_modes: Option<&[&str]>) -> MappingSchema {
    (1..=LAYER_COUNT).fold(MappingSchema::new(), |schema, i| {
        let schema = schema
            .rule(&format!("layer{i}"), Identity)
            .rule(&format!("layer{i}a"), Identity);
        match blend_modes {
            Some(modes) => schema.rule(&format!("layer{i}blend"), MapRule::labels(modes)),
            None => schema,
        }
    })
}

/// Create the Arnold backend
pub fn create_arnold_backend() -> Backend {
    let mut backend = Backend::new("arnold");
    backend.network_port(&["aiSurfaceShader", "surfaceShader"]);
    backend.network_port(&["aiVolumeShader", "volumeShader"]);
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
    backend.register("displacementShader", PremapEntry::keep().with_transform(Displacement));
    backend.register("ramp", PremapEntry::keep().with_transform(RampSplit));
    backend.register("bump2d", PremapEntry::keep().with_transform(Bump));
    backend.register("samplerInfo", PremapEntry::keep().with_transform(SamplerInfo));

    for source_type in [
        "alSurface",
        "alLayer",
        "alHair",
        "luminance",
        "clamp",
        "alInputScalar",
        "alInputVector",
        "alCombineColor",
        "alCombineFloat",
        "alCurvature",
        "alJitterColor",
        "alLayerColor",
        "alLayerFloat",
        "alSwitchColor",
        "alSwitchFloat",
        "alTriplanar",
        "alRemapColor",
        "alRemapFloat",
        "alCellNoise",
        "alFlake",
        "alFlowNoise",
        "alFractal",
    ] {
        backend.register(source_type, PremapEntry::keep());
    }
    for (source_type, target_type) in [
        ("aiStandard", "standard"),
        ("aiVolumeCollector", "volume_collector"),
        ("aiVolumeSampleFloat", "volume_sample_float"),
        ("aiVolumeSampleRgb", "volume_sample_rgb"),
        ("aiImage", "image"),
        ("aiAmbientOcclusion", "ambientOcclusion"),
        ("aiNoise", "noise"),
        ("aiUserDataFloat", "user_data_float"),
        ("aiUserDataColor", "user_data_rgb"),
        ("aiWriteFloat", "aov_write_float"),
        ("aiWriteColor", "aov_write_rgb"),
        ("blendColors", "mix"),
    ] {
        backend.register(source_type, PremapEntry::retype(target_type));
    }

    // ========================================================================
    // Surfaces
    // ========================================================================

    backend.map(
        "alSurface",
        colored(
            MappingSchema::from_rules(rules([
                (
                    "diffuseStrength",
                    MapRule::group([
                        ("diffuseColor", Identity),
                        ("diffuseRoughness", Identity),
                        (
                            "backlightStrength",
                            MapRule::group([("backlightColor", Identity), ("backlightIndirectStrength", Identity)]),
                        ),
                        (
                            "sssMix",
                            MapRule::group([
                                ("sssMode", MapRule::labels(&["cubic", "diffusion", "directional", "empirical"])),
                                ("sssDensityScale", Identity),
                                ("sssWeight1", MapRule::group([("sssRadius", Identity), ("sssRadiusColor", Identity)])),
                                ("sssWeight2", MapRule::group([("sssRadius2", Identity), ("sssRadiusColor2", Identity)])),
                                ("sssWeight3", MapRule::group([("sssRadius3", Identity), ("sssRadiusColor3", Identity)])),
                                ("sssTraceSet", Identity),
                            ]),
                        ),
                        ("diffuseExtraSamples", Identity),
                        ("sssExtraSamples", Identity),
                        ("diffuseIndirectStrength", Identity),
                        ("diffuseIndirectClamp", Identity),
                        ("diffuseNormal", Identity),
                        ("traceSetDiffuse", Identity),
                        ("traceSetBacklight", Identity),
                    ]),
                ),
                ("specular1Strength", specular_lobe("specular1")),
                ("specular2Strength", specular_lobe("specular2")),
                (
                    "transmissionStrength",
                    MapRule::Group(identity([
                        "transmissionColor",
                        "transmissionLinkToSpecular1",
                        "transmissionRoughness",
                        "transmissionIor",
                        "ssAttenuationColor",
                        "ssScattering",
                        "ssDensityScale",
                        "ssDirection",
                        "transmissionRoughnessDepthScale",
                        "transmissionExtraSamples",
                        "transmissionEnableCaustics",
                        "rrTransmissionDepth",
                        "transmissionClamp",
                        "ssSpecifyCoefficients",
                        "ssAbsorption",
                        "traceSetTransmission",
                        "transmissionDoDirect",
                        "transmissionNormal",
                        "transmissionCausticPaths",
                    ])),
                ),
                ("emissionStrength", MapRule::group([("emissionColor", Identity)])),
                ("opacity", Identity),
            ])),
            SURFACE_COLOR,
        ),
    );

    backend.map(
        "standard",
        colored(
            MappingSchema::from_rules(rules([
                (
                    "Kd",
                    MapRule::group([
                        ("color", MapRule::rename("Kd_color")),
                        ("diffuseRoughness", MapRule::rename("diffuse_roughness")),
                        ("Kb", Identity),
                        ("directDiffuse", MapRule::rename("direct_diffuse")),
                        ("indirectDiffuse", MapRule::rename("indirect_diffuse")),
                    ]),
                ),
                (
                    "Ks",
                    MapRule::group([
                        ("KsColor", MapRule::rename("Ks_color")),
                        ("specularRoughness", MapRule::rename("specular_roughness")),
                        ("specularAnisotropy", MapRule::rename("specular_anisotropy")),
                        (
                            "specularDistribution",
                            MapRule::rename_labels("specular_distribution", &["beckmann", "ggx"]),
                        ),
                        ("specularRotation", MapRule::rename("specular_rotation")),
                        ("directSpecular", MapRule::rename("direct_specular")),
                        ("indirectSpecular", MapRule::rename("indirect_specular")),
                        ("enableGlossyCaustics", MapRule::rename("enable_glossy_caustics")),
                    ]),
                ),
                (
                    "Kr",
                    MapRule::group([
                        ("KrColor", MapRule::rename("Kr_color")),
                        ("reflectionExitColor", MapRule::rename("reflection_exit_color")),
                        ("reflectionExitUseEnvironment", MapRule::rename("reflection_exit_use_environment")),
                        ("enableReflectiveCaustics", MapRule::rename("enable_reflective_caustics")),
                    ]),
                ),
                (
                    "Kt",
                    MapRule::group([
                        ("KtColor", MapRule::rename("Kt_color")),
                        ("transmittance", Identity),
                        ("refractionRoughness", MapRule::rename("refraction_roughness")),
                        ("refractionExitColor", MapRule::rename("refraction_exit_color")),
                        ("refractionExitUseEnvironment", MapRule::rename("refraction_exit_use_environment")),
                        ("IOR", Identity),
                        ("dispersionAbbe", MapRule::rename("dispersion_abbe")),
                        ("enableRefractiveCaustics", MapRule::rename("enable_refractive_caustics")),
                        ("enableInternalReflections", MapRule::rename("enable_internal_reflections")),
                    ]),
                ),
                (
                    "Fresnel",
                    MapRule::group([
                        ("Krn", Identity),
                        ("specularFresnel", MapRule::rename("specular_Fresnel")),
                        ("Ksn", Identity),
                        ("FresnelUseIOR", MapRule::rename("Fresnel_use_IOR")),
                        ("FresnelAffectDiff", MapRule::rename("Fresnel_affect_diff")),
                    ]),
                ),
                ("emission", MapRule::group([("emissionColor", MapRule::rename("emission_color"))])),
                (
                    "Ksss",
                    MapRule::group([
                        ("KsssColor", MapRule::rename("Ksss_color")),
                        ("sssProfile", MapRule::rename_labels("sss_profile", &["empirical", "cubic"])),
                        ("sssRadius", MapRule::rename("sss_radius")),
                    ]),
                ),
                ("bounceFactor", MapRule::rename("bounce_factor")),
                ("opacity", Identity),
            ])),
            SURFACE_COLOR,
        ),
    );

    backend.map(
        "alLayer",
        MappingSchema::from_rules(rules([
            ("layer1", Identity),
            ("layer2", Identity),
            ("mix", Identity),
            ("debug", MapRule::labels(&["off", "layer1", "layer2", "mixer"])),
        ]))
        .color(0.2, 0.56, 0.1),
    );

    backend.map(
        "alHair",
        colored(
            MappingSchema::from_rules(rules([
                ("melanin", Identity),
                ("dyeColor", Identity),
                ("specularWidth", Identity),
                ("specularShift", Identity),
                ("opacity", Identity),
                ("randomTangent", Identity),
                ("randomMelanin", Identity),
                ("randomHue", Identity),
                ("randomSaturation", Identity),
                ("glintRolloff", Identity),
                ("transmissionRolloff", Identity),
                (
                    "diffuseStrength",
                    MapRule::group([
                        ("diffuseColor", Identity),
                        ("diffuseScatteringMode", MapRule::labels(&["kajiya-kay", "dual-scattering"])),
                        ("diffuseForward", Identity),
                        ("diffuseBack", Identity),
                    ]),
                ),
                (
                    "specular1Strength",
                    MapRule::Group(identity(["specular1Color", "specular1WidthScale", "specular1Shift"])),
                ),
                (
                    "specular2Strength",
                    MapRule::Group(identity([
                        "specular2Color",
                        "specular2WidthScale",
                        "specular2Shift",
                        "glintStrength",
                    ])),
                ),
                (
                    "transmissionStrength",
                    MapRule::Group(identity([
                        "transmissionColor",
                        "transmissionWidthScale",
                        "transmissionShift",
                    ])),
                ),
                ("dualDepth", MapRule::Transform(override_hair_params)),
                ("diffuseIndirectStrength", MapRule::Transform(override_hair_params)),
                ("extraSamplesDiffuse", MapRule::Transform(override_hair_params)),
                ("glossyIndirectStrength", Identity),
                ("extraSamplesGlossy", MapRule::Transform(override_hair_params)),
                ("uparam", Identity),
                ("vparam", Identity),
                ("aovDepth", MapRule::rename("aov_depth")),
            ])),
            SURFACE_COLOR,
        ),
    );

    backend.map(
        "networkMaterial",
        colored(MappingSchema::new().process(prune_material_ports), MATERIAL_COLOR),
    );

    // ========================================================================
    // Textures
    // ========================================================================

    let wrap_modes: &[&str] = &["periodic", "black", "clamp", "mirror", "file"];
    backend.map(
        "image",
        colored(
            MappingSchema::from_rules(rules([
                ("filename", MapRule::Transform(replace_tx)),
                ("filter", MapRule::labels(&["closest", "bilinear", "bicubic", "smart_bicubic"])),
                ("mipmapBias", MapRule::rename("mipmap_bias")),
                (
                    "ignoreMissingTiles",
                    MapRule::rename_group(
                        "ignore_missing_tiles",
                        [("missingTileColor", MapRule::rename("missing_tile_color"))],
                    ),
                ),
                ("multiply", Identity),
                ("offset", Identity),
                ("uvset", Identity),
                ("uvcoords", Identity),
                ("soffset", Identity),
                ("toffset", Identity),
                ("swrap", MapRule::labels(wrap_modes)),
                ("twrap", MapRule::labels(wrap_modes)),
                ("sscale", Identity),
                ("tscale", Identity),
                ("sflip", Identity),
                ("tflip", Identity),
                ("swapSt", MapRule::rename("swap_st")),
            ])),
            TEXTURE_COLOR,
        ),
    );

    backend.map(
        "noise",
        MappingSchema::from_rules(rules([
            ("octaves", Identity),
            ("distortion", Identity),
            ("lacunarity", Identity),
            ("amplitude", Identity),
            ("scale", Identity),
            ("offset", Identity),
            ("coordSpace", MapRule::rename_labels("coord_space", &["world", "object", "Pref"])),
        ])),
    );

    backend.map("ramp", MappingSchema::new().process(process_ramp));
    backend.map("rampFloat", MappingSchema::new().process(process_ramp));

    // ========================================================================
    // Utilities
    // ========================================================================

    backend.map(
        "clamp",
        MappingSchema::from_rules(rules([
            ("input", Identity),
            ("min", MapRule::Transform(override_clamp_params)),
            ("max", MapRule::Transform(override_clamp_params)),
        ])),
    );

    backend.map(
        "mix",
        MappingSchema::from_rules(rules([
            ("input1", Identity),
            ("input2", Identity),
            ("mix", Identity),
            // Inputs are crossed between the two applications
            ("color1", MapRule::rename("input2")),
            ("color2", MapRule::rename("input1")),
            ("blender", MapRule::rename("mix")),
        ])),
    );

    backend.map("luminance", MappingSchema::from_rules(rules([("value", MapRule::rename("input"))])));

    backend.map(
        "ambientOcclusion",
        MappingSchema::from_rules(rules([
            ("samples", Identity),
            ("spread", Identity),
            ("nearClip", MapRule::rename("near_clip")),
            ("farClip", MapRule::rename("far_clip")),
            ("falloff", Identity),
            ("black", Identity),
            ("white", Identity),
            ("opacity", Identity),
            ("invertNormals", MapRule::rename("invert_normals")),
            ("selfOnly", MapRule::rename("self_only")),
        ])),
    );

    let spaces: &[&str] = &["world", "object", "camera", "screen", "tangent"];
    backend.map(
        "spaceTransform",
        MappingSchema::from_rules(rules([
            ("bumpValue", MapRule::rename("input")),
            ("bumpDepth", MapRule::rename("scale")),
            ("type", MapRule::labels(&["point", "vector", "normal"])),
            ("order", MapRule::labels(&["XYZ", "XZY", "YXZ", "YZX", "ZXY", "ZYX"])),
            ("invert_x", Identity),
            ("invert_y", Identity),
            ("invert_z", Identity),
            ("color_to_signed", Identity),
            ("from", MapRule::labels(spaces)),
            ("to", MapRule::labels(spaces)),
            ("tangent", Identity),
            ("set_normal", Identity),
        ])),
    );

    backend.map(
        "bump2d",
        MappingSchema::from_rules(rules([
            ("bumpValue", MapRule::rename("bump_map")),
            ("bumpDepth", MapRule::rename("bump_height")),
        ])),
    );

    backend.map(
        "range",
        MappingSchema::from_rules(identity([
            "input",
            "input_min",
            "input_max",
            "output_min",
            "output_max",
            "smoothstep",
        ])),
    );

    backend.map("facingRatio", MappingSchema::new());
    backend.map("two_sided", MappingSchema::from_rules(identity(["front", "back"])));

    backend.map(
        "user_data_rgb",
        MappingSchema::from_rules(rules([
            ("colorAttrName", MapRule::rename("attribute")),
            ("defaultValue", MapRule::rename("default")),
        ])),
    );
    backend.map(
        "user_data_float",
        MappingSchema::from_rules(rules([
            ("floatAttrName", MapRule::rename("attribute")),
            ("defaultValue", MapRule::rename("default")),
        ])),
    );

    backend.map(
        "aov_write_rgb",
        MappingSchema::from_rules(rules([
            ("beauty", MapRule::rename("passthrough")),
            ("input", MapRule::rename("aov_input")),
            ("aovName", MapRule::rename("aov_name")),
            ("blend", MapRule::rename("blend_opacity")),
        ])),
    );
    backend.map(
        "aov_write_float",
        MappingSchema::from_rules(rules([
            ("beauty", MapRule::rename("passthrough")),
            ("input", MapRule::rename("aov_input")),
            ("aovName", MapRule::rename("aov_name")),
        ])),
    );

    // ========================================================================
    // alShaders utilities
    // ========================================================================

    let noise_spaces: &[&str] = &["world", "object", "Pref", "UV"];

    backend.map(
        "alCombineColor",
        MappingSchema::from_rules(rules([
            ("input1", Identity),
            ("input2", Identity),
            ("input3", Identity),
            ("combineOp", MapRule::labels(&COMBINE_OPS)),
        ])),
    );
    backend.map(
        "alCombineFloat",
        MappingSchema::from_rules(rules([
            ("input1", Identity),
            ("input2", Identity),
            ("input3", Identity),
            ("combineOp", MapRule::labels(&COMBINE_OPS[..5])),
        ])),
    );
    backend.map(
        "alInputScalar",
        MappingSchema::from_rules(concat([
            rules([
                (
                    "input",
                    MapRule::labels(&["facing-ratio", "area", "face-index", "ray-length", "ray-depth", "User"]),
                ),
                ("userName", Identity),
            ]),
            identity(REMAP_CONTROLS),
        ])),
    );
    backend.map(
        "alInputVector",
        MappingSchema::from_rules(rules([
            (
                "input",
                MapRule::labels(&[
                    "P", "Po", "N", "Nf", "Ng", "Ngf", "Ns", "dPdu", "dPdv", "Ld", "Rd", "uv", "User", "Custom",
                ]),
            ),
            ("userName", Identity),
            ("vector", Identity),
            ("type", MapRule::labels(&["Point", "Vector"])),
            ("matrix", Identity),
            (
                "coordinates",
                MapRule::labels(&["cartesian", "spherical", "normalized spherical"]),
            ),
        ])),
    );
    backend.map(
        "alCurvature",
        MappingSchema::from_rules(concat([
            rules([
                ("mode", MapRule::labels(&["positive", "negative"])),
                ("samples", Identity),
                ("sampleRadius", Identity),
                ("traceSet", Identity),
            ]),
            identity(REMAP_CONTROLS),
            identity(["color1", "color2"]),
        ])),
    );
    backend.map(
        "alJitterColor",
        MappingSchema::from_rules(identity([
            "input",
            "minSaturation",
            "maxSaturation",
            "minGain",
            "maxGain",
            "minHueOffset",
            "maxHueOffset",
            "clamp",
            "signal",
        ])),
    );
    backend.map("alLayerColor", layer_stack(Some(&BLEND_MODES[..])));
    backend.map("alLayerFloat", layer_stack(None));
    for switch in ["alSwitchColor", "alSwitchFloat"] {
        backend.map(
            switch,
            MappingSchema::from_rules(identity([
                "inputA", "inputB", "inputC", "inputD", "inputE", "inputF", "inputG", "inputH", "mix", "threshold",
            ])),
        );
    }
    backend.map(
        "alTriplanar",
        colored(
            MappingSchema::from_rules(concat([
                rules([
                    ("input", Identity),
                    ("texture", MapRule::Transform(replace_tx)),
                    ("space", MapRule::labels(&["world", "object", "Pref"])),
                    ("normal", MapRule::labels(&["geometric", "smooth", "smooth-NoBump"])),
                    ("tiling", MapRule::labels(&["regular", "cellnoise"])),
                ]),
                identity([
                    "frequency",
                    "mipMapBias",
                    "blendSoftness",
                    "cellSoftness",
                    "scalex",
                    "scaley",
                    "scalez",
                    "offsetx",
                    "offsety",
                    "offsetz",
                    "rotx",
                    "roty",
                    "rotz",
                    "rotjitterx",
                    "rotjittery",
                    "rotjitterz",
                ]),
            ])),
            TEXTURE_COLOR,
        ),
    );
    backend.map(
        "alRemapColor",
        MappingSchema::from_rules(identity([
            "input",
            "gamma",
            "saturation",
            "hueOffset",
            "contrast",
            "contrastPivot",
            "gain",
            "exposure",
            "mask",
        ])),
    );
    backend.map(
        "alRemapFloat",
        MappingSchema::from_rules(concat([identity(["input"]), identity(REMAP_CONTROLS), identity(["mask"])])),
    );
    backend.map(
        "alCellNoise",
        MappingSchema::from_rules(concat([
            rules([
                ("space", MapRule::labels(noise_spaces)),
                ("frequency", Identity),
                ("mode", MapRule::labels(&["features", "chips"])),
                ("randomness", Identity),
                ("octaves", Identity),
                ("lacunarity", Identity),
            ]),
            identity(REMAP_CONTROLS),
            identity([
                "color1",
                "color2",
                "smoothChips",
                "randomChips",
                "chipColor1",
                "chipProb1",
                "chipColor2",
                "chipProb2",
                "chipColor3",
                "chipProb3",
                "chipColor4",
                "chipProb4",
                "chipColor5",
                "chipProb5",
                "P",
            ]),
        ])),
    );
    backend.map(
        "alFlake",
        MappingSchema::from_rules(concat([
            rules([("space", MapRule::labels(&["tangent", "world"]))]),
            identity(["amount", "size", "divergence", "P"]),
        ])),
    );
    backend.map(
        "alFlowNoise",
        MappingSchema::from_rules(concat([
            rules([("space", MapRule::labels(noise_spaces))]),
            identity([
                "frequency",
                "octaves",
                "lacunarity",
                "gain",
                "angle",
                "advection",
                "turbulent",
            ]),
            identity(REMAP_CONTROLS),
            identity(["color1", "color2", "P"]),
        ])),
    );
    backend.map(
        "alFractal",
        MappingSchema::from_rules(concat([
            rules([
                ("mode", MapRule::labels(&["scalar", "vector"])),
                ("space", MapRule::labels(noise_spaces)),
            ]),
            identity([
                "scale",
                "frequency",
                "time",
                "octaves",
                "distortion",
                "lacunarity",
                "gain",
                "turbulent",
            ]),
            identity(REMAP_CONTROLS),
            identity(["color1", "color2", "P"]),
        ])),
    );

    // ========================================================================
    // Volumes
    // ========================================================================

    let interpolations: &[&str] = &["closest", "trilinear", "tricubic"];
    backend.map(
        "volume_collector",
        MappingSchema::from_rules(rules([
            ("scatteringSource", MapRule::rename_labels("scattering_source", &["parameter", "channel"])),
            ("scatteringChannel", MapRule::rename("scattering_channel")),
            ("scattering", Identity),
            ("scatteringColor", MapRule::rename("scattering_color")),
            ("scatteringIntensity", MapRule::rename("scattering_intensity")),
            ("anisotropy", Identity),
            (
                "attenuationSource",
                MapRule::rename_labels("attenuation_source", &["parameter", "channel", "scattering"]),
            ),
            ("attenuationChannel", MapRule::rename("attenuation_channel")),
            ("attenuation", Identity),
            ("attenuationColor", MapRule::rename("attenuation_color")),
            ("attenuationIntensity", MapRule::rename("attenuation_intensity")),
            ("attenuationMode", MapRule::rename_labels("attenuation_mode", &["absorption", "extinction"])),
            ("emissionSource", MapRule::rename_labels("emission_source", &["parameter", "channel"])),
            ("emissionChannel", MapRule::rename("emission_channel")),
            ("emission", Identity),
            ("emissionColor", MapRule::rename("emission_color")),
            ("emissionIntensity", MapRule::rename("emission_intensity")),
            ("positionOffset", MapRule::rename("position_offset")),
            ("interpolation", MapRule::labels(interpolations)),
        ])),
    );
    backend.map(
        "volume_sample_float",
        MappingSchema::from_rules(rules([
            ("channel", Identity),
            ("positionOffset", MapRule::rename("position_offset")),
            ("interpolation", MapRule::labels(interpolations)),
            ("inputMin", MapRule::rename("input_min")),
            ("inputMax", MapRule::rename("input_max")),
            ("contrast", Identity),
            ("contrastPivot", MapRule::rename("contrast_pivot")),
            ("bias", Identity),
            ("gain", Identity),
            ("outputMin", MapRule::rename("output_min")),
            ("outputMax", MapRule::rename("output_max")),
            ("clampMin", MapRule::rename("clamp_min")),
            ("clampMax", MapRule::rename("clamp_max")),
        ])),
    );
    backend.map(
        "volume_sample_rgb",
        MappingSchema::from_rules(rules([
            ("channel", Identity),
            ("positionOffset", MapRule::rename("position_offset")),
            ("interpolation", MapRule::labels(interpolations)),
            ("gamma", Identity),
            ("hueShift", MapRule::rename("hue_shift")),
            ("saturation", Identity),
            ("contrast", Identity),
            ("contrastPivot", MapRule::rename("contrast_pivot")),
            ("exposure", Identity),
            ("multiply", Identity),
            ("add", Identity),
        ])),
    );

    backend
}

/// Rules shared by both specular lobes of `alSurface`
fn specular_lobe(lobe: &str) -> MapRule {
    let mut children: Vec<(String, MapRule)> = [
        "Color",
        "Roughness",
        "Anisotropy",
        "Rotation",
        "Ior",
        "Reflectivity",
        "EdgeTint",
        "RoughnessDepthScale",
        "ExtraSamples",
        "Normal",
        "IndirectStrength",
        "CausticPaths",
        "InternalDirect",
    ]
    .into_iter()
    .map(|suffix| (format!("{lobe}{suffix}"), Identity))
    .collect();
    children.push((format!("{lobe}FresnelMode"), MapRule::labels(&["dielectric", "metallic"])));
    children.push((format!("{lobe}IndirectClamp"), MapRule::Transform(override_material_params)));
    children.push((format!("{lobe}Distribution"), MapRule::Transform(override_material_params)));
    children.push((format!("traceSet{}", capitalize(lobe)), Identity));
    MapRule::Group(children.into_iter().collect())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
