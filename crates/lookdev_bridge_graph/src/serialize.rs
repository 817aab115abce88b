// SPDX-License-Identifier: MIT OR Apache-2.0
//! Katana node graph XML output.
//!
//! ```text
//! <katana release=".." version="..">
//!   <node name="__SAVE_exportedNodes" type="Group">
//!     <node baseType=".." name=".." type=".." x=".." y="..">
//!       <port name=".." source="node.out" type="in"/>
//!       <group_parameter name="..">
//!         <string_parameter name="name" value=".."/>
//!         <string_parameter name="nodeType" value=".."/>
//!         <group_parameter name="parameters">
//!           <group_parameter name="..">enable / value / type</group_parameter>
//! ```

use crate::document::{ParameterDocument, ParameterSlot};
use crate::translate::Translation;
use crate::value::ParamKind;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};

/// Name of the group wrapping exported nodes
pub const EXPORT_GROUP: &str = "__SAVE_exportedNodes";

/// Configuration for XML output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmlConfig {
    /// Katana release attribute
    pub release: String,
    /// Katana version attribute
    pub version: String,
    /// Spaces per indentation level, zero for compact output
    pub indent: usize,
}

impl Default for XmlConfig {
    fn default() -> Self {
        Self {
            release: "2.5v4".to_string(),
            version: "2.5.1.000001".to_string(),
            indent: 2,
        }
    }
}

/// Render a translation as Katana XML
pub fn to_katana_xml(translation: &Translation, config: &XmlConfig) -> Result<String, SerializeError> {
    let mut writer = if config.indent > 0 {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', config.indent)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    start(
        &mut writer,
        "katana",
        &[("release", config.release.as_str()), ("version", config.version.as_str())],
    )?;
    start(&mut writer, "node", &[("name", EXPORT_GROUP), ("type", "Group")])?;
    for document in &translation.documents {
        write_node(&mut writer, document)?;
    }
    end(&mut writer, "node")?;
    end(&mut writer, "katana")?;

    let bytes = writer.into_inner().into_inner();
    tracing::debug!(
        "Serialized {} nodes into {} bytes",
        translation.documents.len(),
        bytes.len()
    );
    Ok(String::from_utf8(bytes)?)
}

fn write_node<W: Write>(writer: &mut Writer<W>, document: &ParameterDocument) -> Result<(), SerializeError> {
    let mut attributes: Vec<(&str, String)> = vec![
        ("baseType", document.node_class.clone()),
        ("name", document.name.clone()),
        ("type", document.node_class.clone()),
    ];
    if let Some([x, y]) = document.position {
        attributes.push(("x", x.to_string()));
        attributes.push(("y", y.to_string()));
    }
    if let Some([r, g, b]) = document.color {
        attributes.push(("ns_colorr", r.to_string()));
        attributes.push(("ns_colorg", g.to_string()));
        attributes.push(("ns_colorb", b.to_string()));
    }
    let attributes: Vec<(&str, &str)> = attributes.iter().map(|(k, v)| (*k, v.as_str())).collect();
    start(writer, "node", &attributes)?;

    for port in &document.inputs {
        match &port.source {
            Some(source) => empty(
                writer,
                "port",
                &[("name", port.name.as_str()), ("source", source.as_str()), ("type", "in")],
            )?,
            None => empty(writer, "port", &[("name", port.name.as_str()), ("type", "in")])?,
        }
    }
    for output in &document.outputs {
        empty(writer, "port", &[("name", output.as_str()), ("type", "out")])?;
    }

    start(writer, "group_parameter", &[("name", document.node_class.as_str())])?;
    empty(writer, "string_parameter", &[("name", "name"), ("value", document.name.as_str())])?;
    if !document.shader_type.is_empty() {
        empty(
            writer,
            "string_parameter",
            &[("name", "nodeType"), ("value", document.shader_type.as_str())],
        )?;
    }
    if !document.parameters.is_empty() {
        start(writer, "group_parameter", &[("name", "parameters")])?;
        for (name, slot) in &document.parameters {
            write_parameter(writer, name, slot)?;
        }
        end(writer, "group_parameter")?;
    }
    end(writer, "group_parameter")?;

    end(writer, "node")
}

fn write_parameter<W: Write>(writer: &mut Writer<W>, name: &str, slot: &ParameterSlot) -> Result<(), SerializeError> {
    start(writer, "group_parameter", &[("name", name)])?;
    empty(
        writer,
        "number_parameter",
        &[("name", "enable"), ("value", if slot.enabled { "1" } else { "0" })],
    )?;

    let is_string = slot.kind == ParamKind::String;
    match slot.value.as_sequence() {
        Some(items) => {
            let (array, element) = if is_string {
                ("stringarray_parameter", "string_parameter")
            } else {
                ("numberarray_parameter", "number_parameter")
            };
            let size = items.len().to_string();
            let tuple_size = slot.tuple_size.max(1).to_string();
            start(
                writer,
                array,
                &[("name", "value"), ("size", size.as_str()), ("tupleSize", tuple_size.as_str())],
            )?;
            for (i, item) in items.iter().enumerate() {
                empty(writer, element, &[("name", format!("i{i}").as_str()), ("value", item.to_string().as_str())])?;
            }
            end(writer, array)?;
        }
        None => {
            let element = if is_string || slot.value.as_str().is_some() {
                "string_parameter"
            } else {
                "number_parameter"
            };
            empty(writer, element, &[("name", "value"), ("value", slot.value.to_string().as_str())])?;
        }
    }

    empty(
        writer,
        "string_parameter",
        &[("name", "type"), ("value", slot.kind.attr_name())],
    )?;
    end(writer, "group_parameter")
}

fn start<W: Write>(writer: &mut Writer<W>, name: &str, attributes: &[(&str, &str)]) -> Result<(), SerializeError> {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn empty<W: Write>(writer: &mut Writer<W>, name: &str, attributes: &[(&str, &str)]) -> Result<(), SerializeError> {
    let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn end<W: Write>(writer: &mut Writer<W>, name: &str) -> Result<(), SerializeError> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Error writing the XML document
#[derive(Debug, thiserror::Error)]
pub enum SerializeError {
    /// XML writer failure
    #[error("Failed to write XML: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Output is not valid UTF-8
    #[error("Invalid UTF-8 in XML output: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PortSlot;
    use crate::value::AttrValue;

    fn compact() -> XmlConfig {
        XmlConfig {
            indent: 0,
            ..XmlConfig::default()
        }
    }

    fn texture() -> ParameterDocument {
        let mut doc = ParameterDocument::new("ArnoldShadingNode", "image")
            .with_output("out")
            .with_param("filename", ParameterSlot::string(""))
            .with_param("multiply", ParameterSlot::color(1.0, 1.0, 1.0));
        doc.name = "tex".to_string();
        doc.position = Some([0, 100]);
        doc.color = Some([0.36, 0.25, 0.38]);
        doc.inputs.push(PortSlot {
            name: "multiply".to_string(),
            source: Some("noise1.out".to_string()),
        });
        if let Some(slot) = doc.param_mut("filename") {
            slot.set(AttrValue::from("/a.tx")).unwrap();
        }
        doc
    }

    #[test]
    fn test_node_document() {
        let translation = Translation {
            documents: vec![texture()],
            ..Translation::default()
        };
        let xml = to_katana_xml(&translation, &compact()).unwrap();

        let expected = concat!(
            r#"<katana release="2.5v4" version="2.5.1.000001">"#,
            r#"<node name="__SAVE_exportedNodes" type="Group">"#,
            r#"<node baseType="ArnoldShadingNode" name="tex" type="ArnoldShadingNode" x="0" y="100" ns_colorr="0.36" ns_colorg="0.25" ns_colorb="0.38">"#,
            r#"<port name="multiply" source="noise1.out" type="in"/>"#,
            r#"<port name="out" type="out"/>"#,
            r#"<group_parameter name="ArnoldShadingNode">"#,
            r#"<string_parameter name="name" value="tex"/>"#,
            r#"<string_parameter name="nodeType" value="image"/>"#,
            r#"<group_parameter name="parameters">"#,
            r#"<group_parameter name="filename">"#,
            r#"<number_parameter name="enable" value="1"/>"#,
            r#"<string_parameter name="value" value="/a.tx"/>"#,
            r#"<string_parameter name="type" value="StringAttr"/>"#,
            r#"</group_parameter>"#,
            r#"<group_parameter name="multiply">"#,
            r#"<number_parameter name="enable" value="0"/>"#,
            r#"<numberarray_parameter name="value" size="3" tupleSize="3">"#,
            r#"<number_parameter name="i0" value="1"/>"#,
            r#"<number_parameter name="i1" value="1"/>"#,
            r#"<number_parameter name="i2" value="1"/>"#,
            r#"</numberarray_parameter>"#,
            r#"<string_parameter name="type" value="FloatAttr"/>"#,
            r#"</group_parameter>"#,
            r#"</group_parameter>"#,
            r#"</group_parameter>"#,
            r#"</node>"#,
            r#"</node>"#,
            r#"</katana>"#,
        );
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_material_without_parameters() {
        let mut material = ParameterDocument::new("NetworkMaterial", "").with_input("arnoldSurface");
        material.name = "surf".to_string();
        let translation = Translation {
            documents: vec![material],
            ..Translation::default()
        };
        let xml = to_katana_xml(&translation, &compact()).unwrap();

        assert!(xml.contains(r#"<node baseType="NetworkMaterial" name="surf" type="NetworkMaterial">"#));
        assert!(xml.contains(r#"<port name="arnoldSurface" type="in"/>"#));
        assert!(!xml.contains("nodeType"));
        assert!(!xml.contains(r#"name="parameters""#));
    }

    #[test]
    fn test_values_are_escaped() {
        let mut doc = ParameterDocument::new("ArnoldShadingNode", "image")
            .with_param("filename", ParameterSlot::string("<a & b>"));
        doc.name = "tex\"1".to_string();
        let translation = Translation {
            documents: vec![doc],
            ..Translation::default()
        };
        let xml = to_katana_xml(&translation, &compact()).unwrap();

        assert!(xml.contains(r#"value="&lt;a &amp; b&gt;""#));
        assert!(xml.contains(r#"name="tex&quot;1""#));
    }

    #[test]
    fn test_int_and_string_arrays() {
        let mut doc = ParameterDocument::new("ArnoldShadingNode", "ramp")
            .with_param("interpolation", ParameterSlot::array(ParamKind::Int, 1))
            .with_param("names", ParameterSlot::array(ParamKind::String, 1));
        doc.name = "ramp1".to_string();
        if let Some(slot) = doc.param_mut("interpolation") {
            slot.set_array(vec![AttrValue::Int(2), AttrValue::Int(2)]);
        }
        if let Some(slot) = doc.param_mut("names") {
            slot.set_array(vec![AttrValue::from("a")]);
        }
        let translation = Translation {
            documents: vec![doc],
            ..Translation::default()
        };
        let xml = to_katana_xml(&translation, &compact()).unwrap();

        assert!(xml.contains(
            r#"<numberarray_parameter name="value" size="2" tupleSize="1"><number_parameter name="i0" value="2"/><number_parameter name="i1" value="2"/></numberarray_parameter><string_parameter name="type" value="IntAttr"/>"#
        ));
        assert!(xml.contains(
            r#"<stringarray_parameter name="value" size="1" tupleSize="1"><string_parameter name="i0" value="a"/></stringarray_parameter>"#
        ));
    }

    #[test]
    fn test_pretty_output_and_release() {
        let config = XmlConfig {
            release: "3.0v1".to_string(),
            ..XmlConfig::default()
        };
        let xml = to_katana_xml(&Translation::default(), &config).unwrap();
        assert!(xml.starts_with(r#"<katana release="3.0v1" version="2.5.1.000001">"#));
        assert!(xml.contains("\n  <node name=\"__SAVE_exportedNodes\" type=\"Group\">"));
        assert!(xml.ends_with("</katana>"));
    }

    #[test]
    fn test_config_defaults_from_partial_ron() {
        let config: XmlConfig = ron::from_str("(release: \"3.0v1\")").unwrap();
        assert_eq!(config.release, "3.0v1");
        assert_eq!(config.version, "2.5.1.000001");
        assert_eq!(config.indent, 2);
    }
}
