// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shading network translation for `lookdev_bridge`.
//!
//! This crate turns a shading node network read from a DCC scene into a
//! Katana node graph document:
//! - Declarative attribute mapping onto parameter templates
//! - Per-type node transforms registered by renderer backends
//! - Dependency tree construction and node graph layout
//! - Katana XML output
//!
//! ## Architecture
//!
//! A [`Translator`] drives one run: it reads the selection through a
//! [`SceneQuery`], preprocesses records with the [`Backend`]'s premap,
//! builds the [`LayoutTree`], postprocesses root-level nodes, maps every
//! record onto a template from a [`TemplateProvider`] and wires ports.
//! [`to_katana_xml`] renders the resulting [`Translation`].

pub mod backends;
pub mod connection;
pub mod document;
pub mod mapping;
pub mod naming;
pub mod node;
pub mod pipeline;
pub mod scene;
pub mod serialize;
pub mod translate;
pub mod tree;
pub mod value;

pub use connection::UnresolvedConnection;
pub use document::{DirectoryTemplates, InMemoryTemplates, ParameterDocument, ParameterSlot, TemplateProvider};
pub use mapping::{MapRule, MappingError, MappingSchema};
pub use naming::UniqueNames;
pub use node::{Endpoint, NodeRecord, NodeStore, Renaming};
pub use pipeline::{Backend, BackendRegistry, NodeTransform, PremapEntry, TransformError};
pub use scene::{SceneQuery, SceneSnapshot, SnapshotNode};
pub use serialize::{to_katana_xml, SerializeError, XmlConfig};
pub use translate::{TranslateConfig, TranslateError, Translation, Translator};
pub use tree::{LayoutConfig, LayoutTree};
pub use value::{AttrValue, ParamKind};
