// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors surfaced by the command-line front end

use crate::settings::SettingsError;
use lookdev_bridge_graph::document::TemplateError;
use lookdev_bridge_graph::scene::SceneError;
use lookdev_bridge_graph::{SerializeError, TranslateError};
use std::path::PathBuf;

/// Failure of a command-line run
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Settings file could not be used
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Scene snapshot could not be loaded
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// Template directory could not be loaded
    #[error(transparent)]
    Templates(#[from] TemplateError),

    /// Neither the command line nor the settings name a template directory
    #[error("No template directory given; pass --templates or set `templates` in the settings file")]
    NoTemplates,

    /// Translation could not start
    #[error(transparent)]
    Translate(#[from] TranslateError),

    /// Document could not be rendered
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// Output could not be written
    #[error("Failed to write {path:?}: {source}")]
    Output {
        /// Output file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}
