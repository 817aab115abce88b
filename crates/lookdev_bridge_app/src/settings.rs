// SPDX-License-Identifier: MIT OR Apache-2.0
//! Persistent settings for the command-line front end
//!
//! Holds the defaults a studio wants to share between runs:
//! - Renderer backend name
//! - Template directory
//! - Translation and layout settings
//! - XML output settings

use lookdev_bridge_graph::{TranslateConfig, XmlConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Settings file name looked up in the working directory
pub const SETTINGS_FILE_NAME: &str = "lookdev_bridge.ron";

/// Settings shared by every run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Settings format version
    pub version: u32,
    /// Renderer backend used when none is given on the command line
    pub backend: String,
    /// Directory holding `<target type>.ron` parameter templates
    pub templates: Option<PathBuf>,
    /// Translation and layout settings
    pub translate: TranslateConfig,
    /// Katana release, version and indentation of the written document
    pub xml: XmlConfig,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            backend: "arnold".to_string(),
            templates: None,
            translate: TranslateConfig::default(),
            xml: XmlConfig::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: AppSettings = ron::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Load settings from a file when it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.is_file() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);

        let content = ron::ser::to_string_pretty(self, config).map_err(|e| SettingsError::Serialize {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        std::fs::write(path, content).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Settings file path for a directory
    pub fn settings_file_path(dir: &Path) -> PathBuf {
        dir.join(SETTINGS_FILE_NAME)
    }
}

/// Error loading or saving settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("Settings file {path:?}: {source}")]
    Io {
        /// Settings file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// File content is malformed
    #[error("Invalid settings in {path:?}: {message}")]
    Parse {
        /// Settings file
        path: PathBuf,
        /// Parser message
        message: String,
    },

    /// Settings could not be encoded for writing
    #[error("Failed to encode settings for {path:?}: {message}")]
    Serialize {
        /// Settings file
        path: PathBuf,
        /// Encoder message
        message: String,
    },

    /// File was written by a newer release
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Highest supported version
        supported: u32,
    },
}
