// SPDX-License-Identifier: MIT OR Apache-2.0
//! Command-line arguments and the translation run they drive

use crate::error::AppError;
use crate::settings::AppSettings;
use clap::Parser;
use lookdev_bridge_graph::{to_katana_xml, BackendRegistry, DirectoryTemplates, SceneSnapshot, Translator};
use std::path::{Path, PathBuf};

/// Translate a shading network snapshot into a Katana node graph
///
/// ```bash
/// # Translate the snapshot's own selection with the arnold backend
/// lookdev-bridge scene.ron --templates templates/arnold
///
/// # Translate two nodes with prman and write the result to a file
/// lookdev-bridge scene.json PxrSurface1 PxrTexture1 -b prman -t templates/prman -o network.xml
/// ```
#[derive(Debug, Parser)]
#[command(name = "lookdev-bridge")]
#[command(author, version, about = "Translate shading networks into Katana node graphs", long_about = None)]
pub struct Cli {
    /// Scene snapshot (`.ron` or `.json`)
    pub scene: PathBuf,

    /// Nodes to translate; defaults to the selection stored in the snapshot
    pub nodes: Vec<String>,

    /// Renderer backend (`arnold`, `prman`)
    #[arg(short, long)]
    pub backend: Option<String>,

    /// Directory holding `<target type>.ron` parameter templates
    #[arg(short, long)]
    pub templates: Option<PathBuf>,

    /// Settings file; `lookdev_bridge.ron` in the working directory is used when present
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Write the document to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Store the resolved settings back into the settings file
    #[arg(long)]
    pub save_settings: bool,

    /// Write compact XML without indentation
    #[arg(long)]
    pub compact: bool,

    /// Do not expand a selected material into its whole network
    #[arg(long)]
    pub no_expand: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Load the settings file and apply command-line overrides
    pub fn resolve_settings(&self) -> Result<AppSettings, AppError> {
        let mut settings = match &self.settings {
            Some(path) => AppSettings::load(path)?,
            None => AppSettings::load_or_default(&self.settings_path())?,
        };

        if let Some(backend) = &self.backend {
            settings.backend.clone_from(backend);
        }
        if let Some(templates) = &self.templates {
            settings.templates = Some(templates.clone());
        }
        if self.compact {
            settings.xml.indent = 0;
        }
        if self.no_expand {
            settings.translate.expand_network = false;
        }
        if self.save_settings {
            settings.save(&self.settings_path())?;
            tracing::info!("Saved settings to {:?}", self.settings_path());
        }
        Ok(settings)
    }

    fn settings_path(&self) -> PathBuf {
        self.settings
            .clone()
            .unwrap_or_else(|| AppSettings::settings_file_path(Path::new(".")))
    }
}

/// Run a translation; `None` when there is nothing to output
pub fn translate(cli: &Cli, settings: &AppSettings) -> Result<Option<String>, AppError> {
    let templates_dir = settings.templates.as_deref().ok_or(AppError::NoTemplates)?;
    let templates = DirectoryTemplates::load(templates_dir)?;
    let snapshot = SceneSnapshot::load(&cli.scene)?;

    let selection = if cli.nodes.is_empty() {
        snapshot.selection.clone()
    } else {
        cli.nodes.clone()
    };

    let registry = BackendRegistry::with_defaults();
    let mut translator = Translator::new(&registry, &settings.backend, &templates, settings.translate.clone())?;
    let translation = translator.translate(&snapshot, &selection)?;

    if !translation.unresolved.is_empty() {
        tracing::warn!("{} connections left unresolved", translation.unresolved.len());
    }
    if translation.is_empty() {
        return Ok(None);
    }

    tracing::info!(
        "Translated {} nodes into {} documents with the {} backend",
        translation.translated,
        translation.documents.len(),
        settings.backend
    );
    Ok(Some(to_katana_xml(&translation, &settings.xml)?))
}

/// Write a document to a file or stdout
pub fn write_output(document: &str, output: Option<&Path>) -> Result<(), AppError> {
    match output {
        Some(path) => {
            std::fs::write(path, document).map_err(|source| AppError::Output {
                path: path.to_path_buf(),
                source,
            })?;
            tracing::info!("Wrote {:?}", path);
        }
        None => println!("{document}"),
    }
    Ok(())
}
