// SPDX-License-Identifier: MIT OR Apache-2.0
//! `lookdev-bridge` - shading network translation from the command line
//!
//! Loads a scene snapshot, translates the selected shading nodes with a
//! renderer backend and writes the resulting Katana node graph document.
//!
//! ## Architecture
//!
//! Settings come from an optional RON file with command-line overrides.
//! The translation itself lives in `lookdev_bridge_graph`; this binary
//! only wires files, logging and exit codes around it.

mod cli;
mod error;
mod settings;

use clap::Parser;
use cli::Cli;
use std::process::ExitCode;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    tracing::debug!("Starting lookdev-bridge v{}", env!("CARGO_PKG_VERSION"));

    let result = cli.resolve_settings().and_then(|settings| {
        match cli::translate(&cli, &settings)? {
            Some(document) => cli::write_output(&document, cli.output.as_deref()),
            None => {
                tracing::info!("Nothing to output");
                Ok(())
            }
        }
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("lookdev_bridge_graph={default_level},lookdev_bridge_app={default_level}"))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
