//! # CLI Commands
//!
//! Subcommand implementations for the voicify CLI.

pub mod clear;
pub mod list;
pub mod match_cmd;
pub mod remove;
pub mod replay;
pub mod show;

use anyhow::Context;
use voicify_core::{CatalogStore, DemonstrationCatalog, VoicifyConfig};

/// Store at the configured catalog path.
pub fn catalog_store(config: &VoicifyConfig) -> anyhow::Result<CatalogStore> {
    let path = config
        .catalog_path()
        .context("No catalog path configured and no data directory available")?;
    Ok(CatalogStore::new(path))
}

/// Read the catalog, treating a missing file as empty. Unlike the service,
/// the CLI reports a corrupt file instead of ignoring it.
pub fn read_catalog(config: &VoicifyConfig) -> anyhow::Result<DemonstrationCatalog> {
    let store = catalog_store(config)?;
    if !store.path().exists() {
        return Ok(DemonstrationCatalog::new());
    }
    store
        .try_load()
        .with_context(|| format!("Failed to read catalog {}", store.path().display()))
}
