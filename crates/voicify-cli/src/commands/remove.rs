//! # Remove Command
//!
//! Delete one recorded command.

use anyhow::bail;
use voicify_core::VoicifyConfig;

use crate::render::{self, Style};

/// Run the remove command
pub fn run(config: VoicifyConfig, app: &str, command: &str) -> anyhow::Result<()> {
    let store = super::catalog_store(&config)?;
    let mut catalog = super::read_catalog(&config)?;

    if catalog.remove(app, command).is_none() {
        bail!("No command {:?} recorded for {}", command, app);
    }
    store.save(&catalog)?;

    render::print_styled(&format!("Removed {:?} from {}", command, app), Style::Success);
    Ok(())
}
