//! # Show Command
//!
//! Print one recorded command as JSON.

use anyhow::bail;
use voicify_core::VoicifyConfig;

/// Run the show command
pub fn run(config: &VoicifyConfig, app: &str, command: &str) -> anyhow::Result<()> {
    let catalog = super::read_catalog(config)?;
    let Some(demonstration) = catalog.get(app, command) else {
        bail!("No command {:?} recorded for {}", command, app);
    };
    println!("{}", serde_json::to_string_pretty(demonstration)?);
    Ok(())
}
