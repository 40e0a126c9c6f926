//! # List Command
//!
//! Print recorded commands grouped by app.

use colored::Colorize;
use voicify_core::{Demonstration, VoicifyConfig};

use crate::render;

fn row(demonstration: &Demonstration) -> Vec<String> {
    vec![
        demonstration.command.clone(),
        demonstration.actions.len().to_string(),
        demonstration.output_selections.len().to_string(),
        demonstration.created_at.format("%Y-%m-%d %H:%M").to_string(),
    ]
}

/// Run the list command
pub fn run(config: &VoicifyConfig) -> anyhow::Result<()> {
    let catalog = super::read_catalog(config)?;

    if catalog.is_empty() {
        println!("{}", "No commands recorded yet.".yellow());
        return Ok(());
    }

    for app in catalog.apps() {
        println!();
        println!("{}", app.bright_cyan().bold());
        let rows: Vec<Vec<String>> = catalog.scope(app).iter().map(row).collect();
        render::print_table(&["Command", "Actions", "Outputs", "Recorded"], &rows);
    }

    println!();
    println!("{} command(s) in {} app(s)", catalog.len(), catalog.apps().count());
    Ok(())
}
