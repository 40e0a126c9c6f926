//! # Clear Command
//!
//! Delete every recorded command.

use std::io::{self, BufRead, Write};

use colored::Colorize;
use voicify_core::{DemonstrationCatalog, VoicifyConfig};

use crate::render::{self, Style};

fn confirm(count: usize) -> io::Result<bool> {
    print!(
        "{} Delete all {} recorded command(s)? [y/N] ",
        "Warning:".yellow(),
        count
    );
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

/// Run the clear command
pub fn run(config: VoicifyConfig, yes: bool) -> anyhow::Result<()> {
    let store = super::catalog_store(&config)?;
    let count = super::read_catalog(&config)?.len();

    if count == 0 {
        render::print_styled("Catalog is already empty", Style::Info);
        return Ok(());
    }
    if !yes && !confirm(count)? {
        println!("Cancelled");
        return Ok(());
    }

    store.save(&DemonstrationCatalog::new())?;
    render::print_styled(&format!("Deleted {} command(s)", count), Style::Success);
    Ok(())
}
