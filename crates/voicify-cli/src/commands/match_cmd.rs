//! # Match Command
//!
//! Show which recorded command a phrase resolves to.

use colored::Colorize;
use voicify_core::VoicifyConfig;

use crate::render::{self, Style};

/// Run the match command
pub fn run(config: &VoicifyConfig, app: &str, phrase: &str) -> anyhow::Result<()> {
    let catalog = super::read_catalog(config)?;
    let threshold = config.matching.distance_threshold;

    let Some(best) = catalog.find_best_match(phrase, app) else {
        render::print_styled(&format!("No commands recorded for {}", app), Style::Warning);
        return Ok(());
    };

    let distance = best.match_distance.unwrap_or_default();
    println!("Best match: {}", best.command.bright_yellow());
    println!("Distance:   {} (threshold {})", distance, threshold);

    if distance <= threshold {
        render::print_styled("Would replay", Style::Success);
    } else {
        render::print_styled("Too far, would report no good match", Style::Warning);
    }
    Ok(())
}
