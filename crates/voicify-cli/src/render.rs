//! # Terminal Rendering
//!
//! Utilities for rendering formatted output to the terminal.

use colored::Colorize;
use unicode_width::UnicodeWidthStr;

/// Output style
pub enum Style {
    Error,
    Warning,
    Info,
    Success,
}

/// Print a message with a style
pub fn print_styled(message: &str, style: Style) {
    let prefix = match style {
        Style::Error => "Error:".bright_red().bold(),
        Style::Warning => "Warning:".bright_yellow().bold(),
        Style::Info => "Info:".bright_cyan().bold(),
        Style::Success => "✓".bright_green().bold(),
    };
    println!("{} {}", prefix, message);
}

/// Print a table
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths = column_widths(headers, rows);

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| pad(h, widths[i]))
        .collect();
    println!("{}", header_line.join(" │ ").bright_cyan().bold());

    let separator: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", separator.join("─┼─").dimmed());

    for row in rows {
        let row_line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| pad(cell, widths.get(i).copied().unwrap_or(0)))
            .collect();
        println!("{}", row_line.join(" │ "));
    }
}

/// Display width of each column, wide enough for the header and every cell.
fn column_widths(headers: &[&str], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.width()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.width());
            }
        }
    }
    widths
}

/// Pad by display width; `format!` pads by char count.
fn pad(text: &str, width: usize) -> String {
    format!("{}{}", text, " ".repeat(width.saturating_sub(text.width())))
}
