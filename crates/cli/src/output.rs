//! Output formatting utilities

use aqi_engine::AqiCategory;
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of rows
pub fn print_table<T: Tabled>(rows: &[T]) {
    if rows.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format an AQI value
pub fn format_aqi(aqi: f64) -> String {
    format!("{:.1}", aqi)
}

/// Category name painted in the band's display color
pub fn color_category(category: AqiCategory) -> String {
    match parse_hex_color(category.color()) {
        Some((r, g, b)) => category.name().truecolor(r, g, b).bold().to_string(),
        None => category.name().to_string(),
    }
}

fn parse_hex_color(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

/// Color a held-out R² score
pub fn color_r2(r2: f64) -> String {
    let formatted = format!("{:.3}", r2);
    if r2 >= 0.8 {
        formatted.green().to_string()
    } else if r2 >= 0.5 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#00e400"), Some((0, 228, 0)));
        assert_eq!(parse_hex_color("#7e0023"), Some((126, 0, 35)));
        assert_eq!(parse_hex_color("00e400"), None);
        assert_eq!(parse_hex_color("#zz0000"), None);
    }

    #[test]
    fn test_every_category_color_parses() {
        for category in AqiCategory::ALL {
            assert!(parse_hex_color(category.color()).is_some(), "{}", category);
        }
    }

    #[test]
    fn test_format_aqi() {
        assert_eq!(format_aqi(42.04), "42.0");
        assert_eq!(format_aqi(500.0), "500.0");
    }
}
