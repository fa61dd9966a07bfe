//! Console output formatting

use colored::*;
use comfy_table::{Cell, CellAlignment, Color, ContentArrangement, Table};
use std::fmt::Display;
use std::time::Duration;

/// Format a number with thousands separators
pub fn format_number<T: Display>(n: T) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let mut count = 0;

    for c in s.chars().rev() {
        if count == 3 {
            result.push(',');
            count = 0;
        }
        result.push(c);
        count += 1;
    }

    result.chars().rev().collect()
}

/// Human-readable duration: `850ms`, `12.3s`, `4m 05s`, `1h 02m`
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    let secs = duration.as_secs();
    if millis < 1000 {
        format!("{}ms", millis)
    } else if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn section_header(title: &str) {
    println!("\n{}", title.bold().cyan());
    println!("{}", "─".repeat(title.chars().count()).cyan());
}

pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow(), msg.yellow());
}

pub fn info(msg: &str) {
    eprintln!("{} {}", "●".blue(), msg);
}

pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg.green());
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg.red());
}

/// `├─ key: value` line of a summary block
pub fn tree_item(key: &str, value: impl Display, last: bool) {
    let prefix = if last { "└─" } else { "├─" };
    println!("  {} {}: {}", prefix, key.dimmed(), value);
}

/// Create a standard table with consistent styling
pub fn create_standard_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Create a header cell with center alignment
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .set_alignment(CellAlignment::Center)
        .add_attribute(comfy_table::Attribute::Bold)
        .fg(Color::Cyan)
}

/// Green yes / red no cell for availability columns
pub fn status_cell(ok: bool, yes: &str, no: &str) -> Cell {
    if ok {
        Cell::new(yes).fg(Color::Green)
    } else {
        Cell::new(no).fg(Color::Red)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(850)), "850ms");
        assert_eq!(format_duration(Duration::from_millis(12_340)), "12.3s");
        assert_eq!(format_duration(Duration::from_secs(245)), "4m 05s");
        assert_eq!(format_duration(Duration::from_secs(3720)), "1h 02m");
    }

    #[test]
    fn test_standard_table_renders_rows() {
        let mut table = create_standard_table();
        table.set_header(vec![header_cell("Method"), header_cell("Installed")]);
        table.add_row(vec![Cell::new("mafft"), status_cell(true, "yes", "no")]);
        let rendered = table.to_string();
        assert!(rendered.contains("mafft"));
        assert!(rendered.contains("Installed"));
    }
}
