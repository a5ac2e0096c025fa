//! CLI output formatting utilities

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};

use crate::auth::{Access, RuleTable};

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// Print a warning message
pub fn warn(message: &str) {
    println!("{} {}", "⚠".yellow(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

fn access_color(access: &Access) -> Color {
    match access {
        Access::PermitAll => Color::Green,
        Access::Authenticated => Color::Yellow,
        Access::AnyRole(_) => Color::Magenta,
    }
}

/// Print the access rules in evaluation order
pub fn print_rule_table(rules: &RuleTable) {
    if rules.rules().is_empty() {
        warn("No access rules: every request needs an authenticated user");
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").fg(Color::Cyan),
            Cell::new("Method").fg(Color::Cyan),
            Cell::new("Pattern").fg(Color::Cyan),
            Cell::new("Access").fg(Color::Cyan),
        ]);

    for (index, rule) in rules.rules().iter().enumerate() {
        let method = rule
            .method
            .as_ref()
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "*".to_string());

        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(method),
            Cell::new(rule.pattern.as_str()),
            Cell::new(rule.access.to_string()).fg(access_color(&rule.access)),
        ]);
    }

    println!("{table}");
    info("Any matching rule grants access; unmatched paths need authentication");
}
