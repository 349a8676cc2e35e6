//! Terminal UI helpers: a small box-drawing table for build summaries
//! and human-readable byte counts.

use colored::*;
use console::{measure_text_width, truncate_str};

const MIN_COL_WIDTH: usize = 8;

pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self {
        Self {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn add_row(&mut self, row: Vec<String>) {
        if row.len() == self.headers.len() {
            self.rows.push(row);
        }
    }

    pub fn print(&self) {
        let (_, term_width) = console::Term::stdout().size();
        print!("{}", self.render(term_width as usize));
    }

    /// Renders the whole table, columns sized to content and squeezed to
    /// fit `max_width` by shaving the widest column first.
    fn render(&self, max_width: usize) -> String {
        if self.headers.is_empty() {
            return String::new();
        }

        let widths = self.fit_widths(max_width);
        let mut out = String::new();

        out.push_str(&border(&widths, "┌", "┬", "┐"));
        out.push_str(&row_line(&self.headers, &widths, true));
        out.push_str(&border(&widths, "├", "┼", "┤"));
        for row in &self.rows {
            out.push_str(&row_line(row, &widths, false));
        }
        out.push_str(&border(&widths, "└", "┴", "┘"));
        out
    }

    fn fit_widths(&self, max_width: usize) -> Vec<usize> {
        let mut widths: Vec<usize> = self
            .headers
            .iter()
            .map(|h| measure_text_width(h))
            .collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(measure_text_width(&flatten(cell)));
            }
        }

        // Indent, outer borders, and " x " padding around each cell.
        let overhead = 3 + 3 * widths.len();
        let available = max_width.saturating_sub(overhead);
        while widths.iter().sum::<usize>() > available {
            let Some((widest, _)) = widths
                .iter()
                .enumerate()
                .filter(|(_, w)| **w > MIN_COL_WIDTH)
                .max_by_key(|(_, w)| **w)
            else {
                break;
            };
            widths[widest] -= 1;
        }
        widths
    }
}

fn border(widths: &[usize], left: &str, mid: &str, right: &str) -> String {
    let mut line = String::from("  ");
    line.push_str(left);
    for (i, width) in widths.iter().enumerate() {
        line.push_str(&"─".repeat(width + 2));
        line.push_str(if i < widths.len() - 1 { mid } else { right });
    }
    line.push('\n');
    line
}

fn row_line(cells: &[String], widths: &[usize], header: bool) -> String {
    let mut line = String::from("  │");
    for (cell, &width) in cells.iter().zip(widths) {
        let cell = truncate_str(&flatten(cell), width, "...").to_string();
        let cell = if header {
            cell.bold().to_string()
        } else {
            cell
        };
        let pad = width.saturating_sub(measure_text_width(&cell));
        line.push(' ');
        line.push_str(&cell);
        line.push_str(&" ".repeat(pad + 1));
        line.push('│');
    }
    line.push('\n');
    line
}

/// Cells render on one line; embedded whitespace collapses to spaces.
fn flatten(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\n' | '\r' | '\t' => ' ',
            _ => c,
        })
        .collect()
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
