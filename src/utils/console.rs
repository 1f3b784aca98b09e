//! Console reporting
//!
//! Colorized, human-readable probe output on stdout. Diagnostics go through
//! `tracing` on stderr; this module only prints results.

use crate::models::chat::ChatUsage;
use crate::models::responses::ResponsesUsage;
use anstyle::{AnsiColor, Style};
use std::io::IsTerminal;

const RULE_WIDTH: usize = 70;

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

fn style(color: AnsiColor) -> Style {
    Style::new().fg_color(Some(color.into()))
}

/// Wrap `text` in `style` when stdout is a terminal
pub fn paint(style: Style, text: &str) -> String {
    if colors_enabled() {
        format!("{}{}{}", style.render(), text, style.render_reset())
    } else {
        text.to_string()
    }
}

pub fn header(title: &str) {
    let header_style = style(AnsiColor::Magenta).bold();
    let rule = "=".repeat(RULE_WIDTH);
    println!();
    println!("{}", paint(header_style, &rule));
    println!("{}", paint(header_style, title));
    println!("{}", paint(header_style, &rule));
    println!();
}

pub fn section(title: &str) {
    println!();
    println!("{}", paint(style(AnsiColor::Cyan).bold(), &format!("--- {} ---", title)));
    println!();
}

pub fn success(message: &str) {
    println!("{}", paint(style(AnsiColor::Green), &format!("[OK] {}", message)));
}

pub fn fail(message: &str) {
    println!("{}", paint(style(AnsiColor::Red), &format!("[FAIL] {}", message)));
}

pub fn info(message: &str) {
    println!("{}", paint(style(AnsiColor::Blue), &format!("[INFO] {}", message)));
}

pub fn warn(message: &str) {
    println!("{}", paint(style(AnsiColor::Yellow), &format!("[WARN] {}", message)));
}

/// Indented `key: value` line
pub fn field(key: &str, value: impl std::fmt::Display) {
    println!("  {}: {}", key, value);
}

/// Poll progress line
pub fn progress(attempt: u32, max_attempts: u32, status: &str, progress: Option<&str>) {
    match progress {
        Some(p) => println!("  [{}/{}] {}, {}", attempt, max_attempts, status, p),
        None => println!("  [{}/{}] {}", attempt, max_attempts, status),
    }
}

/// Separator line of a fixed-width table
pub fn table_separator(widths: &[usize]) -> String {
    let mut line = String::from("|");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('|');
    }
    line
}

/// Left-aligned, padded table row
pub fn format_row<S: AsRef<str>>(cells: &[S], widths: &[usize]) -> String {
    let mut row = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        row.push_str(&format!(" {:<width$} |", cell.as_ref(), width = *width));
    }
    row
}

pub fn table_header(columns: &[&str], widths: &[usize]) {
    let separator = table_separator(widths);
    println!("{}", separator);
    println!("{}", format_row(columns, widths));
    println!("{}", separator);
}

pub fn table_row<S: AsRef<str>>(cells: &[S], widths: &[usize], highlight: bool) {
    let row = format_row(cells, widths);
    if highlight {
        println!("{}", paint(style(AnsiColor::Green), &row));
    } else {
        println!("{}", row);
    }
}

/// Print chat completion usage, with cache detail when present
pub fn chat_usage(usage: &ChatUsage) {
    field("Prompt tokens", usage.prompt_tokens);
    field("Completion tokens", usage.completion_tokens);
    field("Total tokens", usage.total_tokens);
    let cached = usage.effective_cached_tokens();
    field("Cached tokens", cached);
    if cached > 0 {
        field("Cache hit ratio", format!("{:.2}%", usage.cache_hit_ratio()));
    }
}

/// Print Responses API usage, with cache and reasoning detail
pub fn responses_usage(usage: &ResponsesUsage) {
    field("Input tokens", usage.input_tokens);
    field("Output tokens", usage.output_tokens);
    field("Total tokens", usage.total_tokens);
    field("Cached tokens", usage.cached_tokens());
    if usage.cache_creation_tokens() > 0 {
        field("Cache creation tokens", usage.cache_creation_tokens());
    }
    if usage.output_tokens_details.reasoning_tokens > 0 {
        field("Reasoning tokens", usage.output_tokens_details.reasoning_tokens);
    }
    if usage.cached_tokens() > 0 {
        field("Cache hit ratio", format!("{:.2}%", usage.cache_hit_ratio()));
    }
}

/// Outcome of one suite step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Pass,
    Fail,
    Skip,
}

impl Outcome {
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            Outcome::Pass
        } else {
            Outcome::Fail
        }
    }

    fn label(self) -> &'static str {
        match self {
            Outcome::Pass => "[PASS]",
            Outcome::Fail => "[FAIL]",
            Outcome::Skip => "[SKIP]",
        }
    }
}

/// Ordered record of step outcomes for one probe run
#[derive(Debug, Clone, Default)]
pub struct SuiteReport {
    results: Vec<(String, Outcome)>,
}

impl SuiteReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, name: impl Into<String>, outcome: Outcome) {
        self.results.push((name.into(), outcome));
    }

    pub fn pass(&mut self, name: impl Into<String>) {
        self.record(name, Outcome::Pass);
    }

    pub fn fail(&mut self, name: impl Into<String>) {
        self.record(name, Outcome::Fail);
    }

    pub fn skip(&mut self, name: impl Into<String>) {
        self.record(name, Outcome::Skip);
    }

    /// Record pass/fail from a boolean check
    pub fn check(&mut self, name: impl Into<String>, passed: bool) {
        self.record(name, Outcome::from_bool(passed));
    }

    pub fn results(&self) -> &[(String, Outcome)] {
        &self.results
    }

    pub fn passed(&self) -> usize {
        self.count(Outcome::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Fail)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|(_, o)| *o == outcome).count()
    }

    /// Skips do not fail a suite
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// Merge another report's results after this one's
    pub fn extend(&mut self, other: SuiteReport) {
        self.results.extend(other.results);
    }

    pub fn print_summary(&self) {
        header("Test Summary");
        for (name, outcome) in &self.results {
            let color = match outcome {
                Outcome::Pass => AnsiColor::Green,
                Outcome::Fail => AnsiColor::Red,
                Outcome::Skip => AnsiColor::Yellow,
            };
            println!("  {} {}", paint(style(color), outcome.label()), name);
        }
        println!();
        let line = format!("Total: {}/{} tests passed", self.passed(), self.results.len());
        if self.is_success() {
            success(&line);
        } else {
            fail(&line);
        }
    }
}
