//! Simple Output and Reporting
//!
//! Formatting of a [`ValidationReport`] for the `validate` subcommand.

use std::path::Path;

use crate::cli::{OutputFormat, VerbosityLevel};
use crate::validator::ValidationReport;

/// Output formatter for validation reports
pub struct Output {
    format: OutputFormat,
    verbosity: VerbosityLevel,
    show_colors: bool,
}

impl Output {
    pub fn new(format: OutputFormat, verbosity: VerbosityLevel) -> Self {
        Self {
            format,
            verbosity,
            show_colors: atty::is(atty::Stream::Stdout),
        }
    }

    /// Force colours on or off, regardless of the terminal
    pub fn with_colors(mut self, show_colors: bool) -> Self {
        self.show_colors = show_colors;
        self
    }

    fn colorize(&self, text: &str, color: &str) -> String {
        if self.show_colors {
            format!("\x1b[{}m{}\x1b[0m", color, text)
        } else {
            text.to_string()
        }
    }

    pub fn format_report(&self, path: &Path, report: &ValidationReport) -> String {
        match self.format {
            OutputFormat::Json => format_json(report),
            OutputFormat::Human => self.format_human(path, report),
        }
    }

    fn format_human(&self, path: &Path, report: &ValidationReport) -> String {
        let path_display = path.display();

        if report.valid {
            return format!("{}  {}\n", self.colorize("✓ VALID", "32"), path_display);
        }

        let error_count = report.error_count();
        let mut output = format!(
            "{}  {} - {} error{}\n",
            self.colorize("✗ INVALID", "31"),
            path_display,
            error_count,
            if error_count == 1 { "" } else { "s" }
        );

        if self.verbosity >= VerbosityLevel::Normal {
            for error in &report.errors {
                output.push_str(&format!("    {}\n", error));
            }
        }

        output
    }
}

fn format_json(report: &ValidationReport) -> String {
    match serde_json::to_string_pretty(report) {
        Ok(json) => json + "\n",
        // A report of strings and a bool always serializes
        Err(e) => format!("{{\"error\": \"{}\"}}\n", e),
    }
}
