//! Human and JSON output for CLI commands
//!
//! Commands print through an [`OutputFormatter`] so `--json` and `--quiet`
//! are handled in one place. Diagnostics go to stderr, results to stdout.

use serde_json::{json, Value};

/// Output format selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

pub trait OutputFormatter {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn warn(&self, message: &str);
    fn info(&self, message: &str);
    /// A `label: value` line of a report, labels padded to one column
    fn field(&self, label: &str, value: &str);
    fn print_json(&self, value: &Value);
}

/// Width of the label column used by [`OutputFormatter::field`]
const LABEL_WIDTH: usize = 10;

/// Check marks and indented detail lines; `quiet` keeps only diagnostics
pub struct HumanFormatter {
    quiet: bool,
}

impl OutputFormatter for HumanFormatter {
    fn success(&self, message: &str) {
        if !self.quiet {
            println!("\u{2713} {message}");
        }
    }

    fn error(&self, message: &str) {
        eprintln!("\u{2717} error: {message}");
    }

    fn warn(&self, message: &str) {
        eprintln!("\u{26a0} {message}");
    }

    fn info(&self, message: &str) {
        if !self.quiet {
            println!("  {message}");
        }
    }

    fn field(&self, label: &str, value: &str) {
        let label = format!("{label}:");
        self.info(&format!("{label:<width$}{value}", width = LABEL_WIDTH));
    }

    fn print_json(&self, _value: &Value) {}
}

/// Machine-readable output: results are pretty JSON documents on stdout
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn success(&self, message: &str) {
        println!("{}", json!({ "status": "ok", "message": message }));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", json!({ "status": "error", "error": message }));
    }

    fn warn(&self, message: &str) {
        eprintln!("{}", json!({ "status": "warning", "message": message }));
    }

    // Detail lines are already part of the JSON document.
    fn info(&self, _message: &str) {}

    fn field(&self, _label: &str, _value: &str) {}

    fn print_json(&self, value: &Value) {
        match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("{}", json!({ "status": "error", "error": e.to_string() })),
        }
    }
}

pub fn get_formatter(format: OutputFormat, quiet: bool) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter { quiet }),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// `1 file`, `2 files`
pub fn plural(count: usize, noun: &str) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("{count} {noun}{suffix}")
}

/// Milliseconds as `850ms` or `2.5s`
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        return format!("{ms}ms");
    }
    format!("{:.1}s", ms as f64 / 1000.0)
}
