//! Output formatting for `mded-lsp check`.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output grouped by file
//! - JSON: structured output for programmatic consumption

use colored::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tower_lsp::lsp_types::Url;

use crate::detect::{has_errors, DiagnosticRecord, Severity};

/// Diagnostics of one checked file.
#[derive(Debug, Clone)]
pub struct FileDiagnostics {
    /// Display path, relative to the checked root where possible
    pub file: String,
    pub diagnostics: Vec<DiagnosticRecord>,
}

/// Result of a `check` run.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub path: String,
    pub files_checked: usize,
    pub files: Vec<FileDiagnostics>,
}

impl CheckReport {
    /// Build a report from published diagnostics, one entry per document.
    pub fn new(path: &str, base_path: &Path, results: Vec<(Url, Vec<DiagnosticRecord>)>) -> Self {
        let files_checked = results.len();
        let files = results
            .into_iter()
            .map(|(uri, diagnostics)| FileDiagnostics {
                file: display_path(&uri, base_path),
                diagnostics,
            })
            .collect();
        Self {
            path: path.to_string(),
            files_checked,
            files,
        }
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.files
            .iter()
            .flat_map(|f| &f.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.files.iter().any(|f| has_errors(&f.diagnostics))
    }

    pub fn to_json(&self) -> JsonReport {
        let diagnostics = self
            .files
            .iter()
            .flat_map(|f| f.diagnostics.iter().map(move |d| diagnostic_to_json(&f.file, d)))
            .collect();
        JsonReport {
            version: env!("CARGO_PKG_VERSION").to_string(),
            path: self.path.clone(),
            files_checked: self.files_checked,
            diagnostics,
        }
    }
}

fn display_path(uri: &Url, base_path: &Path) -> String {
    let Ok(file) = uri.to_file_path() else {
        return uri.to_string();
    };

    // Single file check: just the file name
    if file == base_path {
        return file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file.to_string_lossy().to_string());
    }

    file.strip_prefix(base_path)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_else(|_| file.to_string_lossy().to_string())
}

// =============================================================================
// JSON Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct JsonReport {
    pub version: String,
    pub path: String,
    pub files_checked: usize,
    pub diagnostics: Vec<JsonDiagnostic>,
}

/// One diagnostic; `line` and `column` are 1-based.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonDiagnostic {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub severity: String,
    pub rule: String,
    pub message: String,
}

fn diagnostic_to_json(file: &str, d: &DiagnosticRecord) -> JsonDiagnostic {
    JsonDiagnostic {
        file: file.to_string(),
        line: d.range.start.line + 1,
        column: d.range.start.character + 1,
        severity: d.severity.to_string(),
        rule: d.rule.as_str().to_string(),
        message: d.message.clone(),
    }
}

pub fn write_json(report: &CheckReport) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&report.to_json())?;
    println!("{}", json);
    Ok(())
}

// =============================================================================
// Pretty Format
// =============================================================================

pub fn write_pretty(report: &CheckReport) {
    println!();
    print!("  ");
    print!("{}", "mded-lsp".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Checking: ".dimmed());
    println!("{}", report.path);
    println!();

    let errors = report.count(Severity::Error);
    let warnings = report.count(Severity::Warning);

    for file in report.files.iter().filter(|f| !f.diagnostics.is_empty()) {
        write_file(file);
        println!();
    }

    if errors == 0 {
        print!("  {}", "✓ PASS".green());
    } else {
        print!("  {}", "✗ FAIL".red());
    }
    let plural = if report.files_checked != 1 { "s" } else { "" };
    println!(
        "  {} file{} checked, {} error{}, {} warning{}",
        report.files_checked,
        plural,
        errors,
        if errors != 1 { "s" } else { "" },
        warnings,
        if warnings != 1 { "s" } else { "" },
    );
    println!();
}

fn write_file(file: &FileDiagnostics) {
    println!("  {} ({}):", file.file.blue().bold(), file.diagnostics.len());
    println!();

    for d in &file.diagnostics {
        write_severity_tag(d.severity);
        print!("   ");
        print!("{:<18}", d.rule.as_str().dimmed());
        println!(
            "{}",
            format!("{}:{}", d.range.start.line + 1, d.range.start.character + 1).dimmed()
        );
        println!("            {}", d.message);
    }
}

fn write_severity_tag(severity: Severity) {
    match severity {
        Severity::Error => print!("    {} ", "ERROR".red()),
        Severity::Warning => print!("    {} ", "WARN ".yellow()),
    }
}
