//! Core types for scan matches and diagnostics.

use serde::{Deserialize, Serialize};
use tower_lsp::lsp_types::{
    self, DiagnosticRelatedInformation, DiagnosticSeverity, Location, NumberOrString, Range, Url,
};

/// Value of the `source` field on every published diagnostic.
pub const DIAGNOSTIC_SOURCE: &str = "mded";

/// Severity levels for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(Severity::Error),
            "warning" => Ok(Severity::Warning),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

impl From<Severity> for DiagnosticSeverity {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => DiagnosticSeverity::ERROR,
            Severity::Warning => DiagnosticSeverity::WARNING,
        }
    }
}

/// Rule that produced a diagnostic. Published as the diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticRule {
    #[serde(rename = "invalid-function")]
    InvalidFunction,
    #[serde(rename = "parameter-count")]
    ParameterCount,
    #[serde(rename = "all-uppercase")]
    AllUppercase,
}

impl DiagnosticRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticRule::InvalidFunction => "invalid-function",
            DiagnosticRule::ParameterCount => "parameter-count",
            DiagnosticRule::AllUppercase => "all-uppercase",
        }
    }
}

impl std::fmt::Display for DiagnosticRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A raw scanner hit.
///
/// `offset` and `length` are byte positions into the scanned text. Capture
/// groups are stored in pattern order; a group that did not participate in
/// the match is stored as an empty string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    pub offset: usize,
    pub length: usize,
    pub captures: Vec<String>,
}

impl ScanMatch {
    /// Byte offset one past the end of the match.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }

    /// Capture group `index` (0-based, excluding the whole match).
    pub fn capture(&self, index: usize) -> Option<&str> {
        self.captures.get(index).map(String::as_str)
    }
}

/// A secondary location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedInformation {
    pub uri: Url,
    pub range: Range,
    pub message: String,
}

/// A positioned finding for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticRecord {
    pub rule: DiagnosticRule,
    pub severity: Severity,
    pub range: Range,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_information: Option<Vec<RelatedInformation>>,
}

impl From<DiagnosticRecord> for lsp_types::Diagnostic {
    fn from(record: DiagnosticRecord) -> Self {
        let related_information = record.related_information.map(|items| {
            items
                .into_iter()
                .map(|item| DiagnosticRelatedInformation {
                    location: Location {
                        uri: item.uri,
                        range: item.range,
                    },
                    message: item.message,
                })
                .collect()
        });

        lsp_types::Diagnostic {
            range: record.range,
            severity: Some(record.severity.into()),
            code: Some(NumberOrString::String(record.rule.as_str().to_string())),
            source: Some(DIAGNOSTIC_SOURCE.to_string()),
            message: record.message,
            related_information,
            ..Default::default()
        }
    }
}

/// Whether any diagnostic has error severity.
pub fn has_errors(diagnostics: &[DiagnosticRecord]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}
