//! Detection of problems in mded documents.
//!
//! Scanners walk the raw text and yield matches lazily; the builder turns
//! them into positioned diagnostics within a per-pass problem budget.

mod builder;
mod calls;
mod scan;
mod types;
mod uppercase;

pub use builder::{diagnose, DiagnosticBuilder};
pub use calls::{CallMatch, CallScanner, ParameterScanner};
pub use scan::PatternScanner;
pub use types::{
    has_errors, DiagnosticRecord, DiagnosticRule, RelatedInformation, ScanMatch, Severity,
    DIAGNOSTIC_SOURCE,
};
pub use uppercase::UppercaseScanner;
