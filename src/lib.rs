//! mded-lsp - language server for mded documents.
//!
//! mded documents contain function calls of the form `$ name (args)`. Each
//! document is validated against a `dictionary.mded.json` file in the same
//! directory: unknown function names are errors, known calls report their
//! parameter count, and bare all-uppercase words get a warning.
//!
//! # Architecture
//!
//! - `registry`: dictionary snapshots and the retrying loader
//! - `detect`: lazy text scanners and the budgeted diagnostic builder
//! - `document`: document text with byte offset to LSP position mapping
//! - `settings`: per-document settings and client capability flags
//! - `validate`: one validation pass, behind the `Transport` seam
//! - `server`: tower-lsp adapter
//! - `cli` / `report`: the `serve` and `check` commands

pub mod cli;
pub mod detect;
pub mod document;
pub mod registry;
pub mod report;
pub mod server;
pub mod settings;
pub mod validate;

pub use detect::{diagnose, DiagnosticRecord, DiagnosticRule, Severity};
pub use document::TextDocument;
pub use registry::{DictionaryLoader, FunctionRegistry, LoadError, Registry};
pub use server::Backend;
pub use settings::{ClientFlags, SettingsStore, ValidationSettings};
pub use validate::{CollectingTransport, Transport, Validator};
