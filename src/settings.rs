//! Per-document validation settings and client capability flags.
//!
//! When the client supports `workspace/configuration`, settings are requested
//! per document (section [`SETTINGS_SECTION`]) and cached until the
//! configuration changes or the document closes. Otherwise one global value
//! is used, replaced from `workspace/didChangeConfiguration` payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tower_lsp::lsp_types::{ClientCapabilities, Url};

use crate::validate::Transport;

/// Configuration section requested from the client.
pub const SETTINGS_SECTION: &str = "mded";

/// Problem budget used when the client provides none.
pub const DEFAULT_MAX_PROBLEMS: usize = 1000;

/// Effective settings for validating one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSettings {
    /// Maximum diagnostics per validation pass (always > 0).
    pub max_number_of_problems: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            max_number_of_problems: DEFAULT_MAX_PROBLEMS,
        }
    }
}

impl ValidationSettings {
    /// Read settings from a client-supplied JSON value.
    ///
    /// Fractional values are floored. Missing or non-numeric values, and
    /// values below one, fall back to the default.
    pub fn from_value(value: &Value) -> Self {
        let max_number_of_problems = value
            .get("maxNumberOfProblems")
            .and_then(|n| {
                n.as_u64().or_else(|| {
                    n.as_f64()
                        .filter(|f| f.is_finite() && *f >= 1.0)
                        .map(|f| f.floor() as u64)
                })
            })
            .filter(|&n| n > 0)
            .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
            .unwrap_or(DEFAULT_MAX_PROBLEMS);
        Self {
            max_number_of_problems,
        }
    }
}

/// Client capabilities that change server behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientFlags {
    /// `workspace.configuration`
    pub configuration: bool,
    /// `workspace.workspaceFolders`
    pub workspace_folders: bool,
    /// `textDocument.publishDiagnostics.relatedInformation`
    pub related_information: bool,
}

impl ClientFlags {
    pub fn from_capabilities(capabilities: &ClientCapabilities) -> Self {
        let workspace = capabilities.workspace.as_ref();
        Self {
            configuration: workspace.and_then(|w| w.configuration).unwrap_or(false),
            workspace_folders: workspace.and_then(|w| w.workspace_folders).unwrap_or(false),
            related_information: capabilities
                .text_document
                .as_ref()
                .and_then(|t| t.publish_diagnostics.as_ref())
                .and_then(|p| p.related_information)
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    flags: ClientFlags,
    global: ValidationSettings,
    documents: HashMap<Url, ValidationSettings>,
}

/// Resolves and caches [`ValidationSettings`] per document.
#[derive(Debug, Default)]
pub struct SettingsStore {
    state: RwLock<State>,
}

impl SettingsStore {
    pub fn new(flags: ClientFlags, global: ValidationSettings) -> Self {
        Self {
            state: RwLock::new(State {
                flags,
                global,
                documents: HashMap::new(),
            }),
        }
    }

    pub async fn flags(&self) -> ClientFlags {
        self.state.read().await.flags
    }

    pub async fn set_flags(&self, flags: ClientFlags) {
        self.state.write().await.flags = flags;
    }

    /// Settings for `uri`, asking the client on a cache miss.
    pub async fn resolve<T>(&self, uri: &Url, transport: &T) -> ValidationSettings
    where
        T: Transport + ?Sized,
    {
        {
            let state = self.state.read().await;
            if !state.flags.configuration {
                return state.global;
            }
            if let Some(settings) = state.documents.get(uri) {
                return *settings;
            }
        }

        let settings = transport
            .configuration(uri)
            .await
            .map(|value| ValidationSettings::from_value(&value))
            .unwrap_or_default();

        self.state
            .write()
            .await
            .documents
            .insert(uri.clone(), settings);
        settings
    }

    /// Apply a `workspace/didChangeConfiguration` payload.
    pub async fn configuration_changed(&self, payload: &Value) {
        let mut state = self.state.write().await;
        if state.flags.configuration {
            state.documents.clear();
        } else {
            state.global = payload
                .get(SETTINGS_SECTION)
                .map(ValidationSettings::from_value)
                .unwrap_or_default();
        }
    }

    /// Drop the cached settings of a closed document.
    pub async fn forget(&self, uri: &Url) {
        self.state.write().await.documents.remove(uri);
    }
}
