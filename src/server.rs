//! LSP server for mded documents.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer};

use crate::detect::DiagnosticRecord;
use crate::document::TextDocument;
use crate::settings::{ClientFlags, SETTINGS_SECTION};
use crate::validate::{Transport, Validator};

/// Registration id used for `workspace/didChangeConfiguration`.
const CONFIGURATION_REGISTRATION_ID: &str = "mded-configuration";

/// mded language server state.
pub struct Backend {
    /// LSP client for notifications and requests
    client: Client,
    /// Open documents, latest version only
    documents: Arc<RwLock<HashMap<Url, TextDocument>>>,
    validator: Validator,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self::with_validator(client, Validator::new())
    }

    pub fn with_validator(client: Client, validator: Validator) -> Self {
        Self {
            client,
            documents: Arc::new(RwLock::new(HashMap::new())),
            validator,
        }
    }

    /// Store a document revision and validate it.
    async fn open_or_replace(&self, document: TextDocument) {
        self.documents
            .write()
            .await
            .insert(document.uri().clone(), document.clone());
        self.validator.validate(&document, self).await;
    }

    /// Revalidate every open document.
    async fn validate_all(&self) {
        let documents: Vec<TextDocument> =
            self.documents.read().await.values().cloned().collect();
        self.validator.validate_all(&documents, self).await;
    }
}

#[async_trait]
impl Transport for Backend {
    async fn configuration(&self, uri: &Url) -> Option<Value> {
        let item = ConfigurationItem {
            scope_uri: Some(uri.clone()),
            section: Some(SETTINGS_SECTION.to_string()),
        };
        match self.client.configuration(vec![item]).await {
            Ok(values) => values.into_iter().next(),
            Err(e) => {
                tracing::warn!(uri = %uri, "configuration request failed: {}", e);
                None
            }
        }
    }

    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<DiagnosticRecord>,
        version: Option<i32>,
    ) {
        // Held across the send so a close cannot clear ahead of this publish
        let documents = self.documents.read().await;
        let current = documents.get(&uri).map(TextDocument::version);
        if !should_publish(current, version) {
            tracing::debug!(
                uri = %uri,
                ?version,
                ?current,
                "stale or closed pass, dropping diagnostics"
            );
            return;
        }

        let diagnostics = diagnostics.into_iter().map(Diagnostic::from).collect();
        self.client
            .publish_diagnostics(uri, diagnostics, version)
            .await;
        drop(documents);
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let flags = ClientFlags::from_capabilities(&params.capabilities);
        tracing::info!(
            configuration = flags.configuration,
            workspace_folders = flags.workspace_folders,
            related_information = flags.related_information,
            "initializing mded language server"
        );
        self.validator.settings().set_flags(flags).await;

        Ok(InitializeResult {
            capabilities: server_capabilities(flags),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        if self.validator.settings().flags().await.configuration {
            let registration = Registration {
                id: CONFIGURATION_REGISTRATION_ID.to_string(),
                method: "workspace/didChangeConfiguration".to_string(),
                register_options: None,
            };
            if let Err(e) = self.client.register_capability(vec![registration]).await {
                tracing::warn!("failed to register for configuration changes: {}", e);
            }
        }

        self.client
            .log_message(MessageType::INFO, "mded language server ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down mded language server");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        tracing::debug!(uri = %item.uri, version = item.version, "document opened");
        self.open_or_replace(TextDocument::new(item.uri, item.version, item.text))
            .await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;
        tracing::debug!(uri = %uri, version, "document changed");

        // Full sync: the last change carries the whole text
        match params.content_changes.into_iter().last() {
            Some(change) => {
                self.open_or_replace(TextDocument::new(uri, version, change.text))
                    .await
            }
            None => tracing::debug!(uri = %uri, "change without content ignored"),
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::debug!(uri = %uri, "document closed");

        // Waits for in-flight publishes; later versioned passes find no document
        let mut documents = self.documents.write().await;
        documents.remove(&uri);
        self.validator.settings().forget(&uri).await;

        self.client.publish_diagnostics(uri, Vec::new(), None).await;
        drop(documents);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        tracing::debug!("configuration changed");
        self.validator
            .settings()
            .configuration_changed(&params.settings)
            .await;
        self.validate_all().await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        tracing::info!(changes = params.changes.len(), "watched files changed");
        self.client
            .log_message(MessageType::LOG, "received a file change event")
            .await;
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        tracing::info!(
            added = params.event.added.len(),
            removed = params.event.removed.len(),
            "workspace folders changed"
        );
        self.client
            .log_message(MessageType::LOG, "workspace folder change event received")
            .await;
    }

    async fn completion(&self, _: CompletionParams) -> Result<Option<CompletionResponse>> {
        Ok(Some(CompletionResponse::Array(completion_items())))
    }

    async fn completion_resolve(&self, item: CompletionItem) -> Result<CompletionItem> {
        Ok(resolve_completion(item))
    }
}

/// Whether a pass for `version` may publish, given the stored `current`
/// version (`None` once the document is closed). Unversioned publishes
/// always go out.
pub(crate) fn should_publish(current: Option<i32>, version: Option<i32>) -> bool {
    match (current, version) {
        (_, None) => true,
        (None, Some(_)) => false,
        (Some(current), Some(version)) => current <= version,
    }
}

/// Capabilities advertised in the `initialize` response.
pub fn server_capabilities(flags: ClientFlags) -> ServerCapabilities {
    let workspace = flags.workspace_folders.then(|| WorkspaceServerCapabilities {
        workspace_folders: Some(WorkspaceFoldersServerCapabilities {
            supported: Some(true),
            change_notifications: Some(OneOf::Left(true)),
        }),
        file_operations: None,
    });

    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Kind(
            TextDocumentSyncKind::FULL,
        )),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(true),
            ..Default::default()
        }),
        workspace,
        ..Default::default()
    }
}

/// Static completion list; positions are ignored.
pub fn completion_items() -> Vec<CompletionItem> {
    [("TypeScript", 1), ("JavaScript", 2)]
        .into_iter()
        .map(|(label, data)| CompletionItem {
            label: label.to_string(),
            kind: Some(CompletionItemKind::TEXT),
            data: Some(json!(data)),
            ..Default::default()
        })
        .collect()
}

/// Fill in detail and documentation for an item from [`completion_items`].
pub fn resolve_completion(mut item: CompletionItem) -> CompletionItem {
    let language = match item.data.as_ref().and_then(Value::as_i64) {
        Some(1) => "TypeScript",
        Some(2) => "JavaScript",
        _ => return item,
    };
    item.detail = Some(format!("{} details", language));
    item.documentation = Some(Documentation::String(format!(
        "{} documentation",
        language
    )));
    item
}
