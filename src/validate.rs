//! Validation passes: load the sidecar dictionary, resolve settings, scan,
//! publish.

use async_trait::async_trait;
use futures::future::join_all;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tower_lsp::lsp_types::Url;

use crate::detect::{diagnose, DiagnosticRecord};
use crate::document::TextDocument;
use crate::registry::{
    DictionaryLoader, DictionarySource, FsSource, Registry, DICTIONARY_FILE_NAME,
};
use crate::settings::SettingsStore;

/// The editor side of a validation pass.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Raw `workspace/configuration` answer for one document, if any.
    async fn configuration(&self, uri: &Url) -> Option<Value>;

    /// Deliver the complete diagnostic set of one pass.
    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<DiagnosticRecord>,
        version: Option<i32>,
    );
}

/// Location of the dictionary for a document: its own file name replaced
/// with [`DICTIONARY_FILE_NAME`].
pub fn dictionary_path(uri: &Url) -> PathBuf {
    let document = uri
        .to_file_path()
        .unwrap_or_else(|_| PathBuf::from(uri.path()));
    document.with_file_name(DICTIONARY_FILE_NAME)
}

/// Owns the registry, loader and settings shared by every validation pass.
pub struct Validator<S = FsSource> {
    registry: Registry,
    loader: DictionaryLoader<S>,
    settings: SettingsStore,
    dictionary: Option<PathBuf>,
}

impl Validator<FsSource> {
    pub fn new() -> Self {
        Self::with_loader(DictionaryLoader::new())
    }
}

impl Default for Validator<FsSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DictionarySource> Validator<S> {
    pub fn with_loader(loader: DictionaryLoader<S>) -> Self {
        Self {
            registry: Registry::new(),
            loader,
            settings: SettingsStore::default(),
            dictionary: None,
        }
    }

    pub fn with_settings(mut self, settings: SettingsStore) -> Self {
        self.settings = settings;
        self
    }

    /// Use one dictionary file for every document instead of the sidecar.
    pub fn with_dictionary<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dictionary = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Dictionary file consulted when validating `uri`.
    pub fn dictionary_for(&self, uri: &Url) -> PathBuf {
        match &self.dictionary {
            Some(path) => path.clone(),
            None => dictionary_path(uri),
        }
    }

    /// Validate one document and publish its diagnostics.
    ///
    /// A dictionary that cannot be loaded is not fatal: the pass runs against
    /// whatever the registry held before.
    pub async fn validate<T>(&self, document: &TextDocument, transport: &T)
    where
        T: Transport + ?Sized,
    {
        let dictionary = self.dictionary_for(document.uri());
        if let Err(e) = self.loader.load(&dictionary, &self.registry).await {
            tracing::debug!(
                uri = %document.uri(),
                dictionary = %dictionary.display(),
                error = %e,
                "dictionary unavailable, using previous registry"
            );
        }
        // Snapshot right after our own load so a concurrent reload for
        // another document cannot change what this pass sees
        let registry = self.registry.snapshot();

        let settings = self.settings.resolve(document.uri(), transport).await;
        let related_information = self.settings.flags().await.related_information;

        let dictionary_name = dictionary
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| DICTIONARY_FILE_NAME.to_string());
        let diagnostics = diagnose(
            document,
            &registry,
            &settings,
            related_information,
            &dictionary_name,
        );
        tracing::debug!(
            uri = %document.uri(),
            version = document.version(),
            diagnostics = diagnostics.len(),
            "validated document"
        );

        transport
            .publish_diagnostics(
                document.uri().clone(),
                diagnostics,
                Some(document.version()),
            )
            .await;
    }

    /// Revalidate several documents concurrently, e.g. after a
    /// configuration change.
    pub async fn validate_all<T>(&self, documents: &[TextDocument], transport: &T)
    where
        T: Transport + ?Sized,
    {
        tracing::debug!(documents = documents.len(), "revalidating open documents");
        join_all(
            documents
                .iter()
                .map(|document| self.validate(document, transport)),
        )
        .await;
    }
}

/// A transport that records published diagnostics and has no client-side
/// configuration. Used for one-shot checks outside an editor.
#[derive(Debug, Default)]
pub struct CollectingTransport {
    published: Mutex<Vec<(Url, Vec<DiagnosticRecord>)>>,
}

impl CollectingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything published so far, sorted by document URI.
    pub fn into_results(self) -> Vec<(Url, Vec<DiagnosticRecord>)> {
        let mut results = match self.published.into_inner() {
            Ok(results) => results,
            Err(poisoned) => poisoned.into_inner(),
        };
        results.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        results
    }
}

#[async_trait]
impl Transport for CollectingTransport {
    async fn configuration(&self, _uri: &Url) -> Option<Value> {
        None
    }

    async fn publish_diagnostics(
        &self,
        uri: Url,
        diagnostics: Vec<DiagnosticRecord>,
        _version: Option<i32>,
    ) {
        let mut published = match self.published.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Later passes for the same document replace earlier ones
        published.retain(|(existing, _)| existing != &uri);
        published.push((uri, diagnostics));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::DiagnosticRule;
    use crate::settings::{ClientFlags, ValidationSettings};
    use tempfile::TempDir;

    const DICTIONARY: &str = r#"{
        "shapes": {
            "draw": { "location": "shapes.mded", "parameters": ["x", "y", "color"] }
        }
    }"#;

    #[test]
    fn test_dictionary_path_replaces_file_name() {
        let uri = Url::parse("file:///home/user/notes/page.mded").unwrap();
        assert_eq!(
            dictionary_path(&uri),
            PathBuf::from("/home/user/notes/dictionary.mded.json")
        );
    }

    #[tokio::test]
    async fn test_validate_publishes_against_sidecar_dictionary() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(DICTIONARY_FILE_NAME), DICTIONARY).unwrap();
        let page = temp.path().join("page.mded");
        let uri = Url::from_file_path(&page).unwrap();
        let document = TextDocument::new(uri.clone(), 3, "$ draw (1, 2, 3)\n$ wobble (1)");

        let validator = Validator::new();
        let transport = CollectingTransport::new();
        validator.validate(&document, &transport).await;

        let results = transport.into_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, uri);
        let messages: Vec<_> = results[0].1.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["draw has 3 parameters", "wobble is an invalid function name."]
        );
    }

    #[tokio::test]
    async fn test_missing_dictionary_flags_every_call() {
        let temp = TempDir::new().unwrap();
        let uri = Url::from_file_path(temp.path().join("page.mded")).unwrap();
        let document = TextDocument::new(uri, 1, "$ draw (1)\n$ erase (2)");

        let validator = Validator::new();
        let transport = CollectingTransport::new();
        validator.validate(&document, &transport).await;

        let results = transport.into_results();
        assert!(results[0]
            .1
            .iter()
            .all(|d| d.rule == DiagnosticRule::InvalidFunction));
        assert_eq!(results[0].1.len(), 2);
        assert!(validator.registry().snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_dictionary_override_and_settings() {
        let temp = TempDir::new().unwrap();
        let dictionary = temp.path().join("shared.json");
        std::fs::write(&dictionary, DICTIONARY).unwrap();
        let uri = Url::parse("file:///elsewhere/page.mded").unwrap();
        let document = TextDocument::new(uri, 1, "$ draw (1)\nAB CD EF");

        let settings = SettingsStore::new(
            ClientFlags {
                related_information: true,
                ..Default::default()
            },
            ValidationSettings {
                max_number_of_problems: 2,
            },
        );
        let validator = Validator::new()
            .with_dictionary(&dictionary)
            .with_settings(settings);
        let transport = CollectingTransport::new();
        validator.validate(&document, &transport).await;

        let diagnostics = &transport.into_results()[0].1;
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].message, "draw has 1 parameters");
        assert_eq!(
            diagnostics[1].related_information.as_ref().map(Vec::len),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_unknown_function_hint_names_override() {
        let temp = TempDir::new().unwrap();
        let dictionary = temp.path().join("shared.json");
        std::fs::write(&dictionary, DICTIONARY).unwrap();
        let document = TextDocument::new(Url::parse("file:///x/page.mded").unwrap(), 1, "$ nope (1)");

        let settings = SettingsStore::new(
            ClientFlags {
                related_information: true,
                ..Default::default()
            },
            ValidationSettings::default(),
        );
        let validator = Validator::new()
            .with_dictionary(&dictionary)
            .with_settings(settings);
        let transport = CollectingTransport::new();
        validator.validate(&document, &transport).await;

        let diagnostics = &transport.into_results()[0].1;
        let related = diagnostics[0].related_information.as_ref().unwrap();
        assert_eq!(related[0].message, "no function named 'nope' in shared.json");
    }

    #[tokio::test]
    async fn test_configuration_change_reaches_revalidation() {
        let documents = vec![
            TextDocument::new(Url::parse("file:///x/a.mded").unwrap(), 1, "AB CD EF"),
            TextDocument::new(Url::parse("file:///x/b.mded").unwrap(), 4, "GH IJ"),
        ];
        let validator = Validator::new();

        let transport = CollectingTransport::new();
        validator.validate_all(&documents, &transport).await;
        let counts: Vec<_> = transport
            .into_results()
            .iter()
            .map(|(_, d)| d.len())
            .collect();
        assert_eq!(counts, vec![3, 2]);

        validator
            .settings()
            .configuration_changed(&serde_json::json!({ "mded": { "maxNumberOfProblems": 1 } }))
            .await;
        let transport = CollectingTransport::new();
        validator.validate_all(&documents, &transport).await;
        let counts: Vec<_> = transport
            .into_results()
            .iter()
            .map(|(_, d)| d.len())
            .collect();
        assert_eq!(counts, vec![1, 1]);
    }

    #[tokio::test]
    async fn test_collecting_transport_keeps_latest_pass() {
        let transport = CollectingTransport::new();
        let uri = Url::parse("file:///a.mded").unwrap();
        transport.publish_diagnostics(uri.clone(), Vec::new(), Some(1)).await;
        transport.publish_diagnostics(uri, Vec::new(), Some(2)).await;
        assert_eq!(transport.into_results().len(), 1);
    }
}
