//! Dictionary loading with a fixed retry budget.
//!
//! Each attempt reads the raw bytes and parses them in full. A read error, a
//! parse error, or an empty file consumes one attempt; attempts follow each
//! other immediately. Only a fully parsed dictionary ever reaches
//! [`Registry::replace_all`], so a failed load leaves the previous contents in
//! place.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use thiserror::Error;

use super::{DictionaryData, FunctionRegistry, Registry};

/// Attempts made by [`DictionaryLoader::load`] before giving up.
pub const MAX_LOAD_ATTEMPTS: usize = 3;

/// Errors that can occur while loading a dictionary.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("reading dictionary: {0}")]
    Io(#[from] io::Error),
    #[error("parsing dictionary: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("dictionary file is empty")]
    Empty,
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<LoadError>,
    },
}

/// Where dictionary bytes come from.
#[async_trait]
pub trait DictionarySource: Send + Sync {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads dictionaries from the local file system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

#[async_trait]
impl DictionarySource for FsSource {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }
}

/// Loads dictionary files into a [`Registry`].
#[derive(Debug, Clone)]
pub struct DictionaryLoader<S = FsSource> {
    source: S,
    max_attempts: usize,
}

impl DictionaryLoader<FsSource> {
    /// Create a loader that reads from the file system.
    pub fn new() -> Self {
        Self::with_source(FsSource)
    }
}

impl Default for DictionaryLoader<FsSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: DictionarySource> DictionaryLoader<S> {
    /// Create a loader backed by a custom byte source.
    pub fn with_source(source: S) -> Self {
        Self {
            source,
            max_attempts: MAX_LOAD_ATTEMPTS,
        }
    }

    /// Override the number of attempts (at least one).
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Load the dictionary at `path` and swap it into `registry`.
    ///
    /// Returns the number of distinct function names on success. On failure
    /// the registry is untouched and the last attempt's error is returned
    /// wrapped in [`LoadError::Exhausted`].
    pub async fn load(&self, path: &Path, registry: &Registry) -> Result<usize, LoadError> {
        let mut last = LoadError::Empty;

        for attempt in 1..=self.max_attempts {
            match self.try_load(path).await {
                Ok(next) => {
                    let count = next.len();
                    let files = next.files().count();
                    registry.replace_all(next);
                    tracing::debug!(
                        path = %path.display(),
                        attempt,
                        files,
                        functions = count,
                        "dictionary loaded"
                    );
                    return Ok(count);
                }
                Err(e) => {
                    tracing::debug!(
                        path = %path.display(),
                        attempt,
                        error = %e,
                        "dictionary load attempt failed"
                    );
                    last = e;
                }
            }
        }

        tracing::warn!(
            path = %path.display(),
            attempts = self.max_attempts,
            error = %last,
            "giving up on dictionary"
        );
        Err(LoadError::Exhausted {
            attempts: self.max_attempts,
            last: Box::new(last),
        })
    }

    async fn try_load(&self, path: &Path) -> Result<FunctionRegistry, LoadError> {
        let bytes = self.source.read(path).await?;
        parse_dictionary(&bytes)
    }
}

/// Parse raw dictionary bytes into a registry snapshot.
///
/// Blank input is rejected rather than treated as a dictionary with no
/// functions.
pub fn parse_dictionary(bytes: &[u8]) -> Result<FunctionRegistry, LoadError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(LoadError::Empty);
    }
    let data: DictionaryData = serde_json::from_slice(bytes)?;
    Ok(FunctionRegistry::from_data(data))
}
