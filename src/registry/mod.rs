//! Registry of known mded functions.
//!
//! The registry is built from a `dictionary.mded.json` sidecar file shaped as
//! a two-level JSON object:
//!
//! ```json
//! {
//!   "shapes.mded": {
//!     "draw": { "location": "shapes.mded", "parameters": ["x", "y", "color"] }
//!   }
//! }
//! ```
//!
//! The top level is keyed by an arbitrary file identifier, the second level by
//! function name. A [`FunctionRegistry`] is an immutable snapshot of one parsed
//! dictionary; [`Registry`] is the shared handle whose snapshot is swapped
//! wholesale by the [`DictionaryLoader`].

mod loader;

pub use loader::{
    parse_dictionary, DictionaryLoader, DictionarySource, FsSource, LoadError, MAX_LOAD_ATTEMPTS,
};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

/// Name of the dictionary file expected beside every document.
pub const DICTIONARY_FILE_NAME: &str = "dictionary.mded.json";

/// A known function: where it is declared and its formal parameter names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    pub location: String,
    pub parameters: Vec<String>,
}

/// Raw dictionary contents: file identifier -> function name -> signature.
pub type DictionaryData = BTreeMap<String, BTreeMap<String, FunctionSignature>>;

/// Immutable snapshot of one successfully parsed dictionary.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    files: DictionaryData,
    /// Union of every function name across all files.
    names: HashSet<String>,
}

impl FunctionRegistry {
    /// A registry that knows no functions.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry, deriving the flat name set from the nested data.
    pub fn from_data(files: DictionaryData) -> Self {
        let names = files
            .values()
            .flat_map(|functions| functions.keys().cloned())
            .collect();
        Self { files, names }
    }

    /// Whether any dictionary file declares `name`.
    pub fn exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Signature for `name`.
    ///
    /// When several files declare the same name, the file whose identifier
    /// sorts first wins.
    pub fn lookup(&self, name: &str) -> Option<&FunctionSignature> {
        if !self.exists(name) {
            return None;
        }
        self.files.values().find_map(|functions| functions.get(name))
    }

    /// File identifiers present in the dictionary, in sorted order.
    pub fn files(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Number of distinct function names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Shared, swappable registry handle.
///
/// Readers take an `Arc` snapshot and keep it for a whole validation pass;
/// a concurrent [`Registry::replace_all`] never changes a snapshot already
/// handed out.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    current: Arc<RwLock<Arc<FunctionRegistry>>>,
}

impl Registry {
    /// Create an empty registry handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry contents as of now.
    pub fn snapshot(&self) -> Arc<FunctionRegistry> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Replace the whole registry with `next`.
    pub fn replace_all(&self, next: FunctionRegistry) {
        let next = Arc::new(next);
        match self.current.write() {
            Ok(mut guard) => *guard = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }
}
