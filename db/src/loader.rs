//! Fragment loading with builder pattern and fallback chains.
//!
//! Provides [`FragmentStore`], an in-memory map of fragment path to
//! [`NodeDescriptor`], and [`StoreBuilder`] for constructing a store from
//! several sources with automatic fallback.
//!
//! # Loading patterns
//!
//! ```no_run
//! use config_schema_db::FragmentStore;
//!
//! // Load every *.yaml / *.yml / *.json file under a directory tree
//! let store = FragmentStore::from_dir("/usr/share/config-schema/fragments").unwrap();
//! assert!(store.contains("include/interface/source-interface.yaml"));
//!
//! // Load from a single FragmentPackage JSON bundle
//! let store = FragmentStore::from_bundle("fragments.json").unwrap();
//!
//! // Use the builder for a fallback chain
//! let store = FragmentStore::builder()
//!     .from_dir("/usr/share/config-schema/fragments")
//!     .from_bundle("fragments.json")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Fragments are keyed by their path relative to the directory root, with
//! `/` separators, which is the form include references use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use config_schema_core::{FragmentError, FragmentPackage, FragmentSource, NodeDescriptor};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{DatabaseError, Result};

/// Describes where a [`FragmentStore`] was loaded from.
#[derive(Debug, Clone)]
pub enum StoreSource {
    /// Loaded from a directory tree of fragment files.
    Directory(PathBuf),
    /// Loaded from a single [`FragmentPackage`] JSON file.
    Bundle(PathBuf),
    /// Assembled in memory.
    Memory,
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<StoreSource>),
}

/// A fragment plus the SHA-256 digest of the bytes it was parsed from.
#[derive(Debug, Clone)]
struct StoredFragment {
    descriptor: NodeDescriptor,
    checksum: String,
}

/// In-memory collection of schema fragments keyed by include path.
///
/// Implements [`FragmentSource`], so it can be handed directly to the
/// engine's include resolver.
#[derive(Debug)]
pub struct FragmentStore {
    fragments: BTreeMap<String, StoredFragment>,
    root: Option<String>,
    source: StoreSource,
}

impl FragmentStore {
    /// Returns a new [`StoreBuilder`] for configuring a fallback chain.
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    /// Empty in-memory store.
    pub fn new() -> Self {
        Self {
            fragments: BTreeMap::new(),
            root: None,
            source: StoreSource::Memory,
        }
    }

    /// Loads every fragment file below `path`, recursively.
    ///
    /// Files ending in `.yaml`, `.yml` or `.json` are parsed; anything else
    /// is skipped. Hidden entries (leading `.`) are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the tree cannot be read, or
    /// [`DatabaseError::InvalidFragment`] for the first file that does not
    /// parse as a node descriptor.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut files = Vec::new();
        collect_fragment_files(path, &mut files)?;
        files.sort();

        let mut fragments = BTreeMap::new();
        for file in files {
            let key = relative_key(path, &file);
            let bytes = std::fs::read(&file)?;
            let descriptor = parse_fragment(&key, &file, &bytes)?;
            fragments.insert(
                key,
                StoredFragment {
                    descriptor,
                    checksum: calculate_checksum(&bytes),
                },
            );
        }

        debug!(dir = %path.display(), fragments = fragments.len(), "Loaded fragment directory");
        Ok(Self {
            fragments,
            root: None,
            source: StoreSource::Directory(path.to_path_buf()),
        })
    }

    /// Loads fragments from a single [`FragmentPackage`] JSON file.
    ///
    /// The package's `root` becomes [`root`](Self::root). Checksums are taken
    /// over each fragment's canonical JSON encoding.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::IoError`] if the file cannot be read, or
    /// [`DatabaseError::JsonError`] if parsing fails.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        let package: FragmentPackage = serde_json::from_reader(reader)?;

        let mut store = Self::from_package(package)?;
        store.source = StoreSource::Bundle(path.to_path_buf());
        debug!(bundle = %path.display(), fragments = store.len(), "Loaded fragment bundle");
        Ok(store)
    }

    /// Builds a store from an in-memory package.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::JsonError`] if a fragment cannot be encoded
    /// for checksumming.
    pub fn from_package(package: FragmentPackage) -> Result<Self> {
        let mut store = Self::new();
        store.root = Some(package.root);
        for (key, descriptor) in package.fragments {
            store.insert(key, descriptor)?;
        }
        Ok(store)
    }

    /// Inserts a fragment, replacing any existing entry for the same path.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::JsonError`] if the fragment cannot be encoded
    /// for checksumming.
    pub fn insert(&mut self, path: impl Into<String>, descriptor: NodeDescriptor) -> Result<()> {
        let bytes = serde_json::to_vec(&descriptor)?;
        self.fragments.insert(
            path.into(),
            StoredFragment {
                descriptor,
                checksum: calculate_checksum(&bytes),
            },
        );
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&NodeDescriptor> {
        self.fragments.get(path).map(|f| &f.descriptor)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fragments.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Fragment paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().map(String::as_str)
    }

    /// SHA-256 hex digest recorded for `path`.
    pub fn checksum(&self, path: &str) -> Option<&str> {
        self.fragments.get(path).map(|f| f.checksum.as_str())
    }

    /// `(path, checksum)` pairs in sorted path order.
    pub fn checksums(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fragments
            .iter()
            .map(|(k, f)| (k.as_str(), f.checksum.as_str()))
    }

    /// Root fragment path declared by a bundle, if any.
    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &StoreSource {
        &self.source
    }

    /// Repackages the store as a distributable [`FragmentPackage`].
    pub fn to_package(&self, version: &str, root: &str) -> FragmentPackage {
        let mut package = FragmentPackage::new(version, root);
        for (key, stored) in &self.fragments {
            package.insert(key.clone(), stored.descriptor.clone());
        }
        package
    }
}

impl Default for FragmentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentSource for FragmentStore {
    fn load(&self, path: &str) -> std::result::Result<Option<NodeDescriptor>, FragmentError> {
        Ok(self.get(path).cloned())
    }
}

/// Builder for constructing a [`FragmentStore`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`DatabaseError::NoSourcesAvailable`] is returned.
pub struct StoreBuilder {
    sources: Vec<StoreSource>,
}

impl StoreBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Adds a directory of fragment files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(StoreSource::Directory(path.into()));
        self
    }

    /// Adds a [`FragmentPackage`] bundle file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(StoreSource::Bundle(path.into()));
        self
    }

    /// Attempts to load fragments from configured sources in order.
    ///
    /// Returns the first successfully loaded store. If all sources fail,
    /// returns [`DatabaseError::NoSourcesAvailable`].
    pub fn build(self) -> Result<FragmentStore> {
        if self.sources.is_empty() {
            return Err(DatabaseError::NoSourcesAvailable);
        }

        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                StoreSource::Directory(path) => FragmentStore::from_dir(path),
                StoreSource::Bundle(path) => FragmentStore::from_bundle(path),
                StoreSource::Memory | StoreSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut store) => {
                    store.source = StoreSource::Multiple(all_sources);
                    return Ok(store);
                }
                Err(err) => warn!(source = ?source, error = %err, "Fragment source failed"),
            }
        }

        Err(DatabaseError::NoSourcesAvailable)
    }
}

impl Default for StoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses fragment bytes according to the file extension of `file`.
///
/// # Errors
///
/// [`DatabaseError::UnsupportedFormat`] for unknown extensions and
/// [`DatabaseError::InvalidFragment`] for content that does not decode.
pub fn parse_fragment(key: &str, file: &Path, bytes: &[u8]) -> Result<NodeDescriptor> {
    let invalid = |message: String| DatabaseError::InvalidFragment {
        path: key.to_string(),
        message,
    };
    match file.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_slice(bytes).map_err(|e| invalid(e.to_string())),
        Some("yaml" | "yml") => serde_yaml::from_slice(bytes).map_err(|e| invalid(e.to_string())),
        _ => Err(DatabaseError::UnsupportedFormat(file.to_path_buf())),
    }
}

/// SHA-256 hex digest of `bytes`.
pub fn calculate_checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn is_fragment_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json" | "yaml" | "yml")
    )
}

fn collect_fragment_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        if entry.file_type()?.is_dir() {
            collect_fragment_files(&path, out)?;
        } else if is_fragment_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn relative_key(base: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(base).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
