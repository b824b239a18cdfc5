//! Schema manifests for rebuild detection.
//!
//! A manifest records the SHA-256 checksum of every fragment a schema was
//! built from, plus a combined fingerprint over all of them. Comparing a
//! stored manifest against one computed from the current fragments tells a
//! deployment whether the schema tree must be rebuilt and which fragments
//! changed.
//!
//! # Examples
//!
//! ```no_run
//! use config_schema_db::{FragmentStore, SchemaManifest};
//!
//! let store = FragmentStore::from_dir("fragments/").unwrap();
//! let manifest = SchemaManifest::from_store(&store, "root.yaml");
//! manifest.save("manifest.json").unwrap();
//!
//! let previous = SchemaManifest::load("manifest.json").unwrap();
//! if previous.needs_rebuild(&manifest) {
//!     println!("changed: {:?}", previous.diff(&manifest));
//! }
//! ```

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DatabaseError, Result};
use crate::loader::FragmentStore;

/// Manifest format version.
pub const MANIFEST_VERSION: &str = "1.0";

/// Checksums of the fragments a schema tree was built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaManifest {
    /// Schema contract version (mirrors
    /// [`config_schema_core::SCHEMA_CONTRACT_VERSION`]).
    pub schema_version: String,
    /// Manifest format version.
    pub version: String,
    /// Root fragment path the tree is built from.
    pub root: String,
    /// RFC 3339 timestamp of when the manifest was generated.
    pub generated_at: String,
    /// SHA-256 over every `(path, checksum)` pair, in path order.
    pub fingerprint: String,
    /// Per-fragment SHA-256 hex digests keyed by fragment path.
    pub fragments: BTreeMap<String, String>,
}

impl SchemaManifest {
    /// Builds a manifest from `(path, checksum)` pairs.
    pub fn new<'a, I>(root: impl Into<String>, checksums: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let fragments: BTreeMap<String, String> = checksums
            .into_iter()
            .map(|(path, sum)| (path.to_string(), sum.to_string()))
            .collect();
        let root = root.into();
        Self {
            schema_version: config_schema_core::SCHEMA_CONTRACT_VERSION.to_string(),
            version: MANIFEST_VERSION.to_string(),
            fingerprint: combined_fingerprint(&root, &fragments),
            root,
            generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            fragments,
        }
    }

    /// Records the checksums held by `store`.
    pub fn from_store(store: &FragmentStore, root: impl Into<String>) -> Self {
        Self::new(root, store.checksums())
    }

    /// Loads a manifest from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, [`JsonError`](crate::DatabaseError::JsonError) if the content
    /// is not manifest JSON, or
    /// [`InvalidManifest`](crate::DatabaseError::InvalidManifest) if the
    /// stored fingerprint does not match the stored checksums.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let manifest: Self = serde_json::from_reader(reader)?;
        manifest.verify()?;
        Ok(manifest)
    }

    /// Saves the manifest as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`JsonError`](crate::DatabaseError::JsonError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Checks that `fingerprint` agrees with `root` and `fragments`.
    ///
    /// # Errors
    ///
    /// [`InvalidManifest`](crate::DatabaseError::InvalidManifest) on mismatch.
    pub fn verify(&self) -> Result<()> {
        let expected = combined_fingerprint(&self.root, &self.fragments);
        if expected != self.fingerprint {
            return Err(DatabaseError::InvalidManifest(format!(
                "fingerprint {} does not match fragment checksums ({expected})",
                self.fingerprint
            )));
        }
        Ok(())
    }

    /// Returns `true` when a tree built from `self` is stale relative to
    /// `other`.
    pub fn needs_rebuild(&self, other: &SchemaManifest) -> bool {
        self.schema_version != other.schema_version || self.fingerprint != other.fingerprint
    }

    /// Returns the fragment paths that differ between `self` and `other`.
    ///
    /// A fragment is considered changed if it exists in only one manifest or
    /// its checksum differs. The result is sorted.
    ///
    /// # Examples
    ///
    /// ```
    /// use config_schema_db::SchemaManifest;
    ///
    /// let old = SchemaManifest::new("root.yaml", [("root.yaml", "aa"), ("a.yaml", "bb")]);
    /// let new = SchemaManifest::new("root.yaml", [("root.yaml", "aa"), ("a.yaml", "cc"), ("b.yaml", "dd")]);
    ///
    /// assert!(old.needs_rebuild(&new));
    /// assert_eq!(old.diff(&new), vec!["a.yaml".to_string(), "b.yaml".to_string()]);
    /// ```
    pub fn diff(&self, other: &SchemaManifest) -> Vec<String> {
        let mut changed: Vec<String> = self
            .fragments
            .iter()
            .filter(|(path, sum)| other.fragments.get(*path) != Some(*sum))
            .map(|(path, _)| path.clone())
            .collect();

        changed.extend(
            other
                .fragments
                .keys()
                .filter(|path| !self.fragments.contains_key(*path))
                .cloned(),
        );

        changed.sort();
        changed
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fragments.contains_key(path)
    }

    pub fn checksum(&self, path: &str) -> Option<&str> {
        self.fragments.get(path).map(String::as_str)
    }
}

fn combined_fingerprint(root: &str, fragments: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(root.as_bytes());
    hasher.update(b"\n");
    for (path, sum) in fragments {
        hasher.update(path.as_bytes());
        hasher.update(b"\0");
        hasher.update(sum.as_bytes());
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}
