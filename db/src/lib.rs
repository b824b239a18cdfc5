//! Fragment storage, engine configuration and schema manifests.
//!
//! This crate provides the filesystem side of the schema engine: loading
//! fragments from directories or bundles, reading the engine configuration
//! file, and recording fragment checksums so a deployment can tell when the
//! schema tree needs rebuilding.
//!
//! # Quick start
//!
//! ```no_run
//! use config_schema_db::{EngineConfig, FragmentStore, SchemaManifest};
//!
//! // Load fragments from a directory tree
//! let store = FragmentStore::from_dir("fragments/").unwrap();
//! assert!(store.contains("root.yaml"));
//!
//! // Or let the configuration file pick the sources
//! let config = EngineConfig::load("engine.yml").unwrap();
//! let store = config.fragment_store().unwrap();
//!
//! // Record what the tree was built from
//! let manifest = SchemaManifest::from_store(&store, &config.fragments.root);
//! manifest.save("manifest.json").unwrap();
//! ```

mod config;
mod error;
mod loader;
mod manifest;

pub use config::{
    DEFAULT_VALIDATOR_TIMEOUT_MS, EngineConfig, FragmentsConfig, ValidationConfig,
    ValidatorsConfig,
};
pub use error::{DatabaseError, Result};
pub use loader::{FragmentStore, StoreBuilder, StoreSource, calculate_checksum, parse_fragment};
pub use manifest::{MANIFEST_VERSION, SchemaManifest};
