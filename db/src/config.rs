//! Engine configuration file.
//!
//! Defines the YAML-serializable configuration that tells a front end where
//! fragments and validators live, how validation runs, and which nodes are
//! mandatory.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1.0"
//! fragments:
//!   dir: fragments
//!   bundle: fragments.json
//!   root: root.yaml
//! validators:
//!   dir: /usr/libexec/config-schema/validators
//!   timeout_ms: 5000
//! validation:
//!   fail_fast: false
//!   parallel: true
//! required:
//!   interfaces.pppoe: [source-interface]
//! ```
//!
//! Relative paths are resolved against the directory holding the
//! configuration file when it is loaded with [`EngineConfig::load`].

use std::collections::BTreeMap;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{DatabaseError, Result};
use crate::loader::FragmentStore;

/// Default time budget for one external validator invocation.
pub const DEFAULT_VALIDATOR_TIMEOUT_MS: u64 = 5000;

/// Where schema fragments are loaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentsConfig {
    /// Directory tree of fragment files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// [`FragmentPackage`](config_schema_core::FragmentPackage) bundle,
    /// tried after `dir`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<PathBuf>,
    /// Path of the root fragment within the store.
    pub root: String,
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            bundle: None,
            root: "root.yaml".to_string(),
        }
    }
}

/// External validator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorsConfig {
    /// Directory bare validator names are resolved against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Per-invocation timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for ValidatorsConfig {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_ms: DEFAULT_VALIDATOR_TIMEOUT_MS,
        }
    }
}

/// Validation run settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Stop checking a leaf's values at the first failure.
    pub fail_fast: bool,
    /// Check independent leaves concurrently.
    pub parallel: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            fail_fast: false,
            parallel: true,
        }
    }
}

/// Top-level engine configuration.
///
/// # Examples
///
/// ```
/// use config_schema_db::EngineConfig;
///
/// let config = EngineConfig::parse("fragments: { dir: schema, root: top.yaml }").unwrap();
/// assert_eq!(config.fragments.root, "top.yaml");
/// assert_eq!(config.validators.timeout_ms, 5000);
/// assert!(config.validation.parallel);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Configuration format version (e.g., `"1.0"`).
    pub version: String,
    pub fragments: FragmentsConfig,
    pub validators: ValidatorsConfig,
    pub validation: ValidationConfig,
    /// Mandatory children keyed by dotted container path.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub required: BTreeMap<String, Vec<String>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            fragments: FragmentsConfig::default(),
            validators: ValidatorsConfig::default(),
            validation: ValidationConfig::default(),
            required: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parses configuration from YAML text without resolving paths.
    ///
    /// # Errors
    ///
    /// Returns [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails, or [`InvalidConfig`](crate::DatabaseError::InvalidConfig) if
    /// the content is unusable.
    pub fn parse(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.check()?;
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    ///
    /// Relative fragment and validator paths are made relative to the
    /// file's directory.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be read, [`YamlError`](crate::DatabaseError::YamlError) if parsing
    /// fails, or [`InvalidConfig`](crate::DatabaseError::InvalidConfig) if
    /// the content is unusable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let mut config: Self = serde_yaml::from_reader(reader)?;
        config.check()?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DatabaseError::IoError) if the file cannot
    /// be written, or [`YamlError`](crate::DatabaseError::YamlError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Joins every relative path in the configuration onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for path in [
            &mut self.fragments.dir,
            &mut self.fragments.bundle,
            &mut self.validators.dir,
        ]
        .into_iter()
        .flatten()
        {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Validator timeout as a [`Duration`].
    pub fn validator_timeout(&self) -> Duration {
        Duration::from_millis(self.validators.timeout_ms)
    }

    /// Loads the fragment store from `fragments.dir`, falling back to
    /// `fragments.bundle`.
    ///
    /// # Errors
    ///
    /// Returns [`NoSourcesAvailable`](crate::DatabaseError::NoSourcesAvailable)
    /// if neither source is configured or loads.
    pub fn fragment_store(&self) -> Result<FragmentStore> {
        let mut builder = FragmentStore::builder();
        if let Some(dir) = &self.fragments.dir {
            builder = builder.from_dir(dir);
        }
        if let Some(bundle) = &self.fragments.bundle {
            builder = builder.from_bundle(bundle);
        }
        builder.build()
    }

    /// Required children declared for `container`.
    pub fn required_for(&self, container: &str) -> &[String] {
        self.required
            .get(container)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn check(&self) -> Result<()> {
        if self.fragments.root.trim().is_empty() {
            return Err(DatabaseError::InvalidConfig(
                "fragments.root must not be empty".to_string(),
            ));
        }
        if self.validators.timeout_ms == 0 {
            return Err(DatabaseError::InvalidConfig(
                "validators.timeout_ms must be greater than zero".to_string(),
            ));
        }
        if let Some((container, _)) = self
            .required
            .iter()
            .find(|(_, children)| children.iter().any(|c| c.trim().is_empty()))
        {
            return Err(DatabaseError::InvalidConfig(format!(
                "required children of '{container}' must be non-empty names"
            )));
        }
        Ok(())
    }
}
