use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::NodeDescriptor;

/// Serializable fragment bundle used for distribution.
///
/// A package maps normalized fragment paths (e.g.
/// `include/constraint/interface-name.yaml`) to their descriptors, so a
/// whole schema can be shipped as one JSON file and fed straight to the
/// include resolver.
///
/// # Examples
///
/// ```
/// use config_schema_core::*;
///
/// let mut package = FragmentPackage::new("1.0.0", "root.yaml");
/// package.insert("root.yaml", NodeDescriptor::new("").with_include("interfaces.yaml"));
/// package.insert("interfaces.yaml", NodeDescriptor::new("").with_child(NodeDescriptor::container("interfaces")));
///
/// assert_eq!(package.fragment_count(), 2);
/// assert!(package.root_fragment().is_some());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentPackage {
    /// Fragment contract version (populated from
    /// [`SCHEMA_CONTRACT_VERSION`](crate::SCHEMA_CONTRACT_VERSION)).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Package format version (semver string).
    pub version: String,
    /// Optional package name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Path of the root fragment within `fragments`.
    pub root: String,
    /// Fragments keyed by normalized path.
    pub fragments: BTreeMap<String, NodeDescriptor>,
}

impl FragmentPackage {
    pub fn new(version: impl Into<String>, root: impl Into<String>) -> Self {
        Self {
            schema_version: Some(crate::SCHEMA_CONTRACT_VERSION.to_string()),
            version: version.into(),
            name: None,
            root: root.into(),
            fragments: BTreeMap::new(),
        }
    }

    /// Inserts or replaces a fragment.
    pub fn insert(&mut self, path: impl Into<String>, fragment: NodeDescriptor) {
        self.fragments.insert(path.into(), fragment);
    }

    pub fn root_fragment(&self) -> Option<&NodeDescriptor> {
        self.fragments.get(&self.root)
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }
}
