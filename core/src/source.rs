//! Fragment lookup seam used by the include resolver.
//!
//! A [`FragmentSource`] maps a normalized fragment path to a parsed
//! [`NodeDescriptor`]. In-memory maps and [`FragmentPackage`] implement it
//! directly; the db crate provides a directory-backed store.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use crate::{FragmentPackage, NodeDescriptor};

/// Failure to produce a fragment that does exist.
///
/// A missing fragment is not an error at this level; sources return
/// `Ok(None)` and the resolver decides how to report it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load fragment '{path}': {message}")]
pub struct FragmentError {
    pub path: String,
    pub message: String,
}

impl FragmentError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Lookup function `path -> fragment`.
pub trait FragmentSource {
    /// Loads the fragment stored at the normalized `path`.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError`] when the fragment exists but cannot be read
    /// or parsed.
    fn load(&self, path: &str) -> Result<Option<NodeDescriptor>, FragmentError>;
}

impl FragmentSource for HashMap<String, NodeDescriptor> {
    fn load(&self, path: &str) -> Result<Option<NodeDescriptor>, FragmentError> {
        Ok(self.get(path).cloned())
    }
}

impl FragmentSource for BTreeMap<String, NodeDescriptor> {
    fn load(&self, path: &str) -> Result<Option<NodeDescriptor>, FragmentError> {
        Ok(self.get(path).cloned())
    }
}

impl FragmentSource for FragmentPackage {
    fn load(&self, path: &str) -> Result<Option<NodeDescriptor>, FragmentError> {
        Ok(self.fragments.get(path).cloned())
    }
}

impl<T: FragmentSource + ?Sized> FragmentSource for &T {
    fn load(&self, path: &str) -> Result<Option<NodeDescriptor>, FragmentError> {
        (**self).load(path)
    }
}

/// Normalizes a relative include path.
///
/// Collapses `.` segments, repeated separators and `..` segments, and turns
/// backslashes into forward slashes. Returns `None` if the path is empty or
/// climbs above the fragment root.
///
/// # Examples
///
/// ```
/// use config_schema_core::normalize_include_path;
///
/// assert_eq!(
///     normalize_include_path("./include//constraint/../constraint/iface.yaml").as_deref(),
///     Some("include/constraint/iface.yaml")
/// );
/// assert_eq!(normalize_include_path("../outside.yaml"), None);
/// assert_eq!(normalize_include_path(""), None);
/// ```
pub fn normalize_include_path(path: &str) -> Option<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_source_returns_none_for_missing() {
        let mut map = HashMap::new();
        map.insert("a.yaml".to_string(), NodeDescriptor::leaf("a"));
        assert_eq!(map.load("a.yaml").unwrap(), Some(NodeDescriptor::leaf("a")));
        assert_eq!(map.load("b.yaml").unwrap(), None);
    }

    #[test]
    fn test_normalize_strips_leading_slash_and_backslashes() {
        assert_eq!(
            normalize_include_path("/include\\iface.yaml").as_deref(),
            Some("include/iface.yaml")
        );
        assert_eq!(normalize_include_path("a/b/../../c").as_deref(), Some("c"));
        assert_eq!(normalize_include_path("a/.."), None);
    }
}
