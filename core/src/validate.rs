//! Structural descriptor validation.
//!
//! Checks a (raw or expanded) descriptor tree for problems that do not need
//! include resolution to detect: empty or malformed names, duplicate
//! siblings, leaves with children, and flag combinations that make no
//! sense. The engine runs this on the expanded tree before compiling.
//!
//! # Examples
//!
//! ```
//! use config_schema_core::*;
//!
//! let good = NodeDescriptor::container("pppoe").with_child(NodeDescriptor::leaf("mtu"));
//! assert!(validate_descriptor(&good).is_empty());
//!
//! let bad = NodeDescriptor::container("pppoe")
//!     .with_child(NodeDescriptor::leaf("mtu"))
//!     .with_child(NodeDescriptor::leaf("mtu"));
//! assert!(!validate_descriptor(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{NodeDescriptor, NodeKind, NodePath};

/// Descriptor validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A non-root node has an empty or whitespace-only name.
    #[error("node name cannot be empty (under '{0}')")]
    EmptyName(NodePath),
    /// A node name contains whitespace or a path separator.
    #[error("invalid node name '{name}' under '{parent}'")]
    InvalidName { parent: NodePath, name: String },
    /// Two siblings share the same name.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodePath),
    /// A node explicitly declared as a leaf has children.
    #[error("leaf node has children: {0}")]
    LeafWithChildren(NodePath),
    /// A node is both `multi` and `valueless`.
    #[error("node cannot be both multi and valueless: {0}")]
    MultiValueless(NodePath),
}

/// Validates a descriptor tree rooted at `root`.
///
/// The root itself is anonymous and its name is not checked. Validation
/// stops at the first error, matching the fail-early style of schema builds.
pub fn validate_descriptor(root: &NodeDescriptor) -> Vec<DescriptorError> {
    let mut errors = Vec::new();
    let path = NodePath::root();
    if let Err(err) = validate_children(root, &path) {
        errors.push(err);
    }
    errors
}

fn validate_children(node: &NodeDescriptor, path: &NodePath) -> Result<(), DescriptorError> {
    if node.kind == Some(NodeKind::Leaf) && !node.children.is_empty() {
        return Err(DescriptorError::LeafWithChildren(path.clone()));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for child in &node.children {
        let name = child.name.as_str();
        if name.trim().is_empty() {
            return Err(DescriptorError::EmptyName(path.clone()));
        }
        if name.contains(|c: char| c.is_whitespace() || c == '.') {
            return Err(DescriptorError::InvalidName {
                parent: path.clone(),
                name: name.to_string(),
            });
        }
        let child_path = path.child(name);
        if !seen.insert(name) {
            return Err(DescriptorError::DuplicateNode(child_path));
        }
        if child.multi && child.valueless {
            return Err(DescriptorError::MultiValueless(child_path));
        }
        validate_children(child, &child_path)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_duplicate_siblings() {
        let root = NodeDescriptor::new("").with_child(
            NodeDescriptor::container("interfaces")
                .with_child(NodeDescriptor::leaf("description"))
                .with_child(NodeDescriptor::leaf("description")),
        );
        assert_eq!(
            validate_descriptor(&root),
            vec![DescriptorError::DuplicateNode(NodePath::parse(
                "interfaces.description"
            ))]
        );
    }

    #[test]
    fn test_same_name_in_different_scopes_is_fine() {
        let root = NodeDescriptor::new("")
            .with_child(NodeDescriptor::container("a").with_child(NodeDescriptor::leaf("mtu")))
            .with_child(NodeDescriptor::container("b").with_child(NodeDescriptor::leaf("mtu")));
        assert!(validate_descriptor(&root).is_empty());
    }

    #[test]
    fn test_rejects_empty_and_dotted_names() {
        let root = NodeDescriptor::new("").with_child(NodeDescriptor::leaf(" "));
        assert_eq!(
            validate_descriptor(&root),
            vec![DescriptorError::EmptyName(NodePath::root())]
        );

        let root = NodeDescriptor::new("").with_child(NodeDescriptor::leaf("a.b"));
        assert!(matches!(
            validate_descriptor(&root).as_slice(),
            [DescriptorError::InvalidName { .. }]
        ));
    }

    #[test]
    fn test_rejects_leaf_with_children() {
        let mut leaf = NodeDescriptor::leaf("mtu");
        leaf.children.push(NodeDescriptor::leaf("x"));
        let root = NodeDescriptor::new("").with_child(leaf);
        assert_eq!(
            validate_descriptor(&root),
            vec![DescriptorError::LeafWithChildren(NodePath::parse("mtu"))]
        );
    }

    #[test]
    fn test_rejects_multi_valueless() {
        let root = NodeDescriptor::new("").with_child(NodeDescriptor::leaf("disable").multi().valueless());
        assert_eq!(
            validate_descriptor(&root),
            vec![DescriptorError::MultiValueless(NodePath::parse("disable"))]
        );
    }
}
