//! Core schema types and shared fragment primitives.
//!
//! This crate defines the foundational types for modeling a hierarchical
//! configuration schema for a network-device CLI:
//!
//! - [`NodeDescriptor`]: one schema node (leaf, container or tag node) with
//!   help, value help, completion hints, constraints and children.
//! - [`ConstraintSpec`]: a raw constraint: pattern, external check, or an
//!   include reference that is resolved away at build time.
//! - [`NodePath`]: the dotted path of a node from the schema root.
//! - [`FragmentPackage`]: a versioned bundle of fragments for distribution.
//! - [`FragmentSource`]: the lookup seam used by include resolution.
//!
//! Include merging ([`merge_included`]) implements the precedence rules for
//! splicing a fragment into the node that includes it. Structural checks
//! ([`validate_descriptor`]) catch duplicate siblings and malformed names.
//!
//! # Example
//!
//! ```
//! use config_schema_core::*;
//!
//! let root = NodeDescriptor::new("").with_child(
//!     NodeDescriptor::container("interfaces").with_child(
//!         NodeDescriptor::tag("pppoe")
//!             .with_constraint(ConstraintSpec::pattern("pppoe[0-9]+"))
//!             .with_child(NodeDescriptor::leaf("source-interface"))
//!             .with_child(NodeDescriptor::leaf("disable").valueless()),
//!     ),
//! );
//!
//! assert!(validate_descriptor(&root).is_empty());
//! assert_eq!(root.node_count(), 5);
//! ```

mod merge;
mod package;
mod source;
mod types;
mod validate;

pub use merge::merge_included;
pub use package::FragmentPackage;
pub use source::{FragmentError, FragmentSource, normalize_include_path};
pub use types::*;
pub use validate::{DescriptorError, validate_descriptor};
