//! Include merge policy.
//!
//! When a node includes another fragment, [`merge_included`] folds the
//! (already expanded) fragment into the including node. Properties defined
//! directly on the including node take precedence; flags such as `multi`
//! augment the included content rather than overwrite it; constraints and
//! children concatenate.
//!
//! # Example
//!
//! ```
//! use config_schema_core::*;
//!
//! let included = NodeDescriptor::new("")
//!     .with_help("Interface name")
//!     .with_constraint(ConstraintSpec::external("interface-name"));
//!
//! let including = NodeDescriptor::leaf("interface")
//!     .with_help("Interface used for mirroring")
//!     .with_constraint(ConstraintSpec::pattern(".+"))
//!     .multi();
//!
//! let merged = merge_included(including, included);
//! assert_eq!(merged.help.as_deref(), Some("Interface used for mirroring"));
//! assert!(merged.multi);
//! assert_eq!(merged.constraints.len(), 2);
//! ```

use crate::NodeDescriptor;

/// Merges an included fragment into the including node.
///
/// - `name`, `kind`, `help`, `completion_help`, `constraint_error_message`,
///   `priority`, `value_help`: the including node's value wins; the included
///   value fills in only when the including node leaves it unset/empty.
/// - `multi`, `valueless`: logical OR.
/// - `constraints`: own entries first, then included entries (logical AND).
/// - `children`: own children first, then included children. Duplicate names
///   are left in place for the tree builder to reject.
/// - `includes`: the included fragment must already be expanded; its own
///   include list is discarded.
pub fn merge_included(including: NodeDescriptor, included: NodeDescriptor) -> NodeDescriptor {
    let mut merged = including;

    if merged.name.is_empty() {
        merged.name = included.name;
    }
    merged.kind = merged.kind.or(included.kind);
    merged.help = merged.help.or(included.help);
    merged.completion_help = merged.completion_help.or(included.completion_help);
    merged.constraint_error_message = merged
        .constraint_error_message
        .or(included.constraint_error_message);
    merged.priority = merged.priority.or(included.priority);
    if merged.value_help.is_empty() {
        merged.value_help = included.value_help;
    }

    merged.multi |= included.multi;
    merged.valueless |= included.valueless;

    merged.constraints.extend(included.constraints);
    merged.children.extend(included.children);

    merged
}
