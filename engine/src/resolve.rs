//! Include resolution.
//!
//! Expands node-level `includes` and constraint-level
//! [`ConstraintSpec::IncludeRef`] entries by splicing in the referenced
//! fragments, recursively, until no include markers remain. Cycles are
//! detected with a stack of in-progress include paths.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use config_schema_core::*;
//! use config_schema_engine::resolve_includes;
//!
//! let mut fragments = HashMap::new();
//! fragments.insert(
//!     "include/constraint/interface-name.yaml".to_string(),
//!     NodeDescriptor::new("").with_constraint(ConstraintSpec::pattern("[a-z]+[0-9]+")),
//! );
//!
//! let root = NodeDescriptor::new("").with_child(
//!     NodeDescriptor::leaf("interface")
//!         .multi()
//!         .with_constraint(ConstraintSpec::include("include/constraint/interface-name.yaml")),
//! );
//!
//! let resolved = resolve_includes(&root, &fragments).unwrap();
//! assert!(!resolved.has_includes());
//! assert_eq!(
//!     resolved.children[0].constraints,
//!     vec![ConstraintSpec::pattern("[a-z]+[0-9]+")]
//! );
//! ```

use config_schema_core::{
    ConstraintSpec, FragmentSource, NodeDescriptor, merge_included, normalize_include_path,
};
use tracing::debug;

use crate::error::{BuildError, Result};

const ROOT_LABEL: &str = "<root>";

/// Expands every include in `root` using `source` for lookups.
///
/// Pure transformation: `root` is not modified. A tree without includes is
/// returned unchanged, so resolving an already-resolved tree is a no-op.
///
/// # Errors
///
/// - [`BuildError::IncludeNotFound`] when a path does not resolve.
/// - [`BuildError::CircularInclude`] when an include chain loops.
/// - [`BuildError::FragmentLoad`] when the source fails to load a fragment.
pub fn resolve_includes<S: FragmentSource + ?Sized>(
    root: &NodeDescriptor,
    source: &S,
) -> Result<NodeDescriptor> {
    let mut resolver = Resolver {
        source,
        stack: Vec::new(),
        expanded: 0,
    };
    let resolved = resolver.expand_node(root.clone())?;
    debug!(expanded = resolver.expanded, "Resolved includes");
    Ok(resolved)
}

/// Loads `root_path` from `source` and expands it.
///
/// The root fragment participates in cycle detection, so a fragment that
/// includes itself is reported as circular.
pub fn resolve_fragment<S: FragmentSource + ?Sized>(
    root_path: &str,
    source: &S,
) -> Result<NodeDescriptor> {
    let mut resolver = Resolver {
        source,
        stack: Vec::new(),
        expanded: 0,
    };
    resolver.expand_fragment(root_path, ROOT_LABEL)
}

struct Resolver<'a, S: ?Sized> {
    source: &'a S,
    stack: Vec<String>,
    expanded: usize,
}

impl<S: FragmentSource + ?Sized> Resolver<'_, S> {
    fn current(&self) -> &str {
        self.stack.last().map(String::as_str).unwrap_or(ROOT_LABEL)
    }

    /// Loads, cycle-checks and fully expands the fragment at `raw_path`.
    fn expand_fragment(&mut self, raw_path: &str, included_from: &str) -> Result<NodeDescriptor> {
        let not_found = || BuildError::IncludeNotFound {
            path: raw_path.to_string(),
            included_from: included_from.to_string(),
        };
        let path = normalize_include_path(raw_path).ok_or_else(not_found)?;

        if let Some(start) = self.stack.iter().position(|p| *p == path) {
            let mut chain = self.stack[start..].to_vec();
            chain.push(path);
            return Err(BuildError::CircularInclude { chain });
        }

        let fragment = self.source.load(&path)?.ok_or_else(not_found)?;
        debug!(path = %path, from = included_from, "Expanding include");

        self.stack.push(path);
        let expanded = self.expand_node(fragment);
        self.stack.pop();
        self.expanded += 1;
        expanded
    }

    fn expand_node(&mut self, mut node: NodeDescriptor) -> Result<NodeDescriptor> {
        let includes = std::mem::take(&mut node.includes);
        let raw_constraints = std::mem::take(&mut node.constraints);
        let raw_children = std::mem::take(&mut node.children);

        node.constraints = self.expand_constraints(raw_constraints)?;
        node.children = raw_children
            .into_iter()
            .map(|child| self.expand_node(child))
            .collect::<Result<Vec<_>>>()?;

        for include in includes {
            let from = self.current().to_string();
            let fragment = self.expand_fragment(&include, &from)?;
            node = merge_included(node, fragment);
        }

        Ok(node)
    }

    fn expand_constraints(&mut self, specs: Vec<ConstraintSpec>) -> Result<Vec<ConstraintSpec>> {
        let mut out = Vec::with_capacity(specs.len());
        for spec in specs {
            match spec {
                ConstraintSpec::IncludeRef { path } => {
                    let from = self.current().to_string();
                    let fragment = self.expand_fragment(&path, &from)?;
                    out.extend(fragment.constraints);
                }
                other => out.push(other),
            }
        }
        Ok(out)
    }
}
