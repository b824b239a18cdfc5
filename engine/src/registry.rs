//! Schema build pipeline and the published-tree registry.
//!
//! [`SchemaBuilder`] runs include resolution, structural checks and
//! constraint compilation as one pass that either yields a complete
//! [`SchemaTree`] or an error. [`SchemaRegistry`] holds the tree currently
//! in effect and replaces it only when a rebuild succeeds.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use config_schema_core::*;
//! use config_schema_engine::{SchemaBuilder, SchemaRegistry};
//!
//! let mut fragments = HashMap::new();
//! fragments.insert(
//!     "root.yaml".to_string(),
//!     NodeDescriptor::new("").with_child(NodeDescriptor::leaf("host-name")),
//! );
//!
//! let registry = SchemaRegistry::new();
//! let builder = SchemaBuilder::new();
//! registry.reload(|| builder.build_fragment("root.yaml", &fragments)).unwrap();
//! assert!(registry.current().unwrap().contains(&NodePath::parse("host-name")));
//!
//! // A failing rebuild leaves the previous tree in place.
//! assert!(registry.reload(|| builder.build_fragment("missing.yaml", &fragments)).is_err());
//! assert!(registry.current().is_some());
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use config_schema_core::{FragmentSource, NodeDescriptor};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::constraint::CompileOptions;
use crate::error::Result;
use crate::resolve::{resolve_fragment, resolve_includes};
use crate::tree::SchemaTree;

/// One-shot schema build: resolve → check → compile → index.
#[derive(Debug, Clone, Default)]
pub struct SchemaBuilder {
    options: CompileOptions,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Sets the directory used to resolve bare validator names.
    pub fn validator_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.options.validator_dir = Some(dir.into());
        self
    }

    /// Sets the time budget for each external check invocation.
    pub fn external_timeout(mut self, timeout: Duration) -> Self {
        self.options.external_timeout = timeout;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Builds a tree from an in-memory root descriptor.
    ///
    /// # Errors
    ///
    /// Any [`BuildError`](crate::BuildError); no partial tree is returned.
    pub fn build<S: FragmentSource + ?Sized>(
        &self,
        root: &NodeDescriptor,
        source: &S,
    ) -> Result<SchemaTree> {
        let resolved = resolve_includes(root, source)?;
        SchemaTree::build(&resolved, &self.options)
    }

    /// Loads the root fragment at `root_path` from `source` and builds a tree.
    ///
    /// # Errors
    ///
    /// Any [`BuildError`](crate::BuildError); no partial tree is returned.
    pub fn build_fragment<S: FragmentSource + ?Sized>(
        &self,
        root_path: &str,
        source: &S,
    ) -> Result<SchemaTree> {
        let resolved = resolve_fragment(root_path, source)?;
        SchemaTree::build(&resolved, &self.options)
    }
}

/// Holder of the schema tree currently in effect.
///
/// Readers take an `Arc` snapshot and then query it without further
/// locking; a reload that fails keeps the previous tree.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    published: RwLock<Published>,
}

/// The published tree and the publish count, updated together.
#[derive(Debug, Default)]
struct Published {
    tree: Option<Arc<SchemaTree>>,
    generation: u64,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with an already built tree published.
    pub fn with_tree(tree: SchemaTree) -> Self {
        Self {
            published: RwLock::new(Published {
                tree: Some(Arc::new(tree)),
                generation: 1,
            }),
        }
    }

    /// Snapshot of the published tree, if any.
    pub fn current(&self) -> Option<Arc<SchemaTree>> {
        self.published.read().tree.clone()
    }

    /// Number of successful publishes so far.
    pub fn generation(&self) -> u64 {
        self.published.read().generation
    }

    /// Runs `build` and publishes its tree on success.
    ///
    /// # Errors
    ///
    /// Returns the build error unchanged; the previously published tree
    /// (if any) stays in effect.
    pub fn reload<F>(&self, build: F) -> Result<Arc<SchemaTree>>
    where
        F: FnOnce() -> Result<SchemaTree>,
    {
        match build() {
            Ok(tree) => {
                let tree = Arc::new(tree);
                let generation = {
                    let mut published = self.published.write();
                    published.tree = Some(Arc::clone(&tree));
                    published.generation += 1;
                    published.generation
                };
                info!(generation, nodes = tree.len(), "Published schema tree");
                Ok(tree)
            }
            Err(err) => {
                warn!(error = %err, "Schema build failed; keeping previous tree");
                Err(err)
            }
        }
    }
}
