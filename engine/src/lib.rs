//! Schema composition, constraint compilation and configuration validation.
//!
//! This crate turns raw fragments into an immutable [`SchemaTree`] and
//! checks candidate configurations against it:
//!
//! 1. [`resolve_includes`] / [`resolve_fragment`] splice referenced
//!    fragments into the including nodes, rejecting missing and circular
//!    includes.
//! 2. [`compile_constraints`] turns each node's constraints into a
//!    [`ConstraintSet`] of anchored patterns and external checks.
//! 3. [`SchemaTree::build`] indexes the expanded nodes by path.
//! 4. [`ValidationEngine`] walks a [`CandidateConfig`] against the tree and
//!    reports [`Violation`]s.
//!
//! [`SchemaBuilder`] runs steps 1 to 3 as one all-or-nothing pass and
//! [`SchemaRegistry`] keeps the tree in effect across reloads.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use config_schema_core::*;
//! use config_schema_engine::*;
//!
//! let mut fragments = HashMap::new();
//! fragments.insert(
//!     "include/interface.yaml".to_string(),
//!     NodeDescriptor::new("interface")
//!         .with_help("Interface name")
//!         .with_constraint(ConstraintSpec::pattern("(eth|wlan)[0-9]+")),
//! );
//! let root = NodeDescriptor::new("").with_child(
//!     NodeDescriptor::leaf("interface").multi().with_include("include/interface.yaml"),
//! );
//!
//! let tree = SchemaBuilder::new().build(&root, &fragments).unwrap();
//! let mut candidate = CandidateConfig::new();
//! candidate.set_values("interface", ["eth0", "wlan1"]);
//!
//! let report = ValidationEngine::new(&tree).validate(&candidate);
//! assert!(report.is_valid());
//! ```
//!
//! # Concurrency
//!
//! Builds are single-threaded. A built [`SchemaTree`] is `Send + Sync` and
//! never mutated, so any number of validation or completion requests may
//! read it at once. External validators run as child processes with a
//! per-invocation timeout ([`exec`]).

mod candidate;
mod constraint;
mod error;
pub mod exec;
mod registry;
mod resolve;
mod tree;
mod validate;

pub use candidate::{CandidateConfig, CandidateError, ConfigLevel, PathRole};
pub use constraint::{
    CompileOptions, CompiledConstraint, ConstraintOutcome, ConstraintSet, ExternalCheck,
    PatternCheck, VALUE_PLACEHOLDER, ValueCheck, compile_constraints,
};
pub use error::{BuildError, ExecutionError, LookupError, Result};
pub use registry::{SchemaBuilder, SchemaRegistry};
pub use resolve::{resolve_fragment, resolve_includes};
pub use tree::{ResolvedPath, SchemaNode, SchemaTree};
pub use validate::{RequiredNodes, ValidationEngine, ValidationMode, ValidationReport, Violation};
