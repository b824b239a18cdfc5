//! Candidate configuration validation.
//!
//! [`ValidationEngine`] walks a [`CandidateConfig`] against a published
//! [`SchemaTree`] and returns every problem as a structured [`Violation`].
//! Nothing here panics or returns `Err` for bad input: rejected values,
//! unknown paths and broken validators all end up in the
//! [`ValidationReport`].
//!
//! Leaf checks share no mutable state and run on the `rayon` pool when
//! parallel mode is on; the report order is always the candidate path
//! order.
//!
//! # Example
//!
//! ```
//! use config_schema_core::*;
//! use config_schema_engine::*;
//!
//! let root = NodeDescriptor::new("").with_child(
//!     NodeDescriptor::leaf("interface")
//!         .multi()
//!         .with_constraint(ConstraintSpec::pattern("eth[0-9]+")),
//! );
//! let tree = SchemaTree::build(&root, &CompileOptions::default()).unwrap();
//!
//! let mut candidate = CandidateConfig::new();
//! candidate.set_values("interface", ["eth0", "eth1"]);
//! assert!(ValidationEngine::new(&tree).validate(&candidate).is_valid());
//!
//! candidate.set_values("interface", ["wlan0"]);
//! let report = ValidationEngine::new(&tree).validate(&candidate);
//! assert!(matches!(report.violations(), [Violation::ConstraintViolation { .. }]));
//! ```

use std::collections::{BTreeMap, HashMap};

use config_schema_core::{NodeKind, NodePath};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::candidate::CandidateConfig;
use crate::constraint::ConstraintOutcome;
use crate::error::ExecutionError;
use crate::tree::{SchemaNode, SchemaTree};

/// One validation finding, keyed by the concrete configuration path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    /// The path does not correspond to any schema node.
    #[error("{path}: unknown configuration node")]
    UnknownNode { path: NodePath },
    /// A single-valued leaf carries more than one value.
    #[error("{path}: only one value allowed, got {count}")]
    Multiplicity { path: NodePath, count: usize },
    /// A value was rejected by the node's constraints.
    #[error("{path}: invalid value '{value}': {message}")]
    ConstraintViolation {
        path: NodePath,
        value: String,
        message: String,
    },
    /// A required child is missing beneath a present container.
    #[error("{path}: required node is missing")]
    MissingRequiredNode { path: NodePath },
    /// A validator failed to run; the value was not judged.
    #[error("{path}: could not validate '{value}': {error}")]
    ValidatorExecution {
        path: NodePath,
        value: String,
        error: ExecutionError,
    },
    /// A leaf that takes a value has none.
    #[error("{path}: value required")]
    MissingValue { path: NodePath },
    /// A valueless leaf or a container carries values.
    #[error("{path}: node does not take a value")]
    UnexpectedValue { path: NodePath },
    /// A tag instance name was rejected by the tag node's constraints.
    #[error("{path}: invalid name '{value}': {message}")]
    InvalidTagValue {
        path: NodePath,
        value: String,
        message: String,
    },
}

impl Violation {
    /// Configuration path the violation refers to.
    pub fn path(&self) -> &NodePath {
        match self {
            Violation::UnknownNode { path }
            | Violation::Multiplicity { path, .. }
            | Violation::ConstraintViolation { path, .. }
            | Violation::MissingRequiredNode { path }
            | Violation::ValidatorExecution { path, .. }
            | Violation::MissingValue { path }
            | Violation::UnexpectedValue { path }
            | Violation::InvalidTagValue { path, .. } => path,
        }
    }

    /// `true` for execution faults, which leave the verdict open.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Violation::ValidatorExecution { .. })
    }
}

/// How far validation goes after a value fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Check every value of every leaf (batch reporting).
    #[default]
    CollectAll,
    /// Stop checking a leaf's value list at its first failing value.
    FailFast,
}

/// Mandatory-children contract supplied by the enclosing schema.
///
/// Maps a container (or tag) schema path to child names that must be
/// present in every instance of it that appears in a candidate.
///
/// # Examples
///
/// ```
/// use config_schema_core::NodePath;
/// use config_schema_engine::RequiredNodes;
///
/// let mut required = RequiredNodes::new();
/// required.require("interfaces.pppoe", "source-interface");
/// assert_eq!(required.for_container(&NodePath::parse("interfaces.pppoe")), ["source-interface"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequiredNodes {
    by_container: BTreeMap<String, Vec<String>>,
}

impl RequiredNodes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `child` as mandatory beneath `container`.
    pub fn require(&mut self, container: impl Into<NodePath>, child: impl Into<String>) -> &mut Self {
        let key = container.into().to_string();
        let children = self.by_container.entry(key).or_default();
        let child = child.into();
        if !children.contains(&child) {
            children.push(child);
        }
        self
    }

    pub fn for_container(&self, container: &NodePath) -> &[String] {
        self.by_container
            .get(&container.to_string())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_container.is_empty()
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    /// `true` when there are no violations of any kind.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// `true` when at least one value could not be judged because its
    /// validator failed. Such a candidate is neither accepted nor rejected.
    pub fn is_indeterminate(&self) -> bool {
        self.violations.iter().any(Violation::is_indeterminate)
    }

    /// `true` when some violation does not depend on a validator that
    /// failed to run, so the candidate is rejected either way.
    pub fn has_definite_violations(&self) -> bool {
        self.violations.iter().any(|v| !v.is_indeterminate())
    }

    /// Violation messages grouped by configuration path.
    pub fn by_path(&self) -> BTreeMap<String, Vec<String>> {
        let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for violation in &self.violations {
            grouped
                .entry(violation.path().to_string())
                .or_default()
                .push(violation.to_string());
        }
        grouped
    }

    /// One message per violation, in report order.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

/// Validates candidate configurations against a schema tree.
#[derive(Debug, Clone)]
pub struct ValidationEngine<'a> {
    tree: &'a SchemaTree,
    mode: ValidationMode,
    required: Option<&'a RequiredNodes>,
    parallel: bool,
}

/// A candidate entry after it has been mapped onto the schema.
struct LeafJob<'a> {
    path: &'a NodePath,
    values: &'a [String],
    node: &'a SchemaNode,
}

impl<'a> ValidationEngine<'a> {
    pub fn new(tree: &'a SchemaTree) -> Self {
        Self {
            tree,
            mode: ValidationMode::CollectAll,
            required: None,
            parallel: true,
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_required(mut self, required: &'a RequiredNodes) -> Self {
        self.required = Some(required);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Validates `candidate` and returns every violation found.
    pub fn validate(&self, candidate: &CandidateConfig) -> ValidationReport {
        let mut violations = Vec::new();
        let mut jobs = Vec::new();

        for (path, values) in candidate.entries() {
            match self.tree.resolve_config_path(path) {
                Ok(resolved) => match self.tree.lookup(&resolved.schema_path) {
                    Ok(node) => jobs.push(LeafJob { path, values, node }),
                    Err(_) => violations.push(Violation::UnknownNode { path: path.clone() }),
                },
                Err(_) => violations.push(Violation::UnknownNode { path: path.clone() }),
            }
        }

        let per_entry: Vec<Vec<Violation>> = if self.parallel {
            jobs.par_iter().map(|job| self.check_entry(job)).collect()
        } else {
            jobs.iter().map(|job| self.check_entry(job)).collect()
        };
        violations.extend(per_entry.into_iter().flatten());

        violations.extend(self.check_tag_values(candidate));
        if let Some(required) = self.required {
            violations.extend(self.check_required(candidate, required));
        }

        violations.sort_by(|a, b| a.path().cmp(b.path()));
        if violations.iter().any(Violation::is_indeterminate) {
            warn!(
                count = violations.len(),
                "Validation incomplete: one or more validators failed to run"
            );
        }
        debug!(
            entries = candidate.len(),
            violations = violations.len(),
            "Validated candidate configuration"
        );
        ValidationReport { violations }
    }

    fn check_entry(&self, job: &LeafJob<'_>) -> Vec<Violation> {
        let node = job.node;
        let path = job.path;

        if node.kind() != NodeKind::Leaf {
            if job.values.is_empty() {
                return Vec::new();
            }
            return vec![Violation::UnexpectedValue { path: path.clone() }];
        }

        if node.is_valueless() {
            if job.values.is_empty() {
                return Vec::new();
            }
            return vec![Violation::UnexpectedValue { path: path.clone() }];
        }

        if job.values.is_empty() {
            if node.is_multi() {
                return Vec::new();
            }
            return vec![Violation::MissingValue { path: path.clone() }];
        }

        let mut violations = Vec::new();
        if !node.is_multi() && job.values.len() > 1 {
            violations.push(Violation::Multiplicity {
                path: path.clone(),
                count: job.values.len(),
            });
        }

        for value in job.values {
            let failed = match node.constraints().evaluate(value) {
                ConstraintOutcome::Pass => false,
                ConstraintOutcome::Fail { message, .. } => {
                    violations.push(Violation::ConstraintViolation {
                        path: path.clone(),
                        value: value.clone(),
                        message,
                    });
                    true
                }
                ConstraintOutcome::Error(error) => {
                    violations.push(Violation::ValidatorExecution {
                        path: path.clone(),
                        value: value.clone(),
                        error,
                    });
                    true
                }
            };
            if failed && self.mode == ValidationMode::FailFast {
                break;
            }
        }
        violations
    }

    /// Checks each distinct tag instance name once.
    fn check_tag_values(&self, candidate: &CandidateConfig) -> Vec<Violation> {
        candidate
            .all_prefixes()
            .into_iter()
            .filter_map(|prefix| {
                let resolved = self.tree.resolve_config_path(&prefix).ok()?;
                if !resolved.ends_on_tag_instance() {
                    return None;
                }
                let value = prefix.last()?.to_string();
                let node = self.tree.lookup(&resolved.schema_path).ok()?;
                match node.constraints().evaluate(&value) {
                    ConstraintOutcome::Pass => None,
                    ConstraintOutcome::Fail { message, .. } => Some(Violation::InvalidTagValue {
                        path: prefix,
                        value,
                        message,
                    }),
                    ConstraintOutcome::Error(error) => Some(Violation::ValidatorExecution {
                        path: prefix,
                        value,
                        error,
                    }),
                }
            })
            .collect()
    }

    fn is_tag(&self, schema_path: &NodePath) -> bool {
        self.tree
            .lookup(schema_path)
            .is_ok_and(|n| n.kind() == NodeKind::Tag)
    }

    /// Checks the mandatory-children contract for every present instance
    /// of a container named in `required`.
    fn check_required(
        &self,
        candidate: &CandidateConfig,
        required: &RequiredNodes,
    ) -> Vec<Violation> {
        let mut instances: HashMap<NodePath, NodePath> = HashMap::new();
        if !candidate.is_empty() {
            instances.insert(NodePath::root(), NodePath::root());
        }
        for prefix in candidate.all_prefixes() {
            let Ok(resolved) = self.tree.resolve_config_path(&prefix) else {
                continue;
            };
            // A tag node path without its instance value is not an instance.
            if self.is_tag(&resolved.schema_path) && !resolved.ends_on_tag_instance() {
                continue;
            }
            instances.insert(prefix, resolved.schema_path);
        }

        let mut violations: Vec<Violation> = instances
            .iter()
            .flat_map(|(instance, schema_path)| {
                required
                    .for_container(schema_path)
                    .iter()
                    .map(move |child| instance.child(child.clone()))
            })
            .filter(|child_path| !candidate.exists(child_path.clone()))
            .map(|path| Violation::MissingRequiredNode { path })
            .collect();
        violations.sort_by(|a, b| a.path().cmp(b.path()));
        violations
    }
}
