//! Constraint compilation.
//!
//! Turns a node's resolved [`ConstraintSpec`] list into a [`ConstraintSet`]:
//! one [`CompiledConstraint`] per entry, evaluated in order, all of which
//! must pass. Both kinds of check sit behind the [`ValueCheck`] capability
//! so the validation engine never distinguishes between them.
//!
//! Patterns are anchored so they match the entire candidate value, never a
//! prefix or substring. External checks spawn nothing at compile time.
//!
//! # Example
//!
//! ```
//! use config_schema_core::{ConstraintSpec, NodePath};
//! use config_schema_engine::{CompileOptions, ConstraintOutcome, compile_constraints};
//!
//! let set = compile_constraints(
//!     &NodePath::parse("interface"),
//!     &[ConstraintSpec::pattern("^eth[0-9]+$")],
//!     None,
//!     &CompileOptions::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(set.evaluate("eth0"), ConstraintOutcome::Pass);
//! assert!(matches!(set.evaluate("eth"), ConstraintOutcome::Fail { .. }));
//! assert!(matches!(set.evaluate("xeth0"), ConstraintOutcome::Fail { .. }));
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config_schema_core::{ConstraintSpec, NodePath};
use regex::Regex;
use tracing::debug;

use crate::error::{BuildError, ExecutionError, Result};
use crate::exec::{self, DEFAULT_TIMEOUT_MS};

/// Placeholder substituted with the candidate value.
pub const VALUE_PLACEHOLDER: &str = "{value}";

/// Capability interface shared by every compiled constraint.
pub trait ValueCheck: Send + Sync {
    /// Returns `Ok(true)` when `value` is accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ExecutionError`] when no verdict could be obtained.
    fn check(&self, value: &str) -> std::result::Result<bool, ExecutionError>;

    /// Short description used when no failure message is configured.
    fn describe(&self) -> String;
}

/// Anchored full-string regular expression.
#[derive(Debug, Clone)]
pub struct PatternCheck {
    source: String,
    regex: Regex,
}

impl PatternCheck {
    /// Compiles `pattern` wrapped as `^(?:pattern)$`.
    ///
    /// Patterns that already carry `^`/`$` anchors compile to the same
    /// language; the extra anchors are harmless.
    pub fn new(pattern: &str) -> std::result::Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{pattern})$"))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.source
    }
}

impl ValueCheck for PatternCheck {
    fn check(&self, value: &str) -> std::result::Result<bool, ExecutionError> {
        Ok(self.regex.is_match(value))
    }

    fn describe(&self) -> String {
        format!("value must match '{}'", self.source)
    }
}

/// External validator invoked as a subprocess.
///
/// Zero exit status means pass, any other exit status means fail. A missing
/// binary, a crash or a timeout is an [`ExecutionError`].
#[derive(Debug, Clone)]
pub struct ExternalCheck {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl ExternalCheck {
    /// Parses a command template such as `numeric --range 1-65535`.
    ///
    /// The first token names the validator; a bare name is resolved against
    /// `validator_dir` when one is given. Returns `None` for an empty
    /// template.
    pub fn from_template(
        template: &str,
        validator_dir: Option<&Path>,
        timeout: Duration,
    ) -> Option<Self> {
        let mut tokens = template.split_whitespace();
        let name = tokens.next()?;
        let program = match validator_dir {
            Some(dir) if !name.contains('/') => dir.join(name).to_string_lossy().into_owned(),
            _ => name.to_string(),
        };
        Some(Self {
            program,
            args: tokens.map(String::from).collect(),
            timeout,
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for one invocation: the template arguments with every
    /// `{value}` placeholder replaced, or the value appended when the
    /// template has no placeholder.
    pub fn arguments_for(&self, value: &str) -> Vec<String> {
        if self.args.iter().any(|a| a.contains(VALUE_PLACEHOLDER)) {
            return self
                .args
                .iter()
                .map(|a| a.replace(VALUE_PLACEHOLDER, value))
                .collect();
        }
        let mut args = self.args.clone();
        args.push(value.to_string());
        args
    }
}

impl ValueCheck for ExternalCheck {
    fn check(&self, value: &str) -> std::result::Result<bool, ExecutionError> {
        let args = self.arguments_for(value);
        let status = exec::run_with_timeout(&self.program, &args, self.timeout)?;
        debug!(program = %self.program, code = ?status.code(), "External check finished");
        Ok(status.success())
    }

    fn describe(&self) -> String {
        let name = Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone());
        format!("value rejected by validator '{name}'")
    }
}

/// One compiled constraint with its optional failure message template.
#[derive(Clone)]
pub struct CompiledConstraint {
    check: Arc<dyn ValueCheck>,
    message: Option<String>,
}

impl CompiledConstraint {
    pub fn new(check: Arc<dyn ValueCheck>, message: Option<String>) -> Self {
        Self { check, message }
    }

    pub fn check(&self, value: &str) -> std::result::Result<bool, ExecutionError> {
        self.check.check(value)
    }

    /// Failure message for `value`, with `{value}` substituted.
    pub fn failure_message(&self, value: &str) -> String {
        match &self.message {
            Some(template) => template.replace(VALUE_PLACEHOLDER, value),
            None => self.check.describe(),
        }
    }
}

impl fmt::Debug for CompiledConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledConstraint")
            .field("check", &self.check.describe())
            .field("message", &self.message)
            .finish()
    }
}

/// Result of evaluating a [`ConstraintSet`] against one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintOutcome {
    /// Every constraint accepted the value.
    Pass,
    /// The constraint at `index` rejected the value.
    Fail { index: usize, message: String },
    /// A validator could not produce a verdict.
    Error(ExecutionError),
}

/// Ordered conjunction of compiled constraints.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<CompiledConstraint>,
}

impl ConstraintSet {
    pub fn new(constraints: Vec<CompiledConstraint>) -> Self {
        Self { constraints }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledConstraint> {
        self.constraints.iter()
    }

    /// Evaluates constraints in order and stops at the first that does not
    /// pass. An empty set accepts every value.
    pub fn evaluate(&self, value: &str) -> ConstraintOutcome {
        for (index, constraint) in self.constraints.iter().enumerate() {
            match constraint.check(value) {
                Ok(true) => {}
                Ok(false) => {
                    return ConstraintOutcome::Fail {
                        index,
                        message: constraint.failure_message(value),
                    };
                }
                Err(err) => return ConstraintOutcome::Error(err),
            }
        }
        ConstraintOutcome::Pass
    }
}

/// Settings applied while compiling constraints.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Directory used to resolve bare validator names.
    pub validator_dir: Option<PathBuf>,
    /// Time budget for each external check invocation.
    pub external_timeout: Duration,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            validator_dir: None,
            external_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }
}

/// Compiles the resolved constraints of the node at `path`.
///
/// `fallback_message` (the node's `constraint_error_message`) applies to
/// entries without a message of their own.
///
/// # Errors
///
/// - [`BuildError::InvalidPattern`] when a regex does not compile.
/// - [`BuildError::EmptyValidatorCommand`] for an empty command template.
/// - [`BuildError::UnresolvedInclude`] if an include reference remains.
pub fn compile_constraints(
    path: &NodePath,
    specs: &[ConstraintSpec],
    fallback_message: Option<&str>,
    options: &CompileOptions,
) -> Result<ConstraintSet> {
    let mut compiled = Vec::with_capacity(specs.len());
    for spec in specs {
        let message = spec
            .message()
            .or(fallback_message)
            .map(String::from);
        let check: Arc<dyn ValueCheck> = match spec {
            ConstraintSpec::Pattern { regex, .. } => {
                let pattern = PatternCheck::new(regex).map_err(|e| BuildError::InvalidPattern {
                    path: path.clone(),
                    message: e.to_string(),
                })?;
                Arc::new(pattern)
            }
            ConstraintSpec::ExternalCheck { command, .. } => {
                let external = ExternalCheck::from_template(
                    command,
                    options.validator_dir.as_deref(),
                    options.external_timeout,
                )
                .ok_or_else(|| BuildError::EmptyValidatorCommand(path.clone()))?;
                Arc::new(external)
            }
            ConstraintSpec::IncludeRef { .. } => {
                return Err(BuildError::UnresolvedInclude(path.clone()));
            }
        };
        compiled.push(CompiledConstraint::new(check, message));
    }
    Ok(ConstraintSet::new(compiled))
}
