//! Error types for schema builds, lookups and validator execution.
//!
//! Build errors are fatal to a schema (re)load. Lookup errors are returned
//! by tree queries. Execution errors describe a broken validator, which is
//! a system fault rather than rejected user input.

use config_schema_core::{DescriptorError, FragmentError, NodePath};
use thiserror::Error;

/// Fatal errors that abort a schema build. No tree is published.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// An include path does not resolve to an existing fragment.
    #[error("include not found: '{path}' (included from '{included_from}')")]
    IncludeNotFound { path: String, included_from: String },

    /// An include chain refers back to a fragment still being expanded.
    #[error("circular include: {}", chain.join(" -> "))]
    CircularInclude { chain: Vec<String> },

    /// Two siblings share a name in the expanded tree.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodePath),

    /// The fragment source failed to produce a fragment that exists.
    #[error(transparent)]
    FragmentLoad(#[from] FragmentError),

    /// A pattern constraint does not compile.
    #[error("invalid pattern at '{path}': {message}")]
    InvalidPattern { path: NodePath, message: String },

    /// An external check has an empty command template.
    #[error("empty validator command at '{0}'")]
    EmptyValidatorCommand(NodePath),

    /// Include markers survived resolution.
    #[error("unresolved include at '{0}'")]
    UnresolvedInclude(NodePath),

    /// Structural problem in the expanded descriptor tree.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(DescriptorError),
}

impl From<DescriptorError> for BuildError {
    fn from(err: DescriptorError) -> Self {
        match err {
            DescriptorError::DuplicateNode(path) => BuildError::DuplicateNode(path),
            other => BuildError::InvalidDescriptor(other),
        }
    }
}

/// Errors returned by schema tree queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// No node exists at the path.
    #[error("node not found: {0}")]
    NotFound(NodePath),
}

/// Failure to obtain a verdict from an external validator.
///
/// Distinct from a constraint violation: the value was never judged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The validator binary does not exist.
    #[error("validator not found: {0}")]
    NotFound(String),
    /// The validator exists but may not be executed.
    #[error("permission denied running validator: {0}")]
    PermissionDenied(String),
    /// Spawning failed for another reason.
    #[error("failed to spawn validator '{program}': {message}")]
    Spawn { program: String, message: String },
    /// The validator did not finish within its time budget and was killed.
    #[error("validator '{program}' timed out after {timeout_ms}ms")]
    Timeout { program: String, timeout_ms: u64 },
    /// The validator terminated without an exit code (e.g. by a signal).
    #[error("validator '{0}' terminated abnormally")]
    Crashed(String),
    /// Waiting on the child process failed.
    #[error("failed to wait on validator '{program}': {message}")]
    Wait { program: String, message: String },
}

/// Convenience alias for results with [`BuildError`].
pub type Result<T> = std::result::Result<T, BuildError>;
