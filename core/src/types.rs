//! Node descriptor definitions for configuration schema modeling.
//!
//! A schema is a tree of [`NodeDescriptor`]s. The same type describes both a
//! raw fragment as loaded from disk (which may still carry `includes` and
//! [`ConstraintSpec::IncludeRef`] entries) and a fully expanded node. The
//! types are designed for serialization with [`serde`] and round-trip
//! through JSON and YAML.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of the fragment contract (semver).
///
/// Embedded in every [`FragmentPackage`](crate::FragmentPackage) to track
/// compatibility across fragment formats.
pub const SCHEMA_CONTRACT_VERSION: &str = "1.0.0";

/// Kind of schema node.
///
/// # Examples
///
/// ```
/// use config_schema_core::NodeKind;
///
/// assert!(NodeKind::Tag.has_children());
/// assert!(!NodeKind::Leaf.has_children());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Terminal attribute holding one or more scalar values.
    Leaf,
    /// Node with named children and no direct value.
    Container,
    /// Container whose instances are keyed by a user-supplied value
    /// (e.g. `interfaces pppoe pppoe0`).
    Tag,
}

impl NodeKind {
    /// Returns `true` for kinds that own child nodes.
    pub fn has_children(self) -> bool {
        matches!(self, NodeKind::Container | NodeKind::Tag)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeKind::Leaf => "leaf",
            NodeKind::Container => "container",
            NodeKind::Tag => "tag",
        };
        f.write_str(label)
    }
}

/// Display-only value format hint (e.g. `txt` / `Interface name`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueHelp {
    /// Short format label.
    pub format: String,
    /// Human-readable description of the format.
    pub description: String,
}

impl ValueHelp {
    pub fn new(format: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            description: description.into(),
        }
    }
}

/// Completion hints consumed by the interactive completion subsystem.
///
/// The engine never runs `script` itself; it only exposes it.
///
/// # Examples
///
/// ```
/// use config_schema_core::CompletionHelp;
///
/// let help = CompletionHelp::from_list(["auto", "force", "none"]);
/// assert!(help.script.is_none());
/// assert_eq!(help.list.len(), 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionHelp {
    /// Path to an external completion provider that prints candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// Inline literal candidates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list: Vec<String>,
}

impl CompletionHelp {
    /// Completion backed by an external script.
    pub fn from_script(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            list: Vec::new(),
        }
    }

    /// Completion backed by a literal list of candidates.
    pub fn from_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: None,
            list: items.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns `true` when neither a script nor a list is configured.
    pub fn is_empty(&self) -> bool {
        self.script.is_none() && self.list.is_empty()
    }
}

/// Raw constraint specification attached to a node.
///
/// Serialized internally tagged by `type`:
///
/// ```yaml
/// constraints:
///   - type: pattern
///     regex: 'eth[0-9]+'
///   - type: external_check
///     command: interface-name
///   - type: include
///     path: include/constraint/interface-name.yaml
/// ```
///
/// `IncludeRef` entries are resolved away before compilation.
///
/// # Examples
///
/// ```
/// use config_schema_core::ConstraintSpec;
///
/// let spec = ConstraintSpec::pattern("eth[0-9]+");
/// assert!(!spec.is_include());
/// assert!(ConstraintSpec::include("a.yaml").is_include());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintSpec {
    /// Full-string regular expression match.
    Pattern {
        regex: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// External validator invoked with the candidate value.
    ExternalCheck {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    /// Reference to another fragment whose constraints are spliced in.
    #[serde(rename = "include")]
    IncludeRef { path: String },
}

impl ConstraintSpec {
    pub fn pattern(regex: impl Into<String>) -> Self {
        ConstraintSpec::Pattern {
            regex: regex.into(),
            message: None,
        }
    }

    pub fn external(command: impl Into<String>) -> Self {
        ConstraintSpec::ExternalCheck {
            command: command.into(),
            message: None,
        }
    }

    pub fn include(path: impl Into<String>) -> Self {
        ConstraintSpec::IncludeRef { path: path.into() }
    }

    /// Attaches a failure message. No-op on include references.
    pub fn with_message(mut self, text: impl Into<String>) -> Self {
        match &mut self {
            ConstraintSpec::Pattern { message, .. }
            | ConstraintSpec::ExternalCheck { message, .. } => *message = Some(text.into()),
            ConstraintSpec::IncludeRef { .. } => {}
        }
        self
    }

    /// Returns `true` for unresolved include references.
    pub fn is_include(&self) -> bool {
        matches!(self, ConstraintSpec::IncludeRef { .. })
    }

    /// Failure message attached to this entry, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            ConstraintSpec::Pattern { message, .. }
            | ConstraintSpec::ExternalCheck { message, .. } => message.as_deref(),
            ConstraintSpec::IncludeRef { .. } => None,
        }
    }
}

/// One schema node: a leaf, a container, or a tag node.
///
/// Raw fragments use the same type. A fragment meant only for inclusion may
/// leave `name` empty; the including node supplies it.
///
/// # Examples
///
/// ```
/// use config_schema_core::{CompletionHelp, ConstraintSpec, NodeDescriptor, NodeKind, ValueHelp};
///
/// let interface = NodeDescriptor::leaf("interface")
///     .with_help("Interface used for traffic")
///     .with_value_help(ValueHelp::new("txt", "Interface name"))
///     .with_completion(CompletionHelp::from_script("list_interfaces"))
///     .with_constraint(ConstraintSpec::external("interface-name"))
///     .multi();
/// assert_eq!(interface.kind(), NodeKind::Leaf);
/// assert!(interface.multi);
///
/// let parent = NodeDescriptor::container("mirror").with_child(interface);
/// assert_eq!(parent.kind(), NodeKind::Container);
/// assert!(parent.find_child("interface").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    /// Node identity, unique among siblings.
    #[serde(default)]
    pub name: String,
    /// Explicit kind; derived from `children` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    /// Free-text help.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Display-only value format hints.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_help: Vec<ValueHelp>,
    /// Completion hints for interactive shells.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_help: Option<CompletionHelp>,
    /// Ordered constraints; all must pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<ConstraintSpec>,
    /// Fallback failure message for constraints without their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint_error_message: Option<String>,
    /// Leaf holds an ordered sequence of values instead of exactly one.
    #[serde(default, skip_serializing_if = "is_false")]
    pub multi: bool,
    /// Leaf is a presence flag and carries no value.
    #[serde(default, skip_serializing_if = "is_false")]
    pub valueless: bool,
    /// Commit ordering hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
    /// Node-level include directives (relative fragment paths).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,
    /// Ordered child nodes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDescriptor>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl NodeDescriptor {
    /// Creates an empty node with the given name and no explicit kind.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn leaf(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(NodeKind::Leaf)
    }

    pub fn container(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(NodeKind::Container)
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(NodeKind::Tag)
    }

    pub fn with_kind(mut self, kind: NodeKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_string());
        self
    }

    pub fn with_value_help(mut self, value_help: ValueHelp) -> Self {
        self.value_help.push(value_help);
        self
    }

    pub fn with_completion(mut self, completion: CompletionHelp) -> Self {
        self.completion_help = Some(completion);
        self
    }

    pub fn with_constraint(mut self, constraint: ConstraintSpec) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_error_message(mut self, message: &str) -> Self {
        self.constraint_error_message = Some(message.to_string());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_include(mut self, path: impl Into<String>) -> Self {
        self.includes.push(path.into());
        self
    }

    pub fn with_child(mut self, child: NodeDescriptor) -> Self {
        self.children.push(child);
        self
    }

    /// Marks the leaf as multi-valued.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Marks the leaf as a valueless presence flag.
    pub fn valueless(mut self) -> Self {
        self.valueless = true;
        self
    }

    /// Effective kind: the explicit kind, or `Container` when children are
    /// present and `Leaf` otherwise.
    pub fn kind(&self) -> NodeKind {
        self.kind.unwrap_or(if self.children.is_empty() {
            NodeKind::Leaf
        } else {
            NodeKind::Container
        })
    }

    pub fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    /// Finds a direct child by name.
    pub fn find_child(&self, name: &str) -> Option<&NodeDescriptor> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Returns `true` when this node or any descendant still carries an
    /// include directive or an include constraint.
    ///
    /// # Examples
    ///
    /// ```
    /// use config_schema_core::{ConstraintSpec, NodeDescriptor};
    ///
    /// let resolved = NodeDescriptor::leaf("mtu");
    /// assert!(!resolved.has_includes());
    ///
    /// let raw = NodeDescriptor::container("pppoe")
    ///     .with_child(NodeDescriptor::leaf("mtu").with_constraint(ConstraintSpec::include("mtu.yaml")));
    /// assert!(raw.has_includes());
    /// ```
    pub fn has_includes(&self) -> bool {
        !self.includes.is_empty()
            || self.constraints.iter().any(ConstraintSpec::is_include)
            || self.children.iter().any(NodeDescriptor::has_includes)
    }

    /// Total number of nodes in this subtree, including `self`.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(NodeDescriptor::node_count)
            .sum::<usize>()
    }
}

/// Path of a schema node: the sequence of node names from the root.
///
/// Displayed dotted. Parsing accepts dotted or whitespace-separated text so
/// that `interfaces pppoe mtu` and `interfaces.pppoe.mtu` are equivalent.
///
/// # Examples
///
/// ```
/// use config_schema_core::NodePath;
///
/// let path = NodePath::parse("interfaces pppoe mtu");
/// assert_eq!(path.to_string(), "interfaces.pppoe.mtu");
/// assert_eq!(path, NodePath::parse("interfaces.pppoe.mtu"));
/// assert_eq!(path.parent().unwrap().to_string(), "interfaces.pppoe");
/// assert!(NodePath::root().is_root());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    pub fn parse(text: &str) -> Self {
        Self(
            text.split(|c: char| c == '.' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
        )
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    /// Returns `true` if `self` is `prefix` or lies beneath it.
    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for NodePath {
    fn from(text: &str) -> Self {
        NodePath::parse(text)
    }
}

impl From<Vec<String>> for NodePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}
