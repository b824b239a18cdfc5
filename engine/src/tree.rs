//! Immutable, path-indexed schema tree.
//!
//! [`SchemaTree::build`] walks a fully resolved descriptor tree depth-first,
//! assigns every node its canonical [`NodePath`], compiles its constraints
//! and indexes the result. The tree is never mutated after construction and
//! is `Send + Sync`, so published trees can be shared freely between
//! validation and completion requests.

use std::collections::HashMap;

use config_schema_core::{
    CompletionHelp, NodeDescriptor, NodeKind, NodePath, validate_descriptor,
};
use tracing::debug;

use crate::constraint::{CompileOptions, ConstraintSet, compile_constraints};
use crate::error::{BuildError, LookupError, Result};

/// One node of a built [`SchemaTree`].
///
/// Holds the node's own descriptor fields (children are stripped and kept
/// as ordered names) plus its compiled constraints.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    path: NodePath,
    descriptor: NodeDescriptor,
    kind: NodeKind,
    children: Vec<String>,
    constraints: ConstraintSet,
}

impl SchemaNode {
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Descriptor without its children.
    pub fn descriptor(&self) -> &NodeDescriptor {
        &self.descriptor
    }

    pub fn children(&self) -> &[String] {
        &self.children
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn is_multi(&self) -> bool {
        self.descriptor.multi
    }

    pub fn is_valueless(&self) -> bool {
        self.descriptor.valueless
    }

    pub fn completion_help(&self) -> Option<&CompletionHelp> {
        self.descriptor.completion_help.as_ref()
    }
}

/// A configuration path mapped onto the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path of the schema node, with tag instance values removed.
    pub schema_path: NodePath,
    /// Tag nodes crossed on the way, with the instance value used for each.
    pub tag_values: Vec<(NodePath, String)>,
}

impl ResolvedPath {
    /// `true` when the configuration path ends on a tag instance value
    /// (e.g. `interfaces.pppoe.pppoe0`).
    pub fn ends_on_tag_instance(&self) -> bool {
        self.tag_values
            .last()
            .is_some_and(|(tag_path, _)| *tag_path == self.schema_path)
    }
}

/// Immutable mapping from path to compiled node.
///
/// # Examples
///
/// ```
/// use config_schema_core::*;
/// use config_schema_engine::{CompileOptions, SchemaTree};
///
/// let root = NodeDescriptor::new("").with_child(
///     NodeDescriptor::container("interfaces")
///         .with_child(NodeDescriptor::leaf("mirror").multi())
///         .with_child(NodeDescriptor::leaf("description")),
/// );
/// let tree = SchemaTree::build(&root, &CompileOptions::default()).unwrap();
///
/// assert_eq!(tree.children(&NodePath::parse("interfaces")).unwrap(), ["mirror", "description"]);
/// assert!(tree.is_multi(&NodePath::parse("interfaces.mirror")).unwrap());
/// assert!(!tree.is_multi(&NodePath::parse("interfaces.description")).unwrap());
/// assert!(tree.lookup(&NodePath::parse("interfaces.nope")).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SchemaTree {
    nodes: HashMap<NodePath, SchemaNode>,
    order: Vec<NodePath>,
}

impl SchemaTree {
    /// Builds a tree from a resolved root descriptor.
    ///
    /// The root is anonymous: its name is ignored and it lives at
    /// [`NodePath::root`].
    ///
    /// # Errors
    ///
    /// - [`BuildError::UnresolvedInclude`] if include markers remain.
    /// - [`BuildError::DuplicateNode`] for duplicate sibling names.
    /// - [`BuildError::InvalidDescriptor`] for other structural problems.
    /// - Constraint compilation errors.
    pub fn build(root: &NodeDescriptor, options: &CompileOptions) -> Result<Self> {
        if let Some(err) = validate_descriptor(root).into_iter().next() {
            return Err(err.into());
        }

        let mut tree = SchemaTree {
            nodes: HashMap::new(),
            order: Vec::new(),
        };
        let mut root = root.clone();
        root.name = String::new();
        if root.kind.is_none() {
            root.kind = Some(NodeKind::Container);
        }
        tree.insert(root, NodePath::root(), options)?;
        debug!(nodes = tree.nodes.len(), "Built schema tree");
        Ok(tree)
    }

    fn insert(
        &mut self,
        mut node: NodeDescriptor,
        path: NodePath,
        options: &CompileOptions,
    ) -> Result<()> {
        if !node.includes.is_empty() {
            return Err(BuildError::UnresolvedInclude(path));
        }
        let kind = node.kind();
        let constraints = compile_constraints(
            &path,
            &node.constraints,
            node.constraint_error_message.as_deref(),
            options,
        )?;

        let children = std::mem::take(&mut node.children);
        let child_names = children.iter().map(|c| c.name.clone()).collect();

        self.order.push(path.clone());
        let previous = self.nodes.insert(
            path.clone(),
            SchemaNode {
                path: path.clone(),
                descriptor: node,
                kind,
                children: child_names,
                constraints,
            },
        );
        if previous.is_some() {
            return Err(BuildError::DuplicateNode(path));
        }

        for child in children {
            let child_path = path.child(child.name.clone());
            self.insert(child, child_path, options)?;
        }
        Ok(())
    }

    /// Returns the node at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] if no node exists at `path`.
    pub fn lookup(&self, path: &NodePath) -> std::result::Result<&SchemaNode, LookupError> {
        self.nodes
            .get(path)
            .ok_or_else(|| LookupError::NotFound(path.clone()))
    }

    /// Child names of the node at `path`, in declaration order.
    pub fn children(&self, path: &NodePath) -> std::result::Result<&[String], LookupError> {
        self.lookup(path).map(SchemaNode::children)
    }

    pub fn is_multi(&self, path: &NodePath) -> std::result::Result<bool, LookupError> {
        self.lookup(path).map(SchemaNode::is_multi)
    }

    pub fn contains(&self, path: &NodePath) -> bool {
        self.nodes.contains_key(path)
    }

    /// Completion hints for the node at `path`, if it has any.
    pub fn completion_help(
        &self,
        path: &NodePath,
    ) -> std::result::Result<Option<&CompletionHelp>, LookupError> {
        self.lookup(path).map(SchemaNode::completion_help)
    }

    /// Literal completion candidates starting with `prefix`.
    ///
    /// Only the inline list is consulted; running the completion script is
    /// left to the completion subsystem.
    pub fn completion_candidates(
        &self,
        path: &NodePath,
        prefix: &str,
    ) -> std::result::Result<Vec<&str>, LookupError> {
        let candidates = self
            .completion_help(path)?
            .map(|help| {
                help.list
                    .iter()
                    .map(String::as_str)
                    .filter(|c| c.starts_with(prefix))
                    .collect()
            })
            .unwrap_or_default();
        Ok(candidates)
    }

    /// All paths in depth-first declaration order, starting with the root.
    pub fn paths(&self) -> impl Iterator<Item = &NodePath> {
        self.order.iter()
    }

    /// Number of nodes, including the anonymous root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// `true` when the tree holds nothing but the anonymous root.
    pub fn has_only_root(&self) -> bool {
        self.nodes.len() == 1
    }

    /// Maps a concrete configuration path onto the schema.
    ///
    /// A segment following a tag node is taken as that tag's instance value
    /// and does not appear in the schema path.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotFound`] with the longest unmatched prefix
    /// when a segment names no child.
    ///
    /// # Examples
    ///
    /// ```
    /// use config_schema_core::*;
    /// use config_schema_engine::{CompileOptions, SchemaTree};
    ///
    /// let root = NodeDescriptor::new("").with_child(
    ///     NodeDescriptor::container("interfaces").with_child(
    ///         NodeDescriptor::tag("pppoe").with_child(NodeDescriptor::leaf("mtu")),
    ///     ),
    /// );
    /// let tree = SchemaTree::build(&root, &CompileOptions::default()).unwrap();
    ///
    /// let resolved = tree
    ///     .resolve_config_path(&NodePath::parse("interfaces pppoe pppoe0 mtu"))
    ///     .unwrap();
    /// assert_eq!(resolved.schema_path, NodePath::parse("interfaces.pppoe.mtu"));
    /// assert_eq!(resolved.tag_values[0].1, "pppoe0");
    /// ```
    pub fn resolve_config_path(
        &self,
        config_path: &NodePath,
    ) -> std::result::Result<ResolvedPath, LookupError> {
        let mut schema_path = NodePath::root();
        let mut tag_values = Vec::new();
        let mut segments = config_path.segments().iter();
        let mut consumed = NodePath::root();

        while let Some(segment) = segments.next() {
            consumed = consumed.child(segment.clone());
            let next = schema_path.child(segment.clone());
            let node = self
                .nodes
                .get(&next)
                .ok_or_else(|| LookupError::NotFound(consumed.clone()))?;
            schema_path = next;
            if node.kind == NodeKind::Tag {
                if let Some(value) = segments.next() {
                    consumed = consumed.child(value.clone());
                    tag_values.push((schema_path.clone(), value.clone()));
                }
            }
        }

        Ok(ResolvedPath {
            schema_path,
            tag_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use config_schema_core::{CompletionHelp, ConstraintSpec};

    use super::*;

    fn sample_root() -> NodeDescriptor {
        NodeDescriptor::new("").with_child(
            NodeDescriptor::container("interfaces").with_child(
                NodeDescriptor::tag("pppoe")
                    .with_constraint(ConstraintSpec::pattern("pppoe[0-9]+"))
                    .with_child(
                        NodeDescriptor::leaf("default-route").with_completion(
                            CompletionHelp::from_list(["auto", "force", "none"]),
                        ),
                    )
                    .with_child(NodeDescriptor::leaf("source-interface"))
                    .with_child(NodeDescriptor::leaf("disable").valueless()),
            ),
        )
    }

    fn build() -> SchemaTree {
        SchemaTree::build(&sample_root(), &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_paths_are_depth_first() {
        let tree = build();
        let paths: Vec<String> = tree.paths().map(ToString::to_string).collect();
        assert_eq!(
            paths,
            vec![
                "",
                "interfaces",
                "interfaces.pppoe",
                "interfaces.pppoe.default-route",
                "interfaces.pppoe.source-interface",
                "interfaces.pppoe.disable",
            ]
        );
        assert_eq!(tree.len(), 6);
        assert!(!tree.has_only_root());

        let bare = SchemaTree::build(&NodeDescriptor::new(""), &CompileOptions::default()).unwrap();
        assert_eq!(bare.len(), 1);
        assert!(bare.has_only_root());
    }

    #[test]
    fn test_lookup_and_kinds() {
        let tree = build();
        let root = tree.lookup(&NodePath::root()).unwrap();
        assert_eq!(root.kind(), NodeKind::Container);
        assert_eq!(root.children(), ["interfaces"]);

        let tag = tree.lookup(&NodePath::parse("interfaces.pppoe")).unwrap();
        assert_eq!(tag.kind(), NodeKind::Tag);
        assert_eq!(tag.constraints().len(), 1);
        assert!(tag.descriptor().children.is_empty());

        let disable = tree.lookup(&NodePath::parse("interfaces.pppoe.disable")).unwrap();
        assert!(disable.is_valueless());

        assert_eq!(
            tree.lookup(&NodePath::parse("interfaces.ethernet")).unwrap_err(),
            LookupError::NotFound(NodePath::parse("interfaces.ethernet"))
        );
    }

    #[test]
    fn test_duplicate_siblings_abort_build() {
        let root = NodeDescriptor::new("")
            .with_child(NodeDescriptor::leaf("mtu"))
            .with_child(NodeDescriptor::leaf("mtu"));
        let err = SchemaTree::build(&root, &CompileOptions::default()).unwrap_err();
        assert_eq!(err, BuildError::DuplicateNode(NodePath::parse("mtu")));
    }

    #[test]
    fn test_unresolved_include_aborts_build() {
        let root = NodeDescriptor::new("")
            .with_child(NodeDescriptor::leaf("mtu").with_include("mtu.yaml"));
        let err = SchemaTree::build(&root, &CompileOptions::default()).unwrap_err();
        assert_eq!(err, BuildError::UnresolvedInclude(NodePath::parse("mtu")));
    }

    #[test]
    fn test_completion_candidates_filter_by_prefix() {
        let tree = build();
        let path = NodePath::parse("interfaces.pppoe.default-route");
        assert_eq!(
            tree.completion_candidates(&path, "").unwrap(),
            vec!["auto", "force", "none"]
        );
        assert_eq!(tree.completion_candidates(&path, "f").unwrap(), vec!["force"]);
        assert!(
            tree.completion_candidates(&NodePath::parse("interfaces.pppoe.disable"), "")
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_resolve_config_path_through_tag() {
        let tree = build();
        let resolved = tree
            .resolve_config_path(&NodePath::parse("interfaces.pppoe.pppoe0.source-interface"))
            .unwrap();
        assert_eq!(
            resolved.schema_path,
            NodePath::parse("interfaces.pppoe.source-interface")
        );
        assert_eq!(
            resolved.tag_values,
            vec![(NodePath::parse("interfaces.pppoe"), "pppoe0".to_string())]
        );

        let err = tree
            .resolve_config_path(&NodePath::parse("interfaces.pppoe.pppoe0.bogus"))
            .unwrap_err();
        assert_eq!(
            err,
            LookupError::NotFound(NodePath::parse("interfaces.pppoe.pppoe0.bogus"))
        );
    }

    #[test]
    fn test_tree_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchemaTree>();
    }
}
