//! Candidate configuration handed to the commit validator.
//!
//! A [`CandidateConfig`] maps concrete configuration paths (which include tag
//! instance values, e.g. `interfaces.pppoe.pppoe0.mtu`) to the ordered values
//! set at that path. A path with no values records a presence flag or an
//! empty node. Intermediate container paths are implied by their
//! descendants.
//!
//! Two input forms are supported: a nested JSON document and a list of
//! `set` commands as printed by a configuration shell.
//!
//! # Example
//!
//! ```
//! use config_schema_engine::CandidateConfig;
//!
//! let config = CandidateConfig::from_set_commands(
//!     "set interfaces pppoe pppoe0 source-interface eth0\n\
//!      set interfaces pppoe pppoe0 description 'Uplink to ISP'\n\
//!      set interfaces pppoe pppoe0 disable\n",
//! )
//! .unwrap();
//!
//! let level = config.at_level("interfaces pppoe pppoe0");
//! assert_eq!(level.value("source-interface"), Some("eth0"));
//! assert_eq!(level.value("description"), Some("Uplink to ISP"));
//! assert!(level.exists("disable"));
//! assert_eq!(config.list_nodes("interfaces pppoe"), vec!["pppoe0"]);
//! ```

use std::collections::BTreeMap;

use config_schema_core::{NodeKind, NodePath};
use serde_json::Value;
use thiserror::Error;

use crate::tree::SchemaTree;

/// Errors raised while parsing candidate configuration input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    /// A line did not start with `set`.
    #[error("line {line}: expected 'set' command")]
    NotASetCommand { line: usize },
    /// A `set` command had no path.
    #[error("line {line}: 'set' without a path")]
    EmptyPath { line: usize },
    /// A quoted value was not closed.
    #[error("line {line}: unterminated quote")]
    UnterminatedQuote { line: usize },
    /// The JSON document root is not an object.
    #[error("candidate document must be an object")]
    NotAnObject,
    /// Nested arrays or objects inside a value list.
    #[error("unsupported value at '{0}'")]
    UnsupportedValue(NodePath),
}

/// Candidate configuration: path → ordered values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateConfig {
    entries: BTreeMap<NodePath, Vec<String>>,
}

impl CandidateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` at `path`.
    pub fn set(&mut self, path: impl Into<NodePath>, value: impl Into<String>) -> &mut Self {
        self.entries
            .entry(path.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Replaces the values at `path`.
    pub fn set_values<I, S>(&mut self, path: impl Into<NodePath>, values: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.entries
            .insert(path.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Records `path` as present without a value.
    pub fn set_present(&mut self, path: impl Into<NodePath>) -> &mut Self {
        self.entries.entry(path.into()).or_default();
        self
    }

    /// Explicit entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&NodePath, &[String])> {
        self.entries.iter().map(|(p, v)| (p, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns `true` if `path` is set or has anything set beneath it.
    pub fn exists(&self, path: impl Into<NodePath>) -> bool {
        let path = path.into();
        self.entries
            .range(path.clone()..)
            .next()
            .is_some_and(|(p, _)| p.starts_with(&path))
    }

    /// First value at `path`.
    pub fn value(&self, path: impl Into<NodePath>) -> Option<&str> {
        self.entries
            .get(&path.into())
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values at `path`; empty when unset.
    pub fn values(&self, path: impl Into<NodePath>) -> &[String] {
        self.entries
            .get(&path.into())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Names of the nodes directly beneath `path` (tag instances included),
    /// in sorted order without duplicates.
    pub fn list_nodes(&self, path: impl Into<NodePath>) -> Vec<&str> {
        let path = path.into();
        let depth = path.len();
        let mut names: Vec<&str> = self
            .entries
            .range(path.clone()..)
            .take_while(|(p, _)| p.starts_with(&path))
            .filter_map(|(p, _)| p.segments().get(depth).map(String::as_str))
            .collect();
        names.dedup();
        names
    }

    /// View relative to `path`.
    pub fn at_level(&self, path: impl Into<NodePath>) -> ConfigLevel<'_> {
        ConfigLevel {
            config: self,
            base: path.into(),
        }
    }

    /// Every distinct prefix of every explicit entry, including the entries
    /// themselves and excluding the root.
    pub(crate) fn all_prefixes(&self) -> Vec<NodePath> {
        let mut prefixes: Vec<NodePath> = Vec::new();
        for path in self.entries.keys() {
            let segments = path.segments();
            for end in 1..=segments.len() {
                prefixes.push(NodePath::new(segments[..end].iter().cloned()));
            }
        }
        prefixes.sort();
        prefixes.dedup();
        prefixes
    }

    /// Parses a nested JSON document.
    ///
    /// Objects nest paths, strings/numbers/booleans are single values,
    /// arrays are value lists and `null` marks presence. An empty object
    /// records the path as present.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError::NotAnObject`] if the root is not an object
    /// and [`CandidateError::UnsupportedValue`] for nested structures inside
    /// a value list.
    pub fn from_json_value(document: &Value) -> Result<Self, CandidateError> {
        let map = document.as_object().ok_or(CandidateError::NotAnObject)?;
        let mut config = Self::new();
        for (key, value) in map {
            config.ingest_json(NodePath::root().child(key.clone()), value)?;
        }
        Ok(config)
    }

    fn ingest_json(&mut self, path: NodePath, value: &Value) -> Result<(), CandidateError> {
        match value {
            Value::Object(map) if map.is_empty() => {
                self.set_present(path);
            }
            Value::Object(map) => {
                for (key, child) in map {
                    self.ingest_json(path.child(key.clone()), child)?;
                }
            }
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(
                        scalar_to_string(item)
                            .ok_or_else(|| CandidateError::UnsupportedValue(path.clone()))?,
                    );
                }
                self.set_values(path, values);
            }
            Value::Null => {
                self.set_present(path);
            }
            scalar => {
                let text = scalar_to_string(scalar)
                    .ok_or_else(|| CandidateError::UnsupportedValue(path.clone()))?;
                self.set(path, text);
            }
        }
        Ok(())
    }

    /// Parses `set` command lines.
    ///
    /// Each non-empty, non-`#` line is `set <path...> [value]`. Values
    /// containing spaces are single- or double-quoted. Because the split
    /// between path and value is decided by the schema, every token is kept
    /// as a path segment here; [`CandidateConfig::split_leaf_values`] moves
    /// the trailing token into the value list once a schema is known.
    ///
    /// A quoted final token is recorded as a value; the schema split turns
    /// it back into a tag instance name when it follows a tag node.
    ///
    /// # Errors
    ///
    /// Returns [`CandidateError`] for lines that are not `set` commands, have
    /// no path, or contain an unterminated quote.
    pub fn from_set_commands(text: &str) -> Result<Self, CandidateError> {
        let mut config = Self::new();
        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens = tokenize(line).ok_or(CandidateError::UnterminatedQuote { line: line_no })?;
            let mut tokens = tokens.into_iter();
            match tokens.next() {
                Some(Token { text, quoted: false }) if text == "set" => {}
                _ => return Err(CandidateError::NotASetCommand { line: line_no }),
            }
            let mut rest: Vec<Token> = tokens.collect();
            if rest.is_empty() {
                return Err(CandidateError::EmptyPath { line: line_no });
            }
            let quoted_value = rest.last().is_some_and(|t| t.quoted) && rest.len() > 1;
            if quoted_value {
                let value = rest.pop().map(|t| t.text).unwrap_or_default();
                config.set(NodePath::new(rest.into_iter().map(|t| t.text)), value);
            } else {
                config.set_present(NodePath::new(rest.into_iter().map(|t| t.text)));
            }
        }
        Ok(config)
    }

    /// Moves tokens between path and value once the schema is known.
    ///
    /// `classify` reports what each configuration path is in the schema.
    /// A valueless entry whose path is [`PathRole::Unknown`] but whose
    /// parent is a [`PathRole::ValueLeaf`] has its last segment turned into
    /// a value of the parent; any other unknown path is kept so validation
    /// reports it as an unknown node. Values recorded on a
    /// [`PathRole::Tag`] become tag instances, so `set a tag 'x'` names
    /// instance `x`.
    pub fn split_leaf_values(&self, classify: impl Fn(&NodePath) -> PathRole) -> Self {
        let mut out = Self::new();
        for (path, values) in &self.entries {
            let role = classify(path);
            if !values.is_empty() {
                if role == PathRole::Tag {
                    for value in values {
                        out.set_present(path.child(value.clone()));
                    }
                } else {
                    out.entries
                        .entry(path.clone())
                        .or_default()
                        .extend(values.iter().cloned());
                }
                continue;
            }
            if role != PathRole::Unknown {
                out.set_present(path.clone());
                continue;
            }
            match (path.parent(), path.last()) {
                (Some(parent), Some(last))
                    if !parent.is_root() && classify(&parent) == PathRole::ValueLeaf =>
                {
                    out.set(parent, last.to_string());
                }
                _ => {
                    out.set_present(path.clone());
                }
            }
        }
        out
    }

    /// [`split_leaf_values`](Self::split_leaf_values) with `tree` deciding
    /// what each path is.
    pub fn split_with_schema(&self, tree: &SchemaTree) -> Self {
        self.split_leaf_values(|path| PathRole::of(tree, path))
    }
}

/// What a configuration path names in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathRole {
    /// No schema node.
    Unknown,
    /// A leaf that takes values.
    ValueLeaf,
    /// A tag node still waiting for its instance name.
    Tag,
    /// A container, tag instance or valueless leaf.
    Node,
}

impl PathRole {
    pub fn of(tree: &SchemaTree, path: &NodePath) -> Self {
        let Ok(resolved) = tree.resolve_config_path(path) else {
            return PathRole::Unknown;
        };
        if resolved.ends_on_tag_instance() {
            return PathRole::Node;
        }
        match tree.lookup(&resolved.schema_path) {
            Ok(node) => match node.kind() {
                NodeKind::Tag => PathRole::Tag,
                NodeKind::Leaf if !node.is_valueless() => PathRole::ValueLeaf,
                _ => PathRole::Node,
            },
            Err(_) => PathRole::Unknown,
        }
    }
}

/// Read-only view of a [`CandidateConfig`] relative to a base path.
#[derive(Debug, Clone)]
pub struct ConfigLevel<'a> {
    config: &'a CandidateConfig,
    base: NodePath,
}

impl<'a> ConfigLevel<'a> {
    pub fn base(&self) -> &NodePath {
        &self.base
    }

    fn join(&self, relative: &str) -> NodePath {
        let mut path = self.base.clone();
        for segment in NodePath::parse(relative).segments() {
            path = path.child(segment.clone());
        }
        path
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.config.exists(self.join(relative))
    }

    pub fn value(&self, relative: &str) -> Option<&'a str> {
        self.config.value(self.join(relative))
    }

    pub fn values(&self, relative: &str) -> &'a [String] {
        self.config.values(self.join(relative))
    }

    pub fn list_nodes(&self, relative: &str) -> Vec<&'a str> {
        self.config.list_nodes(self.join(relative))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

struct Token {
    text: String,
    quoted: bool,
}

/// Splits a line on whitespace, honoring single and double quotes.
/// Returns `None` on an unterminated quote.
fn tokenize(line: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '\'' || c == '"' {
            chars.next();
            let mut text = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == c {
                    closed = true;
                    break;
                }
                text.push(ch);
            }
            if !closed {
                return None;
            }
            tokens.push(Token { text, quoted: true });
            continue;
        }
        let mut text = String::new();
        while let Some(&ch) = chars.peek() {
            if ch.is_whitespace() {
                break;
            }
            text.push(ch);
            chars.next();
        }
        tokens.push(Token {
            text,
            quoted: false,
        });
    }
    Some(tokens)
}

#[cfg(test)]
mod tests {
    use config_schema_core::NodeDescriptor;
    use serde_json::json;

    use super::*;
    use crate::constraint::CompileOptions;
    use crate::validate::{ValidationEngine, Violation};

    #[test]
    fn test_from_json_value_shapes() {
        let doc = json!({
            "interfaces": {
                "pppoe": {
                    "pppoe0": {
                        "source-interface": "eth0",
                        "mtu": 1492,
                        "disable": null,
                        "address": ["192.0.2.1", "192.0.2.2"],
                        "ipv6": {}
                    }
                }
            }
        });
        let config = CandidateConfig::from_json_value(&doc).unwrap();
        let level = config.at_level("interfaces.pppoe.pppoe0");
        assert_eq!(level.value("source-interface"), Some("eth0"));
        assert_eq!(level.value("mtu"), Some("1492"));
        assert!(level.exists("disable"));
        assert!(level.values("disable").is_empty());
        assert_eq!(level.values("address"), ["192.0.2.1", "192.0.2.2"]);
        assert!(level.exists("ipv6"));
        assert_eq!(config.len(), 5);
    }

    #[test]
    fn test_from_json_rejects_non_object_and_nested_lists() {
        assert_eq!(
            CandidateConfig::from_json_value(&json!(["a"])).unwrap_err(),
            CandidateError::NotAnObject
        );
        assert!(matches!(
            CandidateConfig::from_json_value(&json!({"a": [["b"]]})).unwrap_err(),
            CandidateError::UnsupportedValue(_)
        ));
    }

    #[test]
    fn test_exists_covers_implied_containers() {
        let mut config = CandidateConfig::new();
        config.set("interfaces.pppoe.pppoe0.mtu", "1492");
        assert!(config.exists("interfaces"));
        assert!(config.exists("interfaces.pppoe.pppoe0"));
        assert!(!config.exists("interfaces.ethernet"));
        assert!(!config.exists("interfaces.pppoe.pppoe01"));
    }

    #[test]
    fn test_list_nodes_returns_tag_instances() {
        let mut config = CandidateConfig::new();
        config
            .set("interfaces.pppoe.pppoe0.mtu", "1492")
            .set("interfaces.pppoe.pppoe0.source-interface", "eth0")
            .set("interfaces.pppoe.pppoe1.mtu", "1400");
        assert_eq!(config.list_nodes("interfaces.pppoe"), vec!["pppoe0", "pppoe1"]);
        assert!(config.list_nodes("system").is_empty());
    }

    #[test]
    fn test_set_commands_quoting_and_errors() {
        let config = CandidateConfig::from_set_commands(
            "# comment\n\nset interfaces mirror interface \"bad name\"\n",
        )
        .unwrap();
        assert_eq!(config.values("interfaces.mirror.interface"), ["bad name"]);

        assert_eq!(
            CandidateConfig::from_set_commands("delete interfaces").unwrap_err(),
            CandidateError::NotASetCommand { line: 1 }
        );
        assert_eq!(
            CandidateConfig::from_set_commands("set").unwrap_err(),
            CandidateError::EmptyPath { line: 1 }
        );
        assert_eq!(
            CandidateConfig::from_set_commands("set a 'b").unwrap_err(),
            CandidateError::UnterminatedQuote { line: 1 }
        );
    }

    #[test]
    fn test_split_leaf_values_uses_schema_knowledge() {
        let raw = CandidateConfig::from_set_commands(
            "set interfaces mirror interface eth0\nset interfaces mirror interface eth1\nset interfaces mirror disable\n",
        )
        .unwrap();
        let split = raw.split_leaf_values(|p| match p.to_string().as_str() {
            "interfaces" | "interfaces.mirror" | "interfaces.mirror.disable" => PathRole::Node,
            "interfaces.mirror.interface" => PathRole::ValueLeaf,
            _ => PathRole::Unknown,
        });
        assert_eq!(split.values("interfaces.mirror.interface"), ["eth0", "eth1"]);
        assert!(split.exists("interfaces.mirror.disable"));
        assert!(split.values("interfaces.mirror.disable").is_empty());
    }

    fn pppoe_tree() -> SchemaTree {
        let root = NodeDescriptor::new("").with_child(
            NodeDescriptor::container("interfaces").with_child(
                NodeDescriptor::tag("pppoe")
                    .with_child(NodeDescriptor::leaf("mtu"))
                    .with_child(NodeDescriptor::leaf("disable").valueless()),
            ),
        );
        SchemaTree::build(&root, &CompileOptions::default()).unwrap()
    }

    #[test]
    fn test_misspelled_child_stays_an_unknown_node() {
        let tree = pppoe_tree();
        let split = CandidateConfig::from_set_commands(
            "set interfaces pppoe pppoe0 mtux
set interfaces bogus
set interfaces pppoe pppoe0 disable extra
",
        )
        .unwrap()
        .split_with_schema(&tree);

        assert!(split.exists("interfaces.pppoe.pppoe0.mtux"));
        assert!(split.exists("interfaces.bogus"));
        assert!(split.values("interfaces.pppoe.pppoe0").is_empty());
        assert!(split.values("interfaces").is_empty());

        let report = ValidationEngine::new(&tree).validate(&split);
        let unknown: Vec<String> = report
            .violations()
            .iter()
            .filter_map(|v| match v {
                Violation::UnknownNode { path } => Some(path.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(
            unknown,
            vec![
                "interfaces.bogus",
                "interfaces.pppoe.pppoe0.disable.extra",
                "interfaces.pppoe.pppoe0.mtux",
            ]
        );
        assert!(
            !report
                .violations()
                .iter()
                .any(|v| matches!(v, Violation::UnexpectedValue { .. })),
            "{:?}",
            report.violations()
        );
    }

    #[test]
    fn test_quoted_token_after_tag_is_an_instance_name() {
        let tree = pppoe_tree();
        let split = CandidateConfig::from_set_commands(
            "set interfaces pppoe 'pppoe0'
set interfaces pppoe \"pppoe1\" mtu 1492
",
        )
        .unwrap()
        .split_with_schema(&tree);

        assert_eq!(split.list_nodes("interfaces.pppoe"), vec!["pppoe0", "pppoe1"]);
        assert!(split.values("interfaces.pppoe").is_empty());
        assert_eq!(split.value("interfaces.pppoe.pppoe1.mtu"), Some("1492"));
        assert!(ValidationEngine::new(&tree).validate(&split).is_valid());
    }

    #[test]
    fn test_path_role_classification() {
        let tree = pppoe_tree();
        let role = |p: &str| PathRole::of(&tree, &NodePath::parse(p));
        assert_eq!(role("interfaces"), PathRole::Node);
        assert_eq!(role("interfaces.pppoe"), PathRole::Tag);
        assert_eq!(role("interfaces.pppoe.pppoe0"), PathRole::Node);
        assert_eq!(role("interfaces.pppoe.pppoe0.mtu"), PathRole::ValueLeaf);
        assert_eq!(role("interfaces.pppoe.pppoe0.disable"), PathRole::Node);
        assert_eq!(role("interfaces.ethernet"), PathRole::Unknown);
    }
}
