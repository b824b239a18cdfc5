#![cfg(unix)]

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config_schema_core::{CompletionHelp, ConstraintSpec, NodeDescriptor, NodePath, ValueHelp};
use config_schema_engine::{
    BuildError, CandidateConfig, ExecutionError, SchemaBuilder, SchemaRegistry, SchemaTree,
    ValidationEngine, ValidationMode, Violation,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Writes an interface-name checker that rejects empty names and names
/// containing whitespace. Run through `sh` so the file never needs to be
/// executable.
fn write_interface_checker(dir: &Path) -> String {
    let script = dir.join("interface-name");
    std::fs::write(
        &script,
        "case \"$1\" in\n  ''|*' '*) exit 1 ;;\nesac\nexit 0\n",
    )
    .unwrap();
    format!("sh {}", script.display())
}

fn interface_leaf(checker: &str) -> NodeDescriptor {
    NodeDescriptor::leaf("interface")
        .with_help("Interface used for traffic capture")
        .with_value_help(ValueHelp::new("txt", "Interface name"))
        .with_completion(CompletionHelp::from_script("list_interfaces"))
        .with_constraint(ConstraintSpec::pattern(".+"))
        .with_constraint(ConstraintSpec::external(checker))
        .multi()
}

fn build_tree(leaf: NodeDescriptor) -> SchemaTree {
    let root = NodeDescriptor::new("").with_child(leaf);
    SchemaBuilder::new()
        .external_timeout(Duration::from_secs(10))
        .build(&root, &HashMap::<String, NodeDescriptor>::new())
        .unwrap()
}

// ---------------------------------------------------------------------------
// Interface leaf scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_multi_interface_leaf_accepts_valid_names() {
    let dir = tempfile::tempdir().unwrap();
    let tree = build_tree(interface_leaf(&write_interface_checker(dir.path())));

    let mut candidate = CandidateConfig::new();
    candidate.set_values("interface", ["eth0", "eth1"]);

    let report = ValidationEngine::new(&tree).validate(&candidate);
    assert!(report.violations().is_empty(), "{:?}", report.violations());
}

#[test]
fn test_external_checker_rejects_bad_name() {
    let dir = tempfile::tempdir().unwrap();
    let tree = build_tree(interface_leaf(&write_interface_checker(dir.path())));

    let mut candidate = CandidateConfig::new();
    candidate.set_values("interface", ["bad name"]);

    let report = ValidationEngine::new(&tree).validate(&candidate);
    match report.violations() {
        [Violation::ConstraintViolation { path, value, .. }] => {
            assert_eq!(path, &NodePath::parse("interface"));
            assert_eq!(value, "bad name");
        }
        other => panic!("expected one constraint violation, got {other:?}"),
    }
    assert!(!report.is_indeterminate());
}

#[test]
fn test_missing_checker_is_indeterminate_not_a_pass() {
    let tree = build_tree(interface_leaf("/nonexistent/validators/interface-name"));

    let mut candidate = CandidateConfig::new();
    candidate.set_values("interface", ["eth0"]);

    let report = ValidationEngine::new(&tree).validate(&candidate);
    assert!(!report.is_valid());
    assert!(report.is_indeterminate());
    match report.violations() {
        [Violation::ValidatorExecution { value, error, .. }] => {
            assert_eq!(value, "eth0");
            assert!(matches!(error, ExecutionError::NotFound(_)));
        }
        other => panic!("expected one execution error, got {other:?}"),
    }
}

#[test]
fn test_hung_checker_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("hang");
    std::fs::write(&script, "sleep 5\n").unwrap();
    let root = NodeDescriptor::new("").with_child(
        NodeDescriptor::leaf("interface").with_constraint(ConstraintSpec::external(format!(
            "sh {}",
            script.display()
        ))),
    );
    let tree = SchemaBuilder::new()
        .external_timeout(Duration::from_millis(100))
        .build(&root, &HashMap::<String, NodeDescriptor>::new())
        .unwrap();

    let mut candidate = CandidateConfig::new();
    candidate.set("interface", "eth0");
    let report = ValidationEngine::new(&tree).validate(&candidate);
    assert!(matches!(
        report.violations(),
        [Violation::ValidatorExecution {
            error: ExecutionError::Timeout { .. },
            ..
        }]
    ));
}

#[test]
fn test_multiplicity_rules() {
    let tree = build_tree(NodeDescriptor::leaf("interface").multi());
    for n in 0..4 {
        let mut candidate = CandidateConfig::new();
        candidate.set_values("interface", (0..n).map(|i| format!("eth{i}")));
        let report = ValidationEngine::new(&tree).validate(&candidate);
        assert!(
            !report
                .violations()
                .iter()
                .any(|v| matches!(v, Violation::Multiplicity { .. })),
            "multi leaf with {n} values"
        );
    }

    let tree = build_tree(NodeDescriptor::leaf("interface"));
    for n in 2..5 {
        let mut candidate = CandidateConfig::new();
        candidate.set_values("interface", (0..n).map(|i| format!("eth{i}")));
        let report = ValidationEngine::new(&tree).validate(&candidate);
        assert_eq!(
            report.violations(),
            [Violation::Multiplicity {
                path: NodePath::parse("interface"),
                count: n
            }]
        );
    }
}

#[test]
fn test_fail_fast_stops_at_first_bad_value() {
    let dir = tempfile::tempdir().unwrap();
    let tree = build_tree(interface_leaf(&write_interface_checker(dir.path())));

    let mut candidate = CandidateConfig::new();
    candidate.set_values("interface", ["bad one", "bad two", "eth0"]);

    let collected = ValidationEngine::new(&tree).validate(&candidate);
    assert_eq!(collected.violations().len(), 2);

    let fast = ValidationEngine::new(&tree)
        .with_mode(ValidationMode::FailFast)
        .validate(&candidate);
    assert_eq!(fast.violations().len(), 1);
}

// ---------------------------------------------------------------------------
// Build scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_cyclic_chain_publishes_no_tree() {
    let mut fragments = HashMap::new();
    fragments.insert(
        "include/a.yaml".to_string(),
        NodeDescriptor::new("").with_constraint(ConstraintSpec::include("include/b.yaml")),
    );
    fragments.insert(
        "include/b.yaml".to_string(),
        NodeDescriptor::new("").with_constraint(ConstraintSpec::include("include/a.yaml")),
    );
    let root = NodeDescriptor::new("")
        .with_child(NodeDescriptor::leaf("ok"))
        .with_child(
            NodeDescriptor::leaf("interface")
                .with_constraint(ConstraintSpec::include("include/a.yaml")),
        );

    let registry = SchemaRegistry::new();
    let err = registry
        .reload(|| SchemaBuilder::new().build(&root, &fragments))
        .unwrap_err();
    assert!(matches!(err, BuildError::CircularInclude { .. }));
    assert!(registry.current().is_none());
}

#[test]
fn test_completion_help_is_exposed_not_executed() {
    let tree = build_tree(
        NodeDescriptor::leaf("interface")
            .with_completion(CompletionHelp::from_script("/nonexistent/list_interfaces")),
    );
    let help = tree
        .completion_help(&NodePath::parse("interface"))
        .unwrap()
        .unwrap();
    assert_eq!(help.script.as_deref(), Some("/nonexistent/list_interfaces"));
}
