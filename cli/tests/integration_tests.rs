use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn schema_check(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_schema-check"))
        .args(args)
        .output()
        .expect("failed to run schema-check")
}

fn write(dir: &Path, rel: &str, content: &str) -> PathBuf {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, content).unwrap();
    path
}

/// Fragments for a mirror-style interface schema with a tag node.
fn write_fragments(dir: &Path) -> PathBuf {
    let fragments = dir.join("fragments");
    write(
        &fragments,
        "root.yaml",
        r#"
name: ""
children:
  - name: interfaces
    kind: container
    children:
      - name: pppoe
        kind: tag
        constraints:
          - type: pattern
            regex: "pppoe[0-9]+"
        children:
          - name: source-interface
            includes: [include/source-interface.yaml]
          - name: default-route
            kind: leaf
            completion_help:
              list: [auto, force, none]
          - name: disable
            kind: leaf
            valueless: true
"#,
    );
    write(
        &fragments,
        "include/source-interface.yaml",
        r#"
name: source-interface
kind: leaf
help: Interface used to establish connection
constraints:
  - type: pattern
    regex: "(eth|wlan)[0-9]+"
"#,
    );
    fragments
}

fn write_config(dir: &Path) -> PathBuf {
    write_fragments(dir);
    write(
        dir,
        "engine.yml",
        r#"
fragments:
  dir: fragments
  root: root.yaml
required:
  interfaces.pppoe: [source-interface]
"#,
    )
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// build / show
// ---------------------------------------------------------------------------

#[test]
fn build_reports_node_count() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = write_fragments(dir.path());

    let output = schema_check(&["build", "--fragments", fragments.to_str().unwrap()]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("5 node(s)"), "{}", stdout(&output));
}

#[test]
fn build_fails_on_missing_include() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = write_fragments(dir.path());
    fs::remove_file(fragments.join("include/source-interface.yaml")).unwrap();

    let output = schema_check(&["build", "--fragments", fragments.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("include/source-interface.yaml"));
}

#[test]
fn show_prints_node_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = write_fragments(dir.path());

    let output = schema_check(&[
        "show",
        "--fragments",
        fragments.to_str().unwrap(),
        "interfaces.pppoe.source-interface",
    ]);
    assert!(output.status.success(), "{output:?}");
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kind"], "leaf");
    assert_eq!(json["help"], "Interface used to establish connection");
    assert_eq!(json["multi"], false);
}

#[test]
fn show_unknown_path_fails() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = write_fragments(dir.path());

    let output = schema_check(&[
        "show",
        "--fragments",
        fragments.to_str().unwrap(),
        "interfaces.bogus",
    ]);
    assert_eq!(output.status.code(), Some(1));
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_set_commands_valid_candidate() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let candidate = write(
        dir.path(),
        "candidate.txt",
        "set interfaces pppoe pppoe0 source-interface eth0\nset interfaces pppoe pppoe0 disable\n",
    );

    let output = schema_check(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--candidate",
        candidate.to_str().unwrap(),
        "--set-commands",
    ]);
    assert!(output.status.success(), "{}", stdout(&output));
}

#[test]
fn validate_reports_violations_with_exit_2() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let candidate = write(
        dir.path(),
        "candidate.json",
        r#"{"interfaces": {"pppoe": {"pppoe0": {"source-interface": "lo", "bogus": "x"}}}}"#,
    );

    let output = schema_check(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--candidate",
        candidate.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["indeterminate"], false);
    let violations = json["violations"].as_object().unwrap();
    assert!(violations.contains_key("interfaces.pppoe.pppoe0.source-interface"));
    assert!(violations.contains_key("interfaces.pppoe.pppoe0.bogus"));
}

#[test]
fn validate_missing_required_child() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let candidate = write(
        dir.path(),
        "candidate.yaml",
        "interfaces:\n  pppoe:\n    pppoe0:\n      default-route: auto\n",
    );

    let output = schema_check(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--candidate",
        candidate.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    assert!(stdout(&output).contains("source-interface"));
}

#[cfg(unix)]
#[test]
fn validate_missing_validator_is_indeterminate() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = dir.path().join("fragments");
    write(
        &fragments,
        "root.yaml",
        r#"
name: ""
children:
  - name: host-name
    kind: leaf
    constraints:
      - type: external_check
        command: no-such-validator
"#,
    );
    let candidate = write(dir.path(), "candidate.json", r#"{"host-name": "router"}"#);

    let output = schema_check(&[
        "validate",
        "--fragments",
        fragments.to_str().unwrap(),
        "--validators",
        dir.path().join("validators").to_str().unwrap(),
        "--candidate",
        candidate.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(3));
}

#[cfg(unix)]
#[test]
fn validate_definite_violation_wins_over_missing_validator() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = dir.path().join("fragments");
    write(
        &fragments,
        "root.yaml",
        r#"
name: ""
children:
  - name: host-name
    kind: leaf
    constraints:
      - type: external_check
        command: no-such-validator
"#,
    );
    let candidate = write(
        dir.path(),
        "candidate.json",
        r#"{"host-name": "router", "bogus": "x"}"#,
    );

    let output = schema_check(&[
        "validate",
        "--fragments",
        fragments.to_str().unwrap(),
        "--validators",
        dir.path().join("validators").to_str().unwrap(),
        "--candidate",
        candidate.to_str().unwrap(),
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["indeterminate"], true);
    assert!(json["violations"].as_object().unwrap().contains_key("bogus"));
}

#[test]
fn validate_set_commands_reports_misspelled_node() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let candidate = write(
        dir.path(),
        "candidate.txt",
        "set interfaces pppoe pppoe0 source-interface eth0\nset interfaces pppoe pppoe0 disabel\n",
    );

    let output = schema_check(&[
        "validate",
        "--config",
        config.to_str().unwrap(),
        "--candidate",
        candidate.to_str().unwrap(),
        "--set-commands",
        "--format",
        "json",
    ]);
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let violations = json["violations"].as_object().unwrap();
    assert_eq!(violations.len(), 1);
    assert!(violations.contains_key("interfaces.pppoe.pppoe0.disabel"));
}

// ---------------------------------------------------------------------------
// complete
// ---------------------------------------------------------------------------

#[test]
fn complete_lists_children_and_literal_values() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = write_fragments(dir.path());
    let fragments = fragments.to_str().unwrap();

    let output = schema_check(&["complete", "--fragments", fragments, "interfaces pppoe pppoe0"]);
    assert!(output.status.success(), "{output:?}");
    let lines: Vec<String> = stdout(&output).lines().map(String::from).collect();
    assert_eq!(lines, vec!["default-route", "disable", "source-interface"]);

    let output = schema_check(&[
        "complete",
        "--fragments",
        fragments,
        "interfaces pppoe pppoe0 default-route",
        "--prefix",
        "f",
    ]);
    assert_eq!(stdout(&output).trim(), "force");
}

// ---------------------------------------------------------------------------
// fingerprint
// ---------------------------------------------------------------------------

#[test]
fn fingerprint_check_detects_changes() {
    let dir = tempfile::tempdir().unwrap();
    let fragments = write_fragments(dir.path());
    let manifest = dir.path().join("out/manifest.json");

    let output = schema_check(&[
        "fingerprint",
        "--fragments",
        fragments.to_str().unwrap(),
        "--output",
        manifest.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{output:?}");
    assert!(manifest.exists());

    let check = |expected: i32| {
        let output = schema_check(&[
            "fingerprint",
            "--fragments",
            fragments.to_str().unwrap(),
            "--check",
            manifest.to_str().unwrap(),
        ]);
        assert_eq!(output.status.code(), Some(expected), "{output:?}");
        output
    };
    check(0);

    write(
        &fragments,
        "include/source-interface.yaml",
        "name: source-interface\nkind: leaf\n",
    );
    let output = check(4);
    assert_eq!(stdout(&output).trim(), "include/source-interface.yaml");
}
