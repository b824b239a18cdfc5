use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use config_schema_core::{CompletionHelp, ConstraintSpec, NodeKind, NodePath, ValueHelp};
use config_schema_db::{EngineConfig, FragmentStore, SchemaManifest};
use config_schema_engine::exec::capture_lines_with_timeout;
use config_schema_engine::{
    CandidateConfig, RequiredNodes, SchemaBuilder, SchemaTree, ValidationEngine, ValidationMode,
    ValidationReport,
};
use serde::Serialize;
use tracing::debug;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status when the candidate has definite violations.
const EXIT_VIOLATIONS: i32 = 2;
/// Exit status when a validator could not run.
const EXIT_INDETERMINATE: i32 = 3;
/// Exit status when `fingerprint --check` finds changed fragments.
const EXIT_STALE: i32 = 4;

/// CLI-specific output format enum with clap argument parsing support.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Yaml,
    Text,
}

#[derive(Debug, Parser)]
#[command(name = "schema-check")]
#[command(version = PACKAGE_VERSION)]
#[command(about = "Build configuration schemas from fragments and check candidate configs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve includes, compile constraints and report the node count.
    Build(BuildArgs),
    /// Print the schema node at a path.
    Show(ShowArgs),
    /// Validate a candidate configuration against the schema.
    Validate(ValidateArgs),
    /// List completion candidates for a path.
    Complete(CompleteArgs),
    /// Record or check fragment checksums.
    Fingerprint(FingerprintArgs),
}

/// Where fragments, validators and the root fragment come from.
#[derive(Debug, Args)]
struct SourceArgs {
    /// Engine configuration YAML.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory of fragment files (overrides the configuration).
    #[arg(long)]
    fragments: Option<PathBuf>,
    /// FragmentPackage JSON bundle (overrides the configuration).
    #[arg(long)]
    bundle: Option<PathBuf>,
    /// Root fragment path within the fragment store.
    #[arg(long)]
    root: Option<String>,
    /// Directory bare validator names are resolved against.
    #[arg(long)]
    validators: Option<PathBuf>,
    /// Per-invocation validator timeout in milliseconds.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Args)]
struct BuildArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[derive(Debug, Args)]
struct ShowArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Schema path, dotted or space separated (empty for the root).
    #[arg(default_value = "")]
    path: String,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ValidateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Candidate configuration file (JSON, YAML or `set` commands).
    #[arg(long)]
    candidate: PathBuf,
    /// Treat the candidate file as `set` command lines.
    #[arg(long)]
    set_commands: bool,
    /// Stop checking a leaf's values at its first failure.
    #[arg(long)]
    fail_fast: bool,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct CompleteArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Configuration path, dotted or space separated.
    path: String,
    /// Only list candidates starting with this prefix.
    #[arg(long, default_value = "")]
    prefix: String,
    /// Also run the node's completion script.
    #[arg(long)]
    run_script: bool,
}

#[derive(Debug, Args)]
struct FingerprintArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Write the manifest to this path.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Compare against a previously written manifest.
    #[arg(long)]
    check: Option<PathBuf>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Build(args) => run_build(args).map(|()| 0),
        Command::Show(args) => run_show(args).map(|()| 0),
        Command::Validate(args) => run_validate(args),
        Command::Complete(args) => run_complete(args).map(|()| 0),
        Command::Fingerprint(args) => run_fingerprint(args),
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}

/// Everything a subcommand needs once sources are resolved.
struct Loaded {
    config: EngineConfig,
    store: FragmentStore,
    root: String,
}

fn load_sources(args: &SourceArgs) -> Result<Loaded, String> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display()))?,
        None => EngineConfig::default(),
    };

    if let Some(dir) = &args.fragments {
        config.fragments.dir = Some(dir.clone());
    }
    if let Some(bundle) = &args.bundle {
        config.fragments.bundle = Some(bundle.clone());
    }
    if let Some(dir) = &args.validators {
        config.validators.dir = Some(dir.clone());
    }
    if let Some(timeout_ms) = args.timeout_ms {
        if timeout_ms == 0 {
            return Err("--timeout-ms must be greater than zero".to_string());
        }
        config.validators.timeout_ms = timeout_ms;
    }
    if config.fragments.dir.is_none() && config.fragments.bundle.is_none() {
        return Err("Specify a fragment source: --config, --fragments, or --bundle".to_string());
    }

    let store = config
        .fragment_store()
        .map_err(|err| format!("Failed to load fragments: {err}"))?;

    // An explicit --root wins; otherwise a bundle's own root beats the default.
    let root = match (&args.root, &args.config, store.root()) {
        (Some(root), _, _) => root.clone(),
        (None, None, Some(bundle_root)) => bundle_root.to_string(),
        _ => config.fragments.root.clone(),
    };
    debug!(root = %root, fragments = store.len(), "Resolved fragment sources");

    Ok(Loaded {
        config,
        store,
        root,
    })
}

fn build_tree(loaded: &Loaded) -> Result<SchemaTree, String> {
    let mut builder = SchemaBuilder::new().external_timeout(loaded.config.validator_timeout());
    if let Some(dir) = &loaded.config.validators.dir {
        builder = builder.validator_dir(dir);
    }
    builder
        .build_fragment(&loaded.root, &loaded.store)
        .map_err(|err| format!("Schema build failed: {err}"))
}

fn required_nodes(config: &EngineConfig) -> RequiredNodes {
    let mut required = RequiredNodes::new();
    for (container, children) in &config.required {
        for child in children {
            required.require(container.as_str(), child.clone());
        }
    }
    required
}

fn run_build(args: BuildArgs) -> Result<(), String> {
    let loaded = load_sources(&args.source)?;
    let tree = build_tree(&loaded)?;
    println!(
        "Built schema tree with {} node(s) from {} fragment(s) (root '{}').",
        tree.len().saturating_sub(1),
        loaded.store.len(),
        loaded.root
    );
    Ok(())
}

/// Serializable view of one schema node.
#[derive(Debug, Serialize)]
struct NodeView<'a> {
    path: String,
    kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    help: Option<&'a str>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    value_help: &'a [ValueHelp],
    #[serde(skip_serializing_if = "Option::is_none")]
    completion_help: Option<&'a CompletionHelp>,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    constraints: &'a [ConstraintSpec],
    multi: bool,
    valueless: bool,
    children: &'a [String],
}

fn run_show(args: ShowArgs) -> Result<(), String> {
    let loaded = load_sources(&args.source)?;
    let tree = build_tree(&loaded)?;
    let path = NodePath::parse(&args.path);
    let node = tree.lookup(&path).map_err(|err| err.to_string())?;
    let descriptor = node.descriptor();

    let view = NodeView {
        path: path.to_string(),
        kind: node.kind(),
        help: descriptor.help.as_deref(),
        value_help: &descriptor.value_help,
        completion_help: node.completion_help(),
        constraints: &descriptor.constraints,
        multi: node.is_multi(),
        valueless: node.is_valueless(),
        children: node.children(),
    };

    let raw = match args.format {
        CliOutputFormat::Json => serde_json::to_string_pretty(&view)
            .map_err(|err| format!("Failed to serialize node: {err}"))?,
        CliOutputFormat::Yaml => serde_yaml::to_string(&view)
            .map_err(|err| format!("Failed to serialize node: {err}"))?,
        CliOutputFormat::Text => format_node_text(&view),
    };
    println!("{}", raw.trim_end());
    Ok(())
}

fn format_node_text(view: &NodeView<'_>) -> String {
    let mut out = format!("{} ({})\n", display_path(&view.path), view.kind);
    if let Some(help) = view.help {
        out.push_str(&format!("  {help}\n"));
    }
    for hint in view.value_help {
        out.push_str(&format!("  <{}>  {}\n", hint.format, hint.description));
    }
    if view.multi {
        out.push_str("  multiple values allowed\n");
    }
    if view.valueless {
        out.push_str("  takes no value\n");
    }
    for child in view.children {
        out.push_str(&format!("  {child}\n"));
    }
    out
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

/// Serializable validation outcome.
#[derive(Debug, Serialize)]
struct ValidationView {
    valid: bool,
    indeterminate: bool,
    violations: BTreeMap<String, Vec<String>>,
}

fn run_validate(args: ValidateArgs) -> Result<i32, String> {
    let loaded = load_sources(&args.source)?;
    let tree = build_tree(&loaded)?;
    let candidate = read_candidate(&args.candidate, args.set_commands, &tree)?;

    let required = required_nodes(&loaded.config);
    let mode = if args.fail_fast || loaded.config.validation.fail_fast {
        ValidationMode::FailFast
    } else {
        ValidationMode::CollectAll
    };
    let report = ValidationEngine::new(&tree)
        .with_mode(mode)
        .with_required(&required)
        .with_parallel(loaded.config.validation.parallel)
        .validate(&candidate);

    match args.format {
        CliOutputFormat::Text => {
            for message in report.messages() {
                println!("{message}");
            }
            if report.is_valid() {
                println!("Candidate is valid ({} entr(ies)).", candidate.len());
            }
        }
        format => {
            let view = ValidationView {
                valid: report.is_valid(),
                indeterminate: report.is_indeterminate(),
                violations: report.by_path(),
            };
            let raw = match format {
                CliOutputFormat::Yaml => serde_yaml::to_string(&view)
                    .map_err(|err| format!("Failed to serialize report: {err}"))?,
                _ => serde_json::to_string_pretty(&view)
                    .map_err(|err| format!("Failed to serialize report: {err}"))?,
            };
            println!("{}", raw.trim_end());
        }
    }

    Ok(validation_exit_code(&report))
}

/// Definite violations reject the candidate even when some validator also
/// failed to run.
fn validation_exit_code(report: &ValidationReport) -> i32 {
    if report.is_valid() {
        0
    } else if report.has_definite_violations() {
        EXIT_VIOLATIONS
    } else {
        EXIT_INDETERMINATE
    }
}

fn read_candidate(
    path: &Path,
    set_commands: bool,
    tree: &SchemaTree,
) -> Result<CandidateConfig, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let parse_err = |err: String| format!("Failed to parse '{}': {err}", path.display());

    if set_commands {
        let parsed =
            CandidateConfig::from_set_commands(&raw).map_err(|e| parse_err(e.to_string()))?;
        return Ok(parsed.split_with_schema(tree));
    }

    let document: serde_json::Value = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => {
            serde_yaml::from_str(&raw).map_err(|e| parse_err(e.to_string()))?
        }
        _ => serde_json::from_str(&raw).map_err(|e| parse_err(e.to_string()))?,
    };
    CandidateConfig::from_json_value(&document).map_err(|e| parse_err(e.to_string()))
}

fn run_complete(args: CompleteArgs) -> Result<(), String> {
    let loaded = load_sources(&args.source)?;
    let tree = build_tree(&loaded)?;
    let resolved = tree
        .resolve_config_path(&NodePath::parse(&args.path))
        .map_err(|err| err.to_string())?;
    let node = tree
        .lookup(&resolved.schema_path)
        .map_err(|err| err.to_string())?;

    let mut candidates: BTreeSet<String> = BTreeSet::new();
    let awaiting_tag_value = node.kind() == NodeKind::Tag && !resolved.ends_on_tag_instance();
    if node.kind().has_children() && !awaiting_tag_value {
        candidates.extend(
            node.children()
                .iter()
                .filter(|c| c.starts_with(&args.prefix))
                .cloned(),
        );
    }
    candidates.extend(
        tree.completion_candidates(&resolved.schema_path, &args.prefix)
            .map_err(|err| err.to_string())?
            .into_iter()
            .map(String::from),
    );

    if args.run_script {
        if let Some(script) = node.completion_help().and_then(|h| h.script.as_deref()) {
            let mut tokens = script.split_whitespace();
            if let Some(program) = tokens.next() {
                let script_args: Vec<&str> = tokens.collect();
                let words = capture_lines_with_timeout(
                    program,
                    &script_args,
                    loaded.config.validator_timeout(),
                )
                .map_err(|err| format!("Completion script failed: {err}"))?;
                candidates.extend(words.into_iter().filter(|w| w.starts_with(&args.prefix)));
            }
        }
    }

    for candidate in candidates {
        println!("{candidate}");
    }
    Ok(())
}

fn run_fingerprint(args: FingerprintArgs) -> Result<i32, String> {
    let loaded = load_sources(&args.source)?;
    let manifest = SchemaManifest::from_store(&loaded.store, loaded.root.as_str());

    if let Some(path) = &args.output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    format!(
                        "Failed to create output directory '{}': {err}",
                        parent.display()
                    )
                })?;
            }
        }
        manifest
            .save(path)
            .map_err(|err| format!("Failed to write '{}': {err}", path.display()))?;
        println!(
            "Recorded {} fragment checksum(s) in '{}'.",
            manifest.fragments.len(),
            path.display()
        );
    }

    if let Some(path) = &args.check {
        let previous = SchemaManifest::load(path)
            .map_err(|err| format!("Failed to load manifest '{}': {err}", path.display()))?;
        if previous.needs_rebuild(&manifest) {
            let changed = previous.diff(&manifest);
            eprintln!("Schema is stale: {} fragment(s) changed.", changed.len());
            for fragment in changed {
                println!("{fragment}");
            }
            return Ok(EXIT_STALE);
        }
        println!("Schema is up to date ({}).", manifest.fingerprint);
        return Ok(0);
    }

    if args.output.is_none() {
        let raw = serde_json::to_string_pretty(&manifest)
            .map_err(|err| format!("Failed to serialize manifest: {err}"))?;
        println!("{raw}");
    }
    Ok(0)
}
