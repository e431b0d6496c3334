use std::sync::Arc;

use cliforge_codegen::{
    ArtifactSink, CodeGenerator, GenerationMetadata, GeneratorConfig, Pipeline, PipelineState,
    SafetyConfig, TemplateRegistry, TestGenerator, check,
};
use cliforge_core::safety::{ForbiddenConstruct, MarkerSpec};
use cliforge_core::*;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn metadata() -> GenerationMetadata {
    GenerationMetadata::new("0.1.0", "2024-01-15T10:30:00Z")
}

fn registry() -> Arc<TemplateRegistry> {
    Arc::new(TemplateRegistry::builtin().unwrap())
}

fn greet() -> Specification {
    Specification::new("greet", "Print greetings").with_command(
        CommandSpec::new("hello", "Say hello")
            .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
    )
}

fn img_convert() -> Specification {
    Specification::new("img-convert", "Convert images between formats").with_command(
        CommandSpec::new("resize", "Resize an image")
            .with_arg(ArgumentSpec::required("input", ValueKind::Path).with_help("Source image"))
            .with_option(
                OptionSpec::new("output", ValueKind::Path)
                    .with_short('o')
                    .with_help("Destination file"),
            )
            .with_example("img-convert resize photo.png -o small.png"),
    )
}

/// Exercises every value kind, defaults, choices, keyword names, extra
/// dependencies and a destructive command.
fn media_kit() -> Specification {
    Specification::new("media-kit", "Manage a local media library")
        .with_dependency("serde@1.0")
        .with_dependency("anyhow")
        .with_global_option(OptionSpec::flag("dry-run").with_short('n').with_help("Plan only"))
        .with_global_option(
            OptionSpec::choice("format", &["text", "json"])
                .with_default(DefaultValue::Text("text".into()))
                .with_help("Output format"),
        )
        .with_global_option(OptionSpec::flag("yes").with_help("Assume yes"))
        .with_command(
            CommandSpec::new("import", "Import files into the library")
                .with_arg(ArgumentSpec::required("input", ValueKind::Path).with_help("File to import"))
                .with_arg(ArgumentSpec::optional("album", ValueKind::Text).with_help("Target album"))
                .with_option(
                    OptionSpec::new("limit", ValueKind::Integer)
                        .with_default(DefaultValue::Integer(10))
                        .with_help("Maximum files"),
                )
                .with_option(OptionSpec::new("ratio", ValueKind::Float).with_help("Scale ratio"))
                .with_option(
                    OptionSpec::choice("quality", &["low", "high"])
                        .required()
                        .with_help("Quality preset"),
                )
                .with_option(
                    OptionSpec::new("tag", ValueKind::Text)
                        .with_short('t')
                        .with_help("Tag to apply"),
                )
                .with_example("media-kit import a.jpg --quality=high"),
        )
        .with_command(
            CommandSpec::new("type", "Show the media type")
                .with_arg(ArgumentSpec::required("match", ValueKind::Text).with_help("File to inspect")),
        )
        .with_command(CommandSpec::new("purge", "Purge cached thumbnails"))
        .with_command(CommandSpec::new("list_albums", "List albums"))
}

fn complete(spec: &Specification) -> ArtifactSet {
    let pipeline = Pipeline::new(&GeneratorConfig::default()).unwrap();
    let report = pipeline.run(spec, &metadata());
    assert!(report.is_complete(), "{:#?}", report.issues);
    report.artifacts.unwrap()
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn test_generation_is_deterministic() {
    let first = complete(&media_kit());
    let second = complete(&media_kit());
    assert_eq!(first, second);
    assert_eq!(first.digest(), second.digest());
}

#[test]
fn test_metadata_only_changes_entry_point() {
    let generator = CodeGenerator::new(registry(), Validator::default());
    let spec = img_convert();
    let before = generator.generate(&spec, &metadata()).unwrap();
    let after = generator
        .generate(&spec, &GenerationMetadata::new("0.1.0", "2025-06-01T00:00:00Z"))
        .unwrap();

    let changed: Vec<&str> = before
        .iter()
        .filter(|(path, content)| after.get(path.as_str()) != Some(content.as_str()))
        .map(|(path, _)| path.as_str())
        .collect();
    assert_eq!(changed, vec!["src/main.rs"]);
}

#[test]
fn test_thread_count_does_not_change_output() {
    let mut config = GeneratorConfig::default();
    config.generation.jobs = Some(3);
    let pipeline = Pipeline::new(&config).unwrap();
    let threaded = pipeline.run(&media_kit(), &metadata()).artifacts.unwrap();
    assert_eq!(threaded.digest(), complete(&media_kit()).digest());
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_greet_scenario() {
    let code = CodeGenerator::new(registry(), Validator::default())
        .generate(&greet(), &metadata())
        .unwrap();
    assert!(code.contains("src/main.rs"));
    assert!(code.contains("src/commands/hello.rs"));

    let tests = TestGenerator::new(registry(), Validator::default())
        .generate_tests(&greet())
        .unwrap();
    let hello = tests.get("tests/cmd_hello.rs").unwrap();
    assert!(hello.contains(
        "fn missing_arg_who_exits_one() {\n    cli()\n        .args([\"hello\"])\n        .assert()\n        .code(1);\n}"
    ));
    assert!(hello.contains(
        "fn accepts_required_inputs() {\n    cli()\n        .args([\"hello\", \"sample\"])\n        .assert()\n        .success();\n}"
    ));
}

#[test]
fn test_short_and_long_flags_rendered() {
    let artifacts = complete(&img_convert());
    let resize = artifacts.get("src/commands/resize.rs").unwrap();
    assert!(resize.contains(r#"#[arg(long = "output", short = 'o', value_name = "OUTPUT", help = "Destination file")]"#), "{resize}");

    let readme = artifacts.get("README.md").unwrap();
    assert!(readme.contains("img-convert resize photo.png -o small.png"));

    let main = artifacts.get("src/main.rs").unwrap();
    assert!(main.contains(r#"after_help = "Examples:\n  img-convert resize photo.png -o small.png""#));
}

#[test]
fn test_full_feature_spec_is_well_formed() {
    let artifacts = complete(&media_kit());
    assert!(check(&artifacts).is_empty());

    let manifest = artifacts.get("Cargo.toml").unwrap();
    assert!(manifest.contains("rust-version = \"1.74\""));
    assert!(manifest.contains("anyhow = \"*\""));
    assert!(manifest.contains("serde = \"1.0\""));

    assert!(artifacts.contains("src/commands/type_.rs"));
    assert!(artifacts.contains("tests/cmd_type_.rs"));
    let purge = artifacts.get("src/commands/purge.rs").unwrap();
    assert!(purge.contains(r#"require_confirmation(globals.yes, "--yes")"#), "{purge}");
    let purge_tests = artifacts.get("tests/cmd_purge.rs").unwrap();
    assert!(purge_tests.contains("fn refuses_without_confirmation()"));
}

#[test]
fn test_specification_from_json() {
    let raw = r#"{
        "name": "notes",
        "description": "Keep short notes",
        "commands": [
            {
                "name": "add",
                "description": "Add a note",
                "arguments": [{"name": "text", "type": "str", "help": "Note text"}],
                "options": [
                    {"name": "priority", "short": "p", "type": "int", "default": 1, "help": "Priority"},
                    {"name": "pin", "type": "bool", "help": "Pin the note"}
                ],
                "examples": ["notes add 'buy milk' -p 2"]
            }
        ],
        "dependencies": ["chrono@0.4"]
    }"#;
    let spec = Specification::from_json(raw).unwrap();
    assert!(validate_spec(&spec).is_empty());

    let artifacts = complete(&spec);
    let add = artifacts.get("src/commands/add.rs").unwrap();
    assert!(add.contains("pub priority: i64,"));
    assert!(add.contains("pub pin: bool,"));
}

// ---------------------------------------------------------------------------
// Safety
// ---------------------------------------------------------------------------

#[test]
fn test_forbidden_constructs_cannot_be_waived() {
    let cases = [
        ("Evaluate arbitrary code", IssueCode::DynamicEvaluation),
        ("Restart the daemon with sudo", IssueCode::PrivilegeEscalation),
        ("Log in with token=abcd1234efgh", IssueCode::EmbeddedCredential),
        ("Delete every cached file", IssueCode::UnconfirmedDestructive),
    ];
    let mut config = GeneratorConfig::default();
    config.waive = vec![IssueCode::EmptyDescription, IssueCode::EmptyHelp];
    let pipeline = Pipeline::new(&config).unwrap();

    for (description, code) in cases {
        let spec = greet().with_command(CommandSpec::new("danger", description));
        let report = pipeline.run(&spec, &metadata());
        assert_eq!(report.final_state, PipelineState::Rejected, "{description}");
        assert!(report.issues.iter().any(|i| i.code == code), "{description}");
        assert!(report.artifacts.is_none());

        let refused = CodeGenerator::new(registry(), Validator::default()).generate(&spec, &metadata());
        assert!(refused.is_err(), "{description}");
    }
}

#[test]
fn test_configured_markers_extend_deny_list() {
    let spec = greet().with_command(CommandSpec::new("launch", "Run the launch script"));
    assert!(complete(&spec).contains("src/commands/launch.rs"));

    let config = GeneratorConfig {
        safety: SafetyConfig {
            extra_markers: vec![MarkerSpec {
                construct: ForbiddenConstruct::DynamicEvaluation,
                words: Some(vec!["launch".into(), "script".into()]),
                pattern: None,
            }],
        },
        ..GeneratorConfig::default()
    };
    let report = Pipeline::new(&config).unwrap().run(&spec, &metadata());
    assert_eq!(report.final_state, PipelineState::Rejected);
    assert_eq!(report.issues[0].code, IssueCode::DynamicEvaluation);
    assert_eq!(report.issues[0].location, "commands[1].description");
}

#[test]
fn test_specs_the_toolchain_would_misrender_are_rejected() {
    let mut old_toolchain = img_convert();
    old_toolchain.runtime_version = "1.50".into();

    let mut empty_path = img_convert();
    empty_path.commands[0].options[0].default = Some(DefaultValue::Text(String::new()));

    let mut padded_example = img_convert();
    padded_example.commands[0].examples = vec!["  img-convert resize photo.png  ".into()];

    let mut line_break = img_convert();
    line_break.commands[0].options[0].help = "Mode {n} here".into();

    let pipeline = Pipeline::new(&GeneratorConfig::default()).unwrap();
    for (spec, code, location) in [
        (old_toolchain, IssueCode::InvalidRuntimeVersion, "runtime_version"),
        (empty_path, IssueCode::DefaultKindMismatch, "commands[0].options[0].default"),
        (padded_example, IssueCode::UnrenderableText, "commands[0].examples[0]"),
        (line_break, IssueCode::UnrenderableText, "commands[0].options[0].help"),
    ] {
        let report = pipeline.run(&spec, &metadata());
        assert_eq!(report.final_state, PipelineState::Rejected, "{location}");
        assert_eq!(report.transitions.len(), 2, "{location}");
        assert_eq!(report.issues.len(), 1, "{:#?}", report.issues);
        assert_eq!(report.issues[0].code, code);
        assert_eq!(report.issues[0].location, location);
    }
}

// ---------------------------------------------------------------------------
// Output check
// ---------------------------------------------------------------------------

#[test]
fn test_check_detects_damaged_output() {
    let artifacts = complete(&img_convert());

    let without_util: ArtifactSet = artifacts
        .iter()
        .filter(|(path, _)| path.as_str() != "src/util.rs")
        .map(|(path, content)| (path.clone(), content.clone()))
        .collect();
    let issues = check(&without_util);
    assert_eq!(issues[0].code, IssueCode::UnresolvedModule);
    assert_eq!(issues[0].location, "src/main.rs");
    assert!(issues.iter().all(|i| i.kind == IssueKind::OutputWellFormedness));

    let mut damaged = artifacts.clone();
    damaged.insert("src/commands/resize.rs", "pub fn run( {");
    damaged.insert("src/helpers.rs", "pub fn help() {}\n");
    let codes: Vec<IssueCode> = check(&damaged).iter().map(|i| i.code).collect();
    assert_eq!(codes, vec![IssueCode::SyntaxError, IssueCode::OrphanModule]);
}

// ---------------------------------------------------------------------------
// Internal faults
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Collected(Vec<ArtifactSet>);

impl ArtifactSink for Collected {
    fn persist(&mut self, artifacts: &ArtifactSet) -> cliforge_codegen::Result<()> {
        self.0.push(artifacts.clone());
        Ok(())
    }
}

#[test]
fn test_broken_template_is_an_internal_rejection() {
    let mut registry = TemplateRegistry::builtin().unwrap();
    registry
        .override_template("command.rs.tera", "{{ command.no_such_field }}")
        .unwrap();
    let pipeline =
        Pipeline::with_registry(&GeneratorConfig::default(), Arc::new(registry)).unwrap();

    let mut sink = Collected::default();
    let report = pipeline
        .run_and_persist(&img_convert(), &metadata(), &mut sink)
        .unwrap();

    assert_eq!(report.final_state, PipelineState::Rejected);
    assert!(report.has_internal_issues());
    assert!(report.artifacts.is_none());
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].kind, IssueKind::GenerationInternal);
    assert_eq!(report.issues[0].code, IssueCode::TemplateRender);
    assert_eq!(report.issues[0].location, "src/commands/resize.rs");
    assert!(sink.0.is_empty());
}

#[test]
fn test_generated_program_maps_internal_faults_to_exit_2() {
    let artifacts = complete(&img_convert());

    let util = artifacts.get("src/util.rs").unwrap();
    for needle in [
        "pub const EXIT_INTERNAL: u8 = 2;",
        "Self::Internal(_) => EXIT_INTERNAL,",
        "CliError::Internal(_) => self.error(\"internal error (run with --verbose for details)\"),",
        "fn internal_errors_exit_with_code_2()",
    ] {
        assert!(util.contains(needle), "missing `{needle}` in:\n{util}");
    }

    let main = artifacts.get("src/main.rs").unwrap();
    for needle in [
        "if !output.is_verbose() {\n        panic::set_hook(Box::new(|_| {}));",
        "panic::catch_unwind(AssertUnwindSafe(|| dispatch(&cli, &output)))",
        "Ok(Err(err)) => {\n            output.report(&err);\n            ExitCode::from(err.exit_code())",
        "output.report(&CliError::internal(\"command panicked\"));\n            ExitCode::from(util::EXIT_INTERNAL)",
    ] {
        assert!(main.contains(needle), "missing `{needle}` in:\n{main}");
    }
}
