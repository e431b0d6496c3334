mod persist;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use cliforge_codegen::{
    GenerationMetadata, GeneratorConfig, Pipeline, PipelineReport, PipelineState, check,
};
use cliforge_core::{Issue, Specification, Validator};
use serde::Serialize;
use tracing::{debug, info};

use crate::persist::{DirectorySink, read_tree};

const EXIT_REJECTED: i32 = 1;
const EXIT_INTERNAL: i32 = 2;

/// Output format for issue listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum CliOutputFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "cliforge", version)]
#[command(about = "Generate tested clap command-line programs from specifications")]
struct Cli {
    /// Log generator progress (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate one or more specification files (.json, .yaml, .yml).
    Validate(ValidateArgs),
    /// Generate a project and its tests from a specification.
    Build(BuildArgs),
    /// Check a generated project directory for well-formedness.
    Check(CheckArgs),
    /// Write a default generator configuration file.
    InitConfig(InitConfigArgs),
}

#[derive(Debug, Args)]
struct ValidateArgs {
    /// Specification files.
    #[arg(required = true)]
    specs: Vec<PathBuf>,
    /// Generator configuration (YAML) providing waivers and extra markers.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct BuildArgs {
    /// Specification file.
    spec: PathBuf,
    /// Output directory for the generated project.
    #[arg(long, short)]
    output: PathBuf,
    /// Generator configuration (YAML).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Timestamp embedded in the entry point (default: now, RFC 3339).
    #[arg(long)]
    generated_at: Option<String>,
    /// Run the pipeline and list artifacts without writing them.
    #[arg(long)]
    dry_run: bool,
    /// Overwrite existing files in the output directory.
    #[arg(long)]
    force: bool,
}

#[derive(Debug, Args)]
struct CheckArgs {
    /// Project directory.
    dir: PathBuf,
    /// Output format.
    #[arg(long, default_value = "text")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct InitConfigArgs {
    /// Destination path.
    #[arg(long, default_value = "cliforge.yaml")]
    output: PathBuf,
}

/// Why a subcommand failed, mapped to the process exit code.
#[derive(Debug, thiserror::Error)]
enum Failure {
    /// Input was rejected or could not be read.
    #[error("{0}")]
    Rejected(String),
    /// The generator produced something it should not have.
    #[error("{0}")]
    Internal(String),
}

impl Failure {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Rejected(_) => EXIT_REJECTED,
            Self::Internal(_) => EXIT_INTERNAL,
        }
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Self::Rejected(message)
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Validate(args) => run_validate(args),
        Command::Build(args) => run_build(args),
        Command::Check(args) => run_check(args),
        Command::InitConfig(args) => run_init_config(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

/// Loads a specification, choosing the format from the file extension.
fn load_spec(path: &Path) -> Result<Specification, String> {
    let raw = fs::read_to_string(path)
        .map_err(|err| format!("Failed to read '{}': {err}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let parsed = match extension {
        "json" => Specification::from_json(&raw).map_err(|err| err.to_string()),
        "yaml" | "yml" => serde_yaml::from_str(&raw).map_err(|err| err.to_string()),
        other => Err(format!(
            "unsupported specification format '.{other}' (expected .json, .yaml or .yml)"
        )),
    };
    parsed.map_err(|err| format!("Failed to parse '{}': {err}", path.display()))
}

fn load_config(path: Option<&Path>) -> Result<GeneratorConfig, String> {
    match path {
        Some(path) => GeneratorConfig::load(path)
            .map_err(|err| format!("Failed to load config '{}': {err}", path.display())),
        None => Ok(GeneratorConfig::default()),
    }
}

fn print_issues(source: &str, issues: &[Issue]) {
    for issue in issues {
        println!("{source}: {issue}");
    }
}

#[derive(Serialize)]
struct SpecIssues<'a> {
    spec: String,
    blocking: bool,
    issues: &'a [Issue],
}

fn run_validate(args: ValidateArgs) -> Result<(), Failure> {
    let config = load_config(args.config.as_deref())?;
    let deny_list = config.deny_list().map_err(|err| err.to_string())?;
    let validator = Validator::new(deny_list);
    let waived = config.effective_waivers();

    let mut rejected = 0usize;
    let mut results = Vec::new();
    for path in &args.specs {
        let spec = load_spec(path)?;
        let issues = validator.validate(&spec);
        let blocking = issues.iter().any(|i| i.is_blocking(&waived));
        if blocking {
            rejected += 1;
        }
        debug!(spec = %path.display(), issues = issues.len(), blocking, "validated");
        results.push((path.display().to_string(), issues, blocking));
    }

    match args.format {
        CliOutputFormat::Text => {
            for (source, issues, _) in &results {
                print_issues(source, issues);
            }
            println!(
                "Validated {} specification(s); {rejected} rejected.",
                results.len()
            );
        }
        CliOutputFormat::Json => {
            let listing: Vec<SpecIssues> = results
                .iter()
                .map(|(spec, issues, blocking)| SpecIssues {
                    spec: spec.clone(),
                    blocking: *blocking,
                    issues,
                })
                .collect();
            let raw = serde_json::to_string_pretty(&listing)
                .map_err(|err| format!("Failed to serialize issues: {err}"))?;
            println!("{raw}");
        }
    }

    if rejected > 0 {
        return Err(Failure::Rejected(format!(
            "{rejected} specification(s) have blocking issues"
        )));
    }
    Ok(())
}

fn run_build(args: BuildArgs) -> Result<(), Failure> {
    let config = load_config(args.config.as_deref())?;
    let spec = load_spec(&args.spec)?;
    let pipeline = Pipeline::new(&config).map_err(|err| err.to_string())?;
    let generated_at = args
        .generated_at
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
    let metadata = GenerationMetadata::current(generated_at);

    let report = if args.dry_run {
        pipeline.run(&spec, &metadata)
    } else {
        let mut sink = DirectorySink::new(&args.output, args.force);
        pipeline
            .run_and_persist(&spec, &metadata, &mut sink)
            .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?
    };

    let source = args.spec.display().to_string();
    print_issues(&source, &report.issues);
    finish_build(&spec.name, &args.output, args.dry_run, &report)
}

fn finish_build(
    program: &str,
    output: &Path,
    dry_run: bool,
    report: &PipelineReport,
) -> Result<(), Failure> {
    let Some(artifacts) = report.artifacts.as_ref().filter(|_| report.is_complete()) else {
        let from = report
            .transitions
            .iter()
            .rev()
            .find(|s| **s != PipelineState::Rejected)
            .copied()
            .unwrap_or(PipelineState::Received);
        let message = format!("Rejected `{program}` after {from} ({} issue(s))", report.issues.len());
        return Err(if report.has_internal_issues() {
            Failure::Internal(message)
        } else {
            Failure::Rejected(message)
        });
    };

    if dry_run {
        for path in artifacts.paths() {
            println!("{path}");
        }
    }
    info!(program, digest = %artifacts.digest(), "build complete");
    println!(
        "{} {} artifact(s) for `{program}` {} '{}' (digest {}).",
        if dry_run { "Planned" } else { "Generated" },
        artifacts.len(),
        if dry_run { "for" } else { "into" },
        output.display(),
        artifacts.digest()
    );
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<(), Failure> {
    let artifacts = read_tree(&args.dir)
        .map_err(|err| format!("Failed to read '{}': {err}", args.dir.display()))?;
    let issues = check(&artifacts);

    match args.format {
        CliOutputFormat::Text => {
            print_issues(&args.dir.display().to_string(), &issues);
            println!("Checked {} file(s); {} issue(s).", artifacts.len(), issues.len());
        }
        CliOutputFormat::Json => {
            let raw = serde_json::to_string_pretty(&issues)
                .map_err(|err| format!("Failed to serialize issues: {err}"))?;
            println!("{raw}");
        }
    }

    if !issues.is_empty() {
        return Err(Failure::Rejected(format!(
            "'{}' is not a well-formed project",
            args.dir.display()
        )));
    }
    Ok(())
}

fn run_init_config(args: InitConfigArgs) -> Result<(), Failure> {
    if args.output.exists() {
        return Err(Failure::Rejected(format!(
            "'{}' already exists",
            args.output.display()
        )));
    }
    GeneratorConfig::default()
        .save(&args.output)
        .map_err(|err| format!("Failed to write '{}': {err}", args.output.display()))?;
    println!("Wrote default configuration to '{}'.", args.output.display());
    Ok(())
}
