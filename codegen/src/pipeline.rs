//! Pipeline orchestration: validate → generate code → generate tests →
//! check output.
//!
//! A run never retries and never hands partial output onward. Specification
//! problems come back as issue data in a [`PipelineReport`]; rendering
//! failures and malformed output end the run in [`PipelineState::Rejected`]
//! with internal issues naming the artifact and the failing step.

use std::sync::Arc;

use cliforge_core::{ArtifactSet, Issue, IssueCode, Specification, Validator};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::check::check;
use crate::config::GeneratorConfig;
use crate::error::Result;
use crate::generator::{CodeGenerator, GenerationMetadata, RenderPool};
use crate::registry::TemplateRegistry;
use crate::testgen::TestGenerator;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Received,
    SpecValidated,
    CodeGenerated,
    TestsGenerated,
    OutputValidated,
    Complete,
    Rejected,
}

impl PipelineState {
    /// Returns `true` if the pipeline may move from `self` to `next`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cliforge_codegen::PipelineState;
    ///
    /// assert!(PipelineState::Received.can_transition_to(PipelineState::SpecValidated));
    /// assert!(PipelineState::TestsGenerated.can_transition_to(PipelineState::Rejected));
    /// assert!(!PipelineState::OutputValidated.can_transition_to(PipelineState::Rejected));
    /// assert!(!PipelineState::Received.can_transition_to(PipelineState::Complete));
    /// ```
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Received, SpecValidated)
                | (SpecValidated, CodeGenerated)
                | (CodeGenerated, TestsGenerated)
                | (TestsGenerated, OutputValidated)
                | (OutputValidated, Complete)
                | (Received | SpecValidated | CodeGenerated | TestsGenerated, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Rejected)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Received => write!(f, "received"),
            Self::SpecValidated => write!(f, "spec_validated"),
            Self::CodeGenerated => write!(f, "code_generated"),
            Self::TestsGenerated => write!(f, "tests_generated"),
            Self::OutputValidated => write!(f, "output_validated"),
            Self::Complete => write!(f, "complete"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

/// Outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineReport {
    pub final_state: PipelineState,
    /// Every state visited, starting with `Received`.
    pub transitions: Vec<PipelineState>,
    /// Specification issues (including waived ones) followed by any
    /// internal issues.
    pub issues: Vec<Issue>,
    /// Code and test artifacts; present only when the run completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<ArtifactSet>,
}

impl PipelineReport {
    pub fn is_complete(&self) -> bool {
        self.final_state == PipelineState::Complete
    }

    /// Returns `true` if the run was stopped by a generator defect rather
    /// than by its input.
    pub fn has_internal_issues(&self) -> bool {
        self.issues.iter().any(|i| i.kind.is_internal())
    }
}

/// Destination for validated artifacts.
pub trait ArtifactSink {
    fn persist(&mut self, artifacts: &ArtifactSet) -> Result<()>;
}

/// State tracker for a single run.
struct Run<'a> {
    program: &'a str,
    state: PipelineState,
    transitions: Vec<PipelineState>,
    issues: Vec<Issue>,
}

impl<'a> Run<'a> {
    fn new(program: &'a str) -> Self {
        info!(program, state = %PipelineState::Received, "pipeline started");
        Self {
            program,
            state: PipelineState::Received,
            transitions: vec![PipelineState::Received],
            issues: Vec::new(),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        info!(program = self.program, from = %self.state, to = %next, "pipeline transition");
        self.state = next;
        self.transitions.push(next);
    }

    fn reject(mut self, issues: Vec<Issue>) -> PipelineReport {
        warn!(
            program = self.program,
            from = %self.state,
            issues = issues.len(),
            "pipeline rejected"
        );
        self.issues.extend(issues);
        self.advance(PipelineState::Rejected);
        self.finish(None)
    }

    fn finish(self, artifacts: Option<ArtifactSet>) -> PipelineReport {
        PipelineReport {
            final_state: self.state,
            transitions: self.transitions,
            issues: self.issues,
            artifacts,
        }
    }
}

/// Runs specifications through validation, generation and output checks.
///
/// # Examples
///
/// ```
/// use cliforge_codegen::{GenerationMetadata, GeneratorConfig, Pipeline, PipelineState};
/// use cliforge_core::*;
///
/// let pipeline = Pipeline::new(&GeneratorConfig::default()).unwrap();
/// let spec = Specification::new("greet", "Print greetings").with_command(
///     CommandSpec::new("hello", "Say hello")
///         .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
/// );
///
/// let report = pipeline.run(&spec, &GenerationMetadata::new("0.1.0", "2024-01-15T10:30:00Z"));
/// assert_eq!(report.final_state, PipelineState::Complete);
/// assert!(report.artifacts.unwrap().contains("tests/cmd_hello.rs"));
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    validator: Validator,
    code: CodeGenerator,
    tests: TestGenerator,
    waived: Vec<IssueCode>,
}

impl Pipeline {
    /// Builds a pipeline with the built-in template set.
    ///
    /// # Errors
    ///
    /// Fails if `config` is invalid or the templates do not compile.
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let registry = Arc::new(TemplateRegistry::builtin()?);
        Self::with_registry(config, registry)
    }

    /// Builds a pipeline around an existing registry.
    pub fn with_registry(config: &GeneratorConfig, registry: Arc<TemplateRegistry>) -> Result<Self> {
        config.check()?;
        let validator = Validator::new(config.deny_list()?);
        let pool = RenderPool::new(config.generation.jobs)?;
        Ok(Self {
            code: CodeGenerator::new(Arc::clone(&registry), validator.clone())
                .with_pool(pool.clone()),
            tests: TestGenerator::new(registry, validator.clone()).with_pool(pool),
            validator,
            waived: config.effective_waivers(),
        })
    }

    /// Runs `spec` to completion or rejection.
    pub fn run(&self, spec: &Specification, metadata: &GenerationMetadata) -> PipelineReport {
        match self.run_to_validated(spec, metadata) {
            Ok((mut run, artifacts)) => {
                run.advance(PipelineState::Complete);
                run.finish(Some(artifacts))
            }
            Err(report) => report,
        }
    }

    /// Runs `spec` and hands the artifacts to `sink` once they have passed
    /// the output check. Nothing reaches `sink` from a rejected run.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if persisting fails.
    pub fn run_and_persist(
        &self,
        spec: &Specification,
        metadata: &GenerationMetadata,
        sink: &mut dyn ArtifactSink,
    ) -> Result<PipelineReport> {
        match self.run_to_validated(spec, metadata) {
            Ok((mut run, artifacts)) => {
                sink.persist(&artifacts)?;
                run.advance(PipelineState::Complete);
                Ok(run.finish(Some(artifacts)))
            }
            Err(report) => Ok(report),
        }
    }

    fn run_to_validated<'a>(
        &self,
        spec: &'a Specification,
        metadata: &GenerationMetadata,
    ) -> std::result::Result<(Run<'a>, ArtifactSet), PipelineReport> {
        let mut run = Run::new(&spec.name);

        let spec_issues = self.validator.validate(spec);
        if spec_issues.iter().any(|i| i.is_blocking(&self.waived)) {
            return Err(run.reject(spec_issues));
        }
        run.issues = spec_issues;
        run.advance(PipelineState::SpecValidated);

        let mut artifacts = match self.code.generate(spec, metadata) {
            Ok(artifacts) => artifacts,
            Err(err) => return Err(run.reject(err.into_issues())),
        };
        run.advance(PipelineState::CodeGenerated);

        let code_issues = check(&artifacts);
        if !code_issues.is_empty() {
            return Err(run.reject(code_issues));
        }
        let tests = match self.tests.generate_tests(spec) {
            Ok(tests) => tests,
            Err(err) => return Err(run.reject(err.into_issues())),
        };
        artifacts.extend(tests);
        run.advance(PipelineState::TestsGenerated);

        let output_issues = check(&artifacts);
        if !output_issues.is_empty() {
            return Err(run.reject(output_issues));
        }
        run.advance(PipelineState::OutputValidated);

        Ok((run, artifacts))
    }
}

#[cfg(test)]
mod tests {
    use cliforge_core::*;

    use super::*;
    use crate::registry;

    fn metadata() -> GenerationMetadata {
        GenerationMetadata::new("0.1.0", "2024-01-15T10:30:00Z")
    }

    fn greet() -> Specification {
        Specification::new("greet", "Print greetings").with_command(
            CommandSpec::new("hello", "Say hello")
                .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
        )
    }

    fn pipeline_with_override(template: &str, source: &str) -> Pipeline {
        let mut registry = TemplateRegistry::builtin().unwrap();
        registry.override_template(template, source).unwrap();
        Pipeline::with_registry(&GeneratorConfig::default(), Arc::new(registry)).unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        persisted: Vec<ArtifactSet>,
    }

    impl ArtifactSink for Recorder {
        fn persist(&mut self, artifacts: &ArtifactSet) -> Result<()> {
            self.persisted.push(artifacts.clone());
            Ok(())
        }
    }

    #[test]
    fn test_state_display_matches_serde() {
        for state in [
            PipelineState::Received,
            PipelineState::SpecValidated,
            PipelineState::CodeGenerated,
            PipelineState::TestsGenerated,
            PipelineState::OutputValidated,
            PipelineState::Complete,
            PipelineState::Rejected,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{state}\""));
        }
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        assert!(PipelineState::Complete.is_terminal());
        assert!(PipelineState::Rejected.is_terminal());
        assert!(!PipelineState::Complete.can_transition_to(PipelineState::Rejected));
        assert!(!PipelineState::Rejected.can_transition_to(PipelineState::Received));
    }

    #[test]
    fn test_complete_run() {
        let pipeline = Pipeline::new(&GeneratorConfig::default()).unwrap();
        let report = pipeline.run(&greet(), &metadata());
        assert!(report.is_complete(), "{:?}", report.issues);
        assert_eq!(
            report.transitions,
            vec![
                PipelineState::Received,
                PipelineState::SpecValidated,
                PipelineState::CodeGenerated,
                PipelineState::TestsGenerated,
                PipelineState::OutputValidated,
                PipelineState::Complete,
            ]
        );
        let artifacts = report.artifacts.unwrap();
        assert!(artifacts.contains("src/commands/hello.rs"));
        assert!(artifacts.contains("tests/cli.rs"));
    }

    #[test]
    fn test_unsafe_spec_is_rejected_at_received() {
        let mut config = GeneratorConfig::default();
        config.waive = vec![IssueCode::EmptyHelp];
        let pipeline = Pipeline::new(&config).unwrap();
        let spec = greet().with_command(CommandSpec::new("shell", "Evaluate arbitrary code"));

        let mut sink = Recorder::default();
        let report = pipeline.run_and_persist(&spec, &metadata(), &mut sink).unwrap();
        assert_eq!(report.final_state, PipelineState::Rejected);
        assert_eq!(
            report.transitions,
            vec![PipelineState::Received, PipelineState::Rejected]
        );
        assert_eq!(report.issues[0].code, IssueCode::DynamicEvaluation);
        assert!(report.artifacts.is_none());
        assert!(sink.persisted.is_empty());
    }

    #[test]
    fn test_waivers_control_cosmetic_issues() {
        let mut spec = greet();
        spec.commands[0].arguments[0].help.clear();

        let strict = Pipeline::new(&GeneratorConfig::default()).unwrap();
        assert_eq!(strict.run(&spec, &metadata()).final_state, PipelineState::Rejected);

        let mut config = GeneratorConfig::default();
        config.waive = vec![IssueCode::EmptyHelp];
        let lenient = Pipeline::new(&config).unwrap();
        let report = lenient.run(&spec, &metadata());
        assert!(report.is_complete());
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].code, IssueCode::EmptyHelp);
    }

    #[test]
    fn test_render_failure_is_internal_rejection() {
        let pipeline = pipeline_with_override(registry::UTIL_RS, "{{ program.no_such_field }}");
        let report = pipeline.run(&greet(), &metadata());
        assert_eq!(report.final_state, PipelineState::Rejected);
        assert_eq!(
            report.transitions.last(),
            Some(&PipelineState::Rejected)
        );
        assert_eq!(report.transitions[1], PipelineState::SpecValidated);
        assert!(report.has_internal_issues());
        assert_eq!(report.issues[0].code, IssueCode::TemplateRender);
        assert_eq!(report.issues[0].location, "src/util.rs");
    }

    #[test]
    fn test_malformed_code_is_rejected_before_tests() {
        let pipeline = pipeline_with_override(registry::UTIL_RS, "pub fn broken( {}\n");
        let report = pipeline.run(&greet(), &metadata());
        assert_eq!(report.final_state, PipelineState::Rejected);
        assert_eq!(
            report.transitions,
            vec![
                PipelineState::Received,
                PipelineState::SpecValidated,
                PipelineState::CodeGenerated,
                PipelineState::Rejected,
            ]
        );
        assert!(report.issues.iter().any(|i| i.code == IssueCode::SyntaxError));
    }

    #[test]
    fn test_malformed_tests_are_rejected() {
        let pipeline =
            pipeline_with_override(registry::TESTS_CLI_RS, "use no_such_crate::Thing;\n");
        let mut sink = Recorder::default();
        let report = pipeline.run_and_persist(&greet(), &metadata(), &mut sink).unwrap();
        assert_eq!(report.final_state, PipelineState::Rejected);
        assert_eq!(report.transitions[3], PipelineState::TestsGenerated);
        assert_eq!(report.issues[0].code, IssueCode::UnresolvedImport);
        assert_eq!(report.issues[0].location, "tests/cli.rs");
        assert!(sink.persisted.is_empty());
    }

    #[test]
    fn test_persist_receives_validated_set() {
        let pipeline = Pipeline::new(&GeneratorConfig::default()).unwrap();
        let mut sink = Recorder::default();
        let report = pipeline.run_and_persist(&greet(), &metadata(), &mut sink).unwrap();
        assert!(report.is_complete());
        assert_eq!(sink.persisted.len(), 1);
        assert_eq!(Some(&sink.persisted[0]), report.artifacts.as_ref());
    }

    #[test]
    fn test_generators_share_one_pool() {
        let mut config = GeneratorConfig::default();
        config.generation.jobs = Some(2);
        let pipeline = Pipeline::new(&config).unwrap();
        assert!(pipeline.code.pool.shares(&pipeline.tests.pool));
        assert_eq!(pipeline.tests.pool.threads(), Some(2));

        let first = pipeline.run(&greet(), &metadata());
        let second = pipeline.run(&greet(), &metadata());
        assert_eq!(first.artifacts, second.artifacts);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = GeneratorConfig::default();
        config.waive = vec![IssueCode::PrivilegeEscalation];
        assert!(Pipeline::new(&config).is_err());
    }
}
