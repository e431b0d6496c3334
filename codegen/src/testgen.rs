//! Test generation: specification → integration tests for the generated
//! program.
//!
//! Expected substrings and exit codes are computed from the specification
//! through [`help`](crate::help), the same functions the code generator
//! renders help text with.

use std::sync::Arc;

use cliforge_core::{ArtifactSet, Specification, Validator};
use serde::Serialize;
use tracing::debug;

use crate::error::GenerateError;
use crate::generator::{RenderPool, ensure_generatable};
use crate::registry::{self, TemplateRegistry};
use crate::view::{CommandTestView, ProgramTestView, rust_str};

/// Renders `assert_cmd` tests for a validated specification.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use cliforge_codegen::{TemplateRegistry, TestGenerator};
/// use cliforge_core::*;
///
/// let spec = Specification::new("greet", "Print greetings").with_command(
///     CommandSpec::new("hello", "Say hello")
///         .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
/// );
///
/// let registry = Arc::new(TemplateRegistry::builtin().unwrap());
/// let tests = TestGenerator::new(registry, Validator::default())
///     .generate_tests(&spec)
///     .unwrap();
/// assert_eq!(
///     tests.paths().collect::<Vec<_>>(),
///     vec!["tests/cli.rs", "tests/cmd_hello.rs"]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct TestGenerator {
    registry: Arc<TemplateRegistry>,
    validator: Validator,
    pub(crate) pool: RenderPool,
}

#[derive(Serialize)]
struct Binary<'a> {
    name: &'a str,
    bin_env_lit: String,
}

#[derive(Serialize)]
struct ProgramTestContext<'a> {
    program: &'a Binary<'a>,
    tests: &'a ProgramTestView,
}

#[derive(Serialize)]
struct CommandTestContext<'a> {
    program: &'a Binary<'a>,
    command: &'a CommandTestView,
}

impl TestGenerator {
    pub fn new(registry: Arc<TemplateRegistry>, validator: Validator) -> Self {
        Self {
            registry,
            validator,
            pool: RenderPool::default(),
        }
    }

    pub fn with_pool(mut self, pool: RenderPool) -> Self {
        self.pool = pool;
        self
    }

    /// Renders `tests/cli.rs` and one `tests/cmd_<module>.rs` per command, in
    /// declared order.
    ///
    /// For every command the tests assert that `--help` exits 0 and prints
    /// the description, examples and option help; that the minimal valid
    /// invocation exits 0; that omitting each required input exits 1; that
    /// an out-of-set value for each choice option exits 1; and, for
    /// destructive commands, that omitting the confirmation flag exits 1.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Refused`] if `spec` has non-waivable issues,
    /// or [`GenerateError::Render`] if a template fails.
    pub fn generate_tests(&self, spec: &Specification) -> Result<ArtifactSet, GenerateError> {
        ensure_generatable(&self.validator, spec)?;

        let view = ProgramTestView::build(spec, self.validator.deny_list());
        let binary = Binary {
            name: &spec.name,
            bin_env_lit: rust_str(&format!("CARGO_BIN_EXE_{}", spec.name)),
        };
        let registry = &self.registry;

        let mut artifacts = ArtifactSet::new();
        let context = ProgramTestContext {
            program: &binary,
            tests: &view,
        };
        artifacts.insert(
            "tests/cli.rs",
            registry.render(registry::TESTS_CLI_RS, &context, "tests/cli.rs")?,
        );

        let modules: Vec<(String, &CommandTestView)> = spec
            .commands
            .iter()
            .map(|c| cliforge_core::naming::symbol_name(&c.name))
            .zip(&view.commands)
            .collect();
        let files = self.pool.render_each(&modules, |(module, command)| {
            let path = format!("tests/cmd_{module}.rs");
            let context = CommandTestContext {
                program: &binary,
                command,
            };
            let content = registry.render(registry::TESTS_COMMAND_RS, &context, &path)?;
            Ok((path, content))
        })?;
        for (path, content) in files {
            artifacts.insert(path, content);
        }

        debug!(
            program = %spec.name,
            artifacts = artifacts.len(),
            "generated tests"
        );
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use cliforge_core::*;

    use super::*;

    fn generator() -> TestGenerator {
        let registry = Arc::new(TemplateRegistry::builtin().unwrap());
        TestGenerator::new(registry, Validator::default())
    }

    #[test]
    fn test_greet_scenario() {
        let spec = Specification::new("greet", "Print greetings").with_command(
            CommandSpec::new("hello", "Say hello")
                .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
        );
        let tests = generator().generate_tests(&spec).unwrap();
        let hello = tests.get("tests/cmd_hello.rs").unwrap();

        assert!(hello.contains(r#"env!("CARGO_BIN_EXE_greet")"#));
        assert!(hello.contains("fn missing_arg_who_exits_one()"));
        assert!(hello.contains(r#".args(["hello"])"#), "{hello}");
        assert!(hello.contains(r#".args(["hello", "sample"])"#));
        assert!(hello.contains(r#"predicate::str::contains("Say hello")"#));
        assert!(hello.contains(r#"predicate::str::contains("Who to greet")"#));
    }

    #[test]
    fn test_choice_and_destructive_cases() {
        let spec = Specification::new("vault", "Manage stored entries")
            .with_global_option(OptionSpec::flag("yes").with_short('y').with_help("Skip prompts"))
            .with_command(
                CommandSpec::new("purge", "Purge one store")
                    .with_option(
                        OptionSpec::choice("mode", &["soft", "hard"])
                            .with_default(DefaultValue::Text("soft".into()))
                            .with_help("Purge mode"),
                    ),
            );
        let tests = generator().generate_tests(&spec).unwrap();
        let purge = tests.get("tests/cmd_purge.rs").unwrap();

        assert!(purge.contains("fn invalid_choice_mode_exits_one()"));
        assert!(purge.contains(r#".args(["purge", "--yes", "--mode=__invalid__"])"#), "{purge}");
        assert!(purge.contains("fn refuses_without_confirmation()"));
        assert!(purge.contains(r#"predicate::str::contains("Skip prompts")"#));

        let cli = tests.get("tests/cli.rs").unwrap();
        assert!(cli.contains(r#".args(["--verbose", "--quiet", "purge", "--yes"])"#), "{cli}");
    }

    #[test]
    fn test_refuses_unsafe_spec() {
        let spec = Specification::new("ops", "Operations")
            .with_command(CommandSpec::new("install", "Install packages with sudo"));
        assert!(matches!(
            generator().generate_tests(&spec),
            Err(GenerateError::Refused(_))
        ));
    }
}
