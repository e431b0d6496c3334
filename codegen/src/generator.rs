//! Code generation: specification → source artifacts.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use cliforge_codegen::{CodeGenerator, GenerationMetadata, TemplateRegistry};
//! use cliforge_core::*;
//!
//! let spec = Specification::new("greet", "Print greetings").with_command(
//!     CommandSpec::new("hello", "Say hello")
//!         .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
//! );
//!
//! let registry = Arc::new(TemplateRegistry::builtin().unwrap());
//! let generator = CodeGenerator::new(registry, Validator::default());
//! let metadata = GenerationMetadata::new("0.1.0", "2024-01-15T10:30:00Z");
//! let artifacts = generator.generate(&spec, &metadata).unwrap();
//!
//! assert!(artifacts.contains("src/main.rs"));
//! assert!(artifacts.contains("src/commands/hello.rs"));
//! ```

use std::sync::Arc;

use cliforge_core::{ArtifactSet, Specification, Validator, has_non_waivable};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use crate::error::GenerateError;
use crate::registry::{self, TemplateRegistry};
use crate::view::{CommandView, ProgramView};

/// Caller-supplied metadata embedded in the entry point.
///
/// The generator never reads a clock; the same metadata always yields the
/// same artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationMetadata {
    pub generator_version: String,
    /// Timestamp text, typically RFC 3339
    pub generated_at: String,
}

impl GenerationMetadata {
    pub fn new(generator_version: impl Into<String>, generated_at: impl Into<String>) -> Self {
        Self {
            generator_version: generator_version.into(),
            generated_at: generated_at.into(),
        }
    }

    /// Metadata naming this crate's version as the generator.
    pub fn current(generated_at: impl Into<String>) -> Self {
        Self::new(env!("CARGO_PKG_VERSION"), generated_at)
    }
}

/// Renders a validated specification into a Rust project.
#[derive(Debug, Clone)]
pub struct CodeGenerator {
    registry: Arc<TemplateRegistry>,
    validator: Validator,
    pub(crate) pool: RenderPool,
}

#[derive(Serialize)]
struct ProgramContext<'a> {
    program: &'a ProgramView,
}

#[derive(Serialize)]
struct CommandContext<'a> {
    program: &'a ProgramView,
    command: &'a CommandView,
}

impl CodeGenerator {
    pub fn new(registry: Arc<TemplateRegistry>, validator: Validator) -> Self {
        Self {
            registry,
            validator,
            pool: RenderPool::default(),
        }
    }

    /// Renders commands on `pool` instead of rayon's global pool.
    pub fn with_pool(mut self, pool: RenderPool) -> Self {
        self.pool = pool;
        self
    }

    /// Renders `spec` into `Cargo.toml`, `README.md`, `src/main.rs`,
    /// `src/commands/mod.rs`, one `src/commands/<module>.rs` per command (in
    /// declared order) and `src/util.rs`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Refused`] if `spec` has non-waivable issues,
    /// or [`GenerateError::Render`] if a template fails.
    pub fn generate(
        &self,
        spec: &Specification,
        metadata: &GenerationMetadata,
    ) -> Result<ArtifactSet, GenerateError> {
        ensure_generatable(&self.validator, spec)?;

        let view = ProgramView::build(spec, metadata, self.validator.deny_list());
        let context = ProgramContext { program: &view };
        let registry = &self.registry;

        let mut artifacts = ArtifactSet::new();
        for (path, template) in [
            ("Cargo.toml", registry::CARGO_TOML),
            ("README.md", registry::README),
            ("src/main.rs", registry::MAIN_RS),
            ("src/commands/mod.rs", registry::COMMANDS_MOD_RS),
        ] {
            artifacts.insert(path, registry.render(template, &context, path)?);
        }

        let commands = self.pool.render_each(&view.commands, |command| {
            let path = format!("src/commands/{}.rs", command.module);
            let context = CommandContext {
                program: &view,
                command,
            };
            let content = registry.render(registry::COMMAND_RS, &context, &path)?;
            Ok((path, content))
        })?;
        for (path, content) in commands {
            artifacts.insert(path, content);
        }

        artifacts.insert(
            "src/util.rs",
            registry.render(registry::UTIL_RS, &context, "src/util.rs")?,
        );

        debug!(
            program = %spec.name,
            artifacts = artifacts.len(),
            digest = %artifacts.digest(),
            "generated code"
        );
        Ok(artifacts)
    }
}

/// Re-checks the generator precondition: no non-waivable issues.
pub(crate) fn ensure_generatable(
    validator: &Validator,
    spec: &Specification,
) -> Result<(), GenerateError> {
    let issues = validator.validate(spec);
    if has_non_waivable(&issues) {
        debug!(program = %spec.name, issues = issues.len(), "refusing to render");
        return Err(GenerateError::Refused(issues));
    }
    Ok(())
}

/// Worker threads for per-command rendering.
///
/// Built once and cloned into every generator that should share it. The
/// default renders on rayon's global pool.
#[derive(Debug, Clone, Default)]
pub struct RenderPool {
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl RenderPool {
    /// Creates a dedicated pool of `jobs` threads, or uses the global pool
    /// when `jobs` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::ThreadPool`] if the threads cannot be spawned.
    pub fn new(jobs: Option<usize>) -> Result<Self, GenerateError> {
        let pool = match jobs {
            Some(threads) => Some(Arc::new(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("cliforge-render-{i}"))
                    .build()?,
            )),
            None => None,
        };
        Ok(Self { pool })
    }

    /// Thread count of the dedicated pool, `None` for the global pool.
    pub fn threads(&self) -> Option<usize> {
        self.pool.as_ref().map(|pool| pool.current_num_threads())
    }

    /// Returns `true` if both handles render on the same dedicated pool.
    pub fn shares(&self, other: &RenderPool) -> bool {
        match (&self.pool, &other.pool) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Renders one artifact per item, in parallel, preserving item order.
    pub(crate) fn render_each<T, F>(
        &self,
        items: &[T],
        render: F,
    ) -> Result<Vec<(String, String)>, GenerateError>
    where
        T: Sync,
        F: Fn(&T) -> Result<(String, String), GenerateError> + Sync + Send,
    {
        let run = || items.par_iter().map(&render).collect::<Result<Vec<_>, _>>();
        match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        }
    }
}
