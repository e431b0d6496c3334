//! Embedded template set.
//!
//! The registry compiles every template once and is then shared read-only
//! (behind an `Arc`) by the code and test generators and their rendering
//! workers.

use serde::Serialize;
use tera::{Context, Tera};
use tracing::debug;

use crate::error::{GenerateError, describe_tera_error};

/// Version of the built-in template set. Output for a fixed specification
/// is byte-identical for a fixed value of this constant.
pub const TEMPLATE_SET_VERSION: &str = "1";

pub(crate) const CARGO_TOML: &str = "Cargo.toml.tera";
pub(crate) const README: &str = "README.md.tera";
pub(crate) const MAIN_RS: &str = "main.rs.tera";
pub(crate) const COMMANDS_MOD_RS: &str = "commands_mod.rs.tera";
pub(crate) const COMMAND_RS: &str = "command.rs.tera";
pub(crate) const UTIL_RS: &str = "util.rs.tera";
pub(crate) const TESTS_CLI_RS: &str = "tests_cli.rs.tera";
pub(crate) const TESTS_COMMAND_RS: &str = "tests_command.rs.tera";

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    (CARGO_TOML, include_str!("templates/Cargo.toml.tera")),
    (README, include_str!("templates/README.md.tera")),
    (MAIN_RS, include_str!("templates/main.rs.tera")),
    (COMMANDS_MOD_RS, include_str!("templates/commands_mod.rs.tera")),
    (COMMAND_RS, include_str!("templates/command.rs.tera")),
    (UTIL_RS, include_str!("templates/util.rs.tera")),
    (TESTS_CLI_RS, include_str!("templates/tests_cli.rs.tera")),
    (TESTS_COMMAND_RS, include_str!("templates/tests_command.rs.tera")),
];

/// Compiled templates.
///
/// # Examples
///
/// ```
/// use cliforge_codegen::TemplateRegistry;
///
/// let registry = TemplateRegistry::builtin().unwrap();
/// assert!(registry.template_names().contains(&"main.rs.tera"));
/// ```
#[derive(Debug)]
pub struct TemplateRegistry {
    tera: Tera,
}

impl TemplateRegistry {
    /// Compiles the built-in template set.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Registry`] if a template does not compile.
    pub fn builtin() -> Result<Self, GenerateError> {
        let mut tera = Tera::default();
        tera.autoescape_on(vec![]);
        tera.add_raw_templates(BUILTIN_TEMPLATES.iter().copied())
            .map_err(|err| GenerateError::Registry(describe_tera_error(&err)))?;
        debug!(
            templates = BUILTIN_TEMPLATES.len(),
            version = TEMPLATE_SET_VERSION,
            "compiled template set"
        );
        Ok(Self { tera })
    }

    /// Replaces one template before the registry is shared.
    ///
    /// # Errors
    ///
    /// Returns [`GenerateError::Registry`] if `name` is not part of the set
    /// or `source` does not compile.
    pub fn override_template(&mut self, name: &str, source: &str) -> Result<(), GenerateError> {
        if !BUILTIN_TEMPLATES.iter().any(|(n, _)| *n == name) {
            return Err(GenerateError::Registry(format!("unknown template `{name}`")));
        }
        self.tera
            .add_raw_template(name, source)
            .map_err(|err| GenerateError::Registry(describe_tera_error(&err)))
    }

    /// Template names, sorted.
    pub fn template_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tera.get_template_names().collect();
        names.sort_unstable();
        names
    }

    /// Renders `template` for `artifact` with a serialized view as context.
    pub(crate) fn render<T: Serialize>(
        &self,
        template: &str,
        view: &T,
        artifact: &str,
    ) -> Result<String, GenerateError> {
        let context = Context::from_serialize(view).map_err(|err| GenerateError::Render {
            artifact: artifact.to_string(),
            step: format!("build context for {template}"),
            message: describe_tera_error(&err),
        })?;
        let rendered = self
            .tera
            .render(template, &context)
            .map_err(|err| GenerateError::Render {
                artifact: artifact.to_string(),
                step: format!("render {template}"),
                message: describe_tera_error(&err),
            })?;
        debug!(artifact, template, bytes = rendered.len(), "rendered artifact");
        Ok(rendered)
    }
}
