//! Help-text formatting shared by the code and test generators.
//!
//! The generated program prints exactly what these functions return, and the
//! generated tests look for exactly the fragments [`expected_fragments`]
//! returns. Generated help is never re-wrapped, so every fragment appears
//! verbatim in `--help` output.

use cliforge_core::{ArgumentSpec, CommandSpec, OptionSpec, Specification};

/// Heading placed above usage examples.
pub const EXAMPLES_HEADING: &str = "Examples:";

/// Indentation of each example line.
const EXAMPLE_INDENT: &str = "  ";

/// Program-level `about` text.
pub fn program_about(spec: &Specification) -> &str {
    &spec.description
}

/// Command-level `about` text: the description verbatim.
pub fn command_about(command: &CommandSpec) -> &str {
    &command.description
}

/// Text printed after a command's option list, or `None` when the command
/// has no examples.
///
/// # Examples
///
/// ```
/// use cliforge_codegen::help::after_help;
/// use cliforge_core::CommandSpec;
///
/// let cmd = CommandSpec::new("hello", "Say hello")
///     .with_example("greet hello world")
///     .with_example("greet hello --loud world");
/// assert_eq!(
///     after_help(&cmd).as_deref(),
///     Some("Examples:\n  greet hello world\n  greet hello --loud world")
/// );
/// assert_eq!(after_help(&CommandSpec::new("x", "y")), None);
/// ```
pub fn after_help(command: &CommandSpec) -> Option<String> {
    if command.examples.is_empty() {
        return None;
    }
    let mut text = EXAMPLES_HEADING.to_string();
    for example in &command.examples {
        text.push('\n');
        text.push_str(EXAMPLE_INDENT);
        text.push_str(example);
    }
    Some(text)
}

pub fn option_help(option: &OptionSpec) -> &str {
    &option.help
}

pub fn argument_help(argument: &ArgumentSpec) -> &str {
    &argument.help
}

/// Substrings that `<program> <command> --help` must print.
///
/// Covers the description, every usage example, and the help of every
/// argument, local option and global option, in that order. Empty strings
/// are skipped.
pub fn expected_fragments(spec: &Specification, command: &CommandSpec) -> Vec<String> {
    let mut fragments = vec![command_about(command).to_string()];
    fragments.extend(command.examples.iter().cloned());
    fragments.extend(command.arguments.iter().map(|a| argument_help(a).to_string()));
    fragments.extend(command.options.iter().map(|o| option_help(o).to_string()));
    fragments.extend(spec.global_options.iter().map(|o| option_help(o).to_string()));
    fragments.retain(|f| !f.trim().is_empty());
    fragments
}

/// Substrings that `<program> --help` must print: the program description
/// and every command name.
pub fn expected_program_fragments(spec: &Specification) -> Vec<String> {
    let mut fragments = vec![program_about(spec).to_string()];
    fragments.extend(spec.commands.iter().map(|c| c.name.clone()));
    fragments.retain(|f| !f.trim().is_empty());
    fragments
}
