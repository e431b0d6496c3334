//! Render contexts.
//!
//! Views are computed once per generation from a validated specification.
//! Every piece of user text that lands in generated source is pre-rendered
//! here as a Rust or TOML literal, so templates only arrange literals and
//! sanitized identifiers and never splice raw text into code.

use cliforge_core::naming::{symbol_name, type_name, value_name};
use cliforge_core::safety::{DenyList, OptionScope, confirmation_for};
use cliforge_core::{
    ArgumentSpec, CommandSpec, DefaultValue, OptionSpec, Specification, ValueKind,
    parse_dependency,
};
use serde::Serialize;

use crate::generator::GenerationMetadata;
use crate::help;
use crate::registry::TEMPLATE_SET_VERSION;

/// Dependencies every generated manifest declares itself.
pub const BUILTIN_DEPENDENCIES: &[&str] = &["clap", "assert_cmd", "predicates"];

/// Value used for invalid-choice tests before uniquifying.
const INVALID_CHOICE: &str = "__invalid__";

/// Rust string literal for `text`.
pub fn rust_str(text: &str) -> String {
    format!("{text:?}")
}

/// TOML basic string for `text`.
pub fn toml_str(text: &str) -> String {
    toml::Value::String(text.to_string()).to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencyView {
    pub key: String,
    pub req_toml: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionView {
    pub name: String,
    pub field: String,
    pub ty: String,
    pub attrs: String,
    /// `-o, --output` form for documentation
    pub display: String,
    pub help: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgumentView {
    pub field: String,
    pub ty: String,
    pub attrs: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationView {
    /// Expression evaluating to the flag value inside `run`
    pub expr: String,
    pub flag_lit: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandView {
    pub name: String,
    pub name_lit: String,
    pub module: String,
    pub variant: String,
    pub args_type: String,
    pub about_lit: String,
    pub after_help_lit: Option<String>,
    pub pending_lit: String,
    pub description: String,
    pub examples: Vec<String>,
    pub arguments: Vec<ArgumentView>,
    pub options: Vec<OptionView>,
    pub uses_path: bool,
    pub confirmation: Option<ConfirmationView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramView {
    pub name: String,
    pub name_lit: String,
    pub name_toml: String,
    pub bin_env_lit: String,
    pub about_lit: String,
    pub description: String,
    pub description_toml: String,
    pub runtime_version_toml: String,
    pub dependencies: Vec<DependencyView>,
    pub generator_version_lit: String,
    pub generated_at_lit: String,
    pub template_set_version: &'static str,
    pub globals: Vec<OptionView>,
    pub globals_use_path: bool,
    pub commands: Vec<CommandView>,
}

impl ProgramView {
    /// Builds the view for `spec`. The specification must be valid.
    pub fn build(spec: &Specification, metadata: &GenerationMetadata, deny: &DenyList) -> Self {
        let dependencies = spec
            .dependencies
            .iter()
            .filter_map(|raw| parse_dependency(raw))
            .filter(|(name, _)| !BUILTIN_DEPENDENCIES.contains(name))
            .map(|(name, req)| DependencyView {
                key: name.to_string(),
                req_toml: toml_str(req.unwrap_or("*")),
            })
            .collect();

        Self {
            name: spec.name.clone(),
            name_lit: rust_str(&spec.name),
            name_toml: toml_str(&spec.name),
            bin_env_lit: rust_str(&format!("CARGO_BIN_EXE_{}", spec.name)),
            about_lit: rust_str(help::program_about(spec)),
            description: spec.description.clone(),
            description_toml: toml_str(&spec.description),
            runtime_version_toml: toml_str(&spec.runtime_version),
            dependencies,
            generator_version_lit: rust_str(&metadata.generator_version),
            generated_at_lit: rust_str(&metadata.generated_at),
            template_set_version: TEMPLATE_SET_VERSION,
            globals: spec
                .global_options
                .iter()
                .map(|o| option_view(o, true))
                .collect(),
            globals_use_path: spec.global_options.iter().any(|o| o.kind == ValueKind::Path),
            commands: spec
                .commands
                .iter()
                .map(|c| command_view(spec, c, deny))
                .collect(),
        }
    }
}

fn command_view(spec: &Specification, command: &CommandSpec, deny: &DenyList) -> CommandView {
    let confirmation = if deny.is_destructive(command) {
        confirmation_for(spec, command).map(|c| ConfirmationView {
            expr: match c.scope {
                OptionScope::Local => format!("args.{}", symbol_name(&c.option)),
                OptionScope::Global => format!("globals.{}", symbol_name(&c.option)),
            },
            flag_lit: rust_str(&format!("--{}", c.option)),
        })
    } else {
        None
    };

    CommandView {
        name: command.name.clone(),
        name_lit: rust_str(&command.name),
        module: symbol_name(&command.name),
        variant: type_name(&command.name),
        args_type: format!("{}Args", type_name(&command.name).trim_end_matches('_')),
        about_lit: rust_str(help::command_about(command)),
        after_help_lit: help::after_help(command).map(|text| rust_str(&text)),
        pending_lit: rust_str(&format!("{}: not implemented yet", command.name)),
        description: command.description.clone(),
        examples: command.examples.clone(),
        arguments: command.arguments.iter().map(argument_view).collect(),
        options: command
            .options
            .iter()
            .map(|o| option_view(o, false))
            .collect(),
        uses_path: command.arguments.iter().any(|a| a.kind == ValueKind::Path)
            || command.options.iter().any(|o| o.kind == ValueKind::Path),
        confirmation,
    }
}

fn base_type(kind: ValueKind) -> &'static str {
    match kind {
        ValueKind::Text | ValueKind::Choice => "String",
        ValueKind::Integer => "i64",
        ValueKind::Float => "f64",
        ValueKind::Boolean => "bool",
        ValueKind::Path => "PathBuf",
    }
}

fn argument_view(argument: &ArgumentSpec) -> ArgumentView {
    let base = base_type(argument.kind);
    ArgumentView {
        field: symbol_name(&argument.name),
        ty: if argument.required {
            base.to_string()
        } else {
            format!("Option<{base}>")
        },
        attrs: format!(
            "value_name = {}, help = {}",
            rust_str(&value_name(&argument.name)),
            rust_str(help::argument_help(argument))
        ),
    }
}

fn option_view(option: &OptionSpec, global: bool) -> OptionView {
    let base = base_type(option.kind);
    let ty = if option.kind == ValueKind::Boolean || option.required || option.default.is_some() {
        base.to_string()
    } else {
        format!("Option<{base}>")
    };

    let mut attrs = vec![format!("long = {}", rust_str(&option.name))];
    if let Some(c) = option.short_char() {
        attrs.push(format!("short = {c:?}"));
    }
    if option.kind != ValueKind::Boolean {
        attrs.push(format!("value_name = {}", rust_str(&value_name(&option.name))));
    }
    match (&option.default, option.kind) {
        (Some(DefaultValue::Integer(i)), ValueKind::Integer) => {
            attrs.push(format!("default_value_t = {i}"))
        }
        (Some(DefaultValue::Integer(i)), ValueKind::Float) => {
            attrs.push(format!("default_value_t = {:?}", *i as f64))
        }
        (Some(DefaultValue::Float(f)), ValueKind::Float) => {
            attrs.push(format!("default_value_t = {f:?}"))
        }
        (Some(DefaultValue::Text(text)), _) => {
            attrs.push(format!("default_value = {}", rust_str(text)))
        }
        _ => {}
    }
    if let Some(choices) = &option.choices {
        let literals: Vec<String> = choices.iter().map(|c| rust_str(c)).collect();
        attrs.push(format!("value_parser = [{}]", literals.join(", ")));
    }
    if global {
        attrs.push("global = true".to_string());
    }
    attrs.push(format!("help = {}", rust_str(help::option_help(option))));

    OptionView {
        name: option.name.clone(),
        field: symbol_name(&option.name),
        ty,
        attrs: attrs.join(", "),
        display: match option.short_char() {
            Some(c) => format!("-{c}, --{}", option.name),
            None => format!("--{}", option.name),
        },
        help: option.help.clone(),
    }
}

/// One generated test invocation.
#[derive(Debug, Clone, Serialize)]
pub struct CaseView {
    pub test: String,
    /// Rust string literals, command name first
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandTestView {
    pub name: String,
    pub help_args: Vec<String>,
    pub fragments: Vec<String>,
    pub happy: Vec<String>,
    pub missing: Vec<CaseView>,
    pub invalid_choices: Vec<CaseView>,
    pub refusal: Option<CaseView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramTestView {
    pub fragments: Vec<String>,
    pub verbose_quiet: Vec<String>,
    pub color_no_color: Vec<String>,
    pub commands: Vec<CommandTestView>,
}

/// Sample command-line value for a kind.
fn sample_value(kind: ValueKind, choices: Option<&[String]>) -> String {
    match kind {
        ValueKind::Text => "sample".to_string(),
        ValueKind::Integer => "1".to_string(),
        ValueKind::Float => "1.5".to_string(),
        ValueKind::Path => "sample.txt".to_string(),
        ValueKind::Choice => choices
            .and_then(|c| c.first())
            .cloned()
            .unwrap_or_default(),
        ValueKind::Boolean => String::new(),
    }
}

/// A value guaranteed not to be one of `choices`.
fn invalid_choice(choices: &[String]) -> String {
    let mut value = INVALID_CHOICE.to_string();
    while choices.contains(&value) {
        value.push('_');
    }
    value
}

/// Command-line token setting `option` to `value`.
fn option_token(option: &OptionSpec, value: &str) -> String {
    format!("--{}={value}", option.name)
}

/// Raw tokens of the minimal valid invocation, tagged with what produced
/// them so individual inputs can be dropped.
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Command,
    Argument(usize),
    Option(usize),
    Confirmation,
}

fn happy_inputs(
    spec: &Specification,
    command: &CommandSpec,
    deny: &DenyList,
) -> Vec<(Input, String)> {
    let mut inputs = vec![(Input::Command, command.name.clone())];
    for (i, argument) in command.arguments.iter().enumerate() {
        if argument.required {
            inputs.push((Input::Argument(i), sample_value(argument.kind, None)));
        }
    }
    for (i, option) in command.options.iter().enumerate() {
        if option.required {
            let value = sample_value(option.kind, option.choices.as_deref());
            inputs.push((Input::Option(i), option_token(option, &value)));
        }
    }
    if deny.is_destructive(command) {
        if let Some(confirmation) = confirmation_for(spec, command) {
            inputs.push((Input::Confirmation, format!("--{}", confirmation.option)));
        }
    }
    inputs
}

fn literals<'a>(tokens: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    tokens.into_iter().map(|t| rust_str(t)).collect()
}

fn without(inputs: &[(Input, String)], dropped: &Input) -> Vec<String> {
    literals(inputs.iter().filter(|(i, _)| i != dropped).map(|(_, t)| t))
}

impl CommandTestView {
    fn build(spec: &Specification, command: &CommandSpec, deny: &DenyList) -> Self {
        let inputs = happy_inputs(spec, command, deny);

        let mut missing = Vec::new();
        for (i, argument) in command.arguments.iter().enumerate() {
            if argument.required {
                missing.push(CaseView {
                    test: format!("missing_arg_{}_exits_one", symbol_name(&argument.name)),
                    args: without(&inputs, &Input::Argument(i)),
                });
            }
        }
        for (i, option) in command.options.iter().enumerate() {
            if option.required {
                missing.push(CaseView {
                    test: format!("missing_opt_{}_exits_one", symbol_name(&option.name)),
                    args: without(&inputs, &Input::Option(i)),
                });
            }
        }

        let mut invalid_choices = Vec::new();
        let local = command.options.iter().enumerate().map(|(i, o)| (Some(i), o));
        let global = spec.global_options.iter().map(|o| (None, o));
        for (index, option) in local.chain(global) {
            let Some(choices) = option.choices.as_deref() else {
                continue;
            };
            if option.kind != ValueKind::Choice {
                continue;
            }
            let mut args = match index {
                Some(i) => without(&inputs, &Input::Option(i)),
                None => literals(inputs.iter().map(|(_, t)| t)),
            };
            args.push(rust_str(&option_token(option, &invalid_choice(choices))));
            invalid_choices.push(CaseView {
                test: format!("invalid_choice_{}_exits_one", symbol_name(&option.name)),
                args,
            });
        }

        let refusal = inputs
            .iter()
            .any(|(i, _)| *i == Input::Confirmation)
            .then(|| CaseView {
                test: "refuses_without_confirmation".to_string(),
                args: without(&inputs, &Input::Confirmation),
            });

        Self {
            name: command.name.clone(),
            help_args: vec![rust_str(&command.name), rust_str("--help")],
            fragments: help::expected_fragments(spec, command)
                .iter()
                .map(|f| rust_str(f))
                .collect(),
            happy: literals(inputs.iter().map(|(_, t)| t)),
            missing,
            invalid_choices,
            refusal,
        }
    }
}

impl ProgramTestView {
    /// Builds the test view for `spec`. The specification must be valid.
    pub fn build(spec: &Specification, deny: &DenyList) -> Self {
        let commands: Vec<CommandTestView> = spec
            .commands
            .iter()
            .map(|c| CommandTestView::build(spec, c, deny))
            .collect();
        let first_happy = commands.first().map(|c| c.happy.clone()).unwrap_or_default();
        let with_prefix = |flags: [&str; 2]| {
            let mut args: Vec<String> = flags.iter().map(|f| rust_str(f)).collect();
            args.extend(first_happy.iter().cloned());
            args
        };

        Self {
            fragments: help::expected_program_fragments(spec)
                .iter()
                .map(|f| rust_str(f))
                .collect(),
            verbose_quiet: with_prefix(["--verbose", "--quiet"]),
            color_no_color: with_prefix(["--color", "--no-color"]),
            commands,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> GenerationMetadata {
        GenerationMetadata::new("0.1.0", "2024-01-15T10:30:00Z")
    }

    #[test]
    fn test_option_attrs_and_types() {
        let format = OptionSpec::choice("format", &["png", "jpeg"])
            .with_default(DefaultValue::Text("png".into()))
            .with_help("Output format");
        let view = option_view(&format, false);
        assert_eq!(view.ty, "String");
        assert_eq!(
            view.attrs,
            r#"long = "format", value_name = "FORMAT", default_value = "png", value_parser = ["png", "jpeg"], help = "Output format""#
        );

        let ratio = OptionSpec::new("ratio", ValueKind::Float).with_default(DefaultValue::Integer(2));
        assert!(option_view(&ratio, false).attrs.contains("default_value_t = 2.0"));

        let output = OptionSpec::new("output", ValueKind::Path).with_short('o');
        let view = option_view(&output, true);
        assert_eq!(view.ty, "Option<PathBuf>");
        assert!(view.attrs.contains("short = 'o'"));
        assert!(view.attrs.contains("global = true"));
        assert_eq!(view.display, "-o, --output");
    }

    #[test]
    fn test_keyword_names_are_sanitized() {
        let spec = Specification::new("tool", "A tool").with_command(
            CommandSpec::new("type", "Show the type")
                .with_arg(ArgumentSpec::required("match", ValueKind::Text).with_help("x")),
        );
        let view = ProgramView::build(&spec, &metadata(), &DenyList::builtin());
        let command = &view.commands[0];
        assert_eq!(command.module, "type_");
        assert_eq!(command.variant, "Type");
        assert_eq!(command.args_type, "TypeArgs");
        assert_eq!(command.name_lit, "\"type\"");
        assert_eq!(command.arguments[0].field, "match_");
    }

    #[test]
    fn test_builtin_dependencies_are_skipped() {
        let spec = Specification::new("tool", "A tool")
            .with_dependency("clap@4")
            .with_dependency("serde@1.0")
            .with_dependency("anyhow");
        let view = ProgramView::build(&spec, &metadata(), &DenyList::builtin());
        let keys: Vec<_> = view.dependencies.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, vec!["serde", "anyhow"]);
        assert_eq!(view.dependencies[1].req_toml, "\"*\"");
    }

    #[test]
    fn test_user_text_is_quoted() {
        let spec = Specification::new("tool", "Say \"hi\"\n}");
        let view = ProgramView::build(&spec, &metadata(), &DenyList::builtin());
        assert_eq!(view.about_lit, r#""Say \"hi\"\n}""#);
    }

    #[test]
    fn test_destructive_command_cases() {
        let spec = Specification::new("vault", "Manage secrets").with_command(
            CommandSpec::new("purge", "Purge stored entries")
                .with_arg(ArgumentSpec::required("store", ValueKind::Text).with_help("Store"))
                .with_option(OptionSpec::flag("yes").with_short('y').with_help("Confirm")),
        );
        let deny = DenyList::builtin();
        let tests = ProgramTestView::build(&spec, &deny);
        let purge = &tests.commands[0];
        assert_eq!(purge.happy, vec!["\"purge\"", "\"sample\"", "\"--yes\""]);
        assert_eq!(purge.missing[0].args, vec!["\"purge\"", "\"--yes\""]);
        let refusal = purge.refusal.as_ref().unwrap();
        assert_eq!(refusal.args, vec!["\"purge\"", "\"sample\""]);

        let view = ProgramView::build(&spec, &GenerationMetadata::new("0", "t"), &deny);
        let confirmation = view.commands[0].confirmation.as_ref().unwrap();
        assert_eq!(confirmation.expr, "args.yes");
        assert_eq!(confirmation.flag_lit, "\"--yes\"");
    }

    #[test]
    fn test_invalid_choice_replaces_required_value() {
        let spec = Specification::new("tool", "A tool").with_command(
            CommandSpec::new("render", "Render").with_option(
                OptionSpec::choice("format", &["__invalid__", "png"])
                    .required()
                    .with_help("Format"),
            ),
        );
        let tests = ProgramTestView::build(&spec, &DenyList::builtin());
        let render = &tests.commands[0];
        assert_eq!(render.happy, vec!["\"render\"", "\"--format=__invalid__\""]);
        assert_eq!(
            render.invalid_choices[0].args,
            vec!["\"render\"", "\"--format=__invalid___\""]
        );
    }
}
