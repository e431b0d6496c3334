//! Specification type definitions for CLI generation.
//!
//! This module defines the data model a generated command-line program is
//! described with. The types are designed for serialization with [`serde`]
//! and accept the JSON/YAML shape produced by upstream specification
//! authors (including their short type aliases such as `"str"` or `"int"`).

use serde::{Deserialize, Serialize};

use crate::error::SpecError;

/// Default target toolchain recorded in generated manifests when a
/// specification does not declare one.
pub const DEFAULT_RUNTIME_VERSION: &str = "1.74";

/// Value kind for options and positional arguments.
///
/// A closed set; every generated field maps to exactly one Rust type per
/// kind.
///
/// # Examples
///
/// ```
/// use cliforge_core::ValueKind;
///
/// let kind: ValueKind = serde_json::from_str("\"int\"").unwrap();
/// assert_eq!(kind, ValueKind::Integer);
/// assert_eq!(ValueKind::default(), ValueKind::Text);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Free-form string (the default).
    #[default]
    #[serde(alias = "str", alias = "string")]
    Text,
    /// Signed 64-bit integer.
    #[serde(alias = "int")]
    Integer,
    /// 64-bit float.
    Float,
    /// Presence flag; options only.
    #[serde(alias = "bool")]
    Boolean,
    /// Filesystem path.
    Path,
    /// One of a fixed set of strings; options only.
    Choice,
}

impl ValueKind {
    /// Canonical lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Path => "path",
            Self::Choice => "choice",
        }
    }

    /// Returns `true` if a default value of this shape fits the kind.
    ///
    /// Integer defaults are accepted for float options.
    ///
    /// # Examples
    ///
    /// ```
    /// use cliforge_core::{DefaultValue, ValueKind};
    ///
    /// assert!(ValueKind::Float.accepts(&DefaultValue::Integer(3)));
    /// assert!(!ValueKind::Integer.accepts(&DefaultValue::Text("3".into())));
    /// ```
    pub fn accepts(&self, value: &DefaultValue) -> bool {
        matches!(
            (self, value),
            (Self::Text | Self::Path | Self::Choice, DefaultValue::Text(_))
                | (Self::Integer, DefaultValue::Integer(_))
                | (Self::Float, DefaultValue::Float(_) | DefaultValue::Integer(_))
                | (Self::Boolean, DefaultValue::Boolean(_))
        )
    }

    /// Returns `true` if positional arguments may use this kind.
    pub fn is_positional(&self) -> bool {
        !matches!(self, Self::Boolean | Self::Choice)
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Default value of an option, keyed by its JSON shape.
///
/// Agreement between the shape and the option's [`ValueKind`] is not
/// enforced by the type; the validator reports mismatches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl DefaultValue {
    /// Name of the shape, used in issue messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    /// Returns the string payload for text-shaped defaults.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A named option (`--name`, optionally `-n`).
///
/// # Examples
///
/// ```
/// use cliforge_core::{OptionSpec, ValueKind};
///
/// let output = OptionSpec::new("output", ValueKind::Path)
///     .with_short('o')
///     .with_help("Where to write the result");
/// assert_eq!(output.short.as_deref(), Some("o"));
/// assert!(!output.required);
///
/// let format = OptionSpec::choice("format", &["png", "jpeg"]);
/// assert_eq!(format.kind, ValueKind::Choice);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Long name without leading dashes (e.g. "dry-run")
    pub name: String,
    /// Single-character short name without dash (e.g. "n")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Value kind
    #[serde(rename = "type", default)]
    pub kind: ValueKind,
    /// Whether the option must be supplied
    #[serde(default)]
    pub required: bool,
    /// Default value, typed per kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Help text shown to users
    #[serde(default)]
    pub help: String,
    /// Allowed values; present only for choice options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl OptionSpec {
    /// Creates an optional option of the given kind.
    pub fn new(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            short: None,
            kind,
            required: false,
            default: None,
            help: String::new(),
            choices: None,
        }
    }

    /// Creates a boolean presence flag.
    pub fn flag(name: &str) -> Self {
        Self::new(name, ValueKind::Boolean)
    }

    /// Creates a choice option restricted to `choices`.
    pub fn choice(name: &str, choices: &[&str]) -> Self {
        Self::new(name, ValueKind::Choice).with_choices(choices)
    }

    /// Sets the short name.
    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short.to_string());
        self
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }

    /// Sets the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Sets the allowed values.
    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Marks the option as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Returns the short name as a single character, if well-formed.
    pub fn short_char(&self) -> Option<char> {
        let short = self.short.as_deref()?;
        let mut chars = short.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c),
            _ => None,
        }
    }
}

/// A positional argument. Declaration order is the parse order.
///
/// # Examples
///
/// ```
/// use cliforge_core::{ArgumentSpec, ValueKind};
///
/// let who = ArgumentSpec::required("who", ValueKind::Text);
/// assert!(who.required);
///
/// let count = ArgumentSpec::optional("count", ValueKind::Integer);
/// assert!(!count.required);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    /// Name of the argument (e.g. "file")
    pub name: String,
    /// Value kind
    #[serde(rename = "type", default)]
    pub kind: ValueKind,
    /// Is this argument required?
    #[serde(default = "default_true")]
    pub required: bool,
    /// Help text shown to users
    #[serde(default)]
    pub help: String,
}

fn default_true() -> bool {
    true
}

impl ArgumentSpec {
    /// Creates a required positional argument.
    pub fn required(name: &str, kind: ValueKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: true,
            help: String::new(),
        }
    }

    /// Creates an optional positional argument.
    pub fn optional(name: &str, kind: ValueKind) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    /// Sets the help text.
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = help.to_string();
        self
    }
}

/// One command of the generated CLI.
///
/// # Examples
///
/// ```
/// use cliforge_core::{ArgumentSpec, CommandSpec, OptionSpec, ValueKind};
///
/// let resize = CommandSpec::new("resize", "Resize an image")
///     .with_arg(ArgumentSpec::required("input", ValueKind::Path))
///     .with_option(OptionSpec::new("width", ValueKind::Integer))
///     .with_example("img-convert resize photo.png --width 640");
///
/// assert_eq!(resize.arguments.len(), 1);
/// assert!(resize.find_option("width").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Name of the command (lowercase, underscore-separated)
    pub name: String,
    /// Help text shown to users
    #[serde(default)]
    pub description: String,
    /// Positional arguments, in parse order
    #[serde(default)]
    pub arguments: Vec<ArgumentSpec>,
    /// Options local to this command
    #[serde(default)]
    pub options: Vec<OptionSpec>,
    /// Usage examples rendered verbatim into help text
    #[serde(default)]
    pub examples: Vec<String>,
}

impl CommandSpec {
    /// Creates a command with no arguments or options.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            ..Default::default()
        }
    }

    /// Adds a positional argument.
    pub fn with_arg(mut self, arg: ArgumentSpec) -> Self {
        self.arguments.push(arg);
        self
    }

    /// Adds a local option.
    pub fn with_option(mut self, option: OptionSpec) -> Self {
        self.options.push(option);
        self
    }

    /// Adds a usage example.
    pub fn with_example(mut self, example: &str) -> Self {
        self.examples.push(example.to_string());
        self
    }

    /// Finds a local option by long name.
    pub fn find_option(&self, name: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }
}

/// Complete specification of a CLI to generate.
///
/// This is the root type of the model. Once handed to the validator it is
/// treated as an immutable value by every downstream component.
///
/// # Examples
///
/// ```
/// use cliforge_core::*;
///
/// let spec = Specification::new("greet", "Print greetings")
///     .with_global_option(OptionSpec::flag("shout").with_help("Use capitals"))
///     .with_command(
///         CommandSpec::new("hello", "Say hello")
///             .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
///     );
///
/// assert_eq!(spec.command_names(), vec!["hello"]);
/// assert_eq!(spec.options_for_command("hello").len(), 1); // global only
/// assert_eq!(spec.runtime_version, DEFAULT_RUNTIME_VERSION);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    /// Program name (lowercase, hyphens allowed)
    pub name: String,
    /// What the program does
    #[serde(default)]
    pub description: String,
    /// Commands, in declared order
    #[serde(default)]
    pub commands: Vec<CommandSpec>,
    /// Options available to every command
    #[serde(default)]
    pub global_options: Vec<OptionSpec>,
    /// Target toolchain version tag
    #[serde(default = "default_runtime_version")]
    pub runtime_version: String,
    /// Declared dependency identifiers (`name` or `name@version-req`)
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_runtime_version() -> String {
    DEFAULT_RUNTIME_VERSION.to_string()
}

impl Specification {
    /// Creates a specification with no commands.
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            commands: Vec::new(),
            global_options: Vec::new(),
            runtime_version: default_runtime_version(),
            dependencies: Vec::new(),
        }
    }

    /// Parses a specification from JSON.
    ///
    /// Only the shape is checked here; semantic problems are reported by
    /// [`validate_spec`](crate::validate_spec).
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::Json`] if the input is not a specification
    /// object.
    pub fn from_json(raw: &str) -> Result<Self, SpecError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Adds a command.
    pub fn with_command(mut self, command: CommandSpec) -> Self {
        self.commands.push(command);
        self
    }

    /// Adds a global option.
    pub fn with_global_option(mut self, option: OptionSpec) -> Self {
        self.global_options.push(option);
        self
    }

    /// Adds a dependency identifier.
    pub fn with_dependency(mut self, dependency: &str) -> Self {
        self.dependencies.push(dependency.to_string());
        self
    }

    /// Finds a command by name.
    pub fn find_command(&self, name: &str) -> Option<&CommandSpec> {
        self.commands.iter().find(|c| c.name == name)
    }

    /// Gets all command names in declared order.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.iter().map(|c| c.name.as_str()).collect()
    }

    /// Gets every option visible to a command (global first, then local).
    pub fn options_for_command(&self, command: &str) -> Vec<&OptionSpec> {
        let mut options: Vec<&OptionSpec> = self.global_options.iter().collect();
        if let Some(cmd) = self.find_command(command) {
            options.extend(cmd.options.iter());
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_upstream_shape() {
        let raw = r#"{
            "name": "word-counter",
            "description": "Count words in text files",
            "commands": [{
                "name": "count",
                "description": "Count words in a file",
                "arguments": [{"name": "file", "type": "path", "help": "File to count"}],
                "options": [
                    {"name": "verbose-report", "short": "r", "type": "bool", "help": "Show details"},
                    {"name": "limit", "type": "int", "default": 10, "help": "Max lines"},
                    {"name": "ratio", "type": "float", "default": 0.5, "help": "Ratio"},
                    {"name": "format", "type": "choice", "choices": ["json", "text"], "default": "text", "help": "Output"}
                ],
                "examples": ["word-counter count notes.txt"]
            }]
        }"#;

        let spec = Specification::from_json(raw).unwrap();
        let count = &spec.commands[0];
        assert_eq!(spec.runtime_version, DEFAULT_RUNTIME_VERSION);
        assert!(count.arguments[0].required);
        assert_eq!(count.arguments[0].kind, ValueKind::Path);
        assert_eq!(count.options[0].kind, ValueKind::Boolean);
        assert_eq!(count.options[1].default, Some(DefaultValue::Integer(10)));
        assert_eq!(count.options[2].default, Some(DefaultValue::Float(0.5)));
        assert_eq!(
            count.options[3].default,
            Some(DefaultValue::Text("text".into()))
        );
    }

    #[test]
    fn test_unknown_kind_is_a_parse_error() {
        let raw = r#"{"name": "x", "commands": [{"name": "a", "options": [{"name": "o", "type": "blob"}]}]}"#;
        assert!(Specification::from_json(raw).is_err());
    }

    #[test]
    fn test_short_char() {
        assert_eq!(
            OptionSpec::flag("all").with_short('a').short_char(),
            Some('a')
        );
        let mut opt = OptionSpec::flag("all");
        opt.short = Some("al".into());
        assert_eq!(opt.short_char(), None);
    }

    #[test]
    fn test_options_for_command_orders_global_first() {
        let spec = Specification::new("tool", "A tool")
            .with_global_option(OptionSpec::flag("dry-run"))
            .with_command(
                CommandSpec::new("sync", "Sync things")
                    .with_option(OptionSpec::new("target", ValueKind::Text)),
            );

        let names: Vec<_> = spec
            .options_for_command("sync")
            .iter()
            .map(|o| o.name.as_str())
            .collect();
        assert_eq!(names, vec!["dry-run", "target"]);
        assert_eq!(spec.options_for_command("missing").len(), 1);
    }
}
