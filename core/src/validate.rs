//! Specification validation.
//!
//! Checks a [`Specification`] against its structural invariants and the
//! forbidden-construct policy. Validation never stops at the first problem:
//! every independent defect is reported as exactly one [`Issue`], in walk
//! order, so one pass shows everything that needs fixing.
//!
//! # Examples
//!
//! ```
//! use cliforge_core::*;
//!
//! let spec = Specification::new("greet", "Print greetings").with_command(
//!     CommandSpec::new("hello", "Say hello")
//!         .with_arg(ArgumentSpec::required("who", ValueKind::Text).with_help("Who to greet")),
//! );
//! assert!(validate_spec(&spec).is_empty());
//!
//! // Invalid: two commands with the same name
//! let bad = spec.clone().with_command(CommandSpec::new("hello", "Again"));
//! let issues = validate_spec(&bad);
//! assert_eq!(issues.len(), 1);
//! assert_eq!(issues[0].code, IssueCode::DuplicateCommand);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::naming::{crate_name, is_rust_keyword, symbol_name};
use crate::safety::{DenyList, ForbiddenConstruct, confirmation_for, is_credential_name};
use crate::{
    ArgumentSpec, CommandSpec, DefaultValue, Issue, IssueCode, OptionSpec, Specification,
    ValueKind,
};

/// Long names of the flags every generated program carries.
pub const RESERVED_LONG_NAMES: &[&str] = &["help", "version", "verbose", "quiet", "color", "no-color"];

/// Short letters of the flags every generated program carries.
pub const RESERVED_SHORT_NAMES: &[char] = &['h', 'V', 'v', 'q'];

/// Package names cargo refuses for a binary crate.
const RESERVED_PROGRAM_NAMES: &[&str] = &[
    "test", "std", "core", "alloc", "proc_macro", "build", "deps", "examples", "incremental",
];

/// Oldest toolchain accepted for `runtime_version`: the generated manifest
/// uses edition 2021 and clap 4.5.
pub const MIN_RUNTIME_VERSION: &str = "1.74";

/// Token clap expands to a line break in help text.
const CLAP_LINE_BREAK: &str = "{n}";

/// Command names claimed by the generated command group.
pub const RESERVED_COMMAND_NAMES: &[&str] = &["help"];

static PROGRAM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("static regex must compile"));
static COMMAND_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(_[a-z0-9]+)*$").expect("static regex must compile"));
static OPTION_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]+)*$").expect("static regex must compile"));
static ARGUMENT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*([_-][a-z0-9]+)*$").expect("static regex must compile"));
static RUNTIME_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]+\.[0-9]+(\.[0-9]+)?$").expect("static regex must compile"));
static DEPENDENCY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").expect("static regex must compile"));
static VERSION_REQ_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z.*^~=<>, +-]+$").expect("static regex must compile"));

/// Validates a specification with the built-in deny-list.
///
/// Equivalent to `Validator::default().validate(spec)`.
pub fn validate_spec(spec: &Specification) -> Vec<Issue> {
    Validator::default().validate(spec)
}

/// Specification validator bound to a deny-list.
///
/// # Examples
///
/// ```
/// use cliforge_core::*;
/// use cliforge_core::safety::{DenyList, ForbiddenConstruct};
///
/// let mut deny = DenyList::builtin();
/// deny.add_words(ForbiddenConstruct::DynamicEvaluation, &["run", "script"]);
/// let validator = Validator::new(deny);
///
/// let spec = Specification::new("tool", "A tool")
///     .with_command(CommandSpec::new("go", "Run script contents"));
/// let issues = validator.validate(&spec);
/// assert_eq!(issues[0].code, IssueCode::DynamicEvaluation);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Validator {
    deny_list: DenyList,
}

impl Validator {
    /// Creates a validator using `deny_list` for the safety check.
    pub fn new(deny_list: DenyList) -> Self {
        Self { deny_list }
    }

    /// The deny-list this validator enforces.
    pub fn deny_list(&self) -> &DenyList {
        &self.deny_list
    }

    /// Returns every issue found in `spec`. Never fails; an empty list
    /// means the specification is valid.
    pub fn validate(&self, spec: &Specification) -> Vec<Issue> {
        let mut issues = Vec::new();

        check_header(spec, &mut issues);

        let globals = check_global_options(&spec.global_options, &mut issues);

        if spec.commands.is_empty() {
            issues.push(Issue::new(
                IssueCode::NoCommands,
                "commands",
                "specification declares no commands",
            ));
        }

        let mut seen_commands: HashSet<&str> = HashSet::new();
        for (i, command) in spec.commands.iter().enumerate() {
            let loc = format!("commands[{i}]");
            if !seen_commands.insert(command.name.as_str()) {
                issues.push(Issue::new(
                    IssueCode::DuplicateCommand,
                    loc.clone(),
                    format!("duplicate command `{}`", command.name),
                ));
            }
            check_command(command, &loc, &globals, &mut issues);
        }

        self.check_safety(spec, &mut issues);

        issues
    }

    fn check_safety(&self, spec: &Specification, issues: &mut Vec<Issue>) {
        let mut report = |construct: ForbiddenConstruct, loc: String| {
            issues.push(Issue::new(
                construct.code(),
                loc,
                format!("requests a forbidden construct ({})", construct.label()),
            ));
        };

        for (loc, text) in scanned_texts(spec) {
            for construct in self.deny_list.scan_text(&text) {
                report(construct, loc.clone());
            }
        }

        let options = spec
            .global_options
            .iter()
            .enumerate()
            .map(|(j, o)| (format!("global_options[{j}]"), o))
            .chain(spec.commands.iter().enumerate().flat_map(|(i, c)| {
                c.options
                    .iter()
                    .enumerate()
                    .map(move |(j, o)| (format!("commands[{i}].options[{j}]"), o))
            }));
        for (loc, option) in options {
            let hardcoded = option
                .default
                .as_ref()
                .and_then(DefaultValue::as_text)
                .is_some_and(|d| !d.trim().is_empty());
            if hardcoded && is_credential_name(&option.name) {
                report(ForbiddenConstruct::EmbeddedCredential, format!("{loc}.default"));
            }
        }

        for (i, command) in spec.commands.iter().enumerate() {
            if self.deny_list.is_destructive(command) && confirmation_for(spec, command).is_none() {
                report(
                    ForbiddenConstruct::UnconfirmedDestructive,
                    format!("commands[{i}]"),
                );
            }
        }
    }
}

/// Every free-text field subject to the deny-list, with its location.
fn scanned_texts(spec: &Specification) -> Vec<(String, String)> {
    let mut texts = vec![
        ("name".to_string(), spec.name.clone()),
        ("description".to_string(), spec.description.clone()),
    ];

    let push_option = |texts: &mut Vec<(String, String)>, loc: &str, option: &OptionSpec| {
        texts.push((format!("{loc}.name"), option.name.clone()));
        texts.push((format!("{loc}.help"), option.help.clone()));
        if let Some(DefaultValue::Text(default)) = &option.default {
            texts.push((format!("{loc}.default"), default.clone()));
        }
        for (k, choice) in option.choices.iter().flatten().enumerate() {
            texts.push((format!("{loc}.choices[{k}]"), choice.clone()));
        }
    };

    for (j, option) in spec.global_options.iter().enumerate() {
        push_option(&mut texts, &format!("global_options[{j}]"), option);
    }

    for (i, command) in spec.commands.iter().enumerate() {
        let loc = format!("commands[{i}]");
        texts.push((format!("{loc}.name"), command.name.clone()));
        texts.push((format!("{loc}.description"), command.description.clone()));
        for (k, example) in command.examples.iter().enumerate() {
            texts.push((format!("{loc}.examples[{k}]"), example.clone()));
        }
        for (j, arg) in command.arguments.iter().enumerate() {
            texts.push((format!("{loc}.arguments[{j}].name"), arg.name.clone()));
            texts.push((format!("{loc}.arguments[{j}].help"), arg.help.clone()));
        }
        for (j, option) in command.options.iter().enumerate() {
            push_option(&mut texts, &format!("{loc}.options[{j}]"), option);
        }
    }

    texts
}

fn check_header(spec: &Specification, issues: &mut Vec<Issue>) {
    if !PROGRAM_NAME_RE.is_match(&spec.name) {
        issues.push(Issue::new(
            IssueCode::InvalidName,
            "name",
            format!(
                "program name `{}` must be lowercase letters, digits and single hyphens",
                spec.name
            ),
        ));
    } else if is_rust_keyword(&crate_name(&spec.name))
        || RESERVED_PROGRAM_NAMES.contains(&crate_name(&spec.name).as_str())
    {
        issues.push(Issue::new(
            IssueCode::ReservedName,
            "name",
            format!("program name `{}` cannot be used as a package name", spec.name),
        ));
    }

    if spec.description.trim().is_empty() {
        issues.push(Issue::new(
            IssueCode::EmptyDescription,
            "description",
            "program description is empty",
        ));
    } else {
        check_rendered_text(&spec.description, "description", "program description", issues);
    }

    if !RUNTIME_VERSION_RE.is_match(&spec.runtime_version) {
        issues.push(Issue::new(
            IssueCode::InvalidRuntimeVersion,
            "runtime_version",
            format!(
                "runtime version `{}` must look like `1.74` or `1.74.1`",
                spec.runtime_version
            ),
        ));
    } else if !version_at_least(&spec.runtime_version, MIN_RUNTIME_VERSION) {
        issues.push(Issue::new(
            IssueCode::InvalidRuntimeVersion,
            "runtime_version",
            format!(
                "runtime version `{}` is older than {MIN_RUNTIME_VERSION}, the oldest toolchain generated projects build on",
                spec.runtime_version
            ),
        ));
    }

    let mut seen: HashSet<String> = HashSet::new();
    for (i, dependency) in spec.dependencies.iter().enumerate() {
        let loc = format!("dependencies[{i}]");
        match parse_dependency(dependency) {
            Some((name, _)) => {
                if !seen.insert(name.replace('_', "-")) {
                    issues.push(Issue::new(
                        IssueCode::DuplicateDependency,
                        loc,
                        format!("dependency `{name}` declared more than once"),
                    ));
                }
            }
            None => issues.push(Issue::new(
                IssueCode::InvalidDependency,
                loc,
                format!("dependency `{dependency}` must be `name` or `name@version`"),
            )),
        }
    }
}

/// Splits a dependency identifier into crate name and optional version
/// requirement. Returns `None` for malformed identifiers.
///
/// # Examples
///
/// ```
/// use cliforge_core::parse_dependency;
///
/// assert_eq!(parse_dependency("serde"), Some(("serde", None)));
/// assert_eq!(parse_dependency("serde@1.0"), Some(("serde", Some("1.0"))));
/// assert_eq!(parse_dependency("bad name"), None);
/// ```
pub fn parse_dependency(raw: &str) -> Option<(&str, Option<&str>)> {
    let (name, req) = match raw.split_once('@') {
        Some((name, req)) => (name, Some(req)),
        None => (raw, None),
    };
    if !DEPENDENCY_NAME_RE.is_match(name) {
        return None;
    }
    match req {
        Some(req) if !VERSION_REQ_RE.is_match(req) || req.trim().is_empty() => None,
        _ => Some((name, req)),
    }
}

/// Symbols and short letters claimed in one command scope.
#[derive(Debug, Default, Clone)]
struct ScopeNames<'a> {
    /// option long name → symbol
    options: HashMap<&'a str, String>,
    /// symbol → original name
    symbols: HashMap<String, String>,
    shorts: HashMap<char, String>,
}

impl<'a> ScopeNames<'a> {
    fn claim_option(&mut self, option: &'a OptionSpec) {
        let symbol = symbol_name(&option.name);
        self.options.entry(&option.name).or_insert_with(|| symbol.clone());
        self.symbols
            .entry(symbol)
            .or_insert_with(|| option.name.clone());
        if let Some(c) = option.short_char() {
            self.shorts.entry(c).or_insert_with(|| option.name.clone());
        }
    }
}

/// Checks the global option set on its own and returns the names it claims
/// for every command scope.
fn check_global_options<'a>(options: &'a [OptionSpec], issues: &mut Vec<Issue>) -> ScopeNames<'a> {
    let mut scope = ScopeNames::default();
    for (j, option) in options.iter().enumerate() {
        let loc = format!("global_options[{j}]");
        if option.required {
            issues.push(Issue::new(
                IssueCode::RequiredGlobalOption,
                format!("{loc}.required"),
                format!("global option `{}` cannot be required", option.name),
            ));
        }
        check_option_in_scope(option, &loc, &mut scope, issues);
    }
    scope
}

fn check_command(
    command: &CommandSpec,
    loc: &str,
    globals: &ScopeNames<'_>,
    issues: &mut Vec<Issue>,
) {
    if !COMMAND_NAME_RE.is_match(&command.name) {
        issues.push(Issue::new(
            IssueCode::InvalidName,
            format!("{loc}.name"),
            format!(
                "command name `{}` must be lowercase letters, digits and single underscores",
                command.name
            ),
        ));
    } else if RESERVED_COMMAND_NAMES.contains(&command.name.as_str()) {
        issues.push(Issue::new(
            IssueCode::ReservedName,
            format!("{loc}.name"),
            format!("command name `{}` is reserved", command.name),
        ));
    }

    if command.description.trim().is_empty() {
        issues.push(Issue::new(
            IssueCode::EmptyDescription,
            format!("{loc}.description"),
            format!("command `{}` has an empty description", command.name),
        ));
    } else {
        check_rendered_text(
            &command.description,
            &format!("{loc}.description"),
            &format!("description of `{}`", command.name),
            issues,
        );
    }

    for (k, example) in command.examples.iter().enumerate() {
        check_rendered_text(
            example,
            &format!("{loc}.examples[{k}]"),
            &format!("example {k} of `{}`", command.name),
            issues,
        );
    }

    let mut scope = globals.clone();
    for (j, option) in command.options.iter().enumerate() {
        check_option_in_scope(option, &format!("{loc}.options[{j}]"), &mut scope, issues);
    }

    let mut seen_args: HashSet<&str> = HashSet::new();
    let mut optional_seen = false;
    for (j, arg) in command.arguments.iter().enumerate() {
        let arg_loc = format!("{loc}.arguments[{j}]");
        let duplicate = !seen_args.insert(arg.name.as_str());
        if duplicate {
            issues.push(Issue::new(
                IssueCode::DuplicateArgument,
                arg_loc.clone(),
                format!("duplicate argument `{}`", arg.name),
            ));
        }
        check_argument(arg, &arg_loc, !duplicate, &mut scope, issues);

        if arg.required && optional_seen {
            issues.push(Issue::new(
                IssueCode::OptionalArgumentOrder,
                format!("{arg_loc}.required"),
                format!(
                    "required argument `{}` follows an optional argument",
                    arg.name
                ),
            ));
        }
        optional_seen |= !arg.required;
    }
}

/// Checks one positional. `claim` is false for a duplicate, whose name is
/// already in the scope.
fn check_argument(
    arg: &ArgumentSpec,
    loc: &str,
    claim: bool,
    scope: &mut ScopeNames<'_>,
    issues: &mut Vec<Issue>,
) {
    if !ARGUMENT_NAME_RE.is_match(&arg.name) {
        issues.push(Issue::new(
            IssueCode::InvalidName,
            format!("{loc}.name"),
            format!("argument name `{}` is not a lowercase identifier", arg.name),
        ));
    } else if claim {
        let symbol = symbol_name(&arg.name);
        if RESERVED_LONG_NAMES.iter().any(|r| symbol_name(r) == symbol) {
            issues.push(Issue::new(
                IssueCode::ReservedName,
                format!("{loc}.name"),
                format!("argument name `{}` is reserved", arg.name),
            ));
        } else if let Some(other) = scope.symbols.get(&symbol) {
            issues.push(Issue::new(
                IssueCode::SymbolCollision,
                format!("{loc}.name"),
                format!("argument `{}` maps to the same field as `{other}`", arg.name),
            ));
        } else {
            scope.symbols.insert(symbol, arg.name.clone());
        }
    }

    if !arg.kind.is_positional() {
        issues.push(Issue::new(
            IssueCode::UnsupportedArgumentKind,
            format!("{loc}.type"),
            format!(
                "argument `{}` cannot be of kind {}; use an option",
                arg.name, arg.kind
            ),
        ));
    }

    check_help_text(&arg.help, &format!("{loc}.help"), &arg.name, issues);
}

/// Checks one option's own shape, then its names against the scope.
fn check_option_in_scope<'a>(
    option: &'a OptionSpec,
    loc: &str,
    scope: &mut ScopeNames<'a>,
    issues: &mut Vec<Issue>,
) {
    let name_ok = OPTION_NAME_RE.is_match(&option.name);
    if !name_ok {
        issues.push(Issue::new(
            IssueCode::InvalidName,
            format!("{loc}.name"),
            format!(
                "option name `{}` must be lowercase words joined by single hyphens, without leading dashes",
                option.name
            ),
        ));
    }

    let short = match option.short.as_deref() {
        None => None,
        Some(_) => match option.short_char().filter(char::is_ascii_alphanumeric) {
            Some(c) => Some(c),
            None => {
                issues.push(Issue::new(
                    IssueCode::InvalidShortFlag,
                    format!("{loc}.short"),
                    format!(
                        "short name `{}` must be a single letter or digit without dash",
                        option.short.as_deref().unwrap_or_default()
                    ),
                ));
                None
            }
        },
    };

    check_option_shape(option, loc, issues);

    let reserved_long = name_ok && RESERVED_LONG_NAMES.contains(&option.name.as_str());
    let reserved_short = short.is_some_and(|c| RESERVED_SHORT_NAMES.contains(&c));
    if reserved_long || reserved_short {
        issues.push(Issue::new(
            IssueCode::ReservedName,
            loc.to_string(),
            format!(
                "option `{}` uses a name or short flag reserved for built-in flags",
                option.name
            ),
        ));
        return;
    }

    if name_ok {
        let symbol = symbol_name(&option.name);
        if scope.options.contains_key(option.name.as_str()) {
            issues.push(Issue::new(
                IssueCode::DuplicateOption,
                format!("{loc}.name"),
                format!("duplicate option `--{}`", option.name),
            ));
            return;
        }
        if let Some(other) = scope.symbols.get(&symbol) {
            issues.push(Issue::new(
                IssueCode::SymbolCollision,
                format!("{loc}.name"),
                format!("option `--{}` maps to the same field as `{other}`", option.name),
            ));
            return;
        }
    }

    if let Some(c) = short {
        if let Some(other) = scope.shorts.get(&c) {
            issues.push(Issue::new(
                IssueCode::ShortFlagCollision,
                format!("{loc}.short"),
                format!(
                    "short flag `-{c}` of `--{}` is already used by `--{other}`",
                    option.name
                ),
            ));
            if name_ok {
                let symbol = symbol_name(&option.name);
                scope.options.insert(&option.name, symbol.clone());
                scope.symbols.insert(symbol, option.name.clone());
            }
            return;
        }
    }

    if name_ok {
        scope.claim_option(option);
    } else if let Some(c) = short {
        scope.shorts.insert(c, option.name.clone());
    }
}

/// Kind/default/choices agreement and help text.
fn check_option_shape(option: &OptionSpec, loc: &str, issues: &mut Vec<Issue>) {
    match (&option.kind, &option.choices) {
        (ValueKind::Choice, None) => issues.push(Issue::new(
            IssueCode::ChoicesMismatch,
            format!("{loc}.choices"),
            format!("choice option `--{}` declares no choices", option.name),
        )),
        (ValueKind::Choice, Some(choices)) if choices.is_empty() => issues.push(Issue::new(
            IssueCode::EmptyChoices,
            format!("{loc}.choices"),
            format!("choice option `--{}` has an empty choice set", option.name),
        )),
        (kind, Some(_)) if *kind != ValueKind::Choice => issues.push(Issue::new(
            IssueCode::ChoicesMismatch,
            format!("{loc}.choices"),
            format!(
                "option `--{}` of kind {kind} must not declare choices",
                option.name
            ),
        )),
        _ => {}
    }

    if option.required && option.kind == ValueKind::Boolean {
        issues.push(Issue::new(
            IssueCode::RequiredFlag,
            format!("{loc}.required"),
            format!("boolean flag `--{}` cannot be required", option.name),
        ));
    }

    if let Some(default) = &option.default {
        if option.required {
            issues.push(Issue::new(
                IssueCode::RequiredWithDefault,
                format!("{loc}.default"),
                format!("required option `--{}` must not declare a default", option.name),
            ));
        } else if !option.kind.accepts(default)
            || *default == DefaultValue::Boolean(true)
            || (option.kind == ValueKind::Path && default.as_text() == Some(""))
        {
            issues.push(Issue::new(
                IssueCode::DefaultKindMismatch,
                format!("{loc}.default"),
                format!(
                    "default of `--{}` is {}, expected a value of kind {}{}",
                    option.name,
                    default.shape(),
                    option.kind,
                    match option.kind {
                        ValueKind::Boolean => " (flags default to false)",
                        ValueKind::Path => " (paths cannot be empty)",
                        _ => "",
                    }
                ),
            ));
        } else if let (ValueKind::Choice, Some(choices), Some(value)) =
            (option.kind, &option.choices, default.as_text())
        {
            if !choices.is_empty() && !choices.iter().any(|c| c == value) {
                issues.push(Issue::new(
                    IssueCode::DefaultNotInChoices,
                    format!("{loc}.default"),
                    format!(
                        "default `{value}` of `--{}` is not one of its choices",
                        option.name
                    ),
                ));
            }
        }
    }

    check_help_text(&option.help, &format!("{loc}.help"), &option.name, issues);
}

fn check_help_text(help: &str, loc: &str, owner: &str, issues: &mut Vec<Issue>) {
    if help.trim().is_empty() {
        issues.push(Issue::new(
            IssueCode::EmptyHelp,
            loc.to_string(),
            format!("`{owner}` has no help text"),
        ));
    } else if help.contains(['\n', '\r']) {
        issues.push(Issue::new(
            IssueCode::MultilineHelp,
            loc.to_string(),
            format!("help text of `{owner}` must be a single line"),
        ));
    } else {
        check_rendered_text(help, loc, &format!("help text of `{owner}`"), issues);
    }
}

/// Reports text that clap would print differently from how it is written:
/// surrounding whitespace is trimmed and `{n}` becomes a line break.
fn check_rendered_text(text: &str, loc: &str, what: &str, issues: &mut Vec<Issue>) {
    if text.trim() != text || text.contains(CLAP_LINE_BREAK) {
        issues.push(Issue::new(
            IssueCode::UnrenderableText,
            loc.to_string(),
            format!(
                "{what} must not have surrounding whitespace or contain `{CLAP_LINE_BREAK}`"
            ),
        ));
    }
}

/// Compares dotted numeric versions; missing components count as zero.
fn version_at_least(version: &str, minimum: &str) -> bool {
    let parts = |v: &str| -> Vec<u64> {
        let mut parts: Vec<u64> = v.split('.').map(|p| p.parse().unwrap_or(u64::MAX)).collect();
        parts.resize(3, 0);
        parts
    };
    parts(version) >= parts(minimum)
}
