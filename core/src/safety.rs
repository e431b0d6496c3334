//! Forbidden-construct policy.
//!
//! The deny-list is an explicit enumeration: each entry names one
//! [`ForbiddenConstruct`] and one marker, either a word sequence matched
//! against tokenized text or a credential-shaped pattern matched against raw
//! text. Configuration may add entries; nothing can remove or waive them.
//!
//! # Examples
//!
//! ```
//! use cliforge_core::safety::{DenyList, ForbiddenConstruct};
//!
//! let deny = DenyList::builtin();
//! assert_eq!(
//!     deny.scan_text("Run the installer with sudo"),
//!     vec![ForbiddenConstruct::PrivilegeEscalation]
//! );
//! assert!(deny.scan_text("Resize an image").is_empty());
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{CommandSpec, IssueCode, Specification, ValueKind};

/// Category of operationally dangerous request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForbiddenConstruct {
    /// Evaluating code supplied at runtime.
    DynamicEvaluation,
    /// Secrets embedded in the program text.
    EmbeddedCredential,
    /// Destructive operation without an explicit confirmation option.
    UnconfirmedDestructive,
    /// Running with elevated privileges.
    PrivilegeEscalation,
}

impl ForbiddenConstruct {
    /// Issue code reported for this construct.
    pub fn code(&self) -> IssueCode {
        match self {
            Self::DynamicEvaluation => IssueCode::DynamicEvaluation,
            Self::EmbeddedCredential => IssueCode::EmbeddedCredential,
            Self::UnconfirmedDestructive => IssueCode::UnconfirmedDestructive,
            Self::PrivilegeEscalation => IssueCode::PrivilegeEscalation,
        }
    }

    /// Human-readable category name.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DynamicEvaluation => "dynamic code evaluation",
            Self::EmbeddedCredential => "embedded credential",
            Self::UnconfirmedDestructive => "unconfirmed destructive operation",
            Self::PrivilegeEscalation => "privilege escalation",
        }
    }
}

/// How an entry recognizes its construct.
#[derive(Debug, Clone)]
pub enum Marker {
    /// Contiguous lowercase word sequence.
    Words(Vec<String>),
    /// Pattern over the raw text.
    Pattern(Regex),
}

impl Marker {
    fn matches(&self, raw: &str, words: &[String]) -> bool {
        match self {
            Self::Words(seq) => {
                !seq.is_empty() && words.windows(seq.len()).any(|w| w == seq.as_slice())
            }
            Self::Pattern(re) => re.is_match(raw),
        }
    }
}

/// One deny-list entry.
#[derive(Debug, Clone)]
pub struct DenyEntry {
    pub construct: ForbiddenConstruct,
    pub marker: Marker,
}

/// Serializable form of an additional deny-list entry.
///
/// Exactly one of `words` or `pattern` is expected; an entry with both
/// contributes both markers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSpec {
    pub construct: ForbiddenConstruct,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

const EVAL_WORDS: &[&[&str]] = &[
    &["eval"],
    &["exec"],
    &["evaluate", "arbitrary"],
    &["execute", "arbitrary"],
    &["run", "arbitrary"],
    &["arbitrary", "code"],
    &["dynamic", "code"],
];

const PRIVILEGE_WORDS: &[&[&str]] = &[
    &["sudo"],
    &["doas"],
    &["pkexec"],
    &["su"],
    &["runas"],
    &["setuid"],
    &["as", "root"],
    &["root", "privileges"],
    &["root", "access"],
    &["escalate", "privileges"],
    &["privilege", "escalation"],
    &["elevated", "privileges"],
];

const DESTRUCTIVE_WORDS: &[&[&str]] = &[
    &["delete"],
    &["remove"],
    &["rm"],
    &["erase"],
    &["wipe"],
    &["purge"],
    &["destroy"],
    &["drop"],
    &["truncate"],
    &["shred"],
    &["overwrite"],
];

const CREDENTIAL_PATTERNS: &[&str] = &[
    r#"(?i)\b(password|passwd|pwd|secret|token|api[_-]?key|access[_-]?key)\s*[:=]\s*["']?[^\s"']{4,}"#,
    r"\bAKIA[0-9A-Z]{16}\b",
    r"\bgh[pousr]_[A-Za-z0-9]{36,}\b",
    r"\bsk-[A-Za-z0-9_-]{20,}\b",
    r"\bxox[abprs]-[A-Za-z0-9-]{10,}\b",
    r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
];

/// Option names that count as an explicit confirmation requirement.
pub const CONFIRMATION_OPTIONS: &[&str] = &["yes", "confirm"];

const CREDENTIAL_NAME_WORDS: &[&[&str]] = &[
    &["password"],
    &["passwd"],
    &["secret"],
    &["token"],
    &["apikey"],
    &["api", "key"],
    &["access", "key"],
    &["private", "key"],
];

/// Scope an option was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionScope {
    Global,
    Local,
}

/// The confirmation option guarding a destructive command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub scope: OptionScope,
    /// Long name of the option (e.g. "yes")
    pub option: String,
}

/// The forbidden-construct deny-list.
#[derive(Debug, Clone)]
pub struct DenyList {
    entries: Vec<DenyEntry>,
}

impl Default for DenyList {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DenyList {
    /// The built-in enumeration.
    pub fn builtin() -> Self {
        let mut deny = Self {
            entries: Vec::new(),
        };
        for seq in EVAL_WORDS {
            deny.add_words(ForbiddenConstruct::DynamicEvaluation, seq);
        }
        for seq in PRIVILEGE_WORDS {
            deny.add_words(ForbiddenConstruct::PrivilegeEscalation, seq);
        }
        for seq in DESTRUCTIVE_WORDS {
            deny.add_words(ForbiddenConstruct::UnconfirmedDestructive, seq);
        }
        for pattern in CREDENTIAL_PATTERNS {
            let re = Regex::new(pattern).expect("static regex must compile");
            deny.entries.push(DenyEntry {
                construct: ForbiddenConstruct::EmbeddedCredential,
                marker: Marker::Pattern(re),
            });
        }
        deny
    }

    /// Adds a word-sequence marker. Words are lowercased.
    pub fn add_words(&mut self, construct: ForbiddenConstruct, words: &[&str]) {
        let seq: Vec<String> = words.iter().flat_map(|w| tokenize(w)).collect();
        if seq.is_empty() {
            return;
        }
        self.entries.push(DenyEntry {
            construct,
            marker: Marker::Words(seq),
        });
    }

    /// Adds a raw-text pattern marker.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn add_pattern(
        &mut self,
        construct: ForbiddenConstruct,
        pattern: &str,
    ) -> Result<(), regex::Error> {
        let re = Regex::new(pattern)?;
        self.entries.push(DenyEntry {
            construct,
            marker: Marker::Pattern(re),
        });
        Ok(())
    }

    /// Adds a configured entry.
    ///
    /// # Errors
    ///
    /// Returns the regex error if the entry's pattern does not compile.
    pub fn extend_with(&mut self, spec: &MarkerSpec) -> Result<(), regex::Error> {
        if let Some(words) = &spec.words {
            let words: Vec<&str> = words.iter().map(String::as_str).collect();
            self.add_words(spec.construct, &words);
        }
        if let Some(pattern) = &spec.pattern {
            self.add_pattern(spec.construct, pattern)?;
        }
        Ok(())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the constructs whose markers occur in `text`, in enumeration
    /// order and without duplicates.
    ///
    /// Destructive markers are excluded here because they only matter in
    /// combination with a command's confirmation options; see
    /// [`is_destructive`](Self::is_destructive).
    pub fn scan_text(&self, text: &str) -> Vec<ForbiddenConstruct> {
        let words = tokenize(text);
        let mut found: Vec<ForbiddenConstruct> = self
            .entries
            .iter()
            .filter(|e| e.construct != ForbiddenConstruct::UnconfirmedDestructive)
            .filter(|e| e.marker.matches(text, &words))
            .map(|e| e.construct)
            .collect();
        found.sort();
        found.dedup();
        found
    }

    /// Returns `true` if the command's name or description carries a
    /// destructive marker.
    pub fn is_destructive(&self, command: &CommandSpec) -> bool {
        [command.name.as_str(), command.description.as_str()]
            .iter()
            .any(|text| {
                let words = tokenize(text);
                self.entries
                    .iter()
                    .filter(|e| e.construct == ForbiddenConstruct::UnconfirmedDestructive)
                    .any(|e| e.marker.matches(text, &words))
            })
    }
}

/// Finds the option that confirms a destructive command, preferring local
/// options over global ones.
///
/// # Examples
///
/// ```
/// use cliforge_core::*;
/// use cliforge_core::safety::{confirmation_for, OptionScope};
///
/// let spec = Specification::new("vault", "Manage secrets")
///     .with_global_option(OptionSpec::flag("yes"))
///     .with_command(CommandSpec::new("purge", "Purge the vault"));
/// let found = confirmation_for(&spec, &spec.commands[0]).unwrap();
/// assert_eq!(found.scope, OptionScope::Global);
/// assert_eq!(found.option, "yes");
/// ```
pub fn confirmation_for(spec: &Specification, command: &CommandSpec) -> Option<Confirmation> {
    let is_confirmation = |name: &str, kind: ValueKind| {
        kind == ValueKind::Boolean && CONFIRMATION_OPTIONS.contains(&name)
    };
    if let Some(opt) = command
        .options
        .iter()
        .find(|o| is_confirmation(&o.name, o.kind))
    {
        return Some(Confirmation {
            scope: OptionScope::Local,
            option: opt.name.clone(),
        });
    }
    spec.global_options
        .iter()
        .find(|o| is_confirmation(&o.name, o.kind))
        .map(|opt| Confirmation {
            scope: OptionScope::Global,
            option: opt.name.clone(),
        })
}

/// Returns `true` if an option name denotes a secret (`api-key`, `token`).
pub fn is_credential_name(name: &str) -> bool {
    let words = tokenize(name);
    CREDENTIAL_NAME_WORDS.iter().any(|seq| {
        let seq: Vec<String> = seq.iter().map(|s| s.to_string()).collect();
        words.windows(seq.len()).any(|w| w == seq.as_slice())
    })
}

/// Splits text into lowercase alphanumeric words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
