//! Structured findings shared by every stage of the pipeline.
//!
//! An [`Issue`] is data, not control flow: validators return the full list
//! so a human or an upstream author can fix everything in one pass.

use serde::{Deserialize, Serialize};

/// Which stage produced an issue, and therefore who has to act on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Uniqueness or shape violation in the specification.
    SpecStructural,
    /// Forbidden construct requested by the specification.
    SpecSafety,
    /// Template or rendering failure inside a generator.
    GenerationInternal,
    /// Emitted artifact failed the well-formedness check.
    OutputWellFormedness,
}

impl IssueKind {
    /// Returns `true` for kinds that indicate a defect in the generator
    /// rather than in its input.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::GenerationInternal | Self::OutputWellFormedness)
    }
}

/// Whether configuration may let an issue through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Blocks the pipeline unless explicitly waived.
    Waivable,
    /// Always blocks the pipeline.
    NonWaivable,
}

/// Machine-readable issue code.
///
/// The code fixes both the [`IssueKind`] and the [`Severity`] of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // Structural
    InvalidName,
    EmptyDescription,
    EmptyHelp,
    NoCommands,
    DuplicateCommand,
    DuplicateArgument,
    DuplicateOption,
    ShortFlagCollision,
    SymbolCollision,
    ReservedName,
    InvalidShortFlag,
    DefaultKindMismatch,
    ChoicesMismatch,
    EmptyChoices,
    DefaultNotInChoices,
    RequiredWithDefault,
    RequiredFlag,
    UnsupportedArgumentKind,
    OptionalArgumentOrder,
    RequiredGlobalOption,
    MultilineHelp,
    UnrenderableText,
    InvalidRuntimeVersion,
    InvalidDependency,
    DuplicateDependency,
    // Safety
    DynamicEvaluation,
    EmbeddedCredential,
    UnconfirmedDestructive,
    PrivilegeEscalation,
    // Generation
    TemplateRender,
    // Output
    SyntaxError,
    ManifestError,
    UnresolvedModule,
    UnresolvedImport,
    OrphanModule,
}

impl IssueCode {
    /// Stage that produces this code.
    pub fn kind(&self) -> IssueKind {
        match self {
            Self::DynamicEvaluation
            | Self::EmbeddedCredential
            | Self::UnconfirmedDestructive
            | Self::PrivilegeEscalation => IssueKind::SpecSafety,
            Self::TemplateRender => IssueKind::GenerationInternal,
            Self::SyntaxError
            | Self::ManifestError
            | Self::UnresolvedModule
            | Self::UnresolvedImport
            | Self::OrphanModule => IssueKind::OutputWellFormedness,
            _ => IssueKind::SpecStructural,
        }
    }

    /// Severity of this code. Only cosmetic structural problems are
    /// waivable.
    pub fn severity(&self) -> Severity {
        match self {
            Self::EmptyDescription | Self::EmptyHelp => Severity::Waivable,
            _ => Severity::NonWaivable,
        }
    }

    /// Snake-case code string, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidName => "invalid_name",
            Self::EmptyDescription => "empty_description",
            Self::EmptyHelp => "empty_help",
            Self::NoCommands => "no_commands",
            Self::DuplicateCommand => "duplicate_command",
            Self::DuplicateArgument => "duplicate_argument",
            Self::DuplicateOption => "duplicate_option",
            Self::ShortFlagCollision => "short_flag_collision",
            Self::SymbolCollision => "symbol_collision",
            Self::ReservedName => "reserved_name",
            Self::InvalidShortFlag => "invalid_short_flag",
            Self::DefaultKindMismatch => "default_kind_mismatch",
            Self::ChoicesMismatch => "choices_mismatch",
            Self::EmptyChoices => "empty_choices",
            Self::DefaultNotInChoices => "default_not_in_choices",
            Self::RequiredWithDefault => "required_with_default",
            Self::RequiredFlag => "required_flag",
            Self::UnsupportedArgumentKind => "unsupported_argument_kind",
            Self::OptionalArgumentOrder => "optional_argument_order",
            Self::RequiredGlobalOption => "required_global_option",
            Self::MultilineHelp => "multiline_help",
            Self::UnrenderableText => "unrenderable_text",
            Self::InvalidRuntimeVersion => "invalid_runtime_version",
            Self::InvalidDependency => "invalid_dependency",
            Self::DuplicateDependency => "duplicate_dependency",
            Self::DynamicEvaluation => "dynamic_evaluation",
            Self::EmbeddedCredential => "embedded_credential",
            Self::UnconfirmedDestructive => "unconfirmed_destructive",
            Self::PrivilegeEscalation => "privilege_escalation",
            Self::TemplateRender => "template_render",
            Self::SyntaxError => "syntax_error",
            Self::ManifestError => "manifest_error",
            Self::UnresolvedModule => "unresolved_module",
            Self::UnresolvedImport => "unresolved_import",
            Self::OrphanModule => "orphan_module",
        }
    }
}

impl std::fmt::Display for IssueCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One validation finding.
///
/// # Examples
///
/// ```
/// use cliforge_core::{Issue, IssueCode, IssueKind, Severity};
///
/// let issue = Issue::new(IssueCode::DuplicateCommand, "commands[1]", "duplicate command `run`");
/// assert_eq!(issue.kind, IssueKind::SpecStructural);
/// assert_eq!(issue.severity, Severity::NonWaivable);
/// assert_eq!(issue.to_string(), "commands[1]: duplicate command `run` [duplicate_command]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub code: IssueCode,
    pub severity: Severity,
    /// Where the problem is (e.g. `commands[0].options[2]` or an artifact path)
    pub location: String,
    pub message: String,
}

impl Issue {
    /// Creates an issue whose kind and severity follow from `code`.
    pub fn new(code: IssueCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            code,
            severity: code.severity(),
            location: location.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this issue stops the pipeline given the waived
    /// codes. Non-waivable issues ignore `waived` entirely.
    ///
    /// # Examples
    ///
    /// ```
    /// use cliforge_core::{Issue, IssueCode};
    ///
    /// let cosmetic = Issue::new(IssueCode::EmptyHelp, "commands[0].options[0]", "empty help");
    /// assert!(cosmetic.is_blocking(&[]));
    /// assert!(!cosmetic.is_blocking(&[IssueCode::EmptyHelp]));
    ///
    /// let unsafe_issue = Issue::new(IssueCode::PrivilegeEscalation, "commands[0]", "forbidden");
    /// assert!(unsafe_issue.is_blocking(&[IssueCode::PrivilegeEscalation]));
    /// ```
    pub fn is_blocking(&self, waived: &[IssueCode]) -> bool {
        match self.severity {
            Severity::NonWaivable => true,
            Severity::Waivable => !waived.contains(&self.code),
        }
    }
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} [{}]", self.location, self.message, self.code)
    }
}

/// Returns `true` if any issue is non-waivable.
pub fn has_non_waivable(issues: &[Issue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::NonWaivable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_codes_are_never_waivable() {
        for code in [
            IssueCode::DynamicEvaluation,
            IssueCode::EmbeddedCredential,
            IssueCode::UnconfirmedDestructive,
            IssueCode::PrivilegeEscalation,
        ] {
            assert_eq!(code.kind(), IssueKind::SpecSafety);
            assert_eq!(code.severity(), Severity::NonWaivable);
        }
    }

    #[test]
    fn test_code_serializes_as_snake_case() {
        let json = serde_json::to_string(&IssueCode::ShortFlagCollision).unwrap();
        assert_eq!(json, "\"short_flag_collision\"");
        assert_eq!(IssueCode::ShortFlagCollision.as_str(), "short_flag_collision");
    }

    #[test]
    fn test_internal_kinds() {
        assert!(IssueCode::TemplateRender.kind().is_internal());
        assert!(IssueCode::SyntaxError.kind().is_internal());
        assert!(!IssueCode::InvalidName.kind().is_internal());
    }
}
