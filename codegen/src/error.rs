//! Error types for generation.
//!
//! [`Error`] covers configuration and persistence failures; [`GenerateError`]
//! covers a generator refusing its input or failing to render. Problems in a
//! specification are not errors: they are [`Issue`] values.

use cliforge_core::{Issue, IssueCode};
use thiserror::Error;

/// Errors that can occur while configuring or driving the pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Configuration is well-formed YAML but not usable (e.g. a bad pattern).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Generator refusal or rendering failure.
    #[error(transparent)]
    Generate(#[from] GenerateError),
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Why a generator produced no artifacts.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// The specification carries non-waivable issues.
    #[error("refusing to generate: specification has {} non-waivable issue(s)", .0.len())]
    Refused(Vec<Issue>),

    /// A template failed to render.
    #[error("failed to render `{artifact}` ({step}): {message}")]
    Render {
        artifact: String,
        step: String,
        message: String,
    },

    /// The built-in template set failed to compile.
    #[error("template registry: {0}")]
    Registry(String),

    /// The rendering worker pool could not be created.
    #[error("failed to create rendering thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl GenerateError {
    /// Converts the error into pipeline issues.
    ///
    /// Refusals hand back the specification issues; every other variant is
    /// a single [`IssueCode::TemplateRender`] issue located at the artifact
    /// (or `generator` when no artifact was involved).
    pub fn into_issues(self) -> Vec<Issue> {
        match self {
            Self::Refused(issues) => issues,
            Self::Render {
                artifact,
                step,
                message,
            } => vec![Issue::new(
                IssueCode::TemplateRender,
                artifact,
                format!("{step}: {message}"),
            )],
            Self::Registry(message) => {
                vec![Issue::new(IssueCode::TemplateRender, "generator", message)]
            }
            Self::ThreadPool(err) => vec![Issue::new(
                IssueCode::TemplateRender,
                "generator",
                err.to_string(),
            )],
        }
    }
}

/// Formats a tera error with its full source chain.
///
/// Tera reports the template name at the top and the actual cause (missing
/// variable, bad filter argument) in nested sources.
pub(crate) fn describe_tera_error(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
