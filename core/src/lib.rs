//! Core specification model and validation for CLI generation.
//!
//! This crate defines the foundational types for describing a command-line
//! program to generate:
//!
//! - [`Specification`]: top-level description (name, commands, global
//!   options, target runtime, dependencies).
//! - [`CommandSpec`]: a command with positional arguments, options and usage
//!   examples.
//! - [`OptionSpec`] / [`ArgumentSpec`]: named options and positionals with a
//!   closed [`ValueKind`].
//! - [`ArtifactSet`]: ordered mapping of relative path to generated source
//!   text.
//!
//! Validation ([`validate_spec`], [`Validator`]) reports structural problems
//! and forbidden constructs as a list of [`Issue`] values; it never stops at
//! the first one.
//!
//! # Example
//!
//! ```
//! use cliforge_core::*;
//!
//! let spec = Specification::new("img-convert", "Convert images between formats")
//!     .with_global_option(OptionSpec::flag("dry-run").with_short('n').with_help("Plan only"))
//!     .with_command(
//!         CommandSpec::new("convert", "Convert one image")
//!             .with_arg(ArgumentSpec::required("input", ValueKind::Path).with_help("Source image"))
//!             .with_option(
//!                 OptionSpec::new("output", ValueKind::Path)
//!                     .with_short('o')
//!                     .with_help("Destination file"),
//!             )
//!             .with_example("img-convert convert photo.png -o photo.jpeg"),
//!     );
//!
//! assert_eq!(spec.find_command("convert").unwrap().options.len(), 1);
//! assert!(validate_spec(&spec).is_empty());
//! ```

mod artifact;
mod error;
mod issue;
pub mod naming;
pub mod safety;
mod types;
mod validate;

pub use artifact::ArtifactSet;
pub use error::SpecError;
pub use issue::{Issue, IssueCode, IssueKind, Severity, has_non_waivable};
pub use types::*;
pub use validate::{
    MIN_RUNTIME_VERSION, RESERVED_COMMAND_NAMES, RESERVED_LONG_NAMES, RESERVED_SHORT_NAMES,
    Validator, parse_dependency, validate_spec,
};
