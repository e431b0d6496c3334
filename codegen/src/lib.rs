//! Generation of clap-based CLI projects from a [`Specification`].
//!
//! The crate turns a validated specification into a Rust source tree and a
//! matching test suite, then checks that the tree is well formed:
//!
//! - [`CodeGenerator`]: renders `Cargo.toml`, the entry point, one module
//!   per command and shared utilities.
//! - [`TestGenerator`]: renders `assert_cmd` tests whose expectations come
//!   from the same [`help`] formatting the program uses.
//! - [`check`]: parses every artifact and resolves modules and imports.
//! - [`Pipeline`]: runs the steps above in order and stops at the first
//!   failure, reporting issues as data.
//!
//! Templates live in an immutable [`TemplateRegistry`] that is built once
//! and shared between generators.
//!
//! [`Specification`]: cliforge_core::Specification
//!
//! # Example
//!
//! ```
//! use cliforge_codegen::{GenerationMetadata, GeneratorConfig, Pipeline, check};
//! use cliforge_core::*;
//!
//! let spec = Specification::new("img-convert", "Convert images between formats").with_command(
//!     CommandSpec::new("resize", "Resize an image")
//!         .with_arg(ArgumentSpec::required("input", ValueKind::Path).with_help("Source image"))
//!         .with_option(
//!             OptionSpec::new("output", ValueKind::Path)
//!                 .with_short('o')
//!                 .with_help("Destination file"),
//!         ),
//! );
//!
//! let pipeline = Pipeline::new(&GeneratorConfig::default()).unwrap();
//! let report = pipeline.run(&spec, &GenerationMetadata::new("0.1.0", "2024-01-15T10:30:00Z"));
//! let artifacts = report.artifacts.unwrap();
//!
//! let resize = artifacts.get("src/commands/resize.rs").unwrap();
//! assert!(resize.contains(r#"long = "output", short = 'o'"#));
//! assert!(check(&artifacts).is_empty());
//! ```

mod check;
mod config;
mod error;
mod generator;
pub mod help;
mod pipeline;
mod registry;
mod testgen;
mod view;

pub use check::check;
pub use config::{CONFIG_VERSION, GenerationConfig, GeneratorConfig, SafetyConfig};
pub use error::{Error, GenerateError, Result};
pub use generator::{CodeGenerator, GenerationMetadata, RenderPool};
pub use pipeline::{ArtifactSink, Pipeline, PipelineReport, PipelineState};
pub use registry::{TEMPLATE_SET_VERSION, TemplateRegistry};
pub use testgen::TestGenerator;
pub use view::BUILTIN_DEPENDENCIES;
