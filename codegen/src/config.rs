//! Generator configuration.
//!
//! Defines the YAML-serializable configuration that controls which waivable
//! issues are let through, extra deny-list markers, and rendering
//! parallelism. Every section is optional.
//!
//! # Example YAML
//!
//! ```yaml
//! version: "1"
//! waive:
//!   - empty_help
//! safety:
//!   extra_markers:
//!     - construct: dynamic_evaluation
//!       words: [run, script]
//!     - construct: embedded_credential
//!       pattern: "corp-[0-9a-f]{32}"
//! generation:
//!   jobs: 4
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use cliforge_core::safety::{DenyList, MarkerSpec};
use cliforge_core::{IssueCode, Severity};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current configuration format version.
pub const CONFIG_VERSION: &str = "1";

/// Additions to the forbidden-construct deny-list.
///
/// Built-in entries cannot be removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// Markers appended to the built-in enumeration.
    #[serde(default)]
    pub extra_markers: Vec<MarkerSpec>,
}

/// Settings controlling how artifacts are rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Worker threads for per-command rendering (`None` = rayon default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,
}

/// Top-level generator configuration.
///
/// # Examples
///
/// ```
/// use cliforge_codegen::GeneratorConfig;
/// use cliforge_core::IssueCode;
///
/// let config: GeneratorConfig = serde_yaml::from_str("waive: [empty_help]").unwrap();
/// assert!(config.is_waived(IssueCode::EmptyHelp));
/// assert!(!config.is_waived(IssueCode::EmptyDescription));
/// assert_eq!(config.generation.jobs, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Configuration format version (e.g., `"1"`).
    #[serde(default = "default_version")]
    pub version: String,
    /// Waivable issue codes to let through.
    #[serde(default)]
    pub waive: Vec<IssueCode>,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            waive: Vec::new(),
            safety: SafetyConfig::default(),
            generation: GenerationConfig::default(),
        }
    }
}

impl GeneratorConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::Error::IoError) if the file cannot be read,
    /// [`YamlError`](crate::Error::YamlError) if parsing fails, or
    /// [`InvalidConfig`](crate::Error::InvalidConfig) if the content is not
    /// usable.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.check()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::Error::IoError) if the file cannot be
    /// written, or [`YamlError`](crate::Error::YamlError) if serialization
    /// fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Rejects settings that can never take effect.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](crate::Error::InvalidConfig) for an unknown
    /// version, a zero job count, a waiver of a non-waivable code, or a
    /// deny-list marker that does not compile.
    pub fn check(&self) -> Result<()> {
        if self.version != CONFIG_VERSION {
            return Err(Error::InvalidConfig(format!(
                "unsupported configuration version `{}` (expected `{CONFIG_VERSION}`)",
                self.version
            )));
        }
        if self.generation.jobs == Some(0) {
            return Err(Error::InvalidConfig(
                "generation.jobs must be at least 1".to_string(),
            ));
        }
        if let Some(code) = self
            .waive
            .iter()
            .find(|c| c.severity() == Severity::NonWaivable)
        {
            return Err(Error::InvalidConfig(format!(
                "issue code `{code}` cannot be waived"
            )));
        }
        self.deny_list().map(|_| ())
    }

    /// Returns `true` if `code` is waived. Non-waivable codes are never
    /// waived, whatever the list says.
    pub fn is_waived(&self, code: IssueCode) -> bool {
        code.severity() == Severity::Waivable && self.waive.contains(&code)
    }

    /// Waived codes that can actually take effect.
    pub fn effective_waivers(&self) -> Vec<IssueCode> {
        self.waive
            .iter()
            .copied()
            .filter(|c| self.is_waived(*c))
            .collect()
    }

    /// Builds the deny-list: the built-in enumeration plus configured markers.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidConfig`](crate::Error::InvalidConfig) if a configured
    /// pattern does not compile.
    pub fn deny_list(&self) -> Result<DenyList> {
        let mut deny = DenyList::builtin();
        for (i, marker) in self.safety.extra_markers.iter().enumerate() {
            deny.extend_with(marker).map_err(|err| {
                Error::InvalidConfig(format!("safety.extra_markers[{i}]: {err}"))
            })?;
        }
        Ok(deny)
    }
}

#[cfg(test)]
mod tests {
    use cliforge_core::safety::ForbiddenConstruct;

    use super::*;

    fn sample_yaml() -> &'static str {
        r#"
version: "1"
waive:
  - empty_help
  - empty_description
safety:
  extra_markers:
    - construct: dynamic_evaluation
      words: [run, script]
    - construct: embedded_credential
      pattern: "corp-[0-9a-f]{8}"
generation:
  jobs: 2
"#
    }

    #[test]
    fn test_deserialize_complete() {
        let config: GeneratorConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        assert_eq!(config.version, "1");
        assert_eq!(
            config.waive,
            vec![IssueCode::EmptyHelp, IssueCode::EmptyDescription]
        );
        assert_eq!(config.safety.extra_markers.len(), 2);
        assert_eq!(config.generation.jobs, Some(2));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_deserialize_empty_document() {
        let config: GeneratorConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, GeneratorConfig::default());
    }

    #[test]
    fn test_extra_markers_extend_builtin() {
        let config: GeneratorConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        let deny = config.deny_list().unwrap();
        assert_eq!(deny.len(), DenyList::builtin().len() + 2);
        assert_eq!(
            deny.scan_text("Run script files"),
            vec![ForbiddenConstruct::DynamicEvaluation]
        );
        assert_eq!(
            deny.scan_text("uses corp-deadbeef"),
            vec![ForbiddenConstruct::EmbeddedCredential]
        );
    }

    #[test]
    fn test_safety_codes_cannot_be_waived() {
        let config: GeneratorConfig =
            serde_yaml::from_str("waive: [privilege_escalation]").unwrap();
        assert!(!config.is_waived(IssueCode::PrivilegeEscalation));
        assert!(config.effective_waivers().is_empty());
        assert!(matches!(config.check(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_bad_pattern_is_invalid_config() {
        let yaml = r#"
safety:
  extra_markers:
    - construct: embedded_credential
      pattern: "(unclosed"
"#;
        let config: GeneratorConfig = serde_yaml::from_str(yaml).unwrap();
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("safety.extra_markers[0]"));
    }

    #[test]
    fn test_zero_jobs_rejected() {
        let config: GeneratorConfig = serde_yaml::from_str("generation: {jobs: 0}").unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cliforge.yml");
        let config: GeneratorConfig = serde_yaml::from_str(sample_yaml()).unwrap();
        config.save(&path).unwrap();
        assert_eq!(GeneratorConfig::load(&path).unwrap(), config);
    }
}
