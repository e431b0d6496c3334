//! Filesystem side of `build` and `check`.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use cliforge_codegen::{ArtifactSink, Result};
use cliforge_core::ArtifactSet;
use tracing::debug;

/// Directories never read back by `check`.
const SKIPPED_DIRS: &[&str] = &["target"];

/// Writes artifacts below a root directory.
#[derive(Debug)]
pub struct DirectorySink {
    root: PathBuf,
    overwrite: bool,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            root: root.into(),
            overwrite,
        }
    }

    fn target(&self, relative: &str) -> io::Result<PathBuf> {
        let path = Path::new(relative);
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("artifact path '{relative}' escapes the output directory"),
            ));
        }
        Ok(self.root.join(path))
    }
}

impl ArtifactSink for DirectorySink {
    /// Writes every artifact, or nothing if any target already exists and
    /// overwriting is off.
    fn persist(&mut self, artifacts: &ArtifactSet) -> Result<()> {
        let targets = artifacts
            .iter()
            .map(|(path, content)| Ok((self.target(path)?, content.as_str())))
            .collect::<io::Result<Vec<_>>>()?;

        if !self.overwrite {
            if let Some((existing, _)) = targets.iter().find(|(path, _)| path.exists()) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("'{}' already exists (use --force to overwrite)", existing.display()),
                )
                .into());
            }
        }

        for (path, content) in targets {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, content)?;
            debug!(path = %path.display(), bytes = content.len(), "wrote artifact");
        }
        Ok(())
    }
}

/// Reads every UTF-8 file below `root` into an artifact set keyed by
/// `/`-separated relative path, sorted by path. Hidden entries and `target/`
/// are skipped.
pub fn read_tree(root: &Path) -> io::Result<ArtifactSet> {
    let mut files = Vec::new();
    collect_files(root, root, &mut files)?;
    files.sort();

    let mut artifacts = ArtifactSet::new();
    for (relative, path) in files {
        match fs::read_to_string(&path) {
            Ok(content) => artifacts.insert(relative, content),
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                debug!(path = %path.display(), "skipping non-UTF-8 file");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(artifacts)
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            if !SKIPPED_DIRS.contains(&name.as_str()) {
                collect_files(root, &path, out)?;
            }
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        out.push((relative, path));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ArtifactSet {
        let mut artifacts = ArtifactSet::new();
        artifacts.insert("Cargo.toml", "[package]\nname = \"demo\"\n");
        artifacts.insert("src/main.rs", "fn main() {}\n");
        artifacts
    }

    #[test]
    fn test_write_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path(), false);
        sink.persist(&sample()).unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("src/main.rs")).unwrap(),
            "fn main() {}\n"
        );
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("target/debug/out.rs"), "x").unwrap();
        fs::write(dir.path().join(".hidden"), "x").unwrap();

        assert_eq!(read_tree(dir.path()).unwrap(), sample());
    }

    #[test]
    fn test_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Cargo.toml"), "keep").unwrap();

        let err = DirectorySink::new(dir.path(), false)
            .persist(&sample())
            .unwrap_err();
        assert!(err.to_string().contains("already exists"), "{err}");
        assert!(!dir.path().join("src").exists());
        assert_eq!(fs::read_to_string(dir.path().join("Cargo.toml")).unwrap(), "keep");

        DirectorySink::new(dir.path(), true).persist(&sample()).unwrap();
        assert!(dir.path().join("src/main.rs").exists());
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut artifacts = ArtifactSet::new();
        artifacts.insert("../outside.rs", "");
        assert!(DirectorySink::new(dir.path(), true).persist(&artifacts).is_err());
    }
}
