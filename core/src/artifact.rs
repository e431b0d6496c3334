use indexmap::IndexMap;
use indexmap::map::Iter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Ordered mapping from relative artifact path to UTF-8 source text.
///
/// Insertion order is preserved and is part of the generator's output
/// contract; two sets with the same entries in a different order are not
/// equal.
///
/// # Examples
///
/// ```
/// use cliforge_core::ArtifactSet;
///
/// let mut set = ArtifactSet::new();
/// set.insert("src/main.rs", "fn main() {}\n");
/// set.insert("Cargo.toml", "[package]\nname = \"x\"\n");
///
/// assert_eq!(set.len(), 2);
/// assert_eq!(set.paths().next(), Some("src/main.rs"));
/// assert_eq!(set.get("src/main.rs"), Some("fn main() {}\n"));
/// assert_eq!(set.digest().len(), 64);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactSet {
    entries: IndexMap<String, String>,
}

impl ArtifactSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an artifact, replacing the content of an existing path in
    /// place.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.entries.insert(path.into(), content.into());
    }

    /// Returns the content at `path`.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    /// Returns the stored path and content at `path`.
    pub fn get_key_value(&self, path: &str) -> Option<(&str, &str)> {
        self.entries
            .get_key_value(path)
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// `(path, content)` pairs in order.
    pub fn iter(&self) -> Iter<'_, String, String> {
        self.entries.iter()
    }

    /// Appends every artifact of `other` after the current ones.
    pub fn extend(&mut self, other: ArtifactSet) {
        self.entries.extend(other.entries);
    }

    /// SHA-256 hex digest over every path and content, in order.
    ///
    /// Each field is length-prefixed so that moving bytes between a path and
    /// its content changes the digest.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for (path, content) in &self.entries {
            hasher.update((path.len() as u64).to_le_bytes());
            hasher.update(path.as_bytes());
            hasher.update((content.len() as u64).to_le_bytes());
            hasher.update(content.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl<'a> IntoIterator for &'a ArtifactSet {
    type Item = (&'a String, &'a String);
    type IntoIter = Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, String)> for ArtifactSet {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
