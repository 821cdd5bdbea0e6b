// Copyright 2025 HyperZoekt Project
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identity of one indexable unit: a source file below a folder root, or one
/// entry inside an archive root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentKey {
    pub root: PathBuf,
    /// Path relative to the root, always `/`-separated.
    pub entry: String,
    pub in_archive: bool,
}

impl DocumentKey {
    pub fn source(root: impl AsRef<Path>, entry: impl Into<String>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            entry: entry.into(),
            in_archive: false,
        }
    }

    pub fn archive_entry(archive: impl AsRef<Path>, entry: impl Into<String>) -> Self {
        Self {
            root: archive.as_ref().to_path_buf(),
            entry: entry.into(),
            in_archive: true,
        }
    }

    /// Compiled units carry no source text.
    pub fn is_binary(&self) -> bool {
        self.entry.ends_with(".class")
    }

    /// Filesystem location for folder-backed documents.
    pub fn file_path(&self) -> PathBuf {
        self.root.join(&self.entry)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.in_archive {
            write!(f, "{}|{}", self.root.display(), self.entry)
        } else {
            write!(f, "{}", self.root.join(&self.entry).display())
        }
    }
}

/// SHA-256 digest over document content, or over the sorted
/// (entry, document signature) pairs of a whole root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ContentSignature(pub [u8; 32]);

impl ContentSignature {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(hasher.finalize().into())
    }

    /// Signature of a root from its documents. Order-independent.
    pub fn of_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a ContentSignature)>,
    {
        let mut sorted: Vec<(&str, &ContentSignature)> = entries.into_iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let mut hasher = Sha256::new();
        for (entry, sig) in sorted {
            hasher.update((entry.len() as u32).to_le_bytes());
            hasher.update(entry.as_bytes());
            hasher.update(sig.0);
        }
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Short form used in file names and log lines.
    pub fn short(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl fmt::Debug for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentSignature({})", self.short())
    }
}

impl fmt::Display for ContentSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Half-open byte range into a document's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TextRange {
    pub start: u32,
    pub end: u32,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start: start as u32,
            end: end as u32,
        }
    }

    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        source
            .get(self.start as usize..self.end as usize)
            .unwrap_or_default()
    }
}

/// An indexable root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RootSpec {
    /// Directory walked for `.java` files.
    SourceFolder(PathBuf),
    /// `.jar`/`.zip` holding `.class` entries and optional `.java` attachments.
    Archive(PathBuf),
}

impl RootSpec {
    pub fn path(&self) -> &Path {
        match self {
            RootSpec::SourceFolder(p) | RootSpec::Archive(p) => p,
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, RootSpec::Archive(_))
    }

    pub fn document(&self, entry: impl Into<String>) -> DocumentKey {
        match self {
            RootSpec::SourceFolder(p) => DocumentKey::source(p, entry),
            RootSpec::Archive(p) => DocumentKey::archive_entry(p, entry),
        }
    }
}

/// A project-like grouping of roots. Containers may depend on each other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub id: String,
    pub roots: Vec<RootSpec>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl ContainerSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roots: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_source_folder(mut self, path: impl AsRef<Path>) -> Self {
        self.roots
            .push(RootSpec::SourceFolder(path.as_ref().to_path_buf()));
        self
    }

    pub fn with_archive(mut self, path: impl AsRef<Path>) -> Self {
        self.roots.push(RootSpec::Archive(path.as_ref().to_path_buf()));
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }
}

/// The root an index describes, keyed for staleness detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexLocation {
    pub root: RootSpec,
    pub signature: ContentSignature,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_signature_ignores_entry_order() {
        let a = ContentSignature::of_bytes(b"class A {}");
        let b = ContentSignature::of_bytes(b"class B {}");
        let one = ContentSignature::of_entries(vec![("A.java", &a), ("B.java", &b)]);
        let two = ContentSignature::of_entries(vec![("B.java", &b), ("A.java", &a)]);
        assert_eq!(one, two);
        let three = ContentSignature::of_entries(vec![("A.java", &b), ("B.java", &a)]);
        assert_ne!(one, three);
    }

    #[test]
    fn document_key_display_distinguishes_archives() {
        let src = DocumentKey::source("/ws/src", "p/A.java");
        let bin = DocumentKey::archive_entry("/ws/lib.jar", "p/A.class");
        assert!(src.to_string().ends_with("p/A.java"));
        assert_eq!(bin.to_string(), "/ws/lib.jar|p/A.class");
        assert!(bin.is_binary());
        assert!(!src.is_binary());
    }
}
