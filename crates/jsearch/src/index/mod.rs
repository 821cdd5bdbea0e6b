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

//! Per-root inverted index: a persisted or in-memory base plus a delta.

pub(crate) mod codec;
mod disk;
mod memory;

pub use disk::{DiskIndex, MAGIC, VERSION};
pub use memory::MemoryIndex;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::encoder::{term, DeclSummary, TermCategory, TermQuery};
use crate::error::IndexError;
use crate::types::{ContentSignature, IndexLocation};

/// What an index knows about one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocRecord {
    pub entry: String,
    pub signature: ContentSignature,
    /// Sorted terms. Empty for records read from disk, whose terms live in
    /// the posting lists.
    pub terms: Vec<String>,
    pub summaries: Vec<DeclSummary>,
}

#[derive(Debug)]
pub enum Base {
    Disk(DiskIndex),
    Memory(MemoryIndex),
}

impl Base {
    fn query(&self, q: &TermQuery, out: &mut BTreeSet<String>) {
        match self {
            Base::Disk(d) => d.query(q, out),
            Base::Memory(m) => m.query(q, out),
        }
    }

    fn wildcard_bucket(&self, out: &mut BTreeSet<String>) {
        match self {
            Base::Disk(d) => d.wildcard_bucket(out),
            Base::Memory(m) => m.wildcard_bucket(out),
        }
    }

    fn record(&self, entry: &str) -> Option<&DocRecord> {
        match self {
            Base::Disk(d) => d.record(entry),
            Base::Memory(m) => m.record(entry),
        }
    }

    fn records(&self) -> Box<dyn Iterator<Item = &DocRecord> + '_> {
        match self {
            Base::Disk(d) => Box::new(d.records().iter()),
            Base::Memory(m) => Box::new(m.records()),
        }
    }

    fn has_term(&self, t: &str) -> bool {
        match self {
            Base::Disk(d) => d.has_term(t),
            Base::Memory(m) => m.has_term(t),
        }
    }

    fn has_term_prefix(&self, p: &str) -> bool {
        match self {
            Base::Disk(d) => d.has_term_prefix(p),
            Base::Memory(m) => m.has_term_prefix(p),
        }
    }

    fn to_memory(&self) -> MemoryIndex {
        match self {
            Base::Disk(d) => d.to_memory(),
            Base::Memory(m) => m.clone(),
        }
    }
}

/// Immutable snapshot of a root's index. Updates produce a new snapshot.
///
/// Delta entries shadow the base until the two are merged.
#[derive(Debug, Clone)]
pub struct RootIndex {
    location: IndexLocation,
    base: Arc<Base>,
    delta: Arc<MemoryIndex>,
}

/// File name of the persisted index for a root path.
pub fn index_file_name(root: &Path) -> String {
    let sig = ContentSignature::of_bytes(root.display().to_string().as_bytes());
    let stem = root
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "root".to_string());
    format!("{}-{}.jsx", stem, sig.short())
}

impl RootIndex {
    pub fn new(location: IndexLocation, base: Base) -> Self {
        Self {
            location,
            base: Arc::new(base),
            delta: Arc::new(MemoryIndex::new()),
        }
    }

    /// Index built in memory from freshly encoded records.
    pub fn from_records(location: IndexLocation, records: Vec<DocRecord>) -> Self {
        let mut m = MemoryIndex::new();
        for r in records {
            m.add(r);
        }
        Self::new(location, Base::Memory(m))
    }

    /// Open `path` if it is a valid snapshot of `location`, otherwise `None`
    /// after discarding the file. IO errors other than a missing file are
    /// returned.
    pub fn load(path: &Path, location: &IndexLocation) -> Result<Option<Self>, IndexError> {
        if !path.exists() {
            return Ok(None);
        }
        match DiskIndex::open(path, location) {
            Ok(d) => Ok(Some(Self::new(location.clone(), Base::Disk(d)))),
            Err(e) if e.requires_rebuild() => {
                info!(path = %path.display(), error = %e, "discarding index file");
                let _ = std::fs::remove_file(path);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self.base.as_ref(), Base::Disk(_))
    }

    pub fn persisted_path(&self) -> Option<PathBuf> {
        match self.base.as_ref() {
            Base::Disk(d) => Some(d.path().to_path_buf()),
            Base::Memory(_) => None,
        }
    }

    /// Same index data published for another root with identical content.
    pub fn relocated(&self, location: IndexLocation) -> Self {
        Self {
            location,
            base: self.base.clone(),
            delta: self.delta.clone(),
        }
    }

    /// Entries matching any of `queries`, plus the wildcard bucket.
    pub fn candidates(&self, queries: &[TermQuery]) -> BTreeSet<String> {
        let mut from_base = BTreeSet::new();
        let mut out = BTreeSet::new();
        for q in queries {
            self.base.query(q, &mut from_base);
            self.delta.query(q, &mut out);
        }
        self.base.wildcard_bucket(&mut from_base);
        self.delta.wildcard_bucket(&mut out);
        out.extend(from_base.into_iter().filter(|e| !self.delta.masks(e)));
        out
    }

    pub fn record(&self, entry: &str) -> Option<&DocRecord> {
        if self.delta.masks(entry) {
            return self.delta.record(entry);
        }
        self.base.record(entry)
    }

    /// All live records, in entry order.
    pub fn records(&self) -> Vec<&DocRecord> {
        let mut out: Vec<&DocRecord> = self
            .base
            .records()
            .filter(|r| !self.delta.masks(&r.entry))
            .chain(self.delta.records())
            .collect();
        out.sort_by(|a, b| a.entry.cmp(&b.entry));
        out
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_term(&self, category: TermCategory, name: &str) -> bool {
        let t = term(category, name);
        self.delta.has_term(&t) || self.base.has_term(&t)
    }

    pub fn has_term_prefix(&self, category: TermCategory, name_prefix: &str) -> bool {
        let t = term(category, name_prefix);
        self.delta.has_term_prefix(&t) || self.base.has_term_prefix(&t)
    }

    pub fn pending(&self) -> usize {
        self.delta.pending()
    }

    /// New snapshot with `changes` applied to the delta. `None` removes.
    pub fn with_changes(&self, changes: Vec<(String, Option<DocRecord>)>) -> Self {
        let mut delta = self.delta.as_ref().clone();
        for (entry, rec) in changes {
            match rec {
                Some(r) => delta.add(r),
                None => delta.remove(&entry),
            }
        }
        let signature = {
            let live = self.base_and(&delta);
            ContentSignature::of_entries(live.iter().map(|r| (r.entry.as_str(), &r.signature)))
        };
        Self {
            location: IndexLocation {
                root: self.location.root.clone(),
                signature,
            },
            base: self.base.clone(),
            delta: Arc::new(delta),
        }
    }

    fn base_and<'a>(&'a self, delta: &'a MemoryIndex) -> Vec<&'a DocRecord> {
        self.base
            .records()
            .filter(|r| !delta.masks(&r.entry))
            .chain(delta.records())
            .collect()
    }

    /// Fold the delta into a new base, persisting it when `path` is given.
    pub fn merged(&self, path: Option<&Path>) -> Result<Self, IndexError> {
        let mut merged = self.base.to_memory();
        for gone in self.delta.removed() {
            merged.remove(gone);
        }
        for r in self.delta.records() {
            merged.add(r.clone());
        }
        // tombstones are meaningless in a base
        let mut clean = MemoryIndex::new();
        for r in merged.records() {
            clean.add(r.clone());
        }
        let base = match path {
            Some(p) => {
                DiskIndex::write(p, &self.location, &clean)?;
                Base::Disk(DiskIndex::open(p, &self.location)?)
            }
            None => Base::Memory(clean),
        };
        info!(
            root = %self.location.root.path().display(),
            docs = self.len(),
            "merged index delta"
        );
        Ok(Self::new(self.location.clone(), base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::NameQuery;
    use crate::types::RootSpec;

    fn rec(entry: &str, terms: &[&str]) -> DocRecord {
        DocRecord {
            entry: entry.to_string(),
            signature: ContentSignature::of_bytes(terms.join(",").as_bytes()),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            summaries: Vec::new(),
        }
    }

    fn location(sig: &[u8]) -> IndexLocation {
        IndexLocation {
            root: RootSpec::SourceFolder(PathBuf::from("/ws/src")),
            signature: ContentSignature::of_bytes(sig),
        }
    }

    #[test]
    fn delta_shadows_base_until_merged() {
        let base = RootIndex::from_records(
            location(b"one"),
            vec![rec("A.java", &["typeDecl/a"]), rec("B.java", &["typeDecl/b"])],
        );
        let q = TermQuery::new(TermCategory::TypeDecl, NameQuery::Exact("a".into()));
        assert_eq!(base.candidates(&[q.clone()]).len(), 1);

        let next = base.with_changes(vec![
            ("A.java".into(), Some(rec("A.java", &["typeDecl/renamed"]))),
            ("B.java".into(), None),
        ]);
        assert!(next.candidates(&[q.clone()]).is_empty());
        assert_eq!(next.len(), 1);
        assert_eq!(next.pending(), 2);
        assert_ne!(next.location().signature, base.location().signature);
        // the old snapshot is untouched
        assert_eq!(base.candidates(&[q.clone()]).len(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(index_file_name(Path::new("/ws/src")));
        let merged = next.merged(Some(&path)).unwrap();
        assert!(merged.is_persisted());
        assert_eq!(merged.pending(), 0);
        assert_eq!(merged.len(), 1);
        assert!(merged.has_term(TermCategory::TypeDecl, "Renamed"));

        let reopened = RootIndex::load(&path, merged.location()).unwrap().unwrap();
        assert_eq!(reopened.records()[0].entry, "A.java");
    }

    #[test]
    fn load_discards_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.jsx");
        let idx = RootIndex::from_records(location(b"one"), vec![rec("A.java", &["typeDecl/a"])]);
        idx.merged(Some(&path)).unwrap();
        assert!(RootIndex::load(&path, &location(b"two")).unwrap().is_none());
        assert!(!path.exists());
    }
}
