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


//! Document predicates that prune both index lookups and verification.

use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::OverlayRegistry;
use crate::manager::IndexRegistry;
use crate::types::DocumentKey;

/// Types related to a focus type, and the documents declaring them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HierarchyScope {
    pub focus: String,
    /// Qualified names of the focus, its supertypes and its subtypes.
    pub types: BTreeSet<String>,
    pub documents: BTreeSet<DocumentKey>,
    /// Whether matches inside the focus's own member types count.
    pub include_focus_members: bool,
}

impl HierarchyScope {
    fn encloses(&self, owner: Option<&str>) -> bool {
        let Some(owner) = owner else {
            return false;
        };
        if self.types.contains(owner) {
            return true;
        }
        self.include_focus_members
            && owner.len() > self.focus.len()
            && owner.starts_with(self.focus.as_str())
            && owner.as_bytes()[self.focus.len()] == b'.'
    }
}

#[derive(Clone, Debug)]
pub enum SearchScope {
    /// Every registered root.
    Everything,
    Roots {
        roots: BTreeSet<PathBuf>,
        label: String,
    },
    /// Explicit documents, and folders given as (root, entry prefix).
    Documents {
        docs: BTreeSet<DocumentKey>,
        folders: Vec<(PathBuf, String)>,
    },
    Hierarchy(HierarchyScope),
    /// Another scope whose documents are read from live buffers where the
    /// registry has one.
    Overlay {
        inner: Box<SearchScope>,
        overlay: Arc<OverlayRegistry>,
    },
    Empty,
}

impl SearchScope {
    /// Roots of the named containers, optionally with every container that
    /// depends on them, transitively. Unknown ids contribute nothing.
    pub fn containers(registry: &IndexRegistry, ids: &[&str], include_dependents: bool) -> Self {
        let all = registry.containers();
        let mut selected: BTreeSet<String> = BTreeSet::new();
        let mut queue: VecDeque<String> = ids
            .iter()
            .filter(|id| all.iter().any(|c| c.id == **id))
            .map(|id| id.to_string())
            .collect();
        while let Some(id) = queue.pop_front() {
            if !selected.insert(id.clone()) {
                continue;
            }
            if include_dependents {
                for c in &all {
                    if c.dependencies.iter().any(|d| *d == id) {
                        queue.push_back(c.id.clone());
                    }
                }
            }
        }
        if selected.is_empty() {
            return SearchScope::Empty;
        }
        let roots: BTreeSet<PathBuf> = all
            .iter()
            .filter(|c| selected.contains(&c.id))
            .flat_map(|c| c.roots.iter().map(|r| r.path().to_path_buf()))
            .collect();
        SearchScope::Roots {
            roots,
            label: selected.into_iter().collect::<Vec<_>>().join(","),
        }
    }

    pub fn documents<I: IntoIterator<Item = DocumentKey>>(docs: I) -> Self {
        let docs: BTreeSet<DocumentKey> = docs.into_iter().collect();
        if docs.is_empty() {
            return SearchScope::Empty;
        }
        SearchScope::Documents {
            docs,
            folders: Vec::new(),
        }
    }

    /// Every document of `root` whose entry lies below `prefix`.
    pub fn folder(root: impl AsRef<Path>, prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        SearchScope::Documents {
            docs: BTreeSet::new(),
            folders: vec![(root.as_ref().to_path_buf(), prefix.to_string())],
        }
    }

    pub fn with_overlay(self, overlay: Arc<OverlayRegistry>) -> Self {
        match self {
            SearchScope::Overlay { inner, .. } => SearchScope::Overlay { inner, overlay },
            other => SearchScope::Overlay {
                inner: Box::new(other),
                overlay,
            },
        }
    }

    pub fn overlay(&self) -> Option<&Arc<OverlayRegistry>> {
        match self {
            SearchScope::Overlay { overlay, .. } => Some(overlay),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            SearchScope::Empty => true,
            SearchScope::Roots { roots, .. } => roots.is_empty(),
            SearchScope::Documents { docs, folders } => docs.is_empty() && folders.is_empty(),
            SearchScope::Hierarchy(h) => h.documents.is_empty(),
            SearchScope::Overlay { inner, .. } => inner.is_empty(),
            SearchScope::Everything => false,
        }
    }

    /// Whether any document of `root` can be in scope.
    pub fn includes_root(&self, root: &Path) -> bool {
        match self {
            SearchScope::Everything => true,
            SearchScope::Roots { roots, .. } => roots.contains(root),
            SearchScope::Documents { docs, folders } => {
                docs.iter().any(|d| d.root == root) || folders.iter().any(|(r, _)| r == root)
            }
            SearchScope::Hierarchy(h) => h.documents.iter().any(|d| d.root == root),
            SearchScope::Overlay { inner, .. } => inner.includes_root(root),
            SearchScope::Empty => false,
        }
    }

    pub fn includes(&self, doc: &DocumentKey) -> bool {
        match self {
            SearchScope::Everything => true,
            SearchScope::Roots { roots, .. } => roots.contains(&doc.root),
            SearchScope::Documents { docs, folders } => {
                docs.contains(doc)
                    || folders.iter().any(|(root, prefix)| {
                        *root == doc.root
                            && (prefix.is_empty()
                                || doc
                                    .entry
                                    .strip_prefix(prefix.as_str())
                                    .map(|rest| rest.starts_with('/'))
                                    .unwrap_or(false))
                    })
            }
            SearchScope::Hierarchy(h) => h.documents.contains(doc),
            SearchScope::Overlay { inner, .. } => inner.includes(doc),
            SearchScope::Empty => false,
        }
    }

    /// Whether a match in `doc` whose innermost member type is `owner` is in
    /// scope. Only hierarchy scopes look past the document.
    pub fn encloses(&self, doc: &DocumentKey, owner: Option<&str>) -> bool {
        match self {
            SearchScope::Hierarchy(h) => h.documents.contains(doc) && h.encloses(owner),
            SearchScope::Overlay { inner, .. } => inner.encloses(doc, owner),
            other => other.includes(doc),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            SearchScope::Everything => "everything".to_string(),
            SearchScope::Roots { label, .. } => format!("containers {}", label),
            SearchScope::Documents { docs, folders } => {
                format!("{} documents, {} folders", docs.len(), folders.len())
            }
            SearchScope::Hierarchy(h) => format!("hierarchy of {}", h.focus),
            SearchScope::Overlay { inner, .. } => format!("{} with overlay", inner.describe()),
            SearchScope::Empty => "empty".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy(include_focus_members: bool) -> SearchScope {
        let doc = DocumentKey::source("/ws", "p/A.java");
        SearchScope::Hierarchy(HierarchyScope {
            focus: "p.A".into(),
            types: ["p.A", "p.B"].iter().map(|s| s.to_string()).collect(),
            documents: [doc].into_iter().collect(),
            include_focus_members,
        })
    }

    #[test]
    fn folder_scope_matches_whole_path_segments() {
        let scope = SearchScope::folder("/ws", "p/q");
        assert!(scope.includes(&DocumentKey::source("/ws", "p/q/A.java")));
        assert!(!scope.includes(&DocumentKey::source("/ws", "p/qr/A.java")));
        assert!(!scope.includes(&DocumentKey::source("/other", "p/q/A.java")));
        assert!(scope.includes_root(Path::new("/ws")));
    }

    #[test]
    fn hierarchy_toggle_controls_focus_member_types() {
        let doc = DocumentKey::source("/ws", "p/A.java");
        let strict = hierarchy(false);
        assert!(strict.encloses(&doc, Some("p.A")));
        assert!(!strict.encloses(&doc, Some("p.A.Inner")));
        assert!(!strict.encloses(&doc, Some("p.AB")));
        assert!(!strict.encloses(&doc, None));
        let loose = hierarchy(true);
        assert!(loose.encloses(&doc, Some("p.A.Inner")));
        assert!(!loose.encloses(&doc, Some("p.AB")));
    }

    #[test]
    fn empty_scopes_include_nothing() {
        let scope = SearchScope::documents(Vec::new());
        assert!(scope.is_empty());
        assert!(!scope.includes(&DocumentKey::source("/ws", "A.java")));
        assert!(!SearchScope::Empty.includes_root(Path::new("/ws")));
    }

    #[test]
    fn overlay_wraps_without_changing_membership() {
        let scope = SearchScope::folder("/ws", "").with_overlay(Arc::new(OverlayRegistry::new()));
        assert!(scope.overlay().is_some());
        assert!(scope.includes(&DocumentKey::source("/ws", "Any.java")));
        assert!(scope.describe().ends_with("with overlay"));
    }
}
