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

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::encoder::{TermQuery, WILDCARD_TERM};

use super::DocRecord;

/// Mutable inverted index keyed by entry path.
///
/// Used as the delta of a [`super::RootIndex`] and as the base of roots
/// that are not persisted. Removals are kept as tombstones so a delta can
/// hide documents of the snapshot below it.
#[derive(Clone, Debug, Default)]
pub struct MemoryIndex {
    docs: BTreeMap<String, DocRecord>,
    terms: BTreeMap<String, BTreeSet<String>>,
    removed: BTreeSet<String>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a document.
    pub fn add(&mut self, record: DocRecord) {
        self.remove_terms(&record.entry);
        self.removed.remove(&record.entry);
        for t in &record.terms {
            self.terms
                .entry(t.clone())
                .or_default()
                .insert(record.entry.clone());
        }
        self.docs.insert(record.entry.clone(), record);
    }

    pub fn remove(&mut self, entry: &str) {
        self.remove_terms(entry);
        self.docs.remove(entry);
        self.removed.insert(entry.to_string());
    }

    fn remove_terms(&mut self, entry: &str) {
        let Some(old) = self.docs.get(entry) else {
            return;
        };
        for t in &old.terms {
            if let Some(set) = self.terms.get_mut(t) {
                set.remove(entry);
                if set.is_empty() {
                    self.terms.remove(t);
                }
            }
        }
    }

    /// Whether this index decides about `entry`, shadowing anything below.
    pub fn masks(&self, entry: &str) -> bool {
        self.docs.contains_key(entry) || self.removed.contains(entry)
    }

    pub fn record(&self, entry: &str) -> Option<&DocRecord> {
        self.docs.get(entry)
    }

    pub fn records(&self) -> impl Iterator<Item = &DocRecord> {
        self.docs.values()
    }

    pub fn removed(&self) -> impl Iterator<Item = &String> {
        self.removed.iter()
    }

    /// Number of documents touched since the last merge.
    pub fn pending(&self) -> usize {
        self.docs.len() + self.removed.len()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn query(&self, q: &TermQuery, out: &mut BTreeSet<String>) {
        let start = q.scan_start();
        let prefix = q.scan_prefix();
        for (term, entries) in self
            .terms
            .range::<str, _>((Bound::Included(start.as_str()), Bound::Unbounded))
        {
            if !term.starts_with(&prefix) {
                break;
            }
            if q.matches(term) {
                out.extend(entries.iter().cloned());
            }
        }
    }

    pub fn wildcard_bucket(&self, out: &mut BTreeSet<String>) {
        if let Some(entries) = self.terms.get(WILDCARD_TERM) {
            out.extend(entries.iter().cloned());
        }
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Any term starting with `prefix`.
    pub fn has_term_prefix(&self, prefix: &str) -> bool {
        self.terms
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .next()
            .map(|(t, _)| t.starts_with(prefix))
            .unwrap_or(false)
    }

    /// Sorted terms with their sorted entries, for persisting.
    pub fn postings(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.terms.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{NameQuery, TermCategory};
    use crate::types::ContentSignature;

    fn rec(entry: &str, terms: &[&str]) -> DocRecord {
        DocRecord {
            entry: entry.to_string(),
            signature: ContentSignature::of_bytes(entry.as_bytes()),
            terms: terms.iter().map(|t| t.to_string()).collect(),
            summaries: Vec::new(),
        }
    }

    #[test]
    fn replace_and_remove_update_postings() {
        let mut idx = MemoryIndex::new();
        idx.add(rec("p/A.java", &["typeDecl/a", "typeRef/b"]));
        idx.add(rec("p/B.java", &["typeDecl/b"]));
        let q = TermQuery::new(TermCategory::TypeRef, NameQuery::Exact("b".into()));
        let mut out = BTreeSet::new();
        idx.query(&q, &mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec!["p/A.java"]);

        idx.add(rec("p/A.java", &["typeDecl/a"]));
        let mut out = BTreeSet::new();
        idx.query(&q, &mut out);
        assert!(out.is_empty());
        assert!(!idx.has_term("typeRef/b"));

        idx.remove("p/B.java");
        assert!(idx.masks("p/B.java"));
        assert!(idx.record("p/B.java").is_none());
        assert_eq!(idx.pending(), 2);
        assert!(idx.has_term_prefix("typeDecl/"));
    }

    #[test]
    fn prefix_scan_stops_at_category_boundary() {
        let mut idx = MemoryIndex::new();
        idx.add(rec("A.java", &["typeDecl/zeta"]));
        idx.add(rec("B.java", &["typeRef/alpha"]));
        let q = TermQuery::new(TermCategory::TypeDecl, NameQuery::Any);
        let mut out = BTreeSet::new();
        idx.query(&q, &mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec!["A.java"]);
    }
}
