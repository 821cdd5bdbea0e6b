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


use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::OverlayRegistry;
use crate::encoder::{NameQuery, TermCategory, TermQuery};
use crate::index::RootIndex;
use crate::manager::IndexRegistry;
use crate::pattern::{MatchRule, NameMatcher};
use crate::resolve::TypeWorld;
use crate::syntax::ParsedUnit;
use crate::types::{ContentSignature, DocumentKey};

/// Parsed units shared across queries, keyed by content signature so an
/// edited document is never served stale.
pub(crate) struct ParseCache {
    entries: Mutex<LruCache<DocumentKey, (ContentSignature, Arc<ParsedUnit>)>>,
}

impl ParseCache {
    pub(crate) fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(cap)),
        }
    }

    fn get(&self, key: &DocumentKey, signature: ContentSignature) -> Option<Arc<ParsedUnit>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((sig, unit)) if *sig == signature => Some(unit.clone()),
            _ => None,
        }
    }

    fn put(&self, unit: Arc<ParsedUnit>) {
        self.entries
            .lock()
            .put(unit.key.clone(), (unit.signature, unit));
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// The corpus as one query sees it: the snapshots taken when the query
/// started, with overlay buffers substituted for their documents.
pub(crate) struct EngineWorld<'e> {
    registry: &'e IndexRegistry,
    cache: &'e ParseCache,
    snapshots: Vec<Arc<RootIndex>>,
    overlay: Option<Arc<OverlayRegistry>>,
    /// Every unit handed out, so one document is one unit for the whole query.
    units: Mutex<HashMap<DocumentKey, Option<Arc<ParsedUnit>>>>,
    parse_failures: AtomicUsize,
}

impl<'e> EngineWorld<'e> {
    pub(crate) fn new(
        registry: &'e IndexRegistry,
        cache: &'e ParseCache,
        snapshots: Vec<Arc<RootIndex>>,
        overlay: Option<Arc<OverlayRegistry>>,
    ) -> Self {
        Self {
            registry,
            cache,
            snapshots,
            overlay,
            units: Mutex::new(HashMap::new()),
            parse_failures: AtomicUsize::new(0),
        }
    }

    pub(crate) fn snapshots(&self) -> &[Arc<RootIndex>] {
        &self.snapshots
    }

    pub(crate) fn overlay(&self) -> Option<&Arc<OverlayRegistry>> {
        self.overlay.as_ref()
    }

    pub(crate) fn parse_failures(&self) -> usize {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// The unit for `key`, or `None` when it is deleted, unreadable or
    /// unparseable.
    pub(crate) fn unit(&self, key: &DocumentKey) -> Option<Arc<ParsedUnit>> {
        if let Some(hit) = self.units.lock().get(key) {
            return hit.clone();
        }
        let loaded = self.load(key);
        self.units
            .lock()
            .entry(key.clone())
            .or_insert(loaded)
            .clone()
    }

    fn load(&self, key: &DocumentKey) -> Option<Arc<ParsedUnit>> {
        if self.released(key) {
            debug!(document = %key, "root removed during the query");
            return None;
        }
        match self.overlay.as_ref().and_then(|o| o.get(key)) {
            Some(None) => return None,
            Some(Some(content)) => return self.parse(key, content.as_bytes()),
            None => {}
        }
        if let Some(sig) = self.indexed_signature(key) {
            if let Some(unit) = self.cache.get(key, sig) {
                return Some(unit);
            }
        }
        match self.registry.read_document(key) {
            Ok(bytes) => self.parse(key, &bytes),
            Err(e) => {
                debug!(document = %key, error = %e, "document no longer readable");
                None
            }
        }
    }

    fn parse(&self, key: &DocumentKey, bytes: &[u8]) -> Option<Arc<ParsedUnit>> {
        if let Some(unit) = self.cache.get(key, ContentSignature::of_bytes(bytes)) {
            return Some(unit);
        }
        match ParsedUnit::parse(key.clone(), bytes) {
            Ok(unit) => {
                let unit = Arc::new(unit);
                self.cache.put(unit.clone());
                Some(unit)
            }
            Err(e) => {
                self.parse_failures.fetch_add(1, Ordering::Relaxed);
                debug!(document = %key, error = %e, "parse failed; no matches in document");
                None
            }
        }
    }

    fn snapshot_of(&self, key: &DocumentKey) -> Option<&Arc<RootIndex>> {
        self.snapshots.iter().find(|s| {
            let root = &s.location().root;
            root.path() == key.root && root.is_archive() == key.in_archive
        })
    }

    fn indexed_signature(&self, key: &DocumentKey) -> Option<ContentSignature> {
        self.snapshot_of(key)
            .and_then(|s| s.record(&key.entry))
            .map(|r| r.signature)
    }

    /// The document's root was part of this query but is registered no more.
    pub(crate) fn released(&self, key: &DocumentKey) -> bool {
        self.snapshot_of(key).is_some() && self.registry.root_spec(&key.root).is_none()
    }

    /// Units whose index terms contain `name` under `category`, overlay
    /// buffers included.
    fn units_with_term(&self, category: TermCategory, name: &str) -> Vec<Arc<ParsedUnit>> {
        if name.is_empty() {
            return Vec::new();
        }
        let query = [TermQuery::new(
            category,
            NameQuery::from_matcher(&NameMatcher::new(name, MatchRule::EXACT)),
        )];
        let mut keys: Vec<DocumentKey> = Vec::new();
        for snap in &self.snapshots {
            let root = &snap.location().root;
            for entry in snap.candidates(&query) {
                let key = root.document(entry);
                if self.overlay.as_ref().map(|o| o.contains(&key)).unwrap_or(false) {
                    continue;
                }
                keys.push(key);
            }
        }
        if let Some(o) = &self.overlay {
            keys.extend(o.live().into_iter().map(|(k, _)| k));
        }
        keys.iter().filter_map(|k| self.unit(k)).collect()
    }
}

impl TypeWorld for EngineWorld<'_> {
    fn units_declaring(&self, simple: &str) -> Vec<Arc<ParsedUnit>> {
        self.units_with_term(TermCategory::TypeDecl, simple)
            .into_iter()
            .filter(|u| u.unit.types.iter().any(|t| t.name == simple))
            .collect()
    }

    fn units_extending(&self, simple: &str) -> Vec<Arc<ParsedUnit>> {
        self.units_with_term(TermCategory::SuperRef, simple)
            .into_iter()
            .filter(|u| {
                u.unit
                    .types
                    .iter()
                    .any(|t| t.supertypes().any(|s| s.simple_name() == simple))
            })
            .collect()
    }

    fn package_exists(&self, name: &str) -> bool {
        let nested = format!("{}.", name);
        if self.snapshots.iter().any(|s| {
            s.has_term(TermCategory::PkgDecl, name) || s.has_term_prefix(TermCategory::PkgDecl, &nested)
        }) {
            return true;
        }
        let Some(o) = &self.overlay else {
            return false;
        };
        o.live().iter().any(|(k, _)| {
            self.unit(k)
                .map(|u| {
                    let p = u.unit.package_name();
                    p == name || p.starts_with(&nested)
                })
                .unwrap_or(false)
        })
    }
}
