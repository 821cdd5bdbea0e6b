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


//! The orchestrator: index lookups, scope filtering, overlay substitution and
//! verification merged into one ordered match stream.

mod overlay;
mod sink;
mod world;

pub use overlay::OverlayRegistry;
pub use sink::{CollectingSink, DeclarationSink, MatchSink, SearchMatch};

use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::encoder::{summarize, DeclSummary, SummaryKind};
use crate::error::{IndexError, SearchError, SearchResult};
use crate::index::RootIndex;
use crate::locator::{Located, PatternLocator};
use crate::manager::{CancellationToken, IndexRegistry, WaitPolicy};
use crate::pattern::{ElementKind, Focus, NameMatcher, Pattern, TypeFilter};
use crate::resolve::Resolver;
use crate::scope::{HierarchyScope, SearchScope};
use crate::syntax::{CompilationUnit, ParsedUnit};
use crate::types::DocumentKey;

use world::{EngineWorld, ParseCache};

/// Which kinds of documents take part in a search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Participant {
    /// Source files and source attachments.
    Sources,
    /// Compiled units inside archives.
    Binaries,
}

impl Participant {
    fn accepts(self, key: &DocumentKey) -> bool {
        match self {
            Participant::Sources => !key.is_binary(),
            Participant::Binaries => key.is_binary(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchOptions {
    pub wait: WaitPolicy,
    pub cancel: CancellationToken,
    pub participants: Vec<Participant>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self::new(WaitPolicy::WaitUntilReady)
    }
}

impl SearchOptions {
    pub fn new(wait: WaitPolicy) -> Self {
        Self {
            wait,
            cancel: CancellationToken::new(),
            participants: vec![Participant::Sources, Participant::Binaries],
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_participants(mut self, participants: Vec<Participant>) -> Self {
        self.participants = participants;
        self
    }

    fn participates(&self, key: &DocumentKey) -> bool {
        self.participants.iter().any(|p| p.accepts(key))
    }
}

/// What one search did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SearchStats {
    pub roots: usize,
    pub candidate_documents: usize,
    pub verified_documents: usize,
    pub parse_failures: usize,
    pub matches: usize,
}

/// Which declarations [`SearchEngine::search_all_declarations`] lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
    Type(TypeFilter),
    Method,
    Constructor,
    Field,
}

impl DeclarationKind {
    /// The listable counterpart of a pattern element kind. Packages,
    /// annotation elements and modules have none.
    pub fn for_element(kind: ElementKind) -> Option<Self> {
        match kind {
            ElementKind::Type(f) => Some(DeclarationKind::Type(f)),
            ElementKind::Method => Some(DeclarationKind::Method),
            ElementKind::Constructor => Some(DeclarationKind::Constructor),
            ElementKind::Field => Some(DeclarationKind::Field),
            ElementKind::Package | ElementKind::AnnotationElement | ElementKind::Module => None,
        }
    }

    fn accepts(self, kind: SummaryKind) -> bool {
        match (self, kind) {
            (DeclarationKind::Type(f), SummaryKind::Type(k)) => f.accepts(k),
            (DeclarationKind::Method, SummaryKind::Method) => true,
            (DeclarationKind::Constructor, SummaryKind::Constructor) => true,
            (DeclarationKind::Field, SummaryKind::Field) => true,
            _ => false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeclarationQuery {
    pub kind: DeclarationKind,
    pub name: NameMatcher,
    /// Tested against the package and enclosing types of a declaration.
    pub qualification: Option<NameMatcher>,
}

impl DeclarationQuery {
    pub fn new(kind: DeclarationKind, name: NameMatcher) -> Self {
        Self {
            kind,
            name,
            qualification: None,
        }
    }

    pub fn in_qualification(mut self, matcher: NameMatcher) -> Self {
        self.qualification = Some(matcher);
        self
    }

    fn accepts(&self, d: &DeclSummary) -> bool {
        self.kind.accepts(d.kind)
            && self.name.matches(&d.name)
            && self
                .qualification
                .as_ref()
                .map(|q| q.matches(&d.qualified_container()))
                .unwrap_or(true)
    }
}

/// Result order: root, then sources before compiled units, then entry.
fn order_key(key: &DocumentKey) -> (PathBuf, bool, String, bool) {
    (key.root.clone(), key.is_binary(), key.entry.clone(), key.in_archive)
}

/// Innermost named type around a context; anonymous types belong to the
/// type that declares them.
fn member_type_of(unit: &CompilationUnit, owner: Option<usize>) -> Option<&str> {
    let mut cur = owner?;
    loop {
        let t = unit.types.get(cur)?;
        if !t.anonymous {
            return Some(&t.qualified);
        }
        cur = t.parent?;
    }
}

fn to_match(unit: &ParsedUnit, found: Located) -> SearchMatch {
    let text = match (found.range, unit.source.as_deref()) {
        (Some(r), Some(src)) => Some(r.text(src).to_string()),
        _ => None,
    };
    SearchMatch {
        document: unit.key.clone(),
        enclosing: unit.unit.enclosing_labels(&found.ctx),
        range: found.range,
        line: found.range.and_then(|r| unit.line_of(r)),
        text,
        accuracy: found.accuracy,
        flavor: found.flavor,
    }
}

/// Search over every root of one [`IndexRegistry`].
pub struct SearchEngine {
    registry: IndexRegistry,
    cache: ParseCache,
}

impl SearchEngine {
    pub fn new(config: EngineConfig) -> Result<Self, IndexError> {
        Ok(Self::with_registry(IndexRegistry::new(config)?))
    }

    pub fn with_registry(registry: IndexRegistry) -> Self {
        let cache = ParseCache::new(registry.config().parse_cache_capacity);
        Self { registry, cache }
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// Options carrying the configured wait policy.
    pub fn default_options(&self) -> SearchOptions {
        SearchOptions::new(self.registry.config().wait)
    }

    pub fn cached_units(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn shutdown(&self) {
        self.cache.clear();
        self.registry.shutdown();
    }

    /// Snapshot every registered root. Roots the scope can reach honour the
    /// wait policy; the rest only serve name resolution and never block.
    fn world(
        &self,
        scope: &SearchScope,
        overlay: Option<Arc<OverlayRegistry>>,
        opts: &SearchOptions,
    ) -> SearchResult<EngineWorld<'_>> {
        if self.registry.is_shut_down() {
            return Err(SearchError::ShutDown);
        }
        let mut snapshots = Vec::new();
        for root in self.registry.roots() {
            let policy = if scope.includes_root(root.path()) {
                opts.wait
            } else {
                WaitPolicy::BestEffort
            };
            if let Some(snap) = self.registry.snapshot(root.path(), policy, &opts.cancel)? {
                snapshots.push(snap);
            }
        }
        Ok(EngineWorld::new(&self.registry, &self.cache, snapshots, overlay))
    }

    /// Run `pattern` over `scope`, streaming matches to `sink`.
    ///
    /// `sink.begin()` and `sink.end()` are always called. Only cancellation
    /// and shutdown end a search with an error; per-root and per-document
    /// failures just end that root's or document's contribution.
    pub fn search(
        &self,
        pattern: &Pattern,
        scope: &SearchScope,
        opts: &SearchOptions,
        sink: &mut dyn MatchSink,
    ) -> SearchResult<SearchStats> {
        let started = Instant::now();
        sink.begin();
        let result = self.run(pattern, scope, opts, sink);
        sink.end();
        match &result {
            Ok(stats) => debug!(
                pattern = %pattern,
                scope = %scope.describe(),
                candidates = stats.candidate_documents,
                matches = stats.matches,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "search finished"
            ),
            Err(e) => debug!(pattern = %pattern, error = %e, "search ended early"),
        }
        result
    }

    fn run(
        &self,
        pattern: &Pattern,
        scope: &SearchScope,
        opts: &SearchOptions,
        sink: &mut dyn MatchSink,
    ) -> SearchResult<SearchStats> {
        let mut stats = SearchStats::default();
        if self.registry.is_shut_down() {
            return Err(SearchError::ShutDown);
        }
        let Some(locator) = PatternLocator::new(pattern) else {
            warn!(pattern = %pattern, "composite pattern mixes element kinds; nothing to match");
            return Ok(stats);
        };
        if scope.is_empty() {
            return Ok(stats);
        }
        let world = self.world(scope, scope.overlay().cloned(), opts)?;
        let docs = self.candidate_documents(&locator, scope, opts, &world, &mut stats);
        stats.candidate_documents = docs.len();

        let resolver = Resolver::new(&world);
        for key in docs {
            if opts.cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            if world.released(&key) {
                continue;
            }
            let Some(unit) = world.unit(&key) else {
                continue;
            };
            stats.verified_documents += 1;
            for found in locator.verify(&resolver, &unit) {
                if !scope.encloses(&key, member_type_of(&unit.unit, found.ctx.owner)) {
                    continue;
                }
                sink.accept(to_match(&unit, found));
                stats.matches += 1;
            }
        }
        stats.parse_failures = world.parse_failures();
        Ok(stats)
    }

    /// In-scope documents that may match, in result order. Live overlay
    /// documents are always included since the index may not reflect them.
    fn candidate_documents(
        &self,
        locator: &PatternLocator,
        scope: &SearchScope,
        opts: &SearchOptions,
        world: &EngineWorld<'_>,
        stats: &mut SearchStats,
    ) -> Vec<DocumentKey> {
        let overlay = world.overlay();
        let overlaid = |k: &DocumentKey| overlay.map(|o| o.contains(k)).unwrap_or(false);
        let mut docs: Vec<DocumentKey> = Vec::new();
        for snap in world.snapshots() {
            let root = &snap.location().root;
            if !scope.includes_root(root.path()) {
                continue;
            }
            stats.roots += 1;
            for entry in locator.candidates(snap) {
                let key = root.document(entry);
                if opts.participates(&key) && scope.includes(&key) && !overlaid(&key) {
                    docs.push(key);
                }
            }
        }
        if let Some(o) = overlay {
            for (key, _) in o.live() {
                if opts.participates(&key) && scope.includes(&key) {
                    docs.push(key);
                }
            }
        }
        docs.sort_by_cached_key(order_key);
        docs.dedup();
        docs
    }

    /// Bound focus for whatever declaration or reference covers `offset`.
    pub fn focus_at(
        &self,
        key: &DocumentKey,
        offset: u32,
        overlay: Option<Arc<OverlayRegistry>>,
        opts: &SearchOptions,
    ) -> SearchResult<Option<Focus>> {
        let world = self.world(&SearchScope::Everything, overlay, opts)?;
        let Some(unit) = world.unit(key) else {
            return Ok(None);
        };
        Ok(Resolver::new(&world).focus_at(&unit, offset))
    }

    /// Scope over the supertypes and subtypes of `focus`, and the focus
    /// itself. An unknown focus gives an empty scope.
    pub fn hierarchy_scope(
        &self,
        focus: &str,
        include_focus_members: bool,
        opts: &SearchOptions,
    ) -> SearchResult<SearchScope> {
        let world = self.world(&SearchScope::Everything, None, opts)?;
        let r = Resolver::new(&world);
        let Some(root) = r.lookup_qualified(focus) else {
            debug!(focus, "hierarchy focus not found");
            return Ok(SearchScope::Empty);
        };
        let mut types: BTreeSet<String> = BTreeSet::new();
        let mut documents: BTreeSet<DocumentKey> = BTreeSet::new();
        types.insert(focus.to_string());
        documents.insert(root.unit.key.clone());

        let mut queue = VecDeque::from([root]);
        while let Some(h) = queue.pop_front() {
            for sup in r.supertypes(&h).iter() {
                let Some(q) = sup.qualified() else {
                    continue;
                };
                if !types.insert(q.to_string()) {
                    continue;
                }
                if let Some(sh) = r.lookup_qualified(q) {
                    documents.insert(sh.unit.key.clone());
                    queue.push_back(sh);
                }
            }
        }
        for sub in r.subtypes_of(focus) {
            types.insert(sub.qualified().to_string());
            documents.insert(sub.unit.key.clone());
        }
        debug!(focus, types = types.len(), documents = documents.len(), "hierarchy scope");
        Ok(SearchScope::Hierarchy(HierarchyScope {
            focus: focus.to_string(),
            types,
            documents,
            include_focus_members,
        }))
    }

    /// List declarations from index summaries without parsing. Overlaid
    /// documents are summarized from their live content. Returns the number
    /// of declarations delivered.
    pub fn search_all_declarations(
        &self,
        query: &DeclarationQuery,
        scope: &SearchScope,
        opts: &SearchOptions,
        sink: &mut dyn DeclarationSink,
    ) -> SearchResult<usize> {
        if scope.is_empty() {
            return Ok(0);
        }
        let world = self.world(scope, scope.overlay().cloned(), opts)?;
        let overlay = world.overlay();
        let mut listed: Vec<(DocumentKey, Option<&RootIndex>)> = Vec::new();
        let mut seen: BTreeSet<DocumentKey> = BTreeSet::new();
        for snap in world.snapshots() {
            let root = &snap.location().root;
            if !scope.includes_root(root.path()) {
                continue;
            }
            for record in snap.records() {
                let key = root.document(record.entry.clone());
                if opts.participates(&key) && scope.includes(&key) {
                    seen.insert(key.clone());
                    listed.push((key, Some(snap.as_ref())));
                }
            }
        }
        if let Some(o) = overlay {
            for (key, _) in o.live() {
                if opts.participates(&key) && scope.includes(&key) && !seen.contains(&key) {
                    listed.push((key, None));
                }
            }
        }
        listed.sort_by_cached_key(|(k, _)| order_key(k));

        let mut count = 0;
        for (key, snap) in listed {
            if opts.cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            let live = overlay.map(|o| o.contains(&key)).unwrap_or(false);
            let summaries: Vec<DeclSummary> = match (live, snap) {
                (false, Some(s)) => s.record(&key.entry).map(|r| r.summaries.clone()).unwrap_or_default(),
                _ => world.unit(&key).map(|u| summarize(&u.unit)).unwrap_or_default(),
            };
            for d in summaries.iter().filter(|d| query.accepts(d)) {
                sink.accept_declaration(&key, d);
                count += 1;
            }
        }
        Ok(count)
    }
}
