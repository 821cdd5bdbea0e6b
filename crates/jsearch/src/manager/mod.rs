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


//! Owns one index per root and keeps it current on a background worker.
//!
//! Every root gets a named worker thread fed by an mpsc queue. Jobs queued
//! while the worker is busy are coalesced into one run. Parsing and term
//! encoding fan out over a shared rayon pool. Finished indices are
//! published as whole snapshots, so readers see either the old or the new
//! index and never a mix.

mod enumerate;

pub(crate) use enumerate::read_entry;

use parking_lot::{Condvar, Mutex, RwLock};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::encoder::{encode_unit, summarize};
use crate::error::{IndexError, SearchError, SearchResult};
use crate::index::{index_file_name, DocRecord, RootIndex};
use crate::syntax::parse_document;
use crate::types::{ContainerSpec, ContentSignature, DocumentKey, IndexLocation, RootSpec};

use enumerate::{enumerate, is_indexable, SourceEntry};

const WAIT_SLICE: Duration = Duration::from_millis(20);

/// What a query does about roots whose index is being rebuilt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Block until every queued job of the root has finished.
    WaitUntilReady,
    /// Answer from the last published snapshot, possibly none.
    BestEffort,
}

/// Cooperative cancellation shared between a caller and a running query.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counters describing what the workers have done so far.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    /// Roots parsed and encoded from scratch.
    pub full_builds: usize,
    /// Roots answered by a valid persisted index.
    pub loaded: usize,
    /// Roots that reused the index of another root with identical content.
    pub reused: usize,
    pub updates: usize,
    pub merges: usize,
    pub failures: usize,
}

#[derive(Default)]
struct Counters {
    full_builds: AtomicUsize,
    loaded: AtomicUsize,
    reused: AtomicUsize,
    updates: AtomicUsize,
    merges: AtomicUsize,
    failures: AtomicUsize,
}

impl Counters {
    fn bump(c: &AtomicUsize) {
        c.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RegistryStats {
        RegistryStats {
            full_builds: self.full_builds.load(Ordering::Relaxed),
            loaded: self.loaded.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            merges: self.merges.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

enum Job {
    Full,
    Update(Vec<String>),
    Shutdown,
}

#[derive(Default)]
struct JobState {
    requested: u64,
    completed: u64,
    discarded: bool,
}

/// A root, its published snapshot and its worker.
struct RootSlot {
    spec: RootSpec,
    snapshot: RwLock<Option<Arc<RootIndex>>>,
    state: Mutex<JobState>,
    changed: Condvar,
    cancel: AtomicBool,
    tx: Mutex<Option<Sender<(u64, Job)>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RootSlot {
    fn new(spec: RootSpec, tx: Sender<(u64, Job)>) -> Self {
        Self {
            spec,
            snapshot: RwLock::new(None),
            state: Mutex::new(JobState::default()),
            changed: Condvar::new(),
            cancel: AtomicBool::new(false),
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(None),
        }
    }

    fn submit(&self, job: Job) -> bool {
        let mut state = self.state.lock();
        if state.discarded {
            return false;
        }
        state.requested += 1;
        let generation = state.requested;
        let sent = match self.tx.lock().as_ref() {
            Some(tx) => tx.send((generation, job)).is_ok(),
            None => false,
        };
        if !sent {
            state.completed = state.requested;
            self.changed.notify_all();
        }
        sent
    }

    fn finish(&self, generation: u64) {
        let mut state = self.state.lock();
        state.completed = state.completed.max(generation);
        self.changed.notify_all();
    }

    fn current(&self) -> Option<Arc<RootIndex>> {
        self.snapshot.read().clone()
    }

    /// Cancel the running job, stop the worker and drop the snapshot.
    fn discard(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.lock();
            state.discarded = true;
            self.changed.notify_all();
        }
        if let Some(tx) = self.tx.lock().take() {
            let _ = tx.send((0, Job::Shutdown));
        }
        let handle = self.worker.lock().take();
        if let Some(h) = handle {
            if h.join().is_err() {
                warn!(root = %self.spec.path().display(), "index worker panicked");
            }
        }
        *self.snapshot.write() = None;
    }
}

/// State shared with the workers.
struct Shared {
    config: EngineConfig,
    pool: rayon::ThreadPool,
    /// Last published index per content signature, with the root it was built for.
    built: Mutex<HashMap<ContentSignature, (PathBuf, RootIndex)>>,
    /// Full builds running right now. Lock before `built` when both are needed.
    inflight: Mutex<HashMap<ContentSignature, Arc<InFlight>>>,
    counters: Counters,
}

enum Outcome {
    Running,
    Built(PathBuf, RootIndex),
    Failed,
}

/// A full build one worker runs on behalf of every root with the same content.
struct InFlight {
    outcome: Mutex<Outcome>,
    ready: Condvar,
}

impl InFlight {
    /// Block until the builder settles. `None` means it gave up and the
    /// caller has to build for itself.
    fn wait(&self, cancel: &AtomicBool) -> Result<Option<(PathBuf, RootIndex)>, IndexError> {
        let mut outcome = self.outcome.lock();
        loop {
            match &*outcome {
                Outcome::Running => {}
                Outcome::Built(root, index) => return Ok(Some((root.clone(), index.clone()))),
                Outcome::Failed => return Ok(None),
            }
            if cancel.load(Ordering::SeqCst) {
                return Err(IndexError::Cancelled);
            }
            self.ready.wait_for(&mut outcome, WAIT_SLICE);
        }
    }
}

enum Claim<'a> {
    Reuse(PathBuf, RootIndex),
    Follow(Arc<InFlight>),
    Build(BuildClaim<'a>),
}

/// Held by the worker building a signature. Dropping it unsettled marks the
/// build failed so waiting workers fall back to their own build.
struct BuildClaim<'a> {
    shared: &'a Shared,
    signature: ContentSignature,
    root: PathBuf,
    flight: Arc<InFlight>,
    settled: bool,
}

impl BuildClaim<'_> {
    fn complete(mut self, index: &RootIndex) {
        self.settle(Some(index));
    }

    fn settle(&mut self, index: Option<&RootIndex>) {
        self.settled = true;
        let mut inflight = self.shared.inflight.lock();
        let outcome = match index {
            Some(index) => {
                self.shared
                    .built
                    .lock()
                    .insert(self.signature, (self.root.clone(), index.clone()));
                Outcome::Built(self.root.clone(), index.clone())
            }
            None => Outcome::Failed,
        };
        *self.flight.outcome.lock() = outcome;
        self.flight.ready.notify_all();
        inflight.remove(&self.signature);
    }
}

impl Drop for BuildClaim<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(None);
        }
    }
}

impl Shared {
    fn index_path(&self, root: &RootSpec) -> Option<PathBuf> {
        self.config
            .index_dir
            .as_ref()
            .map(|dir| dir.join(index_file_name(root.path())))
    }

    fn forget_root(&self, root: &Path) {
        self.built.lock().retain(|_, (r, _)| r != root);
    }

    /// Reuse a published twin, wait for a running one, or become its builder.
    fn claim(&self, signature: ContentSignature, root: &Path) -> Claim<'_> {
        let mut inflight = self.inflight.lock();
        let twin = self
            .built
            .lock()
            .get(&signature)
            .filter(|(r, _)| r.as_path() != root)
            .map(|(r, index)| (r.clone(), index.clone()));
        if let Some((other, index)) = twin {
            return Claim::Reuse(other, index);
        }
        if let Some(flight) = inflight.get(&signature) {
            return Claim::Follow(flight.clone());
        }
        let flight = Arc::new(InFlight {
            outcome: Mutex::new(Outcome::Running),
            ready: Condvar::new(),
        });
        inflight.insert(signature, flight.clone());
        Claim::Build(BuildClaim {
            shared: self,
            signature,
            root: root.to_path_buf(),
            flight,
            settled: false,
        })
    }
}

struct Inner {
    shared: Arc<Shared>,
    containers: RwLock<BTreeMap<String, ContainerSpec>>,
    slots: Mutex<BTreeMap<RootSpec, Arc<RootSlot>>>,
    shut_down: AtomicBool,
    next_worker: AtomicUsize,
}

impl Inner {
    fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let slots: Vec<Arc<RootSlot>> = std::mem::take(&mut *self.slots.lock()).into_values().collect();
        for slot in &slots {
            slot.discard();
        }
        self.containers.write().clear();
        self.shared.inflight.lock().clear();
        self.shared.built.lock().clear();
        info!(roots = slots.len(), "index registry shut down");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Every root index of one engine. Cloning shares the registry.
#[derive(Clone)]
pub struct IndexRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for IndexRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexRegistry")
            .field("roots", &self.roots().len())
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

impl IndexRegistry {
    pub fn new(config: EngineConfig) -> Result<Self, IndexError> {
        let threads = config.effective_index_threads();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("jsearch-encode-{}", i))
            .build()?;
        if let Some(dir) = &config.index_dir {
            fs::create_dir_all(dir)?;
        }
        debug!(threads, index_dir = ?config.index_dir, "index registry created");
        Ok(Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    config,
                    pool,
                    built: Mutex::new(HashMap::new()),
                    inflight: Mutex::new(HashMap::new()),
                    counters: Counters::default(),
                }),
                containers: RwLock::new(BTreeMap::new()),
                slots: Mutex::new(BTreeMap::new()),
                shut_down: AtomicBool::new(false),
                next_worker: AtomicUsize::new(0),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.shared.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> RegistryStats {
        self.inner.shared.counters.snapshot()
    }

    /// Register or replace a container. New roots start indexing at once;
    /// roots no container references any more are discarded.
    pub fn add_container(&self, spec: ContainerSpec) -> Result<(), IndexError> {
        if self.is_shut_down() {
            return Err(IndexError::ShutDown);
        }
        {
            let mut containers = self.inner.containers.write();
            let mut slots = self.inner.slots.lock();
            for root in &spec.roots {
                if slots.contains_key(root) {
                    continue;
                }
                let slot = self.spawn(root.clone())?;
                slot.submit(Job::Full);
                slots.insert(root.clone(), slot);
            }
            info!(container = %spec.id, roots = spec.roots.len(), "registered container");
            containers.insert(spec.id.clone(), spec);
        }
        self.release_unreferenced();
        Ok(())
    }

    /// Returns whether the container was known.
    pub fn remove_container(&self, id: &str) -> bool {
        let removed = self.inner.containers.write().remove(id).is_some();
        if removed {
            info!(container = %id, "removed container");
            self.release_unreferenced();
        }
        removed
    }

    pub fn containers(&self) -> Vec<ContainerSpec> {
        self.inner.containers.read().values().cloned().collect()
    }

    /// Registered roots in path order.
    pub fn roots(&self) -> Vec<RootSpec> {
        let mut roots: Vec<RootSpec> = self.inner.slots.lock().keys().cloned().collect();
        roots.sort_by(|a, b| a.path().cmp(b.path()).then(a.is_archive().cmp(&b.is_archive())));
        roots
    }

    pub fn root_spec(&self, path: &Path) -> Option<RootSpec> {
        self.slot(path).map(|s| s.spec.clone())
    }

    fn slot(&self, path: &Path) -> Option<Arc<RootSlot>> {
        self.inner
            .slots
            .lock()
            .iter()
            .find(|(spec, _)| spec.path() == path)
            .map(|(_, slot)| slot.clone())
    }

    fn spawn(&self, spec: RootSpec) -> Result<Arc<RootSlot>, IndexError> {
        let (tx, rx) = mpsc::channel();
        let slot = Arc::new(RootSlot::new(spec, tx));
        let n = self.inner.next_worker.fetch_add(1, Ordering::Relaxed);
        let worker_slot = slot.clone();
        let shared = self.inner.shared.clone();
        let handle = thread::Builder::new()
            .name(format!("jsearch-root-{}", n))
            .spawn(move || worker_loop(worker_slot, shared, rx))?;
        *slot.worker.lock() = Some(handle);
        Ok(slot)
    }

    fn release_unreferenced(&self) {
        let referenced: BTreeSet<RootSpec> = self
            .inner
            .containers
            .read()
            .values()
            .flat_map(|c| c.roots.iter().cloned())
            .collect();
        let dropped: Vec<Arc<RootSlot>> = {
            let mut slots = self.inner.slots.lock();
            let gone: Vec<RootSpec> = slots
                .keys()
                .filter(|k| !referenced.contains(*k))
                .cloned()
                .collect();
            gone.iter().filter_map(|k| slots.remove(k)).collect()
        };
        for slot in dropped {
            info!(root = %slot.spec.path().display(), "discarding root index");
            slot.discard();
            self.inner.shared.forget_root(slot.spec.path());
        }
    }

    /// Snapshot of a root. Unknown roots, including roots removed while a
    /// query runs, answer `None`.
    pub fn snapshot(
        &self,
        root: &Path,
        policy: WaitPolicy,
        cancel: &CancellationToken,
    ) -> SearchResult<Option<Arc<RootIndex>>> {
        if self.is_shut_down() {
            return Err(SearchError::ShutDown);
        }
        let Some(slot) = self.slot(root) else {
            return Ok(None);
        };
        if policy == WaitPolicy::WaitUntilReady {
            self.wait_current(&slot, cancel)?;
        }
        Ok(slot.current())
    }

    fn wait_current(&self, slot: &RootSlot, cancel: &CancellationToken) -> SearchResult<()> {
        let mut state = slot.state.lock();
        let target = state.requested;
        while state.completed < target && !state.discarded {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled);
            }
            if self.is_shut_down() {
                return Err(SearchError::ShutDown);
            }
            slot.changed.wait_for(&mut state, WAIT_SLICE);
        }
        Ok(())
    }

    /// Re-encode the named entries of a root. Returns false for unknown roots.
    pub fn notify_changed(&self, root: &Path, entries: Vec<String>) -> bool {
        match self.slot(root) {
            Some(slot) => {
                debug!(root = %root.display(), entries = entries.len(), "change notification");
                slot.submit(Job::Update(entries))
            }
            None => false,
        }
    }

    /// Rebuild a root from scratch. Returns false for unknown roots.
    pub fn request_reindex(&self, root: &Path) -> bool {
        match self.slot(root) {
            Some(slot) => slot.submit(Job::Full),
            None => false,
        }
    }

    /// Block until every queued job has finished.
    pub fn wait_idle(&self) -> SearchResult<()> {
        let token = CancellationToken::new();
        let slots: Vec<Arc<RootSlot>> = self.inner.slots.lock().values().cloned().collect();
        for slot in slots {
            self.wait_current(&slot, &token)?;
        }
        Ok(())
    }

    /// Current content of a document from its root.
    pub fn read_document(&self, key: &DocumentKey) -> Result<Vec<u8>, IndexError> {
        read_entry(key)
    }

    /// Stop every worker and drop every index. Later queries fail with
    /// [`SearchError::ShutDown`].
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

fn worker_loop(slot: Arc<RootSlot>, shared: Arc<Shared>, rx: Receiver<(u64, Job)>) {
    let root = slot.spec.path().display().to_string();
    debug!(root = %root, "index worker started");
    while let Ok((generation, job)) = rx.recv() {
        let mut target = generation;
        let mut full = false;
        let mut changed: BTreeSet<String> = BTreeSet::new();
        let mut stop = false;
        let mut absorb = |job: Job| match job {
            Job::Full => full = true,
            Job::Update(entries) => changed.extend(entries),
            Job::Shutdown => stop = true,
        };
        absorb(job);
        // coalesce whatever queued up meanwhile
        while let Ok((g, j)) = rx.try_recv() {
            target = target.max(g);
            absorb(j);
        }
        if stop || slot.cancel.load(Ordering::SeqCst) {
            break;
        }

        let started = Instant::now();
        let current = slot.current();
        let result = match current {
            Some(cur) if !full => apply_update(&slot, &shared, &cur, changed),
            cur => build_full(&slot, &shared, cur.as_deref()),
        };
        match result {
            Ok(index) => {
                let docs = index.len();
                shared
                    .built
                    .lock()
                    .retain(|_, (r, _)| r.as_path() != slot.spec.path());
                shared.built.lock().insert(
                    index.location().signature,
                    (slot.spec.path().to_path_buf(), index.clone()),
                );
                *slot.snapshot.write() = Some(Arc::new(index));
                info!(
                    root = %root,
                    docs,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "published root index"
                );
            }
            Err(IndexError::Cancelled) => debug!(root = %root, "index job cancelled"),
            Err(IndexError::MissingRoot(p)) => {
                Counters::bump(&shared.counters.failures);
                warn!(root = %p.display(), "root is missing; it answers no matches");
                *slot.snapshot.write() = None;
            }
            Err(e) => {
                Counters::bump(&shared.counters.failures);
                warn!(root = %root, error = %e, "index job failed; keeping last snapshot");
            }
        }
        slot.finish(target);
    }
    slot.finish(u64::MAX);
    debug!(root = %root, "index worker stopped");
}

fn encode_entry(spec: &RootSpec, entry: SourceEntry, signature: ContentSignature) -> DocRecord {
    let key = spec.document(entry.entry.clone());
    match parse_document(&key, &entry.bytes) {
        Ok(unit) => DocRecord {
            entry: entry.entry,
            signature,
            terms: encode_unit(&unit),
            summaries: summarize(&unit),
        },
        Err(e) => {
            debug!(document = %key, error = %e, "document not indexed");
            DocRecord {
                entry: entry.entry,
                signature,
                terms: Vec::new(),
                summaries: Vec::new(),
            }
        }
    }
}

/// Per-entry signatures and the signature of the whole root.
fn signatures(entries: &[SourceEntry]) -> (Vec<ContentSignature>, ContentSignature) {
    let sigs: Vec<ContentSignature> = entries
        .iter()
        .map(|e| ContentSignature::of_bytes(&e.bytes))
        .collect();
    let signature = ContentSignature::of_entries(entries.iter().zip(&sigs).map(|(e, s)| (e.entry.as_str(), s)));
    (sigs, signature)
}

fn build_full(slot: &RootSlot, shared: &Shared, current: Option<&RootIndex>) -> Result<RootIndex, IndexError> {
    let entries = enumerate(&slot.spec, &shared.config, &slot.cancel)?;
    let (sigs, signature) = signatures(&entries);
    let location = IndexLocation {
        root: slot.spec.clone(),
        signature,
    };
    if let Some(cur) = current {
        if cur.location() == &location {
            debug!(root = %slot.spec.path().display(), "root unchanged");
            return Ok(cur.clone());
        }
    }

    let path = shared.index_path(&slot.spec);
    if let Some(p) = &path {
        match RootIndex::load(p, &location) {
            Ok(Some(index)) => {
                Counters::bump(&shared.counters.loaded);
                info!(root = %slot.spec.path().display(), file = %p.display(), "loaded persisted index");
                return Ok(index);
            }
            Ok(None) => {}
            Err(e) => warn!(file = %p.display(), error = %e, "could not read persisted index"),
        }
    }

    let claim = loop {
        let (other, index) = match shared.claim(signature, slot.spec.path()) {
            Claim::Build(claim) => break claim,
            Claim::Reuse(other, index) => (other, index),
            Claim::Follow(flight) => {
                debug!(root = %slot.spec.path().display(), "waiting for identical root");
                match flight.wait(&slot.cancel)? {
                    Some(found) => found,
                    None => continue,
                }
            }
        };
        Counters::bump(&shared.counters.reused);
        info!(
            root = %slot.spec.path().display(),
            same_as = %other.display(),
            "reusing index of identical root"
        );
        return Ok(index.relocated(location));
    };

    let started = Instant::now();
    let count = entries.len();
    let cancel = &slot.cancel;
    let records: Option<Vec<DocRecord>> = shared.pool.install(|| {
        entries
            .into_par_iter()
            .zip(sigs.into_par_iter())
            .map(|(entry, sig)| {
                if cancel.load(Ordering::Relaxed) {
                    None
                } else {
                    Some(encode_entry(&slot.spec, entry, sig))
                }
            })
            .collect()
    });
    let records = records.ok_or(IndexError::Cancelled)?;
    let index = RootIndex::from_records(location, records);
    let index = match &path {
        Some(p) => index.merged(Some(p))?,
        None => index,
    };
    claim.complete(&index);
    Counters::bump(&shared.counters.full_builds);
    info!(
        root = %slot.spec.path().display(),
        docs = count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "built root index"
    );
    Ok(index)
}

/// Re-encode changed entries of a source folder into the delta. Archives
/// change as a whole and are rebuilt.
fn apply_update(
    slot: &RootSlot,
    shared: &Shared,
    current: &RootIndex,
    changed: BTreeSet<String>,
) -> Result<RootIndex, IndexError> {
    if slot.spec.is_archive() {
        return build_full(slot, shared, Some(current));
    }
    let root = slot.spec.path();
    if !root.is_dir() {
        return Err(IndexError::MissingRoot(root.to_path_buf()));
    }
    let max = shared.config.max_file_size;
    let changes: Vec<(String, Option<DocRecord>)> = shared.pool.install(|| {
        changed
            .into_par_iter()
            .filter_map(|entry| {
                let path = root.join(&entry);
                let bytes = match fs::metadata(&path) {
                    Ok(m) if m.is_file() && m.len() <= max && is_indexable(&entry, false) => {
                        fs::read(&path).ok()
                    }
                    _ => None,
                };
                match bytes {
                    Some(bytes) => {
                        let sig = ContentSignature::of_bytes(&bytes);
                        if current.record(&entry).map(|r| r.signature) == Some(sig) {
                            return None;
                        }
                        let record = encode_entry(&slot.spec, SourceEntry { entry: entry.clone(), bytes }, sig);
                        Some((entry, Some(record)))
                    }
                    None => current.record(&entry).map(|_| (entry, None)),
                }
            })
            .collect()
    });
    if changes.is_empty() {
        return Ok(current.clone());
    }
    Counters::bump(&shared.counters.updates);
    debug!(root = %root.display(), changed = changes.len(), "applying delta");
    let next = current.with_changes(changes);
    if next.pending() >= shared.config.merge_threshold {
        Counters::bump(&shared.counters.merges);
        return next.merged(shared.index_path(&slot.spec).as_deref());
    }
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{NameQuery, TermCategory, TermQuery};
    use crate::test_helpers::write_sources;

    fn registry(config: EngineConfig) -> IndexRegistry {
        IndexRegistry::new(config).expect("registry")
    }

    fn has_type(index: &RootIndex, name: &str) -> bool {
        !index
            .candidates(&[TermQuery::new(TermCategory::TypeDecl, NameQuery::Exact(name.to_lowercase()))])
            .is_empty()
    }

    #[test]
    fn wait_until_ready_sees_the_built_index() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path(), &[("p/A.java", "package p; class A {}")]).unwrap();
        let reg = registry(EngineConfig::default());
        reg.add_container(ContainerSpec::new("c").with_source_folder(dir.path()))
            .unwrap();
        let snap = reg
            .snapshot(dir.path(), WaitPolicy::WaitUntilReady, &CancellationToken::new())
            .unwrap()
            .expect("snapshot");
        assert_eq!(snap.len(), 1);
        assert!(has_type(&snap, "A"));
        assert_eq!(reg.stats().full_builds, 1);
    }

    #[test]
    fn change_notification_updates_only_the_delta() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path(), &[("A.java", "class A {}"), ("B.java", "class B {}")]).unwrap();
        let reg = registry(EngineConfig::default());
        reg.add_container(ContainerSpec::new("c").with_source_folder(dir.path()))
            .unwrap();
        reg.wait_idle().unwrap();
        write_sources(dir.path(), &[("C.java", "class C {}")]).unwrap();
        fs::remove_file(dir.path().join("B.java")).unwrap();
        assert!(reg.notify_changed(dir.path(), vec!["C.java".into(), "B.java".into()]));
        let snap = reg
            .snapshot(dir.path(), WaitPolicy::WaitUntilReady, &CancellationToken::new())
            .unwrap()
            .expect("snapshot");
        assert!(has_type(&snap, "C"));
        assert!(!has_type(&snap, "B"));
        assert_eq!(snap.pending(), 2);
        assert_eq!(reg.stats().updates, 1);
        assert_eq!(reg.stats().full_builds, 1);
    }

    #[test]
    fn identical_roots_queued_together_build_once() {
        let dir = tempfile::tempdir().unwrap();
        let files: Vec<(String, String)> = (0..200)
            .map(|i| (format!("p/C{i}.java"), format!("package p; class C{i} {{ int f{i}; }}")))
            .collect();
        let files: Vec<(&str, &str)> = files.iter().map(|(e, c)| (e.as_str(), c.as_str())).collect();
        let one = dir.path().join("one");
        let two = dir.path().join("two");
        write_sources(&one, &files).unwrap();
        write_sources(&two, &files).unwrap();
        let reg = registry(EngineConfig {
            index_threads: Some(2),
            ..EngineConfig::default()
        });
        reg.add_container(ContainerSpec::new("c").with_source_folder(&one).with_source_folder(&two))
            .unwrap();
        reg.wait_idle().unwrap();
        let stats = reg.stats();
        assert_eq!((stats.full_builds, stats.reused), (1, 1));
        for root in [&one, &two] {
            let snap = reg
                .snapshot(root, WaitPolicy::BestEffort, &CancellationToken::new())
                .unwrap()
                .expect("snapshot");
            assert_eq!(snap.location().root.path(), root.as_path());
            assert_eq!(snap.len(), 200);
            assert!(has_type(&snap, "C199"));
        }
        assert!(reg.inner.shared.inflight.lock().is_empty());
    }

    /// Park a fake build of `dir`'s content so its worker has to wait on it.
    fn park_build(reg: &IndexRegistry, dir: &Path) -> Arc<InFlight> {
        let spec = RootSpec::SourceFolder(dir.to_path_buf());
        let entries = enumerate(&spec, reg.config(), &AtomicBool::new(false)).unwrap();
        let (_, signature) = signatures(&entries);
        let flight = Arc::new(InFlight {
            outcome: Mutex::new(Outcome::Running),
            ready: Condvar::new(),
        });
        reg.inner.shared.inflight.lock().insert(signature, flight.clone());
        flight
    }

    fn settle(flight: &InFlight, outcome: Outcome) {
        *flight.outcome.lock() = outcome;
        flight.ready.notify_all();
    }

    #[test]
    fn best_effort_answers_while_a_job_is_running() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path(), &[("p/A.java", "package p; class A {}")]).unwrap();
        let reg = registry(EngineConfig::default());
        let flight = park_build(&reg, dir.path());
        reg.add_container(ContainerSpec::new("c").with_source_folder(dir.path()))
            .unwrap();

        let none = reg
            .snapshot(dir.path(), WaitPolicy::BestEffort, &CancellationToken::new())
            .unwrap();
        assert!(none.is_none());
        let cancelled = CancellationToken::new();
        cancelled.cancel();
        assert!(matches!(
            reg.snapshot(dir.path(), WaitPolicy::WaitUntilReady, &cancelled),
            Err(SearchError::Cancelled)
        ));

        // the parked builder gives up, so the worker builds on its own
        reg.inner.shared.inflight.lock().clear();
        settle(&flight, Outcome::Failed);
        reg.wait_idle().unwrap();
        let snap = reg
            .snapshot(dir.path(), WaitPolicy::BestEffort, &CancellationToken::new())
            .unwrap()
            .expect("snapshot");
        assert!(has_type(&snap, "A"));
        assert_eq!((reg.stats().full_builds, reg.stats().reused), (1, 0));
    }

    #[test]
    fn waiting_worker_relocates_the_finished_twin() {
        let files = [("p/A.java", "package p; class A {}")];
        let dir = tempfile::tempdir().unwrap();
        let one = dir.path().join("one");
        let two = dir.path().join("two");
        write_sources(&one, &files).unwrap();
        write_sources(&two, &files).unwrap();
        let reg = registry(EngineConfig::default());
        reg.add_container(ContainerSpec::new("one").with_source_folder(&one))
            .unwrap();
        reg.wait_idle().unwrap();
        let built = reg
            .snapshot(&one, WaitPolicy::BestEffort, &CancellationToken::new())
            .unwrap()
            .expect("snapshot");
        reg.inner.shared.built.lock().clear();

        let flight = park_build(&reg, &two);
        reg.add_container(ContainerSpec::new("two").with_source_folder(&two))
            .unwrap();
        assert!(reg
            .snapshot(&two, WaitPolicy::BestEffort, &CancellationToken::new())
            .unwrap()
            .is_none());
        settle(&flight, Outcome::Built(one.clone(), (*built).clone()));
        reg.wait_idle().unwrap();

        let snap = reg
            .snapshot(&two, WaitPolicy::BestEffort, &CancellationToken::new())
            .unwrap()
            .expect("snapshot");
        assert_eq!(snap.location().root.path(), two.as_path());
        assert!(has_type(&snap, "A"));
        assert_eq!((reg.stats().full_builds, reg.stats().reused), (1, 1));
    }

    #[test]
    fn removing_the_last_container_discards_the_root() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(dir.path(), &[("A.java", "class A {}")]).unwrap();
        let reg = registry(EngineConfig::default());
        reg.add_container(ContainerSpec::new("one").with_source_folder(dir.path()))
            .unwrap();
        reg.add_container(ContainerSpec::new("two").with_source_folder(dir.path()))
            .unwrap();
        reg.wait_idle().unwrap();
        assert_eq!(reg.roots().len(), 1);
        assert!(reg.remove_container("one"));
        assert_eq!(reg.roots().len(), 1);
        assert!(reg.remove_container("two"));
        assert!(reg.roots().is_empty());
        let snap = reg
            .snapshot(dir.path(), WaitPolicy::WaitUntilReady, &CancellationToken::new())
            .unwrap();
        assert!(snap.is_none());
        assert!(!reg.notify_changed(dir.path(), vec!["A.java".into()]));
    }

    #[test]
    fn missing_root_answers_nothing_and_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let reg = registry(EngineConfig::default());
        reg.add_container(ContainerSpec::new("c").with_source_folder(dir.path().join("absent")))
            .unwrap();
        reg.wait_idle().unwrap();
        let snap = reg
            .snapshot(&dir.path().join("absent"), WaitPolicy::BestEffort, &CancellationToken::new())
            .unwrap();
        assert!(snap.is_none());
        assert_eq!(reg.stats().failures, 1);
    }

    #[test]
    fn shut_down_registry_refuses_queries() {
        let reg = registry(EngineConfig::default());
        reg.shutdown();
        assert!(matches!(
            reg.snapshot(Path::new("/x"), WaitPolicy::BestEffort, &CancellationToken::new()),
            Err(SearchError::ShutDown)
        ));
        assert!(matches!(
            reg.add_container(ContainerSpec::new("c")),
            Err(IndexError::ShutDown)
        ));
    }
}
