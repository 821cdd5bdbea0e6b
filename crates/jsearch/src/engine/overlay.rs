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


use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::types::{ContentSignature, DocumentKey};

/// Live, unsaved document content owned by the caller.
///
/// A `None` buffer marks a document deleted in the working copy. The engine
/// only reads the registry; callers sharing one registry see each other's
/// edits, callers with separate registries never do.
#[derive(Debug, Default)]
pub struct OverlayRegistry {
    buffers: RwLock<BTreeMap<DocumentKey, Option<Arc<str>>>>,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: DocumentKey, content: impl Into<Arc<str>>) {
        self.buffers.write().insert(key, Some(content.into()));
    }

    pub fn mark_deleted(&self, key: DocumentKey) {
        self.buffers.write().insert(key, None);
    }

    /// Forget the overlay; the backing store is authoritative again.
    pub fn discard(&self, key: &DocumentKey) {
        self.buffers.write().remove(key);
    }

    pub fn clear(&self) {
        self.buffers.write().clear();
    }

    /// `Some(None)` when the document is overlaid as deleted.
    pub fn get(&self, key: &DocumentKey) -> Option<Option<Arc<str>>> {
        self.buffers.read().get(key).cloned()
    }

    pub fn contains(&self, key: &DocumentKey) -> bool {
        self.buffers.read().contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.read().is_empty()
    }

    /// Overlaid documents that have live content.
    pub fn live(&self) -> Vec<(DocumentKey, Arc<str>)> {
        self.buffers
            .read()
            .iter()
            .filter_map(|(k, v)| v.as_ref().map(|c| (k.clone(), c.clone())))
            .collect()
    }

    pub fn signature(&self, key: &DocumentKey) -> Option<ContentSignature> {
        self.get(key)?
            .map(|c| ContentSignature::of_bytes(c.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_documents_are_not_live() {
        let reg = OverlayRegistry::new();
        let a = DocumentKey::source("/ws", "A.java");
        let b = DocumentKey::source("/ws", "B.java");
        reg.set(a.clone(), "class A {}");
        reg.mark_deleted(b.clone());
        assert!(reg.contains(&b));
        assert_eq!(reg.get(&b), Some(None));
        let live = reg.live();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0, a);
        reg.discard(&a);
        assert!(reg.get(&a).is_none());
    }
}
