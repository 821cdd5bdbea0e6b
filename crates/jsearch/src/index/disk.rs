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

//! Persisted snapshot of one root.
//!
//! Layout (all integers little endian):
//!
//! ```text
//! header   magic u32 | version u32 | doc_count u32 | meta_off u64 | docs_off u64 | terms_off u64
//! meta     root kind u8 | root path str16 | root signature [32]
//! docs     per doc: entry str16 | signature [32] | n_summaries var | summaries
//! terms    n_terms u32 | per term: term str16 | delta-encoded doc ids
//! ```
//!
//! Offsets are written as placeholders and patched once the sections are
//! known. Documents are numbered in entry order, so posting lists are sorted.

use memmap2::Mmap;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::debug;

use crate::encoder::{DeclSummary, SummaryKind, TermQuery, WILDCARD_TERM};
use crate::error::IndexError;
use crate::types::{ContentSignature, IndexLocation, RootSpec};

use super::codec::{read_postings, skip_postings, write_postings, write_str16, write_var_u32, Cursor};
use super::memory::MemoryIndex;
use super::DocRecord;

pub const MAGIC: u32 = 0x4a53_5258; // 'JSRX'
pub const VERSION: u32 = 2;

const HEADER_LEN: usize = 4 + 4 + 4 + 8 * 3;

pub struct DiskIndex {
    path: PathBuf,
    mmap: Mmap,
    location: IndexLocation,
    docs: Vec<DocRecord>,
    /// Sorted terms with the offset of their posting list.
    terms: Vec<(String, usize)>,
}

impl std::fmt::Debug for DiskIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskIndex")
            .field("path", &self.path)
            .field("docs", &self.docs.len())
            .field("terms", &self.terms.len())
            .finish()
    }
}

fn write_summary<W: Write>(w: &mut W, s: &DeclSummary) -> std::io::Result<()> {
    w.write_all(&[s.kind.code(), s.arity.unwrap_or(u8::MAX)])?;
    w.write_all(&s.modifiers.to_le_bytes())?;
    write_str16(w, &s.name)?;
    write_str16(w, &s.package)?;
    write_str16(w, &s.enclosing)
}

fn read_summary(c: &mut Cursor<'_>) -> Option<DeclSummary> {
    let kind = SummaryKind::from_code(c.u8()?)?;
    let arity = match c.u8()? {
        u8::MAX => None,
        n => Some(n),
    };
    let modifiers = c.u16()?;
    Some(DeclSummary {
        kind,
        arity,
        modifiers,
        name: c.str16()?.to_string(),
        package: c.str16()?.to_string(),
        enclosing: c.str16()?.to_string(),
    })
}

impl DiskIndex {
    /// Persist `index` for `location`, replacing any previous file atomically.
    pub fn write(path: &Path, location: &IndexLocation, index: &MemoryIndex) -> Result<(), IndexError> {
        let started = Instant::now();
        let tmp = path.with_extension("tmp");
        {
            let file = File::create(&tmp)?;
            let mut f = BufWriter::new(file);
            let docs: Vec<&DocRecord> = index.records().collect();

            // Header placeholders; offsets are patched below.
            let mut header = Vec::with_capacity(HEADER_LEN);
            header.extend(&MAGIC.to_le_bytes());
            header.extend(&VERSION.to_le_bytes());
            header.extend(&(docs.len() as u32).to_le_bytes());
            header.extend(&0u64.to_le_bytes()); // meta_off
            header.extend(&0u64.to_le_bytes()); // docs_off
            header.extend(&0u64.to_le_bytes()); // terms_off
            f.write_all(&header)?;

            let meta_off = f.stream_position()?;
            let kind = if location.root.is_archive() { b'A' } else { b'S' };
            f.write_all(&[kind])?;
            write_str16(&mut f, &location.root.path().display().to_string())?;
            f.write_all(&location.signature.0)?;

            let docs_off = f.stream_position()?;
            for d in &docs {
                write_str16(&mut f, &d.entry)?;
                f.write_all(&d.signature.0)?;
                write_var_u32(&mut f, d.summaries.len() as u32)?;
                for s in &d.summaries {
                    write_summary(&mut f, s)?;
                }
            }

            let terms_off = f.stream_position()?;
            let ids: std::collections::HashMap<&str, u32> = docs
                .iter()
                .enumerate()
                .map(|(i, d)| (d.entry.as_str(), i as u32))
                .collect();
            let postings: Vec<(&String, &BTreeSet<String>)> = index.postings().collect();
            let mut buf: Vec<u8> = Vec::new();
            buf.extend(&(postings.len() as u32).to_le_bytes());
            for (term, entries) in postings {
                write_str16(&mut buf, term)?;
                let mut list: Vec<u32> = entries.iter().filter_map(|e| ids.get(e.as_str()).copied()).collect();
                list.sort_unstable();
                write_postings(&mut buf, &list)?;
            }
            f.write_all(&buf)?;

            f.flush()?;
            f.seek(SeekFrom::Start(0))?;
            let mut header2 = Vec::with_capacity(HEADER_LEN);
            header2.extend(&MAGIC.to_le_bytes());
            header2.extend(&VERSION.to_le_bytes());
            header2.extend(&(docs.len() as u32).to_le_bytes());
            header2.extend(&meta_off.to_le_bytes());
            header2.extend(&docs_off.to_le_bytes());
            header2.extend(&terms_off.to_le_bytes());
            f.write_all(&header2)?;
            f.flush()?;
        }
        std::fs::rename(&tmp, path)?;
        debug!(
            path = %path.display(),
            docs = index.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "wrote index file"
        );
        Ok(())
    }

    /// Open a persisted index. The file must describe `expected` exactly;
    /// anything else is reported as an error that
    /// [`IndexError::requires_rebuild`].
    pub fn open(path: &Path, expected: &IndexLocation) -> Result<Self, IndexError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let corrupt = |reason: &str| IndexError::corrupt(path, reason);
        if mmap.len() < HEADER_LEN {
            return Err(corrupt("file too small"));
        }
        let mut c = Cursor::new(&mmap, 0);
        let magic = c.u32().ok_or_else(|| corrupt("truncated magic"))?;
        if magic != MAGIC {
            return Err(corrupt("bad magic"));
        }
        let version = c.u32().ok_or_else(|| corrupt("truncated version"))?;
        if version != VERSION {
            return Err(IndexError::Version {
                path: path.to_path_buf(),
                found: version,
                expected: VERSION,
            });
        }
        let doc_count = c.u32().ok_or_else(|| corrupt("truncated doc count"))? as usize;
        let meta_off = c.u64().ok_or_else(|| corrupt("truncated meta offset"))? as usize;
        let docs_off = c.u64().ok_or_else(|| corrupt("truncated docs offset"))? as usize;
        let terms_off = c.u64().ok_or_else(|| corrupt("truncated terms offset"))? as usize;

        let mut m = Cursor::new(&mmap, meta_off);
        let kind = m.u8().ok_or_else(|| corrupt("truncated root kind"))?;
        let root_path = PathBuf::from(m.str16().ok_or_else(|| corrupt("bad root path"))?);
        let root = match kind {
            b'A' => RootSpec::Archive(root_path),
            b'S' => RootSpec::SourceFolder(root_path),
            _ => return Err(corrupt("bad root kind")),
        };
        let sig: [u8; 32] = m
            .bytes(32)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| corrupt("truncated root signature"))?;
        let location = IndexLocation {
            root,
            signature: ContentSignature(sig),
        };
        if &location != expected {
            return Err(IndexError::Stale {
                path: path.to_path_buf(),
            });
        }

        let mut d = Cursor::new(&mmap, docs_off);
        let mut docs = Vec::with_capacity(doc_count.min(mmap.len()));
        for _ in 0..doc_count {
            let entry = d.str16().ok_or_else(|| corrupt("bad document entry"))?.to_string();
            let sig: [u8; 32] = d
                .bytes(32)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| corrupt("truncated document signature"))?;
            let n = d.var().ok_or_else(|| corrupt("bad summary count"))? as usize;
            let mut summaries = Vec::with_capacity(n.min(1024));
            for _ in 0..n {
                summaries.push(read_summary(&mut d).ok_or_else(|| corrupt("bad summary"))?);
            }
            docs.push(DocRecord {
                entry,
                signature: ContentSignature(sig),
                terms: Vec::new(),
                summaries,
            });
        }

        let mut t = Cursor::new(&mmap, terms_off);
        let n_terms = t.u32().ok_or_else(|| corrupt("truncated term count"))? as usize;
        let mut terms = Vec::with_capacity(n_terms.min(mmap.len()));
        for _ in 0..n_terms {
            let term = t.str16().ok_or_else(|| corrupt("bad term"))?.to_string();
            let off = t.off;
            let n = skip_postings(&mmap, &mut t.off).ok_or_else(|| corrupt("bad posting list"))?;
            if n as usize > doc_count {
                return Err(corrupt("posting list longer than document table"));
            }
            terms.push((term, off));
        }
        if terms.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(corrupt("terms out of order"));
        }
        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            location,
            docs,
            terms,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn location(&self) -> &IndexLocation {
        &self.location
    }

    pub fn records(&self) -> &[DocRecord] {
        &self.docs
    }

    pub fn record(&self, entry: &str) -> Option<&DocRecord> {
        self.docs
            .binary_search_by(|d| d.entry.as_str().cmp(entry))
            .ok()
            .map(|i| &self.docs[i])
    }

    fn postings_at(&self, off: usize) -> Vec<u32> {
        let mut off = off;
        read_postings(&self.mmap, &mut off).unwrap_or_default()
    }

    fn entries_of(&self, off: usize, out: &mut BTreeSet<String>) {
        for id in self.postings_at(off) {
            if let Some(d) = self.docs.get(id as usize) {
                out.insert(d.entry.clone());
            }
        }
    }

    pub fn query(&self, q: &TermQuery, out: &mut BTreeSet<String>) {
        let start = q.scan_start();
        let prefix = q.scan_prefix();
        let first = self.terms.partition_point(|(t, _)| t.as_str() < start.as_str());
        for (term, off) in &self.terms[first..] {
            if !term.starts_with(&prefix) {
                break;
            }
            if q.matches(term) {
                self.entries_of(*off, out);
            }
        }
    }

    pub fn wildcard_bucket(&self, out: &mut BTreeSet<String>) {
        if let Ok(i) = self.terms.binary_search_by(|(t, _)| t.as_str().cmp(WILDCARD_TERM)) {
            self.entries_of(self.terms[i].1, out);
        }
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.terms
            .binary_search_by(|(t, _)| t.as_str().cmp(term))
            .is_ok()
    }

    pub fn has_term_prefix(&self, prefix: &str) -> bool {
        let i = self.terms.partition_point(|(t, _)| t.as_str() < prefix);
        self.terms
            .get(i)
            .map(|(t, _)| t.starts_with(prefix))
            .unwrap_or(false)
    }

    /// Rebuild a mutable copy, restoring per-document term lists.
    pub fn to_memory(&self) -> MemoryIndex {
        let mut per_doc: Vec<Vec<String>> = vec![Vec::new(); self.docs.len()];
        for (term, off) in &self.terms {
            for id in self.postings_at(*off) {
                if let Some(v) = per_doc.get_mut(id as usize) {
                    v.push(term.clone());
                }
            }
        }
        let mut out = MemoryIndex::new();
        for (d, terms) in self.docs.iter().zip(per_doc) {
            out.add(DocRecord {
                terms,
                ..d.clone()
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{NameQuery, TermCategory};
    use crate::syntax::TypeKind;

    fn sample() -> (MemoryIndex, IndexLocation) {
        let mut idx = MemoryIndex::new();
        idx.add(DocRecord {
            entry: "p/A.java".into(),
            signature: ContentSignature::of_bytes(b"a"),
            terms: vec!["typeDecl/a".into(), "typeRef/b".into()],
            summaries: vec![DeclSummary {
                kind: SummaryKind::Type(TypeKind::Class),
                name: "A".into(),
                package: "p".into(),
                enclosing: String::new(),
                arity: None,
                modifiers: 1,
            }],
        });
        idx.add(DocRecord {
            entry: "p/B.java".into(),
            signature: ContentSignature::of_bytes(b"b"),
            terms: vec!["typeDecl/b".into(), WILDCARD_TERM.into()],
            summaries: Vec::new(),
        });
        let loc = IndexLocation {
            root: RootSpec::SourceFolder(PathBuf::from("/ws/src")),
            signature: ContentSignature::of_bytes(b"root"),
        };
        (idx, loc)
    }

    #[test]
    fn write_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.jsx");
        let (idx, loc) = sample();
        DiskIndex::write(&path, &loc, &idx).unwrap();
        let disk = DiskIndex::open(&path, &loc).unwrap();
        assert_eq!(disk.records().len(), 2);
        assert_eq!(disk.record("p/A.java").unwrap().summaries[0].name, "A");

        let mut out = BTreeSet::new();
        disk.query(
            &TermQuery::new(TermCategory::TypeDecl, NameQuery::Prefix(String::new())),
            &mut out,
        );
        assert_eq!(out.len(), 2);

        let mut out = BTreeSet::new();
        disk.wildcard_bucket(&mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec!["p/B.java"]);

        let back = disk.to_memory();
        assert!(back.has_term("typeRef/b"));
        assert_eq!(back.record("p/A.java").unwrap().terms.len(), 2);
    }

    #[test]
    fn stale_version_and_corruption_are_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("root.jsx");
        let (idx, loc) = sample();
        DiskIndex::write(&path, &loc, &idx).unwrap();

        let other = IndexLocation {
            signature: ContentSignature::of_bytes(b"changed"),
            ..loc.clone()
        };
        let err = DiskIndex::open(&path, &other).unwrap_err();
        assert!(matches!(err, IndexError::Stale { .. }));
        assert!(err.requires_rebuild());

        let mut bytes = std::fs::read(&path).unwrap();
        bytes[4] = 99;
        std::fs::write(&path, &bytes).unwrap();
        let err = DiskIndex::open(&path, &loc).unwrap_err();
        assert!(matches!(err, IndexError::Version { found: 99, .. }));

        std::fs::write(&path, &bytes[..20]).unwrap();
        let err = DiskIndex::open(&path, &loc).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt { .. }));
    }
}
