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


use ignore::WalkBuilder;
use std::fs::{self, File};
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use zip::ZipArchive;

use crate::config::EngineConfig;
use crate::error::IndexError;
use crate::types::{DocumentKey, RootSpec};

/// One document read from a root.
#[derive(Debug)]
pub(crate) struct SourceEntry {
    pub entry: String,
    pub bytes: Vec<u8>,
}

/// Whether a root-relative entry is something the indexer understands.
pub(crate) fn is_indexable(entry: &str, in_archive: bool) -> bool {
    entry.ends_with(".java") || (in_archive && entry.ends_with(".class"))
}

/// Read every indexable document of `root`. Checks `cancel` between files.
pub(crate) fn enumerate(
    root: &RootSpec,
    config: &EngineConfig,
    cancel: &AtomicBool,
) -> Result<Vec<SourceEntry>, IndexError> {
    let path = root.path();
    match root {
        RootSpec::SourceFolder(_) if !path.is_dir() => Err(IndexError::MissingRoot(path.to_path_buf())),
        RootSpec::Archive(_) if !path.is_file() => Err(IndexError::MissingRoot(path.to_path_buf())),
        RootSpec::SourceFolder(_) => walk_folder(path, config, cancel),
        RootSpec::Archive(_) => read_archive(path, config, cancel),
    }
}

fn walk_folder(root: &Path, config: &EngineConfig, cancel: &AtomicBool) -> Result<Vec<SourceEntry>, IndexError> {
    let mut builder = WalkBuilder::new(root);
    builder.hidden(!config.include_hidden);
    builder.git_ignore(true);
    builder.max_filesize(Some(config.max_file_size));
    let mut out = Vec::new();
    for dent in builder.build() {
        if cancel.load(Ordering::Relaxed) {
            return Err(IndexError::Cancelled);
        }
        let dent = match dent {
            Ok(d) => d,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "skipping unreadable path");
                continue;
            }
        };
        if !dent.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let Some(entry) = relative_entry(root, dent.path()) else {
            continue;
        };
        if !is_indexable(&entry, false) {
            continue;
        }
        match fs::read(dent.path()) {
            Ok(bytes) => out.push(SourceEntry { entry, bytes }),
            Err(e) => debug!(path = %dent.path().display(), error = %e, "skipping unreadable file"),
        }
    }
    out.sort_by(|a, b| a.entry.cmp(&b.entry));
    Ok(out)
}

/// `/`-separated path of `path` below `root`.
pub(crate) fn relative_entry(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

fn read_archive(path: &Path, config: &EngineConfig, cancel: &AtomicBool) -> Result<Vec<SourceEntry>, IndexError> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        if cancel.load(Ordering::Relaxed) {
            return Err(IndexError::Cancelled);
        }
        let mut file = archive.by_index(i)?;
        if file.is_dir() || file.size() > config.max_file_size {
            continue;
        }
        let entry = file.name().trim_start_matches('/').to_string();
        if !is_indexable(&entry, true) {
            continue;
        }
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        out.push(SourceEntry { entry, bytes });
    }
    out.sort_by(|a, b| a.entry.cmp(&b.entry));
    Ok(out)
}

/// Current content of one document from its backing store.
pub(crate) fn read_entry(key: &DocumentKey) -> Result<Vec<u8>, IndexError> {
    if !key.in_archive {
        return Ok(fs::read(key.file_path())?);
    }
    let mut archive = ZipArchive::new(File::open(&key.root)?)?;
    let mut file = archive.by_name(&key.entry)?;
    let mut bytes = Vec::with_capacity(file.size() as usize);
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{write_jar, write_sources, ClassFileBuilder};

    #[test]
    fn folder_walk_keeps_java_sources_only() {
        let dir = tempfile::tempdir().unwrap();
        write_sources(
            dir.path(),
            &[
                ("p/A.java", "package p; class A {}"),
                ("p/notes.txt", "not java"),
                ("q/r/B.java", "package q.r; class B {}"),
            ],
        )
        .unwrap();
        let root = RootSpec::SourceFolder(dir.path().to_path_buf());
        let found = enumerate(&root, &EngineConfig::default(), &AtomicBool::new(false)).unwrap();
        let entries: Vec<&str> = found.iter().map(|e| e.entry.as_str()).collect();
        assert_eq!(entries, vec!["p/A.java", "q/r/B.java"]);
    }

    #[test]
    fn oversized_sources_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let big = format!("class Big {{ /* {} */ }}", "x".repeat(200));
        write_sources(dir.path(), &[("Big.java", big.as_str()), ("Small.java", "class Small {}")]).unwrap();
        let config = EngineConfig {
            max_file_size: 100,
            ..EngineConfig::default()
        };
        let root = RootSpec::SourceFolder(dir.path().to_path_buf());
        let found = enumerate(&root, &config, &AtomicBool::new(false)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entry, "Small.java");
    }

    #[test]
    fn archives_contribute_classes_and_attached_sources() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("lib.jar");
        write_jar(
            &jar,
            &[
                ("p/A.class", ClassFileBuilder::new("p/A").build()),
                ("p/A.java", b"package p; public class A {}".to_vec()),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n".to_vec()),
            ],
        )
        .unwrap();
        let root = RootSpec::Archive(jar.clone());
        let found = enumerate(&root, &EngineConfig::default(), &AtomicBool::new(false)).unwrap();
        let entries: Vec<&str> = found.iter().map(|e| e.entry.as_str()).collect();
        assert_eq!(entries, vec!["p/A.class", "p/A.java"]);
        let bytes = read_entry(&DocumentKey::archive_entry(&jar, "p/A.java")).unwrap();
        assert_eq!(bytes, b"package p; public class A {}".to_vec());
    }

    #[test]
    fn missing_roots_and_cancellation_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let gone = RootSpec::SourceFolder(dir.path().join("nope"));
        assert!(matches!(
            enumerate(&gone, &EngineConfig::default(), &AtomicBool::new(false)),
            Err(IndexError::MissingRoot(_))
        ));
        write_sources(dir.path(), &[("A.java", "class A {}")]).unwrap();
        let root = RootSpec::SourceFolder(dir.path().to_path_buf());
        assert!(matches!(
            enumerate(&root, &EngineConfig::default(), &AtomicBool::new(true)),
            Err(IndexError::Cancelled)
        ));
    }
}
