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

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

use crate::manager::WaitPolicy;

/// Engine-wide settings shared by the registry and the orchestrator.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Directory for persisted root indices. `None` keeps everything in memory.
    pub index_dir: Option<PathBuf>,
    /// Number of delta documents tolerated before the delta is merged.
    pub merge_threshold: usize,
    pub parse_cache_capacity: usize,
    pub index_threads: Option<usize>,
    pub max_file_size: u64,
    pub include_hidden: bool,
    pub wait: WaitPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index_dir: None,
            merge_threshold: 64,
            parse_cache_capacity: 256,
            index_threads: None,
            max_file_size: 1_000_000,
            include_hidden: false,
            wait: WaitPolicy::WaitUntilReady,
        }
    }
}

impl EngineConfig {
    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = Some(dir.into());
        self
    }

    pub fn with_merge_threshold(mut self, n: usize) -> Self {
        self.merge_threshold = n.max(1);
        self
    }

    /// Thread count for the per-root indexing pool.
    pub fn effective_index_threads(&self) -> usize {
        let avail = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        self.index_threads
            .unwrap_or_else(|| avail.min(8))
            .min(avail)
            .max(1)
    }
}

/// On-disk shape of the configuration file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    index_dir: Option<PathBuf>,
    merge_threshold: Option<usize>,
    parse_cache_capacity: Option<usize>,
    index_threads: Option<usize>,
    max_file_size: Option<u64>,
    include_hidden: Option<bool>,
    wait: Option<String>,
}

/// CLI-level options that binaries pass to `load_config`.
#[derive(Clone, Debug, Default)]
pub struct MergeOpts {
    pub config_path: Option<PathBuf>,
    pub cli_index_dir: Option<PathBuf>,
    pub cli_index_threads: Option<usize>,
    pub cli_best_effort: bool,
}

fn parse_wait(s: &str) -> Option<WaitPolicy> {
    match s.trim().to_ascii_lowercase().as_str() {
        "wait" | "wait-until-ready" | "wait_until_ready" => Some(WaitPolicy::WaitUntilReady),
        "best-effort" | "best_effort" | "besteffort" => Some(WaitPolicy::BestEffort),
        _ => None,
    }
}

/// Load and merge an EngineConfig from: defaults <- config file <- env vars <- CLI
pub fn load_config(mut base: EngineConfig, opts: MergeOpts) -> Result<EngineConfig> {
    if let Some(path) = opts.config_path.as_ref() {
        if path.exists() {
            let s = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            let file: FileConfig = toml::from_str(&s)
                .with_context(|| format!("failed to parse config {}", path.display()))?;
            if let Some(dir) = file.index_dir {
                base.index_dir = Some(dir);
            }
            if let Some(n) = file.merge_threshold {
                base.merge_threshold = n.max(1);
            }
            if let Some(n) = file.parse_cache_capacity {
                base.parse_cache_capacity = n.max(1);
            }
            if let Some(n) = file.index_threads {
                base.index_threads = Some(n.max(1));
            }
            if let Some(n) = file.max_file_size {
                base.max_file_size = n;
            }
            if let Some(h) = file.include_hidden {
                base.include_hidden = h;
            }
            if let Some(w) = file.wait.as_deref().and_then(parse_wait) {
                base.wait = w;
            }
        }
    }

    // env vars override file
    if let Ok(dir) = std::env::var("JSEARCH_INDEX_DIR") {
        if !dir.is_empty() {
            base.index_dir = Some(PathBuf::from(dir));
        }
    }
    if let Ok(v) = std::env::var("JSEARCH_MERGE_THRESHOLD") {
        if let Ok(n) = v.parse::<usize>() {
            base.merge_threshold = n.max(1);
        }
    }
    if let Ok(v) = std::env::var("JSEARCH_PARSE_CACHE") {
        if let Ok(n) = v.parse::<usize>() {
            base.parse_cache_capacity = n.max(1);
        }
    }
    if let Ok(v) = std::env::var("JSEARCH_INDEX_THREADS") {
        if let Ok(n) = v.parse::<usize>() {
            base.index_threads = Some(n.max(1));
        }
    }
    if let Ok(v) = std::env::var("JSEARCH_MAX_FILE_SIZE") {
        if let Ok(n) = v.parse::<u64>() {
            base.max_file_size = n;
        }
    }

    // CLI overrides everything
    if let Some(dir) = opts.cli_index_dir {
        base.index_dir = Some(dir);
    }
    if let Some(n) = opts.cli_index_threads {
        base.index_threads = Some(n.max(1));
    }
    if opts.cli_best_effort {
        base.wait = WaitPolicy::BestEffort;
    }

    Ok(base)
}
