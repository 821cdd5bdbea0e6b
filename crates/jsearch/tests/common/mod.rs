#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Once;

pub use tempfile;

use jsearch::test_helpers::write_sources;
use jsearch::{
    CollectingSink, ContainerSpec, EngineConfig, Pattern, SearchEngine, SearchMatch, SearchOptions, SearchScope,
};

static INIT: Once = Once::new();

/// Route engine logs through the test harness once per binary.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Create a temporary directory and return its guard.
pub fn new_repo() -> tempfile::TempDir {
    tempfile::tempdir().expect("create tempdir")
}

/// Write a file relative to the repo root.
pub fn write_file(repo: &Path, rel: &str, contents: &str) {
    let p = repo.join(rel);
    if let Some(parent) = p.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(p, contents).expect("write file");
}

/// A source folder registered with a fresh engine and fully indexed.
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub src: PathBuf,
    pub engine: SearchEngine,
}

impl Workspace {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self::with_config(files, EngineConfig::default())
    }

    pub fn with_config(files: &[(&str, &str)], config: EngineConfig) -> Self {
        init_test_logging();
        let dir = new_repo();
        let src = dir.path().join("src");
        std::fs::create_dir_all(&src).expect("create src");
        write_sources(&src, files).expect("write sources");
        let engine = SearchEngine::new(EngineConfig {
            index_threads: Some(2),
            ..config
        })
        .expect("engine");
        engine
            .registry()
            .add_container(ContainerSpec::new("app").with_source_folder(&src))
            .expect("add container");
        engine.registry().wait_idle().expect("index");
        Self { dir, src, engine }
    }

    pub fn search(&self, pattern: &Pattern) -> Vec<SearchMatch> {
        self.search_in(pattern, &SearchScope::Everything)
    }

    pub fn search_in(&self, pattern: &Pattern, scope: &SearchScope) -> Vec<SearchMatch> {
        let mut sink = CollectingSink::new();
        self.engine
            .search(pattern, scope, &SearchOptions::default(), &mut sink)
            .expect("search");
        assert_eq!((sink.begun, sink.ended), (1, 1));
        sink.matches
    }
}

/// (entry, matched text, accuracy) for compact assertions.
pub fn summary(matches: &[SearchMatch]) -> Vec<(String, String, jsearch::Accuracy)> {
    matches
        .iter()
        .map(|m| {
            (
                m.document.entry.clone(),
                m.text.clone().unwrap_or_default(),
                m.accuracy,
            )
        })
        .collect()
}
