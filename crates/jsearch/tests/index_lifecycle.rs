mod common;

use std::path::Path;

use common::{init_test_logging, new_repo, write_file};
use jsearch::index::index_file_name;
use jsearch::test_helpers::{write_jar, ClassFileBuilder};
use jsearch::{
    CancellationToken, CollectingSink, ContainerSpec, ElementKind, EngineConfig, LimitTo, MatchRule, Participant,
    Pattern, SearchEngine, SearchError, SearchOptions, SearchScope, TypeFilter, WaitPolicy,
};

fn lib_decl() -> Pattern {
    Pattern::parse(
        "Lib",
        ElementKind::Type(TypeFilter::Any),
        LimitTo::Declarations,
        MatchRule::EXACT,
    )
}

fn engine_over(src: &Path, index_dir: &Path) -> SearchEngine {
    let engine = SearchEngine::new(EngineConfig::default().with_index_dir(index_dir)).expect("engine");
    engine
        .registry()
        .add_container(ContainerSpec::new("app").with_source_folder(src))
        .expect("add container");
    engine.registry().wait_idle().expect("index");
    engine
}

fn count(engine: &SearchEngine, pattern: &Pattern) -> usize {
    let mut sink = CollectingSink::new();
    engine
        .search(pattern, &SearchScope::Everything, &SearchOptions::default(), &mut sink)
        .expect("search");
    sink.matches.len()
}

#[test]
fn persisted_index_is_loaded_by_the_next_engine() {
    init_test_logging();
    let dir = new_repo();
    let src = dir.path().join("src");
    let idx = dir.path().join("idx");
    write_file(&src, "p/Lib.java", "package p; public class Lib {}");

    let first = engine_over(&src, &idx);
    assert_eq!(first.registry().stats().full_builds, 1);
    assert_eq!(count(&first, &lib_decl()), 1);
    first.shutdown();
    assert!(idx.join(index_file_name(&src)).exists());

    let second = engine_over(&src, &idx);
    let stats = second.registry().stats();
    assert_eq!((stats.loaded, stats.full_builds), (1, 0));
    assert_eq!(count(&second, &lib_decl()), 1);
    second.shutdown();
}

#[test]
fn stale_persisted_index_is_rebuilt() {
    init_test_logging();
    let dir = new_repo();
    let src = dir.path().join("src");
    let idx = dir.path().join("idx");
    write_file(&src, "p/Lib.java", "package p; public class Lib {}");
    engine_over(&src, &idx).shutdown();

    write_file(&src, "p/Lib.java", "package p; public class Lib { int size; }");
    write_file(&src, "p/Other.java", "package p; class Other extends Lib {}");
    let engine = engine_over(&src, &idx);
    let stats = engine.registry().stats();
    assert_eq!((stats.loaded, stats.full_builds), (0, 1));
    let refs = Pattern::parse("Lib", ElementKind::Type(TypeFilter::Any), LimitTo::References, MatchRule::EXACT);
    assert_eq!(count(&engine, &refs), 1);
    engine.shutdown();
}

#[test]
fn corrupt_index_file_is_discarded_and_rebuilt() {
    init_test_logging();
    let dir = new_repo();
    let src = dir.path().join("src");
    let idx = dir.path().join("idx");
    write_file(&src, "p/Lib.java", "package p; public class Lib {}");
    std::fs::create_dir_all(&idx).expect("idx dir");
    std::fs::write(idx.join(index_file_name(&src)), b"definitely not an index").expect("garbage");

    let engine = engine_over(&src, &idx);
    let stats = engine.registry().stats();
    assert_eq!((stats.loaded, stats.full_builds, stats.failures), (0, 1, 0));
    assert_eq!(count(&engine, &lib_decl()), 1);
    engine.shutdown();
}

#[test]
fn identical_roots_share_one_build() {
    init_test_logging();
    let dir = new_repo();
    let one = dir.path().join("one");
    let two = dir.path().join("two");
    for root in [&one, &two] {
        write_file(root, "p/Lib.java", "package p; public class Lib {}");
    }
    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    let registry = engine.registry();
    registry
        .add_container(ContainerSpec::new("one").with_source_folder(&one))
        .expect("add one");
    registry.wait_idle().expect("index one");
    registry
        .add_container(ContainerSpec::new("two").with_source_folder(&two))
        .expect("add two");
    registry.wait_idle().expect("index two");

    let stats = registry.stats();
    assert_eq!((stats.full_builds, stats.reused), (1, 1));

    let mut sink = CollectingSink::new();
    engine
        .search(&lib_decl(), &SearchScope::Everything, &SearchOptions::default(), &mut sink)
        .expect("search");
    let roots: Vec<&Path> = sink.matches.iter().map(|m| m.document.root.as_path()).collect();
    assert_eq!(roots, vec![one.as_path(), two.as_path()]);
}

#[test]
fn identical_roots_registered_together_share_one_build() {
    init_test_logging();
    let dir = new_repo();
    let one = dir.path().join("one");
    let two = dir.path().join("two");
    for root in [&one, &two] {
        write_file(root, "p/Lib.java", "package p; public class Lib {}");
        for i in 0..200 {
            write_file(root, &format!("p/Gen{i}.java"), &format!("package p; class Gen{i} extends Lib {{}}"));
        }
    }
    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    let registry = engine.registry();
    registry
        .add_container(ContainerSpec::new("one").with_source_folder(&one))
        .expect("add one");
    registry
        .add_container(ContainerSpec::new("two").with_source_folder(&two))
        .expect("add two");
    registry.wait_idle().expect("index both");

    let stats = registry.stats();
    assert_eq!((stats.full_builds, stats.reused, stats.failures), (1, 1, 0));
    let mut sink = CollectingSink::new();
    engine
        .search(&lib_decl(), &SearchScope::Everything, &SearchOptions::default(), &mut sink)
        .expect("search");
    let roots: Vec<&Path> = sink.matches.iter().map(|m| m.document.root.as_path()).collect();
    assert_eq!(roots, vec![one.as_path(), two.as_path()]);
}

#[test]
fn best_effort_never_blocks_and_converges() {
    init_test_logging();
    let dir = new_repo();
    write_file(dir.path(), "p/Lib.java", "package p; public class Lib {}");
    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    engine
        .registry()
        .add_container(ContainerSpec::new("app").with_source_folder(dir.path()))
        .expect("add container");

    let opts = SearchOptions::new(WaitPolicy::BestEffort);
    let mut early = CollectingSink::new();
    engine
        .search(&lib_decl(), &SearchScope::Everything, &opts, &mut early)
        .expect("best effort search");
    assert!(early.matches.len() <= 1);

    engine.registry().wait_idle().expect("index");
    let mut late = CollectingSink::new();
    engine
        .search(&lib_decl(), &SearchScope::Everything, &opts, &mut late)
        .expect("search");
    assert_eq!(late.matches.len(), 1);
}

#[test]
fn cancelled_search_still_brackets_the_sink() {
    init_test_logging();
    let dir = new_repo();
    write_file(dir.path(), "p/Lib.java", "package p; public class Lib {}");
    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    engine
        .registry()
        .add_container(ContainerSpec::new("app").with_source_folder(dir.path()))
        .expect("add container");
    engine.registry().wait_idle().expect("index");

    let token = CancellationToken::new();
    token.cancel();
    let opts = SearchOptions::default().with_cancel(token);
    let mut sink = CollectingSink::new();
    let result = engine.search(&lib_decl(), &SearchScope::Everything, &opts, &mut sink);
    assert!(matches!(result, Err(SearchError::Cancelled)));
    assert_eq!((sink.begun, sink.ended), (1, 1));
    assert!(sink.matches.is_empty());
}

#[test]
fn shut_down_engine_refuses_searches() {
    init_test_logging();
    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    engine.shutdown();
    let mut sink = CollectingSink::new();
    let result = engine.search(&lib_decl(), &SearchScope::Everything, &SearchOptions::default(), &mut sink);
    assert!(matches!(result, Err(SearchError::ShutDown)));
    assert_eq!((sink.begun, sink.ended), (1, 1));
}

#[test]
fn archive_sources_precede_compiled_units() {
    init_test_logging();
    let dir = new_repo();
    let jar = dir.path().join("lib.jar");
    write_jar(
        &jar,
        &[
            ("p/Lib.class", ClassFileBuilder::new("p/Lib").build()),
            ("p/Lib.java", b"package p; public class Lib {}".to_vec()),
        ],
    )
    .expect("write jar");
    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    engine
        .registry()
        .add_container(ContainerSpec::new("deps").with_archive(&jar))
        .expect("add container");
    engine.registry().wait_idle().expect("index");

    let mut sink = CollectingSink::new();
    engine
        .search(&lib_decl(), &SearchScope::Everything, &SearchOptions::default(), &mut sink)
        .expect("search");
    let found: Vec<(&str, bool, bool)> = sink
        .matches
        .iter()
        .map(|m| (m.document.entry.as_str(), m.document.in_archive, m.range.is_some()))
        .collect();
    assert_eq!(found, vec![("p/Lib.java", true, true), ("p/Lib.class", true, false)]);

    let sources_only = SearchOptions::default().with_participants(vec![Participant::Sources]);
    let mut sink = CollectingSink::new();
    engine
        .search(&lib_decl(), &SearchScope::Everything, &sources_only, &mut sink)
        .expect("search");
    assert_eq!(sink.matches.len(), 1);
    assert!(sink.matches[0].range.is_some());
}
