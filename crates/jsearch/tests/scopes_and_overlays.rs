mod common;

use std::sync::Arc;

use common::{init_test_logging, new_repo, write_file, Workspace};
use jsearch::{
    CollectingSink, ContainerSpec, DocumentKey, ElementKind, EngineConfig, Focus, LimitTo, MatchRule,
    OverlayRegistry, Pattern, SearchEngine, SearchOptions, SearchScope, TypeFilter,
};

const TARGET: (&str, &str) = ("p/A.java", "package p; public class A { void run() {} }");
const CALLER_BEFORE: &str = "package p; class U { void go(A a) { } }";
const CALLER_AFTER: &str = "package p; class U { void go(A a) {\n    a.run();\n  } }";

fn run_refs() -> Pattern {
    Pattern::parse("run", ElementKind::Method, LimitTo::References, MatchRule::EXACT)
}

#[test]
fn overlay_results_match_the_saved_file() {
    let ws = Workspace::new(&[TARGET, ("p/U.java", CALLER_BEFORE)]);
    assert!(ws.search(&run_refs()).is_empty());

    let overlay = Arc::new(OverlayRegistry::new());
    overlay.set(DocumentKey::source(&ws.src, "p/U.java"), CALLER_AFTER);
    let scope = SearchScope::Everything.with_overlay(overlay.clone());
    let live = ws.search_in(&run_refs(), &scope);
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].line, Some(2));
    assert_eq!(live[0].text.as_deref(), Some("run"));

    write_file(&ws.src, "p/U.java", CALLER_AFTER);
    assert!(ws.engine.registry().notify_changed(&ws.src, vec!["p/U.java".to_string()]));
    ws.engine.registry().wait_idle().expect("reindex");
    overlay.clear();
    let saved = ws.search(&run_refs());
    assert_eq!(live, saved);

    assert!(ws.engine.registry().request_reindex(&ws.src));
    ws.engine.registry().wait_idle().expect("full reindex");
    assert_eq!(ws.search(&run_refs()), saved);
}

#[test]
fn overlay_can_add_and_delete_documents() {
    let ws = Workspace::new(&[TARGET]);
    let decl = |name: &str| Pattern::parse(name, ElementKind::Type(TypeFilter::Any), LimitTo::Declarations, MatchRule::EXACT);

    let overlay = Arc::new(OverlayRegistry::new());
    overlay.set(DocumentKey::source(&ws.src, "p/Fresh.java"), "package p; class Fresh {}");
    overlay.mark_deleted(DocumentKey::source(&ws.src, "p/A.java"));
    let scope = SearchScope::Everything.with_overlay(overlay);

    assert_eq!(ws.search_in(&decl("Fresh"), &scope).len(), 1);
    assert!(ws.search_in(&decl("A"), &scope).is_empty());
    assert_eq!(ws.search(&decl("A")).len(), 1);
    assert!(ws.search(&decl("Fresh")).is_empty());
}

#[test]
fn hierarchy_scope_keeps_the_focus_family() {
    let ws = Workspace::new(&[
        ("p/Base.java", "package p; public class Base { int size; void grow() { size = 1; } }"),
        (
            "p/Child.java",
            "package p; public class Child extends Base { void more() { size = 2; } static class Helper { void help(Base b) { b.size = 3; } } }",
        ),
        ("p/Stranger.java", "package p; class Stranger { void poke(Base b) { b.size = 4; } }"),
    ]);
    let size = Pattern::bound(
        Focus::Field {
            declaring: "p.Base".into(),
            name: "size".into(),
        },
        LimitTo::References,
        MatchRule::EXACT,
    );
    assert_eq!(ws.search(&size).len(), 4);

    let opts = SearchOptions::default();
    let narrow = ws.engine.hierarchy_scope("p.Child", false, &opts).expect("scope");
    let found: Vec<String> = ws
        .search_in(&size, &narrow)
        .into_iter()
        .map(|m| m.document.entry)
        .collect();
    assert_eq!(found, vec!["p/Base.java", "p/Child.java"]);

    let wide = ws.engine.hierarchy_scope("p.Child", true, &opts).expect("scope");
    assert_eq!(ws.search_in(&size, &wide).len(), 3);

    let unknown = ws.engine.hierarchy_scope("p.Nowhere", true, &opts).expect("scope");
    assert!(unknown.is_empty());
    assert!(ws.search_in(&size, &unknown).is_empty());
}

#[test]
fn container_scope_can_follow_dependents() {
    init_test_logging();
    let dir = new_repo();
    let lib = dir.path().join("lib");
    let app = dir.path().join("app");
    write_file(&lib, "lib/Lib.java", "package lib; public class Lib {}");
    write_file(&app, "app/App.java", "package app; class App { lib.Lib held; }");

    let engine = SearchEngine::new(EngineConfig::default()).expect("engine");
    let registry = engine.registry();
    registry
        .add_container(ContainerSpec::new("lib").with_source_folder(&lib))
        .expect("add lib");
    registry
        .add_container(ContainerSpec::new("app").with_source_folder(&app).depends_on("lib"))
        .expect("add app");
    registry.wait_idle().expect("index");

    let p = Pattern::parse("Lib", ElementKind::Type(TypeFilter::Any), LimitTo::All, MatchRule::EXACT);
    let search = |scope: &SearchScope| {
        let mut sink = CollectingSink::new();
        engine
            .search(&p, scope, &SearchOptions::default(), &mut sink)
            .expect("search");
        sink.matches
    };

    let own = search(&SearchScope::containers(registry, &["lib"], false));
    assert_eq!(own.len(), 1);
    assert_eq!(own[0].document.root, lib);

    let with_dependents = search(&SearchScope::containers(registry, &["lib"], true));
    assert!(with_dependents.len() >= 2);
    assert!(with_dependents.iter().any(|m| m.document.root == lib));
    assert!(with_dependents.iter().any(|m| m.document.root == app));

    let empty = SearchScope::containers(registry, &[], true);
    assert!(empty.is_empty());
    assert!(search(&empty).is_empty());
    assert!(search(&SearchScope::containers(registry, &["missing"], true)).is_empty());
}

#[test]
fn folder_scope_restricts_documents() {
    let ws = Workspace::new(&[
        ("p/q/Inner.java", "package p.q; public class Inner {}"),
        ("p/qr/Inner.java", "package p.qr; public class Inner {}"),
    ]);
    let p = Pattern::parse("Inner", ElementKind::Type(TypeFilter::Any), LimitTo::Declarations, MatchRule::EXACT);
    assert_eq!(ws.search(&p).len(), 2);
    let found = ws.search_in(&p, &SearchScope::folder(&ws.src, "p/q"));
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document.entry, "p/q/Inner.java");

    let one = SearchScope::documents([DocumentKey::source(&ws.src, "p/qr/Inner.java")]);
    let found = ws.search_in(&p, &one);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].document.entry, "p/qr/Inner.java");
}
