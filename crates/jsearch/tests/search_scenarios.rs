mod common;

use common::{summary, Workspace};
use jsearch::{
    Accuracy, DeclarationKind, DeclarationQuery, ElementKind, Focus, LimitTo, MatchRule, MethodId, NameMatcher,
    Pattern, SearchScope, TypeFilter,
};

const SHAPES: &[(&str, &str)] = &[
    (
        "p/Shape.java",
        "package p; public abstract class Shape { public abstract double area(); public void draw(int x) {} public void draw(String s) {} }",
    ),
    (
        "p/Square.java",
        "package p; public class Square extends Shape { public double area() { return 1; } }",
    ),
    ("p/Unit.java", "package p; public class Unit extends Square {}"),
    (
        "p/Use.java",
        "package p; class Use { void go(Shape s, Unit u, Square q) { s.area(); u.area(); q.area(); s.draw(1); s.draw(\"x\"); } }",
    ),
];

fn area() -> MethodId {
    MethodId {
        declaring: "p.Shape".into(),
        name: "area".into(),
        params: vec![],
    }
}

#[test]
fn camel_case_type_declarations() {
    let ws = Workspace::new(&[
        ("u/HashMap.java", "package u; public class HashMap {}"),
        ("u/HashMapEntry.java", "package u; public class HashMapEntry {}"),
        ("u/HaxMapxxxx.java", "package u; public class HaxMapxxxx {}"),
        ("u/Helper.java", "package u; public class Helper {}"),
        ("u/HtmlMapper.java", "package u; public class HtmlMapper {}"),
    ]);
    let kind = ElementKind::Type(TypeFilter::Any);
    let camel = Pattern::parse("HM", kind, LimitTo::Declarations, MatchRule::CAMELCASE);
    let found: Vec<String> = ws.search(&camel).into_iter().filter_map(|m| m.text).collect();
    assert_eq!(found, vec!["HashMap", "HashMapEntry", "HaxMapxxxx", "HtmlMapper"]);

    let same = Pattern::parse("HM", kind, LimitTo::Declarations, MatchRule::CAMELCASE_SAME_PART_COUNT);
    let found: Vec<String> = ws.search(&same).into_iter().filter_map(|m| m.text).collect();
    assert_eq!(found, vec!["HashMap", "HaxMapxxxx", "HtmlMapper"]);
}

#[test]
fn superclass_reference_sits_in_the_subclass_header() {
    let ws = Workspace::new(&[("AB.java", "class A {} class B extends A {}")]);
    let p = Pattern::bound(
        Focus::Type {
            qualified: "A".into(),
            args: None,
        },
        LimitTo::References,
        MatchRule::EXACT,
    );
    let found = ws.search(&p);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].text.as_deref(), Some("A"));
    assert_eq!(found[0].accuracy, Accuracy::Exact);
    assert_eq!(found[0].enclosing, vec!["B".to_string()]);
    assert_eq!(found[0].line, Some(1));
}

#[test]
fn unresolved_type_is_potential_only_when_the_kind_matters() {
    let ws = Workspace::new(&[("Z.java", "class Z { Zork x; }")]);
    let any = Pattern::parse(
        "*",
        ElementKind::Type(TypeFilter::Any),
        LimitTo::References,
        MatchRule::PATTERN,
    );
    assert_eq!(
        summary(&ws.search(&any)),
        vec![("Z.java".to_string(), "Zork".to_string(), Accuracy::Exact)]
    );
    let annotations = any.with_type_filter(TypeFilter::Annotation);
    assert_eq!(
        summary(&ws.search(&annotations)),
        vec![("Z.java".to_string(), "Zork".to_string(), Accuracy::Potential)]
    );
}

#[test]
fn raw_and_erased_references_rank_below_exact_arguments() {
    let ws = Workspace::new(&[
        ("p/Box.java", "package p; public class Box<T> {}"),
        (
            "p/Use.java",
            "package p; class Use { Box<String> typed; Box raw; Box<Integer> other; }",
        ),
    ]);
    let focus = Focus::Type {
        qualified: "p.Box".into(),
        args: Some(vec![jsearch::resolve::ResolvedType::declared("java.lang.String")]),
    };
    let lenient = Pattern::bound(focus.clone(), LimitTo::References, MatchRule::ERASURE | MatchRule::RAW);
    let tiers: Vec<Accuracy> = ws.search(&lenient).iter().map(|m| m.accuracy).collect();
    assert_eq!(tiers, vec![Accuracy::Exact, Accuracy::EquivalentRaw, Accuracy::Erasure]);
    assert!(Accuracy::Exact < Accuracy::EquivalentRaw);

    let strict = Pattern::bound(focus, LimitTo::References, MatchRule::EXACT);
    assert_eq!(ws.search(&strict).len(), 1);
}

#[test]
fn overriding_declarations_and_overload_aware_references() {
    let ws = Workspace::new(SHAPES);
    let decls = Pattern::bound(Focus::Method(area()), LimitTo::Declarations, MatchRule::EXACT).ignoring_declaring_type();
    let files: Vec<String> = ws.search(&decls).into_iter().map(|m| m.document.entry).collect();
    assert_eq!(files, vec!["p/Shape.java", "p/Square.java"]);

    let refs = Pattern::bound(Focus::Method(area()), LimitTo::References, MatchRule::EXACT);
    let found = ws.search(&refs);
    assert_eq!(found.len(), 3);
    assert!(found
        .iter()
        .all(|m| m.document.entry == "p/Use.java" && m.text.as_deref() == Some("area")));

    let draw_int = MethodId {
        declaring: "p.Shape".into(),
        name: "draw".into(),
        params: vec!["int".into()],
    };
    let p = Pattern::bound(Focus::Method(draw_int), LimitTo::References, MatchRule::EXACT);
    assert_eq!(ws.search(&p).len(), 1);
}

#[test]
fn repeated_searches_report_the_same_matches() {
    let ws = Workspace::new(SHAPES);
    let p = Pattern::parse("dr*", ElementKind::Method, LimitTo::All, MatchRule::PATTERN);
    let first = ws.search(&p);
    let second = ws.search(&p);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn composite_patterns() {
    let ws = Workspace::new(SHAPES);
    let kind = ElementKind::Type(TypeFilter::Any);
    let shape = Pattern::parse("Shape", kind, LimitTo::Declarations, MatchRule::EXACT);
    let square = Pattern::parse("Square", kind, LimitTo::Declarations, MatchRule::EXACT);
    let either = ws.search(&Pattern::or(shape.clone(), square.clone()));
    let texts: Vec<String> = either.into_iter().filter_map(|m| m.text).collect();
    assert_eq!(texts, vec!["Shape", "Square"]);

    let both = ws.search(&Pattern::and(shape.clone(), square));
    assert!(both.is_empty());

    let starts = Pattern::parse("S*", kind, LimitTo::Declarations, MatchRule::PATTERN);
    let narrowed = ws.search(&Pattern::and(shape, starts));
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].text.as_deref(), Some("Shape"));
}

#[test]
fn mixed_element_kinds_match_nothing() {
    let ws = Workspace::new(SHAPES);
    let ty = Pattern::parse("Shape", ElementKind::Type(TypeFilter::Any), LimitTo::All, MatchRule::EXACT);
    let method = Pattern::parse("area", ElementKind::Method, LimitTo::All, MatchRule::EXACT);
    assert!(ws.search(&Pattern::or(ty, method)).is_empty());
}

#[test]
fn field_accesses_carry_read_and_write_flavors() {
    let ws = Workspace::new(&[(
        "p/Counter.java",
        "package p; public class Counter { int count; void bump() { count = count + 1; } }",
    )]);
    let focus = |limit_to| {
        Pattern::bound(
            Focus::Field {
                declaring: "p.Counter".into(),
                name: "count".into(),
            },
            limit_to,
            MatchRule::EXACT,
        )
    };
    let writes = ws.search(&focus(LimitTo::WriteAccesses));
    assert_eq!(writes.len(), 1);
    assert!(writes[0].flavor.write);
    assert_eq!(writes[0].enclosing, vec!["Counter".to_string(), "bump()".to_string()]);
    let reads = ws.search(&focus(LimitTo::ReadAccesses));
    assert_eq!(reads.len(), 1);
    assert!(reads[0].flavor.read);
}

#[test]
fn javadoc_links_report_the_documented_member() {
    let ws = Workspace::new(&[(
        "p/A.java",
        "package p; public class A {\n  void m() {}\n  /** Same as {@link #m()}. */\n  void doc() {}\n}",
    )]);
    let p = Pattern::parse("m", ElementKind::Method, LimitTo::References, MatchRule::EXACT);
    let found = ws.search(&p);
    assert_eq!(found.len(), 1);
    assert!(found[0].flavor.in_javadoc);
    assert_eq!(found[0].line, Some(3));
    assert_eq!(found[0].enclosing, vec!["A".to_string(), "doc()".to_string()]);
}

#[test]
fn declaration_listing_uses_index_summaries() {
    let ws = Workspace::new(SHAPES);
    let opts = ws.engine.default_options();
    let mut listed = Vec::new();
    let q = DeclarationQuery::new(DeclarationKind::Method, NameMatcher::new("area", MatchRule::EXACT));
    let n = ws
        .engine
        .search_all_declarations(&q, &SearchScope::Everything, &opts, &mut listed)
        .expect("list");
    assert_eq!(n, 2);
    let owners: Vec<String> = listed.iter().map(|(_, d)| d.enclosing.clone()).collect();
    assert_eq!(owners, vec!["Shape", "Square"]);

    let mut types = Vec::new();
    let q = DeclarationQuery::new(DeclarationKind::Type(TypeFilter::Class), NameMatcher::any())
        .in_qualification(NameMatcher::new("p", MatchRule::EXACT));
    ws.engine
        .search_all_declarations(&q, &SearchScope::Everything, &opts, &mut types)
        .expect("list");
    let names: Vec<String> = types.iter().map(|(_, d)| d.name.clone()).collect();
    assert_eq!(names, vec!["Shape", "Square", "Unit", "Use"]);
}

#[test]
fn focus_at_a_reference_binds_the_declaration() {
    let ws = Workspace::new(SHAPES);
    let use_src = SHAPES[3].1;
    let offset = use_src.find("s.area").expect("call") + 2;
    let key = jsearch::DocumentKey::source(&ws.src, "p/Use.java");
    let focus = ws
        .engine
        .focus_at(&key, offset as u32, None, &ws.engine.default_options())
        .expect("focus");
    match focus {
        Some(Focus::Method(id)) => {
            assert_eq!(id.name, "area");
            assert_eq!(id.declaring, "p.Shape");
        }
        other => panic!("unexpected focus {:?}", other),
    }
}
