mod common;

use std::process::Command;

use common::{new_repo, write_file};
use jsearch::{DeclarationKind, ElementKind, TypeFilter};

#[test]
fn only_declared_element_kinds_can_be_listed() {
    assert_eq!(
        DeclarationKind::for_element(ElementKind::Type(TypeFilter::Enum)),
        Some(DeclarationKind::Type(TypeFilter::Enum))
    );
    assert_eq!(
        DeclarationKind::for_element(ElementKind::Constructor),
        Some(DeclarationKind::Constructor)
    );
    for kind in [ElementKind::Package, ElementKind::AnnotationElement, ElementKind::Module] {
        assert_eq!(DeclarationKind::for_element(kind), None);
    }
}

fn list(root: &std::path::Path, kind: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_jsearch"))
        .args(["*", "--list", "--rule", "pattern", "--kind", kind, "--root"])
        .arg(root)
        .env("RUST_LOG", "warn")
        .output()
        .expect("run jsearch")
}

#[test]
fn list_rejects_kinds_without_declaration_summaries() {
    let dir = new_repo();
    write_file(dir.path(), "p/A.java", "package p; public class A { void run() {} }");

    let methods = list(dir.path(), "method");
    assert!(methods.status.success());
    let stdout = String::from_utf8_lossy(&methods.stdout);
    assert!(stdout.contains("p.A.run"), "unexpected listing: {}", stdout);

    for kind in ["package", "element", "module"] {
        let out = list(dir.path(), kind);
        assert!(!out.status.success(), "--kind {} was accepted", kind);
        let stderr = String::from_utf8_lossy(&out.stderr);
        assert!(stderr.contains("--list does not support"), "stderr: {}", stderr);
        assert!(out.stdout.is_empty());
    }
}
