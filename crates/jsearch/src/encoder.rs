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

//! Index terms for declarations and references.
//!
//! A term is `category/name` or `category/name/arity`, with the name folded
//! to lowercase. Terms are computed from the unresolved syntax only: a type
//! reference contributes its simple name, a call its selector and argument
//! count. Anything that cannot be summarized safely puts the document in the
//! [`WILDCARD_TERM`] bucket, which every query scans.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::pattern::{has_wildcards, glob_match, MatchRule, NameMatcher};
use crate::syntax::{CompilationUnit, CtorForm, Expr, OccurrenceKind, PathBase, TypeKind};

/// Documents that must be verified by every query.
pub const WILDCARD_TERM: &str = "*";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TermCategory {
    TypeDecl,
    TypeRef,
    /// Simple name of a supertype in a type header (source or binary).
    SuperRef,
    MethodDecl,
    MethodRef,
    FieldDecl,
    FieldRef,
    CtorDecl,
    CtorRef,
    PkgDecl,
    PkgRef,
    AnnElemRef,
    ModuleDecl,
    ModuleRef,
}

impl TermCategory {
    pub fn tag(self) -> &'static str {
        match self {
            TermCategory::TypeDecl => "typeDecl",
            TermCategory::TypeRef => "typeRef",
            TermCategory::SuperRef => "superRef",
            TermCategory::MethodDecl => "methodDecl",
            TermCategory::MethodRef => "methodRef",
            TermCategory::FieldDecl => "fieldDecl",
            TermCategory::FieldRef => "fieldRef",
            TermCategory::CtorDecl => "ctorDecl",
            TermCategory::CtorRef => "ctorRef",
            TermCategory::PkgDecl => "pkgDecl",
            TermCategory::PkgRef => "pkgRef",
            TermCategory::AnnElemRef => "annElemRef",
            TermCategory::ModuleDecl => "moduleDecl",
            TermCategory::ModuleRef => "moduleRef",
        }
    }

    /// Whether terms of this category carry an arity suffix.
    pub fn has_arity(self) -> bool {
        matches!(
            self,
            TermCategory::MethodDecl
                | TermCategory::MethodRef
                | TermCategory::CtorDecl
                | TermCategory::CtorRef
        )
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

pub fn term(category: TermCategory, name: &str) -> String {
    format!("{}/{}", category.tag(), fold(name))
}

/// `None` arity is written as `?` and matches every arity query.
pub fn term_with_arity(category: TermCategory, name: &str, arity: Option<usize>) -> String {
    match arity {
        Some(n) => format!("{}/{}/{}", category.tag(), fold(name), n),
        None => format!("{}/{}/?", category.tag(), fold(name)),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NameQuery {
    Exact(String),
    Prefix(String),
    Glob(String),
    Any,
}

impl NameQuery {
    /// Widest term-level query that still covers every name the matcher
    /// accepts. Case is always folded; verification restores it.
    pub fn from_matcher(m: &NameMatcher) -> Self {
        if m.is_any() {
            return NameQuery::Any;
        }
        let folded = fold(&m.pattern);
        if m.rule.contains(MatchRule::PATTERN) && has_wildcards(&m.pattern) {
            // a leading wildcard defeats the range scan but not the filter
            return NameQuery::Glob(folded);
        }
        if m.rule.is_camel_case() {
            return match folded.chars().next() {
                Some(c) => NameQuery::Prefix(c.to_string()),
                None => NameQuery::Any,
            };
        }
        if m.rule.contains(MatchRule::PREFIX) {
            return NameQuery::Prefix(folded);
        }
        NameQuery::Exact(folded)
    }

    fn literal_prefix(&self) -> &str {
        match self {
            NameQuery::Exact(s) | NameQuery::Prefix(s) => s,
            NameQuery::Glob(s) => {
                let end = s.find(['*', '?']).unwrap_or(s.len());
                &s[..end]
            }
            NameQuery::Any => "",
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameQuery::Exact(s) => name == s,
            NameQuery::Prefix(s) => name.starts_with(s.as_str()),
            NameQuery::Glob(g) => glob_match(g, name, true),
            NameQuery::Any => true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArityQuery {
    Exact(usize),
    AtLeast(usize),
    Any,
}

impl ArityQuery {
    fn matches(self, arity: &str) -> bool {
        if arity == "?" {
            return true;
        }
        let Ok(n) = arity.parse::<usize>() else {
            return true;
        };
        match self {
            ArityQuery::Exact(k) => n == k,
            ArityQuery::AtLeast(k) => n >= k,
            ArityQuery::Any => true,
        }
    }
}

/// A set of terms of one category, as derived from a pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TermQuery {
    pub category: TermCategory,
    pub name: NameQuery,
    pub arity: ArityQuery,
}

impl TermQuery {
    pub fn new(category: TermCategory, name: NameQuery) -> Self {
        Self {
            category,
            name,
            arity: ArityQuery::Any,
        }
    }

    pub fn with_arity(mut self, arity: ArityQuery) -> Self {
        self.arity = arity;
        self
    }

    /// Lower bound of a sorted-term range scan.
    pub fn scan_start(&self) -> String {
        format!("{}/{}", self.category.tag(), self.name.literal_prefix())
    }

    /// Every term this query covers starts with this.
    pub fn scan_prefix(&self) -> String {
        format!("{}/", self.category.tag())
    }

    pub fn matches(&self, term: &str) -> bool {
        let Some(rest) = term.strip_prefix(&self.scan_prefix()) else {
            return false;
        };
        if self.category.has_arity() {
            let Some((name, arity)) = rest.rsplit_once('/') else {
                return false;
            };
            self.name.matches(name) && self.arity.matches(arity)
        } else {
            self.name.matches(rest)
        }
    }
}

impl fmt::Display for TermQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match &self.name {
            NameQuery::Exact(s) => s.clone(),
            NameQuery::Prefix(s) => format!("{}*", s),
            NameQuery::Glob(s) => s.clone(),
            NameQuery::Any => "*".to_string(),
        };
        write!(f, "{}/{}", self.category.tag(), name)?;
        match self.arity {
            ArityQuery::Exact(n) => write!(f, "/{}", n),
            ArityQuery::AtLeast(n) => write!(f, "/{}+", n),
            ArityQuery::Any => Ok(()),
        }
    }
}

/// Kind of a listed declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryKind {
    Type(TypeKind),
    Method,
    Constructor,
    Field,
}

impl SummaryKind {
    pub fn code(self) -> u8 {
        match self {
            SummaryKind::Type(k) => k.code(),
            SummaryKind::Method => b'M',
            SummaryKind::Constructor => b'K',
            SummaryKind::Field => b'F',
        }
    }

    pub fn from_code(c: u8) -> Option<Self> {
        Some(match c {
            b'M' => SummaryKind::Method,
            b'K' => SummaryKind::Constructor,
            b'F' => SummaryKind::Field,
            other => SummaryKind::Type(TypeKind::from_code(other)?),
        })
    }
}

/// Declaration listed without parsing, original case preserved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclSummary {
    pub kind: SummaryKind,
    pub name: String,
    pub package: String,
    /// Dotted enclosing type names below the package; empty for top-level types.
    pub enclosing: String,
    pub arity: Option<u8>,
    pub modifiers: u16,
}

impl DeclSummary {
    pub fn qualified_container(&self) -> String {
        match (self.package.is_empty(), self.enclosing.is_empty()) {
            (true, _) => self.enclosing.clone(),
            (false, true) => self.package.clone(),
            (false, false) => format!("{}.{}", self.package, self.enclosing),
        }
    }
}

/// Sorted, deduplicated terms of a unit.
pub fn encode_unit(unit: &CompilationUnit) -> Vec<String> {
    let mut out: BTreeSet<String> = BTreeSet::new();
    if unit.has_errors {
        out.insert(WILDCARD_TERM.to_string());
    }
    if let Some(p) = &unit.package {
        out.insert(term(TermCategory::PkgDecl, &p.name));
    }
    if let Some(m) = &unit.module {
        out.insert(term(TermCategory::ModuleDecl, &m.name));
    }

    for t in &unit.types {
        if !t.anonymous && !t.name.is_empty() {
            out.insert(term(TermCategory::TypeDecl, &t.name));
        }
        for s in t.supertypes() {
            out.insert(term(TermCategory::SuperRef, s.simple_name()));
        }
        for m in &t.methods {
            out.insert(term_with_arity(TermCategory::MethodDecl, &m.name, Some(m.params.len())));
        }
        for c in &t.constructors {
            let name = if t.anonymous { &c.name } else { &t.name };
            out.insert(term_with_arity(TermCategory::CtorDecl, name, Some(c.params.len())));
        }
        for f in &t.fields {
            out.insert(term(TermCategory::FieldDecl, &f.name));
        }
    }

    for occ in &unit.occurrences {
        encode_occurrence(&occ.kind, &mut out);
    }
    out.into_iter().collect()
}

fn path_of(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Path {
            base: PathBase::None,
            segments,
        } if !segments.is_empty() => Some(segments.join(".")),
        _ => None,
    }
}

fn encode_occurrence(kind: &OccurrenceKind, out: &mut BTreeSet<String>) {
    match kind {
        OccurrenceKind::TypeRef { sig, prefixes, .. } => {
            out.insert(term(TermCategory::TypeRef, sig.simple_name()));
            let segments: Vec<&str> = sig.name.split('.').collect();
            for i in 0..prefixes.len().min(segments.len().saturating_sub(1)) {
                out.insert(term(TermCategory::PkgRef, &segments[..=i].join(".")));
            }
        }
        OccurrenceKind::Name {
            name, qualifier, ..
        } => {
            out.insert(term(TermCategory::FieldRef, name));
            out.insert(term(TermCategory::TypeRef, name));
            match qualifier.as_ref() {
                None => {
                    out.insert(term(TermCategory::PkgRef, name));
                }
                Some(q) => {
                    if let Some(path) = path_of(q) {
                        out.insert(term(TermCategory::PkgRef, &format!("{}.{}", path, name)));
                    }
                }
            }
        }
        OccurrenceKind::MethodCall { selector, args, .. } => {
            out.insert(term_with_arity(TermCategory::MethodRef, selector, Some(args.len())));
        }
        OccurrenceKind::MethodRef { selector, .. } => {
            out.insert(term_with_arity(TermCategory::MethodRef, selector, None));
        }
        OccurrenceKind::ConstructorCall { sig, args, form } => {
            let arity = match form {
                CtorForm::Reference => None,
                _ => Some(args.len()),
            };
            out.insert(term_with_arity(TermCategory::CtorRef, sig.simple_name(), arity));
        }
        OccurrenceKind::AnnotationElement { element, .. } => {
            out.insert(term(TermCategory::AnnElemRef, element));
            out.insert(term_with_arity(TermCategory::MethodRef, element, Some(0)));
        }
        OccurrenceKind::PackageRef { name } => {
            out.insert(term(TermCategory::PkgRef, name));
        }
        OccurrenceKind::DocMemberRef { name, params, .. } => {
            let arity = params.as_ref().map(|p| p.len());
            out.insert(term_with_arity(TermCategory::MethodRef, name, arity));
            out.insert(term_with_arity(TermCategory::CtorRef, name, arity));
            out.insert(term(TermCategory::FieldRef, name));
        }
        OccurrenceKind::StaticImport { member, .. } => {
            out.insert(term_with_arity(TermCategory::MethodRef, member, None));
            out.insert(term(TermCategory::FieldRef, member));
            out.insert(term(TermCategory::TypeRef, member));
        }
        OccurrenceKind::ModuleRef { name } => {
            out.insert(term(TermCategory::ModuleRef, name));
        }
    }
}

/// Declarations of a unit for bulk listing.
pub fn summarize(unit: &CompilationUnit) -> Vec<DeclSummary> {
    let package = unit.package_name().to_string();
    let mut out = Vec::new();
    for (idx, t) in unit.types.iter().enumerate() {
        if t.anonymous || t.name.is_empty() {
            continue;
        }
        let chain = unit.type_chain(idx);
        let names: Vec<&str> = chain.iter().map(|i| unit.types[*i].name.as_str()).collect();
        let enclosing = names[..names.len().saturating_sub(1)].join(".");
        let own = names.join(".");
        out.push(DeclSummary {
            kind: SummaryKind::Type(t.kind),
            name: t.name.clone(),
            package: package.clone(),
            enclosing,
            arity: None,
            modifiers: t.modifiers.0,
        });
        for m in &t.methods {
            out.push(DeclSummary {
                kind: SummaryKind::Method,
                name: m.name.clone(),
                package: package.clone(),
                enclosing: own.clone(),
                arity: Some(m.params.len().min(u8::MAX as usize) as u8),
                modifiers: m.modifiers.0,
            });
        }
        for c in &t.constructors {
            out.push(DeclSummary {
                kind: SummaryKind::Constructor,
                name: t.name.clone(),
                package: package.clone(),
                enclosing: own.clone(),
                arity: Some(c.params.len().min(u8::MAX as usize) as u8),
                modifiers: c.modifiers.0,
            });
        }
        for f in &t.fields {
            out.push(DeclSummary {
                kind: SummaryKind::Field,
                name: f.name.clone(),
                package: package.clone(),
                enclosing: own.clone(),
                arity: None,
                modifiers: f.modifiers.0,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::java::parse_source;

    #[test]
    fn encodes_declarations_and_references() {
        let unit = parse_source(
            r#"package p.q;
import java.util.List;
class A extends Base implements Runnable {
    int count;
    A(int x) {}
    void run() { helper(1, "two"); new B(); java.util.Collections.sort(null); }
}"#,
        )
        .expect("parse");
        let terms = encode_unit(&unit);
        for expected in [
            "pkgDecl/p.q",
            "typeDecl/a",
            "superRef/base",
            "superRef/runnable",
            "methodDecl/run/0",
            "ctorDecl/a/1",
            "fieldDecl/count",
            "typeRef/list",
            "pkgRef/java.util",
            "methodRef/helper/2",
            "ctorRef/b/0",
            "typeRef/b",
        ] {
            assert!(terms.iter().any(|t| t == expected), "missing {} in {:?}", expected, terms);
        }
        assert!(!terms.iter().any(|t| t == WILDCARD_TERM));
        let mut sorted = terms.clone();
        sorted.sort();
        assert_eq!(sorted, terms);
    }

    #[test]
    fn broken_units_land_in_the_wildcard_bucket() {
        let unit = parse_source("class A { void f( { }").expect("parse");
        assert!(encode_unit(&unit).iter().any(|t| t == WILDCARD_TERM));
    }

    #[test]
    fn term_queries_filter_by_name_and_arity() {
        let m = NameMatcher::new("HM", MatchRule::CAMELCASE);
        let q = TermQuery::new(TermCategory::TypeDecl, NameQuery::from_matcher(&m));
        assert!(q.matches("typeDecl/hashmap"));
        assert!(!q.matches("typeRef/hashmap"));
        assert!(!q.matches("typeDecl/list"));

        let q = TermQuery::new(TermCategory::MethodRef, NameQuery::Exact("foo".into()))
            .with_arity(ArityQuery::Exact(2));
        assert!(q.matches("methodRef/foo/2"));
        assert!(q.matches("methodRef/foo/?"));
        assert!(!q.matches("methodRef/foo/1"));
        assert!(!q.matches("methodRef/foobar/2"));

        let g = NameMatcher::new("get*", MatchRule::PATTERN);
        let q = TermQuery::new(TermCategory::MethodDecl, NameQuery::from_matcher(&g));
        assert_eq!(q.scan_start(), "methodDecl/get");
        assert!(q.matches("methodDecl/getname/0"));
    }

    #[test]
    fn summaries_keep_original_case() {
        let unit = parse_source("package p; public class Outer { class Inner { void doIt(int a) {} } }")
            .expect("parse");
        let s = summarize(&unit);
        let inner = s.iter().find(|d| d.name == "Inner").expect("inner");
        assert_eq!(inner.enclosing, "Outer");
        assert_eq!(inner.qualified_container(), "p.Outer");
        let m = s.iter().find(|d| d.name == "doIt").expect("method");
        assert_eq!(m.kind, SummaryKind::Method);
        assert_eq!(m.enclosing, "Outer.Inner");
        assert_eq!(m.arity, Some(1));
    }
}
