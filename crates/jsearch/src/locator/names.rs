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

//! Locators for dotted names: packages, annotation elements and modules.

use std::sync::Arc;

use super::{qualification_matches, Accuracy, Common, Located};
use crate::encoder::{ArityQuery, NameQuery, TermCategory, TermQuery};
use crate::pattern::{MatchRule, NameMatcher};
use crate::resolve::{ExprType, NameTarget, Resolver, TypeResolution};
use crate::syntax::{Context, Expr, MemberRef, OccurrenceKind, ParsedUnit, PathBase, TypeKind};
use crate::types::TextRange;

fn exact(name: &str) -> NameMatcher {
    NameMatcher::new(name, MatchRule::CASE_SENSITIVE)
}

#[derive(Debug)]
pub struct PackageLocator {
    common: Common,
    name: NameMatcher,
}

impl PackageLocator {
    pub(super) fn textual(common: Common, name: &str) -> Self {
        Self {
            common,
            name: NameMatcher::new(name, common.rule),
        }
    }

    pub(super) fn bound(common: Common, name: &str) -> Self {
        Self {
            common,
            name: exact(name),
        }
    }

    pub(super) fn candidate_terms(&self) -> Vec<TermQuery> {
        let name = NameQuery::from_matcher(&self.name);
        let mut out = Vec::new();
        if self.common.declarations() {
            out.push(TermQuery::new(TermCategory::PkgDecl, name.clone()));
        }
        if self.common.references() {
            out.push(TermQuery::new(TermCategory::PkgRef, name));
        }
        out
    }

    pub(super) fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let u = &unit.unit;
        if self.common.declarations() {
            if let Some(p) = &u.package {
                if self.name.matches(&p.name) {
                    out.push(Located::declaration(p.range, 0, Context::default()));
                }
            }
        }
        if !self.common.references() {
            return;
        }
        for occ in &u.occurrences {
            let found = match &occ.kind {
                OccurrenceKind::PackageRef { name } => {
                    self.name.matches(name).then_some((occ.range, Accuracy::Exact))
                }
                OccurrenceKind::TypeRef { sig, prefixes, .. } if !prefixes.is_empty() => {
                    self.qualified_type_prefix(r, unit, &occ.ctx, &sig.name, prefixes)
                }
                OccurrenceKind::Name {
                    name,
                    qualifier: Some(q),
                    ..
                } => self.package_qualifier(r, unit, &occ.ctx, name, q, occ.range),
                _ => None,
            };
            if let Some((range, tier)) = found {
                if let Some(tier) = self.common.accept(tier) {
                    out.push(Located::at(range, occ.ctx, tier).in_javadoc(occ.in_javadoc));
                }
            }
        }
    }

    /// Package part of a qualified type name such as `java.util.Map.Entry`.
    fn qualified_type_prefix(
        &self,
        r: &Resolver<'_>,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        written: &str,
        prefixes: &[TextRange],
    ) -> Option<(TextRange, Accuracy)> {
        let segments: Vec<&str> = written.split('.').collect();
        let (package, tier) = match r.resolve_type_name(unit, ctx, written) {
            TypeResolution::Found(h) => (h.unit.unit.package_name().to_string(), Accuracy::Exact),
            TypeResolution::Known { qualified, .. } => {
                let owner_segments = qualified.split('.').take_while(|s| !starts_upper(s)).count();
                (segments[..owner_segments.min(segments.len())].join("."), Accuracy::Exact)
            }
            TypeResolution::Unresolved => {
                let n = segments.iter().take_while(|s| !starts_upper(s)).count();
                (segments[..n].join("."), Accuracy::Potential)
            }
            _ => return None,
        };
        if package.is_empty() || !written.starts_with(&format!("{}.", package)) {
            return None;
        }
        let depth = package.split('.').count();
        let range = *prefixes.get(depth - 1)?;
        self.name.matches(&package).then_some((range, tier))
    }

    /// `pkg.Type` used as an expression qualifier: report the package
    /// ahead of the type name.
    fn package_qualifier(
        &self,
        r: &Resolver<'_>,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        name: &str,
        qualifier: &Expr,
        at: TextRange,
    ) -> Option<(TextRange, Accuracy)> {
        let Expr::Path {
            base: PathBase::None,
            segments,
        } = qualifier
        else {
            return None;
        };
        let written = segments.join(".");
        if !self.name.matches(&written) {
            return None;
        }
        let ExprType::Package(p) = r.type_of(unit, ctx, qualifier) else {
            return None;
        };
        if p != written {
            return None;
        }
        if !matches!(r.resolve_name(unit, ctx, name, Some(qualifier)), NameTarget::Type(_)) {
            return None;
        }
        // `p.q.Type`: the package ends right before the dot preceding the name
        let end = at.start.checked_sub(1)? as usize;
        let start = end.checked_sub(written.len())?;
        let src = unit.source.as_deref()?;
        (src.get(start..end)? == written).then_some((TextRange::new(start, end), Accuracy::Exact))
    }
}

fn starts_upper(s: &str) -> bool {
    s.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

#[derive(Debug)]
enum ElementTarget {
    Textual(Option<String>),
    Bound(String),
}

#[derive(Debug)]
pub struct AnnotationElementLocator {
    common: Common,
    name: NameMatcher,
    annotation: ElementTarget,
}

impl AnnotationElementLocator {
    pub(super) fn textual(common: Common, annotation: Option<String>, element: &str) -> Self {
        Self {
            common,
            name: NameMatcher::new(element, common.rule),
            annotation: ElementTarget::Textual(annotation),
        }
    }

    pub(super) fn bound(common: Common, annotation: &str, element: &str) -> Self {
        Self {
            common,
            name: exact(element),
            annotation: ElementTarget::Bound(annotation.to_string()),
        }
    }

    pub(super) fn candidate_terms(&self) -> Vec<TermQuery> {
        let name = NameQuery::from_matcher(&self.name);
        let mut out = Vec::new();
        if self.common.declarations() {
            out.push(
                TermQuery::new(TermCategory::MethodDecl, name.clone()).with_arity(ArityQuery::Exact(0)),
            );
        }
        if self.common.references() {
            out.push(TermQuery::new(TermCategory::AnnElemRef, name));
        }
        out
    }

    fn owner_matches(&self, qualified: &str) -> bool {
        match &self.annotation {
            ElementTarget::Bound(q) => q == qualified,
            ElementTarget::Textual(q) => {
                qualification_matches(q.as_deref(), qualified, self.common.case_sensitive())
            }
        }
    }

    pub(super) fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let u = &unit.unit;
        if self.common.declarations() {
            let mut ordinal = 0;
            for (ti, t) in u.types.iter().enumerate() {
                if t.kind != TypeKind::Annotation {
                    continue;
                }
                for (mi, m) in t.methods.iter().enumerate() {
                    ordinal += 1;
                    if self.name.matches(&m.name) && self.owner_matches(&t.qualified) {
                        let ctx = Context {
                            owner: Some(ti),
                            member: Some(MemberRef::Method(mi)),
                            body: None,
                        };
                        out.push(Located::declaration(m.name_range, ordinal, ctx));
                    }
                }
            }
        }
        if !self.common.references() {
            return;
        }
        for occ in &u.occurrences {
            let OccurrenceKind::AnnotationElement {
                annotation,
                element,
            } = &occ.kind
            else {
                continue;
            };
            if !self.name.matches(element) {
                continue;
            }
            let tier = match &self.annotation {
                ElementTarget::Textual(None) => Some(Accuracy::Exact),
                _ => match r.resolve_type_name(unit, &occ.ctx, &annotation.name) {
                    TypeResolution::Unresolved => Some(Accuracy::Potential),
                    res => res
                        .qualified()
                        .filter(|q| self.owner_matches(q))
                        .map(|_| Accuracy::Exact),
                },
            };
            if let Some(tier) = tier.and_then(|t| self.common.accept(t)) {
                out.push(Located::at(occ.range, occ.ctx, tier));
            }
        }
    }
}

#[derive(Debug)]
pub struct ModuleLocator {
    common: Common,
    name: NameMatcher,
}

impl ModuleLocator {
    pub(super) fn textual(common: Common, name: &str) -> Self {
        Self {
            common,
            name: NameMatcher::new(name, common.rule),
        }
    }

    pub(super) fn bound(common: Common, name: &str) -> Self {
        Self {
            common,
            name: exact(name),
        }
    }

    pub(super) fn candidate_terms(&self) -> Vec<TermQuery> {
        let name = NameQuery::from_matcher(&self.name);
        let mut out = Vec::new();
        if self.common.declarations() {
            out.push(TermQuery::new(TermCategory::ModuleDecl, name.clone()));
        }
        if self.common.references() {
            out.push(TermQuery::new(TermCategory::ModuleRef, name));
        }
        out
    }

    pub(super) fn verify(&self, _r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let u = &unit.unit;
        if self.common.declarations() {
            if let Some(m) = &u.module {
                if self.name.matches(&m.name) {
                    out.push(Located::declaration(m.range, 0, Context::default()));
                }
            }
        }
        if !self.common.references() {
            return;
        }
        for occ in &u.occurrences {
            if let OccurrenceKind::ModuleRef { name } = &occ.kind {
                if self.name.matches(name) {
                    out.push(Located::at(occ.range, occ.ctx, Accuracy::Exact));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::locator::{Accuracy, PatternLocator};
    use crate::pattern::{ElementKind, Focus, LimitTo, MatchRule, Pattern};
    use crate::resolve::tests::FixedWorld;
    use crate::resolve::Resolver;

    fn texts(world: &FixedWorld, path: &str, p: &Pattern) -> Vec<(String, Accuracy)> {
        let unit = world.unit(path);
        let r = Resolver::new(world);
        let src = unit.source.clone().unwrap_or_else(|| "".into());
        PatternLocator::new(p)
            .expect("locator")
            .verify(&r, &unit)
            .into_iter()
            .map(|l| (l.range.map(|rg| rg.text(&src).to_string()).unwrap_or_default(), l.accuracy))
            .collect()
    }

    #[test]
    fn package_references_in_imports_and_qualified_types() {
        let world = FixedWorld::of(&[
            ("a/b/Tool.java", "package a.b; public class Tool { public static int N; }"),
            (
                "c/Use.java",
                "package c; import a.b.*; class Use { a.b.Tool t; int n = a.b.Tool.N; }",
            ),
        ]);
        let p = Pattern::bound(Focus::Package("a.b".into()), LimitTo::All, MatchRule::EXACT);
        let found = texts(&world, "c/Use.java", &p);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|(t, a)| t == "a.b" && *a == Accuracy::Exact));
        let decl = texts(&world, "a/b/Tool.java", &p);
        assert_eq!(decl, vec![("a.b".to_string(), Accuracy::Exact)]);
    }

    #[test]
    fn annotation_elements_and_modules() {
        let world = FixedWorld::of(&[
            ("q/Tag.java", "package q; public @interface Tag { String label(); }"),
            ("q/Use.java", "package q; @Tag(label = \"x\") class Use {}"),
            ("module-info.java", "module app.main { requires app.base; }"),
        ]);
        let p = Pattern::parse("Tag.label", ElementKind::AnnotationElement, LimitTo::All, MatchRule::EXACT);
        assert_eq!(texts(&world, "q/Tag.java", &p), vec![("label".to_string(), Accuracy::Exact)]);
        assert_eq!(texts(&world, "q/Use.java", &p), vec![("label".to_string(), Accuracy::Exact)]);

        let m = Pattern::parse("app.*", ElementKind::Module, LimitTo::All, MatchRule::PATTERN);
        assert_eq!(texts(&world, "module-info.java", &m).len(), 2);
    }
}
