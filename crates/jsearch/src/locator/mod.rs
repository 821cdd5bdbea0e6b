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

//! Per-kind match strategies.
//!
//! A [`Locator`] turns a leaf pattern into index term queries and verifies
//! the occurrences of a parsed document against it. [`PatternLocator`]
//! composes leaves for AND/OR patterns.

pub mod accuracy;
mod constructors;
mod fields;
mod methods;
mod names;
mod types;

pub use accuracy::{compare_args, compare_textual_args, qualified_name_matches, Accuracy};

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::encoder::TermQuery;
use crate::index::RootIndex;
use crate::pattern::{glob_match, has_wildcards, ElementKind, Focus, Fragments, LimitTo, MatchRule, Pattern};
use crate::resolve::Resolver;
use crate::syntax::{Context, ParsedUnit, TypeSig};
use crate::types::TextRange;

use constructors::ConstructorLocator;
use fields::FieldLocator;
use methods::MethodLocator;
use names::{AnnotationElementLocator, ModuleLocator, PackageLocator};
use types::TypeLocator;

/// Optional qualities of a match.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Flavor {
    pub read: bool,
    pub write: bool,
    pub super_invocation: bool,
    pub in_javadoc: bool,
    /// Declared in a compiled unit, so there is no source range.
    pub implicit: bool,
}

impl Flavor {
    fn union(self, other: Flavor) -> Flavor {
        Flavor {
            read: self.read || other.read,
            write: self.write || other.write,
            super_invocation: self.super_invocation || other.super_invocation,
            in_javadoc: self.in_javadoc || other.in_javadoc,
            implicit: self.implicit || other.implicit,
        }
    }
}

/// A verified occurrence inside one document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Located {
    /// `None` for declarations of compiled units.
    pub range: Option<TextRange>,
    /// Declaration order of range-less matches, 0 otherwise.
    pub ordinal: usize,
    pub ctx: Context,
    pub accuracy: Accuracy,
    pub flavor: Flavor,
}

impl Located {
    pub(crate) fn at(range: TextRange, ctx: Context, accuracy: Accuracy) -> Self {
        Self {
            range: Some(range),
            ordinal: 0,
            ctx,
            accuracy,
            flavor: Flavor::default(),
        }
    }

    /// A declaration of a compiled unit.
    pub(crate) fn implicit(ordinal: usize, ctx: Context, accuracy: Accuracy) -> Self {
        Self {
            range: None,
            ordinal,
            ctx,
            accuracy,
            flavor: Flavor {
                implicit: true,
                ..Flavor::default()
            },
        }
    }

    /// A declaration: in source when it has a range, implicit otherwise.
    pub(crate) fn declaration(range: Option<TextRange>, ordinal: usize, ctx: Context) -> Self {
        match range {
            Some(r) => Self::at(r, ctx, Accuracy::Exact),
            None => Self::implicit(ordinal, ctx, Accuracy::Exact),
        }
    }

    pub(crate) fn with_flavor(mut self, flavor: Flavor) -> Self {
        self.flavor = self.flavor.union(flavor);
        self
    }

    pub(crate) fn in_javadoc(mut self, yes: bool) -> Self {
        self.flavor.in_javadoc |= yes;
        self
    }

    /// Identity of the match within its document.
    pub fn key(&self) -> (u32, u32, usize) {
        match self.range {
            Some(r) => (r.start, r.end, 0),
            None => (u32::MAX, u32::MAX, self.ordinal),
        }
    }
}

/// Keep one match per range, at its best tier. Output is in range order.
pub fn dedup(found: Vec<Located>) -> Vec<Located> {
    let mut best: BTreeMap<(u32, u32, usize), Located> = BTreeMap::new();
    for l in found {
        match best.get_mut(&l.key()) {
            Some(prev) => {
                let flavor = prev.flavor.union(l.flavor);
                if l.accuracy < prev.accuracy {
                    *prev = l;
                }
                prev.flavor = flavor;
            }
            None => {
                best.insert(l.key(), l);
            }
        }
    }
    best.into_values().collect()
}

/// Settings every leaf locator shares.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Common {
    pub limit_to: LimitTo,
    pub rule: MatchRule,
    pub bound: bool,
}

impl Common {
    fn new(limit_to: LimitTo, rule: MatchRule, bound: bool) -> Self {
        Self {
            limit_to,
            rule,
            bound,
        }
    }

    /// The tier if the rule lets it through.
    pub fn accept(&self, tier: Accuracy) -> Option<Accuracy> {
        tier.accepted_by(self.rule, self.bound).then_some(tier)
    }

    pub fn case_sensitive(&self) -> bool {
        self.rule.is_case_sensitive()
    }

    pub fn declarations(&self) -> bool {
        self.limit_to.wants_declarations()
    }

    pub fn references(&self) -> bool {
        self.limit_to.wants_references()
    }
}

/// Everything left of the last dot.
pub(crate) fn container_of(qualified: &str) -> &str {
    match qualified.rfind('.') {
        Some(i) => &qualified[..i],
        None => "",
    }
}

/// Whether a written qualification accepts a declared container. Glob
/// characters are honored; otherwise the qualification must name the
/// container or a dotted suffix of it.
pub(crate) fn qualification_matches(pattern: Option<&str>, container: &str, cs: bool) -> bool {
    let Some(p) = pattern else {
        return true;
    };
    if has_wildcards(p) {
        return glob_match(p, container, cs) || glob_match(&format!("*.{}", p), container, cs);
    }
    qualified_name_matches(p, container, cs)
}

/// A declared type as written against a type written in a pattern: by
/// simple name unless the pattern qualifies it, array ranks equal.
pub(crate) fn written_type_matches(pattern: &TypeSig, declared: &TypeSig, cs: bool) -> bool {
    if pattern.dims != declared.dims {
        return false;
    }
    if pattern.is_qualified() && declared.is_qualified() {
        return qualified_name_matches(&pattern.name, &declared.name, cs)
            || qualified_name_matches(&declared.name, &pattern.name, cs);
    }
    let (a, b) = (pattern.simple_name(), declared.simple_name());
    if cs {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// A leaf strategy, one per element kind.
#[derive(Debug)]
pub enum Locator {
    Type(TypeLocator),
    Method(MethodLocator),
    Field(FieldLocator),
    Constructor(ConstructorLocator),
    Package(PackageLocator),
    AnnotationElement(AnnotationElementLocator),
    Module(ModuleLocator),
}

impl Locator {
    /// `None` for composite patterns and for fragments that do not fit the kind.
    pub fn for_leaf(pattern: &Pattern) -> Option<Self> {
        match pattern {
            Pattern::Textual {
                kind,
                limit_to,
                fragments,
                rule,
            } => {
                let common = Common::new(*limit_to, *rule, false);
                Some(match (kind, fragments) {
                    (ElementKind::Type(filter), Fragments::Type(f)) => {
                        Locator::Type(TypeLocator::textual(common, *filter, f))
                    }
                    (
                        ElementKind::Method,
                        Fragments::Method {
                            declaring,
                            selector,
                            params,
                            return_type,
                        },
                    ) => Locator::Method(MethodLocator::textual(
                        common,
                        declaring.clone(),
                        selector,
                        params.clone(),
                        return_type.clone(),
                    )),
                    (ElementKind::Field, Fragments::Field { declaring, name, ty }) => Locator::Field(
                        FieldLocator::textual(common, declaring.clone(), name, ty.clone()),
                    ),
                    (
                        ElementKind::Constructor,
                        Fragments::Constructor {
                            qualification,
                            simple,
                            params,
                        },
                    ) => Locator::Constructor(ConstructorLocator::textual(
                        common,
                        qualification.clone(),
                        simple,
                        params.clone(),
                    )),
                    (ElementKind::Package, Fragments::Package(name)) => {
                        Locator::Package(PackageLocator::textual(common, name))
                    }
                    (
                        ElementKind::AnnotationElement,
                        Fragments::AnnotationElement {
                            annotation,
                            element,
                        },
                    ) => Locator::AnnotationElement(AnnotationElementLocator::textual(
                        common,
                        annotation.clone(),
                        element,
                    )),
                    (ElementKind::Module, Fragments::Module(name)) => {
                        Locator::Module(ModuleLocator::textual(common, name))
                    }
                    _ => return None,
                })
            }
            Pattern::Bound {
                kind,
                limit_to,
                focus,
                rule,
                ignore_declaring_type,
            } => {
                let common = Common::new(*limit_to, *rule, true);
                Some(match focus {
                    Focus::Type { qualified, args } => {
                        let filter = match kind {
                            ElementKind::Type(f) => *f,
                            _ => crate::pattern::TypeFilter::Any,
                        };
                        Locator::Type(TypeLocator::bound(common, filter, qualified, args.clone()))
                    }
                    Focus::Method(id) => Locator::Method(MethodLocator::bound(
                        common,
                        id.clone(),
                        *ignore_declaring_type,
                    )),
                    Focus::Field { declaring, name } => {
                        Locator::Field(FieldLocator::bound(common, declaring, name))
                    }
                    Focus::Constructor(id) => {
                        Locator::Constructor(ConstructorLocator::bound(common, id.clone()))
                    }
                    Focus::Package(name) => Locator::Package(PackageLocator::bound(common, name)),
                    Focus::AnnotationElement {
                        annotation,
                        element,
                    } => Locator::AnnotationElement(AnnotationElementLocator::bound(
                        common, annotation, element,
                    )),
                    Focus::Module(name) => Locator::Module(ModuleLocator::bound(common, name)),
                })
            }
            Pattern::And(..) | Pattern::Or(..) => None,
        }
    }

    /// Term queries whose union covers every document that can match.
    pub fn candidate_terms(&self) -> Vec<TermQuery> {
        match self {
            Locator::Type(l) => l.candidate_terms(),
            Locator::Method(l) => l.candidate_terms(),
            Locator::Field(l) => l.candidate_terms(),
            Locator::Constructor(l) => l.candidate_terms(),
            Locator::Package(l) => l.candidate_terms(),
            Locator::AnnotationElement(l) => l.candidate_terms(),
            Locator::Module(l) => l.candidate_terms(),
        }
    }

    /// Accepted matches in `unit`. Unresolvable occurrences come back as
    /// [`Accuracy::Potential`] when the rule allows it; nothing here fails.
    pub fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>) -> Vec<Located> {
        let mut out = Vec::new();
        match self {
            Locator::Type(l) => l.verify(r, unit, &mut out),
            Locator::Method(l) => l.verify(r, unit, &mut out),
            Locator::Field(l) => l.verify(r, unit, &mut out),
            Locator::Constructor(l) => l.verify(r, unit, &mut out),
            Locator::Package(l) => l.verify(r, unit, &mut out),
            Locator::AnnotationElement(l) => l.verify(r, unit, &mut out),
            Locator::Module(l) => l.verify(r, unit, &mut out),
        }
        out
    }
}

/// Locator tree mirroring a (possibly composite) pattern.
#[derive(Debug)]
pub enum PatternLocator {
    Leaf(Locator),
    And(Box<PatternLocator>, Box<PatternLocator>),
    Or(Box<PatternLocator>, Box<PatternLocator>),
}

impl PatternLocator {
    /// `None` when the pattern mixes element families or a leaf is malformed.
    pub fn new(pattern: &Pattern) -> Option<Self> {
        if !pattern.is_well_formed() {
            return None;
        }
        Self::build(pattern)
    }

    fn build(pattern: &Pattern) -> Option<Self> {
        Some(match pattern {
            Pattern::And(a, b) => {
                PatternLocator::And(Box::new(Self::build(a)?), Box::new(Self::build(b)?))
            }
            Pattern::Or(a, b) => {
                PatternLocator::Or(Box::new(Self::build(a)?), Box::new(Self::build(b)?))
            }
            leaf => PatternLocator::Leaf(Locator::for_leaf(leaf)?),
        })
    }

    /// Entries of `index` that may match. AND intersects the candidate sets
    /// of both sides before anything is parsed.
    pub fn candidates(&self, index: &RootIndex) -> BTreeSet<String> {
        match self {
            PatternLocator::Leaf(l) => index.candidates(&l.candidate_terms()),
            PatternLocator::And(a, b) => {
                let left = a.candidates(index);
                if left.is_empty() {
                    return left;
                }
                let right = b.candidates(index);
                left.intersection(&right).cloned().collect()
            }
            PatternLocator::Or(a, b) => {
                let mut left = a.candidates(index);
                left.extend(b.candidates(index));
                left
            }
        }
    }

    /// Deduplicated matches in range order. AND keeps occurrences both sides
    /// accept, at the weaker tier; OR keeps either, at the stronger.
    pub fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>) -> Vec<Located> {
        match self {
            PatternLocator::Leaf(l) => dedup(l.verify(r, unit)),
            PatternLocator::And(a, b) => {
                let left = a.verify(r, unit);
                if left.is_empty() {
                    return left;
                }
                let right: BTreeMap<_, _> = b
                    .verify(r, unit)
                    .into_iter()
                    .map(|l| (l.key(), l))
                    .collect();
                left.into_iter()
                    .filter_map(|mut l| {
                        let other = right.get(&l.key())?;
                        l.accuracy = l.accuracy.max(other.accuracy);
                        l.flavor = l.flavor.union(other.flavor);
                        Some(l)
                    })
                    .collect()
            }
            PatternLocator::Or(a, b) => {
                let mut all = a.verify(r, unit);
                all.extend(b.verify(r, unit));
                dedup(all)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::TypeFilter;
    use crate::resolve::tests::FixedWorld;

    fn run(world: &FixedWorld, path: &str, pattern: &Pattern) -> Vec<(String, Accuracy)> {
        let unit = world.unit(path);
        let r = Resolver::new(world);
        let loc = PatternLocator::new(pattern).expect("locator");
        loc.verify(&r, &unit)
            .into_iter()
            .map(|l| {
                let text = l
                    .range
                    .and_then(|rg| unit.source.as_deref().map(|s| rg.text(s).to_string()))
                    .unwrap_or_default();
                (text, l.accuracy)
            })
            .collect()
    }

    #[test]
    fn and_keeps_only_occurrences_both_sides_accept() {
        let world = FixedWorld::of(&[(
            "p/A.java",
            "package p; class A { java.util.List<String> a; java.util.Map<String, String> b; }",
        )]);
        let list = Pattern::parse("List", ElementKind::Type(TypeFilter::Any), LimitTo::References, MatchRule::EXACT);
        let any = Pattern::parse("*", ElementKind::Type(TypeFilter::Any), LimitTo::References, MatchRule::PATTERN);
        let both = run(&world, "p/A.java", &Pattern::and(list.clone(), any.clone()));
        assert_eq!(both, vec![("java.util.List".to_string(), Accuracy::Exact)]);

        let map = Pattern::parse("Map", ElementKind::Type(TypeFilter::Any), LimitTo::References, MatchRule::EXACT);
        let either = run(&world, "p/A.java", &Pattern::or(list, map));
        assert_eq!(either.len(), 2);
    }

    #[test]
    fn mixed_families_do_not_build() {
        let t = Pattern::parse("A", ElementKind::Type(TypeFilter::Any), LimitTo::All, MatchRule::EXACT);
        let m = Pattern::parse("run", ElementKind::Method, LimitTo::All, MatchRule::EXACT);
        assert!(PatternLocator::new(&Pattern::and(t, m)).is_none());
    }

    #[test]
    fn dedup_keeps_the_best_tier() {
        let r = TextRange::new(3, 5);
        let out = dedup(vec![
            Located::at(r, Context::default(), Accuracy::Potential),
            Located::at(r, Context::default(), Accuracy::Exact).in_javadoc(true),
            Located::at(TextRange::new(0, 1), Context::default(), Accuracy::Erasure),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].accuracy, Accuracy::Erasure);
        assert_eq!(out[1].accuracy, Accuracy::Exact);
        assert!(out[1].flavor.in_javadoc);
    }

    #[test]
    fn qualification_accepts_suffixes_and_globs() {
        assert!(qualification_matches(None, "p.q", true));
        assert!(qualification_matches(Some("q"), "p.q", true));
        assert!(qualification_matches(Some("p.*"), "p.q", true));
        assert!(!qualification_matches(Some("r"), "p.q", true));
        assert_eq!(container_of("p.q.A"), "p.q");
        assert_eq!(container_of("A"), "");
    }
}
