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

use std::sync::Arc;

use super::{
    qualification_matches, qualified_name_matches, written_type_matches, Accuracy, Common, Flavor,
    Located,
};
use crate::encoder::{ArityQuery, NameQuery, TermCategory, TermQuery};
use crate::pattern::{MatchRule, MethodId, NameMatcher};
use crate::resolve::{CallTarget, ExprType, MemberHandle, MemberKind, ResolvedType, Resolver, TypeHandle};
use crate::syntax::{Expr, MethodDecl, OccurrenceKind, ParsedUnit, TypeDecl, TypeSig};

#[derive(Debug)]
enum Target {
    Textual {
        declaring: Option<String>,
        params: Option<Vec<TypeSig>>,
        return_type: Option<TypeSig>,
    },
    Bound {
        id: MethodId,
        ignore_declaring_type: bool,
    },
}

#[derive(Debug)]
pub struct MethodLocator {
    common: Common,
    name: NameMatcher,
    target: Target,
}

/// Whether an erased type name is the one a pattern wrote.
pub(super) fn erased_matches(pattern: &TypeSig, erased: &str, cs: bool) -> bool {
    let want = format!("{}{}", pattern.name, "[]".repeat(pattern.dims as usize));
    qualified_name_matches(&want, erased, cs)
}

/// Resolved focus method, looked up once per document.
struct FocusMember<'a> {
    id: &'a MethodId,
    handle: Option<MemberHandle>,
}

impl FocusMember<'_> {
    /// The focus itself or one of its overrides.
    fn covers(&self, r: &Resolver<'_>, m: &MemberHandle) -> bool {
        if m.kind != MemberKind::Method {
            return false;
        }
        if r.method_id(m) == *self.id {
            return true;
        }
        self.handle
            .as_ref()
            .map(|f| r.overrides(m, f))
            .unwrap_or(false)
    }
}

impl MethodLocator {
    pub(super) fn textual(
        common: Common,
        declaring: Option<String>,
        selector: &str,
        params: Option<Vec<TypeSig>>,
        return_type: Option<TypeSig>,
    ) -> Self {
        Self {
            common,
            name: NameMatcher::new(selector, common.rule),
            target: Target::Textual {
                declaring,
                params,
                return_type,
            },
        }
    }

    pub(super) fn bound(common: Common, id: MethodId, ignore_declaring_type: bool) -> Self {
        Self {
            common,
            name: NameMatcher::new(&id.name, MatchRule::CASE_SENSITIVE),
            target: Target::Bound {
                id,
                ignore_declaring_type,
            },
        }
    }

    /// Declarations have an exact arity; a call may spread a trailing array
    /// parameter over any number of arguments.
    fn arity(&self, declaration: bool) -> ArityQuery {
        let (n, trailing_array) = match &self.target {
            Target::Textual {
                params: Some(p), ..
            } => (p.len(), p.last().map(|s| s.dims > 0).unwrap_or(false)),
            Target::Textual { params: None, .. } => return ArityQuery::Any,
            Target::Bound { id, .. } => (
                id.params.len(),
                id.params.last().map(|s| s.ends_with("[]")).unwrap_or(false),
            ),
        };
        if !declaration && trailing_array {
            ArityQuery::AtLeast(n - 1)
        } else {
            ArityQuery::Exact(n)
        }
    }

    pub(super) fn candidate_terms(&self) -> Vec<TermQuery> {
        let name = NameQuery::from_matcher(&self.name);
        let mut out = Vec::new();
        if self.common.declarations() {
            out.push(TermQuery::new(TermCategory::MethodDecl, name.clone()).with_arity(self.arity(true)));
        }
        if self.common.references() {
            out.push(TermQuery::new(TermCategory::MethodRef, name).with_arity(self.arity(false)));
        }
        out
    }

    /// Textual patterns naming only a selector accept any call of it.
    fn constrained(&self) -> bool {
        match &self.target {
            Target::Textual {
                declaring,
                params,
                return_type,
            } => declaring.is_some() || params.is_some() || return_type.is_some(),
            Target::Bound { .. } => true,
        }
    }

    fn arity_fits(&self, n: usize) -> bool {
        match self.arity(false) {
            ArityQuery::Exact(k) => n == k,
            ArityQuery::AtLeast(k) => n >= k,
            ArityQuery::Any => true,
        }
    }

    pub(super) fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let focus = match &self.target {
            Target::Bound { id, .. } => Some(FocusMember {
                id,
                handle: r.method_by_id(id),
            }),
            Target::Textual { .. } => None,
        };
        if self.common.declarations() {
            self.declarations(r, unit, focus.as_ref(), out);
        }
        if !self.common.references() {
            return;
        }
        for occ in &unit.unit.occurrences {
            let mut flavor = Flavor::default();
            let tier = match &occ.kind {
                OccurrenceKind::MethodCall {
                    selector,
                    receiver,
                    args,
                } => {
                    if !self.name.matches(selector) || !self.arity_fits(args.len()) {
                        continue;
                    }
                    flavor.super_invocation = receiver.as_ref().map(Expr::is_super).unwrap_or(false);
                    if !self.constrained() {
                        Some(Accuracy::Exact)
                    } else {
                        let target = r.resolve_call(unit, &occ.ctx, receiver.as_ref(), selector, args);
                        self.call_tier(r, focus.as_ref(), target)
                    }
                }
                OccurrenceKind::MethodRef {
                    selector,
                    receiver,
                    receiver_type,
                } => {
                    if !self.name.matches(selector) {
                        continue;
                    }
                    if !self.constrained() {
                        Some(Accuracy::Exact)
                    } else {
                        let owner = match (receiver_type, receiver) {
                            (Some(sig), _) => Some(r.resolve_sig(unit, &occ.ctx, sig)),
                            (None, Some(e)) => match r.type_of(unit, &occ.ctx, e) {
                                ExprType::Value(t) | ExprType::Static(t) => Some(t),
                                _ => None,
                            },
                            (None, None) => None,
                        };
                        self.member_of_type(r, focus.as_ref(), owner, selector, None)
                    }
                }
                OccurrenceKind::AnnotationElement {
                    annotation,
                    element,
                } => {
                    if !self.name.matches(element) || !self.arity_fits(0) {
                        continue;
                    }
                    if !self.constrained() {
                        Some(Accuracy::Exact)
                    } else {
                        let owner = r.resolve_sig(unit, &occ.ctx, annotation);
                        self.member_of_type(r, focus.as_ref(), Some(owner), element, None)
                    }
                }
                OccurrenceKind::DocMemberRef {
                    owner,
                    name,
                    params,
                } => {
                    if !self.name.matches(name) {
                        continue;
                    }
                    let owner = match owner {
                        Some(sig) => Some(r.resolve_sig(unit, &occ.ctx, sig)),
                        None => occ
                            .ctx
                            .owner
                            .map(|i| r.this_type(&TypeHandle::new(unit.clone(), i))),
                    };
                    self.member_of_type(r, focus.as_ref(), owner, name, params.as_deref())
                }
                OccurrenceKind::StaticImport { owner, member } => {
                    if !self.name.matches(member) {
                        continue;
                    }
                    let ty = r
                        .lookup_qualified(owner)
                        .map(|h| r.this_type(&h))
                        .unwrap_or_else(|| ResolvedType::Unknown(owner.clone()));
                    self.member_of_type(r, focus.as_ref(), Some(ty), member, None)
                }
                _ => continue,
            };
            if let Some(tier) = tier.and_then(|t| self.common.accept(t)) {
                out.push(
                    Located::at(occ.range, occ.ctx, tier)
                        .with_flavor(flavor)
                        .in_javadoc(occ.in_javadoc),
                );
            }
        }
    }

    fn declarations(
        &self,
        r: &Resolver<'_>,
        unit: &Arc<ParsedUnit>,
        focus: Option<&FocusMember<'_>>,
        out: &mut Vec<Located>,
    ) {
        let mut ordinal = 0;
        for (ti, t) in unit.unit.types.iter().enumerate() {
            for (mi, m) in t.methods.iter().enumerate() {
                ordinal += 1;
                if !self.name.matches(&m.name) {
                    continue;
                }
                let handle = MemberHandle::new(TypeHandle::new(unit.clone(), ti), MemberKind::Method, mi);
                let hit = match (&self.target, focus) {
                    (
                        Target::Bound {
                            id,
                            ignore_declaring_type,
                        },
                        Some(f),
                    ) => {
                        if m.params.len() != id.params.len() {
                            false
                        } else if *ignore_declaring_type {
                            f.covers(r, &handle)
                        } else {
                            t.qualified == id.declaring && r.method_id(&handle) == *id
                        }
                    }
                    _ => self.declared_matches(t, m),
                };
                if hit {
                    out.push(Located::declaration(m.name_range, ordinal, handle.context()));
                }
            }
        }
    }

    /// Compare a declaration with textual fragments, as written.
    fn declared_matches(&self, t: &TypeDecl, m: &MethodDecl) -> bool {
        let Target::Textual {
            declaring,
            params,
            return_type,
        } = &self.target
        else {
            return false;
        };
        let cs = self.common.case_sensitive();
        if !qualification_matches(declaring.as_deref(), &t.qualified, cs) {
            return false;
        }
        if let Some(ps) = params {
            if ps.len() != m.params.len()
                || !ps
                    .iter()
                    .zip(&m.params)
                    .all(|(p, d)| written_type_matches(p, &d.ty, cs))
            {
                return false;
            }
        }
        if let Some(rt) = return_type {
            match &m.return_type {
                Some(d) if written_type_matches(rt, d, cs) => {}
                _ => return false,
            }
        }
        true
    }

    /// Compare a resolved member with the pattern.
    fn member_matches(&self, r: &Resolver<'_>, focus: Option<&FocusMember<'_>>, m: &MemberHandle) -> bool {
        if let Some(f) = focus {
            return f.covers(r, m);
        }
        let Target::Textual {
            declaring,
            params,
            return_type,
        } = &self.target
        else {
            return false;
        };
        let cs = self.common.case_sensitive();
        if !qualification_matches(declaring.as_deref(), m.owner.qualified(), cs) {
            return false;
        }
        if let Some(ps) = params {
            let actual = r.param_types(m);
            if ps.len() != actual.len()
                || !ps
                    .iter()
                    .zip(&actual)
                    .all(|(p, a)| erased_matches(p, &a.erased_name(), cs))
            {
                return false;
            }
        }
        if let Some(rt) = return_type {
            match r.return_type(m) {
                Some(t) if erased_matches(rt, &t.erased_name(), cs) => {}
                _ => return false,
            }
        }
        true
    }

    fn call_tier(
        &self,
        r: &Resolver<'_>,
        focus: Option<&FocusMember<'_>>,
        target: CallTarget,
    ) -> Option<Accuracy> {
        match target {
            CallTarget::Resolved(m) => self.member_matches(r, focus, &m).then_some(Accuracy::Exact),
            CallTarget::Ambiguous(ms) => ms
                .iter()
                .any(|m| self.member_matches(r, focus, m))
                .then_some(Accuracy::Potential),
            CallTarget::Unresolved => Some(Accuracy::Potential),
            CallTarget::NotFound | CallTarget::DefaultConstructor(_) => None,
        }
    }

    /// A member named on a type without a call to pick an overload: exact
    /// when every candidate matches, potential when only some do.
    fn member_of_type(
        &self,
        r: &Resolver<'_>,
        focus: Option<&FocusMember<'_>>,
        owner: Option<ResolvedType>,
        name: &str,
        params: Option<&[TypeSig]>,
    ) -> Option<Accuracy> {
        let owner = match owner {
            Some(t) if !t.is_unknown() => t,
            _ => return Some(Accuracy::Potential),
        };
        let (cands, complete) = r.methods_named(&owner, name);
        let cs = self.common.case_sensitive();
        let cands: Vec<MemberHandle> = match params {
            Some(ps) => cands
                .into_iter()
                .filter(|m| {
                    let actual = r.param_types(m);
                    actual.len() == ps.len()
                        && ps
                            .iter()
                            .zip(&actual)
                            .all(|(p, a)| erased_matches(p, &a.erased_name(), cs))
                })
                .collect(),
            None => cands,
        };
        let hits = cands
            .iter()
            .filter(|m| self.member_matches(r, focus, m))
            .count();
        if hits == 0 {
            return (!complete).then_some(Accuracy::Potential);
        }
        if hits == cands.len() {
            Some(Accuracy::Exact)
        } else {
            Some(Accuracy::Potential)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::locator::{Accuracy, PatternLocator};
    use crate::pattern::{ElementKind, Focus, LimitTo, MatchRule, MethodId, Pattern};
    use crate::resolve::tests::FixedWorld;
    use crate::resolve::Resolver;

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

    fn matches(world: &FixedWorld, p: &Pattern) -> Vec<(String, String, Accuracy)> {
        let r = Resolver::new(world);
        let loc = PatternLocator::new(p).expect("locator");
        let mut out = Vec::new();
        for u in &world.units {
            let src = u.source.clone().unwrap_or_else(|| "".into());
            for l in loc.verify(&r, u) {
                let text = l.range.map(|rg| rg.text(&src).to_string()).unwrap_or_default();
                out.push((u.key.entry.clone(), text, l.accuracy));
            }
        }
        out
    }

    #[test]
    fn declarations_ignoring_declaring_type_report_each_override_once() {
        let world = FixedWorld::of(SHAPES);
        let p = Pattern::bound(Focus::Method(area()), LimitTo::Declarations, MatchRule::EXACT)
            .ignoring_declaring_type();
        let found: Vec<String> = matches(&world, &p).into_iter().map(|(e, _, _)| e).collect();
        assert_eq!(found, vec!["p/Shape.java", "p/Square.java"]);

        let own = Pattern::bound(Focus::Method(area()), LimitTo::Declarations, MatchRule::EXACT);
        assert_eq!(matches(&world, &own).len(), 1);
    }

    #[test]
    fn references_follow_overrides_and_skip_other_overloads() {
        let world = FixedWorld::of(SHAPES);
        let p = Pattern::bound(Focus::Method(area()), LimitTo::References, MatchRule::EXACT);
        let found = matches(&world, &p);
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|(_, t, a)| t == "area" && *a == Accuracy::Exact));

        let draw_int = MethodId {
            declaring: "p.Shape".into(),
            name: "draw".into(),
            params: vec!["int".into()],
        };
        let p = Pattern::bound(Focus::Method(draw_int), LimitTo::References, MatchRule::EXACT);
        assert_eq!(matches(&world, &p).len(), 1);
    }

    #[test]
    fn textual_selector_without_constraints_is_exact() {
        let world = FixedWorld::of(SHAPES);
        let p = Pattern::parse("dr*", ElementKind::Method, LimitTo::References, MatchRule::PATTERN);
        assert_eq!(matches(&world, &p).len(), 2);
        let typed = Pattern::parse("draw(String)", ElementKind::Method, LimitTo::References, MatchRule::EXACT);
        assert_eq!(matches(&world, &typed).len(), 1);
    }

    #[test]
    fn unresolved_receiver_is_potential_for_lenient_rules_only() {
        let world = FixedWorld::of(&[
            ("p/Shape.java", SHAPES[0].1),
            ("p/Odd.java", "package p; class Odd { void go(Mystery m) { m.area(); } }"),
        ]);
        let strict = Pattern::bound(Focus::Method(area()), LimitTo::References, MatchRule::EXACT);
        assert!(matches(&world, &strict).is_empty());
        let lenient = Pattern::bound(Focus::Method(area()), LimitTo::References, MatchRule::ERASURE);
        assert_eq!(
            matches(&world, &lenient),
            vec![("p/Odd.java".to_string(), "area".to_string(), Accuracy::Potential)]
        );
    }
}
