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

use super::methods::erased_matches;
use super::{container_of, qualification_matches, written_type_matches, Accuracy, Common, Flavor, Located};
use crate::encoder::{ArityQuery, NameQuery, TermCategory, TermQuery};
use crate::pattern::{MatchRule, MethodId, NameMatcher};
use crate::resolve::{CallTarget, MemberHandle, MemberKind, Resolver, TypeHandle};
use crate::syntax::{CtorForm, OccurrenceKind, ParsedUnit, TypeSig};

#[derive(Debug)]
enum Target {
    Textual {
        qualification: Option<String>,
        params: Option<Vec<TypeSig>>,
    },
    Bound(MethodId),
}

#[derive(Debug)]
pub struct ConstructorLocator {
    common: Common,
    /// Simple name of the constructed type.
    name: NameMatcher,
    target: Target,
}

impl ConstructorLocator {
    pub(super) fn textual(
        common: Common,
        qualification: Option<String>,
        simple: &str,
        params: Option<Vec<TypeSig>>,
    ) -> Self {
        Self {
            common,
            name: NameMatcher::new(simple, common.rule),
            target: Target::Textual {
                qualification,
                params,
            },
        }
    }

    pub(super) fn bound(common: Common, id: MethodId) -> Self {
        let simple = id.declaring.rsplit('.').next().unwrap_or(&id.declaring).to_string();
        Self {
            common,
            name: NameMatcher::new(&simple, MatchRule::CASE_SENSITIVE),
            target: Target::Bound(id),
        }
    }

    fn arity(&self, declaration: bool) -> ArityQuery {
        let (n, trailing_array) = match &self.target {
            Target::Textual {
                params: Some(p), ..
            } => (p.len(), p.last().map(|s| s.dims > 0).unwrap_or(false)),
            Target::Textual { params: None, .. } => return ArityQuery::Any,
            Target::Bound(id) => (
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
            out.push(TermQuery::new(TermCategory::CtorDecl, name.clone()).with_arity(self.arity(true)));
        }
        if self.common.references() {
            out.push(TermQuery::new(TermCategory::CtorRef, name).with_arity(self.arity(false)));
        }
        out
    }

    fn constrained(&self) -> bool {
        match &self.target {
            Target::Textual {
                qualification,
                params,
            } => qualification.is_some() || params.is_some(),
            Target::Bound(_) => true,
        }
    }

    pub(super) fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        if self.common.declarations() {
            self.declarations(r, unit, out);
        }
        if !self.common.references() {
            return;
        }
        for occ in &unit.unit.occurrences {
            let OccurrenceKind::ConstructorCall { sig, args, form } = &occ.kind else {
                continue;
            };
            if !self.name.matches(sig.simple_name()) {
                continue;
            }
            let arity_ok = *form == CtorForm::Reference
                || match self.arity(false) {
                    ArityQuery::Exact(k) => args.len() == k,
                    ArityQuery::AtLeast(k) => args.len() >= k,
                    ArityQuery::Any => true,
                };
            if !arity_ok {
                continue;
            }
            let flavor = Flavor {
                super_invocation: *form == CtorForm::Super,
                ..Flavor::default()
            };
            let tier = if !self.constrained() {
                Some(Accuracy::Exact)
            } else {
                let ty = r.resolve_sig(unit, &occ.ctx, sig);
                match r.resolve_constructor(unit, &occ.ctx, &ty, args, *form) {
                    CallTarget::Resolved(m) => self.member_matches(r, &m).then_some(Accuracy::Exact),
                    CallTarget::DefaultConstructor(h) => {
                        self.default_matches(&h).then_some(Accuracy::Exact)
                    }
                    CallTarget::Ambiguous(ms) => ms
                        .iter()
                        .any(|m| self.member_matches(r, m))
                        .then_some(Accuracy::Potential),
                    CallTarget::Unresolved => Some(Accuracy::Potential),
                    CallTarget::NotFound => None,
                }
            };
            if let Some(tier) = tier.and_then(|t| self.common.accept(t)) {
                out.push(Located::at(occ.range, occ.ctx, tier).with_flavor(flavor));
            }
        }
    }

    fn declarations(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let cs = self.common.case_sensitive();
        let mut ordinal = 0;
        for (ti, t) in unit.unit.types.iter().enumerate() {
            if t.anonymous || !self.name.matches(&t.name) {
                ordinal += t.constructors.len();
                continue;
            }
            for (ci, c) in t.constructors.iter().enumerate() {
                ordinal += 1;
                let handle = MemberHandle::new(TypeHandle::new(unit.clone(), ti), MemberKind::Constructor, ci);
                let hit = match &self.target {
                    Target::Bound(id) => {
                        t.qualified == id.declaring
                            && c.params.len() == id.params.len()
                            && r.method_id(&handle) == *id
                    }
                    Target::Textual {
                        qualification,
                        params,
                    } => {
                        qualification_matches(qualification.as_deref(), container_of(&t.qualified), cs)
                            && params
                                .as_ref()
                                .map(|ps| {
                                    ps.len() == c.params.len()
                                        && ps
                                            .iter()
                                            .zip(&c.params)
                                            .all(|(p, d)| written_type_matches(p, &d.ty, cs))
                                })
                                .unwrap_or(true)
                    }
                };
                if hit {
                    out.push(Located::declaration(c.name_range, ordinal, handle.context()));
                }
            }
        }
    }

    fn member_matches(&self, r: &Resolver<'_>, m: &MemberHandle) -> bool {
        match &self.target {
            Target::Bound(id) => r.method_id(m) == *id,
            Target::Textual {
                qualification,
                params,
            } => {
                let cs = self.common.case_sensitive();
                if !qualification_matches(qualification.as_deref(), container_of(m.owner.qualified()), cs) {
                    return false;
                }
                match params {
                    Some(ps) => {
                        let actual = r.param_types(m);
                        ps.len() == actual.len()
                            && ps
                                .iter()
                                .zip(&actual)
                                .all(|(p, a)| erased_matches(p, &a.erased_name(), cs))
                    }
                    None => true,
                }
            }
        }
    }

    /// The implicit constructor takes no arguments.
    fn default_matches(&self, h: &TypeHandle) -> bool {
        match &self.target {
            Target::Bound(id) => id.declaring == h.qualified() && id.params.is_empty(),
            Target::Textual {
                qualification,
                params,
            } => {
                qualification_matches(
                    qualification.as_deref(),
                    container_of(h.qualified()),
                    self.common.case_sensitive(),
                ) && params.as_ref().map(|p| p.is_empty()).unwrap_or(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::locator::{Accuracy, PatternLocator};
    use crate::pattern::{ElementKind, Focus, LimitTo, MatchRule, MethodId, Pattern};
    use crate::resolve::tests::FixedWorld;
    use crate::resolve::Resolver;

    const SRC: &[(&str, &str)] = &[
        (
            "p/Point.java",
            "package p; public class Point { public Point(int x) {} public Point(String s) { this(1); } }",
        ),
        (
            "p/Make.java",
            "package p; class Make extends Point { Make() { super(\"a\"); } Object a = new Point(2); Object b = new Make(); }",
        ),
        ("p/Bare.java", "package p; class Bare { Object o = new Bare(); }"),
    ];

    fn found(p: &Pattern) -> Vec<(String, Accuracy, bool)> {
        let world = FixedWorld::of(SRC);
        let r = Resolver::new(&world);
        let loc = PatternLocator::new(p).expect("locator");
        let mut out = Vec::new();
        for u in &world.units {
            for l in loc.verify(&r, u) {
                out.push((u.key.entry.clone(), l.accuracy, l.flavor.super_invocation));
            }
        }
        out
    }

    #[test]
    fn creation_this_and_super_calls_bind_by_overload() {
        let int_ctor = Pattern::bound(
            Focus::Constructor(MethodId {
                declaring: "p.Point".into(),
                name: "Point".into(),
                params: vec!["int".into()],
            }),
            LimitTo::References,
            MatchRule::EXACT,
        );
        assert_eq!(
            found(&int_ctor),
            vec![
                ("p/Point.java".to_string(), Accuracy::Exact, false),
                ("p/Make.java".to_string(), Accuracy::Exact, false),
            ]
        );
        let string_ctor = Pattern::bound(
            Focus::Constructor(MethodId {
                declaring: "p.Point".into(),
                name: "Point".into(),
                params: vec!["java.lang.String".into()],
            }),
            LimitTo::All,
            MatchRule::EXACT,
        );
        assert_eq!(
            found(&string_ctor),
            vec![
                ("p/Point.java".to_string(), Accuracy::Exact, false),
                ("p/Make.java".to_string(), Accuracy::Exact, true),
            ]
        );
    }

    #[test]
    fn implicit_constructor_is_referenced_by_creation() {
        let p = Pattern::bound(
            Focus::Constructor(MethodId {
                declaring: "p.Bare".into(),
                name: "Bare".into(),
                params: vec![],
            }),
            LimitTo::References,
            MatchRule::EXACT,
        );
        assert_eq!(found(&p), vec![("p/Bare.java".to_string(), Accuracy::Exact, false)]);
    }

    #[test]
    fn textual_constructor_declarations() {
        let p = Pattern::parse("Point(String)", ElementKind::Constructor, LimitTo::Declarations, MatchRule::EXACT);
        assert_eq!(found(&p).len(), 1);
    }
}
