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
use super::{qualification_matches, written_type_matches, Accuracy, Common, Flavor, Located};
use crate::encoder::{NameQuery, TermCategory, TermQuery};
use crate::pattern::{LimitTo, MatchRule, NameMatcher};
use crate::resolve::{MemberHandle, NameTarget, ResolvedType, Resolver, TypeHandle};
use crate::syntax::{Access, Context, MemberRef, OccurrenceKind, ParsedUnit, TypeSig};

#[derive(Debug)]
enum Target {
    Textual {
        declaring: Option<String>,
        ty: Option<TypeSig>,
    },
    Bound {
        declaring: String,
    },
}

#[derive(Debug)]
pub struct FieldLocator {
    common: Common,
    name: NameMatcher,
    target: Target,
}

impl FieldLocator {
    pub(super) fn textual(
        common: Common,
        declaring: Option<String>,
        name: &str,
        ty: Option<TypeSig>,
    ) -> Self {
        Self {
            common,
            name: NameMatcher::new(name, common.rule),
            target: Target::Textual { declaring, ty },
        }
    }

    pub(super) fn bound(common: Common, declaring: &str, name: &str) -> Self {
        Self {
            common,
            name: NameMatcher::new(name, MatchRule::CASE_SENSITIVE),
            target: Target::Bound {
                declaring: declaring.to_string(),
            },
        }
    }

    pub(super) fn candidate_terms(&self) -> Vec<TermQuery> {
        let name = NameQuery::from_matcher(&self.name);
        let mut out = Vec::new();
        if self.common.declarations() {
            out.push(TermQuery::new(TermCategory::FieldDecl, name.clone()));
        }
        if self.common.references() {
            out.push(TermQuery::new(TermCategory::FieldRef, name));
        }
        out
    }

    /// Read and write filters drop the other kind of access; javadoc and
    /// import references carry no access and count as neither.
    fn wants(&self, access: Option<Access>) -> bool {
        match self.common.limit_to {
            LimitTo::ReadAccesses => matches!(access, Some(Access::Read | Access::ReadWrite)),
            LimitTo::WriteAccesses => matches!(access, Some(Access::Write | Access::ReadWrite)),
            _ => true,
        }
    }

    pub(super) fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        if self.common.declarations() {
            self.declarations(unit, out);
        }
        if !self.common.references() {
            return;
        }
        for occ in &unit.unit.occurrences {
            let mut flavor = Flavor::default();
            let tier = match &occ.kind {
                OccurrenceKind::Name {
                    name,
                    qualifier,
                    access,
                } => {
                    if !self.name.matches(name) || !self.wants(Some(*access)) {
                        continue;
                    }
                    flavor.read = matches!(access, Access::Read | Access::ReadWrite);
                    flavor.write = matches!(access, Access::Write | Access::ReadWrite);
                    match r.resolve_name(unit, &occ.ctx, name, qualifier.as_ref()) {
                        NameTarget::Field(m) => self.member_matches(r, &m).then_some(Accuracy::Exact),
                        NameTarget::Unresolved => Some(Accuracy::Potential),
                        _ => None,
                    }
                }
                OccurrenceKind::DocMemberRef {
                    owner,
                    name,
                    params: None,
                } => {
                    if !self.name.matches(name) || !self.wants(None) {
                        continue;
                    }
                    let ty = match owner {
                        Some(sig) => r.resolve_sig(unit, &occ.ctx, sig),
                        None => match occ.ctx.owner {
                            Some(i) => r.this_type(&TypeHandle::new(unit.clone(), i)),
                            None => continue,
                        },
                    };
                    self.field_of(r, &ty, name)
                }
                OccurrenceKind::StaticImport { owner, member } => {
                    if !self.name.matches(member) || !self.wants(None) {
                        continue;
                    }
                    let ty = r
                        .lookup_qualified(owner)
                        .map(|h| r.this_type(&h))
                        .unwrap_or_else(|| ResolvedType::Unknown(owner.clone()));
                    self.field_of(r, &ty, member)
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

    fn declarations(&self, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let cs = self.common.case_sensitive();
        let mut ordinal = 0;
        for (ti, t) in unit.unit.types.iter().enumerate() {
            for (fi, f) in t.fields.iter().enumerate() {
                ordinal += 1;
                if !self.name.matches(&f.name) {
                    continue;
                }
                let ok = match &self.target {
                    Target::Bound { declaring } => &t.qualified == declaring,
                    Target::Textual { declaring, ty } => {
                        qualification_matches(declaring.as_deref(), &t.qualified, cs)
                            && ty
                                .as_ref()
                                .map(|want| written_type_matches(want, &f.ty, cs))
                                .unwrap_or(true)
                    }
                };
                if ok {
                    let ctx = Context {
                        owner: Some(ti),
                        member: Some(MemberRef::Field(fi)),
                        body: None,
                    };
                    out.push(Located::declaration(f.name_range, ordinal, ctx));
                }
            }
        }
    }

    fn field_of(&self, r: &Resolver<'_>, ty: &ResolvedType, name: &str) -> Option<Accuracy> {
        if ty.is_unknown() {
            return Some(Accuracy::Potential);
        }
        match r.field_named(ty, name) {
            (Some(m), _) => self.member_matches(r, &m).then_some(Accuracy::Exact),
            (None, false) => Some(Accuracy::Potential),
            (None, true) => None,
        }
    }

    fn member_matches(&self, r: &Resolver<'_>, m: &MemberHandle) -> bool {
        match &self.target {
            Target::Bound { declaring } => m.owner.qualified() == declaring,
            Target::Textual { declaring, ty } => {
                let cs = self.common.case_sensitive();
                if !qualification_matches(declaring.as_deref(), m.owner.qualified(), cs) {
                    return false;
                }
                match ty {
                    Some(want) => r
                        .field_type(m)
                        .map(|t| erased_matches(want, &t.erased_name(), cs))
                        .unwrap_or(false),
                    None => true,
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

    const SRC: &[(&str, &str)] = &[
        (
            "p/Counter.java",
            "package p; public class Counter { int count; void bump() { count = count + 1; int local = 0; local++; } }",
        ),
        (
            "p/Other.java",
            "package p; class Other { int count; int read(Counter c) { return c.count; } }",
        ),
    ];

    fn run(p: &Pattern) -> Vec<(String, bool, bool, Accuracy)> {
        let world = FixedWorld::of(SRC);
        let r = Resolver::new(&world);
        let loc = PatternLocator::new(p).expect("locator");
        let mut out = Vec::new();
        for u in &world.units {
            for l in loc.verify(&r, u) {
                out.push((u.key.entry.clone(), l.flavor.read, l.flavor.write, l.accuracy));
            }
        }
        out
    }

    fn focus(limit_to: LimitTo) -> Pattern {
        Pattern::bound(
            Focus::Field {
                declaring: "p.Counter".into(),
                name: "count".into(),
            },
            limit_to,
            MatchRule::EXACT,
        )
    }

    #[test]
    fn bound_field_references_exclude_same_named_fields() {
        let found = run(&focus(LimitTo::References));
        let files: Vec<&str> = found.iter().map(|(f, ..)| f.as_str()).collect();
        assert_eq!(files, vec!["p/Counter.java", "p/Counter.java", "p/Other.java"]);
        assert!(found.iter().all(|(.., a)| *a == Accuracy::Exact));
    }

    #[test]
    fn access_filters_split_reads_and_writes() {
        let writes = run(&focus(LimitTo::WriteAccesses));
        assert_eq!(writes.len(), 1);
        assert!(writes[0].2);
        let reads = run(&focus(LimitTo::ReadAccesses));
        assert_eq!(reads.len(), 2);
        assert!(reads.iter().all(|(_, r, _, _)| *r));
    }

    #[test]
    fn textual_declarations_honor_the_declaring_type() {
        let p = Pattern::parse("Other.count", ElementKind::Field, LimitTo::Declarations, MatchRule::EXACT);
        let found = run(&p);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "p/Other.java");
    }
}
