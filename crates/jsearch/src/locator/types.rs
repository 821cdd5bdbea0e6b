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
    compare_args, compare_textual_args, container_of, qualification_matches, Accuracy, Common,
    Located,
};
use crate::encoder::{NameQuery, TermCategory, TermQuery};
use crate::pattern::{LimitTo, MatchRule, NameMatcher, TypeFilter, TypeFragments};
use crate::resolve::{NameTarget, ResolvedType, Resolver, TypeResolution};
use crate::syntax::{Context, OccurrenceKind, ParsedUnit, TypeArg, TypeRole, TypeSig};

#[derive(Debug)]
enum Target {
    Textual {
        qualification: Option<String>,
        args: Option<Vec<TypeArg>>,
    },
    Bound {
        qualified: String,
        args: Option<Vec<ResolvedType>>,
    },
}

#[derive(Debug)]
pub struct TypeLocator {
    common: Common,
    filter: TypeFilter,
    name: NameMatcher,
    target: Target,
}

fn element(ty: ResolvedType) -> ResolvedType {
    match ty {
        ResolvedType::Array(e) => element(*e),
        other => other,
    }
}

fn starts_upper(s: &str) -> bool {
    s.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

impl TypeLocator {
    pub(super) fn textual(common: Common, filter: TypeFilter, f: &TypeFragments) -> Self {
        Self {
            common,
            filter,
            name: NameMatcher::new(&f.simple, common.rule),
            target: Target::Textual {
                qualification: f.qualification.clone(),
                args: f.args.clone(),
            },
        }
    }

    pub(super) fn bound(
        common: Common,
        filter: TypeFilter,
        qualified: &str,
        args: Option<Vec<ResolvedType>>,
    ) -> Self {
        let simple = qualified.rsplit('.').next().unwrap_or(qualified);
        Self {
            common,
            filter,
            name: NameMatcher::new(simple, MatchRule::CASE_SENSITIVE),
            target: Target::Bound {
                qualified: qualified.to_string(),
                args,
            },
        }
    }

    pub(super) fn candidate_terms(&self) -> Vec<TermQuery> {
        let name = NameQuery::from_matcher(&self.name);
        let mut out = Vec::new();
        if self.common.declarations() {
            out.push(TermQuery::new(TermCategory::TypeDecl, name.clone()));
        }
        match self.common.limit_to {
            LimitTo::Implementors => out.push(TermQuery::new(TermCategory::SuperRef, name)),
            LimitTo::Declarations => {}
            _ => out.push(TermQuery::new(TermCategory::TypeRef, name)),
        }
        out
    }

    /// Textual patterns only resolve a reference when they constrain more
    /// than its simple name.
    fn needs_resolution(&self) -> bool {
        match &self.target {
            Target::Textual {
                qualification,
                args,
            } => qualification.is_some() || args.is_some() || self.filter != TypeFilter::Any,
            Target::Bound { .. } => true,
        }
    }

    pub(super) fn verify(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        if self.common.declarations() {
            self.declarations(unit, out);
        }
        if self.common.limit_to == LimitTo::Implementors {
            self.implementors(r, unit, out);
            return;
        }
        if !self.common.references() {
            return;
        }
        for occ in &unit.unit.occurrences {
            let tier = match &occ.kind {
                OccurrenceKind::TypeRef { sig, .. } => {
                    if !self.name.matches(sig.simple_name()) {
                        continue;
                    }
                    self.reference(r, unit, &occ.ctx, sig)
                }
                OccurrenceKind::Name {
                    name, qualifier, ..
                } => {
                    if !self.name.matches(name) {
                        continue;
                    }
                    match r.resolve_name(unit, &occ.ctx, name, qualifier.as_ref()) {
                        NameTarget::Type(res) => self.resolution(&res),
                        NameTarget::Unresolved if starts_upper(name) => Some(Accuracy::Potential),
                        _ => None,
                    }
                }
                _ => continue,
            };
            if let Some(tier) = tier.and_then(|t| self.common.accept(t)) {
                out.push(Located::at(occ.range, occ.ctx, tier).in_javadoc(occ.in_javadoc));
            }
        }
    }

    fn declarations(&self, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        let cs = self.common.case_sensitive();
        for (i, t) in unit.unit.types.iter().enumerate() {
            if t.anonymous || t.name.is_empty() || !self.name.matches(&t.name) {
                continue;
            }
            if !self.filter.accepts(t.kind) {
                continue;
            }
            let ok = match &self.target {
                Target::Textual { qualification, .. } => {
                    qualification_matches(qualification.as_deref(), container_of(&t.qualified), cs)
                }
                Target::Bound { qualified, .. } => &t.qualified == qualified,
            };
            if ok {
                let ctx = Context {
                    owner: t.parent,
                    ..Context::default()
                };
                out.push(Located::declaration(t.name_range, i, ctx));
            }
        }
    }

    /// Supertype references in source, and supertypes of compiled types.
    fn implementors(&self, r: &Resolver<'_>, unit: &Arc<ParsedUnit>, out: &mut Vec<Located>) {
        if unit.unit.has_source {
            for occ in &unit.unit.occurrences {
                let OccurrenceKind::TypeRef {
                    sig,
                    role: TypeRole::Supertype,
                    ..
                } = &occ.kind
                else {
                    continue;
                };
                if !self.name.matches(sig.simple_name()) {
                    continue;
                }
                if let Some(tier) = self
                    .reference(r, unit, &occ.ctx, sig)
                    .and_then(|t| self.common.accept(t))
                {
                    out.push(Located::at(occ.range, occ.ctx, tier));
                }
            }
            return;
        }
        let cs = self.common.case_sensitive();
        for (i, t) in unit.unit.types.iter().enumerate() {
            let hit = t.supertypes().any(|s| {
                self.name.matches(s.simple_name())
                    && match &self.target {
                        Target::Textual { qualification, .. } => {
                            qualification_matches(qualification.as_deref(), container_of(&s.name), cs)
                        }
                        Target::Bound { qualified, .. } => &s.name == qualified,
                    }
            });
            if hit {
                let ctx = Context {
                    owner: Some(i),
                    ..Context::default()
                };
                out.push(Located::implicit(i, ctx, Accuracy::Exact));
            }
        }
    }

    fn reference(
        &self,
        r: &Resolver<'_>,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        sig: &TypeSig,
    ) -> Option<Accuracy> {
        if !self.needs_resolution() {
            return Some(Accuracy::Exact);
        }
        match &self.target {
            Target::Bound { qualified, args } => {
                match element(r.resolve_sig(unit, ctx, sig)) {
                    ResolvedType::Declared {
                        qualified: q,
                        args: found,
                    } if &q == qualified => Some(match args {
                        Some(focus) => compare_args(focus, found.as_deref()),
                        None => Accuracy::Exact,
                    }),
                    ResolvedType::Unknown(_) => Some(Accuracy::Potential),
                    _ => None,
                }
            }
            Target::Textual { args, .. } => {
                let res = r.resolve_type_name(unit, ctx, &sig.name);
                let tier = self.resolution(&res)?;
                match args {
                    Some(pattern) if tier == Accuracy::Exact => {
                        let ty = element(r.resolve_sig(unit, ctx, sig));
                        Some(compare_textual_args(
                            pattern,
                            ty.args(),
                            self.common.case_sensitive(),
                        ))
                    }
                    _ => Some(tier),
                }
            }
        }
    }

    /// Judge a resolved type name against the pattern's qualification and
    /// kind filter.
    fn resolution(&self, res: &TypeResolution) -> Option<Accuracy> {
        match res {
            TypeResolution::Found(_) | TypeResolution::Known { .. } => {}
            TypeResolution::Unresolved => return Some(Accuracy::Potential),
            TypeResolution::TypeVar { .. } | TypeResolution::Primitive(_) => return None,
        }
        let q = res.qualified()?;
        match &self.target {
            Target::Bound { qualified, .. } => {
                if q != qualified {
                    return None;
                }
            }
            Target::Textual { qualification, .. } => {
                let cs = self.common.case_sensitive();
                if !qualification_matches(qualification.as_deref(), container_of(q), cs) {
                    return None;
                }
            }
        }
        match res.kind() {
            Some(k) if self.filter.accepts(k) => Some(Accuracy::Exact),
            Some(_) => None,
            None if self.filter == TypeFilter::Any => Some(Accuracy::Exact),
            None => Some(Accuracy::Potential),
        }
    }
}
