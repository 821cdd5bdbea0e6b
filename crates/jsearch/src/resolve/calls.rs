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

//! Expression typing, name binding and call-target selection.

use std::sync::Arc;

use super::hierarchy::{MemberHandle, Tri};
use super::types::{boxed, unboxed, widens_to, ResolvedType, OBJECT};
use super::{Resolver, TypeHandle, TypeResolution};
use crate::syntax::{Context, CtorForm, Expr, ImportKind, ParsedUnit, PathBase, TypeKind, TypeSig};

#[derive(Clone, Debug)]
pub enum ExprType {
    Value(ResolvedType),
    /// A type name used as a qualifier.
    Static(ResolvedType),
    Package(String),
    Unknown,
}

fn value(t: ResolvedType) -> ExprType {
    if t.is_unknown() {
        ExprType::Unknown
    } else {
        ExprType::Value(t)
    }
}

#[derive(Clone, Debug)]
pub enum CallTarget {
    Resolved(MemberHandle),
    /// Several candidates remain applicable.
    Ambiguous(Vec<MemberHandle>),
    /// Implicit no-argument constructor of a class declaring none.
    DefaultConstructor(TypeHandle),
    /// The lookup was complete and nothing in the corpus applies.
    NotFound,
    /// The receiver or part of its hierarchy is unresolved.
    Unresolved,
}

#[derive(Clone, Debug)]
pub enum NameTarget {
    Local,
    Field(MemberHandle),
    Type(TypeResolution),
    Package(String),
    NotFound,
    Unresolved,
}

enum Lookup<T> {
    Found(T),
    Incomplete,
    Missing,
}

fn starts_upper(s: &str) -> bool {
    s.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
}

fn starts_lower(s: &str) -> bool {
    s.chars().next().map(|c| c.is_lowercase()).unwrap_or(false)
}

impl<'w> Resolver<'w> {
    pub fn type_of(&self, unit: &Arc<ParsedUnit>, ctx: &Context, expr: &Expr) -> ExprType {
        match expr {
            Expr::Path { base, segments } => {
                let mut iter = segments.iter();
                let mut cur = match base {
                    PathBase::This => self.this_at(unit, ctx).map(value).unwrap_or(ExprType::Unknown),
                    PathBase::Super => self.super_at(unit, ctx).map(value).unwrap_or(ExprType::Unknown),
                    PathBase::None => match iter.next() {
                        Some(first) => self.lookup_head(unit, ctx, first),
                        None => ExprType::Unknown,
                    },
                };
                for seg in iter {
                    cur = self.select(cur, seg);
                }
                cur
            }
            Expr::Field { target, name } => {
                let t = self.type_of(unit, ctx, target);
                self.select(t, name)
            }
            Expr::Call {
                receiver,
                selector,
                args,
            } => match self.resolve_call(unit, ctx, receiver.as_deref(), selector, args) {
                CallTarget::Resolved(m) => self
                    .return_type(&m)
                    .map(|t| match t {
                        // uninferred method type variables
                        ResolvedType::TypeVar { bound, .. } => value(*bound),
                        other => value(other),
                    })
                    .unwrap_or(ExprType::Unknown),
                _ => ExprType::Unknown,
            },
            Expr::New(sig) | Expr::Cast(sig) => value(self.resolve_sig(unit, ctx, sig)),
            Expr::Literal(t) => {
                if TypeSig::simple(t.clone()).is_primitive() {
                    ExprType::Value(ResolvedType::Primitive(t.clone()))
                } else {
                    ExprType::Value(ResolvedType::declared(t.clone()))
                }
            }
            Expr::Null => ExprType::Value(ResolvedType::Null),
            Expr::Unknown => ExprType::Unknown,
        }
    }

    fn this_at(&self, unit: &Arc<ParsedUnit>, ctx: &Context) -> Option<ResolvedType> {
        let owner = ctx.owner?;
        Some(self.this_type(&TypeHandle::new(unit.clone(), owner)))
    }

    fn super_at(&self, unit: &Arc<ParsedUnit>, ctx: &Context) -> Option<ResolvedType> {
        let owner = ctx.owner?;
        let h = TypeHandle::new(unit.clone(), owner);
        self.supertypes(&h).first().cloned()
    }

    fn lookup_head(&self, unit: &Arc<ParsedUnit>, ctx: &Context, name: &str) -> ExprType {
        if let Some(local) = unit.unit.local(ctx.body, name) {
            return match local {
                Some(sig) => value(self.resolve_sig(unit, ctx, sig)),
                None => ExprType::Unknown,
            };
        }
        let field_missing = match self.field_in_scope(unit, ctx, name) {
            Lookup::Found(m) => {
                return self.field_type(&m).map(value).unwrap_or(ExprType::Unknown)
            }
            Lookup::Incomplete => false,
            Lookup::Missing => true,
        };
        if let Lookup::Found(m) = self.static_imported_field(unit, name) {
            return self.field_type(&m).map(value).unwrap_or(ExprType::Unknown);
        }
        match self.resolve_type_name(unit, ctx, name) {
            TypeResolution::Found(h) => return ExprType::Static(ResolvedType::declared(h.qualified())),
            TypeResolution::Known { qualified, .. } => {
                return ExprType::Static(ResolvedType::declared(qualified))
            }
            _ => {}
        }
        if self.world.package_exists(name) || (field_missing && starts_lower(name)) {
            return ExprType::Package(name.to_string());
        }
        ExprType::Unknown
    }

    fn select(&self, cur: ExprType, seg: &str) -> ExprType {
        match cur {
            ExprType::Value(ResolvedType::Array(_)) if seg == "length" => {
                ExprType::Value(ResolvedType::Primitive("int".into()))
            }
            ExprType::Value(t) => match self.field_named(&t, seg) {
                (Some(m), _) => self.field_type(&m).map(value).unwrap_or(ExprType::Unknown),
                _ => ExprType::Unknown,
            },
            ExprType::Static(t) => {
                if let (Some(m), _) = self.field_named(&t, seg) {
                    return self.field_type(&m).map(value).unwrap_or(ExprType::Unknown);
                }
                match self.handle_of(&t).and_then(|h| self.member_type(&h, seg, 0)) {
                    Some(inner) => ExprType::Static(ResolvedType::declared(inner.qualified())),
                    None => ExprType::Unknown,
                }
            }
            ExprType::Package(p) => {
                let q = format!("{}.{}", p, seg);
                if self.lookup_qualified(&q).is_some() {
                    ExprType::Static(ResolvedType::declared(q))
                } else if self.world.package_exists(&q) || !starts_upper(seg) {
                    ExprType::Package(q)
                } else {
                    ExprType::Static(ResolvedType::declared(q))
                }
            }
            ExprType::Unknown => ExprType::Unknown,
        }
    }

    /// Field visible by simple name from the enclosing types, innermost first.
    fn field_in_scope(&self, unit: &Arc<ParsedUnit>, ctx: &Context, name: &str) -> Lookup<MemberHandle> {
        let mut incomplete = false;
        let mut cur = ctx.owner;
        while let Some(idx) = cur {
            let h = TypeHandle::new(unit.clone(), idx);
            let (found, complete) = self.field_named(&self.this_type(&h), name);
            if let Some(m) = found {
                return Lookup::Found(m);
            }
            incomplete |= !complete;
            cur = h.decl().parent;
        }
        if incomplete {
            Lookup::Incomplete
        } else {
            Lookup::Missing
        }
    }

    fn static_owners<'u>(&self, unit: &'u ParsedUnit, name: &str) -> Vec<&'u str> {
        unit.unit
            .imports
            .iter()
            .filter_map(|i| match i.kind {
                ImportKind::Static if i.simple_name() == name => Some(i.qualifier()),
                ImportKind::StaticOnDemand => Some(i.name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn static_imported_field(&self, unit: &Arc<ParsedUnit>, name: &str) -> Lookup<MemberHandle> {
        let mut incomplete = false;
        for owner in self.static_owners(unit, name) {
            if self.lookup_qualified(owner).is_none() {
                incomplete = true;
                continue;
            }
            match self.field_named(&ResolvedType::declared(owner), name) {
                (Some(m), _) => return Lookup::Found(m),
                (None, complete) => incomplete |= !complete,
            }
        }
        if incomplete {
            Lookup::Incomplete
        } else {
            Lookup::Missing
        }
    }

    fn static_imported_methods(&self, unit: &Arc<ParsedUnit>, name: &str) -> (Vec<MemberHandle>, bool) {
        let mut out = Vec::new();
        let mut complete = true;
        for owner in self.static_owners(unit, name) {
            if self.lookup_qualified(owner).is_none() {
                complete = false;
                continue;
            }
            let (found, c) = self.methods_named(&ResolvedType::declared(owner), name);
            complete &= c;
            out.extend(found.into_iter().filter(|m| {
                m.method()
                    .map(|d| d.modifiers.is_static())
                    .unwrap_or(false)
            }));
        }
        (out, complete)
    }

    pub fn resolve_name(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        name: &str,
        qualifier: Option<&Expr>,
    ) -> NameTarget {
        let Some(q) = qualifier else {
            if unit.unit.local(ctx.body, name).is_some() {
                return NameTarget::Local;
            }
            let missing = match self.field_in_scope(unit, ctx, name) {
                Lookup::Found(m) => return NameTarget::Field(m),
                Lookup::Incomplete => false,
                Lookup::Missing => true,
            };
            match self.static_imported_field(unit, name) {
                Lookup::Found(m) => return NameTarget::Field(m),
                Lookup::Incomplete => return NameTarget::Unresolved,
                Lookup::Missing => {}
            }
            let ty = self.resolve_type_name(unit, ctx, name);
            if ty.qualified().is_some() {
                return NameTarget::Type(ty);
            }
            if self.world.package_exists(name) {
                return NameTarget::Package(name.to_string());
            }
            return if missing {
                NameTarget::NotFound
            } else {
                NameTarget::Unresolved
            };
        };
        match self.type_of(unit, ctx, q) {
            ExprType::Value(t) => match self.field_named(&t, name) {
                (Some(m), _) => NameTarget::Field(m),
                (None, true) => NameTarget::NotFound,
                (None, false) => NameTarget::Unresolved,
            },
            ExprType::Static(t) => {
                let (found, complete) = self.field_named(&t, name);
                if let Some(m) = found {
                    return NameTarget::Field(m);
                }
                if let Some(inner) = self.handle_of(&t).and_then(|h| self.member_type(&h, name, 0)) {
                    return NameTarget::Type(TypeResolution::Found(inner));
                }
                if complete && self.handle_of(&t).is_some() {
                    NameTarget::NotFound
                } else {
                    NameTarget::Unresolved
                }
            }
            ExprType::Package(p) => {
                let qn = format!("{}.{}", p, name);
                if let Some(h) = self.lookup_qualified(&qn) {
                    NameTarget::Type(TypeResolution::Found(h))
                } else if self.world.package_exists(&qn) {
                    NameTarget::Package(qn)
                } else {
                    NameTarget::Unresolved
                }
            }
            ExprType::Unknown => NameTarget::Unresolved,
        }
    }

    pub fn resolve_call(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        receiver: Option<&Expr>,
        selector: &str,
        args: &[Expr],
    ) -> CallTarget {
        let arg_types: Vec<ExprType> = args.iter().map(|a| self.type_of(unit, ctx, a)).collect();
        if let Some(r) = receiver {
            let ty = match self.type_of(unit, ctx, r) {
                ExprType::Value(t) | ExprType::Static(t) => t,
                _ => return CallTarget::Unresolved,
            };
            let (cands, complete) = self.methods_named(&ty, selector);
            return self.select_applicable(cands, complete, &arg_types);
        }

        let mut incomplete = false;
        let mut cur = ctx.owner;
        while let Some(idx) = cur {
            let h = TypeHandle::new(unit.clone(), idx);
            let (cands, complete) = self.methods_named(&self.this_type(&h), selector);
            if !cands.is_empty() {
                return self.select_applicable(cands, complete, &arg_types);
            }
            incomplete |= !complete;
            cur = h.decl().parent;
        }
        let (cands, complete) = self.static_imported_methods(unit, selector);
        if !cands.is_empty() {
            return self.select_applicable(cands, complete, &arg_types);
        }
        if incomplete || !complete {
            CallTarget::Unresolved
        } else {
            CallTarget::NotFound
        }
    }

    pub fn resolve_constructor(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        ty: &ResolvedType,
        args: &[Expr],
        form: CtorForm,
    ) -> CallTarget {
        let Some((h, ctors)) = self.constructors_of(ty) else {
            return if ty.is_unknown() {
                CallTarget::Unresolved
            } else {
                CallTarget::NotFound
            };
        };
        if ctors.is_empty() {
            return match h.kind() {
                TypeKind::Interface | TypeKind::Annotation => CallTarget::NotFound,
                _ if args.is_empty() => CallTarget::DefaultConstructor(h),
                _ => CallTarget::NotFound,
            };
        }
        if form == CtorForm::Reference {
            return match ctors.len() {
                1 => ctors.into_iter().next().map(CallTarget::Resolved).unwrap_or(CallTarget::NotFound),
                _ => CallTarget::Ambiguous(ctors),
            };
        }
        let arg_types: Vec<ExprType> = args.iter().map(|a| self.type_of(unit, ctx, a)).collect();
        self.select_applicable(ctors, true, &arg_types)
    }

    fn select_applicable(
        &self,
        cands: Vec<MemberHandle>,
        complete: bool,
        args: &[ExprType],
    ) -> CallTarget {
        let n = args.len();
        let mut applicable: Vec<(MemberHandle, Vec<ResolvedType>, bool)> = Vec::new();
        for m in cands {
            let Some(decl) = m.method() else {
                continue;
            };
            if !decl.accepts_arity(n) {
                continue;
            }
            let varargs = decl.is_varargs();
            let params = self.param_types(&m);
            let mut all_yes = true;
            let mut ok = true;
            for (i, a) in args.iter().enumerate() {
                let verdict = if varargs && i + 1 >= params.len() {
                    let last = &params[params.len() - 1];
                    let whole = if n == params.len() {
                        self.compat(a, last)
                    } else {
                        Tri::No
                    };
                    match (whole, last) {
                        (Tri::Yes, _) => Tri::Yes,
                        (_, ResolvedType::Array(elem)) => self.compat(a, elem),
                        (other, _) => other,
                    }
                } else {
                    self.compat(a, &params[i])
                };
                match verdict {
                    Tri::No => {
                        ok = false;
                        break;
                    }
                    Tri::Unknown => all_yes = false,
                    Tri::Yes => {}
                }
            }
            if ok {
                applicable.push((m, params, all_yes));
            }
        }

        match applicable.len() {
            0 if complete => CallTarget::NotFound,
            0 => CallTarget::Unresolved,
            1 => applicable
                .pop()
                .map(|(m, _, _)| CallTarget::Resolved(m))
                .unwrap_or(CallTarget::NotFound),
            _ => {
                let certain: Vec<usize> = (0..applicable.len())
                    .filter(|&i| applicable[i].2)
                    .collect();
                let pool: Vec<usize> = if certain.is_empty() {
                    (0..applicable.len()).collect()
                } else {
                    certain
                };
                let most_specific: Vec<usize> = pool
                    .iter()
                    .copied()
                    .filter(|&i| {
                        pool.iter().all(|&j| {
                            i == j || self.more_specific(&applicable[i].1, &applicable[j].1)
                        })
                    })
                    .collect();
                if most_specific.len() == 1 && (pool.len() == 1 || applicable[most_specific[0]].2) {
                    CallTarget::Resolved(applicable.swap_remove(most_specific[0]).0)
                } else {
                    CallTarget::Ambiguous(applicable.into_iter().map(|(m, _, _)| m).collect())
                }
            }
        }
    }

    fn more_specific(&self, a: &[ResolvedType], b: &[ResolvedType]) -> bool {
        a.iter()
            .zip(b.iter())
            .all(|(x, y)| self.assignable(x, y) == Tri::Yes)
    }

    fn compat(&self, arg: &ExprType, param: &ResolvedType) -> Tri {
        match arg {
            ExprType::Value(t) => self.assignable(t, param),
            _ => Tri::Unknown,
        }
    }

    /// Method-invocation conversion from `a` to `p`.
    pub fn assignable(&self, a: &ResolvedType, p: &ResolvedType) -> Tri {
        use ResolvedType as T;
        match (a, p) {
            (T::Unknown(_), _) | (_, T::Unknown(_)) | (T::Wildcard(_), _) => Tri::Unknown,
            (_, T::TypeVar { .. }) => Tri::Yes,
            (T::Null, T::Primitive(_)) => Tri::No,
            (T::Null, _) => Tri::Yes,
            (T::Primitive(x), T::Primitive(y)) => Tri::from_bool(widens_to(x, y)),
            (T::Primitive(x), T::Declared { qualified, .. }) => match boxed(x) {
                Some(b) if b == qualified => Tri::Yes,
                Some(b) => self.is_subtype(&ResolvedType::declared(b), qualified),
                None => Tri::No,
            },
            (T::Declared { qualified, .. }, T::Primitive(y)) => match unboxed(qualified) {
                Some(u) => Tri::from_bool(widens_to(u, y)),
                None => Tri::No,
            },
            (T::Array(x), T::Array(y)) => match (x.as_ref(), y.as_ref()) {
                (T::Primitive(a), T::Primitive(b)) => Tri::from_bool(a == b),
                (T::Primitive(_), _) | (_, T::Primitive(_)) => Tri::No,
                (x, y) => self.assignable(x, y),
            },
            (T::Array(_), T::Declared { qualified, .. }) => self.is_subtype(a, qualified),
            (T::TypeVar { bound, .. }, _) => match self.assignable(bound, p) {
                Tri::No => Tri::Unknown,
                other => other,
            },
            (_, T::Array(_)) => Tri::No,
            (T::Declared { .. }, T::Declared { qualified, .. }) => {
                if qualified == OBJECT {
                    Tri::Yes
                } else {
                    self.is_subtype(a, qualified)
                }
            }
            _ => Tri::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::FixedWorld;
    use super::*;
    use crate::syntax::OccurrenceKind;

    fn call_targets(world: &FixedWorld, path: &str) -> Vec<(String, Option<String>)> {
        let r = Resolver::new(world);
        let unit = world.unit(path);
        unit.unit
            .occurrences
            .iter()
            .filter_map(|o| match &o.kind {
                OccurrenceKind::MethodCall {
                    selector,
                    receiver,
                    args,
                } => {
                    let target = match r.resolve_call(&unit, &o.ctx, receiver.as_ref(), selector, args) {
                        CallTarget::Resolved(m) => Some(r.method_id(&m).to_string()),
                        _ => None,
                    };
                    Some((selector.clone(), target))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn overloads_pick_the_most_specific_applicable() {
        let world = FixedWorld::of(&[(
            "p/A.java",
            r#"package p;
class A {
    void f(int x) {}
    void f(String s) {}
    void f(Object o) {}
    void g(long x) {}
    void v(String... xs) {}
    void run(A other) {
        f(1);
        f("s");
        other.f(new A());
        g(3);
        v("a", "b");
        this.missing();
    }
}"#,
        )]);
        let got = call_targets(&world, "p/A.java");
        assert_eq!(
            got,
            vec![
                ("f".to_string(), Some("p.A.f(int)".to_string())),
                ("f".to_string(), Some("p.A.f(java.lang.String)".to_string())),
                ("f".to_string(), Some("p.A.f(java.lang.Object)".to_string())),
                ("g".to_string(), Some("p.A.g(long)".to_string())),
                ("v".to_string(), Some("p.A.v(java.lang.String[])".to_string())),
                ("missing".to_string(), None),
            ]
        );
    }

    #[test]
    fn names_bind_to_locals_fields_types_and_packages() {
        let src = r#"package p;
class A {
    int count;
    static A make() { return null; }
    void run(int local) {
        count = local;
        A.make();
        p.A.make();
    }
}"#;
        let world = FixedWorld::of(&[("p/A.java", src)]);
        let r = Resolver::new(&world);
        let unit = world.unit("p/A.java");
        let mut seen = Vec::new();
        for o in &unit.unit.occurrences {
            if let OccurrenceKind::Name {
                name, qualifier, ..
            } = &o.kind
            {
                let t = match r.resolve_name(&unit, &o.ctx, name, qualifier.as_ref()) {
                    NameTarget::Local => "local".to_string(),
                    NameTarget::Field(m) => format!("field {}", m.owner.qualified()),
                    NameTarget::Type(t) => format!("type {}", t.qualified().unwrap_or("?")),
                    NameTarget::Package(p) => format!("package {}", p),
                    NameTarget::NotFound => "none".to_string(),
                    NameTarget::Unresolved => "unresolved".to_string(),
                };
                seen.push((name.clone(), t));
            }
        }
        assert!(seen.contains(&("count".to_string(), "field p.A".to_string())));
        assert!(seen.contains(&("local".to_string(), "local".to_string())));
        assert!(seen.contains(&("A".to_string(), "type p.A".to_string())));
        assert!(seen.contains(&("p".to_string(), "package p".to_string())));
    }
}
