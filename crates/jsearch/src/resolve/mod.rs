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

//! Name and type binding over a corpus of parsed units.
//!
//! The resolver never sees the whole corpus up front. It asks a
//! [`TypeWorld`] for the few units that can declare a given simple name and
//! caches what it learns for the lifetime of one query.

mod calls;
mod hierarchy;
pub mod types;

pub use calls::{CallTarget, ExprType, NameTarget};
pub use hierarchy::{MemberHandle, MemberKind, Tri};
pub use types::ResolvedType;

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::pattern::{Focus, MethodId};
use crate::syntax::{
    Context, CtorForm, Expr, ImportKind, MemberRef, OccurrenceKind, ParsedUnit, TypeArg, TypeDecl,
    TypeKind, TypeParam, TypeSig,
};
use crate::types::TextRange;

const MAX_DEPTH: u8 = 6;

/// Where the resolver looks for declarations it has not seen yet.
pub trait TypeWorld: Send + Sync {
    /// Units declaring a named type (top-level, member or local) with this simple name.
    fn units_declaring(&self, simple: &str) -> Vec<Arc<ParsedUnit>>;

    /// Units containing a type that names `simple` as a supertype.
    fn units_extending(&self, simple: &str) -> Vec<Arc<ParsedUnit>>;

    fn package_exists(&self, name: &str) -> bool;
}

/// A type declaration inside a parsed unit.
#[derive(Clone, Debug)]
pub struct TypeHandle {
    pub unit: Arc<ParsedUnit>,
    pub index: usize,
}

impl TypeHandle {
    pub fn new(unit: Arc<ParsedUnit>, index: usize) -> Self {
        Self { unit, index }
    }

    pub fn decl(&self) -> &TypeDecl {
        &self.unit.unit.types[self.index]
    }

    pub fn qualified(&self) -> &str {
        &self.decl().qualified
    }

    pub fn kind(&self) -> TypeKind {
        self.decl().kind
    }

    pub fn is_same(&self, other: &TypeHandle) -> bool {
        self.index == other.index && self.unit.key == other.unit.key
    }

    fn scope(&self) -> Context {
        Context {
            owner: Some(self.index),
            member: None,
            body: None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum TypeResolution {
    Found(TypeHandle),
    /// A type whose declaration is not in the corpus but whose name is certain.
    Known {
        qualified: String,
        kind: Option<TypeKind>,
    },
    TypeVar {
        name: String,
        bound: Option<TypeSig>,
    },
    Primitive(String),
    Unresolved,
}

impl TypeResolution {
    pub fn qualified(&self) -> Option<&str> {
        match self {
            TypeResolution::Found(h) => Some(h.qualified()),
            TypeResolution::Known { qualified, .. } => Some(qualified),
            _ => None,
        }
    }

    pub fn kind(&self) -> Option<TypeKind> {
        match self {
            TypeResolution::Found(h) => Some(h.kind()),
            TypeResolution::Known { kind, .. } => *kind,
            _ => None,
        }
    }
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

fn member_type_params(unit: &ParsedUnit, owner: usize, member: MemberRef) -> &[TypeParam] {
    let Some(t) = unit.unit.types.get(owner) else {
        return &[];
    };
    let decl = match member {
        MemberRef::Method(i) => t.methods.get(i),
        MemberRef::Constructor(i) => t.constructors.get(i),
        _ => None,
    };
    decl.map(|m| m.type_params.as_slice()).unwrap_or(&[])
}

pub struct Resolver<'w> {
    world: &'w dyn TypeWorld,
    types: Mutex<HashMap<String, Option<TypeHandle>>>,
    supertypes: Mutex<HashMap<String, Arc<Vec<ResolvedType>>>>,
}

impl<'w> Resolver<'w> {
    pub fn new(world: &'w dyn TypeWorld) -> Self {
        Self {
            world,
            types: Mutex::new(HashMap::new()),
            supertypes: Mutex::new(HashMap::new()),
        }
    }

    pub fn world(&self) -> &'w dyn TypeWorld {
        self.world
    }

    /// Make a handle findable by its qualified name. Needed for anonymous
    /// and local types, which the world does not index by simple name.
    fn remember(&self, h: &TypeHandle) {
        self.types
            .lock()
            .entry(h.qualified().to_string())
            .or_insert_with(|| Some(h.clone()));
    }

    pub fn lookup_qualified(&self, qualified: &str) -> Option<TypeHandle> {
        if let Some(hit) = self.types.lock().get(qualified) {
            return hit.clone();
        }
        let simple = qualified.rsplit('.').next().unwrap_or(qualified);
        let mut found: Option<TypeHandle> = None;
        for unit in self.world.units_declaring(simple) {
            let Some(index) = unit
                .unit
                .types
                .iter()
                .position(|t| !t.anonymous && t.qualified == qualified)
            else {
                continue;
            };
            // source declarations win over compiled ones
            let better = match &found {
                None => true,
                Some(f) => !f.unit.unit.has_source && unit.unit.has_source,
            };
            if better {
                found = Some(TypeHandle::new(unit, index));
            }
        }
        self.types
            .lock()
            .insert(qualified.to_string(), found.clone());
        found
    }

    /// Handle for a declared type, if its declaration is in the corpus.
    pub fn handle_of(&self, ty: &ResolvedType) -> Option<TypeHandle> {
        match ty {
            ResolvedType::Declared { qualified, .. } => self.lookup_qualified(qualified),
            ResolvedType::TypeVar { bound, .. } => self.handle_of(bound),
            _ => None,
        }
    }

    pub fn resolve_type_name(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        name: &str,
    ) -> TypeResolution {
        self.resolve_name_in(unit, ctx, &[], name, 0)
    }

    fn resolve_name_in(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        extra: &[TypeParam],
        name: &str,
        depth: u8,
    ) -> TypeResolution {
        if !name.contains('.') {
            return self.resolve_simple(unit, ctx, extra, name, depth);
        }
        let segs: Vec<&str> = name.split('.').collect();
        match self.resolve_simple(unit, ctx, extra, segs[0], depth) {
            TypeResolution::Found(h) => return self.descend(h, &segs[1..], depth),
            TypeResolution::Known { qualified, .. } => {
                return TypeResolution::Known {
                    qualified: format!("{}.{}", qualified, segs[1..].join(".")),
                    kind: None,
                }
            }
            _ => {}
        }
        for k in 1..segs.len() {
            let prefix = segs[..=k].join(".");
            if let Some(h) = self.lookup_qualified(&prefix) {
                return self.descend(h, &segs[k + 1..], depth);
            }
        }
        let package_like = segs[0]
            .chars()
            .next()
            .map(|c| c.is_lowercase())
            .unwrap_or(false);
        if package_like {
            TypeResolution::Known {
                qualified: name.to_string(),
                kind: None,
            }
        } else {
            TypeResolution::Unresolved
        }
    }

    fn descend(&self, start: TypeHandle, rest: &[&str], depth: u8) -> TypeResolution {
        let mut cur = start;
        for seg in rest {
            match self.member_type(&cur, seg, depth) {
                Some(m) => cur = m,
                None => return TypeResolution::Unresolved,
            }
        }
        self.remember(&cur);
        TypeResolution::Found(cur)
    }

    fn member_type(&self, h: &TypeHandle, name: &str, depth: u8) -> Option<TypeHandle> {
        let u = &h.unit.unit;
        for &m in &h.decl().member_types {
            if u.types[m].name == name {
                return Some(TypeHandle::new(h.unit.clone(), m));
            }
        }
        if let Some(found) = self.lookup_qualified(&format!("{}.{}", h.qualified(), name)) {
            return Some(found);
        }
        if depth < MAX_DEPTH {
            return self.inherited_member_type(h, name, depth + 1);
        }
        None
    }

    fn inherited_member_type(&self, h: &TypeHandle, name: &str, depth: u8) -> Option<TypeHandle> {
        for sup in self.supertypes_at(h, depth).iter() {
            if let Some(sh) = self.handle_of(sup) {
                if sh.is_same(h) {
                    continue;
                }
                if let Some(found) = self.member_type(&sh, name, depth) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn resolve_simple(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        extra: &[TypeParam],
        name: &str,
        depth: u8,
    ) -> TypeResolution {
        if TypeSig::simple(name).is_primitive() {
            return TypeResolution::Primitive(name.to_string());
        }
        let type_var = |tp: &TypeParam| TypeResolution::TypeVar {
            name: tp.name.clone(),
            bound: tp.bounds.first().cloned(),
        };
        if let Some(tp) = extra.iter().find(|p| p.name == name) {
            return type_var(tp);
        }
        let u = &unit.unit;
        if let (Some(owner), Some(member)) = (ctx.owner, ctx.member) {
            if let Some(tp) = member_type_params(unit, owner, member)
                .iter()
                .find(|p| p.name == name)
            {
                return type_var(tp);
            }
        }

        let mut cur = ctx.owner;
        while let Some(idx) = cur {
            let Some(t) = u.types.get(idx) else {
                break;
            };
            if let Some(tp) = t.type_params.iter().find(|p| p.name == name) {
                return type_var(tp);
            }
            if !t.anonymous && t.name == name {
                return self.found(TypeHandle::new(unit.clone(), idx));
            }
            if let Some(&m) = t.member_types.iter().find(|&&m| u.types[m].name == name) {
                return self.found(TypeHandle::new(unit.clone(), m));
            }
            if depth < MAX_DEPTH {
                let h = TypeHandle::new(unit.clone(), idx);
                if let Some(found) = self.inherited_member_type(&h, name, depth + 1) {
                    return TypeResolution::Found(found);
                }
            }
            cur = t.parent;
        }

        if let Some((i, _)) = u.top_level_types().find(|(_, t)| t.name == name) {
            return self.found(TypeHandle::new(unit.clone(), i));
        }

        if let Some(imp) = u
            .imports
            .iter()
            .find(|i| i.kind == ImportKind::Single && i.simple_name() == name)
        {
            return match self.lookup_qualified(&imp.name) {
                Some(h) => TypeResolution::Found(h),
                None => TypeResolution::Known {
                    qualified: imp.name.clone(),
                    kind: None,
                },
            };
        }

        if let Some(h) = self.lookup_qualified(&qualify(u.package_name(), name)) {
            return TypeResolution::Found(h);
        }

        for imp in u
            .imports
            .iter()
            .filter(|i| i.kind == ImportKind::OnDemand)
        {
            if let Some(h) = self.lookup_qualified(&format!("{}.{}", imp.name, name)) {
                return TypeResolution::Found(h);
            }
        }

        let lang = format!("java.lang.{}", name);
        if let Some(h) = self.lookup_qualified(&lang) {
            return TypeResolution::Found(h);
        }
        if let Some(kind) = types::java_lang_kind(name) {
            return TypeResolution::Known {
                qualified: lang,
                kind: Some(kind),
            };
        }
        TypeResolution::Unresolved
    }

    fn found(&self, h: TypeHandle) -> TypeResolution {
        self.remember(&h);
        TypeResolution::Found(h)
    }

    pub fn resolve_sig(&self, unit: &Arc<ParsedUnit>, ctx: &Context, sig: &TypeSig) -> ResolvedType {
        self.resolve_sig_in(unit, ctx, &[], sig, 0)
    }

    fn resolve_sig_in(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        extra: &[TypeParam],
        sig: &TypeSig,
        depth: u8,
    ) -> ResolvedType {
        let base = match self.resolve_name_in(unit, ctx, extra, &sig.name, depth) {
            TypeResolution::Primitive(p) => ResolvedType::Primitive(p),
            TypeResolution::Found(h) => ResolvedType::Declared {
                qualified: h.qualified().to_string(),
                args: self.resolve_args(unit, ctx, extra, sig, depth),
            },
            TypeResolution::Known { qualified, .. } => ResolvedType::Declared {
                qualified,
                args: self.resolve_args(unit, ctx, extra, sig, depth),
            },
            TypeResolution::TypeVar { name, bound } => {
                let bound = bound
                    .and_then(|b| {
                        self.resolve_name_in(unit, ctx, extra, &b.name, depth)
                            .qualified()
                            .map(ResolvedType::declared)
                    })
                    .unwrap_or_else(ResolvedType::object);
                ResolvedType::TypeVar {
                    name,
                    bound: Box::new(bound),
                }
            }
            TypeResolution::Unresolved => ResolvedType::Unknown(sig.name.clone()),
        };
        (0..sig.dims).fold(base, |t, _| ResolvedType::Array(Box::new(t)))
    }

    fn resolve_args(
        &self,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        extra: &[TypeParam],
        sig: &TypeSig,
        depth: u8,
    ) -> Option<Vec<ResolvedType>> {
        let args = sig.args.as_ref()?;
        Some(
            args.iter()
                .map(|a| match a {
                    TypeArg::Type(s) => self.resolve_sig_in(unit, ctx, extra, s, depth),
                    TypeArg::Wildcard(None) => ResolvedType::Wildcard(None),
                    TypeArg::Wildcard(Some((b, s))) => ResolvedType::Wildcard(Some((
                        *b,
                        Box::new(self.resolve_sig_in(unit, ctx, extra, s, depth)),
                    ))),
                })
                .collect(),
        )
    }

    /// The type of `this` inside a declaration.
    pub fn this_type(&self, h: &TypeHandle) -> ResolvedType {
        self.remember(h);
        let t = h.decl();
        let args = (!t.type_params.is_empty()).then(|| {
            t.type_params
                .iter()
                .map(|tp| self.resolve_sig(&h.unit, &h.scope(), &TypeSig::simple(tp.name.clone())))
                .collect()
        });
        ResolvedType::Declared {
            qualified: t.qualified.clone(),
            args,
        }
    }

    /// Identity of a method or constructor: erased parameter types in its
    /// declaring context.
    pub fn method_id(&self, m: &MemberHandle) -> MethodId {
        let t = m.owner.decl();
        let decl = match m.kind {
            MemberKind::Constructor => t.constructors.get(m.index),
            _ => t.methods.get(m.index),
        };
        let params = decl
            .map(|d| {
                let ctx = m.context();
                d.params
                    .iter()
                    .map(|p| self.resolve_sig(&m.owner.unit, &ctx, &p.ty).erased_name())
                    .collect()
            })
            .unwrap_or_default();
        MethodId {
            declaring: t.qualified.clone(),
            name: match m.kind {
                MemberKind::Constructor => t.name.clone(),
                _ => decl.map(|d| d.name.clone()).unwrap_or_default(),
            },
            params,
        }
    }

    /// Bound focus for whatever declaration or reference covers `offset`.
    pub fn focus_at(&self, unit: &Arc<ParsedUnit>, offset: u32) -> Option<Focus> {
        let u = &unit.unit;
        if let Some(p) = &u.package {
            if p.range.map(|r| r.contains(offset)).unwrap_or(false) {
                return Some(Focus::Package(p.name.clone()));
            }
        }
        if let Some(m) = &u.module {
            if m.range.map(|r| r.contains(offset)).unwrap_or(false) {
                return Some(Focus::Module(m.name.clone()));
            }
        }
        let covers = |r: Option<TextRange>| r.map(|r| r.contains(offset)).unwrap_or(false);
        for (ti, t) in u.types.iter().enumerate() {
            let h = TypeHandle::new(unit.clone(), ti);
            if covers(t.name_range) {
                return Some(Focus::Type {
                    qualified: t.qualified.clone(),
                    args: None,
                });
            }
            for (mi, m) in t.methods.iter().enumerate() {
                if covers(m.name_range) {
                    if t.kind == TypeKind::Annotation {
                        return Some(Focus::AnnotationElement {
                            annotation: t.qualified.clone(),
                            element: m.name.clone(),
                        });
                    }
                    let mh = MemberHandle::new(h.clone(), MemberKind::Method, mi);
                    return Some(Focus::Method(self.method_id(&mh)));
                }
            }
            for (ci, c) in t.constructors.iter().enumerate() {
                if covers(c.name_range) {
                    let mh = MemberHandle::new(h.clone(), MemberKind::Constructor, ci);
                    return Some(Focus::Constructor(self.method_id(&mh)));
                }
            }
            for f in &t.fields {
                if covers(f.name_range) {
                    return Some(Focus::Field {
                        declaring: t.qualified.clone(),
                        name: f.name.clone(),
                    });
                }
            }
        }

        let occ = u
            .occurrences
            .iter()
            .filter(|o| o.range.contains(offset))
            .min_by_key(|o| o.range.len())?;
        match &occ.kind {
            OccurrenceKind::TypeRef { sig, .. } => {
                match self.resolve_sig(unit, &occ.ctx, sig) {
                    ResolvedType::Declared { qualified, args } => {
                        Some(Focus::Type { qualified, args })
                    }
                    _ => None,
                }
            }
            OccurrenceKind::MethodCall {
                selector,
                receiver,
                args,
            } => match self.resolve_call(unit, &occ.ctx, receiver.as_ref(), selector, args) {
                CallTarget::Resolved(m) => Some(Focus::Method(self.method_id(&m))),
                _ => None,
            },
            OccurrenceKind::ConstructorCall { sig, args, form } => {
                let ty = self.resolve_sig(unit, &occ.ctx, sig);
                self.constructor_target(&ty, unit, &occ.ctx, args, *form)
                    .map(Focus::Constructor)
            }
            OccurrenceKind::Name {
                name, qualifier, ..
            } => match self.resolve_name(unit, &occ.ctx, name, qualifier.as_ref()) {
                NameTarget::Field(f) => Some(Focus::Field {
                    declaring: f.owner.qualified().to_string(),
                    name: name.clone(),
                }),
                NameTarget::Type(t) => t.qualified().map(|q| Focus::Type {
                    qualified: q.to_string(),
                    args: None,
                }),
                NameTarget::Package(p) => Some(Focus::Package(p)),
                _ => None,
            },
            OccurrenceKind::PackageRef { name } => Some(Focus::Package(name.clone())),
            OccurrenceKind::ModuleRef { name } => Some(Focus::Module(name.clone())),
            OccurrenceKind::AnnotationElement {
                annotation,
                element,
            } => self
                .resolve_type_name(unit, &occ.ctx, &annotation.name)
                .qualified()
                .map(|q| Focus::AnnotationElement {
                    annotation: q.to_string(),
                    element: element.clone(),
                }),
            _ => None,
        }
    }

    /// Identity of the constructor a creation binds to, if it can be decided.
    pub fn constructor_target(
        &self,
        ty: &ResolvedType,
        unit: &Arc<ParsedUnit>,
        ctx: &Context,
        args: &[Expr],
        form: CtorForm,
    ) -> Option<MethodId> {
        match self.resolve_constructor(unit, ctx, ty, args, form) {
            CallTarget::Resolved(m) => Some(self.method_id(&m)),
            CallTarget::DefaultConstructor(h) => Some(MethodId {
                declaring: h.qualified().to_string(),
                name: h.decl().name.clone(),
                params: Vec::new(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::syntax::ParsedUnit;
    use crate::types::DocumentKey;

    /// In-memory world over a fixed set of sources.
    pub(crate) struct FixedWorld {
        pub units: Vec<Arc<ParsedUnit>>,
    }

    impl FixedWorld {
        pub(crate) fn of(sources: &[(&str, &str)]) -> Self {
            let units = sources
                .iter()
                .map(|(path, src)| {
                    Arc::new(
                        ParsedUnit::parse(DocumentKey::source("/src", *path), src.as_bytes())
                            .expect("parse"),
                    )
                })
                .collect();
            Self { units }
        }

        pub(crate) fn unit(&self, path: &str) -> Arc<ParsedUnit> {
            self.units
                .iter()
                .find(|u| u.key.entry == path)
                .cloned()
                .expect("unit")
        }
    }

    impl TypeWorld for FixedWorld {
        fn units_declaring(&self, simple: &str) -> Vec<Arc<ParsedUnit>> {
            self.units
                .iter()
                .filter(|u| u.unit.types.iter().any(|t| t.name == simple))
                .cloned()
                .collect()
        }

        fn units_extending(&self, simple: &str) -> Vec<Arc<ParsedUnit>> {
            self.units
                .iter()
                .filter(|u| {
                    u.unit
                        .types
                        .iter()
                        .any(|t| t.supertypes().any(|s| s.simple_name() == simple))
                })
                .cloned()
                .collect()
        }

        fn package_exists(&self, name: &str) -> bool {
            self.units.iter().any(|u| {
                let p = u.unit.package_name();
                p == name || p.starts_with(&format!("{}.", name))
            })
        }
    }

    #[test]
    fn resolves_imports_packages_and_member_types() {
        let world = FixedWorld::of(&[
            ("p/A.java", "package p; public class A { public static class Inner {} }"),
            (
                "q/B.java",
                "package q; import p.A; class B extends A { Inner i; A.Inner j; java.util.List<String> l; }",
            ),
        ]);
        let r = Resolver::new(&world);
        let b = world.unit("q/B.java");
        let owner = b.unit.find_type("q.B").expect("B");
        let ctx = Context {
            owner: Some(owner),
            member: None,
            body: None,
        };
        assert_eq!(r.resolve_type_name(&b, &ctx, "A").qualified(), Some("p.A"));
        // inherited member type
        assert_eq!(r.resolve_type_name(&b, &ctx, "Inner").qualified(), Some("p.A.Inner"));
        assert_eq!(r.resolve_type_name(&b, &ctx, "A.Inner").qualified(), Some("p.A.Inner"));
        assert_eq!(
            r.resolve_type_name(&b, &ctx, "String").qualified(),
            Some("java.lang.String")
        );
        assert!(matches!(
            r.resolve_type_name(&b, &ctx, "Zork"),
            TypeResolution::Unresolved
        ));
        let list = r.resolve_sig(&b, &ctx, &crate::pattern::parse::type_sig("java.util.List<String>").expect("sig"));
        assert_eq!(list.to_string(), "java.util.List<java.lang.String>");
    }

    #[test]
    fn focus_on_declarations_and_references() {
        let src = "package p; class A { void m(int x) {} void n() { m(1); } }";
        let world = FixedWorld::of(&[("p/A.java", src)]);
        let r = Resolver::new(&world);
        let a = world.unit("p/A.java");
        let decl = src.find("m(int").expect("m") as u32;
        let call = src.find("m(1)").expect("call") as u32;
        let expected = Focus::Method(MethodId {
            declaring: "p.A".into(),
            name: "m".into(),
            params: vec!["int".into()],
        });
        assert_eq!(r.focus_at(&a, decl), Some(expected.clone()));
        assert_eq!(r.focus_at(&a, call), Some(expected));
        let class = src.find("A {").expect("A") as u32;
        assert_eq!(
            r.focus_at(&a, class),
            Some(Focus::Type {
                qualified: "p.A".into(),
                args: None
            })
        );
    }
}
