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

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use super::types::{ResolvedType, OBJECT};
use super::{Resolver, TypeHandle};
use crate::pattern::MethodId;
use crate::syntax::{Context, FieldDecl, MemberRef, MethodDecl, TypeKind, TypeSig};
use crate::types::DocumentKey;

/// Three-valued answer for questions the corpus may not be able to settle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tri {
    Yes,
    No,
    Unknown,
}

impl Tri {
    pub fn from_bool(b: bool) -> Self {
        if b {
            Tri::Yes
        } else {
            Tri::No
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Method,
    Constructor,
    Field,
}

/// A member of a declared type, with the owner's type parameters as seen
/// from the type the lookup started on.
#[derive(Clone, Debug)]
pub struct MemberHandle {
    pub owner: TypeHandle,
    pub kind: MemberKind,
    pub index: usize,
    pub subst: HashMap<String, ResolvedType>,
}

impl MemberHandle {
    pub fn new(owner: TypeHandle, kind: MemberKind, index: usize) -> Self {
        Self {
            owner,
            kind,
            index,
            subst: HashMap::new(),
        }
    }

    pub fn method(&self) -> Option<&MethodDecl> {
        let t = self.owner.decl();
        match self.kind {
            MemberKind::Method => t.methods.get(self.index),
            MemberKind::Constructor => t.constructors.get(self.index),
            MemberKind::Field => None,
        }
    }

    pub fn field(&self) -> Option<&FieldDecl> {
        match self.kind {
            MemberKind::Field => self.owner.decl().fields.get(self.index),
            _ => None,
        }
    }

    pub fn is_same(&self, other: &MemberHandle) -> bool {
        self.kind == other.kind && self.index == other.index && self.owner.is_same(&other.owner)
    }

    pub fn context(&self) -> Context {
        Context {
            owner: Some(self.owner.index),
            member: Some(match self.kind {
                MemberKind::Method => MemberRef::Method(self.index),
                MemberKind::Constructor => MemberRef::Constructor(self.index),
                MemberKind::Field => MemberRef::Field(self.index),
            }),
            body: None,
        }
    }
}

/// All supertypes of a type, substituted, the type itself first.
pub(super) struct Ancestry {
    pub types: Vec<ResolvedType>,
    /// No supertype was left unresolved.
    pub complete: bool,
    /// Some ancestor is declared outside the corpus, so its own supertypes are unknown.
    pub opaque: bool,
}

impl<'w> Resolver<'w> {
    /// Direct supertypes as written, plus the implicit ones.
    pub fn supertypes(&self, h: &TypeHandle) -> Arc<Vec<ResolvedType>> {
        self.supertypes_at(h, 0)
    }

    pub(super) fn supertypes_at(&self, h: &TypeHandle, depth: u8) -> Arc<Vec<ResolvedType>> {
        if let Some(hit) = self.supertypes.lock().get(h.qualified()) {
            return hit.clone();
        }
        let t = h.decl();
        // supertypes are written in the scope enclosing the declaration
        let scope = Context {
            owner: t.parent,
            member: None,
            body: None,
        };
        let mut out: Vec<ResolvedType> = t
            .supertypes()
            .map(|s| self.resolve_sig_in(&h.unit, &scope, &t.type_params, s, depth))
            .collect();
        match t.kind {
            TypeKind::Enum => out.insert(
                0,
                ResolvedType::Declared {
                    qualified: "java.lang.Enum".into(),
                    args: Some(vec![ResolvedType::declared(t.qualified.clone())]),
                },
            ),
            TypeKind::Record => out.insert(0, ResolvedType::declared("java.lang.Record")),
            TypeKind::Annotation => {
                out.push(ResolvedType::declared("java.lang.annotation.Annotation"))
            }
            TypeKind::Class if t.superclass.is_none() && t.qualified != OBJECT => {
                out.insert(0, ResolvedType::object())
            }
            _ => {}
        }
        let out = Arc::new(out);
        // depth-limited answers may be truncated
        if depth == 0 {
            self.supertypes
                .lock()
                .insert(h.qualified().to_string(), out.clone());
        }
        out
    }

    /// Type parameters of `h` mapped to `args`, or to their erasure when raw.
    pub fn subst_map(
        &self,
        h: &TypeHandle,
        args: Option<&[ResolvedType]>,
    ) -> HashMap<String, ResolvedType> {
        let tps = &h.decl().type_params;
        match args {
            Some(a) if a.len() == tps.len() => tps
                .iter()
                .map(|tp| tp.name.clone())
                .zip(a.iter().cloned())
                .collect(),
            _ => tps
                .iter()
                .map(|tp| {
                    let var = self.resolve_sig(&h.unit, &h.scope(), &TypeSig::simple(tp.name.clone()));
                    (tp.name.clone(), var.erasure())
                })
                .collect(),
        }
    }

    pub(super) fn ancestry(&self, ty: &ResolvedType) -> Ancestry {
        let mut out = Ancestry {
            types: Vec::new(),
            complete: true,
            opaque: false,
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<ResolvedType> = VecDeque::new();
        queue.push_back(ty.clone());
        while let Some(cur) = queue.pop_front() {
            let cur = match cur {
                ResolvedType::TypeVar { bound, .. } => *bound,
                other => other,
            };
            match &cur {
                ResolvedType::Declared { qualified, args } => {
                    if !seen.insert(qualified.clone()) {
                        continue;
                    }
                    match self.lookup_qualified(qualified) {
                        Some(h) => {
                            let map = self.subst_map(&h, args.as_deref());
                            for s in self.supertypes(&h).iter() {
                                queue.push_back(s.substitute(&map));
                            }
                        }
                        None if qualified != OBJECT => {
                            out.opaque = true;
                            queue.push_back(ResolvedType::object());
                        }
                        None => {}
                    }
                    out.types.push(cur);
                }
                ResolvedType::Unknown(_) => out.complete = false,
                _ => {}
            }
        }
        out
    }

    /// The parameterization of `target` among the supertypes of `ty`.
    pub fn as_super(&self, ty: &ResolvedType, target: &str) -> Option<ResolvedType> {
        self.ancestry(ty)
            .types
            .into_iter()
            .find(|t| t.qualified() == Some(target))
    }

    pub fn is_subtype(&self, sub: &ResolvedType, sup: &str) -> Tri {
        match sub {
            ResolvedType::Unknown(_) | ResolvedType::Wildcard(_) => return Tri::Unknown,
            ResolvedType::Primitive(_) => return Tri::No,
            ResolvedType::Null => return Tri::Yes,
            ResolvedType::Array(_) => {
                return Tri::from_bool(matches!(
                    sup,
                    OBJECT | "java.lang.Cloneable" | "java.io.Serializable"
                ))
            }
            _ => {}
        }
        if sup == OBJECT {
            return Tri::Yes;
        }
        let anc = self.ancestry(sub);
        if anc.types.iter().any(|t| t.qualified() == Some(sup)) {
            Tri::Yes
        } else if !anc.complete {
            Tri::Unknown
        } else if anc.opaque && self.lookup_qualified(sup).is_none() {
            // outside types may implement other outside types
            Tri::Unknown
        } else {
            Tri::No
        }
    }

    pub fn param_types(&self, m: &MemberHandle) -> Vec<ResolvedType> {
        let Some(decl) = m.method() else {
            return Vec::new();
        };
        let ctx = m.context();
        decl.params
            .iter()
            .map(|p| self.resolve_sig(&m.owner.unit, &ctx, &p.ty).substitute(&m.subst))
            .collect()
    }

    pub fn return_type(&self, m: &MemberHandle) -> Option<ResolvedType> {
        let decl = m.method()?;
        let ret = decl.return_type.as_ref()?;
        Some(
            self.resolve_sig(&m.owner.unit, &m.context(), ret)
                .substitute(&m.subst),
        )
    }

    pub fn field_type(&self, m: &MemberHandle) -> Option<ResolvedType> {
        let f = m.field()?;
        Some(
            self.resolve_sig(&m.owner.unit, &m.context(), &f.ty)
                .substitute(&m.subst),
        )
    }

    /// Methods named `name` visible on `ty`, most derived first; overridden
    /// declarations are hidden by their overrides.
    pub fn methods_named(&self, ty: &ResolvedType, name: &str) -> (Vec<MemberHandle>, bool) {
        let anc = self.ancestry(ty);
        let mut out: Vec<MemberHandle> = Vec::new();
        let mut seen: Vec<Vec<String>> = Vec::new();
        for a in &anc.types {
            let Some(h) = self.handle_of(a) else {
                continue;
            };
            let map = self.subst_map(&h, a.args());
            for (i, m) in h.decl().methods.iter().enumerate() {
                if m.name != name {
                    continue;
                }
                let mh = MemberHandle {
                    owner: h.clone(),
                    kind: MemberKind::Method,
                    index: i,
                    subst: map.clone(),
                };
                let erased: Vec<String> = self
                    .param_types(&mh)
                    .iter()
                    .map(|p| p.erased_name())
                    .collect();
                if seen.contains(&erased) {
                    continue;
                }
                seen.push(erased);
                out.push(mh);
            }
        }
        (out, anc.complete)
    }

    /// First field named `name` along the supertype chain.
    pub fn field_named(&self, ty: &ResolvedType, name: &str) -> (Option<MemberHandle>, bool) {
        let anc = self.ancestry(ty);
        for a in &anc.types {
            let Some(h) = self.handle_of(a) else {
                continue;
            };
            if let Some(i) = h.decl().fields.iter().position(|f| f.name == name) {
                let subst = self.subst_map(&h, a.args());
                return (
                    Some(MemberHandle {
                        owner: h,
                        kind: MemberKind::Field,
                        index: i,
                        subst,
                    }),
                    true,
                );
            }
        }
        (None, anc.complete)
    }

    pub fn constructors_of(&self, ty: &ResolvedType) -> Option<(TypeHandle, Vec<MemberHandle>)> {
        let h = self.handle_of(ty)?;
        let subst = self.subst_map(&h, ty.args());
        let ctors = (0..h.decl().constructors.len())
            .map(|i| MemberHandle {
                owner: h.clone(),
                kind: MemberKind::Constructor,
                index: i,
                subst: subst.clone(),
            })
            .collect();
        Some((h, ctors))
    }

    pub fn method_by_id(&self, id: &MethodId) -> Option<MemberHandle> {
        let h = self.lookup_qualified(&id.declaring)?;
        let t = h.decl();
        let (kind, decls) = if t.name == id.name && !t.constructors.is_empty() {
            (MemberKind::Constructor, &t.constructors)
        } else {
            (MemberKind::Method, &t.methods)
        };
        decls
            .iter()
            .enumerate()
            .filter(|(_, m)| m.name == id.name && m.params.len() == id.params.len())
            .map(|(i, _)| MemberHandle::new(h.clone(), kind, i))
            .find(|m| self.method_id(m) == *id)
    }

    /// Whether `sub` overrides `sup`: same name and arity, declared in a
    /// subtype, parameters equal after substitution or by erasure.
    pub fn overrides(&self, sub: &MemberHandle, sup: &MemberHandle) -> bool {
        let (Some(a), Some(b)) = (sub.method(), sup.method()) else {
            return false;
        };
        if sub.kind != MemberKind::Method || sup.kind != MemberKind::Method {
            return false;
        }
        if a.name != b.name || a.params.len() != b.params.len() {
            return false;
        }
        if a.modifiers.is_static() || b.modifiers.is_static() || b.modifiers.is_private() {
            return false;
        }
        if sub.owner.is_same(&sup.owner) {
            return false;
        }
        let sub_ty = self.this_type(&sub.owner);
        let Some(view) = self.as_super(&sub_ty, sup.owner.qualified()) else {
            return false;
        };
        let viewed = MemberHandle {
            subst: self.subst_map(&sup.owner, view.args()),
            ..MemberHandle::new(sup.owner.clone(), MemberKind::Method, sup.index)
        };
        let plain = MemberHandle::new(sup.owner.clone(), MemberKind::Method, sup.index);
        let own = MemberHandle::new(sub.owner.clone(), MemberKind::Method, sub.index);
        let mine = self.param_types(&own);
        let theirs = self.param_types(&viewed);
        let erased = self.param_types(&plain);
        mine.iter()
            .zip(theirs.iter().zip(erased.iter()))
            .all(|(m, (t, e))| {
                let m = m.erased_name();
                m == t.erased_name() || m == e.erased_name()
            })
    }

    /// Every declared subtype of `qualified` in the corpus, transitively.
    pub fn subtypes_of(&self, qualified: &str) -> Vec<TypeHandle> {
        let mut out = Vec::new();
        let mut seen: HashSet<(DocumentKey, usize)> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(qualified.to_string());
        while let Some(q) = queue.pop_front() {
            let simple = q.rsplit('.').next().unwrap_or(&q).to_string();
            for unit in self.world.units_extending(&simple) {
                for (i, t) in unit.unit.types.iter().enumerate() {
                    if !t.supertypes().any(|s| s.simple_name() == simple) {
                        continue;
                    }
                    let h = TypeHandle::new(unit.clone(), i);
                    let direct = self
                        .supertypes(&h)
                        .iter()
                        .any(|s| s.qualified() == Some(q.as_str()));
                    if direct && seen.insert((unit.key.clone(), i)) {
                        self.remember(&h);
                        queue.push_back(h.qualified().to_string());
                        out.push(h);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::FixedWorld;
    use super::*;

    #[test]
    fn generic_override_through_substitution() {
        let world = FixedWorld::of(&[
            (
                "p/Base.java",
                "package p; public abstract class Base<T> { public abstract void put(T t); void other(String s) {} }",
            ),
            (
                "p/Impl.java",
                "package p; class Impl extends Base<String> { public void put(String s) {} void other(Object o) {} }",
            ),
            ("p/Leaf.java", "package p; class Leaf extends Impl {}"),
        ]);
        let r = Resolver::new(&world);
        let base = r.lookup_qualified("p.Base").expect("Base");
        let imp = r.lookup_qualified("p.Impl").expect("Impl");
        let sup = MemberHandle::new(base.clone(), MemberKind::Method, 0);
        let sub = MemberHandle::new(imp.clone(), MemberKind::Method, 0);
        assert!(r.overrides(&sub, &sup));
        // overload, not override
        let other_sup = MemberHandle::new(base, MemberKind::Method, 1);
        let other_sub = MemberHandle::new(imp, MemberKind::Method, 1);
        assert!(!r.overrides(&other_sub, &other_sup));

        let leaf = ResolvedType::declared("p.Leaf");
        assert_eq!(r.is_subtype(&leaf, "p.Base"), Tri::Yes);
        assert_eq!(
            r.as_super(&leaf, "p.Base").map(|t| t.to_string()),
            Some("p.Base<java.lang.String>".to_string())
        );
        let subs: Vec<String> = r
            .subtypes_of("p.Base")
            .iter()
            .map(|h| h.qualified().to_string())
            .collect();
        assert_eq!(subs, vec!["p.Impl".to_string(), "p.Leaf".to_string()]);
    }

    #[test]
    fn unresolved_supertype_makes_subtyping_unknown() {
        let world = FixedWorld::of(&[
            ("p/A.java", "package p; class A extends Missing {}"),
            ("p/B.java", "package p; class B {}"),
        ]);
        let r = Resolver::new(&world);
        assert_eq!(r.is_subtype(&ResolvedType::declared("p.A"), "p.B"), Tri::Unknown);
        assert_eq!(r.is_subtype(&ResolvedType::declared("p.B"), "p.A"), Tri::No);
    }
}
