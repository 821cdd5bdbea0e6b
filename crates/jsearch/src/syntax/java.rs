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

//! Tree-sitter based extraction of declarations and occurrences from Java
//! source. Syntax errors do not stop extraction: whatever the parser could
//! recover is still walked and the unit is flagged.

use std::collections::HashMap;
use tree_sitter::{Language, Node, Parser};
use tree_sitter_java as ts_java;

use super::javadoc;
use super::model::*;
use crate::error::ParseError;
use crate::types::TextRange;

pub fn parse_source(content: &str) -> Result<CompilationUnit, ParseError> {
    let lang: Language = ts_java::LANGUAGE.into();
    let mut parser = Parser::new();
    parser
        .set_language(&lang)
        .map_err(|e| ParseError::Parser(e.to_string()))?;
    let tree = parser.parse(content, None).ok_or(ParseError::NoTree)?;
    let root = tree.root_node();

    let mut ex = Extractor {
        src: content,
        unit: CompilationUnit {
            has_source: true,
            ..Default::default()
        },
        anon_counters: HashMap::new(),
    };
    ex.program(root);
    let mut unit = ex.unit;
    unit.has_errors = root.has_error();
    Ok(unit)
}

const TYPE_KINDS: &[&str] = &[
    "type_identifier",
    "scoped_type_identifier",
    "generic_type",
    "array_type",
    "integral_type",
    "floating_point_type",
    "boolean_type",
    "void_type",
    "annotated_type",
];

fn is_type_kind(kind: &str) -> bool {
    TYPE_KINDS.contains(&kind)
}

fn is_type_decl(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

fn is_comment(kind: &str) -> bool {
    kind == "line_comment" || kind == "block_comment"
}

fn range(n: Node) -> TextRange {
    TextRange::new(n.start_byte(), n.end_byte())
}

fn named_children(n: Node) -> Vec<Node> {
    (0..n.named_child_count())
        .filter_map(|i| n.named_child(i))
        .collect()
}

fn all_children(n: Node) -> Vec<Node> {
    (0..n.child_count()).filter_map(|i| n.child(i)).collect()
}

fn has_child_kind(n: Node, kind: &str) -> bool {
    all_children(n).iter().any(|c| c.kind() == kind)
}

fn first_named_of<'t>(n: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
    named_children(n)
        .into_iter()
        .find(|c| kinds.contains(&c.kind()))
}

fn count_dims(text: &str) -> u8 {
    text.chars().filter(|c| *c == '[').count().min(u8::MAX as usize) as u8
}

fn qualify(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

struct Extractor<'s> {
    src: &'s str,
    unit: CompilationUnit,
    anon_counters: HashMap<Option<usize>, u32>,
}

impl<'s> Extractor<'s> {
    fn text(&self, n: Node) -> &'s str {
        n.utf8_text(self.src.as_bytes()).unwrap_or("")
    }

    fn compact(&self, n: Node) -> String {
        self.text(n).chars().filter(|c| !c.is_whitespace()).collect()
    }

    /// Dotted name with type arguments and whitespace removed.
    fn type_name(&self, n: Node) -> String {
        let mut out = String::new();
        let mut depth = 0i32;
        for c in self.text(n).chars() {
            match c {
                '<' => depth += 1,
                '>' => depth -= 1,
                c if depth == 0 && !c.is_whitespace() => out.push(c),
                _ => {}
            }
        }
        out
    }

    fn prefixes(&self, n: Node) -> Vec<TextRange> {
        let text = self.text(n);
        let start = n.start_byte();
        let mut out = Vec::new();
        let mut depth = 0i32;
        for (i, c) in text.char_indices() {
            match c {
                '<' => depth += 1,
                '>' => depth -= 1,
                '.' if depth == 0 => {
                    let end = text[..i].trim_end().len();
                    out.push(TextRange::new(start, start + end));
                }
                _ => {}
            }
        }
        out
    }

    fn push(&mut self, kind: OccurrenceKind, range: TextRange, ctx: Context) {
        self.unit.occurrences.push(Occurrence {
            kind,
            range,
            ctx,
            in_javadoc: false,
        });
    }

    fn new_body(&mut self, parent: Option<usize>) -> usize {
        self.unit.bodies.push(Body {
            parent,
            locals: HashMap::new(),
        });
        self.unit.bodies.len() - 1
    }

    fn add_local(&mut self, body: Option<usize>, name: &str, ty: Option<TypeSig>) {
        if let Some(b) = body.and_then(|b| self.unit.bodies.get_mut(b)) {
            b.locals.insert(name.to_string(), ty);
        }
    }

    fn program(&mut self, root: Node) {
        let ctx = Context::default();
        self.declarations(named_children(root), ctx, |this, child| match child.kind() {
            "package_declaration" => this.package(child),
            "import_declaration" => this.import(child),
            "module_declaration" => this.module(child),
            k if is_type_decl(k) => {
                this.declare_type(child, ctx, None);
            }
            _ => this.walk(child, ctx, Access::Read),
        });
    }

    /// Visit the children of a body in order. A doc comment is visited with
    /// the context of the declaration that follows it.
    fn declarations<'t>(&mut self, children: Vec<Node<'t>>, ctx: Context, mut visit: impl FnMut(&mut Self, Node<'t>)) {
        let mut doc: Option<Node<'t>> = None;
        for child in children {
            match child.kind() {
                "block_comment" => {
                    if let Some(earlier) = doc.replace(child) {
                        self.javadoc(earlier, ctx);
                    }
                }
                "line_comment" => {}
                _ => {
                    if let Some(d) = doc.take() {
                        let dctx = self.documented(child, ctx);
                        self.javadoc(d, dctx);
                    }
                    visit(self, child);
                }
            }
        }
        if let Some(d) = doc {
            self.javadoc(d, ctx);
        }
    }

    /// Context the declaration `decl` is about to get.
    fn documented(&self, decl: Node, ctx: Context) -> Context {
        let Some(owner) = ctx.owner.and_then(|o| self.unit.types.get(o)) else {
            if is_type_decl(decl.kind()) {
                return Context {
                    owner: Some(self.unit.types.len()),
                    ..ctx
                };
            }
            return ctx;
        };
        let member = match decl.kind() {
            "method_declaration" | "annotation_type_element_declaration" => MemberRef::Method(owner.methods.len()),
            "constructor_declaration" | "compact_constructor_declaration" => {
                MemberRef::Constructor(owner.constructors.len())
            }
            "field_declaration" | "constant_declaration" | "enum_constant" => MemberRef::Field(owner.fields.len()),
            k if is_type_decl(k) => {
                return Context {
                    owner: Some(self.unit.types.len()),
                    member: None,
                    body: ctx.body,
                }
            }
            _ => return ctx,
        };
        Context {
            member: Some(member),
            ..ctx
        }
    }

    fn package(&mut self, node: Node) {
        let ctx = Context::default();
        for child in named_children(node) {
            match child.kind() {
                "identifier" | "scoped_identifier" => {
                    self.unit.package = Some(NamedDecl {
                        name: self.compact(child),
                        range: Some(range(child)),
                    });
                }
                "annotation" | "marker_annotation" => self.annotation(child, ctx),
                _ => {}
            }
        }
    }

    fn import(&mut self, node: Node) {
        let ctx = Context::default();
        let Some(name_node) = first_named_of(node, &["identifier", "scoped_identifier"]) else {
            return;
        };
        let name = self.compact(name_node);
        let kind = match (
            has_child_kind(node, "static"),
            has_child_kind(node, "asterisk"),
        ) {
            (false, false) => ImportKind::Single,
            (false, true) => ImportKind::OnDemand,
            (true, false) => ImportKind::Static,
            (true, true) => ImportKind::StaticOnDemand,
        };
        self.unit.imports.push(Import {
            name: name.clone(),
            kind,
            range: range(node),
        });
        match kind {
            ImportKind::Single | ImportKind::StaticOnDemand => {
                let prefixes = self.prefixes(name_node);
                self.push(
                    OccurrenceKind::TypeRef {
                        sig: TypeSig::simple(name),
                        role: TypeRole::Import,
                        prefixes,
                    },
                    range(name_node),
                    ctx,
                );
            }
            ImportKind::OnDemand => {
                self.push(OccurrenceKind::PackageRef { name }, range(name_node), ctx);
            }
            ImportKind::Static => {
                let scope = name_node.child_by_field_name("scope");
                let member = name_node.child_by_field_name("name");
                if let (Some(scope), Some(member)) = (scope, member) {
                    let owner = self.compact(scope);
                    let prefixes = self.prefixes(scope);
                    self.push(
                        OccurrenceKind::TypeRef {
                            sig: TypeSig::simple(owner.clone()),
                            role: TypeRole::Import,
                            prefixes,
                        },
                        range(scope),
                        ctx,
                    );
                    self.push(
                        OccurrenceKind::StaticImport {
                            owner,
                            member: self.text(member).to_string(),
                        },
                        range(member),
                        ctx,
                    );
                }
            }
        }
    }

    fn module(&mut self, node: Node) {
        let ctx = Context::default();
        if let Some(name) = node.child_by_field_name("name") {
            self.unit.module = Some(NamedDecl {
                name: self.compact(name),
                range: Some(range(name)),
            });
        }
        for child in named_children(node) {
            if matches!(child.kind(), "annotation" | "marker_annotation") {
                self.annotation(child, ctx);
            }
        }
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        for directive in named_children(body) {
            let names: Vec<Node> = named_children(directive)
                .into_iter()
                .filter(|c| matches!(c.kind(), "identifier" | "scoped_identifier"))
                .collect();
            match directive.kind() {
                "requires_module_directive" => {
                    if let Some(m) = directive.child_by_field_name("module") {
                        let name = self.compact(m);
                        self.push(OccurrenceKind::ModuleRef { name }, range(m), ctx);
                    }
                }
                "exports_module_directive" | "opens_module_directive" => {
                    for (i, n) in names.into_iter().enumerate() {
                        let name = self.compact(n);
                        if i == 0 {
                            self.push(OccurrenceKind::PackageRef { name }, range(n), ctx);
                        } else {
                            self.push(OccurrenceKind::ModuleRef { name }, range(n), ctx);
                        }
                    }
                }
                "uses_module_directive" | "provides_module_directive" => {
                    for n in names {
                        let prefixes = self.prefixes(n);
                        self.push(
                            OccurrenceKind::TypeRef {
                                sig: TypeSig::simple(self.compact(n)),
                                role: TypeRole::Declaration,
                                prefixes,
                            },
                            range(n),
                            ctx,
                        );
                    }
                }
                _ => {}
            }
        }
    }

    fn modifiers(&self, m: Node) -> Modifiers {
        let mut mods = Modifiers::default();
        for c in all_children(m) {
            match c.kind() {
                "marker_annotation" | "annotation" => {
                    let deprecated = c
                        .child_by_field_name("name")
                        .map(|n| self.type_name(n))
                        .map(|n| n == "Deprecated" || n == "java.lang.Deprecated")
                        .unwrap_or(false);
                    if deprecated {
                        mods.insert(Modifiers::DEPRECATED);
                    }
                }
                k => {
                    if let Some(bit) = Modifiers::from_keyword(k) {
                        mods.insert(bit);
                    }
                }
            }
        }
        mods
    }

    fn modifier_annotations(&mut self, m: Node, ctx: Context) {
        for c in named_children(m) {
            if matches!(c.kind(), "marker_annotation" | "annotation") {
                self.annotation(c, ctx);
            }
        }
    }

    fn annotation(&mut self, node: Node, ctx: Context) {
        let Some(name) = node.child_by_field_name("name") else {
            return;
        };
        let sig = TypeSig::simple(self.compact(name));
        let prefixes = self.prefixes(name);
        self.push(
            OccurrenceKind::TypeRef {
                sig: sig.clone(),
                role: TypeRole::Annotation,
                prefixes,
            },
            range(name),
            ctx,
        );
        let Some(args) = node.child_by_field_name("arguments") else {
            return;
        };
        for a in named_children(args) {
            if a.kind() == "element_value_pair" {
                if let Some(key) = a.child_by_field_name("key") {
                    self.push(
                        OccurrenceKind::AnnotationElement {
                            annotation: sig.clone(),
                            element: self.text(key).to_string(),
                        },
                        range(key),
                        ctx,
                    );
                }
                if let Some(v) = a.child_by_field_name("value") {
                    self.walk(v, ctx, Access::Read);
                }
            } else {
                self.walk(a, ctx, Access::Read);
            }
        }
    }

    fn type_params(&self, tp: Node) -> Vec<TypeParam> {
        named_children(tp)
            .into_iter()
            .filter(|p| p.kind() == "type_parameter")
            .filter_map(|p| {
                let name = first_named_of(p, &["type_identifier", "identifier"])?;
                let bounds = first_named_of(p, &["type_bound"])
                    .map(|b| {
                        named_children(b)
                            .into_iter()
                            .filter(|c| is_type_kind(c.kind()))
                            .map(|t| self.type_sig(t))
                            .collect()
                    })
                    .unwrap_or_default();
                Some(TypeParam {
                    name: self.text(name).to_string(),
                    bounds,
                })
            })
            .collect()
    }

    fn type_param_bounds(&mut self, tp: Node, ctx: Context) {
        for p in named_children(tp) {
            if let Some(b) = first_named_of(p, &["type_bound"]) {
                for t in named_children(b) {
                    self.visit_type(t, ctx, TypeRole::Declaration);
                }
            }
        }
    }

    fn type_sig(&self, n: Node) -> TypeSig {
        match n.kind() {
            "generic_type" => {
                let name = first_named_of(n, &["type_identifier", "scoped_type_identifier"])
                    .map(|b| self.type_name(b))
                    .unwrap_or_default();
                let args = first_named_of(n, &["type_arguments"])
                    .map(|ta| {
                        named_children(ta)
                            .into_iter()
                            .filter_map(|a| self.type_arg(a))
                            .collect()
                    })
                    .unwrap_or_default();
                TypeSig::simple(name).with_args(args)
            }
            "array_type" => {
                let elem = n
                    .child_by_field_name("element")
                    .map(|e| self.type_sig(e))
                    .unwrap_or_else(|| TypeSig::simple(""));
                let dims = n
                    .child_by_field_name("dimensions")
                    .map(|d| count_dims(self.text(d)))
                    .unwrap_or(1);
                elem.array(dims)
            }
            "annotated_type" => named_children(n)
                .into_iter()
                .rev()
                .find(|c| is_type_kind(c.kind()))
                .map(|t| self.type_sig(t))
                .unwrap_or_else(|| TypeSig::simple(self.type_name(n))),
            _ => TypeSig::simple(self.type_name(n)),
        }
    }

    fn type_arg(&self, a: Node) -> Option<TypeArg> {
        match a.kind() {
            "wildcard" => {
                let kids = all_children(a);
                let is_super = kids.iter().any(|c| c.kind() == "super");
                let is_extends = kids.iter().any(|c| c.kind() == "extends");
                let bound = kids
                    .into_iter()
                    .filter(|c| is_type_kind(c.kind()))
                    .last()
                    .map(|t| self.type_sig(t));
                Some(TypeArg::Wildcard(match bound {
                    Some(b) if is_super => Some((WildcardBound::Super, b)),
                    Some(b) if is_extends => Some((WildcardBound::Extends, b)),
                    _ => None,
                }))
            }
            k if is_type_kind(k) => Some(TypeArg::Type(self.type_sig(a))),
            _ => None,
        }
    }

    fn visit_type(&mut self, n: Node, ctx: Context, role: TypeRole) {
        match n.kind() {
            "type_identifier" => {
                let t = self.text(n);
                if t == "var" {
                    return;
                }
                self.push(
                    OccurrenceKind::TypeRef {
                        sig: TypeSig::simple(t),
                        role,
                        prefixes: Vec::new(),
                    },
                    range(n),
                    ctx,
                );
            }
            "scoped_type_identifier" => {
                let prefixes = self.prefixes(n);
                self.push(
                    OccurrenceKind::TypeRef {
                        sig: TypeSig::simple(self.type_name(n)),
                        role,
                        prefixes,
                    },
                    range(n),
                    ctx,
                );
            }
            "generic_type" => {
                let sig = self.type_sig(n);
                if let Some(base) = first_named_of(n, &["type_identifier", "scoped_type_identifier"])
                {
                    let prefixes = self.prefixes(base);
                    self.push(
                        OccurrenceKind::TypeRef {
                            sig,
                            role,
                            prefixes,
                        },
                        range(base),
                        ctx,
                    );
                }
                if let Some(ta) = first_named_of(n, &["type_arguments"]) {
                    for a in named_children(ta) {
                        self.visit_type_arg(a, ctx);
                    }
                }
            }
            "array_type" => {
                if let Some(e) = n.child_by_field_name("element") {
                    self.visit_type(e, ctx, role);
                }
            }
            "annotated_type" => {
                for c in named_children(n) {
                    match c.kind() {
                        "marker_annotation" | "annotation" => self.annotation(c, ctx),
                        k if is_type_kind(k) => self.visit_type(c, ctx, role),
                        _ => {}
                    }
                }
            }
            "wildcard" => self.visit_type_arg(n, ctx),
            _ => {}
        }
    }

    fn visit_type_arg(&mut self, a: Node, ctx: Context) {
        if a.kind() == "wildcard" {
            for c in named_children(a) {
                if is_type_kind(c.kind()) {
                    self.visit_type(c, ctx, TypeRole::TypeArgument);
                }
            }
        } else {
            self.visit_type(a, ctx, TypeRole::TypeArgument);
        }
    }

    fn declare_type(&mut self, node: Node, ctx: Context, parent: Option<usize>) -> Option<usize> {
        let kind = match node.kind() {
            "class_declaration" => TypeKind::Class,
            "interface_declaration" => TypeKind::Interface,
            "enum_declaration" => TypeKind::Enum,
            "record_declaration" => TypeKind::Record,
            "annotation_type_declaration" => TypeKind::Annotation,
            _ => return None,
        };
        let name_node = node.child_by_field_name("name")?;
        let name = self.text(name_node).to_string();
        let qualified = match parent.and_then(|p| self.unit.types.get(p)) {
            Some(p) => format!("{}.{}", p.qualified, name),
            None => qualify(self.unit.package_name(), &name),
        };
        let mut decl = TypeDecl::new(name, qualified, kind);
        decl.parent = parent;
        decl.name_range = Some(range(name_node));
        let modifiers_node = first_named_of(node, &["modifiers"]);
        decl.modifiers = modifiers_node
            .map(|m| self.modifiers(m))
            .unwrap_or_default();
        let tp_node = node.child_by_field_name("type_parameters");
        if let Some(tp) = tp_node {
            decl.type_params = self.type_params(tp);
        }

        let mut supers: Vec<Node> = Vec::new();
        if let Some(sc) = node.child_by_field_name("superclass") {
            if let Some(t) = named_children(sc)
                .into_iter()
                .find(|c| is_type_kind(c.kind()))
            {
                decl.superclass = Some(self.type_sig(t));
                supers.push(t);
            }
        }
        let iface_holder = node
            .child_by_field_name("interfaces")
            .or_else(|| first_named_of(node, &["extends_interfaces"]));
        if let Some(list) = iface_holder.and_then(|h| first_named_of(h, &["type_list"])) {
            for t in named_children(list) {
                if is_type_kind(t.kind()) {
                    decl.interfaces.push(self.type_sig(t));
                    supers.push(t);
                }
            }
        }

        let idx = self.unit.types.len();
        self.unit.types.push(decl);
        if let Some(p) = parent {
            self.unit.types[p].member_types.push(idx);
        }
        let inner = Context {
            owner: Some(idx),
            member: None,
            body: ctx.body,
        };
        if let Some(m) = modifiers_node {
            self.modifier_annotations(m, inner);
        }
        if let Some(tp) = tp_node {
            self.type_param_bounds(tp, inner);
        }
        for t in supers {
            self.visit_type(t, inner, TypeRole::Supertype);
        }
        if kind == TypeKind::Record {
            self.record_components(node, idx, inner);
        }
        if let Some(body) = node.child_by_field_name("body") {
            if body.kind() == "enum_body" {
                self.enum_body(body, idx, inner);
            } else {
                self.class_body(body, inner);
            }
        }
        if kind == TypeKind::Record && self.unit.types[idx].constructors.is_empty() {
            let params = self.component_params(idx);
            let name = self.unit.types[idx].name.clone();
            self.unit.types[idx].constructors.push(MethodDecl {
                name,
                name_range: None,
                modifiers: Modifiers(Modifiers::PUBLIC),
                type_params: Vec::new(),
                params,
                return_type: None,
                body: None,
                is_constructor: true,
            });
        }
        Some(idx)
    }

    fn component_params(&self, idx: usize) -> Vec<Param> {
        self.unit.types[idx]
            .fields
            .iter()
            .filter(|f| !f.modifiers.is_static())
            .map(|f| Param {
                name: f.name.clone(),
                ty: f.ty.clone(),
                varargs: false,
            })
            .collect()
    }

    fn record_components(&mut self, node: Node, idx: usize, ctx: Context) {
        let Some(plist) = node.child_by_field_name("parameters") else {
            return;
        };
        for p in named_children(plist) {
            let Some((param, ty_node)) = self.param(p) else {
                continue;
            };
            let t = &mut self.unit.types[idx];
            let fi = t.fields.len();
            t.fields.push(FieldDecl {
                name: param.name.clone(),
                name_range: p.child_by_field_name("name").map(range),
                ty: param.ty.clone(),
                modifiers: Modifiers(Modifiers::PRIVATE | Modifiers::FINAL),
                enum_constant: false,
            });
            // implicit accessor
            t.methods.push(MethodDecl {
                name: param.name,
                name_range: None,
                modifiers: Modifiers(Modifiers::PUBLIC),
                type_params: Vec::new(),
                params: Vec::new(),
                return_type: Some(param.ty),
                body: None,
                is_constructor: false,
            });
            let fctx = Context {
                member: Some(MemberRef::Field(fi)),
                ..ctx
            };
            self.visit_type(ty_node, fctx, TypeRole::Declaration);
        }
    }

    fn class_body(&mut self, body: Node, ctx: Context) {
        self.declarations(named_children(body), ctx, |this, m| match m.kind() {
            "field_declaration" | "constant_declaration" => this.declare_fields(m, ctx),
            "method_declaration" | "annotation_type_element_declaration" => this.declare_method(m, ctx, false),
            "constructor_declaration" | "compact_constructor_declaration" => this.declare_method(m, ctx, true),
            k if is_type_decl(k) => {
                this.declare_type(m, ctx, ctx.owner);
            }
            "enum_body_declarations" => this.class_body(m, ctx),
            "static_initializer" | "block" => {
                let b = this.new_body(ctx.body);
                let ictx = Context {
                    owner: ctx.owner,
                    member: Some(MemberRef::Initializer),
                    body: Some(b),
                };
                this.walk(m, ictx, Access::Read);
            }
            _ => this.walk(m, ctx, Access::Read),
        });
    }

    fn enum_body(&mut self, body: Node, idx: usize, ctx: Context) {
        let enum_sig = TypeSig::simple(self.unit.types[idx].name.clone());
        self.declarations(named_children(body), ctx, |this, c| match c.kind() {
            "enum_constant" => {
                let Some(name) = c.child_by_field_name("name") else {
                    return;
                };
                let const_name = this.text(name).to_string();
                let fields = &mut this.unit.types[idx].fields;
                let fi = fields.len();
                fields.push(FieldDecl {
                    name: const_name,
                    name_range: Some(range(name)),
                    ty: enum_sig.clone(),
                    modifiers: Modifiers(
                        Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL,
                    ),
                    enum_constant: true,
                });
                let b = this.new_body(ctx.body);
                let fctx = Context {
                    owner: Some(idx),
                    member: Some(MemberRef::Field(fi)),
                    body: Some(b),
                };
                if let Some(m) = first_named_of(c, &["modifiers"]) {
                    this.modifier_annotations(m, fctx);
                }
                if let Some(args) = c.child_by_field_name("arguments") {
                    let exprs = this.args(args);
                    this.push(
                        OccurrenceKind::ConstructorCall {
                            sig: enum_sig.clone(),
                            args: exprs,
                            form: CtorForm::EnumConstant,
                        },
                        range(name),
                        fctx,
                    );
                    this.walk(args, fctx, Access::Read);
                }
                if let Some(cb) = c.child_by_field_name("body") {
                    this.anonymous(enum_sig.clone(), cb, fctx);
                }
            }
            "enum_body_declarations" => this.class_body(c, ctx),
            _ => {}
        });
    }

    fn param<'t>(&self, p: Node<'t>) -> Option<(Param, Node<'t>)> {
        match p.kind() {
            "formal_parameter" => {
                let ty = p.child_by_field_name("type")?;
                let name = p.child_by_field_name("name")?;
                let mut sig = self.type_sig(ty);
                if let Some(d) = p.child_by_field_name("dimensions") {
                    sig = sig.array(count_dims(self.text(d)));
                }
                Some((
                    Param {
                        name: self.text(name).to_string(),
                        ty: sig,
                        varargs: false,
                    },
                    ty,
                ))
            }
            "spread_parameter" => {
                let ty = named_children(p)
                    .into_iter()
                    .find(|c| is_type_kind(c.kind()))?;
                let decl = first_named_of(p, &["variable_declarator"])?;
                let name = decl.child_by_field_name("name")?;
                Some((
                    Param {
                        name: self.text(name).to_string(),
                        ty: self.type_sig(ty).array(1),
                        varargs: true,
                    },
                    ty,
                ))
            }
            _ => None,
        }
    }

    fn declare_method(&mut self, node: Node, ctx: Context, is_ctor: bool) {
        let Some(owner) = ctx.owner else {
            return;
        };
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let modifiers_node = first_named_of(node, &["modifiers"]);
        let mut modifiers = modifiers_node
            .map(|m| self.modifiers(m))
            .unwrap_or_default();
        let body_node = node.child_by_field_name("body");
        if matches!(
            self.unit.types[owner].kind,
            TypeKind::Interface | TypeKind::Annotation
        ) {
            modifiers.insert(Modifiers::PUBLIC);
            if body_node.is_none() && !is_ctor {
                modifiers.insert(Modifiers::ABSTRACT);
            }
        }
        let body_id = self.new_body(ctx.body);
        let tp_node = node.child_by_field_name("type_parameters");
        let type_params = tp_node.map(|tp| self.type_params(tp)).unwrap_or_default();

        let mut params = Vec::new();
        let mut param_types = Vec::new();
        let mut param_mods = Vec::new();
        if node.kind() == "compact_constructor_declaration" {
            params = self.component_params(owner);
            for p in &params {
                self.add_local(Some(body_id), &p.name, Some(p.ty.clone()));
            }
        } else if let Some(plist) = node.child_by_field_name("parameters") {
            for p in named_children(plist) {
                if let Some((param, ty)) = self.param(p) {
                    self.add_local(Some(body_id), &param.name, Some(param.ty.clone()));
                    params.push(param);
                    param_types.push(ty);
                    if let Some(m) = first_named_of(p, &["modifiers"]) {
                        param_mods.push(m);
                    }
                }
            }
        }

        let return_node = if is_ctor {
            None
        } else {
            node.child_by_field_name("type")
        };
        let return_type = return_node.map(|t| {
            let sig = self.type_sig(t);
            match node.child_by_field_name("dimensions") {
                Some(d) => sig.array(count_dims(self.text(d))),
                None => sig,
            }
        });

        let decl = MethodDecl {
            name: self.text(name_node).to_string(),
            name_range: Some(range(name_node)),
            modifiers,
            type_params,
            params,
            return_type,
            body: Some(body_id),
            is_constructor: is_ctor,
        };
        let t = &mut self.unit.types[owner];
        let member = if is_ctor {
            t.constructors.push(decl);
            MemberRef::Constructor(t.constructors.len() - 1)
        } else {
            t.methods.push(decl);
            MemberRef::Method(t.methods.len() - 1)
        };
        let mctx = Context {
            owner: Some(owner),
            member: Some(member),
            body: Some(body_id),
        };

        if let Some(m) = modifiers_node {
            self.modifier_annotations(m, mctx);
        }
        if let Some(tp) = tp_node {
            self.type_param_bounds(tp, mctx);
        }
        if let Some(t) = return_node {
            self.visit_type(t, mctx, TypeRole::Declaration);
        }
        for m in param_mods {
            self.modifier_annotations(m, mctx);
        }
        for t in param_types {
            self.visit_type(t, mctx, TypeRole::Declaration);
        }
        if let Some(th) = first_named_of(node, &["throws"]) {
            for t in named_children(th) {
                self.visit_type(t, mctx, TypeRole::Throws);
            }
        }
        // annotation element default
        if let Some(v) = node.child_by_field_name("value") {
            self.walk(v, mctx, Access::Read);
        }
        if let Some(b) = body_node {
            self.walk(b, mctx, Access::Read);
        }
    }

    fn declare_fields(&mut self, node: Node, ctx: Context) {
        let Some(owner) = ctx.owner else {
            return;
        };
        let Some(ty_node) = node.child_by_field_name("type") else {
            return;
        };
        let modifiers_node = first_named_of(node, &["modifiers"]);
        let mut modifiers = modifiers_node
            .map(|m| self.modifiers(m))
            .unwrap_or_default();
        if matches!(
            self.unit.types[owner].kind,
            TypeKind::Interface | TypeKind::Annotation
        ) {
            modifiers.insert(Modifiers::PUBLIC | Modifiers::STATIC | Modifiers::FINAL);
        }
        let base = self.type_sig(ty_node);
        let mut first_ctx = None;
        for d in named_children(node) {
            if d.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = d.child_by_field_name("name") else {
                continue;
            };
            let ty = match d.child_by_field_name("dimensions") {
                Some(dims) => base.clone().array(count_dims(self.text(dims))),
                None => base.clone(),
            };
            let field_name = self.text(name).to_string();
            let fields = &mut self.unit.types[owner].fields;
            let fi = fields.len();
            fields.push(FieldDecl {
                name: field_name,
                name_range: Some(range(name)),
                ty,
                modifiers,
                enum_constant: false,
            });
            let b = self.new_body(ctx.body);
            let fctx = Context {
                owner: Some(owner),
                member: Some(MemberRef::Field(fi)),
                body: Some(b),
            };
            first_ctx.get_or_insert(fctx);
            if let Some(v) = d.child_by_field_name("value") {
                self.walk(v, fctx, Access::Read);
            }
        }
        if let Some(fctx) = first_ctx {
            if let Some(m) = modifiers_node {
                self.modifier_annotations(m, fctx);
            }
            self.visit_type(ty_node, fctx, TypeRole::Declaration);
        }
    }

    fn anonymous(&mut self, sig: TypeSig, body: Node, ctx: Context) {
        let n = {
            let c = self.anon_counters.entry(ctx.owner).or_insert(0);
            *c += 1;
            *c
        };
        let base = match ctx.owner.and_then(|o| self.unit.types.get(o)) {
            Some(t) => t.qualified.clone(),
            None => qualify(self.unit.package_name(), ""),
        };
        let mut decl = TypeDecl::new("", format!("{}${}", base, n), TypeKind::Class);
        decl.anonymous = true;
        decl.parent = ctx.owner;
        decl.superclass = Some(sig);
        self.unit.types.push(decl);
        let inner = Context {
            owner: Some(self.unit.types.len() - 1),
            member: None,
            body: ctx.body,
        };
        self.class_body(body, inner);
    }

    fn args(&self, list: Node) -> Vec<Expr> {
        named_children(list)
            .into_iter()
            .filter(|c| !is_comment(c.kind()))
            .map(|c| self.expr(c))
            .collect()
    }

    /// Static shape of an expression for later typing.
    fn expr(&self, n: Node) -> Expr {
        match n.kind() {
            "identifier" => Expr::Path {
                base: PathBase::None,
                segments: vec![self.text(n).to_string()],
            },
            "this" => Expr::Path {
                base: PathBase::This,
                segments: Vec::new(),
            },
            "super" => Expr::Path {
                base: PathBase::Super,
                segments: Vec::new(),
            },
            "field_access" => {
                let (Some(o), Some(f)) = (
                    n.child_by_field_name("object"),
                    n.child_by_field_name("field"),
                ) else {
                    return Expr::Unknown;
                };
                if f.kind() == "this" {
                    return Expr::Path {
                        base: PathBase::This,
                        segments: Vec::new(),
                    };
                }
                let name = self.text(f).to_string();
                match self.expr(o) {
                    Expr::Path { base, mut segments } => {
                        segments.push(name);
                        Expr::Path { base, segments }
                    }
                    other => Expr::Field {
                        target: Box::new(other),
                        name,
                    },
                }
            }
            "method_invocation" => {
                let Some(name) = n.child_by_field_name("name") else {
                    return Expr::Unknown;
                };
                Expr::Call {
                    receiver: n
                        .child_by_field_name("object")
                        .map(|o| Box::new(self.expr(o))),
                    selector: self.text(name).to_string(),
                    args: n
                        .child_by_field_name("arguments")
                        .map(|a| self.args(a))
                        .unwrap_or_default(),
                }
            }
            "object_creation_expression" => n
                .child_by_field_name("type")
                .map(|t| Expr::New(self.type_sig(t)))
                .unwrap_or(Expr::Unknown),
            "array_creation_expression" => n
                .child_by_field_name("type")
                .map(|t| {
                    let dims = named_children(n)
                        .iter()
                        .filter(|c| matches!(c.kind(), "dimensions_expr" | "dimensions"))
                        .map(|c| {
                            if c.kind() == "dimensions" {
                                count_dims(self.text(*c))
                            } else {
                                1
                            }
                        })
                        .sum::<u8>()
                        .max(1);
                    Expr::New(self.type_sig(t).array(dims))
                })
                .unwrap_or(Expr::Unknown),
            "parenthesized_expression" => named_children(n)
                .into_iter()
                .find(|c| !is_comment(c.kind()))
                .map(|c| self.expr(c))
                .unwrap_or(Expr::Unknown),
            "cast_expression" => n
                .child_by_field_name("type")
                .map(|t| Expr::Cast(self.type_sig(t)))
                .unwrap_or(Expr::Unknown),
            "string_literal" | "text_block" => Expr::Literal("java.lang.String".into()),
            "decimal_integer_literal"
            | "hex_integer_literal"
            | "octal_integer_literal"
            | "binary_integer_literal" => {
                let t = self.text(n);
                if t.ends_with('l') || t.ends_with('L') {
                    Expr::Literal("long".into())
                } else {
                    Expr::Literal("int".into())
                }
            }
            "decimal_floating_point_literal" | "hex_floating_point_literal" => {
                let t = self.text(n);
                if t.ends_with('f') || t.ends_with('F') {
                    Expr::Literal("float".into())
                } else {
                    Expr::Literal("double".into())
                }
            }
            "true" | "false" | "instanceof_expression" => Expr::Literal("boolean".into()),
            "character_literal" => Expr::Literal("char".into()),
            "null_literal" => Expr::Null,
            "class_literal" => Expr::Literal("java.lang.Class".into()),
            "binary_expression" => {
                let op = n
                    .child_by_field_name("operator")
                    .map(|o| self.text(o))
                    .unwrap_or("");
                match op {
                    "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => {
                        Expr::Literal("boolean".into())
                    }
                    "+" => {
                        let l = n.child_by_field_name("left").map(|c| self.expr(c));
                        let r = n.child_by_field_name("right").map(|c| self.expr(c));
                        let string = Expr::Literal("java.lang.String".into());
                        if l.as_ref() == Some(&string) || r.as_ref() == Some(&string) {
                            string
                        } else {
                            Expr::Unknown
                        }
                    }
                    _ => Expr::Unknown,
                }
            }
            _ => Expr::Unknown,
        }
    }

    fn walk_children(&mut self, n: Node, ctx: Context) {
        for c in named_children(n) {
            self.walk(c, ctx, Access::Read);
        }
    }

    fn walk(&mut self, n: Node, ctx: Context, access: Access) {
        match n.kind() {
            "identifier" => {
                self.push(
                    OccurrenceKind::Name {
                        name: self.text(n).to_string(),
                        qualifier: None,
                        access,
                    },
                    range(n),
                    ctx,
                );
            }
            "field_access" => {
                let obj = n.child_by_field_name("object");
                let field = n.child_by_field_name("field");
                if let (Some(o), Some(f)) = (obj, field) {
                    if f.kind() == "identifier" {
                        self.push(
                            OccurrenceKind::Name {
                                name: self.text(f).to_string(),
                                qualifier: Some(self.expr(o)),
                                access,
                            },
                            range(f),
                            ctx,
                        );
                    }
                    self.walk(o, ctx, Access::Read);
                }
            }
            "method_invocation" => self.invocation(n, ctx),
            "object_creation_expression" => self.creation(n, ctx),
            "explicit_constructor_invocation" => self.explicit_constructor(n, ctx),
            "method_reference" => self.method_reference(n, ctx),
            "assignment_expression" => {
                let op = n
                    .child_by_field_name("operator")
                    .map(|o| self.text(o))
                    .unwrap_or("=");
                if let Some(l) = n.child_by_field_name("left") {
                    let access = if op == "=" {
                        Access::Write
                    } else {
                        Access::ReadWrite
                    };
                    self.walk(l, ctx, access);
                }
                if let Some(r) = n.child_by_field_name("right") {
                    self.walk(r, ctx, Access::Read);
                }
            }
            "update_expression" => {
                for c in named_children(n) {
                    self.walk(c, ctx, Access::ReadWrite);
                }
            }
            "parenthesized_expression" => {
                for c in named_children(n) {
                    self.walk(c, ctx, access);
                }
            }
            "local_variable_declaration" => self.local_declaration(n, ctx),
            "enhanced_for_statement" => {
                if let (Some(t), Some(name)) =
                    (n.child_by_field_name("type"), n.child_by_field_name("name"))
                {
                    let sig = (self.text(t) != "var").then(|| self.type_sig(t));
                    self.add_local(ctx.body, self.text(name), sig);
                    self.visit_type(t, ctx, TypeRole::Declaration);
                }
                for field in ["value", "body"] {
                    if let Some(c) = n.child_by_field_name(field) {
                        self.walk(c, ctx, Access::Read);
                    }
                }
            }
            "catch_formal_parameter" => {
                let mut first = None;
                if let Some(ct) = first_named_of(n, &["catch_type"]) {
                    for t in named_children(ct) {
                        if is_type_kind(t.kind()) {
                            first.get_or_insert_with(|| self.type_sig(t));
                            self.visit_type(t, ctx, TypeRole::Declaration);
                        }
                    }
                }
                if let Some(name) = n.child_by_field_name("name") {
                    self.add_local(ctx.body, self.text(name), first);
                }
            }
            "resource" => match (n.child_by_field_name("type"), n.child_by_field_name("name")) {
                (Some(t), Some(name)) => {
                    let sig = (self.text(t) != "var").then(|| self.type_sig(t));
                    self.add_local(ctx.body, self.text(name), sig);
                    self.visit_type(t, ctx, TypeRole::Declaration);
                    if let Some(v) = n.child_by_field_name("value") {
                        self.walk(v, ctx, Access::Read);
                    }
                }
                _ => self.walk_children(n, ctx),
            },
            "lambda_expression" => self.lambda(n, ctx),
            "instanceof_expression" => {
                if let Some(l) = n.child_by_field_name("left") {
                    self.walk(l, ctx, Access::Read);
                }
                if let Some(r) = n.child_by_field_name("right") {
                    self.visit_type(r, ctx, TypeRole::Expression);
                    if let Some(name) = n.child_by_field_name("name") {
                        let sig = self.type_sig(r);
                        self.add_local(ctx.body, self.text(name), Some(sig));
                    }
                }
                if let Some(p) = n.child_by_field_name("pattern") {
                    self.walk(p, ctx, Access::Read);
                }
            }
            "cast_expression" => {
                for c in named_children(n) {
                    if is_type_kind(c.kind()) {
                        self.visit_type(c, ctx, TypeRole::Expression);
                    }
                }
                if let Some(v) = n.child_by_field_name("value") {
                    self.walk(v, ctx, Access::Read);
                }
            }
            "array_creation_expression" => {
                for c in named_children(n) {
                    if is_type_kind(c.kind()) {
                        self.visit_type(c, ctx, TypeRole::Expression);
                    } else {
                        self.walk(c, ctx, Access::Read);
                    }
                }
            }
            "annotation" | "marker_annotation" => self.annotation(n, ctx),
            "block_comment" => self.javadoc(n, ctx),
            "labeled_statement" => {
                for c in named_children(n).into_iter().skip(1) {
                    self.walk(c, ctx, Access::Read);
                }
            }
            "break_statement" | "continue_statement" | "line_comment" | "string_literal"
            | "character_literal" | "text_block" => {}
            "type_arguments" => {
                for c in named_children(n) {
                    self.visit_type_arg(c, ctx);
                }
            }
            k if is_type_decl(k) => {
                self.declare_type(n, ctx, ctx.owner);
            }
            k if is_type_kind(k) => self.visit_type(n, ctx, TypeRole::Expression),
            _ => self.walk_children(n, ctx),
        }
    }

    fn local_declaration(&mut self, n: Node, ctx: Context) {
        let ty = n.child_by_field_name("type");
        let base = ty
            .filter(|t| self.text(*t) != "var")
            .map(|t| self.type_sig(t));
        if let Some(m) = first_named_of(n, &["modifiers"]) {
            self.modifier_annotations(m, ctx);
        }
        if let Some(t) = ty {
            self.visit_type(t, ctx, TypeRole::Declaration);
        }
        for d in named_children(n) {
            if d.kind() != "variable_declarator" {
                continue;
            }
            let Some(name) = d.child_by_field_name("name") else {
                continue;
            };
            let value = d.child_by_field_name("value");
            let local_ty = match &base {
                Some(b) => Some(match d.child_by_field_name("dimensions") {
                    Some(dims) => b.clone().array(count_dims(self.text(dims))),
                    None => b.clone(),
                }),
                None => value.and_then(|v| match self.expr(v) {
                    Expr::New(sig) | Expr::Cast(sig) => Some(sig),
                    Expr::Literal(t) => Some(TypeSig::simple(t)),
                    _ => None,
                }),
            };
            self.add_local(ctx.body, self.text(name), local_ty);
            if let Some(v) = value {
                self.walk(v, ctx, Access::Read);
            }
        }
    }

    fn lambda(&mut self, n: Node, ctx: Context) {
        let b = self.new_body(ctx.body);
        let lctx = Context {
            body: Some(b),
            ..ctx
        };
        if let Some(p) = n.child_by_field_name("parameters") {
            match p.kind() {
                "identifier" => self.add_local(Some(b), self.text(p), None),
                "inferred_parameters" => {
                    for id in named_children(p) {
                        self.add_local(Some(b), self.text(id), None);
                    }
                }
                "formal_parameters" => {
                    for fp in named_children(p) {
                        if let Some((param, t)) = self.param(fp) {
                            let ty = (param.ty.name != "var").then_some(param.ty);
                            self.add_local(Some(b), &param.name, ty);
                            self.visit_type(t, lctx, TypeRole::Declaration);
                        }
                    }
                }
                _ => {}
            }
        }
        if let Some(body) = n.child_by_field_name("body") {
            self.walk(body, lctx, Access::Read);
        }
    }

    fn invocation(&mut self, n: Node, ctx: Context) {
        let Some(name) = n.child_by_field_name("name") else {
            self.walk_children(n, ctx);
            return;
        };
        let object = n.child_by_field_name("object");
        let arguments = n.child_by_field_name("arguments");
        let receiver = object.map(|o| self.expr(o));
        let args = arguments.map(|a| self.args(a)).unwrap_or_default();
        self.push(
            OccurrenceKind::MethodCall {
                selector: self.text(name).to_string(),
                receiver,
                args,
            },
            range(name),
            ctx,
        );
        if let Some(o) = object {
            self.walk(o, ctx, Access::Read);
        }
        if let Some(ta) = n.child_by_field_name("type_arguments") {
            self.walk(ta, ctx, Access::Read);
        }
        if let Some(a) = arguments {
            self.walk(a, ctx, Access::Read);
        }
    }

    fn creation(&mut self, n: Node, ctx: Context) {
        let Some(ty) = n.child_by_field_name("type") else {
            self.walk_children(n, ctx);
            return;
        };
        let sig = self.type_sig(ty);
        let arguments = n.child_by_field_name("arguments");
        let args = arguments.map(|a| self.args(a)).unwrap_or_default();
        self.push(
            OccurrenceKind::ConstructorCall {
                sig: sig.clone(),
                args,
                form: CtorForm::New,
            },
            range(ty),
            ctx,
        );
        // qualified creation: `outer.new Inner()`
        for c in named_children(n) {
            if c.id() != ty.id()
                && !matches!(c.kind(), "argument_list" | "class_body" | "type_arguments")
            {
                self.walk(c, ctx, Access::Read);
            }
        }
        self.visit_type(ty, ctx, TypeRole::Expression);
        if let Some(ta) = n.child_by_field_name("type_arguments") {
            self.walk(ta, ctx, Access::Read);
        }
        if let Some(a) = arguments {
            self.walk(a, ctx, Access::Read);
        }
        if let Some(body) = first_named_of(n, &["class_body"]) {
            self.anonymous(sig, body, ctx);
        }
    }

    fn explicit_constructor(&mut self, n: Node, ctx: Context) {
        let (Some(ctor), Some(owner)) = (n.child_by_field_name("constructor"), ctx.owner) else {
            return;
        };
        let arguments = n.child_by_field_name("arguments");
        let args = arguments.map(|a| self.args(a)).unwrap_or_default();
        let t = &self.unit.types[owner];
        let (form, sig) = if ctor.kind() == "this" {
            (CtorForm::This, TypeSig::simple(t.name.clone()))
        } else {
            (
                CtorForm::Super,
                t.superclass
                    .clone()
                    .unwrap_or_else(|| TypeSig::simple("java.lang.Object")),
            )
        };
        let end = arguments.map(|a| a.end_byte()).unwrap_or(ctor.end_byte());
        self.push(
            OccurrenceKind::ConstructorCall { sig, args, form },
            TextRange::new(n.start_byte(), end),
            ctx,
        );
        if let Some(o) = n.child_by_field_name("object") {
            self.walk(o, ctx, Access::Read);
        }
        if let Some(a) = arguments {
            self.walk(a, ctx, Access::Read);
        }
    }

    fn method_reference(&mut self, n: Node, ctx: Context) {
        let kids: Vec<Node> = named_children(n)
            .into_iter()
            .filter(|c| !is_comment(c.kind()) && c.kind() != "type_arguments")
            .collect();
        let Some(first) = kids.first().copied() else {
            return;
        };
        if has_child_kind(n, "new") {
            let sig = if is_type_kind(first.kind()) {
                self.visit_type(first, ctx, TypeRole::Expression);
                self.type_sig(first)
            } else {
                self.walk(first, ctx, Access::Read);
                TypeSig::simple(self.type_name(first))
            };
            self.push(
                OccurrenceKind::ConstructorCall {
                    sig,
                    args: Vec::new(),
                    form: CtorForm::Reference,
                },
                range(first),
                ctx,
            );
            return;
        }
        let Some(name) = kids.last().copied().filter(|_| kids.len() >= 2) else {
            return;
        };
        let (receiver, receiver_type) = if is_type_kind(first.kind()) {
            self.visit_type(first, ctx, TypeRole::Expression);
            (None, Some(self.type_sig(first)))
        } else {
            if first.kind() != "super" && first.kind() != "this" {
                self.walk(first, ctx, Access::Read);
            }
            (Some(self.expr(first)), None)
        };
        self.push(
            OccurrenceKind::MethodRef {
                selector: self.text(name).to_string(),
                receiver,
                receiver_type,
            },
            range(name),
            ctx,
        );
    }

    fn javadoc(&mut self, n: Node, ctx: Context) {
        let text = self.text(n);
        if !text.starts_with("/**") {
            return;
        }
        let base = n.start_byte();
        for link in javadoc::scan(text) {
            let owner_sig = link.owner.as_ref().map(|(name, _)| TypeSig::simple(name.clone()));
            if let Some((name, r)) = &link.owner {
                let prefixes = name
                    .char_indices()
                    .filter(|(_, c)| *c == '.')
                    .map(|(i, _)| TextRange::new(base + r.start, base + r.start + i))
                    .collect();
                self.unit.occurrences.push(Occurrence {
                    kind: OccurrenceKind::TypeRef {
                        sig: TypeSig::simple(name.clone()),
                        role: TypeRole::Javadoc,
                        prefixes,
                    },
                    range: TextRange::new(base + r.start, base + r.end),
                    ctx,
                    in_javadoc: true,
                });
            }
            if let Some((name, r)) = link.member {
                let params = link
                    .params
                    .map(|ps| ps.into_iter().map(TypeSig::simple).collect());
                self.unit.occurrences.push(Occurrence {
                    kind: OccurrenceKind::DocMemberRef {
                        owner: owner_sig,
                        name,
                        params,
                    },
                    range: TextRange::new(base + r.start, base + r.end),
                    ctx,
                    in_javadoc: true,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> CompilationUnit {
        parse_source(src).expect("parse")
    }

    fn type_refs<'a>(unit: &'a CompilationUnit, src: &'a str) -> Vec<(&'a str, TypeRole)> {
        unit.occurrences
            .iter()
            .filter_map(|o| match &o.kind {
                OccurrenceKind::TypeRef { role, .. } => Some((o.range.text(src), *role)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn extracts_declarations_and_supertypes() {
        let src = "package p.q;\nimport java.util.List;\npublic class A<T extends Number> extends B implements I<String> {\n  private int count;\n  public A(int c) { this.count = c; }\n  T get(List<? super T> xs, String... rest) { return null; }\n  static class Inner {}\n}\ninterface I<X> { void run(); }\n";
        let unit = parse(src);
        assert_eq!(unit.package_name(), "p.q");
        assert!(!unit.has_errors);
        assert_eq!(unit.imports.len(), 1);
        assert_eq!(unit.imports[0].kind, ImportKind::Single);

        let a = &unit.types[unit.find_type("p.q.A").expect("A")];
        assert_eq!(a.kind, TypeKind::Class);
        assert_eq!(a.type_params[0].name, "T");
        assert_eq!(a.type_params[0].bounds[0].name, "Number");
        assert_eq!(a.superclass.as_ref().map(|s| s.name.as_str()), Some("B"));
        assert_eq!(a.interfaces[0].to_string(), "I<String>");
        assert_eq!(a.fields[0].name, "count");
        assert_eq!(a.constructors[0].params.len(), 1);
        let get = &a.methods[0];
        assert_eq!(get.name, "get");
        assert!(get.is_varargs());
        assert_eq!(get.params[0].ty.to_string(), "List<? super T>");
        assert_eq!(get.label(), "get(List<? super T>, String...)");
        assert!(unit.find_type("p.q.A.Inner").is_some());

        let i = &unit.types[unit.find_type("p.q.I").expect("I")];
        assert_eq!(i.kind, TypeKind::Interface);
        assert!(i.methods[0].modifiers.contains(Modifiers::ABSTRACT));

        let refs = type_refs(&unit, src);
        assert!(refs.contains(&("B", TypeRole::Supertype)));
        assert!(refs.contains(&("I", TypeRole::Supertype)));
        assert!(refs.contains(&("java.util.List", TypeRole::Import)));
    }

    #[test]
    fn records_calls_names_and_access() {
        let src = "class C {\n  int f;\n  void m(C other) {\n    f = 1;\n    other.f += 2;\n    int x = f;\n    other.run(x, \"s\");\n    new C().m(null);\n    super.toString();\n  }\n}\n";
        let unit = parse(src);
        let mut writes = 0;
        let mut read_writes = 0;
        let mut calls = Vec::new();
        for o in &unit.occurrences {
            match &o.kind {
                OccurrenceKind::Name { name, access, .. } if name == "f" => match access {
                    Access::Write => writes += 1,
                    Access::ReadWrite => read_writes += 1,
                    Access::Read => {}
                },
                OccurrenceKind::MethodCall {
                    selector,
                    receiver,
                    args,
                } => calls.push((selector.clone(), receiver.clone(), args.clone())),
                _ => {}
            }
        }
        assert_eq!(writes, 1);
        assert_eq!(read_writes, 1);
        let run = calls.iter().find(|c| c.0 == "run").expect("run call");
        assert_eq!(run.2.len(), 2);
        assert_eq!(run.2[1], Expr::Literal("java.lang.String".into()));
        let m = calls.iter().find(|c| c.0 == "m").expect("m call");
        assert_eq!(m.1, Some(Expr::New(TypeSig::simple("C"))));
        let sup = calls.iter().find(|c| c.0 == "toString").expect("super call");
        assert!(sup.1.as_ref().map(|r| r.is_super()).unwrap_or(false));

        let body = unit.types[0].methods[0].body;
        assert_eq!(
            unit.local(body, "x"),
            Some(&Some(TypeSig::simple("int")))
        );
        assert_eq!(unit.local(body, "other"), Some(&Some(TypeSig::simple("C"))));
    }

    #[test]
    fn anonymous_types_and_enum_constants() {
        let src = "enum Color { RED(1), GREEN(2) { }; Color(int v) {} }\nclass U { Runnable r = new Runnable() { public void run() {} }; }\n";
        let unit = parse(src);
        let color = &unit.types[unit.find_type("Color").expect("Color")];
        assert_eq!(color.kind, TypeKind::Enum);
        assert_eq!(color.fields.len(), 2);
        assert!(color.fields.iter().all(|f| f.enum_constant));
        let enum_ctor_calls = unit
            .occurrences
            .iter()
            .filter(|o| {
                matches!(
                    o.kind,
                    OccurrenceKind::ConstructorCall {
                        form: CtorForm::EnumConstant,
                        ..
                    }
                )
            })
            .count();
        assert_eq!(enum_ctor_calls, 2);
        let anon: Vec<&TypeDecl> = unit.types.iter().filter(|t| t.anonymous).collect();
        assert_eq!(anon.len(), 2);
        assert!(anon.iter().any(|t| t.qualified == "U$1"));
    }

    #[test]
    fn syntax_errors_still_yield_declarations() {
        let src = "class Broken { void ok() {} void bad( { }\n";
        let unit = parse(src);
        assert!(unit.has_errors);
        assert!(unit.find_type("Broken").is_some());
    }

    #[test]
    fn javadoc_links_are_flagged() {
        let src = "class D {\n  /** Uses {@link D#go(int)}. */\n  void go(int x) {}\n}\n";
        let unit = parse(src);
        let doc: Vec<&Occurrence> = unit.occurrences.iter().filter(|o| o.in_javadoc).collect();
        assert_eq!(doc.len(), 2);
        assert!(doc.iter().any(|o| o.range.text(src) == "go"));
    }

    #[test]
    fn javadoc_belongs_to_the_declaration_it_precedes() {
        let src = "class A {\n  void m() {}\n  /** See {@link #m()}. */\n  void doc() {}\n  /** {@link A} */\n  int f;\n  /** {@link #m()} */\n  static class In {}\n  /** dangling {@link #m()} */\n}\n/** {@link A} */\nclass B {}\n";
        let unit = parse(src);
        let labels: Vec<Vec<String>> = unit
            .occurrences
            .iter()
            .filter(|o| o.in_javadoc)
            .map(|o| unit.enclosing_labels(&o.ctx))
            .collect();
        assert_eq!(
            labels,
            vec![
                vec!["A", "doc()"],
                vec!["A", "f"],
                vec!["A", "In"],
                vec!["A"],
                vec!["B"],
            ]
        );
    }
}
