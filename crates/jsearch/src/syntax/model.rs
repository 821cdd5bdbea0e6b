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

//! Declarations and occurrences extracted from one document.
//!
//! Types are stored flattened: nested, local and anonymous types point at
//! their parent by index. Occurrences carry a [`Context`] naming the type,
//! member and body they appear in so the resolver can rebuild lexical scope.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::types::TextRange;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers(pub u16);

impl Modifiers {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const ABSTRACT: u16 = 0x0020;
    pub const DEFAULT: u16 = 0x0040;
    pub const NATIVE: u16 = 0x0080;
    pub const SYNCHRONIZED: u16 = 0x0100;
    pub const DEPRECATED: u16 = 0x0200;

    pub fn contains(&self, bit: u16) -> bool {
        self.0 & bit != 0
    }

    pub fn insert(&mut self, bit: u16) {
        self.0 |= bit;
    }

    pub fn from_keyword(kw: &str) -> Option<u16> {
        Some(match kw {
            "public" => Self::PUBLIC,
            "private" => Self::PRIVATE,
            "protected" => Self::PROTECTED,
            "static" => Self::STATIC,
            "final" => Self::FINAL,
            "abstract" => Self::ABSTRACT,
            "default" => Self::DEFAULT,
            "native" => Self::NATIVE,
            "synchronized" => Self::SYNCHRONIZED,
            _ => return None,
        })
    }

    pub fn is_static(&self) -> bool {
        self.contains(Self::STATIC)
    }

    pub fn is_private(&self) -> bool {
        self.contains(Self::PRIVATE)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
}

impl TypeKind {
    pub fn code(self) -> u8 {
        match self {
            TypeKind::Class => b'C',
            TypeKind::Interface => b'I',
            TypeKind::Enum => b'E',
            TypeKind::Annotation => b'A',
            TypeKind::Record => b'R',
        }
    }

    pub fn from_code(c: u8) -> Option<Self> {
        Some(match c {
            b'C' => TypeKind::Class,
            b'I' => TypeKind::Interface,
            b'E' => TypeKind::Enum,
            b'A' => TypeKind::Annotation,
            b'R' => TypeKind::Record,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WildcardBound {
    Extends,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeArg {
    Type(TypeSig),
    Wildcard(Option<(WildcardBound, TypeSig)>),
}

/// A type as written: dotted name, optional argument list and array rank.
///
/// `args == None` means no argument list was written (raw or non-generic);
/// `Some(vec![])` is the diamond.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSig {
    pub name: String,
    pub args: Option<Vec<TypeArg>>,
    pub dims: u8,
}

const PRIMITIVES: &[&str] = &[
    "boolean", "byte", "char", "short", "int", "long", "float", "double", "void",
];

impl TypeSig {
    pub fn simple(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: None,
            dims: 0,
        }
    }

    pub fn with_args(mut self, args: Vec<TypeArg>) -> Self {
        self.args = Some(args);
        self
    }

    pub fn array(mut self, dims: u8) -> Self {
        self.dims = self.dims.saturating_add(dims);
        self
    }

    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    pub fn is_qualified(&self) -> bool {
        self.name.contains('.')
    }

    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.contains(&self.name.as_str())
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(args) = &self.args {
            f.write_str("<")?;
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}", a)?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.dims {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

impl fmt::Display for TypeArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeArg::Type(t) => write!(f, "{}", t),
            TypeArg::Wildcard(None) => f.write_str("?"),
            TypeArg::Wildcard(Some((WildcardBound::Extends, t))) => write!(f, "? extends {}", t),
            TypeArg::Wildcard(Some((WildcardBound::Super, t))) => write!(f, "? super {}", t),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeParam {
    pub name: String,
    pub bounds: Vec<TypeSig>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: TypeSig,
    pub varargs: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDecl {
    pub name: String,
    pub name_range: Option<TextRange>,
    pub modifiers: Modifiers,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,
    /// `None` for constructors.
    pub return_type: Option<TypeSig>,
    pub body: Option<usize>,
    pub is_constructor: bool,
}

impl MethodDecl {
    pub fn is_varargs(&self) -> bool {
        self.params.last().map(|p| p.varargs).unwrap_or(false)
    }

    /// Whether a call with `n` arguments could bind to this declaration.
    pub fn accepts_arity(&self, n: usize) -> bool {
        if self.is_varargs() {
            n + 1 >= self.params.len()
        } else {
            n == self.params.len()
        }
    }

    pub fn label(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| {
                if p.varargs {
                    let mut t = p.ty.clone();
                    t.dims = t.dims.saturating_sub(1);
                    format!("{}...", t)
                } else {
                    p.ty.to_string()
                }
            })
            .collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: String,
    pub name_range: Option<TextRange>,
    pub ty: TypeSig,
    pub modifiers: Modifiers,
    pub enum_constant: bool,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    /// Empty for anonymous types.
    pub name: String,
    pub qualified: String,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    pub name_range: Option<TextRange>,
    pub parent: Option<usize>,
    pub anonymous: bool,
    pub type_params: Vec<TypeParam>,
    pub superclass: Option<TypeSig>,
    pub interfaces: Vec<TypeSig>,
    /// Methods, including annotation type elements.
    pub methods: Vec<MethodDecl>,
    pub constructors: Vec<MethodDecl>,
    pub fields: Vec<FieldDecl>,
    pub member_types: Vec<usize>,
}

impl TypeDecl {
    pub fn new(name: impl Into<String>, qualified: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            qualified: qualified.into(),
            kind,
            modifiers: Modifiers::default(),
            name_range: None,
            parent: None,
            anonymous: false,
            type_params: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            fields: Vec::new(),
            member_types: Vec::new(),
        }
    }

    /// Supertypes as written, superclass first.
    pub fn supertypes(&self) -> impl Iterator<Item = &TypeSig> {
        self.superclass.iter().chain(self.interfaces.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Single,
    OnDemand,
    Static,
    StaticOnDemand,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub name: String,
    pub kind: ImportKind,
    pub range: TextRange,
}

impl Import {
    /// Last segment of a single or static import.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Everything before the last segment.
    pub fn qualifier(&self) -> &str {
        match self.name.rfind('.') {
            Some(i) => &self.name[..i],
            None => "",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NamedDecl {
    pub name: String,
    pub range: Option<TextRange>,
}

/// Lexical variable scope of a member body. Bodies nest for anonymous and
/// local classes, which capture their enclosing locals.
#[derive(Debug, Clone, Default)]
pub struct Body {
    pub parent: Option<usize>,
    /// `None` type for lambda parameters and uninferred `var`.
    pub locals: HashMap<String, Option<TypeSig>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberRef {
    Method(usize),
    Constructor(usize),
    Field(usize),
    Initializer,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Context {
    pub owner: Option<usize>,
    pub member: Option<MemberRef>,
    pub body: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathBase {
    None,
    This,
    Super,
}

/// Just enough of an expression to recover its static type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// `a`, `a.b.c`, `this.f`, `super`.
    Path {
        base: PathBase,
        segments: Vec<String>,
    },
    /// Field read on a non-path target such as `call().f`.
    Field { target: Box<Expr>, name: String },
    Call {
        receiver: Option<Box<Expr>>,
        selector: String,
        args: Vec<Expr>,
    },
    New(TypeSig),
    Cast(TypeSig),
    /// Literal of the named type (`int`, `java.lang.String`, ...).
    Literal(String),
    Null,
    Unknown,
}

impl Expr {
    pub fn is_super(&self) -> bool {
        matches!(self, Expr::Path { base: PathBase::Super, segments } if segments.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeRole {
    Supertype,
    Annotation,
    Import,
    Declaration,
    Expression,
    TypeArgument,
    Throws,
    Javadoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CtorForm {
    New,
    This,
    Super,
    EnumConstant,
    /// `Type::new`; argument count unknown.
    Reference,
}

#[derive(Debug, Clone)]
pub enum OccurrenceKind {
    TypeRef {
        sig: TypeSig,
        role: TypeRole,
        /// Ranges of each proper dotted prefix of a qualified name, shortest first.
        prefixes: Vec<TextRange>,
    },
    /// Identifier in expression position: local, field, type or package.
    Name {
        name: String,
        qualifier: Option<Expr>,
        access: Access,
    },
    MethodCall {
        selector: String,
        receiver: Option<Expr>,
        args: Vec<Expr>,
    },
    /// `Type::name` or `expr::name`.
    MethodRef {
        selector: String,
        receiver: Option<Expr>,
        receiver_type: Option<TypeSig>,
    },
    ConstructorCall {
        sig: TypeSig,
        args: Vec<Expr>,
        form: CtorForm,
    },
    AnnotationElement {
        annotation: TypeSig,
        element: String,
    },
    PackageRef {
        name: String,
    },
    /// `#member` part of a javadoc link.
    DocMemberRef {
        owner: Option<TypeSig>,
        name: String,
        params: Option<Vec<TypeSig>>,
    },
    StaticImport {
        owner: String,
        member: String,
    },
    ModuleRef {
        name: String,
    },
}

#[derive(Debug, Clone)]
pub struct Occurrence {
    pub kind: OccurrenceKind,
    pub range: TextRange,
    pub ctx: Context,
    pub in_javadoc: bool,
}

/// Everything the engine knows about one document.
#[derive(Debug, Clone, Default)]
pub struct CompilationUnit {
    pub package: Option<NamedDecl>,
    pub module: Option<NamedDecl>,
    pub imports: Vec<Import>,
    pub types: Vec<TypeDecl>,
    pub bodies: Vec<Body>,
    pub occurrences: Vec<Occurrence>,
    pub has_errors: bool,
    pub has_source: bool,
}

impl CompilationUnit {
    pub fn package_name(&self) -> &str {
        self.package.as_ref().map(|p| p.name.as_str()).unwrap_or("")
    }

    pub fn top_level_types(&self) -> impl Iterator<Item = (usize, &TypeDecl)> {
        self.types
            .iter()
            .enumerate()
            .filter(|(_, t)| t.parent.is_none() && !t.anonymous)
    }

    pub fn find_type(&self, qualified: &str) -> Option<usize> {
        self.types.iter().position(|t| t.qualified == qualified)
    }

    /// Indices from the outermost type down to `idx`.
    pub fn type_chain(&self, idx: usize) -> Vec<usize> {
        let mut chain = vec![idx];
        let mut cur = self.types.get(idx).and_then(|t| t.parent);
        while let Some(p) = cur {
            chain.push(p);
            cur = self.types.get(p).and_then(|t| t.parent);
        }
        chain.reverse();
        chain
    }

    pub fn member_label(&self, owner: usize, member: MemberRef) -> Option<String> {
        let t = self.types.get(owner)?;
        Some(match member {
            MemberRef::Method(i) => t.methods.get(i)?.label(),
            MemberRef::Constructor(i) => t.constructors.get(i)?.label(),
            MemberRef::Field(i) => t.fields.get(i)?.name.clone(),
            MemberRef::Initializer => "{...}".to_string(),
        })
    }

    fn type_label(&self, idx: usize) -> String {
        let t = &self.types[idx];
        if t.anonymous {
            let sup = t
                .superclass
                .as_ref()
                .map(|s| s.simple_name().to_string())
                .unwrap_or_default();
            format!("new {}() {{...}}", sup)
        } else {
            t.name.clone()
        }
    }

    /// Enclosing declaration chain for an occurrence context, outermost first.
    pub fn enclosing_labels(&self, ctx: &Context) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(owner) = ctx.owner {
            for idx in self.type_chain(owner) {
                out.push(self.type_label(idx));
            }
            if let Some(member) = ctx.member {
                if let Some(label) = self.member_label(owner, member) {
                    out.push(label);
                }
            }
        }
        out
    }

    /// Look a local up through the body chain.
    pub fn local(&self, body: Option<usize>, name: &str) -> Option<&Option<TypeSig>> {
        let mut cur = body;
        while let Some(b) = cur {
            let body = self.bodies.get(b)?;
            if let Some(t) = body.locals.get(name) {
                return Some(t);
            }
            cur = body.parent;
        }
        None
    }
}
