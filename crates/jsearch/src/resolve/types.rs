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

use std::collections::HashMap;
use std::fmt;

use crate::syntax::{TypeKind, WildcardBound};

/// A type after name resolution.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResolvedType {
    Primitive(String),
    Declared {
        qualified: String,
        /// `None` when no argument list applies (raw or non-generic).
        args: Option<Vec<ResolvedType>>,
    },
    TypeVar {
        name: String,
        bound: Box<ResolvedType>,
    },
    Wildcard(Option<(WildcardBound, Box<ResolvedType>)>),
    Array(Box<ResolvedType>),
    Null,
    /// Could not be resolved; keeps the name as written.
    Unknown(String),
}

pub const OBJECT: &str = "java.lang.Object";

impl ResolvedType {
    pub fn declared(qualified: impl Into<String>) -> Self {
        ResolvedType::Declared {
            qualified: qualified.into(),
            args: None,
        }
    }

    pub fn object() -> Self {
        Self::declared(OBJECT)
    }

    pub fn is_unknown(&self) -> bool {
        match self {
            ResolvedType::Unknown(_) => true,
            ResolvedType::Array(e) => e.is_unknown(),
            _ => false,
        }
    }

    /// Qualified name of a declared type (or of its erasure for type variables).
    pub fn qualified(&self) -> Option<&str> {
        match self {
            ResolvedType::Declared { qualified, .. } => Some(qualified),
            ResolvedType::TypeVar { bound, .. } => bound.qualified(),
            _ => None,
        }
    }

    pub fn args(&self) -> Option<&[ResolvedType]> {
        match self {
            ResolvedType::Declared { args: Some(a), .. } => Some(a),
            _ => None,
        }
    }

    pub fn erasure(&self) -> ResolvedType {
        match self {
            ResolvedType::Declared { qualified, .. } => ResolvedType::declared(qualified.clone()),
            ResolvedType::TypeVar { bound, .. } => bound.erasure(),
            ResolvedType::Wildcard(Some((WildcardBound::Extends, b))) => b.erasure(),
            ResolvedType::Wildcard(_) => ResolvedType::object(),
            ResolvedType::Array(e) => ResolvedType::Array(Box::new(e.erasure())),
            other => other.clone(),
        }
    }

    /// Erased name as used in method identities: `java.lang.String[]`.
    pub fn erased_name(&self) -> String {
        match self.erasure() {
            ResolvedType::Primitive(p) => p,
            ResolvedType::Declared { qualified, .. } => qualified,
            ResolvedType::Array(e) => format!("{}[]", e.erased_name()),
            ResolvedType::Null => "null".to_string(),
            ResolvedType::Unknown(n) => n,
            _ => OBJECT.to_string(),
        }
    }

    /// Simple name of the erasure, used when comparing against unqualified
    /// textual patterns.
    pub fn erased_simple_name(&self) -> String {
        let full = self.erased_name();
        let dims = full.matches("[]").count();
        let base = full.trim_end_matches("[]");
        let simple = base.rsplit('.').next().unwrap_or(base);
        format!("{}{}", simple, "[]".repeat(dims))
    }

    pub fn substitute(&self, map: &HashMap<String, ResolvedType>) -> ResolvedType {
        if map.is_empty() {
            return self.clone();
        }
        match self {
            ResolvedType::TypeVar { name, .. } => map.get(name).cloned().unwrap_or_else(|| self.clone()),
            ResolvedType::Declared { qualified, args } => ResolvedType::Declared {
                qualified: qualified.clone(),
                args: args
                    .as_ref()
                    .map(|a| a.iter().map(|t| t.substitute(map)).collect()),
            },
            ResolvedType::Wildcard(Some((b, t))) => {
                ResolvedType::Wildcard(Some((*b, Box::new(t.substitute(map)))))
            }
            ResolvedType::Array(e) => ResolvedType::Array(Box::new(e.substitute(map))),
            other => other.clone(),
        }
    }
}

impl fmt::Display for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedType::Primitive(p) => f.write_str(p),
            ResolvedType::Declared { qualified, args } => {
                f.write_str(qualified)?;
                if let Some(args) = args {
                    let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    write!(f, "<{}>", parts.join(", "))?;
                }
                Ok(())
            }
            ResolvedType::TypeVar { name, .. } => f.write_str(name),
            ResolvedType::Wildcard(None) => f.write_str("?"),
            ResolvedType::Wildcard(Some((WildcardBound::Extends, t))) => write!(f, "? extends {}", t),
            ResolvedType::Wildcard(Some((WildcardBound::Super, t))) => write!(f, "? super {}", t),
            ResolvedType::Array(e) => write!(f, "{}[]", e),
            ResolvedType::Null => f.write_str("null"),
            ResolvedType::Unknown(n) => write!(f, "{}?", n),
        }
    }
}

/// Types every compilation unit sees through the implicit `java.lang.*`
/// import, for corpora that do not include the platform library.
pub const JAVA_LANG: &[(&str, TypeKind)] = &[
    ("Object", TypeKind::Class),
    ("String", TypeKind::Class),
    ("StringBuilder", TypeKind::Class),
    ("Class", TypeKind::Class),
    ("Integer", TypeKind::Class),
    ("Long", TypeKind::Class),
    ("Short", TypeKind::Class),
    ("Byte", TypeKind::Class),
    ("Character", TypeKind::Class),
    ("Boolean", TypeKind::Class),
    ("Double", TypeKind::Class),
    ("Float", TypeKind::Class),
    ("Number", TypeKind::Class),
    ("Math", TypeKind::Class),
    ("System", TypeKind::Class),
    ("Thread", TypeKind::Class),
    ("Enum", TypeKind::Class),
    ("Record", TypeKind::Class),
    ("Void", TypeKind::Class),
    ("Throwable", TypeKind::Class),
    ("Exception", TypeKind::Class),
    ("Error", TypeKind::Class),
    ("RuntimeException", TypeKind::Class),
    ("IllegalArgumentException", TypeKind::Class),
    ("IllegalStateException", TypeKind::Class),
    ("NullPointerException", TypeKind::Class),
    ("UnsupportedOperationException", TypeKind::Class),
    ("IndexOutOfBoundsException", TypeKind::Class),
    ("ClassCastException", TypeKind::Class),
    ("InterruptedException", TypeKind::Class),
    ("CloneNotSupportedException", TypeKind::Class),
    ("Runnable", TypeKind::Interface),
    ("Comparable", TypeKind::Interface),
    ("CharSequence", TypeKind::Interface),
    ("Iterable", TypeKind::Interface),
    ("AutoCloseable", TypeKind::Interface),
    ("Cloneable", TypeKind::Interface),
    ("Override", TypeKind::Annotation),
    ("Deprecated", TypeKind::Annotation),
    ("SuppressWarnings", TypeKind::Annotation),
    ("FunctionalInterface", TypeKind::Annotation),
    ("SafeVarargs", TypeKind::Annotation),
];

pub fn java_lang_kind(simple: &str) -> Option<TypeKind> {
    JAVA_LANG
        .iter()
        .find(|(n, _)| *n == simple)
        .map(|(_, k)| *k)
}

const PRIMITIVE_WIDENING: &[(&str, &[&str])] = &[
    ("byte", &["short", "int", "long", "float", "double"]),
    ("short", &["int", "long", "float", "double"]),
    ("char", &["int", "long", "float", "double"]),
    ("int", &["long", "float", "double"]),
    ("long", &["float", "double"]),
    ("float", &["double"]),
];

pub fn widens_to(from: &str, to: &str) -> bool {
    from == to
        || PRIMITIVE_WIDENING
            .iter()
            .any(|(f, targets)| *f == from && targets.contains(&to))
}

pub fn boxed(primitive: &str) -> Option<&'static str> {
    Some(match primitive {
        "int" => "java.lang.Integer",
        "long" => "java.lang.Long",
        "short" => "java.lang.Short",
        "byte" => "java.lang.Byte",
        "char" => "java.lang.Character",
        "boolean" => "java.lang.Boolean",
        "double" => "java.lang.Double",
        "float" => "java.lang.Float",
        _ => return None,
    })
}

pub fn unboxed(qualified: &str) -> Option<&'static str> {
    Some(match qualified {
        "java.lang.Integer" => "int",
        "java.lang.Long" => "long",
        "java.lang.Short" => "short",
        "java.lang.Byte" => "byte",
        "java.lang.Character" => "char",
        "java.lang.Boolean" => "boolean",
        "java.lang.Double" => "double",
        "java.lang.Float" => "float",
        _ => return None,
    })
}
