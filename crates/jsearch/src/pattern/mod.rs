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

//! Immutable query descriptors.
//!
//! A [`Pattern`] is either textual (name fragments compared under a
//! [`MatchRule`]) or bound to a resolved [`Focus`] compared by identity.
//! Composite patterns combine two patterns of the same element family.

pub mod parse;
pub mod rule;

pub use rule::{camel_case_match, glob_match, has_wildcards, MatchRule, NameMatcher};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::resolve::ResolvedType;
use crate::syntax::{TypeArg, TypeKind, TypeSig};

/// Restricts type patterns to some declaration kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeFilter {
    Any,
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
    ClassOrInterface,
    ClassOrEnum,
    InterfaceOrAnnotation,
}

impl TypeFilter {
    pub fn accepts(self, kind: TypeKind) -> bool {
        use TypeKind as K;
        match self {
            TypeFilter::Any => true,
            TypeFilter::Class => kind == K::Class,
            TypeFilter::Interface => kind == K::Interface,
            TypeFilter::Enum => kind == K::Enum,
            TypeFilter::Annotation => kind == K::Annotation,
            TypeFilter::Record => kind == K::Record,
            TypeFilter::ClassOrInterface => matches!(kind, K::Class | K::Interface),
            TypeFilter::ClassOrEnum => matches!(kind, K::Class | K::Enum),
            TypeFilter::InterfaceOrAnnotation => matches!(kind, K::Interface | K::Annotation),
        }
    }
}

impl FromStr for TypeFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "any" | "type" => TypeFilter::Any,
            "class" => TypeFilter::Class,
            "interface" => TypeFilter::Interface,
            "enum" => TypeFilter::Enum,
            "annotation" | "annotation-type" => TypeFilter::Annotation,
            "record" => TypeFilter::Record,
            "class-or-interface" => TypeFilter::ClassOrInterface,
            "class-or-enum" => TypeFilter::ClassOrEnum,
            "interface-or-annotation" => TypeFilter::InterfaceOrAnnotation,
            other => return Err(format!("unknown type filter '{}'", other)),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Type(TypeFilter),
    Method,
    Field,
    Constructor,
    Package,
    AnnotationElement,
    Module,
}

impl ElementKind {
    /// Kinds that may be combined with AND/OR.
    pub fn same_family(self, other: ElementKind) -> bool {
        std::mem::discriminant(&self) == std::mem::discriminant(&other)
    }
}

impl FromStr for ElementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "method" => ElementKind::Method,
            "field" => ElementKind::Field,
            "constructor" | "ctor" => ElementKind::Constructor,
            "package" => ElementKind::Package,
            "annotation-element" | "element" => ElementKind::AnnotationElement,
            "module" => ElementKind::Module,
            other => ElementKind::Type(other.parse()?),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LimitTo {
    Declarations,
    References,
    All,
    Implementors,
    ReadAccesses,
    WriteAccesses,
}

impl LimitTo {
    pub fn wants_declarations(self) -> bool {
        matches!(self, LimitTo::Declarations | LimitTo::All)
    }

    pub fn wants_references(self) -> bool {
        !matches!(self, LimitTo::Declarations)
    }
}

impl FromStr for LimitTo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "declarations" | "decl" => LimitTo::Declarations,
            "references" | "refs" => LimitTo::References,
            "all" | "all-occurrences" => LimitTo::All,
            "implementors" => LimitTo::Implementors,
            "read" | "read-accesses" => LimitTo::ReadAccesses,
            "write" | "write-accesses" => LimitTo::WriteAccesses,
            other => return Err(format!("unknown limit-to '{}'", other)),
        })
    }
}

/// Identity of a method or constructor: declaring type, name and erased
/// parameter types.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MethodId {
    pub declaring: String,
    pub name: String,
    pub params: Vec<String>,
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.declaring, self.name, self.params.join(", "))
    }
}

/// A resolved declaration seeding a bound pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Focus {
    Type {
        qualified: String,
        /// Type arguments the reference must agree with; `None` for the
        /// generic declaration itself.
        args: Option<Vec<ResolvedType>>,
    },
    Method(MethodId),
    Field {
        declaring: String,
        name: String,
    },
    Constructor(MethodId),
    Package(String),
    AnnotationElement {
        annotation: String,
        element: String,
    },
    Module(String),
}

impl Focus {
    pub fn kind(&self) -> ElementKind {
        match self {
            Focus::Type { .. } => ElementKind::Type(TypeFilter::Any),
            Focus::Method(_) => ElementKind::Method,
            Focus::Field { .. } => ElementKind::Field,
            Focus::Constructor(_) => ElementKind::Constructor,
            Focus::Package(_) => ElementKind::Package,
            Focus::AnnotationElement { .. } => ElementKind::AnnotationElement,
            Focus::Module(_) => ElementKind::Module,
        }
    }

    /// Simple name used for index lookup.
    pub fn simple_name(&self) -> &str {
        let last = |s: &'_ str| -> usize { s.rfind('.').map(|i| i + 1).unwrap_or(0) };
        match self {
            Focus::Type { qualified, .. } => &qualified[last(qualified)..],
            Focus::Method(m) => &m.name,
            Focus::Constructor(m) => &m.declaring[last(&m.declaring)..],
            Focus::Field { name, .. } => name,
            Focus::Package(p) | Focus::Module(p) => p,
            Focus::AnnotationElement { element, .. } => element,
        }
    }
}

/// Textual type name: optional qualification, simple name, optional
/// type arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeFragments {
    pub qualification: Option<String>,
    pub simple: String,
    pub args: Option<Vec<TypeArg>>,
}

impl TypeFragments {
    pub fn qualified(&self) -> String {
        match &self.qualification {
            Some(q) => format!("{}.{}", q, self.simple),
            None => self.simple.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fragments {
    Type(TypeFragments),
    Method {
        declaring: Option<String>,
        selector: String,
        params: Option<Vec<TypeSig>>,
        return_type: Option<TypeSig>,
    },
    Field {
        declaring: Option<String>,
        name: String,
        ty: Option<TypeSig>,
    },
    Constructor {
        qualification: Option<String>,
        simple: String,
        params: Option<Vec<TypeSig>>,
    },
    Package(String),
    AnnotationElement {
        annotation: Option<String>,
        element: String,
    },
    Module(String),
}

impl Fragments {
    /// The fragment the match rule applies to.
    pub fn main_name(&self) -> &str {
        match self {
            Fragments::Type(t) => &t.simple,
            Fragments::Method { selector, .. } => selector,
            Fragments::Field { name, .. } => name,
            Fragments::Constructor { simple, .. } => simple,
            Fragments::Package(p) | Fragments::Module(p) => p,
            Fragments::AnnotationElement { element, .. } => element,
        }
    }

    fn set_main_name(&mut self, name: String) {
        match self {
            Fragments::Type(t) => t.simple = name,
            Fragments::Method { selector, .. } => *selector = name,
            Fragments::Field { name: n, .. } => *n = name,
            Fragments::Constructor { simple, .. } => *simple = name,
            Fragments::Package(p) | Fragments::Module(p) => *p = name,
            Fragments::AnnotationElement { element, .. } => *element = name,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    Textual {
        kind: ElementKind,
        limit_to: LimitTo,
        fragments: Fragments,
        rule: MatchRule,
    },
    Bound {
        kind: ElementKind,
        limit_to: LimitTo,
        focus: Focus,
        rule: MatchRule,
        /// Method declarations: report the focus and every override.
        ignore_declaring_type: bool,
    },
    And(Box<Pattern>, Box<Pattern>),
    Or(Box<Pattern>, Box<Pattern>),
}

impl Pattern {
    /// Build a textual pattern. The rule is normalized against the main
    /// name fragment, never rejected.
    pub fn textual(kind: ElementKind, limit_to: LimitTo, mut fragments: Fragments, rule: MatchRule) -> Self {
        let (rule, name) = rule.normalize(fragments.main_name());
        fragments.set_main_name(name);
        Pattern::Textual {
            kind,
            limit_to,
            fragments,
            rule,
        }
    }

    /// Parse `text` for the given element kind, e.g. `p.A.foo(int, String) void`.
    pub fn parse(text: &str, kind: ElementKind, limit_to: LimitTo, rule: MatchRule) -> Self {
        Self::textual(kind, limit_to, parse::fragments(text, kind), rule)
    }

    pub fn bound(focus: Focus, limit_to: LimitTo, rule: MatchRule) -> Self {
        let (rule, _) = rule.normalize(focus.simple_name());
        Pattern::Bound {
            kind: focus.kind(),
            limit_to,
            focus,
            rule,
            ignore_declaring_type: false,
        }
    }

    pub fn ignoring_declaring_type(mut self) -> Self {
        if let Pattern::Bound {
            ignore_declaring_type,
            ..
        } = &mut self
        {
            *ignore_declaring_type = true;
        }
        self
    }

    /// Narrow a type pattern to some declaration kinds.
    pub fn with_type_filter(mut self, filter: TypeFilter) -> Self {
        match &mut self {
            Pattern::Textual { kind, .. } | Pattern::Bound { kind, .. } => {
                if let ElementKind::Type(f) = kind {
                    *f = filter;
                }
            }
            Pattern::And(a, b) | Pattern::Or(a, b) => {
                **a = a.as_ref().clone().with_type_filter(filter);
                **b = b.as_ref().clone().with_type_filter(filter);
            }
        }
        self
    }

    pub fn and(a: Pattern, b: Pattern) -> Self {
        Pattern::And(Box::new(a), Box::new(b))
    }

    pub fn or(a: Pattern, b: Pattern) -> Self {
        Pattern::Or(Box::new(a), Box::new(b))
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Pattern::Textual { kind, .. } | Pattern::Bound { kind, .. } => *kind,
            Pattern::And(a, _) | Pattern::Or(a, _) => a.kind(),
        }
    }

    /// Leaf patterns in evaluation order.
    pub fn leaves(&self) -> Vec<&Pattern> {
        match self {
            Pattern::And(a, b) | Pattern::Or(a, b) => {
                let mut v = a.leaves();
                v.extend(b.leaves());
                v
            }
            leaf => vec![leaf],
        }
    }

    /// Composite patterns must combine a single element family.
    pub fn is_well_formed(&self) -> bool {
        let leaves = self.leaves();
        let first = self.kind();
        leaves.iter().all(|l| l.kind().same_family(first))
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Textual {
                kind,
                limit_to,
                fragments,
                rule,
            } => write!(
                f,
                "{:?} {:?} '{}' {:?}",
                kind,
                limit_to,
                fragments.main_name(),
                rule
            ),
            Pattern::Bound {
                kind,
                limit_to,
                focus,
                rule,
                ..
            } => write!(f, "{:?} {:?} <{:?}> {:?}", kind, limit_to, focus, rule),
            Pattern::And(a, b) => write!(f, "({} AND {})", a, b),
            Pattern::Or(a, b) => write!(f, "({} OR {})", a, b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textual_rule_is_normalized() {
        let p = Pattern::parse("", ElementKind::Method, LimitTo::Declarations, MatchRule::EXACT);
        match p {
            Pattern::Textual {
                fragments, rule, ..
            } => {
                assert_eq!(fragments.main_name(), "*");
                assert!(rule.contains(MatchRule::PATTERN));
            }
            _ => panic!("textual expected"),
        }
    }

    #[test]
    fn kinds_and_filters_parse() {
        assert_eq!("method".parse::<ElementKind>(), Ok(ElementKind::Method));
        assert_eq!(
            "annotation".parse::<ElementKind>(),
            Ok(ElementKind::Type(TypeFilter::Annotation))
        );
        assert_eq!("refs".parse::<LimitTo>(), Ok(LimitTo::References));
        assert!("bogus".parse::<LimitTo>().is_err());
        assert!(TypeFilter::ClassOrEnum.accepts(TypeKind::Enum));
        assert!(!TypeFilter::ClassOrEnum.accepts(TypeKind::Interface));
    }

    #[test]
    fn composite_family_check() {
        let a = Pattern::parse("A", ElementKind::Type(TypeFilter::Any), LimitTo::References, MatchRule::EXACT);
        let b = Pattern::parse("B", ElementKind::Type(TypeFilter::Class), LimitTo::References, MatchRule::EXACT);
        let m = Pattern::parse("m", ElementKind::Method, LimitTo::References, MatchRule::EXACT);
        assert!(Pattern::or(a.clone(), b).is_well_formed());
        assert!(!Pattern::and(a, m).is_well_formed());
    }
}
