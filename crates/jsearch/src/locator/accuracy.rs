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

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::pattern::MatchRule;
use crate::resolve::ResolvedType;
use crate::syntax::{TypeArg, TypeSig, WildcardBound};

/// Confidence of a reported match, strongest first.
///
/// The derived order makes a stronger tier compare smaller, so `min` picks
/// the better of two tiers and `max` the weaker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Accuracy {
    Exact,
    Equivalent,
    Erasure,
    EquivalentRaw,
    ErasureRaw,
    Potential,
}

impl Accuracy {
    /// Demote a tier for raw-type involvement.
    pub fn with_raw(self) -> Self {
        match self {
            Accuracy::Exact | Accuracy::Equivalent => Accuracy::EquivalentRaw,
            Accuracy::Erasure => Accuracy::ErasureRaw,
            other => other,
        }
    }

    /// Whether a match of this tier may be reported for a pattern with
    /// `rule`. `bound` tells a resolved focus from a textual pattern.
    pub fn accepted_by(self, rule: MatchRule, bound: bool) -> bool {
        let equivalent = rule.contains(MatchRule::EQUIVALENT) || rule.contains(MatchRule::ERASURE);
        let erasure = rule.contains(MatchRule::ERASURE);
        let raw = rule.contains(MatchRule::RAW);
        match self {
            Accuracy::Exact => true,
            Accuracy::Equivalent => equivalent,
            Accuracy::Erasure => erasure,
            Accuracy::EquivalentRaw => raw && equivalent,
            Accuracy::ErasureRaw => raw && erasure,
            Accuracy::Potential => !bound || rule.is_lenient_generics(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Accuracy::Exact => "exact",
            Accuracy::Equivalent => "equivalent",
            Accuracy::Erasure => "erasure",
            Accuracy::EquivalentRaw => "equivalent-raw",
            Accuracy::ErasureRaw => "erasure-raw",
            Accuracy::Potential => "potential",
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Agreement of two argument lists: a base tier plus whether a raw type
/// was involved anywhere.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Agreement {
    base: Accuracy,
    raw: bool,
}

impl Agreement {
    const EXACT: Agreement = Agreement {
        base: Accuracy::Exact,
        raw: false,
    };
    const EQUIVALENT: Agreement = Agreement {
        base: Accuracy::Equivalent,
        raw: false,
    };
    const ERASURE: Agreement = Agreement {
        base: Accuracy::Erasure,
        raw: false,
    };
    const RAW: Agreement = Agreement {
        base: Accuracy::Exact,
        raw: true,
    };

    fn join(self, other: Agreement) -> Agreement {
        Agreement {
            base: self.base.max(other.base),
            raw: self.raw || other.raw,
        }
    }

    fn at_least(self, base: Accuracy) -> Agreement {
        Agreement {
            base: self.base.max(base),
            raw: self.raw,
        }
    }

    fn tier(self) -> Accuracy {
        if self.raw {
            self.base.with_raw()
        } else {
            self.base
        }
    }
}

/// Tier of a reference whose type arguments are `found` against a focus
/// instantiated with `focus`. `found == None` is a raw reference and
/// `Some(&[])` the diamond.
pub fn compare_args(focus: &[ResolvedType], found: Option<&[ResolvedType]>) -> Accuracy {
    match found {
        None => Accuracy::EquivalentRaw,
        Some([]) => Accuracy::Equivalent,
        Some(found) => arg_lists(focus, found).tier(),
    }
}

fn arg_lists(focus: &[ResolvedType], found: &[ResolvedType]) -> Agreement {
    if focus.len() != found.len() {
        return Agreement::ERASURE;
    }
    focus
        .iter()
        .zip(found)
        .fold(Agreement::EXACT, |acc, (f, r)| acc.join(arg(f, r)))
}

fn arg(focus: &ResolvedType, found: &ResolvedType) -> Agreement {
    use ResolvedType as R;
    if focus == found {
        return Agreement::EXACT;
    }
    match (focus, found) {
        (R::Wildcard(None), _) | (_, R::Wildcard(None)) => Agreement::EQUIVALENT,
        (R::TypeVar { .. }, _) | (_, R::TypeVar { .. }) => Agreement::EQUIVALENT,
        (R::Wildcard(Some((bf, tf))), R::Wildcard(Some((br, tr)))) if bf == br => {
            arg(tf, tr).at_least(Accuracy::Equivalent)
        }
        (R::Wildcard(Some((WildcardBound::Extends, t))), other)
        | (other, R::Wildcard(Some((WildcardBound::Extends, t))))
            if t.qualified().is_some() && t.qualified() == other.qualified() =>
        {
            Agreement::EQUIVALENT
        }
        (
            R::Declared {
                qualified: q1,
                args: a1,
            },
            R::Declared {
                qualified: q2,
                args: a2,
            },
        ) if q1 == q2 => match (a1, a2) {
            (Some(_), None) => Agreement::RAW,
            (None, Some(_)) => Agreement::EQUIVALENT,
            (Some(x), Some(y)) => arg_lists(x, y),
            (None, None) => Agreement::EXACT,
        },
        (R::Array(a), R::Array(b)) => arg(a, b),
        _ => Agreement::ERASURE,
    }
}

/// Tier of a reference against type arguments written in a textual
/// pattern. Names compare qualified when the pattern qualifies them, by
/// simple name otherwise.
pub fn compare_textual_args(
    pattern: &[TypeArg],
    found: Option<&[ResolvedType]>,
    case_sensitive: bool,
) -> Accuracy {
    match found {
        None => Accuracy::EquivalentRaw,
        Some([]) => Accuracy::Equivalent,
        Some(found) => textual_lists(pattern, found, case_sensitive).tier(),
    }
}

fn textual_lists(pattern: &[TypeArg], found: &[ResolvedType], cs: bool) -> Agreement {
    if pattern.len() != found.len() {
        return Agreement::ERASURE;
    }
    pattern
        .iter()
        .zip(found)
        .fold(Agreement::EXACT, |acc, (p, r)| acc.join(textual_arg(p, r, cs)))
}

fn textual_arg(pattern: &TypeArg, found: &ResolvedType, cs: bool) -> Agreement {
    use ResolvedType as R;
    match (pattern, found) {
        (TypeArg::Wildcard(None), R::Wildcard(None)) => Agreement::EXACT,
        (TypeArg::Wildcard(None), _) | (_, R::Wildcard(None)) => Agreement::EQUIVALENT,
        (_, R::TypeVar { .. }) => Agreement::EQUIVALENT,
        (TypeArg::Wildcard(Some((bp, sig))), R::Wildcard(Some((br, t)))) if bp == br => {
            textual_sig(sig, t, cs)
        }
        (TypeArg::Wildcard(Some((_, sig))), other) => {
            if sig_names(sig, other, cs) {
                Agreement::EQUIVALENT
            } else {
                Agreement::ERASURE
            }
        }
        (TypeArg::Type(sig), other) => textual_sig(sig, other, cs),
    }
}

fn textual_sig(sig: &TypeSig, found: &ResolvedType, cs: bool) -> Agreement {
    let mut found = found;
    for _ in 0..sig.dims {
        match found {
            ResolvedType::Array(e) => found = e,
            _ => return Agreement::ERASURE,
        }
    }
    if matches!(found, ResolvedType::Array(_)) {
        return Agreement::ERASURE;
    }
    if !sig_names(sig, found, cs) {
        return Agreement::ERASURE;
    }
    match (&sig.args, found) {
        (Some(p), ResolvedType::Declared { args: Some(a), .. }) => textual_lists(p, a, cs),
        (Some(p), ResolvedType::Declared { args: None, .. }) if !p.is_empty() => Agreement::RAW,
        _ => Agreement::EXACT,
    }
}

fn sig_names(sig: &TypeSig, found: &ResolvedType, cs: bool) -> bool {
    let written = match found {
        ResolvedType::Primitive(p) => p.as_str(),
        ResolvedType::Declared { qualified, .. } => qualified.as_str(),
        ResolvedType::Unknown(n) => n.as_str(),
        _ => return false,
    };
    qualified_name_matches(&sig.name, written, cs)
}

/// `pattern` names `qualified` either fully or by a dotted suffix.
pub fn qualified_name_matches(pattern: &str, qualified: &str, cs: bool) -> bool {
    let eq = |a: &str, b: &str| {
        if cs {
            a == b
        } else {
            a.eq_ignore_ascii_case(b)
        }
    };
    if eq(pattern, qualified) {
        return true;
    }
    qualified.len() > pattern.len()
        && qualified.as_bytes()[qualified.len() - pattern.len() - 1] == b'.'
        && eq(&qualified[qualified.len() - pattern.len()..], pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(arg: ResolvedType) -> ResolvedType {
        ResolvedType::Declared {
            qualified: "java.util.List".into(),
            args: Some(vec![arg]),
        }
    }

    fn string() -> ResolvedType {
        ResolvedType::declared("java.lang.String")
    }

    #[test]
    fn tier_order_and_raw_demotion() {
        assert!(Accuracy::Exact < Accuracy::Equivalent);
        assert!(Accuracy::Erasure < Accuracy::EquivalentRaw);
        assert!(Accuracy::ErasureRaw < Accuracy::Potential);
        assert_eq!(Accuracy::Equivalent.with_raw(), Accuracy::EquivalentRaw);
        assert_eq!(Accuracy::Erasure.with_raw(), Accuracy::ErasureRaw);
        assert_eq!(Accuracy::Potential.with_raw(), Accuracy::Potential);
    }

    #[test]
    fn acceptance_is_monotone_in_rule_strictness() {
        let strict = MatchRule::EXACT;
        let equivalent = MatchRule::EQUIVALENT;
        let erasure = MatchRule::ERASURE | MatchRule::RAW;
        let all = [
            Accuracy::Exact,
            Accuracy::Equivalent,
            Accuracy::Erasure,
            Accuracy::EquivalentRaw,
            Accuracy::ErasureRaw,
            Accuracy::Potential,
        ];
        for t in all {
            if t.accepted_by(strict, true) {
                assert!(t.accepted_by(equivalent, true));
            }
            if t.accepted_by(equivalent, true) {
                assert!(t.accepted_by(erasure, true));
            }
        }
        assert!(!Accuracy::Potential.accepted_by(strict, true));
        assert!(Accuracy::Potential.accepted_by(strict, false));
        assert!(Accuracy::ErasureRaw.accepted_by(erasure, true));
    }

    #[test]
    fn bound_argument_comparison() {
        let focus = [string()];
        assert_eq!(compare_args(&focus, Some(&[string()])), Accuracy::Exact);
        assert_eq!(compare_args(&focus, None), Accuracy::EquivalentRaw);
        assert_eq!(compare_args(&focus, Some(&[])), Accuracy::Equivalent);
        assert_eq!(
            compare_args(&focus, Some(&[ResolvedType::Wildcard(None)])),
            Accuracy::Equivalent
        );
        assert_eq!(
            compare_args(&focus, Some(&[ResolvedType::declared("java.lang.Integer")])),
            Accuracy::Erasure
        );
        // raw nested inside a mismatch is the weakest typed tier
        let focus = [list_of(string()), string()];
        let found = [
            ResolvedType::declared("java.util.List"),
            ResolvedType::declared("java.lang.Integer"),
        ];
        assert_eq!(compare_args(&focus, Some(&found)), Accuracy::ErasureRaw);
    }

    #[test]
    fn textual_argument_comparison() {
        let pattern = [TypeArg::Type(TypeSig::simple("String"))];
        assert_eq!(
            compare_textual_args(&pattern, Some(&[string()]), true),
            Accuracy::Exact
        );
        assert_eq!(
            compare_textual_args(&pattern, Some(&[ResolvedType::declared("p.Other")]), true),
            Accuracy::Erasure
        );
        assert_eq!(compare_textual_args(&pattern, None, true), Accuracy::EquivalentRaw);
        assert!(qualified_name_matches("util.List", "java.util.List", true));
        assert!(!qualified_name_matches("List", "java.util.ArrayList", true));
        assert!(qualified_name_matches("list", "java.util.List", false));
    }
}
