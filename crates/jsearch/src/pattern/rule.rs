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

//! Match-rule bitset, its normalization, and name matching.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// How pattern names are compared with candidate names, plus how strictly
/// generic type arguments must agree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MatchRule(u32);

impl MatchRule {
    pub const EXACT: MatchRule = MatchRule(0);
    pub const PREFIX: MatchRule = MatchRule(0x0001);
    pub const PATTERN: MatchRule = MatchRule(0x0002);
    pub const CASE_SENSITIVE: MatchRule = MatchRule(0x0008);
    pub const ERASURE: MatchRule = MatchRule(0x0010);
    pub const EQUIVALENT: MatchRule = MatchRule(0x0020);
    pub const RAW: MatchRule = MatchRule(0x0040);
    pub const CAMELCASE: MatchRule = MatchRule(0x0080);
    pub const CAMELCASE_SAME_PART_COUNT: MatchRule = MatchRule(0x0100);

    const NAME_MODES: u32 = 0x0001 | 0x0002 | 0x0080 | 0x0100;
    const ALL: u32 = 0x01FB;

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Unknown bits are dropped.
    pub fn from_bits(bits: u32) -> Self {
        MatchRule(bits & Self::ALL)
    }

    pub fn contains(self, other: MatchRule) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub fn without(self, other: MatchRule) -> Self {
        MatchRule(self.0 & !other.0)
    }

    pub fn is_case_sensitive(self) -> bool {
        self.contains(Self::CASE_SENSITIVE)
    }

    pub fn is_camel_case(self) -> bool {
        self.contains(Self::CAMELCASE) || self.contains(Self::CAMELCASE_SAME_PART_COUNT)
    }

    /// Whether generic-argument differences may be tolerated at all.
    pub fn is_lenient_generics(self) -> bool {
        self.contains(Self::ERASURE) || self.contains(Self::EQUIVALENT)
    }

    /// Rewrite a contradictory rule into the nearest looser valid rule.
    ///
    /// Returns the rule together with the (possibly replaced) name.
    pub fn normalize(self, name: &str) -> (MatchRule, String) {
        let mut rule = self;
        let mut name = name.trim().to_string();
        if name.is_empty() {
            name = "*".to_string();
            rule = MatchRule(rule.0 & !Self::NAME_MODES) | Self::PATTERN;
        }
        if rule.contains(Self::PATTERN) {
            if has_wildcards(&name) {
                rule = rule
                    .without(Self::CAMELCASE)
                    .without(Self::CAMELCASE_SAME_PART_COUNT)
                    .without(Self::PREFIX);
            } else {
                rule = rule.without(Self::PATTERN);
            }
        }
        if rule.contains(Self::CAMELCASE) && rule.contains(Self::CAMELCASE_SAME_PART_COUNT) {
            rule = rule.without(Self::CAMELCASE);
        }
        if rule.is_camel_case() {
            rule = rule.without(Self::PREFIX);
            if !is_valid_camel_pattern(&name) {
                rule = if rule.contains(Self::CAMELCASE) {
                    rule.without(Self::CAMELCASE) | Self::PREFIX
                } else {
                    rule.without(Self::CAMELCASE_SAME_PART_COUNT)
                };
            }
        }
        if rule.contains(Self::RAW) && !rule.is_lenient_generics() {
            rule = rule | Self::EQUIVALENT;
        }
        (rule, name)
    }
}

impl BitOr for MatchRule {
    type Output = MatchRule;

    fn bitor(self, rhs: MatchRule) -> MatchRule {
        MatchRule(self.0 | rhs.0)
    }
}

/// Comma- or `|`-separated flag names, e.g. `camel,case`.
impl std::str::FromStr for MatchRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rule = MatchRule::EXACT;
        for part in s.split([',', '|']).map(str::trim).filter(|p| !p.is_empty()) {
            rule = rule
                | match part.to_ascii_lowercase().replace('_', "-").as_str() {
                    "exact" => MatchRule::EXACT,
                    "prefix" => MatchRule::PREFIX,
                    "pattern" | "glob" => MatchRule::PATTERN,
                    "case" | "case-sensitive" => MatchRule::CASE_SENSITIVE,
                    "erasure" => MatchRule::ERASURE,
                    "equivalent" => MatchRule::EQUIVALENT,
                    "raw" => MatchRule::RAW,
                    "camel" | "camelcase" => MatchRule::CAMELCASE,
                    "camel-same" | "camelcase-same-part-count" => MatchRule::CAMELCASE_SAME_PART_COUNT,
                    other => return Err(format!("unknown match rule '{}'", other)),
                };
        }
        Ok(rule)
    }
}

impl fmt::Debug for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: &[(MatchRule, &str)] = &[
            (MatchRule::PREFIX, "PREFIX"),
            (MatchRule::PATTERN, "PATTERN"),
            (MatchRule::CASE_SENSITIVE, "CASE_SENSITIVE"),
            (MatchRule::ERASURE, "ERASURE"),
            (MatchRule::EQUIVALENT, "EQUIVALENT"),
            (MatchRule::RAW, "RAW"),
            (MatchRule::CAMELCASE, "CAMELCASE"),
            (MatchRule::CAMELCASE_SAME_PART_COUNT, "CAMELCASE_SAME_PART_COUNT"),
        ];
        let parts: Vec<&str> = NAMES
            .iter()
            .filter(|(r, _)| self.contains(*r))
            .map(|(_, n)| *n)
            .collect();
        if parts.is_empty() {
            f.write_str("EXACT")
        } else {
            f.write_str(&parts.join("|"))
        }
    }
}

pub fn has_wildcards(s: &str) -> bool {
    s.contains('*') || s.contains('?')
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_valid_camel_pattern(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => {}
        _ => return false,
    }
    chars.all(|c| is_ident_part(c) || c == '.')
}

fn is_upper_or_digit(c: char) -> bool {
    c.is_uppercase() || c.is_ascii_digit()
}

/// Camel-case comparison: each uppercase letter or digit of the pattern
/// starts a new part that must align with a part of `name`; lowercase
/// pattern characters must follow their part's start literally.
pub fn camel_case_match(pattern: &str, name: &str, same_part_count: bool) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    if p.is_empty() {
        return true;
    }
    if n.is_empty() || p[0] != n[0] {
        return false;
    }
    let (mut ip, mut iname) = (0usize, 0usize);
    loop {
        ip += 1;
        iname += 1;
        if ip == p.len() {
            if !same_part_count {
                return true;
            }
            // remaining name must not start another part
            return n[iname..].iter().all(|c| !c.is_uppercase());
        }
        if iname == n.len() {
            return false;
        }
        let pc = p[ip];
        if pc == n[iname] {
            continue;
        }
        if !is_upper_or_digit(pc) {
            return false;
        }
        loop {
            if iname == n.len() {
                return false;
            }
            let nc = n[iname];
            if nc.is_ascii_digit() {
                if pc == nc {
                    break;
                }
                iname += 1;
            } else if !nc.is_uppercase() {
                iname += 1;
            } else if pc != nc {
                return false;
            } else {
                break;
            }
        }
    }
}

/// `*` matches any run, `?` any single character.
pub fn glob_match(pattern: &str, name: &str, case_sensitive: bool) -> bool {
    let fold = |s: &str| -> Vec<char> {
        if case_sensitive {
            s.chars().collect()
        } else {
            s.chars().flat_map(|c| c.to_lowercase()).collect()
        }
    };
    let p = fold(pattern);
    let n = fold(name);
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;
    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '*')
}

/// A normalized name pattern ready to test candidate names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameMatcher {
    pub pattern: String,
    pub rule: MatchRule,
}

impl NameMatcher {
    pub fn new(pattern: &str, rule: MatchRule) -> Self {
        let (rule, pattern) = rule.normalize(pattern);
        Self { pattern, rule }
    }

    /// Matches any name.
    pub fn any() -> Self {
        Self::new("*", MatchRule::PATTERN)
    }

    pub fn is_any(&self) -> bool {
        self.rule.contains(MatchRule::PATTERN) && self.pattern.chars().all(|c| c == '*')
    }

    pub fn matches(&self, name: &str) -> bool {
        let cs = self.rule.is_case_sensitive();
        if self.rule.contains(MatchRule::PATTERN) {
            return glob_match(&self.pattern, name, cs);
        }
        if self.rule.is_camel_case() {
            let same = self.rule.contains(MatchRule::CAMELCASE_SAME_PART_COUNT);
            if camel_case_match(&self.pattern, name, same) {
                return true;
            }
            if cs {
                return false;
            }
            // a lowercase pattern still matches by prefix (or exactly, when the
            // part count must agree)
            return if same {
                self.pattern.eq_ignore_ascii_case(name)
            } else {
                starts_with_ignore_case(name, &self.pattern)
            };
        }
        if self.rule.contains(MatchRule::PREFIX) {
            return if cs {
                name.starts_with(&self.pattern)
            } else {
                starts_with_ignore_case(name, &self.pattern)
            };
        }
        if cs {
            name == self.pattern
        } else {
            name.eq_ignore_ascii_case(&self.pattern)
        }
    }
}

fn starts_with_ignore_case(name: &str, prefix: &str) -> bool {
    name.len() >= prefix.len()
        && name
            .get(..prefix.len())
            .map(|head| head.eq_ignore_ascii_case(prefix))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_flags_parse_from_names() {
        let rule: MatchRule = "camel, case".parse().unwrap();
        assert!(rule.contains(MatchRule::CAMELCASE));
        assert!(rule.is_case_sensitive());
        assert_eq!("exact".parse::<MatchRule>().unwrap(), MatchRule::EXACT);
        assert!("erasure|raw".parse::<MatchRule>().unwrap().contains(MatchRule::RAW));
        assert!("fuzzy".parse::<MatchRule>().is_err());
    }

    #[test]
    fn camel_case_loose_and_same_part_count() {
        assert!(camel_case_match("HM", "HashMap", false));
        assert!(camel_case_match("HM", "HtmlMapper", false));
        assert!(camel_case_match("HM", "HashMapEntry", false));
        assert!(camel_case_match("HM", "HashMap", true));
        assert!(camel_case_match("HM", "HaxMapxxxx", true));
        assert!(!camel_case_match("HM", "HashMapEntry", true));
        assert!(camel_case_match("HaMa", "HashMap", false));
        assert!(!camel_case_match("HM", "hashMap", false));
        assert!(!camel_case_match("HMX", "HashMap", false));
    }

    #[test]
    fn camel_matcher_through_rule() {
        let loose = NameMatcher::new("HM", MatchRule::CAMELCASE);
        let strict = NameMatcher::new("HM", MatchRule::CAMELCASE_SAME_PART_COUNT);
        for n in ["HashMap", "HtmlMapper", "HashMapEntry"] {
            assert!(loose.matches(n), "{}", n);
        }
        assert!(strict.matches("HashMap"));
        assert!(strict.matches("HaxMapxxxx"));
        assert!(!strict.matches("HashMapEntry"));
    }

    #[test]
    fn normalization_rules() {
        let (r, n) = MatchRule::EXACT.normalize("");
        assert_eq!(n, "*");
        assert!(r.contains(MatchRule::PATTERN));

        let (r, _) = MatchRule::PATTERN.normalize("Foo");
        assert_eq!(r, MatchRule::EXACT);

        let (r, _) = (MatchRule::PATTERN | MatchRule::CAMELCASE).normalize("F*o");
        assert_eq!(r, MatchRule::PATTERN);

        let (r, _) = (MatchRule::CAMELCASE | MatchRule::CAMELCASE_SAME_PART_COUNT).normalize("HM");
        assert_eq!(r, MatchRule::CAMELCASE_SAME_PART_COUNT);

        let (r, _) = (MatchRule::CAMELCASE | MatchRule::PREFIX).normalize("HM");
        assert_eq!(r, MatchRule::CAMELCASE);

        let (r, _) = MatchRule::CAMELCASE.normalize("1abc");
        assert_eq!(r, MatchRule::PREFIX);
        let (r, _) = MatchRule::CAMELCASE_SAME_PART_COUNT.normalize("1abc");
        assert_eq!(r, MatchRule::EXACT);

        let (r, _) = MatchRule::RAW.normalize("List");
        assert_eq!(r, MatchRule::RAW | MatchRule::EQUIVALENT);
    }

    #[test]
    fn glob_and_prefix() {
        assert!(glob_match("Fo*", "FooBar", true));
        assert!(glob_match("f?o*r", "FooBar", false));
        assert!(!glob_match("f?o*r", "FooBar", true));
        assert!(glob_match("*", "", true));
        assert!(NameMatcher::new("foo", MatchRule::PREFIX).matches("FooBar"));
        assert!(!NameMatcher::new("foo", MatchRule::PREFIX | MatchRule::CASE_SENSITIVE)
            .matches("FooBar"));
        assert!(NameMatcher::new("foobar", MatchRule::EXACT).matches("FooBar"));
        assert!(NameMatcher::any().is_any());
    }
}
