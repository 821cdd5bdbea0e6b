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

//! Textual pattern syntax.
//!
//! Malformed input never fails: whatever cannot be understood is kept as a
//! plain name so the rule normalization can still produce a usable pattern.

use super::{ElementKind, Fragments, TypeFragments};
use crate::syntax::{TypeArg, TypeSig, WildcardBound};

/// Split on `sep` outside angle brackets and parentheses.
fn split_top(s: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '<' | '(' => depth += 1,
            '>' | ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&s[start..]);
    out
}

/// Index of the first `open` at depth zero and its matching close.
fn bracket_span(s: &str, open: char, close: char) -> Option<(usize, usize)> {
    let start = s.find(open)?;
    let mut depth = 0i32;
    for (i, c) in s[start..].char_indices() {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth == 0 {
                return Some((start, start + i));
            }
        }
    }
    None
}

fn split_qualified(name: &str) -> (Option<String>, String) {
    match name.rfind('.') {
        Some(i) => (Some(name[..i].to_string()), name[i + 1..].to_string()),
        None => (None, name.to_string()),
    }
}

pub fn type_arg(s: &str) -> Option<TypeArg> {
    let s = s.trim();
    if let Some(rest) = s.strip_prefix('?') {
        let rest = rest.trim();
        if rest.is_empty() {
            return Some(TypeArg::Wildcard(None));
        }
        if let Some(b) = rest.strip_prefix("extends") {
            return Some(TypeArg::Wildcard(Some((WildcardBound::Extends, type_sig(b)?))));
        }
        if let Some(b) = rest.strip_prefix("super") {
            return Some(TypeArg::Wildcard(Some((WildcardBound::Super, type_sig(b)?))));
        }
        return None;
    }
    type_sig(s).map(TypeArg::Type)
}

/// `java.util.Map<String, ? extends List<X>>[]`, `String...`
pub fn type_sig(s: &str) -> Option<TypeSig> {
    let mut s = s.trim();
    if s.is_empty() {
        return None;
    }
    let mut dims = 0u8;
    loop {
        if let Some(rest) = s.strip_suffix("[]") {
            dims += 1;
            s = rest.trim_end();
        } else if let Some(rest) = s.strip_suffix("...") {
            dims += 1;
            s = rest.trim_end();
        } else {
            break;
        }
    }
    let sig = match bracket_span(s, '<', '>') {
        Some((open, close)) => {
            let name: String = s[..open].split_whitespace().collect();
            let args = split_top(&s[open + 1..close], ',')
                .into_iter()
                .filter(|a| !a.trim().is_empty())
                .map(type_arg)
                .collect::<Option<Vec<_>>>()?;
            TypeSig::simple(name).with_args(args)
        }
        None => TypeSig::simple(s.split_whitespace().collect::<String>()),
    };
    Some(sig.array(dims))
}

/// A parameter as written in a pattern, possibly followed by a name.
fn param_type(s: &str) -> Option<TypeSig> {
    let s = s.trim().trim_start_matches("final ").trim();
    let tokens = split_top(s, ' ');
    let tokens: Vec<&str> = tokens.into_iter().filter(|t| !t.is_empty()).collect();
    let ty = match tokens.as_slice() {
        [] => return None,
        [one] => one.to_string(),
        [init @ .., last]
            if last
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '$') =>
        {
            init.join(" ")
        }
        all => all.join(" "),
    };
    type_sig(&ty)
}

fn params(inner: &str) -> Vec<TypeSig> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    split_top(inner, ',')
        .into_iter()
        .filter_map(param_type)
        .collect()
}

/// Split `head(params) rest` into its parts.
fn call_shape(text: &str) -> (String, Option<Vec<TypeSig>>, String) {
    match bracket_span(text, '(', ')') {
        Some((open, close)) => (
            text[..open].trim().to_string(),
            Some(params(&text[open + 1..close])),
            text[close + 1..].trim().to_string(),
        ),
        None => {
            let mut it = text.trim().splitn(2, char::is_whitespace);
            let head = it.next().unwrap_or("").to_string();
            let rest = it.next().unwrap_or("").trim().to_string();
            (head, None, rest)
        }
    }
}

pub fn fragments(text: &str, kind: ElementKind) -> Fragments {
    let text = text.trim();
    match kind {
        ElementKind::Type(_) => {
            let (name, args) = match bracket_span(text, '<', '>') {
                Some((open, _)) => {
                    let args = type_sig(text).and_then(|s| s.args);
                    (text[..open].trim().to_string(), args)
                }
                None => (text.to_string(), None),
            };
            let (qualification, simple) = split_qualified(&name);
            Fragments::Type(TypeFragments {
                qualification,
                simple,
                args,
            })
        }
        ElementKind::Method => {
            let (head, params, rest) = call_shape(text);
            let (declaring, selector) = split_qualified(&head);
            Fragments::Method {
                declaring,
                selector,
                params,
                return_type: type_sig(&rest),
            }
        }
        ElementKind::Field => {
            let (head, _, rest) = call_shape(text);
            let (declaring, name) = split_qualified(&head);
            Fragments::Field {
                declaring,
                name,
                ty: type_sig(&rest),
            }
        }
        ElementKind::Constructor => {
            let (head, params, _) = call_shape(text);
            let head = match bracket_span(&head, '<', '>') {
                Some((open, _)) => head[..open].to_string(),
                None => head,
            };
            let (qualification, simple) = split_qualified(&head);
            Fragments::Constructor {
                qualification,
                simple,
                params,
            }
        }
        ElementKind::Package => Fragments::Package(text.split_whitespace().collect()),
        ElementKind::Module => Fragments::Module(text.split_whitespace().collect()),
        ElementKind::AnnotationElement => {
            let (head, _, _) = call_shape(text);
            let (annotation, element) = split_qualified(&head);
            Fragments::AnnotationElement {
                annotation,
                element,
            }
        }
    }
}
