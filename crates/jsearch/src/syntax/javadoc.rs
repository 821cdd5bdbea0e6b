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

//! Reference tags inside documentation comments.

use once_cell::sync::Lazy;
use regex::Regex;
use std::ops::Range;

static RE_DOC_REF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\{@(?:link|linkplain|value)|@see|@throws|@exception)\s+([A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)*)?(?:#([A-Za-z_$][\w$]*)(\([^)]*\))?)?",
    )
    .unwrap()
});

/// One `{@link Owner#member(params)}` style reference. Ranges are relative
/// to the start of the comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocLink {
    pub owner: Option<(String, Range<usize>)>,
    pub member: Option<(String, Range<usize>)>,
    pub params: Option<Vec<String>>,
}

pub fn scan(comment: &str) -> Vec<DocLink> {
    RE_DOC_REF
        .captures_iter(comment)
        .filter_map(|c| {
            let owner = c.get(1).map(|m| (m.as_str().to_string(), m.range()));
            let member = c.get(2).map(|m| (m.as_str().to_string(), m.range()));
            if owner.is_none() && member.is_none() {
                return None;
            }
            let params = c.get(3).map(|m| parse_params(m.as_str()));
            Some(DocLink {
                owner,
                member,
                params,
            })
        })
        .collect()
}

// "(int, java.lang.String name)" -> ["int", "java.lang.String"]
fn parse_params(s: &str) -> Vec<String> {
    let inner = s.trim_start_matches('(').trim_end_matches(')');
    inner
        .split(',')
        .filter_map(|p| p.split_whitespace().next())
        .map(|p| p.to_string())
        .collect()
}
