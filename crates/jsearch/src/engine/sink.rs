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


use serde::Serialize;
use std::fmt;

use crate::encoder::DeclSummary;
use crate::locator::{Accuracy, Flavor};
use crate::types::{DocumentKey, TextRange};

/// One reported match. Nothing retains it after the sink has seen it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SearchMatch {
    pub document: DocumentKey,
    /// Enclosing declarations, outermost first.
    pub enclosing: Vec<String>,
    /// `None` for declarations of compiled units.
    pub range: Option<TextRange>,
    pub line: Option<u32>,
    pub text: Option<String>,
    pub accuracy: Accuracy,
    pub flavor: Flavor,
}

impl fmt::Display for SearchMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.document)?;
        match (self.line, &self.text) {
            (Some(line), Some(text)) => write!(f, ":{}: {} [{}]", line, text, self.accuracy)?,
            _ => write!(f, ": <no source> [{}]", self.accuracy)?,
        }
        if !self.enclosing.is_empty() {
            write!(f, " in {}", self.enclosing.join("."))?;
        }
        let mut flags = Vec::new();
        if self.flavor.read {
            flags.push("read");
        }
        if self.flavor.write {
            flags.push("write");
        }
        if self.flavor.super_invocation {
            flags.push("super");
        }
        if self.flavor.in_javadoc {
            flags.push("javadoc");
        }
        if !flags.is_empty() {
            write!(f, " ({})", flags.join(","))?;
        }
        Ok(())
    }
}

/// Receives matches in result order. `begin` and `end` bracket every
/// search, including one that fails or is cancelled.
pub trait MatchSink {
    fn begin(&mut self) {}

    fn accept(&mut self, m: SearchMatch);

    fn end(&mut self) {}
}

/// Keeps every match in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub matches: Vec<SearchMatch>,
    pub begun: usize,
    pub ended: usize,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MatchSink for CollectingSink {
    fn begin(&mut self) {
        self.begun += 1;
    }

    fn accept(&mut self, m: SearchMatch) {
        self.matches.push(m);
    }

    fn end(&mut self) {
        self.ended += 1;
    }
}

/// Receives declarations listed from index summaries.
pub trait DeclarationSink {
    fn accept_declaration(&mut self, document: &DocumentKey, declaration: &DeclSummary);
}

impl DeclarationSink for Vec<(DocumentKey, DeclSummary)> {
    fn accept_declaration(&mut self, document: &DocumentKey, declaration: &DeclSummary) {
        self.push((document.clone(), declaration.clone()));
    }
}
