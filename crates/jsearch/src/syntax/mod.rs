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

//! Source and class-file front ends producing [`CompilationUnit`]s.

pub mod classfile;
pub mod java;
pub mod javadoc;
pub mod model;

pub use model::*;

use std::sync::Arc;

use crate::error::ParseError;
use crate::types::{ContentSignature, DocumentKey, TextRange};

/// A parsed document with the source text its ranges point into.
#[derive(Debug)]
pub struct ParsedUnit {
    pub key: DocumentKey,
    pub signature: ContentSignature,
    pub unit: CompilationUnit,
    /// `None` for compiled units.
    pub source: Option<Arc<str>>,
}

impl ParsedUnit {
    pub fn parse(key: DocumentKey, bytes: &[u8]) -> Result<Self, ParseError> {
        let unit = parse_document(&key, bytes)?;
        let source = if unit.has_source {
            std::str::from_utf8(bytes).ok().map(Arc::from)
        } else {
            None
        };
        Ok(Self {
            signature: ContentSignature::of_bytes(bytes),
            key,
            unit,
            source,
        })
    }

    /// 1-based line of a range start.
    pub fn line_of(&self, range: TextRange) -> Option<u32> {
        let src = self.source.as_deref()?;
        let end = (range.start as usize).min(src.len());
        Some(src.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() as u32 + 1)
    }
}

/// Parse a document according to its kind: `.class` entries are decoded,
/// everything else is treated as Java source.
pub fn parse_document(key: &DocumentKey, bytes: &[u8]) -> Result<CompilationUnit, ParseError> {
    if key.is_binary() {
        classfile::parse_class(bytes)
    } else {
        let text = std::str::from_utf8(bytes).map_err(|_| ParseError::NotUtf8)?;
        java::parse_source(text)
    }
}
