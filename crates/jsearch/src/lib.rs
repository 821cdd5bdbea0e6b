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


//! Declaration and reference search over Java sources and compiled archives.
//!
//! An inverted index per root answers which documents may match a pattern;
//! a source-level verifier then decides each occurrence and grades it with
//! an [`Accuracy`] tier.

pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod index;
pub mod locator;
pub mod manager;
pub mod pattern;
pub mod resolve;
pub mod scope;
pub mod syntax;
pub mod test_helpers;
pub mod types;

pub use crate::config::{load_config, EngineConfig, MergeOpts};
pub use crate::engine::{
    CollectingSink, DeclarationKind, DeclarationQuery, DeclarationSink, MatchSink, OverlayRegistry,
    Participant, SearchEngine, SearchMatch, SearchOptions, SearchStats,
};
pub use crate::error::{IndexError, ParseError, SearchError, SearchResult};
pub use crate::locator::{Accuracy, Flavor};
pub use crate::manager::{CancellationToken, IndexRegistry, RegistryStats, WaitPolicy};
pub use crate::pattern::{ElementKind, Focus, LimitTo, MatchRule, MethodId, NameMatcher, Pattern, TypeFilter};
pub use crate::scope::{HierarchyScope, SearchScope};
pub use crate::types::{ContainerSpec, ContentSignature, DocumentKey, RootSpec, TextRange};
