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

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, loading or persisting a root index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),

    #[error("index file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("index file {path} has version {found}, expected {expected}")]
    Version {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("index file {path} is stale for its root")]
    Stale { path: PathBuf },

    #[error("root {0} does not exist")]
    MissingRoot(PathBuf),

    #[error("indexing cancelled")]
    Cancelled,

    #[error("index registry has been shut down")]
    ShutDown,

    #[error("failed to start indexing threads: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

impl IndexError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        IndexError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Errors after which the persisted file must be thrown away and rebuilt.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            IndexError::Corrupt { .. } | IndexError::Version { .. } | IndexError::Stale { .. }
        )
    }
}

/// Errors raised while turning document content into a compilation unit.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("document is not valid UTF-8")]
    NotUtf8,

    #[error("parser could not be initialised: {0}")]
    Parser(String),

    #[error("parser produced no tree")]
    NoTree,

    #[error("malformed class file: {0}")]
    ClassFile(String),
}

/// Errors that terminate a query. Everything recoverable is absorbed per root
/// or per document instead.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search cancelled")]
    Cancelled,

    #[error("search engine has been shut down")]
    ShutDown,

    #[error(transparent)]
    Index(#[from] IndexError),
}

pub type SearchResult<T> = std::result::Result<T, SearchError>;
