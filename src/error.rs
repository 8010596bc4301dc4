// Copyright 2026 The ref-catalog Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The typed error enumeration surfaced at every adapter boundary (§7).
//!
//! `InvalidArgument` is kept distinct from `ReferenceConflict` because the
//! former indicates a caller mistake and must never trigger a CAS retry,
//! while the latter is an expected, retryable outcome of concurrent writers.

use thiserror::Error;

use crate::content_key::ContentKey;
use crate::ref_name::RefName;

/// Errors surfaced by the database adapter.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reference '{0}' not found")]
    ReferenceNotFound(RefName),

    #[error("hash {hash} is not reachable from reference '{reference}'")]
    HashNotOnReference { reference: RefName, hash: String },

    #[error("reference '{0}' already exists")]
    ReferenceAlreadyExists(RefName),

    #[error("{message}")]
    ReferenceConflict {
        message: String,
        conflicting_keys: Vec<ContentKey>,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("ref-log entry {0} not found")]
    RefLogNotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CatalogError {
    pub fn reference_conflict(message: impl Into<String>) -> Self {
        Self::ReferenceConflict {
            message: message.into(),
            conflicting_keys: Vec::new(),
        }
    }

    pub fn conflicting_keys(message: impl Into<String>, keys: Vec<ContentKey>) -> Self {
        Self::ReferenceConflict {
            message: message.into(),
            conflicting_keys: keys,
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

/// Result alias used throughout the adapter.
pub type CatalogResult<T> = Result<T, CatalogError>;
