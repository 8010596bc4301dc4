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

//! Content keys (K) and content ids (CID).
//!
//! A [`ContentKey`] is an ordered, non-empty sequence of name segments
//! (e.g. `["warehouse", "db", "table"]`). Equality is segment-wise. A
//! [`ContentId`] is an opaque string that stays stable across renames and
//! type changes of the logical entity it identifies.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Ordered, non-empty sequence of name segments identifying a piece of
/// content within a commit.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentKey(Vec<String>);

/// A [`ContentKey`] was constructed with zero segments.
#[derive(Debug, thiserror::Error)]
#[error("content key must have at least one segment")]
pub struct EmptyContentKeyError;

impl ContentKey {
    /// Builds a key from segments, rejecting the empty sequence.
    pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Result<Self, EmptyContentKeyError> {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(EmptyContentKeyError);
        }
        Ok(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Renders the key as a dot-joined string, matching the form used in
    /// conflicting-key error messages (e.g. `"key.0"`).
    pub fn display_path(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ContentKey").field(&self.display_path()).finish()
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_path())
    }
}

/// Opaque, globally-unique-per-entity identifier that survives renames and
/// content-type changes of the entity it names.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-content-type disposition: whether a type's values live entirely on
/// the referencing commit, or additionally share a global value in the
/// global state log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ContentDisposition {
    OnReference,
    WithGlobalState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_key() {
        let empty: Vec<String> = vec![];
        assert!(ContentKey::new(empty).is_err());
    }

    #[test]
    fn test_display_path() {
        let key = ContentKey::new(["key", "0"]).unwrap();
        assert_eq!(key.display_path(), "key.0");
    }

    #[test]
    fn test_equality_is_segment_wise() {
        let a = ContentKey::new(["a", "b"]).unwrap();
        let b = ContentKey::new(["a", "b"]).unwrap();
        let c = ContentKey::new(["a", "c"]).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
