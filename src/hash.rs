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

//! Content hashes (C1): fixed-length, hex-rendered identifiers for every
//! immutable record in the catalog (commit entries, global-log entries,
//! ref-log entries), plus the no-ancestor sentinel that roots all history.

use std::fmt;

use blake2::Blake2b512;
use blake2::Digest as _;
use serde::Deserialize;
use serde::Serialize;

use crate::hex_util;

/// Length in bytes of every [`Hash`] produced by this crate.
///
/// `Blake2b512`'s native output length; comfortably above the ≥ 20 byte
/// floor the catalog requires of any hash implementation.
pub const HASH_LENGTH: usize = 64;

/// A fixed-length, content-derived identifier.
///
/// Two records with byte-identical canonical encodings hash identically,
/// which is what lets the persistence layer treat `put_*` calls as
/// idempotent on hash.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hash(Vec<u8>);

impl Hash {
    /// Wraps raw bytes as a `Hash` without validation. Used by store
    /// implementations reconstructing a `Hash` they previously persisted.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// The sentinel value marking the root of history: no commit or log
    /// entry has this hash as its own, only as a parent.
    pub fn no_ancestor() -> Self {
        content_hash_bytes(&[])
    }

    /// Whether this is the [`Hash::no_ancestor`] sentinel.
    pub fn is_no_ancestor(&self) -> bool {
        *self == Self::no_ancestor()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn hex(&self) -> String {
        hex_util::encode_hex(&self.0)
    }

    /// Parses a full hex hash. Malformed (odd-length or non-hex) input is
    /// the caller's mistake and is reported as `InvalidArgument` by callers
    /// of this function, never retried.
    pub fn try_from_hex(hex: impl AsRef<[u8]>) -> Option<Self> {
        let bytes = hex_util::decode_hex(hex)?;
        Some(Self(bytes))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.hex()).finish()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.hex())
    }
}

/// Hashes arbitrary canonical bytes (the wire encoding of a record) into a
/// [`Hash`]. The empty input defines [`Hash::no_ancestor`].
pub fn content_hash_bytes(bytes: &[u8]) -> Hash {
    let mut hasher = Blake2b512::new();
    hasher.update(bytes);
    Hash(hasher.finalize().to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ancestor_is_deterministic() {
        assert_eq!(Hash::no_ancestor(), Hash::no_ancestor());
        assert!(Hash::no_ancestor().is_no_ancestor());
    }

    #[test]
    fn test_hex_roundtrip() {
        let h = content_hash_bytes(b"hello");
        let parsed = Hash::try_from_hex(h.hex()).unwrap();
        assert_eq!(h, parsed);
    }

    #[test]
    fn test_rejects_malformed_hex() {
        assert!(Hash::try_from_hex("abc").is_none());
        assert!(Hash::try_from_hex("zz").is_none());
    }

    #[test]
    fn test_distinct_inputs_distinct_hashes() {
        assert_ne!(content_hash_bytes(b"a"), content_hash_bytes(b"b"));
    }
}
