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

//! Canonical content hashing.
//!
//! Every immutable record (commit entries, global-log entries, ref-log
//! entries) implements [`ContentHash`] by feeding its fields, in a fixed
//! declaration order, into a [`DigestUpdate`]. This is the crate's stable,
//! field-numbered binary schema: hashing a record is just running its
//! `ContentHash::update` over a fresh digest and reading out the output.
//!
//! Collections are length-prefixed so that, e.g., `["ab"]` and `["a", "b"]`
//! never collide.

use blake2::Blake2b512;
use blake2::Digest as _;

use crate::hash::Hash;

/// Receives canonical bytes from a [`ContentHash`] implementation.
pub trait DigestUpdate {
    fn update(&mut self, bytes: &[u8]);
}

impl DigestUpdate for Blake2b512 {
    fn update(&mut self, bytes: &[u8]) {
        Digest::update(self, bytes);
    }
}

/// A type whose instances can be deterministically reduced to bytes for
/// hashing.
pub trait ContentHash {
    fn hash(&self, state: &mut dyn DigestUpdate);
}

/// Hashes `value`'s canonical encoding into a [`Hash`].
pub fn hash_of(value: &impl ContentHash) -> Hash {
    let mut hasher = Blake2b512::new();
    value.hash(&mut hasher);
    Hash::from_bytes(&hasher.finalize())
}

impl ContentHash for u8 {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        state.update(&[*self]);
    }
}

impl ContentHash for bool {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        (*self as u8).hash(state);
    }
}

macro_rules! impl_content_hash_for_int {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ContentHash for $ty {
                fn hash(&self, state: &mut dyn DigestUpdate) {
                    state.update(&self.to_le_bytes());
                }
            }
        )*
    };
}

impl_content_hash_for_int!(i32, i64, u32, u64);

impl ContentHash for str {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.as_bytes().hash(state);
    }
}

impl ContentHash for String {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.as_str().hash(state);
    }
}

impl ContentHash for [u8] {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        (self.len() as u64).hash(state);
        state.update(self);
    }
}

impl ContentHash for Vec<u8> {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.as_slice().hash(state);
    }
}

impl<T: ContentHash> ContentHash for Vec<T> {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        (self.len() as u64).hash(state);
        for item in self {
            item.hash(state);
        }
    }
}

impl<T: ContentHash> ContentHash for Option<T> {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        match self {
            None => 0u8.hash(state),
            Some(value) => {
                1u8.hash(state);
                value.hash(state);
            }
        }
    }
}

impl<A: ContentHash, B: ContentHash> ContentHash for (A, B) {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.0.hash(state);
        self.1.hash(state);
    }
}

impl<A: ContentHash, B: ContentHash, C: ContentHash> ContentHash for (A, B, C) {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.0.hash(state);
        self.1.hash(state);
        self.2.hash(state);
    }
}

impl<A: ContentHash, B: ContentHash, C: ContentHash, D: ContentHash> ContentHash for (A, B, C, D) {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.0.hash(state);
        self.1.hash(state);
        self.2.hash(state);
        self.3.hash(state);
    }
}

impl ContentHash for Hash {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.as_bytes().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let a = vec![1u8, 2, 3];
        let b = vec![1u8, 2, 3];
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_length_prefix_avoids_ambiguity() {
        let a: Vec<String> = vec!["ab".to_string()];
        let b: Vec<String> = vec!["a".to_string(), "b".to_string()];
        assert_ne!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_option_discriminant() {
        let none: Option<u64> = None;
        let some_zero: Option<u64> = Some(0);
        assert_ne!(hash_of(&none), hash_of(&some_zero));
    }
}
