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

//! The Global Pointer (C4): the single atomically-updated root record of a
//! repository.

use std::collections::VecDeque;

use crate::hash::Hash;
use crate::ref_name::RefName;
use crate::ref_name::RefType;

/// A named reference's current target.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RefPointer {
    pub ref_type: RefType,
    pub hash: Hash,
}

/// Bounded ring buffer of recent hashes, newest first, used to give CAS
/// retries and readers a short window of "recent parents" without walking
/// the full log.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ParentsRing {
    capacity: usize,
    entries: VecDeque<Hash>,
}

impl ParentsRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    pub fn push_front(&mut self, hash: Hash) {
        self.entries.push_front(hash);
        while self.entries.len() > self.capacity {
            self.entries.pop_back();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Hash> {
        self.entries.iter()
    }

    pub fn head(&self) -> Option<&Hash> {
        self.entries.front()
    }
}

/// The single mutable root record of a repository (P). Every successful
/// write replaces this record atomically via CAS; every other record in
/// the catalog is write-once.
#[derive(Clone, PartialEq, Debug)]
pub struct GlobalPointer {
    pub global_id: Hash,
    /// Most-recently-touched reference first.
    pub named_references: Vec<(RefName, RefPointer)>,
    pub ref_log_id: Hash,
    pub global_parents_incl_head: ParentsRing,
    pub ref_log_parents_incl_head: ParentsRing,
}

impl GlobalPointer {
    pub fn new(global_parents_ring: usize, ref_log_parents_ring: usize) -> Self {
        Self {
            global_id: Hash::no_ancestor(),
            named_references: Vec::new(),
            ref_log_id: Hash::no_ancestor(),
            global_parents_incl_head: ParentsRing::new(global_parents_ring),
            ref_log_parents_incl_head: ParentsRing::new(ref_log_parents_ring),
        }
    }

    pub fn get_reference(&self, name: &RefName) -> Option<&RefPointer> {
        self.named_references
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p)
    }

    /// Inserts or updates `name`, moving it to the front (most recently
    /// touched) of `named_references`.
    pub fn touch_reference(&mut self, name: RefName, pointer: RefPointer) {
        self.named_references.retain(|(n, _)| n != &name);
        self.named_references.insert(0, (name, pointer));
    }

    pub fn remove_reference(&mut self, name: &RefName) {
        self.named_references.retain(|(n, _)| n != name);
    }

    /// Advances the global-log head and rotates its parents ring.
    pub fn advance_global(&mut self, new_global_id: Hash) {
        self.global_parents_incl_head.push_front(new_global_id.clone());
        self.global_id = new_global_id;
    }

    /// Advances the ref-log head and rotates its parents ring.
    pub fn advance_ref_log(&mut self, new_ref_log_id: Hash) {
        self.ref_log_parents_incl_head
            .push_front(new_ref_log_id.clone());
        self.ref_log_id = new_ref_log_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touch_reference_moves_to_front() {
        let mut pointer = GlobalPointer::new(20, 20);
        pointer.touch_reference(
            RefName::new("main"),
            RefPointer { ref_type: RefType::Branch, hash: Hash::no_ancestor() },
        );
        pointer.touch_reference(
            RefName::new("feature"),
            RefPointer { ref_type: RefType::Branch, hash: Hash::no_ancestor() },
        );
        pointer.touch_reference(
            RefName::new("main"),
            RefPointer { ref_type: RefType::Branch, hash: Hash::no_ancestor() },
        );
        let names: Vec<&str> = pointer.named_references.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["main", "feature"]);
    }

    #[test]
    fn test_ring_buffer_bounded() {
        let mut ring = ParentsRing::new(2);
        ring.push_front(Hash::no_ancestor());
        ring.push_front(Hash::no_ancestor());
        ring.push_front(Hash::no_ancestor());
        assert_eq!(ring.iter().count(), 2);
    }
}
