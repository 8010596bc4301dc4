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

//! The audit log of reference operations (C5).

use crate::content_hash::ContentHash;
use crate::content_hash::DigestUpdate;
use crate::content_hash::hash_of;
use crate::hash::Hash;
use crate::ref_name::RefName;
use crate::ref_name::RefType;
use crate::timestamp::Timestamp;

/// The kind of change a ref-log entry records.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RefLogOperation {
    CreateReference,
    Commit,
    DeleteReference,
    AssignReference,
    Merge,
    Transplant,
}

impl ContentHash for RefLogOperation {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        let tag: u8 = match self {
            Self::CreateReference => 0,
            Self::Commit => 1,
            Self::DeleteReference => 2,
            Self::AssignReference => 3,
            Self::Merge => 4,
            Self::Transplant => 5,
        };
        tag.hash(state);
    }
}

/// A single ref-log entry (R): one audited change to a named reference.
#[derive(Clone, PartialEq, Debug)]
pub struct RefLogEntry {
    pub ref_log_id: Hash,
    pub parents: Vec<Hash>,
    pub ref_name: RefName,
    pub ref_type: RefType,
    pub commit_hash: Hash,
    pub operation: RefLogOperation,
    pub operation_time: Timestamp,
    /// For `AssignReference`: `[previous_hash_of_target]`. For `Merge`/
    /// `Transplant`: the source commits applied. For `Commit`/
    /// `CreateReference`/`DeleteReference`: empty (the dropped hash for a
    /// delete is `commit_hash` itself).
    pub source_hashes: Vec<Hash>,
}

impl RefLogEntry {
    pub fn build(
        parent_id: Hash,
        ref_name: RefName,
        ref_type: RefType,
        commit_hash: Hash,
        operation: RefLogOperation,
        operation_time: Timestamp,
        source_hashes: Vec<Hash>,
    ) -> Self {
        struct Content<'a> {
            parents: &'a [Hash],
            ref_name: &'a str,
            ref_type: RefType,
            commit_hash: &'a Hash,
            operation: RefLogOperation,
            operation_time: Timestamp,
            source_hashes: &'a [Hash],
        }
        impl ContentHash for Content<'_> {
            fn hash(&self, state: &mut dyn DigestUpdate) {
                self.parents.to_vec().hash(state);
                self.ref_name.to_string().hash(state);
                (matches!(self.ref_type, RefType::Tag) as u8).hash(state);
                self.commit_hash.hash(state);
                self.operation.hash(state);
                self.operation_time.0.hash(state);
                self.source_hashes.to_vec().hash(state);
            }
        }
        let parents = vec![parent_id];
        let ref_log_id = hash_of(&Content {
            parents: &parents,
            ref_name: ref_name.as_str(),
            ref_type,
            commit_hash: &commit_hash,
            operation,
            operation_time,
            source_hashes: &source_hashes,
        });
        Self {
            ref_log_id,
            parents,
            ref_name,
            ref_type,
            commit_hash,
            operation,
            operation_time,
            source_hashes,
        }
    }

    /// For a `DeleteReference`/`AssignReference` entry, the hash that the
    /// reference pointed to right before this entry (the "dropped" hash GC
    /// must still consider live up to the operation time).
    pub fn dropped_hash(&self) -> Option<&Hash> {
        match self.operation {
            RefLogOperation::DeleteReference => Some(&self.commit_hash),
            RefLogOperation::AssignReference => self.source_hashes.first(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dropped_hash_for_delete() {
        let dropped = Hash::no_ancestor();
        let entry = RefLogEntry::build(
            Hash::no_ancestor(),
            RefName::new("feature"),
            RefType::Branch,
            dropped.clone(),
            RefLogOperation::DeleteReference,
            Timestamp(1),
            vec![],
        );
        assert_eq!(entry.dropped_hash(), Some(&dropped));
    }

    #[test]
    fn test_dropped_hash_for_assign() {
        let prior = Hash::no_ancestor();
        let entry = RefLogEntry::build(
            Hash::no_ancestor(),
            RefName::new("feature"),
            RefType::Branch,
            Hash::no_ancestor(),
            RefLogOperation::AssignReference,
            Timestamp(1),
            vec![prior.clone()],
        );
        assert_eq!(entry.dropped_hash(), Some(&prior));
    }

    #[test]
    fn test_dropped_hash_absent_for_commit() {
        let entry = RefLogEntry::build(
            Hash::no_ancestor(),
            RefName::new("main"),
            RefType::Branch,
            Hash::no_ancestor(),
            RefLogOperation::Commit,
            Timestamp(1),
            vec![],
        );
        assert_eq!(entry.dropped_hash(), None);
    }
}
