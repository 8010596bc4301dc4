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

//! The append-only global state log (C3): one shared value per content id,
//! replaced on each put, independent of which reference wrote it.

use crate::content_hash::ContentHash;
use crate::content_hash::DigestUpdate;
use crate::content_hash::hash_of;
use crate::content_key::ContentId;
use crate::error::CatalogResult;
use crate::hash::Hash;
use crate::timestamp::Timestamp;

/// One `(content id, global bytes)` write recorded by a global-log entry.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GlobalPut {
    pub content_id: ContentId,
    pub value: Vec<u8>,
}

impl ContentHash for GlobalPut {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.content_id.as_str().to_string().hash(state);
        self.value.hash(state);
    }
}

/// An append-only global-state log entry (G).
#[derive(Clone, PartialEq, Debug)]
pub struct GlobalLogEntry {
    pub id: Hash,
    pub parents: Vec<Hash>,
    pub puts: Vec<GlobalPut>,
    pub created_time: Timestamp,
}

impl GlobalLogEntry {
    pub fn build(parent_id: Hash, puts: Vec<GlobalPut>, created_time: Timestamp) -> Self {
        struct Content<'a> {
            parents: &'a [Hash],
            puts: &'a [GlobalPut],
            created_time: Timestamp,
        }
        impl ContentHash for Content<'_> {
            fn hash(&self, state: &mut dyn DigestUpdate) {
                self.parents.to_vec().hash(state);
                self.puts.to_vec().hash(state);
                self.created_time.0.hash(state);
            }
        }
        let parents = vec![parent_id];
        let id = hash_of(&Content {
            parents: &parents,
            puts: &puts,
            created_time,
        });
        Self {
            id,
            parents,
            puts,
            created_time,
        }
    }
}

/// Read-only access to the global-state log.
pub trait GlobalLogReader {
    fn get_global(&self, id: &Hash) -> CatalogResult<GlobalLogEntry>;
}

/// Walks the global log backward from `head`, returning the most recent
/// value put for `content_id`, or `None` if it was never written.
pub fn current_global_value(
    reader: &impl GlobalLogReader,
    head: &Hash,
    content_id: &ContentId,
) -> CatalogResult<Option<Vec<u8>>> {
    let mut current = head.clone();
    while !current.is_no_ancestor() {
        let entry = reader.get_global(&current)?;
        if let Some(put) = entry.puts.iter().find(|p| &p.content_id == content_id) {
            return Ok(Some(put.value.clone()));
        }
        current = entry.parents[0].clone();
    }
    Ok(None)
}
