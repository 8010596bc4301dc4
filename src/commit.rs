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

//! Commit log entries and key-list materialisation/rebuild (C2).

use std::collections::BTreeMap;

use crate::content_hash::ContentHash;
use crate::content_hash::DigestUpdate;
use crate::content_hash::hash_of;
use crate::content_key::ContentDisposition;
use crate::content_key::ContentId;
use crate::content_key::ContentKey;
use crate::error::CatalogError;
use crate::error::CatalogResult;
use crate::hash::Hash;
use crate::timestamp::Timestamp;

/// A single `(key, content id, disposition, value)` write within a commit.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PutOp {
    pub key: ContentKey,
    pub content_id: ContentId,
    pub disposition: ContentDisposition,
    /// The per-reference ("on-reference") bytes, always present regardless
    /// of disposition.
    pub value: Vec<u8>,
    /// The shared global-state bytes, present only when `disposition` is
    /// [`ContentDisposition::WithGlobalState`].
    pub global_value: Option<Vec<u8>>,
}

impl ContentHash for PutOp {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.key.display_path().hash(state);
        self.content_id.as_str().to_string().hash(state);
        (matches!(self.disposition, ContentDisposition::WithGlobalState) as u8).hash(state);
        self.value.hash(state);
    }
}

/// A live `(key, content id, disposition)` triple as recorded in a
/// materialised key list.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KeyListEntry {
    pub key: ContentKey,
    pub content_id: ContentId,
    pub disposition: ContentDisposition,
}

impl ContentHash for KeyListEntry {
    fn hash(&self, state: &mut dyn DigestUpdate) {
        self.key.display_path().hash(state);
        self.content_id.as_str().to_string().hash(state);
        (matches!(self.disposition, ContentDisposition::WithGlobalState) as u8).hash(state);
    }
}

/// An immutable commit log entry (E).
#[derive(Clone, PartialEq, Debug)]
pub struct CommitEntry {
    pub hash: Hash,
    /// Parent hashes; `parents[0]` is the primary (immediate) predecessor.
    /// Any further entries are secondary ancestors retained for
    /// forward-compatibility but not consulted by this implementation's
    /// key-list rebuild or ancestry walks (see DESIGN.md).
    pub parents: Vec<Hash>,
    pub created_time: Timestamp,
    pub commit_seq: u64,
    pub metadata: Vec<u8>,
    pub puts: Vec<PutOp>,
    pub deletes: Vec<ContentKey>,
    pub key_list_distance: u32,
    pub key_list: Option<Vec<KeyListEntry>>,
}

impl CommitEntry {
    pub fn primary_parent(&self) -> &Hash {
        &self.parents[0]
    }

    pub fn is_root(&self) -> bool {
        self.commit_seq == 0
    }

    fn hash_content(
        parents: &[Hash],
        created_time: Timestamp,
        commit_seq: u64,
        metadata: &[u8],
        puts: &[PutOp],
        deletes: &[ContentKey],
        key_list_distance: u32,
        key_list: &Option<Vec<KeyListEntry>>,
    ) -> Hash {
        struct Content<'a> {
            parents: &'a [Hash],
            created_time: Timestamp,
            commit_seq: u64,
            metadata: &'a [u8],
            puts: &'a [PutOp],
            deletes: &'a [ContentKey],
            key_list_distance: u32,
            key_list: &'a Option<Vec<KeyListEntry>>,
        }
        impl ContentHash for Content<'_> {
            fn hash(&self, state: &mut dyn DigestUpdate) {
                self.parents.to_vec().hash(state);
                self.created_time.0.hash(state);
                self.commit_seq.hash(state);
                self.metadata.to_vec().hash(state);
                self.puts.to_vec().hash(state);
                self.deletes
                    .iter()
                    .map(ContentKey::display_path)
                    .collect::<Vec<_>>()
                    .hash(state);
                self.key_list_distance.hash(state);
                self.key_list.hash(state);
            }
        }
        hash_of(&Content {
            parents,
            created_time,
            commit_seq,
            metadata,
            puts,
            deletes,
            key_list_distance,
            key_list,
        })
    }

    /// Validates and builds a new entry on top of `parent` (`None` only for
    /// the repository's root commit).
    ///
    /// `key_list_materialise_distance` is the configured
    /// `default_key_list_distance`: when `parent`'s `key_list_distance + 1`
    /// reaches it, the new entry embeds a full key list and resets its own
    /// distance to 0.
    pub fn build(
        parent: Option<&CommitEntry>,
        parent_key_list: Option<&BTreeMap<ContentKey, (ContentId, ContentDisposition)>>,
        created_time: Timestamp,
        metadata: Vec<u8>,
        puts: Vec<PutOp>,
        deletes: Vec<ContentKey>,
        key_list_materialise_distance: u32,
    ) -> CatalogResult<Self> {
        let put_keys: std::collections::HashSet<&ContentKey> = puts.iter().map(|p| &p.key).collect();
        for key in &deletes {
            if put_keys.contains(key) {
                return Err(CatalogError::invalid_argument(format!(
                    "key '{key}' is both put and deleted in the same commit"
                )));
            }
        }

        let (parents, commit_seq, key_list_distance) = match parent {
            Some(p) => (vec![p.hash.clone()], p.commit_seq + 1, p.key_list_distance + 1),
            None => (vec![Hash::no_ancestor()], 0, 0),
        };

        let materialise = parent.is_none() || key_list_distance >= key_list_materialise_distance;
        let key_list = if materialise {
            let mut map = parent_key_list.cloned().unwrap_or_default();
            for key in &deletes {
                map.remove(key);
            }
            for put in &puts {
                map.insert(put.key.clone(), (put.content_id.clone(), put.disposition));
            }
            Some(
                map.into_iter()
                    .map(|(key, (content_id, disposition))| KeyListEntry {
                        key,
                        content_id,
                        disposition,
                    })
                    .collect(),
            )
        } else {
            None
        };
        let key_list_distance = if materialise { 0 } else { key_list_distance };

        let hash = Self::hash_content(
            &parents,
            created_time,
            commit_seq,
            &metadata,
            &puts,
            &deletes,
            key_list_distance,
            &key_list,
        );

        Ok(Self {
            hash,
            parents,
            created_time,
            commit_seq,
            metadata,
            puts,
            deletes,
            key_list_distance,
            key_list,
        })
    }
}

/// Read-only access to the commit log, as required by key-list rebuild and
/// ancestry walks. Implemented by anything that can resolve a commit hash
/// to its entry (normally backed by [`crate::store::Store::get_commit_log`]).
pub trait CommitLogReader {
    fn get_commit(&self, hash: &Hash) -> CatalogResult<CommitEntry>;
}

/// Rebuilds the full key list live at `commit`, by walking primary parents
/// back to the nearest entry embedding one, then replaying puts/deletes
/// forward in chronological order (oldest first, last write wins).
pub fn rebuild_key_list(
    reader: &impl CommitLogReader,
    commit: &Hash,
) -> CatalogResult<BTreeMap<ContentKey, (ContentId, ContentDisposition)>> {
    let mut chain = Vec::new();
    let mut current = reader.get_commit(commit)?;
    loop {
        let has_key_list = current.key_list.is_some();
        let is_root = current.is_root();
        chain.push(current.clone());
        if has_key_list || is_root {
            break;
        }
        current = reader.get_commit(current.primary_parent())?;
    }
    chain.reverse();

    let mut map = BTreeMap::new();
    let mut start_index = 0;
    if let Some(key_list) = &chain[0].key_list {
        for entry in key_list {
            map.insert(entry.key.clone(), (entry.content_id.clone(), entry.disposition));
        }
        start_index = 1;
    }
    for entry in &chain[start_index..] {
        for key in &entry.deletes {
            map.remove(key);
        }
        for put in &entry.puts {
            map.insert(put.key.clone(), (put.content_id.clone(), put.disposition));
        }
    }
    Ok(map)
}

/// Resolves the on-reference value most recently associated with `key` as
/// of `commit`, walking primary parents until a put or delete of `key` is
/// found. Unlike [`rebuild_key_list`], this is not bounded by the nearest
/// embedded key list: a materialised key list records only `(CID,
/// disposition)`, never the value bytes, so finding the actual value
/// requires continuing back to the put (or delete) that last touched `key`.
///
/// Returns `None` if `key` was most recently deleted, or never put.
pub fn resolve_value_at(
    reader: &impl CommitLogReader,
    commit: &Hash,
    key: &ContentKey,
) -> CatalogResult<Option<(ContentId, ContentDisposition, Vec<u8>)>> {
    let mut current = reader.get_commit(commit)?;
    loop {
        if current.deletes.contains(key) {
            return Ok(None);
        }
        if let Some(put) = current.puts.iter().find(|p| &p.key == key) {
            return Ok(Some((put.content_id.clone(), put.disposition, put.value.clone())));
        }
        if current.is_root() {
            return Ok(None);
        }
        current = reader.get_commit(current.primary_parent())?;
    }
}

/// Returns `true` if `ancestor` is reachable from `descendant` by walking
/// primary parents only.
pub fn is_ancestor(
    reader: &impl CommitLogReader,
    ancestor: &Hash,
    descendant: &Hash,
) -> CatalogResult<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    let mut current = reader.get_commit(descendant)?;
    loop {
        if current.is_root() {
            return Ok(current.hash == *ancestor);
        }
        if current.primary_parent() == ancestor {
            return Ok(true);
        }
        current = reader.get_commit(current.primary_parent())?;
    }
}

/// Finds the lowest common ancestor of `a` and `b` along primary parents.
pub fn common_ancestor(reader: &impl CommitLogReader, a: &Hash, b: &Hash) -> CatalogResult<Hash> {
    let mut hash_a = a.clone();
    let mut hash_b = b.clone();
    let mut entry_a = reader.get_commit(&hash_a)?;
    let mut entry_b = reader.get_commit(&hash_b)?;

    while entry_a.commit_seq > entry_b.commit_seq {
        hash_a = entry_a.primary_parent().clone();
        entry_a = reader.get_commit(&hash_a)?;
    }
    while entry_b.commit_seq > entry_a.commit_seq {
        hash_b = entry_b.primary_parent().clone();
        entry_b = reader.get_commit(&hash_b)?;
    }
    while hash_a != hash_b {
        hash_a = entry_a.primary_parent().clone();
        entry_a = reader.get_commit(&hash_a)?;
        hash_b = entry_b.primary_parent().clone();
        entry_b = reader.get_commit(&hash_b)?;
    }
    Ok(hash_a)
}

/// Returns the commits strictly between `ancestor` (exclusive) and `tip`
/// (inclusive), oldest first.
pub fn commits_since(
    reader: &impl CommitLogReader,
    ancestor: &Hash,
    tip: &Hash,
) -> CatalogResult<Vec<CommitEntry>> {
    let mut chain = Vec::new();
    let mut current = reader.get_commit(tip)?;
    while current.hash != *ancestor {
        if current.is_root() {
            break;
        }
        let parent = current.primary_parent().clone();
        chain.push(current);
        current = reader.get_commit(&parent)?;
    }
    chain.reverse();
    Ok(chain)
}
