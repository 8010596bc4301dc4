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

//! The read path (C7): `hashOnReference`, `values`, `keys`, `commitLog`,
//! `diff`.

use std::collections::BTreeMap;

use crate::commit::CommitEntry;
use crate::commit::CommitLogReader;
use crate::commit::is_ancestor;
use crate::commit::rebuild_key_list;
use crate::commit::resolve_value_at;
use crate::content_key::ContentDisposition;
use crate::content_key::ContentId;
use crate::content_key::ContentKey;
use crate::error::CatalogError;
use crate::error::CatalogResult;
use crate::global_log::GlobalLogReader;
use crate::global_log::current_global_value;
use crate::hash::Hash;
use crate::ref_name::RefName;
use crate::store::Store;

/// Binds a [`Store`] to one repository id, implementing the small reader
/// traits the commit/global-log helpers need. Cheap to construct; holds no
/// state beyond a borrow and a string.
#[derive(Clone, Copy)]
pub struct StoreReader<'a> {
    pub store: &'a dyn Store,
    pub repository_id: &'a str,
}

impl CommitLogReader for StoreReader<'_> {
    fn get_commit(&self, hash: &Hash) -> CatalogResult<CommitEntry> {
        self.store.get_commit_log(self.repository_id, hash)
    }
}

impl GlobalLogReader for StoreReader<'_> {
    fn get_global(&self, id: &Hash) -> CatalogResult<crate::global_log::GlobalLogEntry> {
        self.store.get_global_log(self.repository_id, id)
    }
}

/// A resolved `(local value, optional global value)` pair for one key.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ResolvedValue {
    pub content_id: ContentId,
    pub local_value: Vec<u8>,
    pub global_value: Option<Vec<u8>>,
}

/// One entry of a key list stream: `(key, content id, disposition)`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KeyListItem {
    pub key: ContentKey,
    pub content_id: ContentId,
    pub disposition: ContentDisposition,
}

/// A single differing key between two commits.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Difference {
    pub key: ContentKey,
    pub from_value: Option<Vec<u8>>,
    pub to_value: Option<Vec<u8>>,
}

/// Resolves `hash` against `head`: returns `head` if `hash` is `None`,
/// otherwise verifies `hash` is reachable from `head` by primary-parent
/// walking.
pub fn hash_on_reference(
    reader: &StoreReader<'_>,
    reference: &RefName,
    head: &Hash,
    hash: Option<&Hash>,
) -> CatalogResult<Hash> {
    match hash {
        None => Ok(head.clone()),
        Some(hash) => {
            if is_ancestor(reader, hash, head)? {
                Ok(hash.clone())
            } else {
                Err(CatalogError::HashNotOnReference {
                    reference: reference.clone(),
                    hash: hash.hex(),
                })
            }
        }
    }
}

/// Looks up the given `keys` at `commit`, skipping any for which `filter`
/// returns `false`.
///
/// Resolves each key's value by walking primary parents directly (via
/// [`resolve_value_at`]) rather than stopping at the nearest embedded key
/// list: a materialised key list records only `(CID, disposition)`, never
/// the value bytes, so a key last touched before that boundary needs the
/// walk to continue past it.
pub fn values(
    reader: &StoreReader<'_>,
    commit: &Hash,
    keys: &[ContentKey],
    filter: impl Fn(&ContentKey, &ContentId, ContentDisposition) -> bool,
) -> CatalogResult<BTreeMap<ContentKey, ResolvedValue>> {
    let mut result = BTreeMap::new();
    for key in keys {
        let Some((content_id, disposition, local_value)) = resolve_value_at(reader, commit, key)? else {
            continue;
        };
        if !filter(key, &content_id, disposition) {
            continue;
        }
        let global_value = match disposition {
            ContentDisposition::OnReference => None,
            ContentDisposition::WithGlobalState => {
                let head = reader.store.get_global_pointer(reader.repository_id)?
                    .map(|p| p.global_id)
                    .unwrap_or_else(Hash::no_ancestor);
                current_global_value(reader, &head, &content_id)?
            }
        };
        result.insert(key.clone(), ResolvedValue { content_id, local_value, global_value });
    }
    Ok(result)
}

/// Streams `(key, content id, disposition)` for every key live at `commit`.
pub fn keys(
    reader: &StoreReader<'_>,
    commit: &Hash,
    filter: impl Fn(&ContentKey, &ContentId, ContentDisposition) -> bool,
) -> CatalogResult<Vec<KeyListItem>> {
    let key_list = rebuild_key_list(reader, commit)?;
    Ok(key_list
        .into_iter()
        .filter(|(key, (content_id, disposition))| filter(key, content_id, *disposition))
        .map(|(key, (content_id, disposition))| KeyListItem {
            key,
            content_id,
            disposition,
        })
        .collect())
}

/// An explicit, closeable cursor over the commit log, following primary
/// parents from `offset` back to the root. Restartable by constructing a
/// new cursor with the last observed hash.
pub struct CommitLogCursor<'a> {
    reader: StoreReader<'a>,
    next: Option<Hash>,
}

impl<'a> CommitLogCursor<'a> {
    pub fn new(reader: StoreReader<'a>, offset: Hash) -> Self {
        Self { reader, next: Some(offset) }
    }

    /// Releases the cursor. Dropping it has the same effect; this exists
    /// for callers that want an explicit release point.
    pub fn close(self) {}
}

impl Iterator for CommitLogCursor<'_> {
    type Item = CatalogResult<CommitEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;
        match self.reader.get_commit(&hash) {
            Ok(entry) => {
                if !entry.is_root() {
                    self.next = Some(entry.primary_parent().clone());
                }
                Some(Ok(entry))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

/// Computes the set-symmetric difference of the key lists at `from` and
/// `to`, emitting an entry only where the values actually differ.
pub fn diff(
    reader: &StoreReader<'_>,
    from: &Hash,
    to: &Hash,
    filter: impl Fn(&ContentKey, &ContentId, ContentDisposition) -> bool,
) -> CatalogResult<Vec<Difference>> {
    let from_list = rebuild_key_list(reader, from)?;
    let to_list = rebuild_key_list(reader, to)?;

    let mut keys: std::collections::BTreeSet<ContentKey> =
        from_list.keys().cloned().chain(to_list.keys().cloned()).collect();
    keys.retain(|key| {
        let pass = |list: &BTreeMap<ContentKey, (ContentId, ContentDisposition)>| {
            list.get(key).map_or(true, |(cid, d)| filter(key, cid, *d))
        };
        pass(&from_list) && pass(&to_list)
    });

    let mut result = Vec::new();
    for key in keys {
        let from_value = resolve_value_at(reader, from, &key)?.map(|(_, _, value)| value);
        let to_value = resolve_value_at(reader, to, &key)?.map(|(_, _, value)| value);
        if from_value != to_value {
            result.push(Difference { key, from_value, to_value });
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::CommitEntry;
    use crate::commit::PutOp;
    use crate::store::MemStore;
    use crate::timestamp::Timestamp;

    fn put(key: &str, value: &str) -> PutOp {
        PutOp {
            key: ContentKey::new([key]).unwrap(),
            content_id: ContentId::new(format!("cid-{key}")),
            disposition: ContentDisposition::OnReference,
            value: value.as_bytes().to_vec(),
            global_value: None,
        }
    }

    #[test]
    fn test_values_and_commit_log_linear() {
        let store = MemStore::new();
        let root = CommitEntry::build(None, None, Timestamp(0), vec![], vec![], vec![], 20).unwrap();
        store.put_commit_log("repo", root.clone()).unwrap();
        let c1 = CommitEntry::build(
            Some(&root),
            None,
            Timestamp(1),
            b"commit 1".to_vec(),
            vec![put("a", "1")],
            vec![],
            20,
        )
        .unwrap();
        store.put_commit_log("repo", c1.clone()).unwrap();
        let c2 = CommitEntry::build(
            Some(&c1),
            None,
            Timestamp(2),
            b"commit 2".to_vec(),
            vec![put("a", "2")],
            vec![],
            20,
        )
        .unwrap();
        store.put_commit_log("repo", c2.clone()).unwrap();

        let reader = StoreReader { store: &store, repository_id: "repo" };
        let key = ContentKey::new(["a"]).unwrap();
        let resolved = values(&reader, &c2.hash, &[key.clone()], |_, _, _| true).unwrap();
        assert_eq!(resolved.get(&key).unwrap().local_value, b"2");

        let cursor = CommitLogCursor::new(reader, c2.hash.clone());
        let entries: Vec<_> = cursor.map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 3); // c2, c1, root
        assert_eq!(entries[0].commit_seq, 2);
        assert_eq!(entries[1].commit_seq, 1);
        assert_eq!(entries[2].commit_seq, 0);
    }

    #[test]
    fn test_diff_only_emits_changed_keys() {
        let store = MemStore::new();
        let root = CommitEntry::build(None, None, Timestamp(0), vec![], vec![], vec![], 20).unwrap();
        store.put_commit_log("repo", root.clone()).unwrap();
        let c1 = CommitEntry::build(
            Some(&root),
            None,
            Timestamp(1),
            vec![],
            vec![put("a", "1"), put("b", "1")],
            vec![],
            20,
        )
        .unwrap();
        store.put_commit_log("repo", c1.clone()).unwrap();
        let c2 = CommitEntry::build(
            Some(&c1),
            None,
            Timestamp(2),
            vec![],
            vec![put("a", "2")],
            vec![],
            20,
        )
        .unwrap();
        store.put_commit_log("repo", c2.clone()).unwrap();

        let reader = StoreReader { store: &store, repository_id: "repo" };
        let diffs = diff(&reader, &c1.hash, &c2.hash, |_, _, _| true).unwrap();
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].key, ContentKey::new(["a"]).unwrap());
        assert_eq!(diffs[0].from_value, Some(b"1".to_vec()));
        assert_eq!(diffs[0].to_value, Some(b"2".to_vec()));
    }
}
