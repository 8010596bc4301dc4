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

//! The commit engine (C6): `commit`, `merge`, `transplant`, and the CAS
//! retry loop that backs all three.
//!
//! Every operation here follows the same shape: read the Global Pointer,
//! compute a new commit/global/ref-log chain against the reference's
//! current head, then attempt a single CAS on the pointer. A miss means
//! another writer landed first; the whole computation (not just the CAS)
//! is retried from a freshly-read pointer, because the new concurrent head
//! may itself invalidate the conflict check.

use std::collections::BTreeMap;

use tracing::debug;
use tracing::instrument;

use crate::commit::CommitEntry;
use crate::commit::PutOp;
use crate::commit::commits_since;
use crate::commit::common_ancestor;
use crate::commit::rebuild_key_list;
use crate::commit::resolve_value_at;
use crate::config::CatalogConfig;
use crate::content_key::ContentDisposition;
use crate::content_key::ContentKey;
use crate::error::CatalogError;
use crate::error::CatalogResult;
use crate::global_log::GlobalLogEntry;
use crate::global_log::GlobalPut;
use crate::hash::Hash;
use crate::pointer::GlobalPointer;
use crate::pointer::RefPointer;
use crate::read::StoreReader;
use crate::ref_log::RefLogEntry;
use crate::ref_log::RefLogOperation;
use crate::ref_name::RefName;
use crate::ref_name::RefType;
use crate::store::Store;
use crate::timestamp::Timestamp;

/// The content change requested of a single `commit` call, prior to the
/// engine resolving it against the current head.
#[derive(Clone, Debug, Default)]
pub struct CommitRequest {
    pub metadata: Vec<u8>,
    pub puts: Vec<PutOp>,
    pub deletes: Vec<ContentKey>,
}

/// Runs one CAS-retrying attempt loop against `store`, calling `attempt`
/// with the freshly-read pointer each time. `attempt` returns the new
/// pointer to try to install; the loop installs it via CAS and retries on
/// miss up to `config.commit_retries` times.
#[instrument(skip(store, config, attempt), fields(repository_id = %config.repository_id))]
fn retry_cas(
    store: &dyn Store,
    config: &CatalogConfig,
    mut attempt: impl FnMut(&GlobalPointer) -> CatalogResult<GlobalPointer>,
) -> CatalogResult<GlobalPointer> {
    for round in 0..=config.commit_retries {
        let current = store.get_global_pointer(&config.repository_id)?;
        let new_pointer = attempt(current.as_ref().unwrap_or(&GlobalPointer::new(
            config.global_parents_ring as usize,
            config.ref_log_parents_ring as usize,
        )))?;
        if store.cas_global_pointer(&config.repository_id, current.as_ref(), new_pointer.clone())? {
            return Ok(new_pointer);
        }
        debug!(round, "global pointer CAS miss, retrying");
    }
    Err(CatalogError::reference_conflict(format!(
        "exhausted {} CAS retries",
        config.commit_retries
    )))
}

fn reader<'a>(store: &'a dyn Store, config: &'a CatalogConfig) -> StoreReader<'a> {
    StoreReader { store, repository_id: &config.repository_id }
}

fn require_reference<'p>(
    pointer: &'p GlobalPointer,
    name: &RefName,
) -> CatalogResult<&'p RefPointer> {
    pointer
        .get_reference(name)
        .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))
}

/// Applies a single commit to `reference`'s current head (C6 `commit`).
///
/// `expected_head`, when given, requires the reference's current tip to
/// match exactly (a caller-supplied optimistic precondition, distinct from
/// the engine's own CAS retry on the Global Pointer).
#[instrument(skip(store, config, request))]
pub fn commit(
    store: &dyn Store,
    config: &CatalogConfig,
    reference: &RefName,
    expected_head: Option<&Hash>,
    request: CommitRequest,
    now: Timestamp,
) -> CatalogResult<Hash> {
    let mut new_commit_hash = None;
    retry_cas(store, config, |pointer| {
        let ref_pointer = require_reference(pointer, reference)?;
        if let Some(expected) = expected_head {
            if &ref_pointer.hash != expected {
                return Err(CatalogError::reference_conflict(format!(
                    "reference '{reference}' moved since the expected head was read"
                )));
            }
        }
        let parent = store.get_commit_log(&config.repository_id, &ref_pointer.hash)?;
        let parent_key_list = materialised_parent_key_list(store, config, &parent)?;

        let entry = CommitEntry::build(
            Some(&parent),
            parent_key_list.as_ref(),
            now,
            request.metadata.clone(),
            request.puts.clone(),
            request.deletes.clone(),
            config.default_key_list_distance,
        )?;
        store.put_commit_log(&config.repository_id, entry.clone())?;

        let ref_log_entry = RefLogEntry::build(
            pointer.ref_log_id.clone(),
            reference.clone(),
            ref_pointer.ref_type,
            entry.hash.clone(),
            RefLogOperation::Commit,
            now,
            vec![],
        );
        store.put_ref_log(&config.repository_id, ref_log_entry.clone())?;

        let mut new_pointer = pointer.clone();
        if let Some(global_entry) = global_entry_for_puts(pointer.global_id.clone(), &request.puts, now) {
            store.put_global_log(&config.repository_id, global_entry.clone())?;
            new_pointer.advance_global(global_entry.id);
        }
        new_pointer.touch_reference(
            reference.clone(),
            RefPointer { ref_type: ref_pointer.ref_type, hash: entry.hash.clone() },
        );
        new_pointer.advance_ref_log(ref_log_entry.ref_log_id);
        new_commit_hash = Some(entry.hash.clone());
        Ok(new_pointer)
    })?;
    Ok(new_commit_hash.expect("attempt always sets new_commit_hash on success"))
}

/// Returns the materialised key list at `entry`'s hash, as a map ready to
/// seed the next [`CommitEntry::build`] call.
fn materialised_parent_key_list(
    store: &dyn Store,
    config: &CatalogConfig,
    entry: &CommitEntry,
) -> CatalogResult<Option<BTreeMap<ContentKey, (crate::content_key::ContentId, crate::content_key::ContentDisposition)>>> {
    let reader = reader(store, config);
    Ok(Some(rebuild_key_list(&reader, &entry.hash)?))
}

/// Applies a batch of global-state puts, independent of any reference
/// (used when content disposition is `WithGlobalState`).
pub fn put_global(
    store: &dyn Store,
    config: &CatalogConfig,
    puts: Vec<GlobalPut>,
    now: Timestamp,
) -> CatalogResult<Hash> {
    let mut new_id = None;
    retry_cas(store, config, |pointer| {
        let entry = GlobalLogEntry::build(pointer.global_id.clone(), puts.clone(), now);
        store.put_global_log(&config.repository_id, entry.clone())?;
        let mut new_pointer = pointer.clone();
        new_pointer.advance_global(entry.id.clone());
        new_id = Some(entry.id.clone());
        Ok(new_pointer)
    })?;
    Ok(new_id.expect("attempt always sets new_id on success"))
}

/// The outcome of a three-way conflict check: either every changed key is
/// free of conflict, or the complete set of conflicting keys accumulated
/// across the whole comparison.
///
/// Compares the value most recently associated with each touched key at
/// `baseline` against the value most recently associated with it at
/// `target_head`, not merely the `(ContentId, ContentDisposition)` pair a
/// materialised key list records: two branches can put the same CID under
/// the same disposition with different bytes, and that must still surface
/// as a conflict rather than silently clobbering whichever side merges
/// second.
fn check_conflicts(
    reader: &StoreReader<'_>,
    baseline: &Hash,
    target_head: &Hash,
    incoming: &[CommitEntry],
) -> CatalogResult<Vec<ContentKey>> {
    let mut touched: std::collections::BTreeSet<ContentKey> = std::collections::BTreeSet::new();
    for entry in incoming {
        touched.extend(entry.puts.iter().map(|p| p.key.clone()));
        touched.extend(entry.deletes.iter().cloned());
    }

    let mut conflicts = Vec::new();
    for key in touched {
        let base_value = resolve_value_at(reader, baseline, &key)?;
        let target_value = resolve_value_at(reader, target_head, &key)?;
        if base_value != target_value {
            conflicts.push(key);
        }
    }
    Ok(conflicts)
}

/// Builds a `GlobalLogEntry` for the subset of `puts` with a
/// `WithGlobalState` disposition, or `None` if none of them do. A put's
/// `global_value` (absent for `OnReference` puts) supplies the entry's
/// payload.
fn global_entry_for_puts(global_parent: Hash, puts: &[PutOp], now: Timestamp) -> Option<GlobalLogEntry> {
    let global_puts: Vec<GlobalPut> = puts
        .iter()
        .filter(|p| p.disposition == ContentDisposition::WithGlobalState)
        .map(|p| GlobalPut { content_id: p.content_id.clone(), value: p.global_value.clone().unwrap_or_default() })
        .collect();
    if global_puts.is_empty() {
        return None;
    }
    Some(GlobalLogEntry::build(global_parent, global_puts, now))
}

/// Merges the commits on `source` since their common ancestor with
/// `target`'s current head onto `target` (C6 `merge`).
///
/// Conflict detection compares, per touched key, the common ancestor's
/// value against `target`'s *original* head value (not the growing tip),
/// so a full conflicting-key set is reported in one shot rather than
/// failing key-by-key.
#[instrument(skip(store, config, rewrite_metadata))]
pub fn merge(
    store: &dyn Store,
    config: &CatalogConfig,
    source_head: &Hash,
    target: &RefName,
    now: Timestamp,
    rewrite_metadata: impl Fn(&CommitEntry) -> Vec<u8>,
) -> CatalogResult<Hash> {
    let mut new_head = None;
    retry_cas(store, config, |pointer| {
        let target_pointer = require_reference(pointer, target)?;
        let target_head = target_pointer.hash.clone();
        let reader = reader(store, config);

        let baseline = common_ancestor(&reader, source_head, &target_head)?;
        let incoming = commits_since(&reader, &baseline, source_head)?;
        if incoming.is_empty() {
            return Err(CatalogError::invalid_argument(format!(
                "no hashes to merge from {}: already an ancestor of '{target}'",
                source_head.hex()
            )));
        }

        let conflicts = check_conflicts(&reader, &baseline, &target_head, &incoming)?;
        if !conflicts.is_empty() {
            return Err(CatalogError::conflicting_keys(
                format!("merge of {} onto '{target}' has conflicting keys", source_head.hex()),
                conflicts,
            ));
        }

        let mut tip = store.get_commit_log(&config.repository_id, &target_head)?;
        let mut new_pointer = pointer.clone();
        for source_entry in &incoming {
            let reader = reader(store, config);
            let parent_key_list = rebuild_key_list(&reader, &tip.hash)?;
            let metadata = rewrite_metadata(source_entry);
            tip = CommitEntry::build(
                Some(&tip),
                Some(&parent_key_list),
                now,
                metadata,
                source_entry.puts.clone(),
                source_entry.deletes.clone(),
                config.default_key_list_distance,
            )?;
            store.put_commit_log(&config.repository_id, tip.clone())?;
            if let Some(global_entry) = global_entry_for_puts(new_pointer.global_id.clone(), &tip.puts, now) {
                store.put_global_log(&config.repository_id, global_entry.clone())?;
                new_pointer.advance_global(global_entry.id);
            }
        }

        let ref_log_entry = RefLogEntry::build(
            pointer.ref_log_id.clone(),
            target.clone(),
            target_pointer.ref_type,
            tip.hash.clone(),
            RefLogOperation::Merge,
            now,
            incoming.iter().map(|e| e.hash.clone()).collect(),
        );
        store.put_ref_log(&config.repository_id, ref_log_entry.clone())?;

        new_pointer.touch_reference(
            target.clone(),
            RefPointer { ref_type: target_pointer.ref_type, hash: tip.hash.clone() },
        );
        new_pointer.advance_ref_log(ref_log_entry.ref_log_id);
        new_head = Some(tip.hash.clone());
        Ok(new_pointer)
    })?;
    Ok(new_head.expect("attempt always sets new_head on success"))
}

/// Re-parents the commits between `since` (exclusive) and `source_head`
/// (inclusive) onto `target`'s current head (C6 `transplant`).
///
/// Uses the same whole-batch conflict check as `merge`: the baseline is
/// `since` itself (the caller-supplied fork point), compared against
/// `target`'s original head.
#[instrument(skip(store, config, rewrite_metadata))]
pub fn transplant(
    store: &dyn Store,
    config: &CatalogConfig,
    since: &Hash,
    source_head: &Hash,
    target: &RefName,
    now: Timestamp,
    rewrite_metadata: impl Fn(&CommitEntry) -> Vec<u8>,
) -> CatalogResult<Hash> {
    let mut new_head = None;
    retry_cas(store, config, |pointer| {
        let target_pointer = require_reference(pointer, target)?;
        let target_head = target_pointer.hash.clone();
        let reader = reader(store, config);

        let incoming = commits_since(&reader, since, source_head)?;
        if incoming.is_empty() {
            return Err(CatalogError::invalid_argument("No hashes to transplant given."));
        }

        let conflicts = check_conflicts(&reader, since, &target_head, &incoming)?;
        if !conflicts.is_empty() {
            return Err(CatalogError::conflicting_keys(
                format!("transplant onto '{target}' has conflicting keys"),
                conflicts,
            ));
        }

        let mut tip = store.get_commit_log(&config.repository_id, &target_head)?;
        let mut new_pointer = pointer.clone();
        for source_entry in &incoming {
            let reader = reader(store, config);
            let parent_key_list = rebuild_key_list(&reader, &tip.hash)?;
            let metadata = rewrite_metadata(source_entry);
            tip = CommitEntry::build(
                Some(&tip),
                Some(&parent_key_list),
                now,
                metadata,
                source_entry.puts.clone(),
                source_entry.deletes.clone(),
                config.default_key_list_distance,
            )?;
            store.put_commit_log(&config.repository_id, tip.clone())?;
            if let Some(global_entry) = global_entry_for_puts(new_pointer.global_id.clone(), &tip.puts, now) {
                store.put_global_log(&config.repository_id, global_entry.clone())?;
                new_pointer.advance_global(global_entry.id);
            }
        }

        let ref_log_entry = RefLogEntry::build(
            pointer.ref_log_id.clone(),
            target.clone(),
            target_pointer.ref_type,
            tip.hash.clone(),
            RefLogOperation::Transplant,
            now,
            incoming.iter().map(|e| e.hash.clone()).collect(),
        );
        store.put_ref_log(&config.repository_id, ref_log_entry.clone())?;

        new_pointer.touch_reference(
            target.clone(),
            RefPointer { ref_type: target_pointer.ref_type, hash: tip.hash.clone() },
        );
        new_pointer.advance_ref_log(ref_log_entry.ref_log_id);
        new_head = Some(tip.hash.clone());
        Ok(new_pointer)
    })?;
    Ok(new_head.expect("attempt always sets new_head on success"))
}
