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

//! Reference management (C8): creating, deleting and re-assigning named
//! references, plus repository lifecycle (`initializeRepo`/`eraseRepo`).

use tracing::instrument;

use crate::commit::CommitEntry;
use crate::commit::commits_since;
use crate::commit::common_ancestor;
use crate::config::CatalogConfig;
use crate::error::CatalogError;
use crate::error::CatalogResult;
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

/// Which optional, log-walking fields to compute for a `namedRef`/`namedRefs`
/// query. Every field defaults to `false`/`None`, the cheapest query (a
/// single Global Pointer read, no commit-log walk at all).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NamedRefParams {
    pub include_commit_meta: bool,
    pub include_num_commits: bool,
    pub include_num_total_commits: bool,
    pub retrieve_common_ancestor_with: Option<RefName>,
}

/// A named reference's pointer plus whichever optional fields `params`
/// requested.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NamedRefInfo {
    pub name: RefName,
    pub pointer: RefPointer,
    /// The HEAD commit's metadata, when `include_commit_meta` was set.
    pub commit_meta: Option<Vec<u8>>,
    /// Commits strictly since the common ancestor with
    /// `retrieve_common_ancestor_with`, when both that and
    /// `include_num_commits` were set.
    pub num_commits: Option<u64>,
    /// Total commits from the root to HEAD (`commit_seq + 1`), when
    /// `include_num_total_commits` was set. Read directly off the HEAD
    /// entry's `commit_seq`, no log walk required.
    pub num_total_commits: Option<u64>,
    /// The common ancestor with `retrieve_common_ancestor_with`'s current
    /// HEAD, when that option was set.
    pub common_ancestor: Option<Hash>,
}

/// Creates the repository's root commit and an empty Global Pointer. A
/// no-op (returns the existing root) if the repository is already
/// initialized.
#[instrument(skip(store, config))]
pub fn initialize_repo(store: &dyn Store, config: &CatalogConfig, now: Timestamp) -> CatalogResult<Hash> {
    // The root commit's hash is deterministic, so recomputing it on an
    // already-initialized repository is harmless; only the first caller's
    // CAS actually installs the empty pointer.
    let root = CommitEntry::build(None, None, now, vec![], vec![], vec![], config.default_key_list_distance)?;
    store.put_commit_log(&config.repository_id, root.clone())?;
    if store.get_global_pointer(&config.repository_id)?.is_none() {
        let pointer = GlobalPointer::new(config.global_parents_ring as usize, config.ref_log_parents_ring as usize);
        store.cas_global_pointer(&config.repository_id, None, pointer)?;
    }
    Ok(root.hash)
}

/// Deletes every record belonging to the repository (C8 `eraseRepo`).
/// Irreversible; intended for test teardown and full repository deletion.
pub fn erase_repo(store: &dyn Store, config: &CatalogConfig) -> CatalogResult<()> {
    store.erase(&config.repository_id)
}

/// Creates a new named reference pointing at `target_hash` (C8 `create`).
/// Fails with `ReferenceAlreadyExists` if the name is already in use.
#[instrument(skip(store, config))]
pub fn create_reference(
    store: &dyn Store,
    config: &CatalogConfig,
    name: &RefName,
    ref_type: RefType,
    target_hash: &Hash,
    now: Timestamp,
) -> CatalogResult<()> {
    for _ in 0..=config.commit_retries {
        let current = store
            .get_global_pointer(&config.repository_id)?
            .unwrap_or_else(|| {
                GlobalPointer::new(config.global_parents_ring as usize, config.ref_log_parents_ring as usize)
            });
        if current.get_reference(name).is_some() {
            return Err(CatalogError::ReferenceAlreadyExists(name.clone()));
        }

        let ref_log_entry = RefLogEntry::build(
            current.ref_log_id.clone(),
            name.clone(),
            ref_type,
            target_hash.clone(),
            RefLogOperation::CreateReference,
            now,
            vec![],
        );

        let mut new_pointer = current.clone();
        new_pointer.touch_reference(name.clone(), RefPointer { ref_type, hash: target_hash.clone() });
        new_pointer.advance_ref_log(ref_log_entry.ref_log_id.clone());

        let existing = store.get_global_pointer(&config.repository_id)?;
        if store.cas_global_pointer(&config.repository_id, existing.as_ref(), new_pointer)? {
            store.put_ref_log(&config.repository_id, ref_log_entry)?;
            return Ok(());
        }
    }
    Err(CatalogError::reference_conflict(format!(
        "exhausted {} CAS retries creating '{name}'",
        config.commit_retries
    )))
}

/// Deletes `name`, requiring its current target to equal `expected`
/// (C8 `delete`).
#[instrument(skip(store, config))]
pub fn delete_reference(
    store: &dyn Store,
    config: &CatalogConfig,
    name: &RefName,
    expected: &Hash,
    now: Timestamp,
) -> CatalogResult<()> {
    for _ in 0..=config.commit_retries {
        let current = store
            .get_global_pointer(&config.repository_id)?
            .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))?;
        let existing_ref = current
            .get_reference(name)
            .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))?;
        if &existing_ref.hash != expected {
            return Err(CatalogError::reference_conflict(format!(
                "reference '{name}' moved since the expected head was read"
            )));
        }

        let ref_log_entry = RefLogEntry::build(
            current.ref_log_id.clone(),
            name.clone(),
            existing_ref.ref_type,
            existing_ref.hash.clone(),
            RefLogOperation::DeleteReference,
            now,
            vec![],
        );

        let mut new_pointer = current.clone();
        new_pointer.remove_reference(name);
        new_pointer.advance_ref_log(ref_log_entry.ref_log_id.clone());

        if store.cas_global_pointer(&config.repository_id, Some(&current), new_pointer)? {
            store.put_ref_log(&config.repository_id, ref_log_entry)?;
            return Ok(());
        }
    }
    Err(CatalogError::reference_conflict(format!(
        "exhausted {} CAS retries deleting '{name}'",
        config.commit_retries
    )))
}

/// Re-points `name` at `target_hash`, requiring its current target to
/// equal `expected` (C8 `assign`). `target_hash` need not be a descendant
/// of `expected`: assignment is an unconditional retarget, unlike
/// `commit`.
#[instrument(skip(store, config))]
pub fn assign_reference(
    store: &dyn Store,
    config: &CatalogConfig,
    name: &RefName,
    expected: &Hash,
    target_hash: &Hash,
    now: Timestamp,
) -> CatalogResult<()> {
    for _ in 0..=config.commit_retries {
        let current = store
            .get_global_pointer(&config.repository_id)?
            .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))?;
        let existing_ref = current
            .get_reference(name)
            .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))?;
        if &existing_ref.hash != expected {
            return Err(CatalogError::reference_conflict(format!(
                "reference '{name}' moved since the expected head was read"
            )));
        }
        // Existence of `target_hash` in the commit log is the caller's
        // responsibility to have established; this operation does not
        // require it to be an ancestor of the current target.
        let ref_log_entry = RefLogEntry::build(
            current.ref_log_id.clone(),
            name.clone(),
            existing_ref.ref_type,
            target_hash.clone(),
            RefLogOperation::AssignReference,
            now,
            vec![existing_ref.hash.clone()],
        );

        let mut new_pointer = current.clone();
        new_pointer.touch_reference(
            name.clone(),
            RefPointer { ref_type: existing_ref.ref_type, hash: target_hash.clone() },
        );
        new_pointer.advance_ref_log(ref_log_entry.ref_log_id.clone());

        if store.cas_global_pointer(&config.repository_id, Some(&current), new_pointer)? {
            store.put_ref_log(&config.repository_id, ref_log_entry)?;
            return Ok(());
        }
    }
    Err(CatalogError::reference_conflict(format!(
        "exhausted {} CAS retries assigning '{name}'",
        config.commit_retries
    )))
}

/// Looks up a single named reference, computing only the fields `params`
/// requests (C8 `namedRef`).
pub fn named_ref(
    store: &dyn Store,
    config: &CatalogConfig,
    name: &RefName,
    params: &NamedRefParams,
) -> CatalogResult<NamedRefInfo> {
    let pointer = store
        .get_global_pointer(&config.repository_id)?
        .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))?;
    let ref_pointer = pointer
        .get_reference(name)
        .cloned()
        .ok_or_else(|| CatalogError::ReferenceNotFound(name.clone()))?;
    build_named_ref_info(store, config, &pointer, name, &ref_pointer, params)
}

/// Lists every named reference, most-recently-touched first, each with
/// only the fields `params` requests (C8 `namedRefs`).
pub fn named_refs(
    store: &dyn Store,
    config: &CatalogConfig,
    params: &NamedRefParams,
) -> CatalogResult<Vec<NamedRefInfo>> {
    let Some(pointer) = store.get_global_pointer(&config.repository_id)? else {
        return Ok(Vec::new());
    };
    pointer
        .named_references
        .clone()
        .into_iter()
        .map(|(name, ref_pointer)| build_named_ref_info(store, config, &pointer, &name, &ref_pointer, params))
        .collect()
}

/// Computes `params`'s requested fields for one reference, walking the
/// commit log only as far as each requested field needs.
fn build_named_ref_info(
    store: &dyn Store,
    config: &CatalogConfig,
    global_pointer: &GlobalPointer,
    name: &RefName,
    ref_pointer: &RefPointer,
    params: &NamedRefParams,
) -> CatalogResult<NamedRefInfo> {
    let head_entry = if params.include_commit_meta || params.include_num_total_commits {
        Some(store.get_commit_log(&config.repository_id, &ref_pointer.hash)?)
    } else {
        None
    };
    let commit_meta = params.include_commit_meta.then(|| head_entry.as_ref().unwrap().metadata.clone());
    let num_total_commits =
        params.include_num_total_commits.then(|| head_entry.as_ref().unwrap().commit_seq + 1);

    let mut common_ancestor_hash = None;
    let mut num_commits = None;
    if let Some(other_name) = &params.retrieve_common_ancestor_with {
        let other_ref = global_pointer
            .get_reference(other_name)
            .ok_or_else(|| CatalogError::ReferenceNotFound(other_name.clone()))?;
        let reader = StoreReader { store, repository_id: &config.repository_id };
        let ancestor = common_ancestor(&reader, &ref_pointer.hash, &other_ref.hash)?;
        if params.include_num_commits {
            num_commits = Some(commits_since(&reader, &ancestor, &ref_pointer.hash)?.len() as u64);
        }
        common_ancestor_hash = Some(ancestor);
    }

    Ok(NamedRefInfo {
        name: name.clone(),
        pointer: ref_pointer.clone(),
        commit_meta,
        num_commits,
        num_total_commits,
        common_ancestor: common_ancestor_hash,
    })
}
