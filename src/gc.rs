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

//! GC live-set identification (C9): two-pass bloom-filter construction over
//! every live and dead reference, followed by expired-content
//! identification.

use std::collections::HashMap;

use bloomfilter::Bloom;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::debug;
use tracing::instrument;
use tracing::warn;

use crate::commit::rebuild_key_list;
use crate::config::CatalogConfig;
use crate::content_hash::hash_of;
use crate::content_key::ContentId;
use crate::error::CatalogResult;
use crate::hash::Hash;
use crate::read::StoreReader;
use crate::ref_log::RefLogOperation;
use crate::ref_name::RefName;
use crate::store::Store;
use crate::timestamp::Timestamp;

/// One reference's walk starting point for GC: either a live named
/// reference's current HEAD, or a dead reference's dropped hash with the
/// time of the operation that dropped it.
#[derive(Clone, Debug)]
struct WalkRoot {
    reference: RefName,
    head: Hash,
    observed_at: Timestamp,
}

/// Per-CID live-content bloom filters produced by pass 1, plus the set of
/// CIDs whose filter grew beyond its sizing estimate (and so may exceed
/// the target false-positive rate).
pub struct LiveSet {
    filters: HashMap<ContentId, Bloom<Hash>>,
    degraded: Vec<ContentId>,
}

/// One piece of content identified as globally expired in pass 2.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct IdentifiedExpired {
    pub content_id: ContentId,
    pub reference: RefName,
    pub value_fingerprint: Hash,
}

/// The outcome of walking a single reference, with a success flag so one
/// reference's failure does not abort the whole job.
pub struct ReferenceWalkResult {
    pub reference: RefName,
    pub success: bool,
}

/// Enumerates every live named reference plus every dead reference found
/// in the ref-log (entries for `DeleteReference`/`AssignReference`).
fn enumerate_walk_roots(store: &dyn Store, config: &CatalogConfig) -> CatalogResult<Vec<WalkRoot>> {
    let mut roots = Vec::new();
    if let Some(pointer) = store.get_global_pointer(&config.repository_id)? {
        for (name, ref_pointer) in &pointer.named_references {
            roots.push(WalkRoot {
                reference: name.clone(),
                head: ref_pointer.hash.clone(),
                observed_at: Timestamp::now(),
            });
        }

        let mut ref_log_id = pointer.ref_log_id.clone();
        while !ref_log_id.is_no_ancestor() {
            let entry = store.get_ref_log(&config.repository_id, &ref_log_id)?;
            if matches!(entry.operation, RefLogOperation::DeleteReference | RefLogOperation::AssignReference) {
                if let Some(dropped) = entry.dropped_hash() {
                    roots.push(WalkRoot {
                        reference: entry.ref_name.clone(),
                        head: dropped.clone(),
                        observed_at: entry.operation_time,
                    });
                }
            }
            ref_log_id = entry.parents[0].clone();
        }
    }
    Ok(roots)
}

/// Fingerprints a put's value into a fixed-size bloom-filter item.
fn fingerprint(value: &[u8]) -> Hash {
    hash_of(&value.to_vec())
}

/// Collects the `(CID, fingerprint)` pairs a single reference walk
/// contributes to the live set, per §4.9 pass 1.
///
/// Walks the live region (commits at or after `cutoff`) unconditionally,
/// then stops at the first commit at or below `cutoff`: every live key's
/// current value there is resolved directly by [`crate::read::values`],
/// which itself walks only as far back as each individual key's last put
/// requires. This accounts for every live key exactly once without
/// continuing the reference walk into the rest of the expired region.
fn collect_live_entries(
    reader: &StoreReader<'_>,
    root: &WalkRoot,
    cutoff: Timestamp,
) -> CatalogResult<Vec<(ContentId, Hash)>> {
    debug!(reference = %root.reference, observed_at = root.observed_at.as_micros(), "starting GC walk");
    let mut entries = Vec::new();
    let mut current = reader.get_commit(&root.head)?;

    loop {
        if current.created_time.as_micros() >= cutoff.as_micros() {
            for put in &current.puts {
                entries.push((put.content_id.clone(), fingerprint(&put.value)));
            }
            if current.is_root() {
                return Ok(entries);
            }
            current = reader.get_commit(current.primary_parent())?;
            continue;
        }

        // First commit at or below the cutoff: every live key's value here
        // is resolved directly, bounding the walk instead of continuing
        // through the rest of the expired region down to the root.
        let key_list = rebuild_key_list(reader, &current.hash)?;
        let local_values = crate::read::values(
            reader,
            &current.hash,
            &key_list.keys().cloned().collect::<Vec<_>>(),
            |_, _, _| true,
        )?;
        for resolved in local_values.values() {
            entries.push((resolved.content_id.clone(), fingerprint(&resolved.local_value)));
        }
        return Ok(entries);
    }
}

/// Pass 1: builds the per-CID live-content bloom filters. Per-reference
/// work runs in parallel via `rayon`.
#[instrument(skip(store, config))]
pub fn build_live_set(store: &dyn Store, config: &CatalogConfig, cutoff: Timestamp) -> CatalogResult<LiveSet> {
    let roots = enumerate_walk_roots(store, config)?;

    let per_reference: Vec<CatalogResult<Vec<(ContentId, Hash)>>> = roots
        .par_iter()
        .map(|root| {
            let reader = StoreReader { store, repository_id: &config.repository_id };
            collect_live_entries(&reader, root, cutoff)
        })
        .collect();

    let all_entries: Vec<(ContentId, Hash)> = per_reference
        .into_iter()
        .collect::<CatalogResult<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    let grouped: HashMap<ContentId, Vec<Hash>> = all_entries.into_iter().into_group_map();

    let expected_entries = config.bloom_filter_expected_entries;
    let mut filters = HashMap::new();
    let mut degraded = Vec::new();
    for (content_id, fingerprints) in grouped {
        let sizing = expected_entries.unwrap_or(fingerprints.len().max(1) as u64);
        let mut filter = Bloom::new_for_fp_rate(sizing.max(1) as usize, config.bloom_filter_fpp)
            .expect("bloom_filter_fpp and sizing are always in valid range");
        if fingerprints.len() as u64 > sizing {
            degraded.push(content_id.clone());
            warn!(%content_id, observed = fingerprints.len(), sized_for = sizing, "bloom filter sized below observed entry count");
        }
        for fp in &fingerprints {
            filter.set(fp);
        }
        filters.insert(content_id, filter);
    }

    Ok(LiveSet { filters, degraded })
}

/// Pass 2: re-walks every reference, testing each put's value against its
/// CID's bloom filter. A miss means the content is globally expired.
#[instrument(skip(store, config, live_set))]
pub fn identify_expired(
    store: &dyn Store,
    config: &CatalogConfig,
    live_set: &LiveSet,
) -> CatalogResult<(Vec<IdentifiedExpired>, Vec<ReferenceWalkResult>)> {
    let roots = enumerate_walk_roots(store, config)?;

    let per_reference: Vec<(RefName, CatalogResult<Vec<IdentifiedExpired>>)> = roots
        .par_iter()
        .map(|root| {
            let reader = StoreReader { store, repository_id: &config.repository_id };
            let result = walk_for_expired(&reader, root, live_set);
            (root.reference.clone(), result)
        })
        .collect();

    let mut expired = Vec::new();
    let mut statuses = Vec::new();
    for (reference, result) in per_reference {
        match result {
            Ok(found) => {
                statuses.push(ReferenceWalkResult { reference, success: true });
                expired.extend(found);
            }
            Err(_) => {
                statuses.push(ReferenceWalkResult { reference, success: false });
            }
        }
    }
    Ok((expired, statuses))
}

fn walk_for_expired(
    reader: &StoreReader<'_>,
    root: &WalkRoot,
    live_set: &LiveSet,
) -> CatalogResult<Vec<IdentifiedExpired>> {
    let mut found = Vec::new();
    let mut current = reader.get_commit(&root.head)?;
    loop {
        for put in &current.puts {
            let fp = fingerprint(&put.value);
            let is_live = live_set
                .filters
                .get(&put.content_id)
                .map(|filter| filter.check(&fp))
                .unwrap_or(false);
            if !is_live {
                found.push(IdentifiedExpired {
                    content_id: put.content_id.clone(),
                    reference: root.reference.clone(),
                    value_fingerprint: fp,
                });
            }
        }
        if current.is_root() {
            break;
        }
        current = reader.get_commit(current.primary_parent())?;
    }
    Ok(found)
}

impl LiveSet {
    /// CIDs whose bloom filter was undersized for the observed entry
    /// count, and so may exceed the configured false-positive target.
    pub fn degraded_content_ids(&self) -> &[ContentId] {
        &self.degraded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::PutOp;
    use crate::config::CatalogConfig;
    use crate::content_key::ContentDisposition;
    use crate::content_key::ContentKey;
    use crate::engine::CommitRequest;
    use crate::engine::commit;
    use crate::reference::create_reference;
    use crate::reference::delete_reference;
    use crate::reference::initialize_repo;
    use crate::ref_name::RefType;
    use crate::store::MemStore;

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
    fn test_gc_retains_value_live_at_cutoff_from_dropped_reference() {
        let store = MemStore::new();
        let config = CatalogConfig::default().with_repository_id("gc1");
        let root = initialize_repo(&store, &config, Timestamp(0)).unwrap();
        create_reference(&store, &config, &RefName::new("main"), RefType::Branch, &root, Timestamp(0)).unwrap();

        let v1 = commit(
            &store,
            &config,
            &RefName::new("main"),
            None,
            CommitRequest { metadata: vec![], puts: vec![put("a", "v1")], deletes: vec![] },
            Timestamp(10),
        )
        .unwrap();

        create_reference(&store, &config, &RefName::new("dropped"), RefType::Branch, &v1, Timestamp(10)).unwrap();
        delete_reference(&store, &config, &RefName::new("dropped"), &v1, Timestamp(11)).unwrap();

        commit(
            &store,
            &config,
            &RefName::new("main"),
            None,
            CommitRequest { metadata: vec![], puts: vec![put("a", "v2")], deletes: vec![] },
            Timestamp(20),
        )
        .unwrap();
        commit(
            &store,
            &config,
            &RefName::new("main"),
            None,
            CommitRequest { metadata: vec![], puts: vec![put("a", "v3")], deletes: vec![] },
            Timestamp(30),
        )
        .unwrap();

        let cutoff = Timestamp(15);
        let live_set = build_live_set(&store, &config, cutoff).unwrap();
        let v1_fp = fingerprint(b"v1");
        assert!(live_set.filters.get(&ContentId::new("cid-a")).unwrap().check(&v1_fp));

        let (_expired, statuses) = identify_expired(&store, &config, &live_set).unwrap();
        assert!(statuses.iter().all(|s| s.success));
    }
}
