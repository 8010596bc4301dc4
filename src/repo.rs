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

//! The Database Adapter facade: a single entry point combining the
//! persistence contract, commit engine, reference manager, read path and
//! GC walker behind one repository-scoped handle.

use crate::commit::CommitEntry;
use crate::commit::PutOp;
use crate::config::CatalogConfig;
use crate::content_key::ContentDisposition;
use crate::content_key::ContentId;
use crate::content_key::ContentKey;
use crate::engine;
use crate::engine::CommitRequest;
use crate::error::CatalogResult;
use crate::gc;
use crate::gc::IdentifiedExpired;
use crate::gc::ReferenceWalkResult;
use crate::hash::Hash;
use crate::read;
use crate::read::CommitLogCursor;
use crate::read::Difference;
use crate::read::KeyListItem;
use crate::read::ResolvedValue;
use crate::read::StoreReader;
use crate::reference;
use crate::reference::NamedRefInfo;
use crate::reference::NamedRefParams;
use crate::ref_name::RefName;
use crate::ref_name::RefType;
use crate::store::Store;
use crate::timestamp::Timestamp;

/// A repository-scoped handle over a [`Store`], exposing every adapter
/// operation without requiring callers to thread `config`/`store` through
/// each call themselves.
pub struct DatabaseAdapter<'s> {
    store: &'s dyn Store,
    config: CatalogConfig,
}

impl<'s> DatabaseAdapter<'s> {
    pub fn new(store: &'s dyn Store, config: CatalogConfig) -> Self {
        Self { store, config }
    }

    fn reader(&self) -> StoreReader<'_> {
        StoreReader { store: self.store, repository_id: &self.config.repository_id }
    }

    pub fn initialize_repo(&self, now: Timestamp) -> CatalogResult<Hash> {
        reference::initialize_repo(self.store, &self.config, now)
    }

    pub fn erase_repo(&self) -> CatalogResult<()> {
        reference::erase_repo(self.store, &self.config)
    }

    pub fn create_reference(
        &self,
        name: &RefName,
        ref_type: RefType,
        target_hash: &Hash,
        now: Timestamp,
    ) -> CatalogResult<()> {
        reference::create_reference(self.store, &self.config, name, ref_type, target_hash, now)
    }

    pub fn delete_reference(&self, name: &RefName, expected: &Hash, now: Timestamp) -> CatalogResult<()> {
        reference::delete_reference(self.store, &self.config, name, expected, now)
    }

    pub fn assign_reference(
        &self,
        name: &RefName,
        expected: &Hash,
        target_hash: &Hash,
        now: Timestamp,
    ) -> CatalogResult<()> {
        reference::assign_reference(self.store, &self.config, name, expected, target_hash, now)
    }

    pub fn named_ref(&self, name: &RefName, params: &NamedRefParams) -> CatalogResult<NamedRefInfo> {
        reference::named_ref(self.store, &self.config, name, params)
    }

    pub fn named_refs(&self, params: &NamedRefParams) -> CatalogResult<Vec<NamedRefInfo>> {
        reference::named_refs(self.store, &self.config, params)
    }

    pub fn commit(
        &self,
        reference: &RefName,
        expected_head: Option<&Hash>,
        metadata: Vec<u8>,
        puts: Vec<PutOp>,
        deletes: Vec<ContentKey>,
        now: Timestamp,
    ) -> CatalogResult<Hash> {
        engine::commit(
            self.store,
            &self.config,
            reference,
            expected_head,
            CommitRequest { metadata, puts, deletes },
            now,
        )
    }

    pub fn merge(
        &self,
        source_head: &Hash,
        target: &RefName,
        now: Timestamp,
        rewrite_metadata: impl Fn(&CommitEntry) -> Vec<u8>,
    ) -> CatalogResult<Hash> {
        engine::merge(self.store, &self.config, source_head, target, now, rewrite_metadata)
    }

    pub fn transplant(
        &self,
        since: &Hash,
        source_head: &Hash,
        target: &RefName,
        now: Timestamp,
        rewrite_metadata: impl Fn(&CommitEntry) -> Vec<u8>,
    ) -> CatalogResult<Hash> {
        engine::transplant(self.store, &self.config, since, source_head, target, now, rewrite_metadata)
    }

    pub fn hash_on_reference(&self, reference: &RefName, hash: Option<&Hash>) -> CatalogResult<Hash> {
        let head = self.named_ref(reference, &NamedRefParams::default())?.pointer.hash;
        read::hash_on_reference(&self.reader(), reference, &head, hash)
    }

    pub fn values(
        &self,
        commit: &Hash,
        keys: &[ContentKey],
        filter: impl Fn(&ContentKey, &ContentId, ContentDisposition) -> bool,
    ) -> CatalogResult<std::collections::BTreeMap<ContentKey, ResolvedValue>> {
        read::values(&self.reader(), commit, keys, filter)
    }

    pub fn keys(
        &self,
        commit: &Hash,
        filter: impl Fn(&ContentKey, &ContentId, ContentDisposition) -> bool,
    ) -> CatalogResult<Vec<KeyListItem>> {
        read::keys(&self.reader(), commit, filter)
    }

    pub fn diff(
        &self,
        from: &Hash,
        to: &Hash,
        filter: impl Fn(&ContentKey, &ContentId, ContentDisposition) -> bool,
    ) -> CatalogResult<Vec<Difference>> {
        read::diff(&self.reader(), from, to, filter)
    }

    /// Returns a cursor over the commit log starting at `offset`, following
    /// primary parents. Dropping (or calling `close` on) the cursor
    /// releases it; a fresh cursor can restart from any previously
    /// observed hash.
    pub fn commit_log(&self, offset: Hash) -> CommitLogCursor<'_> {
        CommitLogCursor::new(self.reader(), offset)
    }

    pub fn run_gc(&self, cutoff: Timestamp) -> CatalogResult<(Vec<IdentifiedExpired>, Vec<ReferenceWalkResult>)> {
        let live_set = gc::build_live_set(self.store, &self.config, cutoff)?;
        gc::identify_expired(self.store, &self.config, &live_set)
    }
}
