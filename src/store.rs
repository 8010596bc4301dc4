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

//! The abstract persistence contract (C10) the rest of the adapter is
//! written against, plus an in-memory reference implementation (C14) used
//! by tests and small deployments.
//!
//! Concrete bindings (RDBMS, DynamoDB, RocksDB, …) implement [`Store`];
//! the engine, reference manager and GC walker never see a concrete
//! database type.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::commit::CommitEntry;
use crate::error::CatalogError;
use crate::error::CatalogResult;
use crate::global_log::GlobalLogEntry;
use crate::hash::Hash;
use crate::pointer::GlobalPointer;
use crate::ref_log::RefLogEntry;

/// The abstract CAS store the engine requires (§6).
pub trait Store: Send + Sync + std::fmt::Debug {
    /// Reads the current Global Pointer. `None` if the repository has not
    /// been initialized (or has been erased).
    fn get_global_pointer(&self, repository_id: &str) -> CatalogResult<Option<GlobalPointer>>;

    /// Atomically replaces the Global Pointer, succeeding only if the
    /// stored value still matches `expected` byte-for-byte.
    fn cas_global_pointer(
        &self,
        repository_id: &str,
        expected: Option<&GlobalPointer>,
        new: GlobalPointer,
    ) -> CatalogResult<bool>;

    /// Writes a commit entry. Idempotent on `entry.hash`.
    fn put_commit_log(&self, repository_id: &str, entry: CommitEntry) -> CatalogResult<()>;

    fn get_commit_log(&self, repository_id: &str, hash: &Hash) -> CatalogResult<CommitEntry>;

    fn batch_get_commit_log(
        &self,
        repository_id: &str,
        hashes: &[Hash],
    ) -> CatalogResult<Vec<CommitEntry>> {
        hashes
            .iter()
            .map(|hash| self.get_commit_log(repository_id, hash))
            .collect()
    }

    /// Writes a global-state log entry. Idempotent on `entry.id`.
    fn put_global_log(&self, repository_id: &str, entry: GlobalLogEntry) -> CatalogResult<()>;

    fn get_global_log(&self, repository_id: &str, id: &Hash) -> CatalogResult<GlobalLogEntry>;

    /// Writes a ref-log entry. Idempotent on `entry.ref_log_id`.
    fn put_ref_log(&self, repository_id: &str, entry: RefLogEntry) -> CatalogResult<()>;

    fn get_ref_log(&self, repository_id: &str, id: &Hash) -> CatalogResult<RefLogEntry>;

    /// Removes every record tagged with `repository_id`.
    fn erase(&self, repository_id: &str) -> CatalogResult<()>;
}

#[derive(Debug, Default)]
struct RepoData {
    pointer: Option<GlobalPointer>,
    commits: HashMap<Hash, CommitEntry>,
    globals: HashMap<Hash, GlobalLogEntry>,
    ref_logs: HashMap<Hash, RefLogEntry>,
}

/// An in-process, thread-safe [`Store`] implementation. Not durable across
/// process restarts; intended for tests and as a drop-in for small or
/// embedded deployments.
#[derive(Debug, Default)]
pub struct MemStore {
    repos: RwLock<HashMap<String, RepoData>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(object_type: &str, hash: &Hash) -> CatalogError {
        CatalogError::InvalidArgument(format!("{object_type} {hash} not found"))
    }
}

impl Store for MemStore {
    fn get_global_pointer(&self, repository_id: &str) -> CatalogResult<Option<GlobalPointer>> {
        let repos = self.repos.read().unwrap();
        Ok(repos.get(repository_id).and_then(|r| r.pointer.clone()))
    }

    fn cas_global_pointer(
        &self,
        repository_id: &str,
        expected: Option<&GlobalPointer>,
        new: GlobalPointer,
    ) -> CatalogResult<bool> {
        let mut repos = self.repos.write().unwrap();
        let repo = repos.entry(repository_id.to_string()).or_default();
        if repo.pointer.as_ref() != expected {
            debug!(repository_id, "global pointer CAS miss");
            return Ok(false);
        }
        repo.pointer = Some(new);
        Ok(true)
    }

    fn put_commit_log(&self, repository_id: &str, entry: CommitEntry) -> CatalogResult<()> {
        let mut repos = self.repos.write().unwrap();
        let repo = repos.entry(repository_id.to_string()).or_default();
        repo.commits.entry(entry.hash.clone()).or_insert(entry);
        Ok(())
    }

    fn get_commit_log(&self, repository_id: &str, hash: &Hash) -> CatalogResult<CommitEntry> {
        let repos = self.repos.read().unwrap();
        repos
            .get(repository_id)
            .and_then(|r| r.commits.get(hash))
            .cloned()
            .ok_or_else(|| Self::not_found("commit", hash))
    }

    fn put_global_log(&self, repository_id: &str, entry: GlobalLogEntry) -> CatalogResult<()> {
        let mut repos = self.repos.write().unwrap();
        let repo = repos.entry(repository_id.to_string()).or_default();
        repo.globals.entry(entry.id.clone()).or_insert(entry);
        Ok(())
    }

    fn get_global_log(&self, repository_id: &str, id: &Hash) -> CatalogResult<GlobalLogEntry> {
        let repos = self.repos.read().unwrap();
        repos
            .get(repository_id)
            .and_then(|r| r.globals.get(id))
            .cloned()
            .ok_or_else(|| Self::not_found("global-log entry", id))
    }

    fn put_ref_log(&self, repository_id: &str, entry: RefLogEntry) -> CatalogResult<()> {
        let mut repos = self.repos.write().unwrap();
        let repo = repos.entry(repository_id.to_string()).or_default();
        repo.ref_logs.entry(entry.ref_log_id.clone()).or_insert(entry);
        Ok(())
    }

    fn get_ref_log(&self, repository_id: &str, id: &Hash) -> CatalogResult<RefLogEntry> {
        let repos = self.repos.read().unwrap();
        repos
            .get(repository_id)
            .and_then(|r| r.ref_logs.get(id))
            .cloned()
            .ok_or_else(|| CatalogError::RefLogNotFound(id.hex()))
    }

    fn erase(&self, repository_id: &str) -> CatalogResult<()> {
        let mut repos = self.repos.write().unwrap();
        repos.remove(repository_id);
        Ok(())
    }
}
