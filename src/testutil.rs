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

//! `cfg(test)`-only builders: a one-call fixture for a `MemStore`-backed
//! repository, and helpers for synthesizing commits with deterministic
//! (seeded, not wall-clock) timestamps so tests never race on `SystemTime`.

#![cfg(test)]

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use crate::commit::PutOp;
use crate::config::CatalogConfig;
use crate::content_key::ContentDisposition;
use crate::content_key::ContentId;
use crate::content_key::ContentKey;
use crate::error::CatalogResult;
use crate::hash::Hash;
use crate::ref_name::RefName;
use crate::ref_name::RefType;
use crate::repo::DatabaseAdapter;
use crate::store::MemStore;
use crate::timestamp::Timestamp;

/// A `MemStore` plus an initialized repository with a single `main`
/// branch, ready for a test to start committing against.
pub struct TestRepo {
    pub store: MemStore,
    pub config: CatalogConfig,
    pub root: Hash,
}

impl TestRepo {
    pub fn new(repository_id: &str) -> Self {
        let store = MemStore::new();
        let config = CatalogConfig::default().with_repository_id(repository_id);
        let root = {
            let adapter = DatabaseAdapter::new(&store, config.clone());
            let root = adapter.initialize_repo(Timestamp(0)).expect("initialize_repo");
            adapter
                .create_reference(&RefName::new("main"), RefType::Branch, &root, Timestamp(0))
                .expect("create main");
            root
        };
        Self { store, config, root }
    }

    pub fn adapter(&self) -> DatabaseAdapter<'_> {
        DatabaseAdapter::new(&self.store, self.config.clone())
    }

    /// Commits `count` synthetic puts onto `main`, advancing a seeded
    /// clock by one tick per commit, and returns the resulting head.
    pub fn seed_commits(&self, count: u64, seed: u64) -> CatalogResult<Hash> {
        let adapter = self.adapter();
        let main = RefName::new("main");
        let mut rng = ChaChaRng::seed_from_u64(seed);
        let mut head = self.root.clone();
        for i in 0..count {
            let suffix: u32 = rng.random();
            let put = PutOp {
                key: ContentKey::new([format!("key-{i}")]).expect("key"),
                content_id: ContentId::new(format!("cid-{i}-{suffix}")),
                disposition: ContentDisposition::OnReference,
                value: format!("value-{i}-{suffix}").into_bytes(),
                global_value: None,
            };
            head = adapter.commit(&main, None, vec![], vec![put], vec![], Timestamp(i as i64 + 1))?;
        }
        Ok(head)
    }
}

#[cfg(test)]
mod tests {
    use super::TestRepo;

    #[test]
    fn seed_commits_is_deterministic_for_a_fixed_seed() {
        let repo_a = TestRepo::new("seed-a");
        let head_a = repo_a.seed_commits(5, 42).unwrap();

        let repo_b = TestRepo::new("seed-b");
        let head_b = repo_b.seed_commits(5, 42).unwrap();

        assert_eq!(head_a, head_b);
    }

    #[test]
    fn different_seeds_diverge() {
        let repo_a = TestRepo::new("seed-c");
        let head_a = repo_a.seed_commits(5, 1).unwrap();

        let repo_b = TestRepo::new("seed-d");
        let head_b = repo_b.seed_commits(5, 2).unwrap();

        assert_ne!(head_a, head_b);
    }
}
