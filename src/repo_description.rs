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

//! The Repository Description: a small optimistically-versioned property
//! map persisted alongside the Global Pointer, distinct from it (it
//! describes the repository itself — schema version, feature flags — not
//! its commit history).

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::CatalogError;
use crate::error::CatalogResult;

/// A repository's versioned property bag.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
pub struct RepositoryDescription {
    pub repo_version: i32,
    pub properties: BTreeMap<String, String>,
}

/// Abstract optimistic-version store for a single [`RepositoryDescription`]
/// per repository id. Kept separate from [`crate::store::Store`] because
/// not every deployment backs the two with the same storage technology.
pub trait RepoDescriptionStore: Send + Sync {
    fn get(&self, repository_id: &str) -> CatalogResult<Option<RepositoryDescription>>;

    /// Installs `new` only if the stored value still equals `expected`
    /// byte-for-byte (`None` meaning "not yet created").
    fn cas(
        &self,
        repository_id: &str,
        expected: Option<&RepositoryDescription>,
        new: RepositoryDescription,
    ) -> CatalogResult<bool>;
}

/// Applies `updater` to the current description and persists the result,
/// retrying on CAS miss up to `retries` times. `updater` is a pure
/// function; returning `None` aborts the update without writing anything.
pub fn update_repo_description(
    store: &dyn RepoDescriptionStore,
    repository_id: &str,
    retries: u32,
    updater: impl Fn(&RepositoryDescription) -> Option<RepositoryDescription>,
) -> CatalogResult<RepositoryDescription> {
    for _ in 0..=retries {
        let current = store.get(repository_id)?.unwrap_or_default();
        let Some(next) = updater(&current) else {
            return Ok(current);
        };
        if store.cas(repository_id, Some(&current), next.clone())? {
            return Ok(next);
        }
    }
    Err(CatalogError::reference_conflict(format!(
        "exhausted {retries} CAS retries updating repository description for '{repository_id}'"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    #[derive(Default)]
    struct MapStore(RwLock<HashMap<String, RepositoryDescription>>);

    impl RepoDescriptionStore for MapStore {
        fn get(&self, repository_id: &str) -> CatalogResult<Option<RepositoryDescription>> {
            Ok(self.0.read().unwrap().get(repository_id).cloned())
        }

        fn cas(
            &self,
            repository_id: &str,
            expected: Option<&RepositoryDescription>,
            new: RepositoryDescription,
        ) -> CatalogResult<bool> {
            let mut map = self.0.write().unwrap();
            if map.get(repository_id) != expected {
                return Ok(false);
            }
            map.insert(repository_id.to_string(), new);
            Ok(true)
        }
    }

    #[test]
    fn test_update_applies_pure_function() {
        let store = MapStore::default();
        let updated = update_repo_description(&store, "repo", 5, |current| {
            let mut next = current.clone();
            next.repo_version += 1;
            next.properties.insert("owner".to_string(), "team-a".to_string());
            Some(next)
        })
        .unwrap();
        assert_eq!(updated.repo_version, 1);
        assert_eq!(updated.properties.get("owner"), Some(&"team-a".to_string()));
    }

    #[test]
    fn test_update_returning_none_aborts_without_writing() {
        let store = MapStore::default();
        let before = store.get("repo").unwrap();
        let result = update_repo_description(&store, "repo", 5, |_| None).unwrap();
        assert_eq!(result, before.unwrap_or_default());
        assert_eq!(store.get("repo").unwrap(), None);
    }
}
