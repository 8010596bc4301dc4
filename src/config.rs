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

//! The enumerated configuration surface (§6/§4.11).
//!
//! Plain struct with explicit fields and a `Default` impl carrying the
//! documented defaults; no file-format parsing lives in the core; an
//! embedding service is expected to supply a populated `CatalogConfig`.

/// Configuration for a single repository's database adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Identifies this repository's records among others sharing a store.
    pub repository_id: String,
    /// Commits between embedded key-list materialisations.
    pub default_key_list_distance: u32,
    /// CAS retry attempts before a commit reports `ReferenceConflict`.
    pub commit_retries: u32,
    /// Maximum secondary parents retained per commit entry.
    pub parent_per_commit: u32,
    /// Size of the global-log parents ring buffer kept in the pointer.
    pub global_parents_ring: u32,
    /// Size of the ref-log parents ring buffer kept in the pointer.
    pub ref_log_parents_ring: u32,
    /// Target false-positive probability for GC bloom filters.
    pub bloom_filter_fpp: f64,
    /// Expected bloom filter entry count; `None` defaults to the default
    /// branch's total commit count at GC time.
    pub bloom_filter_expected_entries: Option<u64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            repository_id: "default".to_string(),
            default_key_list_distance: 20,
            commit_retries: 5,
            parent_per_commit: 20,
            global_parents_ring: 20,
            ref_log_parents_ring: 20,
            bloom_filter_fpp: 0.01,
            bloom_filter_expected_entries: None,
        }
    }
}

impl CatalogConfig {
    pub fn with_repository_id(mut self, repository_id: impl Into<String>) -> Self {
        self.repository_id = repository_id.into();
        self
    }

    pub fn with_default_key_list_distance(mut self, distance: u32) -> Self {
        self.default_key_list_distance = distance;
        self
    }

    pub fn with_commit_retries(mut self, retries: u32) -> Self {
        self.commit_retries = retries;
        self
    }

    pub fn with_bloom_filter_fpp(mut self, fpp: f64) -> Self {
        self.bloom_filter_fpp = fpp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CatalogConfig::default();
        assert_eq!(config.default_key_list_distance, 20);
        assert_eq!(config.commit_retries, 5);
        assert_eq!(config.parent_per_commit, 20);
        assert_eq!(config.global_parents_ring, 20);
        assert_eq!(config.ref_log_parents_ring, 20);
        assert_eq!(config.bloom_filter_fpp, 0.01);
        assert_eq!(config.bloom_filter_expected_entries, None);
    }

    #[test]
    fn test_builder_overrides() {
        let config = CatalogConfig::default()
            .with_repository_id("repo-1")
            .with_commit_retries(10);
        assert_eq!(config.repository_id, "repo-1");
        assert_eq!(config.commit_retries, 10);
    }
}
