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

//! A content-addressed, Git-like versioned metadata catalog.
//!
//! A repository is a graph of immutable commit entries reachable from
//! named branches and tags through a single atomically-updated root
//! record (the Global Pointer). Writers commit, merge, and transplant
//! content under optimistic concurrency; readers resolve any reachable
//! commit and rebuild its live key set; garbage collection identifies
//! content no longer reachable from any reference as of a cutoff time.
//!
//! [`repo::DatabaseAdapter`] is the façade tying the commit engine,
//! reference manager, read path and GC walker to a single [`store::Store`].

pub mod commit;
pub mod config;
pub mod content_hash;
pub mod content_key;
pub mod engine;
pub mod error;
pub mod gc;
pub mod global_log;
pub mod hash;
pub mod hex_util;
pub mod pointer;
pub mod read;
pub mod ref_log;
pub mod ref_name;
pub mod reference;
pub mod repo;
pub mod repo_description;
pub mod store;
#[cfg(test)]
pub mod testutil;
pub mod timestamp;

pub use config::CatalogConfig;
pub use error::CatalogError;
pub use error::CatalogResult;
pub use hash::Hash;
pub use repo::DatabaseAdapter;
pub use store::MemStore;
pub use store::Store;
