// Copyright 2025 Actor Bench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Platform adapters for actor-bench.
//!
//! Each adapter implements the collaborator traits from
//! [`actor_bench_core::platform`]:
//!
//! - **Apify**: the Apify v2 REST API over `reqwest`
//! - **Memory**: a scripted in-memory platform for tests and dry runs
//!
//! # Example
//!
//! ```ignore
//! use actor_bench_adapters::prelude::*;
//!
//! let apify = ApifyClient::new(DEFAULT_BASE_URL, token, timeout)?;
//! let memory = InMemoryPlatform::new();
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod apify;
pub mod memory;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::apify::{ApifyClient, RetryPolicy, DEFAULT_BASE_URL};
    pub use super::memory::{InMemoryPlatform, RunScript, StoredRecord};
}

pub use apify::{ApifyClient, RetryPolicy};
pub use memory::InMemoryPlatform;
