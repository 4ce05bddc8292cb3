//! # Timeshard
//! Date-range and username-hash routing for federated relational shards.
//!
//! A timeshard deployment splits one logical dataset across many small
//! database instances. Rows are placed by two keys: the hour a row
//! originated, which selects a partition range, and a hash of the owning
//! username, which selects a bucket inside that range. One shard exists per
//! (range, bucket) pair. Capacity grows by *resharding*: the open range is
//! closed at the current hour and a new open range with more buckets is
//! appended, so history is never rewritten and no row ever migrates.
//!
//! # Goals
//! - Deterministic routing: the same (date, username) resolves to the same
//!   shard forever, across any number of expansions
//! - Crash-safe metadata: one JSON document, atomically replaced, re-read
//!   per operation
//! - Explicit lifecycle: initiate, expand, destroy, with provisioning
//!   failures never half-committing metadata
//!
//! ## Getting started
//! Install `timeshard` with `cargo add timeshard` or include the following
//! snippet in your `Cargo.toml` dependencies:
//! ```toml
//! timeshard = "0.1"
//! ```
//!
//! ### Routing and lifecycle
//! The [`ReshardManager`](reshard::ReshardManager) drives the deployment
//! lifecycle through your [`Provisioner`](provision::Provisioner)
//! implementation; the [`Router`](router::Router) answers lookups against
//! whatever metadata is currently committed.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use timeshard::prelude::*;
//!
//! struct StaticHosts;
//!
//! #[async_trait]
//! impl Provisioner for StaticHosts {
//!     async fn create(
//!         &self,
//!         shards: &[ShardId],
//!     ) -> ProvisionResult<HashMap<ShardId, String>> {
//!         Ok(shards.iter().map(|s| (*s, "10.0.0.5".to_string())).collect())
//!     }
//!
//!     async fn destroy(&self, shards: &[ShardId]) -> Vec<(ShardId, ProvisionResult<()>)> {
//!         shards.iter().map(|s| (*s, Ok(()))).collect()
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = FederationConfig::from_env()?;
//!     let store = Arc::new(MetadataStore::new(&config.metadata_path));
//!     let manager = ReshardManager::new(store.clone(), Arc::new(StaticHosts), config);
//!
//!     // One-time setup: four buckets in the first partition range.
//!     let shards = manager.initiate(Modulus::new(4)?).await?;
//!     println!("provisioned {} shards", shards.len());
//!
//!     // Route rows for as long as the deployment lives.
//!     let router = Router::new(store);
//!     let shard = router.locate(HourStamp::now(), "ada")?;
//!     println!("rows for ada land on shard {shard}");
//!     Ok(())
//! }
//! ```
//!
//! When a capacity sweep ([`CapacityMonitor`](capacity::CapacityMonitor))
//! reports shards near full, run
//! [`expand`](reshard::ReshardManager::expand) with a larger modulus; old
//! rows keep routing to their original shards while new hours spread across
//! the wider layout.

#![forbid(unsafe_code)]

pub mod capacity;
pub mod config;
pub mod constants;
pub mod error;
pub mod executor;
pub mod hash;
pub mod metadata;
pub mod provision;
pub mod reshard;
pub mod router;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utilities"))]
pub mod mock;

pub mod prelude {
    //! Everything an embedding application typically needs.
    //!
    //! Brings in the routing entry points, the lifecycle manager and its
    //! collaborator traits, the metadata types, and the error surface.

    pub use crate::capacity::{CapacityMonitor, CapacityReport};
    pub use crate::config::FederationConfig;
    pub use crate::error::{DateRangeViolation, Error, Result};
    pub use crate::executor::{
        ExecutorError, ExecutorResult, QueryExecutor, QueryOutcome, SqlRow, SqlValue,
    };
    pub use crate::metadata::{ConnectionDescriptor, Metadata, MetadataStore};
    pub use crate::provision::{ProvisionError, ProvisionResult, Provisioner};
    pub use crate::reshard::{
        FederationStatus, RangeStatus, ReshardManager, TeardownConfirmation, TeardownReport,
    };
    pub use crate::router::Router;
    pub use crate::types::{BucketIndex, HourStamp, Modulus, ShardId};
}
