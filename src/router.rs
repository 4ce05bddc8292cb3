//! Routing (origin date, username) pairs to shards.
//!
//! Routing is a pure function of a metadata snapshot: find the partition
//! range covering the origin date, hash the username under that range's
//! modulus, and assemble the shard id. [`Router`] wraps the function with
//! snapshot loading; [`locate_at`] is the function itself, with the clock
//! passed in, which is what tests and replay tooling want.
//!
//! Determinism is the whole point: the same metadata, date, and username
//! always produce the same shard, and growing the table never changes
//! where history routes.

use std::sync::Arc;

use tracing::debug;

use crate::error::{Error, Result};
use crate::hash;
use crate::metadata::{ConnectionDescriptor, Metadata, MetadataStore};
use crate::types::{HourStamp, ShardId};

/// Route against an explicit snapshot and clock.
///
/// Precondition order is part of the contract: an empty username is
/// rejected before metadata is consulted, empty metadata before any date
/// comparison, and a future or pre-deployment date before any hashing.
pub fn locate_at(
    metadata: &Metadata,
    origin: HourStamp,
    username: &str,
    now: HourStamp,
) -> Result<ShardId> {
    if username.is_empty() {
        return Err(Error::InvalidArgument(
            "username must not be empty".to_string(),
        ));
    }
    if metadata.is_empty() {
        return Err(Error::EmptyMetadata);
    }
    let range = metadata.table().locate_range(origin, now)?;
    let bucket = hash::bucket(username, range.modulus());
    Ok(ShardId::new(range.start(), bucket))
}

/// Routes lookups against the current persisted metadata.
///
/// Every call loads a fresh snapshot, so a router held across a
/// resharding operation simply starts seeing the grown table once the
/// store's atomic replace lands; no invalidation hooks needed.
#[derive(Debug, Clone)]
pub struct Router {
    store: Arc<MetadataStore>,
}

impl Router {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// The shard owning rows keyed by (`origin`, `username`).
    pub fn locate(&self, origin: HourStamp, username: &str) -> Result<ShardId> {
        let metadata = self.store.load()?;
        let shard = locate_at(&metadata, origin, username, HourStamp::now())?;
        debug!(%shard, %origin, "routed lookup");
        Ok(shard)
    }

    /// Like [`locate`](Self::locate), but also returns the shard's
    /// connection descriptor so the caller can issue its query.
    pub fn resolve(
        &self,
        origin: HourStamp,
        username: &str,
    ) -> Result<(ShardId, ConnectionDescriptor)> {
        let metadata = self.store.load()?;
        let shard = locate_at(&metadata, origin, username, HourStamp::now())?;
        let descriptor = metadata.registry().get(shard)?.clone();
        Ok((shard, descriptor))
    }
}
