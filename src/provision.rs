//! The shard provisioner seam.
//!
//! Lifecycle operations create and tear down database instances through
//! [`Provisioner`], typically backed by an infrastructure tool. The core
//! decides *which* shards exist; the provisioner decides *where* they run.
//!
//! # Contract
//!
//! - `create` receives the full list of planned shard ids and returns the
//!   host each one landed on. A successful return must cover every
//!   requested id. On failure the implementation cleans up whatever it
//!   partially created; the lifecycle manager only deprovisions shards
//!   whose creation was reported successful.
//! - `destroy` is best-effort and reports an outcome per shard instead of
//!   short-circuiting, so teardown can release as much as possible.
//! - Neither call needs its own deadline; the lifecycle manager bounds
//!   them with its configured timeout.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error as ThisError;

use crate::types::ShardId;

pub type ProvisionResult<T> = std::result::Result<T, ProvisionError>;

/// Failures a provisioner implementation reports.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ProvisionError {
    /// Instance creation failed; nothing usable was left behind.
    #[error("instance creation failed: {0}")]
    Create(String),

    /// Teardown of one instance failed; the instance may still be running.
    #[error("instance teardown failed: {0}")]
    Teardown(String),
}

/// Creates and tears down the database instances behind shards.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Provision one instance per planned shard, returning each shard's
    /// host address.
    async fn create(&self, shards: &[ShardId]) -> ProvisionResult<HashMap<ShardId, String>>;

    /// Tear down the instances behind `shards`, reporting success or
    /// failure per shard.
    async fn destroy(&self, shards: &[ShardId]) -> Vec<(ShardId, ProvisionResult<()>)>;
}
