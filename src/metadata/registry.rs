//! Connection descriptors for provisioned shards.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ShardId;

/// Everything needed to reach one shard's database.
///
/// Field names are part of the persisted document and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl ConnectionDescriptor {
    /// The descriptor of a freshly provisioned shard.
    ///
    /// Provisioning names the database, its login, and its password after
    /// the shard token itself; only the host is decided by the
    /// provisioner.
    pub fn provisioned(shard: ShardId, host: impl Into<String>) -> Self {
        let token = shard.to_string();
        Self {
            host: host.into(),
            username: token.clone(),
            password: token.clone(),
            database: token,
        }
    }
}

/// Shard id to connection descriptor map.
///
/// Ordered so iteration, reports, and the persisted document are
/// deterministic. A lookup miss means the partition table references a
/// shard the registry does not know, which is metadata corruption.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardRegistry {
    entries: BTreeMap<ShardId, ConnectionDescriptor>,
}

impl ShardRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries(entries: BTreeMap<ShardId, ConnectionDescriptor>) -> Self {
        Self { entries }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, shard: ShardId) -> bool {
        self.entries.contains_key(&shard)
    }

    /// Look up the descriptor for `shard`.
    pub fn get(&self, shard: ShardId) -> Result<&ConnectionDescriptor> {
        self.entries.get(&shard).ok_or(Error::UnknownShard(shard))
    }

    pub fn insert(&mut self, shard: ShardId, descriptor: ConnectionDescriptor) {
        self.entries.insert(shard, descriptor);
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShardId, &ConnectionDescriptor)> {
        self.entries.iter().map(|(id, desc)| (*id, desc))
    }

    pub(crate) fn entries(&self) -> &BTreeMap<ShardId, ConnectionDescriptor> {
        &self.entries
    }
}
