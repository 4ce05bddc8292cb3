//! Partition metadata: the routing table, the shard registry, and the
//! persisted document that ties them together.
//!
//! # Components
//!
//! - [`PartitionTable`]: ordered, contiguous date ranges ([`table`])
//! - [`ShardRegistry`]: shard id to connection descriptor map ([`registry`])
//! - [`Metadata`]: one consistent snapshot of both, passed by value
//! - [`MetadataStore`]: durable, atomically replaced persistence ([`store`])
//!
//! # Snapshot discipline
//!
//! Readers never share a live, mutating view. Every routing decision loads
//! a [`Metadata`] snapshot and works on that value; mutations build a new
//! snapshot and atomically replace the persisted document. A concurrent
//! reader therefore observes either the pre- or post-mutation state,
//! never a mixture.
//!
//! # Document format
//!
//! The persisted JSON mirrors the legacy layout exactly, index-aligned
//! parallel arrays and all, because external tooling reads it in place:
//!
//! ```text
//! {
//!   "Ranges": { "Start": [...], "End": [..., null], "Moduli": [...] },
//!   "Connections": { "r<start>h<bucket>": { "host": ..., "username": ...,
//!                                           "password": ..., "database": ... } }
//! }
//! ```
//!
//! `null` in `End` marks the open range. Decoding runs full validation, so
//! a document that violates the table or cross-reference invariants is
//! rejected as [`Error::CorruptMetadata`](crate::error::Error) instead of
//! being half-loaded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{HourStamp, Modulus, ShardId};

pub mod registry;
pub mod store;
pub mod table;

pub use registry::{ConnectionDescriptor, ShardRegistry};
pub use store::MetadataStore;
pub use table::{PartitionRange, PartitionTable};

/// One consistent snapshot of the partition table and shard registry.
///
/// Construction cross-validates the two sides: every shard id the table
/// derives must have a connection entry, and every connection entry must
/// belong to a table range. Holding a `Metadata` therefore implies the
/// pair is coherent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    table: PartitionTable,
    registry: ShardRegistry,
}

impl Metadata {
    /// The pre-initiation state: no ranges, no shards.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting table/registry mismatches as corrupt.
    pub fn new(table: PartitionTable, registry: ShardRegistry) -> Result<Self> {
        Self::cross_validate(&table, &registry)?;
        Ok(Self { table, registry })
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty() && self.registry.is_empty()
    }

    #[inline]
    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    #[inline]
    pub fn registry(&self) -> &ShardRegistry {
        &self.registry
    }

    fn cross_validate(table: &PartitionTable, registry: &ShardRegistry) -> Result<()> {
        let derived: BTreeSet<ShardId> = table.shard_ids().collect();
        for shard in &derived {
            if !registry.contains(*shard) {
                return Err(Error::CorruptMetadata(format!(
                    "shard {shard} is in the partition table but has no connection entry"
                )));
            }
        }
        for shard in registry.shard_ids() {
            if !derived.contains(&shard) {
                return Err(Error::CorruptMetadata(format!(
                    "connection entry {shard} belongs to no partition range"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn to_document(&self) -> MetadataDocument {
        let mut start = Vec::with_capacity(self.table.len());
        let mut end = Vec::with_capacity(self.table.len());
        let mut moduli = Vec::with_capacity(self.table.len());
        for range in self.table.ranges() {
            start.push(range.start().value());
            end.push(range.end().map(HourStamp::value));
            moduli.push(range.modulus().value());
        }
        MetadataDocument {
            ranges: RangesDocument { start, end, moduli },
            connections: self.registry.entries().clone(),
        }
    }

    pub(crate) fn from_document(doc: MetadataDocument) -> Result<Self> {
        let RangesDocument { start, end, moduli } = doc.ranges;
        if start.len() != end.len() || start.len() != moduli.len() {
            return Err(Error::CorruptMetadata(format!(
                "parallel range arrays disagree: {} starts, {} ends, {} moduli",
                start.len(),
                end.len(),
                moduli.len()
            )));
        }
        let mut ranges = Vec::with_capacity(start.len());
        for ((start, end), modulus) in start.into_iter().zip(end).zip(moduli) {
            let modulus = Modulus::new(modulus)
                .map_err(|_| Error::CorruptMetadata(format!("range starting {start} has modulus 0")))?;
            let start = HourStamp::new(start);
            ranges.push(match end {
                Some(end) => PartitionRange::closed(start, HourStamp::new(end), modulus),
                None => PartitionRange::open(start, modulus),
            });
        }
        let table = PartitionTable::from_ranges(ranges)?;
        let registry = ShardRegistry::from_entries(doc.connections);
        Self::new(table, registry)
    }
}

/// Serde mirror of the persisted JSON document.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct MetadataDocument {
    #[serde(rename = "Ranges")]
    ranges: RangesDocument,
    #[serde(rename = "Connections")]
    connections: BTreeMap<ShardId, ConnectionDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RangesDocument {
    #[serde(rename = "Start")]
    start: Vec<u64>,
    #[serde(rename = "End")]
    end: Vec<Option<u64>>,
    #[serde(rename = "Moduli")]
    moduli: Vec<u32>,
}
