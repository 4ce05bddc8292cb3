//! Stored-volume monitoring across every shard.
//!
//! A capacity sweep asks each shard's database how many bytes it holds and
//! flags the ones above the near-full threshold, giving operators time to
//! run an expansion before writes start landing on a full instance. Sweeps
//! are read-only: they never touch metadata, and a failing shard fails the
//! sweep loudly rather than vanishing from the report.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::FederationConfig;
use crate::error::{Error, Result};
use crate::executor::{fan_out, QueryExecutor, QueryOutcome};
use crate::metadata::{ConnectionDescriptor, MetadataStore};
use crate::types::ShardId;

/// The probe each shard answers: total data plus index bytes of the
/// connected schema. `DATABASE()` resolves to the descriptor's `database`,
/// so one statement serves every shard.
pub const STORED_VOLUME_STATEMENT: &str = "SELECT SUM(data_length + index_length) \
     FROM information_schema.tables WHERE table_schema = DATABASE()";

/// Outcome of one capacity sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityReport {
    sizes: BTreeMap<ShardId, u64>,
    near_full: BTreeSet<ShardId>,
    threshold_bytes: u64,
}

impl CapacityReport {
    /// Stored bytes per shard, every shard present.
    pub fn sizes(&self) -> &BTreeMap<ShardId, u64> {
        &self.sizes
    }

    /// The shards above the near-full threshold.
    pub fn near_full(&self) -> &BTreeSet<ShardId> {
        &self.near_full
    }

    /// The threshold this sweep compared against.
    pub fn threshold_bytes(&self) -> u64 {
        self.threshold_bytes
    }

    pub fn is_near_full(&self, shard: ShardId) -> bool {
        self.near_full.contains(&shard)
    }

    pub fn any_near_full(&self) -> bool {
        !self.near_full.is_empty()
    }
}

/// Runs capacity sweeps through the configured executor.
#[derive(Debug, Clone)]
pub struct CapacityMonitor<E> {
    store: Arc<MetadataStore>,
    executor: Arc<E>,
    near_full_bytes: u64,
    max_concurrent_probes: usize,
}

impl<E: QueryExecutor> CapacityMonitor<E> {
    pub fn new(store: Arc<MetadataStore>, executor: Arc<E>, config: &FederationConfig) -> Self {
        Self {
            store,
            executor,
            near_full_bytes: config.near_full_bytes,
            max_concurrent_probes: config.max_concurrent_probes,
        }
    }

    /// Probe every registered shard and report sizes plus near-full flags.
    ///
    /// Probes run concurrently, bounded by the configured limit. Any probe
    /// failure fails the whole sweep with the shard named; a partial
    /// report would read as "everything else is fine".
    pub async fn capacities(&self) -> Result<CapacityReport> {
        let metadata = self.store.load()?;
        if metadata.is_empty() {
            return Err(Error::EmptyMetadata);
        }
        let targets: Vec<(ShardId, ConnectionDescriptor)> = metadata
            .registry()
            .iter()
            .map(|(shard, descriptor)| (shard, descriptor.clone()))
            .collect();

        let outcomes = fan_out(
            self.executor.as_ref(),
            &targets,
            STORED_VOLUME_STATEMENT,
            self.max_concurrent_probes,
        )
        .await?;

        let mut sizes = BTreeMap::new();
        let mut near_full = BTreeSet::new();
        for (shard, outcome) in outcomes {
            let bytes =
                volume_from_outcome(&outcome).ok_or(Error::MalformedProbe { shard })?;
            if bytes > self.near_full_bytes {
                warn!(%shard, bytes, threshold = self.near_full_bytes, "shard is near full");
                near_full.insert(shard);
            }
            sizes.insert(shard, bytes);
        }
        info!(
            shards = sizes.len(),
            near_full = near_full.len(),
            "capacity sweep complete"
        );
        Ok(CapacityReport {
            sizes,
            near_full,
            threshold_bytes: self.near_full_bytes,
        })
    }
}

/// Interpret a probe outcome as stored bytes.
///
/// `SUM(...)` over an empty schema is NULL, which is zero bytes; anything
/// that is not a single-value row resembling a size is malformed.
fn volume_from_outcome(outcome: &QueryOutcome) -> Option<u64> {
    match outcome {
        QueryOutcome::Rows(rows) => {
            let value = rows.first()?.first()?;
            if matches!(value, crate::executor::SqlValue::Null) {
                Some(0)
            } else {
                value.as_u64()
            }
        }
        QueryOutcome::Affected(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SqlValue;

    #[test]
    fn test_volume_from_integer_row() {
        let outcome = QueryOutcome::Rows(vec![vec![SqlValue::Integer(1_048_576)]]);
        assert_eq!(volume_from_outcome(&outcome), Some(1_048_576));
    }

    #[test]
    fn test_volume_from_decimal_text_row() {
        let outcome = QueryOutcome::Rows(vec![vec![SqlValue::Text("3145728001".to_string())]]);
        assert_eq!(volume_from_outcome(&outcome), Some(3_145_728_001));
    }

    #[test]
    fn test_volume_from_empty_schema_is_zero() {
        let outcome = QueryOutcome::Rows(vec![vec![SqlValue::Null]]);
        assert_eq!(volume_from_outcome(&outcome), Some(0));
    }

    #[test]
    fn test_volume_rejects_malformed_outcomes() {
        assert_eq!(volume_from_outcome(&QueryOutcome::Rows(vec![])), None);
        assert_eq!(volume_from_outcome(&QueryOutcome::Rows(vec![vec![]])), None);
        assert_eq!(volume_from_outcome(&QueryOutcome::Affected(3)), None);
        let negative = QueryOutcome::Rows(vec![vec![SqlValue::Integer(-5)]]);
        assert_eq!(volume_from_outcome(&negative), None);
    }

    #[test]
    fn test_probe_statement_targets_connected_schema() {
        assert!(STORED_VOLUME_STATEMENT.contains("information_schema.tables"));
        assert!(STORED_VOLUME_STATEMENT.contains("DATABASE()"));
        assert!(STORED_VOLUME_STATEMENT.contains("data_length + index_length"));
    }
}
