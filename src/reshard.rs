//! Deployment lifecycle: initiate, expand, and destroy the shard fleet.
//!
//! All three operations follow the same read, provision, commit shape: load
//! a metadata snapshot, ask the provisioner for instances, and atomically
//! replace the persisted document. Instances are always provisioned before
//! the commit, so a provisioner failure leaves metadata untouched, and a
//! commit failure tears the freshly created instances back down. The result
//! is that metadata never references a shard that was not reported up.
//!
//! Mutations are serialized through one in-process lock. Router reads take
//! no lock at all; the store's atomic replace guarantees they observe
//! either the pre- or post-mutation document.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::config::FederationConfig;
use crate::constants::INITIAL_RANGE_BACKDATE_HOURS;
use crate::error::{Error, Result};
use crate::metadata::{
    ConnectionDescriptor, Metadata, MetadataStore, PartitionRange, PartitionTable, ShardRegistry,
};
use crate::provision::{ProvisionError, Provisioner};
use crate::types::{HourStamp, Modulus, ShardId};

/// Proof that the caller really means to tear the whole deployment down.
///
/// `destroy` deprovisions every shard and resets metadata to empty. The
/// token keeps that one deliberate step away from an ordinary method call.
#[derive(Debug, Clone, Copy)]
pub struct TeardownConfirmation(());

impl TeardownConfirmation {
    /// Confirm the teardown.
    pub const fn confirmed() -> Self {
        Self(())
    }
}

/// Per-shard outcome of a teardown.
///
/// Metadata is cleared regardless of what lands in `failed`; those entries
/// name instances that may still be running and need manual cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Shards whose instances were deprovisioned.
    pub released: Vec<ShardId>,
    /// Shards whose teardown failed, with the provisioner's reason.
    pub failed: Vec<(ShardId, String)>,
}

impl TeardownReport {
    /// Whether every instance was released.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One partition range as reported by [`ReshardManager::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeStatus {
    pub start: HourStamp,
    /// `None` for the open range.
    pub end: Option<HourStamp>,
    pub modulus: Modulus,
    pub shards: Vec<ShardId>,
}

/// Operator-facing snapshot of the deployment, oldest range first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationStatus {
    pub ranges: Vec<RangeStatus>,
}

impl FederationStatus {
    /// Total shard count across every range.
    pub fn shard_count(&self) -> usize {
        self.ranges.iter().map(|r| r.shards.len()).sum()
    }

    /// The open range's summary, always the last entry.
    pub fn open_range(&self) -> Option<&RangeStatus> {
        self.ranges.last().filter(|r| r.end.is_none())
    }
}

/// Runs the deployment lifecycle against a provisioner.
pub struct ReshardManager<P: Provisioner> {
    store: Arc<MetadataStore>,
    provisioner: Arc<P>,
    config: FederationConfig,
    /// Serializes the read, provision, commit critical section.
    mutation_lock: Mutex<()>,
}

impl<P: Provisioner> ReshardManager<P> {
    pub fn new(store: Arc<MetadataStore>, provisioner: Arc<P>, config: FederationConfig) -> Self {
        Self {
            store,
            provisioner,
            config,
            mutation_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &FederationConfig {
        &self.config
    }

    pub fn provisioner(&self) -> &Arc<P> {
        &self.provisioner
    }

    /// Bring up the first partition range and its shards.
    ///
    /// Only valid while metadata is empty. The range is back-dated a few
    /// hours so rows stamped just before the commit still route, and stays
    /// open until the first expansion. Returns the new shard ids in bucket
    /// order.
    pub async fn initiate(&self, modulus: Modulus) -> Result<Vec<ShardId>> {
        let _guard = self.mutation_lock.lock().await;
        let current = self.store.load()?;
        if !current.is_empty() {
            return Err(Error::AlreadyInitiated);
        }

        let start = HourStamp::now().back(INITIAL_RANGE_BACKDATE_HOURS);
        let table = PartitionTable::initial(start, modulus);
        let planned: Vec<ShardId> = table.shard_ids().collect();
        info!(%start, %modulus, shards = planned.len(), "initiating deployment");

        let hosts = self.create_bounded(&planned).await?;
        let mut created: Vec<ShardId> = hosts.keys().copied().collect();
        created.sort();

        let outcome = Self::assemble(table, ShardRegistry::empty(), &planned, &hosts)
            .and_then(|next| self.store.replace(&next));
        if let Err(e) = outcome {
            warn!(error = %e, "initiation failed after provisioning; tearing new shards down");
            self.rollback(&created).await;
            return Err(e);
        }

        info!(shards = planned.len(), "deployment initiated");
        Ok(planned)
    }

    /// Close the open range at the current hour and open a new one with
    /// `new_modulus` buckets, provisioning one shard per bucket.
    ///
    /// The close and the append land in one atomic document replace, so no
    /// reader ever sees a table without an open range. Requires the open
    /// range to have started strictly before the current hour; closing and
    /// reopening within the range's first hour would produce two ranges
    /// with the same start. Returns the new shard ids in bucket order.
    pub async fn expand(&self, new_modulus: Modulus) -> Result<Vec<ShardId>> {
        let _guard = self.mutation_lock.lock().await;
        let current = self.store.load()?;
        if current.is_empty() {
            return Err(Error::EmptyMetadata);
        }
        let open = current.table().open_range().ok_or_else(|| {
            Error::CorruptMetadata("metadata is non-empty but has no open range".to_string())
        })?;

        let now = HourStamp::now();
        if open.start() >= now {
            return Err(Error::MetadataDate {
                date: open.start(),
                detail: format!("open range must start before the current hour {now} to expand"),
            });
        }

        let new_start = now.next();
        let added: Vec<ShardId> = PartitionRange::open(new_start, new_modulus)
            .shard_ids()
            .collect();
        info!(
            close_at = %now,
            new_start = %new_start,
            modulus = %new_modulus,
            shards = added.len(),
            "expanding deployment"
        );

        let grown = current.table().grow(now, new_start, new_modulus)?;
        let hosts = self.create_bounded(&added).await?;
        let mut created: Vec<ShardId> = hosts.keys().copied().collect();
        created.sort();

        let outcome = Self::assemble(grown, current.registry().clone(), &added, &hosts)
            .and_then(|next| self.store.replace(&next));
        if let Err(e) = outcome {
            warn!(error = %e, "expansion failed after provisioning; tearing new shards down");
            self.rollback(&created).await;
            return Err(e);
        }

        info!(shards = added.len(), "deployment expanded");
        Ok(added)
    }

    /// Tear down every shard and reset metadata to empty.
    ///
    /// Teardown is best-effort per shard and never short-circuits; metadata
    /// is cleared even when some instances survive, because a stale shard
    /// reference poisons routing while an orphaned instance only costs
    /// money. Survivors are listed in the report for manual cleanup.
    pub async fn destroy(&self, _confirmation: TeardownConfirmation) -> Result<TeardownReport> {
        let _guard = self.mutation_lock.lock().await;
        let current = self.store.load()?;
        if current.is_empty() {
            return Err(Error::EmptyMetadata);
        }

        let shards: Vec<ShardId> = current.registry().shard_ids().collect();
        info!(shards = shards.len(), "destroying deployment");

        let outcomes = match timeout(
            self.config.provision_timeout,
            self.provisioner.destroy(&shards),
        )
        .await
        {
            Ok(outcomes) => outcomes,
            Err(_) => shards
                .iter()
                .map(|shard| {
                    (
                        *shard,
                        Err(ProvisionError::Teardown(format!(
                            "did not finish within {:?}",
                            self.config.provision_timeout
                        ))),
                    )
                })
                .collect(),
        };

        let mut report = TeardownReport::default();
        for (shard, outcome) in outcomes {
            match outcome {
                Ok(()) => report.released.push(shard),
                Err(e) => {
                    warn!(%shard, error = %e, "teardown failed; instance may still be running");
                    report.failed.push((shard, e.to_string()));
                }
            }
        }

        self.store.replace(&Metadata::empty())?;
        info!(
            released = report.released.len(),
            failed = report.failed.len(),
            "deployment destroyed"
        );
        Ok(report)
    }

    /// Summarize the current deployment, range by range.
    ///
    /// Read-only and lock-free; concurrent mutations are observed as either
    /// their pre- or post-state.
    pub fn status(&self) -> Result<FederationStatus> {
        let current = self.store.load()?;
        if current.is_empty() {
            return Err(Error::EmptyMetadata);
        }
        let ranges = current
            .table()
            .ranges()
            .iter()
            .map(|range| RangeStatus {
                start: range.start(),
                end: range.end(),
                modulus: range.modulus(),
                shards: range.shard_ids().collect(),
            })
            .collect();
        Ok(FederationStatus { ranges })
    }

    /// Run `create` under the configured time bound.
    async fn create_bounded(&self, planned: &[ShardId]) -> Result<HashMap<ShardId, String>> {
        match timeout(
            self.config.provision_timeout,
            self.provisioner.create(planned),
        )
        .await
        {
            Ok(Ok(hosts)) => Ok(hosts),
            Ok(Err(e)) => Err(Error::ProvisioningFailed {
                detail: e.to_string(),
            }),
            Err(_) => Err(Error::ProvisioningFailed {
                detail: format!(
                    "create did not finish within {:?}",
                    self.config.provision_timeout
                ),
            }),
        }
    }

    /// Build the next snapshot: one provisioned descriptor per planned
    /// shard on top of `registry`, cross-validated against `table`.
    ///
    /// A planned shard the host map does not cover fails the whole
    /// assembly; committing it would register a shard nobody can reach.
    fn assemble(
        table: PartitionTable,
        mut registry: ShardRegistry,
        planned: &[ShardId],
        hosts: &HashMap<ShardId, String>,
    ) -> Result<Metadata> {
        for shard in planned {
            let host = hosts.get(shard).ok_or_else(|| Error::ProvisioningFailed {
                detail: format!("provisioner reported success without a host for {shard}"),
            })?;
            registry.insert(*shard, ConnectionDescriptor::provisioned(*shard, host.as_str()));
        }
        Metadata::new(table, registry)
    }

    /// Best-effort teardown of freshly created shards after a failed
    /// commit. Failures here only warn: metadata never referenced these
    /// shards, so routing is correct either way and the cost of a miss is
    /// an orphaned instance.
    async fn rollback(&self, created: &[ShardId]) {
        if created.is_empty() {
            return;
        }
        match timeout(
            self.config.provision_timeout,
            self.provisioner.destroy(created),
        )
        .await
        {
            Ok(outcomes) => {
                for (shard, outcome) in outcomes {
                    if let Err(e) = outcome {
                        warn!(%shard, error = %e, "rollback teardown failed; instance may be orphaned");
                    }
                }
            }
            Err(_) => {
                warn!(
                    shards = created.len(),
                    "rollback teardown timed out; instances may be orphaned"
                );
            }
        }
    }
}
