//! In-memory mock collaborators for testing.
//!
//! [`MockProvisioner`] and [`MockExecutor`] implement the collaborator
//! seams entirely in memory, with scripted failures and call logs, so
//! lifecycle and capacity behavior can be tested without infrastructure.
//!
//! # Usage
//!
//! This module is available when the `test-utilities` feature is enabled,
//! or during unit tests:
//!
//! ```toml
//! [dev-dependencies]
//! timeshard = { path = ".", features = ["test-utilities"] }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::executor::{ExecutorError, ExecutorResult, QueryExecutor, QueryOutcome, SqlValue};
use crate::metadata::ConnectionDescriptor;
use crate::provision::{ProvisionError, ProvisionResult, Provisioner};
use crate::types::ShardId;

/// In-memory [`Provisioner`] with scripted failures and call logs.
///
/// Hosts are allocated deterministically: the n-th `create` call places
/// its shards on `10.<20 + n>.0.*`.
#[derive(Debug, Clone, Default)]
pub struct MockProvisioner {
    /// Every shard reported created, in creation order.
    created: Arc<RwLock<Vec<ShardId>>>,
    /// Every shard successfully torn down, in teardown order.
    destroyed: Arc<RwLock<Vec<ShardId>>>,
    /// How many upcoming `create` calls fail outright.
    fail_next_creates: Arc<AtomicUsize>,
    /// Shards whose teardown is scripted to fail.
    fail_destroy_for: Arc<RwLock<HashSet<ShardId>>>,
    /// Shards `create` silently omits from its host map.
    withhold_host_for: Arc<RwLock<HashSet<ShardId>>>,
    /// Artificial latency added to every call.
    call_delay: Arc<RwLock<Option<Duration>>>,
    /// Allocator for the deterministic host subnets.
    create_batches: Arc<AtomicUsize>,
}

impl MockProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next `create` call to fail.
    pub fn fail_next_create(&self) {
        self.fail_next_creates.fetch_add(1, Ordering::SeqCst);
    }

    /// Script teardown of `shard` to fail.
    pub async fn fail_destroy_of(&self, shard: ShardId) {
        self.fail_destroy_for.write().await.insert(shard);
    }

    /// Script `create` to succeed but omit `shard` from the host map.
    pub async fn withhold_host_of(&self, shard: ShardId) {
        self.withhold_host_for.write().await.insert(shard);
    }

    /// Add artificial latency to every call.
    pub async fn delay_calls(&self, delay: Duration) {
        *self.call_delay.write().await = Some(delay);
    }

    /// Shards reported created so far.
    pub async fn created(&self) -> Vec<ShardId> {
        self.created.read().await.clone()
    }

    /// Shards successfully torn down so far.
    pub async fn destroyed(&self) -> Vec<ShardId> {
        self.destroyed.read().await.clone()
    }

    async fn apply_delay(&self) {
        let delay = *self.call_delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn create(&self, shards: &[ShardId]) -> ProvisionResult<HashMap<ShardId, String>> {
        self.apply_delay().await;
        let scripted_failure = self
            .fail_next_creates
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted_failure {
            return Err(ProvisionError::Create("scripted create failure".to_string()));
        }

        let subnet = 20 + self.create_batches.fetch_add(1, Ordering::SeqCst);
        let withheld = self.withhold_host_for.read().await.clone();
        let mut created = self.created.write().await;
        let mut hosts = HashMap::new();
        for (i, shard) in shards.iter().enumerate() {
            created.push(*shard);
            if !withheld.contains(shard) {
                hosts.insert(*shard, format!("10.{}.0.{}", subnet, i + 2));
            }
        }
        Ok(hosts)
    }

    async fn destroy(&self, shards: &[ShardId]) -> Vec<(ShardId, ProvisionResult<()>)> {
        self.apply_delay().await;
        let failing = self.fail_destroy_for.read().await.clone();
        let mut outcomes = Vec::with_capacity(shards.len());
        for shard in shards {
            if failing.contains(shard) {
                outcomes.push((
                    *shard,
                    Err(ProvisionError::Teardown(format!(
                        "scripted teardown failure for {shard}"
                    ))),
                ));
            } else {
                self.destroyed.write().await.push(*shard);
                outcomes.push((*shard, Ok(())));
            }
        }
        outcomes
    }
}

/// In-memory [`QueryExecutor`] with canned outcomes per database.
///
/// Outcomes and failures are keyed by the descriptor's `database` field
/// (the shard token). Databases with nothing scripted return an empty
/// result set.
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    /// Canned outcome per database.
    outcomes: Arc<RwLock<HashMap<String, QueryOutcome>>>,
    /// Scripted failure per database; takes precedence over outcomes.
    failures: Arc<RwLock<HashMap<String, ExecutorError>>>,
    /// Every executed statement as (database, statement).
    executed: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcome of any statement against `database`.
    pub async fn set_outcome(&self, database: &str, outcome: QueryOutcome) {
        self.outcomes.write().await.insert(database.to_string(), outcome);
    }

    /// Script a stored-volume probe result of `bytes` for `database`,
    /// shaped the way MySQL returns decimal aggregates (as text).
    pub async fn set_size(&self, database: &str, bytes: u64) {
        self.set_outcome(
            database,
            QueryOutcome::Rows(vec![vec![SqlValue::Text(bytes.to_string())]]),
        )
        .await;
    }

    /// Script every statement against `database` to fail with `error`.
    pub async fn fail_database(&self, database: &str, error: ExecutorError) {
        self.failures.write().await.insert(database.to_string(), error);
    }

    /// Every statement executed so far, as (database, statement).
    pub async fn executed(&self) -> Vec<(String, String)> {
        self.executed.read().await.clone()
    }
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(
        &self,
        conn: &ConnectionDescriptor,
        statement: &str,
    ) -> ExecutorResult<QueryOutcome> {
        self.executed
            .write()
            .await
            .push((conn.database.clone(), statement.to_string()));
        if let Some(err) = self.failures.read().await.get(&conn.database) {
            return Err(err.clone());
        }
        if let Some(outcome) = self.outcomes.read().await.get(&conn.database) {
            return Ok(outcome.clone());
        }
        Ok(QueryOutcome::Rows(Vec::new()))
    }
}
