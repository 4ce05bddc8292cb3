//! The SQL executor seam.
//!
//! The federation core never opens database connections itself. Everything
//! that touches a shard's MySQL instance goes through [`QueryExecutor`], so
//! deployments plug in their driver of choice and tests plug in
//! [`MockExecutor`](crate::mock::MockExecutor).
//!
//! # Contract
//!
//! - `execute` runs exactly one statement against exactly one shard and
//!   reports the outcome, or an [`ExecutorError`] classified as a
//!   connection failure or a constraint violation with the backend's
//!   numeric code.
//! - Implementations do not retry; retry policy belongs to callers, guided
//!   by the error taxonomy.
//!
//! Constraint codes cross into the core taxonomy through
//! [`Error::from_executor`](crate::error::Error::from_executor), which is
//! where the duplicate-entry code becomes
//! [`Error::DuplicateData`](crate::error::Error).

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use thiserror::Error as ThisError;

use crate::error::{Error, Result};
use crate::metadata::ConnectionDescriptor;
use crate::types::ShardId;

pub type ExecutorResult<T> = std::result::Result<T, ExecutorError>;

/// Failures an executor implementation reports.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ExecutorError {
    /// The shard's database could not be reached.
    #[error("connection to {host} failed: {detail}")]
    Connection { host: String, detail: String },

    /// The backend rejected the statement with a constraint violation.
    /// `code` is the backend's numeric error code, e.g. 1062 for a MySQL
    /// duplicate entry.
    #[error("constraint violation {code}: {detail}")]
    Constraint { code: u16, detail: String },
}

/// One value in a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlValue {
    /// Coerce to a non-negative count, for aggregate results such as sizes
    /// and row counts. Backends differ on whether `SUM(...)` comes back as
    /// an integer, a decimal, or a decimal-as-text.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            SqlValue::Integer(v) if *v >= 0 => Some(*v as u64),
            SqlValue::Real(v) if *v >= 0.0 => Some(*v as u64),
            SqlValue::Text(s) => {
                if let Ok(v) = s.parse::<u64>() {
                    Some(v)
                } else {
                    s.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64)
                }
            }
            _ => None,
        }
    }
}

pub type SqlRow = Vec<SqlValue>;

/// What a statement did.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Result set of a read.
    Rows(Vec<SqlRow>),
    /// Affected-row count of a write.
    Affected(u64),
}

/// Executes SQL statements against individual shard databases.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run `statement` on the database `conn` points at.
    async fn execute(
        &self,
        conn: &ConnectionDescriptor,
        statement: &str,
    ) -> ExecutorResult<QueryOutcome>;
}

/// Run one statement against many shards with bounded concurrency.
///
/// At most `max_concurrency` executions are in flight at a time. Every
/// target is attempted even when some fail, then the failure on the
/// lowest-ordered shard is surfaced (with its shard id attached); on full
/// success the outcomes come back sorted by shard id so sweeps are
/// deterministic.
pub async fn fan_out<E>(
    executor: &E,
    targets: &[(ShardId, ConnectionDescriptor)],
    statement: &str,
    max_concurrency: usize,
) -> Result<Vec<(ShardId, QueryOutcome)>>
where
    E: QueryExecutor + ?Sized,
{
    let mut results: Vec<(ShardId, ExecutorResult<QueryOutcome>)> =
        stream::iter(targets.iter().map(|(shard, conn)| async move {
            (*shard, executor.execute(conn, statement).await)
        }))
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(shard, _)| *shard);

    let mut outcomes = Vec::with_capacity(results.len());
    for (shard, outcome) in results {
        outcomes.push((shard, outcome.map_err(|e| Error::from_executor(shard, e))?));
    }
    Ok(outcomes)
}
