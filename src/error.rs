//! Crate level errors.
//!
//! This module provides the top-level error type for the timeshard
//! federation core.
//!
//! # Error Hierarchy
//!
//! The crate uses a two-layer error hierarchy:
//!
//! ## Core Layer (`crate::error`)
//!
//! - [`Error`]: routing, metadata lifecycle, and persistence errors, with
//!   the payloads callers need to react (offending dates, shard ids)
//!
//! ## Collaborator Layer
//!
//! - [`ExecutorError`](crate::executor::ExecutorError): failures reported by
//!   the SQL executor a deployment plugs in
//! - [`ProvisionError`](crate::provision::ProvisionError): failures reported
//!   by the shard provisioner
//!
//! ## Conversion
//!
//! Executor failures enter the core layer through [`Error::from_executor`],
//! which recognizes the relational duplicate-entry code and surfaces it as
//! [`Error::DuplicateData`] so callers can treat uniqueness collisions as an
//! expected outcome rather than a fault.

use std::{io, result};

use thiserror::Error as ThisError;

use crate::executor::ExecutorError;
use crate::types::{HourStamp, ShardId};

pub type Result<T> = result::Result<T, Error>;

/// Which side of the routable window a date fell on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRangeViolation {
    /// Later than the current hour.
    InFuture,
    /// Earlier than the first partition range.
    PredatesDeployment,
}

impl std::fmt::Display for DateRangeViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateRangeViolation::InFuture => write!(f, "in the future"),
            DateRangeViolation::PredatesDeployment => write!(f, "predates the deployment"),
        }
    }
}

/// Routing, lifecycle, and persistence errors.
///
/// Variants carry the data a caller needs to react: the offending date for
/// range violations, the shard id for per-shard failures. Caller mistakes
/// (bad arguments, out-of-range dates, lifecycle misuse) are distinct from
/// infrastructure failures so retry policy can be decided per class; see
/// [`Error::is_caller_error`] and [`Error::is_retryable`].
#[derive(Debug, ThisError)]
pub enum Error {
    /// A malformed argument, e.g. an empty username or a zero modulus.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An origin date outside the routable window.
    #[error("date {date} is out of range: {reason}")]
    DateOutOfRange {
        date: HourStamp,
        reason: DateRangeViolation,
    },

    /// A range boundary collision: closing and reopening within the same
    /// hour would give two ranges the same start.
    #[error("metadata date conflict at {date}: {detail}")]
    MetadataDate { date: HourStamp, detail: String },

    /// Initiation was requested but metadata is already populated.
    #[error("already initiated; expand the existing deployment instead")]
    AlreadyInitiated,

    /// An operation that needs live metadata found none.
    #[error("metadata is empty; nothing has been initiated")]
    EmptyMetadata,

    /// The provisioner failed, timed out, or returned an incomplete result.
    /// Metadata was left as it was.
    #[error("provisioning failed: {detail}")]
    ProvisioningFailed { detail: String },

    /// A uniqueness violation reported by a shard.
    #[error("duplicate data on shard {shard}: {detail}")]
    DuplicateData { shard: ShardId, detail: String },

    /// A shard id derived from the partition table has no connection entry.
    /// Indicates corrupted metadata, not caller misuse.
    #[error("shard {0} has no connection entry")]
    UnknownShard(ShardId),

    /// The persisted metadata document violates its own invariants.
    #[error("corrupt metadata: {0}")]
    CorruptMetadata(String),

    /// A shard query failed for a reason other than a uniqueness violation.
    #[error("query on shard {shard} failed: {source}")]
    ShardQuery {
        shard: ShardId,
        #[source]
        source: ExecutorError,
    },

    /// A capacity probe answered with something that is not a stored
    /// volume. Points at a broken executor implementation.
    #[error("shard {shard} returned a malformed stored-volume result")]
    MalformedProbe { shard: ShardId },

    /// Metadata store I/O failed.
    #[error("metadata store I/O: {0}")]
    Io(#[from] io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Classify an executor failure against `shard`.
    ///
    /// The relational duplicate-entry code becomes [`Error::DuplicateData`];
    /// everything else is surfaced as [`Error::ShardQuery`].
    pub fn from_executor(shard: ShardId, source: ExecutorError) -> Self {
        match source {
            ExecutorError::Constraint { code, detail }
                if code == crate::constants::MYSQL_DUPLICATE_ENTRY =>
            {
                Error::DuplicateData { shard, detail }
            }
            other => Error::ShardQuery {
                shard,
                source: other,
            },
        }
    }

    /// True for errors caused by how the call was made. Retrying the same
    /// call will fail the same way.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::DateOutOfRange { .. }
                | Error::MetadataDate { .. }
                | Error::AlreadyInitiated
                | Error::EmptyMetadata
        )
    }

    /// True for transient infrastructure failures where a retry can
    /// reasonably succeed. Duplicate data is not retryable (the row is
    /// already there) and corrupt metadata needs an operator.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::ProvisioningFailed { .. } | Error::Io(_) => true,
            Error::ShardQuery { source, .. } => {
                matches!(source, ExecutorError::Connection { .. })
            }
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::CorruptMetadata(e.to_string())
    }
}
