//! Centralized routing and lifecycle constants.
//!
//! This module consolidates the magic numbers used throughout the timeshard
//! federation core. Having them in one place makes it easier to:
//!
//! - Understand the lifecycle constraints
//! - Update values consistently
//! - Document the rationale for each constant
//!
//! # Categories
//!
//! - **Partitioning Constants**: range placement and bucket defaults
//! - **Capacity Constants**: stored-volume thresholds and probe limits
//! - **Provisioning Constants**: time bounds on collaborator calls
//! - **Persistence Constants**: metadata document handling

// =============================================================================
// Partitioning Constants
// =============================================================================

/// Default bucket count for a newly initiated deployment.
///
/// Two buckets per range is the smallest layout that still exercises the
/// username hash. Deployments override this via `FederationConfig` or the
/// explicit modulus argument to `initiate`.
pub const DEFAULT_MODULUS: u32 = 2;

/// How many hours before "now" the first partition range starts.
///
/// Initiation back-dates the first range so rows whose origin stamp was
/// taken just before the metadata commit (clock skew, queued writes) still
/// fall inside the routable window instead of failing as "predates the
/// deployment".
pub const INITIAL_RANGE_BACKDATE_HOURS: u64 = 3;

// =============================================================================
// Capacity Constants
// =============================================================================

/// Default stored-volume threshold above which a shard is reported
/// near-full, in bytes (3000 MB of a nominal 4000 MB instance).
///
/// Flagging at 75% leaves the operator roughly a range's worth of headroom
/// to run an expansion before writes start failing on the full shard.
/// Can be overridden via `FederationConfig.near_full_bytes`.
pub const DEFAULT_NEAR_FULL_BYTES: u64 = 3000 * 1024 * 1024;

/// Default number of shards probed concurrently during a capacity sweep.
///
/// Bounds the number of simultaneous connections the sweep opens; a full
/// sweep still visits every shard.
pub const DEFAULT_MAX_CONCURRENT_PROBES: usize = 8;

// =============================================================================
// Provisioning Constants
// =============================================================================

/// Default upper bound on a single provisioner call, in seconds.
///
/// Creating database instances routinely takes minutes. When the bound
/// elapses the lifecycle operation fails with `ProvisioningFailed` and
/// metadata is left untouched.
pub const DEFAULT_PROVISION_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// Persistence Constants
// =============================================================================

/// Default location of the persisted metadata document, relative to the
/// working directory. Deployments point `FederationConfig.metadata_path`
/// (or `METADATA_PATH`) at a durable volume instead.
pub const DEFAULT_METADATA_PATH: &str = "metadata.json";

/// Suffix of the scratch file the metadata store writes before atomically
/// renaming it over the live document.
pub const METADATA_TMP_SUFFIX: &str = "tmp";

/// MySQL error code for a uniqueness violation (`ER_DUP_ENTRY`).
///
/// Executor constraint failures carrying this code are surfaced to callers
/// as `Error::DuplicateData` rather than as infrastructure faults.
pub const MYSQL_DUPLICATE_ENTRY: u16 = 1062;
