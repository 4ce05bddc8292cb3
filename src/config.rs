//! Runtime configuration for a shard federation deployment.
//!
//! All knobs have working defaults pulled from [`crate::constants`], so a
//! bare `FederationConfig::default()` is enough for local development. Real
//! deployments usually build the config once at startup via
//! [`FederationConfig::from_env`] and hand it to the router, the reshard
//! manager, and the capacity monitor.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MAX_CONCURRENT_PROBES, DEFAULT_METADATA_PATH, DEFAULT_MODULUS,
    DEFAULT_NEAR_FULL_BYTES, DEFAULT_PROVISION_TIMEOUT_SECS,
};
use crate::error::{Error, Result};
use crate::types::Modulus;

/// Configuration for one federation deployment.
#[derive(Debug, Clone)]
pub struct FederationConfig {
    /// Where the metadata document lives on disk.
    ///
    /// Every lifecycle operation re-reads this file and atomically rewrites
    /// it, so it must sit on a durable volume shared by whichever process
    /// runs the reshard manager.
    ///
    /// Default: `metadata.json`
    pub metadata_path: PathBuf,

    /// Bucket count used when `initiate` is called without an explicit
    /// modulus.
    ///
    /// Default: 2
    pub default_modulus: Modulus,

    /// Stored-volume threshold above which a capacity sweep reports a shard
    /// as near-full, in bytes.
    ///
    /// Default: 3000 MB
    pub near_full_bytes: u64,

    /// Upper bound on a single provisioner call.
    ///
    /// When the bound elapses the lifecycle operation fails with
    /// `ProvisioningFailed` and metadata is left untouched.
    ///
    /// Default: 600 seconds
    pub provision_timeout: Duration,

    /// How many shards a capacity sweep probes concurrently.
    ///
    /// Default: 8
    pub max_concurrent_probes: usize,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from(DEFAULT_METADATA_PATH),
            default_modulus: Modulus::default(),
            near_full_bytes: DEFAULT_NEAR_FULL_BYTES,
            provision_timeout: Duration::from_secs(DEFAULT_PROVISION_TIMEOUT_SECS),
            max_concurrent_probes: DEFAULT_MAX_CONCURRENT_PROBES,
        }
    }
}

impl FederationConfig {
    /// Create configuration from environment variables.
    ///
    /// Environment variables:
    /// - `METADATA_PATH`: metadata document location (default: metadata.json)
    /// - `DEFAULT_MODULUS`: bucket count for `initiate` (default: 2)
    /// - `NEAR_FULL_BYTES`: capacity threshold in bytes (default: 3000 MB)
    /// - `PROVISION_TIMEOUT_SECS`: provisioner call bound (default: 600)
    /// - `MAX_CONCURRENT_PROBES`: capacity sweep concurrency (default: 8)
    ///
    /// Unset or unparseable variables fall back to the defaults; values that
    /// parse but fail validation (a zero modulus, a zero timeout) are
    /// rejected with `Error::Config`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let metadata_path = std::env::var("METADATA_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.metadata_path);

        let raw_modulus: u32 = std::env::var("DEFAULT_MODULUS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MODULUS);
        let default_modulus = Modulus::new(raw_modulus)
            .map_err(|_| Error::Config(format!("DEFAULT_MODULUS must be positive, got {raw_modulus}")))?;

        let near_full_bytes: u64 = std::env::var("NEAR_FULL_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.near_full_bytes);

        let provision_timeout_secs: u64 = std::env::var("PROVISION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_PROVISION_TIMEOUT_SECS);

        let max_concurrent_probes: usize = std::env::var("MAX_CONCURRENT_PROBES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.max_concurrent_probes);

        let config = Self {
            metadata_path,
            default_modulus,
            near_full_bytes,
            provision_timeout: Duration::from_secs(provision_timeout_secs),
            max_concurrent_probes,
        };

        if let Err(errors) = config.validate() {
            return Err(Error::Config(errors.join("; ")));
        }

        Ok(config)
    }

    /// Validate the configuration and return any errors found.
    ///
    /// This should be called at startup to catch configuration issues early.
    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.metadata_path.as_os_str().is_empty() {
            errors.push("metadata_path must not be empty".to_string());
        }

        if self.near_full_bytes == 0 {
            errors.push("near_full_bytes must be greater than 0".to_string());
        }

        if self.provision_timeout.is_zero() {
            errors.push("provision_timeout must be greater than 0".to_string());
        }

        if self.max_concurrent_probes == 0 {
            errors.push("max_concurrent_probes must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
