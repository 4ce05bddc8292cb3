//! Integration tests for FederationConfig::from_env().
//!
//! Environment variables are process-global, so every test here runs
//! serially and restores whatever was set before it ran.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use timeshard::config::FederationConfig;
use timeshard::error::Error;

/// All environment variables read by FederationConfig::from_env().
/// We save/restore ALL of these to prevent test pollution.
const ALL_CONFIG_ENV_VARS: &[&str] = &[
    "METADATA_PATH",
    "DEFAULT_MODULUS",
    "NEAR_FULL_BYTES",
    "PROVISION_TIMEOUT_SECS",
    "MAX_CONCURRENT_PROBES",
];

/// Run `f` with exactly `vars` set, restoring the previous environment
/// afterwards.
fn with_env_vars<F, R>(vars: &[(&str, &str)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let all_originals: Vec<_> = ALL_CONFIG_ENV_VARS
        .iter()
        .map(|k| (*k, env::var(*k).ok()))
        .collect();

    for key in ALL_CONFIG_ENV_VARS {
        unsafe { env::remove_var(key) };
    }
    for (key, value) in vars {
        unsafe { env::set_var(key, value) };
    }

    let result = f();

    for (key, original) in all_originals {
        match original {
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
    }

    result
}

// ============================================================================
// Default and Override Tests
// ============================================================================

#[test]
#[serial]
fn test_from_env_defaults_when_nothing_is_set() {
    with_env_vars(&[], || {
        let config = FederationConfig::from_env().unwrap();
        assert_eq!(config.metadata_path, PathBuf::from("metadata.json"));
        assert_eq!(config.default_modulus.value(), 2);
        assert_eq!(config.near_full_bytes, 3000 * 1024 * 1024);
        assert_eq!(config.provision_timeout, Duration::from_secs(600));
        assert_eq!(config.max_concurrent_probes, 8);
    });
}

#[test]
#[serial]
fn test_from_env_reads_every_variable() {
    with_env_vars(
        &[
            ("METADATA_PATH", "/var/lib/timeshard/metadata.json"),
            ("DEFAULT_MODULUS", "8"),
            ("NEAR_FULL_BYTES", "123456"),
            ("PROVISION_TIMEOUT_SECS", "30"),
            ("MAX_CONCURRENT_PROBES", "3"),
        ],
        || {
            let config = FederationConfig::from_env().unwrap();
            assert_eq!(
                config.metadata_path,
                PathBuf::from("/var/lib/timeshard/metadata.json")
            );
            assert_eq!(config.default_modulus.value(), 8);
            assert_eq!(config.near_full_bytes, 123456);
            assert_eq!(config.provision_timeout, Duration::from_secs(30));
            assert_eq!(config.max_concurrent_probes, 3);
        },
    );
}

#[test]
#[serial]
fn test_from_env_unparseable_values_fall_back_to_defaults() {
    with_env_vars(
        &[
            ("DEFAULT_MODULUS", "banana"),
            ("NEAR_FULL_BYTES", "-5"),
            ("PROVISION_TIMEOUT_SECS", "ten"),
            ("MAX_CONCURRENT_PROBES", ""),
        ],
        || {
            let config = FederationConfig::from_env().unwrap();
            let defaults = FederationConfig::default();
            assert_eq!(config.default_modulus, defaults.default_modulus);
            assert_eq!(config.near_full_bytes, defaults.near_full_bytes);
            assert_eq!(config.provision_timeout, defaults.provision_timeout);
            assert_eq!(config.max_concurrent_probes, defaults.max_concurrent_probes);
        },
    );
}

// ============================================================================
// Rejection Tests
// ============================================================================

#[test]
#[serial]
fn test_from_env_rejects_a_zero_modulus() {
    with_env_vars(&[("DEFAULT_MODULUS", "0")], || {
        let err = FederationConfig::from_env().unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("DEFAULT_MODULUS")),
            other => panic!("expected Config, got {other:?}"),
        }
    });
}

#[test]
#[serial]
fn test_from_env_rejects_zero_bounds_and_names_each_one() {
    with_env_vars(
        &[
            ("NEAR_FULL_BYTES", "0"),
            ("PROVISION_TIMEOUT_SECS", "0"),
            ("MAX_CONCURRENT_PROBES", "0"),
        ],
        || {
            let err = FederationConfig::from_env().unwrap_err();
            match err {
                Error::Config(msg) => {
                    assert!(msg.contains("near_full_bytes"));
                    assert!(msg.contains("provision_timeout"));
                    assert!(msg.contains("max_concurrent_probes"));
                }
                other => panic!("expected Config, got {other:?}"),
            }
        },
    );
}

#[test]
#[serial]
fn test_from_env_rejects_an_empty_metadata_path() {
    with_env_vars(&[("METADATA_PATH", "")], || {
        let err = FederationConfig::from_env().unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains("metadata_path")),
            other => panic!("expected Config, got {other:?}"),
        }
    });
}
