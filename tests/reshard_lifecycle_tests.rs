//! Integration tests for the resharding lifecycle.
//!
//! These tests drive initiate, expand, and destroy through the public
//! surface with the mock provisioner and a real metadata file, then route
//! against the result the way an embedding application would.

use std::sync::Arc;

use tempfile::TempDir;
use timeshard::config::FederationConfig;
use timeshard::error::Error;
use timeshard::metadata::MetadataStore;
use timeshard::mock::MockProvisioner;
use timeshard::reshard::{ReshardManager, TeardownConfirmation};
use timeshard::router::Router;
use timeshard::types::{HourStamp, Modulus};

struct Deployment {
    _dir: TempDir,
    store: Arc<MetadataStore>,
    provisioner: Arc<MockProvisioner>,
    manager: ReshardManager<MockProvisioner>,
}

fn deployment() -> Deployment {
    let dir = tempfile::tempdir().unwrap();
    let config = FederationConfig {
        metadata_path: dir.path().join("metadata.json"),
        ..FederationConfig::default()
    };
    let store = Arc::new(MetadataStore::new(&config.metadata_path));
    let provisioner = Arc::new(MockProvisioner::new());
    let manager = ReshardManager::new(store.clone(), provisioner.clone(), config);
    Deployment {
        _dir: dir,
        store,
        provisioner,
        manager,
    }
}

fn modulus(v: u32) -> Modulus {
    Modulus::new(v).unwrap()
}

// ============================================================================
// Initiate Tests
// ============================================================================

#[tokio::test]
async fn test_initiate_then_route() {
    let d = deployment();

    let shards = d.manager.initiate(modulus(2)).await.unwrap();
    assert_eq!(shards.len(), 2);

    // "ada" sums to 294, an even number, so it buckets to h0.
    let router = Router::new(d.store.clone());
    let located = router.locate(HourStamp::now(), "ada").unwrap();
    assert_eq!(located, shards[0]);
    assert_eq!(located.bucket().value(), 0);

    let (_, descriptor) = router.resolve(HourStamp::now(), "ada").unwrap();
    assert_eq!(descriptor.host, "10.20.0.2");
    assert_eq!(descriptor.database, located.to_string());
}

#[tokio::test]
async fn test_initiate_is_one_shot() {
    let d = deployment();

    d.manager.initiate(modulus(2)).await.unwrap();
    let snapshot = d.store.load().unwrap();

    let err = d.manager.initiate(modulus(4)).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInitiated));
    assert!(err.is_caller_error());
    assert_eq!(d.store.load().unwrap(), snapshot);
}

#[tokio::test]
async fn test_initiate_persists_the_legacy_document() {
    let d = deployment();

    let shards = d.manager.initiate(modulus(2)).await.unwrap();

    let text = std::fs::read_to_string(d.store.path()).unwrap();
    assert!(text.ends_with('\n'));

    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        doc["Ranges"]["Start"][0].as_u64(),
        Some(shards[0].range_start().value())
    );
    assert!(doc["Ranges"]["End"][0].is_null());
    assert_eq!(doc["Ranges"]["Moduli"][0].as_u64(), Some(2));

    let connections = doc["Connections"].as_object().unwrap();
    assert_eq!(connections.len(), 2);
    for shard in &shards {
        let entry = &connections[&shard.to_string()];
        assert_eq!(entry["database"].as_str(), Some(shard.to_string().as_str()));
        assert!(entry["host"].as_str().unwrap().starts_with("10.20.0."));
    }
}

#[tokio::test]
async fn test_initiate_provisioner_failure_leaves_no_metadata() {
    let d = deployment();

    d.provisioner.fail_next_create();
    let err = d.manager.initiate(modulus(2)).await.unwrap_err();
    assert!(matches!(err, Error::ProvisioningFailed { .. }));
    assert!(err.is_retryable());

    assert!(d.store.load().unwrap().is_empty());
    assert!(d.provisioner.created().await.is_empty());

    // A retry after the transient failure succeeds.
    let shards = d.manager.initiate(modulus(2)).await.unwrap();
    assert_eq!(shards.len(), 2);
}

// ============================================================================
// Expand Tests
// ============================================================================

#[tokio::test]
async fn test_expand_appends_a_wider_open_range() {
    let d = deployment();

    d.manager.initiate(modulus(2)).await.unwrap();
    let added = d.manager.expand(modulus(5)).await.unwrap();
    assert_eq!(added.len(), 5);

    let status = d.manager.status().unwrap();
    assert_eq!(status.ranges.len(), 2);
    assert_eq!(status.shard_count(), 7);

    let closed = &status.ranges[0];
    let open = status.open_range().unwrap();
    assert_eq!(closed.end.map(|e| e.next()), Some(open.start));
    assert_eq!(open.modulus, modulus(5));
    assert_eq!(open.shards, added);

    assert_eq!(d.store.load().unwrap().registry().len(), 7);
}

#[tokio::test]
async fn test_expand_keeps_old_origins_routing_to_old_shards() {
    let d = deployment();
    let router = Router::new(d.store.clone());

    d.manager.initiate(modulus(2)).await.unwrap();
    let origin = HourStamp::now();
    let before = router.locate(origin, "grace").unwrap();

    d.manager.expand(modulus(5)).await.unwrap();

    // The origin now falls in the closed range; its placement is unchanged.
    assert_eq!(router.locate(origin, "grace").unwrap(), before);
}

#[tokio::test]
async fn test_expand_requires_an_initiated_federation() {
    let d = deployment();

    let err = d.manager.expand(modulus(5)).await.unwrap_err();
    assert!(matches!(err, Error::EmptyMetadata));
}

#[tokio::test]
async fn test_expand_twice_within_the_hour_is_rejected() {
    let d = deployment();

    d.manager.initiate(modulus(2)).await.unwrap();
    d.manager.expand(modulus(3)).await.unwrap();

    // The open range now starts in the future, so a second expansion has
    // no elapsed hour to close at.
    let err = d.manager.expand(modulus(5)).await.unwrap_err();
    assert!(matches!(err, Error::MetadataDate { .. }));
    assert!(err.is_caller_error());
}

#[tokio::test]
async fn test_expand_provisioner_failure_leaves_metadata_untouched() {
    let d = deployment();

    d.manager.initiate(modulus(2)).await.unwrap();
    let snapshot = d.store.load().unwrap();

    d.provisioner.fail_next_create();
    let err = d.manager.expand(modulus(5)).await.unwrap_err();
    assert!(matches!(err, Error::ProvisioningFailed { .. }));
    assert_eq!(d.store.load().unwrap(), snapshot);
}

// ============================================================================
// Destroy Tests
// ============================================================================

#[tokio::test]
async fn test_destroy_tears_down_and_clears() {
    let d = deployment();

    let shards = d.manager.initiate(modulus(3)).await.unwrap();
    let report = d
        .manager
        .destroy(TeardownConfirmation::confirmed())
        .await
        .unwrap();

    assert!(report.is_clean());
    assert_eq!(report.released, shards);
    assert_eq!(d.provisioner.destroyed().await, shards);
    assert!(d.store.load().unwrap().is_empty());

    // The cleared document is an initiate-ready blank slate.
    let fresh = d.manager.initiate(modulus(2)).await.unwrap();
    assert_eq!(fresh.len(), 2);
}

#[tokio::test]
async fn test_destroy_requires_an_initiated_federation() {
    let d = deployment();

    let err = d
        .manager
        .destroy(TeardownConfirmation::confirmed())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EmptyMetadata));
}

#[tokio::test]
async fn test_destroy_reports_stuck_shards_but_still_clears() {
    let d = deployment();

    let shards = d.manager.initiate(modulus(2)).await.unwrap();
    d.provisioner.fail_destroy_of(shards[0]).await;

    let report = d
        .manager
        .destroy(TeardownConfirmation::confirmed())
        .await
        .unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.released, vec![shards[1]]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, shards[0]);

    // Routing state is gone either way; the stuck instance is the
    // operator's cleanup job.
    assert!(d.store.load().unwrap().is_empty());
}

// ============================================================================
// Status Tests
// ============================================================================

#[tokio::test]
async fn test_status_reflects_the_live_layout() {
    let d = deployment();

    let shards = d.manager.initiate(modulus(2)).await.unwrap();
    let status = d.manager.status().unwrap();

    assert_eq!(status.ranges.len(), 1);
    assert_eq!(status.shard_count(), 2);
    let open = status.open_range().unwrap();
    assert!(open.end.is_none());
    assert_eq!(open.shards, shards);
}

#[tokio::test]
async fn test_status_requires_an_initiated_federation() {
    let d = deployment();

    let err = d.manager.status().unwrap_err();
    assert!(matches!(err, Error::EmptyMetadata));
}
