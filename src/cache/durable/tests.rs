//! Tests for the durable tier

use super::mock_backend::MockDiskBackend;
use super::types::SchemaMarker;
use super::utils::{generate_paths, VERSION_FILE};
use super::*;
use crate::cache::{CacheEntry, CacheKey, CacheTier, DurableTierConfig, Namespace};
use crate::constants::DURABLE_SCHEMA_VERSION;
use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn key(ns: Namespace, k: &str) -> CacheKey {
    CacheKey::new(ns, k)
}

fn entry(v: &str) -> CacheEntry {
    CacheEntry::new(Bytes::from(v.to_string()), Duration::from_secs(60))
}

async fn open_temp(dir: &TempDir) -> DurableTier {
    let config = DurableTierConfig {
        dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    DurableTier::open(&config).await.unwrap()
}

#[tokio::test]
async fn test_open_creates_root_and_version_file() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("portal");
    let config = DurableTierConfig {
        dir: root.clone(),
        ..Default::default()
    };

    let tier = DurableTier::open(&config).await.unwrap();
    assert_eq!(tier.root(), root.as_path());

    let raw = std::fs::read(root.join(VERSION_FILE)).unwrap();
    let marker: SchemaMarker = serde_json::from_slice(&raw).unwrap();
    assert_eq!(marker.version, DURABLE_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_set_and_get_round_trip() {
    let dir = TempDir::new().unwrap();
    let tier = open_temp(&dir).await;
    let k = key(Namespace::Api, "news:1");

    tier.set(k.clone(), entry(r#"{"title":"x"}"#)).await.unwrap();

    let found = tier.get(&k).await.unwrap().unwrap();
    assert_eq!(found.payload, Bytes::from(r#"{"title":"x"}"#));
    assert_eq!(found.ttl, Duration::from_secs(60));
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let k = key(Namespace::Pages, "home");
    {
        let tier = open_temp(&dir).await;
        tier.set(k.clone(), entry("page")).await.unwrap();
    }

    let reopened = open_temp(&dir).await;
    assert_eq!(reopened.entry_count(), 1);
    assert_eq!(
        reopened.get(&k).await.unwrap().unwrap().payload,
        Bytes::from("page")
    );
}

#[tokio::test]
async fn test_schema_change_wipes_partitions() {
    let dir = TempDir::new().unwrap();
    {
        let tier = open_temp(&dir).await;
        tier.set(key(Namespace::Api, "a"), entry("1")).await.unwrap();
    }
    std::fs::write(dir.path().join(VERSION_FILE), br#"{"version":1}"#).unwrap();

    let reopened = open_temp(&dir).await;
    assert_eq!(reopened.entry_count(), 0);
    assert!(!dir.path().join("api").exists());
}

#[tokio::test]
async fn test_expired_entry_is_absent_and_removed() {
    let dir = TempDir::new().unwrap();
    let tier = open_temp(&dir).await;
    let k = key(Namespace::Api, "stale");
    let stale = CacheEntry::with_stored_at(Bytes::from("x"), 0, Duration::from_millis(1));

    tier.set(k.clone(), stale).await.unwrap();
    assert!(tier.get(&k).await.unwrap().is_none());
    assert_eq!(tier.entry_count(), 0);

    let (data, meta) = generate_paths(dir.path(), &k);
    assert!(!data.exists());
    assert!(!meta.exists());
}

#[tokio::test]
async fn test_purge_expired_sweeps_by_max_age() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(TokioFsBackend::new());
    let tier = DurableTier::open_with_backend(dir.path(), Duration::from_secs(60), backend)
        .await
        .unwrap();

    let old = CacheEntry::with_stored_at(Bytes::from("old"), 1_000, Duration::ZERO);
    tier.set(key(Namespace::Images, "old"), old).await.unwrap();
    tier.set(key(Namespace::Images, "new"), entry("new"))
        .await
        .unwrap();

    assert_eq!(tier.purge_expired().await.unwrap(), 1);
    assert_eq!(tier.entry_count(), 1);
    assert!(tier
        .get(&key(Namespace::Images, "new"))
        .await
        .unwrap()
        .is_some());
    assert_eq!(tier.stats().await.unwrap().expirations, 1);
}

#[tokio::test]
async fn test_clear_namespace_keeps_other_partitions() {
    let dir = TempDir::new().unwrap();
    let tier = open_temp(&dir).await;
    tier.set(key(Namespace::Images, "logo"), entry("i"))
        .await
        .unwrap();
    tier.set(key(Namespace::Pages, "home"), entry("p"))
        .await
        .unwrap();

    assert_eq!(tier.clear_namespace(Namespace::Images).await.unwrap(), 1);
    assert!(tier
        .get(&key(Namespace::Images, "logo"))
        .await
        .unwrap()
        .is_none());
    assert!(tier
        .get(&key(Namespace::Pages, "home"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_clear_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let tier = open_temp(&dir).await;
    tier.set(key(Namespace::Api, "a"), entry("1")).await.unwrap();

    tier.clear().await.unwrap();
    tier.clear().await.unwrap();
    assert_eq!(tier.entry_count(), 0);
    assert!(tier.get(&key(Namespace::Api, "a")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_reports_existence() {
    let dir = TempDir::new().unwrap();
    let tier = open_temp(&dir).await;
    let k = key(Namespace::Assets, "app.css");
    tier.set(k.clone(), entry("css")).await.unwrap();

    assert!(tier.delete(&k).await.unwrap());
    assert!(!tier.delete(&k).await.unwrap());
}

#[tokio::test]
async fn test_rebuild_drops_orphans_and_corrupt_metadata() {
    let backend = MockDiskBackend::new();
    let root = Path::new("/cache");
    let marker = serde_json::to_vec(&SchemaMarker {
        version: DURABLE_SCHEMA_VERSION,
    })
    .unwrap();
    backend.put_raw(root.join(VERSION_FILE), Bytes::from(marker));
    backend.put_raw(root.join("api/orphan.data"), Bytes::from("x"));
    backend.put_raw(root.join("api/broken.meta"), Bytes::from("{not json"));
    backend.put_raw(root.join("api/broken.data"), Bytes::from("x"));
    backend.put_raw(root.join("api/half.tmp"), Bytes::from("x"));

    let tier = DurableTier::open_with_backend(root, Duration::ZERO, Arc::new(backend.clone()))
        .await
        .unwrap();

    assert_eq!(tier.entry_count(), 0);
    // only the version file is left
    assert_eq!(backend.file_count(), 1);
}

#[tokio::test]
async fn test_backend_failure_surfaces_as_error() {
    let backend = MockDiskBackend::new();
    let tier =
        DurableTier::open_with_backend(Path::new("/cache"), Duration::ZERO, Arc::new(backend.clone()))
            .await
            .unwrap();
    let k = key(Namespace::Api, "a");
    tier.set(k.clone(), entry("1")).await.unwrap();

    backend.set_failing(true);
    assert!(tier.get(&k).await.is_err());
    assert!(tier.set(k.clone(), entry("2")).await.is_err());

    backend.set_failing(false);
    backend.set_storage_full(true);
    assert!(tier.set(k, entry("3")).await.is_err());
}

#[tokio::test]
async fn test_open_fails_when_backend_unusable() {
    let backend = MockDiskBackend::new();
    backend.set_failing(true);
    let result =
        DurableTier::open_with_backend(Path::new("/cache"), Duration::ZERO, Arc::new(backend))
            .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_writes_data_and_meta_files() {
    let backend = MockDiskBackend::new();
    let root = Path::new("/cache");
    let tier = DurableTier::open_with_backend(root, Duration::ZERO, Arc::new(backend.clone()))
        .await
        .unwrap();
    let k = key(Namespace::Api, "news:1");
    tier.set(k.clone(), entry("1")).await.unwrap();

    let (data, meta) = generate_paths(root, &k);
    assert!(backend.contains(&data));
    assert!(backend.contains(&meta));
}
