//! Cache tier benchmarks
//!
//! - Memory tier set/get, including FIFO eviction at capacity
//! - Durable tier set/get on tokio::fs
//! - Manager get with write-back from the durable tier
//!
//! Run with: cargo bench --bench cache_tiers

use bytes::Bytes;
use criterion::{
    black_box, criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::runtime::Runtime;
use tsubame::cache::{
    CacheConfig, CacheEntry, CacheKey, CacheManager, CacheStrategy, CacheTier, DurableTier,
    DurableTierConfig, GetOptions, MemoryTier, Namespace,
};

const SIZE_1KB: usize = 1024;
const SIZE_10KB: usize = 10 * 1024;
const SIZE_100KB: usize = 100 * 1024;

/// JSON-ish payload of roughly `size` bytes
fn generate_payload(size: usize) -> Bytes {
    let body: String = "x".repeat(size.saturating_sub(12));
    Bytes::from(format!("{{\"body\":\"{}\"}}", body))
}

fn create_entry(size: usize) -> CacheEntry {
    CacheEntry::new(generate_payload(size), Duration::from_secs(3600))
}

fn create_key(prefix: &str, index: usize) -> CacheKey {
    CacheKey::new(Namespace::Api, format!("{}:{:06}", prefix, index))
}

fn open_durable(rt: &Runtime, dir: &TempDir) -> DurableTier {
    let config = DurableTierConfig {
        dir: dir.path().to_path_buf(),
        ..Default::default()
    };
    rt.block_on(DurableTier::open(&config)).unwrap()
}

fn bench_memory_tier_set(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    // small capacity so most inserts evict
    let tier = MemoryTier::with_capacity(1_000);

    let mut group = c.benchmark_group("memory_tier_set");
    for (name, size) in [("1kb", SIZE_1KB), ("10kb", SIZE_10KB)] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("size", name), &size, |b, &size| {
            let mut counter = 0usize;
            b.iter(|| {
                let key = create_key("memory-set", counter);
                counter = counter.wrapping_add(1);
                rt.block_on(async {
                    tier.set(black_box(key), black_box(create_entry(size)))
                        .await
                        .unwrap();
                });
            });
        });
    }
    group.finish();
}

fn bench_memory_tier_get(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let tier = MemoryTier::with_capacity(1_000);
    rt.block_on(async {
        for i in 0..100 {
            tier.set(create_key("memory-get", i), create_entry(SIZE_1KB))
                .await
                .unwrap();
        }
    });

    c.bench_function("memory_tier_get_hit", |b| {
        let mut counter = 0usize;
        b.iter(|| {
            let key = create_key("memory-get", counter % 100);
            counter = counter.wrapping_add(1);
            rt.block_on(async { black_box(tier.get(&key).await.unwrap()) });
        });
    });
}

fn bench_durable_tier(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let tier = open_durable(&rt, &dir);

    let mut group = c.benchmark_group("durable_tier");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(50);

    for (name, size) in [("1kb", SIZE_1KB), ("100kb", SIZE_100KB)] {
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("set", name), &size, |b, &size| {
            let mut counter = 0usize;
            b.iter(|| {
                let key = create_key("durable-set", counter);
                counter = counter.wrapping_add(1);
                rt.block_on(async { tier.set(key, create_entry(size)).await.unwrap() });
            });
        });
    }

    rt.block_on(async {
        tier.set(create_key("durable-get", 0), create_entry(SIZE_10KB))
            .await
            .unwrap();
    });
    group.bench_function("get_10kb", |b| {
        let key = create_key("durable-get", 0);
        b.iter(|| rt.block_on(async { black_box(tier.get(&key).await.unwrap()) }));
    });
    group.finish();
}

fn bench_manager_write_back(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = TempDir::new().unwrap();
    let durable: Arc<dyn CacheTier> = Arc::new(open_durable(&rt, &dir));
    let manager = CacheManager::with_tiers(CacheConfig::default(), Some(durable.clone()), None);

    rt.block_on(async {
        for i in 0..100 {
            durable
                .set(create_key("write-back", i), create_entry(SIZE_1KB))
                .await
                .unwrap();
        }
    });

    c.bench_function("manager_get_memory_first", |b| {
        let mut counter = 0usize;
        b.iter(|| {
            let key = format!("write-back:{:06}", counter % 100);
            counter = counter.wrapping_add(1);
            rt.block_on(async {
                let value: Option<serde_json::Value> = manager
                    .get(
                        &key,
                        GetOptions::new(Namespace::Api).strategy(CacheStrategy::Memory),
                    )
                    .await;
                black_box(value)
            });
        });
    });
}

criterion_group! {
    name = memory_benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(100);
    targets = bench_memory_tier_set, bench_memory_tier_get
}

criterion_group! {
    name = durable_benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_secs(1))
        .measurement_time(Duration::from_secs(5))
        .sample_size(50);
    targets = bench_durable_tier, bench_manager_write_back
}

criterion_main!(memory_benches, durable_benches);
