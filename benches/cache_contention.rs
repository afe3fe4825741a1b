use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use liveflow::{CacheConfig, MemorySource, PagedCache};

fn cache_contention_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("paged cache hit path");
    group.bench_function("get_cached", |b| {
        let data: Vec<u64> = (0..100_000).collect();
        let cache = PagedCache::new(MemorySource::new(data), CacheConfig::default());
        rt.block_on(cache.get(0)).unwrap();
        b.iter(|| cache.get_cached(black_box(64)));
    });
    group.finish();

    let mut group = c.benchmark_group("paged cache miss coalescing");
    group.sample_size(10);
    group.bench_function("8 readers, same page", |b| {
        b.iter(|| concurrent_reads_call(&rt, black_box(8), 0));
    });
    group.bench_function("8 readers, page stride", |b| {
        b.iter(|| concurrent_reads_call(&rt, black_box(8), 128));
    });
    group.finish();
}

fn concurrent_reads_call(rt: &tokio::runtime::Runtime, readers: usize, stride: usize) {
    rt.block_on(async {
        let data: Vec<u64> = (0..100_000).collect();
        let cache = PagedCache::new(MemorySource::new(data), CacheConfig::default());
        let gets: Vec<_> = (0..readers).map(|i| cache.get(i * stride)).collect();
        for result in futures::future::join_all(gets).await {
            result.unwrap().unwrap();
        }
    });
}

criterion_group!(benches, cache_contention_benchmark);
criterion_main!(benches);
