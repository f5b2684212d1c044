//! Benchmark: memoized dependency lookups

use archetype_gltf::cache::MemoCache;
use archetype_gltf::{DecodeError, DependencyKind, GltfLoader};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::executor::block_on;
use futures::FutureExt;

const DOCUMENT: &str = r#"{"asset":{"version":"2.0"},
    "materials":[{"alphaMode":"MASK"}],
    "nodes":[{"name":"a"},{"name":"b","children":[0]}],
    "scenes":[{"nodes":[1]}]}"#;

fn cache_hit_benchmark(c: &mut Criterion) {
    let parser = GltfLoader::new().parser(DOCUMENT, "").unwrap();
    block_on(parser.scene(0)).unwrap();

    c.bench_function("resolve_cached_node", |b| {
        b.iter(|| black_box(block_on(parser.resolve(DependencyKind::Node, 0)).is_ok()))
    });

    c.bench_function("typed_cached_material", |b| {
        b.iter(|| black_box(block_on(parser.material(0)).unwrap()))
    });

    c.bench_function("cache_hit_rate", |b| {
        b.iter(|| black_box(parser.metrics().cache_hit_rate()))
    });
}

fn memo_cache_benchmark(c: &mut Criterion) {
    let cache: MemoCache<usize, usize> = MemoCache::new();
    for key in 0..1024 {
        let _ = cache.get_or_insert_with(key, move || async move { Ok::<_, DecodeError>(key) }.boxed());
    }

    c.bench_function("memo_cache_hit", |b| {
        b.iter(|| {
            let (future, lookup) =
                cache.get_or_insert_with(black_box(512), || async { Ok::<_, DecodeError>(0) }.boxed());
            black_box((future, lookup))
        })
    });

    c.bench_function("fresh_parser", |b| {
        b.iter(|| black_box(GltfLoader::new().parser(DOCUMENT, "").unwrap()))
    });
}

criterion_group!(benches, cache_hit_benchmark, memo_cache_benchmark);
criterion_main!(benches);
