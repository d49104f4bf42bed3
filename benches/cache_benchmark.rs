use criterion::{black_box, criterion_group, criterion_main, Criterion};
use recipe_engine::{
    cache::{ArtifactCache, ArtifactKey, SqliteArtifactCache},
    features::{DenseMatrix, FlavorMatrix, LatentFactorization, MatrixStats},
};

fn create_artifacts(rows: usize, cols: usize) -> (FlavorMatrix, LatentFactorization) {
    let data = (0..rows * cols)
        .map(|i| if i % 3 == 0 { (i % 5) as f64 } else { 0.0 })
        .collect();
    let dense = DenseMatrix::from_row_major(rows, cols, data).unwrap();
    let factorization = LatentFactorization::fit(&dense, 15).unwrap();
    let stats = MatrixStats {
        dishes: rows,
        flavors: cols,
        ..MatrixStats::default()
    };
    (FlavorMatrix::from_parts(dense, stats), factorization)
}

async fn setup_cache() -> SqliteArtifactCache {
    let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
    let (matrix, factorization) = create_artifacts(500, 40);

    // Populate with a few corpus versions
    for i in 0..10 {
        let key = ArtifactKey::new(format!("fingerprint{}", i), 15);
        cache.save(&key, &matrix, &factorization).await.unwrap();
    }

    cache
}

fn bench_cache_get(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = runtime.block_on(setup_cache());
    let hit = ArtifactKey::new("fingerprint5", 15);
    let miss = ArtifactKey::new("nonexistent", 15);

    c.bench_function("cache_get_hit", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(cache.get(&hit).await.unwrap()) });
    });

    c.bench_function("cache_get_miss", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(cache.get(&miss).await.unwrap()) });
    });
}

fn bench_cache_save(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (matrix, factorization) = create_artifacts(500, 40);
    let key = ArtifactKey::new("bench", 15);

    c.bench_function("cache_save", |b| {
        b.to_async(&runtime).iter(|| async {
            let cache = SqliteArtifactCache::new(":memory:").await.unwrap();
            black_box(cache.save(&key, &matrix, &factorization).await.unwrap())
        });
    });
}

fn bench_cache_increment(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = runtime.block_on(setup_cache());
    let key = ArtifactKey::new("fingerprint5", 15);

    c.bench_function("cache_increment_hit", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(cache.increment_hit(&key).await.unwrap()) });
    });
}

fn bench_matrix_encoding(c: &mut Criterion) {
    let (matrix, _) = create_artifacts(2_000, 60);

    c.bench_function("dense_matrix_to_bytes", |b| {
        b.iter(|| black_box(matrix.matrix().to_bytes()));
    });

    let bytes = matrix.matrix().to_bytes();
    c.bench_function("dense_matrix_from_bytes", |b| {
        b.iter(|| black_box(DenseMatrix::from_bytes(&bytes).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_cache_get,
    bench_cache_save,
    bench_cache_increment,
    bench_matrix_encoding
);
criterion_main!(benches);
