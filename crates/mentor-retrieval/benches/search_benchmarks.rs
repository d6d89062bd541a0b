//! Benchmarks for local retrieval: in-memory cosine search and the full
//! gateway path (hash embedding, query, sort, truncate).
//!
//! Uses 1,000 chunks by default. Set `BENCH_FULL_SCALE=1` for 20,000.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use mentor_retrieval::embedding::{EmbeddingProvider, HashEmbeddingProvider};
use mentor_retrieval::index::{InMemoryVectorIndex, VectorIndex};
use mentor_retrieval::RetrievalGateway;

const CI_CHUNK_COUNT: usize = 1_000;
const FULL_SCALE_CHUNK_COUNT: usize = 20_000;
const DIMENSION: usize = 1024;

fn chunk_count() -> usize {
    if std::env::var("BENCH_FULL_SCALE").is_ok() {
        FULL_SCALE_CHUNK_COUNT
    } else {
        CI_CHUNK_COUNT
    }
}

fn generate_chunk_text(index: usize) -> String {
    let topics = [
        "course curriculum and weekly projects",
        "enrollment deadlines and tuition options",
        "career services and interview preparation",
        "mentor office hours and code reviews",
    ];
    format!(
        "Section {} covers {}. Students work in pairs and present a capstone at the end.",
        index,
        topics[index % topics.len()]
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_populated_index(rt: &tokio::runtime::Runtime, count: usize) -> InMemoryVectorIndex {
    let index = InMemoryVectorIndex::new();
    let embedder = HashEmbeddingProvider::new(DIMENSION);
    for i in 0..count {
        let text = generate_chunk_text(i);
        let embedding = rt.block_on(embedder.embed(&text)).expect("embed failed");
        index
            .insert(format!("chunk-{}", i), embedding, text, None, None)
            .expect("insert failed");
    }
    index
}

fn bench_index_query(c: &mut Criterion) {
    let rt = runtime();
    let count = chunk_count();
    let index = build_populated_index(&rt, count);
    let query = rt
        .block_on(HashEmbeddingProvider::new(DIMENSION).embed("tuition and enrollment"))
        .expect("query embed failed");

    let mut group = c.benchmark_group("index_query");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function(format!("top5_{}chunks", count), |b| {
        b.iter(|| rt.block_on(index.query(&query, 5)).expect("query failed"));
    });
    group.finish();
}

fn bench_gateway_search(c: &mut Criterion) {
    let rt = runtime();
    let count = chunk_count();
    let gateway = RetrievalGateway::local(DIMENSION, build_populated_index(&rt, count));

    let mut group = c.benchmark_group("gateway_search");
    group.measurement_time(Duration::from_secs(10));
    group.bench_function(format!("search_top5_{}chunks", count), |b| {
        b.iter(|| {
            let hits = rt
                .block_on(gateway.search("tell me about the course curriculum", 5))
                .expect("search failed");
            assert_eq!(hits.len(), 5);
            hits
        });
    });
    group.finish();
}

criterion_group!(benches, bench_index_query, bench_gateway_search);
criterion_main!(benches);
