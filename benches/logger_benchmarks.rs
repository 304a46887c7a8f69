//! Criterion benchmarks for rust_correlated_logger

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rust_correlated_logger::core::chunking::chunk_oversized_fields;
use rust_correlated_logger::core::{merge, NullSink, Tool, MAX_STRING_FIELD_SIZE};
use rust_correlated_logger::prelude::*;
use std::sync::Arc;

fn null_logger() -> Logger {
    Logger::builder()
        .min_level(LogLevel::Debug)
        .sink(NullSink)
        .build()
}

fn bound_scope() -> Scope {
    Scope::new().bind(ObservabilityHandles::new(
        null_logger(),
        TracerHandle::new(Arc::new(InMemoryTracerProvider::new()), "bench"),
        MeterHandle::noop(),
    ))
}

// ============================================================================
// Logging Benchmarks
// ============================================================================

fn bench_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("logging");
    group.throughput(Throughput::Elements(1));

    let logger = null_logger();
    group.bench_function("info_no_fields", |b| {
        b.iter(|| logger.info(black_box("Info message"), []));
    });

    group.bench_function("info_with_fields", |b| {
        b.iter(|| {
            logger.info(
                black_box("Request handled"),
                [
                    Field::string("path", "/api/users"),
                    Field::int("status", 200),
                    Field::bool("cached", false),
                ],
            )
        });
    });

    group.bench_function("filtered_debug", |b| {
        let quiet = Logger::builder().min_level(LogLevel::Warn).sink(NullSink).build();
        b.iter(|| quiet.debug(black_box("Filtered out"), []));
    });

    let scope = bound_scope();
    let (span_scope, _guard) = start_span(&scope, "bench");
    let span_logger = span_scope.logger_or_noop();
    group.bench_function("info_in_span", |b| {
        b.iter(|| span_logger.info(black_box("Correlated message"), []));
    });

    let metadata_scope = span_scope
        .with_metadata(&MetadataRecord::default().with_repository(Repository::named("bench-repo")));
    let metadata_logger = metadata_scope.logger_or_noop();
    group.bench_function("info_with_metadata", |b| {
        b.iter(|| metadata_logger.info(black_box("Message with metadata"), []));
    });

    group.finish();
}

fn bench_async_logging(c: &mut Criterion) {
    let mut group = c.benchmark_group("async_logging");
    group.throughput(Throughput::Elements(1));

    let memory = MemoryAppender::new();
    let logger = Logger::builder()
        .sink(
            AppenderSink::builder()
                .appender(memory.clone())
                .async_mode(10_000)
                .overflow_policy(OverflowPolicy::DropNewest)
                .build(),
        )
        .build();

    group.bench_function("info", |b| {
        b.iter(|| {
            logger.info(black_box("Async message"), []);
        });
        memory.clear();
    });

    group.finish();
}

// ============================================================================
// Chunking and Metadata Benchmarks
// ============================================================================

fn bench_chunking(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunking");

    let small = vec![Field::string("body", "x".repeat(1_024))];
    group.bench_function("below_threshold", |b| {
        b.iter(|| chunk_oversized_fields(black_box(&small), MAX_STRING_FIELD_SIZE));
    });

    let large = vec![
        Field::string("request_id", "abc"),
        Field::string("body", "x".repeat(MAX_STRING_FIELD_SIZE * 2 + 100)),
    ];
    group.throughput(Throughput::Bytes((MAX_STRING_FIELD_SIZE * 2 + 100) as u64));
    group.bench_function("three_chunks", |b| {
        b.iter(|| chunk_oversized_fields(black_box(&large), MAX_STRING_FIELD_SIZE));
    });

    group.finish();
}

fn bench_metadata_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("metadata");
    group.throughput(Throughput::Elements(1));

    let existing = MetadataRecord::default()
        .with_repository(Repository::named("api"))
        .with_service(Service::named("scanner"));
    let incoming = MetadataRecord::default().with_tool(Tool {
        name: Some("semgrep".to_string()),
        status: Some("running".to_string()),
    });

    group.bench_function("merge", |b| {
        b.iter(|| merge(black_box(&existing), black_box(&incoming)));
    });

    let scope = bound_scope();
    group.bench_function("scope_with_metadata", |b| {
        b.iter(|| scope.with_metadata(black_box(&incoming)));
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_logging,
    bench_async_logging,
    bench_chunking,
    bench_metadata_merge,
);
criterion_main!(benches);
