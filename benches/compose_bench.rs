//! Benchmark for request composition and payload encoding

use continuum_client::composer::route::sample_entry;
use continuum_client::composer::{
    validate_request_shape, InnerPayload, OperationPayload, RequestComposer, RouteConfig,
    SwapIntent, SWAP_WITH_SEQ_SELECTOR,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use solana_sdk::pubkey::Pubkey;

fn intent() -> SwapIntent {
    SwapIntent::new(
        RouteConfig::try_from(&sample_entry("bench")).unwrap(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        Pubkey::new_unique(),
        1_000_000,
        990_000,
    )
    .unwrap()
}

fn bench_compose(c: &mut Criterion) {
    let composer = RequestComposer::default();
    let intent = intent();
    let mut group = c.benchmark_group("compose");

    for ordinal in [1u64, 1_000, u64::MAX / 2].iter() {
        group.bench_with_input(BenchmarkId::new("compose", ordinal), ordinal, |b, &ordinal| {
            b.iter(|| black_box(composer.compose(black_box(&intent), ordinal).unwrap()));
        });
    }

    group.finish();
}

fn bench_validate(c: &mut Criterion) {
    let composer = RequestComposer::default();
    let intent = intent();
    let request = composer.compose(&intent, 42).unwrap();

    c.bench_function("validate_request_shape", |b| {
        b.iter(|| {
            validate_request_shape(
                composer.program_ids(),
                black_box(&intent),
                &request.handles,
                42,
                black_box(&request.instructions),
            )
            .unwrap()
        });
    });
}

fn bench_payload(c: &mut Criterion) {
    let payload = OperationPayload {
        selector: SWAP_WITH_SEQ_SELECTOR,
        ordinal: 7,
        inner: InnerPayload::swap_base_in(1_000_000, 990_000).encode(),
    };
    let encoded = payload.encode().unwrap();

    c.bench_function("payload_encode", |b| {
        b.iter(|| black_box(black_box(&payload).encode().unwrap()));
    });
    c.bench_function("payload_decode", |b| {
        b.iter(|| black_box(OperationPayload::decode(black_box(&encoded)).unwrap()));
    });
}

criterion_group!(benches, bench_compose, bench_validate, bench_payload);
criterion_main!(benches);
