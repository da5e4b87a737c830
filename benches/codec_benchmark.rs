//! Trace header and sample codec throughput.
//!
//! # Benchmarks
//!
//! - `decode_headers`: default rule set out of packed header windows
//! - `encode_headers`: the same block back into bytes
//! - `decode_ibm_samples`: IBM float conversion of a trace block
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench codec_benchmark
//! ```

use std::hint::black_box;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use segy_shard::codec::{self, RecordLayout};
use segy_shard::{Meta, Param, Rule};

const RECORDS: usize = 4096;
const NS: usize = 1000;

fn populated_block(rule: &Arc<Rule>) -> Param {
    let mut rng = fastrand::Rng::with_seed(3);
    let mut prm = Param::new(Arc::clone(rule), RECORDS);
    for i in 0..RECORDS {
        prm.set(i, Meta::Il, rng.i64(0..2000)).unwrap();
        prm.set(i, Meta::Xl, rng.i64(0..2000)).unwrap();
        prm.set(i, Meta::Offset, rng.i64(0..6000)).unwrap();
        prm.set(i, Meta::XSrc, rng.f64() * 1.0e5).unwrap();
        prm.set(i, Meta::YSrc, rng.f64() * 1.0e5).unwrap();
    }
    prm
}

fn bench_headers(c: &mut Criterion) {
    let rule = Arc::new(Rule::with_defaults(false));
    let layout = RecordLayout::headers(&rule);
    let prm = populated_block(&rule);
    let mut buf = vec![0u8; RECORDS * layout.stride];
    codec::encode(&prm, &rule, RECORDS, layout, &mut buf, 0).unwrap();

    c.bench_function("encode_headers", |b| {
        let mut out = vec![0u8; buf.len()];
        b.iter(|| {
            codec::encode(black_box(&prm), &rule, RECORDS, layout, &mut out, 0).unwrap();
        });
    });

    c.bench_function("decode_headers", |b| {
        let mut decoded = Param::new(Arc::clone(&rule), RECORDS);
        b.iter(|| {
            codec::decode(black_box(&buf), layout, &rule, RECORDS, &mut decoded, 0).unwrap();
        });
    });
}

fn bench_samples(c: &mut Criterion) {
    let mut rng = fastrand::Rng::with_seed(5);
    let mut bytes = Vec::with_capacity(NS * 64 * 4);
    for _ in 0..NS * 64 {
        let value = (rng.f32() - 0.5) * 1.0e4;
        bytes.extend_from_slice(&codec::ieee_to_ibm(value).to_be_bytes());
    }
    let mut samples = vec![0f32; NS * 64];

    c.bench_function("decode_ibm_samples", |b| {
        b.iter(|| codec::decode_samples(black_box(&bytes), 1, &mut samples).unwrap());
    });
}

criterion_group!(benches, bench_headers, bench_samples);
criterion_main!(benches);
