//! Benchmark for the receive hot path.
//!
//! TARGET: a full 1472-byte update datagram applied in well under 10 μs
//!
//! Run with: cargo bench --package xplane_udp --bench dispatch_benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use xplane_udp::client::dispatch;
use xplane_udp::protocol::{subscribe_packet, HEADER_LEN};
use xplane_udp::{LatestValueCache, MAX_DATAGRAM_SIZE};

fn full_update_datagram() -> Vec<u8> {
    let records = (MAX_DATAGRAM_SIZE - HEADER_LEN) / 8;
    let mut datagram = b"RREF,".to_vec();
    for id in 0..records as i32 {
        datagram.extend_from_slice(&id.to_ne_bytes());
        datagram.extend_from_slice(&(id as f32 * 0.5).to_ne_bytes());
    }
    datagram
}

fn benchmark_dispatch(c: &mut Criterion) {
    let cache = LatestValueCache::new();
    let datagram = full_update_datagram();

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Bytes(datagram.len() as u64));
    group.bench_function("full_update_datagram", |b| {
        b.iter(|| dispatch(black_box(&cache), black_box(&datagram)))
    });
    group.finish();
}

fn benchmark_subscribe_packet(c: &mut Criterion) {
    c.bench_function("subscribe_packet", |b| {
        b.iter(|| subscribe_packet(black_box(1), black_box(42), black_box("sim/flightmodel/engine/ENGN_N1_[3]"), 400))
    });
}

criterion_group!(benches, benchmark_dispatch, benchmark_subscribe_packet);
criterion_main!(benches);
