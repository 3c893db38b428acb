//! Codec throughput benchmarks.
//!
//! Measures encoding and decoding of one 576-byte record through in-memory
//! streams, isolating codec cost from socket cost.

use criterion::{Criterion, criterion_group, criterion_main};
use relay_common::codec::{read_message, write_message};
use relay_common::message::Message;
use std::hint::black_box;

fn bench_write(c: &mut Criterion) {
    let msg = Message::new("alice", &"x".repeat(300));
    let mut wire = Vec::with_capacity(1024);

    c.bench_function("codec_write_message", |b| {
        b.iter(|| {
            wire.clear();
            write_message(&mut wire, black_box(&msg)).unwrap();
        });
    });
}

fn bench_read(c: &mut Criterion) {
    let msg = Message::new("bob", &"y".repeat(300));
    let mut wire = Vec::new();
    write_message(&mut wire, &msg).unwrap();

    c.bench_function("codec_read_message", |b| {
        b.iter(|| {
            let decoded = read_message(&mut black_box(wire.as_slice())).unwrap();
            black_box(decoded);
        });
    });
}

fn bench_restamp(c: &mut Criterion) {
    let mut msg = Message::new("mallory", "hello");

    c.bench_function("message_restamp", |b| {
        b.iter(|| msg.restamp(black_box("carol")));
    });
}

criterion_group!(benches, bench_write, bench_read, bench_restamp);
criterion_main!(benches);
