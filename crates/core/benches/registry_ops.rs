// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use labwired_rtos::{RingbufType, Rtos};

fn bench_queue_fill_drain(c: &mut Criterion) {
    let mut rtos = Rtos::new();
    let q = rtos.queues.create(20, 18).unwrap();
    let item = [0x5Au8; 18];
    let mut out = [0u8; 18];

    c.bench_function("queue_fill_drain_20", |b| {
        b.iter(|| {
            while rtos.queues.send_to_back(q, black_box(&item)).is_ok() {}
            while rtos.queues.receive(q, &mut out).is_ok() {}
        })
    });
}

fn bench_ringbuf_split(c: &mut Criterion) {
    let mut rtos = Rtos::new();
    let payload = [0xA5u8; 100];

    c.bench_function("ringbuf_split_send_receive", |b| {
        b.iter(|| {
            rtos.ringbufs.reset();
            let rb = rtos.ringbufs.create(0, RingbufType::AllowSplit).unwrap();
            while rtos.ringbufs.send(rb, black_box(&payload)).is_ok() {}
            while let Ok(item) = rtos.ringbufs.receive_split(rb) {
                black_box(item.len());
            }
        })
    });
}

criterion_group!(benches, bench_queue_fill_drain, bench_ringbuf_split);
criterion_main!(benches);
