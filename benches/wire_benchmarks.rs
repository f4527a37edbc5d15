// ABOUTME: Benchmark suite for command encoding and inbound frame handling
// ABOUTME: Measures framing throughput and the inbound decode path

use bytes::{Bytes, BytesMut};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use rmq_stream::commands::{CreateStream, DeclarePublisher, parse_inbound};
use rmq_stream::framing::{encode_command, try_read_frame};
use std::time::Duration;

fn sample_declare_publisher() -> DeclarePublisher {
    DeclarePublisher {
        correlation_id: 42,
        publisher_id: 7,
        publisher_ref: Some("reliable-producer-0".to_string()),
        stream: "invoices-emea".to_string(),
    }
}

fn sample_create_stream(arguments: usize) -> CreateStream {
    CreateStream {
        correlation_id: 1,
        stream: "invoices-emea".to_string(),
        arguments: (0..arguments)
            .map(|i| (format!("argument-{i}"), format!("value-{i}")))
            .collect(),
    }
}

fn sample_query_offset_response() -> Bytes {
    let mut payload = BytesMut::new();
    payload.extend_from_slice(&[0x80, 0x0B, 0x00, 0x01]);
    payload.extend_from_slice(&42u32.to_be_bytes());
    payload.extend_from_slice(&[0x00, 0x01]);
    payload.extend_from_slice(&123_456_789u64.to_be_bytes());
    payload.freeze()
}

fn bench_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    group.bench_function("declare_publisher", |b| {
        let command = sample_declare_publisher();
        let mut buf = BytesMut::with_capacity(256);
        b.iter(|| {
            buf.clear();
            encode_command(&mut buf, black_box(&command)).unwrap();
            black_box(buf.len())
        });
    });

    for arguments in [0usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::new("create_stream", arguments),
            &arguments,
            |b, &arguments| {
                let command = sample_create_stream(arguments);
                let mut buf = BytesMut::with_capacity(2048);
                b.iter(|| {
                    buf.clear();
                    encode_command(&mut buf, black_box(&command)).unwrap();
                    black_box(buf.len())
                });
            },
        );
    }

    group.finish();
}

fn bench_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    group.bench_function("parse_query_offset_response", |b| {
        let frame = sample_query_offset_response();
        b.iter(|| parse_inbound(black_box(frame.clone())).unwrap());
    });

    group.bench_function("drain_100_heartbeat_frames", |b| {
        let mut wire = BytesMut::new();
        for _ in 0..100 {
            wire.extend_from_slice(&[0x00, 0x00, 0x00, 0x04, 0x00, 0x17, 0x00, 0x01]);
        }
        let wire = wire.freeze();
        b.iter(|| {
            let mut buf = BytesMut::from(wire.as_ref());
            let mut frames = 0u32;
            while let Some(frame) = try_read_frame(&mut buf, 0).unwrap() {
                black_box(frame);
                frames += 1;
            }
            assert_eq!(frames, 100);
        });
    });

    group.finish();
}

fn configure() -> Criterion {
    Criterion::default()
        .measurement_time(Duration::from_secs(3))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches;
    config = configure();
    targets = bench_encoding, bench_decoding
}
criterion_main!(benches);
