//! Throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tn5250_automate::core::datastream::codes::{CC1_LOCK, CC2_UNLOCK};
use tn5250_automate::core::datastream::{DataStreamParser, RecordBuilder};
use tn5250_automate::{CodepageRegistry, Dimensions, KeySequence};

fn codepage_benchmark(c: &mut Criterion) {
    let registry = CodepageRegistry::builtin().unwrap();
    let data: Vec<u8> = (0..=255u8).cycle().take(4096).collect();

    let mut group = c.benchmark_group("codepage");
    group.throughput(Throughput::Bytes(data.len() as u64));

    group.bench_function("decode_37", |b| {
        let mut converter = registry.converter("37").unwrap();
        b.iter(|| black_box(converter.decode(black_box(&data))))
    });

    group.bench_function("decode_930", |b| {
        let mut converter = registry.converter("930").unwrap();
        b.iter(|| {
            converter.reset();
            black_box(converter.decode(black_box(&data)))
        })
    });

    group.bench_function("encode_37", |b| {
        let converter = registry.converter("37").unwrap();
        let text = "SIGN ON  System . . . . . :   PUB400  User  . . . . . . . . . . . . . . ".repeat(50);
        b.iter(|| black_box(converter.encode(black_box(&text)).unwrap()))
    });

    group.finish();
}

fn keys_benchmark(c: &mut Criterion) {
    let registry = CodepageRegistry::builtin().unwrap();
    let converter = registry.converter("37").unwrap();
    let input = "MYUSER[tab]MYPASS[enter]WRKACTJOB[enter][pf3][pf12]".repeat(20);

    let mut group = c.benchmark_group("keys");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("parse_and_encode", |b| {
        b.iter(|| {
            let seq = KeySequence::parse(black_box(&input)).unwrap();
            black_box(seq.encode(&converter).unwrap())
        })
    });

    group.finish();
}

fn datastream_benchmark(c: &mut Criterion) {
    let registry = CodepageRegistry::builtin().unwrap();
    let converter = registry.converter("37").unwrap();

    let mut builder = RecordBuilder::new().clear_unit().write_to_display(CC1_LOCK, CC2_UNLOCK);
    for row in 1..=24u8 {
        builder = builder
            .set_buffer_address(row, 2)
            .start_field(None, 0x20, 60)
            .text("Work with Active Jobs   CPU %: 1.2   Elapsed time: 00:00:00", &converter)
            .unwrap();
    }
    let record = builder.insert_cursor(20, 7).build();

    let mut group = c.benchmark_group("datastream");
    group.throughput(Throughput::Bytes(record.len() as u64));

    group.bench_function("parse_full_screen", |b| {
        let mut parser = DataStreamParser::new(converter.clone(), Dimensions::MODEL_2);
        b.iter(|| black_box(parser.parse(black_box(&record)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, codepage_benchmark, keys_benchmark, datastream_benchmark);
criterion_main!(benches);
