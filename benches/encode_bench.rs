use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tapeson::stringify::Stringifier;

// ---------------------------------------------------------------------------
// Test data
// ---------------------------------------------------------------------------

fn plain_ascii(len: usize) -> String {
    (0..len).map(|i| (b'a' + (i % 26) as u8) as char).collect()
}

fn needs_escaping(len: usize) -> String {
    let pattern = "hello \"world\"\nnew\tline\\slash";
    pattern.chars().cycle().take(len).collect()
}

fn unicode_heavy(len: usize) -> String {
    let chars = ['a', '\u{00e9}', '\u{4e16}', '\u{1f600}', 'z'];
    (0..len).map(|i| chars[i % chars.len()]).collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_string_escaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("string_escape");

    for size in [16, 64, 256, 1024, 4096] {
        let plain = plain_ascii(size);
        group.throughput(Throughput::Bytes(plain.len() as u64));
        group.bench_with_input(BenchmarkId::new("ascii", size), &plain, |b, data| {
            b.iter(|| {
                let mut s = Stringifier::new();
                s.push_string(black_box(data)).unwrap();
            })
        });

        let escaped = needs_escaping(size);
        group.throughput(Throughput::Bytes(escaped.len() as u64));
        group.bench_with_input(BenchmarkId::new("escaped", size), &escaped, |b, data| {
            b.iter(|| {
                let mut s = Stringifier::new();
                s.push_string(black_box(data)).unwrap();
            })
        });

        let uni = unicode_heavy(size);
        group.throughput(Throughput::Bytes(uni.len() as u64));
        group.bench_with_input(BenchmarkId::new("unicode", size), &uni, |b, data| {
            b.iter(|| {
                let mut s = Stringifier::new();
                s.push_string(black_box(data)).unwrap();
            })
        });
    }
    group.finish();
}

fn bench_number_format(c: &mut Criterion) {
    let mut group = c.benchmark_group("number_format");

    let int_cases: &[(&str, f64)] = &[
        ("zero", 0.0),
        ("small", 42.0),
        ("medium", 1_234_567.0),
        ("large", 9_223_372_036_854_775_807.0),
        ("negative", -1_234_567_890.0),
    ];
    for (name, value) in int_cases {
        group.bench_with_input(BenchmarkId::new("integer_valued", *name), value, |b, &val| {
            b.iter(|| {
                let mut s = Stringifier::new();
                s.push_number(black_box(val)).unwrap();
            })
        });
    }

    let float_cases: &[(&str, f64)] = &[
        ("simple", 3.14159265),
        ("scientific", 6.022e23),
        ("tiny", 5e-324),
        ("max", 1.7976931348623157e308),
        ("negative", -273.15),
    ];
    for (name, value) in float_cases {
        group.bench_with_input(BenchmarkId::new("float", *name), value, |b, &val| {
            b.iter(|| {
                let mut s = Stringifier::new();
                s.push_number(black_box(val)).unwrap();
            })
        });
    }

    group.bench_function("batch_100", |b| {
        let values: Vec<f64> = (0..100).map(|i| i as f64 * 3.14159265).collect();
        b.iter(|| {
            let mut s = Stringifier::new();
            for &v in &values {
                s.push_number(black_box(v)).unwrap();
            }
        })
    });

    group.finish();
}

fn bench_document_shapes(c: &mut Criterion) {
    let mut group = c.benchmark_group("stringify_document");

    for num_keys in [10, 50, 200] {
        group.bench_with_input(
            BenchmarkId::new("flat_object", num_keys),
            &num_keys,
            |b, &n| {
                b.iter(|| {
                    let mut s = Stringifier::new();
                    s.object_start().unwrap();
                    for i in 0..n {
                        s.push_key(&format!("key_{i}")).unwrap();
                        s.push_number(black_box(i as f64)).unwrap();
                    }
                    s.object_end().unwrap();
                    s.finish().unwrap()
                })
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_string_escaping,
    bench_number_format,
    bench_document_shapes,
);
criterion_main!(benches);
