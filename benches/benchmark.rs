use std::hint::black_box;

use bitemporal_encoders::array::NdArray;
use bitemporal_encoders::table::ASOF;
use bitemporal_encoders::{Cutoff, DateMode, Pick, Scalar, Table, Value, bitemporal_read, decode, dumps, encode, loads};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::{ArrayD, IxDyn};

fn start() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
}

// every key revised `versions` times, one day apart
fn history(keys: usize, versions: usize) -> Table {
    let mut index = Vec::with_capacity(keys * versions);
    let mut values = Vec::with_capacity(keys * versions);
    let mut asof = Vec::with_capacity(keys * versions);
    for v in 0..versions {
        for k in 0..keys {
            index.push(Scalar::DateTime(start() + Duration::days(k as i64)));
            values.push(Scalar::Float((k * versions + v) as f64));
            asof.push(Scalar::DateTime(start() + Duration::days((k + v) as i64)));
        }
    }
    Table::from_columns(index, vec![("close".to_string(), values), (ASOF.to_string(), asof)]).unwrap()
}

fn document(rows: usize) -> Value {
    let table = history(rows, 1).drop_column(ASOF);
    let array = NdArray::Float64(ArrayD::from_shape_vec(IxDyn(&[rows, 4]), vec![0.5; rows * 4]).unwrap());
    Value::map([
        ("name", Value::from("prices")),
        ("when", Value::DateTime(start())),
        ("table", Value::Table(table)),
        ("array", Value::Array(array)),
        ("tags", Value::List((0..rows as i64).map(Value::Int).collect())),
    ])
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let doc = document(1_000);
    c.bench_function("encode 1k", |b| b.iter(|| encode(black_box(&doc)).unwrap()));
    let encoded = encode(&doc).unwrap();
    c.bench_function("decode 1k", |b| b.iter(|| decode(black_box(encoded.clone()), DateMode::Off).unwrap()));
    c.bench_function("dumps 1k", |b| b.iter(|| dumps(black_box(&doc)).unwrap()));
    let text = dumps(&doc).unwrap();
    c.bench_function("loads 1k", |b| b.iter(|| loads(black_box(&text)).unwrap()));

    let small = history(1_000, 3);
    c.bench_function("bitemporal read 3k", |b| b.iter(|| bitemporal_read(black_box(&small), None, Pick::Last).unwrap()));
    let large = history(100_000, 3);
    c.bench_function("bitemporal read 300k", |b| b.iter(|| bitemporal_read(black_box(&large), None, Pick::Last).unwrap()));
    let cutoff = start() + Duration::days(500);
    c.bench_function("bitemporal read 300k cutoff", |b| {
        b.iter(|| bitemporal_read(black_box(&large), Some(Cutoff::At(cutoff)), Pick::Last).unwrap())
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
