//! Criterion benchmarks for amlb-data: label encoding of a split.

use criterion::{Criterion, criterion_group, criterion_main};
use ndarray::Array2;

use amlb_data::{DataType, Dataset, Feature, InMemoryDataset, SplitProperty, Value};

const COLORS: [&str; 5] = ["red", "green", "blue", "cyan", "magenta"];

fn make_dataset(n_rows: usize, n_numeric: usize) -> InMemoryDataset {
    let mut features: Vec<Feature> = (0..n_numeric)
        .map(|i| Feature::new(i, format!("x{i}"), Some(DataType::Real)))
        .collect();
    features.push(Feature::new(n_numeric, "color", Some(DataType::Nominal)).with_values(COLORS));
    features.push(Feature::new(n_numeric + 1, "label", Some(DataType::Nominal)).with_values(["a", "b"]));

    let n_cols = n_numeric + 2;
    let cells: Vec<Value> = (0..n_rows)
        .flat_map(|r| {
            (0..n_cols).map(move |c| {
                if c < n_numeric {
                    Value::Number((r * 31 + c * 7) as f64 % 97.0)
                } else if c == n_numeric {
                    Value::from(COLORS[r % COLORS.len()])
                } else {
                    Value::from(if r % 3 == 0 { "a" } else { "b" })
                }
            })
        })
        .collect();
    let data = Array2::from_shape_vec((n_rows, n_cols), cells).unwrap();
    InMemoryDataset::new(features, "label", data.clone(), data).unwrap()
}

fn bench_data_enc(c: &mut Criterion) {
    let ds = make_dataset(10_000, 20);

    c.bench_function("data_enc_10000x22", |b| {
        b.iter(|| {
            ds.train().release(Some(&[SplitProperty::DataEnc]));
            ds.train().data_enc().unwrap()
        });
    });
}

fn bench_x_enc_cached(c: &mut Criterion) {
    let ds = make_dataset(10_000, 20);
    ds.train().x_enc().unwrap();

    c.bench_function("x_enc_cached_hit", |b| {
        b.iter(|| ds.train().x_enc().unwrap());
    });
}

criterion_group!(benches, bench_data_enc, bench_x_enc_cached);
criterion_main!(benches);
