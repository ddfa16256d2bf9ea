use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use occurrence_parquet::config::ConvertOptions;
use occurrence_parquet::execution::{ExecutionEngine, ExecutionOptions};
use occurrence_parquet::ingestion::{read_partitioned_from_reader, sniff_bytes};
use occurrence_parquet::pipeline::Pipeline;
use occurrence_parquet::processing::{audit, coerce_numeric, transform};
use occurrence_parquet::types::Schema;

const ROWS: usize = 20_000;

fn sample_csv(rows: usize) -> String {
    let mut out = String::from(
        "gbifID,species,decimalLongitude,decimalLatitude,countryCode,elevation,datasetKey,eventDate\n",
    );
    for i in 0..rows {
        let elevation = if i % 50 == 0 { "unknown".to_string() } else { (i % 900).to_string() };
        let _ = writeln!(
            out,
            "{},Species {},{:.5},{:.5},NL,{},ds-{},2020-01-01",
            i,
            i % 97,
            4.0 + (i as f64) / 10_000.0,
            52.0,
            elevation,
            i % 5
        );
    }
    out
}

fn engine() -> ExecutionEngine {
    ExecutionEngine::new(ExecutionOptions::default()).unwrap()
}

fn bench_parsing(c: &mut Criterion) {
    let data = sample_csv(ROWS);
    c.bench_function("sniff_1000_lines", |b| {
        b.iter(|| sniff_bytes(black_box(data.as_bytes()), 1_000).unwrap())
    });
    c.bench_function("coerce_numeric", |b| {
        b.iter(|| {
            for s in ["12.5", "-84.08", "1e3", "unknown", "", "7"] {
                black_box(coerce_numeric(black_box(s)));
            }
        })
    });
    c.bench_function("read_20k_rows", |b| {
        let opts = ConvertOptions::default();
        let schema = Schema::occurrence();
        b.iter(|| {
            let mut rdr = csv::ReaderBuilder::new().from_reader(data.as_bytes());
            read_partitioned_from_reader(&mut rdr, b',', &schema, &opts, None).unwrap()
        })
    });
}

fn bench_stages(c: &mut Criterion) {
    let data = sample_csv(ROWS);
    let opts = ConvertOptions {
        partition_rows: 2_500,
        ..ConvertOptions::default()
    };
    let schema = Schema::occurrence();
    let engine = engine();
    let read = || {
        let mut rdr = csv::ReaderBuilder::new().from_reader(data.as_bytes());
        read_partitioned_from_reader(&mut rdr, b',', &schema, &opts, None)
            .unwrap()
            .table
    };

    let raw = read();
    c.bench_function("audit_20k_rows", |b| b.iter(|| audit(black_box(&raw), &engine, 5)));
    c.bench_function("transform_20k_rows", |b| {
        b.iter_batched(read, |raw| transform(raw, &engine), BatchSize::LargeInput)
    });
}

fn bench_end_to_end(c: &mut Criterion) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let base = std::env::temp_dir().join(format!("occurrence-parquet-bench-{nanos}"));
    std::fs::create_dir_all(&base).unwrap();
    let input = base.join("occurrences.csv");
    std::fs::write(&input, sample_csv(ROWS)).unwrap();

    let pipeline = Pipeline::new(ConvertOptions {
        partition_rows: 5_000,
        ..ConvertOptions::default()
    })
    .unwrap();
    let out_dir = base.join("out");
    c.bench_function("convert_20k_rows", |b| {
        b.iter(|| pipeline.run(&input, &out_dir).unwrap())
    });

    let _ = std::fs::remove_dir_all(&base);
}

criterion_group!(benches, bench_parsing, bench_stages, bench_end_to_end);
criterion_main!(benches);
