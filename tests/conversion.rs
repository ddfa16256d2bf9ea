use std::fmt::Write as _;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use parquet::file::reader::FileReader;
use parquet::file::serialized_reader::SerializedFileReader;
use parquet::record::{Row, RowAccessor};

use occurrence_parquet::config::ConvertOptions;
use occurrence_parquet::error::{ConvertError, DetectionFailure, IngestFailure, RunStatus};
use occurrence_parquet::execution::ExecutionOptions;
use occurrence_parquet::output::list_parquet_files;
use occurrence_parquet::pipeline::Pipeline;
use occurrence_parquet::types::{NUMERIC_SENTINEL, TEXT_PLACEHOLDER};

fn tmp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("occurrence-parquet-{name}-{nanos}"))
}

fn options(sample_lines: usize, partition_rows: usize) -> ConvertOptions {
    ConvertOptions {
        sample_lines,
        partition_rows,
        execution: ExecutionOptions {
            num_threads: Some(2),
            max_in_flight_partitions: 2,
        },
        ..ConvertOptions::default()
    }
}

fn read_rows(path: &Path) -> Vec<Row> {
    let reader = SerializedFileReader::new(File::open(path).unwrap()).unwrap();
    reader.into_iter().map(|r| r.unwrap()).collect()
}

fn write_generated_csv(path: &Path, rows: usize) {
    let mut out = String::from(
        "gbifID,species,decimalLongitude,decimalLatitude,countryCode,elevation,datasetKey,eventDate\n",
    );
    for i in 0..rows {
        let _ = writeln!(
            out,
            "{},Species {},{:.4},{:.4},NL,{},ds-{},2020-01-{:02}",
            100_000 + i,
            i % 37,
            4.0 + (i as f64) / 1000.0,
            52.0 - (i as f64) / 1000.0,
            i % 400,
            i % 3,
            1 + i % 28
        );
    }
    std::fs::write(path, out).unwrap();
}

#[test]
fn thousand_well_formed_rows_round_trip() {
    let input = tmp_path("thousand.csv");
    let out_dir = tmp_path("thousand-out");
    write_generated_csv(&input, 1_000);

    let pipeline = Pipeline::new(options(1_000, 300)).unwrap();
    let report = pipeline.run(&input, &out_dir).unwrap();

    assert_eq!(report.status(), RunStatus::Ok);
    assert_eq!(report.delimiter, ',');
    assert_eq!(report.read.rows_read, 1_000);
    assert_eq!(report.read.skipped_records, 0);
    assert!(report.audit.missing.is_empty());
    assert!(report.audit.invalid.is_empty());
    assert_eq!(report.impute.total(), 0);

    let files = list_parquet_files(&out_dir).unwrap();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["part.0.parquet", "part.1.parquet", "part.2.parquet", "part.3.parquet"]
    );
    assert_eq!(report.write.rows_written(), 1_000);
    assert!(report.validation.all_valid());
    assert_eq!(report.validation.total_rows(), 1_000);

    let first = read_rows(&out_dir.join("part.0.parquet"));
    assert_eq!(first.len(), 300);
    assert_eq!(first[0].get_string(0).unwrap(), "100000");
    assert_eq!(first[0].get_double(2).unwrap(), 4.0);
    assert_eq!(first[0].get_string(7).unwrap(), "2020-01-01");
    assert_eq!(read_rows(&out_dir.join("part.3.parquet")).len(), 100);

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn fixture_reports_invalid_values_and_imputes_defaults() {
    let out_dir = tmp_path("fixture-out");
    let pipeline = Pipeline::new(options(12, 4)).unwrap();
    let report = pipeline.run("tests/fixtures/occurrences.csv", &out_dir).unwrap();

    assert_eq!(report.status(), RunStatus::Ok);
    assert_eq!(report.read.rows_read, 10);
    assert_eq!(report.read.skipped_records, 1);

    let elevation = report.audit.invalid_for("elevation").unwrap();
    assert_eq!(elevation.invalid_cells, 2);
    assert_eq!(elevation.preview, vec!["unknown".to_string(), "~20".to_string()]);
    assert_eq!(report.audit.missing_for("elevation"), 3);

    let longitude = report.audit.invalid_for("decimalLongitude").unwrap();
    assert_eq!(longitude.preview, vec!["abc".to_string()]);
    assert_eq!(report.audit.missing_for("decimalLongitude"), 2);
    assert_eq!(report.audit.missing_for("species"), 1);
    assert_eq!(report.audit.missing_for("countryCode"), 1);
    assert_eq!(report.audit.missing_for("eventDate"), 1);
    assert_eq!(report.audit.missing_for("gbifID"), 0);
    assert!(report.audit.invalid_for("decimalLatitude").is_none());

    let rows: Vec<usize> = report.audit.partition_rows.iter().map(|p| p.rows).collect();
    assert_eq!(rows, vec![4, 4, 2]);
    assert_eq!(report.impute.filled.get("elevation"), Some(&3));

    let part0 = read_rows(&out_dir.join("part.0.parquet"));
    assert_eq!(part0.len(), 4);
    // 1002: elevation "unknown"
    assert_eq!(part0[1].get_double(5).unwrap(), NUMERIC_SENTINEL);
    // 1003: empty species and eventDate
    assert_eq!(part0[2].get_string(1).unwrap(), TEXT_PLACEHOLDER);
    assert_eq!(part0[2].get_string(7).unwrap(), TEXT_PLACEHOLDER);
    // 1004: "NA" longitude and empty elevation
    assert_eq!(part0[3].get_double(2).unwrap(), NUMERIC_SENTINEL);
    assert_eq!(part0[3].get_double(5).unwrap(), NUMERIC_SENTINEL);

    let part1 = read_rows(&out_dir.join("part.1.parquet"));
    // 1005 keeps the quoted comma
    assert_eq!(part1[0].get_string(1).unwrap(), "Canis lupus, italicus");
    // 1006 was malformed, so 1007 follows directly
    assert_eq!(part1[1].get_string(0).unwrap(), "1007");
    assert_eq!(part1[1].get_double(2).unwrap(), NUMERIC_SENTINEL);

    let part2 = read_rows(&out_dir.join("part.2.parquet"));
    assert_eq!(part2[1].get_double(5).unwrap(), 150.0);

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn reordered_tab_file_with_extra_columns_keeps_schema_order() {
    let out_dir = tmp_path("tsv-out");
    let pipeline = Pipeline::new(options(4, 100)).unwrap();
    let report = pipeline
        .run("tests/fixtures/occurrences_reordered.tsv", &out_dir)
        .unwrap();

    assert_eq!(report.delimiter, '\t');
    assert_eq!(
        report.read.dropped_columns,
        vec!["locality".to_string(), "basisOfRecord".to_string()]
    );

    let reader = SerializedFileReader::new(File::open(out_dir.join("part.0.parquet")).unwrap()).unwrap();
    let names: Vec<String> = reader
        .metadata()
        .file_metadata()
        .schema_descr()
        .columns()
        .iter()
        .map(|c| c.path().string())
        .collect();
    assert_eq!(
        names,
        vec![
            "gbifID",
            "species",
            "decimalLongitude",
            "decimalLatitude",
            "countryCode",
            "elevation",
            "datasetKey",
            "eventDate"
        ]
    );

    let rows = read_rows(&out_dir.join("part.0.parquet"));
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get_string(0).unwrap(), "1");
    assert_eq!(rows[0].get_double(2).unwrap(), -84.08);
    assert_eq!(rows[1].get_double(5).unwrap(), 23.5);
    assert_eq!(rows[2].get_string(1).unwrap(), TEXT_PLACEHOLDER);
    assert_eq!(rows[2].get_double(5).unwrap(), NUMERIC_SENTINEL);

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn short_sample_fails_before_output_directory_exists() {
    let out_dir = tmp_path("short-out");
    let pipeline = Pipeline::new(ConvertOptions::default()).unwrap();
    let err = pipeline.run("tests/fixtures/short.csv", &out_dir).unwrap_err();

    assert!(matches!(
        err,
        ConvertError::FormatDetection {
            reason: DetectionFailure::TooShort { requested: 1000, found: 3 },
            ..
        }
    ));
    assert_eq!(err.status(), RunStatus::FormatDetectionError);
    assert_eq!(err.status().exit_code(), 2);
    assert!(!out_dir.exists());
}

#[test]
fn missing_schema_column_is_an_ingest_error() {
    let input = tmp_path("no-elevation.csv");
    let out_dir = tmp_path("no-elevation-out");
    std::fs::write(
        &input,
        "gbifID,species,decimalLongitude,decimalLatitude,countryCode,datasetKey,eventDate\n\
         1,Puma concolor,-84.08,9.93,CR,ds-a,2020-05-01\n\
         2,Lynx lynx,10.75,59.91,NO,ds-a,2019-11-12\n",
    )
    .unwrap();

    let pipeline = Pipeline::new(options(3, 10)).unwrap();
    let err = pipeline.run(&input, &out_dir).unwrap_err();
    match &err {
        ConvertError::Ingest {
            reason: IngestFailure::SchemaMismatch { missing, .. },
            ..
        } => assert_eq!(missing, &vec!["elevation".to_string()]),
        other => panic!("expected schema mismatch, got {other:?}"),
    }
    assert!(err.to_string().contains("missing required column(s)"));
    assert_eq!(err.status(), RunStatus::IngestError);
    assert!(!out_dir.exists());

    let _ = std::fs::remove_file(&input);
}

#[test]
fn unwritable_output_is_a_write_error_with_no_files() {
    // A regular file where the output directory should be.
    let blocker = tmp_path("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let pipeline = Pipeline::new(options(12, 4)).unwrap();
    let err = pipeline
        .run("tests/fixtures/occurrences.csv", &blocker)
        .unwrap_err();

    assert!(matches!(err, ConvertError::Write { .. }));
    assert_eq!(err.status(), RunStatus::WriteError);
    assert_eq!(err.status().exit_code(), 4);
    assert!(blocker.is_file());

    let _ = std::fs::remove_file(&blocker);
}

#[test]
fn one_failed_partition_keeps_the_others_and_reports_write_error() {
    let input = tmp_path("partial.csv");
    let out_dir = tmp_path("partial-out");
    write_generated_csv(&input, 700);
    // A directory squatting on partition 1's file name.
    std::fs::create_dir_all(out_dir.join("part.1.parquet")).unwrap();

    let pipeline = Pipeline::new(options(500, 300)).unwrap();
    let report = pipeline.run(&input, &out_dir).unwrap();

    assert_eq!(report.status(), RunStatus::WriteError);
    assert_eq!(report.status().exit_code(), 4);
    let written: Vec<usize> = report.write.files.iter().map(|f| f.partition).collect();
    assert_eq!(written, vec![0, 2]);
    assert_eq!(report.write.rows_written(), 400);
    assert_eq!(report.write.failures.len(), 1);
    assert_eq!(report.write.failures[0].partition, 1);

    assert!(out_dir.join("part.0.parquet").is_file());
    assert!(out_dir.join("part.2.parquet").is_file());
    assert!(out_dir.join("part.1.parquet").is_dir());
    assert_eq!(report.validation.files.len(), 2);
    assert!(report.validation.all_valid());
    assert_eq!(report.validation.total_rows(), 400);

    let _ = std::fs::remove_file(&input);
    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn rerun_into_same_directory_keeps_foreign_files() {
    let out_dir = tmp_path("rerun-out");
    std::fs::create_dir_all(&out_dir).unwrap();
    std::fs::write(out_dir.join("README.txt"), b"keep me").unwrap();

    let pipeline = Pipeline::new(options(12, 100)).unwrap();
    let first = pipeline.run("tests/fixtures/occurrences.csv", &out_dir).unwrap();
    let second = pipeline.run("tests/fixtures/occurrences.csv", &out_dir).unwrap();

    assert_eq!(first.validation, second.validation);
    assert!(out_dir.join("README.txt").exists());
    assert_eq!(list_parquet_files(&out_dir).unwrap().len(), 1);

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn inspect_flags_mixed_numeric_columns_without_writing() {
    let pipeline = Pipeline::new(ConvertOptions {
        inspect_rows: 5,
        ..options(12, 2)
    })
    .unwrap();
    let report = pipeline.inspect("tests/fixtures/occurrences.csv").unwrap();

    assert_eq!(report.rows_sampled, 5);
    let elevation = report.columns.iter().find(|c| c.column == "elevation").unwrap();
    // 1150, unknown, 2, <empty>, 800
    assert_eq!((elevation.numeric, elevation.text, elevation.missing), (3, 1, 1));
    let mixed: Vec<&str> = report.mixed_columns().map(|c| c.column.as_str()).collect();
    assert_eq!(mixed, vec!["elevation"]);
}
