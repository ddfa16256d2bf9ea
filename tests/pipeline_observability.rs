use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use occurrence_parquet::config::ConvertOptions;
use occurrence_parquet::error::{ConvertError, IngestFailure, RunStatus};
use occurrence_parquet::execution::ExecutionOptions;
use occurrence_parquet::observability::{
    CompositeObserver, PipelineObserver, Severity, Stage, StageContext, StageStats,
};
use occurrence_parquet::pipeline::Pipeline;

#[derive(Default)]
struct RecordingObserver {
    finished: Mutex<Vec<(Stage, usize)>>,
    warnings: Mutex<Vec<(Stage, String)>>,
    failures: Mutex<Vec<(Stage, Severity)>>,
    alerts: Mutex<Vec<(Stage, Severity)>>,
}

impl PipelineObserver for RecordingObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        self.finished.lock().unwrap().push((ctx.stage, stats.rows));
    }

    fn on_warning(&self, ctx: &StageContext, message: &str) {
        self.warnings.lock().unwrap().push((ctx.stage, message.to_string()));
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, _error: &ConvertError) {
        self.failures.lock().unwrap().push((ctx.stage, severity));
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, _error: &ConvertError) {
        self.alerts.lock().unwrap().push((ctx.stage, severity));
    }
}

fn tmp_path(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("occurrence-parquet-{name}-{nanos}"))
}

fn options() -> ConvertOptions {
    ConvertOptions {
        sample_lines: 12,
        partition_rows: 4,
        execution: ExecutionOptions {
            num_threads: Some(2),
            max_in_flight_partitions: 1,
        },
        ..ConvertOptions::default()
    }
}

#[test]
fn successful_run_reports_every_stage_and_the_recoverable_problems() {
    let obs = Arc::new(RecordingObserver::default());
    let out_dir = tmp_path("observed-out");
    let pipeline = Pipeline::new(options()).unwrap().with_observer(obs.clone());

    pipeline.run("tests/fixtures/occurrences.csv", &out_dir).unwrap();

    let finished = obs.finished.lock().unwrap().clone();
    let stages: Vec<Stage> = finished.iter().map(|(s, _)| *s).collect();
    assert_eq!(
        stages,
        vec![
            Stage::Sniff,
            Stage::Read,
            Stage::Audit,
            Stage::Transform,
            Stage::Write,
            Stage::Validate
        ]
    );
    assert!(finished[1..].iter().all(|(_, rows)| *rows == 10));

    let warnings = obs.warnings.lock().unwrap().clone();
    assert!(warnings
        .iter()
        .any(|(s, m)| *s == Stage::Read && m.contains("1 malformed records skipped")));
    assert!(warnings
        .iter()
        .any(|(s, m)| *s == Stage::Audit && m.contains("column elevation: 2 values")));
    assert!(obs.failures.lock().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&out_dir);
}

#[test]
fn missing_input_is_critical_and_alerts() {
    let obs = Arc::new(RecordingObserver::default());
    let pipeline = Pipeline::new(options()).unwrap().with_observer(obs.clone());

    let err = pipeline
        .run("tests/fixtures/does_not_exist.csv", tmp_path("never-created"))
        .unwrap_err();
    assert!(matches!(
        err,
        ConvertError::Ingest {
            reason: IngestFailure::Io(_),
            ..
        }
    ));
    assert_eq!(err.status(), RunStatus::IngestError);
    assert_eq!(err.status().exit_code(), 3);

    assert_eq!(
        obs.failures.lock().unwrap().clone(),
        vec![(Stage::Sniff, Severity::Critical)]
    );
    assert_eq!(
        obs.alerts.lock().unwrap().clone(),
        vec![(Stage::Sniff, Severity::Critical)]
    );
    assert!(obs.finished.lock().unwrap().is_empty());
}

#[test]
fn detection_errors_only_alert_when_the_threshold_is_lowered() {
    let obs = Arc::new(RecordingObserver::default());
    let pipeline = Pipeline::new(ConvertOptions::default())
        .unwrap()
        .with_observer(obs.clone());
    let _ = pipeline
        .run("tests/fixtures/short.csv", tmp_path("short-default"))
        .unwrap_err();
    assert_eq!(
        obs.failures.lock().unwrap().clone(),
        vec![(Stage::Sniff, Severity::Error)]
    );
    assert!(obs.alerts.lock().unwrap().is_empty());

    let obs = Arc::new(RecordingObserver::default());
    let pipeline = Pipeline::new(ConvertOptions::default())
        .unwrap()
        .with_observer(obs.clone())
        .with_alert_threshold(Severity::Error);
    let _ = pipeline
        .run("tests/fixtures/short.csv", tmp_path("short-lowered"))
        .unwrap_err();
    assert_eq!(
        obs.alerts.lock().unwrap().clone(),
        vec![(Stage::Sniff, Severity::Error)]
    );
}

#[test]
fn write_failure_happens_after_ingest_and_transform_succeed() {
    let obs = Arc::new(RecordingObserver::default());
    let blocker = tmp_path("observed-blocker");
    std::fs::write(&blocker, b"file, not dir").unwrap();

    let pipeline = Pipeline::new(options()).unwrap().with_observer(obs.clone());
    let err = pipeline.run("tests/fixtures/occurrences.csv", &blocker).unwrap_err();
    assert!(matches!(err, ConvertError::Write { .. }));

    let stages: Vec<Stage> = obs.finished.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(
        stages,
        vec![Stage::Sniff, Stage::Read, Stage::Audit, Stage::Transform]
    );
    let failures = obs.failures.lock().unwrap().clone();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, Stage::Write);

    let _ = std::fs::remove_file(&blocker);
}

/// Removes the output directory as soon as the write stage reports success.
struct RemoveOutputAfterWrite {
    out_dir: PathBuf,
}

impl PipelineObserver for RemoveOutputAfterWrite {
    fn on_stage_finished(&self, ctx: &StageContext, _stats: StageStats) {
        if ctx.stage == Stage::Write {
            std::fs::remove_dir_all(&self.out_dir).unwrap();
        }
    }
}

#[test]
fn unlistable_output_after_write_keeps_the_report_and_its_status() {
    let out_dir = tmp_path("vanishing-out");
    let recorder = Arc::new(RecordingObserver::default());
    let observers: Vec<Arc<dyn PipelineObserver>> = vec![
        Arc::new(RemoveOutputAfterWrite {
            out_dir: out_dir.clone(),
        }),
        recorder.clone(),
    ];
    let pipeline = Pipeline::new(options())
        .unwrap()
        .with_observer(Arc::new(CompositeObserver::new(observers)));

    let report = pipeline.run("tests/fixtures/occurrences.csv", &out_dir).unwrap();

    assert_eq!(report.status(), RunStatus::Ok);
    assert_eq!(report.write.files.len(), 3);
    assert_eq!(report.write.rows_written(), 10);
    assert!(report.validation.files.is_empty());
    assert!(report.validation.listing_error.is_some());
    assert!(!report.validation.all_valid());

    assert!(recorder.failures.lock().unwrap().is_empty());
    assert!(recorder
        .warnings
        .lock()
        .unwrap()
        .iter()
        .any(|(s, m)| *s == Stage::Validate && m.starts_with("cannot list")));
    let stages: Vec<Stage> = recorder.finished.lock().unwrap().iter().map(|(s, _)| *s).collect();
    assert_eq!(stages.last(), Some(&Stage::Validate));
}
