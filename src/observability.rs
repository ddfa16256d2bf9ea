//! Pipeline observers: stage completions, recoverable warnings, fatal failures and alerts.
//!
//! Observers are attached to a [`crate::pipeline::Pipeline`] at runtime. They are never part of
//! the serialized configuration.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::{ConvertError, IngestFailure, WriteFailure};

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (run failed).
    Error,
    /// Critical error (I/O or other infrastructure failures).
    Critical,
}

/// Pipeline stage an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Sniff,
    Read,
    Audit,
    Transform,
    Write,
    Validate,
    Inspect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Sniff => "sniff",
            Stage::Read => "read",
            Stage::Audit => "audit",
            Stage::Transform => "transform",
            Stage::Write => "write",
            Stage::Validate => "validate",
            Stage::Inspect => "inspect",
        };
        f.write_str(s)
    }
}

/// Where an event happened.
#[derive(Debug, Clone)]
pub struct StageContext {
    /// Source file of the run.
    pub path: PathBuf,
    pub stage: Stage,
}

/// Minimal stats reported when a stage completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageStats {
    /// Rows handled by the stage.
    pub rows: usize,
    pub elapsed: Duration,
}

/// Observer interface for pipeline outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait PipelineObserver: Send + Sync {
    /// Called when a stage completes.
    fn on_stage_finished(&self, _ctx: &StageContext, _stats: StageStats) {}

    /// Called for recoverable problems (invalid values, skipped records, failed partitions).
    fn on_warning(&self, _ctx: &StageContext, _message: &str) {}

    /// Called when the run fails.
    fn on_failure(&self, _ctx: &StageContext, _severity: Severity, _error: &ConvertError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Severity of a fatal error: I/O problems are [`Severity::Critical`], everything else
/// [`Severity::Error`].
pub fn severity_for_error(e: &ConvertError) -> Severity {
    match e {
        ConvertError::Ingest {
            reason: IngestFailure::Io(_),
            ..
        }
        | ConvertError::Write {
            reason: WriteFailure::Io(_),
            ..
        } => Severity::Critical,
        ConvertError::Ingest {
            reason: IngestFailure::Csv(err),
            ..
        } => match err.kind() {
            ::csv::ErrorKind::Io(_) => Severity::Critical,
            _ => Severity::Error,
        },
        _ => Severity::Error,
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        for o in &self.observers {
            o.on_stage_finished(ctx, stats);
        }
    }

    fn on_warning(&self, ctx: &StageContext, message: &str) {
        for o in &self.observers {
            o.on_warning(ctx, message);
        }
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs pipeline events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        eprintln!(
            "[{}][ok] path={} rows={} elapsed_ms={}",
            ctx.stage,
            ctx.path.display(),
            stats.rows,
            stats.elapsed.as_millis()
        );
    }

    fn on_warning(&self, ctx: &StageContext, message: &str) {
        eprintln!("[{}][warn] path={} {}", ctx.stage, ctx.path.display(), message);
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        eprintln!(
            "[{}][{:?}] path={} err={}",
            ctx.stage,
            severity,
            ctx.path.display(),
            error
        );
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        eprintln!(
            "[ALERT][{}][{:?}] path={} err={}",
            ctx.stage,
            severity,
            ctx.path.display(),
            error
        );
    }
}

/// Forwards pipeline events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl PipelineObserver for TracingObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        tracing::info!(
            stage = %ctx.stage,
            path = %ctx.path.display(),
            rows = stats.rows,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "stage finished"
        );
    }

    fn on_warning(&self, ctx: &StageContext, message: &str) {
        tracing::warn!(stage = %ctx.stage, path = %ctx.path.display(), "{message}");
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        tracing::error!(
            stage = %ctx.stage,
            path = %ctx.path.display(),
            severity = ?severity,
            %error,
            "stage failed"
        );
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        tracing::error!(
            alert = true,
            stage = %ctx.stage,
            path = %ctx.path.display(),
            severity = ?severity,
            %error,
            "alert"
        );
    }
}

/// Appends pipeline events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_stage_finished(&self, ctx: &StageContext, stats: StageStats) {
        self.append_line(&format!(
            "{} ok stage={} path={} rows={} elapsed_ms={}",
            unix_ts(),
            ctx.stage,
            ctx.path.display(),
            stats.rows,
            stats.elapsed.as_millis()
        ));
    }

    fn on_warning(&self, ctx: &StageContext, message: &str) {
        self.append_line(&format!(
            "{} warn stage={} path={} {}",
            unix_ts(),
            ctx.stage,
            ctx.path.display(),
            message
        ));
    }

    fn on_failure(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        self.append_line(&format!(
            "{} fail severity={:?} stage={} path={} err={}",
            unix_ts(),
            severity,
            ctx.stage,
            ctx.path.display(),
            error
        ));
    }

    fn on_alert(&self, ctx: &StageContext, severity: Severity, error: &ConvertError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} stage={} path={} err={}",
            unix_ts(),
            severity,
            ctx.stage,
            ctx.path.display(),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
