//! End-to-end conversion: sniff → read → audit → transform → write → validate.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use occurrence_parquet::config::ConvertOptions;
//! use occurrence_parquet::observability::StdErrObserver;
//! use occurrence_parquet::pipeline::Pipeline;
//!
//! # fn main() -> Result<(), occurrence_parquet::ConvertError> {
//! let pipeline = Pipeline::new(ConvertOptions::default())?.with_observer(Arc::new(StdErrObserver));
//! let report = pipeline.run("occurrences.csv", "occurrences_parquet")?;
//! std::process::exit(report.status().exit_code());
//! # }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult};
use crate::execution::{ExecutionEngine, TracingExecutionObserver};
use crate::ingestion::{read_partitioned, sniff_delimiter};
use crate::observability::{severity_for_error, PipelineObserver, Severity, Stage, StageContext, StageStats};
use crate::output::{validate_output, write_partitions};
use crate::processing::{audit, inspect_table, transform, InspectReport};
use crate::report::ConversionReport;
use crate::types::Schema;

/// A configured conversion run.
///
/// Fatal errors stop the run at the failing stage; nothing after it executes. Sniff and read
/// failures happen before the output directory is touched.
pub struct Pipeline {
    options: ConvertOptions,
    schema: Schema,
    engine: ExecutionEngine,
    observer: Option<Arc<dyn PipelineObserver>>,
    alert_at_or_above: Severity,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("schema", &self.schema)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Pipeline {
    /// Validate `options` and build the worker pool. Uses [`Schema::occurrence`].
    pub fn new(options: ConvertOptions) -> ConvertResult<Self> {
        options.validate()?;
        let engine = ExecutionEngine::new(options.execution.clone())?
            .with_observer(Arc::new(TracingExecutionObserver));
        Ok(Self {
            options,
            schema: Schema::occurrence(),
            engine,
            observer: None,
            alert_at_or_above: Severity::Critical,
        })
    }

    /// Replace the target schema.
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Report stage outcomes to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Severity at which fatal errors are also sent to [`PipelineObserver::on_alert`].
    /// Defaults to [`Severity::Critical`].
    pub fn with_alert_threshold(mut self, severity: Severity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Engine running the partition tasks; exposes live metrics.
    pub fn engine(&self) -> &ExecutionEngine {
        &self.engine
    }

    /// Convert `input` into `part.N.parquet` files under `out_dir`.
    ///
    /// Returns `Ok` even when some partitions failed to write; check
    /// [`ConversionReport::status`]. Validation problems never change the status.
    pub fn run(&self, input: impl AsRef<Path>, out_dir: impl AsRef<Path>) -> ConvertResult<ConversionReport> {
        let input = input.as_ref();
        let out_dir = out_dir.as_ref();
        let span = tracing::info_span!("convert", source = %input.display(), output = %out_dir.display());
        let _enter = span.enter();

        let delimiter = self.stage(input, Stage::Sniff, || self.resolve_delimiter(input), |_| 0)?;

        let read = self.stage(
            input,
            Stage::Read,
            || read_partitioned(input, delimiter, &self.schema, &self.options, None),
            |o| o.stats.rows_read,
        )?;
        if read.stats.skipped_records > 0 {
            self.warn(
                input,
                Stage::Read,
                &format!(
                    "{} malformed records skipped (first lines: {:?})",
                    read.stats.skipped_records, read.stats.skipped_lines_preview
                ),
            );
        }

        let audit_report = self.stage(
            input,
            Stage::Audit,
            || Ok(audit(&read.table, &self.engine, self.options.invalid_preview)),
            |r| r.total_rows,
        )?;
        for w in &audit_report.invalid {
            self.warn(
                input,
                Stage::Audit,
                &format!(
                    "column {}: {} values could not be converted to numbers, e.g. {:?}",
                    w.column, w.invalid_cells, w.preview
                ),
            );
        }
        for index in &audit_report.empty_partitions {
            self.warn(input, Stage::Audit, &format!("partition {index} is empty"));
        }

        let (typed, impute_stats) = self.stage(
            input,
            Stage::Transform,
            || Ok(transform(read.table, &self.engine)),
            |(t, _)| t.row_count(),
        )?;

        let write = self.stage(
            input,
            Stage::Write,
            || write_partitions(&typed, out_dir, &self.options, &self.engine),
            |w| w.rows_written(),
        )?;
        drop(typed);
        for f in &write.failures {
            self.warn(
                input,
                Stage::Write,
                &format!("partition {} not written to {}: {}", f.partition, f.path.display(), f.message),
            );
        }

        let validation = self.stage(
            input,
            Stage::Validate,
            || Ok(validate_output(out_dir, &self.schema, &self.engine)),
            |v| v.total_rows() as usize,
        )?;
        if let Some(e) = &validation.listing_error {
            self.warn(input, Stage::Validate, e);
        }
        for f in validation.invalid_files() {
            self.warn(input, Stage::Validate, &format!("{} failed validation", f.path.display()));
        }

        let report = ConversionReport {
            source: input.to_path_buf(),
            output: out_dir.to_path_buf(),
            delimiter: char::from(delimiter),
            read: read.stats,
            audit: audit_report,
            impute: impute_stats,
            write,
            validation,
        };
        tracing::info!(status = ?report.status(), rows = report.write.rows_written(), "conversion finished");
        Ok(report)
    }

    /// Profile the value kinds of the first `inspect_rows` rows of `input`. Writes nothing.
    pub fn inspect(&self, input: impl AsRef<Path>) -> ConvertResult<InspectReport> {
        let input = input.as_ref();
        let span = tracing::info_span!("inspect", source = %input.display());
        let _enter = span.enter();

        let delimiter = self.stage(input, Stage::Sniff, || self.resolve_delimiter(input), |_| 0)?;
        let read = self.stage(
            input,
            Stage::Read,
            || {
                read_partitioned(
                    input,
                    delimiter,
                    &self.schema,
                    &self.options,
                    Some(self.options.inspect_rows),
                )
            },
            |o| o.stats.rows_read,
        )?;
        self.stage(
            input,
            Stage::Inspect,
            || Ok(inspect_table(&read.table, &self.engine)),
            |r| r.rows_sampled,
        )
    }

    fn resolve_delimiter(&self, input: &Path) -> ConvertResult<u8> {
        match self.options.delimiter {
            Some(d) => u8::try_from(d).map_err(|_| ConvertError::Config {
                message: format!("delimiter {d:?} is not a single byte"),
            }),
            None => sniff_delimiter(input, self.options.sample_lines),
        }
    }

    fn stage<T>(
        &self,
        input: &Path,
        stage: Stage,
        f: impl FnOnce() -> ConvertResult<T>,
        rows: impl FnOnce(&T) -> usize,
    ) -> ConvertResult<T> {
        let start = Instant::now();
        let result = f();
        let ctx = StageContext {
            path: input.to_path_buf(),
            stage,
        };
        match &result {
            Ok(value) => {
                let stats = StageStats {
                    rows: rows(value),
                    elapsed: start.elapsed(),
                };
                tracing::debug!(%stage, rows = stats.rows, elapsed = ?stats.elapsed, "stage ok");
                if let Some(obs) = self.observer.as_ref() {
                    obs.on_stage_finished(&ctx, stats);
                }
            }
            Err(e) => {
                let severity = severity_for_error(e);
                tracing::error!(%stage, ?severity, error = %e, "stage failed");
                if let Some(obs) = self.observer.as_ref() {
                    obs.on_failure(&ctx, severity, e);
                    if severity >= self.alert_at_or_above {
                        obs.on_alert(&ctx, severity, e);
                    }
                }
            }
        }
        result
    }

    fn warn(&self, input: &Path, stage: Stage, message: &str) {
        tracing::warn!(%stage, "{message}");
        if let Some(obs) = self.observer.as_ref() {
            let ctx = StageContext {
                path: input.to_path_buf(),
                stage,
            };
            obs.on_warning(&ctx, message);
        }
    }
}
