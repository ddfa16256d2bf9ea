//! Run diagnostics and their renderings.
//!
//! Stages return structured values; this module is the only place that turns them into text or
//! JSON.

use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::RunStatus;
use crate::ingestion::ReadStats;
use crate::output::{FileStatus, ValidationReport, WriteReport};
use crate::processing::{AuditReport, ImputeStats, InspectReport};

/// Everything a completed conversion run learned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionReport {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Delimiter used to read the source (sniffed or overridden).
    pub delimiter: char,
    pub read: ReadStats,
    pub audit: AuditReport,
    pub impute: ImputeStats,
    pub write: WriteReport,
    pub validation: ValidationReport,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    status: RunStatus,
    #[serde(flatten)]
    report: &'a ConversionReport,
}

impl ConversionReport {
    /// Terminal status: [`RunStatus::WriteError`] when any partition failed to write.
    pub fn status(&self) -> RunStatus {
        if self.write.is_complete() {
            RunStatus::Ok
        } else {
            RunStatus::WriteError
        }
    }

    /// Pretty-printed JSON including the run status.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&JsonReport {
            status: self.status(),
            report: self,
        })
    }
}

/// Human-readable summary of a conversion run.
pub fn render_text(report: &ConversionReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "source: {}", report.source.display());
    let _ = writeln!(out, "delimiter: {:?}", report.delimiter);
    let _ = writeln!(
        out,
        "rows read: {} (skipped malformed records: {})",
        report.read.rows_read, report.read.skipped_records
    );
    if !report.read.skipped_lines_preview.is_empty() {
        let _ = writeln!(out, "  skipped lines: {:?}", report.read.skipped_lines_preview);
    }
    if !report.read.dropped_columns.is_empty() {
        let _ = writeln!(out, "  ignored columns: {}", report.read.dropped_columns.join(", "));
    }

    let _ = writeln!(out, "partitions: {}", report.audit.partition_rows.len());
    for p in &report.audit.partition_rows {
        let _ = writeln!(out, "  partition {}: {} rows", p.partition, p.rows);
    }
    if !report.audit.empty_partitions.is_empty() {
        let _ = writeln!(out, "  empty partitions: {:?}", report.audit.empty_partitions);
    }

    if report.audit.invalid.is_empty() {
        let _ = writeln!(out, "invalid numeric values: none");
    } else {
        let _ = writeln!(out, "invalid numeric values:");
        for w in &report.audit.invalid {
            let _ = writeln!(
                out,
                "  {}: {} cells, e.g. {}",
                w.column,
                w.invalid_cells,
                w.preview.join(", ")
            );
        }
    }

    if report.audit.missing.is_empty() {
        let _ = writeln!(out, "missing values: none");
    } else {
        let _ = writeln!(out, "missing values:");
        for m in &report.audit.missing {
            let _ = writeln!(out, "  {}: {}", m.column, m.count);
        }
    }
    let _ = writeln!(out, "imputed cells: {}", report.impute.total());

    let _ = writeln!(
        out,
        "written: {} files, {} rows -> {}",
        report.write.files.len(),
        report.write.rows_written(),
        report.output.display()
    );
    for f in &report.write.failures {
        let _ = writeln!(
            out,
            "  FAILED partition {} ({}): {}",
            f.partition,
            f.path.display(),
            f.message
        );
    }

    if let Some(e) = &report.validation.listing_error {
        let _ = writeln!(out, "validation skipped: {e}");
    }
    let valid = report.validation.files.iter().filter(|f| f.is_valid()).count();
    let _ = writeln!(
        out,
        "validated: {}/{} files, {} rows",
        valid,
        report.validation.files.len(),
        report.validation.total_rows()
    );
    for f in &report.validation.files {
        match &f.status {
            FileStatus::Valid { rows, columns } => {
                let schema: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{}:{}", c.name, c.physical_type))
                    .collect();
                let _ = writeln!(out, "  {}: {} rows [{}]", f.path.display(), rows, schema.join(", "));
            }
            FileStatus::Invalid { error } => {
                let _ = writeln!(out, "  {}: INVALID {}", f.path.display(), error);
            }
        }
    }
    let _ = writeln!(out, "status: {:?}", report.status());
    out
}

/// Human-readable summary of an inspection.
pub fn render_inspect(report: &InspectReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "rows sampled: {}", report.rows_sampled);
    for c in &report.columns {
        let flag = if c.is_mixed() { " MIXED" } else { "" };
        let _ = writeln!(
            out,
            "  {}: numeric={} text={} missing={}{}",
            c.column, c.numeric, c.text, c.missing, flag
        );
    }
    let mixed: Vec<&str> = report.mixed_columns().map(|c| c.column.as_str()).collect();
    if mixed.is_empty() {
        let _ = writeln!(out, "mixed columns: none");
    } else {
        let _ = writeln!(out, "mixed columns: {}", mixed.join(", "));
    }
    out
}
