//! Schema-constrained CSV reading into a partitioned text table.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult, IngestFailure};
use crate::types::{Partition, PartitionedTable, RawTable, RawValue, Schema};

/// Maximum number of skipped line numbers kept for the report.
pub const SKIPPED_LINE_PREVIEW: usize = 10;

/// Counters gathered while reading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadStats {
    /// Data records kept in the table.
    pub rows_read: usize,
    /// Records skipped because they did not match the header's shape or were not UTF-8.
    pub skipped_records: usize,
    /// 1-based line numbers of the first skipped records.
    pub skipped_lines_preview: Vec<u64>,
    /// Header columns that are not part of the schema and were dropped.
    pub dropped_columns: Vec<String>,
}

/// Table plus read statistics.
#[derive(Debug, Clone)]
pub struct ReadOutcome {
    pub table: RawTable,
    pub stats: ReadStats,
}

/// Read the delimited file at `path` into a [`RawTable`].
///
/// Rules:
///
/// - The file must have a header containing all schema fields (order can differ).
/// - Only schema columns are kept, in schema order.
/// - Every cell stays text; empty cells and `options.null_tokens` become [`RawValue::Missing`].
/// - Records with the wrong field count (or invalid UTF-8) are skipped and counted.
/// - `max_rows` stops reading after that many kept records.
pub fn read_partitioned(
    path: impl AsRef<Path>,
    delimiter: u8,
    schema: &Schema,
    options: &ConvertOptions,
    max_rows: Option<usize>,
) -> ConvertResult<ReadOutcome> {
    let path = path.as_ref();
    let fail = |reason: IngestFailure| ConvertError::Ingest {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| fail(e.into()))?;
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(false)
        .from_reader(file);
    read_partitioned_from_reader(&mut rdr, delimiter, schema, options, max_rows).map_err(fail)
}

/// Read CSV data from an existing reader configured with headers and `delimiter`.
pub fn read_partitioned_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    delimiter: u8,
    schema: &Schema,
    options: &ConvertOptions,
    max_rows: Option<usize>,
) -> Result<ReadOutcome, IngestFailure> {
    let headers = rdr.headers()?.clone();
    let header_names: Vec<String> = headers.iter().map(str::to_owned).collect();

    if header_names.len() <= 1 && schema.len() > 1 {
        return Err(IngestFailure::NoUsableColumns {
            delimiter: char::from(delimiter),
            columns: header_names.len(),
        });
    }

    // Map schema fields -> CSV column indexes (allows re-ordered CSV columns).
    let mut col_idxs = Vec::with_capacity(schema.len());
    let mut missing = Vec::new();
    for field in &schema.fields {
        match header_names.iter().position(|h| h.trim() == field.name) {
            Some(idx) => col_idxs.push(idx),
            None => missing.push(field.name.clone()),
        }
    }
    if !missing.is_empty() {
        return Err(IngestFailure::SchemaMismatch {
            missing,
            headers: header_names,
        });
    }

    let dropped_columns = header_names
        .iter()
        .enumerate()
        .filter(|(i, _)| !col_idxs.contains(i))
        .map(|(_, h)| h.clone())
        .collect();

    let partition_rows = options.partition_rows.max(1);
    let limit = max_rows.unwrap_or(usize::MAX);
    let mut stats = ReadStats {
        dropped_columns,
        ..ReadStats::default()
    };
    let mut partitions = Vec::new();
    let mut current: Vec<Vec<RawValue>> = Vec::with_capacity(partition_rows.min(65_536));
    let mut record = csv::StringRecord::new();

    while stats.rows_read < limit {
        match rdr.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => {
                let row = col_idxs
                    .iter()
                    .map(|&idx| to_raw_value(record.get(idx).unwrap_or(""), options))
                    .collect();
                current.push(row);
                stats.rows_read += 1;
                if current.len() == partition_rows {
                    let index = partitions.len();
                    partitions.push(Partition::new(index, std::mem::take(&mut current)));
                }
            }
            Err(e) if e.is_io_error() => return Err(IngestFailure::Csv(e)),
            Err(e) => {
                let line = e.position().map(|p| p.line());
                tracing::debug!(?line, error = %e, "skipping malformed record");
                stats.skipped_records += 1;
                if let Some(line) = line {
                    if stats.skipped_lines_preview.len() < SKIPPED_LINE_PREVIEW {
                        stats.skipped_lines_preview.push(line);
                    }
                }
            }
        }
    }
    if !current.is_empty() {
        let index = partitions.len();
        partitions.push(Partition::new(index, current));
    }

    if stats.rows_read == 0 {
        return Err(IngestFailure::NoUsableRows {
            skipped: stats.skipped_records,
        });
    }

    Ok(ReadOutcome {
        table: PartitionedTable::new(schema.clone(), partitions),
        stats,
    })
}

fn to_raw_value(raw: &str, options: &ConvertOptions) -> RawValue {
    let trimmed = raw.trim();
    if options.is_null_token(trimmed) {
        RawValue::Missing
    } else {
        RawValue::Text(trimmed.to_owned())
    }
}
