//! Parquet emission, one file per partition.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::schema::parser::parse_message_type;
use parquet::schema::types::Type;
use serde::Serialize;

use crate::config::ConvertOptions;
use crate::error::{ConvertError, ConvertResult, WriteFailure};
use crate::execution::{ExecutionEngine, PartitionTask};
use crate::types::{DataType, Field, Partition, Schema, TypedTable, Value};

use super::partition_file_name;

/// A partition file that was written completely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrittenFile {
    pub partition: usize,
    pub path: PathBuf,
    pub rows: usize,
}

/// A partition that could not be written. Its partial file, if any, has been removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionWriteFailure {
    pub partition: usize,
    pub path: PathBuf,
    pub message: String,
}

/// Outcome of [`write_partitions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    pub directory: PathBuf,
    /// Files written, in partition order.
    pub files: Vec<WrittenFile>,
    /// Partitions that failed, in partition order.
    pub failures: Vec<PartitionWriteFailure>,
}

impl WriteReport {
    /// Whether every partition was written.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Rows across written files.
    pub fn rows_written(&self) -> usize {
        self.files.iter().map(|f| f.rows).sum()
    }
}

/// Parquet message type for `schema`: every column optional, text as UTF8 byte arrays and
/// numbers as doubles, in schema order.
pub fn parquet_message_type(schema: &Schema) -> String {
    let mut message = String::from("message occurrence {\n");
    for field in &schema.fields {
        let line = match field.data_type {
            DataType::Utf8 => format!("  OPTIONAL BINARY {} (UTF8);\n", field.name),
            DataType::Float64 => format!("  OPTIONAL DOUBLE {};\n", field.name),
        };
        message.push_str(&line);
    }
    message.push('}');
    message
}

struct WriteTask<'a> {
    directory: &'a Path,
    schema: &'a Schema,
    message_type: Arc<Type>,
    props: Arc<WriterProperties>,
    row_group_rows: usize,
}

impl WriteTask<'_> {
    fn write_partition(&self, path: &Path, partition: &Partition<Value>) -> Result<(), WriteFailure> {
        let file = File::create(path)?;
        let mut writer =
            SerializedFileWriter::new(file, Arc::clone(&self.message_type), Arc::clone(&self.props))?;

        for (n, chunk) in partition.rows.chunks(self.row_group_rows).enumerate() {
            let first_row = n * self.row_group_rows;
            let mut rg = writer.next_row_group()?;
            let mut col_idx: usize = 0;
            while let Some(mut col) = rg.next_column()? {
                let field = self.schema.fields.get(col_idx).ok_or_else(|| {
                    ParquetError::General(format!("no schema field for parquet column {col_idx}"))
                })?;
                write_column(&mut col, chunk, col_idx, field, first_row)?;
                col.close()?;
                col_idx += 1;
            }
            rg.close()?;
        }
        writer.close()?;
        Ok(())
    }
}

impl<'a> PartitionTask for WriteTask<'a> {
    type Input = &'a Partition<Value>;
    type Output = Result<WrittenFile, PartitionWriteFailure>;

    fn name(&self) -> &'static str {
        "write"
    }

    fn run(&self, partition: &'a Partition<Value>) -> Self::Output {
        let path = self.directory.join(partition_file_name(partition.index));
        match self.write_partition(&path, partition) {
            Ok(()) => Ok(WrittenFile {
                partition: partition.index,
                path,
                rows: partition.row_count(),
            }),
            Err(e) => {
                tracing::warn!(partition = partition.index, path = %path.display(), error = %e, "partition write failed");
                let _ = std::fs::remove_file(&path);
                Err(PartitionWriteFailure {
                    partition: partition.index,
                    path,
                    message: e.to_string(),
                })
            }
        }
    }

    fn rows(&self, input: &&'a Partition<Value>) -> usize {
        input.row_count()
    }
}

fn write_column(
    col: &mut SerializedColumnWriter<'_>,
    rows: &[Vec<Value>],
    idx: usize,
    field: &Field,
    first_row: usize,
) -> Result<(), WriteFailure> {
    let mismatch = |offset: usize, found: Option<&Value>| WriteFailure::ValueMismatch {
        column: field.name.clone(),
        row: first_row + offset,
        expected: field.data_type,
        found: found.map_or("no cell", Value::kind),
    };
    let mut def_levels: Vec<i16> = Vec::with_capacity(rows.len());
    match col.untyped() {
        ColumnWriter::ByteArrayColumnWriter(w) => {
            let mut values = Vec::with_capacity(rows.len());
            for (offset, row) in rows.iter().enumerate() {
                match row.get(idx) {
                    Some(Value::Utf8(s)) => {
                        values.push(ByteArray::from(s.as_str()));
                        def_levels.push(1);
                    }
                    Some(Value::Null) => def_levels.push(0),
                    other => return Err(mismatch(offset, other)),
                }
            }
            w.write_batch(&values, Some(&def_levels), None)?;
        }
        ColumnWriter::DoubleColumnWriter(w) => {
            let mut values = Vec::with_capacity(rows.len());
            for (offset, row) in rows.iter().enumerate() {
                match row.get(idx) {
                    Some(Value::Float64(v)) => {
                        values.push(*v);
                        def_levels.push(1);
                    }
                    Some(Value::Null) => def_levels.push(0),
                    other => return Err(mismatch(offset, other)),
                }
            }
            w.write_batch(&values, Some(&def_levels), None)?;
        }
        _ => {
            return Err(WriteFailure::Parquet(ParquetError::General(format!(
                "unexpected parquet column writer for column {}",
                field.name
            ))));
        }
    }
    Ok(())
}

/// Write each partition of `table` to `<directory>/part.<index>.parquet`.
///
/// The directory is created if missing; existing files are left in place. Failing to create the
/// directory is fatal. A partition that fails to serialize, or holds a cell whose type does not
/// match its column, is recorded in [`WriteReport::failures`] and does not affect other
/// partitions.
pub fn write_partitions(
    table: &TypedTable,
    directory: impl AsRef<Path>,
    options: &ConvertOptions,
    engine: &ExecutionEngine,
) -> ConvertResult<WriteReport> {
    let directory = directory.as_ref();
    let fail = |reason: WriteFailure| ConvertError::Write {
        path: directory.to_path_buf(),
        reason,
    };

    std::fs::create_dir_all(directory).map_err(|e| fail(e.into()))?;

    let message_type = parse_message_type(&parquet_message_type(&table.schema)).map_err(|e| fail(e.into()))?;
    let props = WriterProperties::builder()
        .set_compression(options.compression.to_parquet())
        .set_max_row_group_size(options.row_group_rows.max(1))
        .set_created_by(format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
        .build();

    let task = WriteTask {
        directory,
        schema: &table.schema,
        message_type: Arc::new(message_type),
        props: Arc::new(props),
        row_group_rows: options.row_group_rows.max(1),
    };
    let inputs: Vec<&Partition<Value>> = table.partitions.iter().collect();

    let mut report = WriteReport {
        directory: directory.to_path_buf(),
        ..WriteReport::default()
    };
    for outcome in engine.run_tasks(&task, inputs) {
        match outcome {
            Ok(file) => report.files.push(file),
            Err(failure) => report.failures.push(failure),
        }
    }
    Ok(report)
}
