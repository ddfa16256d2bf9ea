//! Read-only data-quality audit of a raw table.
//!
//! The audit runs one [`AuditTask`] per partition and merges the partial results. Every merge
//! step is a union of sorted sets or a sum of counters, so the final [`AuditReport`] does not
//! depend on the order in which partitions finish.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::execution::{ExecutionEngine, PartitionTask};
use crate::processing::coerce::coerce_numeric;
use crate::types::{Partition, RawTable, RawValue, Schema};

/// Values of a numeric column that failed coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CoercionWarning {
    /// Column name.
    pub column: String,
    /// Number of cells that failed coercion.
    pub invalid_cells: usize,
    /// Smallest distinct offending values (lexicographic), at most the configured preview size.
    pub preview: Vec<String>,
}

/// Missing cells in one column before imputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingCount {
    pub column: String,
    pub count: usize,
}

/// Row count of one partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionRows {
    pub partition: usize,
    pub rows: usize,
}

/// Result of [`audit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    /// Rows across all partitions.
    pub total_rows: usize,
    /// Per-partition row counts in partition order.
    pub partition_rows: Vec<PartitionRows>,
    /// Partitions that hold no rows.
    pub empty_partitions: Vec<usize>,
    /// Columns with at least one missing cell, in schema order.
    ///
    /// For numeric columns this includes cells that fail coercion, since those become missing.
    pub missing: Vec<MissingCount>,
    /// Numeric columns with at least one coercion failure, in schema order.
    pub invalid: Vec<CoercionWarning>,
}

impl AuditReport {
    /// Missing count for `column`, zero if unreported.
    pub fn missing_for(&self, column: &str) -> usize {
        self.missing
            .iter()
            .find(|m| m.column == column)
            .map_or(0, |m| m.count)
    }

    /// Coercion warning for `column`, if any value failed.
    pub fn invalid_for(&self, column: &str) -> Option<&CoercionWarning> {
        self.invalid.iter().find(|w| w.column == column)
    }
}

/// Partial audit of one or more partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialAudit {
    partition_rows: BTreeMap<usize, usize>,
    missing: Vec<usize>,
    invalid_cells: Vec<usize>,
    invalid_values: Vec<BTreeSet<String>>,
    preview_limit: usize,
}

impl PartialAudit {
    fn empty(columns: usize, preview_limit: usize) -> Self {
        Self {
            partition_rows: BTreeMap::new(),
            missing: vec![0; columns],
            invalid_cells: vec![0; columns],
            invalid_values: vec![BTreeSet::new(); columns],
            preview_limit,
        }
    }

    /// Combine two partial audits. Commutative and associative.
    pub fn merge(mut self, other: PartialAudit) -> PartialAudit {
        self.partition_rows.extend(other.partition_rows);
        for (a, b) in self.missing.iter_mut().zip(other.missing) {
            *a += b;
        }
        for (a, b) in self.invalid_cells.iter_mut().zip(other.invalid_cells) {
            *a += b;
        }
        for (a, b) in self.invalid_values.iter_mut().zip(other.invalid_values) {
            a.extend(b);
            truncate_set(a, self.preview_limit);
        }
        self
    }

    fn finish(self, schema: &Schema) -> AuditReport {
        let partition_rows: Vec<PartitionRows> = self
            .partition_rows
            .iter()
            .map(|(&partition, &rows)| PartitionRows { partition, rows })
            .collect();
        let empty_partitions = partition_rows
            .iter()
            .filter(|p| p.rows == 0)
            .map(|p| p.partition)
            .collect();

        let mut missing = Vec::new();
        let mut invalid = Vec::new();
        for (idx, field) in schema.fields.iter().enumerate() {
            let count = self.missing[idx] + self.invalid_cells[idx];
            if count > 0 {
                missing.push(MissingCount {
                    column: field.name.clone(),
                    count,
                });
            }
            if self.invalid_cells[idx] > 0 {
                invalid.push(CoercionWarning {
                    column: field.name.clone(),
                    invalid_cells: self.invalid_cells[idx],
                    preview: self.invalid_values[idx].iter().cloned().collect(),
                });
            }
        }

        AuditReport {
            total_rows: partition_rows.iter().map(|p| p.rows).sum(),
            partition_rows,
            empty_partitions,
            missing,
            invalid,
        }
    }
}

fn truncate_set(set: &mut BTreeSet<String>, limit: usize) {
    while set.len() > limit {
        set.pop_last();
    }
}

/// Partition task computing a [`PartialAudit`].
pub struct AuditTask<'t> {
    schema: &'t Schema,
    preview_limit: usize,
}

impl<'t> AuditTask<'t> {
    pub fn new(schema: &'t Schema, preview_limit: usize) -> Self {
        Self { schema, preview_limit }
    }

    fn empty(&self) -> PartialAudit {
        PartialAudit::empty(self.schema.len(), self.preview_limit)
    }
}

impl<'t> PartitionTask for AuditTask<'t> {
    type Input = &'t Partition<RawValue>;
    type Output = PartialAudit;

    fn name(&self) -> &'static str {
        "audit"
    }

    fn run(&self, input: &'t Partition<RawValue>) -> PartialAudit {
        let mut out = self.empty();
        out.partition_rows.insert(input.index, input.row_count());
        let numeric: Vec<bool> = self.schema.fields.iter().map(|f| f.is_numeric()).collect();

        for row in &input.rows {
            for (idx, cell) in row.iter().enumerate() {
                match cell {
                    RawValue::Missing => out.missing[idx] += 1,
                    RawValue::Text(s) if numeric[idx] && coerce_numeric(s).is_none() => {
                        out.invalid_cells[idx] += 1;
                        let values = &mut out.invalid_values[idx];
                        if values.len() < self.preview_limit || values.last().is_some_and(|max| s < max) {
                            values.insert(s.clone());
                            truncate_set(values, self.preview_limit);
                        }
                    }
                    RawValue::Text(_) => {}
                }
            }
        }
        out
    }

    fn rows(&self, input: &&'t Partition<RawValue>) -> usize {
        input.row_count()
    }
}

/// Audit `table` without modifying it.
///
/// `preview_limit` bounds how many distinct invalid values are listed per numeric column.
pub fn audit(table: &RawTable, engine: &ExecutionEngine, preview_limit: usize) -> AuditReport {
    let task = AuditTask::new(&table.schema, preview_limit);
    let inputs: Vec<&Partition<RawValue>> = table.partitions.iter().collect();
    engine
        .reduce(&task, inputs, || task.empty(), PartialAudit::merge)
        .finish(&table.schema)
}
