//! Column-type inspection of a raw table sample.

use serde::Serialize;

use crate::execution::{ExecutionEngine, PartitionTask};
use crate::processing::coerce::coerce_numeric;
use crate::types::{Partition, RawTable, RawValue, Schema};

/// Kinds of values observed in one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub column: String,
    /// Missing cells.
    pub missing: usize,
    /// Cells that coerce to a number.
    pub numeric: usize,
    /// Non-missing cells that do not coerce to a number.
    pub text: usize,
}

impl ColumnProfile {
    /// Whether the column holds both numbers and other text.
    pub fn is_mixed(&self) -> bool {
        self.numeric > 0 && self.text > 0
    }
}

/// Result of inspecting a sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InspectReport {
    /// Rows examined.
    pub rows_sampled: usize,
    /// One profile per schema column, in schema order.
    pub columns: Vec<ColumnProfile>,
}

impl InspectReport {
    /// Columns whose values are of more than one kind.
    pub fn mixed_columns(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.is_mixed())
    }

    /// Columns with at least one missing cell.
    pub fn columns_with_missing(&self) -> impl Iterator<Item = &ColumnProfile> {
        self.columns.iter().filter(|c| c.missing > 0)
    }
}

struct ProfileTask<'t> {
    schema: &'t Schema,
}

impl<'t> PartitionTask for ProfileTask<'t> {
    type Input = &'t Partition<RawValue>;
    type Output = Vec<ColumnProfile>;

    fn name(&self) -> &'static str {
        "inspect"
    }

    fn run(&self, input: &'t Partition<RawValue>) -> Vec<ColumnProfile> {
        let mut profiles = empty_profiles(self.schema);
        for row in &input.rows {
            for (cell, profile) in row.iter().zip(profiles.iter_mut()) {
                match cell {
                    RawValue::Missing => profile.missing += 1,
                    RawValue::Text(s) if coerce_numeric(s).is_some() => profile.numeric += 1,
                    RawValue::Text(_) => profile.text += 1,
                }
            }
        }
        profiles
    }

    fn rows(&self, input: &&'t Partition<RawValue>) -> usize {
        input.row_count()
    }
}

fn empty_profiles(schema: &Schema) -> Vec<ColumnProfile> {
    schema
        .fields
        .iter()
        .map(|f| ColumnProfile {
            column: f.name.clone(),
            ..ColumnProfile::default()
        })
        .collect()
}

/// Profile every column of `table`.
pub fn inspect_table(table: &RawTable, engine: &ExecutionEngine) -> InspectReport {
    let task = ProfileTask { schema: &table.schema };
    let inputs: Vec<&Partition<RawValue>> = table.partitions.iter().collect();
    let columns = engine.reduce(
        &task,
        inputs,
        || empty_profiles(&table.schema),
        |mut acc, part| {
            for (a, b) in acc.iter_mut().zip(part) {
                a.missing += b.missing;
                a.numeric += b.numeric;
                a.text += b.text;
            }
            acc
        },
    );
    InspectReport {
        rows_sampled: table.row_count(),
        columns,
    }
}
