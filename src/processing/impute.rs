//! Missing-value imputation for typed tables.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::execution::{ExecutionEngine, PartitionTask};
use crate::processing::coerce::coerce;
use crate::types::{Partition, PartitionedTable, RawTable, Schema, TypedTable, Value};

/// Number of cells filled per column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImputeStats {
    /// Column name → filled cell count. Only columns with at least one fill appear.
    pub filled: BTreeMap<String, usize>,
}

impl ImputeStats {
    /// Total filled cells.
    pub fn total(&self) -> usize {
        self.filled.values().sum()
    }

    fn merge(mut self, other: ImputeStats) -> ImputeStats {
        for (column, n) in other.filled {
            *self.filled.entry(column).or_default() += n;
        }
        self
    }
}

/// Partition task replacing [`Value::Null`] with each column's declared fill.
pub struct ImputeTask {
    names: Vec<String>,
    fills: Vec<Option<Value>>,
}

impl ImputeTask {
    pub fn new(schema: &Schema) -> Self {
        Self {
            names: schema.fields.iter().map(|f| f.name.clone()).collect(),
            fills: schema
                .fields
                .iter()
                .map(|f| f.fill.as_ref().map(|fill| fill.to_value()))
                .collect(),
        }
    }
}

impl PartitionTask for ImputeTask {
    type Input = Partition<Value>;
    type Output = (Partition<Value>, ImputeStats);

    fn name(&self) -> &'static str {
        "impute"
    }

    fn run(&self, mut input: Partition<Value>) -> Self::Output {
        let mut filled = vec![0usize; self.fills.len()];
        for row in &mut input.rows {
            for ((cell, fill), n) in row.iter_mut().zip(&self.fills).zip(filled.iter_mut()) {
                if let Some(fill) = fill {
                    if cell.is_null() {
                        *cell = fill.clone();
                        *n += 1;
                    }
                }
            }
        }

        let filled = self
            .names
            .iter()
            .zip(filled)
            .filter(|(_, n)| *n > 0)
            .map(|(name, n)| (name.clone(), n))
            .collect();
        (input, ImputeStats { filled })
    }

    fn rows(&self, input: &Partition<Value>) -> usize {
        input.row_count()
    }
}

/// Fill missing cells of every column that declares a fill. Columns without one keep their nulls.
pub fn impute(table: TypedTable, engine: &ExecutionEngine) -> (TypedTable, ImputeStats) {
    let PartitionedTable { schema, partitions } = table;
    let outputs = engine.run_tasks(&ImputeTask::new(&schema), partitions);

    let mut stats = ImputeStats::default();
    let mut partitions = Vec::with_capacity(outputs.len());
    for (partition, part_stats) in outputs {
        partitions.push(partition);
        stats = stats.merge(part_stats);
    }
    (PartitionedTable::new(schema, partitions), stats)
}

/// Coerce, then impute. The order is fixed: imputation must see coercion failures as nulls.
pub fn transform(table: RawTable, engine: &ExecutionEngine) -> (TypedTable, ImputeStats) {
    impute(coerce(table, engine), engine)
}
