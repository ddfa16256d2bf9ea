//! Text → typed coercion.
//!
//! Coercion never fails: a value that is not a plain decimal number becomes [`Value::Null`] and
//! is handled by imputation afterwards.

use crate::execution::{ExecutionEngine, PartitionTask};
use crate::types::{DataType, Partition, PartitionedTable, RawTable, RawValue, Schema, TypedTable, Value};

/// Parse `raw` as a finite decimal number.
///
/// Accepts an optional sign, digits with an optional fractional part (`1`, `1.`, `.5`, `-3.25`)
/// and an optional exponent (`1e-3`). Surrounding whitespace is ignored. Anything else, including
/// `inf`, `nan`, thousands separators and decimal commas, yields `None`, as do literals that
/// overflow to infinity.
pub fn coerce_numeric(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if !is_decimal_literal(s) {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn is_decimal_literal(s: &str) -> bool {
    let b = s.as_bytes();
    let mut i = 0;
    let skip_sign = |i: &mut usize| {
        if matches!(b.get(*i), Some(b'+' | b'-')) {
            *i += 1;
        }
    };
    let skip_digits = |i: &mut usize| -> usize {
        let start = *i;
        while b.get(*i).is_some_and(u8::is_ascii_digit) {
            *i += 1;
        }
        *i - start
    };

    skip_sign(&mut i);
    let int_digits = skip_digits(&mut i);
    let mut frac_digits = 0;
    if b.get(i) == Some(&b'.') {
        i += 1;
        frac_digits = skip_digits(&mut i);
    }
    if int_digits + frac_digits == 0 {
        return false;
    }
    if matches!(b.get(i), Some(b'e' | b'E')) {
        i += 1;
        skip_sign(&mut i);
        if skip_digits(&mut i) == 0 {
            return false;
        }
    }
    i == b.len()
}

/// Convert one raw cell to the column's target type.
pub fn coerce_cell(data_type: DataType, cell: RawValue) -> Value {
    match (data_type, cell) {
        (_, RawValue::Missing) => Value::Null,
        (DataType::Utf8, RawValue::Text(s)) => Value::Utf8(s),
        (DataType::Float64, RawValue::Text(s)) => coerce_numeric(&s).map_or(Value::Null, Value::Float64),
    }
}

/// Partition task converting raw cells to typed cells.
pub struct CoerceTask {
    types: Vec<DataType>,
}

impl CoerceTask {
    pub fn new(schema: &Schema) -> Self {
        Self {
            types: schema.fields.iter().map(|f| f.data_type).collect(),
        }
    }
}

impl PartitionTask for CoerceTask {
    type Input = Partition<RawValue>;
    type Output = Partition<Value>;

    fn name(&self) -> &'static str {
        "coerce"
    }

    fn run(&self, input: Partition<RawValue>) -> Partition<Value> {
        let rows = input
            .rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(&self.types)
                    .map(|(cell, &dt)| coerce_cell(dt, cell))
                    .collect()
            })
            .collect();
        Partition::new(input.index, rows)
    }

    fn rows(&self, input: &Partition<RawValue>) -> usize {
        input.row_count()
    }
}

/// Coerce every partition of `table` to the schema's target types.
pub fn coerce(table: RawTable, engine: &ExecutionEngine) -> TypedTable {
    let PartitionedTable { schema, partitions } = table;
    let partitions = engine.run_tasks(&CoerceTask::new(&schema), partitions);
    PartitionedTable::new(schema, partitions)
}
