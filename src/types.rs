//! Core data model: the fixed occurrence schema and the partitioned tables that flow between
//! pipeline stages.
//!
//! Cells are tagged per stage. Before coercion a cell is a [`RawValue`] (text or missing);
//! after coercion it is a [`Value`] (float, text or null). A [`PartitionedTable`] is generic over
//! the cell type, so a table that has not been coerced cannot be handed to the writer.

use serde::Serialize;

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DataType {
    /// 64-bit floating point number.
    Float64,
    /// UTF-8 string.
    Utf8,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Float64 => f.write_str("Float64"),
            DataType::Utf8 => f.write_str("Utf8"),
        }
    }
}

/// Replacement used for missing cells during imputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FillValue {
    /// Fill for text columns.
    Text(String),
    /// Fill for numeric columns.
    Float(f64),
}

impl FillValue {
    /// The cell value this fill produces.
    pub fn to_value(&self) -> Value {
        match self {
            FillValue::Text(s) => Value::Utf8(s.clone()),
            FillValue::Float(v) => Value::Float64(*v),
        }
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Target data type after coercion.
    pub data_type: DataType,
    /// Value used to replace missing cells, if the column declares one.
    pub fill: Option<FillValue>,
}

impl Field {
    /// Create a new field without a fill policy.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            fill: None,
        }
    }

    /// Attach a missing-value fill to this field.
    pub fn with_fill(mut self, fill: FillValue) -> Self {
        self.fill = Some(fill);
        self
    }

    /// Whether the column is converted to a number.
    pub fn is_numeric(&self) -> bool {
        self.data_type == DataType::Float64
    }
}

/// Sentinel written in place of missing coordinates and elevations.
pub const NUMERIC_SENTINEL: f64 = -9999.0;

/// Fill written in place of missing text in filled text columns.
pub const TEXT_PLACEHOLDER: &str = "Unknown";

/// An ordered list of fields describing the output table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// The fixed occurrence-record schema.
    pub fn occurrence() -> Self {
        let text_fill = || FillValue::Text(TEXT_PLACEHOLDER.to_string());
        let sentinel = || FillValue::Float(NUMERIC_SENTINEL);
        Self::new(vec![
            Field::new("gbifID", DataType::Utf8),
            Field::new("species", DataType::Utf8).with_fill(text_fill()),
            Field::new("decimalLongitude", DataType::Float64).with_fill(sentinel()),
            Field::new("decimalLatitude", DataType::Float64).with_fill(sentinel()),
            Field::new("countryCode", DataType::Utf8).with_fill(text_fill()),
            Field::new("elevation", DataType::Float64).with_fill(sentinel()),
            Field::new("datasetKey", DataType::Utf8),
            Field::new("eventDate", DataType::Utf8).with_fill(text_fill()),
        ])
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Indexes of the fields that are coerced to numbers.
    pub fn numeric_indexes(&self) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_numeric())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the schema has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A cell as read from the source, before any typing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawValue {
    /// Empty cell or a recognised null token.
    Missing,
    /// Trimmed source text.
    Text(String),
}

impl RawValue {
    /// Whether this cell is missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, RawValue::Missing)
    }

    /// Source text, if present.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RawValue::Missing => None,
            RawValue::Text(s) => Some(s.as_str()),
        }
    }
}

/// A typed cell after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// 64-bit float.
    Float64(f64),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Whether this cell is missing.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Variant name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Float64(_) => "Float64",
            Value::Utf8(_) => "Utf8",
        }
    }
}

/// A contiguous, independently processable run of rows.
///
/// Rows are stored as `Vec<Vec<V>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition<V> {
    /// Position of the partition in the table; also names its output file.
    pub index: usize,
    /// Row-major cell storage.
    pub rows: Vec<Vec<V>>,
}

impl<V> Partition<V> {
    /// Create a partition.
    pub fn new(index: usize, rows: Vec<Vec<V>>) -> Self {
        Self { index, rows }
    }

    /// Number of rows in the partition.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Iterate the values of one column.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &V> {
        self.rows.iter().filter_map(move |row| row.get(idx))
    }
}

/// A table split into partitions that share one schema.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionedTable<V> {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Partitions in index order.
    pub partitions: Vec<Partition<V>>,
}

/// Table produced by the reader: every cell is text or missing.
pub type RawTable = PartitionedTable<RawValue>;

/// Table produced by coercion and imputation.
pub type TypedTable = PartitionedTable<Value>;

impl<V> PartitionedTable<V> {
    /// Create a table from schema and partitions.
    pub fn new(schema: Schema, partitions: Vec<Partition<V>>) -> Self {
        Self { schema, partitions }
    }

    /// Total number of rows across partitions.
    pub fn row_count(&self) -> usize {
        self.partitions.iter().map(Partition::row_count).sum()
    }

    /// Number of partitions.
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// Iterate all rows in partition order.
    pub fn rows(&self) -> impl Iterator<Item = &Vec<V>> {
        self.partitions.iter().flat_map(|p| p.rows.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn occurrence_schema_order_and_types() {
        let schema = Schema::occurrence();
        let names: Vec<&str> = schema.field_names().collect();
        assert_eq!(
            names,
            vec![
                "gbifID",
                "species",
                "decimalLongitude",
                "decimalLatitude",
                "countryCode",
                "elevation",
                "datasetKey",
                "eventDate",
            ]
        );
        assert_eq!(schema.numeric_indexes(), vec![2, 3, 5]);
        assert_eq!(schema.index_of("elevation"), Some(5));
        assert_eq!(schema.index_of("missing"), None);
    }

    #[test]
    fn occurrence_schema_fill_policies() {
        let schema = Schema::occurrence();
        let fill = |name: &str| schema.fields[schema.index_of(name).unwrap()].fill.clone();
        assert_eq!(fill("gbifID"), None);
        assert_eq!(fill("datasetKey"), None);
        assert_eq!(fill("species"), Some(FillValue::Text("Unknown".to_string())));
        assert_eq!(fill("eventDate"), Some(FillValue::Text("Unknown".to_string())));
        assert_eq!(fill("elevation"), Some(FillValue::Float(-9999.0)));
    }

    #[test]
    fn table_row_count_spans_partitions() {
        let schema = Schema::new(vec![Field::new("a", DataType::Utf8)]);
        let table: RawTable = PartitionedTable::new(
            schema,
            vec![
                Partition::new(0, vec![vec![RawValue::Missing], vec![RawValue::Missing]]),
                Partition::new(1, vec![vec![RawValue::Text("x".to_string())]]),
            ],
        );
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.partition_count(), 2);
        assert_eq!(table.rows().count(), 3);
    }
}
