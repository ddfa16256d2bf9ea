//! Partition-local transformations over the tables produced by ingestion.
//!
//! Currently implemented:
//!
//! - [`audit()`]: read-only quality audit (missing counts, invalid numeric values, partition sizes)
//! - [`coerce()`]: text → typed cells, unparsable numbers become nulls
//! - [`impute()`]: fill nulls with each column's declared default
//! - [`transform()`]: coerce, then impute
//! - [`inspect_table()`]: per-column value-kind profile
//!
//! ## Example: audit → transform
//!
//! ```rust
//! use occurrence_parquet::execution::{ExecutionEngine, ExecutionOptions};
//! use occurrence_parquet::processing::{audit, transform};
//! use occurrence_parquet::types::{Partition, PartitionedTable, RawValue, Schema, Value};
//!
//! let t = |s: &str| RawValue::Text(s.to_string());
//! let raw = PartitionedTable::new(
//!     Schema::occurrence(),
//!     vec![Partition::new(
//!         0,
//!         vec![vec![t("1"), t("Puma concolor"), t("-84.1"), t("9.9"), t("CR"), t("unknown"), t("ds"), t("2020-05-01")]],
//!     )],
//! );
//! let engine = ExecutionEngine::new(ExecutionOptions::default()).unwrap();
//!
//! let report = audit(&raw, &engine, 5);
//! assert_eq!(report.invalid_for("elevation").unwrap().preview, vec!["unknown".to_string()]);
//!
//! let (typed, _stats) = transform(raw, &engine);
//! assert_eq!(typed.partitions[0].rows[0][5], Value::Float64(-9999.0));
//! ```

pub mod audit;
pub mod coerce;
pub mod impute;
pub mod inspect;

pub use audit::{audit, AuditReport, CoercionWarning, MissingCount, PartitionRows};
pub use coerce::{coerce, coerce_numeric};
pub use impute::{impute, transform, ImputeStats};
pub use inspect::{inspect_table, ColumnProfile, InspectReport};
