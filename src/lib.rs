//! `occurrence-parquet` converts large delimited exports of biodiversity occurrence records into a
//! directory of partitioned Parquet files, and tells you what it found along the way.
//!
//! The primary entrypoint is [`pipeline::Pipeline`], which runs six stages in order:
//!
//! 1. **Sniff** ([`ingestion::sniff_delimiter`]): infer the delimiter from the first lines
//! 2. **Read** ([`ingestion::read_partitioned`]): keep only the schema columns, as text, in fixed-size partitions
//! 3. **Audit** ([`processing::audit()`]): missing counts, invalid numeric values, partition sizes
//! 4. **Transform** ([`processing::transform()`]): coerce numeric columns, then fill nulls with defaults
//! 5. **Write** ([`output::write_partitions`]): one `part.N.parquet` per partition
//! 6. **Validate** ([`output::validate_output`]): reopen every file and check rows and schema
//!
//! Value-level problems (unparsable numbers, malformed records, a partition that fails to write)
//! are recovered and itemised in the [`report::ConversionReport`]. Only a run that cannot proceed
//! returns a [`ConvertError`].
//!
//! ## Schema
//!
//! [`types::Schema::occurrence`] is the fixed target schema:
//!
//! | column | type | fill |
//! |---|---|---|
//! | `gbifID` | [`types::DataType::Utf8`] | |
//! | `species` | [`types::DataType::Utf8`] | `"Unknown"` |
//! | `decimalLongitude` | [`types::DataType::Float64`] | `-9999` |
//! | `decimalLatitude` | [`types::DataType::Float64`] | `-9999` |
//! | `countryCode` | [`types::DataType::Utf8`] | `"Unknown"` |
//! | `elevation` | [`types::DataType::Float64`] | `-9999` |
//! | `datasetKey` | [`types::DataType::Utf8`] | |
//! | `eventDate` | [`types::DataType::Utf8`] | `"Unknown"` |
//!
//! ## Quick example
//!
//! ```no_run
//! use occurrence_parquet::config::ConvertOptions;
//! use occurrence_parquet::pipeline::Pipeline;
//! use occurrence_parquet::report::render_text;
//!
//! # fn main() -> Result<(), occurrence_parquet::ConvertError> {
//! let pipeline = Pipeline::new(ConvertOptions::default())?;
//! let report = pipeline.run("occurrences.csv", "occurrences_parquet")?;
//! print!("{}", render_text(&report));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`ingestion`]: delimiter sniffing and schema-constrained reading
//! - [`processing`]: audit, coercion, imputation and inspection over partitions
//! - [`output`]: parquet writing and post-write validation
//! - [`execution`]: worker pool, in-flight throttling and execution metrics
//! - [`observability`]: pipeline observers (stderr, file, tracing)
//! - [`report`]: run diagnostics rendered as text or JSON
//! - [`config`], [`error`], [`types`]

pub mod config;
pub mod error;
pub mod execution;
pub mod ingestion;
pub mod observability;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod report;
pub mod types;

pub use config::{Compression, ConvertOptions};
pub use error::{ConvertError, ConvertResult, RunStatus};
pub use pipeline::Pipeline;
pub use report::ConversionReport;
