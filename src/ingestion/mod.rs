//! Source ingestion: delimiter detection and schema-constrained reading.
//!
//! - [`sniff`]: infer the field delimiter from a sampled prefix
//! - [`csv`]: read the schema columns as text into a [`crate::types::RawTable`]

pub mod csv;
pub mod sniff;

pub use csv::{read_partitioned, read_partitioned_from_reader, ReadOutcome, ReadStats};
pub use sniff::{sniff_bytes, sniff_delimiter, CANDIDATES};
