//! Options controlling a conversion run.
//!
//! [`ConvertOptions`] has sensible defaults for GBIF occurrence exports, and can be
//! loaded from a JSON file where every key is optional:
//!
//! ```json
//! { "delimiter": "\t", "partition_rows": 250000, "compression": "zstd" }
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, ConvertResult};
use crate::execution::ExecutionOptions;

/// Cell contents treated as missing at read time, in addition to empty cells.
///
/// `NA` is on the list, so Namibia's `countryCode` reads as missing and is filled with
/// `"Unknown"`. Set [`ConvertOptions::null_tokens`] without it to keep the code.
pub const DEFAULT_NULL_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Parquet page compression for written partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression.
    None,
    /// Snappy.
    #[default]
    Snappy,
    /// Zstandard at the default level.
    Zstd,
    /// Gzip at the default level.
    Gzip,
}

impl Compression {
    /// The equivalent parquet codec.
    pub fn to_parquet(self) -> parquet::basic::Compression {
        use parquet::basic::{Compression as Codec, GzipLevel, ZstdLevel};
        match self {
            Compression::None => Codec::UNCOMPRESSED,
            Compression::Snappy => Codec::SNAPPY,
            Compression::Zstd => Codec::ZSTD(ZstdLevel::default()),
            Compression::Gzip => Codec::GZIP(GzipLevel::default()),
        }
    }
}

impl FromStr for Compression {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "uncompressed" => Ok(Compression::None),
            "snappy" => Ok(Compression::Snappy),
            "zstd" => Ok(Compression::Zstd),
            "gzip" => Ok(Compression::Gzip),
            other => Err(ConvertError::Config {
                message: format!("unsupported compression '{other}'"),
            }),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Compression::None => "none",
            Compression::Snappy => "snappy",
            Compression::Zstd => "zstd",
            Compression::Gzip => "gzip",
        };
        f.write_str(s)
    }
}

/// Options controlling sniffing, reading, auditing, writing and inspection.
///
/// Use [`Default`] for common cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Explicit field delimiter. When set, sniffing is skipped.
    pub delimiter: Option<char>,
    /// Number of leading lines inspected by the delimiter sniffer.
    pub sample_lines: usize,
    /// Number of parsed records per partition (and per output file).
    pub partition_rows: usize,
    /// Cell contents read as missing.
    pub null_tokens: Vec<String>,
    /// Maximum number of distinct invalid values listed per numeric column.
    pub invalid_preview: usize,
    /// Compression codec for written files.
    pub compression: Compression,
    /// Maximum rows per parquet row group.
    pub row_group_rows: usize,
    /// Rows read by [`crate::pipeline::Pipeline::inspect`].
    pub inspect_rows: usize,
    /// Worker pool configuration.
    pub execution: ExecutionOptions,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            sample_lines: 1_000,
            partition_rows: 100_000,
            null_tokens: DEFAULT_NULL_TOKENS.iter().map(|s| s.to_string()).collect(),
            invalid_preview: 5,
            compression: Compression::default(),
            row_group_rows: 1_048_576,
            inspect_rows: 50_000,
            execution: ExecutionOptions::default(),
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file. Missing keys keep their defaults.
    pub fn from_json_path(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConvertError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let opts: Self = serde_json::from_str(&text).map_err(|e| ConvertError::Config {
            message: format!("cannot parse {}: {e}", path.display()),
        })?;
        opts.validate()?;
        Ok(opts)
    }

    /// Reject option values the pipeline cannot honour.
    pub fn validate(&self) -> ConvertResult<()> {
        let positive = [
            ("sample_lines", self.sample_lines),
            ("partition_rows", self.partition_rows),
            ("row_group_rows", self.row_group_rows),
            ("inspect_rows", self.inspect_rows),
            ("execution.max_in_flight_partitions", self.execution.max_in_flight_partitions),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConvertError::Config {
                    message: format!("{name} must be > 0"),
                });
            }
        }
        if self.execution.num_threads == Some(0) {
            return Err(ConvertError::Config {
                message: "execution.num_threads must be > 0 when set".to_string(),
            });
        }
        if let Some(d) = self.delimiter {
            if !d.is_ascii() || d == '"' || d == '\n' || d == '\r' {
                return Err(ConvertError::Config {
                    message: format!("delimiter {d:?} must be a single ASCII byte other than a quote or newline"),
                });
            }
        }
        Ok(())
    }

    /// Whether `cell` (already trimmed) is read as missing.
    pub fn is_null_token(&self, cell: &str) -> bool {
        cell.is_empty() || self.null_tokens.iter().any(|t| t == cell)
    }
}
