//! Delimiter detection from a bounded prefix of the source.
//!
//! The sniffer looks at exactly `sample_lines` leading lines and picks the candidate byte whose
//! per-line occurrence count (outside double quotes) is the most uniform across the sample.
//! Detection is heuristic: it is only as good as the sample is representative, which is why
//! [`crate::config::ConvertOptions::delimiter`] can bypass it.
//!
//! A source that cannot be opened or read is an ingest error, not a detection failure.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{ConvertError, ConvertResult, DetectionFailure, IngestFailure};

/// Candidate delimiters, in tie-break preference order.
pub const CANDIDATES: [u8; 5] = [b',', b'\t', b';', b'|', b':'];

/// Share of non-blank sample lines that must agree on the modal count, in percent.
const MIN_AGREEMENT_PCT: usize = 90;

/// Below this many non-blank lines every line must agree.
const STRICT_BELOW_LINES: usize = 10;

/// Infer the field delimiter of the file at `path` from its first `sample_lines` lines.
pub fn sniff_delimiter(path: impl AsRef<Path>, sample_lines: usize) -> ConvertResult<u8> {
    let path = path.as_ref();
    let unreadable = |e: std::io::Error| ConvertError::Ingest {
        path: path.to_path_buf(),
        reason: IngestFailure::Io(e),
    };

    let file = File::open(path).map_err(unreadable)?;
    let lines = read_sample_lines(BufReader::new(file), sample_lines).map_err(unreadable)?;
    sniff_lines(&lines, sample_lines).map_err(|reason| ConvertError::FormatDetection {
        path: path.to_path_buf(),
        reason,
    })
}

/// Infer the field delimiter of in-memory data.
pub fn sniff_bytes(data: &[u8], sample_lines: usize) -> Result<u8, DetectionFailure> {
    let lines: Vec<String> = data
        .split_inclusive(|&b| b == b'\n')
        .take(sample_lines)
        .map(decode_line)
        .collect();
    sniff_lines(&lines, sample_lines)
}

fn decode_line(buf: &[u8]) -> String {
    String::from_utf8_lossy(buf).trim_end_matches(['\n', '\r']).to_string()
}

fn read_sample_lines<R: BufRead>(mut reader: R, sample_lines: usize) -> std::io::Result<Vec<String>> {
    let mut lines = Vec::with_capacity(sample_lines.min(4_096));
    let mut buf = Vec::new();
    while lines.len() < sample_lines {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        lines.push(decode_line(&buf));
    }
    Ok(lines)
}

fn sniff_lines(lines: &[String], requested: usize) -> Result<u8, DetectionFailure> {
    if lines.len() < requested {
        return Err(DetectionFailure::TooShort {
            requested,
            found: lines.len(),
        });
    }

    let scored: Vec<&str> = lines
        .iter()
        .map(String::as_str)
        .filter(|l| !l.trim().is_empty())
        .collect();
    let no_delimiter = DetectionFailure::NoConsistentDelimiter { lines: lines.len() };
    if scored.is_empty() {
        return Err(no_delimiter);
    }

    let required = if scored.len() < STRICT_BELOW_LINES {
        scored.len()
    } else {
        (scored.len() * MIN_AGREEMENT_PCT).div_ceil(100)
    };

    let mut best: Option<(usize, usize, u8)> = None;
    for candidate in CANDIDATES {
        let counts: Vec<usize> = scored.iter().map(|l| count_unquoted(l, candidate)).collect();
        let (mode, agreeing) = modal_count(&counts);
        if mode == 0 || agreeing < required {
            continue;
        }
        // Earlier candidates win ties, so only a strictly better score replaces the best.
        let better = match best {
            None => true,
            Some((best_agree, best_mode, _)) => (agreeing, mode) > (best_agree, best_mode),
        };
        if better {
            best = Some((agreeing, mode, candidate));
        }
    }

    best.map(|(_, _, d)| d).ok_or(no_delimiter)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut n = 0;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if b == delimiter && !in_quotes {
            n += 1;
        }
    }
    n
}

/// Most frequent value and how many entries have it; ties go to the larger value.
fn modal_count(counts: &[usize]) -> (usize, usize) {
    let mut freq = std::collections::BTreeMap::<usize, usize>::new();
    for &c in counts {
        *freq.entry(c).or_default() += 1;
    }
    freq.into_iter()
        .max_by_key(|&(value, seen)| (seen, value))
        .unwrap_or((0, 0))
}
