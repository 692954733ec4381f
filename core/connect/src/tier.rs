//! FILENAME: core/connect/src/tier.rs
//! PURPOSE: Picks how an import is processed from the size of its input.
//! CONTEXT: Small files are parsed in one pass, mid-sized CSV is split into
//! chunks parsed on the worker pool, and large inputs are streamed chunk by
//! chunk so only one chunk is decoded at a time.

use serde::{Deserialize, Serialize};

pub const MIB: usize = 1024 * 1024;

/// Inputs below this size are parsed in a single pass.
pub const WORKERS_THRESHOLD: usize = 5 * MIB;
/// Inputs at or above this size are streamed.
pub const STREAMING_THRESHOLD: usize = 50 * MIB;

/// Bytes inspected when estimating the record count.
const ESTIMATE_SAMPLE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingTier {
    Standard,
    Workers,
    Streaming,
}

impl ProcessingTier {
    pub fn for_size(bytes: usize) -> Self {
        if bytes < WORKERS_THRESHOLD {
            ProcessingTier::Standard
        } else if bytes < STREAMING_THRESHOLD {
            ProcessingTier::Workers
        } else {
            ProcessingTier::Streaming
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingTier::Standard => "standard",
            ProcessingTier::Workers => "workers",
            ProcessingTier::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for ProcessingTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Record cap applied to an import of the given size. Larger inputs keep
/// fewer records so the pivot view stays responsive.
pub fn max_records_for(bytes: usize) -> usize {
    if bytes < 10 * MIB {
        100_000
    } else if bytes < 50 * MIB {
        50_000
    } else {
        25_000
    }
}

/// Estimates the number of lines in `bytes` by extrapolating the newline
/// density of a leading sample.
pub fn estimate_records(bytes: &[u8]) -> usize {
    if bytes.is_empty() {
        return 0;
    }
    let sample = &bytes[..bytes.len().min(ESTIMATE_SAMPLE_BYTES)];
    let lines = sample.iter().filter(|&&b| b == b'\n').count().max(1);
    if sample.len() == bytes.len() {
        return lines;
    }
    let per_line = sample.len() as f64 / lines as f64;
    (bytes.len() as f64 / per_line).round() as usize
}
