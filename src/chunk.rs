use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One planned slice of the canonical audio asset.
///
/// Invariants (enforced by [`crate::planner`], relied on by
/// [`crate::checkpoint`] and [`crate::stitch`]): indices are dense starting
/// at 0; `start_seconds` is non-decreasing and non-overlapping across the
/// plan; `duration_seconds > 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkSpec {
    pub index: u32,
    pub start_seconds: f64,
    pub duration_seconds: f64,
    /// Populated by C3 once the chunk file has been materialized; absent
    /// immediately after planning.
    pub file_path: Option<PathBuf>,
}

/// An ordered sequence of [`ChunkSpec`] covering `[0, total_duration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub chunks: Vec<ChunkSpec>,
}

impl ChunkPlan {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// A segment with timestamps local to the chunk it came from (as returned by
/// the remote service) or absolute (after [`crate::stitch`] rebases them).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// The outcome of transcribing (or not yet transcribing) one chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkResult {
    pub index: u32,
    pub transcribed: bool,
    pub text: Option<String>,
    pub segments: Option<Vec<RawSegment>>,
    /// Opaque upstream response payload, preserved verbatim for callers who
    /// want more than the normalized text/segments.
    pub raw_metadata: Option<serde_json::Value>,
}
