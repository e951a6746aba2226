use serde::{Deserialize, Serialize};

use crate::chunk::RawSegment;

/// Pipeline output: a single ordered, gap-free transcript plus absolute
/// timestamped segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Absolute timestamps after stitching (C7); `None` when no chunk
    /// returned segments at all.
    pub segments: Option<Vec<RawSegment>>,
    pub duration_seconds: Option<f64>,
    pub chunks_count: u32,
    pub language: Option<String>,
    /// Non-fatal degradations surfaced to the caller, e.g. "chunk 3 exceeded
    /// max_bytes_per_chunk" or "probe unavailable, duration unknown".
    pub warnings: Vec<String>,
}
