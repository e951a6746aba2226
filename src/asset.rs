use std::path::PathBuf;

/// A canonicalized audio file ready for chunk planning.
///
/// PCM signed 16-bit little-endian, 16 kHz, mono — produced by C1. Owned by
/// the pipeline's job-scoped working directory; deleted on successful exit
/// unless the caller asked to keep it (`MediaJob::keep_working_dir`).
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub path: PathBuf,
    /// Measured duration in seconds, or `None` if the probe failed (C1
    /// degrades to "unknown duration" rather than aborting).
    pub duration_seconds: Option<f64>,
    pub size_bytes: u64,
}

impl AudioAsset {
    pub fn new(path: PathBuf, duration_seconds: Option<f64>, size_bytes: u64) -> Self {
        Self {
            path,
            duration_seconds,
            size_bytes,
        }
    }

    /// Whether downstream planning should degrade to single-chunk mode.
    pub fn has_known_duration(&self) -> bool {
        matches!(self.duration_seconds, Some(d) if d > 0.0)
    }
}
