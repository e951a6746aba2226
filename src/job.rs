use std::path::PathBuf;

/// Maximum payload size the remote speech service accepts per request.
pub const MAX_BYTES_PER_CHUNK: u64 = 25 * 1024 * 1024;

/// Where a [`MediaJob`]'s source comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// An absolute local path to a media file.
    Path(PathBuf),
    /// A remote URL to be fetched by the URL ingestor (C8).
    Url(String),
}

impl Source {
    /// The locator used for checkpoint identity comparisons (C4 discipline
    /// (a): a checkpoint is only honored if this matches exactly).
    pub fn locator(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Url(u) => u.clone(),
        }
    }
}

/// Desired shape of the final transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Plain,
    Structured,
    Subtitle,
}

impl OutputFormat {
    /// Whether this shape requires per-segment timestamps from the remote
    /// service.
    pub fn requires_segments(self) -> bool {
        matches!(self, Self::Structured | Self::Subtitle)
    }
}

/// How a URL source should be ingested (C8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlSourceMode {
    /// Fetch pre-existing subtitles only; never download media.
    Captions,
    /// Download and extract audio.
    Audio,
}

/// Immutable description of a single transcription run.
///
/// Constructed by the caller, consumed by the pipeline, discarded on
/// completion. Every field here is a plain value — the crate does not read
/// environment variables or config files to populate a `MediaJob`; that
/// stays the caller's job.
#[derive(Debug, Clone)]
pub struct MediaJob {
    pub source: Source,
    /// Per-job working directory; owned exclusively by the pipeline for its
    /// lifetime.
    pub output_dir: PathBuf,
    /// ISO-639-1 language hint passed through to the remote service.
    pub language: String,
    pub model: String,
    pub output_format: OutputFormat,
    pub diarize: bool,
    pub chunk_duration_seconds: f64,
    pub max_bytes_per_chunk: u64,
    pub glossary_path: Option<PathBuf>,
    pub resume: bool,
    pub url_source_mode: UrlSourceMode,
    /// Keep the job's working directory (AudioAsset + chunk files) after a
    /// successful run instead of cleaning it up.
    pub keep_working_dir: bool,
    /// Opt in to light transcript cleanup (glossary-independent whitespace
    /// and punctuation normalization). Off by default.
    pub light_formatting: bool,
}

impl MediaJob {
    /// Construct a job for a local file, with the standard defaults
    /// (`language = ar`, `model = whisper-1`, 5-minute chunks).
    pub fn for_path(path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Path(path.into()),
            output_dir: output_dir.into(),
            language: "ar".to_string(),
            model: "whisper-1".to_string(),
            output_format: OutputFormat::Plain,
            diarize: false,
            chunk_duration_seconds: 300.0,
            max_bytes_per_chunk: MAX_BYTES_PER_CHUNK,
            glossary_path: None,
            resume: true,
            url_source_mode: UrlSourceMode::Audio,
            keep_working_dir: false,
            light_formatting: false,
        }
    }

    /// Construct a job for a remote URL.
    pub fn for_url(url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::Url(url.into()),
            ..Self::for_path(PathBuf::new(), output_dir)
        }
    }

    /// Clamp `max_bytes_per_chunk` to the service ceiling, silently.
    pub fn clamped_max_bytes_per_chunk(&self) -> u64 {
        self.max_bytes_per_chunk.min(MAX_BYTES_PER_CHUNK)
    }
}
