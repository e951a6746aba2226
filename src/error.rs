use std::error::Error as StdError;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream callers aren't
/// forced to adopt `anyhow` in their own public APIs. One variant per outcome
/// named in the error handling design; transient remote outcomes (rate
/// limits, 5xx, timeouts) are retried internally by [`crate::remote`] and only
/// surface here once retries are exhausted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration missing: {0}")]
    ConfigMissing(String),

    #[error("unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("transcoder unavailable: {0}")]
    TranscoderUnavailable(String),

    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("captions unavailable: {0}")]
    CaptionsUnavailable(String),

    #[error("remote service rate limited the request after {attempts} attempt(s)")]
    RemoteRateLimited { attempts: u32 },

    #[error("remote service returned server error {status} after {attempts} attempt(s)")]
    RemoteServerError { status: u16, attempts: u32 },

    #[error("remote request timed out after {attempts} attempt(s)")]
    RemoteTimeout { attempts: u32 },

    #[error("remote service rejected the request: {status} {body}")]
    RemoteClientError { status: u16, body: String },

    #[error("transport error: {0}")]
    TransportError(String),

    #[error("chunk file not found: {0}")]
    FileNotFound(String),

    #[error("subtitle output requested but the remote service returned no segments")]
    SegmentsRequiredForSubtitle,

    #[error("checkpoint corrupt: {0}")]
    CheckpointCorrupt(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Other(Box::new(err))
    }
}
