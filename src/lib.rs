//! `scribe-chunk` — a resumable, size-aware chunking pipeline for
//! transcribing long audio/video against a remote speech-to-text API.
//!
//! The hard engineering problem this crate solves is turning an opaque media
//! file or URL into a single, ordered, gap-free transcript while respecting
//! a remote service's hard per-request payload ceiling, surviving transient
//! network failures, and letting an interrupted run resume exactly where it
//! left off.
//!
//! Out of scope (the caller's job): CLI argument parsing, an interactive UI,
//! progress rendering, output serialization to plain/subtitle/structured
//! formats, post-transcription "AI features", and secret/config discovery.
//! This crate exposes plain constructor parameters and returns a structured
//! [`result::TranscriptionResult`]; a caller wires that to whatever surface
//! it needs.

pub mod asset;
pub mod captions;
pub mod checkpoint;
pub mod chunk;
pub mod config;
pub mod cutter;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod ingest;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod planner;
pub mod postprocess;
pub mod probe;
pub mod process;
pub mod remote;
pub mod result;
pub mod stitch;

pub use checkpoint::{Checkpoint, CheckpointStore};
pub use config::{ExternalTools, RemoteClientConfig};
pub use engine::{cancellation_pair, CancellationHandle, CancellationToken};
pub use error::{Error, Result};
pub use job::{MediaJob, OutputFormat, Source, UrlSourceMode};
pub use pipeline::Pipeline;
pub use remote::{ReqwestTransport, Transport};
pub use result::TranscriptionResult;
