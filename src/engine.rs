use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::chunk::{ChunkSpec, RawSegment};
use crate::error::{Error, Result};
use crate::job::OutputFormat;
use crate::remote::{RemoteClient, ResponseShape, TranscribeRequest, Transport};

/// Segment-granularity timestamp hint sent for `whisper-1` structured
/// requests.
const WHISPER_TIMESTAMP_GRANULARITIES: &[&str] = &["segment"];

/// Cooperative cancellation signal, propagated from the caller into every
/// long-running operation. A thin `watch`-channel wrapper — no
/// additional crate needed for a single flip-once flag.
#[derive(Debug, Clone)]
pub struct CancellationToken(watch::Receiver<bool>);

impl CancellationToken {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }
}

/// Paired sender half; held by the caller to request cancellation.
#[derive(Debug, Clone)]
pub struct CancellationHandle(watch::Sender<bool>);

impl CancellationHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken(self.0.subscribe())
    }
}

/// Construct a linked (handle, token) pair, not yet cancelled.
pub fn cancellation_pair() -> (CancellationHandle, CancellationToken) {
    let (tx, rx) = watch::channel(false);
    (CancellationHandle(tx), CancellationToken(rx))
}

struct CompletedChunk {
    index: u32,
    text: Option<String>,
    segments: Option<Vec<RawSegment>>,
    raw_metadata: Option<serde_json::Value>,
}

/// C6: drives pending chunks from a [`Checkpoint`] against [`RemoteClient`],
/// recording each result via [`CheckpointStore`] before moving on.
pub struct ChunkExecutionEngine<T: Transport> {
    client: Arc<RemoteClient<T>>,
    store: CheckpointStore,
    /// Upper bound on chunks in flight at once. `1` gives strict
    /// sequential-by-index scheduling; values > 1 opt into bounded
    /// concurrency, with checkpoint writes kept serialized through a single
    /// owner task (below).
    max_concurrency: usize,
}

impl<T: Transport + Send + Sync + 'static> ChunkExecutionEngine<T> {
    pub fn new(client: Arc<RemoteClient<T>>, store: CheckpointStore, max_concurrency: usize) -> Self {
        Self {
            client,
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    fn request_shape(output_format: OutputFormat) -> ResponseShape {
        if output_format.requires_segments() {
            ResponseShape::Structured
        } else {
            ResponseShape::Plain
        }
    }

    async fn upload_one(
        client: &RemoteClient<T>,
        spec: &ChunkSpec,
        language: &str,
        model: &str,
        output_format: OutputFormat,
        diarize: bool,
    ) -> Result<CompletedChunk> {
        let file_path = spec
            .file_path
            .as_ref()
            .ok_or_else(|| Error::msg(format!("chunk {} has no cut file", spec.index)))?;

        // Diarization routing is independent of output_format: a plain-text
        // job with diarize=true still needs the structured endpoint.
        let shape = if diarize {
            ResponseShape::Structured
        } else {
            Self::request_shape(output_format)
        };
        let granularities = if shape == ResponseShape::Structured && model == "whisper-1" {
            Some(WHISPER_TIMESTAMP_GRANULARITIES)
        } else {
            None
        };

        let request = TranscribeRequest {
            chunk_file: file_path,
            language,
            model,
            shape,
            prompt: None,
            timestamp_granularities: granularities,
        };

        let response = if diarize {
            client.transcribe_with_diarization(&request).await?
        } else {
            client.transcribe(&request).await?
        };

        if matches!(output_format, OutputFormat::Subtitle) && response.segments.is_none() {
            return Err(Error::SegmentsRequiredForSubtitle);
        }

        Ok(CompletedChunk {
            index: spec.index,
            text: Some(response.text),
            segments: response.segments,
            raw_metadata: Some(response.raw),
        })
    }

    /// Process every pending chunk in `checkpoint`, persisting progress after
    /// each success. Returns the fully (or partially, on cancellation)
    /// updated checkpoint. A chunk failure aborts the run with the
    /// checkpoint preserved up to the last success, so a later run resumes
    /// from the first unfinished index.
    pub async fn run(
        &self,
        fingerprint: &str,
        mut checkpoint: Checkpoint,
        language: &str,
        model: &str,
        output_format: OutputFormat,
        diarize: bool,
        cancellation: CancellationToken,
    ) -> Result<Checkpoint> {
        if self.max_concurrency == 1 {
            return self
                .run_sequential(fingerprint, checkpoint, language, model, output_format, diarize, cancellation)
                .await;
        }

        let pending: Vec<ChunkSpec> = checkpoint
            .plan()
            .chunks
            .into_iter()
            .zip(checkpoint.chunks.iter())
            .filter(|(_, c)| !c.transcribed)
            .map(|(spec, _)| spec)
            .collect();

        let (tx, mut rx) = mpsc::channel::<Result<CompletedChunk>>(self.max_concurrency);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.max_concurrency));

        for spec in pending {
            if cancellation.is_cancelled() {
                break;
            }
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| Error::msg(err.to_string()))?;
            let client = self.client.clone();
            let tx = tx.clone();
            let language = language.to_string();
            let model = model.to_string();

            tokio::spawn(async move {
                let result = Self::upload_one(&client, &spec, &language, &model, output_format, diarize).await;
                drop(permit);
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        // Single owner task (this one) drains the completion channel and
        // serializes every checkpoint write — the same "one consumer drains
        // a channel" shape used for decode-thread handoff elsewhere.
        while let Some(result) = rx.recv().await {
            if cancellation.is_cancelled() {
                return Ok(checkpoint);
            }
            let completed = result?;
            checkpoint.mark_complete(completed.index, completed.text, completed.segments, completed.raw_metadata)?;
            self.store.save(fingerprint, &checkpoint).await?;
        }

        Ok(checkpoint)
    }

    async fn run_sequential(
        &self,
        fingerprint: &str,
        mut checkpoint: Checkpoint,
        language: &str,
        model: &str,
        output_format: OutputFormat,
        diarize: bool,
        cancellation: CancellationToken,
    ) -> Result<Checkpoint> {
        let plan = checkpoint.plan();
        for spec in &plan.chunks {
            if checkpoint
                .chunks
                .iter()
                .find(|c| c.index == spec.index)
                .map(|c| c.transcribed)
                .unwrap_or(false)
            {
                continue;
            }

            if cancellation.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let completed = Self::upload_one(&self.client, spec, language, model, output_format, diarize).await?;
            checkpoint.mark_complete(completed.index, completed.text, completed.segments, completed.raw_metadata)?;
            self.store.save(fingerprint, &checkpoint).await?;
        }

        Ok(checkpoint)
    }
}
