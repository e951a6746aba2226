use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::chunk::{ChunkPlan, ChunkResult, ChunkSpec, RawSegment};
use crate::error::{Error, Result};

/// On-disk shape of one chunk's plan + result, matching the checkpoint JSON
/// layout named in the external interfaces section exactly (field names
/// included) so the file is inspectable/debuggable by hand. `segments` is
/// carried alongside `transcript`/`metadata` since the data model requires
/// persisting the full `ChunkResult`, including any per-segment timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointChunk {
    pub index: u32,
    pub start_time: f64,
    pub duration: f64,
    pub file_path: Option<String>,
    pub transcribed: bool,
    pub transcript: Option<String>,
    pub segments: Option<Vec<RawSegment>>,
    pub metadata: Option<serde_json::Value>,
}

impl CheckpointChunk {
    fn from_spec(spec: &ChunkSpec) -> Self {
        Self {
            index: spec.index,
            start_time: spec.start_seconds,
            duration: spec.duration_seconds,
            file_path: spec.file_path.as_ref().map(|p| p.display().to_string()),
            transcribed: false,
            transcript: None,
            segments: None,
            metadata: None,
        }
    }

    pub fn to_result(&self) -> ChunkResult {
        ChunkResult {
            index: self.index,
            transcribed: self.transcribed,
            text: self.transcript.clone(),
            segments: self.segments.clone(),
            raw_metadata: self.metadata.clone(),
        }
    }

    pub fn to_spec(&self) -> ChunkSpec {
        ChunkSpec {
            index: self.index,
            start_seconds: self.start_time,
            duration_seconds: self.duration,
            file_path: self.file_path.as_ref().map(PathBuf::from),
        }
    }
}

/// A durable record keyed by the source media's content fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub input_path: String,
    pub chunks: Vec<CheckpointChunk>,
}

impl Checkpoint {
    /// Build a fresh checkpoint from a just-cut plan, all chunks pending.
    pub fn new(locator: impl Into<String>, plan: &ChunkPlan) -> Self {
        Self {
            input_path: locator.into(),
            chunks: plan.chunks.iter().map(CheckpointChunk::from_spec).collect(),
        }
    }

    /// C4 discipline (a): a checkpoint is only honored if its stored source
    /// locator equals the current job's locator.
    pub fn matches_locator(&self, locator: &str) -> bool {
        self.input_path == locator
    }

    pub fn plan(&self) -> ChunkPlan {
        ChunkPlan {
            chunks: self.chunks.iter().map(CheckpointChunk::to_spec).collect(),
        }
    }

    pub fn first_pending_index(&self) -> Option<u32> {
        self.chunks.iter().find(|c| !c.transcribed).map(|c| c.index)
    }

    pub fn is_complete(&self) -> bool {
        self.chunks.iter().all(|c| c.transcribed)
    }

    pub fn results(&self) -> Vec<ChunkResult> {
        self.chunks.iter().map(CheckpointChunk::to_result).collect()
    }

    /// C4 discipline (c): completed entries are never rewritten with
    /// `transcribed = false` — this only ever flips `false -> true`.
    pub fn mark_complete(
        &mut self,
        index: u32,
        text: Option<String>,
        segments: Option<Vec<RawSegment>>,
        raw_metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let entry = self
            .chunks
            .iter_mut()
            .find(|c| c.index == index)
            .ok_or_else(|| Error::msg(format!("checkpoint has no chunk with index {index}")))?;
        entry.transcribed = true;
        entry.transcript = text;
        entry.segments = segments;
        entry.metadata = raw_metadata;
        Ok(())
    }
}

/// C4: persists and loads [`Checkpoint`]s, one file per fingerprint, under a
/// job's working directory.
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("checkpoint_{fingerprint}.json"))
    }

    /// Load the checkpoint for `fingerprint`, honoring discipline (a): the
    /// caller must still check `matches_locator` before trusting the plan.
    pub async fn load(&self, fingerprint: &str) -> Result<Option<Checkpoint>> {
        let path = self.path_for(fingerprint);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let checkpoint: Checkpoint = serde_json::from_slice(&bytes)
                    .map_err(|err| Error::CheckpointCorrupt(err.to_string()))?;
                Ok(Some(checkpoint))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::from(err)),
        }
    }

    /// Write the whole record atomically: a sibling temp file, then
    /// `rename()` into place, so a concurrent reader or the next run never
    /// observes a partial write (C4 discipline (b)).
    pub async fn save(&self, fingerprint: &str, checkpoint: &Checkpoint) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let final_path = self.path_for(fingerprint);
        let dir = self.dir.clone();
        let bytes = serde_json::to_vec_pretty(checkpoint)?;

        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = NamedTempFile::new_in(&dir)?;
            use std::io::Write;
            tmp.write_all(&bytes)?;
            tmp.flush()?;
            tmp.persist(&final_path)
                .map_err(|err| Error::msg(err.to_string()))?;
            Ok(())
        })
        .await
        .map_err(|err| Error::msg(err.to_string()))??;

        Ok(())
    }

    pub async fn discard(&self, fingerprint: &str) -> Result<()> {
        let path = self.path_for(fingerprint);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::from(err)),
        }
    }
}
