use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::asset::AudioAsset;
use crate::chunk::{ChunkPlan, ChunkSpec};
use crate::config::ExternalTools;
use crate::error::{Error, Result};
use crate::process::ProcessRunner;

const CUT_TIMEOUT: Duration = Duration::from_secs(60);

/// C3: materialize each planned chunk as its own file via `ffmpeg -ss -t` in
/// copy mode (no re-encoding — the asset is already canonical WAV).
pub struct ChunkCutter<'a, R: ProcessRunner> {
    tools: &'a ExternalTools,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> ChunkCutter<'a, R> {
    pub fn new(tools: &'a ExternalTools, runner: &'a R) -> Self {
        Self { tools, runner }
    }

    async fn cut_one(&self, asset: &Path, spec: &ChunkSpec, working_dir: &Path) -> Result<PathBuf> {
        let out_path = working_dir.join(format!("chunk_{:05}.wav", spec.index));
        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            asset.display().to_string(),
            "-ss".to_string(),
            spec.start_seconds.to_string(),
            "-t".to_string(),
            spec.duration_seconds.to_string(),
            "-c".to_string(),
            "copy".to_string(),
            out_path.display().to_string(),
        ];

        let output = self.runner.run(&self.tools.ffmpeg, &args, CUT_TIMEOUT).await?;
        if !output.success {
            return Err(Error::TranscodeFailed(output.stderr_tail(20)));
        }
        Ok(out_path)
    }

    /// Cut every chunk in `plan`, returning a plan whose `file_path`s are
    /// populated, plus any size-ceiling warnings.
    ///
    /// If cutting index 0 fails, falls back to a single-chunk plan over the
    /// original asset; failures on later indices are fatal.
    pub async fn cut_all(
        &self,
        asset: &AudioAsset,
        plan: &ChunkPlan,
        working_dir: &Path,
        max_bytes_per_chunk: u64,
    ) -> Result<(ChunkPlan, Vec<String>)> {
        let mut warnings = Vec::new();
        let mut cut_chunks = Vec::with_capacity(plan.len());

        for spec in &plan.chunks {
            match self.cut_one(&asset.path, spec, working_dir).await {
                Ok(path) => {
                    let size = tokio::fs::metadata(&path).await?.len();
                    if size > max_bytes_per_chunk {
                        warnings.push(format!(
                            "chunk {} exceeded max_bytes_per_chunk ({size} > {max_bytes_per_chunk})",
                            spec.index
                        ));
                    }
                    cut_chunks.push(ChunkSpec {
                        file_path: Some(path),
                        ..spec.clone()
                    });
                }
                Err(err) if spec.index == 0 => {
                    warnings.push(format!(
                        "chunk 0 cut failed ({err}); falling back to a single-chunk plan over the original asset"
                    ));
                    let single = ChunkSpec {
                        index: 0,
                        start_seconds: 0.0,
                        duration_seconds: asset.duration_seconds.unwrap_or(0.0),
                        file_path: Some(asset.path.clone()),
                    };
                    return Ok((ChunkPlan { chunks: vec![single] }, warnings));
                }
                Err(err) => return Err(err),
            }
        }

        Ok((ChunkPlan { chunks: cut_chunks }, warnings))
    }
}
