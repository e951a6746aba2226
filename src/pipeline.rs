use std::sync::Arc;

use crate::captions;
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::config::ExternalTools;
use crate::cutter::ChunkCutter;
use crate::engine::{cancellation_pair, CancellationToken, ChunkExecutionEngine};
use crate::error::{Error, Result};
use crate::fingerprint::fingerprint_file;
use crate::job::{MediaJob, OutputFormat, Source, UrlSourceMode};
use crate::planner::plan_chunks;
use crate::postprocess::{clean_transcript, Glossary};
use crate::probe::MediaProbe;
use crate::process::ProcessRunner;
use crate::remote::{RemoteClient, Transport};
use crate::result::TranscriptionResult;
use crate::stitch::stitch;

/// Ties C1–C10 together per the pipeline's control flow:
/// `Input → (C8?) → C1 → C2 → C3 → C4 → C6↔C5 → C7 → C10 → Result`, with C9
/// short-circuiting C1–C7 when the caller chose the captions fast path.
pub struct Pipeline<R: ProcessRunner, T: Transport> {
    tools: ExternalTools,
    runner: R,
    client: Arc<RemoteClient<T>>,
    max_concurrency: usize,
}

impl<R: ProcessRunner, T: Transport + Send + Sync + 'static> Pipeline<R, T> {
    pub fn new(tools: ExternalTools, runner: R, client: RemoteClient<T>, max_concurrency: usize) -> Self {
        Self {
            tools,
            runner,
            client: Arc::new(client),
            max_concurrency,
        }
    }

    /// Run the job to completion with no external cancellation source.
    pub async fn run(&self, job: &MediaJob) -> Result<TranscriptionResult> {
        let (_handle, token) = cancellation_pair();
        self.run_cancellable(job, token).await
    }

    pub async fn run_cancellable(&self, job: &MediaJob, cancellation: CancellationToken) -> Result<TranscriptionResult> {
        tokio::fs::create_dir_all(&job.output_dir).await?;

        if let Source::Url(url) = &job.source {
            if job.url_source_mode == UrlSourceMode::Captions {
                return self.run_captions_fast_path(job, url).await;
            }
        }

        let local_path = self.resolve_local_path(job).await?;
        self.run_chunked_pipeline(job, &local_path, cancellation).await
    }

    async fn resolve_local_path(&self, job: &MediaJob) -> Result<std::path::PathBuf> {
        match &job.source {
            Source::Path(path) => Ok(path.clone()),
            Source::Url(url) => {
                use crate::ingest::UrlIngestor;
                let ingestor = UrlIngestor::new(&self.tools, &self.runner);
                ingestor.fetch_audio(url, &job.output_dir).await
            }
        }
    }

    async fn run_captions_fast_path(&self, job: &MediaJob, url: &str) -> Result<TranscriptionResult> {
        use crate::ingest::UrlIngestor;

        let ingestor = UrlIngestor::new(&self.tools, &self.runner);
        let vtt_path = ingestor.fetch_captions(url, &job.language, &job.output_dir).await?;
        let vtt_text = tokio::fs::read_to_string(&vtt_path).await?;
        let parsed = captions::parse(&vtt_text);

        let glossary = self.load_glossary(job).await?;
        let text = clean_transcript(&parsed.merged_text, glossary.as_ref(), &job.language, job.light_formatting);

        let duration_seconds = parsed.segments.iter().map(|s| s.end).fold(None, |acc: Option<f64>, end| {
            Some(acc.map(|a: f64| a.max(end)).unwrap_or(end))
        });

        Ok(TranscriptionResult {
            text,
            segments: if parsed.segments.is_empty() { None } else { Some(parsed.segments) },
            duration_seconds,
            chunks_count: 0,
            language: Some(job.language.clone()),
            warnings: Vec::new(),
        })
    }

    async fn run_chunked_pipeline(
        &self,
        job: &MediaJob,
        local_path: &std::path::Path,
        cancellation: CancellationToken,
    ) -> Result<TranscriptionResult> {
        let locator = job.source.locator();
        let max_bytes = job.clamped_max_bytes_per_chunk();
        let fingerprint = fingerprint_file(local_path).await?;
        let store = CheckpointStore::new(&job.output_dir);

        let mut warnings = Vec::new();

        let (checkpoint, probed_duration) = match self.try_resume(job, &store, &fingerprint, &locator).await? {
            Some((checkpoint, duration)) => (checkpoint, duration),
            None => {
                let probe = MediaProbe::new(&self.tools, &self.runner);
                let asset = probe.build_asset(local_path, &job.output_dir, max_bytes).await?;
                if !asset.has_known_duration() {
                    warnings.push("probe unavailable, duration unknown".to_string());
                }

                let plan = plan_chunks(&asset, job.chunk_duration_seconds, max_bytes);
                let cutter = ChunkCutter::new(&self.tools, &self.runner);
                let (cut_plan, cut_warnings) = cutter.cut_all(&asset, &plan, &job.output_dir, max_bytes).await?;
                warnings.extend(cut_warnings);

                let checkpoint = Checkpoint::new(locator.clone(), &cut_plan);
                store.save(&fingerprint, &checkpoint).await?;
                (checkpoint, asset.duration_seconds)
            }
        };

        let engine = ChunkExecutionEngine::new(self.client.clone(), CheckpointStore::new(&job.output_dir), self.max_concurrency);
        let completed = engine
            .run(
                &fingerprint,
                checkpoint,
                &job.language,
                &job.model,
                job.output_format,
                job.diarize,
                cancellation,
            )
            .await?;

        let plan = completed.plan();
        let pairs = completed
            .results()
            .into_iter()
            .zip(plan.chunks.iter())
            .map(|(result, spec)| (result, spec.start_seconds))
            .collect::<Vec<_>>();
        let chunks_count = pairs.len() as u32;

        let probed_duration = probed_duration.or_else(|| {
            let total: f64 = plan.chunks.iter().map(|c| c.duration_seconds).sum();
            if total > 0.0 {
                Some(total)
            } else {
                None
            }
        });

        let stitched = stitch(pairs, probed_duration);

        if matches!(job.output_format, OutputFormat::Subtitle) && stitched.segments.is_none() {
            return Err(Error::SegmentsRequiredForSubtitle);
        }

        let glossary = self.load_glossary(job).await?;
        let text = clean_transcript(&stitched.text, glossary.as_ref(), &job.language, job.light_formatting);

        if !job.keep_working_dir {
            self.cleanup_working_files(&plan, local_path, job).await;
        }

        Ok(TranscriptionResult {
            text,
            segments: stitched.segments,
            duration_seconds: stitched.duration_seconds,
            chunks_count,
            language: Some(job.language.clone()),
            warnings,
        })
    }

    async fn try_resume(
        &self,
        job: &MediaJob,
        store: &CheckpointStore,
        fingerprint: &str,
        locator: &str,
    ) -> Result<Option<(Checkpoint, Option<f64>)>> {
        if !job.resume {
            return Ok(None);
        }

        let Some(checkpoint) = store.load(fingerprint).await? else {
            return Ok(None);
        };

        // C4 discipline (a): only honor a checkpoint whose stored locator
        // matches the current job; otherwise ignore it (don't delete it).
        if !checkpoint.matches_locator(locator) {
            return Ok(None);
        }

        Ok(Some((checkpoint, None)))
    }

    async fn load_glossary(&self, job: &MediaJob) -> Result<Option<Glossary>> {
        match &job.glossary_path {
            Some(path) => Ok(Some(Glossary::load(path).await?)),
            None => Ok(None),
        }
    }

    async fn cleanup_working_files(&self, plan: &crate::chunk::ChunkPlan, local_path: &std::path::Path, job: &MediaJob) {
        for chunk in &plan.chunks {
            if let Some(path) = &chunk.file_path {
                if path != local_path {
                    let _ = tokio::fs::remove_file(path).await;
                }
            }
        }
        let canonical = job.output_dir.join("canonical.wav");
        let _ = tokio::fs::remove_file(&canonical).await;
    }
}
