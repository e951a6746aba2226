use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use scribe_chunk::checkpoint::{Checkpoint, CheckpointStore};
use scribe_chunk::chunk::ChunkPlan;
use scribe_chunk::config::{ExternalTools, RemoteClientConfig};
use scribe_chunk::job::{MediaJob, OutputFormat, UrlSourceMode};
use scribe_chunk::pipeline::Pipeline;
use scribe_chunk::planner::plan_chunks;
use scribe_chunk::process::{ProcessOutput, ProcessRunner};
use scribe_chunk::asset::AudioAsset;
use scribe_chunk::remote::{Transport, TransportResponse};

/// Fake external binaries: `ffprobe` reports a fixed duration, `ffmpeg`
/// materializes a placeholder file at whatever output path it was given, so
/// the pipeline never needs a real media toolchain on the test machine.
struct FakeTools {
    duration_seconds: f64,
}

#[async_trait]
impl ProcessRunner for FakeTools {
    async fn run(&self, program: &str, args: &[String], _timeout: Duration) -> scribe_chunk::Result<ProcessOutput> {
        if program.contains("ffprobe") {
            return Ok(ProcessOutput {
                success: true,
                stdout: format!("{}\n", self.duration_seconds).into_bytes(),
                stderr: Vec::new(),
            });
        }

        // ffmpeg: the output path is always the last argument in our
        // command construction (transcode and cut both append it last).
        let out_path = PathBuf::from(args.last().unwrap());
        tokio::fs::write(&out_path, b"RIFF....WAVEfake-pcm-data").await.unwrap();
        Ok(ProcessOutput {
            success: true,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    async fn is_available(&self, _program: &str) -> bool {
        true
    }
}

struct FakeTransport {
    responses: Mutex<Vec<&'static str>>,
    calls: AtomicUsize,
}

impl FakeTransport {
    fn new(responses: Vec<&'static str>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn post_multipart(
        &self,
        _url: &str,
        _api_key: &str,
        _fields: &[(&str, String)],
        _file_path: &Path,
        _timeout: Duration,
    ) -> scribe_chunk::Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        let body = responses.remove(0);
        Ok(TransportResponse {
            status: 200,
            body: body.to_string(),
            content_type: Some("application/json".to_string()),
        })
    }
}

fn test_config() -> RemoteClientConfig {
    RemoteClientConfig {
        api_key: "sk-test".to_string(),
        api_base: "https://example.invalid/v1".to_string(),
        model: "whisper-1".to_string(),
        request_timeout: Duration::from_secs(5),
        max_retries: 3,
        retry_delay: Duration::from_millis(1),
    }
}

#[tokio::test]
async fn single_small_file_produces_one_upload() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    tokio::fs::write(&input, vec![0u8; 1_000]).await.unwrap();

    let job = MediaJob::for_path(input, dir.path().join("work"));

    let tools = ExternalTools::default();
    let runner = FakeTools { duration_seconds: 10.0 };
    let transport = FakeTransport::new(vec![r#"{"text":"hello world"}"#]);
    let client = scribe_chunk::remote::RemoteClient::new(test_config(), transport);

    let pipeline = Pipeline::new(tools, runner, client, 1);
    let result = pipeline.run(&job).await.unwrap();

    assert_eq!(result.text, "hello world");
    assert_eq!(result.chunks_count, 1);
}

#[tokio::test]
async fn resume_only_processes_pending_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    tokio::fs::write(&input, vec![0u8; 1_000]).await.unwrap();
    let work_dir = dir.path().join("work");
    tokio::fs::create_dir_all(&work_dir).await.unwrap();

    let mut job = MediaJob::for_path(&input, &work_dir);
    job.chunk_duration_seconds = 2.0;
    job.resume = true;

    // Pre-seed a checkpoint with 4 of 5 chunks already complete. A 10s
    // asset at 2s/chunk yields exactly 5 chunks.
    let asset = AudioAsset::new(input.clone(), Some(10.0), 1_000);
    let mut plan: ChunkPlan = plan_chunks(&asset, 2.0, 25 * 1024 * 1024);
    assert_eq!(plan.len(), 5);

    // A real prior run would have already cut every chunk to disk; since
    // resume skips C1-C3 entirely, the checkpoint's file paths must already
    // point at (fake, never-read-by-FakeTransport) per-chunk files.
    for chunk in &mut plan.chunks {
        chunk.file_path = Some(work_dir.join(format!("chunk_{:05}.wav", chunk.index)));
    }

    let mut checkpoint = Checkpoint::new(job.source.locator(), &plan);
    for index in 0..4 {
        checkpoint.mark_complete(index, Some(format!("chunk-{index}")), None, None).unwrap();
    }

    let fingerprint = scribe_chunk::fingerprint::fingerprint_file(&input).await.unwrap();
    let store = CheckpointStore::new(&work_dir);
    store.save(&fingerprint, &checkpoint).await.unwrap();

    let tools = ExternalTools::default();
    let runner = FakeTools { duration_seconds: 10.0 };
    let transport = FakeTransport::new(vec![r#"{"text":"chunk-4"}"#]);
    let client = scribe_chunk::remote::RemoteClient::new(test_config(), transport);

    let pipeline = Pipeline::new(tools, runner, client, 1);
    let result = pipeline.run(&job).await.unwrap();

    assert_eq!(result.text, "chunk-0 chunk-1 chunk-2 chunk-3 chunk-4");
    assert_eq!(result.chunks_count, 5);
}

/// Fake downloader for the captions fast path: materializes a VTT file next
/// to the `-o` output template, same as a real `yt-dlp --write-subs` run.
struct FakeCaptionsRunner {
    file_name: &'static str,
    contents: &'static str,
}

#[async_trait]
impl ProcessRunner for FakeCaptionsRunner {
    async fn run(&self, _program: &str, args: &[String], _timeout: Duration) -> scribe_chunk::Result<ProcessOutput> {
        if let Some(pos) = args.iter().position(|a| a == "-o") {
            let template = PathBuf::from(&args[pos + 1]);
            if let Some(dir) = template.parent() {
                tokio::fs::write(dir.join(self.file_name), self.contents.as_bytes()).await.unwrap();
            }
        }
        Ok(ProcessOutput {
            success: true,
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }

    async fn is_available(&self, _program: &str) -> bool {
        true
    }
}

#[tokio::test]
async fn captions_fast_path_short_circuits_chunking() {
    let dir = tempfile::tempdir().unwrap();
    let work_dir = dir.path().join("work");

    let mut job = MediaJob::for_url("https://example.invalid/watch?v=abc", &work_dir);
    job.url_source_mode = UrlSourceMode::Captions;

    let tools = ExternalTools::default();
    let runner = FakeCaptionsRunner {
        file_name: "abc.ar.vtt",
        contents: "WEBVTT\n\n00:00:00.000 --> 00:00:02.500\nHello there\n\n00:00:02.500 --> 00:00:05.000\nWorld\n",
    };
    // No transport calls are expected on this path; an empty response list
    // makes that explicit, since any call would panic on Vec::remove.
    let transport = FakeTransport::new(vec![]);
    let client = scribe_chunk::remote::RemoteClient::new(test_config(), transport);

    let pipeline = Pipeline::new(tools, runner, client, 1);
    let result = pipeline.run(&job).await.unwrap();

    assert_eq!(result.text, "Hello there World");
    assert_eq!(result.chunks_count, 0);
    assert_eq!(result.segments.unwrap().len(), 2);
}

/// Transport whose responses carry their own status code, so a test can
/// script a rejection followed by a success. Used to drive the
/// diarization-fallback path end to end.
struct StatusScriptedTransport {
    responses: Mutex<Vec<(u16, &'static str)>>,
    calls: AtomicUsize,
}

impl StatusScriptedTransport {
    fn new(responses: Vec<(u16, &'static str)>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transport for StatusScriptedTransport {
    async fn post_multipart(
        &self,
        _url: &str,
        _api_key: &str,
        _fields: &[(&str, String)],
        _file_path: &Path,
        _timeout: Duration,
    ) -> scribe_chunk::Result<TransportResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut responses = self.responses.lock().unwrap();
        let (status, body) = responses.remove(0);
        Ok(TransportResponse {
            status,
            body: body.to_string(),
            content_type: Some("application/json".to_string()),
        })
    }
}

#[tokio::test]
async fn diarize_with_plain_output_still_routes_through_diarization() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    tokio::fs::write(&input, vec![0u8; 1_000]).await.unwrap();

    let mut job = MediaJob::for_path(input, dir.path().join("work"));
    job.diarize = true;
    job.output_format = OutputFormat::Plain;

    let tools = ExternalTools::default();
    let runner = FakeTools { duration_seconds: 10.0 };
    // First call is rejected as diarization-unsupported; the client must
    // retry once more (structured, plain) and succeed.
    let transport = StatusScriptedTransport::new(vec![
        (400, "API error 400: diarize not supported"),
        (200, r#"{"text":"speaker one said hello","segments":[{"start":0.0,"end":1.0,"text":"hello"}]}"#),
    ]);
    let client = scribe_chunk::remote::RemoteClient::new(test_config(), transport);

    let pipeline = Pipeline::new(tools, runner, client, 1);
    let result = pipeline.run(&job).await.unwrap();

    assert_eq!(result.text, "speaker one said hello");
    assert_eq!(result.chunks_count, 1);
}

#[tokio::test]
async fn output_format_subtitle_requires_segments() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.wav");
    tokio::fs::write(&input, vec![0u8; 1_000]).await.unwrap();

    let mut job = MediaJob::for_path(input, dir.path().join("work"));
    job.output_format = OutputFormat::Subtitle;

    let tools = ExternalTools::default();
    let runner = FakeTools { duration_seconds: 10.0 };
    // No segments in the response -> subtitle output must fail loudly.
    let transport = FakeTransport::new(vec![r#"{"text":"hello"}"#]);
    let client = scribe_chunk::remote::RemoteClient::new(test_config(), transport);

    let pipeline = Pipeline::new(tools, runner, client, 1);
    let err = pipeline.run(&job).await.unwrap_err();
    assert!(matches!(err, scribe_chunk::Error::SegmentsRequiredForSubtitle));
}
