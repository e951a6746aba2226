use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::asset::AudioAsset;
use crate::config::ExternalTools;
use crate::error::{Error, Result};
use crate::process::ProcessRunner;

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);
const TRANSCODE_TIMEOUT: Duration = Duration::from_secs(300);

/// Extensions treated as "already audio" for the transcode-failure fallback
/// in `transcode()` below.
const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "aac", "ogg", "opus", "flac"];

/// C1: probe duration, then transcode to canonical WAV (PCM s16le, 16 kHz,
/// mono).
pub struct MediaProbe<'a, R: ProcessRunner> {
    tools: &'a ExternalTools,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> MediaProbe<'a, R> {
    pub fn new(tools: &'a ExternalTools, runner: &'a R) -> Self {
        Self { tools, runner }
    }

    /// Obtain duration in seconds. On failure, returns `Ok(None)` — the
    /// caller degrades to unknown-duration/single-chunk mode rather than
    /// aborting.
    pub async fn probe_duration(&self, input: &Path) -> Option<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "default=noprint_wrappers=1:nokey=1".to_string(),
            input.display().to_string(),
        ];

        let output = self
            .runner
            .run(&self.tools.ffprobe, &args, PROBE_TIMEOUT)
            .await
            .ok()?;

        if !output.success {
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|d| d.is_finite() && *d >= 0.0)
    }

    /// Re-encode `input` into a canonical WAV under `working_dir`.
    pub async fn transcode(
        &self,
        input: &Path,
        working_dir: &Path,
        input_size_bytes: u64,
        max_bytes_per_chunk: u64,
    ) -> Result<PathBuf> {
        if !self.runner.is_available(&self.tools.ffmpeg).await {
            return Err(Error::TranscoderUnavailable(self.tools.ffmpeg.clone()));
        }

        let output_path = working_dir.join("canonical.wav");

        let args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-vn".to_string(),
            "-ac".to_string(),
            "1".to_string(),
            "-ar".to_string(),
            "16000".to_string(),
            "-acodec".to_string(),
            "pcm_s16le".to_string(),
            output_path.display().to_string(),
        ];

        let result = self
            .runner
            .run(&self.tools.ffmpeg, &args, TRANSCODE_TIMEOUT)
            .await;

        match result {
            Ok(output) if output.success => Ok(output_path),
            Ok(output) => {
                if is_audio_extension(input) && input_size_bytes <= max_bytes_per_chunk {
                    // Fall back to the original file: it already looks like
                    // audio and it already fits under the chunk ceiling.
                    Ok(input.to_path_buf())
                } else {
                    Err(Error::TranscodeFailed(output.stderr_tail(20)))
                }
            }
            Err(err) => {
                if is_audio_extension(input) && input_size_bytes <= max_bytes_per_chunk {
                    Ok(input.to_path_buf())
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Probe and transcode, producing the canonical [`AudioAsset`].
    pub async fn build_asset(
        &self,
        input: &Path,
        working_dir: &Path,
        max_bytes_per_chunk: u64,
    ) -> Result<AudioAsset> {
        let input_size_bytes = tokio::fs::metadata(input).await?.len();
        let duration = self.probe_duration(input).await;
        let canonical_path = self
            .transcode(input, working_dir, input_size_bytes, max_bytes_per_chunk)
            .await?;
        let size_bytes = tokio::fs::metadata(&canonical_path).await?.len();
        Ok(AudioAsset::new(canonical_path, duration, size_bytes))
    }
}

fn is_audio_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::process::ProcessOutput;

    struct ScriptedRunner {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<ProcessOutput>>>,
    }

    impl ScriptedRunner {
        fn new(responses: Vec<Result<ProcessOutput>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl ProcessRunner for ScriptedRunner {
        async fn run(&self, _program: &str, _args: &[String], _timeout: Duration) -> Result<ProcessOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("ScriptedRunner ran out of responses");
            }
            responses.remove(0)
        }

        async fn is_available(&self, _program: &str) -> bool {
            true
        }
    }

    fn ok_output(stdout: &str) -> ProcessOutput {
        ProcessOutput {
            success: true,
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }
    }

    #[tokio::test]
    async fn probe_duration_parses_seconds() {
        let runner = ScriptedRunner::new(vec![Ok(ok_output("123.456000\n"))]);
        let tools = ExternalTools::default();
        let probe = MediaProbe::new(&tools, &runner);
        let duration = probe.probe_duration(Path::new("in.mp4")).await;
        assert_eq!(duration, Some(123.456));
    }

    #[tokio::test]
    async fn probe_duration_degrades_to_none_on_failure() {
        let runner = ScriptedRunner::new(vec![Ok(ProcessOutput {
            success: false,
            stdout: Vec::new(),
            stderr: b"no such file".to_vec(),
        })]);
        let tools = ExternalTools::default();
        let probe = MediaProbe::new(&tools, &runner);
        let duration = probe.probe_duration(Path::new("missing.mp4")).await;
        assert_eq!(duration, None);
    }
}
