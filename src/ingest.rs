use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::ExternalTools;
use crate::error::{Error, Result};
use crate::process::ProcessRunner;

const CAPTIONS_TIMEOUT: Duration = Duration::from_secs(60);
const AUDIO_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Container extensions accepted from the downloader's audio-extraction
/// output, in the order they're searched.
const AUDIO_CONTAINER_EXTENSIONS: &[&str] = &["m4a", "webm", "opus", "mp3", "aac", "ogg", "wav"];

/// C8: fetch remote media via the external downloader, or go straight to
/// captions when the caller asked for the fast path.
pub struct UrlIngestor<'a, R: ProcessRunner> {
    tools: &'a ExternalTools,
    runner: &'a R,
}

impl<'a, R: ProcessRunner> UrlIngestor<'a, R> {
    pub fn new(tools: &'a ExternalTools, runner: &'a R) -> Self {
        Self { tools, runner }
    }

    /// Captions fast path: try manual subtitles first, then auto-generated.
    /// Returns the path to the downloaded VTT file for C9 to parse.
    pub async fn fetch_captions(&self, url: &str, lang: &str, working_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(working_dir).await?;

        self.run_captions_download(url, lang, working_dir, false).await?;
        if let Some(path) = find_caption_file(working_dir, lang).await? {
            return Ok(path);
        }

        self.run_captions_download(url, lang, working_dir, true).await?;
        if let Some(path) = find_caption_file(working_dir, lang).await? {
            return Ok(path);
        }

        Err(Error::CaptionsUnavailable(format!(
            "no manual or auto-generated subtitles found for {lang} at {url}"
        )))
    }

    async fn run_captions_download(&self, url: &str, lang: &str, working_dir: &Path, auto: bool) -> Result<()> {
        let mut args = vec!["--no-playlist".to_string(), "--skip-download".to_string()];
        args.push(if auto { "--write-auto-subs".to_string() } else { "--write-subs".to_string() });
        args.extend([
            "--sub-format".to_string(),
            "vtt".to_string(),
            "--sub-langs".to_string(),
            lang.to_string(),
            "-o".to_string(),
            working_dir.join("%(id)s.%(ext)s").display().to_string(),
            url.to_string(),
        ]);

        // yt-dlp exits non-zero when no subtitles exist for the requested
        // language; that's an expected outcome here, not a fatal error — the
        // caller checks for the resulting file instead of the exit code.
        let _ = self.runner.run(&self.tools.yt_dlp, &args, CAPTIONS_TIMEOUT).await;
        Ok(())
    }

    /// Audio mode: download via the external downloader's audio-extraction
    /// flags, accepting any returned container, and hand the first file
    /// found off to C1.
    pub async fn fetch_audio(&self, url: &str, working_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(working_dir).await?;

        let args = vec![
            "--no-playlist".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            "best".to_string(),
            "--audio-quality".to_string(),
            "0".to_string(),
            "-o".to_string(),
            working_dir.join("%(id)s.%(ext)s").display().to_string(),
            url.to_string(),
        ];

        let output = self
            .runner
            .run(&self.tools.yt_dlp, &args, AUDIO_DOWNLOAD_TIMEOUT)
            .await?;

        if !output.success {
            return Err(Error::UnsupportedSource(format!(
                "downloader failed for {url}: {}",
                output.stderr_tail(20)
            )));
        }

        find_audio_file(working_dir)
            .await?
            .ok_or_else(|| Error::UnsupportedSource(format!("no audio file found after downloading {url}")))
    }
}

async fn find_caption_file(dir: &Path, lang: &str) -> Result<Option<PathBuf>> {
    let suffix = format!(".{lang}.vtt");
    if let Some(found) = find_by_suffix(dir, &suffix).await? {
        return Ok(Some(found));
    }
    find_by_suffix(dir, ".vtt").await
}

async fn find_audio_file(dir: &Path) -> Result<Option<PathBuf>> {
    for ext in AUDIO_CONTAINER_EXTENSIONS {
        if let Some(found) = find_by_suffix(dir, &format!(".{ext}")).await? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

async fn find_by_suffix(dir: &Path, suffix: &str) -> Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(suffix) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
