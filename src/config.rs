use std::time::Duration;

use crate::error::{Error, Result};

/// Everything C5 needs to talk to the remote speech service.
///
/// A plain struct the caller constructs; the crate never reads `.env` files
/// or discovers secrets itself. [`RemoteClientConfig::from_env`] is a thin
/// convenience that reads these knobs directly from `std::env`, with the
/// same defaults as the original CLI's settings module.
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl RemoteClientConfig {
    /// Read `OPENAI_API_KEY` (required), `OPENAI_API_BASE`, `OPENAI_MODEL`,
    /// `REQUEST_TIMEOUT`, `MAX_RETRIES`, `RETRY_DELAY` from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| Error::ConfigMissing("OPENAI_API_KEY".to_string()))?;

        let api_base = std::env::var("OPENAI_API_BASE")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

        let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "whisper-1".to_string());

        let request_timeout = std::env::var("REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(300));

        let max_retries = std::env::var("MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay = std::env::var("RETRY_DELAY")
            .ok()
            .and_then(|v| v.parse::<f64>().ok())
            .map(Duration::from_secs_f64)
            .unwrap_or(Duration::from_secs_f64(1.0));

        Ok(Self {
            api_key,
            api_base,
            model,
            request_timeout,
            max_retries,
            retry_delay,
        })
    }
}

/// Names/paths of the external binaries C1/C3/C8 shell out to.
///
/// Defaults to the bare command names on `PATH`, matching the original
/// implementation's `['ffmpeg', ...]`-style argv construction — no
/// environment-discovery magic here, just overridable fields.
#[derive(Debug, Clone)]
pub struct ExternalTools {
    pub ffprobe: String,
    pub ffmpeg: String,
    pub yt_dlp: String,
}

impl Default for ExternalTools {
    fn default() -> Self {
        Self {
            ffprobe: "ffprobe".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            yt_dlp: "yt-dlp".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_tools_default_to_bare_names() {
        let tools = ExternalTools::default();
        assert_eq!(tools.ffmpeg, "ffmpeg");
        assert_eq!(tools.ffprobe, "ffprobe");
        assert_eq!(tools.yt_dlp, "yt-dlp");
    }
}
