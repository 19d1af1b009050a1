//! Veo video generation on Vertex AI.
//!
//! A render is a long-running operation: `predictLongRunning` returns an
//! operation name, `fetchPredictOperation` is polled until the operation is
//! done, and the finished video is written to the configured Cloud Storage
//! bucket, from where it is downloaded.

use super::auth::{self, TokenSource};
use super::{SceneRenderer, SceneRequest, gemini, storage};
use crate::cast::Cast;
use crate::config::Config;
use crate::error::{GenerationError, Result, mentions_safety_block};
use crate::naming::normalize_suggested_filename;
use crate::reference_image::{REFERENCE_MIME, preprocess_reference_image};
use crate::{logi, logok, logw};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;

pub const ASPECT_RATIO: &str = "16:9";
pub const RESOLUTION: &str = "720p";
pub const PERSON_GENERATION: &str = "allow_adult";
/// Extension requests only accept 7 second clips.
pub const EXTENSION_DURATION_SECONDS: u32 = 7;
pub const NEGATIVE_PROMPT: &str = "montage, split screen, glitch, transition, cuts, internal cuts, \
cross-fades, dissolves, morphing, scene changes, fade to black, oversized ears, giant ears, \
protruding ears, artifacts on frame edge, border, warping, low fidelity, blurry, text, watermark, \
animation, cartoon, drawing, illustration, anime";

const NO_CONTENT_MESSAGE: &str =
    "Video generation completed but returned no content (likely blocked).";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictRequest<'a> {
    pub instances: Vec<Instance<'a>>,
    pub parameters: Parameters<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Instance<'a> {
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineMedia>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<InlineMedia>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineMedia {
    pub bytes_base64_encoded: String,
    pub mime_type: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameters<'a> {
    pub duration_seconds: u32,
    pub aspect_ratio: &'a str,
    pub resolution: &'a str,
    pub generate_audio: bool,
    pub storage_uri: &'a str,
    pub sample_count: u32,
    pub person_generation: &'a str,
    pub negative_prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OperationHandle {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub done: bool,
    pub error: Option<OperationError>,
    pub response: Option<VideoResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OperationError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoResponse {
    #[serde(default)]
    pub videos: Vec<GeneratedVideo>,
    #[serde(default)]
    pub rai_media_filtered_count: u32,
    #[serde(default)]
    pub rai_media_filtered_reasons: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedVideo {
    pub gcs_uri: Option<String>,
    pub bytes_base64_encoded: Option<String>,
    pub mime_type: Option<String>,
}

/// Reads `{"error": {"status": ..., "message": ...}}` bodies returned by Google APIs.
fn google_error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let err = parsed.as_ref().and_then(|root| root.get("error"));
    if let Some(err) = err {
        let message = err.get("message").and_then(|v| v.as_str()).unwrap_or("Unknown");
        return match err.get("status").and_then(|v| v.as_str()) {
            Some(status) => format!("{status}: {message}"),
            None => message.to_string(),
        };
    }
    body.chars().take(500).collect()
}

fn status_error(status: u16, body: &str) -> GenerationError {
    let message = google_error_message(body);
    match status {
        401 => GenerationError::Auth(format!("{message}. {}", auth::permission_hint())),
        403 => GenerationError::PermissionDenied(format!("{message}. {}", auth::permission_hint())),
        _ => GenerationError::Api { status, message },
    }
}

/// Turns a finished operation into the video it produced.
pub fn finished_video(op: Operation) -> Result<GeneratedVideo> {
    if let Some(err) = op.error {
        logw("VIDEO GENERATION FAILED.");
        logw(format!("   Error Code: {}", err.code));
        logw(format!("   Error Message: {}", err.message));
        if mentions_safety_block(&err.message) {
            return Err(GenerationError::Blocked(err.message));
        }
        return Err(GenerationError::Operation {
            code: err.code,
            message: err.message,
        });
    }

    let response = op.response.unwrap_or_default();
    if response.rai_media_filtered_count > 0 {
        let reasons = if response.rai_media_filtered_reasons.is_empty() {
            NO_CONTENT_MESSAGE.to_string()
        } else {
            response.rai_media_filtered_reasons.join("; ")
        };
        return Err(GenerationError::Blocked(reasons));
    }

    match response.videos.into_iter().next() {
        Some(video) => Ok(video),
        None => {
            logw(format!(
                "No video returned for operation {}. The prompt likely triggered a safety filter.",
                op.name
            ));
            Err(GenerationError::Blocked(NO_CONTENT_MESSAGE.to_string()))
        }
    }
}

pub struct VertexClient {
    http: Client,
    cfg: Config,
    tokens: Box<dyn TokenSource>,
    token: RwLock<Option<String>>,
}

impl VertexClient {
    pub fn new(cfg: Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        let tokens = auth::token_source(&cfg);
        Ok(Self::with_token_source(http, cfg, tokens))
    }

    pub fn with_token_source(http: Client, cfg: Config, tokens: Box<dyn TokenSource>) -> Self {
        Self {
            http,
            cfg,
            tokens,
            token: RwLock::new(None),
        }
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        let mut slot = self.token.write().await;
        if let Some(token) = slot.as_ref() {
            return Ok(token.clone());
        }
        let token = self.tokens.fetch().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Replaces a token the API rejected. `None` when the source cannot produce a new one.
    async fn refresh_token(&self, rejected: &str) -> Result<Option<String>> {
        if !self.tokens.refreshable() {
            return Ok(None);
        }
        let mut slot = self.token.write().await;
        if let Some(current) = slot.as_ref().filter(|t| t.as_str() != rejected) {
            return Ok(Some(current.clone()));
        }
        logw("    - Access token was rejected. Requesting a fresh one...");
        let token = self.tokens.fetch().await?;
        *slot = Some(token.clone());
        Ok(Some(token))
    }

    async fn send_post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        token: &str,
    ) -> Result<(StatusCode, String)> {
        let resp = self.http.post(url).bearer_auth(token).json(body).send().await?;
        let status = resp.status();
        let raw = resp.text().await?;
        Ok((status, raw))
    }

    async fn post_text<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<String> {
        let token = self.token().await?;
        let (mut status, mut raw) = self.send_post(url, body, &token).await?;

        if status == StatusCode::UNAUTHORIZED {
            if let Some(fresh) = self.refresh_token(&token).await? {
                (status, raw) = self.send_post(url, body, &fresh).await?;
            }
        }
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &raw));
        }
        Ok(raw)
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let raw = self.post_text(url, body).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Starts the operation, retrying transient failures a bounded number of times.
    pub async fn submit(&self, request: &PredictRequest<'_>) -> Result<String> {
        let url = self.cfg.model_url(&self.cfg.veo_model, "predictLongRunning")?;
        let attempts = self.cfg.timings.submit_attempts.max(1);

        let mut attempt = 1;
        loop {
            match self.post_json::<_, OperationHandle>(&url, request).await {
                Ok(handle) => return Ok(handle.name),
                Err(err) => {
                    logw(format!("API Call Failed (Attempt {attempt}/{attempts}): {err}"));
                    if err.is_fatal() || !err.is_transient() || attempt >= attempts {
                        return Err(err);
                    }
                    logi(format!(
                        "    Connection issue. Retrying in {} seconds...",
                        self.cfg.timings.retry_delay.as_secs()
                    ));
                    tokio::time::sleep(self.cfg.timings.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn fetch_operation(&self, name: &str) -> Result<Operation> {
        let url = self.cfg.model_url(&self.cfg.veo_model, "fetchPredictOperation")?;
        self.post_json(&url, &serde_json::json!({ "operationName": name })).await
    }

    /// Polls until the operation is done. Consecutive poll failures are bounded.
    pub async fn wait_for_operation(&self, name: &str) -> Result<Operation> {
        let timings = &self.cfg.timings;
        let mut failures = 0u32;
        loop {
            tokio::time::sleep(timings.poll_interval).await;
            match self.fetch_operation(name).await {
                Ok(op) if op.done => return Ok(op),
                Ok(_) => {
                    failures = 0;
                    logi("      ...still generating...");
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    failures += 1;
                    logw(format!("      Warning: Connection issue while polling: {err}"));
                    if failures >= timings.max_poll_failures.max(1) {
                        return Err(GenerationError::PollExhausted {
                            attempts: failures,
                            last: err.to_string(),
                        });
                    }
                    logi("      Retrying status check...");
                }
            }
        }
    }

    async fn video_bytes(&self, video: GeneratedVideo) -> Result<Vec<u8>> {
        if let Some(uri) = video.gcs_uri.as_deref() {
            logi(format!("    - Video generated at: {uri}"));
            let token = self.token().await?;
            return storage::download_gcs_object(&self.http, &self.cfg.storage_base, &token, uri)
                .await;
        }
        if let Some(encoded) = video.bytes_base64_encoded.as_deref() {
            return BASE64.decode(encoded).map_err(|e| {
                GenerationError::Storage(format!("inline video is not valid base64: {e}"))
            });
        }
        Err(GenerationError::Storage(
            "video result carried neither a gcsUri nor inline bytes".to_string(),
        ))
    }

    async fn input_video(&self, request: &SceneRequest) -> Result<Option<InlineMedia>> {
        let Some(path) = &request.input_video else {
            return Ok(None);
        };
        if tokio::fs::metadata(path).await.is_err() {
            return Err(GenerationError::FileNotFound(path.clone()));
        }
        logi(format!("    - Reading input video for extension: {}", path.display()));
        let bytes = tokio::fs::read(path).await?;
        Ok(Some(InlineMedia {
            bytes_base64_encoded: BASE64.encode(bytes),
            mime_type: "video/mp4",
        }))
    }
}

#[async_trait]
impl SceneRenderer for VertexClient {
    async fn render(&self, request: &SceneRequest) -> Result<Vec<u8>> {
        self.cfg.validate_for_generation()?;
        let storage_uri = self.cfg.bucket_uri.as_deref().unwrap_or_default();

        let image = match &request.reference_image {
            Some(path) => {
                logok("    - Using reference image (preprocessing to 1080p)...");
                let bytes = preprocess_reference_image(path).await?;
                Some(InlineMedia {
                    bytes_base64_encoded: BASE64.encode(bytes),
                    mime_type: REFERENCE_MIME,
                })
            }
            None => None,
        };

        let video = self.input_video(request).await?;
        let mut duration_seconds = request.duration_seconds;
        if video.is_some() && duration_seconds != EXTENSION_DURATION_SECONDS {
            logi(format!(
                "    Video extension detected. Overriding duration from {}s to {}s.",
                duration_seconds, EXTENSION_DURATION_SECONDS
            ));
            duration_seconds = EXTENSION_DURATION_SECONDS;
        }

        logi("    - Configuring video generation request...");
        logi(format!("      - Duration: {duration_seconds}s"));
        let body = PredictRequest {
            instances: vec![Instance {
                prompt: &request.prompt,
                image,
                video,
            }],
            parameters: Parameters {
                duration_seconds,
                aspect_ratio: ASPECT_RATIO,
                resolution: RESOLUTION,
                generate_audio: false,
                storage_uri,
                sample_count: 1,
                person_generation: PERSON_GENERATION,
                negative_prompt: NEGATIVE_PROMPT,
            },
        };

        logi("    - Sending prompt to the Veo API...");
        let name = self.submit(&body).await?;
        logi("    - Operation started. Waiting for video generation (~60-90 seconds)...");

        let op = self.wait_for_operation(&name).await?;
        logi("    - Video generation call complete.");

        let video = finished_video(op)?;
        self.video_bytes(video).await
    }

    async fn suggest_filename(&self, raw_line: &str, scene_id: u32, cast: &Cast) -> Option<String> {
        tokio::time::sleep(self.cfg.timings.filename_delay).await;
        logi("    - Classifying scene for filename generation...");

        let url = match self.cfg.model_url(&self.cfg.filename_model, "generateContent") {
            Ok(url) => url,
            Err(err) => {
                logw(format!("    - AI filename generation failed: {err}. Falling back to slug."));
                return None;
            }
        };
        let prompt = gemini::filename_prompt(raw_line, scene_id, cast);
        let body = gemini::generate_content_body(&prompt);

        let raw = match self.post_text(&url, &body).await {
            Ok(raw) => raw,
            Err(err) => {
                logw(format!("    - AI filename generation failed: {err}. Falling back to slug."));
                return None;
            }
        };

        let name = gemini::gemini_extract_text(&raw)
            .and_then(|text| normalize_suggested_filename(&text, scene_id));
        match &name {
            Some(name) => logok(format!("    - AI-generated filename: {name}")),
            None => logw("    - AI filename response was unusable. Falling back to slug."),
        }
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_vertex_field_names() {
        let body = PredictRequest {
            instances: vec![Instance {
                prompt: "a lighthouse",
                image: Some(InlineMedia {
                    bytes_base64_encoded: "AAAA".into(),
                    mime_type: REFERENCE_MIME,
                }),
                video: None,
            }],
            parameters: Parameters {
                duration_seconds: 8,
                aspect_ratio: ASPECT_RATIO,
                resolution: RESOLUTION,
                generate_audio: false,
                storage_uri: "gs://bucket/out",
                sample_count: 1,
                person_generation: PERSON_GENERATION,
                negative_prompt: NEGATIVE_PROMPT,
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["instances"][0]["image"]["bytesBase64Encoded"], "AAAA");
        assert_eq!(value["instances"][0]["image"]["mimeType"], "image/jpeg");
        assert!(value["instances"][0].get("video").is_none());
        assert_eq!(value["parameters"]["durationSeconds"], 8);
        assert_eq!(value["parameters"]["generateAudio"], false);
        assert_eq!(value["parameters"]["storageUri"], "gs://bucket/out");
        assert_eq!(value["parameters"]["sampleCount"], 1);
    }

    #[test]
    fn done_operation_without_videos_is_blocked() {
        let op: Operation =
            serde_json::from_str(r#"{"name":"op/1","done":true,"response":{}}"#).unwrap();
        let err = finished_video(op).unwrap_err();
        assert!(matches!(err, GenerationError::Blocked(_)));
    }

    #[test]
    fn filtered_media_is_blocked_with_reasons() {
        let op: Operation = serde_json::from_str(
            r#"{"done":true,"response":{"raiMediaFilteredCount":1,"raiMediaFilteredReasons":["Dangerous content"]}}"#,
        )
        .unwrap();
        match finished_video(op).unwrap_err() {
            GenerationError::Blocked(reason) => assert_eq!(reason, "Dangerous content"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn operation_error_keeps_code_and_message() {
        let op: Operation = serde_json::from_str(
            r#"{"done":true,"error":{"code":13,"message":"internal"}}"#,
        )
        .unwrap();
        match finished_video(op).unwrap_err() {
            GenerationError::Operation { code, message } => {
                assert_eq!(code, 13);
                assert_eq!(message, "internal");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_video_is_returned() {
        let op: Operation = serde_json::from_str(
            r#"{"done":true,"response":{"videos":[{"gcsUri":"gs://b/1.mp4","mimeType":"video/mp4"},{"gcsUri":"gs://b/2.mp4"}]}}"#,
        )
        .unwrap();
        assert_eq!(finished_video(op).unwrap().gcs_uri.as_deref(), Some("gs://b/1.mp4"));
    }

    #[test]
    fn status_errors_map_to_fatal_variants() {
        let body = r#"{"error":{"code":403,"message":"denied","status":"PERMISSION_DENIED"}}"#;
        assert!(matches!(status_error(403, body), GenerationError::PermissionDenied(_)));
        assert!(matches!(status_error(401, body), GenerationError::Auth(_)));
        match status_error(429, r#"{"error":{"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#) {
            GenerationError::Api { status, message } => {
                assert_eq!(status, 429);
                assert_eq!(message, "RESOURCE_EXHAUSTED: quota");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
