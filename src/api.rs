//! Thin client for the render backend.
//!
//! Four calls are made against the configured API root; the fifth endpoint
//! (`/api/video/{job_id}`) is only ever handed to the browser as a URL.

use serde::{Deserialize, Serialize};
use std::fmt;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{File, FormData, Headers, Request, RequestInit, Response, Window};

use crate::error::{ClientError, Result};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Cinematic,
    Futuristic,
    Anime,
    Pixar,
}

impl Style {
    pub const ALL: [Style; 4] = [Style::Cinematic, Style::Futuristic, Style::Anime, Style::Pixar];

    pub fn as_str(self) -> &'static str {
        match self {
            Style::Cinematic => "cinematic",
            Style::Futuristic => "futuristic",
            Style::Anime => "anime",
            Style::Pixar => "pixar",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Style::Cinematic => "🎬 Cinematic",
            Style::Futuristic => "🚀 Futuristic",
            Style::Anime => "🎌 Anime",
            Style::Pixar => "🎨 Pixar",
        }
    }

    pub fn parse(value: &str) -> Option<Style> {
        Style::ALL.into_iter().find(|style| style.as_str() == value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub narration: String,
    pub image_prompt: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    #[default]
    Idle,
    Queued,
    Building,
    Done,
    Error,
    #[serde(other)]
    Unknown,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Idle => "idle",
            JobState::Queued => "queued",
            JobState::Building => "building",
            JobState::Done => "done",
            JobState::Error => "error",
            JobState::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    #[serde(default)]
    pub status: JobState,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl JobStatus {
    pub fn progress_percent(&self) -> u8 {
        if self.progress.is_finite() {
            self.progress.clamp(0.0, 100.0).round() as u8
        } else {
            0
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    title: &'a str,
    style: Style,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    scenes: Vec<Scene>,
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_id: UploadId,
}

#[derive(Deserialize)]
struct BuildResponse {
    #[serde(default)]
    job_id: Option<JobId>,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

pub fn parse_scenes(body: &str) -> Result<Vec<Scene>> {
    Ok(serde_json::from_str::<GenerateResponse>(body)?.scenes)
}

pub fn parse_upload_id(body: &str) -> Result<UploadId> {
    Ok(serde_json::from_str::<UploadResponse>(body)?.upload_id)
}

pub fn parse_job_id(body: &str) -> Result<Option<JobId>> {
    let job_id = serde_json::from_str::<BuildResponse>(body)?.job_id;
    Ok(job_id.filter(|id| !id.0.is_empty()))
}

pub fn parse_status(body: &str) -> Result<JobStatus> {
    Ok(serde_json::from_str(body)?)
}

/// Pulls a readable message out of an error response body.
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(text),
        }) => text,
        Ok(ErrorBody { detail }) => detail.to_string(),
        Err(_) if body.trim().is_empty() => "(empty response)".to_string(),
        Err(_) => body.trim().to_string(),
    }
}

pub fn video_url(api_root: &str, job_id: &JobId) -> String {
    format!("{}/api/video/{}", api_root, job_id)
}

/// Link offered for sharing; relative to the page origin so it survives a
/// reverse proxy in front of the API.
pub fn share_url(origin: &str, job_id: &JobId) -> String {
    format!("{}/api/video/{}", origin.trim_end_matches('/'), job_id)
}

#[derive(Clone, Debug)]
pub struct ApiClient {
    api_root: String,
}

impl ApiClient {
    pub fn new(api_root: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
        }
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    pub fn status_url(&self, job_id: &JobId) -> String {
        self.endpoint(&format!("/api/status/{}", job_id))
    }

    pub fn video_url(&self, job_id: &JobId) -> String {
        video_url(&self.api_root, job_id)
    }

    pub async fn generate(&self, title: &str, style: Style) -> Result<Vec<Scene>> {
        let body = serde_json::to_string(&GenerateRequest { title, style })?;

        let headers = Headers::new().map_err(|err| ClientError::from_js(&err))?;
        headers
            .set("Content-Type", "application/json")
            .map_err(|err| ClientError::from_js(&err))?;

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_headers(&headers);
        init.set_body(&JsValue::from_str(&body));

        let text = self.send(&self.endpoint("/api/generate"), &init).await?;
        parse_scenes(&text)
    }

    pub async fn upload(&self, files: &[File]) -> Result<UploadId> {
        let form = FormData::new().map_err(|err| ClientError::from_js(&err))?;
        for file in files {
            form.append_with_blob_and_filename("files", file, &file.name())
                .map_err(|err| ClientError::from_js(&err))?;
        }

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&form);

        let text = self.send(&self.endpoint("/api/upload"), &init).await?;
        parse_upload_id(&text)
    }

    pub async fn build(
        &self,
        upload_id: &UploadId,
        title: &str,
        style: Style,
    ) -> Result<Option<JobId>> {
        let form = FormData::new().map_err(|err| ClientError::from_js(&err))?;
        for (key, value) in [
            ("upload_id", upload_id.0.as_str()),
            ("title", title),
            ("style", style.as_str()),
        ] {
            form.append_with_str(key, value)
                .map_err(|err| ClientError::from_js(&err))?;
        }

        let init = RequestInit::new();
        init.set_method("POST");
        init.set_body(&form);

        let text = self.send(&self.endpoint("/api/build"), &init).await?;
        parse_job_id(&text)
    }

    pub async fn status(&self, job_id: &JobId) -> Result<JobStatus> {
        let init = RequestInit::new();
        init.set_method("GET");
        let text = self.send(&self.status_url(job_id), &init).await?;
        parse_status(&text)
    }

    async fn send(&self, url: &str, init: &RequestInit) -> Result<String> {
        let window = browser_window()?;
        let request =
            Request::new_with_str_and_init(url, init).map_err(|err| ClientError::from_js(&err))?;

        let resp_value = JsFuture::from(window.fetch_with_request(&request))
            .await
            .map_err(|err| ClientError::from_js(&err))?;
        let resp: Response = resp_value
            .dyn_into()
            .map_err(|_| ClientError::Transport(format!("fetch {} did not yield a Response", url)))?;

        let text_promise = resp.text().map_err(|err| ClientError::from_js(&err))?;
        let text = JsFuture::from(text_promise)
            .await
            .map_err(|err| ClientError::from_js(&err))?
            .as_string()
            .unwrap_or_default();

        if !resp.ok() {
            log::warn!("{} returned HTTP {}", url, resp.status());
            return Err(ClientError::Http {
                status: resp.status(),
                detail: error_detail(&text),
            });
        }

        Ok(text)
    }
}

fn browser_window() -> Result<Window> {
    web_sys::window().ok_or_else(|| ClientError::Dom("missing window".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_request_serializes_style_verbatim() {
        let body = serde_json::to_string(&GenerateRequest {
            title: "Midnight Decisions",
            style: Style::Pixar,
        })
        .unwrap();
        assert_eq!(body, r#"{"title":"Midnight Decisions","style":"pixar"}"#);
    }

    #[test]
    fn scenes_default_to_empty_when_missing() {
        assert!(parse_scenes("{}").unwrap().is_empty());

        let scenes = parse_scenes(
            r#"{"scenes":[{"narration":"A city sleeps.","image_prompt":"neon skyline"},
                          {"narration":"Rain.","image_prompt":"wet asphalt","extra":1}]}"#,
        )
        .unwrap();
        assert_eq!(scenes.len(), 2);
        assert_eq!(scenes[1].image_prompt, "wet asphalt");
    }

    #[test]
    fn build_response_without_job_id_is_none() {
        assert_eq!(parse_job_id(r#"{"status":"queued"}"#).unwrap(), None);
        assert_eq!(parse_job_id(r#"{"job_id":""}"#).unwrap(), None);
        assert_eq!(
            parse_job_id(r#"{"job_id":"j-1"}"#).unwrap(),
            Some(JobId("j-1".to_string()))
        );
    }

    #[test]
    fn upload_response_requires_upload_id() {
        assert_eq!(
            parse_upload_id(r#"{"upload_id":"u-42","files":3}"#).unwrap(),
            UploadId("u-42".to_string())
        );
        assert!(matches!(parse_upload_id("{}"), Err(ClientError::Decode(_))));
    }

    #[test]
    fn status_parses_known_and_unknown_states() {
        let status = parse_status(
            r#"{"status":"building","progress":60,"status_message":"Generating voiceovers..."}"#,
        )
        .unwrap();
        assert_eq!(status.status, JobState::Building);
        assert_eq!(status.progress_percent(), 60);
        assert!(!status.status.is_terminal());

        let status = parse_status(r#"{"status":"rendering"}"#).unwrap();
        assert_eq!(status.status, JobState::Unknown);
        assert_eq!(status.progress_percent(), 0);

        let status = parse_status(r#"{"status":"error","progress":30,"error":"ffmpeg exited 1"}"#)
            .unwrap();
        assert!(status.status.is_terminal());
        assert_eq!(status.error.as_deref(), Some("ffmpeg exited 1"));
    }

    #[test]
    fn progress_is_clamped() {
        let status = JobStatus {
            progress: 140.0,
            ..JobStatus::default()
        };
        assert_eq!(status.progress_percent(), 100);
    }

    #[test]
    fn error_detail_prefers_fastapi_detail() {
        assert_eq!(error_detail(r#"{"detail":"Title is required"}"#), "Title is required");
        assert_eq!(
            error_detail(r#"{"detail":[{"loc":["body"]}]}"#),
            r#"[{"loc":["body"]}]"#
        );
        assert_eq!(error_detail("Internal Server Error"), "Internal Server Error");
        assert_eq!(error_detail(""), "(empty response)");
    }

    #[test]
    fn urls_are_keyed_by_job_id() {
        let client = ApiClient::new("http://localhost:8000");
        let job = JobId("abc123".to_string());
        assert_eq!(client.status_url(&job), "http://localhost:8000/api/status/abc123");
        assert_eq!(client.video_url(&job), "http://localhost:8000/api/video/abc123");
        assert_eq!(
            share_url("https://visionforge.app/", &job),
            "https://visionforge.app/api/video/abc123"
        );
    }

    #[test]
    fn style_round_trips_through_its_value() {
        for style in Style::ALL {
            assert_eq!(Style::parse(style.as_str()), Some(style));
        }
        assert_eq!(Style::parse("noir"), None);
    }
}
