//! HTTP front for the answer pipeline.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/ask` | Long-form answer only: `{question}` → `{text}` |
//! | `POST` | `/api/voice-script` | `{question}` → `{voiceText, fullText}` |
//! | `POST` | `/api/answer` | `{question}` → `{voiceText, fullText, audioBase64}` |
//! | `POST` | `/webhook` | LINE messaging webhook (audio replies) |
//! | `GET`  | `/media/{file}` | Synthesized mp3 files for webhook replies |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "question is required" }
//! ```
//!
//! A missing/empty question is a 400 with the literal message above. Every
//! other pipeline failure is a 500 carrying one generic apology — the
//! underlying collaborator error is logged, never leaked.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted: the chat widget is
//! served from wherever the deployment keeps its static assets.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

use crate::config::Config;
use crate::error::PipelineError;
use crate::pipeline::AnswerPipeline;

const LINE_REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";

/// What the caller sees when the pipeline fails for any non-validation
/// reason.
const UNAVAILABLE_MESSAGE: &str =
    "申し訳ありません。ただいま回答をお返しできません。少し時間をおいてお試しください。";

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<AnswerPipeline>,
    line: Option<Arc<LineCredentials>>,
}

/// LINE credentials, read from the environment once at startup.
struct LineCredentials {
    channel_access_token: String,
    channel_secret: Option<String>,
}

impl LineCredentials {
    fn from_env() -> Option<Self> {
        let channel_access_token = std::env::var("LINE_CHANNEL_ACCESS_TOKEN").ok()?;
        Some(Self {
            channel_access_token,
            channel_secret: std::env::var("LINE_CHANNEL_SECRET").ok(),
        })
    }
}

/// Start the HTTP server with the real hosted collaborators.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let config = Arc::new(config.clone());
    let pipeline = Arc::new(AnswerPipeline::new(Arc::clone(&config))?);
    run_server_with_pipeline(config, pipeline).await
}

/// Start the HTTP server around a caller-supplied pipeline.
pub async fn run_server_with_pipeline(
    config: Arc<Config>,
    pipeline: Arc<AnswerPipeline>,
) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.server.media_dir)?;

    let line = LineCredentials::from_env().map(Arc::new);
    if line.is_none() {
        tracing::warn!("LINE_CHANNEL_ACCESS_TOKEN not set; webhook replies are disabled");
    }

    let bind_addr = config.server.bind.clone();
    let state = AppState {
        config,
        pipeline,
        line,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/api/ask", post(handle_ask))
        .route("/api/voice-script", post(handle_voice_script))
        .route("/api/answer", post(handle_answer))
        .route("/webhook", post(handle_webhook))
        .route("/media/{file}", get(handle_media))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(state);

    tracing::info!("server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

/// Flat error body per the published UI contract: `{"error": "..."}`.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        message: message.into(),
    }
}

/// Validation failures carry their own message; anything else becomes the
/// generic apology, with the real error kept in the server log.
fn map_pipeline_error(err: PipelineError) -> AppError {
    match err {
        PipelineError::Validation(message) => AppError {
            status: StatusCode::BAD_REQUEST,
            message,
        },
        other => {
            tracing::error!(error = %other, "pipeline failure");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: UNAVAILABLE_MESSAGE.to_string(),
            }
        }
    }
}

// ============ Request / response shapes ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    text: String,
}

#[derive(Serialize)]
struct VoiceScriptResponse {
    #[serde(rename = "voiceText")]
    voice_text: String,
    #[serde(rename = "fullText")]
    full_text: String,
}

#[derive(Serialize)]
struct AnswerResponse {
    #[serde(rename = "voiceText")]
    voice_text: String,
    #[serde(rename = "fullText")]
    full_text: String,
    #[serde(rename = "audioBase64")]
    audio_base64: String,
}

// ============ POST /api/ask ============

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let text = state
        .pipeline
        .full_answer(&req.question)
        .await
        .map_err(map_pipeline_error)?;

    Ok(Json(AskResponse { text }))
}

// ============ POST /api/voice-script ============

async fn handle_voice_script(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<VoiceScriptResponse>, AppError> {
    let (full_text, voice_text) = state
        .pipeline
        .voice_script(&req.question)
        .await
        .map_err(map_pipeline_error)?;

    Ok(Json(VoiceScriptResponse {
        voice_text,
        full_text,
    }))
}

// ============ POST /api/answer ============

async fn handle_answer(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let answer = state
        .pipeline
        .answer(&req.question)
        .await
        .map_err(map_pipeline_error)?;

    Ok(Json(AnswerResponse {
        voice_text: answer.voice_text,
        full_text: answer.full_text,
        audio_base64: BASE64.encode(&answer.audio),
    }))
}

// ============ POST /webhook ============

/// LINE webhook. Signature is verified when a channel secret is configured;
/// per-event failures are logged and the endpoint still answers 200 so the
/// platform does not retry a poison event forever.
async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if let Some(secret) = state
        .line
        .as_ref()
        .and_then(|line| line.channel_secret.as_deref())
    {
        let signature = headers
            .get("x-line-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_line_signature(secret, &body, signature) {
            tracing::warn!("webhook signature mismatch");
            return StatusCode::BAD_REQUEST;
        }
    }

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "webhook body is not JSON");
            return StatusCode::OK;
        }
    };

    let events = payload
        .get("events")
        .and_then(|e| e.as_array())
        .cloned()
        .unwrap_or_default();

    for event in &events {
        if event.get("type").and_then(|t| t.as_str()) != Some("message") {
            continue;
        }
        let message = &event["message"];
        if message.get("type").and_then(|t| t.as_str()) != Some("text") {
            continue;
        }
        let (Some(text), Some(reply_token)) = (
            message.get("text").and_then(|t| t.as_str()),
            event.get("replyToken").and_then(|t| t.as_str()),
        ) else {
            continue;
        };

        if let Err(e) = reply_with_audio(&state, reply_token, text).await {
            tracing::error!(error = %e, "webhook event failed");
        }
    }

    StatusCode::OK
}

async fn reply_with_audio(state: &AppState, reply_token: &str, text: &str) -> anyhow::Result<()> {
    let line = state
        .line
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("LINE_CHANNEL_ACCESS_TOKEN not set"))?;
    let base_url = state
        .config
        .server
        .public_base_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("server.public_base_url not configured"))?;

    let answer = state.pipeline.answer(text).await?;

    let filename = format!("voice_{}.mp3", Uuid::new_v4());
    let path = state.config.server.media_dir.join(&filename);
    tokio::fs::write(&path, &answer.audio).await?;

    let client = reqwest::Client::new();
    let response = client
        .post(LINE_REPLY_URL)
        .header(
            "Authorization",
            format!("Bearer {}", line.channel_access_token),
        )
        .json(&serde_json::json!({
            "replyToken": reply_token,
            "messages": [{
                "type": "audio",
                "originalContentUrl": format!("{}/media/{}", base_url.trim_end_matches('/'), filename),
                "duration": state.config.server.audio_duration_ms,
            }],
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body_text = response.text().await.unwrap_or_default();
        anyhow::bail!("LINE reply failed {}: {}", status, body_text);
    }

    Ok(())
}

type HmacSha256 = Hmac<Sha256>;

/// LINE signs the raw request body with HMAC-SHA256 over the channel secret
/// and sends the base64 digest in `x-line-signature`.
fn verify_line_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(body);
    let expected = BASE64.encode(mac.finalize().into_bytes());
    expected == signature
}

// ============ GET /media/{file} ============

async fn handle_media(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> Result<Response, AppError> {
    if !is_safe_media_name(&file) {
        return Err(not_found("no such media file"));
    }

    let path = state.config.server.media_dir.join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok((
            [
                (header::CONTENT_TYPE, "audio/mpeg"),
                (header::CACHE_CONTROL, "no-store"),
            ],
            bytes,
        )
            .into_response()),
        Err(_) => Err(not_found("no such media file")),
    }
}

/// Media files are flat UUID names generated by the webhook handler; anything
/// with path structure is rejected outright.
fn is_safe_media_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && !name.contains("..")
        && name.ends_with(".mp3")
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let secret = "channel-secret";
        let body = br#"{"events":[]}"#;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        assert!(verify_line_signature(secret, body, &signature));
    }

    #[test]
    fn test_signature_rejects_tampered_body() {
        let secret = "channel-secret";
        let body = br#"{"events":[]}"#;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        let signature = BASE64.encode(mac.finalize().into_bytes());

        assert!(!verify_line_signature(secret, br#"{"events":[{}]}"#, &signature));
        assert!(!verify_line_signature("other-secret", body, &signature));
        assert!(!verify_line_signature(secret, body, ""));
    }

    #[test]
    fn test_media_name_validation() {
        assert!(is_safe_media_name(
            "voice_83a3f4ce-97ef-43a5-b19c-1c56ba8f0e0f.mp3"
        ));
        assert!(!is_safe_media_name(""));
        assert!(!is_safe_media_name("../../etc/passwd"));
        assert!(!is_safe_media_name("dir/file.mp3"));
        assert!(!is_safe_media_name("voice.wav"));
        assert!(!is_safe_media_name("..mp3"));
    }
}
