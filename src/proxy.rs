//! Reverse-proxy routes and development mocks.
//!
//! Browser `fetch` cannot reach the internal backend directly, so the chat
//! and feedback submissions pass through these handlers. Both follow the
//! same shape: parse the body, validate, forward, map the backend response,
//! map exceptions — terminal at the first failure. The exact status codes
//! and body prefixes are load-bearing; the page matches on them.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::{Value, json};

use crate::AppState;

/// Maximum accepted upload size in bytes (8MB, under the router body limit).
const MAX_FILE_SIZE: usize = 8 * 1024 * 1024;

fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

fn status_reason(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}

/// POST /api/chat - forward a chat body to the internal backend.
///
/// Success returns the backend's raw text body. A non-2xx backend status is
/// passed through with a `Backend error: <statusText>` body; parse and
/// transport failures become 500 with an `Error: <message>` body.
pub async fn chat_proxy(State(state): State<AppState>, body: String) -> Response {
    let payload: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "chat proxy received invalid JSON");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response();
        }
    };

    let url = state.config.backend.chat_url();
    tracing::info!(url = %url, "proxying chat request to backend");

    let backend_response = match state.http.post(&url).json(&payload).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "chat proxy transport failure");
            return (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response();
        }
    };

    let status = backend_response.status();
    if !status.is_success() {
        tracing::error!(status = %status, "backend chat error");
        return (status, format!("Backend error: {}", status_reason(status))).into_response();
    }

    match backend_response.text().await {
        Ok(text) => text.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to read backend chat body");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}")).into_response()
        }
    }
}

/// Truthiness of a feedback field, matching loose client-side checks: the
/// field counts as missing when absent, null, empty, `false`, or `0`.
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(_) => true,
    }
}

/// POST /api/feedback - validate and forward a feedback body.
pub async fn feedback_proxy(State(state): State<AppState>, body: String) -> Response {
    let payload: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => return json_error(StatusCode::BAD_REQUEST, "Invalid request body"),
    };

    let missing = !is_present(payload.get("userInput"))
        || !is_present(payload.get("botAnswer"))
        || !is_present(payload.get("feedbackReason"))
        || matches!(payload.get("chatHistoryId"), None | Some(Value::Null));
    if missing {
        return json_error(StatusCode::BAD_REQUEST, "Missing required fields");
    }

    let history_ok = matches!(
        payload.get("chatHistoryId"),
        Some(Value::String(s)) if !s.trim().is_empty()
    );
    if !history_ok {
        return json_error(StatusCode::BAD_REQUEST, "Invalid chat history ID");
    }

    let url = state.config.backend.feedback_target();
    tracing::info!(url = %url, "proxying feedback to backend");

    let backend_response = match state.http.post(&url).json(&payload).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "feedback proxy transport failure");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
                .into_response();
        }
    };

    let status = backend_response.status();
    if !status.is_success() {
        tracing::error!(status = %status, "backend feedback error");
        return (
            status,
            format!("Error from backend: {}", status_reason(status)),
        )
            .into_response();
    }

    (StatusCode::OK, Json(json!({ "success": true }))).into_response()
}

/// GET|POST /api/get_session - development mock of the session endpoint.
pub async fn get_session_mock() -> Json<Value> {
    Json(json!({
        "session_id": format!("dev-session-{}", Utc::now().timestamp_millis()),
        "user": {
            "eppn": "dev-user@example.edu",
            "displayName": "Development User",
        },
        "csrf_token": "dev-csrf-token",
    }))
}

fn mock_user(profile: Option<String>) -> Value {
    json!({
        "eppn": "dev-user@example.edu",
        "displayName": "Development User",
        "username": "dev-user",
        "name": "Development User",
        "profile": profile.unwrap_or_else(|| "Development user profile for testing".to_string()),
    })
}

/// GET /user - development mock user record.
pub async fn user_mock() -> Json<Value> {
    Json(mock_user(None))
}

/// POST /user - development mock profile update.
pub async fn user_update_mock(body: String) -> Json<Value> {
    let profile = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("profile").and_then(Value::as_str).map(String::from));
    Json(mock_user(profile))
}

/// POST /api/upload - forward one multipart file to the backend.
pub async fn upload_proxy(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "invalid multipart upload body");
                return json_error(StatusCode::BAD_REQUEST, "Invalid upload body");
            }
        };

        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map_or_else(
            || {
                mime_guess::from_path(&filename)
                    .first_or_octet_stream()
                    .to_string()
            },
            ToString::to_string,
        );

        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(error = %e, "failed to read upload field");
                return json_error(StatusCode::BAD_REQUEST, "Invalid upload body");
            }
        };
        if data.len() > MAX_FILE_SIZE {
            return json_error(StatusCode::PAYLOAD_TOO_LARGE, "File too large");
        }

        let part = match reqwest::multipart::Part::bytes(data.to_vec())
            .file_name(filename.clone())
            .mime_str(&content_type)
        {
            Ok(part) => part,
            Err(e) => {
                tracing::error!(error = %e, content_type = %content_type, "bad upload mime type");
                return json_error(StatusCode::BAD_REQUEST, "Invalid upload content type");
            }
        };
        let form = reqwest::multipart::Form::new().part("file", part);

        let url = state.config.backend.upload_url();
        tracing::info!(url = %url, filename = %filename, size = data.len(), "forwarding upload");

        let backend_response = match state.http.post(&url).multipart(form).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "upload forwarding transport failure");
                return json_error(StatusCode::INTERNAL_SERVER_ERROR, "Upload failed");
            }
        };

        let status = backend_response.status();
        let body = backend_response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::error!(status = %status, "backend upload error");
            return (status, body).into_response();
        }
        return (StatusCode::OK, body).into_response();
    }

    json_error(StatusCode::BAD_REQUEST, "Missing file field")
}
