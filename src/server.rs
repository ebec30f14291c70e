//! Router assembly and the chat page controller.
//!
//! The controller side of the application: session bootstrap on the chat
//! page, message submission, the SSE reveal endpoint, conversation listing
//! and switching, endpoint selection, and the terms gate. The proxy routes
//! live in [`crate::proxy`]; this module wires everything into one router
//! and runs the server.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;

use crate::backend::BackendClient;
use crate::config::AppConfig;
use crate::store::{ClientState, CookieStateStore};
use crate::{AppState, markdown, proxy, ui};

/// How long a stashed response waits for its reveal stream.
const STREAM_TTL: Duration = Duration::from_secs(10 * 60);

/// Finished responses waiting to be revealed over SSE.
///
/// A submission stashes the backend's full response here and hands the page
/// a stream URL; the SSE handler reads the text back out. Reads clone, so a
/// reconnect restarts the same reveal. Entries age out after [`STREAM_TTL`].
#[derive(Debug, Clone, Default)]
pub struct PendingStreams {
    inner: Arc<RwLock<HashMap<String, PendingResponse>>>,
}

#[derive(Debug, Clone)]
struct PendingResponse {
    text: String,
    created_at: DateTime<Utc>,
}

impl PendingStreams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stash a finished response and return its stream id.
    #[must_use]
    pub fn insert(&self, text: String) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let mut guard = self.inner.write().unwrap();
        guard.insert(
            id.clone(),
            PendingResponse {
                text,
                created_at: Utc::now(),
            },
        );
        id
    }

    /// Read a stashed response. The entry stays until it expires.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<String> {
        let guard = self.inner.read().unwrap();
        guard.get(id).map(|p| p.text.clone())
    }

    /// Drop entries older than `ttl`. Returns the number removed.
    pub fn cleanup_expired(&self, ttl: Duration) -> usize {
        let mut guard = self.inner.write().unwrap();
        let before = guard.len();
        guard.retain(|_, pending| {
            (Utc::now() - pending.created_at)
                .to_std()
                .is_ok_and(|age| age < ttl)
        });
        before - guard.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the application state for the given configuration.
#[must_use]
pub fn build_state(config: Arc<AppConfig>) -> AppState {
    let http = reqwest::Client::new();
    let backend = Arc::new(BackendClient::new(http.clone(), config.backend.clone()));
    AppState {
        backend,
        streams: PendingStreams::new(),
        http,
        config,
    }
}

/// Build the full router over `state`.
pub fn app(state: AppState) -> Router {
    let timeout_duration = Duration::from_secs(30);

    Router::new()
        // HTML pages
        .route("/", get(chat_page))
        .route("/landing", get(landing_page))
        .route("/landing/accept", post(accept_terms))
        .route("/about", get(about_page))
        // Chat controller
        .route("/chat/send", post(chat_send))
        .route("/chat/stream", get(chat_stream))
        .route("/session/new", post(new_session))
        .route("/api/conversations", get(list_conversations))
        .route("/api/sessions/{id}/messages", get(get_session_messages))
        .route("/api/endpoint", post(select_endpoint))
        // Proxy routes and dev mocks
        .route("/api/chat", post(proxy::chat_proxy))
        .route("/api/feedback", post(proxy::feedback_proxy))
        .route(
            "/api/get_session",
            get(proxy::get_session_mock).post(proxy::get_session_mock),
        )
        .route(
            "/user",
            get(proxy::user_mock).post(proxy::user_update_mock),
        )
        .route("/api/upload", post(proxy::upload_proxy))
        // Static assets
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB limit
        .layer(axum::middleware::from_fn(
            move |req: Request, next: axum::middleware::Next| async move {
                match tokio::time::timeout(timeout_duration, next.run(req)).await {
                    Ok(res) => res,
                    Err(_) => (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response(),
                }
            },
        ))
        .with_state(state)
}

/// Start the server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = build_state(Arc::clone(&config));

    // Age out stashed responses that never got streamed.
    let streams = state.streams.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            let removed = streams.cleanup_expired(STREAM_TTL);
            if removed > 0 {
                tracing::debug!(removed, "expired pending streams cleaned up");
            }
        }
    });

    let app = app(state);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// HTML Page Handlers
// ─────────────────────────────────────────────────────────────────────────────

fn client_state(state: &AppState, jar: CookieJar) -> ClientState<CookieStateStore> {
    ClientState::new(
        CookieStateStore::new(jar),
        state.config.backend.default_chat_endpoint(),
    )
}

/// GET / - chat page with session bootstrap.
///
/// Reuses the cookie-held session when present, otherwise creates one
/// through the backend. A bootstrap failure renders the retry state and
/// leaves any previously stored cookie alone.
async fn chat_page(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut client = client_state(&state, jar);

    if !client.terms_accepted() {
        return Redirect::to("/landing").into_response();
    }

    let session_id = match client.session_id() {
        Some(id) => {
            tracing::debug!(session_id = %id, "reusing stored session");
            Some(id)
        }
        None => {
            let created = state.backend.new_session().await;
            if let Some(id) = &created {
                client.store_created_session(id);
            }
            created
        }
    };

    let endpoint = client.endpoint();
    let jar = client.into_store().into_jar();

    match session_id {
        Some(id) => {
            let models = state.config.backend.chat_models();
            let ctx = ui::ChatPageContext {
                session_id: &id,
                endpoint: &endpoint,
                models: &models,
                dictation_ws_url: &state.config.backend.dictation_ws_url,
                dev_mode: state.config.ui.dev_mode,
            };
            (jar, Html(ui::html_shell("Chat", &ui::chat_content(&ctx)))).into_response()
        }
        None => (
            jar,
            Html(ui::html_shell("Chat", ui::session_error_content())),
        )
            .into_response(),
    }
}

/// GET /landing - terms page.
async fn landing_page() -> Html<String> {
    Html(ui::html_shell("Welcome", ui::landing_content()))
}

/// POST /landing/accept - record terms acceptance and enter the chat.
async fn accept_terms(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut client = client_state(&state, jar);
    client.accept_terms();
    let jar = client.into_store().into_jar();
    (jar, Redirect::to("/")).into_response()
}

/// GET /about - static about page.
async fn about_page() -> Html<String> {
    Html(ui::html_shell("About", ui::about_content()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat Controller
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for a chat submission.
#[derive(Debug, Deserialize)]
struct SendRequest {
    /// User message content.
    message: String,
    /// Agent mode toggle.
    #[serde(default)]
    thinking: bool,
    /// Search mode selector, passed through to the backend.
    #[serde(default)]
    search_mode: String,
}

/// Response from a chat submission.
#[derive(Debug, Serialize)]
struct SendResponse {
    /// Session ID for this conversation.
    session_id: String,
    /// URL for the SSE reveal stream.
    stream_url: String,
}

/// POST /chat/send - submit a message and get a reveal stream URL.
async fn chat_send(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SendRequest>,
) -> Response {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Message cannot be empty" })),
        )
            .into_response();
    }

    let client = client_state(&state, jar);
    let Some(session_id) = client.session_id().filter(|id| !id.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "We couldn't find an active chat session. Please try again."
            })),
        )
            .into_response();
    };

    let endpoint = client.endpoint();
    let mode = if req.thinking { "agent" } else { "" };
    let payload = json!({
        "messages": [{ "role": "user", "content": req.message }],
        "chatHistoryId": session_id,
        "mode": mode,
        "searchMode": req.search_mode,
    });

    tracing::info!(
        session_id = %session_id,
        endpoint = %endpoint,
        message_length = req.message.len(),
        "submitting chat message"
    );

    match state.backend.send_chat(&endpoint, &payload).await {
        Ok(text) => {
            let stream_id = state.streams.insert(text);
            let stream_url = format!("/chat/stream?id={stream_id}");
            tracing::info!(
                session_id = %session_id,
                stream_url = %stream_url,
                "chat response stashed for reveal"
            );
            Json(SendResponse {
                session_id,
                stream_url,
            })
            .into_response()
        }
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "chat submission failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": format!("Error: {e}") })),
            )
                .into_response()
        }
    }
}

/// Query parameters for the reveal stream.
#[derive(Debug, Deserialize)]
struct StreamQuery {
    /// Stream id returned by the submit endpoint.
    id: String,
}

/// GET /chat/stream - SSE reveal of a stashed response.
async fn chat_stream(
    State(state): State<AppState>,
    Query(query): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let text = state.streams.get(&query.id);
    let delay = state.config.ui.chunk_delay();

    if text.is_none() {
        tracing::error!(stream_id = %query.id, "unknown or expired stream id");
    }

    let sse_stream = async_stream::stream! {
        match text {
            Some(text) => {
                let reveal = markdown::reveal(&text, delay);
                futures::pin_mut!(reveal);
                while let Some(chunk) = reveal.next().await {
                    yield Ok::<Event, Infallible>(Event::default().event("message").data(chunk));
                }
            }
            None => {
                yield Ok::<Event, Infallible>(Event::default().event("error").data("Stream not found"));
            }
        }
        yield Ok::<Event, Infallible>(Event::default().event("done").data(""));
    };

    Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// POST /session/new - create a fresh backend session.
///
/// On failure the previously stored session cookie stays untouched.
async fn new_session(State(state): State<AppState>, jar: CookieJar) -> Response {
    let mut client = client_state(&state, jar);

    match state.backend.new_session().await {
        Some(id) => {
            client.store_created_session(&id);
            let jar = client.into_store().into_jar();
            (jar, Json(json!({ "session_id": id }))).into_response()
        }
        None => (
            StatusCode::BAD_GATEWAY,
            Json(json!({
                "error": "We couldn't start a chat session. Please try again."
            })),
        )
            .into_response(),
    }
}

/// GET /api/conversations - list conversations.
async fn list_conversations(State(state): State<AppState>) -> Json<Vec<crate::backend::Convo>> {
    Json(state.backend.conversations().await)
}

/// Message DTO for API responses; `html` is the rendered markdown.
#[derive(Debug, Serialize)]
struct MessageDto {
    role: crate::backend::MessageRole,
    content: String,
    html: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

/// GET /api/sessions/:id/messages - normalized messages of one session.
async fn get_session_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<Vec<MessageDto>> {
    let messages = state
        .backend
        .session_messages(&id)
        .await
        .into_iter()
        .map(|m| MessageDto {
            role: m.role,
            html: markdown::parse_markdown(&m.content),
            content: m.content,
            timestamp: m.timestamp,
        })
        .collect();
    Json(messages)
}

/// Request body for endpoint selection.
#[derive(Debug, Deserialize)]
struct EndpointRequest {
    endpoint: String,
}

/// POST /api/endpoint - select a chat endpoint from the model list.
///
/// Unknown URLs are rejected so chat traffic is never forwarded to an
/// arbitrary target.
async fn select_endpoint(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<EndpointRequest>,
) -> Response {
    let known = state
        .config
        .backend
        .chat_models()
        .iter()
        .any(|m| m.endpoint == req.endpoint);
    if !known {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Unknown chat endpoint" })),
        )
            .into_response();
    }

    let mut client = client_state(&state, jar);
    client.set_endpoint(&req.endpoint);
    let jar = client.into_store().into_jar();

    tracing::info!(endpoint = %req.endpoint, "chat endpoint selected");
    (jar, Json(json!({ "success": true }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_streams_round_trip() {
        let streams = PendingStreams::new();
        assert!(streams.is_empty());

        let id = streams.insert("Hello world.".to_string());
        assert_eq!(streams.len(), 1);
        assert_eq!(streams.get(&id).as_deref(), Some("Hello world."));

        // Reads do not consume: a reconnecting client restarts the reveal.
        assert_eq!(streams.get(&id).as_deref(), Some("Hello world."));
        assert!(streams.get("missing").is_none());
    }

    #[test]
    fn test_pending_streams_cleanup() {
        let streams = PendingStreams::new();
        let _ = streams.insert("stale".to_string());

        assert_eq!(streams.cleanup_expired(Duration::from_secs(3600)), 0);
        assert_eq!(streams.cleanup_expired(Duration::ZERO), 1);
        assert!(streams.is_empty());
    }
}
