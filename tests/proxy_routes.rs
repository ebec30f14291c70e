//! End-to-end tests of the HTTP surface.
//!
//! Each test runs the real router against a mock backend bound to an
//! ephemeral port, so the proxy contract (status codes, body prefixes) is
//! exercised over actual sockets.

use std::sync::Arc;

use axum::{Json, Router, http::StatusCode, routing::get, routing::post};
use axum_test::TestServer;
use cookie::Cookie;
use serde_json::{Value, json};

use chatdku_web::config::{AppConfig, BackendConfig, ServerConfig, UiConfig};
use chatdku_web::server;

/// Bind a mock backend on an ephemeral port and return its base URL.
async fn spawn_backend(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock backend");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve mock");
    });
    format!("http://{addr}")
}

fn test_config(backend_url: &str) -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        backend: BackendConfig {
            internal_url: backend_url.to_string(),
            feedback_url: None,
            api_base_url: backend_url.to_string(),
            dictation_ws_url: "ws://localhost:8007".to_string(),
        },
        ui: UiConfig {
            dev_mode: false,
            chunk_delay_ms: 1,
        },
    }
}

async fn test_server(backend_url: &str) -> TestServer {
    let state = server::build_state(Arc::new(test_config(backend_url)));
    TestServer::new(server::app(state)).expect("test server")
}

fn session_cookie(id: &str) -> Cookie<'static> {
    let mut cookie = Cookie::new("chatdku_session_id", id.to_string());
    cookie.set_path("/");
    cookie
}

/// Backend that answers every relevant route successfully.
fn happy_backend() -> Router {
    Router::new()
        .route("/chat", post(|| async { "Hi" }))
        .route("/feedback", post(|| async { Json(json!({"status": "ok"})) }))
        .route(
            "/api/get_session",
            get(|| async { Json(json!({"session_id": "mock-session-1"})) }),
        )
        .route(
            "/api/chat",
            post(|| async { "Hello **world**.\n\nSecond paragraph." }),
        )
        .route(
            "/api/c/",
            get(|| async {
                Json(json!([
                    {"id": "c1", "created_at": "2024-01-02T03:04:05Z"},
                    {"id": "c2", "title": "Course planning", "created_at": "2024-01-03T00:00:00Z"},
                ]))
            }),
        )
        .route(
            "/api/c/{id}/messages",
            get(|| async {
                Json(json!([
                    {"role": "Bot", "content": [{"text": "a"}, {"text": "b"}]},
                    {"role": "User", "message": "hi there", "timestamp": "2024-01-02T03:04:06Z"},
                ]))
            }),
        )
}

/// Backend that fails every route with 503.
fn failing_backend() -> Router {
    async fn unavailable() -> (StatusCode, &'static str) {
        (StatusCode::SERVICE_UNAVAILABLE, "down")
    }
    Router::new()
        .route("/chat", post(unavailable))
        .route("/feedback", post(unavailable))
        .route("/api/get_session", get(unavailable))
        .route("/api/c/", get(unavailable))
        .route("/api/c/{id}/messages", get(unavailable))
}

// ─────────────────────────────────────────────────────────────────────────────
// /api/chat proxy
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_proxy_forwards_body() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .post("/api/chat")
        .json(&json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "chatHistoryId": "s1",
        }))
        .await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.text(), "Hi");
}

#[tokio::test]
async fn test_chat_proxy_malformed_json_is_500() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/api/chat").text("{not json").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().starts_with("Error: "));
}

#[tokio::test]
async fn test_chat_proxy_propagates_backend_status() {
    let backend = spawn_backend(failing_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/api/chat").json(&json!({"messages": []})).await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), "Backend error: Service Unavailable");
}

#[tokio::test]
async fn test_chat_proxy_unreachable_backend_is_500() {
    // Nothing listens on this port.
    let server = test_server("http://127.0.0.1:1").await;

    let response = server.post("/api/chat").json(&json!({"messages": []})).await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().starts_with("Error: "));
}

// ─────────────────────────────────────────────────────────────────────────────
// /api/feedback proxy
// ─────────────────────────────────────────────────────────────────────────────

fn valid_feedback() -> Value {
    json!({
        "userInput": "What are the library hours?",
        "botAnswer": "The library is open 8am-10pm.",
        "feedbackReason": "helpful",
        "chatHistoryId": "s1",
    })
}

#[tokio::test]
async fn test_feedback_success() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/api/feedback").json(&valid_feedback()).await;

    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"success": true}));
}

#[tokio::test]
async fn test_feedback_invalid_body_is_400() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/api/feedback").text("###").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Invalid request body"));
}

#[tokio::test]
async fn test_feedback_missing_fields_is_400() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    for field in ["userInput", "botAnswer", "feedbackReason"] {
        let mut payload = valid_feedback();
        payload.as_object_mut().unwrap().remove(field);

        let response = server.post("/api/feedback").json(&payload).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(
            response.text().contains("Missing required fields"),
            "missing {field} should be rejected"
        );
    }

    // Null chatHistoryId counts as missing, not invalid.
    let mut payload = valid_feedback();
    payload["chatHistoryId"] = Value::Null;
    let response = server.post("/api/feedback").json(&payload).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Missing required fields"));
}

#[tokio::test]
async fn test_feedback_empty_history_id_is_invalid() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let mut payload = valid_feedback();
    payload["chatHistoryId"] = json!("");

    let response = server.post("/api/feedback").json(&payload).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Invalid chat history ID"));
}

#[tokio::test]
async fn test_feedback_propagates_backend_status() {
    let backend = spawn_backend(failing_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/api/feedback").json(&valid_feedback()).await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.text(), "Error from backend: Service Unavailable");
}

// ─────────────────────────────────────────────────────────────────────────────
// Dev mocks
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_session_mock() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/api/get_session").await;
    response.assert_status(StatusCode::OK);

    let body = response.json::<Value>();
    let session_id = body["session_id"].as_str().expect("session_id present");
    assert!(session_id.starts_with("dev-session-"));
    assert_eq!(body["csrf_token"], "dev-csrf-token");
}

#[tokio::test]
async fn test_user_mock_round_trip() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/user").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["username"], "dev-user");

    let updated = server
        .post("/user")
        .json(&json!({"profile": "new profile"}))
        .await;
    assert_eq!(updated.json::<Value>()["profile"], "new profile");
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend client surface
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_conversations_default_missing_titles() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/api/conversations").await;
    response.assert_status(StatusCode::OK);

    let convos = response.json::<Value>();
    assert_eq!(convos[0]["title"], "New Chat");
    assert_eq!(convos[1]["title"], "Course planning");
}

#[tokio::test]
async fn test_conversations_failure_yields_empty_list() {
    let backend = spawn_backend(failing_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/api/conversations").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!([]));
}

#[tokio::test]
async fn test_session_messages_are_normalized() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/api/sessions/s1/messages").await;
    response.assert_status(StatusCode::OK);

    let messages = response.json::<Value>();
    assert_eq!(messages[0]["role"], "assistant");
    assert_eq!(messages[0]["content"], "a\nb");
    assert!(messages[0].get("timestamp").is_none());

    assert_eq!(messages[1]["role"], "user");
    assert_eq!(messages[1]["content"], "hi there");
    assert_eq!(messages[1]["timestamp"], "2024-01-02T03:04:06Z");
}

// ─────────────────────────────────────────────────────────────────────────────
// Chat controller
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_chat_page_redirects_to_landing_without_terms() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/").await;
    response.assert_status(StatusCode::SEE_OTHER);
    let location = response.headers().get("location").expect("location header");
    assert_eq!(location, "/landing");
}

#[tokio::test]
async fn test_chat_page_bootstraps_session() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .get("/")
        .add_cookie(Cookie::new("terms_accepted", "true"))
        .await;

    response.assert_status(StatusCode::OK);
    assert!(response.text().contains("mock-session-1"));
    let headers = response.headers();
    let set_cookie = headers
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .expect("valid header")
        .to_string();
    assert!(set_cookie.contains("chatdku_session_id=mock-session-1"));
}

#[tokio::test]
async fn test_chat_page_renders_error_state_when_backend_down() {
    let backend = spawn_backend(failing_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .get("/")
        .add_cookie(Cookie::new("terms_accepted", "true"))
        .await;

    response.assert_status(StatusCode::OK);
    assert!(response.text().contains("We couldn't start a chat session"));
}

#[tokio::test]
async fn test_chat_send_requires_session() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .post("/chat/send")
        .json(&json!({"message": "Hello"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("active chat session"));
}

#[tokio::test]
async fn test_chat_send_then_stream_reveals_markdown() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .post("/chat/send")
        .add_cookie(session_cookie("s1"))
        .json(&json!({"message": "Hello"}))
        .await;
    response.assert_status(StatusCode::OK);

    let body = response.json::<Value>();
    assert_eq!(body["session_id"], "s1");
    let stream_url = body["stream_url"].as_str().expect("stream_url present");

    let stream = server.get(stream_url).await;
    stream.assert_status(StatusCode::OK);

    let text = stream.text();
    assert!(text.contains("<strong>world</strong>"));
    assert!(text.contains("Second paragraph."));
    assert!(text.contains("event: done"));
}

#[tokio::test]
async fn test_chat_stream_unknown_id() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.get("/chat/stream?id=nope").await;
    response.assert_status(StatusCode::OK);

    let text = response.text();
    assert!(text.contains("event: error"));
    assert!(text.contains("Stream not found"));
}

#[tokio::test]
async fn test_chat_send_backend_error_surfaces_inline() {
    let backend = spawn_backend(failing_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .post("/chat/send")
        .add_cookie(session_cookie("s1"))
        .json(&json!({"message": "Hello"}))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    let body = response.json::<Value>();
    assert!(
        body["error"]
            .as_str()
            .expect("error message")
            .starts_with("Error: ")
    );
}

#[tokio::test]
async fn test_new_session_sets_cookie() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/session/new").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<Value>()["session_id"], "mock-session-1");

    let headers = response.headers();
    let set_cookie = headers
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .expect("valid header")
        .to_string();
    assert!(set_cookie.contains("chatdku_session_id=mock-session-1"));
}

#[tokio::test]
async fn test_new_session_failure_keeps_cookie_untouched() {
    let backend = spawn_backend(failing_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .post("/session/new")
        .add_cookie(session_cookie("old-session"))
        .await;

    response.assert_status(StatusCode::BAD_GATEWAY);
    assert!(response.headers().get("set-cookie").is_none());
}

#[tokio::test]
async fn test_endpoint_selection_rejects_unknown_urls() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server
        .post("/api/endpoint")
        .json(&json!({"endpoint": "http://evil.example/exfil"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Unknown chat endpoint"));
}

#[tokio::test]
async fn test_endpoint_selection_persists_known_url() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let endpoint = format!("{backend}/dev/qwen/chat");
    let response = server
        .post("/api/endpoint")
        .json(&json!({"endpoint": endpoint}))
        .await;

    response.assert_status(StatusCode::OK);
    let headers = response.headers();
    let set_cookie = headers
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .expect("valid header")
        .to_string();
    assert!(set_cookie.contains("chatdku_api_endpoint="));
}

#[tokio::test]
async fn test_landing_accept_sets_terms_cookie() {
    let backend = spawn_backend(happy_backend()).await;
    let server = test_server(&backend).await;

    let response = server.post("/landing/accept").await;
    response.assert_status(StatusCode::SEE_OTHER);

    let headers = response.headers();
    let set_cookie = headers
        .get("set-cookie")
        .expect("set-cookie header")
        .to_str()
        .expect("valid header")
        .to_string();
    assert!(set_cookie.contains("terms_accepted=true"));
}
