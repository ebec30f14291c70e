//! HTTP client for the chat backend.
//!
//! Thin typed wrappers over `reqwest` for the backend endpoints the UI
//! reads: session creation, the conversations listing, and per-session
//! message history, plus the chat submission used by the page controller.
//!
//! The UI-facing fetches never propagate errors: every failure kind
//! (transport, non-2xx status, undecodable body) is logged and collapsed to
//! a safe empty value, so callers render an empty state instead of an error
//! page. The fallible plumbing lives in the `try_` functions.

pub mod normalize;

pub use normalize::{ChatMessage, Convo, MessageRole};

use normalize::{RawConversation, RawMessage};
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::BackendConfig;

/// Failure taxonomy for backend calls.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Network or transport-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("backend returned status {0}")]
    Status(StatusCode),

    /// The backend's body did not decode as expected.
    #[error("undecodable backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the chat backend.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: BackendConfig,
}

impl BackendClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: BackendConfig) -> Self {
        Self { http, config }
    }

    /// Create a new backend session and return its id.
    ///
    /// Returns whatever id the backend hands out, including the empty
    /// string. `None` on any failure; the caller's stored session stays
    /// untouched in that case.
    pub async fn new_session(&self) -> Option<String> {
        match self.try_new_session().await {
            Ok(id) => {
                tracing::info!(session_id = %id, "created backend session");
                Some(id)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to create backend session");
                None
            }
        }
    }

    async fn try_new_session(&self) -> Result<String, BackendError> {
        let body = self.fetch_json(&self.config.new_session_url()).await?;
        body.get("session_id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .ok_or_else(|| {
                BackendError::Decode(serde::de::Error::custom("missing session_id field"))
            })
    }

    /// List conversations. Empty on any failure.
    pub async fn conversations(&self) -> Vec<Convo> {
        match self.try_conversations().await {
            Ok(convos) => convos,
            Err(e) => {
                tracing::error!(error = %e, "failed to fetch conversations");
                Vec::new()
            }
        }
    }

    async fn try_conversations(&self) -> Result<Vec<Convo>, BackendError> {
        let body = self.fetch_json(&self.config.conversations_url()).await?;
        let raw: Vec<RawConversation> = serde_json::from_value(body)?;
        Ok(raw.into_iter().map(Convo::from_raw).collect())
    }

    /// Fetch the normalized messages of one session. Empty on any failure.
    pub async fn session_messages(&self, session_id: &str) -> Vec<ChatMessage> {
        match self.try_session_messages(session_id).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(
                    session_id = %session_id,
                    error = %e,
                    "failed to fetch session messages"
                );
                Vec::new()
            }
        }
    }

    async fn try_session_messages(
        &self,
        session_id: &str,
    ) -> Result<Vec<ChatMessage>, BackendError> {
        let url = self.config.session_messages_url(session_id);
        let body = self.fetch_json(&url).await?;
        let raw: Vec<RawMessage> = serde_json::from_value(body)?;
        Ok(raw.into_iter().map(normalize::normalize_message).collect())
    }

    /// Submit a chat payload to `endpoint` and return the raw text reply.
    ///
    /// Submission failures are the one case the UI shows the user, so the
    /// error is returned rather than swallowed.
    pub async fn send_chat(&self, endpoint: &str, payload: &Value) -> Result<String, BackendError> {
        let response = self.http.post(endpoint).json(payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status));
        }
        Ok(response.text().await?)
    }

    async fn fetch_json(&self, url: &str) -> Result<Value, BackendError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status(status));
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}
