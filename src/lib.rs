//! ChatDKU web frontend.
//!
//! A server-rendered chat interface for a university assistant. The heavy
//! lifting — language-model reasoning, retrieval, persistence — happens in a
//! separate backend service; this application serves the chat page, keeps
//! the browser-held session and endpoint state in cookies, proxies chat and
//! feedback JSON to the backend, and replays finished responses as paced
//! SSE chunk streams so the page can reveal them incrementally.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE reveal streaming
//! - **Backend client**: typed `reqwest` wrappers with payload normalization
//! - **Proxy routes**: chat/feedback forwarding to the internal backend
//! - **Renderer**: GFM markdown chunking with simulated streaming
//!
//! # Modules
//!
//! - [`backend`]: backend HTTP client and payload normalization
//! - [`config`]: layered configuration and backend URL construction
//! - [`markdown`]: markdown rendering, chunking, and the paced reveal
//! - [`proxy`]: reverse-proxy routes and development mocks
//! - [`server`]: router assembly and the chat page controller
//! - [`store`]: cookie-held client state behind an injectable capability
//! - [`ui`]: server-rendered HTML shell

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod backend;
pub mod config;
pub mod markdown;
pub mod proxy;
pub mod server;
pub mod store;
pub mod ui;

use std::sync::Arc;

use backend::BackendClient;
use config::AppConfig;
use server::PendingStreams;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Backend client for session and conversation fetches.
    pub backend: Arc<BackendClient>,
    /// Finished responses awaiting their SSE reveal.
    pub streams: PendingStreams,
    /// Outbound HTTP client used by the proxy routes.
    pub http: reqwest::Client,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}
