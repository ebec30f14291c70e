//! Layered application configuration.
//!
//! Settings resolve in order: built-in defaults, an optional YAML config
//! file, `CHATDKU_`-prefixed environment variables, then CLI flags (which
//! also read their own env vars via clap). The backend section knows how to
//! build every URL this application talks to.

use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::markdown::{DEFAULT_CHUNK_DELAY, DEV_CHUNK_DELAY};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Host interface to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Internal backend base URL targeted by the proxy routes
    #[arg(long, env = "BACKEND_INTERNAL_URL")]
    pub backend_internal_url: Option<String>,

    /// Override for the feedback forwarding target
    #[arg(long, env = "BACKEND_FEEDBACK_URL")]
    pub backend_feedback_url: Option<String>,

    /// Public backend base URL for session and conversation fetches
    #[arg(long, env = "API_BASE_URL")]
    pub api_base_url: Option<String>,

    /// Dictation websocket URL handed to the page
    #[arg(long, env = "DICTATION_WS_URL")]
    pub dictation_ws_url: Option<String>,

    /// Slow the simulated streaming for development builds
    #[arg(long, env = "DEV_MODE")]
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub ui: UiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL of the internal backend the proxy routes forward to.
    pub internal_url: String,
    /// Explicit feedback target; defaults to `{internal_url}/feedback`.
    pub feedback_url: Option<String>,
    /// Public base URL for session, conversation, and upload endpoints.
    pub api_base_url: String,
    /// Websocket URL for the voice dictation service.
    pub dictation_ws_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UiConfig {
    /// Development build: slower reveal pacing, dev disclaimer text.
    pub dev_mode: bool,
    /// Pause between revealed chunks in milliseconds.
    pub chunk_delay_ms: u64,
}

/// A selectable backend chat endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ChatModel {
    pub id: &'static str,
    pub name: &'static str,
    pub endpoint: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("backend.internal_url", "http://localhost:9015")?
            .set_default("backend.api_base_url", "http://localhost:3005")?
            .set_default("backend.dictation_ws_url", "ws://localhost:8007")?
            .set_default("ui.dev_mode", false)?
            .set_default("ui.chunk_delay_ms", 60)?;

        // Config file: an explicit path is required to exist, the implicit
        // ./config.{yaml,toml,...} fallback is not.
        if let Some(path) = &cli.config {
            builder = builder.add_source(File::with_name(path));
        } else {
            builder = builder.add_source(File::with_name("config").required(false));
        }

        // Prefixed env vars, e.g. CHATDKU_SERVER__PORT=8000.
        builder = builder.add_source(
            Environment::with_prefix("CHATDKU")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags last; clap already resolved their dedicated env vars
        // (PORT, BACKEND_INTERNAL_URL, ...).
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(url) = cli.backend_internal_url {
            builder = builder.set_override("backend.internal_url", url)?;
        }
        if let Some(url) = cli.backend_feedback_url {
            builder = builder.set_override("backend.feedback_url", url)?;
        }
        if let Some(url) = cli.api_base_url {
            builder = builder.set_override("backend.api_base_url", url)?;
        }
        if let Some(url) = cli.dictation_ws_url {
            builder = builder.set_override("backend.dictation_ws_url", url)?;
        }
        if let Some(dev) = cli.dev_mode {
            builder = builder.set_override("ui.dev_mode", dev)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

fn trimmed(base: &str) -> &str {
    base.trim_end_matches('/')
}

impl BackendConfig {
    /// Chat forwarding target of the `/api/chat` proxy route.
    #[must_use]
    pub fn chat_url(&self) -> String {
        format!("{}/chat", trimmed(&self.internal_url))
    }

    /// Feedback forwarding target, honoring the explicit override.
    #[must_use]
    pub fn feedback_target(&self) -> String {
        self.feedback_url
            .clone()
            .unwrap_or_else(|| format!("{}/feedback", trimmed(&self.internal_url)))
    }

    /// Session creation endpoint.
    #[must_use]
    pub fn new_session_url(&self) -> String {
        format!("{}/api/get_session", trimmed(&self.api_base_url))
    }

    /// Conversations listing endpoint.
    #[must_use]
    pub fn conversations_url(&self) -> String {
        format!("{}/api/c/", trimmed(&self.api_base_url))
    }

    /// Per-session messages endpoint.
    #[must_use]
    pub fn session_messages_url(&self, session_id: &str) -> String {
        format!(
            "{}/api/c/{}/messages",
            trimmed(&self.api_base_url),
            session_id
        )
    }

    /// File upload forwarding target.
    #[must_use]
    pub fn upload_url(&self) -> String {
        format!("{}/user_files", trimmed(&self.api_base_url))
    }

    /// The chat endpoint used when no selection is stored.
    #[must_use]
    pub fn default_chat_endpoint(&self) -> String {
        format!("{}/api/chat", trimmed(&self.api_base_url))
    }

    /// The selectable chat endpoints, default first.
    #[must_use]
    pub fn chat_models(&self) -> Vec<ChatModel> {
        let base = trimmed(&self.api_base_url);
        vec![
            ChatModel {
                id: "default",
                name: "Default",
                endpoint: format!("{base}/api/chat"),
            },
            ChatModel {
                id: "ant",
                name: "Course Planning",
                endpoint: format!("{base}/dev/ant/chat"),
            },
            ChatModel {
                id: "qwen",
                name: "Qwen",
                endpoint: format!("{base}/dev/qwen/chat"),
            },
            ChatModel {
                id: "inp",
                name: "Artemis",
                endpoint: format!("{base}/dev/inp/chat"),
            },
            ChatModel {
                id: "django",
                name: "Django Testing",
                endpoint: format!("{base}/dev/django/chat"),
            },
        ]
    }
}

impl UiConfig {
    /// Pause between revealed chunks; dev builds stream slower.
    #[must_use]
    pub fn chunk_delay(&self) -> Duration {
        if self.dev_mode {
            DEV_CHUNK_DELAY
        } else {
            Duration::from_millis(self.chunk_delay_ms)
        }
    }
}
