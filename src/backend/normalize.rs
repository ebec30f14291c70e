//! Decoding of heterogeneous backend payloads.
//!
//! The backend's history endpoints are loose about shapes: roles arrive as
//! `"Bot"`, `"User"`, `"bot"`, `"assistant"`, or `"user"`; message content
//! arrives as a plain string, an array of parts, or an object; the content
//! field itself is sometimes called `message`. Everything funnels through
//! the raw types here and comes out as [`ChatMessage`] / [`Convo`] with a
//! two-valued role and flat string content. Shapes the decoder does not
//! recognize are logged, not silently swallowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A normalized chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A conversation summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Convo {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Raw conversation record as the backend sends it.
#[derive(Debug, Deserialize)]
pub struct RawConversation {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Convo {
    /// Build a [`Convo`], defaulting a missing or empty title and falling
    /// back to the epoch for unparseable timestamps.
    #[must_use]
    pub fn from_raw(raw: RawConversation) -> Self {
        let title = raw
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "New Chat".to_string());

        let created_at = raw
            .created_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or_else(|| DateTime::<Utc>::UNIX_EPOCH, |dt| dt.with_timezone(&Utc));

        Self {
            id: raw.id,
            title,
            created_at,
        }
    }
}

/// Raw message record as the backend sends it.
#[derive(Debug, Deserialize)]
pub struct RawMessage {
    #[serde(default)]
    pub role: Option<Value>,
    #[serde(default)]
    pub content: Option<RawContent>,
    #[serde(default)]
    pub message: Option<RawContent>,
    #[serde(default)]
    pub timestamp: Option<Value>,
}

/// The shapes message content has been observed in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawContent {
    Text(String),
    Parts(Vec<RawPart>),
    Object {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Other(Value),
}

/// One element of an array-shaped content field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RawPart {
    Text(String),
    Object {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        content: Option<String>,
    },
    Other(Value),
}

/// Normalize a raw role value.
///
/// `bot` and `assistant` (case-insensitive) map to [`MessageRole::Assistant`];
/// everything else collapses to [`MessageRole::User`], including roles the
/// backend never documented. The collapse is logged so misclassified roles
/// stay observable.
#[must_use]
pub fn normalize_role(raw: Option<&Value>) -> MessageRole {
    let role = match raw {
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let lower = role.to_lowercase();

    if lower == "bot" || lower == "assistant" {
        MessageRole::Assistant
    } else {
        if !lower.is_empty() && lower != "user" {
            tracing::debug!(role = %lower, "unrecognized role collapsed to user");
        }
        MessageRole::User
    }
}

fn part_text(part: &RawPart) -> String {
    match part {
        RawPart::Text(s) => s.clone(),
        RawPart::Object { text, content } => text
            .as_deref()
            .or(content.as_deref())
            .unwrap_or_default()
            .to_string(),
        RawPart::Other(_) => String::new(),
    }
}

/// Flatten a content shape to a single string.
///
/// Returns `None` for shapes the decoder does not recognize; the caller is
/// responsible for surfacing those to the logs.
#[must_use]
pub fn flatten_content(raw: &RawContent) -> Option<String> {
    match raw {
        RawContent::Text(s) => Some(s.clone()),
        RawContent::Parts(parts) => {
            Some(parts.iter().map(part_text).collect::<Vec<_>>().join("\n"))
        }
        RawContent::Object {
            text,
            content,
            message,
        } => text
            .as_deref()
            .or(content.as_deref())
            .or(message.as_deref())
            .map(ToString::to_string),
        RawContent::Other(_) => None,
    }
}

/// Normalize one raw message.
///
/// `content` is preferred; the backend's `message` field is the fallback.
#[must_use]
pub fn normalize_message(raw: RawMessage) -> ChatMessage {
    let role = normalize_role(raw.role.as_ref());

    let source = raw.content.or(raw.message);
    let content = match &source {
        Some(shape) => flatten_content(shape).unwrap_or_else(|| {
            tracing::warn!(shape = ?shape, "unrecognized message content shape");
            String::new()
        }),
        None => String::new(),
    };

    let timestamp = raw.timestamp.map(|v| match v {
        Value::String(s) => s,
        other => other.to_string(),
    });

    ChatMessage {
        role,
        content,
        timestamp,
    }
}
