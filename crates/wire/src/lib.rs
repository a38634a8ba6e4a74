//! Wire types shared by the API server and the chat client.
//!
//! The streaming reply is carried as server-sent events: every record is a
//! `data: <json>` line followed by a blank line. The JSON payload is one of
//! `{"content": "<delta>"}`, `{"done": true}` or `{"error": "<message>"}`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown message role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for MessageRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// One turn of a conversation as exchanged over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Body of `GET /api/conversations/:id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    pub messages: Vec<ChatMessage>,
}

/// Body of `POST /api/conversations/:id/messages`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    /// Optional code submission attached to the turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl SendMessageRequest {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// The text stored as the user's message. A code submission is appended
    /// as a fenced block so the transcript stays plain text.
    pub fn composed_content(&self) -> String {
        let content = self.content.trim();
        match self.code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => {
                let language = self.language.as_deref().unwrap_or("").trim();
                format!("{content}\n\n```{language}\n{code}\n```")
            }
            _ => content.to_string(),
        }
    }
}

/// A decoded streaming record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRecord {
    /// Non-empty fragment of the in-progress assistant reply.
    Delta(String),
    /// Terminal record; the reply was persisted.
    Done,
    /// The server gave up on the turn. No `Done` follows.
    Error(String),
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Payload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload has no recognised field")]
    Unrecognised,
}

impl StreamRecord {
    /// JSON payload carried on the record's `data:` line.
    pub fn to_payload(&self) -> String {
        let payload = match self {
            StreamRecord::Delta(text) => Payload {
                content: Some(text.clone()),
                ..Default::default()
            },
            StreamRecord::Done => Payload {
                done: Some(true),
                ..Default::default()
            },
            StreamRecord::Error(message) => Payload {
                error: Some(message.clone()),
                ..Default::default()
            },
        };
        // A struct of strings and bools always serializes.
        serde_json::to_string(&payload).unwrap_or_default()
    }

    /// Full record as written on the transport, including the blank line.
    pub fn encode(&self) -> String {
        format!("data: {}\n\n", self.to_payload())
    }

    pub fn from_payload(data: &str) -> Result<Self, PayloadError> {
        let payload: Payload = serde_json::from_str(data.trim())?;
        if payload.done == Some(true) {
            return Ok(StreamRecord::Done);
        }
        if let Some(message) = payload.error {
            return Ok(StreamRecord::Error(message));
        }
        match payload.content {
            Some(text) if !text.is_empty() => Ok(StreamRecord::Delta(text)),
            _ => Err(PayloadError::Unrecognised),
        }
    }
}
