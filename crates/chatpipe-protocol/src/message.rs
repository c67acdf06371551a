//! Message types for the transcript
//!
//! A [`Message`] is created once and never mutated. The transcript is the
//! ordered list of these records, and it doubles as the error channel: process
//! failures show up as SYSTEM messages with the error flag set.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Who produced a message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageRole {
    /// Text typed by the user and piped to the assistant
    User,

    /// One line of assistant output
    Assistant,

    /// Session notices and errors
    System,
}

impl MessageRole {
    /// Wire/serialized name of the role
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "USER",
            MessageRole::Assistant => "ASSISTANT",
            MessageRole::System => "SYSTEM",
        }
    }

    /// Header label shown above a message bubble
    pub fn label(&self) -> &'static str {
        match self {
            MessageRole::User => "You",
            MessageRole::Assistant => "Claude Code",
            MessageRole::System => "System",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single transcript entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    id: Uuid,
    content: String,
    role: MessageRole,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    is_error: bool,
}

impl Message {
    fn new(role: MessageRole, content: String, is_error: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            content,
            role,
            timestamp: Utc::now(),
            is_error,
        }
    }

    /// Create a USER message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content.into(), false)
    }

    /// Create an ASSISTANT message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content.into(), false)
    }

    /// Create an informational SYSTEM message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into(), false)
    }

    /// Create a SYSTEM message flagged as an error
    pub fn system_error(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content.into(), true)
    }

    /// Unique identifier, generated at creation
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Message text
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Role that produced the message
    pub fn role(&self) -> MessageRole {
        self.role
    }

    /// Creation time (UTC)
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Whether this is an error notice
    ///
    /// Only SYSTEM messages can carry the flag.
    pub fn is_error(&self) -> bool {
        self.role == MessageRole::System && self.is_error
    }

    /// Creation time in local wall-clock form (`HH:MM:SS`)
    pub fn time_label(&self) -> String {
        self.timestamp
            .with_timezone(&Local)
            .format("%H:%M:%S")
            .to_string()
    }
}
