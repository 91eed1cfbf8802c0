//! Typed payloads for the two built-in collection purposes.

use serde::{Deserialize, Serialize};

use crate::error::PayloadError;
use crate::ids::OrderingKey;
use crate::record::NewRecord;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Written by the user.
    User,
    /// Generated reply.
    Assistant,
}

/// An entry of a chat history collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message author.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A message written by the user.
    pub fn user(content: &str) -> Self {
        Self {
            role: ChatRole::User,
            content: content.to_string(),
        }
    }

    /// A generated reply.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.to_string(),
        }
    }

    /// Build a record draft sent at `timestamp`.
    pub fn into_new_record(self, timestamp: OrderingKey) -> Result<NewRecord, PayloadError> {
        NewRecord::from_payload(timestamp, &self)
    }
}

/// An entry of an upload listing (a generated plan).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanUpload {
    /// Plan title.
    pub title: String,
    /// Plan body.
    pub content: String,
}

impl PlanUpload {
    /// Create a plan entry.
    pub fn new(title: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    /// Build a record draft uploaded at `upload_date`.
    pub fn into_new_record(self, upload_date: OrderingKey) -> Result<NewRecord, PayloadError> {
        NewRecord::from_payload(upload_date, &self)
    }
}
