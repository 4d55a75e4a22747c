//! A2A message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::error::A2AError;

/// A message exchanged between two agents
///
/// Messages are values: once built they are never mutated. Parts keep the order
/// in which they were added, and that order survives dispatch and execution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct A2AMessage {
    /// Unique message identifier
    #[serde(rename = "messageId")]
    pub message_id: String,

    /// Agent that sent the message
    #[serde(rename = "senderAgentId")]
    pub sender_agent_id: String,

    /// Agent the message is addressed to
    #[serde(rename = "recipientAgentId")]
    pub recipient_agent_id: String,

    /// Ordered message content parts
    pub parts: Vec<MessagePart>,

    /// When the message was created
    pub timestamp: DateTime<Utc>,
}

impl A2AMessage {
    /// Create a message with a freshly generated id and the current time
    pub fn new(
        sender_agent_id: impl Into<String>,
        recipient_agent_id: impl Into<String>,
        parts: Vec<MessagePart>,
    ) -> Self {
        Self {
            message_id: Uuid::now_v7().to_string(),
            sender_agent_id: sender_agent_id.into(),
            recipient_agent_id: recipient_agent_id.into(),
            parts,
            timestamp: Utc::now(),
        }
    }

    /// Create a message carrying a single structured data part
    pub fn data(
        sender_agent_id: impl Into<String>,
        recipient_agent_id: impl Into<String>,
        data: Value,
    ) -> Self {
        Self::new(
            sender_agent_id,
            recipient_agent_id,
            vec![MessagePart::data(data)],
        )
    }

    /// Create a new message builder
    pub fn builder() -> MessageBuilder {
        MessageBuilder::new()
    }

    /// Build the reply to this message: sender and recipient swapped
    pub fn reply(&self, parts: Vec<MessagePart>) -> Self {
        Self::new(
            self.recipient_agent_id.clone(),
            self.sender_agent_id.clone(),
            parts,
        )
    }

    /// The first structured data part, if any
    pub fn first_data(&self) -> Option<&Value> {
        self.parts.iter().find_map(|part| match part {
            MessagePart::Data { data } => Some(data),
            _ => None,
        })
    }

    /// Concatenated text of all text parts, in order
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Builder for constructing [`A2AMessage`] instances
#[derive(Debug, Default)]
pub struct MessageBuilder {
    message_id: Option<String>,
    sender_agent_id: Option<String>,
    recipient_agent_id: Option<String>,
    parts: Vec<MessagePart>,
    timestamp: Option<DateTime<Utc>>,
}

impl MessageBuilder {
    /// Create a new message builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the message ID (generated when omitted)
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Set the sending agent
    pub fn sender(mut self, agent_id: impl Into<String>) -> Self {
        self.sender_agent_id = Some(agent_id.into());
        self
    }

    /// Set the receiving agent
    pub fn recipient(mut self, agent_id: impl Into<String>) -> Self {
        self.recipient_agent_id = Some(agent_id.into());
        self
    }

    /// Set the message parts
    pub fn parts(mut self, parts: Vec<MessagePart>) -> Self {
        self.parts = parts;
        self
    }

    /// Append a single part
    pub fn part(mut self, part: MessagePart) -> Self {
        self.parts.push(part);
        self
    }

    /// Set the timestamp (now when omitted)
    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Build the message
    ///
    /// # Errors
    ///
    /// Returns `A2AError::Validation` if sender or recipient is missing or empty
    pub fn build(self) -> Result<A2AMessage, A2AError> {
        let sender_agent_id = self
            .sender_agent_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| A2AError::Validation("Message sender is required".into()))?;
        let recipient_agent_id = self
            .recipient_agent_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| A2AError::Validation("Message recipient is required".into()))?;

        Ok(A2AMessage {
            message_id: self
                .message_id
                .unwrap_or_else(|| Uuid::now_v7().to_string()),
            sender_agent_id,
            recipient_agent_id,
            parts: self.parts,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
        })
    }
}

/// Kind of content a message part carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PartType {
    /// Plain text
    Text,

    /// Structured JSON data
    Data,

    /// Reference to a file
    File,
}

impl std::fmt::Display for PartType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PartType::Text => "text",
            PartType::Data => "data",
            PartType::File => "file",
        };
        f.write_str(name)
    }
}

/// File content for file parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    /// MIME type of the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,

    /// Name of the file
    pub name: String,

    /// URI reference to the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_with_uri: Option<String>,

    /// Base64-encoded file content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_with_bytes: Option<String>,
}

/// A part of a message
///
/// A part contains exactly one of: text, file, data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessagePart {
    /// Text content
    Text {
        /// The text content
        text: String,
    },

    /// File reference
    File {
        /// File content
        file: FileContent,
    },

    /// Structured data
    Data {
        /// The structured data
        data: Value,
    },
}

impl MessagePart {
    /// Create a text part
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create a file part with URI reference
    pub fn file(name: impl Into<String>, file_uri: impl Into<String>) -> Self {
        Self::File {
            file: FileContent {
                media_type: None,
                name: name.into(),
                file_with_uri: Some(file_uri.into()),
                file_with_bytes: None,
            },
        }
    }

    /// Create a file part with base64-encoded bytes
    pub fn file_with_bytes(
        name: impl Into<String>,
        file_bytes: impl Into<String>,
        media_type: Option<String>,
    ) -> Self {
        Self::File {
            file: FileContent {
                media_type,
                name: name.into(),
                file_with_uri: None,
                file_with_bytes: Some(file_bytes.into()),
            },
        }
    }

    /// Create a data part
    pub fn data(data: Value) -> Self {
        Self::Data { data }
    }

    /// The kind of content this part carries
    pub fn part_type(&self) -> PartType {
        match self {
            MessagePart::Text { .. } => PartType::Text,
            MessagePart::File { .. } => PartType::File,
            MessagePart::Data { .. } => PartType::Data,
        }
    }
}
