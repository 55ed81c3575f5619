use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authenticated identity bound to a connection for its lifetime.
/// This is exactly what the token verifier resolves: `{id, name, color}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// Payload kind of a message. For anything but `Text` the body carries an
/// opaque filename produced by the upload collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
    Video,
    File,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::Video => "video",
            MessageKind::File => "file",
        }
    }

    /// Stored kinds are constrained by the schema; anything unexpected
    /// degrades to text rather than failing the whole row.
    pub fn from_db(s: &str) -> Self {
        match s {
            "image" => MessageKind::Image,
            "video" => MessageKind::Video,
            "file" => MessageKind::File,
            _ => MessageKind::Text,
        }
    }
}

/// A message as delivered to clients. Sender name and color are copied in
/// at read time from the sender's current identity; `isEdited` is derived
/// from the row's timestamps, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub user: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub is_edited: bool,
    pub reply: Option<ReplyPreview>,
}

/// Preview of the message a reply points at. `None` means the target was
/// deleted after the reply was created — the reply row itself persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub id: i64,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub user: String,
    pub color: String,
}
