use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Identity, MessageKind, MessageView};

/// Commands sent FROM client TO server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Request a backward page of history. A null cursor (re)enters live
    /// mode and fetches the most recent page; a numeric cursor pages
    /// further back from the oldest loaded id.
    GetHistory {
        #[serde(default)]
        cursor: Option<i64>,
    },

    /// Create a message. `type` defaults to text; `responseTo` optionally
    /// references the message being replied to, set once at creation.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        text: String,
        #[serde(rename = "type", default)]
        kind: MessageKind,
        #[serde(default)]
        response_to: Option<i64>,
    },

    /// Edit one of the caller's own messages.
    EditMessage { id: i64, text: String },

    /// Delete one of the caller's own messages.
    DeleteMessage { id: i64 },

    /// Windowed fetch around an arbitrary message id. The id arrives as raw
    /// JSON and is validated server-side, so a malformed value produces a
    /// `jumpError` instead of a silently dropped frame.
    JumpToMessage {
        #[serde(default)]
        id: Value,
    },
}

/// Events sent FROM server TO clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Identity confirmation, sent once immediately after authentication.
    Session(Identity),

    /// Response to `getHistory`, oldest first. Fewer than a full page means
    /// history is exhausted.
    HistoryChunk(Vec<MessageView>),

    /// A newly created message, fanned out to every connection — the
    /// creator receives it through this same channel.
    ReceiveMessage(MessageView),

    /// An edit delta, fanned out to every connection.
    #[serde(rename_all = "camelCase")]
    MessageUpdated {
        id: i64,
        text: String,
        is_edited: bool,
    },

    /// A delete delta, fanned out to every connection.
    MessageDeleted { id: i64 },

    /// Window around a jump target, replacing the client's loaded set.
    LoadJumpMessages(Vec<MessageView>),

    /// A jump could not be served.
    JumpError { message: String },
}
