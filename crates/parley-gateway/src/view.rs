use chrono::{DateTime, Utc};
use tracing::warn;

use parley_db::models::MessageRow;
use parley_types::models::{MessageKind, MessageView, ReplyPreview};

/// Convert a denormalized store row into its wire shape. `isEdited` is
/// derived here from the timestamps — the store never writes a flag.
pub fn row_to_view(row: MessageRow) -> MessageView {
    let created_at = parse_timestamp(&row.created_at, row.id);
    let updated_at = parse_timestamp(&row.updated_at, row.id);

    MessageView {
        id: row.id,
        text: row.body,
        kind: MessageKind::from_db(&row.kind),
        user: row.sender_name,
        color: row.sender_color,
        created_at,
        is_edited: updated_at > created_at,
        reply: row.reply.map(|r| ReplyPreview {
            id: r.id,
            text: r.body,
            kind: MessageKind::from_db(&r.kind),
            user: r.sender_name,
            color: r.sender_color,
        }),
    }
}

fn parse_timestamp(raw: &str, message_id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS[.SSS]"
            // without timezone. Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}' on message {}: {}", raw, message_id, e);
            DateTime::default()
        })
}
