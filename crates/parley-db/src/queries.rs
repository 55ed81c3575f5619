use crate::Database;
use crate::models::{MessageRow, ReplyRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

/// Shared SELECT for denormalized message rows: the message, its sender's
/// display identity, and the reply target's preview in a single query.
/// The LEFT JOINs keep a reply retrievable after its target is deleted —
/// the preview columns simply come back NULL.
const MESSAGE_SELECT: &str = "
    SELECT m.id, m.body, m.kind, m.sender_id, u.name, u.color,
           m.created_at, m.updated_at,
           pm.id, pm.body, pm.kind, pu.name, pu.color
    FROM messages m
    JOIN users u ON m.sender_id = u.id
    LEFT JOIN messages pm ON m.reply_to = pm.id
    LEFT JOIN users pu ON pm.sender_id = pu.id
";

impl Database {
    // -- Users --

    /// Mirror an authenticated identity into the store so read-time joins
    /// resolve its name and color.
    pub fn upsert_user(&self, id: i64, name: &str, color: &str) -> Result<()> {
        self.with_conn(|conn| upsert_user(conn, id, name, color))
    }

    // -- Messages --

    /// Backward page: up to `limit` messages with `id < before` (or the
    /// most recent `limit` when `before` is absent), newest first. The
    /// paginator reverses into chronological order for emission.
    pub fn select_page(&self, before: Option<i64>, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| select_page(conn, before, limit))
    }

    /// Window around `id`: up to `older` messages at or before the target
    /// and `newer` after it, merged in ascending id order.
    pub fn select_window(&self, id: i64, older: u32, newer: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| select_window(conn, id, older, newer))
    }

    /// Insert a message and return its store-assigned id.
    pub fn insert_message(
        &self,
        sender_id: i64,
        body: &str,
        kind: &str,
        reply_to: Option<i64>,
    ) -> Result<i64> {
        self.with_conn(|conn| insert_message(conn, sender_id, body, kind, reply_to))
    }

    /// Read back one denormalized row, e.g. for the create broadcast.
    pub fn select_message(&self, id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| select_message(conn, id))
    }

    /// Ownership read preceding an update or delete.
    pub fn message_sender(&self, id: i64) -> Result<Option<i64>> {
        self.with_conn(|conn| message_sender(conn, id))
    }

    /// Replace a message body and advance `updated_at`.
    pub fn update_message(&self, id: i64, body: &str) -> Result<()> {
        self.with_conn(|conn| update_message(conn, id, body))
    }

    /// Hard delete. Replies pointing here keep their rows; their preview
    /// join resolves to nothing from now on.
    pub fn delete_message(&self, id: i64) -> Result<()> {
        self.with_conn(|conn| delete_message(conn, id))
    }
}

// Connection-level variants, for callers that compose several statements
// under a single `with_conn` critical section (e.g. insert + read-back).

pub fn upsert_user(conn: &Connection, id: i64, name: &str, color: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, color) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET name = ?2, color = ?3",
        params![id, name, color],
    )?;
    Ok(())
}

pub fn select_page(conn: &Connection, before: Option<i64>, limit: u32) -> Result<Vec<MessageRow>> {
    match before {
        Some(cursor) => query_rows(
            conn,
            &format!("{MESSAGE_SELECT} WHERE m.id < ?1 ORDER BY m.id DESC LIMIT ?2"),
            params![cursor, limit],
        ),
        None => query_rows(
            conn,
            &format!("{MESSAGE_SELECT} ORDER BY m.id DESC LIMIT ?1"),
            params![limit],
        ),
    }
}

pub fn select_window(conn: &Connection, id: i64, older: u32, newer: u32) -> Result<Vec<MessageRow>> {
    // `<=` keeps the target itself on the older side and tolerates a
    // deleted target id. The two ranges are disjoint, so reversing the
    // older fetch and appending the newer one yields ascending order with
    // no dedup pass.
    let mut rows = query_rows(
        conn,
        &format!("{MESSAGE_SELECT} WHERE m.id <= ?1 ORDER BY m.id DESC LIMIT ?2"),
        params![id, older],
    )?;
    rows.reverse();

    let newer_rows = query_rows(
        conn,
        &format!("{MESSAGE_SELECT} WHERE m.id > ?1 ORDER BY m.id ASC LIMIT ?2"),
        params![id, newer],
    )?;
    rows.extend(newer_rows);

    Ok(rows)
}

pub fn insert_message(
    conn: &Connection,
    sender_id: i64,
    body: &str,
    kind: &str,
    reply_to: Option<i64>,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO messages (sender_id, body, kind, reply_to) VALUES (?1, ?2, ?3, ?4)",
        params![sender_id, body, kind, reply_to],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn select_message(conn: &Connection, id: i64) -> Result<Option<MessageRow>> {
    let rows = query_rows(
        conn,
        &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
        params![id],
    )?;
    Ok(rows.into_iter().next())
}

pub fn message_sender(conn: &Connection, id: i64) -> Result<Option<i64>> {
    let sender = conn
        .query_row("SELECT sender_id FROM messages WHERE id = ?1", [id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(sender)
}

pub fn update_message(conn: &Connection, id: i64, body: &str) -> Result<()> {
    conn.execute(
        "UPDATE messages SET body = ?1, updated_at = datetime('now', 'subsec') WHERE id = ?2",
        params![body, id],
    )?;
    Ok(())
}

pub fn delete_message(conn: &Connection, id: i64) -> Result<()> {
    conn.execute("DELETE FROM messages WHERE id = ?1", [id])?;
    Ok(())
}

fn query_rows<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;

    let rows = stmt
        .query_map(params, |row| {
            let reply = match row.get::<_, Option<i64>>(8)? {
                Some(reply_id) => Some(ReplyRow {
                    id: reply_id,
                    body: row.get(9)?,
                    kind: row.get(10)?,
                    sender_name: row
                        .get::<_, Option<String>>(11)?
                        .unwrap_or_else(|| "unknown".to_string()),
                    sender_color: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
                }),
                None => None,
            };

            Ok(MessageRow {
                id: row.get(0)?,
                body: row.get(1)?,
                kind: row.get(2)?,
                sender_id: row.get(3)?,
                sender_name: row.get(4)?,
                sender_color: row.get(5)?,
                created_at: row.get(6)?,
                updated_at: row.get(7)?,
                reply,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
