use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL,
            color       TEXT NOT NULL,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- AUTOINCREMENT keeps message ids strictly increasing and never
        -- reused, even across deletes. Backward pagination and jump
        -- windows key off that.
        --
        -- reply_to carries no foreign key: a reply holds a weak reference,
        -- and hard-deleting the target must neither cascade nor fail. The
        -- read-time LEFT JOIN resolves a dangling reference to NULL.
        --
        -- Timestamps use the subsec modifier so an edit within the same
        -- second still advances updated_at past created_at.
        CREATE TABLE IF NOT EXISTS messages (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id   INTEGER NOT NULL REFERENCES users(id),
            body        TEXT NOT NULL,
            kind        TEXT NOT NULL DEFAULT 'text'
                        CHECK (kind IN ('text', 'image', 'video', 'file')),
            reply_to    INTEGER,
            created_at  TEXT NOT NULL DEFAULT (datetime('now', 'subsec')),
            updated_at  TEXT NOT NULL DEFAULT (datetime('now', 'subsec'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_sender
            ON messages(sender_id);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
