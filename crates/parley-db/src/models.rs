/// Database row types — these map directly to SQLite rows.
/// Distinct from the parley-types wire models to keep the store layer
/// independent.

/// One denormalized message row: the message itself, its sender's display
/// identity joined at read time, and the reply target's preview when the
/// referenced row still exists.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub body: String,
    pub kind: String,
    pub sender_id: i64,
    pub sender_name: String,
    pub sender_color: String,
    pub created_at: String,
    pub updated_at: String,
    pub reply: Option<ReplyRow>,
}

/// Joined preview of a reply target. Absent on the parent row when the
/// target was hard-deleted; the reply itself is untouched.
#[derive(Debug, Clone)]
pub struct ReplyRow {
    pub id: i64,
    pub body: String,
    pub kind: String,
    pub sender_name: String,
    pub sender_color: String,
}
