use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error};

use parley_db::Database;
use parley_types::models::MessageView;

use crate::view::row_to_view;

/// Backward page size. A response shorter than this tells the client that
/// history is exhausted and no further backward requests should follow.
pub const PAGE_SIZE: u32 = 50;

/// Messages fetched on each side of a jump target; the older side includes
/// the target itself.
pub const WINDOW_SIZE: u32 = 25;

/// Fetch one backward page: up to [`PAGE_SIZE`] messages before `cursor`,
/// fetched newest-first and emitted in chronological order so the oldest
/// entry of the page is the next cursor. Store failures are logged and
/// produce no emission; the client owns its retry policy.
pub async fn fetch_page(db: &Arc<Database>, cursor: Option<i64>) -> Option<Vec<MessageView>> {
    let db = db.clone();
    let result = tokio::task::spawn_blocking(move || db.select_page(cursor, PAGE_SIZE)).await;

    match result {
        Ok(Ok(mut rows)) => {
            rows.reverse();
            Some(rows.into_iter().map(row_to_view).collect())
        }
        Ok(Err(e)) => {
            error!("Error fetching history page (cursor {:?}): {}", cursor, e);
            None
        }
        Err(e) => {
            error!("History query task failed: {}", e);
            None
        }
    }
}

/// Outcome of a jump request: a replacement window, or the one error this
/// protocol surfaces explicitly.
pub enum JumpOutcome {
    Window(Vec<MessageView>),
    Error(String),
}

/// Resolve a jump target into a window of [`WINDOW_SIZE`] older (target
/// inclusive) + [`WINDOW_SIZE`] newer messages, ascending. The raw JSON id
/// is validated here so a malformed value answers with `jumpError`.
pub async fn fetch_window(db: &Arc<Database>, raw_id: &Value) -> JumpOutcome {
    let Some(id) = raw_id.as_i64().filter(|id| *id > 0) else {
        debug!("Rejected jump to non-numeric id: {}", raw_id);
        return JumpOutcome::Error("Invalid message id.".into());
    };

    let db = db.clone();
    let result =
        tokio::task::spawn_blocking(move || db.select_window(id, WINDOW_SIZE, WINDOW_SIZE)).await;

    match result {
        Ok(Ok(rows)) => JumpOutcome::Window(rows.into_iter().map(row_to_view).collect()),
        Ok(Err(e)) => {
            error!("Error jumping to message {}: {}", id, e);
            JumpOutcome::Error("Failed to retrieve message history.".into())
        }
        Err(e) => {
            error!("Jump query task failed: {}", e);
            JumpOutcome::Error("Failed to retrieve message history.".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn seeded_db(count: u32) -> Arc<Database> {
        let db = Database::open_in_memory().unwrap();
        db.upsert_user(1, "Cyber Blue", "#00eaff").unwrap();
        for i in 0..count {
            db.insert_message(1, &format!("message {}", i + 1), "text", None)
                .unwrap();
        }
        Arc::new(db)
    }

    #[tokio::test]
    async fn page_is_emitted_in_chronological_order() {
        let db = seeded_db(120);

        let page = fetch_page(&db, None).await.unwrap();
        let ids: Vec<i64> = page.iter().map(|m| m.id).collect();
        assert_eq!(ids, (71..=120).collect::<Vec<_>>());

        let next = fetch_page(&db, Some(page[0].id)).await.unwrap();
        let ids: Vec<i64> = next.iter().map(|m| m.id).collect();
        assert_eq!(ids, (21..=70).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn short_page_signals_exhaustion() {
        let db = seeded_db(20);
        let page = fetch_page(&db, None).await.unwrap();
        assert_eq!(page.len(), 20);
        assert!(page.len() < PAGE_SIZE as usize);
    }

    #[tokio::test]
    async fn window_is_ascending_around_the_target() {
        let db = seeded_db(120);

        match fetch_window(&db, &json!(60)).await {
            JumpOutcome::Window(window) => {
                let ids: Vec<i64> = window.iter().map(|m| m.id).collect();
                assert_eq!(ids, (35..=85).collect::<Vec<_>>());
            }
            JumpOutcome::Error(message) => panic!("unexpected jump error: {}", message),
        }
    }

    #[tokio::test]
    async fn malformed_jump_ids_are_rejected() {
        let db = seeded_db(5);

        for bad in [json!("abc"), json!(null), json!(-3), json!(0), json!(1.5)] {
            match fetch_window(&db, &bad).await {
                JumpOutcome::Error(message) => assert_eq!(message, "Invalid message id."),
                JumpOutcome::Window(_) => panic!("{} should not resolve to a window", bad),
            }
        }
    }
}
