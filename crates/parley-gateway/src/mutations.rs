use std::sync::Arc;

use tracing::{debug, error};

use parley_db::{Database, queries};
use parley_types::events::ServerEvent;
use parley_types::models::{Identity, MessageKind};

use crate::dispatcher::Dispatcher;
use crate::view::row_to_view;

/// Insert a message attributed to `identity` and fan the created row out
/// to every connection. The creator receives it through the same broadcast
/// as everyone else — there is no request/response duplication.
///
/// The insert, the read-back join and the broadcast all happen inside one
/// store critical section: fanout order across concurrent creates must
/// match insertion order.
pub async fn create_message(
    db: &Arc<Database>,
    dispatcher: &Dispatcher,
    identity: &Identity,
    text: String,
    kind: MessageKind,
    reply_to: Option<i64>,
) {
    let db = db.clone();
    let dispatcher = dispatcher.clone();
    let sender_id = identity.id;

    let result = tokio::task::spawn_blocking(move || {
        db.with_conn(|conn| {
            let id = queries::insert_message(conn, sender_id, &text, kind.as_str(), reply_to)?;
            if let Some(row) = queries::select_message(conn, id)? {
                dispatcher.broadcast(ServerEvent::ReceiveMessage(row_to_view(row)));
            }
            Ok(())
        })
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Error saving message: {}", e),
        Err(e) => error!("Create task failed: {}", e),
    }
}

/// Edit a message. Permitted only when the caller's authenticated id
/// matches the stored sender; an unknown id or a foreign message is a
/// silent no-op, so nothing about other users' messages leaks.
pub async fn edit_message(
    db: &Arc<Database>,
    dispatcher: &Dispatcher,
    identity: &Identity,
    id: i64,
    text: String,
) {
    let db = db.clone();
    let dispatcher = dispatcher.clone();
    let caller = identity.id;

    let result = tokio::task::spawn_blocking(move || {
        db.with_conn(|conn| {
            match queries::message_sender(conn, id)? {
                Some(sender) if sender == caller => {
                    queries::update_message(conn, id, &text)?;
                    dispatcher.broadcast(ServerEvent::MessageUpdated {
                        id,
                        text,
                        is_edited: true,
                    });
                }
                Some(_) => debug!("Ignored edit of message {} by non-owner {}", id, caller),
                None => debug!("Ignored edit of unknown message {}", id),
            }
            Ok(())
        })
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Error editing message: {}", e),
        Err(e) => error!("Edit task failed: {}", e),
    }
}

/// Delete a message. Same ownership rule and silent no-op as edit. The
/// delete is hard; replies referencing the id keep their rows and degrade
/// to an absent preview on the next read.
pub async fn delete_message(
    db: &Arc<Database>,
    dispatcher: &Dispatcher,
    identity: &Identity,
    id: i64,
) {
    let db = db.clone();
    let dispatcher = dispatcher.clone();
    let caller = identity.id;

    let result = tokio::task::spawn_blocking(move || {
        db.with_conn(|conn| {
            match queries::message_sender(conn, id)? {
                Some(sender) if sender == caller => {
                    queries::delete_message(conn, id)?;
                    dispatcher.broadcast(ServerEvent::MessageDeleted { id });
                }
                Some(_) => debug!("Ignored delete of message {} by non-owner {}", id, caller),
                None => debug!("Ignored delete of unknown message {}", id),
            }
            Ok(())
        })
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Error deleting message: {}", e),
        Err(e) => error!("Delete task failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: i64, name: &str, color: &str) -> Identity {
        Identity {
            id,
            name: name.into(),
            color: color.into(),
        }
    }

    fn fixture() -> (Arc<Database>, Dispatcher, Identity, Identity) {
        let db = Database::open_in_memory().unwrap();
        let alice = identity(1, "Cyber Blue", "#00eaff");
        let bob = identity(2, "Electric Gold", "#ffd700");
        db.upsert_user(alice.id, &alice.name, &alice.color).unwrap();
        db.upsert_user(bob.id, &bob.name, &bob.color).unwrap();
        (Arc::new(db), Dispatcher::new(), alice, bob)
    }

    #[tokio::test]
    async fn create_broadcasts_the_denormalized_message() {
        let (db, dispatcher, alice, _bob) = fixture();
        let mut rx = dispatcher.subscribe();

        create_message(&db, &dispatcher, &alice, "hola".into(), MessageKind::Text, None).await;

        match rx.recv().await.unwrap() {
            ServerEvent::ReceiveMessage(view) => {
                assert_eq!(view.text, "hola");
                assert_eq!(view.user, "Cyber Blue");
                assert_eq!(view.color, "#00eaff");
                assert!(!view.is_edited);
                assert!(view.reply.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn create_resolves_the_reply_preview() {
        let (db, dispatcher, alice, bob) = fixture();
        let parent = db.insert_message(alice.id, "hola", "text", None).unwrap();
        let mut rx = dispatcher.subscribe();

        create_message(
            &db,
            &dispatcher,
            &bob,
            "respuesta".into(),
            MessageKind::Text,
            Some(parent),
        )
        .await;

        match rx.recv().await.unwrap() {
            ServerEvent::ReceiveMessage(view) => {
                let preview = view.reply.expect("reply preview");
                assert_eq!(preview.id, parent);
                assert_eq!(preview.user, "Cyber Blue");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn owner_edit_broadcasts_and_marks_edited() {
        let (db, dispatcher, alice, _bob) = fixture();
        let id = db.insert_message(alice.id, "tpyo", "text", None).unwrap();
        let mut rx = dispatcher.subscribe();

        edit_message(&db, &dispatcher, &alice, id, "typo".into()).await;

        match rx.recv().await.unwrap() {
            ServerEvent::MessageUpdated {
                id: updated,
                text,
                is_edited,
            } => {
                assert_eq!(updated, id);
                assert_eq!(text, "typo");
                assert!(is_edited);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(db.select_message(id).unwrap().unwrap().body, "typo");
    }

    #[tokio::test]
    async fn non_owner_edit_is_a_silent_no_op() {
        let (db, dispatcher, alice, bob) = fixture();
        let id = db.insert_message(alice.id, "mine", "text", None).unwrap();
        let mut rx = dispatcher.subscribe();

        edit_message(&db, &dispatcher, &bob, id, "hijacked".into()).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(db.select_message(id).unwrap().unwrap().body, "mine");
    }

    #[tokio::test]
    async fn unknown_ids_produce_no_signal() {
        let (db, dispatcher, alice, _bob) = fixture();
        let mut rx = dispatcher.subscribe();

        edit_message(&db, &dispatcher, &alice, 9999, "ghost".into()).await;
        delete_message(&db, &dispatcher, &alice, 9999).await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn owner_delete_broadcasts_and_removes_the_row() {
        let (db, dispatcher, alice, _bob) = fixture();
        let id = db.insert_message(alice.id, "bye", "text", None).unwrap();
        let mut rx = dispatcher.subscribe();

        delete_message(&db, &dispatcher, &alice, id).await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            ServerEvent::MessageDeleted { id: deleted } if deleted == id
        ));
        assert!(db.select_message(id).unwrap().is_none());
    }

    #[tokio::test]
    async fn non_owner_delete_leaves_the_row() {
        let (db, dispatcher, alice, bob) = fixture();
        let id = db.insert_message(alice.id, "mine", "text", None).unwrap();
        let mut rx = dispatcher.subscribe();

        delete_message(&db, &dispatcher, &bob, id).await;

        assert!(rx.try_recv().is_err());
        assert!(db.select_message(id).unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_a_reply_target_keeps_the_reply() {
        let (db, dispatcher, alice, bob) = fixture();
        let parent = db.insert_message(alice.id, "hola", "text", None).unwrap();
        let reply = db
            .insert_message(bob.id, "respuesta", "text", Some(parent))
            .unwrap();

        delete_message(&db, &dispatcher, &alice, parent).await;

        let row = db.select_message(reply).unwrap().expect("reply row");
        assert!(row.reply.is_none());
    }
}
