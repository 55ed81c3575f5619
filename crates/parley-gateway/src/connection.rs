use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use parley_db::Database;
use parley_types::events::{ClientCommand, ServerEvent};
use parley_types::models::Identity;

use crate::dispatcher::Dispatcher;
use crate::history::{self, JumpOutcome};
use crate::mutations;

/// Per-session view mode. Backward pagination is only honored in Live; a
/// successful jump switches to Historical until the client returns to the
/// present with a null-cursor history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Live,
    Historical,
}

/// One authenticated session: the identity it is bound to for its whole
/// lifetime, its view mode, and the handles it serves requests through.
/// Holds no durable state — on disconnect the client replays its own
/// cursor or window.
pub struct Session {
    identity: Identity,
    mode: ViewMode,
    conn_id: Uuid,
    db: Arc<Database>,
    dispatcher: Dispatcher,
}

impl Session {
    pub fn new(
        identity: Identity,
        conn_id: Uuid,
        db: Arc<Database>,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            identity,
            mode: ViewMode::Live,
            conn_id,
            db,
            dispatcher,
        }
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    /// Dispatch one inbound command. Commands are handled strictly in
    /// arrival order per connection, so `mode` needs no synchronization —
    /// a late backward page can never interleave past a mode switch.
    pub async fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::GetHistory { cursor: None } => {
                // Return to the present: reset to live mode and serve the
                // most recent page.
                self.mode = ViewMode::Live;
                if let Some(page) = history::fetch_page(&self.db, None).await {
                    self.dispatcher
                        .send_to(self.conn_id, ServerEvent::HistoryChunk(page))
                        .await;
                }
            }

            ClientCommand::GetHistory {
                cursor: Some(cursor),
            } => {
                if self.mode == ViewMode::Historical {
                    // A scroll-up request that raced a jump; honoring it
                    // would splice a live page into a historical window.
                    debug!(
                        "{} ({}) backward page ignored in historical mode",
                        self.identity.name, self.identity.id
                    );
                    return;
                }
                if let Some(page) = history::fetch_page(&self.db, Some(cursor)).await {
                    self.dispatcher
                        .send_to(self.conn_id, ServerEvent::HistoryChunk(page))
                        .await;
                }
            }

            ClientCommand::SendMessage {
                text,
                kind,
                response_to,
            } => {
                mutations::create_message(
                    &self.db,
                    &self.dispatcher,
                    &self.identity,
                    text,
                    kind,
                    response_to,
                )
                .await;
            }

            ClientCommand::EditMessage { id, text } => {
                mutations::edit_message(&self.db, &self.dispatcher, &self.identity, id, text).await;
            }

            ClientCommand::DeleteMessage { id } => {
                mutations::delete_message(&self.db, &self.dispatcher, &self.identity, id).await;
            }

            ClientCommand::JumpToMessage { id } => {
                match history::fetch_window(&self.db, &id).await {
                    JumpOutcome::Window(window) => {
                        self.mode = ViewMode::Historical;
                        self.dispatcher
                            .send_to(self.conn_id, ServerEvent::LoadJumpMessages(window))
                            .await;
                    }
                    JumpOutcome::Error(message) => {
                        self.dispatcher
                            .send_to(self.conn_id, ServerEvent::JumpError { message })
                            .await;
                    }
                }
            }
        }
    }
}

/// Handle a pre-authenticated WebSocket connection. The credential was
/// already validated at the HTTP upgrade layer (main.rs), so the session
/// starts directly in the authenticated state: identity confirmation,
/// implicit first page, then the event loop.
pub async fn handle_connection(
    socket: WebSocket,
    dispatcher: Dispatcher,
    db: Arc<Database>,
    identity: Identity,
) {
    let (mut sender, mut receiver) = socket.split();

    info!("{} ({}) connected to gateway", identity.name, identity.id);

    // Mirror the identity into the store so read-time joins resolve it.
    // A failure here is logged like any other store failure; the session
    // continues and the client retries by reconnecting.
    {
        let db = db.clone();
        let user = identity.clone();
        match tokio::task::spawn_blocking(move || db.upsert_user(user.id, &user.name, &user.color))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Error mirroring identity {}: {}", identity.id, e),
            Err(e) => error!("Identity mirror task failed: {}", e),
        }
    }

    // Identity confirmation
    let session_event = ServerEvent::Session(identity.clone());
    if sender
        .send(Message::Text(
            serde_json::to_string(&session_event).unwrap().into(),
        ))
        .await
        .is_err()
    {
        return;
    }

    let (conn_id, mut direct_rx) = dispatcher.register().await;
    let mut broadcast_rx = dispatcher.subscribe();
    debug!("{} live connections", dispatcher.connected().await);

    // Forward fanout + direct events to this client
    let mut send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Broadcast receiver lagged by {} events", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                result = direct_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Process inbound commands strictly in arrival order.
    let mut session = Session::new(identity.clone(), conn_id, db, dispatcher.clone());
    let mut recv_task = tokio::spawn(async move {
        // Entering Live issues the first page implicitly.
        session
            .handle_command(ClientCommand::GetHistory { cursor: None })
            .await;

        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => session.handle_command(cmd).await,
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            session.identity.name,
                            session.identity.id,
                            e,
                            &text[..text.len().min(200)]
                        );
                    }
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.unregister(conn_id).await;
    info!(
        "{} ({}) disconnected from gateway",
        identity.name, identity.id
    );
}
