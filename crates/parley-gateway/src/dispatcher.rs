use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, broadcast, mpsc};
use uuid::Uuid;

use parley_types::events::ServerEvent;

/// Tracks live connections and fans mutation deltas out to all of them.
///
/// Fanout is deliberately unfiltered: every connected session receives
/// every create/edit/delete regardless of its own pagination or window
/// state. The registry only ever adds on connect and removes on
/// disconnect.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    /// Broadcast channel for deltas — all connected clients receive all of them.
    broadcast_tx: broadcast::Sender<ServerEvent>,

    /// Per-connection direct channels: history pages, jump windows, jump
    /// errors and the session event go to exactly one client.
    connections: RwLock<HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(DispatcherInner {
                broadcast_tx,
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Subscribe to the fanout stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Deliver a delta to every connected client. Best-effort: with no
    /// receivers the event is dropped, never queued.
    pub fn broadcast(&self, event: ServerEvent) {
        let _ = self.inner.broadcast_tx.send(event);
    }

    /// Register a connection. Returns its id and the direct receive half.
    pub async fn register(&self) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.connections.write().await.insert(conn_id, tx);
        (conn_id, rx)
    }

    /// Remove a connection on disconnect.
    pub async fn unregister(&self, conn_id: Uuid) {
        self.inner.connections.write().await.remove(&conn_id);
    }

    /// Send an event to a single connection.
    pub async fn send_to(&self, conn_id: Uuid, event: ServerEvent) {
        let connections = self.inner.connections.read().await;
        if let Some(tx) = connections.get(&conn_id) {
            let _ = tx.send(event);
        }
    }

    /// Number of live connections, for logging.
    pub async fn connected(&self) -> usize {
        self.inner.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn broadcast_reaches_every_subscriber() {
        let dispatcher = Dispatcher::new();
        let mut a = dispatcher.subscribe();
        let mut b = dispatcher.subscribe();

        dispatcher.broadcast(ServerEvent::MessageDeleted { id: 7 });

        assert!(matches!(
            a.recv().await.unwrap(),
            ServerEvent::MessageDeleted { id: 7 }
        ));
        assert!(matches!(
            b.recv().await.unwrap(),
            ServerEvent::MessageDeleted { id: 7 }
        ));
    }

    #[tokio::test]
    async fn direct_send_targets_one_connection() {
        let dispatcher = Dispatcher::new();
        let (conn_a, mut rx_a) = dispatcher.register().await;
        let (_conn_b, mut rx_b) = dispatcher.register().await;

        dispatcher
            .send_to(
                conn_a,
                ServerEvent::JumpError {
                    message: "Invalid message id.".into(),
                },
            )
            .await;

        assert!(matches!(
            rx_a.recv().await.unwrap(),
            ServerEvent::JumpError { .. }
        ));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unregister_drops_the_channel() {
        let dispatcher = Dispatcher::new();
        let (conn_id, mut rx) = dispatcher.register().await;
        assert_eq!(dispatcher.connected().await, 1);

        dispatcher.unregister(conn_id).await;
        assert_eq!(dispatcher.connected().await, 0);

        dispatcher
            .send_to(conn_id, ServerEvent::MessageDeleted { id: 1 })
            .await;
        assert!(rx.try_recv().is_err());
    }
}
