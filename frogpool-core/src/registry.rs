//! One live push channel per user.
//!
//! The WebSocket handler owns the socket. It creates a
//! [`ConnectionHandle`]/[`ConnectionReceiver`] pair, registers the handle and
//! drains the receiver into the socket. Everything else in the process
//! pushes through the registry by user id and never touches sockets.

use crate::config::GameConfig;
use crate::entities::pool_participant::member_snapshots;
use crate::events::{PoolEvent, PoolEventHandler};
use crate::store::{GameStore, StoreError};
use frogpool_sdk::objects::{WsCloseCode, WsServerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Registry side of a connection.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: Uuid,
    messages: mpsc::Sender<WsServerMessage>,
    close: Arc<watch::Sender<Option<u16>>>,
}

/// Socket side of a connection.
#[derive(Debug)]
pub struct ConnectionReceiver {
    id: Uuid,
    messages: mpsc::Receiver<WsServerMessage>,
    close: watch::Receiver<Option<u16>>,
}

/// Next thing the socket writer has to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Message(WsServerMessage),
    /// Send a close frame with this code and stop.
    Close(u16),
}

/// Create a connected handle/receiver pair buffering up to `buffer` messages.
pub fn connection(buffer: usize) -> (ConnectionHandle, ConnectionReceiver) {
    let id = Uuid::now_v7();
    let (messages_tx, messages_rx) = mpsc::channel(buffer.max(1));
    let (close_tx, close_rx) = watch::channel(None);
    (
        ConnectionHandle {
            id,
            messages: messages_tx,
            close: Arc::new(close_tx),
        },
        ConnectionReceiver {
            id,
            messages: messages_rx,
            close: close_rx,
        },
    )
}

impl ConnectionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the socket side to close with `code`. Only the first code sticks.
    pub fn close(&self, code: u16) {
        self.close.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(code);
                true
            } else {
                false
            }
        });
    }

    pub fn is_closed(&self) -> bool {
        self.close.borrow().is_some() || self.messages.is_closed()
    }

    /// Queue a message for this connection only, waiting at most
    /// `deadline` for buffer space.
    pub async fn push(&self, message: WsServerMessage, deadline: Duration) -> bool {
        if self.is_closed() {
            return false;
        }
        matches!(
            tokio::time::timeout(deadline, self.messages.send(message)).await,
            Ok(Ok(()))
        )
    }
}

impl ConnectionReceiver {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next message or close request. A close request wins
    /// over queued messages.
    pub async fn next(&mut self) -> Outgoing {
        if let Some(code) = *self.close.borrow_and_update() {
            return Outgoing::Close(code);
        }
        loop {
            tokio::select! {
                biased;

                changed = self.close.changed() => {
                    match changed {
                        Ok(()) => {
                            if let Some(code) = *self.close.borrow_and_update() {
                                return Outgoing::Close(code);
                            }
                        }
                        Err(_) => return Outgoing::Close(WsCloseCode::NORMAL),
                    }
                }

                message = self.messages.recv() => {
                    return match message {
                        Some(message) => Outgoing::Message(message),
                        None => Outgoing::Close(WsCloseCode::NORMAL),
                    };
                }
            }
        }
    }
}

/// Tracks at most one live connection per user and fans out pushes.
pub struct ConnectionRegistry {
    store: Arc<dyn GameStore>,
    write_timeout: Duration,
    connections: RwLock<HashMap<i64, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new(store: Arc<dyn GameStore>, config: &GameConfig) -> Self {
        Self {
            store,
            write_timeout: config.ws_write_timeout,
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register `handle` as the user's connection, closing any previous one
    /// with [`WsCloseCode::REPLACED`], then push the user's current state
    /// to it.
    pub async fn register(&self, user_id: i64, handle: ConnectionHandle) {
        let previous = self
            .connections
            .write()
            .await
            .insert(user_id, handle.clone());
        if let Some(previous) = previous {
            info!(user_id, old = %previous.id, new = %handle.id, "Replacing connection");
            previous.close(WsCloseCode::REPLACED);
        } else {
            debug!(user_id, connection = %handle.id, "Connection registered");
        }

        if let Err(e) = self.catch_up(user_id, &handle).await {
            warn!(user_id, error = %e, "Failed to push catch-up state");
        }
    }

    /// Remove and close the user's connection if it is still `connection_id`.
    ///
    /// A connection that was already replaced leaves the newer entry alone.
    pub async fn unregister(&self, user_id: i64, connection_id: Uuid) -> bool {
        let removed = {
            let mut connections = self.connections.write().await;
            match connections.get(&user_id) {
                Some(current) if current.id == connection_id => connections.remove(&user_id),
                _ => None,
            }
        };
        match removed {
            Some(handle) => {
                handle.close(WsCloseCode::NORMAL);
                debug!(user_id, connection = %connection_id, "Connection unregistered");
                true
            }
            None => false,
        }
    }

    /// Push to one user. Silently does nothing when the user is offline; a
    /// push that cannot be queued within the write timeout drops the
    /// connection.
    pub async fn send(&self, user_id: i64, message: WsServerMessage) -> bool {
        let Some(handle) = self.connections.read().await.get(&user_id).cloned() else {
            return false;
        };
        if handle.push(message, self.write_timeout).await {
            return true;
        }
        warn!(user_id, connection = %handle.id, "Push failed, dropping connection");
        self.unregister(user_id, handle.id).await;
        false
    }

    /// Push the same message to several users. Returns how many accepted it.
    pub async fn send_to_many(&self, user_ids: &[i64], message: &WsServerMessage) -> usize {
        let mut delivered = 0;
        for &user_id in user_ids {
            if self.send(user_id, message.clone()).await {
                delivered += 1;
            }
        }
        delivered
    }

    /// Push to every connected user. One dead connection does not stop the
    /// rest.
    pub async fn broadcast_all(&self, message: &WsServerMessage) -> usize {
        let targets: Vec<(i64, ConnectionHandle)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(user_id, handle)| (*user_id, handle.clone()))
            .collect();

        let mut delivered = 0;
        for (user_id, handle) in targets {
            if handle.push(message.clone(), self.write_timeout).await {
                delivered += 1;
            } else {
                warn!(user_id, connection = %handle.id, "Broadcast failed, dropping connection");
                self.unregister(user_id, handle.id).await;
            }
        }
        delivered
    }

    /// Push to every member of a pool.
    pub async fn notify_pool(
        &self,
        pool_id: i64,
        message: &WsServerMessage,
    ) -> Result<usize, StoreError> {
        let user_ids: Vec<i64> = self
            .store
            .list_pool_members(pool_id)
            .await?
            .iter()
            .map(|m| m.user_id)
            .collect();
        Ok(self.send_to_many(&user_ids, message).await)
    }

    pub async fn is_connected(&self, user_id: i64) -> bool {
        self.connections.read().await.contains_key(&user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Close every connection. Used on shutdown.
    pub async fn close_all(&self) {
        let drained: Vec<ConnectionHandle> = self
            .connections
            .write()
            .await
            .drain()
            .map(|(_, handle)| handle)
            .collect();
        info!(connections = drained.len(), "Closing all connections");
        for handle in drained {
            handle.close(WsCloseCode::NORMAL);
        }
    }

    async fn catch_up(&self, user_id: i64, handle: &ConnectionHandle) -> Result<(), StoreError> {
        if let Some(frog) = self.store.get_active_frog_for_user(user_id).await? {
            handle
                .push(
                    WsServerMessage::HungerUpdate {
                        frog_id: frog.id,
                        new_hunger_level: frog.hunger_level,
                    },
                    self.write_timeout,
                )
                .await;
        }

        let Some(pool) = self.store.find_open_pool_for_user(user_id).await? else {
            return Ok(());
        };
        let holder = pool.current_big_prize_holder.as_deref();
        let members = self.store.list_pool_members(pool.id).await?;
        handle
            .push(
                WsServerMessage::PoolUpdate {
                    pool_id: pool.id,
                    participants: member_snapshots(&members, holder),
                },
                self.write_timeout,
            )
            .await;
        if let Some(holder) = holder {
            handle
                .push(
                    WsServerMessage::BigPrizeLocation {
                        pool_id: pool.id,
                        holder_address: holder.to_owned(),
                    },
                    self.write_timeout,
                )
                .await;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PoolEventHandler for ConnectionRegistry {
    async fn handle(&self, event: PoolEvent) {
        let PoolEvent::PoolParticipantsChanged {
            pool_id,
            participants,
        } = event
        else {
            return;
        };
        let message = WsServerMessage::PoolUpdate {
            pool_id,
            participants,
        };
        if let Err(e) = self.notify_pool(pool_id, &message).await {
            warn!(pool_id, error = %e, "Failed to push pool update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryGameStore, NewParticipant};
    use crate::utils::utc_now;
    use rust_decimal::Decimal;

    fn registry() -> (Arc<MemoryGameStore>, ConnectionRegistry) {
        let store = Arc::new(MemoryGameStore::new());
        let registry = ConnectionRegistry::new(store.clone(), &GameConfig::default());
        (store, registry)
    }

    fn pong() -> WsServerMessage {
        WsServerMessage::Pong
    }

    #[tokio::test]
    async fn test_send_to_offline_user_is_noop() {
        let (_, registry) = registry();
        assert!(!registry.send(42, pong()).await);
    }

    #[tokio::test]
    async fn test_replace_on_reconnect() {
        let (_, registry) = registry();
        let (old, mut old_rx) = connection(8);
        let (new, mut new_rx) = connection(8);
        let old_id = old.id();

        registry.register(1, old).await;
        registry.register(1, new).await;
        assert_eq!(old_rx.next().await, Outgoing::Close(WsCloseCode::REPLACED));

        // The replaced connection's own cleanup must not evict the new one.
        assert!(!registry.unregister(1, old_id).await);
        assert!(registry.is_connected(1).await);
        assert!(registry.send(1, pong()).await);
        assert_eq!(new_rx.next().await, Outgoing::Message(pong()));
    }

    #[tokio::test]
    async fn test_dead_connection_is_dropped_on_send() {
        let (_, registry) = registry();
        let (handle, rx) = connection(8);
        registry.register(1, handle).await;
        drop(rx);
        assert!(!registry.send(1, pong()).await);
        assert!(!registry.is_connected(1).await);
    }

    #[tokio::test]
    async fn test_broadcast_survives_dead_peer() {
        let (_, registry) = registry();
        let (a, mut a_rx) = connection(8);
        let (b, b_rx) = connection(8);
        let (c, mut c_rx) = connection(8);
        registry.register(1, a).await;
        registry.register(2, b).await;
        registry.register(3, c).await;
        drop(b_rx);

        assert_eq!(registry.broadcast_all(&pong()).await, 2);
        assert_eq!(a_rx.next().await, Outgoing::Message(pong()));
        assert_eq!(c_rx.next().await, Outgoing::Message(pong()));
        assert_eq!(registry.connection_count().await, 2);
    }

    #[tokio::test]
    async fn test_register_pushes_catch_up() {
        let (store, registry) = registry();
        let user = store.find_or_create_user("wallet-a").await.unwrap();
        let frog = store.create_frog(user.id, "tx-a", utc_now()).await.unwrap();
        let pool = store.create_pool(Decimal::ONE, utc_now()).await.unwrap();
        store
            .admit_participant(
                NewParticipant {
                    pool_id: pool.id,
                    frog_id: frog.id,
                    user_id: user.id,
                    wallet_address: "wallet-a".into(),
                },
                10,
                utc_now(),
            )
            .await
            .unwrap();
        store.set_prize_holder(pool.id, "wallet-a").await.unwrap();

        let (handle, mut rx) = connection(8);
        registry.register(user.id, handle).await;

        assert_eq!(
            rx.next().await,
            Outgoing::Message(WsServerMessage::HungerUpdate {
                frog_id: frog.id,
                new_hunger_level: 100,
            })
        );
        let Outgoing::Message(WsServerMessage::PoolUpdate {
            pool_id,
            participants,
        }) = rx.next().await
        else {
            panic!("expected pool update");
        };
        assert_eq!(pool_id, pool.id);
        assert_eq!(participants.len(), 1);
        assert!(participants[0].can_see_big_prize);
        assert_eq!(
            rx.next().await,
            Outgoing::Message(WsServerMessage::BigPrizeLocation {
                pool_id: pool.id,
                holder_address: "wallet-a".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_close_all() {
        let (_, registry) = registry();
        let (a, mut a_rx) = connection(8);
        registry.register(1, a).await;
        registry.close_all().await;
        assert_eq!(a_rx.next().await, Outgoing::Close(WsCloseCode::NORMAL));
        assert_eq!(registry.connection_count().await, 0);
    }
}
