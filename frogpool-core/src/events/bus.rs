use super::types::{PoolEvent, PoolEventKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Receives the events of the kinds it was subscribed to.
#[async_trait::async_trait]
pub trait PoolEventHandler: Send + Sync {
    async fn handle(&self, event: PoolEvent);
}

type HandlerList = Vec<Arc<dyn PoolEventHandler>>;

/// In-process publish/subscribe for [`PoolEvent`]s.
///
/// Every delivery runs on its own task. `publish` returns as soon as the
/// tasks are spawned, so publishers must not rely on handlers having run,
/// and handlers must not rely on running in any order relative to each
/// other.
#[derive(Clone, Default)]
pub struct EventBus {
    handlers: Arc<RwLock<HashMap<PoolEventKind, HandlerList>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, kind: PoolEventKind, handler: Arc<dyn PoolEventHandler>) {
        self.handlers
            .write()
            .await
            .entry(kind)
            .or_default()
            .push(handler);
    }

    /// Deliver `event` to every handler currently subscribed to its kind.
    ///
    /// Returns the number of deliveries started.
    pub async fn publish(&self, event: PoolEvent) -> usize {
        let kind = event.kind();
        let handlers: HandlerList = self
            .handlers
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        debug!(?kind, pool_id = event.pool_id(), handlers = handlers.len(), "Publishing pool event");
        for handler in &handlers {
            let handler = handler.clone();
            let event = event.clone();
            tokio::spawn(async move { handler.handle(event).await });
        }
        handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Recorder(mpsc::UnboundedSender<PoolEvent>);

    #[async_trait::async_trait]
    impl PoolEventHandler for Recorder {
        async fn handle(&self, event: PoolEvent) {
            let _ = self.0.send(event);
        }
    }

    #[tokio::test]
    async fn test_delivers_to_every_subscriber_of_kind() {
        let bus = EventBus::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let (tx_c, mut rx_c) = mpsc::unbounded_channel();
        bus.subscribe(PoolEventKind::PoolBecameActive, Arc::new(Recorder(tx_a)))
            .await;
        bus.subscribe(PoolEventKind::PoolBecameActive, Arc::new(Recorder(tx_b)))
            .await;
        bus.subscribe(PoolEventKind::PoolParticipantsChanged, Arc::new(Recorder(tx_c)))
            .await;

        let delivered = bus.publish(PoolEvent::PoolBecameActive { pool_id: 7 }).await;
        assert_eq!(delivered, 2);

        let timeout = Duration::from_secs(1);
        let a = tokio::time::timeout(timeout, rx_a.recv()).await.unwrap();
        let b = tokio::time::timeout(timeout, rx_b.recv()).await.unwrap();
        assert_eq!(a, Some(PoolEvent::PoolBecameActive { pool_id: 7 }));
        assert_eq!(b, Some(PoolEvent::PoolBecameActive { pool_id: 7 }));
        assert!(rx_c.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        let delivered = bus
            .publish(PoolEvent::PoolParticipantsChanged {
                pool_id: 1,
                participants: Vec::new(),
            })
            .await;
        assert_eq!(delivered, 0);
    }
}
