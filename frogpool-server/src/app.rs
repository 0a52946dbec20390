//! Component wiring.
//!
//! Builds the event bus, the connection registry, the prize scheduler,
//! the pool lifecycle manager and the game service on top of a store and a
//! chain gateway, and subscribes the event handlers.

use crate::state::AppState;
use frogpool_core::chain::ChainGateway;
use frogpool_core::config::{AuthConfig, GameConfig};
use frogpool_core::events::{EventBus, PoolEventKind};
use frogpool_core::processors::{
    GameService, HungerDecayWorker, PoolLifecycleManager, PrizeLocationScheduler,
};
use frogpool_core::registry::ConnectionRegistry;
use frogpool_core::store::GameStore;
use std::sync::Arc;

/// Everything the binary has to start and stop.
pub struct App {
    pub state: AppState,
    pub registry: Arc<ConnectionRegistry>,
    pub scheduler: PrizeLocationScheduler,
    pub decay_worker: HungerDecayWorker,
}

impl App {
    pub async fn assemble(
        store: Arc<dyn GameStore>,
        chain: Arc<dyn ChainGateway>,
        treasury_address: String,
        auth: AuthConfig,
        game: GameConfig,
    ) -> Self {
        let bus = EventBus::new();
        let registry = Arc::new(ConnectionRegistry::new(store.clone(), &game));
        let scheduler =
            PrizeLocationScheduler::new(store.clone(), registry.clone(), game.prize_interval);

        bus.subscribe(PoolEventKind::PoolParticipantsChanged, registry.clone())
            .await;
        bus.subscribe(PoolEventKind::PoolBecameActive, Arc::new(scheduler.clone()))
            .await;

        let lifecycle = Arc::new(PoolLifecycleManager::new(
            store.clone(),
            bus,
            game.clone(),
        ));
        let service = Arc::new(GameService::new(
            store.clone(),
            lifecycle,
            scheduler.clone(),
            registry.clone(),
            chain,
            treasury_address,
        ));
        let decay_worker = HungerDecayWorker::new(store, registry.clone(), &game);

        Self {
            state: AppState::new(service, registry.clone(), auth, game),
            registry,
            scheduler,
            decay_worker,
        }
    }
}
