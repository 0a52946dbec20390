//! Application state shared across all request handlers.

use frogpool_core::config::{AuthConfig, GameConfig};
use frogpool_core::processors::GameService;
use frogpool_core::registry::ConnectionRegistry;
use std::sync::Arc;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Request-triggered game operations.
    pub game: Arc<GameService>,
    /// Live WebSocket connections, one per user.
    pub registry: Arc<ConnectionRegistry>,
    /// Session token verification settings.
    pub auth: Arc<AuthConfig>,
    /// Game rules; the WebSocket handler reads its timeouts from here.
    pub config: Arc<GameConfig>,
}

impl AppState {
    pub fn new(
        game: Arc<GameService>,
        registry: Arc<ConnectionRegistry>,
        auth: AuthConfig,
        config: GameConfig,
    ) -> Self {
        Self {
            game,
            registry,
            auth: Arc::new(auth),
            config: Arc::new(config),
        }
    }
}
