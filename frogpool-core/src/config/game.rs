//! Game rules and scheduler timings.

use rust_decimal::Decimal;
use std::time::Duration;

/// Upper bound of a frog's hunger level.
pub const MAX_HUNGER_LEVEL: i32 = 100;

/// Game rules and scheduler timings.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Number of participants that fills a pool and starts the game.
    pub pool_capacity: i32,
    /// Prize attached to every newly created pool (in SOL).
    pub default_prize: Decimal,
    /// How often the big prize moves inside an active pool.
    pub prize_interval: Duration,
    /// How often the hunger decay worker runs.
    pub decay_interval: Duration,
    /// Elapsed time that costs a frog one hunger point.
    pub hunger_unit: Duration,
    /// How long a push may wait on a slow connection before the connection
    /// is considered dead.
    pub ws_write_timeout: Duration,
    /// How long a connection may stay silent before it is dropped.
    pub ws_read_timeout: Duration,
    /// Outbound frames buffered per connection.
    pub ws_send_buffer: usize,
    /// Attempts at joining a pool before an activation gives up.
    pub max_join_attempts: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            pool_capacity: 10,
            default_prize: Decimal::new(1, 1),
            prize_interval: Duration::from_secs(10),
            decay_interval: Duration::from_secs(3),
            hunger_unit: Duration::from_secs(3),
            ws_write_timeout: Duration::from_secs(10),
            ws_read_timeout: Duration::from_secs(120),
            ws_send_buffer: 64,
            max_join_attempts: 3,
        }
    }
}
