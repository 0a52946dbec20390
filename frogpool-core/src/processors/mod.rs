//! Game processors.
//!
//! - `PoolLifecycleManager`: pool state machine, publishes pool events
//! - `PrizeLocationScheduler`: one prize task per active pool, started on
//!   `PoolBecameActive`
//! - `HungerDecayWorker`: global hunger decay loop
//! - `GameService`: request-triggered operations built on the above

pub mod error;
pub mod game;
pub mod hunger_decay;
pub mod pool_lifecycle;
pub mod prize_locator;

pub use error::GameError;
pub use game::{Activation, GameService, PlayerProfile, RewardClaim};
pub use hunger_decay::{DecayReport, HungerDecayWorker};
pub use pool_lifecycle::{JoinedPool, PoolLifecycleManager};
pub use prize_locator::{PrizeLocationScheduler, TickOutcome};
