//! In-process event bus.
//!
//! # Event Flow
//!
//! 1. `PoolLifecycleManager` admits a participant and publishes
//!    `PoolParticipantsChanged` -> `ConnectionRegistry` pushes `pool-update`
//!    to the pool's members.
//! 2. When that admission filled the pool it also publishes
//!    `PoolBecameActive` -> `PrizeLocationScheduler` starts the pool's
//!    prize task.
//!
//! Events are ephemeral: nothing is replayed after a restart. The prize
//! scheduler resumes active pools from the store on boot instead.

pub mod bus;
pub mod types;

pub use bus::{EventBus, PoolEventHandler};
pub use types::{PoolEvent, PoolEventKind};
